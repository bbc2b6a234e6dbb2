use std::fmt;

#[derive(PartialEq, PartialOrd, Debug, Default, Clone, Copy)]
pub enum LogLevel {
    #[default]
    NONE,
    INFO,
    DEBUG,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogLevel::NONE => "NONE",
            LogLevel::INFO => "INFO",
            LogLevel::DEBUG => "DEBUG",
        })
    }
}

pub fn to_loglevel(ulevel: u64) -> LogLevel {
    match ulevel {
        0 => LogLevel::NONE,
        1 => LogLevel::INFO,
        2 => LogLevel::DEBUG,
        _ => LogLevel::DEBUG,
    }
}

/// Step-level event printer.  Independent of the `log` facade so that per-step traces can be
/// switched on from the config file without touching `RUST_LOG`.
#[derive(Debug)]
pub struct Logger {
    level: LogLevel,
    tag: String,
}

impl Logger {
    pub fn new(ulevel: u64) -> Self {
        Logger { level: to_loglevel(ulevel), tag: String::new() }
    }

    pub fn silent() -> Self {
        Logger { level: LogLevel::NONE, tag: String::new() }
    }

    /// Copy of this logger whose lines are prefixed with `tag`.
    pub fn tagged(&self, tag: impl Into<String>) -> Self {
        Logger { level: self.level, tag: tag.into() }
    }

    pub fn enabled(&self, level: LogLevel) -> bool {
        level != LogLevel::NONE && level <= self.level
    }

    pub fn log(&self, level: LogLevel, args: fmt::Arguments<'_>) {
        if !self.enabled(level) {
            return;
        }
        if self.tag.is_empty() {
            println!("[{}] {}", level, args);
        } else {
            println!("[{}] {}: {}", level, self.tag, args);
        }
    }
}

#[macro_export]
macro_rules! log {
    // usage: log!(logger, "a {} event", "clock")
    ($logger:expr, $level:expr, $($arg:tt)+) => {{
        $logger.log($level, format_args!($($arg)+));
    }};
}
#[macro_export]
macro_rules! info {
    ($logger:expr, $($arg:tt)+) => ( $crate::log!($logger, $crate::sim::log::LogLevel::INFO, $($arg)+); )
}
#[macro_export]
macro_rules! debug {
    ($logger:expr, $($arg:tt)+) => ( $crate::log!($logger, $crate::sim::log::LogLevel::DEBUG, $($arg)+); )
}
