use serde::Deserialize;

use crate::sim::config::Config;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TrafficConfig {
    pub enabled: bool,
    pub seed: u64,
    /// Total records to generate; 0 means unbounded.
    pub num_records: u64,
    /// Steps between generated records.
    pub interval: u64,
    /// How selectors are spread over partitions: `round_robin` or `random`.
    pub spread: String,
    pub logging: TrafficLoggingConfig,
    pub pattern: TrafficPatternSpec,
}

impl Config for TrafficConfig {}

impl Default for TrafficConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            seed: 0,
            num_records: 4096,
            interval: 1,
            spread: "round_robin".to_string(),
            logging: TrafficLoggingConfig::default(),
            pattern: TrafficPatternSpec::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TrafficLoggingConfig {
    pub print_traffic_lines: bool,
    /// Report progress every this many accepted records; 0 disables.
    pub checkpoint_every: u64,
}

impl Default for TrafficLoggingConfig {
    fn default() -> Self {
        Self {
            print_traffic_lines: false,
            checkpoint_every: 0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TrafficPatternSpec {
    pub name: String,
    /// `windowed`, `random` or `constant`.
    pub kind: String,
    /// Window length for `windowed` keys; should match the key generator period.
    pub period: u64,
    /// `windowed`: records may be stamped up to this many windows late.
    pub max_lag: u64,
    /// `random`: keys drawn uniformly from `[random_min, random_max)`.
    pub random_min: u64,
    pub random_max: u64,
    /// `constant`: the key every record carries.
    pub key: u64,
}

impl Default for TrafficPatternSpec {
    fn default() -> Self {
        Self {
            name: String::new(),
            kind: "windowed".to_string(),
            period: 64,
            max_lag: 0,
            random_min: 0,
            random_max: 0,
            key: 0,
        }
    }
}
