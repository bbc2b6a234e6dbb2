use std::fs;
use std::process::ExitCode;

use clap::Parser;
use ringcam::ui::{make_sim, RingcamArgs};

pub fn main() -> ExitCode {
    env_logger::init();

    let argv = RingcamArgs::parse();
    let config = fs::read_to_string(&argv.config_path).unwrap_or_else(|err| {
        eprintln!("failed to read config file: {}", err);
        std::process::exit(1);
    });

    let result = make_sim(&config, Some(&argv)).and_then(|mut sim| sim.simulate());
    match result {
        Ok(summary) => {
            match serde_json::to_string_pretty(&summary) {
                Ok(json) => println!("{}", json),
                Err(err) => eprintln!("cannot serialize summary: {}", err),
            }
            if summary.timed_out || summary.total.stats.cache_misses != 0 {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}
