use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use toml::Table;

use crate::cam::config::{KeygenConfig, StoreConfig};
use crate::sim::config::{Config, SimConfig};
use crate::sim::top::Sim;
use crate::traffic::config::TrafficConfig;

#[derive(Parser)]
#[command(version, about)]
pub struct RingcamArgs {
    #[arg(help = "Path to config.toml")]
    pub config_path: PathBuf,
    #[arg(long, help = "Override number of slots per partition")]
    pub capacity: Option<usize>,
    #[arg(long, help = "Override match resolver bank size")]
    pub bank_size: Option<usize>,
    #[arg(long, help = "Override number of partitions")]
    pub partitions: Option<usize>,
    #[arg(long, help = "Enable log at level (0:none, 1:info, 2:debug)")]
    pub log: Option<u64>,
    #[arg(long, help = "Write the egress stream as JSON lines to this path")]
    pub egress: Option<PathBuf>,
    #[arg(long, help = "Override simulation timeout in steps")]
    pub timeout: Option<u64>,
}

/// Make a Sim object from the TOML configuration.
/// If `cli_args` is given, override TOML options with CLI arguments.
pub fn make_sim(toml_string: &str, cli_args: Option<&RingcamArgs>) -> anyhow::Result<Sim> {
    let config_table: Table = toml::from_str(toml_string).context("cannot parse config toml")?;
    let mut sim_config = SimConfig::from_section(config_table.get("sim"));
    let mut store_config = StoreConfig::from_section(config_table.get("store"));
    let keygen_config = KeygenConfig::from_section(config_table.get("keygen"));
    let traffic_config = TrafficConfig::from_section(config_table.get("traffic"));

    // override toml configs with CLI args
    if let Some(args) = cli_args {
        sim_config.log_level = args.log.unwrap_or(sim_config.log_level);
        sim_config.num_partitions = args.partitions.unwrap_or(sim_config.num_partitions);
        sim_config.timeout = args.timeout.unwrap_or(sim_config.timeout);
        sim_config.egress_path = args.egress.clone().or(sim_config.egress_path);
        store_config.capacity = args.capacity.unwrap_or(store_config.capacity);
        store_config.bank_size = args.bank_size.unwrap_or(store_config.bank_size);
    }

    Sim::new(sim_config, store_config, keygen_config, traffic_config)
}
