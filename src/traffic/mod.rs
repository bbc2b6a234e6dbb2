pub mod config;
pub mod driver;
pub mod patterns;

pub use config::TrafficConfig;
pub use driver::{TrafficDriver, TrafficStats};
