use std::path::PathBuf;

use anyhow::bail;
use log::warn;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use toml::*;

use crate::cam::lifecycle::PHASE_NAMES;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SimConfig {
    pub log_level: u64,
    pub timeout: u64,
    /// Number of store instances sharing the ingress stream, one per partition index.
    pub num_partitions: usize,
    /// Steps to keep running once traffic and the phase script are exhausted.
    pub drain_cycles: u64,
    pub egress_path: Option<PathBuf>,
    pub summary_path: Option<PathBuf>,
    pub phases: Vec<PhaseEvent>,
}

pub trait Config: DeserializeOwned + Default {
    fn from_section(section: Option<&Value>) -> Self {
        match section {
            Some(value) => value.clone().try_into().expect("cannot deserialize config"),
            None => {
                warn!("config section not found");
                Self::default()
            }
        }
    }
}

impl Config for SimConfig {}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            log_level: 0,
            timeout: 1_000_000,
            num_partitions: 1,
            drain_cycles: 256,
            egress_path: None,
            summary_path: None,
            phases: Vec::new(),
        }
    }
}

/// One entry of the phase script: at step `at`, drive the lifecycle input with either a named
/// phase or a raw code.  Raw codes allow exercising the unknown-code path.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct PhaseEvent {
    pub at: u64,
    pub phase: Option<String>,
    pub code: Option<u32>,
}

impl PhaseEvent {
    pub fn resolve(&self) -> Result<u32, anyhow::Error> {
        match (&self.phase, self.code) {
            (Some(_), Some(_)) => bail!("phase event at {} sets both `phase` and `code`", self.at),
            (None, Some(code)) => Ok(code),
            (Some(name), None) => match PHASE_NAMES.get(name.to_ascii_lowercase().as_str()) {
                Some(code) => Ok(*code),
                None => bail!("unknown phase name '{}' at step {}", name, self.at),
            },
            (None, None) => bail!("phase event at {} has neither `phase` nor `code`", self.at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_section_falls_back_to_default() {
        let cfg = SimConfig::from_section(None);
        assert_eq!(cfg.num_partitions, 1);
        assert!(cfg.phases.is_empty());
    }

    #[test]
    fn phase_events_resolve_names_and_codes() {
        let named = PhaseEvent { at: 0, phase: Some("Running".into()), code: None };
        assert_eq!(named.resolve().unwrap(), 3);
        let raw = PhaseEvent { at: 5, phase: None, code: Some(42) };
        assert_eq!(raw.resolve().unwrap(), 42);
        let bad = PhaseEvent { at: 9, phase: Some("warp".into()), code: None };
        assert!(bad.resolve().is_err());
        assert!(PhaseEvent::default().resolve().is_err());
    }
}
