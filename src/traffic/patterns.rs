use anyhow::bail;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::cam::types::Key;
use crate::traffic::config::TrafficPatternSpec;

#[derive(Debug, Clone, PartialEq, Eq)]
enum PatternKind {
    /// Key of the window the record arrived in, optionally a few windows late.
    Windowed { period: u64, max_lag: u64 },
    Random { min: u64, max: u64 },
    Constant { key: u64 },
}

/// Key source for generated records.  Deterministic for a given seed.
#[derive(Debug, Clone)]
pub struct PatternEngine {
    pub name: String,
    kind: PatternKind,
    key_mask: Key,
    rng: StdRng,
}

impl PatternEngine {
    pub fn new(spec: &TrafficPatternSpec, key_mask: Key, seed: u64) -> anyhow::Result<Self> {
        let kind = compile_kind(spec)?;
        let name = if spec.name.is_empty() {
            default_pattern_name(&kind)
        } else {
            spec.name.clone()
        };
        Ok(Self {
            name,
            kind,
            key_mask,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    pub fn next_key(&mut self, now: u64) -> Key {
        let key = match self.kind {
            PatternKind::Windowed { period, max_lag } => {
                let window = now / period;
                let lag = if max_lag == 0 { 0 } else { self.rng.gen_range(0..=max_lag) };
                window.saturating_sub(lag)
            }
            PatternKind::Random { min, max } => self.rng.gen_range(min..max),
            PatternKind::Constant { key } => key,
        };
        key & self.key_mask
    }

    /// Uniform draw in `[0, n)`, sharing the pattern's stream.
    pub fn draw(&mut self, n: u64) -> u64 {
        if n <= 1 {
            0
        } else {
            self.rng.gen_range(0..n)
        }
    }
}

fn compile_kind(spec: &TrafficPatternSpec) -> anyhow::Result<PatternKind> {
    let kind = match spec.kind.trim().to_ascii_lowercase().as_str() {
        "windowed" | "window" => {
            if spec.period == 0 {
                bail!("windowed traffic pattern needs a non-zero period");
            }
            PatternKind::Windowed { period: spec.period, max_lag: spec.max_lag }
        }
        "random" => {
            let min = spec.random_min;
            let max = spec.random_max.max(min + 1);
            PatternKind::Random { min, max }
        }
        "constant" | "const" => PatternKind::Constant { key: spec.key },
        other => bail!(
            "unsupported traffic pattern kind '{}' (expected windowed|random|constant)",
            other
        ),
    };
    Ok(kind)
}

fn default_pattern_name(kind: &PatternKind) -> String {
    match kind {
        PatternKind::Windowed { period, max_lag } => format!("windowed({})~{}", period, max_lag),
        PatternKind::Random { min, max } => format!("random({}, {})", min, max),
        PatternKind::Constant { key } => format!("constant({:#x})", key),
    }
}
