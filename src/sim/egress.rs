use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::Context;
use serde::Serialize;

use crate::cam::types::EgressRecord;
use crate::timeq::Cycle;

#[derive(Debug, Serialize)]
pub struct EgressLine<'a> {
    pub cycle: Cycle,
    pub partition: u32,
    #[serde(flatten)]
    pub record: &'a EgressRecord,
}

/// JSON-lines writer for the egress stream of every partition.
pub struct EgressLog {
    writer: BufWriter<File>,
    lines: u64,
}

impl EgressLog {
    pub fn create(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("cannot create egress directory {}", parent.display()))?;
        }
        let file = File::create(path)
            .with_context(|| format!("cannot create egress log {}", path.display()))?;
        Ok(Self {
            writer: BufWriter::new(file),
            lines: 0,
        })
    }

    pub fn write(&mut self, cycle: Cycle, partition: u32, record: &EgressRecord) -> anyhow::Result<()> {
        let line = EgressLine { cycle, partition, record };
        let payload = serde_json::to_string(&line)?;
        writeln!(self.writer, "{payload}")?;
        self.lines += 1;
        Ok(())
    }

    pub fn lines(&self) -> u64 {
        self.lines
    }

    pub fn flush(&mut self) -> anyhow::Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

impl Drop for EgressLog {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_carry_cycle_partition_and_kind() {
        let record = EgressRecord::Match { key: 3, addr: 7, payload: 0x10, last: true };
        let line = EgressLine { cycle: 42, partition: 1, record: &record };
        let value: serde_json::Value = serde_json::to_value(&line).unwrap();
        assert_eq!(value["cycle"], 42);
        assert_eq!(value["partition"], 1);
        assert_eq!(value["kind"], "match");
        assert_eq!(value["addr"], 7);
        assert_eq!(value["last"], true);
    }

    #[test]
    fn writes_one_line_per_record() {
        let path = std::env::temp_dir().join(format!("ringcam_egress_{}.jsonl", std::process::id()));
        {
            let mut log = EgressLog::create(&path).unwrap();
            log.write(1, 0, &EgressRecord::Header { key: 1, count: 0, last: true }).unwrap();
            log.write(2, 0, &EgressRecord::Header { key: 2, count: 0, last: true }).unwrap();
            assert_eq!(log.lines(), 2);
        }
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.lines().next().unwrap().contains("\"kind\":\"header\""));
        let _ = std::fs::remove_file(&path);
    }
}
