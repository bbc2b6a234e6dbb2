use std::sync::Arc;

use log::{info, warn};

use crate::base::behavior::*;
use crate::cam::config::{KeygenConfig, StoreConfig};
use crate::cam::core::RingCamCore;
use crate::cam::lifecycle::PhaseCode;
use crate::cam::types::{IngressRecord, IngressReject, IngressRejectReason};
use crate::sim::config::SimConfig;
use crate::sim::egress::EgressLog;
use crate::sim::log::Logger;
use crate::sim::summary::{aggregate_summaries, write_summary, CoreSummary, RunSummary};
use crate::timeq::Cycle;
use crate::traffic::config::TrafficConfig;
use crate::traffic::driver::TrafficDriver;

/// Top level: one store instance per partition, a shared ingress stream, a phase script and the
/// egress log.
pub struct Sim {
    config: SimConfig,
    cores: Vec<RingCamCore>,
    traffic: TrafficDriver,
    /// Phase script as (step, code), sorted by step.
    phases: Vec<(Cycle, u32)>,
    next_phase: usize,
    egress: Option<EgressLog>,
    logger: Arc<Logger>,
    cycle: Cycle,
}

impl Sim {
    pub fn new(
        config: SimConfig,
        store_config: StoreConfig,
        keygen_config: KeygenConfig,
        traffic_config: TrafficConfig,
    ) -> anyhow::Result<Sim> {
        if config.num_partitions == 0 {
            anyhow::bail!("num_partitions must be > 0");
        }
        store_config.ensure_valid();
        if store_config.flush_steps() >= config.timeout {
            warn!(
                "sim: one flush takes {} steps, timeout is {}",
                store_config.flush_steps(),
                config.timeout
            );
        }
        let logger = Arc::new(Logger::new(config.log_level));

        let cores = (0..config.num_partitions)
            .map(|partition| {
                let store = Arc::new(StoreConfig { partition: partition as u32, ..store_config });
                let tagged = Arc::new(logger.tagged(format!("core{}", partition)));
                RingCamCore::new(store, keygen_config, tagged)
            })
            .collect();

        let mut phases = config
            .phases
            .iter()
            .map(|event| Ok((event.at, event.resolve()?)))
            .collect::<anyhow::Result<Vec<_>>>()?;
        if phases.is_empty() {
            // no script: straight to RUNNING
            phases.push((0, PhaseCode::Running as u32));
        }
        phases.sort_by_key(|(at, _)| *at);

        let traffic = TrafficDriver::new(&traffic_config, config.num_partitions, store_config.key_mask())?;
        let egress = config.egress_path.as_deref().map(EgressLog::create).transpose()?;

        info!(
            "sim: {} partitions x {} slots, {} phase events",
            config.num_partitions,
            store_config.capacity,
            phases.len()
        );
        Ok(Sim {
            config,
            cores,
            traffic,
            phases,
            next_phase: 0,
            egress,
            logger,
            cycle: 0,
        })
    }

    pub fn cores(&self) -> &[RingCamCore] {
        &self.cores
    }

    pub fn cores_mut(&mut self) -> &mut [RingCamCore] {
        &mut self.cores
    }

    pub fn cycle(&self) -> Cycle {
        self.cycle
    }

    /// Traffic exhausted and the phase script played out.
    pub fn finished(&self) -> bool {
        self.traffic.is_done() && self.next_phase >= self.phases.len()
    }

    /// Run to completion, then `drain_cycles` more steps so outstanding pops can finish.
    pub fn simulate(&mut self) -> anyhow::Result<RunSummary> {
        let mut timed_out = true;
        while self.cycle < self.config.timeout {
            if self.finished() {
                timed_out = false;
                break;
            }
            self.step()?;
        }
        if timed_out {
            warn!("sim: timeout after {} steps", self.cycle);
        } else {
            let drain_end = self.cycle.saturating_add(self.config.drain_cycles).min(self.config.timeout);
            while self.cycle < drain_end {
                self.step()?;
            }
        }

        let summary = self.summary(timed_out);
        if let Some(egress) = self.egress.as_mut() {
            egress.flush()?;
        }
        if let Some(path) = &self.config.summary_path {
            write_summary(path, &summary)?;
        }
        crate::info!(self.logger, "simulation done after {} steps", self.cycle);
        Ok(summary)
    }

    pub fn summary(&self, timed_out: bool) -> RunSummary {
        let per_core: Vec<CoreSummary> = self
            .cores
            .iter()
            .enumerate()
            .map(|(partition, core)| CoreSummary::of(partition as u32, core))
            .collect();
        RunSummary {
            cycles: self.cycle,
            timed_out,
            egress_lines: self.egress.as_ref().map_or(0, EgressLog::lines),
            traffic: self.traffic.stats(),
            total: aggregate_summaries(&per_core),
            per_core,
        }
    }

    /// One step of the whole system; egress I/O errors end the run.
    pub fn step(&mut self) -> anyhow::Result<()> {
        let now = self.cycle;
        while let Some(&(at, code)) = self.phases.get(self.next_phase) {
            if at > now {
                break;
            }
            crate::info!(self.logger, "@{} phase input {:#x}", now, code);
            self.cores.iter_mut().for_each(|core| core.drive_phase(code));
            self.next_phase += 1;
        }

        self.tick_one();

        // offered after the step so the record sees this step's phase
        if let Some(record) = self.traffic.tick(now) {
            let outcome = Self::offer(&mut self.cores, record);
            self.traffic.resolve(now, outcome);
        }

        for (partition, core) in self.cores.iter_mut().enumerate() {
            for record in core.drain_egress() {
                crate::debug!(self.logger, "@{} core{} {}", now, partition, record);
                if let Some(egress) = self.egress.as_mut() {
                    egress.write(now, partition as u32, &record)?;
                }
            }
        }
        Ok(())
    }

    /// Every instance sees the record; at most one owns its selector.
    fn offer(cores: &mut [RingCamCore], record: IngressRecord) -> Result<(), Option<IngressReject>> {
        let mut owner_reject = None;
        for core in cores.iter_mut() {
            match core.offer_ingress(record) {
                Ok(()) => return Ok(()),
                Err(reject) if reject.reason == IngressRejectReason::ForeignPartition => {}
                Err(reject) => owner_reject = Some(reject),
            }
        }
        Err(owner_reject)
    }
}

impl ModuleBehaviors for Sim {
    fn tick_one(&mut self) {
        self.cores.iter_mut().for_each(RingCamCore::tick_one);
        self.cycle += 1;
    }

    fn reset(&mut self) {
        self.cores.iter_mut().for_each(RingCamCore::reset);
        self.next_phase = 0;
        self.cycle = 0;
    }
}
