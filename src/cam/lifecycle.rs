use std::sync::Arc;

use log::{info, warn};
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use phf::phf_map;
use serde::Serialize;

use crate::base::behavior::*;
use crate::base::module::{module, IsModule, ModuleBase};
use crate::cam::config::StoreConfig;
use crate::timeq::Cycle;

/// Phase codes understood on the lifecycle input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
pub enum PhaseCode {
    Idle = 0,
    Prepare = 1,
    Sync = 2,
    Running = 3,
    Terminating = 4,
    LinkTest = 5,
    SyncTest = 6,
    Reset = 7,
    OutOfService = 8,
}

pub static PHASE_NAMES: phf::Map<&'static str, u32> = phf_map! {
    "idle" => 0,
    "prepare" => 1,
    "sync" => 2,
    "running" => 3,
    "terminating" => 4,
    "link_test" => 5,
    "sync_test" => 6,
    "reset" => 7,
    "out_of_service" => 8,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    #[default]
    Idle,
    Prepare,
    Sync,
    Running,
    Terminating,
    LinkTest,
    SyncTest,
    ResetPhase,
    OutOfService,
    Error,
}

impl From<PhaseCode> for LifecycleState {
    fn from(code: PhaseCode) -> Self {
        match code {
            PhaseCode::Idle => LifecycleState::Idle,
            PhaseCode::Prepare => LifecycleState::Prepare,
            PhaseCode::Sync => LifecycleState::Sync,
            PhaseCode::Running => LifecycleState::Running,
            PhaseCode::Terminating => LifecycleState::Terminating,
            PhaseCode::LinkTest => LifecycleState::LinkTest,
            PhaseCode::SyncTest => LifecycleState::SyncTest,
            PhaseCode::Reset => LifecycleState::ResetPhase,
            PhaseCode::OutOfService => LifecycleState::OutOfService,
        }
    }
}

impl LifecycleState {
    /// Value reported by the PHASE status register; ERROR reads as 0xF.
    pub fn code(&self) -> u32 {
        match self {
            LifecycleState::Idle => 0,
            LifecycleState::Prepare => 1,
            LifecycleState::Sync => 2,
            LifecycleState::Running => 3,
            LifecycleState::Terminating => 4,
            LifecycleState::LinkTest => 5,
            LifecycleState::SyncTest => 6,
            LifecycleState::ResetPhase => 7,
            LifecycleState::OutOfService => 8,
            LifecycleState::Error => 0xF,
        }
    }
}

/// Core status sampled by the controller to decide whether a phase may be acknowledged.
#[derive(Debug, Clone, Copy, Default)]
pub struct LifecycleStatus {
    pub ingress_empty: bool,
    pub pop_queue_empty: bool,
    pub pop_idle: bool,
    pub push_idle: bool,
    /// Pulse: the pop engine finished a flush on the previous step.
    pub flush_done: bool,
    /// Start time of the next window the key generator will issue; `None` when generation is
    /// disabled.
    pub next_window_start: Option<Cycle>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LifecycleOutput {
    /// One-step acknowledge of the current phase.
    pub ack: bool,
    /// Start a store flush (once per PREPARE entry).
    pub request_flush: bool,
    /// Entered a phase that realigns the key generator.
    pub align_keygen: bool,
}

#[derive(Debug, Default)]
pub struct LifecycleRegs {
    pub state: LifecycleState,
    /// Last code acted on; a different input code is a transition request.
    last_code: Option<u32>,
    acked: bool,
    flush_requested: bool,
    flush_complete: bool,
    cutoff: Option<Cycle>,
}

/// Phase state machine driven by an external phase code.  Gates intake and pop generation and
/// orchestrates the flush between runs.
pub struct LifecycleController {
    base: ModuleBase<LifecycleRegs, StoreConfig>,
}

module!(LifecycleController, LifecycleRegs, StoreConfig,);

impl ModuleBehaviors for LifecycleController {
    fn tick_one(&mut self) {
        self.base.cycle += 1;
    }

    fn reset(&mut self) {
        self.base.state = LifecycleRegs::default();
    }
}

impl LifecycleController {
    pub fn new(config: Arc<StoreConfig>) -> Self {
        let mut me = LifecycleController {
            base: ModuleBase::default(),
        };
        me.init_conf(config);
        me
    }

    pub fn state(&self) -> LifecycleState {
        self.base.state.state
    }

    pub fn cutoff(&self) -> Option<Cycle> {
        self.base.state.cutoff
    }

    pub fn is_error(&self) -> bool {
        self.base.state.state == LifecycleState::Error
    }

    pub fn intake_open(&self) -> bool {
        matches!(self.base.state.state, LifecycleState::Running | LifecycleState::Terminating)
    }

    /// Whether the key generator may issue window `start`.
    pub fn generation_open(&self, window_start: Cycle) -> bool {
        match self.base.state.state {
            LifecycleState::Running => true,
            LifecycleState::Terminating => self.base.state.cutoff.is_some_and(|c| window_start <= c),
            _ => false,
        }
    }

    pub fn step(&mut self, now: Cycle, code: Option<u32>, status: &LifecycleStatus) -> LifecycleOutput {
        let mut out = LifecycleOutput::default();
        if let Some(code) = code {
            if self.base.state.last_code != Some(code) {
                let first = self.base.state.last_code.replace(code).is_none();
                self.transition(now, code, first, &mut out);
            }
        }

        let regs = &mut self.base.state;
        // nothing to acknowledge before the first code
        if regs.last_code.is_none() {
            return out;
        }
        if regs.state == LifecycleState::Prepare && regs.flush_requested && status.flush_done {
            regs.flush_complete = true;
        }
        if !regs.acked && Self::precondition(regs, status) {
            regs.acked = true;
            out.ack = true;
            info!("lifecycle: {:?} acknowledged at {}", regs.state, now);
        }
        out
    }

    /// `first` marks the first code seen since reset; it is acknowledged even when it names the
    /// reset state.
    fn transition(&mut self, now: Cycle, code: u32, first: bool, out: &mut LifecycleOutput) {
        let regs = &mut self.base.state;
        let prev = regs.state;
        let next = match PhaseCode::from_u32(code) {
            // only an explicit IDLE leaves ERROR
            Some(PhaseCode::Idle) => LifecycleState::Idle,
            Some(_) if prev == LifecycleState::Error => return,
            Some(code) => LifecycleState::from(code),
            None => {
                warn!("lifecycle: unknown phase code {:#x} at {}", code, now);
                LifecycleState::Error
            }
        };
        if next == prev && !first {
            return;
        }
        info!("lifecycle: {:?} -> {:?} at {}", prev, next, now);
        regs.state = next;
        regs.acked = false;
        regs.flush_requested = false;
        regs.flush_complete = false;
        regs.cutoff = None;
        match next {
            LifecycleState::Prepare => {
                regs.flush_requested = true;
                out.request_flush = true;
            }
            LifecycleState::Sync => out.align_keygen = true,
            LifecycleState::Running if prev != LifecycleState::Sync => out.align_keygen = true,
            LifecycleState::Terminating => regs.cutoff = Some(now),
            _ => {}
        }
    }

    fn precondition(regs: &LifecycleRegs, status: &LifecycleStatus) -> bool {
        match regs.state {
            LifecycleState::Error => false,
            LifecycleState::Prepare => {
                regs.flush_complete
                    && status.ingress_empty
                    && status.pop_queue_empty
                    && status.pop_idle
                    && status.push_idle
            }
            LifecycleState::Terminating => {
                let cutoff = regs.cutoff.expect("terminating without a cutoff");
                status.next_window_start.map_or(true, |start| start > cutoff)
                    && status.pop_queue_empty
                    && status.pop_idle
            }
            _ => true,
        }
    }
}
