pub mod arbiter;
pub mod bitset;
pub mod config;
pub mod core;
pub mod keygen;
pub mod lifecycle;
pub mod pop;
pub mod push;
pub mod regs;
pub mod resolver;
pub mod side_table;
pub mod stats;
pub mod store;
pub mod types;

#[cfg(test)]
mod unit_tests;

pub use arbiter::{AccessArbiter, AccessRequests, ArbiterStats, EraseRequest, Grant, WriteRequest};
pub use config::{KeygenConfig, StoreConfig};
pub use core::RingCamCore;
pub use lifecycle::{LifecycleState, PhaseCode};
pub use regs::Reg;
pub use stats::CoreStats;
pub use types::{
    collect_groups, EgressRecord, IngressRecord, IngressReject, IngressRejectReason, Key, Payload,
    PopRequest, ResultGroup,
};
