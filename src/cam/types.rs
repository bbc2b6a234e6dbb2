use std::fmt::{Display, Formatter};

use serde::Serialize;

pub type Key = u64;
pub type Payload = u64;

/// Side table contents of one slot.  The key is kept alongside the payload so that an eviction
/// can recover the previous occupant's key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SideEntry {
    pub occupied: bool,
    pub key: Key,
    pub payload: Payload,
}

impl SideEntry {
    pub fn new(key: Key, payload: Payload) -> Self {
        Self { occupied: true, key, payload }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngressRecord {
    pub selector: u32,
    pub key: Key,
    pub payload: Payload,
}

impl IngressRecord {
    pub fn new(selector: u32, key: Key, payload: Payload) -> Self {
        Self { selector, key, payload }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngressRejectReason {
    /// Selector names another partition; the record is not ours.
    ForeignPartition,
    /// Halted, in error, or the lifecycle phase does not take records.
    Closed,
    QueueFull,
}

#[derive(Debug, Clone, Copy)]
pub struct IngressReject {
    pub reason: IngressRejectReason,
    pub record: IngressRecord,
}

impl IngressReject {
    pub fn new(record: IngressRecord, reason: IngressRejectReason) -> Self {
        Self { reason, record }
    }
}

/// One pop request.  `window` is set when the request came from the periodic key generator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PopRequest {
    pub key: Key,
    pub window: Option<u64>,
}

impl PopRequest {
    pub fn for_key(key: Key) -> Self {
        Self { key, window: None }
    }
}

/// Output stream of the pop engine: per request a header, then `count` matches.  `last` marks the
/// end of the group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EgressRecord {
    Header {
        key: Key,
        count: usize,
        last: bool,
    },
    Match {
        key: Key,
        addr: usize,
        payload: Payload,
        last: bool,
    },
}

impl EgressRecord {
    pub fn is_last(&self) -> bool {
        match self {
            EgressRecord::Header { last, .. } => *last,
            EgressRecord::Match { last, .. } => *last,
        }
    }

    pub fn key(&self) -> Key {
        match self {
            EgressRecord::Header { key, .. } => *key,
            EgressRecord::Match { key, .. } => *key,
        }
    }
}

impl Display for EgressRecord {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            EgressRecord::Header { key, count, last } => {
                write!(f, "header[key: {:#x}, count: {}{}]", key, count, if *last { ", last" } else { "" })
            }
            EgressRecord::Match { key, addr, payload, last } => write!(
                f,
                "match[key: {:#x}, addr: {}, payload: {:#x}{}]",
                key,
                addr,
                payload,
                if *last { ", last" } else { "" }
            ),
        }
    }
}

/// A complete result group, reassembled from the egress stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultGroup {
    pub key: Key,
    pub count: usize,
    pub matches: Vec<(usize, Payload)>,
}

impl ResultGroup {
    pub fn addrs(&self) -> Vec<usize> {
        self.matches.iter().map(|(addr, _)| *addr).collect()
    }
}

/// Reassemble egress records into groups, dropping a trailing incomplete group.
pub fn collect_groups<'a>(records: impl IntoIterator<Item = &'a EgressRecord>) -> Vec<ResultGroup> {
    let mut groups = Vec::new();
    let mut open: Option<ResultGroup> = None;
    for record in records {
        match *record {
            EgressRecord::Header { key, count, last } => {
                assert!(open.is_none(), "header inside an open group");
                let group = ResultGroup { key, count, matches: Vec::with_capacity(count) };
                if last {
                    groups.push(group);
                } else {
                    open = Some(group);
                }
            }
            EgressRecord::Match { key, addr, payload, last } => {
                let group = open.as_mut().expect("match record outside a group");
                assert_eq!(group.key, key, "match key differs from its header");
                group.matches.push((addr, payload));
                if last {
                    groups.extend(open.take());
                }
            }
        }
    }
    groups
}
