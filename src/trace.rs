//! Interaction trace: a bounded log of rule applications.
//!
//! When enabled, every dispatched interaction appends one [`TraceEvent`]
//! until the fixed capacity is reached; later events are dropped rather
//! than evicting earlier ones, since the interesting part of a runaway
//! reduction is its beginning. Snapshots can be exported to CBOR for
//! offline inspection.

use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::agent::{Agent, AgentId, AgentKind};

/// The rewrite rule an event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuleKind {
    FanAnnihilation,
    RepAnnihilation,
    RepCommutation,
    FanRepCommutation,
    Erasure,
    RepDecay,
    RepMerge,
    AuxFanReplication,
    /// Active pair no rule covers; both agents were revived.
    Unknown,
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RuleKind::FanAnnihilation => "fan-annihilation",
            RuleKind::RepAnnihilation => "rep-annihilation",
            RuleKind::RepCommutation => "rep-commutation",
            RuleKind::FanRepCommutation => "fan-rep-commutation",
            RuleKind::Erasure => "erasure",
            RuleKind::RepDecay => "rep-decay",
            RuleKind::RepMerge => "rep-merge",
            RuleKind::AuxFanReplication => "aux-fan-replication",
            RuleKind::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// One recorded interaction. Decay has no right-hand agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEvent {
    pub step: u64,
    pub rule: RuleKind,
    pub left_kind: AgentKind,
    pub left_id: AgentId,
    pub right_kind: Option<AgentKind>,
    pub right_id: Option<AgentId>,
}

/// Error raised by trace snapshot export/import.
#[derive(Debug)]
pub enum TraceExportError {
    /// CBOR encode/decode failure.
    Codec(serde_cbor::Error),
    /// Filesystem failure.
    Io(std::io::Error),
}

impl fmt::Display for TraceExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceExportError::Codec(e) => write!(f, "trace codec error: {}", e),
            TraceExportError::Io(e) => write!(f, "trace io error: {}", e),
        }
    }
}

impl std::error::Error for TraceExportError {}

/// An exported run of trace events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceSnapshot {
    pub events: Vec<TraceEvent>,
}

impl TraceSnapshot {
    pub fn to_cbor(&self) -> Result<Vec<u8>, TraceExportError> {
        serde_cbor::to_vec(self).map_err(TraceExportError::Codec)
    }

    pub fn from_cbor(bytes: &[u8]) -> Result<Self, TraceExportError> {
        serde_cbor::from_slice(bytes).map_err(TraceExportError::Codec)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<(), TraceExportError> {
        let bytes = self.to_cbor()?;
        std::fs::write(path, bytes).map_err(TraceExportError::Io)
    }

    pub fn load_from_file(path: &Path) -> Result<Self, TraceExportError> {
        let bytes = std::fs::read(path).map_err(TraceExportError::Io)?;
        Self::from_cbor(&bytes)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[derive(Debug, Default)]
struct TraceBuf {
    events: Vec<TraceEvent>,
    capacity: usize,
    next_step: u64,
}

/// Bounded, thread-safe trace log. Disabled (and free) by default.
#[derive(Debug, Default)]
pub(crate) struct TraceLog {
    buf: Mutex<TraceBuf>,
    enabled: AtomicBool,
}

impl TraceLog {
    /// Enables recording into a fresh buffer of at least one slot.
    pub fn enable(&self, capacity: usize) {
        let capacity = capacity.max(1);
        let mut buf = self.buf.lock();
        buf.events = Vec::with_capacity(capacity);
        buf.capacity = capacity;
        buf.next_step = 0;
        self.enabled.store(true, Ordering::Release);
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Release);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Records one interaction if tracing is on and capacity remains.
    pub fn record(&self, rule: RuleKind, left: &Agent, right: Option<&Agent>) {
        if !self.is_enabled() {
            return;
        }
        let mut buf = self.buf.lock();
        let step = buf.next_step;
        buf.next_step += 1;
        if buf.events.len() >= buf.capacity {
            return;
        }
        let event = TraceEvent {
            step,
            rule,
            left_kind: left.kind(),
            left_id: left.id(),
            right_kind: right.map(|a| a.kind()),
            right_id: right.map(|a| a.id()),
        };
        buf.events.push(event);
    }

    /// Copies the recorded events. Empty when tracing is disabled.
    pub fn snapshot(&self) -> TraceSnapshot {
        if !self.is_enabled() {
            return TraceSnapshot { events: Vec::new() };
        }
        TraceSnapshot {
            events: self.buf.lock().events.clone(),
        }
    }
}
