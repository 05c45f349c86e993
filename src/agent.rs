//! Agents and ports: the node layer of the interaction net.
//!
//! An agent is a fixed- or variable-arity node with one principal port
//! (index 0) and zero or more auxiliary ports. Fans and erasers are
//! fixed-arity; replicators carry a level and one signed level-delta per
//! auxiliary port; `Var` agents are single-port interface wires to the
//! outside of the net.
//!
//! The kinds form a small closed set, so agents are flat records tagged with
//! [`AgentKind`] rather than a trait hierarchy. The only variable-size
//! payload is the replicator's delta vector.
//!
//! # Citations
//! - Agents, principal ports, active pairs: Lafont, "Interaction Nets" (1990)
//! - The replicator agent family with per-port level deltas: Salvadori,
//!   "Delta-Nets: interaction-based optimal parallel λ-reduction" (2024)

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::wire::Wire;

/// Shared handle to an agent. Wires and the registry co-own agents through
/// these; the agent itself never owns another agent.
pub type AgentRef = Arc<Agent>;

/// Unique agent identifier.
///
/// Monotonically assigned by the network and never reused, so an id observed
/// in a trace event stays meaningful after the agent dies.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AgentId(u64);

impl AgentId {
    pub(crate) const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw `u64` value.
    #[inline]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Kind of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentKind {
    /// Three-port agent used for both abstraction and application.
    Fan,
    /// Single-port agent that consumes whatever its principal meets.
    Eraser,
    /// Variable-arity sharing agent with a level and per-port deltas.
    Replicator,
    /// Single-port interface node; never part of an active pair.
    Var,
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AgentKind::Fan => "Fan",
            AgentKind::Eraser => "Eraser",
            AgentKind::Replicator => "Replicator",
            AgentKind::Var => "Var",
        };
        f.write_str(name)
    }
}

/// A connection point on an agent.
///
/// The slot holds the port's current wire, if any. Reads clone the `Arc`
/// under a short critical section; topology edits re-verify the slot under
/// the wire's own endpoint lock, so a stale read is always detected by the
/// editor (see `rewrite::splice`).
#[derive(Debug)]
pub struct Port {
    index: usize,
    slot: Mutex<Option<Arc<Wire>>>,
}

impl Port {
    fn new(index: usize) -> Self {
        Self {
            index,
            slot: Mutex::new(None),
        }
    }

    /// Index of this port on its agent. Index 0 is the principal port for
    /// every kind except `Var`, whose single port is the interface.
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Returns the wire currently attached to this port.
    pub fn wire(&self) -> Option<Arc<Wire>> {
        self.slot.lock().clone()
    }

    /// True if the slot currently holds exactly `wire`.
    pub(crate) fn holds(&self, wire: &Arc<Wire>) -> bool {
        match &*self.slot.lock() {
            Some(current) => Arc::ptr_eq(current, wire),
            None => false,
        }
    }

    pub(crate) fn set_wire(&self, wire: Arc<Wire>) {
        *self.slot.lock() = Some(wire);
    }

    pub(crate) fn clear_wire(&self) {
        *self.slot.lock() = None;
    }

    /// Moves the slot content out, for fan rotation.
    pub(crate) fn take_wire(&self) -> Option<Arc<Wire>> {
        self.slot.lock().take()
    }
}

/// An agent in the net.
///
/// Kind-specific payload is stored flat: `level`/`deltas` are meaningful for
/// replicators only, `name` for `Var` agents only. The dead flag doubles as
/// the exclusive claim used by the rewrite engine: whichever thread wins the
/// compare-and-swap owns the agent's topology until it is discarded.
#[derive(Debug)]
pub struct Agent {
    id: AgentId,
    kind: AgentKind,
    level: i64,
    deltas: Vec<i64>,
    name: Option<String>,
    ports: Vec<Port>,
    dead: AtomicBool,
}

impl Agent {
    pub(crate) fn new(
        id: AgentId,
        kind: AgentKind,
        level: i64,
        deltas: Vec<i64>,
        name: Option<String>,
    ) -> Self {
        let port_count = match kind {
            AgentKind::Fan => 3,
            AgentKind::Eraser | AgentKind::Var => 1,
            AgentKind::Replicator => 1 + deltas.len(),
        };
        Self {
            id,
            kind,
            level,
            deltas,
            name,
            ports: (0..port_count).map(Port::new).collect(),
            dead: AtomicBool::new(false),
        }
    }

    #[inline]
    pub fn id(&self) -> AgentId {
        self.id
    }

    #[inline]
    pub fn kind(&self) -> AgentKind {
        self.kind
    }

    /// Replicator level; 0 for every other kind.
    #[inline]
    pub fn level(&self) -> i64 {
        self.level
    }

    /// One signed delta per auxiliary port; empty for non-replicators.
    #[inline]
    pub fn deltas(&self) -> &[i64] {
        &self.deltas
    }

    /// Label of a named `Var` agent.
    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[inline]
    pub fn ports(&self) -> &[Port] {
        &self.ports
    }

    #[inline]
    pub fn port(&self, index: usize) -> &Port {
        &self.ports[index]
    }

    /// Number of auxiliary ports.
    #[inline]
    pub fn aux_arity(&self) -> usize {
        self.ports.len() - 1
    }

    /// True for every kind whose port 0 is a principal port. `Var` agents
    /// are interface wires and never form active pairs.
    #[inline]
    pub(crate) fn is_active(&self) -> bool {
        self.kind != AgentKind::Var
    }

    #[inline]
    pub fn is_dead(&self) -> bool {
        self.dead.load(Ordering::Acquire)
    }

    /// Attempts to claim the agent exclusively. Returns `false` if another
    /// rewrite already owns it (or it is already discarded).
    pub(crate) fn claim(&self) -> bool {
        self.dead
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Rolls a failed claim back (second-agent claim lost, or the pair was
    /// an unknown combination and both agents are restored).
    pub(crate) fn revive(&self) {
        self.dead.store(false, Ordering::Release);
    }

    /// Marks the agent dead without contention semantics; used when the
    /// translator abandons a displaced helper agent.
    pub(crate) fn discard(&self) {
        self.dead.store(true, Ordering::Release);
    }
}

impl fmt::Display for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            AgentKind::Replicator => write!(
                f,
                "{}{}[lvl {} deltas {:?}]",
                self.kind, self.id, self.level, self.deltas
            ),
            _ => write!(f, "{}{}", self.kind, self.id),
        }
    }
}
