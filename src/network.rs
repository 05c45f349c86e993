//! The network: agent arena, scheduler, worker pool, and reduction drivers.
//!
//! A [`Network`] owns everything a reduction needs: the agent registry, the
//! priority scheduler, the statistics counters, and the trace log. Multiple
//! networks may coexist in a process; they share no agents.
//!
//! Concurrency model: a pool of native worker threads drains the scheduler,
//! but a single reduction mutex gates each rewrite step, so exactly one
//! rewrite executes at a time. Together with the scheduler's serialised
//! dequeue this enforces strict leftmost-outermost order across any number
//! of workers. The pending-work counter (one increment per scheduled pair,
//! one decrement per handled pop) is what `reduce_all` blocks on.
//!
//! # Citations
//! - Two-phase normalisation and canonical rules: Salvadori, "Delta-Nets:
//!   interaction-based optimal parallel λ-reduction" (2024)

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::{Condvar, Mutex};
use tracing::debug;

use crate::agent::{Agent, AgentId, AgentKind, AgentRef};
use crate::registry::AgentRegistry;
use crate::scheduler::Scheduler;
use crate::stats::{StatCounters, Stats};
use crate::trace::{TraceLog, TraceSnapshot};
use crate::wire::{PortRef, Wire};

/// Dead agents are swept from the registry every this many rewrites under
/// the bounded driver, keeping non-normalising reductions at constant size.
const GC_INTERVAL: u64 = 10;

/// Waitgroup over scheduled-but-unfinished active pairs.
#[derive(Debug, Default)]
struct PendingWork {
    count: Mutex<u64>,
    idle: Condvar,
}

impl PendingWork {
    fn add(&self) {
        *self.count.lock() += 1;
    }

    fn done(&self) {
        let mut count = self.count.lock();
        *count -= 1;
        if *count == 0 {
            self.idle.notify_all();
        }
    }

    fn wait_idle(&self) {
        let mut count = self.count.lock();
        while *count > 0 {
            self.idle.wait(&mut count);
        }
    }
}

#[derive(Debug, Default)]
struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
    started: bool,
}

/// Shared state behind a [`Network`]; workers hold a handle each.
pub(crate) struct NetInner {
    next_id: AtomicU64,
    pub(crate) registry: AgentRegistry,
    pub(crate) scheduler: Scheduler,
    pub(crate) counters: StatCounters,
    pub(crate) trace: TraceLog,
    pending: PendingWork,
    pub(crate) reduction_lock: Mutex<()>,
    phase: AtomicU8,
    worker_target: AtomicUsize,
    pool: Mutex<WorkerPool>,
}

impl NetInner {
    pub(crate) fn phase_value(&self) -> u8 {
        self.phase.load(Ordering::Acquire)
    }

    /// Allocates an agent and registers it.
    pub(crate) fn alloc(
        &self,
        kind: AgentKind,
        level: i64,
        deltas: Vec<i64>,
        name: Option<String>,
    ) -> AgentRef {
        let id = AgentId::new(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let agent = Arc::new(Agent::new(id, kind, level, deltas, name));
        self.registry.insert(Arc::clone(&agent));
        agent
    }

    pub(crate) fn alloc_fan(&self) -> AgentRef {
        self.alloc(AgentKind::Fan, 0, Vec::new(), None)
    }

    pub(crate) fn alloc_eraser(&self) -> AgentRef {
        self.alloc(AgentKind::Eraser, 0, Vec::new(), None)
    }

    pub(crate) fn alloc_replicator(&self, level: i64, deltas: Vec<i64>) -> AgentRef {
        self.alloc(AgentKind::Replicator, level, deltas, None)
    }

    /// Schedules an active pair. Callers must have verified the pair.
    pub(crate) fn push_pair(&self, wire: &Arc<Wire>) {
        self.pending.add();
        self.scheduler.push(Arc::clone(wire), wire.depth());
    }

    pub(crate) fn pending_done(&self) {
        self.pending.done();
    }

    /// The neighbour of `(agent, port)`, if the port is wired.
    pub(crate) fn link_of(&self, agent: &AgentRef, port: usize) -> Option<(AgentRef, usize)> {
        let wire = agent.port(port).wire()?;
        let ends = wire.lock_ends();
        let me = PortRef::of(agent, port);
        let other = Wire::other_of(&ends, &me)?;
        Some((other.agent, other.index))
    }

    /// Settles all queued pairs: with a running pool the workers drain them
    /// and we wait; without one the calling thread pops and rewrites until
    /// the scheduler is empty. Keeping a started pool as the only popper
    /// preserves a deterministic rewrite order for single-worker runs.
    pub(crate) fn drain(&self) {
        if !self.pool.lock().started {
            while let Some(wire) = self.scheduler.try_pop() {
                {
                    let _guard = self.reduction_lock.lock();
                    self.reduce_pair(&wire);
                }
                self.pending.done();
            }
        }
        self.pending.wait_idle();
    }
}

fn worker_loop(inner: Arc<NetInner>) {
    while let Some(wire) = inner.scheduler.pop() {
        {
            let _guard = inner.reduction_lock.lock();
            inner.reduce_pair(&wire);
        }
        inner.pending_done();
    }
}

/// A violation of the net's structural invariants, found by
/// [`Network::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    /// A port's wire does not list that port among its endpoints.
    EndpointMismatch { agent: AgentId, port: usize },
    /// A wire's far endpoint does not point back at the wire.
    DanglingWire { agent: AgentId, port: usize },
    /// A dead agent still holds a wire.
    DeadAgentWired { agent: AgentId, port: usize },
    /// A replicator whose port count disagrees with its delta vector.
    ReplicatorArity { agent: AgentId },
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvariantViolation::EndpointMismatch { agent, port } => {
                write!(f, "wire at {}:{} does not list the port as an endpoint", agent, port)
            }
            InvariantViolation::DanglingWire { agent, port } => {
                write!(f, "far endpoint of wire at {}:{} does not point back", agent, port)
            }
            InvariantViolation::DeadAgentWired { agent, port } => {
                write!(f, "dead agent {} still wired at port {}", agent, port)
            }
            InvariantViolation::ReplicatorArity { agent } => {
                write!(f, "replicator {} port count disagrees with its deltas", agent)
            }
        }
    }
}

impl std::error::Error for InvariantViolation {}

/// An interaction net plus everything needed to reduce it.
pub struct Network {
    inner: Arc<NetInner>,
}

impl Default for Network {
    fn default() -> Self {
        Self::new()
    }
}

impl Network {
    pub fn new() -> Self {
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            inner: Arc::new(NetInner {
                next_id: AtomicU64::new(0),
                registry: AgentRegistry::new(),
                scheduler: Scheduler::new(),
                counters: StatCounters::default(),
                trace: TraceLog::default(),
                pending: PendingWork::default(),
                reduction_lock: Mutex::new(()),
                phase: AtomicU8::new(1),
                worker_target: AtomicUsize::new(workers),
                pool: Mutex::new(WorkerPool::default()),
            }),
        }
    }

    pub(crate) fn inner(&self) -> &NetInner {
        &self.inner
    }

    // ---- agent construction -------------------------------------------

    /// New fan agent: principal 0, auxiliaries 1 and 2.
    pub fn new_fan(&self) -> AgentRef {
        self.inner.alloc_fan()
    }

    /// New eraser agent: a single principal port.
    pub fn new_eraser(&self) -> AgentRef {
        self.inner.alloc_eraser()
    }

    /// New replicator with the given level and one delta per auxiliary port.
    pub fn new_replicator(&self, level: i64, deltas: Vec<i64>) -> AgentRef {
        self.inner.alloc_replicator(level, deltas)
    }

    /// New anonymous interface node.
    pub fn new_var(&self) -> AgentRef {
        self.inner.alloc(AgentKind::Var, 0, Vec::new(), None)
    }

    /// New named interface node; the name survives read-back as a free
    /// variable.
    pub fn new_named_var(&self, name: impl Into<String>) -> AgentRef {
        self.inner
            .alloc(AgentKind::Var, 0, Vec::new(), Some(name.into()))
    }

    // ---- wiring -------------------------------------------------------

    /// Joins two unwired ports at depth 0.
    pub fn link(&self, a: &AgentRef, port_a: usize, b: &AgentRef, port_b: usize) {
        self.link_at(a, port_a, b, port_b, 0);
    }

    /// Joins two unwired ports at the given depth. Linking an already-wired
    /// port without going through a rewrite is a programmer error.
    pub fn link_at(&self, a: &AgentRef, port_a: usize, b: &AgentRef, port_b: usize, depth: u64) {
        let pa = PortRef::of(a, port_a);
        let pb = PortRef::of(b, port_b);
        debug_assert!(
            pa.port().wire().is_none(),
            "link_at: port {}:{} is already wired",
            a.id(),
            port_a
        );
        debug_assert!(
            pb.port().wire().is_none(),
            "link_at: port {}:{} is already wired",
            b.id(),
            port_b
        );
        let wire = Wire::between(pa.clone(), pb.clone(), depth);
        pa.port().set_wire(Arc::clone(&wire));
        pb.port().set_wire(Arc::clone(&wire));
        if pa.is_principal() && pb.is_principal() {
            self.inner.push_pair(&wire);
        }
    }

    /// The agent and port on the far side of `(agent, port)`.
    pub fn get_link(&self, agent: &AgentRef, port: usize) -> Option<(AgentRef, usize)> {
        self.inner.link_of(agent, port)
    }

    /// True if the two ports are joined by one wire.
    pub fn is_connected(&self, a: &AgentRef, port_a: usize, b: &AgentRef, port_b: usize) -> bool {
        match self.get_link(a, port_a) {
            Some((far, far_port)) => far_port == port_b && Arc::ptr_eq(&far, b),
            None => false,
        }
    }

    // ---- reduction ----------------------------------------------------

    /// Reduces until no scheduled active pair remains. Blocks the caller;
    /// does not return for non-normalising nets, which need
    /// [`Network::reduce_with_limit`] instead.
    pub fn reduce_all(&self) {
        self.start_workers();
        self.inner.pending.wait_idle();
    }

    /// Performs at most `limit` rewrites on the calling thread and returns
    /// the number performed. Sweeps dead agents every few rewrites so a
    /// non-normalising net reduces in constant space. Never starts the
    /// worker pool; do not interleave with `reduce_all` on another thread.
    pub fn reduce_with_limit(&self, limit: u64) -> u64 {
        let mut performed = 0u64;
        while performed < limit {
            let Some(wire) = self.inner.scheduler.try_pop() else {
                break;
            };
            let reduced = {
                let _guard = self.inner.reduction_lock.lock();
                self.inner.reduce_pair(&wire)
            };
            self.inner.pending_done();
            if reduced {
                performed += 1;
                if performed % GC_INTERVAL == 0 {
                    self.collect_garbage();
                }
            }
        }
        performed
    }

    /// Full two-phase normalisation: phase 1 runs the core rules to
    /// quiescence interleaved with canonical passes, a fan rotation moves
    /// the net into phase 2 (auxiliary fan replication), and a final
    /// canonical fixpoint cleans up.
    pub fn reduce_to_normal_form(&self) {
        self.set_phase(1);
        loop {
            let before = self.inner.counters.total();
            self.reduce_all();
            let changed = self.apply_canonical_rules();
            if self.inner.counters.total() == before && !changed {
                break;
            }
        }

        self.set_phase(2);
        self.reduce_all();

        while self.apply_canonical_rules() {}
    }

    /// Current reduction phase (1 or 2).
    pub fn phase(&self) -> u8 {
        self.inner.phase_value()
    }

    /// Sets the phase. Entering phase 2 from phase 1 rotates every fan's
    /// ports `[0, 1, 2] → [1, 2, 0]`, which turns the phase-1 commutation
    /// table into auxiliary fan replication with no new rewrite code.
    pub fn set_phase(&self, phase: u8) {
        if phase == 2 && self.inner.phase_value() == 1 {
            self.inner.phase.store(2, Ordering::Release);
            self.rotate_all_fans();
        } else {
            self.inner.phase.store(phase, Ordering::Release);
        }
    }

    /// One canonical pass over the registry: replicator decay and merge.
    /// Returns true if either rule fired. The sweep holds the reduction
    /// mutex so no rewrite interleaves with it; any active pairs the rules
    /// spawn are drained before returning.
    pub fn apply_canonical_rules(&self) -> bool {
        let changed = {
            let _guard = self.inner.reduction_lock.lock();
            self.inner.canonical_sweep()
        };
        self.inner.drain();
        changed
    }

    /// Prunes everything unreachable from `(root, port)`: each unreachable
    /// agent has its connected ports spliced to fresh erasers and is marked
    /// dead. Idempotent.
    pub fn canonicalize(&self, root: &AgentRef, port: usize) {
        {
            let _guard = self.inner.reduction_lock.lock();
            self.inner.canonicalize_from(root, port);
        }
        self.inner.drain();
    }

    /// Sets the worker pool size (at least 1) for a pool that has not
    /// started yet; later calls are recorded but have no effect on running
    /// workers.
    pub fn set_workers(&self, workers: usize) {
        self.inner
            .worker_target
            .store(workers.max(1), Ordering::Release);
    }

    fn start_workers(&self) {
        let mut pool = self.inner.pool.lock();
        if pool.started {
            return;
        }
        pool.started = true;
        let count = self.inner.worker_target.load(Ordering::Acquire);
        debug!(workers = count, "starting worker pool");
        for index in 0..count {
            let inner = Arc::clone(&self.inner);
            let handle = std::thread::Builder::new()
                .name(format!("deltanet-worker-{index}"))
                .spawn(move || worker_loop(inner))
                .expect("spawn worker thread");
            pool.handles.push(handle);
        }
    }

    fn rotate_all_fans(&self) {
        // Rotation runs between phases; the reduction lock keeps any late
        // worker out of the dispatcher while indices move.
        let _guard = self.inner.reduction_lock.lock();
        for agent in self.inner.registry.snapshot() {
            if agent.kind() == AgentKind::Fan && !agent.is_dead() {
                self.rotate_fan(&agent);
            }
        }
    }

    /// Shifts the fan's principal to the former aux-1 position: the wire at
    /// old port 1 moves to port 0, old 2 to 1, old 0 to 2, and the endpoint
    /// indices recorded in the wires are renumbered to match.
    fn rotate_fan(&self, fan: &AgentRef) {
        const SOURCE: [usize; 3] = [1, 2, 0];

        let taken: Vec<Option<Arc<Wire>>> =
            (0..3).map(|index| fan.port(index).take_wire()).collect();

        for (new_index, &old_index) in SOURCE.iter().enumerate() {
            if let Some(wire) = &taken[old_index] {
                let mut ends = wire.lock_ends();
                for slot in ends.iter_mut() {
                    if let Some(end) = slot {
                        if Arc::ptr_eq(&end.agent, fan) && end.index == old_index {
                            end.index = new_index;
                            break;
                        }
                    }
                }
                drop(ends);
                fan.port(new_index).set_wire(Arc::clone(wire));
            }
        }

        if let Some(wire) = fan.port(0).wire() {
            let active = Wire::is_active_pair(&wire.lock_ends());
            if active {
                self.inner.push_pair(&wire);
            }
        }
    }

    // ---- introspection ------------------------------------------------

    /// Number of active pairs currently queued for reduction.
    pub fn queued_active_pairs(&self) -> usize {
        self.inner.scheduler.len()
    }

    /// Number of registered agents, dead entries included.
    pub fn node_count(&self) -> usize {
        self.inner.registry.len()
    }

    /// Number of registered agents not marked dead.
    pub fn active_node_count(&self) -> usize {
        self.inner.registry.active_count()
    }

    /// Removes dead agents from the registry; returns how many.
    pub fn collect_garbage(&self) -> usize {
        self.inner.registry.sweep_dead()
    }

    pub fn get_stats(&self) -> Stats {
        self.inner.counters.snapshot()
    }

    /// Starts recording interactions into a fresh bounded buffer.
    pub fn enable_trace(&self, capacity: usize) {
        self.inner.trace.enable(capacity);
    }

    pub fn disable_trace(&self) {
        self.inner.trace.disable();
    }

    pub fn trace_snapshot(&self) -> TraceSnapshot {
        self.inner.trace.snapshot()
    }

    /// Checks the structural invariants of every live wire and agent and
    /// returns the first violation found.
    pub fn validate(&self) -> Result<(), InvariantViolation> {
        for agent in self.inner.registry.snapshot() {
            if agent.kind() == AgentKind::Replicator
                && agent.ports().len() != 1 + agent.deltas().len()
            {
                return Err(InvariantViolation::ReplicatorArity { agent: agent.id() });
            }
            for index in 0..agent.ports().len() {
                let Some(wire) = agent.port(index).wire() else {
                    continue;
                };
                if agent.is_dead() {
                    return Err(InvariantViolation::DeadAgentWired {
                        agent: agent.id(),
                        port: index,
                    });
                }
                let me = PortRef::of(&agent, index);
                let far = {
                    let ends = wire.lock_ends();
                    let listed = ends
                        .iter()
                        .any(|end| matches!(end, Some(e) if e.same(&me)));
                    if !listed {
                        return Err(InvariantViolation::EndpointMismatch {
                            agent: agent.id(),
                            port: index,
                        });
                    }
                    Wire::other_of(&ends, &me)
                };
                if let Some(far) = far {
                    if !far.port().holds(&wire) {
                        return Err(InvariantViolation::DanglingWire {
                            agent: agent.id(),
                            port: index,
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

impl Drop for Network {
    fn drop(&mut self) {
        self.inner.scheduler.shutdown();
        let mut pool = self.inner.pool.lock();
        for handle in pool.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

impl fmt::Debug for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Network")
            .field("nodes", &self.node_count())
            .field("phase", &self.phase())
            .field("queued", &self.inner.scheduler.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_and_get_link() {
        let net = Network::new();
        let a = net.new_var();
        let b = net.new_var();
        net.link(&a, 0, &b, 0);

        let (far, far_port) = net.get_link(&a, 0).expect("linked");
        assert!(Arc::ptr_eq(&far, &b));
        assert_eq!(far_port, 0);
        assert!(net.is_connected(&a, 0, &b, 0));
        assert!(net.is_connected(&b, 0, &a, 0));
        // Var-var wires are never active pairs.
        assert!(net.inner().scheduler.is_empty());
        net.validate().expect("well-formed");
    }

    #[test]
    fn linking_principals_schedules_the_pair() {
        let net = Network::new();
        let f1 = net.new_fan();
        let f2 = net.new_fan();
        net.link(&f1, 0, &f2, 0);
        assert_eq!(net.inner().scheduler.len(), 1);
    }

    #[test]
    fn reduce_with_limit_zero_is_a_no_op() {
        let net = Network::new();
        let f1 = net.new_fan();
        let f2 = net.new_fan();
        net.link(&f1, 0, &f2, 0);
        assert_eq!(net.reduce_with_limit(0), 0);
        assert_eq!(net.get_stats().total_reductions, 0);
        assert_eq!(net.inner().scheduler.len(), 1);
    }

    #[test]
    fn phase_transition_rotates_fans() {
        let net = Network::new();
        let fan = net.new_fan();
        let v0 = net.new_var();
        let v1 = net.new_var();
        let v2 = net.new_var();
        net.link(&fan, 0, &v0, 0);
        net.link(&fan, 1, &v1, 0);
        net.link(&fan, 2, &v2, 0);

        assert_eq!(net.phase(), 1);
        net.set_phase(2);
        assert_eq!(net.phase(), 2);

        // Old aux 1 is the new principal, old aux 2 the new aux 1, the old
        // principal the new aux 2.
        assert!(net.is_connected(&fan, 0, &v1, 0));
        assert!(net.is_connected(&fan, 1, &v2, 0));
        assert!(net.is_connected(&fan, 2, &v0, 0));
        net.validate().expect("well-formed after rotation");
    }

    #[test]
    fn collect_garbage_drops_discarded_agents() {
        let net = Network::new();
        let keep = net.new_fan();
        let gone = net.new_eraser();
        gone.discard();
        assert_eq!(net.node_count(), 2);
        assert_eq!(net.active_node_count(), 1);
        assert_eq!(net.collect_garbage(), 1);
        assert_eq!(net.node_count(), 1);
        assert!(!keep.is_dead());
    }
}
