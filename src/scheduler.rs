//! Leftmost-outermost work source.
//!
//! Active pairs are queued by wire depth into a bounded array of FIFO
//! buckets; lower depth means higher priority. Dequeues scan the buckets
//! under a single lock, which is exactly the serialisation that makes
//! leftmost-outermost order hold across any number of workers: no two
//! threads can ever disagree about which pair is currently outermost.
//!
//! Why the order matters: with erasure in the rule set, an inner redex may
//! be discarded by an outer one. Reducing inside-out wastes interactions
//! and, for a diverging argument, never terminates. Priority by depth plus
//! serialised dequeue is the minimum discipline under which no interaction
//! is wasted and every necessary interaction happens exactly once.
//!
//! # Citations
//! - The optimality notion the order preserves: Lévy, "Réductions
//!   correctes et optimales dans le λ-calcul" (1978)

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::wire::Wire;

/// Number of priority buckets. Depths at or beyond this are clamped into
/// the last bucket; FIFO order inside a bucket keeps them fair.
pub const MAX_PRIORITY: usize = 64;

#[derive(Debug)]
struct Buckets {
    queues: Vec<VecDeque<Arc<Wire>>>,
    len: usize,
    shutdown: bool,
}

impl Buckets {
    fn pop_lowest(&mut self) -> Option<Arc<Wire>> {
        for queue in self.queues.iter_mut() {
            if let Some(wire) = queue.pop_front() {
                self.len -= 1;
                return Some(wire);
            }
        }
        None
    }
}

/// Bounded-priority queue of active-pair wires.
#[derive(Debug)]
pub struct Scheduler {
    buckets: Mutex<Buckets>,
    available: Condvar,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            buckets: Mutex::new(Buckets {
                queues: (0..MAX_PRIORITY).map(|_| VecDeque::new()).collect(),
                len: 0,
                shutdown: false,
            }),
            available: Condvar::new(),
        }
    }

    /// Enqueues a wire at its clamped depth and wakes one waiter.
    pub fn push(&self, wire: Arc<Wire>, depth: u64) {
        let bucket = (depth as usize).min(MAX_PRIORITY - 1);
        let mut buckets = self.buckets.lock();
        buckets.queues[bucket].push_back(wire);
        buckets.len += 1;
        self.available.notify_one();
    }

    /// Blocking dequeue of the lowest-depth wire. Returns `None` only after
    /// [`Scheduler::shutdown`].
    pub fn pop(&self) -> Option<Arc<Wire>> {
        let mut buckets = self.buckets.lock();
        loop {
            if let Some(wire) = buckets.pop_lowest() {
                return Some(wire);
            }
            if buckets.shutdown {
                return None;
            }
            self.available.wait(&mut buckets);
        }
    }

    /// Non-blocking dequeue; `None` when all buckets are empty.
    pub fn try_pop(&self) -> Option<Arc<Wire>> {
        self.buckets.lock().pop_lowest()
    }

    pub fn len(&self) -> usize {
        self.buckets.lock().len
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.lock().len == 0
    }

    /// Releases every blocked and future `pop`.
    pub fn shutdown(&self) {
        let mut buckets = self.buckets.lock();
        buckets.shutdown = true;
        self.available.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{Agent, AgentId, AgentKind};
    use crate::wire::PortRef;

    fn dummy_wire(depth: u64) -> Arc<Wire> {
        let a = Arc::new(Agent::new(AgentId::new(1), AgentKind::Fan, 0, Vec::new(), None));
        let b = Arc::new(Agent::new(AgentId::new(2), AgentKind::Fan, 0, Vec::new(), None));
        Wire::between(PortRef::of(&a, 0), PortRef::of(&b, 0), depth)
    }

    #[test]
    fn pops_lowest_depth_first() {
        let sched = Scheduler::new();
        sched.push(dummy_wire(5), 5);
        sched.push(dummy_wire(1), 1);
        sched.push(dummy_wire(3), 3);

        let depths: Vec<u64> = std::iter::from_fn(|| sched.try_pop())
            .map(|w| w.depth())
            .collect();
        assert_eq!(depths, vec![1, 3, 5]);
        assert!(sched.is_empty());
    }

    #[test]
    fn fifo_within_a_bucket() {
        let sched = Scheduler::new();
        let first = dummy_wire(2);
        let second = dummy_wire(2);
        sched.push(Arc::clone(&first), 2);
        sched.push(Arc::clone(&second), 2);

        assert!(Arc::ptr_eq(&sched.try_pop().unwrap(), &first));
        assert!(Arc::ptr_eq(&sched.try_pop().unwrap(), &second));
    }

    #[test]
    fn depth_is_clamped_into_last_bucket() {
        let sched = Scheduler::new();
        sched.push(dummy_wire(1_000_000), 1_000_000);
        sched.push(dummy_wire(63), 63);
        // Both land in bucket 63; the earlier push stays first.
        assert_eq!(sched.try_pop().unwrap().depth(), 1_000_000);
        assert_eq!(sched.try_pop().unwrap().depth(), 63);
    }

    #[test]
    fn shutdown_releases_blocked_pop() {
        let sched = Arc::new(Scheduler::new());
        let waiter = {
            let sched = Arc::clone(&sched);
            std::thread::spawn(move || sched.pop())
        };
        // Give the waiter a moment to park, then release it.
        std::thread::sleep(std::time::Duration::from_millis(20));
        sched.shutdown();
        assert!(waiter.join().unwrap().is_none());
    }
}
