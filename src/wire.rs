//! Wires: undirected edges between two ports, with a scheduling depth.
//!
//! A wire holds its two endpoints behind a single mutex, which plays both
//! roles the rewrite engine needs: endpoint reads are atomic, and any
//! multi-port edit (splice, fuse, disconnect) is serialised per wire. Rules
//! that edit two wires at once acquire the locks in memory-address order to
//! stay deadlock-free.
//!
//! The depth is assigned at creation and never changes; it is the priority
//! the scheduler uses to enforce leftmost-outermost order.

use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::agent::{AgentRef, Port};

/// One endpoint of a wire: an agent handle plus a port index on it.
#[derive(Debug, Clone)]
pub struct PortRef {
    pub agent: AgentRef,
    pub index: usize,
}

impl PortRef {
    pub fn of(agent: &AgentRef, index: usize) -> Self {
        Self {
            agent: Arc::clone(agent),
            index,
        }
    }

    /// The port this endpoint names.
    #[inline]
    pub fn port(&self) -> &Port {
        self.agent.port(self.index)
    }

    /// Identity comparison: same agent (by handle) and same port index.
    pub fn same(&self, other: &PortRef) -> bool {
        self.index == other.index && Arc::ptr_eq(&self.agent, &other.agent)
    }

    /// True if this endpoint is a principal port of a non-`Var` agent.
    #[inline]
    pub fn is_principal(&self) -> bool {
        self.index == 0 && self.agent.is_active()
    }
}

/// The two endpoint slots of a wire. A detached wire has both cleared.
pub(crate) type WireEnds = [Option<PortRef>; 2];

/// An undirected edge between exactly two ports.
#[derive(Debug)]
pub struct Wire {
    depth: u64,
    ends: Mutex<WireEnds>,
}

impl Wire {
    /// Creates a wire already joining `a` and `b`. The caller is responsible
    /// for pointing both port slots back at the returned wire.
    pub(crate) fn between(a: PortRef, b: PortRef, depth: u64) -> Arc<Self> {
        Arc::new(Self {
            depth,
            ends: Mutex::new([Some(a), Some(b)]),
        })
    }

    /// Scheduling priority: lower is reduced earlier.
    #[inline]
    pub fn depth(&self) -> u64 {
        self.depth
    }

    /// Locks the endpoint pair for inspection or edit.
    pub(crate) fn lock_ends(&self) -> MutexGuard<'_, WireEnds> {
        self.ends.lock()
    }

    /// The endpoint on the far side of `p`, under an already-held lock.
    pub(crate) fn other_of(ends: &WireEnds, p: &PortRef) -> Option<PortRef> {
        match &ends[0] {
            Some(e) if e.same(p) => ends[1].clone(),
            _ => ends[0].clone(),
        }
    }

    /// Replaces whichever endpoint equals `old` with `new`, under an
    /// already-held lock. Returns `false` if `old` is not an endpoint.
    pub(crate) fn replace_end(ends: &mut WireEnds, old: &PortRef, new: Option<PortRef>) -> bool {
        for slot in ends.iter_mut() {
            if matches!(slot, Some(e) if e.same(old)) {
                *slot = new;
                return true;
            }
        }
        false
    }

    /// True if both endpoints are principal ports of non-`Var` agents.
    pub(crate) fn is_active_pair(ends: &WireEnds) -> bool {
        matches!((&ends[0], &ends[1]),
            (Some(a), Some(b)) if a.is_principal() && b.is_principal())
    }

    /// Lock-ordering key for rules that must hold two wire locks at once.
    pub(crate) fn lock_key(this: &Arc<Wire>) -> usize {
        Arc::as_ptr(this) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{Agent, AgentId, AgentKind};

    fn fan(id: u64) -> AgentRef {
        Arc::new(Agent::new(AgentId::new(id), AgentKind::Fan, 0, Vec::new(), None))
    }

    fn var(id: u64) -> AgentRef {
        Arc::new(Agent::new(AgentId::new(id), AgentKind::Var, 0, Vec::new(), None))
    }

    #[test]
    fn lock_ends_and_other() {
        let a = fan(1);
        let b = fan(2);
        let pa = PortRef::of(&a, 1);
        let pb = PortRef::of(&b, 2);
        let w = Wire::between(pa.clone(), pb.clone(), 3);
        assert_eq!(w.depth(), 3);

        let ends = w.lock_ends();
        assert!(matches!(&ends[0], Some(e) if e.same(&pa)));
        assert!(matches!(&ends[1], Some(e) if e.same(&pb)));
        let far = Wire::other_of(&ends, &pa).expect("far end");
        assert!(far.same(&pb));
    }

    #[test]
    fn active_pair_requires_two_principals() {
        let a = fan(1);
        let b = fan(2);
        let v = var(3);

        let principal_pair = [Some(PortRef::of(&a, 0)), Some(PortRef::of(&b, 0))];
        assert!(Wire::is_active_pair(&principal_pair));

        let aux_pair = [Some(PortRef::of(&a, 0)), Some(PortRef::of(&b, 1))];
        assert!(!Wire::is_active_pair(&aux_pair));

        let var_pair = [Some(PortRef::of(&a, 0)), Some(PortRef::of(&v, 0))];
        assert!(!Wire::is_active_pair(&var_pair));
    }

    #[test]
    fn replace_end_swaps_identity() {
        let a = fan(1);
        let b = fan(2);
        let c = fan(3);
        let pa = PortRef::of(&a, 0);
        let pb = PortRef::of(&b, 0);
        let pc = PortRef::of(&c, 1);
        let w = Wire::between(pa.clone(), pb.clone(), 0);

        {
            let mut ends = w.lock_ends();
            assert!(Wire::replace_end(&mut ends, &pa, Some(pc.clone())));
            assert!(!Wire::replace_end(&mut ends, &pa, None));
        }
        let ends = w.lock_ends();
        let e0 = ends[0].clone().expect("still attached");
        assert!(e0.same(&pc));
        assert!(matches!(&ends[1], Some(e) if e.same(&pb)));
    }
}
