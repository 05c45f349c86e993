//! Canonicalisation: replicator decay, replicator merge, and reachability
//! pruning.
//!
//! The two replicator rules run between reduction passes, sweeping the
//! registry in ascending id order (deterministic across runs). Decay removes
//! a unit replicator whose single delta is zero, which is semantically an
//! identity wire. Merge combines two stacked replicators when the inner one's level
//! equals the outer's level plus the delta of the connecting port; the
//! merged replicator keeps the outer level and splices the inner delta
//! vector in, shifted by the connecting delta.
//!
//! Reachability canonicalisation prunes the parts of a reduced net that
//! correspond to erased subterms: every agent unreachable from the chosen
//! root has its connected ports spliced to fresh erasers and is marked
//! dead, and the spawned erasure pairs are left to the scheduler.

use std::collections::HashSet;

use crate::agent::{AgentKind, AgentRef};
use crate::network::NetInner;
use crate::trace::RuleKind;
use crate::wire::{PortRef, Wire};

impl NetInner {
    /// One pass of decay and merge over every live replicator. Returns true
    /// if any rule fired.
    pub(crate) fn canonical_sweep(&self) -> bool {
        let before = self.counters.canonical_total();

        for agent in self.registry.snapshot() {
            if agent.is_dead() || agent.kind() != AgentKind::Replicator {
                continue;
            }
            // Disconnected replicators are corpses awaiting the GC sweep.
            if agent.port(0).wire().is_none() {
                continue;
            }
            if agent.aux_arity() == 1 && agent.deltas()[0] == 0 {
                self.rep_decay(&agent);
                continue;
            }
            self.try_rep_merge(&agent);
        }

        self.counters.canonical_total() > before
    }

    /// Removes a unit replicator with delta zero by fusing its two wires
    /// into one. The surviving wire is the principal-side one, so depth is
    /// preserved.
    fn rep_decay(&self, rep: &AgentRef) {
        if !rep.claim() {
            return;
        }
        let principal = PortRef::of(rep, 0);
        let aux = PortRef::of(rep, 1);
        if principal.port().wire().is_none() || aux.port().wire().is_none() {
            rep.revive();
            return;
        }
        self.fuse(&principal, &aux);
        self.counters.count_rule(RuleKind::RepDecay);
        self.trace.record(RuleKind::RepDecay, rep, None);
    }

    /// Looks for an auxiliary port wired to another replicator's principal
    /// whose level satisfies the local constraint, and merges the two.
    /// At most one merge per sweep visit.
    fn try_rep_merge(&self, rep: &AgentRef) {
        for index in 1..rep.ports().len() {
            let p = PortRef::of(rep, index);
            let Some(wire) = p.port().wire() else {
                continue;
            };

            let partner = {
                let ends = wire.lock_ends();
                if !p.port().holds(&wire) {
                    continue;
                }
                let Some(other) = Wire::other_of(&ends, &p) else {
                    continue;
                };
                if other.index != 0 || other.agent.kind() != AgentKind::Replicator {
                    continue;
                }
                other.agent
            };

            let delta = rep.deltas()[index - 1];
            if partner.level() != rep.level() + delta {
                continue;
            }

            if !rep.claim() {
                return;
            }
            if !partner.claim() {
                rep.revive();
                return;
            }
            self.merge_replicators(rep, &partner, index - 1);
            return;
        }
    }

    /// Replaces `outer`'s auxiliary `aux_index` with all of `inner`'s
    /// auxiliary ports, their deltas shifted by the connecting delta. Both
    /// originals die; all neighbours are re-spliced onto the merged agent.
    fn merge_replicators(&self, outer: &AgentRef, inner: &AgentRef, aux_index: usize) {
        let connecting_delta = outer.deltas()[aux_index];
        let mut deltas = Vec::with_capacity(outer.deltas().len() + inner.deltas().len() - 1);
        for (k, &delta) in outer.deltas().iter().enumerate() {
            if k == aux_index {
                for &inner_delta in inner.deltas() {
                    deltas.push(connecting_delta + inner_delta);
                }
            } else {
                deltas.push(delta);
            }
        }

        let merged = self.alloc_replicator(outer.level(), deltas);
        self.splice(PortRef::of(&merged, 0), &PortRef::of(outer, 0));

        let mut next = 1usize;
        for k in 0..outer.deltas().len() {
            if k == aux_index {
                for m in 0..inner.deltas().len() {
                    self.splice(PortRef::of(&merged, next), &PortRef::of(inner, m + 1));
                    next += 1;
                }
            } else {
                self.splice(PortRef::of(&merged, next), &PortRef::of(outer, k + 1));
                next += 1;
            }
        }

        // The wire that joined the two dies with them.
        self.fuse(
            &PortRef::of(outer, aux_index + 1),
            &PortRef::of(inner, 0),
        );

        self.counters.count_rule(RuleKind::RepMerge);
        self.trace.record(RuleKind::RepMerge, outer, Some(inner));
    }

    /// Marks everything reachable from `root`, then splices erasers into
    /// every still-connected port of each unreachable agent and marks the
    /// agent dead. The seed port is part of the root agent, so traversal
    /// covers it along with the agent's other ports.
    pub(crate) fn canonicalize_from(&self, root: &AgentRef, _port: usize) {
        let mut visited: HashSet<u64> = HashSet::new();
        let mut stack: Vec<AgentRef> = vec![AgentRef::clone(root)];

        while let Some(agent) = stack.pop() {
            if !visited.insert(agent.id().as_u64()) {
                continue;
            }
            for index in 0..agent.ports().len() {
                if let Some((neighbour, _)) = self.link_of(&agent, index) {
                    if !visited.contains(&neighbour.id().as_u64()) {
                        stack.push(neighbour);
                    }
                }
            }
        }

        for agent in self.registry.snapshot() {
            if agent.is_dead() || visited.contains(&agent.id().as_u64()) {
                continue;
            }
            for index in 0..agent.ports().len() {
                let target = PortRef::of(&agent, index);
                if target.port().wire().is_none() {
                    continue;
                }
                let era = self.alloc_eraser();
                self.splice(PortRef::of(&era, 0), &target);
            }
            agent.discard();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::Network;

    /// A unit replicator with delta zero decays into a plain wire.
    #[test]
    fn unit_replicator_decays() {
        let net = Network::new();
        let rep = net.new_replicator(1, vec![0]);
        let a = net.new_var();
        let b = net.new_var();
        net.link(&rep, 0, &a, 0);
        net.link(&rep, 1, &b, 0);

        assert!(net.apply_canonical_rules());
        assert!(net.is_connected(&a, 0, &b, 0));
        assert!(rep.is_dead());
        assert_eq!(net.get_stats().rep_decay, 1);
        net.validate().expect("well-formed");

        // Fixpoint: a second pass changes nothing.
        assert!(!net.apply_canonical_rules());
    }

    /// A unit replicator with a non-zero delta is not an identity and must
    /// survive the sweep.
    #[test]
    fn shifted_unit_replicator_survives() {
        let net = Network::new();
        let rep = net.new_replicator(1, vec![-1]);
        let a = net.new_var();
        let b = net.new_var();
        net.link(&rep, 0, &a, 0);
        net.link(&rep, 1, &b, 0);

        assert!(!net.apply_canonical_rules());
        assert!(!rep.is_dead());
        assert!(net.is_connected(&a, 0, &rep, 1));
    }

    /// Merge under the local constraint: inner level = outer level + delta.
    #[test]
    fn stacked_replicators_merge() {
        let net = Network::new();
        // Outer: level 1, deltas [1, 0]; aux 1 connects to inner replicator
        // of level 2 = 1 + deltas[0].
        let outer = net.new_replicator(1, vec![1, 0]);
        let inner = net.new_replicator(2, vec![0, 3]);
        net.link(&outer, 1, &inner, 0);

        let src = net.new_var();
        let inner_a = net.new_var();
        let inner_b = net.new_var();
        let outer_b = net.new_var();
        net.link(&outer, 0, &src, 0);
        net.link(&inner, 1, &inner_a, 0);
        net.link(&inner, 2, &inner_b, 0);
        net.link(&outer, 2, &outer_b, 0);

        assert!(net.apply_canonical_rules());
        assert_eq!(net.get_stats().rep_merge, 1);
        assert!(outer.is_dead());
        assert!(inner.is_dead());

        let (merged, _) = net.get_link(&src, 0).expect("merged replicator");
        assert_eq!(merged.kind(), AgentKind::Replicator);
        assert_eq!(merged.level(), 1);
        // Inner deltas [0, 3] shifted by the connecting delta 1, then the
        // remaining outer delta 0.
        assert_eq!(merged.deltas(), &[1, 4, 0]);
        assert!(net.is_connected(&merged, 1, &inner_a, 0));
        assert!(net.is_connected(&merged, 2, &inner_b, 0));
        assert!(net.is_connected(&merged, 3, &outer_b, 0));
        net.validate().expect("well-formed");
    }

    /// Level mismatch blocks the merge.
    #[test]
    fn merge_requires_level_constraint() {
        let net = Network::new();
        let outer = net.new_replicator(1, vec![1]);
        let inner = net.new_replicator(5, vec![2]);
        net.link(&outer, 1, &inner, 0);
        let src = net.new_var();
        net.link(&outer, 0, &src, 0);
        let sink = net.new_var();
        net.link(&inner, 1, &sink, 0);

        assert!(!net.apply_canonical_rules());
        assert!(!outer.is_dead());
        assert!(!inner.is_dead());
    }

    /// Unreachable agents are pruned and replaced by erasers, and pruning
    /// is idempotent.
    #[test]
    fn canonicalize_prunes_unreachable() {
        let net = Network::new();
        // Reachable island: fan with two vars.
        let fan = net.new_fan();
        let v1 = net.new_var();
        let v2 = net.new_var();
        net.link(&fan, 1, &v1, 0);
        net.link(&fan, 2, &v2, 0);

        // Unreachable island: two fans joined aux-to-aux (no active pair).
        let lost_a = net.new_fan();
        let lost_b = net.new_fan();
        net.link(&lost_a, 1, &lost_b, 1);

        net.canonicalize(&fan, 0);

        assert!(!fan.is_dead());
        assert!(lost_a.is_dead());
        assert!(lost_b.is_dead());
        for index in 0..3 {
            assert!(lost_a.port(index).wire().is_none());
            assert!(lost_b.port(index).wire().is_none());
        }
        net.validate().expect("well-formed");

        let count_before = net.node_count();
        net.canonicalize(&fan, 0);
        assert_eq!(net.node_count(), count_before);
        net.validate().expect("still well-formed");
    }
}
