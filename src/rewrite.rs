//! The rewrite engine: active-pair dispatch and the interaction rules.
//!
//! Each popped wire goes through a fixed sequence: lock the wire, re-read
//! both endpoints and verify the wire is still current, claim both agents
//! through their dead flags (rolling back if the second claim fails),
//! disconnect, dispatch on the pair of kinds, then record statistics and a
//! trace event. The claim is what makes a rewrite exclusive: once both
//! flags are won nothing else will touch those agents' topology.
//!
//! Three wire primitives are shared by every rule:
//!
//! - `connect` joins two freshly created ports at `parent_depth + 1`, so
//!   subgraphs produced by a commutation never outrank the redex that
//!   spawned them;
//! - `splice` swaps a new port into an existing wire's endpoint, retrying
//!   on contention;
//! - `fuse` collapses two wires into one, locking both in memory-address
//!   order, with the self-loop case degrading to a detached wire.
//!
//! # Citations
//! - Annihilation and commutation: Lafont, "Interaction Nets" (1990)
//! - Fan/replicator interaction schemes: Asperti & Guerrini, "The Optimal
//!   Implementation of Functional Programming Languages" (1998)

use std::sync::Arc;

use tracing::warn;

use crate::agent::{AgentKind, AgentRef};
use crate::network::NetInner;
use crate::trace::RuleKind;
use crate::wire::{PortRef, Wire};

impl NetInner {
    // ---- wire primitives ----------------------------------------------

    /// Joins two freshly created ports with a new internal wire at
    /// `parent_depth + 1`, scheduling it if the ports form an active pair.
    pub(crate) fn connect(&self, a: PortRef, b: PortRef, parent_depth: u64) {
        let depth = parent_depth + 1;
        let wire = Wire::between(a.clone(), b.clone(), depth);
        a.port().set_wire(Arc::clone(&wire));
        b.port().set_wire(Arc::clone(&wire));
        if a.is_principal() && b.is_principal() {
            self.push_pair(&wire);
        }
    }

    /// Replaces `old`'s endpoint in its current wire with `new`, clearing
    /// `old`'s slot. No-op if `old` is unwired; retries if the wire moves
    /// under us before the lock is held.
    pub(crate) fn splice(&self, new: PortRef, old: &PortRef) {
        loop {
            let Some(wire) = old.port().wire() else {
                return;
            };
            let mut ends = wire.lock_ends();
            if !old.port().holds(&wire) {
                continue;
            }
            if !Wire::replace_end(&mut ends, old, Some(new.clone())) {
                continue;
            }
            new.port().set_wire(Arc::clone(&wire));
            old.port().clear_wire();
            let active = Wire::is_active_pair(&ends);
            drop(ends);
            if active {
                self.push_pair(&wire);
            }
            return;
        }
    }

    /// Collapses the two wires touching `a` and `b` by joining their far
    /// neighbours on `a`'s wire. When both ports share one wire the pair is
    /// a loop and simply vanishes.
    pub(crate) fn fuse(&self, a: &PortRef, b: &PortRef) {
        loop {
            let Some(wire_a) = a.port().wire() else {
                return;
            };
            let Some(wire_b) = b.port().wire() else {
                return;
            };

            if Arc::ptr_eq(&wire_a, &wire_b) {
                let mut ends = wire_a.lock_ends();
                if !a.port().holds(&wire_a) || !b.port().holds(&wire_b) {
                    drop(ends);
                    std::thread::yield_now();
                    continue;
                }
                a.port().clear_wire();
                b.port().clear_wire();
                *ends = [None, None];
                return;
            }

            // Address-ordered dual lock.
            let (guard_a, guard_b);
            if Wire::lock_key(&wire_a) < Wire::lock_key(&wire_b) {
                guard_a = wire_a.lock_ends();
                guard_b = wire_b.lock_ends();
            } else {
                guard_b = wire_b.lock_ends();
                guard_a = wire_a.lock_ends();
            }
            let mut ends_a = guard_a;
            let mut ends_b = guard_b;

            if !a.port().holds(&wire_a) || !b.port().holds(&wire_b) {
                drop(ends_a);
                drop(ends_b);
                std::thread::yield_now();
                continue;
            }

            let far_a = Wire::other_of(&ends_a, a);
            let far_b = Wire::other_of(&ends_b, b);

            // Keep wire_a: its far end stays, b's far neighbour moves in.
            if let Some(far) = &far_b {
                far.port().set_wire(Arc::clone(&wire_a));
            }
            Wire::replace_end(&mut ends_a, a, far_b.clone());
            a.port().clear_wire();
            b.port().clear_wire();
            *ends_b = [None, None];

            let active = matches!(
                (&far_a, &far_b),
                (Some(x), Some(y)) if x.is_principal() && y.is_principal()
            );
            drop(ends_a);
            drop(ends_b);
            if active {
                self.push_pair(&wire_a);
            }
            return;
        }
    }

    // ---- dispatch -----------------------------------------------------

    /// Handles one popped wire. Returns true if a pair was claimed and a
    /// rule dispatched; stale wires and lost claims return false and leave
    /// the net untouched.
    pub(crate) fn reduce_pair(&self, wire: &Arc<Wire>) -> bool {
        let (a, b) = {
            let mut ends = wire.lock_ends();
            let (p0, p1) = match (&ends[0], &ends[1]) {
                (Some(p0), Some(p1)) => (p0.clone(), p1.clone()),
                _ => return false,
            };
            // The wire may have been rewired since it was queued.
            if !p0.port().holds(wire) || !p1.port().holds(wire) {
                return false;
            }

            let a = Arc::clone(&p0.agent);
            let b = Arc::clone(&p1.agent);
            if !a.claim() {
                return false;
            }
            if !b.claim() {
                a.revive();
                return false;
            }

            *ends = [None, None];
            p0.port().clear_wire();
            p1.port().clear_wire();
            (a, b)
        };
        let depth = wire.depth();

        self.counters.count_reduction();
        let rule = self.dispatch(&a, &b, depth);
        self.counters.count_rule(rule);
        self.trace.record(rule, &a, Some(&b));
        true
    }

    fn dispatch(&self, a: &AgentRef, b: &AgentRef, depth: u64) -> RuleKind {
        use AgentKind::*;
        match (a.kind(), b.kind()) {
            (Replicator, Replicator) => {
                if a.level() == b.level() {
                    self.annihilate(a, b);
                    RuleKind::RepAnnihilation
                } else {
                    self.commute_replicators(a, b, depth);
                    RuleKind::RepCommutation
                }
            }
            (Fan, Fan) => {
                self.annihilate(a, b);
                RuleKind::FanAnnihilation
            }
            (Eraser, Eraser) => {
                // Both vanish with no new wiring; booked as erasure so the
                // counter covers all eraser consumption.
                self.annihilate(a, b);
                RuleKind::Erasure
            }
            (Eraser, _) => {
                self.erase(a, b);
                RuleKind::Erasure
            }
            (_, Eraser) => {
                self.erase(b, a);
                RuleKind::Erasure
            }
            (Fan, Replicator) | (Replicator, Fan) => {
                let (fan, rep) = if a.kind() == Fan { (a, b) } else { (b, a) };
                self.commute_fan_replicator(fan, rep, depth);
                if self.phase_value() == 2 {
                    RuleKind::AuxFanReplication
                } else {
                    RuleKind::FanRepCommutation
                }
            }
            _ => {
                // A well-formed translator never produces this; revive the
                // pair and leave a diagnostic.
                warn!(left = %a, right = %b, "unknown active pair, reviving both agents");
                a.revive();
                b.revive();
                RuleKind::Unknown
            }
        }
    }

    // ---- rules --------------------------------------------------------

    /// Fuses corresponding auxiliary ports pairwise. Covers fan/fan and
    /// equal-level replicator pairs, and degenerates to nothing for
    /// eraser/eraser (no auxiliaries to fuse).
    fn annihilate(&self, a: &AgentRef, b: &AgentRef) {
        let count = a.ports().len().min(b.ports().len());
        for index in 1..count {
            self.fuse(&PortRef::of(a, index), &PortRef::of(b, index));
        }
    }

    /// Spawns one fresh eraser per connected auxiliary port of the victim.
    fn erase(&self, _eraser: &AgentRef, victim: &AgentRef) {
        for index in 1..victim.ports().len() {
            let target = PortRef::of(victim, index);
            if target.port().wire().is_none() {
                continue;
            }
            let era = self.alloc_eraser();
            self.splice(PortRef::of(&era, 0), &target);
        }
    }

    /// Fan ↔ replicator commutation: two replicator copies cross into the
    /// fan's auxiliaries, one fan copy per replicator auxiliary, and a full
    /// bipartite set of internal wires at `depth + 1`. Phase 2 runs the
    /// same wiring under the rotated port interpretation.
    fn commute_fan_replicator(&self, fan: &AgentRef, rep: &AgentRef, depth: u64) {
        let rep_1 = self.alloc_replicator(rep.level(), rep.deltas().to_vec());
        let rep_2 = self.alloc_replicator(rep.level(), rep.deltas().to_vec());

        self.splice(PortRef::of(&rep_1, 0), &PortRef::of(fan, 1));
        self.splice(PortRef::of(&rep_2, 0), &PortRef::of(fan, 2));

        for index in 0..rep.aux_arity() {
            let fan_copy = self.alloc_fan();
            self.splice(PortRef::of(&fan_copy, 0), &PortRef::of(rep, index + 1));
            self.connect(
                PortRef::of(&fan_copy, 1),
                PortRef::of(&rep_1, index + 1),
                depth,
            );
            self.connect(
                PortRef::of(&fan_copy, 2),
                PortRef::of(&rep_2, index + 1),
                depth,
            );
        }
    }

    /// Unequal-level replicator commutation. The lower-level replicator
    /// replicates the higher one; each copy of the higher replicator has
    /// its level shifted by the delta of the auxiliary port it crosses.
    fn commute_replicators(&self, a: &AgentRef, b: &AgentRef, depth: u64) {
        if a.level() > b.level() {
            return self.commute_replicators(b, a, depth);
        }

        let b_copies: Vec<AgentRef> = (0..a.aux_arity())
            .map(|index| {
                let delta = a.deltas()[index];
                let copy = self.alloc_replicator(b.level() + delta, b.deltas().to_vec());
                self.splice(PortRef::of(&copy, 0), &PortRef::of(a, index + 1));
                copy
            })
            .collect();

        for j in 0..b.aux_arity() {
            let a_copy = self.alloc_replicator(a.level(), a.deltas().to_vec());
            self.splice(PortRef::of(&a_copy, 0), &PortRef::of(b, j + 1));
            for (i, b_copy) in b_copies.iter().enumerate() {
                self.connect(
                    PortRef::of(&a_copy, i + 1),
                    PortRef::of(b_copy, j + 1),
                    depth,
                );
            }
        }
    }
}
