//! Reduction statistics.
//!
//! One atomic counter per rewrite rule plus a running total. The total
//! counts claimed active-pair dispatches; the two canonical rules (decay,
//! merge) fire outside the scheduler and only bump their own counters, so
//! the driver can detect canonical-pass progress separately from reduction
//! progress.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::trace::RuleKind;

/// Snapshot of all reduction counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub total_reductions: u64,
    pub fan_annihilation: u64,
    pub rep_annihilation: u64,
    pub rep_commutation: u64,
    pub fan_rep_commutation: u64,
    pub erasure: u64,
    pub rep_decay: u64,
    pub rep_merge: u64,
    pub aux_fan_replication: u64,
}

/// Live counter bank; snapshot with [`StatCounters::snapshot`].
#[derive(Debug, Default)]
pub(crate) struct StatCounters {
    total: AtomicU64,
    fan_annihilation: AtomicU64,
    rep_annihilation: AtomicU64,
    rep_commutation: AtomicU64,
    fan_rep_commutation: AtomicU64,
    erasure: AtomicU64,
    rep_decay: AtomicU64,
    rep_merge: AtomicU64,
    aux_fan_replication: AtomicU64,
}

impl StatCounters {
    /// Counts one claimed active pair, before rule dispatch.
    pub fn count_reduction(&self) {
        self.total.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts one application of `rule`.
    pub fn count_rule(&self, rule: RuleKind) {
        let counter = match rule {
            RuleKind::FanAnnihilation => &self.fan_annihilation,
            RuleKind::RepAnnihilation => &self.rep_annihilation,
            RuleKind::RepCommutation => &self.rep_commutation,
            RuleKind::FanRepCommutation => &self.fan_rep_commutation,
            RuleKind::Erasure => &self.erasure,
            RuleKind::RepDecay => &self.rep_decay,
            RuleKind::RepMerge => &self.rep_merge,
            RuleKind::AuxFanReplication => &self.aux_fan_replication,
            RuleKind::Unknown => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    pub fn canonical_total(&self) -> u64 {
        self.rep_decay.load(Ordering::Relaxed) + self.rep_merge.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> Stats {
        Stats {
            total_reductions: self.total.load(Ordering::Relaxed),
            fan_annihilation: self.fan_annihilation.load(Ordering::Relaxed),
            rep_annihilation: self.rep_annihilation.load(Ordering::Relaxed),
            rep_commutation: self.rep_commutation.load(Ordering::Relaxed),
            fan_rep_commutation: self.fan_rep_commutation.load(Ordering::Relaxed),
            erasure: self.erasure.load(Ordering::Relaxed),
            rep_decay: self.rep_decay.load(Ordering::Relaxed),
            rep_merge: self.rep_merge.load(Ordering::Relaxed),
            aux_fan_replication: self.aux_fan_replication.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rules_hit_their_own_counters() {
        let counters = StatCounters::default();
        counters.count_reduction();
        counters.count_rule(RuleKind::FanAnnihilation);
        counters.count_rule(RuleKind::Erasure);
        counters.count_rule(RuleKind::Erasure);
        counters.count_rule(RuleKind::RepDecay);
        counters.count_rule(RuleKind::Unknown);

        let stats = counters.snapshot();
        assert_eq!(stats.total_reductions, 1);
        assert_eq!(stats.fan_annihilation, 1);
        assert_eq!(stats.erasure, 2);
        assert_eq!(stats.rep_decay, 1);
        assert_eq!(stats.rep_annihilation, 0);
        assert_eq!(counters.canonical_total(), 1);
    }
}
