//! Agent registry: id-keyed ownership of every agent in a network.
//!
//! The registry is the single owner of agents (wires hold co-owning handles,
//! but the registry entry is what keeps an idle agent alive). It is guarded
//! by one lock, held only while inserting, snapshotting, or sweeping.
//!
//! # Determinism
//! Snapshots iterate in ascending id order, so canonical-rule sweeps and
//! reachability pruning visit agents in the same order on every run. This is
//! what makes single-worker statistics reproducible.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use tracing::debug;

use crate::agent::{AgentId, AgentRef};

/// Id → agent map with deterministic iteration and lazy dead-entry sweeps.
#[derive(Debug, Default)]
pub struct AgentRegistry {
    agents: Mutex<BTreeMap<u64, AgentRef>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, agent: AgentRef) {
        self.agents.lock().insert(agent.id().as_u64(), agent);
    }

    pub fn get(&self, id: AgentId) -> Option<AgentRef> {
        self.agents.lock().get(&id.as_u64()).cloned()
    }

    /// Number of registered agents, dead entries included.
    pub fn len(&self) -> usize {
        self.agents.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.lock().is_empty()
    }

    /// Number of registered agents that are not marked dead.
    pub fn active_count(&self) -> usize {
        self.agents.lock().values().filter(|a| !a.is_dead()).count()
    }

    /// Copies all current entries in ascending id order. Callers mutate the
    /// net while walking the copy, so the lock is never held across a rule.
    pub fn snapshot(&self) -> Vec<AgentRef> {
        self.agents.lock().values().cloned().collect()
    }

    /// Removes dead entries. Returns how many were dropped.
    pub fn sweep_dead(&self) -> usize {
        let mut agents = self.agents.lock();
        let before = agents.len();
        agents.retain(|_, agent| !agent.is_dead());
        let swept = before - agents.len();
        if swept > 0 {
            debug!(swept, remaining = agents.len(), "swept dead agents");
        }
        swept
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{Agent, AgentId, AgentKind};
    use std::sync::Arc;

    fn eraser(id: u64) -> AgentRef {
        Arc::new(Agent::new(AgentId::new(id), AgentKind::Eraser, 0, Vec::new(), None))
    }

    #[test]
    fn snapshot_is_id_ordered() {
        let reg = AgentRegistry::new();
        for id in [5u64, 1, 9, 3] {
            reg.insert(eraser(id));
        }
        let ids: Vec<u64> = reg.snapshot().iter().map(|a| a.id().as_u64()).collect();
        assert_eq!(ids, vec![1, 3, 5, 9]);
    }

    #[test]
    fn sweep_removes_only_dead() {
        let reg = AgentRegistry::new();
        let keep = eraser(1);
        let gone = eraser(2);
        reg.insert(Arc::clone(&keep));
        reg.insert(Arc::clone(&gone));

        gone.discard();
        assert_eq!(reg.len(), 2);
        assert_eq!(reg.active_count(), 1);
        assert_eq!(reg.sweep_dead(), 1);
        assert_eq!(reg.len(), 1);
        assert!(reg.get(keep.id()).is_some());
        assert!(reg.get(gone.id()).is_none());
    }
}
