//! Structural fingerprints for nets.
//!
//! A fingerprint hashes the subnet reachable from a chosen root port into a
//! 256-bit value. Agents are renumbered in traversal order before hashing,
//! so two isomorphic nets (same shape, different allocation history) hash
//! identically. The property tests rely on this: equal fingerprints across
//! worker counts witness confluence, and a repeated fingerprint witnesses
//! that a canonicalisation pass was idempotent.
//!
//! # Determinism
//! - Traversal is depth-first from the root, neighbours in ascending port
//!   order; the numbering depends only on net structure.
//! - All hashed fields are length-prefixed and the hash input is domain
//!   separated, so distinct encodings can never collide by concatenation.
//!
//! # Citations
//! - SHA-256: NIST FIPS 180-4 (2015)

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::agent::{AgentKind, AgentRef};
use crate::network::Network;

/// A 256-bit hash value.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HashValue(pub [u8; 32]);

impl HashValue {
    /// Creates a zero hash (all zeros).
    #[inline]
    pub fn zero() -> Self {
        Self([0u8; 32])
    }

    /// Returns the raw byte array.
    #[inline]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Computes SHA-256 of `data` under a domain tag, length-prefixed.
    pub fn hash_with_domain(domain: &[u8], data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"DNET:");
        hasher.update(domain);
        hasher.update(b":v1");
        hasher.update((data.len() as u64).to_le_bytes());
        hasher.update(data);
        Self(hasher.finalize().into())
    }
}

impl fmt::Display for HashValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "HashValue({:02x}{:02x}{:02x}{:02x}…)",
            self.0[0], self.0[1], self.0[2], self.0[3]
        )
    }
}

const DOMAIN_NET: &[u8] = b"net";

fn kind_tag(kind: AgentKind) -> u8 {
    match kind {
        AgentKind::Fan => 0,
        AgentKind::Eraser => 1,
        AgentKind::Replicator => 2,
        AgentKind::Var => 3,
    }
}

/// Fingerprint of the subnet reachable from `(root, port)`.
///
/// Unreachable agents do not contribute; a net and its canonicalised image
/// therefore fingerprint identically exactly when pruning removed only
/// unreachable structure.
pub fn net_fingerprint(net: &Network, root: &AgentRef, port: usize) -> HashValue {
    // Renumber reachable agents in depth-first visit order.
    let mut order: HashMap<u64, u64> = HashMap::new();
    let mut visited: Vec<AgentRef> = Vec::new();
    let mut stack: Vec<AgentRef> = vec![AgentRef::clone(root)];

    while let Some(agent) = stack.pop() {
        let id = agent.id().as_u64();
        if order.contains_key(&id) {
            continue;
        }
        order.insert(id, visited.len() as u64);
        // Reverse port order on the stack yields ascending visit order.
        for index in (0..agent.ports().len()).rev() {
            if let Some((neighbour, _)) = net.get_link(&agent, index) {
                if !order.contains_key(&neighbour.id().as_u64()) {
                    stack.push(neighbour);
                }
            }
        }
        visited.push(agent);
    }

    let mut data = Vec::new();
    data.extend_from_slice(&(port as u64).to_le_bytes());
    data.extend_from_slice(&(visited.len() as u64).to_le_bytes());

    for agent in &visited {
        data.push(kind_tag(agent.kind()));
        data.extend_from_slice(&agent.level().to_le_bytes());
        data.extend_from_slice(&(agent.deltas().len() as u64).to_le_bytes());
        for delta in agent.deltas() {
            data.extend_from_slice(&delta.to_le_bytes());
        }
        let name = agent.name().unwrap_or("");
        data.extend_from_slice(&(name.len() as u64).to_le_bytes());
        data.extend_from_slice(name.as_bytes());

        data.extend_from_slice(&(agent.ports().len() as u64).to_le_bytes());
        for index in 0..agent.ports().len() {
            match net.get_link(agent, index) {
                Some((neighbour, neighbour_port)) => {
                    let slot = order
                        .get(&neighbour.id().as_u64())
                        .copied()
                        .unwrap_or(u64::MAX);
                    data.extend_from_slice(&slot.to_le_bytes());
                    data.extend_from_slice(&(neighbour_port as u64).to_le_bytes());
                }
                None => {
                    data.extend_from_slice(&u64::MAX.to_le_bytes());
                    data.extend_from_slice(&u64::MAX.to_le_bytes());
                }
            }
        }
    }

    HashValue::hash_with_domain(DOMAIN_NET, &data)
}
