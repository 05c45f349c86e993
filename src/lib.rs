//! Deltanet: an optimal evaluator for the untyped λ-calculus on Δ-Nets.
//!
//! This crate implements interaction-net reduction with a single agent
//! family (fans, erasers, and variable-arity replicators carrying per-port
//! level deltas) that unifies the linear, affine, and relevant fragments
//! of the λ-calculus under one set of local rewrite rules. A λ-term is
//! translated into a graph, reduced to normal form by rewriting active
//! pairs, and read back into a term.
//!
//! Reduction order is leftmost-outermost: wires carry a depth, the
//! scheduler always hands out the shallowest active pair, and dequeues are
//! serialised, so the discipline holds across any number of worker threads.
//! Normalisation runs in two phases, interleaved with canonical replicator
//! decay and merge passes: the core rule table to quiescence, then a
//! one-off fan rotation that turns the same commutation code into
//! auxiliary fan replication.
//!
//! # Mathematical Foundations
//!
//! Sharing graphs for optimal β-reduction go back to Lamping; Δ-Nets
//! replace his bracket/croissant bookkeeping with a single replicator agent
//! whose auxiliary ports carry signed level deltas, preserving the
//! invariant that an occurrence's level equals its binder's level plus the
//! path-sum of deltas.
//!
//! # References
//!
//! - Lamping, "An algorithm for optimal lambda calculus reduction" (1990)
//! - Lafont, "Interaction Nets" (1990)
//! - Lévy, "Réductions correctes et optimales dans le λ-calcul" (1978)
//! - Asperti & Guerrini, "The Optimal Implementation of Functional
//!   Programming Languages" (1998)
//! - Salvadori, "Delta-Nets: interaction-based optimal λ-reduction" (2024)
//!
//! # Example
//!
//! ```
//! use deltanet::prelude::*;
//!
//! // (λx. x) (λy. y)  →  λz. z
//! let term = Term::app(
//!     Term::abs("x", Term::var("x")),
//!     Term::abs("y", Term::var("y")),
//! );
//!
//! let net = Network::new();
//! let (root, port) = term_to_net(&net, &term);
//! let out = net.new_var();
//! net.link(&root, port, &out, 0);
//!
//! net.reduce_to_normal_form();
//!
//! let (result, result_port) = net.get_link(&out, 0).unwrap();
//! let normal = term_from_net(&net, &result, result_port);
//! assert!(normal.alpha_eq(&Term::abs("z", Term::var("z"))));
//! ```

pub mod agent;
pub mod canonical;
pub mod fingerprint;
pub mod network;
pub mod readback;
pub mod registry;
pub mod rewrite;
pub mod scheduler;
pub mod stats;
pub mod term;
pub mod trace;
pub mod translate;
pub mod wire;

pub use agent::{Agent, AgentId, AgentKind, AgentRef};
pub use fingerprint::{net_fingerprint, HashValue};
pub use network::{InvariantViolation, Network};
pub use readback::term_from_net;
pub use scheduler::MAX_PRIORITY;
pub use stats::Stats;
pub use term::Term;
pub use trace::{RuleKind, TraceEvent, TraceSnapshot};
pub use translate::term_to_net;

/// Prelude for convenient usage.
pub mod prelude {
    pub use crate::agent::{Agent, AgentId, AgentKind, AgentRef};
    pub use crate::fingerprint::{net_fingerprint, HashValue};
    pub use crate::network::{InvariantViolation, Network};
    pub use crate::readback::term_from_net;
    pub use crate::stats::Stats;
    pub use crate::term::Term;
    pub use crate::trace::{RuleKind, TraceEvent, TraceSnapshot};
    pub use crate::translate::term_to_net;
}

#[cfg(test)]
mod tests {
    use super::prelude::*;

    /// A fresh network is empty, in phase 1, with zeroed counters.
    #[test]
    fn fresh_network() {
        let net = Network::new();
        assert_eq!(net.node_count(), 0);
        assert_eq!(net.active_node_count(), 0);
        assert_eq!(net.phase(), 1);
        assert_eq!(net.get_stats(), Stats::default());
        net.validate().expect("empty net is well-formed");
    }

    /// Agent ids are unique and monotone.
    #[test]
    fn agent_ids_are_monotone() {
        let net = Network::new();
        let a = net.new_fan();
        let b = net.new_eraser();
        let c = net.new_replicator(0, vec![0]);
        assert!(a.id() < b.id());
        assert!(b.id() < c.id());
        assert_eq!(net.node_count(), 3);
    }

    /// The trace records interactions once enabled.
    #[test]
    fn trace_records_interactions() {
        let net = Network::new();
        net.enable_trace(16);

        let e1 = net.new_eraser();
        let e2 = net.new_eraser();
        net.link(&e1, 0, &e2, 0);
        assert_eq!(net.reduce_with_limit(10), 1);

        let snap = net.trace_snapshot();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap.events[0].rule, RuleKind::Erasure);
        assert_eq!(snap.events[0].left_kind, AgentKind::Eraser);
    }
}
