//! Read-back: reconstructing a λ-term from a reduced net.
//!
//! Reading starts at the port representing the term's root and interprets
//! fans by the logical port it arrives through: logical 0 is an
//! abstraction's result, logical 1 an application's result, logical 2 a
//! bound occurrence. Arriving at a replicator auxiliary traces through its
//! principal back to the shared source: a binder's var port or a free
//! `Var` agent.
//!
//! Phase is the one piece of reducer state read-back depends on: after the
//! phase-2 fan rotation, physical port `p` carries logical role
//! `(p + 1) mod 3`, and descending to a logical role goes through physical
//! `(role + 2) mod 3`. Phase 1 maps both ways identically.
//!
//! Cycles (possible in nets that are not images of terms) return a
//! `"<loop>"` placeholder instead of diverging.

use std::collections::{HashMap, HashSet};

use crate::agent::{AgentKind, AgentRef};
use crate::network::Network;
use crate::term::Term;

struct Reader<'a> {
    net: &'a Network,
    rotated: bool,
    bindings: HashMap<u64, String>,
    next_name: usize,
    on_path: HashSet<(u64, usize)>,
}

/// Reads the term rooted at `(root, port)`. The net must be fully reduced;
/// reading a graph that still holds active pairs is a programmer error.
pub fn term_from_net(net: &Network, root: &AgentRef, port: usize) -> Term {
    debug_assert!(
        net.inner().scheduler.is_empty(),
        "read-back requires a net with no scheduled active pairs"
    );
    let mut reader = Reader {
        net,
        rotated: net.phase() == 2,
        bindings: HashMap::new(),
        next_name: 0,
        on_path: HashSet::new(),
    };
    reader.read(root, port)
}

impl Reader<'_> {
    fn fresh_name(&mut self) -> String {
        let name = format!("x{}", self.next_name);
        self.next_name += 1;
        name
    }

    /// Logical role of a physical fan port under the current phase.
    fn logical(&self, physical: usize) -> usize {
        if self.rotated {
            (physical + 1) % 3
        } else {
            physical
        }
    }

    /// Physical fan port carrying a logical role under the current phase.
    fn physical(&self, logical: usize) -> usize {
        if self.rotated {
            (logical + 2) % 3
        } else {
            logical
        }
    }

    fn follow(&self, agent: &AgentRef, physical: usize) -> Option<(AgentRef, usize)> {
        self.net.get_link(agent, physical)
    }

    fn read(&mut self, agent: &AgentRef, port: usize) -> Term {
        let key = (agent.id().as_u64(), port);
        if !self.on_path.insert(key) {
            return Term::var("<loop>");
        }
        let term = self.read_inner(agent, port);
        self.on_path.remove(&key);
        term
    }

    fn read_inner(&mut self, agent: &AgentRef, port: usize) -> Term {
        match agent.kind() {
            AgentKind::Fan => match self.logical(port) {
                0 => {
                    // Abstraction, read at its result.
                    let name = self.fresh_name();
                    self.bindings.insert(agent.id().as_u64(), name.clone());
                    let body_port = self.physical(1);
                    let body = match self.follow(agent, body_port) {
                        Some((next, next_port)) => self.read(&next, next_port),
                        None => Term::var("<nil>"),
                    };
                    Term::abs(name, body)
                }
                1 => {
                    // Application, read at its result.
                    let fun = match self.follow(agent, self.physical(0)) {
                        Some((next, next_port)) => self.read(&next, next_port),
                        None => Term::var("<nil>"),
                    };
                    let arg = match self.follow(agent, self.physical(2)) {
                        Some((next, next_port)) => self.read(&next, next_port),
                        None => Term::var("<nil>"),
                    };
                    Term::app(fun, arg)
                }
                _ => {
                    // Arrived at a binder's var port.
                    match self.bindings.get(&agent.id().as_u64()) {
                        Some(name) => Term::var(name.clone()),
                        None => Term::var("<binding>"),
                    }
                }
            },

            AgentKind::Replicator => {
                if port == 0 {
                    // Not expected while reading a term's result.
                    Term::var("<rep-0>")
                } else {
                    match self.follow(agent, 0) {
                        Some((source, source_port)) => self.trace_source(source, source_port),
                        None => Term::var("<nil>"),
                    }
                }
            }

            AgentKind::Var => Term::var(agent.name().unwrap_or("<free>")),

            AgentKind::Eraser => Term::var("<erased>"),
        }
    }

    /// Follows replicator principals upward until hitting the shared
    /// source: a binder's var port, a free variable, or a whole subterm.
    fn trace_source(&mut self, agent: AgentRef, port: usize) -> Term {
        let mut current = agent;
        let mut current_port = port;
        loop {
            match current.kind() {
                AgentKind::Fan => {
                    if self.logical(current_port) == 2 {
                        return match self.bindings.get(&current.id().as_u64()) {
                            Some(name) => Term::var(name.clone()),
                            None => Term::var("<binding>"),
                        };
                    }
                    // The shared source is itself a term; read it whole.
                    let fan = current;
                    return self.read(&fan, current_port);
                }
                AgentKind::Replicator => {
                    if current_port == 0 {
                        return Term::var("<rep-0>");
                    }
                    match self.follow(&current, 0) {
                        Some((next, next_port)) => {
                            current = next;
                            current_port = next_port;
                        }
                        None => return Term::var("<nil>"),
                    }
                }
                AgentKind::Var => return Term::var(current.name().unwrap_or("<free>")),
                AgentKind::Eraser => return Term::var("<erased>"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::Term;
    use crate::translate::term_to_net;

    fn round_trip(term: &Term) -> Term {
        let net = Network::new();
        let (root, port) = term_to_net(&net, term);
        let out = net.new_var();
        net.link(&root, port, &out, 0);
        let (result, result_port) = net.get_link(&out, 0).expect("root wired");
        term_from_net(&net, &result, result_port)
    }

    /// Normal forms survive translate-then-read-back up to α-renaming.
    #[test]
    fn round_trips_normal_forms() {
        let identity = Term::abs("x", Term::var("x"));
        assert!(round_trip(&identity).alpha_eq(&identity));

        let k = Term::abs("x", Term::abs("y", Term::var("x")));
        assert!(round_trip(&k).alpha_eq(&k));

        let pair = Term::abs(
            "f",
            Term::app(
                Term::app(Term::var("f"), Term::var("a")),
                Term::var("b"),
            ),
        );
        assert!(round_trip(&pair).alpha_eq(&pair));
    }

    /// Free variables come back with their original names.
    #[test]
    fn free_variables_keep_their_names() {
        let term = Term::app(Term::var("f"), Term::var("g"));
        assert!(round_trip(&term).alpha_eq(&term));
    }

    /// Self-application shares the binder through one replicator.
    #[test]
    fn round_trips_shared_occurrences() {
        let dup = Term::abs("x", Term::app(Term::var("x"), Term::var("x")));
        assert!(round_trip(&dup).alpha_eq(&dup));
    }
}
