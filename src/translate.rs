//! Translation of λ-terms into nets.
//!
//! Abstraction and application both become fans: an abstraction's ports are
//! (result 0, body 1, var 2), an application's (fun 0, result 1, arg 2). A
//! binder's var port starts out wired to a placeholder eraser; the first
//! occurrence replaces the eraser with a fresh replicator, and every later
//! occurrence widens the replicator by one auxiliary port. Each occurrence
//! carries the delta `usage level − (binder level + 1)`, so the level of an
//! occurrence always equals its binder's level plus the path-sum of deltas.
//!
//! Depth bookkeeping: the argument side of an application is built one
//! depth (and one level) below the application itself, which is what seeds
//! the scheduler's leftmost-outermost order.
//!
//! Free variables become named `Var` agents shared through a level-0
//! replicator, so read-back can recover their names.

use std::collections::HashMap;
use std::sync::Arc;

use crate::agent::{AgentKind, AgentRef};
use crate::network::Network;
use crate::term::Term;
use crate::wire::PortRef;

/// Where a name currently routes: a binder fan's var port before first use,
/// the sharing replicator's principal afterwards.
#[derive(Clone)]
struct Binding {
    agent: AgentRef,
    port: usize,
    level: i64,
}

/// Builds `term` into the network and returns the port representing the
/// term's root, ready to be linked to a parent (typically an interface
/// `Var`).
pub fn term_to_net(net: &Network, term: &Term) -> (AgentRef, usize) {
    let mut vars: HashMap<String, Binding> = HashMap::new();
    build(net, term, &mut vars, 0, 0)
}

fn build(
    net: &Network,
    term: &Term,
    vars: &mut HashMap<String, Binding>,
    level: i64,
    depth: u64,
) -> (AgentRef, usize) {
    match term {
        Term::Var(name) => build_var(net, name, vars, level, depth),

        Term::Abs { arg, body } => {
            let fan = net.new_fan();
            // The var port holds an eraser until the binder is first used.
            let placeholder = net.new_eraser();
            net.link_at(&placeholder, 0, &fan, 2, depth);

            let shadowed = vars.insert(
                arg.clone(),
                Binding {
                    agent: Arc::clone(&fan),
                    port: 2,
                    level,
                },
            );

            let (body_agent, body_port) = build(net, body, vars, level, depth);
            net.link_at(&fan, 1, &body_agent, body_port, depth);

            match shadowed {
                Some(binding) => {
                    vars.insert(arg.clone(), binding);
                }
                None => {
                    vars.remove(arg);
                }
            }
            (fan, 0)
        }

        Term::App { fun, arg } => {
            let fan = net.new_fan();
            let (fun_agent, fun_port) = build(net, fun, vars, level, depth);
            net.link_at(&fan, 0, &fun_agent, fun_port, depth);

            // The argument lives one level and one depth below.
            let (arg_agent, arg_port) = build(net, arg, vars, level + 1, depth + 1);
            net.link_at(&fan, 2, &arg_agent, arg_port, depth + 1);

            (fan, 1)
        }

        Term::Let { name, val, body } => {
            let desugared = Term::app(
                Term::abs(name.clone(), (**body).clone()),
                (**val).clone(),
            );
            build(net, &desugared, vars, level, depth)
        }
    }
}

fn build_var(
    net: &Network,
    name: &str,
    vars: &mut HashMap<String, Binding>,
    level: i64,
    depth: u64,
) -> (AgentRef, usize) {
    if let Some(binding) = vars.get(name).cloned() {
        if binding.agent.kind() == AgentKind::Replicator {
            return widen_replicator(net, name, &binding, vars, level);
        }

        // First bound use: swap the placeholder eraser for a replicator.
        let (placeholder, _) = net
            .get_link(&binding.agent, binding.port)
            .expect("binder var port is wired");
        debug_assert_eq!(placeholder.kind(), AgentKind::Eraser);

        let delta = level - (binding.level + 1);
        let rep = net.new_replicator(binding.level + 1, vec![delta]);
        net.inner()
            .splice(PortRef::of(&rep, 0), &PortRef::of(&placeholder, 0));
        placeholder.discard();

        vars.insert(
            name.to_owned(),
            Binding {
                agent: Arc::clone(&rep),
                port: 0,
                level: binding.level,
            },
        );
        (rep, 1)
    } else {
        // Free variable, shared through a level-0 replicator.
        let var = net.new_named_var(name);
        let rep = net.new_replicator(0, vec![level - 1]);
        net.link_at(&rep, 0, &var, 0, depth);

        vars.insert(
            name.to_owned(),
            Binding {
                agent: Arc::clone(&rep),
                port: 0,
                level: 0,
            },
        );
        (rep, 1)
    }
}

/// Rebuilds the sharing replicator with one more auxiliary port, moving
/// every existing connection over, and retires the old one.
fn widen_replicator(
    net: &Network,
    name: &str,
    binding: &Binding,
    vars: &mut HashMap<String, Binding>,
    level: i64,
) -> (AgentRef, usize) {
    let old = &binding.agent;
    let mut deltas = old.deltas().to_vec();
    deltas.push(level - (binding.level + 1));
    let widened_port = deltas.len();

    let rep = net.new_replicator(old.level(), deltas);
    for index in 0..old.ports().len() {
        if old.port(index).wire().is_some() {
            net.inner()
                .splice(PortRef::of(&rep, index), &PortRef::of(old, index));
        }
    }
    old.discard();

    vars.insert(
        name.to_owned(),
        Binding {
            agent: Arc::clone(&rep),
            port: 0,
            level: binding.level,
        },
    );
    (rep, widened_port)
}
