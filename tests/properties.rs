//! Property-level tests: round trips, fixpoints, confluence across worker
//! counts, and reproducibility.

use deltanet::prelude::*;

fn reduce_term(input: &Term, workers: Option<usize>) -> (Network, AgentRef, usize) {
    let net = Network::new();
    if let Some(workers) = workers {
        net.set_workers(workers);
    }
    let (root, port) = term_to_net(&net, input);
    let out = net.new_var();
    net.link(&root, port, &out, 0);
    net.reduce_to_normal_form();
    let (result, result_port) = net.get_link(&out, 0).expect("result stays wired");
    (net, result, result_port)
}

/// Terms already in normal form survive translate-then-read-back.
#[test]
fn round_trip_preserves_normal_forms() {
    let cases = [
        Term::abs("x", Term::var("x")),
        Term::abs("x", Term::abs("y", Term::var("x"))),
        // Church numeral two.
        Term::abs(
            "f",
            Term::abs(
                "x",
                Term::app(Term::var("f"), Term::app(Term::var("f"), Term::var("x"))),
            ),
        ),
        Term::app(Term::var("f"), Term::var("g")),
    ];

    for term in &cases {
        let net = Network::new();
        let (root, port) = term_to_net(&net, term);
        let out = net.new_var();
        net.link(&root, port, &out, 0);
        let (result, result_port) = net.get_link(&out, 0).expect("root wired");
        let back = term_from_net(&net, &result, result_port);
        assert!(
            back.alpha_eq(term),
            "round trip changed the term: {term} became {back}"
        );
    }
}

/// Bounded reduction with a zero limit does nothing.
#[test]
fn reduce_with_limit_zero_performs_nothing() {
    let dup = Term::abs("x", Term::app(Term::var("x"), Term::var("x")));
    let omega = Term::app(dup.clone(), dup);

    let net = Network::new();
    let (root, port) = term_to_net(&net, &omega);
    let out = net.new_var();
    net.link(&root, port, &out, 0);

    let queued = net.queued_active_pairs();
    assert_eq!(net.reduce_with_limit(0), 0);
    assert_eq!(net.get_stats().total_reductions, 0);
    assert_eq!(net.queued_active_pairs(), queued);
}

/// After the driver has run its canonical passes to fixpoint, another pass
/// reports no change.
#[test]
fn canonical_rules_reach_a_fixpoint() {
    let input = Term::app(
        Term::abs(
            "f",
            Term::app(Term::var("f"), Term::app(Term::var("f"), Term::var("x"))),
        ),
        Term::abs("y", Term::var("y")),
    );
    let (net, _, _) = reduce_term(&input, Some(1));
    assert!(!net.apply_canonical_rules());
    assert!(!net.apply_canonical_rules());
}

/// Pruning from the result root is idempotent: the second pass finds
/// nothing reachable to change.
#[test]
fn erasure_canonicalisation_is_idempotent() {
    let k = Term::abs("x", Term::abs("y", Term::var("x")));
    let input = Term::app(Term::app(k, Term::var("a")), Term::var("b"));
    let (net, result, result_port) = reduce_term(&input, Some(1));

    net.canonicalize(&result, result_port);
    let first = net_fingerprint(&net, &result, result_port);

    net.canonicalize(&result, result_port);
    let second = net_fingerprint(&net, &result, result_port);

    assert_eq!(first, second);
    net.validate().expect("well-formed after pruning twice");
}

/// Church–Rosser: the normal form does not depend on the worker count.
#[test]
fn normal_form_is_independent_of_worker_count() {
    let input = Term::app(
        Term::abs(
            "f",
            Term::app(Term::var("f"), Term::app(Term::var("f"), Term::var("x"))),
        ),
        Term::abs("y", Term::var("y")),
    );

    let mut reference: Option<Term> = None;
    for workers in [1usize, 2, 4, 8] {
        let (net, result, result_port) = reduce_term(&input, Some(workers));
        net.canonicalize(&result, result_port);
        let term = term_from_net(&net, &result, result_port);
        match &reference {
            None => reference = Some(term),
            Some(expected) => assert!(
                term.alpha_eq(expected),
                "worker count {workers} changed the normal form: {expected} vs {term}"
            ),
        }
    }
}

/// With one worker the whole reduction is deterministic: repeated runs
/// produce identical statistics and identical result fingerprints.
#[test]
fn single_worker_runs_are_reproducible() {
    let input = Term::app(
        Term::abs(
            "f",
            Term::app(Term::var("f"), Term::app(Term::var("f"), Term::var("x"))),
        ),
        Term::abs("y", Term::var("y")),
    );

    let run = || {
        let (net, result, result_port) = reduce_term(&input, Some(1));
        net.canonicalize(&result, result_port);
        (net.get_stats(), net_fingerprint(&net, &result, result_port))
    };

    let (stats_a, print_a) = run();
    let (stats_b, print_b) = run();
    assert_eq!(stats_a, stats_b);
    assert_eq!(print_a, print_b);
}

/// Erased subterms leave no live agents behind once pruned and swept.
#[test]
fn pruning_and_sweeping_reclaim_erased_structure() {
    let k = Term::abs("x", Term::abs("y", Term::var("x")));
    let input = Term::app(Term::app(k, Term::var("a")), Term::var("b"));
    let (net, result, result_port) = reduce_term(&input, Some(1));

    net.canonicalize(&result, result_port);
    net.collect_garbage();
    net.validate().expect("well-formed after sweep");

    // The sweep leaves no dead entries, and what survives is only the
    // small component around the result.
    assert_eq!(net.node_count(), net.active_node_count());
    assert!(
        net.active_node_count() <= 8,
        "expected a pruned net, {} agents remain",
        net.active_node_count()
    );
}
