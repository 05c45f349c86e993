//! Benchmarks for the reduction engine.
//!
//! These measure the cost of translation, of the scheduler's push/pop
//! churn, and of full two-phase normalisation on a term with real sharing,
//! establishing a baseline for scheduler and rewrite-path changes.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use deltanet::prelude::*;

/// Church numeral `n` as a term.
fn church(n: u32) -> Term {
    let mut body = Term::var("x");
    for _ in 0..n {
        body = Term::app(Term::var("f"), body);
    }
    Term::abs("f", Term::abs("x", body))
}

/// `two two`: exponentiation by application, a small term with heavy
/// sharing traffic through the replicators.
fn shared_workload() -> Term {
    Term::app(church(2), church(2))
}

/// Benchmarks translating a term into a fresh net.
fn bench_translate(c: &mut Criterion) {
    let term = shared_workload();
    c.bench_function("translate_two_two", |b| {
        b.iter(|| {
            let net = Network::new();
            let (root, port) = term_to_net(&net, black_box(&term));
            black_box((root.id(), port));
        });
    });
}

/// Benchmarks full two-phase normalisation with a single worker.
fn bench_normalize(c: &mut Criterion) {
    let term = shared_workload();
    c.bench_function("normalize_two_two", |b| {
        b.iter(|| {
            let net = Network::new();
            net.set_workers(1);
            let (root, port) = term_to_net(&net, &term);
            let out = net.new_var();
            net.link(&root, port, &out, 0);
            net.reduce_to_normal_form();
            black_box(net.get_stats().total_reductions);
        });
    });
}

/// Benchmarks the bounded driver on a non-normalising term, which also
/// exercises the periodic dead-agent sweep.
fn bench_bounded_omega(c: &mut Criterion) {
    let dup = Term::abs("x", Term::app(Term::var("x"), Term::var("x")));
    let omega = Term::app(dup.clone(), dup);
    c.bench_function("omega_500_bounded", |b| {
        b.iter(|| {
            let net = Network::new();
            let (root, port) = term_to_net(&net, &omega);
            let out = net.new_var();
            net.link(&root, port, &out, 0);
            black_box(net.reduce_with_limit(500));
        });
    });
}

criterion_group!(
    benches,
    bench_translate,
    bench_normalize,
    bench_bounded_omega
);
criterion_main!(benches);
