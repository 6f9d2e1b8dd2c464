//! Benchmarks for snapshot installation and copy-on-write updates.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use reqscope::context::{ContextHolder, ContextSnapshot, Identity, Locale};
use reqscope::propagation::PropagationToken;

fn sample() -> ContextSnapshot {
    let mut snapshot = ContextSnapshot::empty()
        .with_identity(Identity::new("bench-user").with_role("reader"))
        .with_token("bench-token")
        .with_locale(Locale::parse("en-GB"));
    for i in 0..16 {
        snapshot = snapshot.with_property(format!("key-{i}"), format!("value-{i}"));
    }
    snapshot
}

fn propagation_benchmark(c: &mut Criterion) {
    let token = PropagationToken::new(sample());

    c.bench_function("install_restore", |b| {
        b.iter(|| {
            let previous = token.install();
            token.restore(black_box(previous));
        });
    });

    c.bench_function("scope_read_token", |b| {
        b.iter(|| token.scope(|| black_box(ContextHolder::current().token().is_some())));
    });

    let snapshot = sample();
    c.bench_function("set_property", |b| {
        b.iter(|| black_box(snapshot.with_property("key-3", "changed")));
    });
}

criterion_group!(benches, propagation_benchmark);
criterion_main!(benches);
