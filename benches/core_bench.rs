//! Benchmarks for armforge core operations.
//!
//! Run with: cargo bench
//!
//! Results include 95% confidence intervals via Criterion.

use armforge::core::assembler::render;
use armforge::core::catalog::TypeCatalog;
use armforge::core::discovery::{discover_project, parse_source, DiscoverOptions};
use armforge::core::pipeline::build;
use armforge::core::resolver::resolve;
use armforge::core::types::{Discovery, Envelope};
use armforge::diff::hasher;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::path::Path;

/// A chain of `n` storage accounts, each referencing the previous one.
fn chain_source(n: usize) -> String {
    let mut src = String::from("use armforge::azure::storage;\n\n");
    for i in 0..n {
        let peer = if i == 0 {
            "None".to_string()
        } else {
            format!("Some(ACCOUNT_{:04}.id())", i - 1)
        };
        src.push_str(&format!(
            "pub const ACCOUNT_{i:04}: storage::Account = storage::Account {{\n    \
             name: \"acct{i:04}\",\n    location: LOCATION,\n    peer: {peer},\n    \
             tags: BTreeMap::from([(\"env\", \"prod\")]),\n}};\n\n"
        ));
    }
    src.push_str("const LOCATION: &str = \"westeurope\";\n");
    src
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_source");
    for n in [10, 100, 500] {
        let src = chain_source(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &src, |b, src| {
            b.iter(|| {
                let module = parse_source(Path::new("bench.rs"), black_box(src)).unwrap();
                let mut out = Discovery::default();
                module.extract(&TypeCatalog::azure(), &mut out);
                black_box(out);
            });
        });
    }
    group.finish();
}

fn bench_resolve(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve");
    for n in [10, 100, 500] {
        let module = parse_source(Path::new("bench.rs"), &chain_source(n)).unwrap();
        let mut discovery = Discovery::default();
        module.extract(&TypeCatalog::azure(), &mut discovery);
        // reverse declarations so every node waits on its dependency
        discovery.resources.reverse();
        group.bench_with_input(
            BenchmarkId::from_parameter(n),
            &discovery.resources,
            |b, resources| {
                b.iter(|| black_box(resolve(black_box(resources)).unwrap()));
            },
        );
    }
    group.finish();
}

fn bench_build(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("infra.rs"), chain_source(100)).unwrap();

    c.bench_function("build_100", |b| {
        b.iter(|| {
            let result = build(
                black_box(dir.path()),
                &TypeCatalog::azure(),
                &Envelope::default(),
                &DiscoverOptions::default(),
            )
            .unwrap();
            black_box(render(&result.document));
        });
    });

    c.bench_function("discover_100", |b| {
        b.iter(|| {
            let d = discover_project(dir.path(), &TypeCatalog::azure(), &DiscoverOptions::default())
                .unwrap();
            black_box(d);
        });
    });
}

fn bench_fingerprint(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("infra.rs"), chain_source(100)).unwrap();
    let result = build(
        dir.path(),
        &TypeCatalog::azure(),
        &Envelope::default(),
        &DiscoverOptions::default(),
    )
    .unwrap();

    c.bench_function("fingerprint_document_100", |b| {
        b.iter(|| black_box(hasher::fingerprint_document(black_box(&result.document))));
    });
}

criterion_group!(
    benches,
    bench_parse,
    bench_resolve,
    bench_build,
    bench_fingerprint
);
criterion_main!(benches);
