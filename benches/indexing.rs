//! Indexing and query throughput benchmarks over synthetic workspaces.
//!
//! Run with: `cargo bench`
//! Save baseline: `cargo bench -- --save-baseline main`
//! Compare: `cargo bench -- --baseline main`

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use navix::{
    IndexBuilder, ItemStore, MemoryStore, NullSymbolProvider, QueryEngine, SearchConfig,
    SqliteStore, StaticEnumerator,
};
use std::sync::{Arc, Mutex};

fn synthetic_paths(count: usize) -> Vec<String> {
    const VERBS: [&str; 10] = [
        "get", "set", "process", "load", "save", "update", "delete", "fetch", "parse", "build",
    ];
    const NOUNS: [&str; 10] = [
        "Data", "User", "Config", "File", "Index", "Cache", "Query", "Token", "Event", "State",
    ];
    const SUFFIXES: [&str; 10] = [
        "Handler", "Manager", "Service", "Worker", "Helper", "Reader", "Writer", "Builder",
        "Parser", "Mapper",
    ];

    let mut paths = Vec::with_capacity(count);
    'outer: for verb in VERBS {
        for noun in NOUNS {
            for suffix in SUFFIXES {
                if paths.len() >= count {
                    break 'outer;
                }
                paths.push(format!("src/{verb}{noun}{suffix}.ts"));
            }
        }
    }
    paths
}

fn built_store(paths: Vec<String>) -> navix::index::SharedStore {
    let mut store = MemoryStore::new();
    store.initialize().unwrap();
    let shared: navix::index::SharedStore = Arc::new(Mutex::new(Box::new(store)));
    let builder = IndexBuilder::new(shared.clone(), SearchConfig::default());
    builder
        .build_initial(&StaticEnumerator::new(paths), &NullSymbolProvider, None)
        .unwrap();
    shared
}

fn bench_build(c: &mut Criterion) {
    let paths = synthetic_paths(1000);

    let mut group = c.benchmark_group("build");
    group.sample_size(20);

    group.bench_function("memory_1k_files", |b| {
        b.iter_batched(
            || {
                let mut store = MemoryStore::new();
                store.initialize().unwrap();
                let shared: navix::index::SharedStore = Arc::new(Mutex::new(Box::new(store)));
                (
                    IndexBuilder::new(shared.clone(), SearchConfig::default()),
                    StaticEnumerator::new(paths.clone()),
                )
            },
            |(builder, enumerator)| {
                builder
                    .build_initial(&enumerator, &NullSymbolProvider, None)
                    .unwrap()
            },
            BatchSize::LargeInput,
        )
    });

    group.bench_function("sqlite_1k_files", |b| {
        b.iter_batched(
            || {
                let mut store = SqliteStore::open_in_memory(10_000).unwrap();
                store.initialize().unwrap();
                let shared: navix::index::SharedStore = Arc::new(Mutex::new(Box::new(store)));
                (
                    IndexBuilder::new(shared.clone(), SearchConfig::default()),
                    StaticEnumerator::new(paths.clone()),
                )
            },
            |(builder, enumerator)| {
                builder
                    .build_initial(&enumerator, &NullSymbolProvider, None)
                    .unwrap()
            },
            BatchSize::LargeInput,
        )
    });

    group.finish();
}

fn bench_query(c: &mut Criterion) {
    let shared = built_store(synthetic_paths(1000));
    let config = SearchConfig::default();

    let mut group = c.benchmark_group("query");

    for query in ["processData", "gUN", "parser", "xyz"] {
        group.bench_function(query, |b| {
            b.iter(|| {
                let guard = shared.lock().unwrap();
                let hits = QueryEngine::new(guard.as_ref(), &config)
                    .search(black_box(query), 50)
                    .unwrap();
                black_box(hits)
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_build, bench_query);
criterion_main!(benches);
