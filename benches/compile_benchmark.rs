//! Criteria compilation and batching benchmarks.
//!
//! Measures:
//! - compilation of a typical read criteria
//! - compilation of wide `where` mappings
//! - chunked batch creates against the in-memory context

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use quarry::{
    BatchExecutor, BatchOptions, Catalog, CriteriaCompiler, CriteriaSpec, Entity, EntitySchema,
    InMemoryContext, Map, MemoryStore, Operation, PredicateNode, Value,
};

fn compiler() -> CriteriaCompiler {
    let fields: Vec<String> = (0..64).map(|i| format!("F{i}")).chain(["Id".to_string()]).collect();
    let mut catalog = Catalog::new();
    catalog
        .register(EntitySchema::new("bench::Row", fields, vec!["Id".into()]).unwrap())
        .unwrap();
    catalog
        .register(EntitySchema::new("bench::Tag", vec!["Id".into()], vec!["Id".into()]).unwrap())
        .unwrap();
    CriteriaCompiler::for_entity(Arc::new(catalog), "Row").unwrap()
}

/// Benchmark a read criteria touching most directives
fn bench_compile_typical(c: &mut Criterion) {
    let compiler = compiler();
    let criteria = CriteriaSpec::new()
        .with("joins", Map::new().with("leftJoin", "Tag").with("alias", "t"))
        .with(
            "where",
            PredicateNode::and(vec![
                PredicateNode::eq("F1", ":a"),
                PredicateNode::or(vec![
                    PredicateNode::in_list("F2", [1, 2, 3]),
                    PredicateNode::is_null("%2$s.Id"),
                ]),
            ]),
        )
        .with("orderBy", "F3 DESC, F4")
        .with("limit", 50);

    c.bench_function("compile_typical", |b| {
        b.iter(|| compiler.compile(black_box(&criteria), None).unwrap());
    });
}

/// Benchmark `where` mappings of increasing width
fn bench_compile_wide_where(c: &mut Criterion) {
    let compiler = compiler();
    let mut group = c.benchmark_group("compile_wide_where");

    for width in [4usize, 16, 64] {
        let map = (0..width).fold(Map::new(), |map, i| map.with(format!("F{i}"), Value::Int(i as i64)));
        let criteria = CriteriaSpec::new().with("where", map);
        group.bench_with_input(BenchmarkId::from_parameter(width), &criteria, |b, criteria| {
            b.iter(|| compiler.compile(black_box(criteria), None).unwrap());
        });
    }

    group.finish();
}

#[derive(Clone)]
struct Row(usize);

impl Entity for Row {
    fn identity(&self) -> String {
        self.0.to_string()
    }
}

/// Benchmark chunked creates
fn bench_batch_create(c: &mut Criterion) {
    let rows: Vec<Row> = (0..1000).map(Row).collect();
    let mut group = c.benchmark_group("batch_create");

    for chunk in [10usize, 100, 1000] {
        let options = BatchOptions::new().with_iterations(chunk).with_cleanup(true);
        group.bench_with_input(BenchmarkId::from_parameter(chunk), &options, |b, options| {
            b.iter(|| {
                let mut ctx = InMemoryContext::new(MemoryStore::new());
                BatchExecutor::new(&mut ctx)
                    .run(black_box(&rows), Operation::Create, options)
                    .unwrap()
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_compile_typical,
    bench_compile_wide_where,
    bench_batch_create
);
criterion_main!(benches);
