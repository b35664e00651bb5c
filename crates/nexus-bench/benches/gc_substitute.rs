//! Generated column substitution benchmarks for NexusDB.
//!
//! Benchmarks for:
//! - Collecting indexed generated columns
//! - Rewriting filters against growing candidate sets
//! - Rewriting sort keys and projections
//! - Full optimizer runs

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use nexus_bench::utils::{filter_plan, sort_project_plan, wide_table};
use nexus_planner::optimizer::{
    collect_generated_columns, GeneratedColumnSubstitutionRule, OptimizeTrace, Optimizer,
    OptimizerConfig, OptimizerContext, OptimizerRule,
};

const BASE_COLUMNS: usize = 8;

/// Benchmark collecting candidates from the scan.
fn bench_collect(c: &mut Criterion) {
    let mut group = c.benchmark_group("gc_substitute/collect");

    for generated in [1, 8, 64].iter() {
        let table = wide_table(BASE_COLUMNS, *generated);
        let plan = filter_plan(&table, BASE_COLUMNS, 4);
        group.bench_with_input(BenchmarkId::from_parameter(generated), &plan, |b, plan| {
            b.iter(|| black_box(collect_generated_columns(black_box(&plan.root))));
        });
    }

    group.finish();
}

/// Benchmark rewriting a filter as candidates and predicates grow.
fn bench_filter(c: &mut Criterion) {
    let mut group = c.benchmark_group("gc_substitute/filter");
    let ctx = OptimizerContext::default();

    for (generated, predicates) in [(4, 4), (16, 16), (64, 32)].iter() {
        let table = wide_table(BASE_COLUMNS, *generated);
        let plan = filter_plan(&table, BASE_COLUMNS, *predicates);
        let id = format!("{}x{}", generated, predicates);
        group.bench_with_input(BenchmarkId::new("candidates_x_predicates", id), &plan, |b, plan| {
            b.iter(|| {
                let mut trace = OptimizeTrace::disabled();
                let result = GeneratedColumnSubstitutionRule.optimize(&ctx, plan.clone(), &mut trace);
                black_box((result, trace.step_count()))
            });
        });
    }

    group.finish();
}

/// Benchmark rewriting sort keys and projected expressions.
fn bench_sort_project(c: &mut Criterion) {
    let mut group = c.benchmark_group("gc_substitute/sort_project");
    let ctx = OptimizerContext::default();

    for keys in [1, 8, 32].iter() {
        let table = wide_table(BASE_COLUMNS, *keys);
        let plan = sort_project_plan(&table, BASE_COLUMNS, *keys);
        group.bench_with_input(BenchmarkId::from_parameter(keys), &plan, |b, plan| {
            b.iter(|| {
                let mut trace = OptimizeTrace::disabled();
                black_box(GeneratedColumnSubstitutionRule.optimize(&ctx, plan.clone(), &mut trace))
            });
        });
    }

    group.finish();
}

/// Benchmark the optimizer driver with tracing on and off.
fn bench_optimizer(c: &mut Criterion) {
    let mut group = c.benchmark_group("gc_substitute/optimizer");

    let table = wide_table(BASE_COLUMNS, 16);
    let plan = filter_plan(&table, BASE_COLUMNS, 16);

    for trace in [false, true].iter() {
        let optimizer = Optimizer::new(OptimizerConfig::default().with_trace(*trace));
        let name = if *trace { "traced" } else { "untraced" };
        group.bench_with_input(BenchmarkId::new("run", name), &plan, |b, plan| {
            b.iter(|| black_box(optimizer.optimize_with_stats(plan.clone())));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_collect,
    bench_filter,
    bench_sort_project,
    bench_optimizer
);
criterion_main!(benches);
