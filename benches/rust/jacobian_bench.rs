//! Jacobian Pipeline Benchmark
//!
//! Chained Rosenbrock function in N variables:
//! build graph -> Jacobian of the gradient (Hessian) -> compile -> evaluate.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use symb_graph::{CompileOptions, Context, Differentiator, NodeId, compile};

// =============================================================================
// Test Function
// =============================================================================

/// `Σ 100 (x_{i+1} - x_i²)² + (1 - x_i)²`
fn chained_rosenbrock(ctx: &mut Context, n: usize) -> (NodeId, Vec<NodeId>) {
    let vars = ctx.make_variables("x", n);
    let one = ctx.make_constant(1.0);
    let mut terms = Vec::with_capacity(2 * n);
    for pair in vars.windows(2) {
        let sq = ctx.square(pair[0]).unwrap();
        let d = ctx.sub(pair[1], sq).unwrap();
        let d2 = ctx.square(d).unwrap();
        terms.push(ctx.scale(100.0, d2).unwrap());
        let e = ctx.sub(one, pair[0]).unwrap();
        terms.push(ctx.square(e).unwrap());
    }
    (ctx.sum(&terms).unwrap(), vars)
}

// =============================================================================
// Benchmarks
// =============================================================================

fn bench_hessian_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("hessian_build");
    for n in [10, 100, 1000] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| {
                let mut ctx = Context::new();
                let (f, vars) = chained_rosenbrock(&mut ctx, n);
                let h = Differentiator::new().hessian(&mut ctx, f, &vars).unwrap();
                black_box(h)
            });
        });
    }
    group.finish();
}

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile_gradient");
    for n in [10, 100, 1000] {
        let mut ctx = Context::new();
        let (f, vars) = chained_rosenbrock(&mut ctx, n);
        let grad = Differentiator::new().gradient(&mut ctx, f, &vars).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| {
                compile::<[f64], Vec<f64>>(&ctx, &grad, &vars, &CompileOptions::new()).unwrap()
            });
        });
    }
    group.finish();
}

fn bench_evaluate(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluate_gradient");
    for n in [10, 100, 1000] {
        let mut ctx = Context::new();
        let (f, vars) = chained_rosenbrock(&mut ctx, n);
        let grad = Differentiator::new().gradient(&mut ctx, f, &vars).unwrap();
        let eval = symb_graph::compile_in_place::<[f64], [f64]>(
            &ctx,
            &grad,
            &vars,
            &CompileOptions::new(),
        )
        .unwrap();
        let point = vec![0.5; n];
        let mut out = vec![0.0; n];
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| {
                eval.evaluate_into(black_box(&point), &mut out).unwrap();
            });
        });
    }
    group.finish();
}

fn bench_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluate_batch_1000_points");
    let n = 10;
    let mut ctx = Context::new();
    let (f, vars) = chained_rosenbrock(&mut ctx, n);
    let eval = compile::<[f64], Vec<f64>>(&ctx, f, &vars, &CompileOptions::new()).unwrap();

    let columns: Vec<Vec<f64>> = (0..10_u32)
        .map(|j| {
            (0..1000_u32)
                .map(|p| 0.001 * f64::from(p) - 0.1 * f64::from(j))
                .collect()
        })
        .collect();
    let views: Vec<&[f64]> = columns.iter().map(Vec::as_slice).collect();
    let mut out = vec![0.0; 1000];

    group.bench_function("simd", |b| {
        b.iter(|| eval.evaluate_batch(black_box(&views), &mut [&mut out[..]]).unwrap());
    });
    group.bench_function("scalar", |b| {
        let mut point = vec![0.0; n];
        b.iter(|| {
            for p in 0..1000 {
                for (v, c) in point.iter_mut().zip(&columns) {
                    *v = c[p];
                }
                black_box(eval.evaluate(&point).unwrap());
            }
        });
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_hessian_build,
    bench_compile,
    bench_evaluate,
    bench_batch
);
criterion_main!(benches);
