//! Benchmarks for pipeline execution.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use railflow::prelude::*;

fn pipeline_benchmark(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("three_step_pipeline", |b| {
        b.iter(|| {
            runtime.block_on(async {
                Pipeline::new(black_box(5_u64))
                    .map(|v| v * 2)
                    .map(|v| v + 1)
                    .map(|v| v.saturating_sub(3))
                    .execute()
                    .await
            })
        });
    });

    c.bench_function("ten_thunk_fan_out", |b| {
        b.iter(|| {
            runtime.block_on(async {
                let thunks = (0..10)
                    .map(|i| thunk(move || async move { success(black_box(i)) }))
                    .collect();
                parallel(thunks).await
            })
        });
    });
}

criterion_group!(benches, pipeline_benchmark);
criterion_main!(benches);
