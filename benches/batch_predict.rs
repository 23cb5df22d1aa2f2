//! Benchmarks for partition-parallel prediction

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use scoreflow_core::checkpoint::Checkpoint;
use scoreflow_core::predictor::LinearPredictor;
use scoreflow_core::{BatchPredictor, Dataset, PredictOptions};
use serde_json::json;
use tokio::runtime::Runtime;

fn factor_checkpoint(factor: f64) -> Checkpoint {
    Checkpoint::from_value(json!({ "factor": factor })).unwrap()
}

fn rows(count: usize) -> Dataset {
    Dataset::from_items((0..count).map(|v| v as f64))
}

fn bench_predict_worker_counts(c: &mut Criterion) {
    let mut group = c.benchmark_group("predict_worker_counts");
    let runtime = Runtime::new().unwrap();
    let predictor = BatchPredictor::from_checkpoint::<LinearPredictor>(factor_checkpoint(2.0));
    let dataset = rows(100_000).repartition(32).unwrap();

    for workers in [1, 2, 4, 8].iter() {
        let options = PredictOptions::default()
            .with_min_workers(*workers)
            .with_max_workers(*workers);
        group.bench_with_input(
            BenchmarkId::from_parameter(workers),
            &options,
            |b, options| {
                b.iter(|| {
                    runtime
                        .block_on(predictor.predict(dataset.clone(), options))
                        .unwrap()
                });
            },
        );
    }
    group.finish();
}

fn bench_predict_partition_counts(c: &mut Criterion) {
    let mut group = c.benchmark_group("predict_partition_counts");
    let runtime = Runtime::new().unwrap();
    let predictor = BatchPredictor::from_checkpoint::<LinearPredictor>(factor_checkpoint(2.0));

    for partitions in [1, 8, 64, 256].iter() {
        let dataset = rows(100_000).repartition(*partitions).unwrap();
        group.bench_with_input(
            BenchmarkId::from_parameter(partitions),
            &dataset,
            |b, dataset| {
                b.iter(|| {
                    runtime
                        .block_on(predictor.predict(dataset.clone(), &PredictOptions::default()))
                        .unwrap()
                });
            },
        );
    }
    group.finish();
}

fn bench_repartition(c: &mut Criterion) {
    let mut group = c.benchmark_group("repartition");

    for partitions in [4, 64, 1024].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(partitions),
            partitions,
            |b, &partitions| {
                b.iter(|| rows(65_536).repartition(black_box(partitions)).unwrap());
            },
        );
    }
    group.finish();
}

fn bench_checkpoint_transfer(c: &mut Criterion) {
    let mut group = c.benchmark_group("checkpoint_transfer");

    let checkpoint = factor_checkpoint(2.0);
    group.bench_function("to_bytes", |b| {
        b.iter(|| checkpoint.to_bytes().unwrap());
    });

    let bytes = checkpoint.to_bytes().unwrap();
    group.bench_function("from_bytes", |b| {
        b.iter(|| Checkpoint::from_bytes(black_box(&bytes)).unwrap());
    });

    group.bench_function("materialize_directory", |b| {
        b.iter(|| {
            let dir = checkpoint.as_directory().unwrap();
            black_box(dir.path().to_path_buf())
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_predict_worker_counts,
    bench_predict_partition_counts,
    bench_repartition,
    bench_checkpoint_transfer
);
criterion_main!(benches);
