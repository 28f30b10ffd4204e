use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use sluice::prelude::*;
use std::hint::black_box;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Runtime::new().unwrap()
}

fn bench_basic_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("basic_pipeline");
    let rt = runtime();

    for size in [100, 1000, 10000].iter() {
        group.throughput(Throughput::Elements(*size as u64));

        group.bench_with_input(BenchmarkId::new("collect", size), size, |b, &size| {
            b.iter(|| {
                rt.block_on(async {
                    let items = Stream::iter(0..size).collect().await.unwrap();
                    black_box(items);
                })
            });
        });

        group.bench_with_input(BenchmarkId::new("map", size), size, |b, &size| {
            b.iter(|| {
                rt.block_on(async {
                    let items = Stream::iter(0..size)
                        .map(|x: i64| black_box(x * 2))
                        .collect()
                        .await
                        .unwrap();
                    black_box(items);
                })
            });
        });
    }

    group.finish();
}

fn bench_buffer_size(c: &mut Criterion) {
    let mut group = c.benchmark_group("buffer_size");
    let rt = runtime();
    group.throughput(Throughput::Elements(10000));

    for buffer_size in [0, 1, 16, 256].iter() {
        group.bench_with_input(
            BenchmarkId::new("map_filter", buffer_size),
            buffer_size,
            |b, &buffer_size| {
                b.iter(|| {
                    rt.block_on(async {
                        let count = SourceBuilder::new(StreamConfig::default().buffer_size(buffer_size))
                            .iter(0..10000i64)
                            .map(|x| black_box(x + 1))
                            .filter(|x| x % 2 == 0)
                            .count()
                            .await
                            .unwrap();
                        black_box(count);
                    })
                });
            },
        );
    }

    group.finish();
}

fn bench_combinators(c: &mut Criterion) {
    let mut group = c.benchmark_group("combinators");
    let rt = runtime();

    group.bench_function("filter_map_limit", |b| {
        b.iter(|| {
            rt.block_on(async {
                let items = Stream::iter(0..10000i64)
                    .filter(|x| x % 2 == 0)
                    .map(|x| black_box(x * 3))
                    .limit(1000)
                    .collect()
                    .await
                    .unwrap();
                black_box(items);
            })
        });
    });

    group.bench_function("generate_limit_sum", |b| {
        b.iter(|| {
            rt.block_on(async {
                let sum = Stream::generate(|| black_box(1u32))
                    .limit(1000)
                    .sum()
                    .await
                    .unwrap();
                black_box(sum);
            })
        });
    });

    group.bench_function("sort_then_first", |b| {
        b.iter(|| {
            rt.block_on(async {
                let first = Stream::iter((0..5000i64).rev())
                    .sort()
                    .await
                    .unwrap()
                    .first()
                    .await
                    .unwrap();
                black_box(first);
            })
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_basic_pipeline,
    bench_buffer_size,
    bench_combinators
);
criterion_main!(benches);
