//! Throughput benchmarks for `MpscQueue`.
//!
//! Run with: `cargo bench -p mpscq`

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use mpscq::MpscQueue;
use std::sync::Arc;
use std::thread;

fn bench_offer_poll(c: &mut Criterion) {
    let mut group = c.benchmark_group("offer_poll");
    group.throughput(Throughput::Elements(1));
    group.bench_function("single_thread", |b| {
        let queue = MpscQueue::with_capacity(1024);
        b.iter(|| {
            queue.offer(1u64).unwrap();
            queue.poll().unwrap()
        });
    });
    group.finish();
}

fn bench_drain_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("drain_batch");
    for batch in [16usize, 128, 1024] {
        group.throughput(Throughput::Elements(batch as u64));
        group.bench_with_input(BenchmarkId::from_parameter(batch), &batch, |b, &batch| {
            let queue = MpscQueue::with_capacity(2048);
            b.iter(|| {
                for i in 0..batch as u64 {
                    queue.offer(i).unwrap();
                }
                let mut sum = 0u64;
                queue.drain(|item| sum += item, batch);
                sum
            });
        });
    }
    group.finish();
}

fn bench_contended_offer(c: &mut Criterion) {
    let mut group = c.benchmark_group("contended_offer");
    for producers in [2usize, 4] {
        group.throughput(Throughput::Elements(1024));
        group.bench_with_input(
            BenchmarkId::from_parameter(producers),
            &producers,
            |b, &producers| {
                b.iter(|| {
                    let queue = Arc::new(MpscQueue::with_capacity(4096));
                    let handles: Vec<_> = (0..producers)
                        .map(|_| {
                            let queue = Arc::clone(&queue);
                            thread::spawn(move || {
                                for i in 0..1024 / producers as u64 {
                                    let mut item = i;
                                    loop {
                                        match queue.offer(item) {
                                            Ok(()) => break,
                                            Err(rejected) => item = rejected.0,
                                        }
                                    }
                                }
                            })
                        })
                        .collect();
                    for handle in handles {
                        handle.join().unwrap();
                    }
                    let mut count = 0usize;
                    queue.drain(|_| count += 1, usize::MAX);
                    count
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_offer_poll, bench_drain_batch, bench_contended_offer);
criterion_main!(benches);
