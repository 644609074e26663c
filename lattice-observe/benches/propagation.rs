//! Benchmarks for observation and change propagation
//!
//! Run with: cargo bench -p lattice-observe

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use lattice_observe::reactive::{observe, Watcher, WatcherOptions};
use lattice_observe::scheduler::Scheduler;
use lattice_observe::value::{Array, Object, Value};
use std::hint::black_box;

/// An object with `n` numeric keys.
fn make_object(n: usize) -> Object {
    (0..n).fold(Object::new(), |obj, i| obj.with(&format!("k{i}"), i))
}

/// An array of `n` small objects.
fn make_list(n: usize) -> Array {
    (0..n)
        .map(|i| Value::from(Object::new().with("id", i).with("done", false)))
        .collect()
}

fn bench_observe(c: &mut Criterion) {
    let mut group = c.benchmark_group("observe/wrap");

    for n in [10, 100, 1000] {
        group.bench_with_input(BenchmarkId::new("object", n), &n, |b, &n| {
            b.iter_batched(
                || Value::from(make_object(n)),
                |v| black_box(observe(&v, false)),
                BatchSize::SmallInput,
            )
        });
        group.bench_with_input(BenchmarkId::new("array_of_objects", n), &n, |b, &n| {
            b.iter_batched(
                || Value::from(make_list(n)),
                |v| black_box(observe(&v, false)),
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

fn bench_write_flush(c: &mut Criterion) {
    let mut group = c.benchmark_group("observe/write_flush");

    for watchers in [1, 10, 100] {
        let state = Object::new().with("count", 0);
        observe(&Value::from(state.clone()), false);
        let scheduler = Scheduler::manual();

        let _watchers: Vec<Watcher> = (0..watchers)
            .map(|_| {
                let reader = state.clone();
                Watcher::with_options(
                    move || {
                        black_box(reader.get("count"));
                    },
                    WatcherOptions {
                        scheduler: Some(scheduler.clone()),
                        ..Default::default()
                    },
                )
            })
            .collect();

        let mut next = 0u64;
        group.bench_with_input(BenchmarkId::new("watchers", watchers), &watchers, |b, _| {
            b.iter(|| {
                next += 1;
                state.set("count", next);
                black_box(scheduler.flush())
            })
        });
    }

    group.finish();
}

fn bench_array_push(c: &mut Criterion) {
    let mut group = c.benchmark_group("observe/array_push");

    group.bench_function("observed", |b| {
        b.iter_batched(
            || {
                let list = Array::new();
                observe(&Value::from(list.clone()), false);
                list
            },
            |list| {
                for i in 0..100 {
                    list.push([Value::from(Object::new().with("id", i))]);
                }
            },
            BatchSize::SmallInput,
        )
    });
    group.bench_function("plain", |b| {
        b.iter_batched(
            Array::new,
            |list| {
                for i in 0..100 {
                    list.push([Value::from(Object::new().with("id", i))]);
                }
            },
            BatchSize::SmallInput,
        )
    });

    group.finish();
}

criterion_group!(benches, bench_observe, bench_write_flush, bench_array_push);
criterion_main!(benches);
