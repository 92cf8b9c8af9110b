//! Handoff stack benchmarks.
//!
//! Run with: `cargo bench --bench handoff_stack`
//!
//! Uncontended push/pop pairs against a `Mutex<Vec>` baseline, then pairs
//! issued from several threads at once.

use std::hint::black_box;
use std::thread;
use std::time::Instant;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use parking_lot::Mutex;
use surgekit::ds::HandoffStack;

const OPS: u64 = 100_000;

fn bench_push_pop(c: &mut Criterion) {
    let mut group = c.benchmark_group("push_pop_pair");
    group.throughput(Throughput::Elements(OPS));

    group.bench_function("handoff_stack", |b| {
        let stack = HandoffStack::new();
        b.iter(|| {
            for i in 0..OPS {
                stack.push(i);
                black_box(stack.pop());
            }
        })
    });

    group.bench_function("mutex_vec", |b| {
        let stack = Mutex::new(Vec::new());
        b.iter(|| {
            for i in 0..OPS {
                stack.lock().push(i);
                black_box(stack.lock().pop());
            }
        })
    });
    group.finish();
}

fn bench_contended(c: &mut Criterion) {
    let mut group = c.benchmark_group("push_pop_contended");

    for threads in [2usize, 4, 8] {
        let per_thread = OPS / threads as u64;
        group.throughput(Throughput::Elements(per_thread * threads as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(threads),
            &threads,
            |b, &threads| {
                b.iter_custom(|iters| {
                    let stack = HandoffStack::new();
                    let start = Instant::now();
                    thread::scope(|scope| {
                        for _ in 0..threads {
                            let stack = &stack;
                            scope.spawn(move || {
                                for _ in 0..iters {
                                    for i in 0..per_thread {
                                        stack.push(i);
                                        black_box(stack.pop());
                                    }
                                }
                            });
                        }
                    });
                    start.elapsed()
                })
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_push_pop, bench_contended);
criterion_main!(benches);
