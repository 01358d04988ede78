use criterion::{black_box, criterion_group, criterion_main, Criterion};
use stackless_coro::*;

fn task_resume_benchmark(c: &mut Criterion) {
    let repeat = 1000;

    c.bench_function("Task Resume", |b| {
        b.iter(|| {
            let mut task = Task::<_, NoBlock>::new(|_handle| async {
                for _ in 0..repeat {
                    yield_now().await;
                }
                0u64
            });

            while task.resume() {}

            black_box(task.take_output())
        })
    });

    c.bench_function("Blocked Task Resume", |b| {
        let mut task = Task::<_, Atomic>::new(|_handle| async {
            yield_now().await;
            0u64
        });

        task.handle().block();

        b.iter(|| {
            for _ in 0..repeat {
                black_box(task.resume());
            }
        })
    });
}

criterion_group!(benches, task_resume_benchmark,);
criterion_main!(benches);
