use criterion::{black_box, criterion_group, criterion_main, Criterion};
use stackless_coro::*;

suspend_points! {
    enum CountPoint {
        AfterYield,
    }
}

struct Counter {
    value: u64,
}

impl CoroutineBody for Counter {
    type Point = CountPoint;
    type Resume = ();
    type Output = u64;

    fn advance(&mut self, entry: Entry<CountPoint>, _arg: ()) -> Step<CountPoint, u64> {
        if let Entry::After(CountPoint::AfterYield) = entry {
            self.value += 1;
        }

        Step::Suspend(CountPoint::AfterYield, self.value)
    }
}

fn resume_benchmark(c: &mut Criterion) {
    let mut counter = Coroutine::new(Counter { value: 0 });

    let repeat = 1000;

    c.bench_function("Coroutine Resume", |b| {
        b.iter(|| {
            for _ in 0..repeat {
                black_box(counter.resume(()));
            }
        })
    });
}

criterion_group!(benches, resume_benchmark,);
criterion_main!(benches);
