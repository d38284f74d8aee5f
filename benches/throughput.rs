use criterion::{black_box, criterion_group, criterion_main, Criterion};
use provider_resilience::{
    retry, BreakerConfig, CircuitBreaker, CircuitBreakerRegistry, RetryPolicy,
};
use std::io;
use std::time::Duration;

fn successful_operation() -> Result<(), io::Error> {
    Ok(())
}

fn failing_operation() -> Result<(), io::Error> {
    Err(io::ErrorKind::TimedOut.into())
}

fn bench_circuit_breaker_closed(c: &mut Criterion) {
    let breaker = CircuitBreaker::builder("bench")
        .open_timeout(Duration::from_secs(30))
        .build();

    c.bench_function("circuit_breaker_closed_success", |b| {
        b.iter(|| black_box(breaker.call(successful_operation)));
    });
}

fn bench_circuit_breaker_open_rejection(c: &mut Criterion) {
    let breaker = CircuitBreaker::builder("bench")
        .open_timeout(Duration::from_secs(3600))
        .build();
    breaker.force_open();

    c.bench_function("circuit_breaker_open_rejection", |b| {
        b.iter(|| black_box(breaker.call(successful_operation)));
    });
}

fn bench_circuit_breaker_transition(c: &mut Criterion) {
    let breaker = CircuitBreaker::builder("bench")
        .failure_threshold(5)
        .open_timeout(Duration::from_secs(30))
        .build();

    c.bench_function("circuit_breaker_transition", |b| {
        b.iter_custom(|iters| {
            let start = std::time::Instant::now();

            for _ in 0..iters {
                // Reset to ensure consistent starting point
                breaker.reset();

                // Make 5 failing calls to trip the breaker
                for _ in 0..5 {
                    let _ = black_box(breaker.call(failing_operation));
                }

                // One open-circuit rejection
                let _ = black_box(breaker.call(successful_operation));
            }

            start.elapsed()
        });
    });
}

fn bench_circuit_breaker_concurrent(c: &mut Criterion) {
    use std::sync::{Arc, Barrier};
    use std::thread;

    let breaker = CircuitBreaker::builder("bench")
        .failure_threshold(100) // High to avoid tripping
        .open_timeout(Duration::from_secs(30))
        .build();

    const THREAD_COUNT: usize = 4;
    const ITERATIONS_PER_THREAD: usize = 1000;

    c.bench_function("circuit_breaker_concurrent", |b| {
        b.iter(|| {
            let barrier = Arc::new(Barrier::new(THREAD_COUNT + 1));
            let mut handles = Vec::with_capacity(THREAD_COUNT);

            for _ in 0..THREAD_COUNT {
                let thread_breaker = breaker.clone();
                let thread_barrier = Arc::clone(&barrier);

                handles.push(thread::spawn(move || {
                    thread_barrier.wait();
                    for _ in 0..ITERATIONS_PER_THREAD {
                        let _ = black_box(thread_breaker.call(successful_operation));
                    }
                }));
            }

            // Start all threads simultaneously
            barrier.wait();

            // Wait for all threads to complete
            for handle in handles {
                handle.join().unwrap();
            }
        });
    });
}

fn bench_registry_lookup(c: &mut Criterion) {
    let registry = CircuitBreakerRegistry::new();
    for name in ["inventory", "pricing", "compliance", "health"] {
        registry.get_or_create(name, BreakerConfig::default());
    }

    c.bench_function("registry_get_or_create_existing", |b| {
        b.iter(|| black_box(registry.get_or_create("pricing", BreakerConfig::default())));
    });
}

fn bench_retry_first_try_success(c: &mut Criterion) {
    let executor = retry(RetryPolicy::<io::Error>::provider_api());

    c.bench_function("retry_first_try_success", |b| {
        b.iter(|| black_box(executor.call(successful_operation)));
    });
}

criterion_group!(
    benches,
    bench_circuit_breaker_closed,
    bench_circuit_breaker_open_rejection,
    bench_circuit_breaker_transition,
    bench_circuit_breaker_concurrent,
    bench_registry_lookup,
    bench_retry_first_try_success
);
criterion_main!(benches);
