use provider_resilience::{
    BreakerConfig, CircuitBreaker, CircuitBreakerRegistry, HookRegistry, State,
};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

fn quick_trip() -> BreakerConfig {
    BreakerConfig {
        failure_threshold: 1,
        success_threshold: 1,
        open_timeout: Duration::from_secs(60),
    }
}

fn fail(breaker: &CircuitBreaker) {
    let _ = breaker.call(|| -> Result<(), io::Error> { Err(io::ErrorKind::TimedOut.into()) });
}

#[test]
fn test_concurrent_get_or_create_returns_one_instance() {
    const THREADS: usize = 16;

    let registry = Arc::new(CircuitBreakerRegistry::new());
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let registry = Arc::clone(&registry);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                registry.get_or_create("x", BreakerConfig::default())
            })
        })
        .collect();

    let breakers: Vec<CircuitBreaker> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(registry.len(), 1);
    for breaker in &breakers {
        assert!(breaker.ptr_eq(&breakers[0]));
    }

    // State is shared through every handle.
    breakers[3].force_open();
    assert_eq!(breakers[11].state(), State::Open);
}

#[test]
fn test_first_registration_wins() {
    let registry = CircuitBreakerRegistry::new();

    let first = registry.get_or_create("cost-api", quick_trip());
    let second = registry.get_or_create("cost-api", BreakerConfig::datastore());

    assert!(first.ptr_eq(&second));
    assert_eq!(second.config(), quick_trip());

    let explicit = CircuitBreaker::builder("cost-api").failure_threshold(50).build();
    let registered = registry.register(explicit);
    assert!(registered.ptr_eq(&first));
}

#[test]
fn test_register_explicit_breaker() {
    let registry = CircuitBreakerRegistry::new();
    let breaker = CircuitBreaker::builder("health-probe")
        .failure_threshold(7)
        .build();

    let registered = registry.register(breaker.clone());
    assert!(registered.ptr_eq(&breaker));

    let looked_up = registry.get("health-probe").expect("registered breaker");
    assert_eq!(looked_up.config().failure_threshold, 7);
    assert!(registry.get("unknown").is_none());
    assert_eq!(registry.state("unknown"), None);
}

#[test]
fn test_reset_all_closes_every_breaker() {
    let registry = CircuitBreakerRegistry::new();
    let names = ["inventory", "pricing", "compliance"];
    for name in names {
        fail(&registry.get_or_create(name, quick_trip()));
    }
    let untouched = registry.get_or_create("health", quick_trip());

    for name in names {
        assert_eq!(registry.state(name), Some(State::Open));
    }

    registry.reset_all();

    for name in names {
        assert_eq!(registry.state(name), Some(State::Closed));
        let metrics = registry.get(name).unwrap().metrics();
        assert_eq!(metrics.total_failures, 0);
        assert_eq!(metrics.state_transitions, 0);
    }
    assert_eq!(untouched.state(), State::Closed);

    // Idempotent
    registry.reset_all();
    assert_eq!(registry.state("pricing"), Some(State::Closed));
}

#[test]
fn test_snapshot_all() {
    let registry = CircuitBreakerRegistry::new();
    assert!(registry.is_empty());
    assert!(registry.snapshot_all().is_empty());

    fail(&registry.get_or_create("pricing", quick_trip()));
    let inventory = registry.get_or_create("inventory", quick_trip());
    let _ = inventory.call(|| Ok::<_, io::Error>(()));

    let snapshot = registry.snapshot_all();
    assert_eq!(
        snapshot.keys().cloned().collect::<Vec<_>>(),
        vec!["inventory".to_string(), "pricing".to_string()]
    );
    assert_eq!(snapshot["pricing"].state, State::Open);
    assert_eq!(snapshot["inventory"].total_successes, 1);
    assert_eq!(registry.names(), vec!["inventory", "pricing"]);

    let json = serde_json::to_value(&snapshot).unwrap();
    assert_eq!(json["pricing"]["state"], "open");
    assert_eq!(json["inventory"]["state"], "closed");
}

#[test]
fn test_registry_hooks_are_shared() {
    let hooks = HookRegistry::new();
    let opened = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let log = Arc::clone(&opened);
    hooks.on_open(move |name| log.lock().push(name.to_string()));

    let registry = CircuitBreakerRegistry::new().with_hooks(hooks);
    fail(&registry.get_or_create("pricing", quick_trip()));
    fail(&registry.get_or_create("inventory", quick_trip()));

    assert_eq!(*opened.lock(), vec!["pricing", "inventory"]);
}

#[test]
fn test_reset_all_while_calls_are_in_flight() {
    let registry = Arc::new(CircuitBreakerRegistry::new());
    let breaker = registry.get_or_create("inventory", BreakerConfig::default());
    let calls = Arc::new(AtomicUsize::new(0));

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let breaker = breaker.clone();
            let calls = Arc::clone(&calls);
            thread::spawn(move || {
                for _ in 0..200 {
                    let _ = breaker.call(|| {
                        calls.fetch_add(1, Ordering::Relaxed);
                        Ok::<_, io::Error>(())
                    });
                }
            })
        })
        .collect();

    for _ in 0..20 {
        registry.reset_all();
    }
    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(calls.load(Ordering::Relaxed), 800);
    assert_eq!(breaker.state(), State::Closed);
}
