#![cfg(feature = "prometheus")]

use prometheus_client::encoding::text::encode;
use prometheus_client::registry::Registry;
use provider_resilience::{BreakerConfig, CircuitBreakerRegistry, PrometheusSink};
use std::io;
use std::time::Duration;

#[test]
fn test_prometheus_sink_exports_breaker_events() {
    let mut registry = Registry::default();
    let sink = PrometheusSink::new(&mut registry);

    let breakers = CircuitBreakerRegistry::new().with_metric_sink(sink);
    let breaker = breakers.get_or_create(
        "pricing",
        BreakerConfig {
            failure_threshold: 1,
            success_threshold: 1,
            open_timeout: Duration::from_secs(60),
        },
    );

    let _ = breaker.call(|| Ok::<_, io::Error>(()));
    let _ = breaker.call(|| -> Result<(), io::Error> { Err(io::ErrorKind::TimedOut.into()) });
    let _ = breaker.call(|| Ok::<_, io::Error>(()));

    let mut text = String::new();
    encode(&mut text, &registry).unwrap();

    assert!(text.contains(r#"circuit_breaker_calls_total{breaker="pricing",outcome="success"} 1"#));
    assert!(text.contains(r#"circuit_breaker_calls_total{breaker="pricing",outcome="failure"} 1"#));
    assert!(text.contains(r#"circuit_breaker_rejections_total{breaker="pricing"} 1"#));
    assert!(text.contains(
        r#"circuit_breaker_transitions_total{breaker="pricing",from="closed",to="open"} 1"#
    ));
    assert!(text.contains(r#"circuit_breaker_state{breaker="pricing"} 1"#));
    assert!(text.contains("circuit_breaker_call_duration_seconds_bucket"));
}
