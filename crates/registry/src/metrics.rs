use lazy_static::lazy_static;
use prometheus::{core::Collector, opts, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Registry};
use tracing::error;
use webpilot_core_types::EngineKind;

lazy_static! {
    static ref DISPATCH_TOTAL: IntCounterVec = IntCounterVec::new(
        opts!(
            "webpilot_dispatch_total",
            "Actions dispatched grouped by engine and outcome"
        ),
        &["engine", "outcome"]
    )
    .unwrap();
    static ref ENGINE_FALLBACK_TOTAL: IntCounter = IntCounter::new(
        "webpilot_engine_fallback_total",
        "Dispatches retried on the auto-selected engine",
    )
    .unwrap();
    static ref ENGINE_HEALTHY: IntGaugeVec = IntGaugeVec::new(
        opts!("webpilot_engine_healthy", "1 when the engine is healthy"),
        &["engine"]
    )
    .unwrap();
    static ref SESSIONS_ACTIVE: IntGauge =
        IntGauge::new("webpilot_sessions_active", "Open logical sessions").unwrap();
}

fn register<C>(registry: &Registry, collector: C)
where
    C: Collector + Clone + Send + Sync + 'static,
{
    if let Err(err) = registry.register(Box::new(collector.clone())) {
        if !matches!(err, prometheus::Error::AlreadyReg) {
            error!(?err, "failed to register registry metric");
        }
    }
}

pub fn register_metrics(registry: &Registry) {
    register(registry, DISPATCH_TOTAL.clone());
    register(registry, ENGINE_FALLBACK_TOTAL.clone());
    register(registry, ENGINE_HEALTHY.clone());
    register(registry, SESSIONS_ACTIVE.clone());
}

pub fn record_dispatch(engine: EngineKind, success: bool) {
    let outcome = if success { "success" } else { "failed" };
    DISPATCH_TOTAL
        .with_label_values(&[engine.as_str(), outcome])
        .inc();
}

pub fn record_fallback() {
    ENGINE_FALLBACK_TOTAL.inc();
}

pub fn set_engine_health(engine: EngineKind, healthy: bool) {
    ENGINE_HEALTHY
        .with_label_values(&[engine.as_str()])
        .set(i64::from(healthy));
}

pub fn set_session_count(count: usize) {
    SESSIONS_ACTIVE.set(count as i64);
}
