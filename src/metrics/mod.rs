use std::sync::Once;

use lazy_static::lazy_static;
use prometheus::IntCounter;
use prometheus::IntCounterVec;
use prometheus::Opts;
use prometheus::Registry;

lazy_static! {
    pub static ref CLEANER_TASKS_CLEANED: IntCounterVec = IntCounterVec::new(
        Opts::new("cleaner_tasks_cleaned_total", "Cleanups that completed successfully"),
        &["kind"]
    )
    .expect("metric can not be created");

    pub static ref CLEANER_TASKS_FAILED: IntCounterVec = IntCounterVec::new(
        Opts::new("cleaner_tasks_failed_total", "Cleanups dropped after a collaborator failure"),
        &["kind"]
    )
    .expect("metric can not be created");

    pub static ref CLEANER_LISTENER_FAULTS: IntCounterVec = IntCounterVec::new(
        Opts::new("cleaner_listener_faults_total", "Listener callbacks that panicked"),
        &["kind"]
    )
    .expect("metric can not be created");

    pub static ref CLEANER_FORCED_COLLECTIONS: IntCounter = IntCounter::new(
        "cleaner_forced_collections_total",
        "Reclamation passes forced by the periodic collector"
    )
    .expect("metric can not be created");

    pub static ref REGISTRY: Registry = Registry::new();
}

static REGISTER_ONCE: Once = Once::new();

/// Registers the cleaner metrics on [`REGISTRY`]. Safe to call more than once.
pub fn register_cleaner_metrics() {
    REGISTER_ONCE.call_once(|| {
        REGISTRY
            .register(Box::new(CLEANER_TASKS_CLEANED.clone()))
            .expect("collector can be registered");
        REGISTRY
            .register(Box::new(CLEANER_TASKS_FAILED.clone()))
            .expect("collector can be registered");
        REGISTRY
            .register(Box::new(CLEANER_LISTENER_FAULTS.clone()))
            .expect("collector can be registered");
        REGISTRY
            .register(Box::new(CLEANER_FORCED_COLLECTIONS.clone()))
            .expect("collector can be registered");
    });
}

/// Text exposition of every registered metric
pub fn gather_metrics() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        tracing::error!("could not encode custom metrics: {}", e);
    }
    String::from_utf8(buffer).unwrap_or_default()
}
