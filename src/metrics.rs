//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use lazy_static::lazy_static;
use prometheus::{IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry};

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Cache Metrics
    pub static ref CACHE_HITS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("roost_cache_hits_total", "Total number of cache hits"),
        &["namespace"]
    ).expect("metric can be created");
    pub static ref CACHE_MISSES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("roost_cache_misses_total", "Total number of cache misses"),
        &["namespace"]
    ).expect("metric can be created");
    pub static ref CACHE_SIZE: IntGaugeVec = IntGaugeVec::new(
        Opts::new("roost_cache_size", "Current number of items in cache"),
        &["namespace"]
    ).expect("metric can be created");
    pub static ref CACHE_SET_FAILURES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "roost_cache_set_failures_total",
            "Cache sets abandoned after exhausting the retry bound"
        ),
        &["namespace"]
    ).expect("metric can be created");

    // Durable store Metrics
    pub static ref STORE_WRITES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "roost_store_writes_total",
            "Durable write attempts by final outcome"
        ),
        &["kind", "outcome"]
    ).expect("metric can be created");
    pub static ref STORE_WRITE_RETRIES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "roost_store_write_retries_total",
            "Transient store errors absorbed by the durable-write retry loop"
        ),
        &["kind"]
    ).expect("metric can be created");

    // Rolling ID list Metrics
    pub static ref ID_LISTS_LIVE: IntGauge = IntGauge::new(
        "roost_id_lists_live",
        "Rolling ID lists currently held in the process-local table"
    ).expect("metric can be created");
}

/// Initialize metrics registry.
pub fn init_metrics() {
    REGISTRY
        .register(Box::new(CACHE_HITS_TOTAL.clone()))
        .expect("CACHE_HITS_TOTAL can be registered");
    REGISTRY
        .register(Box::new(CACHE_MISSES_TOTAL.clone()))
        .expect("CACHE_MISSES_TOTAL can be registered");
    REGISTRY
        .register(Box::new(CACHE_SIZE.clone()))
        .expect("CACHE_SIZE can be registered");
    REGISTRY
        .register(Box::new(CACHE_SET_FAILURES_TOTAL.clone()))
        .expect("CACHE_SET_FAILURES_TOTAL can be registered");
    REGISTRY
        .register(Box::new(STORE_WRITES_TOTAL.clone()))
        .expect("STORE_WRITES_TOTAL can be registered");
    REGISTRY
        .register(Box::new(STORE_WRITE_RETRIES_TOTAL.clone()))
        .expect("STORE_WRITE_RETRIES_TOTAL can be registered");
    REGISTRY
        .register(Box::new(ID_LISTS_LIVE.clone()))
        .expect("ID_LISTS_LIVE can be registered");

    tracing::info!("Metrics registry initialized");
}
