//! Metrics collection with Prometheus
//!
//! This module provides Prometheus metrics for Loglane:
//! - Identity and session creation counts
//! - Ingested batches and entries, batch size distribution
//! - The in-process ingestion total as a gauge
//! - Request errors by endpoint and kind
//! - Request latency by endpoint

use prometheus::{
    Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
};
use std::sync::Arc;

/// Metrics collector for Loglane
#[derive(Clone)]
pub struct Metrics {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Anonymous users created
    pub users_created_total: IntCounter,
    /// Sessions created
    pub sessions_created_total: IntCounter,

    /// Upload batches by outcome (accepted, rejected)
    pub ingest_batches_total: IntCounterVec,
    /// Log entries accepted
    pub log_entries_total: IntCounter,
    /// Entries per accepted batch
    pub ingest_batch_size: Histogram,
    /// Current value of the in-process ingestion counter
    pub ingested_entries: IntGauge,

    /// Failed requests by endpoint and error kind
    pub request_errors_total: IntCounterVec,
    /// Request handling duration by endpoint
    pub request_duration_seconds: HistogramVec,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let users_created_total = IntCounter::with_opts(Opts::new(
            "loglane_users_created_total",
            "Total number of anonymous users created",
        ))?;

        let sessions_created_total = IntCounter::with_opts(Opts::new(
            "loglane_sessions_created_total",
            "Total number of sessions created",
        ))?;

        let ingest_batches_total = IntCounterVec::new(
            Opts::new(
                "loglane_ingest_batches_total",
                "Total number of log batches received",
            ),
            &["outcome"],
        )?;

        let log_entries_total = IntCounter::with_opts(Opts::new(
            "loglane_log_entries_total",
            "Total number of log entries accepted",
        ))?;

        let ingest_batch_size = Histogram::with_opts(
            HistogramOpts::new(
                "loglane_ingest_batch_size",
                "Number of entries per accepted batch",
            )
            .buckets(vec![0.0, 1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 1000.0]),
        )?;

        let ingested_entries = IntGauge::with_opts(Opts::new(
            "loglane_ingested_entries",
            "Log entries counted since process start",
        ))?;

        let request_errors_total = IntCounterVec::new(
            Opts::new(
                "loglane_request_errors_total",
                "Total number of failed requests",
            ),
            &["endpoint", "kind"],
        )?;

        let request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "loglane_request_duration_seconds",
                "Request handling duration in seconds",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]),
            &["endpoint"],
        )?;

        registry.register(Box::new(users_created_total.clone()))?;
        registry.register(Box::new(sessions_created_total.clone()))?;
        registry.register(Box::new(ingest_batches_total.clone()))?;
        registry.register(Box::new(log_entries_total.clone()))?;
        registry.register(Box::new(ingest_batch_size.clone()))?;
        registry.register(Box::new(ingested_entries.clone()))?;
        registry.register(Box::new(request_errors_total.clone()))?;
        registry.register(Box::new(request_duration_seconds.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            users_created_total,
            sessions_created_total,
            ingest_batches_total,
            log_entries_total,
            ingest_batch_size,
            ingested_entries,
            request_errors_total,
            request_duration_seconds,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_user_created(&self) {
        self.users_created_total.inc();
    }

    pub fn record_session_created(&self) {
        self.sessions_created_total.inc();
    }

    /// Record an accepted batch and the counter value it produced
    pub fn record_batch_accepted(&self, entries: u64, total: u64) {
        self.ingest_batches_total
            .with_label_values(&["accepted"])
            .inc();
        self.log_entries_total.inc_by(entries);
        self.ingest_batch_size.observe(entries as f64);
        self.ingested_entries
            .set(i64::try_from(total).unwrap_or(i64::MAX));
    }

    pub fn record_batch_rejected(&self) {
        self.ingest_batches_total
            .with_label_values(&["rejected"])
            .inc();
    }

    pub fn record_error(&self, endpoint: &str, kind: &str) {
        self.request_errors_total
            .with_label_values(&[endpoint, kind])
            .inc();
    }

    pub fn observe_request(&self, endpoint: &str, duration_secs: f64) {
        self.request_duration_seconds
            .with_label_values(&[endpoint])
            .observe(duration_secs);
    }
}
