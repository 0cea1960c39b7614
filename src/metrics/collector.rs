//! Metrics collection and registry.

use crate::scanner::{SessionState, SessionStats};
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};
use thiserror::Error;

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// Registering or encoding failed.
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

/// A snapshot of system state for metrics update.
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    /// Session state code (0=idle, 1=requesting, 2=active, 3=stopping).
    pub session_state: i64,
    /// Sessions started.
    pub session_starts: u64,
    /// Camera streams acquired.
    pub stream_acquisitions: u64,
    /// Camera streams released.
    pub stream_releases: u64,
    /// Barcodes decoded.
    pub decodes: u64,
    /// Sessions ended by an error.
    pub failures: u64,
    /// Late decoder events dropped.
    pub discarded_events: u64,
    /// Products currently stored.
    pub product_count: usize,
}

impl MetricsSnapshot {
    /// Creates a snapshot from manager statistics and inventory size.
    pub fn from_components(state: SessionState, stats: &SessionStats, product_count: usize) -> Self {
        let session_state = match state {
            SessionState::Idle => 0,
            SessionState::Requesting => 1,
            SessionState::Active => 2,
            SessionState::Stopping => 3,
        };
        Self {
            session_state,
            session_starts: stats.starts,
            stream_acquisitions: stats.acquisitions,
            stream_releases: stats.teardowns,
            decodes: stats.decodes,
            failures: stats.failures,
            discarded_events: stats.discarded_events,
            product_count,
        }
    }
}

/// Prometheus metrics registry for scanner monitoring.
pub struct MetricsRegistry {
    registry: Registry,

    // Session metrics
    session_state: IntGauge,
    session_starts: IntCounter,
    decodes: IntCounter,
    failures: IntCounter,
    discarded_events: IntCounter,

    // Stream metrics
    stream_acquisitions: IntCounter,
    stream_releases: IntCounter,
    open_streams: IntGauge,

    // Inventory metrics
    product_count: IntGauge,
}

impl MetricsRegistry {
    /// Creates a new metrics registry with all scanner metrics registered.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let session_state = IntGauge::new(
            "shelfscan_session_state",
            "Scan session state (0=idle, 1=requesting, 2=active, 3=stopping)",
        )?;
        let session_starts = IntCounter::new(
            "shelfscan_session_starts_total",
            "Scan sessions started",
        )?;
        let decodes = IntCounter::new("shelfscan_decodes_total", "Barcodes decoded")?;
        let failures = IntCounter::new(
            "shelfscan_failures_total",
            "Scan sessions that ended in an error",
        )?;
        let discarded_events = IntCounter::new(
            "shelfscan_discarded_events_total",
            "Decoder events that arrived after their session ended",
        )?;

        let stream_acquisitions = IntCounter::new(
            "shelfscan_stream_acquisitions_total",
            "Camera streams acquired for sessions",
        )?;
        let stream_releases = IntCounter::new(
            "shelfscan_stream_releases_total",
            "Camera streams released",
        )?;
        let open_streams = IntGauge::new(
            "shelfscan_open_streams",
            "Camera streams currently held",
        )?;

        let product_count = IntGauge::new("shelfscan_products", "Products in the inventory")?;

        registry.register(Box::new(session_state.clone()))?;
        registry.register(Box::new(session_starts.clone()))?;
        registry.register(Box::new(decodes.clone()))?;
        registry.register(Box::new(failures.clone()))?;
        registry.register(Box::new(discarded_events.clone()))?;
        registry.register(Box::new(stream_acquisitions.clone()))?;
        registry.register(Box::new(stream_releases.clone()))?;
        registry.register(Box::new(open_streams.clone()))?;
        registry.register(Box::new(product_count.clone()))?;

        Ok(Self {
            registry,
            session_state,
            session_starts,
            decodes,
            failures,
            discarded_events,
            stream_acquisitions,
            stream_releases,
            open_streams,
            product_count,
        })
    }

    /// Updates all metrics from a snapshot of system state.
    pub fn update(&self, snapshot: &MetricsSnapshot) {
        self.session_state.set(snapshot.session_state);

        // Counters only move forward: add the difference
        advance(&self.session_starts, snapshot.session_starts);
        advance(&self.decodes, snapshot.decodes);
        advance(&self.failures, snapshot.failures);
        advance(&self.discarded_events, snapshot.discarded_events);
        advance(&self.stream_acquisitions, snapshot.stream_acquisitions);
        advance(&self.stream_releases, snapshot.stream_releases);

        let open = snapshot
            .stream_acquisitions
            .saturating_sub(snapshot.stream_releases);
        self.open_streams.set(open as i64);
        self.product_count.set(snapshot.product_count as i64);
    }

    /// Returns the underlying Prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

fn advance(counter: &IntCounter, total: u64) {
    let current = counter.get();
    if total > current {
        counter.inc_by(total - current);
    }
}
