//! Prometheus metrics exporter for scanner monitoring.
//!
//! # Metrics Exposed
//!
//! ## Session Metrics
//! - `shelfscan_session_state` - Current session state (0=idle, 1=requesting, 2=active, 3=stopping)
//! - `shelfscan_session_starts_total` - Sessions started
//! - `shelfscan_decodes_total` - Barcodes decoded
//! - `shelfscan_failures_total` - Sessions ended by an error
//! - `shelfscan_discarded_events_total` - Late decoder events dropped
//!
//! ## Stream Metrics
//! - `shelfscan_stream_acquisitions_total` - Camera streams acquired
//! - `shelfscan_stream_releases_total` - Camera streams released
//! - `shelfscan_open_streams` - Streams currently held (should be 0 or 1)
//!
//! ## Inventory Metrics
//! - `shelfscan_products` - Products in the inventory
//!
//! # Example
//!
//! ```no_run
//! use shelfscan::metrics::{MetricsRegistry, MetricsSnapshot};
//!
//! let registry = MetricsRegistry::new().expect("Failed to create registry");
//!
//! let snapshot = MetricsSnapshot {
//!     session_state: 2,
//!     session_starts: 4,
//!     stream_acquisitions: 4,
//!     stream_releases: 3,
//!     decodes: 3,
//!     failures: 0,
//!     discarded_events: 1,
//!     product_count: 120,
//! };
//!
//! registry.update(&snapshot);
//! ```

mod collector;
#[cfg(feature = "metrics")]
mod server;

pub use collector::{MetricsError, MetricsRegistry, MetricsSnapshot};
#[cfg(feature = "metrics")]
pub use server::{MetricsServer, MetricsState, ServerError};
