//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! resolver / navigation / crawler produce:
//!     → tracing events and spans (logging.rs installs the subscriber)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout log lines, filtered by RUST_LOG or the configured level
//!     → Prometheus scrape endpoint, when enabled
//! ```
//!
//! # Design Decisions
//! - Library code only emits; the binary decides whether to install anything
//! - Metric updates are no-ops until an exporter is installed

pub mod logging;
pub mod metrics;
