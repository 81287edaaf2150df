//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! dispatcher, session store, http adapter produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID is attached to the dispatch span
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
