//! Observability: structured logging and metrics collection
//!
//! Logging goes through tracing with a configurable format; metrics are
//! in-process atomic counters snapshotted into the shutdown log.

pub mod logging;
pub mod metrics;

// Re-export for convenience
pub use logging::{LogFormat, init_default_logging, init_logging};
pub use metrics::{MetricsCollector, MetricsSnapshot, metrics};

// Span macros for structured logging
pub use logging::{lifecycle_span, link_span};
