//! Telemetry and logging infrastructure
//!
//! Structured logging with tracing, plus counters for the video stream.

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LogConfig};
pub use metrics::{StreamMetrics, StreamStats};
