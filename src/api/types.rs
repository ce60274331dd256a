//! API request/response types
//!
//! These types are used for JSON serialization in API endpoints.

use serde::{Deserialize, Serialize};

use crate::telemetry::StreamStats;

/// Echo of the brightness that was applied
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BrightnessResponse {
    pub brightness: f64,
}

/// Plain acknowledgement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Error payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Server status response
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
    /// Whether the capture loop is running
    pub streaming: bool,
    /// Connected WebSocket viewers
    pub subscribers: usize,
    /// Last LED brightness in percent
    pub brightness: f64,
    pub stream: StreamStats,
}
