//! Application context handed to every request handler
//!
//! Hardware handles and the stream controller are built once at startup and
//! shared through axum state instead of process-wide globals.

use std::sync::Arc;
use std::time::Instant;

use crate::camera;
use crate::hardware::{Hardware, HardwareError, Led, Rangefinder};
use crate::settings::RigSettings;
use crate::stream::{StreamController, StreamOptions};

/// Shared handle used as axum state
pub type AppState = Arc<AppContext>;

pub struct AppContext {
    pub led: Led,
    pub rangefinder: Rangefinder,
    pub stream: StreamController,
    started_at: Instant,
}

impl AppContext {
    pub fn new(hardware: Hardware, stream: StreamController) -> Self {
        Self {
            led: hardware.led,
            rangefinder: hardware.rangefinder,
            stream,
            started_at: Instant::now(),
        }
    }

    /// Open the configured hardware and frame source
    pub fn from_settings(settings: &RigSettings) -> Result<Self, HardwareError> {
        let hardware = Hardware::open(settings)?;
        let source = camera::open_source(settings);
        tracing::info!(
            hardware = settings.hardware_backend.name(),
            camera = source.name(),
            "Rig context ready"
        );
        let stream = StreamController::new(source, StreamOptions::from(settings));
        Ok(Self::new(hardware, stream))
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
