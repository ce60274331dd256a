//! Rig Server Library
//!
//! Network control for a Raspberry Pi camera rig: a dimmable LED, an
//! ultrasonic rangefinder and a live MJPEG stream over WebSocket.

pub mod api;
pub mod camera;
pub mod hardware;
pub mod settings;
pub mod stream;
pub mod telemetry;

pub use api::{create_router, run_server, AppContext, AppState};
pub use hardware::{Hardware, HardwareBackend, HardwareError, Led, Measurement, Rangefinder};
pub use settings::{RigSettings, SettingsError};
pub use stream::{StreamController, StreamOptions, Subscription};
