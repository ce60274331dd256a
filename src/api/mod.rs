//! HTTP API for the rig
//!
//! REST endpoints for the LED, the rangefinder and stream control, plus a
//! WebSocket at `/ws` that pushes camera frames.

pub mod context;
pub mod error;
pub mod routes;
pub mod server;
pub mod types;
pub mod websocket;

pub use context::{AppContext, AppState};
pub use error::ApiError;
pub use routes::create_router;
pub use server::run_server;
pub use types::*;
