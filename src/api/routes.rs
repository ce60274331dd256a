//! API route definitions

use axum::{
    extract::{Path, State},
    routing::{get, post, put},
    Json, Router,
};

use super::context::AppState;
use super::error::ApiError;
use super::types::*;
use crate::hardware::Measurement;

/// Create the API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/status", get(status_handler))
        // LED
        .route("/brightness/:brightness", put(set_brightness))
        // Ultrasonic rangefinder
        .route("/distance", get(get_distance))
        // Stream lifecycle
        .route("/start", post(start_stream))
        .route("/stop", post(stop_stream))
        // Camera frames
        .route("/ws", get(super::websocket::ws_handler))
        .with_state(state)
}

async fn status_handler(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.uptime_seconds(),
        streaming: state.stream.is_active().await,
        subscribers: state.stream.subscriber_count(),
        brightness: state.led.brightness(),
        stream: state.stream.stats(),
    })
}

async fn set_brightness(
    State(state): State<AppState>,
    Path(brightness): Path<f64>,
) -> Result<Json<BrightnessResponse>, ApiError> {
    let brightness = state.led.set_brightness(brightness)?;
    Ok(Json(BrightnessResponse { brightness }))
}

/// Timeouts are reported in the body with HTTP 200
async fn get_distance(State(state): State<AppState>) -> Result<Json<Measurement>, ApiError> {
    let measurement = tokio::task::spawn_blocking(move || state.rangefinder.measure())
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    if let Measurement::Distance { distance_cm } = measurement {
        tracing::info!("Distance: {:.2} cm", distance_cm);
    }
    Ok(Json(measurement))
}

async fn start_stream(State(state): State<AppState>) -> Json<MessageResponse> {
    state.stream.start().await;
    Json(MessageResponse::new("Stream started"))
}

async fn stop_stream(State(state): State<AppState>) -> Json<MessageResponse> {
    state.stream.stop().await;
    Json(MessageResponse::new("Stream stopped"))
}
