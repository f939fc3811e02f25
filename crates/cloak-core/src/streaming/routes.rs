use super::image::BOUNDARY;
use super::state::AppState;
use crate::streamer::StreamStatus;
use axum::{
    body::Bytes,
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use cloak_detection::Hsv;
use futures_util::StreamExt;
use serde::Serialize;
use serde_json::{json, Value};

#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<Hsv>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
}

impl ActionResponse {
    fn done(success: bool) -> Self {
        Self {
            success,
            color: None,
            error: None,
        }
    }

    fn failed(error: &'static str) -> Self {
        Self {
            success: false,
            color: None,
            error: Some(error),
        }
    }
}

pub async fn test_connection() -> Json<Value> {
    tracing::info!("test endpoint called");
    Json(json!({ "status": "Server is running!" }))
}

pub async fn status(State(state): State<AppState>) -> Json<StreamStatus> {
    Json(state.streamer.status())
}

pub async fn video_feed(State(state): State<AppState>) -> impl IntoResponse {
    tracing::info!("video feed client connected");
    let stream = state
        .streamer
        .frames()
        .map(Ok::<_, std::io::Error>);

    (
        StatusCode::OK,
        [(
            header::CONTENT_TYPE,
            format!("multipart/x-mixed-replace; boundary={BOUNDARY}"),
        )],
        axum::body::Body::from_stream(stream),
    )
}

pub async fn capture_background(State(state): State<AppState>) -> Json<ActionResponse> {
    tracing::info!("background capture requested");
    let success = state.streamer.capture_background().await;
    tracing::info!(success, "background capture finished");
    Json(ActionResponse::done(success))
}

// Expects `{"color": [r, g, b]}`.
pub async fn set_color(State(state): State<AppState>, body: Bytes) -> Json<ActionResponse> {
    let color = serde_json::from_slice::<Value>(&body)
        .ok()
        .and_then(|mut v| v.get_mut("color").map(Value::take))
        .filter(|c| !c.is_null());

    let Some(color) = color else {
        tracing::warn!("set_color called without a color");
        return Json(ActionResponse::failed("No color provided"));
    };

    let rgb: [u8; 3] = match serde_json::from_value(color) {
        Ok(rgb) => rgb,
        Err(e) => {
            tracing::warn!(error = %e, "set_color called with an invalid color");
            return Json(ActionResponse::failed("Failed to set color"));
        }
    };

    match state.streamer.set_color(rgb) {
        Some(hsv) => Json(ActionResponse {
            success: true,
            color: Some(hsv),
            error: None,
        }),
        None => Json(ActionResponse::failed("Failed to set color")),
    }
}

pub async fn reset(State(state): State<AppState>) -> Json<ActionResponse> {
    state.streamer.reset();
    Json(ActionResponse::done(true))
}
