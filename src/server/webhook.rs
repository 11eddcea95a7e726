//! Webhook endpoint handler.
//!
//! Identifies the sending platform from its event header, authenticates the
//! delivery, and hands the payload to the [`Ingestor`](crate::ingest::Ingestor).
//! Persistence happens on the worker pool unless the pool is saturated.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::AppState;
use crate::platform::{Platform, SignatureError, try_detect_platform};

/// Errors that can occur when processing a webhook.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// No supported platform's event header is present.
    #[error("unrecognized webhook source")]
    UnknownPlatform,

    #[error("{0}")]
    Unauthorized(#[from] SignatureError),

    #[error("invalid JSON body: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = match &self {
            WebhookError::UnknownPlatform => StatusCode::BAD_REQUEST,
            WebhookError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            WebhookError::InvalidJson(_) => StatusCode::BAD_REQUEST,
        };

        (status, self.to_string()).into_response()
    }
}

/// Body of a successful webhook response.
#[derive(Debug, Serialize)]
pub struct WebhookAccepted {
    pub status: &'static str,
    pub platform: Platform,
    pub event: String,
    pub commits: usize,
}

/// Webhook handler.
///
/// # Response
///
/// - 200 OK: delivery accepted, with the number of commits extracted
/// - 400 Bad Request: unrecognized source or invalid JSON
/// - 401 Unauthorized: missing or wrong token or signature
///
/// Events that carry no commits are accepted with `commits: 0`.
pub async fn webhook_handler(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAccepted>, WebhookError> {
    let platform = try_detect_platform(&headers).ok_or(WebhookError::UnknownPlatform)?;
    let event_type = platform
        .event_type(&headers)
        .ok_or(WebhookError::UnknownPlatform)?;

    debug!(platform = %platform, event_type = %event_type, "Received webhook");

    // Authenticate before parsing anything.
    if let Err(e) = platform.verify_secret(&headers, &body, app_state.webhook_secret()) {
        warn!(platform = %platform, error = %e, "Webhook authentication failed");
        return Err(e.into());
    }

    let payload: serde_json::Value = serde_json::from_slice(&body)?;

    let outcome = app_state
        .ingestor()
        .ingest(platform, &event_type, &payload)
        .await;

    info!(
        platform = %platform,
        event_type = %event_type,
        commits = outcome.records(),
        "Webhook accepted"
    );

    Ok(Json(WebhookAccepted {
        status: "accepted",
        platform,
        event: event_type,
        commits: outcome.records(),
    }))
}
