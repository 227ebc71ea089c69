use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderName, StatusCode, header};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use loft_db::queries::MarkRead;
use loft_types::api::TrackingStatus;

use crate::state::AppState;

/// The 1x1 transparent PNG served to every beacon request.
pub const PIXEL: &[u8] = &[
    0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x04, 0x00, 0x00, 0x00, 0xb5,
    0x1c, 0x0c, 0x02, 0x00, 0x00, 0x00, 0x0b, 0x49, 0x44, 0x41, 0x54, 0x78, 0xda, 0x63, 0x64,
    0x60, 0x00, 0x00, 0x00, 0x06, 0x00, 0x02, 0x30, 0x81, 0xd0, 0x2f, 0x00, 0x00, 0x00, 0x00,
    0x49, 0x45, 0x4e, 0x44, 0xae, 0x42, 0x60, 0x82,
];

/// Mail clients and proxies must never cache tracking responses; a cached
/// pixel would hide every open after the first.
fn no_cache_headers() -> [(HeaderName, &'static str); 3] {
    [
        (
            header::CACHE_CONTROL,
            "no-store, no-cache, must-revalidate, proxy-revalidate",
        ),
        (header::PRAGMA, "no-cache"),
        (header::EXPIRES, "0"),
    ]
}

/// `GET /tracking/pixel/{id}` — the read beacon embedded in outbound mail.
///
/// Serves the image no matter what happens on the way: a malformed id, an
/// unknown message, or a store failure is logged and otherwise invisible
/// to the requester. The mark itself is idempotent, so only the first hit
/// sets the opened-at time.
pub async fn pixel(State(state): State<AppState>, Path(id): Path<String>) -> impl IntoResponse {
    match id.parse::<Uuid>() {
        Ok(message_id) => {
            let db = state.clone();
            let opened_at = Utc::now();
            match tokio::task::spawn_blocking(move || db.db.mark_read(message_id, opened_at)).await
            {
                Ok(Ok(MarkRead::Updated)) => info!(%message_id, "message opened"),
                Ok(Ok(MarkRead::AlreadyRead)) => debug!(%message_id, "repeat beacon hit"),
                Ok(Ok(MarkRead::NotFound)) => warn!(%message_id, "beacon hit for unknown message"),
                Ok(Err(err)) => error!(%message_id, error = %err, "failed to record read"),
                Err(err) => error!("spawn_blocking join error: {}", err),
            }
        }
        Err(_) => warn!(id = %id, "beacon hit with malformed id"),
    }

    (
        [(header::CONTENT_TYPE, "image/png")],
        no_cache_headers(),
        PIXEL,
    )
}

/// `GET /tracking/status/{id}` — what the poller reads. Unknown and
/// malformed ids get the same 404 body instead of an extractor error.
pub async fn status(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let Ok(message_id) = id.parse::<Uuid>() else {
        return not_found();
    };

    let db = state.clone();
    let message = match tokio::task::spawn_blocking(move || db.db.get_message(message_id)).await {
        Ok(Ok(Some(message))) => message,
        Ok(Ok(None)) => return not_found(),
        Ok(Err(err)) => {
            error!(%message_id, error = %err, "status lookup failed");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
        Err(err) => {
            error!("spawn_blocking join error: {}", err);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let body = TrackingStatus {
        status: message.status.as_str().to_string(),
        timestamp: message.read_timestamp,
    };
    (no_cache_headers(), Json(body)).into_response()
}

fn not_found() -> Response {
    let body = TrackingStatus {
        status: TrackingStatus::NOT_FOUND.to_string(),
        timestamp: None,
    };
    (StatusCode::NOT_FOUND, no_cache_headers(), Json(body)).into_response()
}
