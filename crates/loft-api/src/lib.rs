//! HTTP surface of the loft server: route table, tracking endpoints, and
//! mailbox handlers.

pub mod mail;
pub mod state;
pub mod tracking;

use axum::Router;
use axum::routing::{get, post};

use crate::state::AppState;

/// Builds the complete route set against shared state. The binary layers
/// CORS and request tracing on top.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/tracking/pixel/{id}", get(tracking::pixel))
        .route("/tracking/status/{id}", get(tracking::status))
        .route("/sendEmail", post(mail::send_mail))
        .route("/emails/{kind}", get(mail::list_mail))
        .route("/save", post(mail::save_mail))
        .route("/starred", post(mail::toggle_starred))
        .route("/bin", post(mail::move_to_bin))
        .route("/delete", post(mail::delete_mail))
        .with_state(state)
}

async fn index() -> &'static str {
    "Email server is running"
}
