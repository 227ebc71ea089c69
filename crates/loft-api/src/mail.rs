use std::collections::HashSet;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::Utc;
use tracing::{error, warn};
use uuid::Uuid;

use loft_mail::OutboundEmail;
use loft_types::api::{
    ApiMessage, DispatchError, SaveMailRequest, SendMailRequest, SendMailResponse, StarRequest,
};
use loft_types::models::{Message, MessageKind, MessageStatus};

use crate::state::AppState;

/// `POST /sendEmail` — validate, compose with beacon, hand to the
/// transport, persist.
///
/// Exactly one transmission attempt and one insertion per call. A
/// transport failure still leaves a record behind, marked `failed`, so
/// the sent folder reflects the attempt.
pub async fn send_mail(
    State(state): State<AppState>,
    Json(req): Json<SendMailRequest>,
) -> Result<impl IntoResponse, (StatusCode, Json<DispatchError>)> {
    let to = req.to.trim().to_string();
    if to.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(DispatchError {
                error: "Recipient email address is required.".into(),
                details: None,
            }),
        ));
    }

    let email_id = Uuid::new_v4();
    let outbound = OutboundEmail::compose(
        email_id,
        &state.sender,
        &to,
        &req.subject,
        &req.mail_content,
        &state.public_url,
    );
    let mut record = Message {
        id: email_id,
        from: state.sender.clone(),
        to,
        subject: req.subject,
        body: req.mail_content,
        date: Utc::now(),
        kind: Some(MessageKind::Sent),
        starred: false,
        bin: false,
        status: MessageStatus::Sent,
        read_timestamp: None,
    };

    // Transport and store are both blocking; one hop off the runtime
    // covers them.
    let task_state = state.clone();
    let delivery = tokio::task::spawn_blocking(move || {
        match task_state.mailer.send(&outbound) {
            Ok(()) => task_state
                .db
                .insert_message(&record)
                .map_err(|e| e.to_string()),
            Err(send_err) => {
                record.status = MessageStatus::Failed;
                if let Err(store_err) = task_state.db.insert_message(&record) {
                    error!(id = %record.id, error = %store_err, "failed to record failed dispatch");
                }
                Err(send_err.to_string())
            }
        }
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        dispatch_error(e.to_string())
    })?;

    match delivery {
        Ok(()) => Ok((
            StatusCode::OK,
            Json(SendMailResponse {
                message: "Email sent successfully".into(),
                email_id,
            }),
        )),
        Err(details) => {
            warn!(id = %email_id, error = %details, "dispatch failed");
            Err(dispatch_error(details))
        }
    }
}

fn dispatch_error(details: String) -> (StatusCode, Json<DispatchError>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(DispatchError {
            error: "Error sending email".into(),
            details: Some(details),
        }),
    )
}

/// `GET /emails/{kind}` — one folder view. `starred`, `bin` and `allmail`
/// cut across kinds; `inbox` first merges new mail from the remote
/// mailbox, falling back to what is already stored when the mailbox is
/// unreachable. Anything else selects records by their stored kind.
pub async fn list_mail(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> Result<Json<Vec<Message>>, StatusCode> {
    let db = state.clone();
    let messages = run_blocking(move || match kind.as_str() {
        "starred" => db.db.list_starred(),
        "bin" => db.db.list_bin(),
        "allmail" => db.db.list_all(),
        "inbox" => match db.ingestor.sync_inbox(&db.db) {
            Ok(messages) => Ok(messages),
            Err(err) => {
                warn!(error = %err, "inbox sync failed, serving stored mail");
                db.db.list_kind("inbox")
            }
        },
        other => db.db.list_kind(other),
    })
    .await?;

    Ok(Json(collapse_and_sort(messages)))
}

/// `POST /save` — store a record the client composed, typically a draft.
pub async fn save_mail(
    State(state): State<AppState>,
    Json(req): Json<SaveMailRequest>,
) -> Result<Json<Message>, (StatusCode, Json<ApiMessage>)> {
    let Some(kind) = req.kind else {
        return Err(missing_fields());
    };
    if req.to.trim().is_empty() || req.from.trim().is_empty() {
        return Err(missing_fields());
    }

    let status = if kind == MessageKind::Draft {
        MessageStatus::Draft
    } else {
        MessageStatus::Sent
    };
    let record = Message {
        id: Uuid::new_v4(),
        from: req.from,
        to: req.to,
        subject: req.subject,
        body: req.body,
        date: Utc::now(),
        kind: Some(kind),
        starred: false,
        bin: false,
        status,
        read_timestamp: None,
    };

    let db = state.clone();
    let stored = record.clone();
    run_blocking(move || db.db.insert_message(&stored))
        .await
        .map_err(|_| save_failed())?;

    Ok(Json(record))
}

fn missing_fields() -> (StatusCode, Json<ApiMessage>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiMessage::new("Missing required fields")),
    )
}

fn save_failed() -> (StatusCode, Json<ApiMessage>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiMessage::new("Failed to save email")),
    )
}

/// `POST /starred` — set or clear the star on one message.
pub async fn toggle_starred(
    State(state): State<AppState>,
    Json(req): Json<StarRequest>,
) -> Result<Json<ApiMessage>, StatusCode> {
    let db = state.clone();
    run_blocking(move || db.db.toggle_starred(req.id, req.value)).await?;
    Ok(Json(ApiMessage::new("Starred status updated")))
}

/// `POST /bin` — soft-delete a batch of messages.
pub async fn move_to_bin(
    State(state): State<AppState>,
    Json(ids): Json<Vec<Uuid>>,
) -> Result<Json<ApiMessage>, StatusCode> {
    let db = state.clone();
    run_blocking(move || db.db.move_to_bin(&ids)).await?;
    Ok(Json(ApiMessage::new("Emails moved to bin")))
}

/// `POST /delete` — the only physical delete.
pub async fn delete_mail(
    State(state): State<AppState>,
    Json(ids): Json<Vec<Uuid>>,
) -> Result<Json<ApiMessage>, StatusCode> {
    let db = state.clone();
    run_blocking(move || db.db.delete_messages(&ids)).await?;
    Ok(Json(ApiMessage::new("Emails deleted successfully")))
}

/// Runs a blocking store closure off the async runtime, folding both the
/// join error and the operation error into a 500.
async fn run_blocking<T, F>(f: F) -> Result<T, StatusCode>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|e| {
            error!(error = %e, "store operation failed");
            StatusCode::INTERNAL_SERVER_ERROR
        })
}

/// Read-path backstop: overlapping ingestion runs can in principle hand
/// back the same record twice, and the inbox union arrives unordered.
/// First occurrence of an id wins, then newest first.
fn collapse_and_sort(messages: Vec<Message>) -> Vec<Message> {
    let mut seen = HashSet::new();
    let mut out: Vec<Message> = messages.into_iter().filter(|m| seen.insert(m.id)).collect();
    out.sort_by(|a, b| b.date.cmp(&a.date));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone};

    fn msg(id: Uuid, date: DateTime<Utc>, subject: &str) -> Message {
        Message {
            id,
            from: "a@example.com".into(),
            to: "b@example.com".into(),
            subject: subject.into(),
            body: String::new(),
            date,
            kind: Some(MessageKind::Inbox),
            starred: false,
            bin: false,
            status: MessageStatus::Sent,
            read_timestamp: None,
        }
    }

    #[test]
    fn collapse_drops_repeated_ids_and_sorts_newest_first() {
        let dup = Uuid::new_v4();
        let t0 = Utc.with_ymd_and_hms(2025, 2, 10, 9, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2025, 2, 10, 10, 0, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2025, 2, 10, 11, 0, 0).unwrap();

        let out = collapse_and_sort(vec![
            msg(dup, t1, "kept"),
            msg(Uuid::new_v4(), t0, "oldest"),
            msg(dup, t1, "dropped duplicate"),
            msg(Uuid::new_v4(), t2, "newest"),
        ]);

        let subjects: Vec<&str> = out.iter().map(|m| m.subject.as_str()).collect();
        assert_eq!(subjects, vec!["newest", "kept", "oldest"]);
    }
}
