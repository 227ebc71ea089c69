use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::MessageKind;

// -- Dispatch --

/// Body of `POST /sendEmail`. Field spellings are part of the public
/// contract, hence the renames.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMailRequest {
    #[serde(rename = "mailContent")]
    pub mail_content: String,
    #[serde(default)]
    pub subject: String,
    pub to: String,
}

#[derive(Debug, Serialize)]
pub struct SendMailResponse {
    pub message: String,
    #[serde(rename = "emailId")]
    pub email_id: Uuid,
}

/// Error body for dispatch failures: `{error}` on validation rejects,
/// `{error, details}` on transport failures.
#[derive(Debug, Serialize)]
pub struct DispatchError {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

// -- Tracking --

/// Body of `GET /tracking/status/{id}`. Shared between the server handler
/// and the polling client so both sides agree on one definition.
///
/// `status` carries the stored status verbatim (`"sent"`, `"read"`, ...) or
/// `"not found"` for unknown ids; `timestamp` is present exactly when the
/// message has been opened.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingStatus {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl TrackingStatus {
    pub const NOT_FOUND: &'static str = "not found";
}

// -- Store CRUD --

/// Body of `POST /save`. Everything is optional at the serde level; the
/// handler rejects missing `to`/`from`/`kind` with a 400 body instead of an
/// extractor error.
#[derive(Debug, Deserialize)]
pub struct SaveMailRequest {
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub body: String,
    pub kind: Option<MessageKind>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StarRequest {
    pub id: Uuid,
    pub value: bool,
}

/// Generic `{message}` acknowledgement used by the CRUD glue endpoints.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiMessage {
    pub message: String,
}

impl ApiMessage {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_request_uses_contract_field_names() {
        let req: SendMailRequest = serde_json::from_str(
            r#"{"mailContent":"Test","subject":"Hi","to":"a@b.com"}"#,
        )
        .unwrap();
        assert_eq!(req.mail_content, "Test");
        assert_eq!(req.to, "a@b.com");
    }

    #[test]
    fn send_response_spells_email_id_as_contracted() {
        let resp = SendMailResponse {
            message: "Email sent successfully".into(),
            email_id: Uuid::nil(),
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"emailId\""));
    }

    #[test]
    fn tracking_status_omits_missing_timestamp() {
        let status = TrackingStatus {
            status: "sent".into(),
            timestamp: None,
        };
        assert_eq!(
            serde_json::to_string(&status).unwrap(),
            r#"{"status":"sent"}"#
        );
        let parsed: TrackingStatus = serde_json::from_str(r#"{"status":"not found"}"#).unwrap();
        assert_eq!(parsed.status, TrackingStatus::NOT_FOUND);
        assert!(parsed.timestamp.is_none());
    }
}
