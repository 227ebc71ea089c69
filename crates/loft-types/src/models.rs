use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which folder a message belongs to. Binned messages carry no kind at all
/// (`Option::None` in [`Message`]) so that folder queries skip them without
/// an extra filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Draft,
    Sent,
    Inbox,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Draft => "draft",
            MessageKind::Sent => "sent",
            MessageKind::Inbox => "inbox",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(MessageKind::Draft),
            "sent" => Some(MessageKind::Sent),
            "inbox" => Some(MessageKind::Inbox),
            _ => None,
        }
    }
}

/// Delivery/read state of a message. `Read` is reachable only from `Sent`,
/// only via the tracking endpoint, and is never left again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Draft,
    Sent,
    Read,
    Failed,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Draft => "draft",
            MessageStatus::Sent => "sent",
            MessageStatus::Read => "read",
            MessageStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(MessageStatus::Draft),
            "sent" => Some(MessageStatus::Sent),
            "read" => Some(MessageStatus::Read),
            "failed" => Some(MessageStatus::Failed),
            _ => None,
        }
    }
}

/// The central entity: one stored mail, whether drafted, sent, or ingested.
///
/// Invariants the store upholds:
/// - `status == Read` exactly when `read_timestamp` is set.
/// - an inbox message is unique per `(from, subject, date)` triple.
/// - `bin == true` implies `starred == false` and `kind == None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
    pub date: DateTime<Utc>,
    pub kind: Option<MessageKind>,
    pub starred: bool,
    pub bin: bool,
    pub status: MessageStatus,
    pub read_timestamp: Option<DateTime<Utc>>,
}
