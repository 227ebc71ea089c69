//! Database row types — these map directly to SQLite rows.
//! Distinct from the loft-types wire models to keep the DB layer independent.

use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use loft_types::models::{Message, MessageKind, MessageStatus};

pub struct MessageRow {
    pub id: String,
    pub from_addr: String,
    pub to_addr: String,
    pub subject: String,
    pub body: String,
    pub date: String,
    pub kind: String,
    pub starred: bool,
    pub bin: bool,
    pub status: String,
    pub read_timestamp: Option<String>,
}

fn parse_stored_timestamp(raw: &str, id: &str, field: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}' on message '{}': {}", field, raw, id, e);
        DateTime::default()
    })
}

impl MessageRow {
    /// Convert a stored row into the wire model. Corrupt stored values are
    /// logged and replaced with defaults rather than failing the whole
    /// listing, the same policy the rest of the read path follows.
    pub fn into_message(self) -> Message {
        let id = self.id.parse::<Uuid>().unwrap_or_else(|e| {
            warn!("Corrupt message id '{}': {}", self.id, e);
            Uuid::default()
        });

        let kind = if self.kind.is_empty() {
            None
        } else {
            let parsed = MessageKind::parse(&self.kind);
            if parsed.is_none() {
                warn!("Corrupt kind '{}' on message '{}'", self.kind, self.id);
            }
            parsed
        };

        let status = MessageStatus::parse(&self.status).unwrap_or_else(|| {
            warn!("Corrupt status '{}' on message '{}'", self.status, self.id);
            MessageStatus::Sent
        });

        let date = parse_stored_timestamp(&self.date, &self.id, "date");
        let read_timestamp = self
            .read_timestamp
            .as_deref()
            .map(|raw| parse_stored_timestamp(raw, &self.id, "read_timestamp"));

        Message {
            id,
            from: self.from_addr,
            to: self.to_addr,
            subject: self.subject,
            body: self.body,
            date,
            kind,
            starred: self.starred,
            bin: self.bin,
            status,
            read_timestamp,
        }
    }
}
