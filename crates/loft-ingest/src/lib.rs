//! Inbox ingestion: fetch unseen mail from the remote mailbox, parse it,
//! and merge it into the store with duplicate suppression.

use anyhow::Result;
use tracing::{debug, info, warn};
use uuid::Uuid;

use loft_db::Database;
use loft_mail::{parse_incoming, ImapSource, IncomingMail, MailServerConfig, MailSource};
use loft_types::models::{Message, MessageKind, MessageStatus};

/// What one merge pass fetched and kept.
#[derive(Debug)]
pub struct MergeReport {
    pub fetched: usize,
    pub skipped: usize,
    /// Messages that were actually new to the store this pass.
    pub inserted: Vec<Message>,
}

/// Owns the mailbox credentials and runs one synchronous fetch-and-merge
/// per call. All methods block; run them on a blocking worker thread.
pub struct Ingestor {
    config: MailServerConfig,
}

impl Ingestor {
    pub fn new(config: MailServerConfig) -> Self {
        Ingestor { config }
    }

    /// Pulls unseen messages into the store and returns the inbox as the
    /// union of what was already stored and what this pass added.
    /// Connection and search failures are returned to the caller;
    /// per-message parse failures only skip that message.
    pub fn sync_inbox(&self, db: &Database) -> Result<Vec<Message>> {
        let mut source = ImapSource::connect(&self.config)?;
        let outcome = sync_mailbox(db, &mut source, &self.config.user);
        source.close();
        outcome
    }
}

/// Merges one batch from `source` into the store and returns the stored
/// inbox (snapshotted before the fetch) extended with the new arrivals.
/// The caller is expected to collapse by id and sort.
pub fn sync_mailbox(
    db: &Database,
    source: &mut dyn MailSource,
    recipient: &str,
) -> Result<Vec<Message>> {
    let mut inbox = db.list_kind(MessageKind::Inbox.as_str())?;

    let report = merge_unseen(db, source, recipient)?;
    if !report.inserted.is_empty() || report.skipped > 0 {
        info!(
            fetched = report.fetched,
            stored = report.inserted.len(),
            skipped = report.skipped,
            "inbox sync merged new mail"
        );
    }

    inbox.extend(report.inserted);
    Ok(inbox)
}

/// Fetches one batch from `source` and inserts whatever is not already
/// stored. Duplicate detection is the store's `(from, subject, date)`
/// triple, so a message fetched twice across restarts lands once.
pub fn merge_unseen(
    db: &Database,
    source: &mut dyn MailSource,
    recipient: &str,
) -> Result<MergeReport> {
    let batch = source.fetch_unseen()?;
    let mut report = MergeReport {
        fetched: batch.len(),
        skipped: 0,
        inserted: Vec::new(),
    };

    for raw in batch {
        let incoming = match parse_incoming(&raw) {
            Ok(mail) => mail,
            Err(err) => {
                warn!(error = %err, "skipping unparseable message");
                report.skipped += 1;
                continue;
            }
        };
        let message = inbox_message(incoming, recipient);
        match db.insert_inbox_if_absent(&message) {
            Ok(true) => report.inserted.push(message),
            Ok(false) => {
                debug!(from = %message.from, subject = %message.subject, "already stored, skipping");
            }
            Err(err) => {
                warn!(error = %err, "failed to store fetched message");
                report.skipped += 1;
            }
        }
    }
    Ok(report)
}

fn inbox_message(incoming: IncomingMail, recipient: &str) -> Message {
    Message {
        id: Uuid::new_v4(),
        from: incoming.from,
        to: recipient.to_string(),
        subject: incoming.subject,
        body: incoming.body,
        date: incoming.date,
        kind: Some(MessageKind::Inbox),
        starred: false,
        bin: false,
        status: MessageStatus::Sent,
        read_timestamp: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    struct StubSource {
        messages: Vec<Vec<u8>>,
    }

    impl StubSource {
        fn new(messages: Vec<Vec<u8>>) -> Self {
            StubSource { messages }
        }
    }

    impl MailSource for StubSource {
        fn fetch_unseen(&mut self) -> Result<Vec<Vec<u8>>> {
            Ok(std::mem::take(&mut self.messages))
        }

        fn close(&mut self) {}
    }

    struct FailingSource;

    impl MailSource for FailingSource {
        fn fetch_unseen(&mut self) -> Result<Vec<Vec<u8>>> {
            Err(anyhow::anyhow!("connection reset by peer"))
        }

        fn close(&mut self) {}
    }

    fn raw_mail(from: &str, subject: &str, date: &str, body: &str) -> Vec<u8> {
        format!("From: {from}\r\nSubject: {subject}\r\nDate: {date}\r\n\r\n{body}\r\n").into_bytes()
    }

    #[test]
    fn merges_fetched_messages_into_the_inbox() {
        let db = Database::open_in_memory().unwrap();
        let mut source = StubSource::new(vec![
            raw_mail(
                "alice@example.com",
                "Older",
                "Mon, 10 Feb 2025 09:00:00 +0000",
                "first",
            ),
            raw_mail(
                "bob@example.com",
                "Newer",
                "Mon, 10 Feb 2025 11:00:00 +0000",
                "second",
            ),
        ]);

        let report = merge_unseen(&db, &mut source, "me@example.com").unwrap();
        assert_eq!(report.fetched, 2);
        assert_eq!(report.inserted.len(), 2);
        assert_eq!(report.skipped, 0);

        let inbox = db.list_kind("inbox").unwrap();
        assert_eq!(inbox.len(), 2);
        // Newest first out of the store.
        assert_eq!(inbox[0].subject, "Newer");
        assert_eq!(inbox[1].subject, "Older");
        assert!(inbox.iter().all(|m| m.to == "me@example.com"));
        assert!(inbox.iter().all(|m| m.kind == Some(MessageKind::Inbox)));
    }

    #[test]
    fn refetched_messages_are_not_duplicated() {
        let db = Database::open_in_memory().unwrap();
        let payload = raw_mail(
            "alice@example.com",
            "Lunch",
            "Mon, 10 Feb 2025 10:00:00 +0000",
            "noon?",
        );

        let mut first = StubSource::new(vec![payload.clone()]);
        let report = merge_unseen(&db, &mut first, "me@example.com").unwrap();
        assert_eq!(report.inserted.len(), 1);

        // A second run sees the same message again, e.g. after a crash
        // before the server recorded the seen flag.
        let mut second = StubSource::new(vec![payload]);
        let report = merge_unseen(&db, &mut second, "me@example.com").unwrap();
        assert_eq!(report.fetched, 1);
        assert!(report.inserted.is_empty());

        assert_eq!(db.list_kind("inbox").unwrap().len(), 1);
    }

    #[test]
    fn unparseable_messages_are_skipped_not_fatal() {
        let db = Database::open_in_memory().unwrap();
        let mut source = StubSource::new(vec![
            raw_mail(
                "alice@example.com",
                "Good",
                "Mon, 10 Feb 2025 10:00:00 +0000",
                "ok",
            ),
            // No From header at all.
            b"Subject: orphan\r\n\r\nwho sent this\r\n".to_vec(),
            raw_mail(
                "bob@example.com",
                "Also good",
                "Mon, 10 Feb 2025 10:05:00 +0000",
                "ok too",
            ),
        ]);

        let report = merge_unseen(&db, &mut source, "me@example.com").unwrap();
        assert_eq!(report.inserted.len(), 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(db.list_kind("inbox").unwrap().len(), 2);
    }

    #[test]
    fn fetch_failure_propagates_to_the_caller() {
        let db = Database::open_in_memory().unwrap();
        let mut source = FailingSource;
        assert!(sync_mailbox(&db, &mut source, "me@example.com").is_err());
        assert!(db.list_kind("inbox").unwrap().is_empty());
    }

    #[test]
    fn sync_returns_stored_messages_plus_new_arrivals() {
        let db = Database::open_in_memory().unwrap();
        let stored = Message {
            id: Uuid::new_v4(),
            from: "alice@example.com".into(),
            to: "me@example.com".into(),
            subject: "Old news".into(),
            body: "kept".into(),
            date: Utc.with_ymd_and_hms(2025, 2, 9, 8, 0, 0).unwrap(),
            kind: Some(MessageKind::Inbox),
            starred: false,
            bin: false,
            status: MessageStatus::Sent,
            read_timestamp: None,
        };
        db.insert_message(&stored).unwrap();

        let mut source = StubSource::new(vec![raw_mail(
            "bob@example.com",
            "Fresh",
            "Mon, 10 Feb 2025 10:00:00 +0000",
            "new",
        )]);
        let union = sync_mailbox(&db, &mut source, "me@example.com").unwrap();

        let subjects: Vec<&str> = union.iter().map(|m| m.subject.as_str()).collect();
        assert_eq!(subjects, vec!["Old news", "Fresh"]);

        // A duplicate fetched later joins the stored snapshot, not the
        // new arrivals.
        let mut again = StubSource::new(vec![raw_mail(
            "bob@example.com",
            "Fresh",
            "Mon, 10 Feb 2025 10:00:00 +0000",
            "new",
        )]);
        let union = sync_mailbox(&db, &mut again, "me@example.com").unwrap();
        assert_eq!(union.len(), 2);
    }
}
