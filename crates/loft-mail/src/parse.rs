use chrono::{DateTime, Utc};
use mailparse::ParsedMail;

use crate::MailError;

/// The fields ingestion keeps from a fetched message.
#[derive(Debug, Clone)]
pub struct IncomingMail {
    pub from: String,
    pub subject: String,
    pub body: String,
    pub date: DateTime<Utc>,
}

/// Parses raw RFC 822 bytes into the fields the store needs.
///
/// A message without a `From` header is malformed and rejected. A missing
/// subject becomes the empty string, and a missing or unreadable `Date`
/// header falls back to the current time.
pub fn parse_incoming(raw: &[u8]) -> Result<IncomingMail, MailError> {
    let parsed = mailparse::parse_mail(raw)?;

    let from = header_value(&parsed, "From")
        .ok_or_else(|| MailError::Parse("missing From header".into()))?;
    let subject = header_value(&parsed, "Subject").unwrap_or_default();
    let date = header_value(&parsed, "Date")
        .and_then(|d| parse_msg_date(&d))
        .unwrap_or_else(Utc::now);
    let body = extract_body(&parsed);

    Ok(IncomingMail {
        from,
        subject,
        body,
        date,
    })
}

fn header_value(mail: &ParsedMail, name: &str) -> Option<String> {
    mail.headers
        .iter()
        .find(|h| h.get_key_ref().eq_ignore_ascii_case(name))
        .map(|h| h.get_value())
}

fn parse_msg_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw.trim()) {
        return Some(dt.with_timezone(&Utc));
    }
    // dateparse is lenient and returns epoch for garbage input; treat
    // non-positive seconds as no date at all.
    mailparse::dateparse(raw)
        .ok()
        .filter(|&secs| secs > 0)
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
}

/// Walks the MIME tree for the first `text/plain` part that is not an
/// attachment. Single-part messages return their body directly.
fn extract_body(mail: &ParsedMail) -> String {
    if mail.subparts.is_empty() {
        return mail.get_body().unwrap_or_default();
    }
    for part in &mail.subparts {
        if part.ctype.mimetype == "text/plain" && !is_attachment(part) {
            return part.get_body().unwrap_or_default();
        }
    }
    for part in &mail.subparts {
        let body = extract_body(part);
        if !body.is_empty() {
            return body;
        }
    }
    String::new()
}

fn is_attachment(part: &ParsedMail) -> bool {
    part.headers
        .iter()
        .any(|h| h.get_key_ref().eq_ignore_ascii_case("Content-Disposition"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_a_plain_message() {
        let raw = concat!(
            "From: Alice <alice@example.com>\r\n",
            "To: me@example.com\r\n",
            "Subject: Lunch plans\r\n",
            "Date: Mon, 10 Feb 2025 10:30:00 +0000\r\n",
            "\r\n",
            "Noon works for me.\r\n",
        );
        let mail = parse_incoming(raw.as_bytes()).unwrap();
        assert_eq!(mail.from, "Alice <alice@example.com>");
        assert_eq!(mail.subject, "Lunch plans");
        assert_eq!(mail.body.trim(), "Noon works for me.");
        assert_eq!(
            mail.date,
            Utc.with_ymd_and_hms(2025, 2, 10, 10, 30, 0).unwrap()
        );
    }

    #[test]
    fn multipart_prefers_the_plain_text_part() {
        let raw = concat!(
            "From: bob@example.com\r\n",
            "Subject: Report\r\n",
            "Date: Tue, 11 Feb 2025 09:00:00 +0000\r\n",
            "MIME-Version: 1.0\r\n",
            "Content-Type: multipart/alternative; boundary=\"sep\"\r\n",
            "\r\n",
            "--sep\r\n",
            "Content-Type: text/html\r\n",
            "\r\n",
            "<p>html body</p>\r\n",
            "--sep\r\n",
            "Content-Type: text/plain\r\n",
            "\r\n",
            "plain text body\r\n",
            "--sep--\r\n",
        );
        let mail = parse_incoming(raw.as_bytes()).unwrap();
        assert_eq!(mail.body.trim(), "plain text body");
    }

    #[test]
    fn attachments_are_not_mistaken_for_the_body() {
        let raw = concat!(
            "From: carol@example.com\r\n",
            "Subject: Files\r\n",
            "MIME-Version: 1.0\r\n",
            "Content-Type: multipart/mixed; boundary=\"sep\"\r\n",
            "\r\n",
            "--sep\r\n",
            "Content-Type: text/plain\r\n",
            "Content-Disposition: attachment; filename=\"notes.txt\"\r\n",
            "\r\n",
            "attached notes\r\n",
            "--sep\r\n",
            "Content-Type: text/plain\r\n",
            "\r\n",
            "see attachment\r\n",
            "--sep--\r\n",
        );
        let mail = parse_incoming(raw.as_bytes()).unwrap();
        assert_eq!(mail.body.trim(), "see attachment");
    }

    #[test]
    fn missing_date_defaults_to_now() {
        let raw = "From: dave@example.com\r\nSubject: hi\r\n\r\nbody\r\n";
        let before = Utc::now();
        let mail = parse_incoming(raw.as_bytes()).unwrap();
        assert!(mail.date >= before);
        assert!(mail.date <= Utc::now());
    }

    #[test]
    fn unparseable_date_defaults_to_now() {
        let raw = "From: dave@example.com\r\nSubject: hi\r\nDate: not a date\r\n\r\nbody\r\n";
        let before = Utc::now();
        let mail = parse_incoming(raw.as_bytes()).unwrap();
        assert!(mail.date >= before);
        assert!(mail.date <= Utc::now());
    }

    #[test]
    fn garbage_date_is_not_mistaken_for_the_epoch() {
        // Messages with unreadable dates must not all share the epoch as
        // their date, or they would collide in the inbox dedup triple.
        assert_eq!(parse_msg_date("not a date"), None);
        assert_eq!(parse_msg_date(""), None);
        let mail = parse_incoming(
            b"From: dave@example.com\r\nSubject: hi\r\nDate: not a date\r\n\r\nbody\r\n",
        )
        .unwrap();
        assert_ne!(mail.date, DateTime::from_timestamp(0, 0).unwrap());
    }

    #[test]
    fn missing_from_is_rejected() {
        let raw = "Subject: orphan\r\n\r\nbody\r\n";
        assert!(parse_incoming(raw.as_bytes()).is_err());
    }

    #[test]
    fn missing_subject_becomes_empty() {
        let raw = "From: eve@example.com\r\n\r\nbody\r\n";
        let mail = parse_incoming(raw.as_bytes()).unwrap();
        assert_eq!(mail.subject, "");
    }
}
