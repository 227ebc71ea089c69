use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use tracing::debug;
use uuid::Uuid;

use crate::config::MailServerConfig;
use crate::MailError;

/// A composed outbound mail. `text` is the raw content the sender typed;
/// `html` is the rendered alternative carrying the read beacon.
#[derive(Debug, Clone)]
pub struct OutboundEmail {
    pub id: Uuid,
    pub from: String,
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

impl OutboundEmail {
    /// Composes a message whose HTML part embeds the beacon for `id`.
    pub fn compose(
        id: Uuid,
        from: &str,
        to: &str,
        subject: &str,
        text: &str,
        public_url: &str,
    ) -> Self {
        let html = render_html_body(text, &beacon_url(public_url, id));
        OutboundEmail {
            id,
            from: from.to_string(),
            to: to.to_string(),
            subject: subject.to_string(),
            text: text.to_string(),
            html,
        }
    }
}

/// Beacon endpoint for one message, e.g. `https://host/tracking/pixel/<id>`.
pub fn beacon_url(public_url: &str, id: Uuid) -> String {
    format!("{}/tracking/pixel/{}", public_url.trim_end_matches('/'), id)
}

/// Renders the HTML alternative: escaped text with line breaks preserved,
/// followed by the invisible one-pixel beacon image.
pub fn render_html_body(text: &str, beacon: &str) -> String {
    let escaped = escape_html(text).replace('\n', "<br>");
    format!(
        r#"<p>{escaped}</p><img src="{beacon}" width="1" height="1" style="display:none;" alt="">"#
    )
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Outbound delivery seam. The server wires in [`SmtpMailer`]; tests swap
/// in recording or failing fakes.
pub trait MailTransport: Send + Sync {
    fn send(&self, mail: &OutboundEmail) -> anyhow::Result<()>;
}

/// Delivers via an authenticated SMTP relay.
pub struct SmtpMailer {
    transport: SmtpTransport,
}

impl SmtpMailer {
    pub fn new(config: &MailServerConfig) -> Result<Self, MailError> {
        let creds = Credentials::new(config.user.clone(), config.credential.clone());
        let transport = if config.use_tls {
            SmtpTransport::relay(&config.host)?
                .port(config.port)
                .credentials(creds)
                .build()
        } else {
            SmtpTransport::starttls_relay(&config.host)?
                .port(config.port)
                .credentials(creds)
                .build()
        };
        Ok(SmtpMailer { transport })
    }
}

impl MailTransport for SmtpMailer {
    fn send(&self, mail: &OutboundEmail) -> anyhow::Result<()> {
        let from: Mailbox = mail
            .from
            .parse()
            .map_err(|_| MailError::InvalidAddress(mail.from.clone()))?;
        let to: Mailbox = mail
            .to
            .parse()
            .map_err(|_| MailError::InvalidAddress(mail.to.clone()))?;

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(mail.subject.clone())
            .multipart(MultiPart::alternative_plain_html(
                mail.text.clone(),
                mail.html.clone(),
            ))
            .map_err(MailError::Compose)?;

        debug!(id = %mail.id, to = %mail.to, "handing message to SMTP relay");
        self.transport.send(&message).map_err(MailError::Smtp)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn beacon_url_joins_without_double_slash() {
        let id = Uuid::nil();
        assert_eq!(
            beacon_url("http://localhost:8000/", id),
            format!("http://localhost:8000/tracking/pixel/{id}")
        );
        assert_eq!(
            beacon_url("http://localhost:8000", id),
            format!("http://localhost:8000/tracking/pixel/{id}")
        );
    }

    #[test]
    fn html_body_escapes_markup_and_keeps_line_breaks() {
        let html = render_html_body("a <b> &\nsecond line", "http://x/p/1");
        assert!(html.contains("a &lt;b&gt; &amp;<br>second line"));
        assert!(html.contains(r#"<img src="http://x/p/1""#));
    }

    #[test]
    fn compose_embeds_the_message_beacon() {
        let id = Uuid::new_v4();
        let mail = OutboundEmail::compose(
            id,
            "me@example.com",
            "you@example.com",
            "Hi",
            "Hello",
            "http://localhost:8000",
        );
        assert!(mail.html.contains(&format!("/tracking/pixel/{id}")));
        assert_eq!(mail.text, "Hello");
    }
}
