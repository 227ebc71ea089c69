//! Mail protocol plumbing: SMTP submission, IMAP retrieval, and RFC 822
//! parsing. Everything here is synchronous; callers run it on blocking
//! worker threads.

pub mod config;
pub mod parse;
pub mod smtp;
pub mod source;

use thiserror::Error;

pub use config::MailServerConfig;
pub use parse::{parse_incoming, IncomingMail};
pub use smtp::{beacon_url, MailTransport, OutboundEmail, SmtpMailer};
pub use source::{ImapSource, MailSource};

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid mail address '{0}'")]
    InvalidAddress(String),

    #[error("failed to compose message: {0}")]
    Compose(#[from] lettre::error::Error),

    #[error("SMTP transport failed: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("TLS setup failed: {0}")]
    Tls(#[from] native_tls::Error),

    #[error("IMAP session failed: {0}")]
    Imap(#[from] imap::error::Error),

    #[error("malformed message: {0}")]
    Parse(String),
}

impl From<mailparse::MailParseError> for MailError {
    fn from(err: mailparse::MailParseError) -> Self {
        MailError::Parse(err.to_string())
    }
}
