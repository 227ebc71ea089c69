use std::fmt;

/// Connection settings for a single mail endpoint, SMTP submission or an
/// IMAP mailbox. One value per endpoint; nothing here is process-global.
#[derive(Clone)]
pub struct MailServerConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub credential: String,
    /// Implicit TLS from the first byte. When false the connection starts
    /// in plaintext and upgrades via STARTTLS before authenticating.
    pub use_tls: bool,
}

impl fmt::Debug for MailServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("credential", &"<redacted>")
            .field("use_tls", &self.use_tls)
            .finish()
    }
}
