use std::net::TcpStream;

use native_tls::{TlsConnector, TlsStream};
use tracing::{debug, info};

use crate::config::MailServerConfig;
use crate::MailError;

/// One retrieval cycle's worth of raw messages from a remote mailbox.
/// Production uses [`ImapSource`]; ingestion tests use canned stubs.
pub trait MailSource {
    /// Returns the full RFC 822 bytes of every unseen message, marking
    /// them seen on the server as a side effect of the fetch.
    fn fetch_unseen(&mut self) -> anyhow::Result<Vec<Vec<u8>>>;

    /// Ends the session. Failures here are not worth surfacing; the
    /// messages are already fetched.
    fn close(&mut self);
}

/// IMAP mailbox reader over TLS.
pub struct ImapSource {
    session: imap::Session<TlsStream<TcpStream>>,
}

impl ImapSource {
    pub fn connect(config: &MailServerConfig) -> Result<Self, MailError> {
        info!(host = %config.host, port = config.port, user = %config.user, "connecting to IMAP server");
        let mut builder = TlsConnector::builder();
        if is_local_host(&config.host) {
            // Local test servers run with self-signed certificates.
            builder.danger_accept_invalid_certs(true);
            builder.danger_accept_invalid_hostnames(true);
        }
        let tls = builder.build()?;

        let addr = (config.host.as_str(), config.port);
        let client = if config.use_tls {
            imap::connect(addr, &config.host, &tls)?
        } else {
            imap::connect_starttls(addr, &config.host, &tls)?
        };
        let session = client
            .login(&config.user, &config.credential)
            .map_err(|e| e.0)?;
        Ok(ImapSource { session })
    }
}

impl MailSource for ImapSource {
    fn fetch_unseen(&mut self) -> anyhow::Result<Vec<Vec<u8>>> {
        self.session.select("INBOX").map_err(MailError::Imap)?;
        let uids = self.session.uid_search("UNSEEN").map_err(MailError::Imap)?;
        debug!(count = uids.len(), "unseen messages on server");
        let mut raw = Vec::with_capacity(uids.len());
        for uid in uids {
            let fetches = self
                .session
                .uid_fetch(uid.to_string(), "RFC822")
                .map_err(MailError::Imap)?;
            let Some(fetch) = fetches.iter().next() else {
                continue;
            };
            let Some(body) = fetch.body() else {
                debug!(uid, "fetch returned no body, skipping");
                continue;
            };
            raw.push(body.to_vec());
        }
        Ok(raw)
    }

    fn close(&mut self) {
        if let Err(err) = self.session.logout() {
            debug!(error = %err, "IMAP logout failed");
        }
    }
}

fn is_local_host(host: &str) -> bool {
    host == "localhost" || host == "127.0.0.1" || host == "::1"
}
