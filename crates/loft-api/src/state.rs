use std::sync::Arc;

use loft_db::Database;
use loft_ingest::Ingestor;
use loft_mail::MailTransport;

/// Everything the handlers share. Lives behind one `Arc`; handlers clone
/// the `Arc`, never the contents.
pub struct AppStateInner {
    pub db: Database,
    pub mailer: Arc<dyn MailTransport>,
    pub ingestor: Ingestor,
    /// Address outbound mail is sent from; also the recipient recorded on
    /// ingested mail.
    pub sender: String,
    /// External base URL the beacon links point back at.
    pub public_url: String,
}

pub type AppState = Arc<AppStateInner>;
