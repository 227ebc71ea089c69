use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use loft_api::state::AppStateInner;
use loft_ingest::Ingestor;
use loft_mail::{MailServerConfig, SmtpMailer};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "loft=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let host = env_or("LOFT_HOST", "0.0.0.0");
    let port: u16 = env_or("LOFT_PORT", "8000").parse()?;
    let db_path = env_or("LOFT_DB_PATH", "loft.db");
    let public_url = std::env::var("LOFT_PUBLIC_URL")
        .unwrap_or_else(|_| format!("http://localhost:{port}"));

    // One mail account drives both directions; host/port/TLS are
    // per-endpoint.
    let account =
        std::env::var("LOFT_MAIL_USER").context("LOFT_MAIL_USER must be set")?;
    let credential =
        std::env::var("LOFT_MAIL_PASSWORD").context("LOFT_MAIL_PASSWORD must be set")?;

    let smtp = MailServerConfig {
        host: env_or("LOFT_SMTP_HOST", "smtp.gmail.com"),
        port: env_or("LOFT_SMTP_PORT", "465").parse()?,
        user: account.clone(),
        credential: credential.clone(),
        use_tls: env_or("LOFT_SMTP_TLS", "true").parse()?,
    };
    let imap = MailServerConfig {
        host: env_or("LOFT_IMAP_HOST", "imap.gmail.com"),
        port: env_or("LOFT_IMAP_PORT", "993").parse()?,
        user: account.clone(),
        credential,
        use_tls: env_or("LOFT_IMAP_TLS", "true").parse()?,
    };

    // Init database
    let db = loft_db::Database::open(&PathBuf::from(&db_path))?;

    // Shared state
    let state = Arc::new(AppStateInner {
        db,
        mailer: Arc::new(SmtpMailer::new(&smtp)?),
        ingestor: Ingestor::new(imap),
        sender: account,
        public_url,
    });

    let app = loft_api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("loft server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}
