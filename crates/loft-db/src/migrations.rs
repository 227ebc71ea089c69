use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS messages (
            id              TEXT PRIMARY KEY,
            from_addr       TEXT NOT NULL,
            to_addr         TEXT NOT NULL,
            subject         TEXT NOT NULL DEFAULT '',
            body            TEXT NOT NULL DEFAULT '',
            date            TEXT NOT NULL,
            kind            TEXT NOT NULL DEFAULT '',
            starred         INTEGER NOT NULL DEFAULT 0,
            bin             INTEGER NOT NULL DEFAULT 0,
            status          TEXT NOT NULL DEFAULT 'sent'
                            CHECK (status IN ('draft', 'sent', 'read', 'failed')),
            read_timestamp  TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_messages_kind
            ON messages(kind, date);

        -- Probe index for the ingestion dedup triple
        CREATE INDEX IF NOT EXISTS idx_messages_dedup
            ON messages(from_addr, subject, date);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
