use crate::models::MessageRow;
use crate::{Database, format_timestamp};
use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use uuid::Uuid;

use loft_types::models::Message;

const MESSAGE_COLUMNS: &str =
    "id, from_addr, to_addr, subject, body, date, kind, starred, bin, status, read_timestamp";

/// Outcome of a tracking update. `AlreadyRead` means the row exists and its
/// `read_timestamp` was left untouched — the beacon is idempotent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkRead {
    Updated,
    AlreadyRead,
    NotFound,
}

impl Database {
    // -- Writes --

    pub fn insert_message(&self, msg: &Message) -> Result<()> {
        self.with_conn(|conn| {
            execute_with_message(
                conn,
                "INSERT INTO messages (id, from_addr, to_addr, subject, body, date, kind, starred, bin, status, read_timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                msg,
            )?;
            Ok(())
        })
    }

    /// Atomic insert-if-absent keyed on the inbox dedup triple
    /// `(from_addr, subject, date)`. A single statement, so overlapping
    /// ingestion runs cannot both insert the same logical message. The probe
    /// matches any stored record with the triple, binned ones included, so a
    /// binned message is not resurrected by a later fetch.
    ///
    /// Returns `true` when a row was inserted.
    pub fn insert_inbox_if_absent(&self, msg: &Message) -> Result<bool> {
        self.with_conn(|conn| {
            let n = execute_with_message(
                conn,
                "INSERT INTO messages (id, from_addr, to_addr, subject, body, date, kind, starred, bin, status, read_timestamp)
                 SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11
                 WHERE NOT EXISTS (
                     SELECT 1 FROM messages
                     WHERE from_addr = ?2 AND subject = ?4 AND date = ?6
                 )",
                msg,
            )?;
            Ok(n > 0)
        })
    }

    /// One-way `sent → read` transition. The guard on `read_timestamp IS
    /// NULL` makes repeated beacon hits no-ops: the first opened-at time is
    /// never overwritten by a later one.
    pub fn mark_read(&self, id: Uuid, opened_at: DateTime<Utc>) -> Result<MarkRead> {
        self.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE messages SET status = 'read', read_timestamp = ?2
                 WHERE id = ?1 AND read_timestamp IS NULL",
                rusqlite::params![id.to_string(), format_timestamp(opened_at)],
            )?;
            if n > 0 {
                return Ok(MarkRead::Updated);
            }

            let exists: Option<String> = conn
                .query_row(
                    "SELECT id FROM messages WHERE id = ?1",
                    [id.to_string()],
                    |row| row.get(0),
                )
                .optional()?;

            Ok(if exists.is_some() {
                MarkRead::AlreadyRead
            } else {
                MarkRead::NotFound
            })
        })
    }

    pub fn toggle_starred(&self, id: Uuid, value: bool) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE messages SET starred = ?2 WHERE id = ?1",
                rusqlite::params![id.to_string(), value],
            )?;
            Ok(())
        })
    }

    /// Soft delete: the bin transition also clears the star and empties the
    /// kind, which is what keeps binned rows out of every folder listing.
    pub fn move_to_bin(&self, ids: &[Uuid]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.with_conn(|conn| {
            let (sql_in, params) = id_list(ids);
            let sql = format!(
                "UPDATE messages SET bin = 1, starred = 0, kind = '' WHERE id IN ({})",
                sql_in
            );
            let refs: Vec<&dyn rusqlite::types::ToSql> = params
                .iter()
                .map(|id| id as &dyn rusqlite::types::ToSql)
                .collect();
            conn.execute(&sql, refs.as_slice())?;
            Ok(())
        })
    }

    /// The only physical delete in the system.
    pub fn delete_messages(&self, ids: &[Uuid]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.with_conn(|conn| {
            let (sql_in, params) = id_list(ids);
            let sql = format!("DELETE FROM messages WHERE id IN ({})", sql_in);
            let refs: Vec<&dyn rusqlite::types::ToSql> = params
                .iter()
                .map(|id| id as &dyn rusqlite::types::ToSql)
                .collect();
            conn.execute(&sql, refs.as_slice())?;
            Ok(())
        })
    }

    // -- Reads --

    pub fn get_message(&self, id: Uuid) -> Result<Option<Message>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM messages WHERE id = ?1", MESSAGE_COLUMNS);
            let row = conn
                .query_row(&sql, [id.to_string()], map_message_row)
                .optional()?;
            Ok(row.map(MessageRow::into_message))
        })
    }

    /// Messages of one kind, newest first. Binned rows carry an empty kind,
    /// so they never match; the explicit filter covers rows written by hand.
    pub fn list_kind(&self, kind: &str) -> Result<Vec<Message>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM messages WHERE kind = ?1 AND bin = 0 ORDER BY date DESC",
                MESSAGE_COLUMNS
            );
            query_messages(conn, &sql, [kind])
        })
    }

    pub fn list_starred(&self) -> Result<Vec<Message>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM messages WHERE starred = 1 AND bin = 0 ORDER BY date DESC",
                MESSAGE_COLUMNS
            );
            query_messages(conn, &sql, [])
        })
    }

    pub fn list_bin(&self) -> Result<Vec<Message>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM messages WHERE bin = 1 ORDER BY date DESC",
                MESSAGE_COLUMNS
            );
            query_messages(conn, &sql, [])
        })
    }

    /// Every non-binned message. The bin view is the single exception to the
    /// bin-exclusion rule, and it has its own query.
    pub fn list_all(&self) -> Result<Vec<Message>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM messages WHERE bin = 0 ORDER BY date DESC",
                MESSAGE_COLUMNS
            );
            query_messages(conn, &sql, [])
        })
    }
}

/// Bind a [`Message`] to an 11-placeholder statement in column order.
fn execute_with_message(conn: &Connection, sql: &str, msg: &Message) -> rusqlite::Result<usize> {
    conn.execute(
        sql,
        rusqlite::params![
            msg.id.to_string(),
            msg.from,
            msg.to,
            msg.subject,
            msg.body,
            format_timestamp(msg.date),
            msg.kind.map(|k| k.as_str()).unwrap_or(""),
            msg.starred,
            msg.bin,
            msg.status.as_str(),
            msg.read_timestamp.map(format_timestamp),
        ],
    )
}

fn id_list(ids: &[Uuid]) -> (String, Vec<String>) {
    let placeholders: Vec<String> = (1..=ids.len()).map(|i| format!("?{}", i)).collect();
    let params: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
    (placeholders.join(", "), params)
}

fn map_message_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        from_addr: row.get(1)?,
        to_addr: row.get(2)?,
        subject: row.get(3)?,
        body: row.get(4)?,
        date: row.get(5)?,
        kind: row.get(6)?,
        starred: row.get(7)?,
        bin: row.get(8)?,
        status: row.get(9)?,
        read_timestamp: row.get(10)?,
    })
}

fn query_messages<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> Result<Vec<Message>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, map_message_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows.into_iter().map(MessageRow::into_message).collect())
}
