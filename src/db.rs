use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use crate::error::IngestError;
use crate::models::InboundEvent;

const INIT_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS webhooks (
  id                INTEGER PRIMARY KEY AUTOINCREMENT,
  user_id           INTEGER NOT NULL,
  webhook_url       TEXT UNIQUE NOT NULL,
  helius_webhook_id TEXT UNIQUE NOT NULL,
  account_keys      TEXT NOT NULL, -- comma-joined account addresses
  event_types       TEXT NOT NULL, -- comma-joined event type tags
  is_active         INTEGER NOT NULL DEFAULT 1,
  created_at        TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS webhook_events (
  id            INTEGER PRIMARY KEY AUTOINCREMENT,
  webhook_id    INTEGER NOT NULL,
  event_type    TEXT NOT NULL,
  account_key   TEXT NOT NULL,
  slot          INTEGER NOT NULL,
  received_at   TEXT NOT NULL,
  payload       TEXT NOT NULL,
  processed     INTEGER NOT NULL DEFAULT 0,
  processed_at  TEXT,
  error_message TEXT
);
"#;

/// Connect to SQLite (with WAL mode for performance)
pub fn connect(path: &str) -> Result<Connection, IngestError> {
    let conn = Connection::open(path)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    Ok(conn)
}

/// Run schema migrations
pub fn run_migrations(conn: &Connection) -> Result<(), IngestError> {
    conn.execute_batch(INIT_SQL)?;
    Ok(())
}

/// Insert the audit row for an inbound event. Written before dispatch so a
/// downstream failure is still observable. Returns the row id.
pub fn insert_event(
    conn: &Connection,
    event: &InboundEvent,
    received_at: DateTime<Utc>,
) -> Result<i64, IngestError> {
    conn.execute(
        r#"
        INSERT INTO webhook_events (
            webhook_id, event_type, account_key,
            slot, received_at, payload
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
        params![
            event.webhook_id,
            event.event_type,
            event.account_key,
            event.slot as i64,
            received_at.to_rfc3339(),
            event.payload,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Flip the audit row to processed once dispatch succeeds
pub fn mark_processed(
    conn: &Connection,
    event_id: i64,
    processed_at: DateTime<Utc>,
) -> Result<(), IngestError> {
    conn.execute(
        "UPDATE webhook_events SET processed = 1, processed_at = ?1 WHERE id = ?2",
        params![processed_at.to_rfc3339(), event_id],
    )?;
    Ok(())
}

/// Record a dispatch failure on the audit row; processed stays 0
pub fn record_failure(
    conn: &Connection,
    event_id: i64,
    message: &str,
) -> Result<(), IngestError> {
    conn.execute(
        "UPDATE webhook_events SET error_message = ?1 WHERE id = ?2",
        params![message, event_id],
    )?;
    Ok(())
}
