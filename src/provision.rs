// src/provision.rs
//
// On-demand provisioning of per-user, per-event-type tables, plus the
// typed inserts into them. Table identity is derived from the numeric user
// id and the EventType enum's static suffix, so no raw input ever reaches
// an identifier position; all values go through bound parameters.

use chrono::DateTime;
use rusqlite::{params, Connection};
use tracing::info;

use crate::decoders::TypedRecord;
use crate::dispatch::EventType;
use crate::error::IngestError;

/// Deterministic relation name for (user, event type). Any caller can
/// recompute it without a lookup table.
pub fn table_name(user_id: i64, event_type: EventType) -> String {
    format!("user_{}_{}", user_id, event_type.table_suffix())
}

/// Create the tenant relation if it does not exist yet. Idempotent:
/// concurrent first-writers race to a single CREATE TABLE IF NOT EXISTS
/// and all observe the same table. Returns the relation name. Relations
/// are never dropped or altered here once created.
pub fn ensure_relation(
    conn: &Connection,
    user_id: i64,
    event_type: EventType,
) -> Result<String, IngestError> {
    let table = table_name(user_id, event_type);
    let columns = match event_type {
        EventType::NftBid => {
            r#"
            nft_address TEXT NOT NULL,
            bidder      TEXT NOT NULL,
            amount      TEXT NOT NULL, -- Decimal stored as string
            timestamp   TEXT NOT NULL
            "#
        }
        EventType::NftPrice => {
            r#"
            nft_address TEXT NOT NULL,
            price       TEXT NOT NULL, -- Decimal stored as string
            market      TEXT NOT NULL,
            timestamp   TEXT NOT NULL
            "#
        }
        EventType::TokenBorrow => {
            r#"
            token_address TEXT NOT NULL,
            amount        TEXT NOT NULL, -- Decimal stored as string
            apy           TEXT NOT NULL,
            platform      TEXT NOT NULL,
            timestamp     TEXT NOT NULL
            "#
        }
        EventType::TokenPrice => {
            r#"
            token_address TEXT NOT NULL,
            price         TEXT NOT NULL, -- Decimal stored as string
            platform      TEXT NOT NULL,
            timestamp     TEXT NOT NULL
            "#
        }
    };

    conn.execute_batch(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            {columns},
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        "#
    ))?;

    Ok(table)
}

/// Insert one decoded record into the tenant's relation, provisioning it
/// first if needed. Records are insert-only.
pub fn write(conn: &Connection, user_id: i64, record: &TypedRecord) -> Result<(), IngestError> {
    let table = ensure_relation(conn, user_id, record.event_type())?;

    match record {
        TypedRecord::NftBid(bid) => {
            conn.execute(
                &format!(
                    "INSERT INTO {table} (nft_address, bidder, amount, timestamp) \
                     VALUES (?1, ?2, ?3, ?4)"
                ),
                params![
                    bid.nft_address,
                    bid.bidder,
                    bid.amount.to_string(),
                    unix_to_rfc3339(bid.timestamp)?,
                ],
            )?;
        }
        TypedRecord::NftPrice(price) => {
            conn.execute(
                &format!(
                    "INSERT INTO {table} (nft_address, price, market, timestamp) \
                     VALUES (?1, ?2, ?3, ?4)"
                ),
                params![
                    price.nft_address,
                    price.price.to_string(),
                    price.market,
                    unix_to_rfc3339(price.timestamp)?,
                ],
            )?;
        }
        TypedRecord::TokenBorrow(borrow) => {
            conn.execute(
                &format!(
                    "INSERT INTO {table} (token_address, amount, apy, platform, timestamp) \
                     VALUES (?1, ?2, ?3, ?4, ?5)"
                ),
                params![
                    borrow.token_address,
                    borrow.amount.to_string(),
                    borrow.apy.to_string(),
                    borrow.platform,
                    unix_to_rfc3339(borrow.timestamp)?,
                ],
            )?;
        }
        TypedRecord::TokenPrice(price) => {
            conn.execute(
                &format!(
                    "INSERT INTO {table} (token_address, price, platform, timestamp) \
                     VALUES (?1, ?2, ?3, ?4)"
                ),
                params![
                    price.token_address,
                    price.price.to_string(),
                    price.platform,
                    unix_to_rfc3339(price.timestamp)?,
                ],
            )?;
        }
    }

    info!("💾 Wrote {} record into {}", record.event_type().as_tag(), table);
    Ok(())
}

fn unix_to_rfc3339(secs: i64) -> Result<String, IngestError> {
    DateTime::from_timestamp(secs, 0)
        .map(|dt| dt.to_rfc3339())
        .ok_or_else(|| IngestError::Decode(format!("timestamp out of range: {secs}")))
}
