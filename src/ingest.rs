// src/ingest.rs
//
// Entry point for inbound events: validate against the registry, write the
// audit row, dispatch to the typed pipeline, record the outcome.

use chrono::Utc;
use rusqlite::Connection;
use std::sync::{Arc, Mutex};
use tokio::task;
use tracing::{info, warn};

use crate::db;
use crate::dispatch::Dispatcher;
use crate::error::IngestError;
use crate::models::{InboundEvent, WebhookRegistration};
use crate::registry;

/// Ingest one raw event body. Returns the audit row id on success.
///
/// The audit row is written before dispatch and is never skipped: a
/// downstream failure leaves a row with processed=0 and an error message,
/// not silence. Rejections with no event identity (malformed bodies,
/// unknown/inactive webhooks) leave no row.
pub async fn ingest(
    conn: Arc<Mutex<Connection>>,
    dispatcher: Arc<Dispatcher>,
    body: &[u8],
) -> Result<i64, IngestError> {
    let event: InboundEvent =
        serde_json::from_slice(body).map_err(|e| IngestError::MalformedPayload(e.to_string()))?;

    task::spawn_blocking(move || {
        let db = conn.lock().unwrap();
        process_event(&db, &dispatcher, &event)
    })
    .await
    .map_err(|e| IngestError::Persistence(format!("ingest task failed: {e}")))?
}

fn process_event(
    db: &Connection,
    dispatcher: &Dispatcher,
    event: &InboundEvent,
) -> Result<i64, IngestError> {
    let registration = registry::lookup(db, event.webhook_id)?
        .ok_or(IngestError::UnknownWebhook(event.webhook_id))?;
    if !registration.is_active {
        return Err(IngestError::InactiveWebhook(event.webhook_id));
    }

    let event_id = db::insert_event(db, event, Utc::now())?;

    match dispatch_to_tenant(db, dispatcher, &registration, event) {
        Ok(()) => {
            db::mark_processed(db, event_id, Utc::now())?;
            info!(
                "Processed {} event {} for webhook {} (slot {})",
                event.event_type, event_id, event.webhook_id, event.slot
            );
            Ok(event_id)
        }
        Err(err) => {
            warn!("Event {} failed: {}", event_id, err);
            db::record_failure(db, event_id, &err.to_string())?;
            Err(err)
        }
    }
}

fn dispatch_to_tenant(
    db: &Connection,
    dispatcher: &Dispatcher,
    registration: &WebhookRegistration,
    event: &InboundEvent,
) -> Result<(), IngestError> {
    let (_, record) = dispatcher.decode(&event.event_type, &event.payload)?;
    crate::provision::write(db, registration.user_id, &record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::registry::insert_registration;

    fn setup() -> (Arc<Mutex<Connection>>, Arc<Dispatcher>) {
        let conn = Connection::open_in_memory().unwrap();
        db::run_migrations(&conn).unwrap();
        (Arc::new(Mutex::new(conn)), Arc::new(Dispatcher::new()))
    }

    fn seed_registration(conn: &Arc<Mutex<Connection>>, user_id: i64, active: bool) -> i64 {
        let db = conn.lock().unwrap();
        let reg = insert_registration(
            &db,
            user_id,
            &format!("http://localhost/webhooks/helius/{user_id}"),
            &format!("wh_{user_id}"),
            &["ACC1".to_string()],
            &["nft_bid".to_string()],
        )
        .unwrap();
        if !active {
            db.execute("UPDATE webhooks SET is_active = 0 WHERE id = ?1", [reg.id])
                .unwrap();
        }
        reg.id
    }

    fn event_body(webhook_id: i64, event_type: &str, payload: &str) -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "webhook_id": webhook_id,
            "event_type": event_type,
            "account_key": "ACC1",
            "slot": 250_000_123u64,
            "payload": payload,
        }))
        .unwrap()
    }

    fn audit_row(conn: &Arc<Mutex<Connection>>, id: i64) -> (bool, Option<String>) {
        let db = conn.lock().unwrap();
        db.query_row(
            "SELECT processed, error_message FROM webhook_events WHERE id = ?1",
            [id],
            |r| Ok((r.get::<_, i64>(0)? != 0, r.get(1)?)),
        )
        .unwrap()
    }

    fn audit_count(conn: &Arc<Mutex<Connection>>) -> i64 {
        let db = conn.lock().unwrap();
        db.query_row("SELECT COUNT(*) FROM webhook_events", [], |r| r.get(0))
            .unwrap()
    }

    #[tokio::test]
    async fn nft_bid_happy_path() {
        let (conn, dispatcher) = setup();
        let webhook_id = seed_registration(&conn, 42, true);

        let body = event_body(
            webhook_id,
            "nft_bid",
            r#"{"nft_address":"ACC1","bidder":"B1","amount":2.5,"timestamp":1700000000}"#,
        );
        let event_id = ingest(Arc::clone(&conn), dispatcher, &body).await.unwrap();

        let (processed, error) = audit_row(&conn, event_id);
        assert!(processed);
        assert!(error.is_none());

        let db = conn.lock().unwrap();
        let (bidder, amount): (String, String) = db
            .query_row("SELECT bidder, amount FROM user_42_nft_bids", [], |r| {
                Ok((r.get(0)?, r.get(1)?))
            })
            .unwrap();
        assert_eq!(bidder, "B1");
        assert_eq!(amount, "2.5");
    }

    #[tokio::test]
    async fn malformed_body_leaves_no_audit_row() {
        let (conn, dispatcher) = setup();
        seed_registration(&conn, 42, true);

        let err = ingest(Arc::clone(&conn), dispatcher, b"{\"event_type\":").await;
        assert!(matches!(err, Err(IngestError::MalformedPayload(_))));
        assert_eq!(audit_count(&conn), 0);
    }

    #[tokio::test]
    async fn unknown_webhook_is_rejected_without_audit_row() {
        let (conn, dispatcher) = setup();

        let body = event_body(999, "nft_bid", "{}");
        let err = ingest(Arc::clone(&conn), dispatcher, &body).await;
        assert!(matches!(err, Err(IngestError::UnknownWebhook(999))));
        assert_eq!(audit_count(&conn), 0);
    }

    #[tokio::test]
    async fn inactive_webhook_is_rejected() {
        let (conn, dispatcher) = setup();
        let webhook_id = seed_registration(&conn, 42, false);

        let body = event_body(webhook_id, "nft_bid", "{}");
        let err = ingest(Arc::clone(&conn), dispatcher, &body).await;
        assert!(matches!(err, Err(IngestError::InactiveWebhook(_))));
        assert_eq!(audit_count(&conn), 0);
    }

    #[tokio::test]
    async fn unsupported_event_type_still_writes_the_audit_row() {
        let (conn, dispatcher) = setup();
        let webhook_id = seed_registration(&conn, 42, true);

        let body = event_body(webhook_id, "nft_sale", "{}");
        let err = ingest(Arc::clone(&conn), dispatcher, &body).await;
        assert!(matches!(err, Err(IngestError::UnsupportedEventType(_))));

        assert_eq!(audit_count(&conn), 1);
        let (processed, error) = {
            let db = conn.lock().unwrap();
            db.query_row(
                "SELECT processed, error_message FROM webhook_events",
                [],
                |r| Ok((r.get::<_, i64>(0)? != 0, r.get::<_, Option<String>>(1)?)),
            )
            .unwrap()
        };
        assert!(!processed);
        assert!(error.unwrap().contains("unsupported event type"));
    }

    #[tokio::test]
    async fn missing_amount_records_the_decode_error() {
        let (conn, dispatcher) = setup();
        let webhook_id = seed_registration(&conn, 42, true);

        let body = event_body(
            webhook_id,
            "nft_bid",
            r#"{"nft_address":"ACC1","bidder":"B1","timestamp":1700000000}"#,
        );
        let err = ingest(Arc::clone(&conn), dispatcher, &body).await;
        assert!(matches!(err, Err(IngestError::Decode(_))));

        let (processed, error) = audit_row(&conn, 1);
        assert!(!processed);
        assert!(error.is_some());

        // No tenant relation was provisioned for the failed decode
        let db = conn.lock().unwrap();
        let tables: i64 = db
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'user_42_nft_bids'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(tables, 0);
    }

    #[tokio::test]
    async fn concurrent_events_for_one_tenant_all_land() {
        let (conn, dispatcher) = setup();
        let webhook_id = seed_registration(&conn, 42, true);

        let mut handles = Vec::new();
        for i in 0..5 {
            let conn = Arc::clone(&conn);
            let dispatcher = Arc::clone(&dispatcher);
            let payload = format!(
                r#"{{"nft_address":"ACC1","bidder":"B{i}","amount":{i}.5,"timestamp":1700000000}}"#
            );
            handles.push(tokio::spawn(async move {
                let body = event_body(webhook_id, "nft_bid", &payload);
                ingest(conn, dispatcher, &body).await
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }

        let db = conn.lock().unwrap();
        let rows: i64 = db
            .query_row("SELECT COUNT(*) FROM user_42_nft_bids", [], |r| r.get(0))
            .unwrap();
        assert_eq!(rows, 5);
    }
}
