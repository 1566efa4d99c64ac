// src/registry.rs
//
// The webhook registry owns registration rows: creating them (remote call
// first, local persist second) and looking them up to gate inbound events.

use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};
use tokio::task;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::IngestError;
use crate::helius::{ProviderRegistration, RegistrationApi};
use crate::models::WebhookRegistration;

/// Register a webhook for a user: call the provider, then persist the
/// registration locally with active=true.
///
/// If the local insert fails after the provider call succeeded, the remote
/// webhook is orphaned; the error carries the provider id so an operator
/// can reconcile. No distributed transaction.
pub async fn register<A: RegistrationApi>(
    api: &A,
    conn: Arc<Mutex<Connection>>,
    cfg: &Config,
    user_id: i64,
    account_keys: Vec<String>,
    event_types: Vec<String>,
) -> Result<WebhookRegistration, IngestError> {
    if account_keys.is_empty() {
        return Err(IngestError::MalformedPayload(
            "account_keys must not be empty".to_string(),
        ));
    }
    if event_types.is_empty() {
        return Err(IngestError::MalformedPayload(
            "event_types must not be empty".to_string(),
        ));
    }

    let webhook_url = format!(
        "{}/webhooks/helius",
        cfg.callback_base_url.trim_end_matches('/')
    );

    let helius_webhook_id = api
        .register_webhook(&ProviderRegistration {
            webhook_url: webhook_url.clone(),
            account_addresses: account_keys.clone(),
            event_types: event_types.clone(),
            auth_header: format!("Bearer {}", cfg.helius_api_key),
        })
        .await?;

    info!("Provider assigned webhook id {}", helius_webhook_id);

    let result = task::spawn_blocking(move || {
        let db = conn.lock().unwrap();
        insert_registration(
            &db,
            user_id,
            &webhook_url,
            &helius_webhook_id,
            &account_keys,
            &event_types,
        )
    })
    .await
    .map_err(|e| IngestError::Persistence(format!("registration task failed: {e}")))?;

    match result {
        Ok(reg) => Ok(reg),
        Err(err) => {
            // Remote webhook now has no local record
            warn!("Local persist failed after remote registration: {err}");
            Err(IngestError::Persistence(format!(
                "failed to store registration (provider webhook orphaned): {err}"
            )))
        }
    }
}

/// Persist a registration row. Split out so tests can seed the registry
/// without a provider round-trip.
pub fn insert_registration(
    conn: &Connection,
    user_id: i64,
    webhook_url: &str,
    helius_webhook_id: &str,
    account_keys: &[String],
    event_types: &[String],
) -> Result<WebhookRegistration, IngestError> {
    conn.execute(
        r#"
        INSERT INTO webhooks (
            user_id, webhook_url, helius_webhook_id,
            account_keys, event_types, is_active
        )
        VALUES (?1, ?2, ?3, ?4, ?5, 1)
        "#,
        params![
            user_id,
            webhook_url,
            helius_webhook_id,
            account_keys.join(","),
            event_types.join(","),
        ],
    )?;

    Ok(WebhookRegistration {
        id: conn.last_insert_rowid(),
        user_id,
        webhook_url: webhook_url.to_string(),
        helius_webhook_id: helius_webhook_id.to_string(),
        account_keys: account_keys.to_vec(),
        event_types: event_types.to_vec(),
        is_active: true,
    })
}

/// Look up a registration by its local id
pub fn lookup(conn: &Connection, webhook_id: i64) -> Result<Option<WebhookRegistration>, IngestError> {
    let row = conn
        .query_row(
            r#"
            SELECT id, user_id, webhook_url, helius_webhook_id,
                   account_keys, event_types, is_active
            FROM webhooks WHERE id = ?1
            "#,
            [webhook_id],
            |r| {
                Ok(WebhookRegistration {
                    id: r.get(0)?,
                    user_id: r.get(1)?,
                    webhook_url: r.get(2)?,
                    helius_webhook_id: r.get(3)?,
                    account_keys: split_list(&r.get::<_, String>(4)?),
                    event_types: split_list(&r.get::<_, String>(5)?),
                    is_active: r.get::<_, i64>(6)? != 0,
                })
            },
        )
        .optional()?;
    Ok(row)
}

fn split_list(joined: &str) -> Vec<String> {
    joined
        .split(',')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
