// src/models.rs
use serde::{Deserialize, Serialize};

/// A user's webhook subscription, backed by a provider-issued identifier
#[derive(Debug, Clone, Serialize)]
pub struct WebhookRegistration {
    pub id: i64,
    pub user_id: i64,
    pub webhook_url: String,             // callback URL registered with the provider
    pub helius_webhook_id: String,       // provider-assigned identifier
    pub account_keys: Vec<String>,       // monitored account addresses
    pub event_types: Vec<String>,        // monitored event type tags
    pub is_active: bool,
}

/// One raw notification received from the provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundEvent {
    pub webhook_id: i64,
    pub event_type: String,
    pub account_key: String,
    pub slot: u64,          // chain position marker
    pub payload: String,    // opaque JSON, decoded downstream by event type
}
