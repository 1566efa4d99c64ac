// src/helius.rs
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::info;

use crate::error::IngestError;

/// Body of the provider's webhook-creation call
#[derive(Debug, Clone, Serialize)]
pub struct ProviderRegistration {
    #[serde(rename = "webhookURL")]
    pub webhook_url: String,
    #[serde(rename = "accountAddresses")]
    pub account_addresses: Vec<String>,
    #[serde(rename = "eventTypes")]
    pub event_types: Vec<String>,
    #[serde(rename = "authHeader")]
    pub auth_header: String,
}

#[derive(Debug, Deserialize)]
struct ProviderResponse {
    #[serde(rename = "webhookID")]
    webhook_id: String,
}

/// Seam for the remote registration service; tests substitute a mock
pub trait RegistrationApi {
    fn register_webhook(
        &self,
        req: &ProviderRegistration,
    ) -> impl Future<Output = Result<String, IngestError>> + Send;
}

pub struct HeliusClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HeliusClient {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, IngestError> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(HeliusClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }
}

impl RegistrationApi for HeliusClient {
    /// Register a webhook with Helius; returns the provider-assigned id
    async fn register_webhook(&self, req: &ProviderRegistration) -> Result<String, IngestError> {
        let url = format!("{}/webhooks", self.base_url);
        info!("📡 Registering webhook → {} ({} accounts)", url, req.account_addresses.len());

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(req)
            .send()
            .await?;

        let status = resp.status();
        if status != StatusCode::OK && status != StatusCode::CREATED {
            return Err(IngestError::RemoteRegistration(format!(
                "unexpected status code: {status}"
            )));
        }

        let parsed: ProviderResponse = resp
            .json()
            .await
            .map_err(|e| IngestError::RemoteRegistration(format!("bad response body: {e}")))?;

        Ok(parsed.webhook_id)
    }
}
