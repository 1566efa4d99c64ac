use axum::{
    body::Bytes,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::{json, Value};
use std::{
    net::SocketAddr,
    sync::{Arc, Mutex},
};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::config::Config;
use crate::dispatch::Dispatcher;
use crate::error::IngestError;
use crate::helius::HeliusClient;
use crate::{ingest, registry};

#[derive(Deserialize)]
pub struct ConfigureRequest {
    pub user_id: i64,
    pub account_keys: Vec<String>,
    pub event_types: Vec<String>,
}

pub async fn serve(cfg: Config, conn: Arc<Mutex<Connection>>) -> eyre::Result<()> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let dispatcher = Arc::new(Dispatcher::new());
    let helius = Arc::new(HeliusClient::new(&cfg.helius_base_url, &cfg.helius_api_key)?);

    let app = Router::new()
        .route("/", get(|| async { "Helius ingestor running" }))
        .route(
            "/webhooks/configure",
            post({
                let conn = Arc::clone(&conn);
                let helius = Arc::clone(&helius);
                let cfg = cfg.clone();
                move |Json(req): Json<ConfigureRequest>| {
                    let conn = Arc::clone(&conn);
                    let helius = Arc::clone(&helius);
                    let cfg = cfg.clone();
                    async move { configure_webhook(helius, conn, cfg, req).await }
                }
            }),
        )
        .route(
            "/webhooks/helius",
            post({
                let conn = Arc::clone(&conn);
                let dispatcher = Arc::clone(&dispatcher);
                move |body: Bytes| {
                    let conn = Arc::clone(&conn);
                    let dispatcher = Arc::clone(&dispatcher);
                    async move { handle_event(conn, dispatcher, body).await }
                }
            }),
        )
        .layer(cors);

    let addr = SocketAddr::from(([127, 0, 0, 1], cfg.port));
    info!("API listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

async fn configure_webhook(
    helius: Arc<HeliusClient>,
    conn: Arc<Mutex<Connection>>,
    cfg: Config,
    req: ConfigureRequest,
) -> (StatusCode, Json<Value>) {
    match registry::register(
        helius.as_ref(),
        conn,
        &cfg,
        req.user_id,
        req.account_keys,
        req.event_types,
    )
    .await
    {
        Ok(reg) => (
            StatusCode::CREATED,
            Json(serde_json::to_value(&reg).unwrap_or_else(|_| json!({"id": reg.id}))),
        ),
        Err(err) => error_response(&err),
    }
}

async fn handle_event(
    conn: Arc<Mutex<Connection>>,
    dispatcher: Arc<Dispatcher>,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    match ingest::ingest(conn, dispatcher, &body).await {
        Ok(event_id) => (
            StatusCode::OK,
            Json(json!({"message": "event processed", "event_id": event_id})),
        ),
        Err(err) => error_response(&err),
    }
}

fn error_response(err: &IngestError) -> (StatusCode, Json<Value>) {
    let status = match err {
        IngestError::MalformedPayload(_)
        | IngestError::InactiveWebhook(_)
        | IngestError::UnsupportedEventType(_)
        | IngestError::Decode(_) => StatusCode::BAD_REQUEST,
        IngestError::UnknownWebhook(_) => StatusCode::NOT_FOUND,
        IngestError::RemoteRegistration(_) => StatusCode::BAD_GATEWAY,
        IngestError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({"error": err.to_string()})))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_map_to_4xx() {
        let (status, _) = error_response(&IngestError::UnknownWebhook(7));
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = error_response(&IngestError::UnsupportedEventType("x".into()));
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn infrastructure_errors_map_to_5xx() {
        let (status, _) = error_response(&IngestError::Persistence("disk".into()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

        let (status, _) = error_response(&IngestError::RemoteRegistration("503".into()));
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }
}
