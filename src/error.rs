use thiserror::Error;

/// Failure taxonomy for the ingestion pipeline. Nothing here is retried
/// in-process; every variant surfaces to the HTTP caller.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("webhook {0} not found")]
    UnknownWebhook(i64),

    #[error("webhook {0} is inactive")]
    InactiveWebhook(i64),

    #[error("unsupported event type: {0}")]
    UnsupportedEventType(String),

    #[error("failed to decode event payload: {0}")]
    Decode(String),

    #[error("storage error: {0}")]
    Persistence(String),

    #[error("provider registration failed: {0}")]
    RemoteRegistration(String),
}

impl From<rusqlite::Error> for IngestError {
    fn from(err: rusqlite::Error) -> Self {
        IngestError::Persistence(err.to_string())
    }
}

impl From<reqwest::Error> for IngestError {
    fn from(err: reqwest::Error) -> Self {
        IngestError::RemoteRegistration(err.to_string())
    }
}
