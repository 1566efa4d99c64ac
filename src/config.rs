use dotenvy::dotenv;
use eyre::Result;
use std::env;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: String,
    pub port: u16,
    pub helius_api_key: String,
    pub helius_base_url: String,
    pub callback_base_url: String, // public base URL the provider calls back to
}

pub fn load() -> Result<Config> {
    dotenv().ok(); // Load from .env file

    // SQLite DB path (default: ingestor.db)
    let db_path = env::var("DATABASE_URL").unwrap_or_else(|_| "ingestor.db".to_string());

    // API port (default: 8080)
    let port = env::var("PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse()
        .unwrap_or(8080);

    // Helius API key, needed for outbound webhook registration
    let helius_api_key = env::var("HELIUS_API_KEY").unwrap_or_default();
    if helius_api_key.is_empty() {
        warn!("HELIUS_API_KEY is not set; webhook registration calls will be rejected upstream");
    }

    let helius_base_url =
        env::var("HELIUS_BASE_URL").unwrap_or_else(|_| "https://api.helius.xyz/v0".to_string());

    // Where the provider delivers events; must be reachable from outside
    let callback_base_url =
        env::var("CALLBACK_BASE_URL").unwrap_or_else(|_| format!("http://localhost:{}", port));

    let cfg = Config {
        db_path,
        port,
        helius_api_key,
        helius_base_url,
        callback_base_url,
    };

    info!(
        "Loaded config: db={}, port={}, helius={}, callback={}",
        cfg.db_path, cfg.port, cfg.helius_base_url, cfg.callback_base_url
    );

    Ok(cfg)
}
