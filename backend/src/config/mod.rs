use config::{Config, Environment};
use dotenv::dotenv;
use serde::Deserialize;

use crate::error::AppError;

/// Runtime settings read from the environment (and `.env` when present).
///
/// `JWT_SECRET` is required; everything else has a default.
#[derive(Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    /// Shared secret for identity assertions minted by the OAuth exchange.
    /// Login is disabled when unset.
    pub identity_provider_secret: Option<String>,
    pub pool_max_size: u32,
}

impl AppConfig {
    pub fn load() -> Result<Self, AppError> {
        dotenv().ok(); // Load .env file if present
        Self::from_source(Environment::default().try_parsing(true))
    }

    fn from_source(source: Environment) -> Result<Self, AppError> {
        let settings = Config::builder()
            .set_default("database_url", "scrap_exchange.db")?
            .set_default("port", 8080)?
            .set_default("token_ttl_hours", 24)?
            .set_default("pool_max_size", 8)?
            .add_source(source)
            .build()?;
        let config: AppConfig = settings.try_deserialize()?;
        if config.jwt_secret.trim().is_empty() {
            return Err(AppError::NotConfigured("JWT_SECRET"));
        }
        Ok(config)
    }
}

// Secrets stay out of logs.
impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("database_url", &self.database_url)
            .field("port", &self.port)
            .field("token_ttl_hours", &self.token_ttl_hours)
            .field(
                "identity_provider_secret",
                &self.identity_provider_secret.as_ref().map(|_| "<redacted>"),
            )
            .field("pool_max_size", &self.pool_max_size)
            .finish_non_exhaustive()
    }
}
