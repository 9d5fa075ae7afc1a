use thiserror::Error;

/// Errors surfaced by the analysis core and its collaborators.
///
/// A missing optional field is never an error: it renders as "N/A".
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Symbol or market could not be resolved by the data provider
    #[error("No data found for {0}. Check the ticker symbol.")]
    NotFound(String),

    /// Statement tables empty or too short for a computation
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// Caller supplied something malformed (unsorted series, bad period, ...)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Upstream provider answered with something unusable
    #[error("Provider error: {0}")]
    Provider(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl AnalysisError {
    pub fn not_found(symbol: impl Into<String>) -> Self {
        Self::NotFound(symbol.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
