use thiserror::Error;
use uuid::Uuid;

/// Errors that escape the engine. Per-tool failures never show up here:
/// they are folded into `ToolOutcome::status` by the adapters.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid target '{input}': {reason}")]
    InvalidTarget { input: String, reason: String },

    #[error("scan run {0} not found")]
    RunNotFound(Uuid),

    #[error("persistence error: {0}")]
    Persistence(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("report generation failed: {0}")]
    Report(String),

    #[error("corrupt stored record: {0}")]
    Corrupt(String),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
