use thiserror::Error;

/// Anything that stops an incident statement from committing.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0} timed out")]
    Timeout(&'static str),

    #[error("invalid database configuration: {0}")]
    Config(String),
}
