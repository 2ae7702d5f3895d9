use thiserror::Error;

/// Failure talking to either the local key-value store or the cloud document store.
///
/// The quiz manager never propagates these; they are logged and turned into
/// empty results.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("mongodb error: {0}")]
    Mongo(#[from] mongodb::error::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;
