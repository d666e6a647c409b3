//! # Error Types Module
//!
//! Typed errors for each layer of the ingestion and lookup engine. The bot
//! handlers turn every one of these into a single localized message; only
//! [`ConfigError`] is allowed to stop the process, and only at startup.

use thiserror::Error;

/// Startup configuration faults
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is absent or empty
    #[error("missing required setting: {0}")]
    Missing(&'static str),
    /// A setting is present but unusable
    #[error("invalid setting {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
    /// The JSON override file could not be read or parsed
    #[error("failed to load config file {path}: {reason}")]
    File { path: String, reason: String },
}

/// Failures reported by a [`TokenStore`](crate::db::TokenStore)
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("database error: {0}")]
    Database(String),
    #[error("schema setup failed: {0}")]
    Schema(String),
}

/// A chunk failed mid-batch. Chunks committed before it stay persisted.
#[derive(Debug, Error)]
#[error("persistence failed at chunk {failed_chunk} of {total_chunks} ({inserted} tokens already committed)")]
pub struct PersistError {
    /// New rows committed by the chunks that succeeded
    pub inserted: u64,
    /// 1-based index of the chunk that failed
    pub failed_chunk: usize,
    pub total_chunks: usize,
    #[source]
    pub source: StoreError,
}

/// Query validation faults, raised before any store access
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("query is empty")]
    Empty,
    #[error("query must contain digits only")]
    NotDigits,
    #[error("query must be exactly {expected} digits")]
    WrongLength { expected: usize },
    #[error("query must be at least {min} digits")]
    TooShort { min: usize },
}

/// Upload ingestion faults
#[derive(Debug, Error)]
pub enum IngestError {
    /// Declared size exceeds the ceiling; content was never read
    #[error("file of {size} bytes exceeds the {limit} byte limit")]
    Oversize { size: u64, limit: u64 },
    #[error(transparent)]
    Persist(#[from] PersistError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persist_error_display() {
        let err = PersistError {
            inserted: 5000,
            failed_chunk: 2,
            total_chunks: 3,
            source: StoreError::Unavailable("connection reset".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "persistence failed at chunk 2 of 3 (5000 tokens already committed)"
        );
    }

    #[test]
    fn test_ingest_error_wraps_persist_error() {
        let err: IngestError = PersistError {
            inserted: 0,
            failed_chunk: 1,
            total_chunks: 1,
            source: StoreError::Database("boom".to_string()),
        }
        .into();
        assert!(matches!(err, IngestError::Persist(_)));
        assert!(err.to_string().contains("chunk 1 of 1"));
    }

    #[test]
    fn test_query_error_messages() {
        assert_eq!(
            QueryError::WrongLength { expected: 6 }.to_string(),
            "query must be exactly 6 digits"
        );
        assert_eq!(
            QueryError::TooShort { min: 3 }.to_string(),
            "query must be at least 3 digits"
        );
    }
}
