//! # Ingestion Module
//!
//! Upload pipeline: size gate, extraction, in-batch deduplication and
//! chunked insert-or-ignore persistence.
//!
//! Persistence is atomic per chunk only. When a chunk fails, the chunks before
//! it stay committed and the rest of the batch is abandoned; the returned
//! [`PersistError`] says how much made it in.

use tracing::{debug, error, info};

use crate::config::EngineConfig;
use crate::db::TokenStore;
use crate::errors::{IngestError, PersistError};
use crate::text_processing::{dedupe, TokenExtractor};
use crate::token::Token;

/// Outcome of one ingested upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IngestReport {
    /// Tokens found in the upload, repeats included
    pub extracted: usize,
    /// Tokens left after in-batch deduplication
    pub unique: usize,
    /// Rows that did not exist in the store before this upload
    pub inserted: u64,
}

impl IngestReport {
    /// Unique tokens that were already stored
    pub fn already_known(&self) -> u64 {
        (self.unique as u64).saturating_sub(self.inserted)
    }
}

/// Reject uploads whose declared size exceeds `limit`, without reading them
pub fn check_upload_size(declared_size: u64, limit: u64) -> Result<(), IngestError> {
    if declared_size > limit {
        return Err(IngestError::Oversize {
            size: declared_size,
            limit,
        });
    }
    Ok(())
}

/// Write `tokens` in chunks of `chunk_size`, returning the number of new rows.
///
/// An empty batch returns 0 without touching the store.
pub async fn persist(
    store: &dyn TokenStore,
    tokens: &[Token],
    chunk_size: usize,
) -> Result<u64, PersistError> {
    if tokens.is_empty() {
        return Ok(0);
    }

    let chunk_size = chunk_size.max(1);
    let total_chunks = tokens.len().div_ceil(chunk_size);
    let mut inserted = 0u64;

    for (index, chunk) in tokens.chunks(chunk_size).enumerate() {
        match store.insert_or_ignore(chunk).await {
            Ok(new_rows) => {
                inserted += new_rows;
                debug!(
                    chunk = index + 1,
                    total_chunks,
                    submitted = chunk.len(),
                    new_rows,
                    "Chunk persisted"
                );
            }
            Err(e) => {
                error!(
                    chunk = index + 1,
                    total_chunks,
                    inserted,
                    error = %e,
                    "Chunk persistence failed, abandoning remaining chunks"
                );
                return Err(PersistError {
                    inserted,
                    failed_chunk: index + 1,
                    total_chunks,
                    source: e,
                });
            }
        }
    }

    Ok(inserted)
}

/// Extracted and deduplicated tokens of one upload, ready to persist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestionBatch {
    /// Tokens found in the upload, repeats included
    pub extracted: usize,
    pub tokens: Vec<Token>,
}

impl IngestionBatch {
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Extract and deduplicate tokens from decoded upload text
pub fn prepare_batch(extractor: &TokenExtractor, text: &str) -> IngestionBatch {
    let extracted = extractor.extract(text);
    let count = extracted.len();
    IngestionBatch {
        extracted: count,
        tokens: dedupe(extracted),
    }
}

/// Persist a prepared batch and report what changed
pub async fn persist_batch(
    store: &dyn TokenStore,
    batch: &IngestionBatch,
    chunk_size: usize,
) -> Result<IngestReport, PersistError> {
    let inserted = persist(store, &batch.tokens, chunk_size).await?;

    let report = IngestReport {
        extracted: batch.extracted,
        unique: batch.tokens.len(),
        inserted,
    };
    info!(
        extracted = report.extracted,
        unique = report.unique,
        inserted = report.inserted,
        "Ingestion completed"
    );
    Ok(report)
}

/// Run the whole pipeline over already-decoded upload text
pub async fn ingest_text(
    store: &dyn TokenStore,
    extractor: &TokenExtractor,
    config: &EngineConfig,
    text: &str,
) -> Result<IngestReport, PersistError> {
    let batch = prepare_batch(extractor, text);
    persist_batch(store, &batch, config.chunk_size).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ExtractionRule, LookupStrategy};
    use crate::db::MemoryTokenStore;

    #[test]
    fn test_check_upload_size() {
        assert!(check_upload_size(25 * 1024 * 1024, 25 * 1024 * 1024).is_ok());
        assert!(matches!(
            check_upload_size(25 * 1024 * 1024 + 1, 25 * 1024 * 1024),
            Err(IngestError::Oversize { .. })
        ));
    }

    #[test]
    fn test_already_known() {
        let report = IngestReport {
            extracted: 10,
            unique: 8,
            inserted: 3,
        };
        assert_eq!(report.already_known(), 5);
    }

    #[tokio::test]
    async fn test_persist_spans_chunks() {
        let store = MemoryTokenStore::new(LookupStrategy::Substring);
        let tokens: Vec<Token> = (0..12).map(|i| Token::new(format!("line {i}"))).collect();

        let inserted = persist(&store, &tokens, 5).await.unwrap();
        assert_eq!(inserted, 12);
        assert_eq!(store.len().await, 12);
    }

    #[test]
    fn test_prepare_batch_dedupes() {
        let extractor = TokenExtractor::new(ExtractionRule::Lines).unwrap();
        let batch = prepare_batch(&extractor, "a\nb\na\n\n");
        assert_eq!(batch.extracted, 3);
        assert_eq!(batch.tokens, vec![Token::from("a"), Token::from("b")]);
    }

    #[tokio::test]
    async fn test_ingest_text_counts() {
        let config = EngineConfig::numeric();
        let extractor = TokenExtractor::new(config.extraction).unwrap();
        let store = MemoryTokenStore::new(config.lookup);

        let report = ingest_text(
            &store,
            &extractor,
            &config,
            "abc\n123456789\nxx42\n123456789",
        )
        .await
        .unwrap();

        assert_eq!(
            report,
            IngestReport {
                extracted: 2,
                unique: 1,
                inserted: 1
            }
        );
    }
}
