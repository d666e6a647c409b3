//! In-memory [`TokenStore`] with the same semantics as the Postgres table.

use std::collections::HashSet;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{Predicate, TokenStore};
use crate::config::LookupStrategy;
use crate::errors::StoreError;
use crate::token::Token;

/// A stored row: the token and, for prefix deployments, its derived key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRow {
    pub token: Token,
    pub prefix: Option<String>,
}

#[derive(Debug, Default)]
struct Rows {
    ordered: Vec<StoredRow>,
    present: HashSet<Token>,
}

/// Insertion-ordered token set held in process memory
#[derive(Debug)]
pub struct MemoryTokenStore {
    prefix_length: Option<usize>,
    rows: Mutex<Rows>,
}

impl MemoryTokenStore {
    pub fn new(strategy: LookupStrategy) -> Self {
        let prefix_length = match strategy {
            LookupStrategy::Prefix { length } => Some(length),
            LookupStrategy::Substring => None,
        };
        Self {
            prefix_length,
            rows: Mutex::new(Rows::default()),
        }
    }

    /// Snapshot of every stored row in insertion order
    pub async fn rows(&self) -> Vec<StoredRow> {
        self.rows.lock().await.ordered.clone()
    }

    pub async fn len(&self) -> usize {
        self.rows.lock().await.ordered.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn insert_or_ignore(&self, chunk: &[Token]) -> Result<u64, StoreError> {
        let mut rows = self.rows.lock().await;
        let mut inserted = 0u64;

        for token in chunk {
            if rows.present.insert(token.clone()) {
                let prefix = self
                    .prefix_length
                    .map(|len| token.prefix_key(len).to_string());
                rows.ordered.push(StoredRow {
                    token: token.clone(),
                    prefix,
                });
                inserted += 1;
            }
        }

        Ok(inserted)
    }

    async fn select_where(
        &self,
        predicate: &Predicate,
        limit: usize,
    ) -> Result<Vec<Token>, StoreError> {
        let rows = self.rows.lock().await;

        let matches: Vec<Token> = match predicate {
            Predicate::PrefixEquals(key) => {
                if self.prefix_length.is_none() {
                    return Err(StoreError::Database(
                        "store has no prefix column".to_string(),
                    ));
                }
                rows.ordered
                    .iter()
                    .filter(|row| row.prefix.as_deref() == Some(key.as_str()))
                    .take(limit)
                    .map(|row| row.token.clone())
                    .collect()
            }
            Predicate::Contains(needle) => rows
                .ordered
                .iter()
                .filter(|row| row.token.as_str().contains(needle.as_str()))
                .take(limit)
                .map(|row| row.token.clone())
                .collect(),
        };

        Ok(matches)
    }
}
