//! Storage layer for persisted tokens.
//!
//! The engine only ever talks to a [`TokenStore`]: one conflict-ignoring bulk
//! insert and one bounded select. [`PgTokenStore`] backs production and
//! [`MemoryTokenStore`] stands in for it in tests.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::config::LookupStrategy;
use crate::errors::StoreError;
use crate::token::Token;

pub use memory::MemoryTokenStore;
pub use postgres::PgTokenStore;

/// Row filter understood by every store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// Stored prefix key equals the value
    PrefixEquals(String),
    /// Token contains the value as a contiguous substring
    Contains(String),
}

impl Predicate {
    /// Build the predicate a lookup strategy evaluates for `query`
    pub fn for_strategy(strategy: LookupStrategy, query: &str) -> Self {
        match strategy {
            LookupStrategy::Prefix { .. } => Predicate::PrefixEquals(query.to_string()),
            LookupStrategy::Substring => Predicate::Contains(query.to_string()),
        }
    }
}

/// Persisted, append-only token set with exact-equality uniqueness
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Insert every token not already present; return how many were new.
    /// The whole chunk is one operation: it either applies or fails.
    async fn insert_or_ignore(&self, chunk: &[Token]) -> Result<u64, StoreError>;

    /// Return at most `limit` tokens matching `predicate`, in storage order
    async fn select_where(
        &self,
        predicate: &Predicate,
        limit: usize,
    ) -> Result<Vec<Token>, StoreError>;
}
