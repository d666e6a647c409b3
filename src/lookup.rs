//! # Lookup Module
//!
//! Query validation and bounded lookups against the token store.

use std::fmt;

use tracing::info;

use crate::config::{LookupStrategy, ValidationRule};
use crate::db::{Predicate, TokenStore};
use crate::errors::{QueryError, StoreError};
use crate::token::Token;

/// A search string that passed [`validate_query`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query(String);

impl Query {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Validate a raw query against `rule`. Surrounding whitespace is ignored.
///
/// # Examples
///
/// ```rust
/// use idvault::config::ValidationRule;
/// use idvault::lookup::validate_query;
///
/// assert!(validate_query(" 123456 ", ValidationRule::ExactDigits(6)).is_ok());
/// assert!(validate_query("12a45", ValidationRule::ExactDigits(6)).is_err());
/// ```
pub fn validate_query(raw: &str, rule: ValidationRule) -> Result<Query, QueryError> {
    let query = raw.trim();
    if query.is_empty() {
        return Err(QueryError::Empty);
    }
    if !query.bytes().all(|b| b.is_ascii_digit()) {
        return Err(QueryError::NotDigits);
    }

    match rule {
        ValidationRule::ExactDigits(expected) if query.len() != expected => {
            Err(QueryError::WrongLength { expected })
        }
        ValidationRule::MinDigits(min) if query.len() < min => Err(QueryError::TooShort { min }),
        _ => Ok(Query(query.to_string())),
    }
}

/// Resolve `query` to at most `max_results` tokens. No match is an empty list.
pub async fn lookup(
    store: &dyn TokenStore,
    query: &Query,
    strategy: LookupStrategy,
    max_results: usize,
) -> Result<Vec<Token>, StoreError> {
    let predicate = Predicate::for_strategy(strategy, query.as_str());
    let results = store.select_where(&predicate, max_results).await?;

    info!(
        query = %query,
        strategy = ?strategy,
        results = results.len(),
        "Lookup completed"
    );
    Ok(results)
}
