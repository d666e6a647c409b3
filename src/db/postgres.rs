//! Postgres-backed [`TokenStore`].
//!
//! Prefix deployments store the key as a generated column so it can never
//! drift from the token; substring deployments rely on a `pg_trgm` GIN index
//! to keep `LIKE '%q%'` off the sequential-scan path.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder};
use tracing::{debug, error, info, warn};

use super::{Predicate, TokenStore};
use crate::config::{LookupStrategy, RecoveryConfig};
use crate::errors::StoreError;
use crate::token::Token;

/// Open a connection pool, retrying with jittered exponential backoff
pub async fn connect(database_url: &str, recovery: &RecoveryConfig) -> Result<PgPool, StoreError> {
    let mut attempt = 0u32;
    loop {
        let result = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(recovery.acquire_timeout_secs))
            .connect(database_url)
            .await;

        match result {
            Ok(pool) => {
                info!(attempt, "Connected to database");
                return Ok(pool);
            }
            Err(e) if attempt < recovery.max_retries => {
                let delay = retry_delay(recovery, attempt);
                warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Database connection failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(StoreError::Unavailable(e.to_string())),
        }
    }
}

/// Exponential backoff capped at `max_retry_delay_ms`, plus up to 25% jitter
fn retry_delay(recovery: &RecoveryConfig, attempt: u32) -> Duration {
    let base = recovery
        .base_retry_delay_ms
        .saturating_mul(1u64 << attempt.min(16))
        .min(recovery.max_retry_delay_ms);
    let jitter = rand::thread_rng().gen_range(0..=base / 4);
    Duration::from_millis(base + jitter)
}

fn map_sqlx_error(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StoreError::Unavailable(err.to_string()),
        other => StoreError::Database(other.to_string()),
    }
}

/// Escape `LIKE` metacharacters so the query is matched literally
pub fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Token table in Postgres
#[derive(Debug, Clone)]
pub struct PgTokenStore {
    pool: PgPool,
    table: String,
    strategy: LookupStrategy,
}

impl PgTokenStore {
    /// Wrap an existing pool. `table` must already be a validated identifier.
    pub fn new(pool: PgPool, table: impl Into<String>, strategy: LookupStrategy) -> Self {
        Self {
            pool,
            table: table.into(),
            strategy,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Create the table, its uniqueness constraint and the lookup index
    pub async fn init_schema(&self) -> Result<(), StoreError> {
        info!(table = %self.table, strategy = ?self.strategy, "Initializing database schema...");

        let statements = match self.strategy {
            LookupStrategy::Prefix { length } => vec![
                format!(
                    "CREATE TABLE IF NOT EXISTS {table} (
                        token TEXT PRIMARY KEY,
                        prefix TEXT GENERATED ALWAYS AS (left(token, {length})) STORED
                    )",
                    table = self.table
                ),
                format!(
                    "CREATE INDEX IF NOT EXISTS idx_{table}_prefix ON {table} (prefix)",
                    table = self.table
                ),
            ],
            LookupStrategy::Substring => vec![
                "CREATE EXTENSION IF NOT EXISTS pg_trgm".to_string(),
                format!(
                    "CREATE TABLE IF NOT EXISTS {table} (
                        token TEXT PRIMARY KEY
                    )",
                    table = self.table
                ),
                format!(
                    "CREATE INDEX IF NOT EXISTS idx_{table}_trgm ON {table} USING GIN (token gin_trgm_ops)",
                    table = self.table
                ),
            ],
        };

        for statement in &statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::Schema(e.to_string()))?;
        }

        if let LookupStrategy::Prefix { length } = self.strategy {
            self.check_prefix_expression(length).await?;
        }

        info!("Database schema initialized successfully");
        Ok(())
    }

    /// Refuse an existing table whose prefix column uses another length
    async fn check_prefix_expression(&self, length: usize) -> Result<(), StoreError> {
        let expression: Option<String> = sqlx::query_scalar(
            "SELECT COALESCE(generation_expression::text, '') FROM information_schema.columns
             WHERE table_name = $1 AND column_name = 'prefix'",
        )
        .bind(&self.table)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Schema(e.to_string()))?;

        let Some(expression) = expression else {
            return Err(StoreError::Schema(format!(
                "table {} has no generated prefix column",
                self.table
            )));
        };

        match generated_prefix_length(&expression) {
            Some(existing) if existing == length => Ok(()),
            existing => {
                error!(
                    table = %self.table,
                    expression = %expression,
                    prefix_length = length,
                    "Existing prefix column does not match the configured prefix length"
                );
                let found = existing.map_or_else(|| format!("'{expression}'"), |n| n.to_string());
                Err(StoreError::Schema(format!(
                    "table {} derives its prefix with length {found}, configured length is {length}",
                    self.table
                )))
            }
        }
    }
}

/// Length argument of a generated `left(token, N)` expression
fn generated_prefix_length(expression: &str) -> Option<usize> {
    let inner = expression.trim().strip_suffix(')')?;
    let (head, length) = inner.rsplit_once(',')?;
    if !head.contains("left") {
        return None;
    }
    length.trim().parse().ok()
}

#[async_trait]
impl TokenStore for PgTokenStore {
    async fn insert_or_ignore(&self, chunk: &[Token]) -> Result<u64, StoreError> {
        if chunk.is_empty() {
            return Ok(0);
        }

        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("INSERT INTO {} (token) ", self.table));
        qb.push_values(chunk, |mut b, token| {
            b.push_bind(token.as_str().to_owned());
        });
        qb.push(" ON CONFLICT (token) DO NOTHING");

        let result = qb
            .build()
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        debug!(
            table = %self.table,
            submitted = chunk.len(),
            inserted = result.rows_affected(),
            "Chunk written"
        );
        Ok(result.rows_affected())
    }

    async fn select_where(
        &self,
        predicate: &Predicate,
        limit: usize,
    ) -> Result<Vec<Token>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let rows: Vec<String> = match predicate {
            Predicate::PrefixEquals(key) => {
                if !matches!(self.strategy, LookupStrategy::Prefix { .. }) {
                    return Err(StoreError::Database(format!(
                        "table {} has no prefix column",
                        self.table
                    )));
                }
                let sql = format!("SELECT token FROM {} WHERE prefix = $1 LIMIT $2", self.table);
                sqlx::query_scalar(&sql)
                    .bind(key)
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?
            }
            Predicate::Contains(needle) => {
                let sql = format!("SELECT token FROM {} WHERE token LIKE $1 LIMIT $2", self.table);
                sqlx::query_scalar(&sql)
                    .bind(format!("%{}%", escape_like(needle)))
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?
            }
        };

        Ok(rows.into_iter().map(Token::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("9721"), "9721");
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }

    #[test]
    fn test_retry_delay_is_capped() {
        let recovery = RecoveryConfig::default();
        for attempt in 0..40 {
            let delay = retry_delay(&recovery, attempt);
            let cap = recovery.max_retry_delay_ms + recovery.max_retry_delay_ms / 4;
            assert!(delay.as_millis() as u64 <= cap);
            assert!(delay.as_millis() as u64 >= recovery.base_retry_delay_ms.min(cap));
        }
    }

    #[test]
    fn test_generated_prefix_length() {
        assert_eq!(generated_prefix_length(r#""left"(token, 6)"#), Some(6));
        assert_eq!(generated_prefix_length("left(token, 16)"), Some(16));
        assert_eq!(generated_prefix_length(""), None);
        assert_eq!(generated_prefix_length("upper(token)"), None);
        assert_eq!(generated_prefix_length(r#""right"(token, 6)"#), None);
    }

    #[test]
    fn test_map_sqlx_error() {
        assert!(matches!(
            map_sqlx_error(sqlx::Error::PoolTimedOut),
            StoreError::Unavailable(_)
        ));
        assert!(matches!(
            map_sqlx_error(sqlx::Error::RowNotFound),
            StoreError::Database(_)
        ));
    }
}
