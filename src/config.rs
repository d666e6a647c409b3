//! # Configuration Module
//!
//! Engine presets for the two deployment modes, JSON overrides, store
//! connection recovery settings, and the environment-driven bot settings.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::ConfigError;

// Constants for engine configuration
pub const DEFAULT_MIN_DIGIT_RUN: usize = 6;
pub const DEFAULT_PREFIX_LENGTH: usize = 6;
pub const DEFAULT_MIN_QUERY_LENGTH: usize = 3;
pub const DEFAULT_CHUNK_SIZE: usize = 5000;
pub const DEFAULT_MAX_RESULTS: usize = 50_000;
pub const NUMERIC_MAX_INLINE: usize = 80;
pub const LINES_MAX_INLINE: usize = 60;
pub const MAX_FILE_SIZE: u64 = 25 * 1024 * 1024; // 25MB upload ceiling
/// Postgres caps a single statement at 65535 bind parameters
pub const MAX_CHUNK_SIZE: usize = 65_535;
pub const DEFAULT_LOCALES_DIR: &str = "./locales";

/// Deployment mode, selecting one of the engine presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Digit-run tokens, 6-digit prefix lookups
    #[default]
    Numeric,
    /// Whole-line tokens, substring lookups
    Lines,
}

impl FromStr for Mode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "numeric" | "digits" => Ok(Mode::Numeric),
            "lines" | "line" => Ok(Mode::Lines),
            other => Err(ConfigError::Invalid {
                name: "IDVAULT_MODE",
                reason: format!("unknown mode '{other}', expected 'numeric' or 'lines'"),
            }),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Numeric => write!(f, "numeric"),
            Mode::Lines => write!(f, "lines"),
        }
    }
}

/// How raw upload text is turned into tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionRule {
    /// Each trimmed, non-empty line is one token
    Lines,
    /// Each maximal run of ASCII digits at least `min_len` long is one token
    DigitRuns { min_len: usize },
}

/// What a search query must look like before it reaches the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationRule {
    ExactDigits(usize),
    MinDigits(usize),
}

/// How a validated query is matched against persisted tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupStrategy {
    /// Equality against the stored prefix key of `length` characters
    Prefix { length: usize },
    /// Contiguous substring containment, trigram-indexed
    Substring,
}

/// Configuration for the ingestion and lookup engine
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub mode: Mode,
    pub extraction: ExtractionRule,
    pub validation: ValidationRule,
    pub lookup: LookupStrategy,
    /// Tokens per insert-or-ignore statement
    pub chunk_size: usize,
    /// Upper bound on a lookup's result set
    pub max_results: usize,
    /// Largest result count still delivered as an inline message
    pub max_inline: usize,
    /// Maximum accepted upload size in bytes
    pub max_file_size: u64,
    /// Table holding the tokens
    pub table: String,
}

impl EngineConfig {
    /// Preset for numeric deployments
    pub fn numeric() -> Self {
        Self {
            mode: Mode::Numeric,
            extraction: ExtractionRule::DigitRuns {
                min_len: DEFAULT_MIN_DIGIT_RUN,
            },
            validation: ValidationRule::ExactDigits(DEFAULT_PREFIX_LENGTH),
            lookup: LookupStrategy::Prefix {
                length: DEFAULT_PREFIX_LENGTH,
            },
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_results: DEFAULT_MAX_RESULTS,
            max_inline: NUMERIC_MAX_INLINE,
            max_file_size: MAX_FILE_SIZE,
            table: "numbers".to_string(),
        }
    }

    /// Preset for line deployments
    pub fn lines() -> Self {
        Self {
            mode: Mode::Lines,
            extraction: ExtractionRule::Lines,
            validation: ValidationRule::MinDigits(DEFAULT_MIN_QUERY_LENGTH),
            lookup: LookupStrategy::Substring,
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_results: DEFAULT_MAX_RESULTS,
            max_inline: LINES_MAX_INLINE,
            max_file_size: MAX_FILE_SIZE,
            table: "lines".to_string(),
        }
    }

    pub fn for_mode(mode: Mode) -> Self {
        match mode {
            Mode::Numeric => Self::numeric(),
            Mode::Lines => Self::lines(),
        }
    }

    /// Apply a set of overrides on top of this preset
    pub fn with_overrides(mut self, overrides: &EngineOverrides) -> Self {
        if let (Some(min_len), ExtractionRule::DigitRuns { .. }) =
            (overrides.min_digit_run, self.extraction)
        {
            self.extraction = ExtractionRule::DigitRuns { min_len };
        }
        if let (Some(length), LookupStrategy::Prefix { .. }) =
            (overrides.prefix_length, self.lookup)
        {
            self.lookup = LookupStrategy::Prefix { length };
            self.validation = ValidationRule::ExactDigits(length);
        }
        if let (Some(min), ValidationRule::MinDigits(_)) =
            (overrides.min_query_length, self.validation)
        {
            self.validation = ValidationRule::MinDigits(min);
        }
        if let Some(chunk_size) = overrides.chunk_size {
            self.chunk_size = chunk_size;
        }
        if let Some(max_results) = overrides.max_results {
            self.max_results = max_results;
        }
        if let Some(max_inline) = overrides.max_inline {
            self.max_inline = max_inline;
        }
        if let Some(max_file_size) = overrides.max_file_size {
            self.max_file_size = max_file_size;
        }
        if let Some(ref table) = overrides.table {
            self.table = table.clone();
        }
        self
    }

    /// Check the configuration for values the engine cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 || self.chunk_size > MAX_CHUNK_SIZE {
            return Err(ConfigError::Invalid {
                name: "chunk_size",
                reason: format!("must be between 1 and {MAX_CHUNK_SIZE}"),
            });
        }
        if self.max_results == 0 {
            return Err(ConfigError::Invalid {
                name: "max_results",
                reason: "must be greater than zero".to_string(),
            });
        }
        if !is_plain_identifier(&self.table) {
            return Err(ConfigError::Invalid {
                name: "table",
                reason: format!("'{}' is not a lowercase SQL identifier", self.table),
            });
        }
        if is_reserved_word(&self.table) {
            return Err(ConfigError::Invalid {
                name: "table",
                reason: format!("'{}' is a reserved SQL keyword", self.table),
            });
        }

        if let LookupStrategy::Prefix { length } = self.lookup {
            if length == 0 {
                return Err(ConfigError::Invalid {
                    name: "prefix_length",
                    reason: "must be greater than zero".to_string(),
                });
            }
            if self.validation != ValidationRule::ExactDigits(length) {
                return Err(ConfigError::Invalid {
                    name: "validation",
                    reason: format!("prefix lookups need queries of exactly {length} digits"),
                });
            }
            if let ExtractionRule::DigitRuns { min_len } = self.extraction {
                if min_len < length {
                    warn!(
                        min_digit_run = min_len,
                        prefix_length = length,
                        "Tokens shorter than the prefix length can never match a prefix lookup"
                    );
                }
            }
        }

        if let ExtractionRule::DigitRuns { min_len: 0 } = self.extraction {
            return Err(ConfigError::Invalid {
                name: "min_digit_run",
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::numeric()
    }
}

/// Partial overrides loaded from the optional JSON config file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineOverrides {
    pub min_digit_run: Option<usize>,
    pub prefix_length: Option<usize>,
    pub min_query_length: Option<usize>,
    pub chunk_size: Option<usize>,
    pub max_results: Option<usize>,
    pub max_inline: Option<usize>,
    pub max_file_size: Option<u64>,
    pub table: Option<String>,
}

impl EngineOverrides {
    /// Read overrides from a JSON file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::File {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        serde_json::from_str(&content).map_err(|e| ConfigError::File {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }
}

/// Recovery configuration for store connections
#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Base delay between retries in milliseconds
    pub base_retry_delay_ms: u64,
    /// Maximum delay between retries in milliseconds
    pub max_retry_delay_ms: u64,
    /// Timeout for acquiring a pooled connection in seconds
    pub acquire_timeout_secs: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_retry_delay_ms: 1000, // 1 second
            max_retry_delay_ms: 10000, // 10 seconds
            acquire_timeout_secs: 30,
        }
    }
}

/// Everything the bot process needs at startup
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub bot_token: String,
    pub database_url: String,
    pub engine: EngineConfig,
    pub recovery: RecoveryConfig,
    pub locales_dir: String,
}

impl BotConfig {
    /// Load the configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load the configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bot_token = get("TELEGRAM_BOT_TOKEN")
            .or_else(|| get("BOT_TOKEN"))
            .ok_or(ConfigError::Missing("TELEGRAM_BOT_TOKEN"))?;
        let database_url = get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let mode = match get("IDVAULT_MODE") {
            Some(raw) => raw.parse::<Mode>()?,
            None => Mode::default(),
        };

        let mut engine = EngineConfig::for_mode(mode);
        if let Some(path) = get("IDVAULT_CONFIG") {
            let overrides = EngineOverrides::from_file(Path::new(&path))?;
            info!(path = %path, "Applying engine overrides from config file");
            engine = engine.with_overrides(&overrides);
        }
        engine.validate()?;

        let locales_dir = get("LOCALES_DIR").unwrap_or_else(|| DEFAULT_LOCALES_DIR.to_string());

        Ok(Self {
            bot_token,
            database_url,
            engine,
            recovery: RecoveryConfig::default(),
            locales_dir,
        })
    }
}

fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c == '_' => {}
        _ => return false,
    }
    name.len() <= 63 && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// Postgres keywords that cannot name a table without quoting
const RESERVED_WORDS: &[&str] = &[
    "all", "analyse", "analyze", "and", "any", "array", "as", "asc", "asymmetric",
    "authorization", "binary", "both", "case", "cast", "check", "collate", "collation",
    "column", "concurrently", "constraint", "create", "cross", "current_catalog",
    "current_date", "current_role", "current_schema", "current_time", "current_timestamp",
    "current_user", "default", "deferrable", "desc", "distinct", "do", "else", "end",
    "except", "false", "fetch", "for", "foreign", "freeze", "from", "full", "grant",
    "group", "having", "ilike", "in", "initially", "inner", "intersect", "into", "is",
    "isnull", "join", "lateral", "leading", "left", "like", "limit", "localtime",
    "localtimestamp", "natural", "not", "notnull", "null", "offset", "on", "only", "or",
    "order", "outer", "overlaps", "placing", "primary", "references", "returning",
    "right", "select", "session_user", "similar", "some", "symmetric", "system_user",
    "table", "tablesample", "then", "to", "trailing", "true", "union", "unique", "user",
    "using", "variadic", "verbose", "when", "where", "window", "with",
];

fn is_reserved_word(name: &str) -> bool {
    RESERVED_WORDS.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_presets_are_valid() {
        assert!(EngineConfig::numeric().validate().is_ok());
        assert!(EngineConfig::lines().validate().is_ok());
    }

    #[test]
    fn test_numeric_preset_values() {
        let config = EngineConfig::numeric();
        assert_eq!(config.extraction, ExtractionRule::DigitRuns { min_len: 6 });
        assert_eq!(config.validation, ValidationRule::ExactDigits(6));
        assert_eq!(config.lookup, LookupStrategy::Prefix { length: 6 });
        assert_eq!(config.max_inline, 80);
        assert_eq!(config.chunk_size, 5000);
        assert_eq!(config.max_file_size, 25 * 1024 * 1024);
    }

    #[test]
    fn test_lines_preset_values() {
        let config = EngineConfig::lines();
        assert_eq!(config.extraction, ExtractionRule::Lines);
        assert_eq!(config.validation, ValidationRule::MinDigits(3));
        assert_eq!(config.lookup, LookupStrategy::Substring);
        assert_eq!(config.max_inline, 60);
        assert_eq!(config.max_results, 50_000);
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("numeric".parse::<Mode>().unwrap(), Mode::Numeric);
        assert_eq!(" Lines ".parse::<Mode>().unwrap(), Mode::Lines);
        assert!("fulltext".parse::<Mode>().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_chunk_size() {
        let mut config = EngineConfig::numeric();
        config.chunk_size = 0;
        assert!(config.validate().is_err());
        config.chunk_size = MAX_CHUNK_SIZE + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unsafe_table_name() {
        let mut config = EngineConfig::lines();
        config.table = "lines; DROP TABLE lines".to_string();
        assert!(config.validate().is_err());
        config.table = "Lines".to_string();
        assert!(config.validate().is_err());
        config.table = "_lines_2".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_reserved_table_name() {
        let mut config = EngineConfig::numeric();
        for word in ["user", "order", "table"] {
            config.table = word.to_string();
            assert!(matches!(
                config.validate(),
                Err(ConfigError::Invalid { name: "table", .. })
            ));
        }
        config.table = "users".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_mismatched_prefix_validation() {
        let mut config = EngineConfig::numeric();
        config.validation = ValidationRule::ExactDigits(5);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_short_tokens_only_warn() {
        let mut config = EngineConfig::numeric();
        config.extraction = ExtractionRule::DigitRuns { min_len: 4 };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides_keep_prefix_and_validation_in_step() {
        let overrides = EngineOverrides {
            prefix_length: Some(4),
            max_inline: Some(10),
            ..Default::default()
        };
        let config = EngineConfig::numeric().with_overrides(&overrides);
        assert_eq!(config.lookup, LookupStrategy::Prefix { length: 4 });
        assert_eq!(config.validation, ValidationRule::ExactDigits(4));
        assert_eq!(config.max_inline, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides_ignore_fields_of_other_mode() {
        let overrides = EngineOverrides {
            prefix_length: Some(4),
            min_digit_run: Some(8),
            ..Default::default()
        };
        let config = EngineConfig::lines().with_overrides(&overrides);
        assert_eq!(config, EngineConfig::lines());
    }

    #[test]
    fn test_overrides_from_file() -> anyhow::Result<()> {
        let mut file = NamedTempFile::new()?;
        write!(file, r#"{{ "chunk_size": 1000, "table": "ids" }}"#)?;

        let overrides = EngineOverrides::from_file(file.path())?;
        assert_eq!(overrides.chunk_size, Some(1000));
        assert_eq!(overrides.table.as_deref(), Some("ids"));
        assert_eq!(overrides.max_results, None);
        Ok(())
    }

    #[test]
    fn test_overrides_reject_unknown_fields() -> anyhow::Result<()> {
        let mut file = NamedTempFile::new()?;
        write!(file, r#"{{ "chunk": 1000 }}"#)?;
        assert!(matches!(
            EngineOverrides::from_file(file.path()),
            Err(ConfigError::File { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_bot_config_requires_token_and_database() {
        let err = BotConfig::from_lookup(lookup_from(&[("DATABASE_URL", "postgres://x")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Missing("TELEGRAM_BOT_TOKEN")));

        let err = BotConfig::from_lookup(lookup_from(&[("TELEGRAM_BOT_TOKEN", "t")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("DATABASE_URL")));

        let err = BotConfig::from_lookup(lookup_from(&[
            ("TELEGRAM_BOT_TOKEN", "t"),
            ("DATABASE_URL", "   "),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Missing("DATABASE_URL")));
    }

    #[test]
    fn test_bot_config_from_lookup() {
        let config = BotConfig::from_lookup(lookup_from(&[
            ("BOT_TOKEN", "123:abc"),
            ("DATABASE_URL", "postgres://localhost/ids"),
            ("IDVAULT_MODE", "lines"),
        ]))
        .unwrap();
        assert_eq!(config.bot_token, "123:abc");
        assert_eq!(config.engine, EngineConfig::lines());
        assert_eq!(config.locales_dir, DEFAULT_LOCALES_DIR);
    }
}
