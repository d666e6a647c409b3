//! UI Builder module for composing localized replies

use crate::config::{EngineConfig, ExtractionRule, Mode, ValidationRule};
use crate::errors::QueryError;
use crate::ingest::IngestReport;
use crate::localization::{t_args_lang, t_lang};

const EXAMPLE_DIGITS: &str = "9721034568";

/// Size in whole megabytes, for user-facing limits
pub fn megabytes(bytes: u64) -> String {
    (bytes / (1024 * 1024)).to_string()
}

/// A query that satisfies the configured validation rule
pub fn example_query(engine: &EngineConfig) -> String {
    let len = match engine.validation {
        ValidationRule::ExactDigits(n) => n,
        ValidationRule::MinDigits(n) => n.max(4),
    };
    EXAMPLE_DIGITS.chars().cycle().take(len).collect()
}

/// Welcome text for `/start`
pub fn welcome_message(engine: &EngineConfig, language_code: Option<&str>) -> String {
    let body = match (engine.mode, engine.extraction, engine.validation) {
        (Mode::Numeric, ExtractionRule::DigitRuns { min_len }, ValidationRule::ExactDigits(prefix)) => {
            t_args_lang(
                "welcome-numeric",
                &[
                    ("min_length", &min_len.to_string()),
                    ("prefix_length", &prefix.to_string()),
                ],
                language_code,
            )
        }
        (_, _, ValidationRule::MinDigits(min) | ValidationRule::ExactDigits(min)) => t_args_lang(
            "welcome-lines",
            &[("min_length", &min.to_string())],
            language_code,
        ),
    };

    format!("{}\n\n{}", t_lang("welcome-title", language_code), body)
}

/// Help text for `/help`
pub fn help_message(engine: &EngineConfig, language_code: Option<&str>) -> String {
    [
        t_lang("help-title", language_code),
        welcome_message(engine, language_code),
        t_lang("help-duplicates", language_code),
        t_args_lang(
            "help-limit",
            &[("limit_mb", &megabytes(engine.max_file_size))],
            language_code,
        ),
    ]
    .join("\n\n")
}

/// Usage hint for `/find` without an argument
pub fn find_usage(engine: &EngineConfig, language_code: Option<&str>) -> String {
    t_args_lang("find-usage", &[("example", &example_query(engine))], language_code)
}

/// User-facing text for a rejected query
pub fn query_error_message(err: &QueryError, language_code: Option<&str>) -> String {
    match err {
        QueryError::Empty => t_lang("query-empty", language_code),
        QueryError::NotDigits => t_lang("query-not-digits", language_code),
        QueryError::WrongLength { expected } => t_args_lang(
            "query-wrong-length",
            &[("expected", &expected.to_string())],
            language_code,
        ),
        QueryError::TooShort { min } => t_args_lang(
            "query-too-short",
            &[("min", &min.to_string())],
            language_code,
        ),
    }
}

/// Rejection for uploads above the size ceiling
pub fn file_too_large_message(limit: u64, language_code: Option<&str>) -> String {
    t_args_lang("file-too-large", &[("limit_mb", &megabytes(limit))], language_code)
}

/// Progress line sent before persisting
pub fn ingest_progress_message(extracted: usize, language_code: Option<&str>) -> String {
    t_args_lang("ingest-progress", &[("count", &extracted.to_string())], language_code)
}

/// Final summary of a successful upload
pub fn ingest_summary_message(report: &IngestReport, language_code: Option<&str>) -> String {
    t_args_lang(
        "ingest-complete",
        &[
            ("inserted", &report.inserted.to_string()),
            ("unique", &report.unique.to_string()),
        ],
        language_code,
    )
}

/// Summary of an upload that stopped at a failed chunk
pub fn ingest_partial_message(inserted: u64, language_code: Option<&str>) -> String {
    t_args_lang("ingest-partial", &[("inserted", &inserted.to_string())], language_code)
}

/// Status line sent ahead of an attachment
pub fn sending_file_message(count: usize, language_code: Option<&str>) -> String {
    t_args_lang("search-sending-file", &[("count", &count.to_string())], language_code)
}
