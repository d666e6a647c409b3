//! # Text Processing Module
//!
//! Turns uploaded text into candidate tokens and removes repeats within a
//! batch before anything touches the store.
//!
//! ## Features
//!
//! - Lenient UTF-8 decoding of uploads (invalid byte sequences are dropped)
//! - Line extraction with universal line breaks, trimmed, empties skipped
//! - Digit-run extraction: maximal runs of ASCII digits above a minimum length,
//!   found anywhere in the surrounding text
//! - First-occurrence-preserving deduplication

use std::collections::HashSet;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, trace};

use crate::config::{ExtractionRule, DEFAULT_MIN_DIGIT_RUN};
use crate::token::Token;

// Lazy static regex for the default digit-run length to avoid recompilation
lazy_static! {
    static ref DEFAULT_DIGIT_RUN_REGEX: Regex = digit_run_regex(DEFAULT_MIN_DIGIT_RUN)
        .expect("Default digit-run pattern should be valid");
}

fn digit_run_regex(min_len: usize) -> Result<Regex, regex::Error> {
    Regex::new(&format!("[0-9]{{{min_len},}}"))
}

/// Extracts tokens from raw text according to an [`ExtractionRule`]
#[derive(Debug, Clone)]
pub struct TokenExtractor {
    rule: ExtractionRule,
    /// Compiled digit-run pattern, only for [`ExtractionRule::DigitRuns`]
    pattern: Option<Regex>,
}

impl TokenExtractor {
    /// Create an extractor for the given rule
    ///
    /// # Examples
    ///
    /// ```rust
    /// use idvault::config::ExtractionRule;
    /// use idvault::text_processing::TokenExtractor;
    ///
    /// let extractor = TokenExtractor::new(ExtractionRule::DigitRuns { min_len: 6 })?;
    /// let tokens = extractor.extract("id 1234567, ref 42");
    /// assert_eq!(tokens.len(), 1);
    /// assert_eq!(tokens[0].as_str(), "1234567");
    /// # Ok::<(), regex::Error>(())
    /// ```
    pub fn new(rule: ExtractionRule) -> Result<Self, regex::Error> {
        let pattern = match rule {
            ExtractionRule::Lines => None,
            ExtractionRule::DigitRuns { min_len } if min_len == DEFAULT_MIN_DIGIT_RUN => {
                Some(DEFAULT_DIGIT_RUN_REGEX.clone())
            }
            ExtractionRule::DigitRuns { min_len } => {
                debug!(min_len, "Compiling custom digit-run pattern");
                Some(digit_run_regex(min_len)?)
            }
        };
        Ok(Self { rule, pattern })
    }

    pub fn rule(&self) -> ExtractionRule {
        self.rule
    }

    /// Extract every candidate token from `text`, in order of appearance
    pub fn extract(&self, text: &str) -> Vec<Token> {
        let tokens: Vec<Token> = match &self.pattern {
            None => text
                .split(is_line_break)
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(Token::from)
                .collect(),
            Some(pattern) => pattern
                .find_iter(text)
                .map(|m| Token::from(m.as_str()))
                .collect(),
        };

        debug!(
            text_length = text.len(),
            tokens_found = tokens.len(),
            "Token extraction completed"
        );
        tokens
    }
}

/// Line boundaries recognised when splitting uploads into lines.
/// `\r\n` produces an empty piece between the two characters, which the
/// empty-line filter removes.
fn is_line_break(c: char) -> bool {
    matches!(
        c,
        '\n' | '\r'
            | '\u{0b}'
            | '\u{0c}'
            | '\u{1c}'
            | '\u{1d}'
            | '\u{1e}'
            | '\u{85}'
            | '\u{2028}'
            | '\u{2029}'
    )
}

/// Extract tokens with a one-off extractor for `rule`
pub fn extract(text: &str, rule: ExtractionRule) -> Result<Vec<Token>, regex::Error> {
    Ok(TokenExtractor::new(rule)?.extract(text))
}

/// Remove repeated tokens, keeping the first occurrence of each
pub fn dedupe(tokens: Vec<Token>) -> Vec<Token> {
    let before = tokens.len();
    let mut seen = HashSet::with_capacity(before);
    let unique: Vec<Token> = tokens
        .into_iter()
        .filter(|token| seen.insert(token.clone()))
        .collect();

    trace!(before, after = unique.len(), "Batch deduplicated");
    unique
}

/// Decode uploaded bytes as UTF-8, dropping invalid sequences
pub fn decode_upload(bytes: &[u8]) -> String {
    let mut text = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        text.push_str(chunk.valid());
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(tokens: &[Token]) -> Vec<&str> {
        tokens.iter().map(Token::as_str).collect()
    }

    #[test]
    fn test_lines_trimmed_and_empty_skipped() {
        let extractor = TokenExtractor::new(ExtractionRule::Lines).unwrap();
        let tokens = extractor.extract("  alpha \n\n\tbeta\r\n   \ngamma");
        assert_eq!(strings(&tokens), vec!["alpha", "beta", "gamma"]);
    }

    #[test]
    fn test_lines_universal_breaks() {
        let extractor = TokenExtractor::new(ExtractionRule::Lines).unwrap();
        let tokens = extractor.extract("a\rb\u{2028}c\u{0c}d\u{85}e");
        assert_eq!(strings(&tokens), vec!["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn test_digit_runs_embedded_in_text() {
        let extractor = TokenExtractor::new(ExtractionRule::DigitRuns { min_len: 6 }).unwrap();
        let tokens = extractor.extract("card:4111111111111111;exp 1225 ref=987654xyz 12345");
        assert_eq!(strings(&tokens), vec!["4111111111111111", "987654"]);
    }

    #[test]
    fn test_digit_runs_are_maximal() {
        let extractor = TokenExtractor::new(ExtractionRule::DigitRuns { min_len: 3 }).unwrap();
        let tokens = extractor.extract("12345678");
        assert_eq!(strings(&tokens), vec!["12345678"]);
    }

    #[test]
    fn test_digit_runs_ignore_non_ascii_digits() {
        let extractor = TokenExtractor::new(ExtractionRule::DigitRuns { min_len: 6 }).unwrap();
        assert!(extractor.extract("١٢٣٤٥٦٧").is_empty());
    }

    #[test]
    fn test_extract_empty_input() {
        assert!(extract("", ExtractionRule::Lines).unwrap().is_empty());
        assert!(extract("", ExtractionRule::DigitRuns { min_len: 6 })
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_dedupe_preserves_first_occurrence_order() {
        let tokens = vec![
            Token::from("b"),
            Token::from("a"),
            Token::from("b"),
            Token::from("c"),
            Token::from("a"),
        ];
        assert_eq!(strings(&dedupe(tokens)), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_dedupe_is_case_sensitive() {
        let tokens = vec![Token::from("Abc"), Token::from("abc"), Token::from("Abc")];
        assert_eq!(strings(&dedupe(tokens)), vec!["Abc", "abc"]);
    }

    #[test]
    fn test_decode_upload_drops_invalid_bytes() {
        let bytes = b"123\xff456\n\xc3\xa9t\xc3\xa9";
        assert_eq!(decode_upload(bytes), "123456\nété");
    }
}
