//! # Response Module
//!
//! Decides how a result set is delivered: inline text for small sets, a
//! named text attachment above the inline threshold. Pure and deterministic,
//! so the same query over the same data yields a byte-identical attachment.

use crate::token::Token;

/// Delivery shape for a lookup result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// No token matched
    Empty,
    /// Newline-joined tokens, small enough for a chat message
    Inline { text: String },
    /// Newline-joined tokens delivered as a file
    Attachment {
        file_name: String,
        content: Vec<u8>,
        count: usize,
    },
}

/// Artifact name for an attachment: `results_<query>_<count>.txt`
pub fn attachment_name(query: &str, count: usize) -> String {
    format!("results_{query}_{count}.txt")
}

fn join_tokens(results: &[Token]) -> String {
    let mut body = String::with_capacity(results.iter().map(|t| t.as_str().len() + 1).sum());
    for (i, token) in results.iter().enumerate() {
        if i > 0 {
            body.push('\n');
        }
        body.push_str(token.as_str());
    }
    body
}

/// Shape `results` for delivery; at most `max_inline` results go inline
///
/// # Examples
///
/// ```rust
/// use idvault::response::{format_results, Reply};
/// use idvault::token::Token;
///
/// let results = vec![Token::from("123456789"), Token::from("123456000")];
/// assert_eq!(
///     format_results("123456", &results, 80),
///     Reply::Inline { text: "123456789\n123456000".to_string() }
/// );
/// ```
pub fn format_results(query: &str, results: &[Token], max_inline: usize) -> Reply {
    if results.is_empty() {
        return Reply::Empty;
    }

    let body = join_tokens(results);
    if results.len() <= max_inline {
        Reply::Inline { text: body }
    } else {
        Reply::Attachment {
            file_name: attachment_name(query, results.len()),
            content: body.into_bytes(),
            count: results.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(count: usize) -> Vec<Token> {
        (0..count).map(|i| Token::new(format!("123456{i:04}"))).collect()
    }

    #[test]
    fn test_empty_results() {
        assert_eq!(format_results("123456", &[], 80), Reply::Empty);
    }

    #[test]
    fn test_threshold_boundary() {
        assert!(matches!(
            format_results("123456", &numbered(80), 80),
            Reply::Inline { .. }
        ));
        match format_results("123456", &numbered(81), 80) {
            Reply::Attachment {
                file_name, count, ..
            } => {
                assert_eq!(file_name, "results_123456_81.txt");
                assert_eq!(count, 81);
            }
            other => panic!("expected attachment, got {other:?}"),
        }
    }

    #[test]
    fn test_attachment_body_is_newline_joined() {
        let results = numbered(3);
        match format_results("123456", &results, 2) {
            Reply::Attachment { content, .. } => {
                assert_eq!(
                    String::from_utf8(content).unwrap(),
                    "1234560000\n1234560001\n1234560002"
                );
            }
            other => panic!("expected attachment, got {other:?}"),
        }
    }

    #[test]
    fn test_attachment_is_deterministic() {
        let results = numbered(100);
        assert_eq!(
            format_results("123456", &results, 60),
            format_results("123456", &results, 60)
        );
    }
}
