//! Token record shared by every layer of the engine.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One persisted text unit: a trimmed line or a digit run.
///
/// Equality is byte-exact, which is also the store's uniqueness key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(String);

impl Token {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    /// First `len` characters of the token, mirroring SQL `left(token, len)`.
    /// Tokens shorter than `len` yield the whole token.
    pub fn prefix_key(&self, len: usize) -> &str {
        match self.0.char_indices().nth(len) {
            Some((end, _)) => &self.0[..end],
            None => &self.0,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Token {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Token {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for Token {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
