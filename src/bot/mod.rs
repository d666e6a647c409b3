//! Bot module for handling Telegram interactions
//!
//! - `message_handler`: Routes text commands, search queries and document uploads
//! - `ui_builder`: Composes localized replies

pub mod message_handler;
pub mod ui_builder;

use std::sync::Arc;

use crate::config::EngineConfig;
use crate::db::TokenStore;
use crate::text_processing::TokenExtractor;

// Re-export main handler function for use in main.rs
pub use message_handler::message_handler;

/// Shared state handed to every update
pub struct BotState {
    pub store: Arc<dyn TokenStore>,
    pub engine: EngineConfig,
    pub extractor: TokenExtractor,
    pub http: reqwest::Client,
}

impl BotState {
    pub fn new(store: Arc<dyn TokenStore>, engine: EngineConfig) -> Result<Self, regex::Error> {
        let extractor = TokenExtractor::new(engine.extraction)?;
        Ok(Self {
            store,
            engine,
            extractor,
            http: reqwest::Client::new(),
        })
    }
}
