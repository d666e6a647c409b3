//! # idvault
//!
//! A Telegram bot that stores identifiers extracted from uploaded text files
//! and answers prefix or substring lookups over everything stored so far.

pub mod bot;
pub mod config;
pub mod db;
pub mod errors;
pub mod ingest;
pub mod localization;
pub mod lookup;
pub mod response;
pub mod text_processing;
pub mod token;
