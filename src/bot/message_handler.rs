//! Message Handler module for processing incoming Telegram messages

use anyhow::{Context, Result};
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::InputFile;
use tracing::{debug, error, info, warn};

use super::ui_builder::{
    file_too_large_message, find_usage, help_message, ingest_partial_message,
    ingest_progress_message, ingest_summary_message, query_error_message, sending_file_message,
    welcome_message,
};
use super::BotState;
use crate::ingest::{check_upload_size, persist_batch, prepare_batch};
use crate::localization::t_lang;
use crate::lookup::{lookup, validate_query};
use crate::response::{attachment_name, format_results, Reply};
use crate::text_processing::decode_upload;

/// Telegram rejects text messages longer than this many UTF-16 code units
pub const TELEGRAM_MESSAGE_LIMIT: usize = 4096;

/// Largest file the Bot API lets a bot download
pub const TELEGRAM_DOWNLOAD_LIMIT: u64 = 20 * 1024 * 1024;

/// Whether `text` fits in a single Telegram message
pub fn fits_in_message(text: &str) -> bool {
    text.encode_utf16().count() <= TELEGRAM_MESSAGE_LIMIT
}

/// Whether a download failed because Telegram refused to serve a file that large
pub fn is_file_too_big(error: &anyhow::Error) -> bool {
    error
        .chain()
        .any(|cause| cause.to_string().to_lowercase().contains("file is too big"))
}

/// What a text message asks the bot to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    Start,
    Help,
    /// `/find` with its first argument, if any
    Find(Option<&'a str>),
    /// Any other `/command`
    Unknown(&'a str),
    /// Plain text, searched as-is
    Query(&'a str),
}

/// Parse a text message. Empty messages yield `None`.
pub fn parse_command(text: &str) -> Option<Command<'_>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let Some(rest) = text.strip_prefix('/') else {
        return Some(Command::Query(text));
    };

    let mut parts = rest.split_whitespace();
    let head = parts.next().unwrap_or_default();
    // Group chats address commands as /find@botname
    let name = head.split('@').next().unwrap_or_default();

    let command = match name {
        "start" => Command::Start,
        "help" => Command::Help,
        "find" | "search" => Command::Find(parts.next()),
        _ => Command::Unknown(head),
    };
    Some(command)
}

fn language_code(msg: &Message) -> Option<&str> {
    msg.from
        .as_ref()
        .and_then(|user| user.language_code.as_deref())
}

/// Download a Telegram file into memory
pub async fn download_file(
    bot: &Bot,
    http: &reqwest::Client,
    file_id: teloxide::types::FileId,
) -> Result<Vec<u8>> {
    let file = bot.get_file(file_id).await?;
    let url = format!(
        "https://api.telegram.org/file/bot{}/{}",
        bot.token(),
        file.path
    );

    let response = http
        .get(&url)
        .send()
        .await
        .context("Failed to request file")?
        .error_for_status()
        .context("File endpoint returned an error")?;
    let bytes = response.bytes().await.context("Failed to read file body")?;

    Ok(bytes.to_vec())
}

/// Validate `raw_query`, run the lookup and deliver the results
pub async fn send_results(
    bot: &Bot,
    chat_id: ChatId,
    raw_query: &str,
    state: &BotState,
    language_code: Option<&str>,
) -> Result<()> {
    let query = match validate_query(raw_query, state.engine.validation) {
        Ok(query) => query,
        Err(e) => {
            debug!(user_id = %chat_id, error = %e, "Rejected search query");
            bot.send_message(chat_id, query_error_message(&e, language_code))
                .await?;
            return Ok(());
        }
    };

    let results = match lookup(
        state.store.as_ref(),
        &query,
        state.engine.lookup,
        state.engine.max_results,
    )
    .await
    {
        Ok(results) => results,
        Err(e) => {
            error!(user_id = %chat_id, query = %query, error = %e, "Lookup failed");
            bot.send_message(chat_id, t_lang("search-failed", language_code))
                .await?;
            return Ok(());
        }
    };

    match format_results(query.as_str(), &results, state.engine.max_inline) {
        Reply::Empty => {
            bot.send_message(chat_id, t_lang("search-no-results", language_code))
                .await?;
        }
        Reply::Inline { text } if fits_in_message(&text) => {
            bot.send_message(chat_id, text).await?;
        }
        Reply::Inline { text } => {
            // Few results but long lines: too big for one chat message
            let count = results.len();
            send_attachment(
                bot,
                chat_id,
                attachment_name(query.as_str(), count),
                text.into_bytes(),
                count,
                language_code,
            )
            .await?;
        }
        Reply::Attachment {
            file_name,
            content,
            count,
        } => {
            send_attachment(bot, chat_id, file_name, content, count, language_code).await?;
        }
    }

    Ok(())
}

async fn send_attachment(
    bot: &Bot,
    chat_id: ChatId,
    file_name: String,
    content: Vec<u8>,
    count: usize,
    language_code: Option<&str>,
) -> Result<()> {
    info!(user_id = %chat_id, file_name = %file_name, count, "Sending results as a file");
    bot.send_message(chat_id, sending_file_message(count, language_code))
        .await?;
    bot.send_document(chat_id, InputFile::memory(content).file_name(file_name))
        .await?;
    Ok(())
}

async fn handle_text_message(bot: &Bot, msg: &Message, state: &BotState) -> Result<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    debug!(user_id = %msg.chat.id, message_length = text.len(), "Received text message from user");

    let language_code = language_code(msg);

    match parse_command(text) {
        None => {}
        Some(Command::Start) => {
            bot.send_message(msg.chat.id, welcome_message(&state.engine, language_code))
                .await?;
        }
        Some(Command::Help) => {
            bot.send_message(msg.chat.id, help_message(&state.engine, language_code))
                .await?;
        }
        Some(Command::Find(None)) => {
            bot.send_message(msg.chat.id, find_usage(&state.engine, language_code))
                .await?;
        }
        Some(Command::Find(Some(query))) | Some(Command::Query(query)) => {
            send_results(bot, msg.chat.id, query, state, language_code).await?;
        }
        Some(Command::Unknown(name)) => {
            debug!(user_id = %msg.chat.id, command = %name, "Unknown command");
            bot.send_message(msg.chat.id, t_lang("unknown-command", language_code))
                .await?;
        }
    }
    Ok(())
}

async fn handle_document_message(bot: &Bot, msg: &Message, state: &BotState) -> Result<()> {
    let Some(doc) = msg.document() else {
        return Ok(());
    };
    let chat_id = msg.chat.id;
    let language_code = language_code(msg);
    let limit = state.engine.max_file_size;

    // Size gate runs on metadata only; oversize files are never downloaded
    if let Err(e) = check_upload_size(u64::from(doc.file.size), limit) {
        warn!(user_id = %chat_id, error = %e, "Rejected oversize upload");
        bot.send_message(chat_id, file_too_large_message(limit, language_code))
            .await?;
        return Ok(());
    }

    let bytes = match download_file(bot, &state.http, doc.file.id.clone()).await {
        Ok(bytes) => bytes,
        Err(e) if is_file_too_big(&e) => {
            warn!(user_id = %chat_id, error = %e, "Telegram refused to serve the upload");
            bot.send_message(
                chat_id,
                file_too_large_message(limit.min(TELEGRAM_DOWNLOAD_LIMIT), language_code),
            )
            .await?;
            return Ok(());
        }
        Err(e) => {
            error!(user_id = %chat_id, error = %e, "Failed to download file for user");
            bot.send_message(chat_id, t_lang("file-download-failed", language_code))
                .await?;
            return Ok(());
        }
    };
    if check_upload_size(bytes.len() as u64, limit).is_err() {
        warn!(user_id = %chat_id, size = bytes.len(), "Downloaded file exceeds the limit");
        bot.send_message(chat_id, file_too_large_message(limit, language_code))
            .await?;
        return Ok(());
    }

    let text = decode_upload(&bytes);
    drop(bytes);

    let batch = prepare_batch(&state.extractor, &text);
    if batch.is_empty() {
        info!(user_id = %chat_id, "Upload contained no tokens");
        bot.send_message(chat_id, t_lang("ingest-nothing-found", language_code))
            .await?;
        return Ok(());
    }

    bot.send_message(chat_id, ingest_progress_message(batch.extracted, language_code))
        .await?;

    match persist_batch(state.store.as_ref(), &batch, state.engine.chunk_size).await {
        Ok(report) => {
            info!(
                user_id = %chat_id,
                extracted = report.extracted,
                inserted = report.inserted,
                already_known = report.already_known(),
                "Upload ingested"
            );
            bot.send_message(chat_id, ingest_summary_message(&report, language_code))
                .await?;
        }
        Err(e) => {
            error!(user_id = %chat_id, error = %e, "Upload ingestion failed");
            bot.send_message(chat_id, ingest_partial_message(e.inserted, language_code))
                .await?;
        }
    }
    Ok(())
}

async fn handle_unsupported_message(bot: &Bot, msg: &Message) -> Result<()> {
    debug!(user_id = %msg.chat.id, "Received unsupported message type from user");
    bot.send_message(msg.chat.id, t_lang("unsupported-message", language_code(msg)))
        .await?;
    Ok(())
}

pub async fn message_handler(bot: Bot, msg: Message, state: Arc<BotState>) -> Result<()> {
    if msg.text().is_some() {
        handle_text_message(&bot, &msg, &state).await?;
    } else if msg.document().is_some() {
        handle_document_message(&bot, &msg, &state).await?;
    } else {
        handle_unsupported_message(&bot, &msg).await?;
    }

    Ok(())
}
