use anyhow::{Context, Result};
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::info;
use tracing_subscriber::EnvFilter;

use idvault::bot::{self, BotState};
use idvault::config::BotConfig;
use idvault::db::{postgres, PgTokenStore, TokenStore};
use idvault::localization;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Initialize logging
    init_tracing();

    info!("Starting idvault Telegram bot");

    // Missing or invalid settings stop the process here
    let config = BotConfig::from_env().context("Invalid configuration")?;
    info!(
        mode = %config.engine.mode,
        table = %config.engine.table,
        chunk_size = config.engine.chunk_size,
        max_results = config.engine.max_results,
        "Configuration loaded"
    );

    localization::init_localization(&config.locales_dir)
        .context("Failed to load localization resources")?;

    let pool = postgres::connect(&config.database_url, &config.recovery)
        .await
        .context("Failed to connect to database")?;

    let store = PgTokenStore::new(pool, config.engine.table.clone(), config.engine.lookup);
    store
        .init_schema()
        .await
        .context("Failed to initialize database schema")?;

    let store: Arc<dyn TokenStore> = Arc::new(store);
    let state = Arc::new(
        BotState::new(store, config.engine.clone()).context("Failed to build token extractor")?,
    );

    let bot = Bot::new(config.bot_token);

    info!("Bot initialized, starting dispatcher");

    let handler = dptree::entry().branch(Update::filter_message().endpoint({
        let state = Arc::clone(&state);
        move |bot: Bot, msg: Message| {
            let state = Arc::clone(&state);
            async move { bot::message_handler(bot, msg, state).await }
        }
    }));

    Dispatcher::builder(bot, handler)
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
