//! kapflow - KAP disclosure notifier
//!
//! Runs one poll cycle and exits, which suits cron or CI schedulers. With
//! `POLL_INTERVAL_SECS` set it keeps running and polls on that interval.
//!
//! Usage:
//!   cargo run --release --bin kapflow
//!
//! Environment variables (see `KapConfig::from_env` for the full list):
//!   TELEGRAM_TOKEN - bot token (required)
//!   TELEGRAM_CHAT_IDS - comma-separated chat ids
//!   KAP_DB_PATH - SQLite database path (default: kap_records.db)
//!   SELECTION_MODE - latest-only | full-sweep (default: full-sweep)
//!   POLL_INTERVAL_SECS - loop instead of single cycle

use dotenv::dotenv;
use kapflow::{
    config::KapConfig,
    cycle::{CycleOrchestrator, CycleSettings},
    engine::DedupEngine,
    feed::KapFeedClient,
    notifier::{Notifier, TelegramSender},
    scheduler::run_interval,
    store::SqliteRecordStore,
};
use log::{error, info};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    info!("🚀 Starting kapflow v{}", env!("CARGO_PKG_VERSION"));

    let config = KapConfig::from_env()?;
    config.log_summary();

    if config.chat_ids.is_empty() {
        info!("⚠️  No TELEGRAM_CHAT_IDS configured, disclosures will be recorded without delivery");
    }

    let store = Arc::new(SqliteRecordStore::open(&config.db_path)?);
    info!("✅ Record store ready ({} processed)", store.count()?);

    let source = Arc::new(KapFeedClient::new(
        &config.feed_url,
        &config.member_type,
        config.feed_timeout,
    )?);
    let sender = Arc::new(TelegramSender::new(
        &config.telegram_api_base,
        &config.telegram_token,
        config.send_timeout,
    )?);

    let orchestrator = CycleOrchestrator::new(
        source,
        store,
        DedupEngine::new(config.filter.clone()),
        Notifier::new(sender, config.chat_ids.clone()),
        CycleSettings {
            tracked_members: config.tracked_members.clone(),
            timezone: config.timezone,
            link_base: config.link_base.clone(),
            notify_on_fetch_failure: config.notify_on_fetch_failure,
        },
    );

    let result = match config.poll_interval {
        Some(poll_interval) => run_interval(&orchestrator, poll_interval).await,
        None => orchestrator.run_cycle().await.map(|report| report.log()),
    };

    if let Err(e) = result {
        error!("❌ {}", e);
        return Err(e.into());
    }

    info!("✅ kapflow stopped");
    Ok(())
}
