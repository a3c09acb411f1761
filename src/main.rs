use replybot::config::Config;
use replybot::db::Database;
use replybot::mention::{MentionProcessor, ProcessorSettings};
use replybot::reply::StaticReply;
use replybot::scheduler::Scheduler;
use replybot::services::dedup::ReplyLedger;
use replybot::throttle::FixedDelay;
use replybot::twitter::TwitterClient;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Configuration loaded: {:?}", config);

    let db = Database::new(&config)?;
    db.execute_init()?;
    let ledger = ReplyLedger::new(db);
    info!("Reply ledger holds {} answered conversations", ledger.count().await?);

    let twitter = TwitterClient::new(&config)?;

    let processor = MentionProcessor::new(
        Arc::new(twitter),
        Arc::new(ledger),
        Arc::new(StaticReply::new(config.reply_text.clone())),
        Arc::new(FixedDelay::new(config.reply_delay)),
        ProcessorSettings::from(&config),
    )
    .await?;

    let scheduler = Scheduler::new(processor, config.poll_interval, config.cycle_deadline);

    info!("Starting bot...");
    scheduler
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await;

    info!("Bot stopped");
    Ok(())
}
