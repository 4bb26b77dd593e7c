use engine::{
    Config, build,
    scheduler::Scheduler,
    telemetry::{get_subscriber, init_subscriber},
    time::TimeSource,
};

/// Auction engine background process.
///
/// The engine is a library with no HTTP surface of its own (that's a
/// separate transport layer, out of scope here); this binary exists to
/// run the one thing that isn't driven by an external API call — the
/// `RoundScheduler` — against a real database.
///
/// Required environment variables:
/// - DATABASE_URL: PostgreSQL connection string
/// - SCHEDULER_TICK_INTERVAL_MS: round-closure poll interval (default 5000)
/// - INITIAL_BALANCE: starting balance for newly-seen users (default 1000)
/// - STORE_CALL_TIMEOUT_MS: bound on a mutating call's Store/Ledger work
///   (default 5000)
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let subscriber = get_subscriber("info".into());
    init_subscriber(subscriber);

    let config = Config::from_env();
    let time_source = TimeSource::new();

    let engine = build(&config, time_source).await?;
    let scheduler = Scheduler::new(engine, config.scheduler_tick_interval);
    scheduler.run().await;

    Ok(())
}
