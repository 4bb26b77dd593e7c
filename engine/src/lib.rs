pub mod auction;
pub mod auction_model;
pub mod config;
pub mod error;
pub mod ledger;
pub mod query;
pub mod ranker;
pub mod scheduler;
pub mod store;
pub mod telemetry;
pub mod time;

use sqlx::PgPool;

pub use auction::AuctionEngine;
pub use config::Config;
pub use error::EngineError;
use time::TimeSource;

/// Wires a `PgPool` and `TimeSource` into an `AuctionEngine`, applying
/// migrations. This is the library's single construction entry point; a
/// binary (or a test harness) builds a `Config`, calls this, and then
/// either serves requests against the engine directly or also spawns a
/// `scheduler::Scheduler` over it.
pub async fn build(config: &Config, time_source: TimeSource) -> anyhow::Result<AuctionEngine> {
    let pool = PgPool::connect(&config.database_url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(AuctionEngine::new(
        pool,
        time_source,
        config.initial_balance,
        config.store_call_timeout,
    ))
}
