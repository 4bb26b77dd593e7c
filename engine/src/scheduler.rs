//! `RoundScheduler` (`spec.md` §4.6, C6): a single background task woken at
//! a fixed cadence that finds rounds whose deadline has elapsed and asks
//! the `AuctionEngine` to close them.
//!
//! The run loop and per-tick logging shape are carried from the teacher's
//! `Scheduler`/`schedule_tick`. Unlike the teacher's bulk
//! `lock_next_auction_needing_update` (which grabs *any* unlocked
//! candidate via `pg_try_advisory_xact_lock` so one slow auction can't
//! stall the whole tick), this scheduler only ever has one kind of
//! candidate — rounds past their deadline — and `AuctionEngine::close_round`
//! already blocks on that auction's lock internally, so the tick simply
//! lists candidates and closes them one at a time, logging and continuing
//! past individual failures (spec.md §4.6: "Failures are logged and
//! retried on the next tick").

use std::time::Duration;

use tokio::time;

use crate::auction::AuctionEngine;
use crate::store;
use crate::telemetry::log_error;
use crate::time::TimeSource;

pub struct Scheduler {
    engine: AuctionEngine,
    tick_interval: Duration,
}

impl Scheduler {
    pub fn new(engine: AuctionEngine, tick_interval: Duration) -> Self {
        Scheduler {
            engine,
            tick_interval,
        }
    }

    pub async fn run(&self) {
        let mut interval = time::interval(self.tick_interval);
        loop {
            interval.tick().await;
            schedule_tick(&self.engine).await;
        }
    }
}

fn time_source(engine: &AuctionEngine) -> &TimeSource {
    engine.time_source()
}

/// Closes every round whose deadline has passed as of this tick. A single
/// failing round is logged and does not prevent the rest of the tick's
/// candidates from being processed.
#[tracing::instrument(skip(engine))]
pub async fn schedule_tick(engine: &AuctionEngine) {
    let now = time_source(engine).now();
    let candidates = match store::auction::list_rounds_past_deadline(engine.pool(), now).await {
        Ok(rounds) => rounds,
        Err(e) => {
            log_error(e);
            return;
        }
    };

    for round in candidates {
        if let Err(e) = engine.close_round(round.auction_id).await {
            log_error(anyhow::anyhow!(
                "closing round {} of auction {}: {e}",
                round.round_number,
                round.auction_id
            ));
        }
    }
}
