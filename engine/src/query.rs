//! Read-side projections (`spec.md` §4.7, C7). Grounded on the teacher's
//! read-side functions (`list_auction_rounds`, `list_bids`): plain
//! `&PgPool` reads outside any lock, since readers "must not observe the
//! aggregate between the mutation and persist steps" but are otherwise
//! free to run concurrently with writers — Postgres's MVCC snapshot
//! already gives each read a consistent view.

use jiff::Timestamp;
use payloads::{AuctionId, UserId};
use sqlx::PgPool;

use crate::auction_model::Auction;
use crate::error::EngineError;
use crate::ranker;
use crate::store::{self, StoreError};

/// Auctions whose status=active and whose current round's status=active.
/// Opportunistically marks auctions that are obviously finished (every
/// item awarded) as completed — a self-healing projection (spec.md
/// §4.7) — without requiring that correction to happen synchronously in
/// `closeRound` itself. `now` is the caller's `TimeSource::now()`, same as
/// every other write path, so the correction stays mockable in tests.
pub async fn active_auctions(pool: &PgPool, now: Timestamp) -> Result<Vec<Auction>, EngineError> {
    let rows = store::auction::list_active_auctions(pool).await?;
    let mut result = Vec::with_capacity(rows.len());
    for row in rows {
        let auction = store::auction::load_full_auction(pool, row.id).await?;
        if auction.active_round().is_some() {
            result.push(auction);
        } else {
            let mut tx = pool.begin().await.map_err(StoreError::Database)?;
            store::auction::complete_auction_tx(&mut tx, row.id, now).await?;
            tx.commit().await.map_err(StoreError::Database)?;
        }
    }
    Ok(result)
}

pub async fn get_auction(pool: &PgPool, id: AuctionId) -> Result<Auction, EngineError> {
    Ok(store::auction::load_full_auction(pool, id).await?)
}

pub async fn list_auctions(pool: &PgPool, limit: usize) -> Result<Vec<Auction>, EngineError> {
    let rows = store::auction::list_auctions(pool).await?;
    let mut result = Vec::with_capacity(rows.len().min(limit));
    for row in rows.into_iter().take(limit) {
        result.push(store::auction::load_full_auction(pool, row.id).await?);
    }
    Ok(result)
}

/// Applies the Ranker to one round's bids, marking the first
/// `winningSlots` entries as winners.
pub async fn leaderboard(
    pool: &PgPool,
    auction_id: AuctionId,
    round_number: u32,
) -> Result<Vec<payloads::responses::LeaderboardEntry>, EngineError> {
    let auction = store::auction::load_full_auction(pool, auction_id).await?;
    let round = auction
        .rounds
        .iter()
        .find(|r| r.round_number == round_number)
        .ok_or(EngineError::NotFound)?;
    let round_bids: Vec<_> = auction
        .bids
        .iter()
        .filter(|b| b.round_number == round_number)
        .cloned()
        .collect();
    Ok(ranker::rank(&round_bids, round.winning_slots))
}

/// Every bid a user has placed in an auction, including carried-forward
/// duplicates with their original timestamps (spec.md §4.7).
pub async fn user_bids(
    pool: &PgPool,
    auction_id: AuctionId,
    user_id: UserId,
) -> Result<Vec<payloads::responses::Bid>, EngineError> {
    let rows = store::auction::list_bids_for_user(pool, auction_id, user_id).await?;
    Ok(rows.into_iter().map(|b| b.into_response()).collect())
}

