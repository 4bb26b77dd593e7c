//! Transaction-scoped CRUD primitives over the `auctions`/`auction_rounds`/
//! `bids`/`round_winners` tables.
//!
//! Grounded on the teacher's `store::auction::create_bid_tx`: validate the
//! round window against the caller-supplied `now` inside the same
//! transaction that performs the write, and surface `RoundNotStarted`/
//! `RoundEnded` rather than relying on a database constraint. The actual
//! placeBid/closeRound algorithms (ranking, refunds, carry-forward,
//! anti-sniping) live one level up in `engine::auction`; this module only
//! knows how to read and write rows.

use jiff::Timestamp;
use jiff_sqlx::ToSqlx;
use payloads::{AuctionId, AuctionStatus, RoundId, UserId};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{span_to_interval, AuctionRow, BidRow, RoundRow, RoundWinnerRow, StoreError};

/// Fields needed to materialize a new auction in `draft` status.
pub struct NewAuction {
    pub title: String,
    pub description: Option<String>,
    pub total_items: u32,
    pub winners_per_round: Vec<u32>,
    pub round_duration: jiff::Span,
    pub min_bid: rust_decimal::Decimal,
    pub anti_sniping_window: jiff::Span,
}

pub async fn create_auction(
    pool: &PgPool,
    new: NewAuction,
    now: Timestamp,
) -> Result<AuctionId, StoreError> {
    let winners_per_round: Vec<i32> =
        new.winners_per_round.iter().map(|n| *n as i32).collect();
    let id: Uuid = sqlx::query_scalar(
        "insert into auctions
            (title, description, total_items, winners_per_round, round_duration,
             min_bid, anti_sniping_window, status, created_at)
         values ($1, $2, $3, $4, $5, $6, $7, 'draft', $8)
         returning id",
    )
    .bind(new.title)
    .bind(new.description)
    .bind(new.total_items as i32)
    .bind(winners_per_round)
    .bind(span_to_interval(&new.round_duration)?)
    .bind(new.min_bid)
    .bind(span_to_interval(&new.anti_sniping_window)?)
    .bind(now.to_sqlx())
    .fetch_one(pool)
    .await?;
    Ok(AuctionId(id))
}

pub async fn get_auction(pool: &PgPool, id: AuctionId) -> Result<AuctionRow, StoreError> {
    sqlx::query_as("select * from auctions where id = $1")
        .bind(id)
        .fetch_one(pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => StoreError::AuctionNotFound,
            e => StoreError::Database(e),
        })
}

/// Locks the auction row for the duration of `tx`. Call this only while
/// already holding the auction's advisory lock (`AuctionEngine`'s
/// single-writer critical section, `spec.md` §5) — it is not itself
/// sufficient to serialize concurrent writers, since `FOR UPDATE` blocks
/// rather than rejecting a second writer outright.
pub async fn get_auction_for_update_tx(
    tx: &mut Transaction<'_, Postgres>,
    id: AuctionId,
) -> Result<AuctionRow, StoreError> {
    sqlx::query_as("select * from auctions where id = $1 for update")
        .bind(id)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => StoreError::AuctionNotFound,
            e => StoreError::Database(e),
        })
}

pub async fn list_active_auctions(pool: &PgPool) -> Result<Vec<AuctionRow>, StoreError> {
    Ok(
        sqlx::query_as("select * from auctions where status = 'active' order by created_at")
            .fetch_all(pool)
            .await?,
    )
}

pub async fn list_auctions(pool: &PgPool) -> Result<Vec<AuctionRow>, StoreError> {
    Ok(sqlx::query_as("select * from auctions order by created_at")
        .fetch_all(pool)
        .await?)
}

/// Transitions `draft -> active` and opens round 1. Returns the new round.
pub async fn start_auction_tx(
    tx: &mut Transaction<'_, Postgres>,
    auction: &AuctionRow,
    now: Timestamp,
) -> Result<RoundRow, StoreError> {
    if auction.status != AuctionStatus::Draft {
        return Err(StoreError::AuctionNotDraft);
    }

    sqlx::query(
        "update auctions
         set status = 'active', current_round = 1, started_at = $2
         where id = $1",
    )
    .bind(auction.id)
    .bind(now.to_sqlx())
    .execute(&mut **tx)
    .await?;

    let winning_slots = auction
        .winners_per_round
        .first()
        .copied()
        .unwrap_or(auction.total_items);

    create_round_tx(tx, auction.id, 1, now, now + auction.round_duration, winning_slots).await
}

pub async fn create_round_tx(
    tx: &mut Transaction<'_, Postgres>,
    auction_id: AuctionId,
    round_number: u32,
    start_time: Timestamp,
    end_time: Timestamp,
    winning_slots: i32,
) -> Result<RoundRow, StoreError> {
    Ok(sqlx::query_as(
        "insert into auction_rounds
            (auction_id, round_number, start_time, end_time, status, winning_slots)
         values ($1, $2, $3, $4, 'active', $5)
         returning *",
    )
    .bind(auction_id)
    .bind(round_number as i32)
    .bind(start_time.to_sqlx())
    .bind(end_time.to_sqlx())
    .bind(winning_slots)
    .fetch_one(&mut **tx)
    .await?)
}

pub async fn get_round_tx(
    tx: &mut Transaction<'_, Postgres>,
    round_id: RoundId,
) -> Result<RoundRow, StoreError> {
    sqlx::query_as("select * from auction_rounds where id = $1 for update")
        .bind(round_id)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => StoreError::RoundNotFound,
            e => StoreError::Database(e),
        })
}

pub async fn get_active_round_for_auction_tx(
    tx: &mut Transaction<'_, Postgres>,
    auction_id: AuctionId,
) -> Result<RoundRow, StoreError> {
    sqlx::query_as(
        "select * from auction_rounds
         where auction_id = $1 and status = 'active'
         for update",
    )
    .bind(auction_id)
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| match e {
        sqlx::Error::RowNotFound => StoreError::RoundNotActive,
        e => StoreError::Database(e),
    })
}

/// Rounds whose deadline has passed, across all active auctions. The
/// RoundScheduler (`spec.md` §4.6) polls this on its tick cadence.
pub async fn list_rounds_past_deadline(
    pool: &PgPool,
    now: Timestamp,
) -> Result<Vec<RoundRow>, StoreError> {
    Ok(sqlx::query_as(
        "select * from auction_rounds
         where status = 'active' and end_time <= $1
         order by end_time",
    )
    .bind(now.to_sqlx())
    .fetch_all(pool)
    .await?)
}

/// Extends a round's `end_time` in place (anti-sniping extension,
/// `spec.md` §4.2 step 4).
pub async fn extend_round_end_time_tx(
    tx: &mut Transaction<'_, Postgres>,
    round_id: RoundId,
    new_end_time: Timestamp,
) -> Result<(), StoreError> {
    sqlx::query("update auction_rounds set end_time = $2 where id = $1")
        .bind(round_id)
        .bind(new_end_time.to_sqlx())
        .execute(&mut **tx)
        .await?;
    Ok(())
}

pub async fn insert_bid_tx(
    tx: &mut Transaction<'_, Postgres>,
    auction_id: AuctionId,
    round_id: RoundId,
    round_number: u32,
    user_id: UserId,
    amount: rust_decimal::Decimal,
    placed_at: Timestamp,
) -> Result<BidRow, StoreError> {
    sqlx::query_as(
        "insert into bids (auction_id, round_id, round_number, user_id, amount, placed_at)
         values ($1, $2, $3, $4, $5, $6)
         returning *",
    )
    .bind(auction_id)
    .bind(round_id)
    .bind(round_number as i32)
    .bind(user_id)
    .bind(amount)
    .bind(placed_at.to_sqlx())
    .fetch_one(&mut **tx)
    .await
    .map_err(StoreError::Database)
}

/// Re-inserts a losing bid against the next round, preserving its original
/// `placed_at` so later ranking still breaks ties on the original
/// placement time (`spec.md` §3 invariant, §9 "Carry-forward semantics").
pub async fn carry_forward_bid_tx(
    tx: &mut Transaction<'_, Postgres>,
    bid: &BidRow,
    next_round_id: RoundId,
    next_round_number: u32,
) -> Result<BidRow, StoreError> {
    insert_bid_tx(
        tx,
        bid.auction_id,
        next_round_id,
        next_round_number,
        bid.user_id,
        bid.amount,
        bid.placed_at,
    )
    .await
}

pub async fn list_bids_for_round_tx(
    tx: &mut Transaction<'_, Postgres>,
    round_id: RoundId,
) -> Result<Vec<BidRow>, StoreError> {
    Ok(
        sqlx::query_as("select * from bids where round_id = $1 order by placed_at")
            .bind(round_id)
            .fetch_all(&mut **tx)
            .await?,
    )
}

pub async fn list_bids_for_user(
    pool: &PgPool,
    auction_id: AuctionId,
    user_id: UserId,
) -> Result<Vec<BidRow>, StoreError> {
    Ok(sqlx::query_as(
        "select * from bids where auction_id = $1 and user_id = $2 order by round_number",
    )
    .bind(auction_id)
    .bind(user_id)
    .fetch_all(pool)
    .await?)
}

/// Updates a round's running bid counter without touching its status —
/// used after a bid lands (round stays active) and after carry-forward
/// bids are materialized into a freshly-opened round.
pub async fn set_round_total_bids_tx(
    tx: &mut Transaction<'_, Postgres>,
    round_id: RoundId,
    total_bids: u32,
) -> Result<(), StoreError> {
    sqlx::query("update auction_rounds set total_bids = $2 where id = $1")
        .bind(round_id)
        .bind(total_bids as i32)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

pub async fn insert_round_winners_tx(
    tx: &mut Transaction<'_, Postgres>,
    round_id: RoundId,
    winners: &[(UserId, rust_decimal::Decimal)],
) -> Result<(), StoreError> {
    for (position, (user_id, amount)) in winners.iter().enumerate() {
        // `spec.md` §4.3 step 2: positions are 1..K, not 0-based.
        sqlx::query(
            "insert into round_winners (round_id, position, user_id, bid_amount)
             values ($1, $2, $3, $4)",
        )
        .bind(round_id)
        .bind(position as i32 + 1)
        .bind(user_id)
        .bind(amount)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

pub async fn list_round_winners(
    pool: &PgPool,
    round_id: RoundId,
) -> Result<Vec<RoundWinnerRow>, StoreError> {
    Ok(
        sqlx::query_as("select * from round_winners where round_id = $1 order by position")
            .bind(round_id)
            .fetch_all(pool)
            .await?,
    )
}

pub async fn complete_round_tx(
    tx: &mut Transaction<'_, Postgres>,
    round_id: RoundId,
    total_bids: u32,
) -> Result<(), StoreError> {
    sqlx::query(
        "update auction_rounds set status = 'completed', total_bids = $2 where id = $1",
    )
    .bind(round_id)
    .bind(total_bids as i32)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub async fn advance_auction_current_round_tx(
    tx: &mut Transaction<'_, Postgres>,
    auction_id: AuctionId,
    next_round_number: u32,
) -> Result<(), StoreError> {
    sqlx::query("update auctions set current_round = $2 where id = $1")
        .bind(auction_id)
        .bind(next_round_number as i32)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

pub async fn complete_auction_tx(
    tx: &mut Transaction<'_, Postgres>,
    auction_id: AuctionId,
    now: Timestamp,
) -> Result<(), StoreError> {
    sqlx::query(
        "update auctions set status = 'completed', completed_at = $2 where id = $1",
    )
    .bind(auction_id)
    .bind(now.to_sqlx())
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Assembles the full in-memory aggregate (auction + rounds + bids) for the
/// Query API (`spec.md` §4.7) and for `Store::find_by_id`/`find_active`.
pub async fn load_full_auction(
    pool: &PgPool,
    id: AuctionId,
) -> Result<crate::auction_model::Auction, StoreError> {
    let row = get_auction(pool, id).await?;
    let round_rows: Vec<RoundRow> =
        sqlx::query_as("select * from auction_rounds where auction_id = $1 order by round_number")
            .bind(id)
            .fetch_all(pool)
            .await?;
    let bid_rows: Vec<BidRow> =
        sqlx::query_as("select * from bids where auction_id = $1 order by placed_at")
            .bind(id)
            .fetch_all(pool)
            .await?;

    let mut rounds = Vec::with_capacity(round_rows.len());
    for r in round_rows {
        let winners = list_round_winners(pool, r.id)
            .await?
            .into_iter()
            .map(|w| payloads::responses::Winner {
                user_id: w.user_id,
                bid_amount: w.bid_amount,
                position: w.position as u32,
            })
            .collect();
        rounds.push(crate::auction_model::Round {
            id: r.id,
            round_number: r.round_number as u32,
            start_time: r.start_time,
            end_time: r.end_time,
            status: r.status,
            winning_slots: r.winning_slots as u32,
            total_bids: r.total_bids as u32,
            winners,
        });
    }

    let bids = bid_rows
        .into_iter()
        .map(|b| crate::auction_model::Bid {
            id: b.id,
            round_number: b.round_number as u32,
            user_id: b.user_id,
            amount: b.amount,
            timestamp: b.placed_at,
        })
        .collect();

    Ok(crate::auction_model::Auction {
        id: row.id,
        title: row.title,
        description: row.description,
        total_items: row.total_items as u32,
        winners_per_round: row.winners_per_round.into_iter().map(|n| n as u32).collect(),
        round_duration: row.round_duration,
        min_bid: row.min_bid,
        anti_sniping_window: row.anti_sniping_window,
        status: row.status,
        current_round: row.current_round.map(|n| n as u32),
        rounds,
        bids,
        created_at: row.created_at,
        started_at: row.started_at,
        completed_at: row.completed_at,
    })
}

