//! Durable storage of Auction aggregates (`spec.md` C3).
//!
//! The teacher never hides its Postgres access behind a generic trait: it
//! exposes plain async functions over `&PgPool`/`&mut Transaction`, grouped
//! by aggregate (`store::auction`). This module follows the same shape
//! rather than introducing a `dyn Store` abstraction the corpus doesn't use.
//! The spec's four-method Store contract
//! (`saveAuction`/`findById`/`findActive`/`findAll`) is realized as the
//! plain functions in `store::auction` (`create_auction`/`get_auction`/
//! `list_active_auctions`/`list_auctions`), which `AuctionEngine` and
//! `query` call directly; the transaction-scoped `_tx` helpers alongside
//! them are what give `AuctionEngine` its single-writer critical section.

pub mod auction;

use jiff::{Span, Timestamp};
use jiff_sqlx::{Span as SqlxSpan, Timestamp as SqlxTs};
use payloads::{
    AuctionId, AuctionStatus, BidId, RoundId, RoundStatus, TransactionId,
    TransactionType, UserId,
};
use rust_decimal::Decimal;
use sqlx::FromRow;
use sqlx_postgres::types::PgInterval;

/// Intermediate decode target for nullable `timestamptz` columns; mirrors
/// what `jiff_sqlx::Timestamp` does for non-null ones.
#[derive(Debug, Clone, Copy, sqlx::Type)]
#[sqlx(transparent)]
pub struct OptionalTimestamp(pub Option<SqlxTs>);

impl TryFrom<OptionalTimestamp> for Option<Timestamp> {
    type Error = <Timestamp as TryFrom<SqlxTs>>::Error;

    fn try_from(value: OptionalTimestamp) -> Result<Self, Self::Error> {
        value.0.map(Timestamp::try_from).transpose()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("auction not found")]
    AuctionNotFound,
    #[error("round not found")]
    RoundNotFound,
    #[error("bid not found")]
    BidNotFound,
    #[error("user not found")]
    UserNotFound,
    #[error("auction is not in draft status")]
    AuctionNotDraft,
    #[error("auction is not active")]
    AuctionNotActive,
    #[error("round is not active")]
    RoundNotActive,
    #[error("round has not started yet")]
    RoundNotStarted,
    #[error("round has already ended")]
    RoundEnded,
    #[error("round has not ended yet")]
    RoundNotEnded,
    #[error("bid amount is below the auction's minimum bid")]
    BelowMinBid,
    #[error("insufficient balance")]
    InsufficientBalance,
    #[error("winners_per_round must sum to total_items")]
    WinnersPerRoundMismatch,
    #[error("winners_per_round entries must all be positive")]
    WinnersPerRoundNonPositive,
    #[error("could not acquire the auction's write lock; retry")]
    Conflict,
    #[error("span does not fit in a Postgres interval")]
    SpanTooLarge(Box<Span>),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Balances a `jiff::Span` into the (months, days, microseconds) shape a
/// Postgres `interval` column stores. `jiff_sqlx::Span` only covers
/// decoding; encoding goes through this helper, same as the teacher's
/// `store::span_to_interval`.
pub fn span_to_interval(span: &Span) -> Result<PgInterval, StoreError> {
    span_to_interval_opt(span).ok_or_else(|| StoreError::SpanTooLarge(Box::new(*span)))
}

fn span_to_interval_opt(span: &Span) -> Option<PgInterval> {
    let microseconds = (span.get_milliseconds())
        .checked_mul(1_000)?
        .checked_add(span.get_seconds().checked_mul(1_000_000)?)?
        .checked_add(span.get_minutes().checked_mul(60 * 1_000_000)?)?
        .checked_add((span.get_hours() as i64).checked_mul(60 * 60 * 1_000_000)?)?;
    let days = span
        .get_days()
        .checked_add(span.get_weeks().checked_mul(7)?)?;
    let months = span
        .get_months()
        .checked_add((span.get_years() as i32).checked_mul(12)?)?;
    Some(PgInterval {
        microseconds,
        days,
        months,
    })
}

/// Database row shape for the `auctions` table.
#[derive(Debug, Clone, FromRow)]
pub struct AuctionRow {
    pub id: AuctionId,
    pub title: String,
    pub description: Option<String>,
    pub total_items: i32,
    pub winners_per_round: Vec<i32>,
    #[sqlx(try_from = "SqlxSpan")]
    pub round_duration: Span,
    pub min_bid: Decimal,
    #[sqlx(try_from = "SqlxSpan")]
    pub anti_sniping_window: Span,
    pub status: AuctionStatus,
    pub current_round: Option<i32>,
    #[sqlx(try_from = "SqlxTs")]
    pub created_at: Timestamp,
    #[sqlx(try_from = "OptionalTimestamp")]
    pub started_at: Option<Timestamp>,
    #[sqlx(try_from = "OptionalTimestamp")]
    pub completed_at: Option<Timestamp>,
}

impl AuctionRow {
    pub fn into_response(self) -> payloads::responses::Auction {
        payloads::responses::Auction {
            id: self.id,
            title: self.title,
            description: self.description,
            total_items: self.total_items as u32,
            winners_per_round: self
                .winners_per_round
                .into_iter()
                .map(|n| n as u32)
                .collect(),
            round_duration: self.round_duration,
            min_bid: self.min_bid,
            anti_sniping_window: self.anti_sniping_window,
            status: self.status,
            current_round: self.current_round.map(|n| n as u32),
            created_at: self.created_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
        }
    }
}

/// Database row shape for the `auction_rounds` table.
#[derive(Debug, Clone, FromRow)]
pub struct RoundRow {
    pub id: RoundId,
    pub auction_id: AuctionId,
    pub round_number: i32,
    #[sqlx(try_from = "SqlxTs")]
    pub start_time: Timestamp,
    #[sqlx(try_from = "SqlxTs")]
    pub end_time: Timestamp,
    pub status: RoundStatus,
    pub winning_slots: i32,
    pub total_bids: i32,
}

impl RoundRow {
    pub fn into_response(self) -> payloads::responses::Round {
        payloads::responses::Round {
            id: self.id,
            auction_id: self.auction_id,
            round_number: self.round_number as u32,
            start_time: self.start_time,
            end_time: self.end_time,
            status: self.status,
            winning_slots: self.winning_slots as u32,
            total_bids: self.total_bids as u32,
        }
    }
}

/// Database row shape for the `bids` table.
#[derive(Debug, Clone, FromRow)]
pub struct BidRow {
    pub id: BidId,
    pub auction_id: AuctionId,
    pub round_id: RoundId,
    pub round_number: i32,
    pub user_id: UserId,
    pub amount: Decimal,
    #[sqlx(try_from = "SqlxTs")]
    pub placed_at: Timestamp,
}

impl BidRow {
    pub fn into_response(self) -> payloads::responses::Bid {
        payloads::responses::Bid {
            id: self.id,
            auction_id: self.auction_id,
            round_number: self.round_number as u32,
            user_id: self.user_id,
            amount: self.amount,
            timestamp: self.placed_at,
        }
    }
}

/// Database row shape for the `round_winners` table.
#[derive(Debug, Clone, FromRow)]
pub struct RoundWinnerRow {
    pub round_id: RoundId,
    pub position: i32,
    pub user_id: UserId,
    pub bid_amount: Decimal,
}

/// Database row shape for the `users` table.
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: UserId,
    pub username: Option<String>,
    pub balance: Decimal,
    #[sqlx(try_from = "SqlxTs")]
    pub created_at: Timestamp,
    #[sqlx(try_from = "SqlxTs")]
    pub updated_at: Timestamp,
}

impl UserRow {
    pub fn into_response(self) -> payloads::responses::User {
        payloads::responses::User {
            id: self.id,
            username: self.username,
            balance: self.balance,
        }
    }
}

/// Database row shape for the `transactions` table.
#[derive(Debug, Clone, FromRow)]
pub struct TransactionRow {
    pub id: TransactionId,
    pub user_id: UserId,
    pub auction_id: Option<AuctionId>,
    pub kind: TransactionType,
    pub amount: Decimal,
    pub round_number: Option<i32>,
    pub bid_id: Option<BidId>,
    pub description: String,
    #[sqlx(try_from = "SqlxTs")]
    pub created_at: Timestamp,
}

impl TransactionRow {
    pub fn into_response(self) -> payloads::responses::Transaction {
        payloads::responses::Transaction {
            id: self.id,
            user_id: self.user_id,
            auction_id: self.auction_id,
            kind: self.kind,
            amount: self.amount,
            round_number: self.round_number.map(|n| n as u32),
            bid_id: self.bid_id,
            description: self.description,
            created_at: self.created_at,
        }
    }
}
