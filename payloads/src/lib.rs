//! Wire-shaped types shared between the auction engine and its callers.
//!
//! This crate is deliberately transport-agnostic (`spec.md` puts the HTTP
//! surface out of scope): it holds id newtypes, the small set of enums that
//! make illegal states unrepresentable, and request/response DTOs, none of
//! which assume any particular binding. The `use-sqlx` feature gates
//! `sqlx::Type`/`sqlx::FromRow` derives so a pure client build never has to
//! pull in sqlx.

pub mod requests;
pub mod responses;

use derive_more::Display;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Id type wrappers help ensure we don't mix up ids for different tables.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize,
)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type), sqlx(transparent))]
pub struct AuctionId(pub Uuid);

#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize,
)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type), sqlx(transparent))]
pub struct RoundId(pub Uuid);

#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize,
)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type), sqlx(transparent))]
pub struct BidId(pub Uuid);

#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize,
)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type), sqlx(transparent))]
pub struct UserId(pub Uuid);

#[derive(
    Debug, Copy, Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize,
)]
#[cfg_attr(feature = "use-sqlx", derive(sqlx::Type), sqlx(transparent))]
pub struct TransactionId(pub Uuid);

/// `spec.md` §9: a tagged variant in place of a stringly-typed status field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(
    feature = "use-sqlx",
    derive(sqlx::Type),
    sqlx(type_name = "auction_status", rename_all = "snake_case")
)]
pub enum AuctionStatus {
    Draft,
    Active,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(
    feature = "use-sqlx",
    derive(sqlx::Type),
    sqlx(type_name = "round_status", rename_all = "snake_case")
)]
pub enum RoundStatus {
    Pending,
    Active,
    Completed,
}

/// `spec.md` §3: Transaction.type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(
    feature = "use-sqlx",
    derive(sqlx::Type),
    sqlx(type_name = "transaction_type", rename_all = "snake_case")
)]
pub enum TransactionType {
    Bid,
    Refund,
    Win,
    Deposit,
}
