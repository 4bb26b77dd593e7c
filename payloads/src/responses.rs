use jiff::{Span, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{AuctionId, AuctionStatus, BidId, RoundId, RoundStatus, TransactionId, TransactionType, UserId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Auction {
    pub id: AuctionId,
    pub title: String,
    pub description: Option<String>,
    pub total_items: u32,
    pub winners_per_round: Vec<u32>,
    pub round_duration: Span,
    pub min_bid: Decimal,
    pub anti_sniping_window: Span,
    pub status: AuctionStatus,
    pub current_round: Option<u32>,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Round {
    pub id: RoundId,
    pub auction_id: AuctionId,
    pub round_number: u32,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    pub status: RoundStatus,
    pub winning_slots: u32,
    pub total_bids: u32,
}

/// A winner entry recorded against a completed round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Winner {
    pub user_id: UserId,
    pub bid_amount: Decimal,
    pub position: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bid {
    pub id: BidId,
    pub auction_id: AuctionId,
    pub round_number: u32,
    pub user_id: UserId,
    pub amount: Decimal,
    pub timestamp: Timestamp,
}

/// `spec.md` §4.1/§4.7: one entry per user, already reduced to their best
/// bid for the round and ordered `(-amount, +timestamp)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub user_id: UserId,
    pub amount: Decimal,
    pub timestamp: Timestamp,
    pub is_winner: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub user_id: UserId,
    pub auction_id: Option<AuctionId>,
    pub kind: TransactionType,
    pub amount: Decimal,
    pub round_number: Option<u32>,
    pub bid_id: Option<BidId>,
    pub description: String,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: Option<String>,
    pub balance: Decimal,
}
