//! The in-memory Auction aggregate (`spec.md` §3), assembled from normalized
//! rows by `store::auction::load_full_auction`. This is the shape
//! `engine::auction` and `engine::query` operate on; it is distinct from
//! the `*Row` structs in `store`, which mirror the database tables
//! directly.

use jiff::{Span, Timestamp};
use payloads::{AuctionId, AuctionStatus, BidId, RoundId, RoundStatus, UserId};
use rust_decimal::Decimal;

#[derive(Debug, Clone)]
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
    pub rounds: Vec<Round>,
    pub bids: Vec<Bid>,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
}

impl Auction {
    pub fn active_round(&self) -> Option<&Round> {
        self.rounds
            .iter()
            .find(|r| r.status == RoundStatus::Active)
    }

    pub fn into_response(&self) -> payloads::responses::Auction {
        payloads::responses::Auction {
            id: self.id,
            title: self.title.clone(),
            description: self.description.clone(),
            total_items: self.total_items,
            winners_per_round: self.winners_per_round.clone(),
            round_duration: self.round_duration,
            min_bid: self.min_bid,
            anti_sniping_window: self.anti_sniping_window,
            status: self.status,
            current_round: self.current_round,
            created_at: self.created_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Round {
    pub id: RoundId,
    pub round_number: u32,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    pub status: RoundStatus,
    pub winning_slots: u32,
    pub total_bids: u32,
    pub winners: Vec<payloads::responses::Winner>,
}

#[derive(Debug, Clone)]
pub struct Bid {
    pub id: BidId,
    pub round_number: u32,
    pub user_id: UserId,
    pub amount: Decimal,
    pub timestamp: Timestamp,
}
