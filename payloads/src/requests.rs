use jiff::Span;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::AuctionId;

/// `spec.md` §6: createAuction. Exactly one of `items_per_round` /
/// `winners_per_round` is expected to drive normalization; see
/// `engine::auction::normalize_items_per_round`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAuction {
    pub title: String,
    pub description: Option<String>,
    pub total_items: u32,
    pub items_per_round: Option<u32>,
    pub winners_per_round: Option<Vec<u32>>,
    pub round_duration: Span,
    pub min_bid: Decimal,
    /// Defaults to 10s when absent.
    pub anti_sniping_window: Option<Span>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceBid {
    pub auction_id: AuctionId,
    pub user_id: crate::UserId,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deposit {
    pub user_id: crate::UserId,
    pub amount: Decimal,
}
