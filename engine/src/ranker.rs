//! Pure bid ranking (`spec.md` §4.1, C4).
//!
//! No I/O and no interior mutability here by design, mirroring the
//! iterator-heavy, side-effect-free style of the pack's combinatorial
//! winner-selection code (`other_examples/.../winner_selection-combinatorial.rs`):
//! reduce, sort, enumerate, done.

use payloads::responses::LeaderboardEntry;

use crate::auction_model::Bid;

/// Reduces `bids` to each user's single best bid (highest `amount`, ties
/// broken by earliest `timestamp` — `spec.md` §4.1), then orders the
/// result by `(-amount, +timestamp)` and marks the first `winning_slots`
/// entries as winners.
pub fn rank(bids: &[Bid], winning_slots: u32) -> Vec<LeaderboardEntry> {
    let mut best_by_user: std::collections::HashMap<_, &Bid> =
        std::collections::HashMap::new();

    for bid in bids {
        best_by_user
            .entry(bid.user_id)
            .and_modify(|current| {
                if is_better(bid, current) {
                    *current = bid;
                }
            })
            .or_insert(bid);
    }

    let mut ranked: Vec<&Bid> = best_by_user.into_values().collect();
    ranked.sort_by(|a, b| {
        b.amount
            .cmp(&a.amount)
            .then_with(|| a.timestamp.cmp(&b.timestamp))
    });

    ranked
        .into_iter()
        .enumerate()
        .map(|(i, bid)| LeaderboardEntry {
            user_id: bid.user_id,
            amount: bid.amount,
            timestamp: bid.timestamp,
            is_winner: (i as u32) < winning_slots,
        })
        .collect()
}

/// `candidate` beats `current` when it bids strictly higher, or ties on
/// amount and was placed strictly earlier.
fn is_better(candidate: &Bid, current: &Bid) -> bool {
    candidate.amount > current.amount
        || (candidate.amount == current.amount && candidate.timestamp < current.timestamp)
}
