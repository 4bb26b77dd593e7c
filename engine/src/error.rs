//! Public error taxonomy (`spec.md` §7), surfaced by every `AuctionEngine`
//! and `Query` operation. Mirrors the teacher's two-layer error handling —
//! an internal `StoreError` mapped onto a public enum via `From` — but
//! replaces `impl ResponseError` (there is no HTTP framework in scope here)
//! with a plain `status_hint` a transport adapter can consult.

use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("not found")]
    NotFound,
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("illegal state: {0}")]
    IllegalState(String),
    #[error("round has ended")]
    RoundEnded,
    #[error("insufficient balance")]
    InsufficientBalance,
    #[error("conflict, retry")]
    Conflict,
    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// `spec.md` §7: "400 for validation/illegal-state/insufficient-balance
    /// /round-ended, 404 for not-found, 500 otherwise".
    pub fn status_hint(&self) -> u16 {
        match self {
            EngineError::NotFound => 404,
            EngineError::BadRequest(_)
            | EngineError::IllegalState(_)
            | EngineError::RoundEnded
            | EngineError::InsufficientBalance => 400,
            EngineError::Conflict | EngineError::Internal(_) => 500,
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::AuctionNotFound
            | StoreError::RoundNotFound
            | StoreError::BidNotFound
            | StoreError::UserNotFound => EngineError::NotFound,
            StoreError::AuctionNotDraft
            | StoreError::AuctionNotActive
            | StoreError::RoundNotActive
            | StoreError::RoundNotEnded
            | StoreError::RoundNotStarted => EngineError::IllegalState(e.to_string()),
            StoreError::RoundEnded => EngineError::RoundEnded,
            StoreError::BelowMinBid
            | StoreError::WinnersPerRoundMismatch
            | StoreError::WinnersPerRoundNonPositive => EngineError::BadRequest(e.to_string()),
            StoreError::InsufficientBalance => EngineError::InsufficientBalance,
            StoreError::Conflict => EngineError::Conflict,
            StoreError::Database(e) => EngineError::Internal(e.to_string()),
        }
    }
}
