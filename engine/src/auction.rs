//! `AuctionEngine` (`spec.md` §4.2–§4.4, C5): the per-auction state machine.
//!
//! Concurrency is grounded on the teacher's advisory-lock critical section
//! (`scheduler::lock_next_auction_needing_update`) but adapted to the
//! calling shape here: an API caller already knows which auction it wants
//! to mutate, so every mutating method opens one transaction, blocks on
//! `pg_advisory_xact_lock` for that auction's id, does its work, and
//! commits — rather than the scheduler's try-lock-and-skip loop, which
//! instead picks *whichever* candidate it can grab next (kept as-is in
//! `scheduler.rs`, since it serves a different caller shape).

use std::future::Future;
use std::time::Duration;

use jiff::{Span, Timestamp};
use payloads::{AuctionId, AuctionStatus, RoundStatus, TransactionType, UserId};
use payloads::requests::{CreateAuction, Deposit, PlaceBid};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};

use crate::auction_model::{self, Auction};
use crate::error::EngineError;
use crate::ledger;
use crate::ranker;
use crate::store::{self, StoreError};
use crate::time::TimeSource;

#[derive(Clone)]
pub struct AuctionEngine {
    pool: PgPool,
    time_source: TimeSource,
    initial_balance: Decimal,
    store_call_timeout: Duration,
}

impl AuctionEngine {
    pub fn new(
        pool: PgPool,
        time_source: TimeSource,
        initial_balance: Decimal,
        store_call_timeout: Duration,
    ) -> Self {
        AuctionEngine {
            pool,
            time_source,
            initial_balance,
            store_call_timeout,
        }
    }

    /// Bounds a Store/Ledger-calling critical section (`spec.md` §5:
    /// "these must be bounded: the engine times them out on Store
    /// unavailability and surfaces a transient failure"). A timeout here
    /// means the in-flight transaction is dropped and rolled back by
    /// Postgres, so it leaves no partial trace, same as any other early
    /// return from inside `begin_locked`'s transaction.
    async fn with_store_timeout<F, T>(&self, fut: F) -> Result<T, EngineError>
    where
        F: Future<Output = Result<T, EngineError>>,
    {
        match tokio::time::timeout(self.store_call_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(EngineError::Internal(
                "store call timed out; retry".into(),
            )),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn time_source(&self) -> &TimeSource {
        &self.time_source
    }

    /// `spec.md` §4.4's normalization of `winnersPerRound` happens here
    /// rather than at `start`, so a draft auction's winner plan is fixed
    /// and visible as soon as it's created.
    pub async fn create_auction(&self, req: CreateAuction) -> Result<Auction, EngineError> {
        if req.total_items == 0 {
            return Err(EngineError::BadRequest("totalItems must be >= 1".into()));
        }
        let min_round_duration = Span::new().seconds(10);
        if Timestamp::UNIX_EPOCH + req.round_duration < Timestamp::UNIX_EPOCH + min_round_duration {
            return Err(EngineError::BadRequest(
                "roundDuration must be >= 10s".into(),
            ));
        }
        if req.min_bid < Decimal::ZERO {
            return Err(EngineError::BadRequest("minBid must be >= 0".into()));
        }

        let winners_per_round = match req.winners_per_round {
            Some(w) => {
                if w.iter().any(|n| *n == 0) {
                    return Err(StoreError::WinnersPerRoundNonPositive.into());
                }
                if w.iter().sum::<u32>() != req.total_items {
                    return Err(StoreError::WinnersPerRoundMismatch.into());
                }
                w
            }
            None => {
                let per_round = req
                    .items_per_round
                    .ok_or_else(|| {
                        EngineError::BadRequest(
                            "either winnersPerRound or itemsPerRound is required".into(),
                        )
                    })
                    .and_then(|n| {
                        if n == 0 {
                            Err(EngineError::BadRequest("itemsPerRound must be >= 1".into()))
                        } else {
                            Ok(n)
                        }
                    })?;
                normalize_items_per_round(req.total_items, per_round)
            }
        };

        // `spec.md` §6: antiSnipingWindow defaults to 10s when the caller
        // omits it.
        let anti_sniping_window = req
            .anti_sniping_window
            .unwrap_or_else(|| Span::new().seconds(10));
        if Timestamp::UNIX_EPOCH + anti_sniping_window < Timestamp::UNIX_EPOCH {
            return Err(EngineError::BadRequest(
                "antiSnipingWindow must be >= 0".into(),
            ));
        }

        let now = self.time_source.now();
        let id = store::auction::create_auction(
            &self.pool,
            store::auction::NewAuction {
                title: req.title,
                description: req.description,
                total_items: req.total_items,
                winners_per_round,
                round_duration: req.round_duration,
                min_bid: req.min_bid,
                anti_sniping_window,
            },
            now,
        )
        .await?;

        self.get_auction(id).await
    }

    pub async fn get_auction(&self, id: AuctionId) -> Result<Auction, EngineError> {
        Ok(store::auction::load_full_auction(&self.pool, id).await?)
    }

    pub async fn start(&self, id: AuctionId) -> Result<Auction, EngineError> {
        self.with_store_timeout(async {
            let now = self.time_source.now();
            let mut tx = begin_locked(&self.pool, id).await?;

            let row = store::auction::get_auction_for_update_tx(&mut tx, id).await?;
            store::auction::start_auction_tx(&mut tx, &row, now).await?;

            tx.commit().await.map_err(StoreError::Database)?;
            self.get_auction(id).await
        })
        .await
    }

    /// `spec.md` §4.2.
    pub async fn place_bid(&self, req: PlaceBid) -> Result<payloads::responses::Bid, EngineError> {
        if req.amount <= Decimal::ZERO {
            return Err(EngineError::BadRequest(
                "bid amount must be positive".into(),
            ));
        }

        self.with_store_timeout(async {
            let now = self.time_source.now();
            let mut tx = begin_locked(&self.pool, req.auction_id).await?;

            let auction_row =
                store::auction::get_auction_for_update_tx(&mut tx, req.auction_id).await?;
            if auction_row.status != AuctionStatus::Active {
                return Err(EngineError::IllegalState("auction is not active".into()));
            }
            if req.amount < auction_row.min_bid {
                return Err(EngineError::BadRequest(
                    "bid amount is below the auction's minimum bid".into(),
                ));
            }

            let round =
                store::auction::get_active_round_for_auction_tx(&mut tx, req.auction_id).await?;
            if round.status != RoundStatus::Active {
                return Err(EngineError::IllegalState("round is not active".into()));
            }
            // Strict cutoff: a bid admitted at or after endTime is rejected
            // (spec.md §9 open question 3 — source uses the same `>=` direction).
            if now >= round.end_time {
                return Err(EngineError::RoundEnded);
            }

            // Step 1: the debit precedes aggregate mutation — if it fails
            // (InsufficientBalance), no Bid is recorded and the transaction
            // rolls back, leaving no trace (spec.md §5 "Cancellation & timeouts").
            ledger::adjust_tx(
                &mut tx,
                req.user_id,
                -req.amount,
                ledger::Adjustment {
                    kind: TransactionType::Bid,
                    description: format!(
                        "bid on auction {} round {}",
                        req.auction_id, round.round_number
                    ),
                    auction_id: Some(req.auction_id),
                    round_number: Some(round.round_number as u32),
                    bid_id: None,
                },
                now,
            )
            .await?;

            // Step 2: append the Bid.
            let bid = store::auction::insert_bid_tx(
                &mut tx,
                req.auction_id,
                round.id,
                round.round_number as u32,
                req.user_id,
                req.amount,
                now,
            )
            .await?;

            let round_bids = store::auction::list_bids_for_round_tx(&mut tx, round.id).await?;
            store::auction::set_round_total_bids_tx(&mut tx, round.id, round_bids.len() as u32)
                .await?;

            // Step 3: anti-sniping extension.
            let winning_slots = round.winning_slots as u32;

            let extension_trigger = round.end_time - auction_row.anti_sniping_window;
            if now >= extension_trigger {
                // `round_bids` was fetched after `insert_bid_tx`, so it already
                // includes this bid.
                let model_bids: Vec<auction_model::Bid> = round_bids
                    .iter()
                    .map(|b| auction_model::Bid {
                        id: b.id,
                        round_number: b.round_number as u32,
                        user_id: b.user_id,
                        amount: b.amount,
                        timestamp: b.placed_at,
                    })
                    .collect();
                let ranked = ranker::rank(&model_bids, winning_slots);
                let bidder_is_top_k = ranked
                    .iter()
                    .position(|entry| entry.user_id == req.user_id)
                    .is_some_and(|pos| (pos as u32) < winning_slots);

                if bidder_is_top_k {
                    let candidate_end = now + auction_row.anti_sniping_window;
                    let cap =
                        round.start_time + auction_row.round_duration + auction_row.round_duration;
                    let new_end = candidate_end.min(cap);
                    store::auction::extend_round_end_time_tx(&mut tx, round.id, new_end).await?;
                }
            }

            tx.commit().await.map_err(StoreError::Database)?;
            Ok(bid.into_response())
        })
        .await
    }

    /// `spec.md` §4.3. Idempotent: the pre-condition check rejects an
    /// already-closed round, so calling this twice for the same round is a
    /// no-op on the second call (spec.md §8 property 7).
    pub async fn close_round(&self, id: AuctionId) -> Result<Auction, EngineError> {
        self.with_store_timeout(self.close_round_inner(id)).await
    }

    async fn close_round_inner(&self, id: AuctionId) -> Result<Auction, EngineError> {
        let now = self.time_source.now();
        let mut tx = begin_locked(&self.pool, id).await?;

        let auction_row = store::auction::get_auction_for_update_tx(&mut tx, id).await?;
        if auction_row.status != AuctionStatus::Active {
            return Err(EngineError::IllegalState("auction is not active".into()));
        }
        let round = store::auction::get_active_round_for_auction_tx(&mut tx, id).await?;
        if now < round.end_time {
            return Err(EngineError::IllegalState(
                "round has not ended yet".into(),
            ));
        }

        let round_bid_rows = store::auction::list_bids_for_round_tx(&mut tx, round.id).await?;
        let model_bids: Vec<auction_model::Bid> = round_bid_rows
            .iter()
            .map(|b| auction_model::Bid {
                id: b.id,
                round_number: b.round_number as u32,
                user_id: b.user_id,
                amount: b.amount,
                timestamp: b.placed_at,
            })
            .collect();

        let winning_slots = round.winning_slots as u32;

        // Step 1-2: leaderboard and top-K winners.
        let ranked = ranker::rank(&model_bids, winning_slots);
        let winners: Vec<(UserId, Decimal)> = ranked
            .iter()
            .filter(|e| e.is_winner)
            .map(|e| (e.user_id, e.amount))
            .collect();
        let winner_ids: std::collections::HashSet<UserId> =
            winners.iter().map(|(u, _)| *u).collect();

        let winners_before_this_round = total_winners_so_far(&mut tx, id).await?;
        store::auction::insert_round_winners_tx(&mut tx, round.id, &winners).await?;

        // Step 3: winner refund of non-top bids in this round.
        for b in &round_bid_rows {
            if winner_ids.contains(&b.user_id) {
                let winning_amount = winners
                    .iter()
                    .find(|(u, _)| *u == b.user_id)
                    .map(|(_, amount)| *amount)
                    .expect("winner_ids and winners are built from the same ranked set");
                if b.amount < winning_amount {
                    ledger::adjust_tx(
                        &mut tx,
                        b.user_id,
                        b.amount,
                        ledger::Adjustment {
                            kind: TransactionType::Refund,
                            description: format!(
                                "refund of non-winning bid in auction {} round {}",
                                id, round.round_number
                            ),
                            auction_id: Some(id),
                            round_number: Some(round.round_number as u32),
                            bid_id: Some(b.id),
                        },
                        now,
                    )
                    .await?;
                } else {
                    // The winning bid itself: already debited via its `Bid`
                    // Transaction, so this is a balance-neutral journal entry.
                    ledger::journal_tx(
                        &mut tx,
                        b.user_id,
                        ledger::Adjustment {
                            kind: TransactionType::Win,
                            description: format!(
                                "won auction {} round {}",
                                id, round.round_number
                            ),
                            auction_id: Some(id),
                            round_number: Some(round.round_number as u32),
                            bid_id: Some(b.id),
                        },
                        now,
                    )
                    .await?;
                }
            }
        }

        // Step 4: mark the round completed.
        store::auction::complete_round_tx(&mut tx, round.id, round_bid_rows.len() as u32).await?;

        // Step 5/6: advance or finalize. `winners_before_this_round` was
        // queried before `insert_round_winners_tx` above, so adding this
        // round's winner count here doesn't double-count them.
        let produced_so_far = winners_before_this_round + winners.len() as u32;
        let more_rounds_planned = (round.round_number as usize) < auction_row.winners_per_round.len();

        if produced_so_far < auction_row.total_items as u32 && more_rounds_planned {
            let next_round_number = round.round_number as u32 + 1;
            let next_winning_slots = auction_row.winners_per_round[next_round_number as usize - 1];
            let next_round = store::auction::create_round_tx(
                &mut tx,
                id,
                next_round_number,
                now,
                now + auction_row.round_duration,
                next_winning_slots as i32,
            )
            .await?;
            store::auction::advance_auction_current_round_tx(&mut tx, id, next_round_number)
                .await?;

            let mut carried = 0u32;
            for b in &round_bid_rows {
                if !winner_ids.contains(&b.user_id) {
                    store::auction::carry_forward_bid_tx(&mut tx, b, next_round.id, next_round_number)
                        .await?;
                    carried += 1;
                }
            }
            if carried > 0 {
                store::auction::set_round_total_bids_tx(&mut tx, next_round.id, carried).await?;
            }
        } else {
            store::auction::complete_auction_tx(&mut tx, id, now).await?;

            // Refund every bidder across every round who never won, for
            // every bid of theirs (spec.md §4.3 step 6, §4.5's terminal row).
            let all_bid_rows = sqlx::query_as::<_, store::BidRow>(
                "select * from bids where auction_id = $1",
            )
            .bind(id)
            .fetch_all(&mut *tx)
            .await
            .map_err(StoreError::Database)?;
            let all_winner_ids: std::collections::HashSet<UserId> =
                sqlx::query_scalar::<_, uuid::Uuid>(
                    "select distinct rw.user_id
                     from round_winners rw
                     join auction_rounds r on r.id = rw.round_id
                     where r.auction_id = $1",
                )
                .bind(id)
                .fetch_all(&mut *tx)
                .await
                .map_err(StoreError::Database)?
                .into_iter()
                .map(UserId)
                .collect();

            for b in &all_bid_rows {
                if !all_winner_ids.contains(&b.user_id) {
                    ledger::adjust_tx(
                        &mut tx,
                        b.user_id,
                        b.amount,
                        ledger::Adjustment {
                            kind: TransactionType::Refund,
                            description: format!(
                                "final refund: never won in auction {}",
                                id
                            ),
                            auction_id: Some(id),
                            round_number: Some(b.round_number as u32),
                            bid_id: Some(b.id),
                        },
                        now,
                    )
                    .await?;
                }
            }
        }

        tx.commit().await.map_err(StoreError::Database)?;
        self.get_auction(id).await
    }

    /// `spec.md` §6: `users.getOrCreate`. Materializes a user at
    /// `self.initial_balance` on first contact.
    pub async fn get_or_create_user(
        &self,
        user_id: UserId,
    ) -> Result<payloads::responses::User, EngineError> {
        let now = self.time_source.now();
        let user =
            ledger::get_or_create_user(&self.pool, user_id, self.initial_balance, now).await?;
        Ok(user.into_response())
    }

    /// `spec.md` §6: `users.get`.
    pub async fn get_user(&self, user_id: UserId) -> Result<payloads::responses::User, EngineError> {
        Ok(ledger::get_user(&self.pool, user_id).await?.into_response())
    }

    /// `spec.md` §6: `users.deposit`. A deposit is not tied to any auction's
    /// critical section — it only needs the per-user row lock `adjust_tx`
    /// already takes.
    pub async fn deposit(&self, req: Deposit) -> Result<payloads::responses::User, EngineError> {
        if req.amount <= Decimal::ZERO {
            return Err(EngineError::BadRequest(
                "deposit amount must be positive".into(),
            ));
        }
        self.with_store_timeout(async {
            let now = self.time_source.now();
            let mut tx = self.pool.begin().await.map_err(StoreError::Database)?;
            let user = ledger::adjust_tx(
                &mut tx,
                req.user_id,
                req.amount,
                ledger::Adjustment {
                    kind: TransactionType::Deposit,
                    description: "deposit".into(),
                    auction_id: None,
                    round_number: None,
                    bid_id: None,
                },
                now,
            )
            .await?;
            tx.commit().await.map_err(StoreError::Database)?;
            Ok(user.into_response())
        })
        .await
    }

    /// `spec.md` §6: `users.transactions`, newest first.
    pub async fn user_transactions(
        &self,
        user_id: UserId,
        limit: i64,
    ) -> Result<Vec<payloads::responses::Transaction>, EngineError> {
        Ok(ledger::history(&self.pool, user_id, limit)
            .await?
            .into_iter()
            .map(|t| t.into_response())
            .collect())
    }
}

fn normalize_items_per_round(total_items: u32, items_per_round: u32) -> Vec<u32> {
    let full_rounds = total_items / items_per_round;
    let remainder = total_items % items_per_round;
    let mut plan = vec![items_per_round; full_rounds as usize];
    if remainder > 0 {
        plan.push(remainder);
    }
    plan
}

async fn total_winners_so_far(
    tx: &mut Transaction<'_, Postgres>,
    auction_id: AuctionId,
) -> Result<u32, StoreError> {
    let count: i64 = sqlx::query_scalar(
        "select count(*) from round_winners rw
         join auction_rounds r on r.id = rw.round_id
         where r.auction_id = $1",
    )
    .bind(auction_id)
    .fetch_one(&mut **tx)
    .await?;
    Ok(count as u32)
}

/// Opens a transaction and blocks on the auction's advisory lock, giving
/// every mutating `AuctionEngine` method a linearized critical section per
/// auction (`spec.md` §5). Grounded on
/// `scheduler::lock_next_auction_needing_update`'s lock-key construction.
async fn begin_locked(
    pool: &PgPool,
    auction_id: AuctionId,
) -> Result<Transaction<'static, Postgres>, StoreError> {
    let mut tx = pool.begin().await?;
    sqlx::query("select pg_advisory_xact_lock(hashtextextended($1, 0))")
        .bind(format!("auction:{auction_id}"))
        .execute(&mut *tx)
        .await?;
    Ok(tx)
}
