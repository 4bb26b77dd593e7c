//! User balances and the append-only transaction journal (`spec.md` §6,
//! C2). Grounded on the teacher's `store::currency::create_entry`: lock the
//! affected row with `SELECT ... FOR UPDATE`, check the balance invariant
//! before mutating, then write both the new balance and a journal row in
//! the same transaction. The teacher's ledger is double-entry across
//! multiple accounts with lines that must sum to zero; this domain only
//! ever debits/credits a single user against the house, so that machinery
//! is dropped in favor of one `balance` column per user plus one
//! `transactions` row per adjustment.

use jiff::Timestamp;
use jiff_sqlx::ToSqlx;
use payloads::{AuctionId, BidId, TransactionType, UserId};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::store::{StoreError, TransactionRow, UserRow};

/// Returns the user, creating it with `initial_balance` if this is the
/// first time it's been seen. Mirrors `spec.md` §6's Ledger contract
/// distinction between `getUser` (fails on missing) and `getOrCreate`
/// (materializes a demo user on first contact).
pub async fn get_or_create_user(
    pool: &PgPool,
    user_id: UserId,
    initial_balance: Decimal,
    now: Timestamp,
) -> Result<UserRow, StoreError> {
    sqlx::query_as(
        "insert into users (id, balance, created_at, updated_at)
         values ($1, $2, $3, $3)
         on conflict (id) do update set id = excluded.id
         returning *",
    )
    .bind(user_id)
    .bind(initial_balance)
    .bind(now.to_sqlx())
    .fetch_one(pool)
    .await
    .map_err(StoreError::Database)
}

pub async fn get_user(pool: &PgPool, user_id: UserId) -> Result<UserRow, StoreError> {
    sqlx::query_as("select * from users where id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => StoreError::UserNotFound,
            e => StoreError::Database(e),
        })
}

async fn get_user_for_update_tx(
    tx: &mut Transaction<'_, Postgres>,
    user_id: UserId,
) -> Result<UserRow, StoreError> {
    sqlx::query_as("select * from users where id = $1 for update")
        .bind(user_id)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => StoreError::UserNotFound,
            e => StoreError::Database(e),
        })
}

/// Describes a single adjustment, for the journal row that `adjust_tx`
/// writes alongside the balance update.
pub struct Adjustment {
    pub kind: TransactionType,
    pub description: String,
    pub auction_id: Option<AuctionId>,
    pub round_number: Option<u32>,
    pub bid_id: Option<BidId>,
}

/// Applies `delta` to `user_id`'s balance (negative to debit, positive to
/// credit) and appends a journal row, all inside `tx`. Fails with
/// `InsufficientBalance` rather than letting the balance go negative
/// (`spec.md` §4.2 pre-condition: "bidder has sufficient available
/// balance").
pub async fn adjust_tx(
    tx: &mut Transaction<'_, Postgres>,
    user_id: UserId,
    delta: Decimal,
    adjustment: Adjustment,
    now: Timestamp,
) -> Result<UserRow, StoreError> {
    let user = get_user_for_update_tx(tx, user_id).await?;

    let new_balance = user.balance + delta;
    if new_balance < Decimal::ZERO {
        return Err(StoreError::InsufficientBalance);
    }

    let updated: UserRow = sqlx::query_as(
        "update users set balance = $2, updated_at = $3 where id = $1 returning *",
    )
    .bind(user_id)
    .bind(new_balance)
    .bind(now.to_sqlx())
    .fetch_one(&mut **tx)
    .await?;

    sqlx::query(
        "insert into transactions
            (id, user_id, auction_id, kind, amount, round_number, bid_id, description, created_at)
         values ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(adjustment.auction_id)
    .bind(adjustment.kind)
    .bind(delta)
    .bind(adjustment.round_number.map(|n| n as i32))
    .bind(adjustment.bid_id)
    .bind(adjustment.description)
    .bind(now.to_sqlx())
    .execute(&mut **tx)
    .await?;

    Ok(updated)
}

/// Appends a journal row without touching the balance — for settlement
/// outcomes that don't move money on their own, e.g. a `win` entry for the
/// winning bid itself (`spec.md` §4.3 step 3: "the winning bid itself
/// remains debited — it is the price paid", already recorded as the
/// original `bid` Transaction). Recording `amount = 0` here keeps the
/// conservation invariant (`spec.md` §8 property 8) unaffected by this row.
pub async fn journal_tx(
    tx: &mut Transaction<'_, Postgres>,
    user_id: UserId,
    adjustment: Adjustment,
    now: Timestamp,
) -> Result<(), StoreError> {
    sqlx::query(
        "insert into transactions
            (id, user_id, auction_id, kind, amount, round_number, bid_id, description, created_at)
         values ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(adjustment.auction_id)
    .bind(adjustment.kind)
    .bind(Decimal::ZERO)
    .bind(adjustment.round_number.map(|n| n as i32))
    .bind(adjustment.bid_id)
    .bind(adjustment.description)
    .bind(now.to_sqlx())
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Paginated read of a user's transaction journal (`spec.md` §6
/// `Ledger.history`).
pub async fn history(
    pool: &PgPool,
    user_id: UserId,
    limit: i64,
) -> Result<Vec<TransactionRow>, StoreError> {
    Ok(sqlx::query_as(
        "select * from transactions
         where user_id = $1
         order by created_at desc
         limit $2",
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await?)
}
