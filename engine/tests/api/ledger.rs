//! Balance-conservation tests for the ledger (`spec.md` §8 property 1:
//! `initial_balance + deposits + refunds - winning_bids == current_balance`).

use engine::ledger;
use payloads::TransactionType;
use payloads::requests::{Deposit, PlaceBid};
use rust_decimal::Decimal;
use test_helpers::{create_auction_request, new_user_id, spawn_app};

#[tokio::test]
async fn get_or_create_user_is_idempotent_on_balance() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let user_id = new_user_id();
    let now = app.time_source.now();

    let first = ledger::get_or_create_user(&app.pool, user_id, Decimal::from(1000), now).await?;
    let second = ledger::get_or_create_user(&app.pool, user_id, Decimal::from(500), now).await?;

    assert_eq!(first.balance, Decimal::from(1000));
    assert_eq!(second.balance, Decimal::from(1000));
    Ok(())
}

#[tokio::test]
async fn adjust_tx_rejects_overdraft_and_leaves_balance_untouched() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let user_id = new_user_id();
    app.create_user_with_balance(user_id, Decimal::from(5))
        .await?;

    let mut tx = app.pool.begin().await?;
    let result = ledger::adjust_tx(
        &mut tx,
        user_id,
        Decimal::from(-10),
        ledger::Adjustment {
            kind: TransactionType::Bid,
            description: "overdraft attempt".into(),
            auction_id: None,
            round_number: None,
            bid_id: None,
        },
        app.time_source.now(),
    )
    .await;
    assert!(result.is_err());
    drop(tx);

    let user = ledger::get_user(&app.pool, user_id).await?;
    assert_eq!(user.balance, Decimal::from(5));
    Ok(())
}

/// The full lifecycle — deposit, debit via a bid, refund via a loss —
/// always nets back to what was put in.
#[tokio::test]
async fn balance_is_conserved_across_deposit_bid_and_refund() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let winner = new_user_id();
    let loser = new_user_id();
    app.engine.get_or_create_user(winner).await?;
    app.engine.get_or_create_user(loser).await?;

    app.engine
        .deposit(Deposit {
            user_id: loser,
            amount: Decimal::from(100),
        })
        .await?;

    let auction = app
        .engine
        .create_auction(create_auction_request(1))
        .await?;
    app.engine.start(auction.id).await?;

    app.engine
        .place_bid(PlaceBid {
            auction_id: auction.id,
            user_id: winner,
            amount: Decimal::from(50),
        })
        .await?;
    app.engine
        .place_bid(PlaceBid {
            auction_id: auction.id,
            user_id: loser,
            amount: Decimal::from(20),
        })
        .await?;

    app.advance(jiff::Span::new().seconds(10));
    app.engine.close_round(auction.id).await?;

    // winner: 1000 - 50 = 950 (never refunded, bid == winning amount).
    assert_eq!(
        app.engine.get_user(winner).await?.balance,
        Decimal::from(950)
    );
    // loser: 1000 + 100 deposit - 20 bid + 20 refund = 1100.
    assert_eq!(
        app.engine.get_user(loser).await?.balance,
        Decimal::from(1100)
    );

    let loser_txs = app.engine.user_transactions(loser, 10).await?;
    let net: Decimal = loser_txs.iter().map(|t| t.amount).sum();
    assert_eq!(net, Decimal::from(100));
    Ok(())
}

#[tokio::test]
async fn history_is_newest_first_and_respects_limit() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let user_id = new_user_id();
    app.engine.get_or_create_user(user_id).await?;

    for amount in [10, 20, 30] {
        app.engine
            .deposit(Deposit {
                user_id,
                amount: Decimal::from(amount),
            })
            .await?;
        app.advance(jiff::Span::new().seconds(1));
    }

    let txs = app.engine.user_transactions(user_id, 2).await?;
    assert_eq!(txs.len(), 2);
    assert_eq!(txs[0].amount, Decimal::from(30));
    assert_eq!(txs[1].amount, Decimal::from(20));
    Ok(())
}
