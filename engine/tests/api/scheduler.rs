//! `schedule_tick` (`spec.md` §4.6): closes every round whose deadline has
//! passed, tolerating individual failures without stalling the tick.

use engine::scheduler::schedule_tick;
use payloads::{AuctionStatus, RoundStatus};
use payloads::requests::PlaceBid;
use rust_decimal::Decimal;
use test_helpers::{create_auction_request, new_user_id, spawn_app};

#[tokio::test]
async fn schedule_tick_closes_rounds_past_their_deadline() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let u1 = new_user_id();
    app.engine.get_or_create_user(u1).await?;

    let auction = app
        .engine
        .create_auction(create_auction_request(1))
        .await?;
    app.engine.start(auction.id).await?;
    app.engine
        .place_bid(PlaceBid {
            auction_id: auction.id,
            user_id: u1,
            amount: Decimal::from(5),
        })
        .await?;

    // Before the deadline, a tick is a no-op.
    schedule_tick(&app.engine).await;
    let auction = app.engine.get_auction(auction.id).await?;
    assert_eq!(auction.status, AuctionStatus::Active);
    assert_eq!(auction.rounds[0].status, RoundStatus::Active);

    app.advance(jiff::Span::new().seconds(10));
    schedule_tick(&app.engine).await;

    let auction = app.engine.get_auction(auction.id).await?;
    assert_eq!(auction.status, AuctionStatus::Completed);
    assert_eq!(auction.rounds[0].status, RoundStatus::Completed);
    Ok(())
}

#[tokio::test]
async fn schedule_tick_is_idempotent_and_handles_multiple_auctions() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let u1 = new_user_id();
    app.engine.get_or_create_user(u1).await?;

    let a = app
        .engine
        .create_auction(create_auction_request(1))
        .await?;
    let b = app
        .engine
        .create_auction(create_auction_request(1))
        .await?;
    app.engine.start(a.id).await?;
    app.engine.start(b.id).await?;

    app.advance(jiff::Span::new().seconds(10));
    schedule_tick(&app.engine).await;
    // A second tick with nothing new past its deadline must not panic or
    // double-settle either auction.
    schedule_tick(&app.engine).await;

    let a = app.engine.get_auction(a.id).await?;
    let b = app.engine.get_auction(b.id).await?;
    assert_eq!(a.status, AuctionStatus::Completed);
    assert_eq!(b.status, AuctionStatus::Completed);
    Ok(())
}
