//! Store-level CRUD sanity checks, one level below the `AuctionEngine`
//! API covered by `auction.rs` — mirrors the teacher's `database.rs`,
//! which exercises its storage layer directly against a migrated
//! database rather than only through the public surface above it.

use engine::store::auction as store;
use engine::store::auction::NewAuction;
use payloads::AuctionStatus;
use rust_decimal::Decimal;
use test_helpers::spawn_app;

#[tokio::test]
async fn create_and_fetch_round_trips_every_field() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let now = app.time_source.now();

    let id = store::create_auction(
        &app.pool,
        NewAuction {
            title: "desks".into(),
            description: Some("shared desks".into()),
            total_items: 3,
            winners_per_round: vec![3],
            round_duration: jiff::Span::new().seconds(30),
            min_bid: Decimal::from(2),
            anti_sniping_window: jiff::Span::new().seconds(5),
        },
        now,
    )
    .await?;

    let row = store::get_auction(&app.pool, id).await?;
    assert_eq!(row.title, "desks");
    assert_eq!(row.description.as_deref(), Some("shared desks"));
    assert_eq!(row.total_items, 3);
    assert_eq!(row.winners_per_round, vec![3]);
    assert_eq!(row.min_bid, Decimal::from(2));
    assert_eq!(row.status, AuctionStatus::Draft);
    assert!(row.started_at.is_none());
    Ok(())
}

#[tokio::test]
async fn list_auctions_and_list_active_auctions() -> anyhow::Result<()> {
    let app = spawn_app().await;

    let draft = app
        .engine
        .create_auction(test_helpers::create_auction_request(1))
        .await?;
    let started = app
        .engine
        .create_auction(test_helpers::create_auction_request(1))
        .await?;
    app.engine.start(started.id).await?;

    let all = store::list_auctions(&app.pool).await?;
    assert_eq!(all.len(), 2);

    let active = store::list_active_auctions(&app.pool).await?;
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, started.id);
    assert_ne!(active[0].id, draft.id);
    Ok(())
}

#[tokio::test]
async fn load_full_auction_includes_rounds_and_bids() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let user = test_helpers::new_user_id();
    app.engine.get_or_create_user(user).await?;

    let auction = app
        .engine
        .create_auction(test_helpers::create_auction_request(1))
        .await?;
    app.engine.start(auction.id).await?;
    app.engine
        .place_bid(payloads::requests::PlaceBid {
            auction_id: auction.id,
            user_id: user,
            amount: Decimal::from(3),
        })
        .await?;

    let full = store::load_full_auction(&app.pool, auction.id).await?;
    assert_eq!(full.rounds.len(), 1);
    assert_eq!(full.bids.len(), 1);
    assert_eq!(full.bids[0].user_id, user);
    assert_eq!(full.bids[0].amount, Decimal::from(3));
    Ok(())
}
