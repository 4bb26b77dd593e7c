//! Read-side projections (`spec.md` §4.7): `active_auctions`, `leaderboard`,
//! `user_bids`.

use engine::query;
use payloads::requests::PlaceBid;
use rust_decimal::Decimal;
use test_helpers::{create_auction_request, new_user_id, spawn_app};

#[tokio::test]
async fn active_auctions_excludes_draft_and_completed() -> anyhow::Result<()> {
    let app = spawn_app().await;

    let draft = app
        .engine
        .create_auction(create_auction_request(1))
        .await?;
    let active = app
        .engine
        .create_auction(create_auction_request(1))
        .await?;
    app.engine.start(active.id).await?;
    let completed = app
        .engine
        .create_auction(create_auction_request(1))
        .await?;
    app.engine.start(completed.id).await?;
    app.advance(jiff::Span::new().seconds(10));
    app.engine.close_round(completed.id).await?;

    let actives = query::active_auctions(&app.pool, app.time_source.now()).await?;
    let ids: Vec<_> = actives.iter().map(|a| a.id).collect();
    assert!(ids.contains(&active.id));
    assert!(!ids.contains(&draft.id));
    assert!(!ids.contains(&completed.id));
    Ok(())
}

#[tokio::test]
async fn leaderboard_ranks_one_bid_per_user() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let (u1, u2) = (new_user_id(), new_user_id());
    for u in [u1, u2] {
        app.engine.get_or_create_user(u).await?;
    }

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
    app.engine
        .place_bid(PlaceBid {
            auction_id: auction.id,
            user_id: u1,
            amount: Decimal::from(8),
        })
        .await?;
    app.engine
        .place_bid(PlaceBid {
            auction_id: auction.id,
            user_id: u2,
            amount: Decimal::from(6),
        })
        .await?;

    let board = query::leaderboard(&app.pool, auction.id, 1).await?;
    assert_eq!(board.len(), 2);
    assert_eq!(board[0].user_id, u1);
    assert_eq!(board[0].amount, Decimal::from(8));
    assert!(board[0].is_winner);
    assert_eq!(board[1].user_id, u2);
    assert!(!board[1].is_winner);
    Ok(())
}

#[tokio::test]
async fn user_bids_includes_carried_forward_entries() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let (u1, u2) = (new_user_id(), new_user_id());
    for u in [u1, u2] {
        app.engine.get_or_create_user(u).await?;
    }

    let mut req = create_auction_request(2);
    req.items_per_round = None;
    req.winners_per_round = Some(vec![1, 1]);
    let auction = app.engine.create_auction(req).await?;
    app.engine.start(auction.id).await?;

    app.engine
        .place_bid(PlaceBid {
            auction_id: auction.id,
            user_id: u1,
            amount: Decimal::from(5),
        })
        .await?;
    app.engine
        .place_bid(PlaceBid {
            auction_id: auction.id,
            user_id: u2,
            amount: Decimal::from(3),
        })
        .await?;

    app.advance(jiff::Span::new().seconds(10));
    app.engine.close_round(auction.id).await?;

    let bids = query::user_bids(&app.pool, auction.id, u2).await?;
    assert_eq!(bids.len(), 2);
    assert_eq!(bids[0].round_number, 1);
    assert_eq!(bids[1].round_number, 2);
    assert_eq!(bids[0].timestamp, bids[1].timestamp);
    Ok(())
}
