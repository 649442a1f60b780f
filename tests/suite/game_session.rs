//! Two players on one game server.

use std::time::Duration;

use fakeblok_client::GameClient;
use fakeblok_protocol::methods::game;
use fakeblok_protocol::{PushInputParams, RpcClient, RpcError, codes, params};
use fakeblok_types::{Component, EntityId, Game, Input, Sign};
use serde_json::json;

use crate::common::{client_config, eventually, small_world, start_server};

#[tokio::test]
async fn players_see_each_other_move() {
    let server = start_server(small_world()).await;
    let alice = GameClient::connect(server.addr, &client_config()).await.unwrap();
    let bob = GameClient::connect(server.addr, &client_config()).await.unwrap();
    assert_ne!(alice.entity_id(), bob.entity_id());

    let start = alice.snapshot().entity(alice.entity_id()).unwrap().rect.top_left;
    alice.push_input(Input::Move(Component::Y, Some(Sign::Positive)));

    let alice_id = alice.entity_id();
    eventually("bob to see alice move", || {
        let seen = bob.snapshot().entity(alice_id).map(|e| e.rect.top_left);
        async move { seen.is_some_and(|p| p.y != start.y) }
    })
    .await;

    alice.push_input(Input::Move(Component::Y, None));
    eventually("alice to stop", || {
        let velocity = bob.snapshot().entity(alice_id).map(|e| e.velocity.y);
        async move { velocity == Some(None) }
    })
    .await;

    server.stop().await;
}

#[tokio::test]
async fn leaving_player_disappears() {
    let server = start_server(small_world()).await;
    let stayer = GameClient::connect(server.addr, &client_config()).await.unwrap();
    let leaver = GameClient::connect(server.addr, &client_config()).await.unwrap();
    let leaver_id = leaver.entity_id();

    eventually("both players to be present", || {
        let count = stayer.snapshot().entity_count();
        async move { count == 2 }
    })
    .await;

    leaver.shutdown().await;
    eventually("the leaver to be removed", || {
        let present = stayer.snapshot().entity(leaver_id).is_some();
        async move { !present }
    })
    .await;
    assert!(stayer.is_connected());

    server.stop().await;
}

#[tokio::test]
async fn bullets_hit_other_players() {
    let server = start_server(small_world()).await;
    let shooter = GameClient::connect(server.addr, &client_config()).await.unwrap();
    let target = GameClient::connect(server.addr, &client_config()).await.unwrap();
    let target_id = target.entity_id();

    // The second block spawns in the next cell to the right, and a fresh
    // block faces right.
    shooter.push_input(Input::Shoot);

    eventually("the target to be hit", || {
        let hits = target.snapshot().entity(target_id).map_or(0, |e| e.hits);
        async move { hits >= 1 }
    })
    .await;

    server.stop().await;
}

#[tokio::test]
async fn raw_rpc_surface() {
    let server = start_server(small_world()).await;
    let rpc = RpcClient::connect(server.addr).await.unwrap();
    let timeout = Duration::from_secs(5);

    let id: EntityId = rpc.call(game::GET_ENTITY_ID, None, timeout).await.unwrap();
    let state: Game = rpc.call(game::POLL_GAME_STATE, None, timeout).await.unwrap();
    assert!(state.entity(id).is_some());
    assert_eq!(state.width(), 400);

    rpc.call::<()>(game::PING, None, timeout).await.unwrap();

    let next: Game = rpc.call(game::POLL_GAME_STATE, None, timeout).await.unwrap();
    assert!(next.tick_count() > state.tick_count());

    let bad = Some(json!({"input": "Jump"}));
    let err = rpc
        .call::<()>(game::PUSH_INPUT, bad, timeout)
        .await
        .unwrap_err();
    assert!(
        matches!(&err, RpcError::Remote(fault) if fault.code == codes::INVALID_PARAMS),
        "{err:?}"
    );

    let ok = params(&PushInputParams {
        input: Input::Shoot,
    })
    .unwrap();
    rpc.call::<()>(game::PUSH_INPUT, ok, timeout).await.unwrap();

    server.stop().await;
}
