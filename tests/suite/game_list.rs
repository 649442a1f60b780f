//! Game servers announcing themselves to a game list.

use std::net::SocketAddr;

use fakeblok_client::{GameListClient, RegistrationClient};
use fakeblok_config::ServerConfig;

use crate::common::{LOCALHOST, eventually, small_world, start_game_list, start_server};

fn named(name: &str, registry_addr: SocketAddr) -> ServerConfig {
    ServerConfig {
        name: Some(name.to_string()),
        registry_addr: Some(registry_addr),
        ..small_world()
    }
}

#[tokio::test]
async fn server_registers_and_unregisters_on_shutdown() {
    let (registration_addr, list_addr) = start_game_list().await;
    let lister = &GameListClient::connect(list_addr).await.unwrap();

    let server = start_server(named("arena", registration_addr)).await;
    eventually("the server to be listed", || async move {
        lister.list().await.unwrap().len() == 1
    })
    .await;

    let games = lister.list().await.unwrap();
    assert_eq!(games[0].name, "arena");
    assert_eq!(games[0].addr, SocketAddr::from((LOCALHOST, server.addr.port())));

    // Several health check intervals pass without dropping a live server.
    tokio::time::sleep(std::time::Duration::from_millis(150)).await;
    assert_eq!(lister.list().await.unwrap().len(), 1);

    server.stop().await;
    assert!(lister.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn listing_is_sorted_by_address() {
    let (registration_addr, list_addr) = start_game_list().await;
    let lister = &GameListClient::connect(list_addr).await.unwrap();

    let first = start_server(named("one", registration_addr)).await;
    let second = start_server(named("two", registration_addr)).await;
    eventually("both servers to be listed", || async move {
        lister.list().await.unwrap().len() == 2
    })
    .await;

    let addrs: Vec<SocketAddr> = lister
        .list()
        .await
        .unwrap()
        .into_iter()
        .map(|game| game.addr)
        .collect();
    let mut sorted = addrs.clone();
    sorted.sort();
    assert_eq!(addrs, sorted);

    first.stop().await;
    second.stop().await;
}

#[tokio::test]
async fn server_without_name_stays_unlisted() {
    let (registration_addr, list_addr) = start_game_list().await;
    let lister = &GameListClient::connect(list_addr).await.unwrap();

    let config = ServerConfig {
        registry_addr: Some(registration_addr),
        ..small_world()
    };
    let server = start_server(config).await;
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert!(lister.list().await.unwrap().is_empty());
    server.stop().await;
}

#[tokio::test]
async fn crashed_server_is_dropped_by_health_check() {
    let (registration_addr, list_addr) = start_game_list().await;
    let lister = &GameListClient::connect(list_addr).await.unwrap();

    // Register a port nobody serves, as a crashed server would leave behind.
    let closed = tokio::net::TcpListener::bind(SocketAddr::from((LOCALHOST, 0))).await.unwrap();
    let port = closed.local_addr().unwrap().port();
    drop(closed);

    let registrar = RegistrationClient::connect(registration_addr).await.unwrap();
    assert_eq!(registrar.register(port, "ghost").await.unwrap(), None);

    eventually("the dead game to be dropped", || async move {
        lister.list().await.unwrap().is_empty()
    })
    .await;
    assert_eq!(registrar.unregister(port).await.unwrap(), None);
}
