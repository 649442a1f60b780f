//! Shared test utilities and fixtures

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use fakeblok::ServerProcess;
use fakeblok_config::{ClientConfig, RegistryConfig, ServerConfig};
use fakeblok_registry::GameList;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

pub const LOCALHOST: [u8; 4] = [127, 0, 0, 1];

/// A game server running on an ephemeral port.
pub struct RunningServer {
    pub addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<anyhow::Result<()>>,
}

impl RunningServer {
    /// Trigger shutdown and wait for unregistration to finish.
    pub async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        self.task.await.unwrap().unwrap();
    }
}

pub fn small_world() -> ServerConfig {
    ServerConfig {
        port: 0,
        world_width: 400,
        world_height: 400,
        square_size: 100,
        ..ServerConfig::default()
    }
}

pub async fn start_server(config: ServerConfig) -> RunningServer {
    let process = ServerProcess::bind(config).await.unwrap();
    let addr = SocketAddr::from((LOCALHOST, process.local_addr().port()));
    let (shutdown, stopped) = oneshot::channel::<()>();
    let task = tokio::spawn(process.run_until(async {
        let _ = stopped.await;
    }));
    RunningServer {
        addr,
        shutdown: Some(shutdown),
        task,
    }
}

/// A game list on ephemeral ports with fast health checks.
/// Returns `(registration_addr, list_addr)`.
pub async fn start_game_list() -> (SocketAddr, SocketAddr) {
    let config = RegistryConfig {
        health_check_interval_ms: 25,
        ..RegistryConfig::default()
    };
    let any = SocketAddr::from((LOCALHOST, 0));
    let list = GameList::bind(any, any, &config).await.unwrap();
    let addrs = (list.registration_addr(), list.list_addr());
    tokio::spawn(list.run());
    addrs
}

pub fn client_config() -> ClientConfig {
    ClientConfig {
        request_timeout_ms: 2000,
        ..ClientConfig::default()
    }
}

/// Poll `check` until it returns true, failing after a few seconds.
pub async fn eventually<F, Fut>(what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..300 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}
