//! Process plumbing shared by the Fakeblok binaries: logging, configuration
//! and the game server's lifecycle.

mod logging;

use std::future::Future;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use fakeblok_client::RegistrationClient;
use fakeblok_config::{FakeblokConfig, ServerConfig};
use fakeblok_protocol::RpcListener;
use fakeblok_server::GameServer;

pub use logging::{init_file_tracing, init_stderr_tracing};

/// Load the configuration file. `path` overrides the default location; a
/// missing file yields the defaults.
pub fn load_config(path: Option<&Path>) -> Result<FakeblokConfig> {
    let loaded = match path {
        Some(path) => FakeblokConfig::load_from(path),
        None => FakeblokConfig::load(),
    };
    Ok(loaded?.unwrap_or_default())
}

/// Resolves on Ctrl-C.
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("cannot listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("received Ctrl-C");
}

/// A bound game server, registered with the game list while it runs.
pub struct ServerProcess {
    listener: RpcListener,
    server: Arc<GameServer>,
    config: ServerConfig,
}

impl ServerProcess {
    pub async fn bind(config: ServerConfig) -> Result<Self> {
        let listener = RpcListener::bind(SocketAddr::from(([0, 0, 0, 0], config.port)))
            .await
            .context("binding game port")?;
        Ok(Self {
            listener,
            server: Arc::new(GameServer::from_config(&config)),
            config,
        })
    }

    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.listener.local_addr()
    }

    /// Simulate and serve until `shutdown` resolves, then leave the game list.
    pub async fn run_until(self, shutdown: impl Future<Output = ()>) -> Result<()> {
        let port = self.local_addr().port();
        let registration = self.register(port).await;

        tracing::info!(
            port,
            width = self.config.world_width,
            height = self.config.world_height,
            square = self.config.square_size,
            "starting game"
        );
        let simulation = tokio::spawn(self.server.clone().run_simulation());
        let serving = tokio::spawn(
            self.server
                .clone()
                .serve(self.listener, self.config.max_connections),
        );

        shutdown.await;

        if let Some(registry) = registration {
            match registry.unregister(port).await {
                Ok(Some(name)) => tracing::info!(%name, "left the game list"),
                Ok(None) => tracing::warn!("game list had already dropped this game"),
                Err(e) => tracing::warn!("failed to unregister: {e}"),
            }
        }
        serving.abort();
        simulation.abort();
        Ok(())
    }

    /// Registration problems are logged; the game still runs unlisted.
    async fn register(&self, port: u16) -> Option<RegistrationClient> {
        let registry_addr = self.config.registry_addr?;
        let Some(name) = self.config.name.as_deref() else {
            tracing::warn!(%registry_addr, "no game name configured; not registering");
            return None;
        };

        let registry = match RegistrationClient::connect(registry_addr).await {
            Ok(registry) => registry,
            Err(e) => {
                tracing::warn!("game list unavailable: {e}");
                return None;
            }
        };
        match registry.register(port, name).await {
            Ok(previous) => {
                tracing::info!(%registry_addr, name, ?previous, "registered with game list");
                Some(registry)
            }
            Err(e) => {
                tracing::warn!(%registry_addr, "registration failed: {e}");
                None
            }
        }
    }
}
