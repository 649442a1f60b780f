//! Periodic liveness checks of registered games.

use std::net::SocketAddr;
use std::sync::Weak;

use fakeblok_protocol::methods::game;
use fakeblok_protocol::{RpcClient, RpcError};

use crate::games::{HealthCheckSettings, Registry};

/// Watch the game at `addr` until it looks dead, then drop registration
/// `version` of it.
pub(crate) async fn run(
    registry: Weak<Registry>,
    addr: SocketAddr,
    version: u64,
    settings: HealthCheckSettings,
) {
    let reason = watch(addr, settings).await;

    let Some(registry) = registry.upgrade() else {
        return;
    };
    if let Some(name) = registry.remove_if_current(addr, version).await {
        tracing::info!(%addr, %name, version, reason, "unregistered unhealthy game");
    }
}

/// Returns why the game is considered gone.
async fn watch(addr: SocketAddr, settings: HealthCheckSettings) -> &'static str {
    let client = match RpcClient::connect(addr).await {
        Ok(client) => client,
        Err(e) => {
            tracing::warn!(%addr, "health check could not connect: {e}");
            return "unreachable";
        }
    };

    let mut failures = 0;
    loop {
        tokio::time::sleep(settings.interval).await;
        match client
            .call::<()>(game::PING, None, settings.interval)
            .await
        {
            Ok(()) => failures = 0,
            Err(RpcError::Disconnected) => {
                tracing::info!(%addr, "game closed the health check connection");
                return "disconnected";
            }
            Err(e) => {
                failures += 1;
                tracing::info!(%addr, failures, "unresponsive game: {e}");
                if failures >= settings.max_failed_pings {
                    return "unresponsive";
                }
            }
        }
    }
}
