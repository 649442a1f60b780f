//! Clients of the game list's two ports.

use std::net::SocketAddr;
use std::time::Duration;

use fakeblok_protocol::methods::{games, registry};
use fakeblok_protocol::{GameListing, RegisterParams, RpcClient, RpcError, UnregisterParams, params};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Reads the game list from its listing port.
#[derive(Debug, Clone)]
pub struct GameListClient {
    rpc: RpcClient,
    timeout: Duration,
}

impl GameListClient {
    pub async fn connect(addr: SocketAddr) -> Result<Self, RpcError> {
        Ok(Self {
            rpc: RpcClient::connect(addr).await?,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Registered games, sorted by address.
    pub async fn list(&self) -> Result<Vec<GameListing>, RpcError> {
        self.rpc.call(games::LIST, None, self.timeout).await
    }
}

/// Announces a game server on the game list's registration port.
#[derive(Debug, Clone)]
pub struct RegistrationClient {
    rpc: RpcClient,
    timeout: Duration,
}

impl RegistrationClient {
    pub async fn connect(addr: SocketAddr) -> Result<Self, RpcError> {
        Ok(Self {
            rpc: RpcClient::connect(addr).await?,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Register `name` for the game on `port` of this host. Returns the name
    /// previously registered there.
    pub async fn register(&self, port: u16, name: &str) -> Result<Option<String>, RpcError> {
        let request = RegisterParams {
            port,
            name: name.to_string(),
        };
        self.rpc
            .call(registry::REGISTER, params(&request)?, self.timeout)
            .await
    }

    pub async fn unregister(&self, port: u16) -> Result<Option<String>, RpcError> {
        self.rpc
            .call(
                registry::UNREGISTER,
                params(&UnregisterParams { port })?,
                self.timeout,
            )
            .await
    }
}
