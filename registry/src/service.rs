use std::net::SocketAddr;
use std::sync::Arc;

use fakeblok_protocol::methods::{games, registry};
use fakeblok_protocol::{
    RegisterParams, RpcFault, Service, UnregisterParams, decode_params, encode_result,
};
use serde_json::Value;

use crate::games::Registry;

/// Registration port: games announce and withdraw themselves.
pub(crate) struct RegistrationService {
    pub(crate) peer: SocketAddr,
    pub(crate) registry: Arc<Registry>,
}

impl RegistrationService {
    /// A game is reachable at the IP it registered from.
    fn game_addr(&self, port: u16) -> SocketAddr {
        let mut addr = self.peer;
        addr.set_port(port);
        addr
    }
}

impl Service for RegistrationService {
    async fn handle(&self, method: &str, params: Option<Value>) -> Result<Value, RpcFault> {
        match method {
            registry::REGISTER => {
                let RegisterParams { port, name } = decode_params(params)?;
                let previous = self.registry.register(self.game_addr(port), name).await;
                encode_result(&previous)
            }
            registry::UNREGISTER => {
                let UnregisterParams { port } = decode_params(params)?;
                let removed = self.registry.unregister(self.game_addr(port)).await;
                encode_result(&removed)
            }
            other => Err(RpcFault::method_not_found(other)),
        }
    }
}

/// Listing port: read-only view for clients.
pub(crate) struct ListingService {
    pub(crate) registry: Arc<Registry>,
}

impl Service for ListingService {
    async fn handle(&self, method: &str, _params: Option<Value>) -> Result<Value, RpcFault> {
        match method {
            games::LIST => encode_result(&self.registry.list().await),
            other => Err(RpcFault::method_not_found(other)),
        }
    }
}
