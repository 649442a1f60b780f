//! Server side of a JSON-RPC connection.
//!
//! [`RpcListener`] accepts connections and builds one [`Service`] value per
//! connection. Requests on a connection are handled concurrently so a long
//! poll never blocks a ping or an input push behind it.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;

use crate::codec::{FrameReader, FrameWriter};
use crate::message::{IncomingFrame, RpcFault, error_response, parse_incoming, success_response};

const WRITER_CHANNEL_CAPACITY: usize = 64;

/// Pause after a failed accept (e.g. file descriptor exhaustion).
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// Handles the requests of one connection.
pub trait Service: Send + Sync + 'static {
    fn handle(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> impl Future<Output = Result<Value, RpcFault>> + Send;

    /// Runs once after the connection has ended and every handler has stopped.
    fn on_disconnect(&self) -> impl Future<Output = ()> + Send {
        async {}
    }
}

pub struct RpcListener {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl RpcListener {
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("binding {addr}"))?;
        let local_addr = listener.local_addr().context("reading bound address")?;
        Ok(Self {
            listener,
            local_addr,
        })
    }

    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept connections forever, serving at most `max_connections` at once.
    ///
    /// `make_service` receives the peer address of each accepted connection.
    pub async fn serve<S, F>(self, make_service: F, max_connections: usize)
    where
        S: Service,
        F: Fn(SocketAddr) -> S,
    {
        let limit = Arc::new(Semaphore::new(max_connections.max(1)));
        loop {
            let Ok(permit) = limit.clone().acquire_owned().await else {
                break;
            };
            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    tracing::warn!(addr = %self.local_addr, "accept failed: {e}");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                    continue;
                }
            };
            tracing::debug!(addr = %self.local_addr, %peer, "accepted connection");
            let service = Arc::new(make_service(peer));
            tokio::spawn(async move {
                serve_connection(stream, service).await;
                drop(permit);
            });
        }
    }
}

/// Serve one connection until the peer hangs up or sends a broken frame.
pub async fn serve_connection<S: Service>(stream: TcpStream, service: Arc<S>) {
    let peer = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| String::from("unknown"));
    let _ = stream.set_nodelay(true);
    let (read_half, write_half) = stream.into_split();

    let (writer_tx, mut writer_rx) = mpsc::channel::<Value>(WRITER_CHANNEL_CAPACITY);
    let writer_peer = peer.clone();
    let writer_handle = tokio::spawn(async move {
        let mut writer = FrameWriter::new(write_half);
        while let Some(frame) = writer_rx.recv().await {
            if let Err(e) = writer.write_frame(&frame).await {
                tracing::debug!(peer = %writer_peer, "RPC write error: {e:#}");
                break;
            }
        }
    });

    let mut handlers = JoinSet::new();
    let mut reader = FrameReader::new(read_half);
    loop {
        while handlers.try_join_next().is_some() {}

        let frame = match reader.read_frame::<Value>().await {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                tracing::debug!(%peer, "connection closed by peer");
                break;
            }
            Err(e) => {
                tracing::warn!(%peer, "dropping connection: {e:#}");
                break;
            }
        };

        match parse_incoming(frame) {
            Some(IncomingFrame::Request { id, method, params }) => {
                let service = service.clone();
                let writer_tx = writer_tx.clone();
                handlers.spawn(async move {
                    let response = match service.handle(&method, params).await {
                        Ok(result) => success_response(id, result),
                        Err(fault) => {
                            tracing::debug!(
                                %method,
                                code = fault.code,
                                "request failed: {}",
                                fault.message
                            );
                            error_response(id, &fault)
                        }
                    };
                    let _ = writer_tx.send(response).await;
                });
            }
            Some(IncomingFrame::Notification { method, params }) => {
                let service = service.clone();
                handlers.spawn(async move {
                    if let Err(fault) = service.handle(&method, params).await {
                        tracing::debug!(%method, "notification failed: {}", fault.message);
                    }
                });
            }
            Some(IncomingFrame::Response { id, .. }) => {
                tracing::trace!(%peer, id, "ignoring response sent to a server");
            }
            None => {
                let _ = writer_tx
                    .send(error_response(Value::Null, &RpcFault::invalid_request()))
                    .await;
            }
        }
    }

    handlers.shutdown().await;
    drop(writer_tx);
    let _ = writer_handle.await;
    service.on_disconnect().await;
}
