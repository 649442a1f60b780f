//! Client side of a JSON-RPC connection.
//!
//! One [`RpcClient`] owns a TCP connection with a writer task and a reader
//! task. Calls register a one-shot sender under their request id; the reader
//! routes each response to its sender. Clones share the connection.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::codec::{FrameReader, FrameWriter};
use crate::message::{IncomingFrame, Notification, Request, RpcFault, parse_incoming};

const WRITER_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("connection closed")]
    Disconnected,
    #[error(transparent)]
    Remote(#[from] RpcFault),
    #[error("encoding request: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("decoding response: {0}")]
    Decode(#[source] serde_json::Error),
}

impl RpcError {
    /// Whether the connection itself is gone (as opposed to one slow or failed call).
    #[must_use]
    pub fn is_disconnect(&self) -> bool {
        matches!(self, RpcError::Disconnected)
    }
}

enum WriterCommand {
    Send(Value),
    Shutdown,
}

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value, RpcFault>>>>>;

fn lock_pending(
    pending: &PendingMap,
) -> MutexGuard<'_, HashMap<u64, oneshot::Sender<Result<Value, RpcFault>>>> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Entry of one in-flight call. Dropping it (on any return path, or when the
/// call future itself is dropped) removes the entry.
struct PendingCall<'a> {
    pending: &'a PendingMap,
    id: u64,
}

impl<'a> PendingCall<'a> {
    fn register(
        pending: &'a PendingMap,
        id: u64,
    ) -> (Self, oneshot::Receiver<Result<Value, RpcFault>>) {
        let (tx, rx) = oneshot::channel();
        lock_pending(pending).insert(id, tx);
        (Self { pending, id }, rx)
    }
}

impl Drop for PendingCall<'_> {
    fn drop(&mut self) {
        lock_pending(self.pending).remove(&self.id);
    }
}

struct Connection {
    peer: SocketAddr,
    writer_tx: mpsc::Sender<WriterCommand>,
    next_id: AtomicU64,
    pending: PendingMap,
    closed: Arc<AtomicBool>,
    reader_handle: JoinHandle<()>,
    writer_handle: JoinHandle<()>,
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.reader_handle.abort();
        self.writer_handle.abort();
    }
}

#[derive(Clone)]
pub struct RpcClient {
    conn: Arc<Connection>,
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient")
            .field("peer", &self.conn.peer)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl RpcClient {
    pub async fn connect(addr: SocketAddr) -> Result<Self, RpcError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|source| RpcError::Connect { addr, source })?;
        let _ = stream.set_nodelay(true);
        Ok(Self::from_stream(stream, addr))
    }

    fn from_stream(stream: TcpStream, peer: SocketAddr) -> Self {
        let (read_half, write_half) = stream.into_split();
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let closed = Arc::new(AtomicBool::new(false));

        let (writer_tx, writer_rx) = mpsc::channel(WRITER_CHANNEL_CAPACITY);
        let writer_handle = tokio::spawn(write_loop(write_half, writer_rx, peer));
        let reader_handle = tokio::spawn(read_loop(
            read_half,
            pending.clone(),
            closed.clone(),
            peer,
        ));

        Self {
            conn: Arc::new(Connection {
                peer,
                writer_tx,
                next_id: AtomicU64::new(1),
                pending,
                closed,
                reader_handle,
                writer_handle,
            }),
        }
    }

    #[must_use]
    pub fn peer_addr(&self) -> SocketAddr {
        self.conn.peer
    }

    /// True once the reader has seen EOF or a framing error.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.conn.closed.load(Ordering::Acquire)
    }

    /// Call `method` and decode its result, failing after `timeout`.
    pub async fn call<R: DeserializeOwned>(
        &self,
        method: &'static str,
        params: Option<Value>,
        timeout: Duration,
    ) -> Result<R, RpcError> {
        let id = self.conn.next_id.fetch_add(1, Ordering::Relaxed);
        let (_entry, rx) = PendingCall::register(&self.conn.pending, id);

        // The reader drains `pending` after setting `closed`; re-check so a
        // request registered after the drain does not wait for the timeout.
        if self.is_closed() {
            return Err(RpcError::Disconnected);
        }

        let request = Request::new(id, method, params);
        let frame = serde_json::to_value(&request).map_err(RpcError::Encode)?;
        self.conn
            .writer_tx
            .send(WriterCommand::Send(frame))
            .await
            .map_err(|_| RpcError::Disconnected)?;

        let outcome = match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => return Err(RpcError::Disconnected),
            Err(_) => return Err(RpcError::Timeout(timeout)),
        };

        let value = outcome?;
        serde_json::from_value(value).map_err(RpcError::Decode)
    }

    /// Send a notification. No response is expected.
    pub async fn notify(
        &self,
        method: &'static str,
        params: Option<Value>,
    ) -> Result<(), RpcError> {
        let frame =
            serde_json::to_value(Notification::new(method, params)).map_err(RpcError::Encode)?;
        self.conn
            .writer_tx
            .send(WriterCommand::Send(frame))
            .await
            .map_err(|_| RpcError::Disconnected)
    }

    /// Stop writing; pending calls resolve once the peer closes its side.
    pub async fn close(&self) {
        let _ = self.conn.writer_tx.send(WriterCommand::Shutdown).await;
    }
}

/// Encode call params.
pub fn params<T: Serialize>(value: &T) -> Result<Option<Value>, RpcError> {
    serde_json::to_value(value)
        .map(Some)
        .map_err(RpcError::Encode)
}

async fn write_loop(
    write_half: OwnedWriteHalf,
    mut rx: mpsc::Receiver<WriterCommand>,
    peer: SocketAddr,
) {
    let mut writer = FrameWriter::new(write_half);
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WriterCommand::Send(frame) => {
                if let Err(e) = writer.write_frame(&frame).await {
                    tracing::warn!(%peer, "RPC write error: {e:#}");
                    break;
                }
            }
            WriterCommand::Shutdown => break,
        }
    }
}

async fn read_loop(
    read_half: OwnedReadHalf,
    pending: PendingMap,
    closed: Arc<AtomicBool>,
    peer: SocketAddr,
) {
    let mut reader = FrameReader::new(read_half);
    loop {
        match reader.read_frame::<Value>().await {
            Ok(Some(frame)) => route_frame(frame, &pending, peer),
            Ok(None) => {
                tracing::debug!(%peer, "RPC peer closed the connection");
                break;
            }
            Err(e) => {
                tracing::warn!(%peer, "RPC read error: {e:#}");
                break;
            }
        }
    }

    closed.store(true, Ordering::Release);
    // Dropping the senders resolves every waiting call as `Disconnected`.
    lock_pending(&pending).clear();
}

fn route_frame(frame: Value, pending: &PendingMap, peer: SocketAddr) {
    match parse_incoming(frame) {
        Some(IncomingFrame::Response { id, outcome }) => {
            let sender = lock_pending(pending).remove(&id);
            match sender {
                Some(tx) => {
                    let _ = tx.send(outcome);
                }
                None => tracing::trace!(%peer, id, "response for unknown or expired request"),
            }
        }
        Some(
            IncomingFrame::Request { method, .. } | IncomingFrame::Notification { method, .. },
        ) => {
            tracing::trace!(%peer, %method, "ignoring server-initiated message");
        }
        None => tracing::trace!(%peer, "ignoring malformed frame"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::net::TcpListener;

    /// A one-connection peer that answers each request with `respond(frame)`.
    async fn scripted_peer(
        respond: impl Fn(Value) -> Option<Value> + Send + 'static,
    ) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (r, w) = stream.into_split();
            let mut reader = FrameReader::new(r);
            let mut writer = FrameWriter::new(w);
            while let Ok(Some(frame)) = reader.read_frame::<Value>().await {
                if let Some(reply) = respond(frame) {
                    writer.write_frame(&reply).await.unwrap();
                }
            }
        });
        addr
    }

    #[tokio::test]
    async fn call_decodes_result() {
        let addr = scripted_peer(|req| {
            Some(json!({"jsonrpc": "2.0", "id": req["id"], "result": req["params"]["n"]}))
        })
        .await;
        let client = RpcClient::connect(addr).await.unwrap();
        let n: u32 = client
            .call("echo", Some(json!({"n": 7})), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(n, 7);
    }

    #[tokio::test]
    async fn remote_error_is_surfaced() {
        let addr = scripted_peer(|req| {
            Some(json!({
                "jsonrpc": "2.0",
                "id": req["id"],
                "error": {"code": -32601, "message": "Method not found: nope"}
            }))
        })
        .await;
        let client = RpcClient::connect(addr).await.unwrap();
        let err = client
            .call::<Value>("nope", None, Duration::from_secs(5))
            .await
            .unwrap_err();
        match err {
            RpcError::Remote(fault) => assert_eq!(fault.code, -32601),
            other => panic!("expected remote error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn silent_peer_times_out_and_pending_is_cleared() {
        let addr = scripted_peer(|_| None).await;
        let client = RpcClient::connect(addr).await.unwrap();
        let err = client
            .call::<Value>("game/ping", None, Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, RpcError::Timeout(_)));
        assert!(lock_pending(&client.conn.pending).is_empty());
        assert!(!client.is_closed());
    }

    #[tokio::test]
    async fn dropped_call_releases_its_pending_entry() {
        let addr = scripted_peer(|_| None).await;
        let client = RpcClient::connect(addr).await.unwrap();

        // The outer timeout drops the call future while it is still waiting.
        let abandoned = tokio::time::timeout(
            Duration::from_millis(50),
            client.call::<Value>("game/pollGameState", None, Duration::from_secs(5)),
        )
        .await;
        assert!(abandoned.is_err());
        assert!(lock_pending(&client.conn.pending).is_empty());
    }

    #[tokio::test]
    async fn notification_has_no_id_and_gets_no_reply() {
        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
        let addr = scripted_peer(move |frame| {
            let _ = seen_tx.send(frame);
            None
        })
        .await;
        let client = RpcClient::connect(addr).await.unwrap();
        client.notify("game/ping", Some(json!({"n": 1}))).await.unwrap();

        let frame = seen_rx.recv().await.unwrap();
        assert_eq!(frame["method"], "game/ping");
        assert_eq!(frame["params"]["n"], 1);
        assert!(frame.get("id").is_none());
        assert!(lock_pending(&client.conn.pending).is_empty());
    }

    #[tokio::test]
    async fn peer_hangup_fails_calls_as_disconnected() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut reader = FrameReader::new(stream);
            // Read one request, then hang up without answering.
            let _ = reader.read_frame::<Value>().await;
        });

        let client = RpcClient::connect(addr).await.unwrap();
        let err = client
            .call::<Value>("game/ping", None, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(err.is_disconnect(), "got {err:?}");
        assert!(client.is_closed());

        let err = client
            .call::<Value>("game/ping", None, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(err.is_disconnect());
    }

    #[tokio::test]
    async fn connect_failure_names_the_address() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let err = RpcClient::connect(addr).await.unwrap_err();
        assert!(err.to_string().contains(&addr.to_string()));
    }

    #[tokio::test]
    async fn request_ids_increase() {
        let addr = scripted_peer(|req| {
            Some(json!({"jsonrpc": "2.0", "id": req["id"], "result": req["id"]}))
        })
        .await;
        let client = RpcClient::connect(addr).await.unwrap();
        let first: u64 = client.call("id", None, Duration::from_secs(5)).await.unwrap();
        let second: u64 = client.call("id", None, Duration::from_secs(5)).await.unwrap();
        assert_eq!((first, second), (1, 2));
    }
}
