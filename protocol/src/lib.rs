//! Wire protocol for Fakeblok.
//!
//! JSON-RPC 2.0 over TCP, framed with `Content-Length` headers. The game
//! server, the game list and every client speak it through the
//! [`RpcClient`] and [`RpcListener`] here.

pub mod codec;
pub mod message;
pub mod methods;

mod client;
mod server;

pub use client::{RpcClient, RpcError, params};
pub use message::{RpcFault, codes, decode_params, encode_result};
pub use methods::{GameListing, PushInputParams, RegisterParams, UnregisterParams};
pub use server::{RpcListener, Service, serve_connection};
