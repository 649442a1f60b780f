//! JSON-RPC 2.0 envelopes and error objects.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";

/// Standard and application error codes carried in [`RpcFault::code`].
pub mod codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;
    /// The connection's entity no longer exists in the game.
    pub const UNKNOWN_ENTITY: i64 = -32001;
}

#[derive(Debug, Serialize)]
pub(crate) struct Request {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Request {
    pub fn new(id: u64, method: &'static str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            method,
            params,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct Notification {
    pub jsonrpc: &'static str,
    pub method: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Notification {
    pub fn new(method: &'static str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            method,
            params,
        }
    }
}

/// Error object returned by a remote handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("remote error {code}: {message}")]
pub struct RpcFault {
    pub code: i64,
    pub message: String,
}

impl RpcFault {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(codes::METHOD_NOT_FOUND, format!("Method not found: {method}"))
    }

    pub fn invalid_params(detail: impl std::fmt::Display) -> Self {
        Self::new(codes::INVALID_PARAMS, format!("Invalid params: {detail}"))
    }

    pub fn invalid_request() -> Self {
        Self::new(codes::INVALID_REQUEST, "Invalid request")
    }

    pub fn internal(detail: impl std::fmt::Display) -> Self {
        Self::new(codes::INTERNAL_ERROR, detail.to_string())
    }
}

pub(crate) fn success_response(id: Value, result: Value) -> Value {
    serde_json::json!({
        "jsonrpc": JSONRPC_VERSION,
        "id": id,
        "result": result,
    })
}

pub(crate) fn error_response(id: Value, fault: &RpcFault) -> Value {
    serde_json::json!({
        "jsonrpc": JSONRPC_VERSION,
        "id": id,
        "error": fault,
    })
}

/// A decoded frame, classified by which JSON-RPC members it carries.
#[derive(Debug)]
pub(crate) enum IncomingFrame {
    Response {
        id: u64,
        outcome: Result<Value, RpcFault>,
    },
    Request {
        id: Value,
        method: String,
        params: Option<Value>,
    },
    Notification {
        method: String,
        params: Option<Value>,
    },
}

pub(crate) fn parse_incoming(frame: Value) -> Option<IncomingFrame> {
    let Value::Object(mut obj) = frame else {
        return None;
    };
    let id = obj.remove("id");
    let method = match obj.remove("method") {
        Some(Value::String(m)) => Some(m),
        Some(_) => return None,
        None => None,
    };
    let params = obj.remove("params");

    match (id, method) {
        (Some(id), None) => {
            let id = id.as_u64()?;
            let outcome = if let Some(error) = obj.remove("error") {
                Err(serde_json::from_value(error).ok()?)
            } else {
                Ok(obj.remove("result")?)
            };
            Some(IncomingFrame::Response { id, outcome })
        }
        (Some(id), Some(method)) => Some(IncomingFrame::Request { id, method, params }),
        (None, Some(method)) => Some(IncomingFrame::Notification { method, params }),
        (None, None) => None,
    }
}

/// Decode request params into `T`. Absent params decode as JSON `null`.
pub fn decode_params<T: DeserializeOwned>(params: Option<Value>) -> Result<T, RpcFault> {
    serde_json::from_value(params.unwrap_or(Value::Null)).map_err(RpcFault::invalid_params)
}

/// Encode a handler result.
pub fn encode_result<T: Serialize>(value: &T) -> Result<Value, RpcFault> {
    serde_json::to_value(value).map_err(RpcFault::internal)
}
