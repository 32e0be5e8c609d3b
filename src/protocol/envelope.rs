//! JSON-RPC 2.0 envelopes
//!
//! Outgoing requests and notifications may carry extra top-level members
//! next to the reserved ones. The routing tag travels as `"target"`.

use serde_json::{json, Map, Value};
use std::sync::Arc;

use crate::error::{RemoteError, TransportError};

/// Protocol version string
pub const JSONRPC_VERSION: &str = "2.0";

/// Envelope member carrying the routing tag
pub const TARGET_KEY: &str = "target";

/// Standard error codes
pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;

const RESERVED_KEYS: [&str; 6] = ["jsonrpc", "id", "method", "params", "result", "error"];

/// An outgoing call before it is given an id
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    method: String,
    params: Option<Value>,
    extra: Map<String, Value>,
}

impl Envelope {
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            method: method.into(),
            params,
            extra: Map::new(),
        }
    }

    /// Attach an extra top-level member
    ///
    /// Reserved member names are ignored.
    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        let key = key.into();
        if !RESERVED_KEYS.contains(&key.as_str()) {
            self.extra.insert(key, value);
        }
        self
    }

    /// Attach the routing tag, if there is a non-empty one
    pub fn with_target(self, target: Option<&str>) -> Self {
        match target {
            Some(t) if !t.is_empty() => self.with_extra(TARGET_KEY, Value::from(t)),
            _ => self,
        }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn target(&self) -> Option<&str> {
        self.extra.get(TARGET_KEY).and_then(Value::as_str)
    }

    /// Wire form of a request with the given id
    pub fn to_request(&self, id: u64) -> Value {
        let mut obj = self.base();
        obj.insert("id".to_string(), Value::from(id));
        Value::Object(obj)
    }

    /// Wire form of a notification
    pub fn to_notification(&self) -> Value {
        Value::Object(self.base())
    }

    fn base(&self) -> Map<String, Value> {
        let mut obj = self.extra.clone();
        obj.insert("jsonrpc".to_string(), Value::from(JSONRPC_VERSION));
        obj.insert("method".to_string(), Value::from(self.method.as_str()));
        if let Some(params) = &self.params {
            obj.insert("params".to_string(), params.clone());
        }
        obj
    }
}

/// A decoded message from the peer
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    /// Reply to one of our requests
    Response {
        id: Value,
        outcome: Result<Value, RemoteError>,
    },
    /// Call initiated by the peer
    Request { id: Value, method: String },
    /// Fire-and-forget message from the peer
    Notification { method: String },
}

/// Decode one frame payload
pub fn parse_incoming(payload: &[u8]) -> Result<Incoming, TransportError> {
    let value: Value = serde_json::from_slice(payload)?;
    let Value::Object(mut obj) = value else {
        return Err(invalid("message is not a JSON object"));
    };

    if let Some(method) = obj.get("method") {
        let method = method
            .as_str()
            .ok_or_else(|| invalid("method is not a string"))?
            .to_string();
        return Ok(match obj.remove("id") {
            Some(id) if !id.is_null() => Incoming::Request { id, method },
            _ => Incoming::Notification { method },
        });
    }

    let id = obj.remove("id").unwrap_or(Value::Null);
    if let Some(error) = obj.remove("error").filter(|e| !e.is_null()) {
        return Ok(Incoming::Response {
            id,
            outcome: Err(parse_error_object(error)),
        });
    }
    match obj.remove("result") {
        Some(result) => Ok(Incoming::Response {
            id,
            outcome: Ok(result),
        }),
        None => Err(invalid("response has neither result nor error")),
    }
}

/// Wire form of an error reply to a peer request
pub fn error_response(id: Value, code: i64, message: &str) -> Value {
    json!({
        "jsonrpc": JSONRPC_VERSION,
        "id": id,
        "error": { "code": code, "message": message },
    })
}

fn parse_error_object(error: Value) -> RemoteError {
    match error {
        Value::Object(mut obj) => RemoteError {
            code: obj.get("code").and_then(Value::as_i64).unwrap_or(0),
            message: obj
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            data: obj.remove("data"),
        },
        // Some peers send a bare string
        Value::String(message) => RemoteError {
            code: 0,
            message,
            data: None,
        },
        other => RemoteError {
            code: 0,
            message: other.to_string(),
            data: None,
        },
    }
}

fn invalid(reason: &str) -> TransportError {
    TransportError::Json(Arc::new(<serde_json::Error as serde::de::Error>::custom(reason)))
}
