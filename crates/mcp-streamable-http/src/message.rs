//! Minimal JSON-RPC envelope.
//!
//! The real message schema and the predicates that classify a JSON value as
//! a request/notification/response/error are owned by the MCP library
//! itself (see spec's out-of-scope external collaborators); this module
//! supplies just enough of that envelope for the transport to correlate
//! ids, detect the initialize handshake, and round-trip arbitrary
//! `params`/`result`/`error.data` payloads as opaque JSON.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// JSON-RPC request/response identifier: a number or a string, never both.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    String(String),
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestId::Number(n) => write!(f, "{n}"),
            RequestId::String(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for RequestId {
    fn from(value: i64) -> Self {
        RequestId::Number(value)
    }
}

impl From<String> for RequestId {
    fn from(value: String) -> Self {
        RequestId::String(value)
    }
}

pub const JSONRPC_VERSION: &str = "2.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: Jsonrpc2_0,
    pub id: RequestId,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: Jsonrpc2_0,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: Jsonrpc2_0,
    pub id: RequestId,
    pub result: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub jsonrpc: Jsonrpc2_0,
    pub id: RequestId,
    pub error: JsonRpcErrorObject,
}

/// Zero-sized marker that (de)serializes as the literal string `"2.0"`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Jsonrpc2_0;

impl Serialize for Jsonrpc2_0 {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(JSONRPC_VERSION)
    }
}

impl<'de> Deserialize<'de> for Jsonrpc2_0 {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        if s != JSONRPC_VERSION {
            return Err(serde::de::Error::custom(format!(
                "unsupported jsonrpc version: {s}"
            )));
        }
        Ok(Jsonrpc2_0)
    }
}

/// One JSON-RPC message, in whichever of the four shapes the wire sends.
///
/// Used symmetrically for both directions: a client-bound message (a
/// server's response/request/notification to the client) and a
/// server-bound message (the reverse) share the same representation, as is
/// common for minimal JSON-RPC implementations that do not encode the
/// direction in the type system.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcMessage {
    Request(JsonRpcRequest),
    Notification(JsonRpcNotification),
    Response(JsonRpcResponse),
    Error(JsonRpcError),
}

impl JsonRpcMessage {
    pub fn request_id(&self) -> Option<&RequestId> {
        match self {
            JsonRpcMessage::Request(r) => Some(&r.id),
            JsonRpcMessage::Notification(_) => None,
            JsonRpcMessage::Response(r) => Some(&r.id),
            JsonRpcMessage::Error(e) => Some(&e.id),
        }
    }

    pub fn is_request(&self) -> bool {
        matches!(self, JsonRpcMessage::Request(_))
    }

    /// A response or an error: the terminal reply to exactly one request.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JsonRpcMessage::Response(_) | JsonRpcMessage::Error(_))
    }

    pub fn is_initialize_request(&self) -> bool {
        matches!(self, JsonRpcMessage::Request(r) if r.method == "initialize")
    }
}

/// A single POST body is either one message or a JSON-RPC batch array.
/// Normalized immediately to `Vec<JsonRpcMessage>` (spec §4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageBatch {
    Single(JsonRpcMessage),
    Batch(Vec<JsonRpcMessage>),
}

impl MessageBatch {
    pub fn into_vec(self) -> Vec<JsonRpcMessage> {
        match self {
            MessageBatch::Single(m) => vec![m],
            MessageBatch::Batch(m) => m,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_request() {
        let batch: MessageBatch =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#)
                .unwrap();
        let messages = batch.into_vec();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].is_request());
        assert!(messages[0].is_initialize_request());
        assert_eq!(messages[0].request_id(), Some(&RequestId::Number(1)));
    }

    #[test]
    fn parses_batch_array() {
        let batch: MessageBatch = serde_json::from_str(
            r#"[{"jsonrpc":"2.0","id":1,"method":"tools/call"},{"jsonrpc":"2.0","id":2,"method":"tools/call"}]"#,
        )
        .unwrap();
        assert_eq!(batch.into_vec().len(), 2);
    }

    #[test]
    fn parses_notification_without_id() {
        let batch: MessageBatch =
            serde_json::from_str(r#"{"jsonrpc":"2.0","method":"ping"}"#).unwrap();
        let messages = batch.into_vec();
        assert!(!messages[0].is_request());
        assert_eq!(messages[0].request_id(), None);
    }

    #[test]
    fn response_is_terminal() {
        let msg = JsonRpcMessage::Response(JsonRpcResponse {
            jsonrpc: Jsonrpc2_0,
            id: RequestId::Number(1),
            result: serde_json::json!({}),
        });
        assert!(msg.is_terminal());
    }

    #[test]
    fn error_envelope_round_trips() {
        let msg = JsonRpcMessage::Error(JsonRpcError {
            jsonrpc: Jsonrpc2_0,
            id: RequestId::Number(7),
            error: JsonRpcErrorObject {
                code: -32000,
                message: "boom".into(),
                data: None,
            },
        });
        let json = serde_json::to_string(&msg).unwrap();
        let parsed: JsonRpcMessage = serde_json::from_str(&json).unwrap();
        assert!(parsed.is_terminal());
        assert_eq!(parsed.request_id(), Some(&RequestId::Number(7)));
    }
}
