//! Error taxonomy (spec §7): gate/parse/session/state errors are recovered
//! into an HTTP response, `send` errors propagate, I/O errors are swallowed
//! and reported through `on_error`.

use crate::message::RequestId;
use serde::Serialize;
use serde_json::Value;

/// A gate, parse, session, or state error: every one of these is turned
/// into a concrete `(status, JsonRpcErrorBody)` pair and returned to the
/// caller of `handle_request` — never thrown, never logged as a failure of
/// the transport itself.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("Server not initialized")]
    NotInitialized,
    #[error("Mcp-Session-Id header is required")]
    SessionIdRequired,
    #[error("Session not found")]
    SessionNotFound,
    #[error("Not Acceptable: client must accept both application/json and text/event-stream")]
    PostAcceptHeader,
    #[error("Not Acceptable: client must accept text/event-stream")]
    GetAcceptHeader,
    #[error("Unsupported Media Type: Content-Type must be application/json")]
    UnsupportedContentType,
    #[error("request body exceeds the maximum allowed size")]
    PayloadTooLarge,
    #[error("Parse error: {0}")]
    ParseError(#[source] serde_json::Error),
    #[error("Only one initialization request is allowed")]
    MultipleInitializeRequests,
    #[error("Server already initialized")]
    AlreadyInitialized,
    #[error("Only one SSE stream is allowed per session")]
    DuplicateStandaloneStream,
    #[error("Method Not Allowed")]
    MethodNotAllowed,
}

/// HTTP status + JSON-RPC error code, chosen per spec §4.2/§4.4/§6.3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateErrorStatus {
    pub http_status: u16,
    pub jsonrpc_code: i64,
}

impl GateError {
    pub fn status(&self) -> GateErrorStatus {
        use GateError::*;
        let (http_status, jsonrpc_code) = match self {
            NotInitialized => (400, -32000),
            SessionIdRequired => (400, -32000),
            SessionNotFound => (404, -32001),
            PostAcceptHeader => (406, -32000),
            GetAcceptHeader => (406, -32000),
            UnsupportedContentType => (415, -32000),
            PayloadTooLarge => (413, -32000),
            ParseError(_) => (400, -32700),
            MultipleInitializeRequests => (400, -32600),
            AlreadyInitialized => (400, -32600),
            DuplicateStandaloneStream => (409, -32000),
            MethodNotAllowed => (405, -32000),
        };
        GateErrorStatus {
            http_status,
            jsonrpc_code,
        }
    }

    /// Extra structured detail carried in the error envelope's `data` field.
    /// Only the parse-error case has one (spec §4.4: "error data =
    /// stringified cause").
    pub fn data(&self) -> Option<Value> {
        match self {
            GateError::ParseError(cause) => Some(Value::String(cause.to_string())),
            _ => None,
        }
    }

    pub fn into_envelope(self) -> JsonRpcErrorEnvelope {
        let status = self.status();
        let data = self.data();
        JsonRpcErrorEnvelope {
            jsonrpc: "2.0",
            error: JsonRpcErrorBody {
                code: status.jsonrpc_code,
                message: self.to_string(),
                data,
            },
            id: None,
        }
    }
}

/// The JSON-RPC error envelope returned as the body of every gate/parse/
/// session/state error response (spec §6.3).
#[derive(Debug, Serialize)]
pub struct JsonRpcErrorEnvelope {
    pub jsonrpc: &'static str,
    pub error: JsonRpcErrorBody,
    pub id: Option<()>,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcErrorBody {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Errors `Transport::send` propagates to its caller (spec §7(e)).
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("No stream found for request ID: {0}")]
    NoStreamForRequest(RequestId),
    #[error(
        "Cannot send a response on a standalone SSE stream unless resuming a previous client request"
    )]
    ResponseOnStandaloneStream,
}
