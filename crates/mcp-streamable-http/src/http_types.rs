//! Framework-agnostic HTTP request/response shapes.
//!
//! `Transport::handle_request` neither knows about nor depends on any
//! particular HTTP server crate — the host framework is an external
//! collaborator (spec §1). These types are the narrow boundary; the `axum`
//! module converts across it.

use bytes::Bytes;
use futures::Stream;
use http::{HeaderMap, Method, StatusCode};
use std::pin::Pin;

/// Header names this transport reads or writes. Grounded in the teacher's
/// (filtered-out-of-pack, but referenced by `actix_web.rs`) `http_header`
/// module constants — `HEADER_SESSION_ID`, `HEADER_LAST_EVENT_ID`,
/// `EVENT_STREAM_MIME_TYPE`, `JSON_MIME_TYPE`.
pub const HEADER_SESSION_ID: &str = "mcp-session-id";
pub const HEADER_LAST_EVENT_ID: &str = "last-event-id";
pub const EVENT_STREAM_MIME_TYPE: &str = "text/event-stream";
pub const JSON_MIME_TYPE: &str = "application/json";

/// An inbound HTTP request, reduced to what the transport actually reads.
#[derive(Debug, Clone)]
pub struct IncomingRequest {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl IncomingRequest {
    pub fn header_str<'a>(&'a self, name: &str) -> Option<&'a str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// The body of an outgoing response.
pub enum ResponseBody {
    Empty,
    Json(Bytes),
    Sse(Pin<Box<dyn Stream<Item = Bytes> + Send>>),
}

impl std::fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResponseBody::Empty => f.write_str("ResponseBody::Empty"),
            ResponseBody::Json(b) => write!(f, "ResponseBody::Json({} bytes)", b.len()),
            ResponseBody::Sse(_) => f.write_str("ResponseBody::Sse(<stream>)"),
        }
    }
}

/// An outgoing HTTP response, framework-agnostic.
#[derive(Debug)]
pub struct OutgoingResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: ResponseBody,
}

impl OutgoingResponse {
    pub fn empty(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: ResponseBody::Empty,
        }
    }

    pub fn json(status: StatusCode, body: Bytes) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            http::header::CONTENT_TYPE,
            http::HeaderValue::from_static(JSON_MIME_TYPE),
        );
        Self {
            status,
            headers,
            body: ResponseBody::Json(body),
        }
    }

    pub fn sse(status: StatusCode, stream: Pin<Box<dyn Stream<Item = Bytes> + Send>>) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            http::header::CONTENT_TYPE,
            http::HeaderValue::from_static(EVENT_STREAM_MIME_TYPE),
        );
        headers.insert(
            http::header::CACHE_CONTROL,
            http::HeaderValue::from_static("no-cache"),
        );
        headers.insert(
            http::header::CONNECTION,
            http::HeaderValue::from_static("keep-alive"),
        );
        Self {
            status,
            headers,
            body: ResponseBody::Sse(stream),
        }
    }

    pub fn with_session_header(mut self, session_id: &str) -> Self {
        if let Ok(value) = http::HeaderValue::from_str(session_id) {
            self.headers.insert(HEADER_SESSION_ID, value);
        }
        self
    }

    pub fn with_header(mut self, name: &'static str, value: &str) -> Self {
        if let Ok(value) = http::HeaderValue::from_str(value) {
            self.headers.insert(name, value);
        }
        self
    }
}
