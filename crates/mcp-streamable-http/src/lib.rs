//! Streamable HTTP transport core for Model Context Protocol servers.
//!
//! This crate implements the server-side half of MCP's Streamable HTTP
//! transport: one HTTP endpoint that multiplexes POST (client-to-server
//! messages), GET (a server-initiated push stream), and DELETE (session
//! teardown), with either Server-Sent Events or batched JSON responses and
//! optional resumable event replay.
//!
//! The [`Transport`] type is the whole of it — construct one per logical
//! MCP session, register callbacks with `set_on_message`/`set_on_error`/
//! `set_on_close`/`set_on_session_initialized`, call [`Transport::start`]
//! once, then feed it requests through [`Transport::handle_request`] and
//! deliver outbound messages through [`Transport::send`].
//!
//! What this crate does *not* do: define the MCP JSON-RPC method/params
//! schema (see [`message`] for the minimal envelope it uses instead), pick
//! an HTTP framework (see the optional `axum` module for one adapter), or
//! persist sessions across a process restart.

pub mod error;
pub mod event_store;
pub mod http_types;
pub mod ids;
pub mod message;
pub mod session;
pub mod sse;
mod transport;

#[cfg(feature = "axum")]
pub mod axum;

pub use event_store::{EventStore, EventStoreError, ReplaySender};
pub use ids::{EventId, SessionId, StreamId};
pub use message::{JsonRpcMessage, MessageBatch, RequestId};
pub use transport::{
    MessageExtra, OnClose, OnError, OnMessage, OnSessionInitialized, SessionIdGenerator,
    Transport, TransportConfig,
};
