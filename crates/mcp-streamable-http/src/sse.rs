//! SSE Writer (spec §4.1): formats one frame per message and enqueues it
//! into a stream's byte channel.
//!
//! Frames are built as raw bytes rather than through a higher-level SSE
//! helper type so that the wire format matches spec §6.2 literally (and so
//! that a replay frame's `id:` line lines up exactly with the event id the
//! `EventStore` assigned) — the same approach the teacher takes in
//! `streamable_http_server/actix_web.rs`, which hand-builds `event: message
//! \n...\ndata: ...\n\n` strings rather than reaching for a framework SSE
//! type.

use crate::{ids::EventId, message::JsonRpcMessage};
use bytes::Bytes;
use tokio::sync::mpsc;

/// The send-half of one SSE body's byte channel. Cloning is cheap; cloned
/// handles all enqueue onto the same underlying stream.
pub type SseSender = mpsc::UnboundedSender<Bytes>;

#[derive(Debug, thiserror::Error)]
#[error("SSE controller is closed")]
pub struct SseWriteError;

/// Format and enqueue one `event: message` frame.
///
/// Returns `Err(SseWriteError)` if the controller's receiver has already
/// been dropped (consumer gone, stream already closed) — callers must
/// catch this and surface it via `on_error`, per spec §4.1; it must never
/// propagate out of `send`.
pub fn write_message(
    sender: &SseSender,
    event_id: Option<&EventId>,
    message: &JsonRpcMessage,
) -> Result<(), SseWriteError> {
    let data = serde_json::to_string(message).unwrap_or_else(|_| "{}".to_string());
    let mut frame = String::with_capacity(data.len() + 32);
    frame.push_str("event: message\n");
    if let Some(id) = event_id {
        frame.push_str("id: ");
        frame.push_str(id.as_str());
        frame.push('\n');
    }
    frame.push_str("data: ");
    frame.push_str(&data);
    frame.push_str("\n\n");
    sender.send(Bytes::from(frame)).map_err(|_| SseWriteError)
}

/// A `: comment\n\n` keep-alive frame, sent on an idle timer to stop
/// intermediary proxies from closing a long-lived SSE connection.
pub fn keep_alive_frame() -> Bytes {
    Bytes::from_static(b": ping\n\n")
}
