//! Event Store Adapter (spec §4.3, §6.5): thin indirection over an
//! external, caller-supplied resumability backend.
//!
//! The transport never interprets event ids itself — it only ever hands one
//! back to the store (`replay_events_after`) or receives one from it
//! (`store_event`). This mirrors the teacher's own narrow-trait-at-the-seam
//! style, e.g. `SessionManager` in
//! `transport/streamable_http_server/session.rs`.

use crate::{
    ids::{EventId, StreamId},
    message::JsonRpcMessage,
    sse::{self, SseSender},
};
use async_trait::async_trait;

/// Sink handed to [`EventStore::replay_events_after`]; the store calls
/// [`ReplaySender::send`] once per historical frame, in order, either
/// synchronously or from a spawned task (spec §4.3). Writes go straight
/// onto the same SSE byte channel the live stream uses, formatted the
/// same way `Transport::send` formats a live frame.
#[derive(Clone)]
pub struct ReplaySender {
    tx: SseSender,
}

impl ReplaySender {
    pub(crate) fn new(tx: SseSender) -> Self {
        Self { tx }
    }

    /// Emit one historical event. Errors (receiver gone, i.e. the client
    /// already disconnected) are deliberately ignored here — replay races
    /// with cancellation and a dropped receiver is not a store-level
    /// failure.
    pub fn send(&self, event_id: EventId, message: JsonRpcMessage) {
        let _ = sse::write_message(&self.tx, Some(&event_id), &message);
    }
}

/// External resumability backend, consumed through exactly the two
/// operations spec §6.5 names.
#[async_trait]
pub trait EventStore: Send + Sync + 'static {
    /// Record `message` as the next event on `stream_id` and return its
    /// newly assigned, totally-ordered id. Called at most once per outbound
    /// message, in the order `send` observed them for that stream (spec
    /// §5's ordering guarantee).
    async fn store_event(
        &self,
        stream_id: StreamId,
        message: JsonRpcMessage,
    ) -> Result<EventId, EventStoreError>;

    /// Replay every event recorded after `last_event_id`, in order, through
    /// `sink`, then return the stream id under which subsequent live events
    /// for the resumed connection are to be registered.
    async fn replay_events_after(
        &self,
        last_event_id: EventId,
        sink: ReplaySender,
    ) -> Result<StreamId, EventStoreError>;
}

#[derive(Debug, thiserror::Error)]
#[error("event store error: {0}")]
pub struct EventStoreError(#[source] pub Box<dyn std::error::Error + Send + Sync>);

impl EventStoreError {
    pub fn new(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self(Box::new(source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Jsonrpc2_0, JsonRpcNotification};
    use std::sync::{
        Arc,
        atomic::{AtomicI64, Ordering},
    };
    use tokio::sync::Mutex;

    /// An in-memory store good enough to exercise the adapter contract in
    /// tests without pulling in a real backend.
    struct InMemoryEventStore {
        events: Mutex<Vec<(EventId, StreamId, JsonRpcMessage)>>,
        counter: AtomicI64,
    }

    impl InMemoryEventStore {
        fn new() -> Self {
            Self {
                events: Mutex::new(Vec::new()),
                counter: AtomicI64::new(0),
            }
        }
    }

    #[async_trait]
    impl EventStore for InMemoryEventStore {
        async fn store_event(
            &self,
            stream_id: StreamId,
            message: JsonRpcMessage,
        ) -> Result<EventId, EventStoreError> {
            let n = self.counter.fetch_add(1, Ordering::SeqCst);
            let event_id = EventId::from(format!("e{n}"));
            self.events
                .lock()
                .await
                .push((event_id.clone(), stream_id, message));
            Ok(event_id)
        }

        async fn replay_events_after(
            &self,
            last_event_id: EventId,
            sink: ReplaySender,
        ) -> Result<StreamId, EventStoreError> {
            let events = self.events.lock().await;
            let start = events
                .iter()
                .position(|(id, ..)| *id == last_event_id)
                .map(|idx| idx + 1)
                .unwrap_or(0);
            let mut last_stream = None;
            for (id, stream_id, message) in &events[start..] {
                sink.send(id.clone(), message.clone());
                last_stream = Some(stream_id.clone());
            }
            Ok(last_stream.unwrap_or_else(crate::ids::standalone_stream_id))
        }
    }

    #[tokio::test]
    async fn replay_emits_events_after_the_given_id_in_order() {
        let store = InMemoryEventStore::new();
        let stream = crate::ids::standalone_stream_id();
        let msg = |n: i64| {
            JsonRpcMessage::Notification(JsonRpcNotification {
                jsonrpc: Jsonrpc2_0,
                method: format!("m{n}"),
                params: None,
            })
        };
        let e1 = store.store_event(stream.clone(), msg(1)).await.unwrap();
        let _e2 = store.store_event(stream.clone(), msg(2)).await.unwrap();
        let _e3 = store.store_event(stream.clone(), msg(3)).await.unwrap();

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let sink = ReplaySender::new(tx);
        store.replay_events_after(e1, sink).await.unwrap();
        drop(store);

        let mut frames = Vec::new();
        while let Ok(item) = rx.try_recv() {
            frames.push(item);
        }
        assert_eq!(frames.len(), 2);
        let first = String::from_utf8(frames[0].to_vec()).unwrap();
        assert!(first.starts_with("event: message\nid: e1\n"));
        let second = String::from_utf8(frames[1].to_vec()).unwrap();
        assert!(second.starts_with("event: message\nid: e2\n"));
    }
}
