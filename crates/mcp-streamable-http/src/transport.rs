//! Request Router + Stream/Response Multiplexer (spec §4.4, §4.5) — the
//! core of this crate.
//!
//! [`Transport`] owns every correlation map described in spec §3, gates and
//! dispatches `POST`/`GET`/`DELETE` per spec §4.4, and implements the
//! completion state machine of spec §4.5/§9: a `streamId`'s sink is a
//! tagged variant ([`StreamSink`]) rather than two parallel maps, so `send`
//! branches once, at completion time, exactly as the design notes prescribe.

use crate::{
    error::{GateError, SendError},
    event_store::{EventStore, ReplaySender},
    http_types::{
        EVENT_STREAM_MIME_TYPE, HEADER_LAST_EVENT_ID, HEADER_SESSION_ID, IncomingRequest,
        JSON_MIME_TYPE, OutgoingResponse,
    },
    ids::{EventId, SessionId, StreamId, standalone_stream_id},
    message::{JsonRpcMessage, MessageBatch, RequestId},
    session::{SessionState, validate_session},
    sse::{self, SseSender},
};
use bytes::Bytes;
use futures::{Stream, future::BoxFuture};
use http::{Method, StatusCode};
use std::{collections::HashMap, pin::Pin, sync::Arc, time::Duration};
use tokio::sync::{Mutex, RwLock, mpsc, oneshot};

/// Produces a session id for a fresh initialize handshake. Presence of this
/// in [`TransportConfig`] is what makes the transport *stateful* (spec
/// §3, §6.6).
pub type SessionIdGenerator = Arc<dyn Fn() -> SessionId + Send + Sync>;

/// Extra context delivered alongside every dispatched inbound message
/// (spec §6.4): the opaque, host-attached auth info for this request.
pub struct MessageExtra<A> {
    pub auth_info: Option<A>,
}

pub type OnMessage<A> =
    Arc<dyn Fn(JsonRpcMessage, MessageExtra<A>) -> BoxFuture<'static, ()> + Send + Sync>;
pub type OnError = Arc<dyn Fn(String) + Send + Sync>;
pub type OnClose = Arc<dyn Fn() + Send + Sync>;
pub type OnSessionInitialized = Arc<dyn Fn(SessionId) + Send + Sync>;

/// Construction-time options (spec §6.6) plus the ambient tunables SPEC_FULL
/// §4.7 adds: keep-alive cadence and the configurable size gate.
#[derive(Clone)]
pub struct TransportConfig {
    pub session_id_generator: Option<SessionIdGenerator>,
    pub enable_json_response: bool,
    pub event_store: Option<Arc<dyn EventStore>>,
    pub sse_keep_alive: Option<Duration>,
    pub max_body_bytes: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            session_id_generator: Some(Arc::new(SessionId::new_random)),
            enable_json_response: false,
            event_store: None,
            sse_keep_alive: Some(Duration::from_secs(15)),
            max_body_bytes: 4 * 1024 * 1024,
        }
    }
}

impl std::fmt::Debug for TransportConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportConfig")
            .field("stateful", &self.session_id_generator.is_some())
            .field("enable_json_response", &self.enable_json_response)
            .field("resumable", &self.event_store.is_some())
            .field("sse_keep_alive", &self.sse_keep_alive)
            .field("max_body_bytes", &self.max_body_bytes)
            .finish()
    }
}

/// The sink addressed by a `streamId`: either a live SSE byte channel, or a
/// one-shot JSON-mode response resolver. See spec §9's design note.
enum StreamSink {
    Sse(SseSender),
    Json(oneshot::Sender<OutgoingResponse>),
}

#[derive(Default)]
struct Inner {
    session: SessionState,
    streams: HashMap<StreamId, StreamSink>,
    request_to_stream: HashMap<RequestId, StreamId>,
    request_to_response: HashMap<RequestId, JsonRpcMessage>,
    /// Discovery order of request ids per stream, used to assemble a
    /// stable JSON-mode batch body and to detect "all responses ready".
    stream_request_order: HashMap<StreamId, Vec<RequestId>>,
}

struct Callbacks<A> {
    on_message: Option<OnMessage<A>>,
    on_error: Option<OnError>,
    on_close: Option<OnClose>,
    on_session_initialized: Option<OnSessionInitialized>,
}

impl<A> Default for Callbacks<A> {
    fn default() -> Self {
        Self {
            on_message: None,
            on_error: None,
            on_close: None,
            on_session_initialized: None,
        }
    }
}

/// The request-to-stream multiplexer: one instance per logical MCP
/// session/connection (spec §5, "a single instance is typically bound to
/// one logical session").
///
/// Generic over `A`, the opaque auth-info type attached to every dispatched
/// message (spec treats auth as an external collaborator's concern, so the
/// core never inspects it).
pub struct Transport<A = ()> {
    config: TransportConfig,
    inner: Arc<Mutex<Inner>>,
    callbacks: Arc<RwLock<Callbacks<A>>>,
}

impl<A> Clone for Transport<A> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            inner: self.inner.clone(),
            callbacks: self.callbacks.clone(),
        }
    }
}

impl<A> Transport<A>
where
    A: Clone + Send + Sync + 'static,
{
    pub fn new(config: TransportConfig) -> Self {
        Self {
            config,
            inner: Arc::new(Mutex::new(Inner::default())),
            callbacks: Arc::new(RwLock::new(Callbacks::default())),
        }
    }

    pub async fn set_on_message(
        &self,
        f: impl Fn(JsonRpcMessage, MessageExtra<A>) -> BoxFuture<'static, ()> + Send + Sync + 'static,
    ) {
        self.callbacks.write().await.on_message = Some(Arc::new(f));
    }

    pub async fn set_on_error(&self, f: impl Fn(String) + Send + Sync + 'static) {
        self.callbacks.write().await.on_error = Some(Arc::new(f));
    }

    pub async fn set_on_close(&self, f: impl Fn() + Send + Sync + 'static) {
        self.callbacks.write().await.on_close = Some(Arc::new(f));
    }

    pub async fn set_on_session_initialized(&self, f: impl Fn(SessionId) + Send + Sync + 'static) {
        self.callbacks.write().await.on_session_initialized = Some(Arc::new(f));
    }

    /// Idempotent-guarded start (spec §4.6): a second call fails. Performs
    /// no I/O — connections in this transport are per-request.
    pub async fn start(&self) -> Result<(), &'static str> {
        let mut inner = self.inner.lock().await;
        if inner.session.started {
            return Err("Transport already started");
        }
        inner.session.started = true;
        Ok(())
    }

    /// Closes every registered stream (tolerating already-closed), clears
    /// all correlation state, and invokes `on_close` (spec §4.6).
    pub async fn close(&self) {
        let (streams, session_id) = {
            let mut inner = self.inner.lock().await;
            let session_id = inner.session.session_id.clone();
            inner.session.closed = true;
            inner.session.reset_session_only();
            let streams = std::mem::take(&mut inner.streams);
            inner.request_to_stream.clear();
            inner.request_to_response.clear();
            inner.stream_request_order.clear();
            (streams, session_id)
        };
        if let Some(session_id) = &session_id {
            tracing::info!(%session_id, "session closed");
        }
        for (_, sink) in streams {
            match sink {
                StreamSink::Sse(tx) => drop(tx),
                StreamSink::Json(resolver) => {
                    let _ = resolver.send(OutgoingResponse::empty(StatusCode::SERVICE_UNAVAILABLE));
                }
            }
        }
        if let Some(cb) = self.callbacks.read().await.on_close.clone() {
            cb();
        }
    }

    async fn report_error(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::error!(%message, "streamable http transport error");
        if let Some(cb) = self.callbacks.read().await.on_error.clone() {
            cb(message);
        }
    }

    fn stateful(&self) -> bool {
        self.config.session_id_generator.is_some()
    }

    async fn assign_event_id(&self, stream_id: &StreamId, message: &JsonRpcMessage) -> Option<EventId> {
        let store = self.config.event_store.clone()?;
        match store.store_event(stream_id.clone(), message.clone()).await {
            Ok(id) => Some(id),
            Err(err) => {
                self.report_error(format!("event store failed to record event: {err}"))
                    .await;
                None
            }
        }
    }

    fn format_sse_stream(
        &self,
        rx: mpsc::UnboundedReceiver<Bytes>,
    ) -> Pin<Box<dyn Stream<Item = Bytes> + Send>> {
        let keep_alive = self.config.sse_keep_alive;
        Box::pin(async_stream::stream! {
            let mut rx = rx;
            let mut ticker = keep_alive.map(tokio::time::interval);
            loop {
                tokio::select! {
                    frame = rx.recv() => {
                        match frame {
                            Some(frame) => yield frame,
                            None => break,
                        }
                    }
                    _ = async {
                        match ticker.as_mut() {
                            Some(t) => { t.tick().await; }
                            None => std::future::pending::<()>().await,
                        }
                    } => {
                        yield sse::keep_alive_frame();
                    }
                }
            }
        })
    }

    /// Builds the formatted SSE body for `stream_id` and wraps it so that
    /// the consumer dropping the body (disconnecting, or the host's
    /// readable-stream cancel hook firing) deregisters the stream — spec
    /// §4.5 and §5's cancellation clause.
    fn sse_body(
        &self,
        stream_id: StreamId,
        rx: mpsc::UnboundedReceiver<Bytes>,
    ) -> Pin<Box<dyn Stream<Item = Bytes> + Send>> {
        Box::pin(CancelOnDrop {
            inner: self.format_sse_stream(rx),
            transport: self.clone(),
            stream_id,
        })
    }

    /// Single entry point (spec §1): branches on HTTP method, applies every
    /// gate, and returns the HTTP response — immediately for JSON/error
    /// responses, or with a live SSE body for streaming responses.
    pub async fn handle_request(&self, request: IncomingRequest, auth_info: Option<A>) -> OutgoingResponse {
        let result = match request.method {
            Method::POST => self.handle_post(request, auth_info).await,
            Method::GET => self.handle_get(request).await,
            Method::DELETE => self.handle_delete(request).await,
            _ => Err(GateError::MethodNotAllowed),
        };
        match result {
            Ok(response) => response,
            Err(err) => self.gate_error_response(err),
        }
    }

    fn gate_error_response(&self, err: GateError) -> OutgoingResponse {
        // Rejected sessions and state conflicts are warnings (a misbehaving
        // or confused client); malformed input and routing mismatches are
        // just debug noise, matching the severities `actix_web.rs` assigns
        // (`tracing::warn!` on "Session not found", `tracing::debug!` on
        // everything else leading up to a gate rejection).
        match &err {
            GateError::SessionNotFound
            | GateError::SessionIdRequired
            | GateError::NotInitialized
            | GateError::AlreadyInitialized
            | GateError::MultipleInitializeRequests
            | GateError::DuplicateStandaloneStream => {
                tracing::warn!(error = %err, "request rejected");
            }
            _ => {
                tracing::debug!(error = %err, "request rejected");
            }
        }
        let method_not_allowed = matches!(err, GateError::MethodNotAllowed);
        let status = err.status();
        let body = serde_json::to_vec(&err.into_envelope()).unwrap_or_else(|_| b"{}".to_vec());
        let mut response = OutgoingResponse::json(
            StatusCode::from_u16(status.http_status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            Bytes::from(body),
        );
        if method_not_allowed {
            response = response.with_header("allow", "GET, POST, DELETE");
        }
        response
    }

    // ---- POST -----------------------------------------------------------

    async fn handle_post(
        &self,
        request: IncomingRequest,
        auth_info: Option<A>,
    ) -> Result<OutgoingResponse, GateError> {
        let accept = request.header_str("accept").unwrap_or_default();
        if !(accept.contains(JSON_MIME_TYPE) && accept.contains(EVENT_STREAM_MIME_TYPE)) {
            return Err(GateError::PostAcceptHeader);
        }

        let content_type = request.header_str("content-type").unwrap_or_default();
        if !content_type.contains(JSON_MIME_TYPE) {
            return Err(GateError::UnsupportedContentType);
        }

        if request.body.len() > self.config.max_body_bytes {
            return Err(GateError::PayloadTooLarge);
        }

        let batch: MessageBatch =
            serde_json::from_slice(&request.body).map_err(GateError::ParseError)?;
        let messages = batch.into_vec();

        let has_initialize = messages.iter().any(JsonRpcMessage::is_initialize_request);
        let header_session_id = request.header_str(HEADER_SESSION_ID).map(str::to_owned);
        tracing::debug!(
            message_count = messages.len(),
            has_initialize,
            session_id = header_session_id.as_deref(),
            "POST request with message"
        );

        // One critical section covers validation and every mutation that
        // must be atomic with it (initialize bookkeeping, stream
        // registration) — see SPEC_FULL §5.
        let mut inner = self.inner.lock().await;

        let session_id = if has_initialize {
            if messages.len() > 1 {
                return Err(GateError::MultipleInitializeRequests);
            }
            if self.stateful() && inner.session.initialized {
                return Err(GateError::AlreadyInitialized);
            }
            let session_id = self
                .config
                .session_id_generator
                .as_ref()
                .map(|generate| generate());
            inner.session.session_id = session_id.clone();
            inner.session.initialized = true;
            if let Some(session_id) = &session_id {
                tracing::info!(%session_id, "session established");
            }
            session_id
        } else {
            validate_session(
                self.stateful(),
                &inner.session,
                header_session_id.as_deref(),
            )?;
            inner.session.session_id.clone()
        };

        let has_request = messages.iter().any(JsonRpcMessage::is_request);

        if !has_request {
            drop(inner);
            if has_initialize {
                self.notify_session_initialized(session_id.clone()).await;
            }
            for message in messages {
                self.dispatch_one(message, auth_info.clone()).await;
            }
            return Ok(OutgoingResponse::empty(StatusCode::ACCEPTED));
        }

        let stream_id = StreamId::new_random();
        let mut order = Vec::new();
        for message in &messages {
            if let JsonRpcMessage::Request(req) = message {
                inner
                    .request_to_stream
                    .insert(req.id.clone(), stream_id.clone());
                order.push(req.id.clone());
            }
        }
        inner.stream_request_order.insert(stream_id.clone(), order);

        let response = if self.config.enable_json_response {
            let (tx, rx) = oneshot::channel();
            inner.streams.insert(stream_id.clone(), StreamSink::Json(tx));
            drop(inner);
            tracing::debug!(%stream_id, "stream opened (json-mode)");
            self.spawn_dispatch(messages, auth_info, has_initialize, session_id.clone());
            rx.await
                .unwrap_or_else(|_| OutgoingResponse::empty(StatusCode::INTERNAL_SERVER_ERROR))
        } else {
            let (tx, rx) = mpsc::unbounded_channel();
            inner.streams.insert(stream_id.clone(), StreamSink::Sse(tx));
            drop(inner);
            tracing::debug!(%stream_id, "stream opened (sse)");
            let body = self.sse_body(stream_id.clone(), rx);
            let mut response = OutgoingResponse::sse(StatusCode::OK, body);
            if let Some(session_id) = &session_id {
                response = response.with_session_header(session_id.as_str());
            }
            self.spawn_dispatch(messages, auth_info, has_initialize, session_id.clone());
            response
        };

        Ok(response)
    }

    async fn notify_session_initialized(&self, session_id: Option<SessionId>) {
        if let Some(session_id) = session_id {
            if let Some(cb) = self.callbacks.read().await.on_session_initialized.clone() {
                cb(session_id);
            }
        }
    }

    /// Schedules delivery of every message in this payload to `on_message`,
    /// deferred past the point the caller returns the HTTP response (spec
    /// §5's load-bearing yield — see SPEC_FULL §5).
    fn spawn_dispatch(
        &self,
        messages: Vec<JsonRpcMessage>,
        auth_info: Option<A>,
        has_initialize: bool,
        session_id: Option<SessionId>,
    ) {
        let this = self.clone();
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            if has_initialize {
                this.notify_session_initialized(session_id).await;
            }
            for message in messages {
                this.dispatch_one(message, auth_info.clone()).await;
            }
        });
    }

    async fn dispatch_one(&self, message: JsonRpcMessage, auth_info: Option<A>) {
        if self.inner.lock().await.session.closed {
            tracing::debug!("transport closed before dispatch; dropping inbound message");
            return;
        }
        let on_message = self.callbacks.read().await.on_message.clone();
        if let Some(on_message) = on_message {
            on_message(message, MessageExtra { auth_info }).await;
        }
    }

    // ---- GET --------------------------------------------------------------

    async fn handle_get(&self, request: IncomingRequest) -> Result<OutgoingResponse, GateError> {
        let accept = request.header_str("accept").unwrap_or_default();
        if !accept.contains(EVENT_STREAM_MIME_TYPE) {
            return Err(GateError::GetAcceptHeader);
        }

        let header_session_id = request.header_str(HEADER_SESSION_ID).map(str::to_owned);
        tracing::debug!(session_id = header_session_id.as_deref(), "GET request for SSE stream");
        let (session_id, last_event_id) = {
            let inner = self.inner.lock().await;
            validate_session(
                self.stateful(),
                &inner.session,
                header_session_id.as_deref(),
            )?;
            (
                inner.session.session_id.clone(),
                request.header_str(HEADER_LAST_EVENT_ID).map(str::to_owned),
            )
        };

        if let (Some(last_event_id), Some(store)) = (last_event_id, self.config.event_store.clone())
        {
            tracing::debug!(
                session_id = session_id.as_ref().map(SessionId::as_str),
                %last_event_id,
                "resuming stream from last event"
            );
            return self.resume_stream(store, last_event_id, session_id).await;
        }

        let mut inner = self.inner.lock().await;
        let standalone = standalone_stream_id();
        if inner.streams.contains_key(&standalone) {
            return Err(GateError::DuplicateStandaloneStream);
        }
        let (tx, rx) = mpsc::unbounded_channel();
        inner.streams.insert(standalone.clone(), StreamSink::Sse(tx));
        drop(inner);
        tracing::debug!("creating standalone stream");

        let body = self.sse_body(standalone, rx);
        let mut response = OutgoingResponse::sse(StatusCode::OK, body);
        if let Some(session_id) = &session_id {
            response = response.with_session_header(session_id.as_str());
        }
        Ok(response)
    }

    async fn resume_stream(
        &self,
        store: Arc<dyn EventStore>,
        last_event_id: String,
        session_id: Option<SessionId>,
    ) -> Result<OutgoingResponse, GateError> {
        let (tx, rx) = mpsc::unbounded_channel::<Bytes>();
        let sink = ReplaySender::new(tx.clone());
        let new_stream_id = match store
            .replay_events_after(EventId::from(last_event_id), sink)
            .await
        {
            Ok(id) => id,
            Err(err) => {
                self.report_error(format!("event store replay failed: {err}"))
                    .await;
                return Ok(OutgoingResponse::json(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Bytes::from_static(
                        br#"{"jsonrpc":"2.0","error":{"code":-32000,"message":"replay failed"},"id":null}"#,
                    ),
                ));
            }
        };

        {
            let mut inner = self.inner.lock().await;
            inner
                .streams
                .insert(new_stream_id.clone(), StreamSink::Sse(tx));
        }

        let body = self.sse_body(new_stream_id, rx);
        let mut response = OutgoingResponse::sse(StatusCode::OK, body);
        if let Some(session_id) = &session_id {
            response = response.with_session_header(session_id.as_str());
        }
        Ok(response)
    }

    // ---- DELETE -------------------------------------------------------

    async fn handle_delete(&self, request: IncomingRequest) -> Result<OutgoingResponse, GateError> {
        let header_session_id = request.header_str(HEADER_SESSION_ID).map(str::to_owned);
        tracing::debug!(
            session_id = header_session_id.as_deref(),
            "DELETE request to close session"
        );
        {
            let inner = self.inner.lock().await;
            validate_session(
                self.stateful(),
                &inner.session,
                header_session_id.as_deref(),
            )?;
        }
        self.close().await;
        Ok(OutgoingResponse::empty(StatusCode::OK))
    }

    // ---- send -----------------------------------------------------------

    /// Stream/Response Multiplexer's write path (spec §4.5). `message` is a
    /// response/error (its own `id` is authoritative) or a server-initiated
    /// request/notification (correlated via `related_request_id`, or
    /// `None` for the standalone stream).
    pub async fn send(
        &self,
        message: JsonRpcMessage,
        related_request_id: Option<RequestId>,
    ) -> Result<(), SendError> {
        let effective_request_id = if message.is_terminal() {
            message.request_id().cloned()
        } else {
            related_request_id
        };

        let Some(request_id) = effective_request_id else {
            return self.send_standalone(message).await;
        };

        let stream_id = {
            let inner = self.inner.lock().await;
            inner.request_to_stream.get(&request_id).cloned()
        };
        let Some(stream_id) = stream_id else {
            return Err(SendError::NoStreamForRequest(request_id));
        };

        let sse_sender = {
            let inner = self.inner.lock().await;
            match inner.streams.get(&stream_id) {
                Some(StreamSink::Sse(tx)) => Some(tx.clone()),
                _ => None,
            }
        };
        if let Some(sender) = sse_sender {
            let event_id = self.assign_event_id(&stream_id, &message).await;
            if sse::write_message(&sender, event_id.as_ref(), &message).is_err() {
                self.report_error("SSE controller closed; dropping frame")
                    .await;
            }
        }

        if !message.is_terminal() {
            return Ok(());
        }

        self.complete_stream_if_ready(stream_id, request_id, message)
            .await;
        Ok(())
    }

    async fn send_standalone(&self, message: JsonRpcMessage) -> Result<(), SendError> {
        if message.is_terminal() {
            return Err(SendError::ResponseOnStandaloneStream);
        }
        let standalone = standalone_stream_id();
        let sender = {
            let inner = self.inner.lock().await;
            match inner.streams.get(&standalone) {
                Some(StreamSink::Sse(tx)) => Some(tx.clone()),
                _ => None,
            }
        };
        let Some(sender) = sender else {
            tracing::debug!("no standalone SSE stream registered; dropping message");
            return Ok(());
        };
        let event_id = self.assign_event_id(&standalone, &message).await;
        if sse::write_message(&sender, event_id.as_ref(), &message).is_err() {
            self.report_error("standalone SSE controller closed; dropping frame")
                .await;
        }
        Ok(())
    }

    /// Spec §4.5's completion transition: once every request id mapped to
    /// `stream_id` has a buffered terminal response, resolve the JSON-mode
    /// promise or close the SSE controller, then unregister everything.
    async fn complete_stream_if_ready(
        &self,
        stream_id: StreamId,
        request_id: RequestId,
        message: JsonRpcMessage,
    ) {
        let mut inner = self.inner.lock().await;
        inner.request_to_response.insert(request_id, message);

        let order = inner
            .stream_request_order
            .get(&stream_id)
            .cloned()
            .unwrap_or_default();
        let all_ready = order
            .iter()
            .all(|id| inner.request_to_response.contains_key(id));
        if !all_ready {
            return;
        }

        let responses: Vec<JsonRpcMessage> = order
            .iter()
            .filter_map(|id| inner.request_to_response.get(id).cloned())
            .collect();
        let sink = inner.streams.remove(&stream_id);
        for id in &order {
            inner.request_to_response.remove(id);
            inner.request_to_stream.remove(id);
        }
        inner.stream_request_order.remove(&stream_id);
        let session_id = inner.session.session_id.clone();
        drop(inner);

        match sink {
            Some(StreamSink::Json(resolver)) => {
                let body = if responses.len() == 1 {
                    serde_json::to_vec(&responses[0])
                } else {
                    serde_json::to_vec(&responses)
                }
                .unwrap_or_else(|_| b"{}".to_vec());
                let mut response = OutgoingResponse::json(StatusCode::OK, Bytes::from(body));
                if let Some(session_id) = &session_id {
                    response = response.with_session_header(session_id.as_str());
                }
                tracing::debug!(%stream_id, "stream closed (json-mode response resolved)");
                let _ = resolver.send(response);
            }
            Some(StreamSink::Sse(sender)) => {
                // Dropping the sender closes the channel, which ends the
                // SSE body stream — "close" by absence of a producer.
                tracing::debug!(%stream_id, "stream closed (sse)");
                drop(sender);
            }
            None => {
                // Consumer cancellation already removed the stream; the
                // terminal response was still recorded above so nothing is
                // lost, there is just nothing left to notify.
                tracing::debug!(%stream_id, "stream already gone at completion; response buffered and dropped");
            }
        }
    }

    /// Deregisters a stream on consumer cancellation (spec §4.5 state
    /// machine: Open -> Closed directly, outside the completion path).
    /// Call this from the host's SSE body "on cancel" hook.
    pub async fn cancel_stream(&self, stream_id: &StreamId) {
        let mut inner = self.inner.lock().await;
        if inner.streams.remove(stream_id).is_some() {
            tracing::debug!(%stream_id, "stream orphaned (consumer disconnected)");
        }
    }
}

/// Wraps an SSE body stream so that the host dropping it — the HTTP
/// client disconnected, or the framework cancelled the response body —
/// deregisters `stream_id` from the multiplexer. Without this, a
/// disconnected SSE consumer would leave its stream (and any requests
/// still mapped to it) registered forever.
struct CancelOnDrop<A> {
    inner: Pin<Box<dyn Stream<Item = Bytes> + Send>>,
    transport: Transport<A>,
    stream_id: StreamId,
}

impl<A> Stream for CancelOnDrop<A> {
    type Item = Bytes;

    fn poll_next(
        mut self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl<A> Drop for CancelOnDrop<A>
where
    A: Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        let transport = self.transport.clone();
        let stream_id = self.stream_id.clone();
        tokio::spawn(async move {
            transport.cancel_stream(&stream_id).await;
        });
    }
}
