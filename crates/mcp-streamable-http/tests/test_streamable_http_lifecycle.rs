//! End-to-end exercises of [`mcp_streamable_http::Transport`] driven
//! directly through `handle_request`/`send`, without a real HTTP listener —
//! the same "call the transport, inspect the response" style the teacher
//! uses for its in-crate session tests rather than spinning up a socket for
//! every case.

use bytes::Bytes;
use futures::StreamExt;
use http::{HeaderMap, Method, StatusCode};
use mcp_streamable_http::{JsonRpcMessage, Transport, TransportConfig};
use mcp_streamable_http_test_support::*;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod mcp_streamable_http_test_support {
    use super::*;

    /// Installs a `tracing` subscriber so gate rejections, session
    /// transitions, and stream open/close events surface in test output —
    /// calling this is harmless if another test in the same binary already
    /// installed one.
    pub fn init_tracing() {
        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "debug".to_string().into()),
            )
            .with(tracing_subscriber::fmt::layer())
            .try_init();
    }

    pub fn post(body: &str, session_id: Option<&str>) -> mcp_streamable_http::http_types::IncomingRequest {
        let mut headers = HeaderMap::new();
        headers.insert("accept", "application/json, text/event-stream".parse().unwrap());
        headers.insert("content-type", "application/json".parse().unwrap());
        if let Some(session_id) = session_id {
            headers.insert("mcp-session-id", session_id.parse().unwrap());
        }
        mcp_streamable_http::http_types::IncomingRequest {
            method: Method::POST,
            headers,
            body: Bytes::from(body.to_owned()),
        }
    }

    pub fn get(session_id: Option<&str>, last_event_id: Option<&str>) -> mcp_streamable_http::http_types::IncomingRequest {
        let mut headers = HeaderMap::new();
        headers.insert("accept", "text/event-stream".parse().unwrap());
        if let Some(session_id) = session_id {
            headers.insert("mcp-session-id", session_id.parse().unwrap());
        }
        if let Some(last_event_id) = last_event_id {
            headers.insert("last-event-id", last_event_id.parse().unwrap());
        }
        mcp_streamable_http::http_types::IncomingRequest {
            method: Method::GET,
            headers,
            body: Bytes::new(),
        }
    }

    pub fn delete(session_id: Option<&str>) -> mcp_streamable_http::http_types::IncomingRequest {
        let mut headers = HeaderMap::new();
        if let Some(session_id) = session_id {
            headers.insert("mcp-session-id", session_id.parse().unwrap());
        }
        mcp_streamable_http::http_types::IncomingRequest {
            method: Method::DELETE,
            headers,
            body: Bytes::new(),
        }
    }

    pub async fn first_sse_frame(
        body: mcp_streamable_http::http_types::ResponseBody,
    ) -> String {
        match body {
            mcp_streamable_http::http_types::ResponseBody::Sse(mut stream) => {
                let frame = tokio::time::timeout(Duration::from_millis(500), stream.next())
                    .await
                    .expect("stream produced a frame before timing out")
                    .expect("stream yielded at least one frame");
                String::from_utf8(frame.to_vec()).unwrap()
            }
            other => panic!("expected an SSE body, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn initialize_over_sse_then_responds_on_the_same_stream() {
    init_tracing();
    let transport = Transport::<()>::new(TransportConfig::default());
    transport.start().await.unwrap();

    let response = transport
        .handle_request(
            post(r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#, None),
            None,
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    let session_id = response
        .headers
        .get("mcp-session-id")
        .map(|v| v.to_str().unwrap().to_owned())
        .expect("initialize response carries a fresh session id");

    let transport_for_reply = transport.clone();
    tokio::spawn(async move {
        transport_for_reply
            .send(
                serde_json::from_str::<JsonRpcMessage>(
                    r#"{"jsonrpc":"2.0","id":1,"result":{"ok":true}}"#,
                )
                .unwrap(),
                None,
            )
            .await
            .unwrap();
    });

    let frame = first_sse_frame(response.body).await;
    assert!(frame.contains("\"result\":{\"ok\":true}"));

    let deleted = transport.handle_request(delete(Some(&session_id)), None).await;
    assert_eq!(deleted.status, StatusCode::OK);
}

#[tokio::test]
async fn initialize_in_json_mode_waits_for_the_response_body() {
    init_tracing();
    let mut config = TransportConfig::default();
    config.enable_json_response = true;
    let transport = Transport::<()>::new(config);
    transport.start().await.unwrap();

    let init = transport
        .handle_request(
            post(r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#, None),
            None,
        )
        .await;
    let session_id = init
        .headers
        .get("mcp-session-id")
        .map(|v| v.to_str().unwrap().to_owned())
        .unwrap();

    let transport_for_reply = transport.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        transport_for_reply
            .send(
                serde_json::from_str::<JsonRpcMessage>(
                    r#"{"jsonrpc":"2.0","id":2,"result":{"ready":true}}"#,
                )
                .unwrap(),
                None,
            )
            .await
            .unwrap();
    });

    let call = transport
        .handle_request(
            post(
                r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{}}"#,
                Some(&session_id),
            ),
            None,
        )
        .await;

    assert_eq!(call.status, StatusCode::OK);
    match call.body {
        mcp_streamable_http::http_types::ResponseBody::Json(bytes) => {
            let text = String::from_utf8(bytes.to_vec()).unwrap();
            assert!(text.contains("\"ready\":true"));
        }
        other => panic!("expected a JSON body, got {other:?}"),
    }
}

#[tokio::test]
async fn batch_of_two_requests_resolves_as_a_json_array() {
    init_tracing();
    let mut config = TransportConfig::default();
    config.enable_json_response = true;
    let transport = Transport::<()>::new(config);
    transport.start().await.unwrap();

    let init = transport
        .handle_request(
            post(r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#, None),
            None,
        )
        .await;
    let session_id = init
        .headers
        .get("mcp-session-id")
        .map(|v| v.to_str().unwrap().to_owned())
        .unwrap();

    let transport_for_reply = transport.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        // Resolve id 3 (discovered second in the batch) before id 2
        // (discovered first), to actually exercise that the assembled
        // array follows request-discovery order rather than arrival order.
        for id in [3, 2] {
            transport_for_reply
                .send(
                    serde_json::from_str::<JsonRpcMessage>(&format!(
                        r#"{{"jsonrpc":"2.0","id":{id},"result":{{}}}}"#
                    ))
                    .unwrap(),
                    None,
                )
                .await
                .unwrap();
        }
    });

    let batch = r#"[{"jsonrpc":"2.0","id":2,"method":"a"},{"jsonrpc":"2.0","id":3,"method":"b"}]"#;
    let response = transport
        .handle_request(post(batch, Some(&session_id)), None)
        .await;

    match response.body {
        mcp_streamable_http::http_types::ResponseBody::Json(bytes) => {
            let parsed: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
            let array = parsed.as_array().expect("JSON-mode batch body is an array");
            assert_eq!(array.len(), 2);
            assert_eq!(array[0]["id"], serde_json::json!(2));
            assert_eq!(array[1]["id"], serde_json::json!(3));
        }
        other => panic!("expected a JSON body, got {other:?}"),
    }
}

#[tokio::test]
async fn notification_only_post_is_accepted_with_no_body() {
    init_tracing();
    let transport = Transport::<()>::new(TransportConfig::default());
    transport.start().await.unwrap();

    let response = transport
        .handle_request(
            post(r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#, None),
            None,
        )
        .await;
    let session_id = response
        .headers
        .get("mcp-session-id")
        .map(|v| v.to_str().unwrap().to_owned())
        .unwrap();
    drop(response.body);

    let response = transport
        .handle_request(
            post(
                r#"{"jsonrpc":"2.0","method":"notifications/progress"}"#,
                Some(&session_id),
            ),
            None,
        )
        .await;

    assert_eq!(response.status, StatusCode::ACCEPTED);
}

#[tokio::test]
async fn standalone_get_stream_delivers_server_initiated_notifications() {
    init_tracing();
    let transport = Transport::<()>::new(TransportConfig::default());
    transport.start().await.unwrap();

    let init = transport
        .handle_request(
            post(r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#, None),
            None,
        )
        .await;
    let session_id = init
        .headers
        .get("mcp-session-id")
        .map(|v| v.to_str().unwrap().to_owned())
        .unwrap();
    drop(init.body);

    let response = transport.handle_request(get(Some(&session_id), None), None).await;
    assert_eq!(response.status, StatusCode::OK);

    let transport_for_push = transport.clone();
    tokio::spawn(async move {
        transport_for_push
            .send(
                serde_json::from_str::<JsonRpcMessage>(
                    r#"{"jsonrpc":"2.0","method":"notifications/message"}"#,
                )
                .unwrap(),
                None,
            )
            .await
            .unwrap();
    });

    let frame = first_sse_frame(response.body).await;
    assert!(frame.contains("notifications/message"));
}

#[tokio::test]
async fn a_second_standalone_stream_is_rejected() {
    init_tracing();
    let transport = Transport::<()>::new(TransportConfig::default());
    transport.start().await.unwrap();

    let init = transport
        .handle_request(
            post(r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#, None),
            None,
        )
        .await;
    let session_id = init
        .headers
        .get("mcp-session-id")
        .map(|v| v.to_str().unwrap().to_owned())
        .unwrap();
    drop(init.body);

    let first = transport.handle_request(get(Some(&session_id), None), None).await;
    assert_eq!(first.status, StatusCode::OK);

    let second = transport.handle_request(get(Some(&session_id), None), None).await;
    assert_eq!(second.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn requests_before_initialize_are_rejected() {
    init_tracing();
    let transport = Transport::<()>::new(TransportConfig::default());
    transport.start().await.unwrap();

    let response = transport
        .handle_request(
            post(r#"{"jsonrpc":"2.0","id":1,"method":"tools/call"}"#, None),
            None,
        )
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_json_body_is_a_parse_error() {
    init_tracing();
    let transport = Transport::<()>::new(TransportConfig::default());
    transport.start().await.unwrap();

    let response = transport.handle_request(post("{not json", None), None).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn batch_with_initialize_and_an_extra_message_is_rejected() {
    init_tracing();
    let transport = Transport::<()>::new(TransportConfig::default());
    transport.start().await.unwrap();

    let batch = r#"[{"jsonrpc":"2.0","id":1,"method":"initialize"},{"jsonrpc":"2.0","id":2,"method":"tools/call"}]"#;
    let response = transport.handle_request(post(batch, None), None).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn wrong_method_gets_405_with_allow_header() {
    init_tracing();
    let transport = Transport::<()>::new(TransportConfig::default());
    let request = mcp_streamable_http::http_types::IncomingRequest {
        method: Method::PUT,
        headers: HeaderMap::new(),
        body: Bytes::new(),
    };
    let response = transport.handle_request(request, None).await;
    assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(response.headers.get("allow").unwrap(), "GET, POST, DELETE");
}

#[tokio::test]
async fn resuming_a_stream_replays_buffered_events_then_stays_open() {
    init_tracing();
    let store = std::sync::Arc::new(mcp_streamable_http_test_support_store::ReplayStore::default());
    let mut config = TransportConfig::default();
    config.event_store = Some(store.clone());
    let transport = Transport::<()>::new(config);
    transport.start().await.unwrap();

    let init = transport
        .handle_request(
            post(r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#, None),
            None,
        )
        .await;
    let session_id = init
        .headers
        .get("mcp-session-id")
        .map(|v| v.to_str().unwrap().to_owned())
        .unwrap();
    drop(init.body);

    let first_stream = transport.handle_request(get(Some(&session_id), None), None).await;
    let transport_for_push = transport.clone();
    tokio::spawn(async move {
        transport_for_push
            .send(
                serde_json::from_str::<JsonRpcMessage>(r#"{"jsonrpc":"2.0","method":"tick"}"#)
                    .unwrap(),
                None,
            )
            .await
            .unwrap();
    });
    let _ = first_sse_frame(first_stream.body).await;

    let last_event_id = store.last_assigned_id().expect("one event was recorded");
    let resumed = transport
        .handle_request(get(Some(&session_id), Some(&last_event_id)), None)
        .await;
    assert_eq!(resumed.status, StatusCode::OK);
}

mod mcp_streamable_http_test_support_store {
    use async_trait::async_trait;
    use mcp_streamable_http::{EventId, EventStore, EventStoreError, JsonRpcMessage, ReplaySender, StreamId};
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct ReplayStore {
        events: Mutex<Vec<(EventId, StreamId, JsonRpcMessage)>>,
        counter: Mutex<u64>,
    }

    impl ReplayStore {
        pub fn last_assigned_id(&self) -> Option<String> {
            self.events.lock().unwrap().last().map(|(id, ..)| id.as_str().to_owned())
        }
    }

    #[async_trait]
    impl EventStore for ReplayStore {
        async fn store_event(
            &self,
            stream_id: StreamId,
            message: JsonRpcMessage,
        ) -> Result<EventId, EventStoreError> {
            let mut counter = self.counter.lock().unwrap();
            let id = EventId::from(format!("evt-{counter}"));
            *counter += 1;
            self.events.lock().unwrap().push((id.clone(), stream_id, message));
            Ok(id)
        }

        async fn replay_events_after(
            &self,
            last_event_id: EventId,
            sink: ReplaySender,
        ) -> Result<StreamId, EventStoreError> {
            let events = self.events.lock().unwrap();
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
            Ok(last_stream.unwrap_or_else(mcp_streamable_http::StreamId::new_random))
        }
    }
}
