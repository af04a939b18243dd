//! `axum` adapter (spec §6.7): the one HTTP framework glue this crate
//! ships, converting between [`crate::http_types`] and `axum`'s own
//! request/response types. Grounded in the teacher's
//! `streamable_http_server/actix_web.rs` for the route-configuration shape
//! (three methods on one path) and `sse_server/axum.rs` for turning a raw
//! byte stream into an `axum` response body.

use std::sync::Arc;

use axum::{
    body::{Body, to_bytes},
    extract::State,
    http::{Request, Response, StatusCode},
    response::IntoResponse,
    routing::{MethodFilter, on},
};
use bytes::Bytes;
use futures::StreamExt;

use crate::{
    http_types::{IncomingRequest, OutgoingResponse, ResponseBody},
    transport::Transport,
};

/// Wraps a [`Transport`] as an `axum` service. `A` is the opaque auth-info
/// type the host attaches per request — extract it from `axum` extensions
/// or a middleware layer before calling [`StreamableHttpService::handle`].
#[derive(Clone)]
pub struct StreamableHttpService<A = ()> {
    transport: Arc<Transport<A>>,
}

impl<A> StreamableHttpService<A>
where
    A: Clone + Send + Sync + 'static,
{
    pub fn new(transport: Arc<Transport<A>>) -> Self {
        Self { transport }
    }

    /// Builds a router with POST, GET and DELETE all bound to `path`,
    /// matching the single-endpoint multiplexing spec §1 describes (the
    /// teacher's `actix_web.rs` binds the same three verbs to one scope).
    pub fn router(self, path: &str) -> axum::Router
    where
        A: Default,
    {
        axum::Router::new()
            .route(
                path,
                on(
                    MethodFilter::GET.or(MethodFilter::POST).or(MethodFilter::DELETE),
                    Self::handle,
                ),
            )
            .with_state(self)
    }

    /// Maximum body size read from the incoming request before the
    /// transport's own `PayloadTooLarge` gate even runs — a thin guard
    /// against unbounded buffering while `to_bytes` drains the body.
    const BODY_READ_LIMIT: usize = 16 * 1024 * 1024;

    async fn handle(State(service): State<Self>, request: Request<Body>) -> Response<Body>
    where
        A: Default,
    {
        let (parts, body) = request.into_parts();
        let body = match to_bytes(body, Self::BODY_READ_LIMIT).await {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::debug!(%err, "failed to read request body");
                return (StatusCode::BAD_REQUEST, "failed to read request body").into_response();
            }
        };

        let incoming = IncomingRequest {
            method: parts.method,
            headers: parts.headers,
            body,
        };

        let response = service
            .transport
            .handle_request(incoming, Some(A::default()))
            .await;
        into_axum_response(response)
    }
}

fn into_axum_response(response: OutgoingResponse) -> Response<Body> {
    let mut builder = Response::builder().status(response.status);
    if let Some(headers) = builder.headers_mut() {
        *headers = response.headers;
    }
    match response.body {
        ResponseBody::Empty => builder.body(Body::empty()),
        ResponseBody::Json(bytes) => builder.body(Body::from(bytes)),
        ResponseBody::Sse(stream) => {
            let body = Body::from_stream(stream.map(Ok::<Bytes, std::io::Error>));
            builder.body(body)
        }
    }
    .unwrap_or_else(|_| {
        Response::builder()
            .status(StatusCode::INTERNAL_SERVER_ERROR)
            .body(Body::empty())
            .expect("a status-only response always builds")
    })
}
