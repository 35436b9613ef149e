//! Server-sent-events framing for hub subscriptions.
//!
//! Each event becomes one SSE frame: `event:` carries the kind, `id:` the
//! commit sequence when present and `data:` the encoded tree.

use crate::hooks::SyncHooks;
use crate::hub::{Hub, Subscription};
use async_stream::stream;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use futures::Stream;
use rolesync_core::Event;
use std::convert::Infallible;
use tracing::debug;

/// Frame a single event.
pub fn frame(event: &Event) -> SseEvent {
    let frame = SseEvent::default()
        .event(event.kind.as_str())
        .data(event.data.as_str());
    match event.id {
        Some(id) => frame.id(id.to_string()),
        None => frame,
    }
}

/// Turn a subscription into a stream of SSE frames that ends when the hub
/// closes or evicts the client.
pub fn frames<H: SyncHooks>(
    subscription: Subscription<H>,
) -> impl Stream<Item = Result<SseEvent, Infallible>> + Send + 'static {
    stream! {
        let mut subscription = subscription;
        while let Some(event) = subscription.recv().await {
            yield Ok(frame(&event));
        }
        debug!(client = %subscription.id(), "event stream finished");
    }
}

impl<H: SyncHooks> Hub<H> {
    /// Serve one client over SSE.
    ///
    /// Answers `503 Service Unavailable` once the hub is closed.
    pub fn serve(&self, request: &Parts) -> Response {
        match self.connect(request) {
            Ok(subscription) => {
                let keep_alive = KeepAlive::new().interval(self.config().keep_alive_interval());
                Sse::new(frames(subscription))
                    .keep_alive(keep_alive)
                    .into_response()
            }
            Err(err) => (StatusCode::SERVICE_UNAVAILABLE, err.to_string()).into_response(),
        }
    }
}
