//! WebSocket endpoint for live updates.
//!
//! The socket is adapted into the hub's [`Frame`] transport and handed to
//! [`run_connection`], which owns heartbeats, deadlines and teardown.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::{future, SinkExt, StreamExt};
use pulse_hub::{run_connection, ConnectionConfig, Frame, Hub, SubscriberQueue};
use tracing::{debug, warn};

use crate::error::DashboardError;
use crate::state::DashboardState;

/// A hub slot reserved for a socket that has not finished upgrading.
///
/// Dropping it before [`PendingSubscriber::activate`] unregisters the slot, so
/// an upgrade that fails or is abandoned never lingers in the subscriber count.
#[derive(Debug)]
struct PendingSubscriber {
    hub: Arc<Hub>,
    queue: Option<SubscriberQueue>,
}

impl PendingSubscriber {
    fn new(hub: Arc<Hub>, queue: SubscriberQueue) -> Self {
        Self {
            hub,
            queue: Some(queue),
        }
    }

    fn activate(mut self) -> Option<(Arc<Hub>, SubscriberQueue)> {
        let queue = self.queue.take()?;
        Some((Arc::clone(&self.hub), queue))
    }
}

impl Drop for PendingSubscriber {
    fn drop(&mut self) {
        if let Some(queue) = self.queue.take() {
            debug!(subscriber = %queue.id(), "websocket upgrade abandoned");
            self.hub.unregister(queue.id());
        }
    }
}

/// Handle WebSocket upgrade request for /api/ws.
///
/// The subscriber is registered before the upgrade so the limit check and the
/// registration are one atomic step.
pub async fn ws_upgrade(
    State(state): State<Arc<DashboardState>>,
    ws: WebSocketUpgrade,
) -> Result<Response, DashboardError> {
    let config = state.connection_config();
    let queue = state.hub().try_subscribe(config.queue_capacity).map_err(|e| {
        warn!(error = %e, "rejecting websocket subscriber");
        DashboardError::from(e)
    })?;
    let pending = PendingSubscriber::new(Arc::clone(state.hub()), queue);

    Ok(ws
        .on_failed_upgrade(|e: axum::Error| warn!(error = %e, "websocket upgrade failed"))
        .on_upgrade(move |socket| handle_socket(socket, pending, config)))
}

async fn handle_socket(socket: WebSocket, pending: PendingSubscriber, config: ConnectionConfig) {
    let Some((hub, queue)) = pending.activate() else {
        return;
    };
    let (sink, stream) = socket.split();
    let sink = sink.with(|frame: Frame| future::ready(Ok::<_, axum::Error>(to_message(frame))));
    let stream = stream.map(|result| result.map(from_message));

    let outcome = run_connection(hub, queue, sink, stream, config).await;
    debug!(subscriber = %outcome.id, reason = %outcome.reason, "websocket handler finished");
}

fn to_message(frame: Frame) -> Message {
    match frame {
        Frame::Text(text) => Message::Text(text.into()),
        Frame::Binary(data) => Message::Binary(data.into()),
        Frame::Ping(data) => Message::Ping(data.into()),
        Frame::Pong(data) => Message::Pong(data.into()),
        Frame::Close => Message::Close(None),
    }
}

fn from_message(message: Message) -> Frame {
    match message {
        Message::Text(text) => Frame::Text(text.as_str().to_owned()),
        Message::Binary(data) => Frame::Binary(data.to_vec()),
        Message::Ping(data) => Frame::Ping(data.to_vec()),
        Message::Pong(data) => Frame::Pong(data.to_vec()),
        Message::Close(_) => Frame::Close,
    }
}
