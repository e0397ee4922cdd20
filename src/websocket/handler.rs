//! WebSocket Handler
//!
//! Handles WebSocket upgrade requests and runs the two drains of each
//! subscriber connection:
//!
//! - **outbound**: pops records from the subscriber's queue and writes them
//!   as JSON text frames. Stops on the first write error, or sends a close
//!   frame once the hub has closed the queue.
//! - **inbound**: reads only to notice the viewer going away. Any close or
//!   read error makes it ask the hub to unregister the subscriber.

use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, State,
    },
    response::Response,
};
use futures_util::{pin_mut, Sink, SinkExt, Stream, StreamExt};
use std::fmt::Display;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use super::hub::Hub;
use super::subscriber::{OutboundQueue, Subscriber, SubscriberId};
use crate::api::AppState;

/// How long one drain may outlive the other before it is aborted
const CLOSE_GRACE: Duration = Duration::from_secs(5);

/// The drain that stopped first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Finished {
    /// Viewer left; the inbound drain has already asked for unregistration
    Inbound,
    /// Queue closed or a write failed; the viewer may still be attached
    Outbound,
}

/// WebSocket upgrade handler
///
/// Entry point for `GET /ws`. The viewer is expected to send nothing; every
/// stored record (and the clear sentinel) is pushed to it as it arrives.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
) -> Response {
    let hub = state.hub.clone();
    let peer = connect_info.map(|ConnectInfo(addr)| addr);
    ws.on_upgrade(move |socket| serve_subscriber(socket, hub, peer))
}

/// Run one subscriber connection to completion
///
/// The subscriber is registered before either drain starts, so a record
/// broadcast right after the upgrade is not missed.
pub async fn serve_subscriber(socket: WebSocket, hub: Hub, peer: Option<SocketAddr>) {
    let (subscriber, queue) = Subscriber::new(peer, hub.queue_capacity());
    let id = subscriber.id();

    if let Err(e) = hub.register(subscriber).await {
        tracing::error!(error = %e, peer = ?peer, "Failed to register subscriber");
        let _ = socket.close().await;
        return;
    }

    tracing::debug!(subscriber_id = %id, peer = ?peer, "WebSocket connection established");

    let (sink, stream) = socket.split();
    let finished = run_drains(id, queue, sink, stream, hub, CLOSE_GRACE).await;

    tracing::debug!(subscriber_id = %id, peer = ?peer, ?finished, "WebSocket connection finished");
}

/// Drive both drains and wind down the survivor
///
/// Whichever drain stops first decides who still owes the unregister: the
/// inbound drain does it itself, while an outbound stop leaves it to the
/// inbound drain, or to this function once `grace` runs out.
async fn run_drains<Si, St, E>(
    id: SubscriberId,
    queue: OutboundQueue,
    sink: Si,
    stream: St,
    hub: Hub,
    grace: Duration,
) -> Finished
where
    Si: Sink<Message> + Send + 'static,
    Si::Error: Display + Send,
    St: Stream<Item = Result<Message, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    let mut outbound = tokio::spawn(outbound_drain(queue, sink));
    let mut inbound = tokio::spawn(inbound_drain(id, stream, hub.clone()));

    let finished = tokio::select! {
        _ = &mut inbound => Finished::Inbound,
        _ = &mut outbound => Finished::Outbound,
    };

    match finished {
        Finished::Inbound => {
            // The unregister just requested closes the queue, which ends the outbound drain
            if timeout(grace, &mut outbound).await.is_err() {
                tracing::debug!(subscriber_id = %id, "Outbound drain did not stop in time, aborting");
                outbound.abort();
            }
        }
        Finished::Outbound => {
            if timeout(grace, &mut inbound).await.is_err() {
                tracing::debug!(subscriber_id = %id, "Inbound drain did not stop in time, aborting");
                inbound.abort();
                if let Err(e) = hub.unregister(id).await {
                    tracing::warn!(subscriber_id = %id, error = %e, "Failed to unregister subscriber");
                }
            }
        }
    }

    finished
}

/// Write queued records until the queue closes or a write fails
async fn outbound_drain<Si>(mut queue: OutboundQueue, sink: Si)
where
    Si: Sink<Message>,
    Si::Error: Display,
{
    let id = queue.id();
    pin_mut!(sink);

    while let Some(record) = queue.next().await {
        let text = match serde_json::to_string(record.as_ref()) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(subscriber_id = %id, record_id = record.id, error = %e, "Failed to serialize record");
                continue;
            }
        };

        if let Err(e) = sink.send(Message::Text(text)).await {
            tracing::debug!(
                subscriber_id = %id,
                error = %e,
                "WebSocket send failed, closing connection"
            );
            let _ = sink.close().await;
            return;
        }
    }

    tracing::debug!(subscriber_id = %id, "Outbound queue closed, sending close frame");
    let frame = CloseFrame {
        code: close_code::NORMAL,
        reason: "".into(),
    };
    let _ = sink.send(Message::Close(Some(frame))).await;
    let _ = sink.close().await;
}

/// Read until the viewer goes away, then leave the hub
async fn inbound_drain<St, E>(id: SubscriberId, stream: St, hub: Hub)
where
    St: Stream<Item = Result<Message, E>>,
    E: Display,
{
    pin_mut!(stream);

    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Close(frame)) => {
                tracing::debug!(subscriber_id = %id, frame = ?frame, "Client requested close");
                break;
            }
            Ok(_) => {
                tracing::trace!(subscriber_id = %id, "Ignoring client message");
            }
            Err(e) => {
                tracing::debug!(subscriber_id = %id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    if let Err(e) = hub.unregister(id).await {
        tracing::warn!(subscriber_id = %id, error = %e, "Failed to unregister subscriber");
    }
}
