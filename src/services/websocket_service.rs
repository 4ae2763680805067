use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dto::ws::{ClientMessage, ServerMessage},
    error::ServiceError,
    state::{SharedState, lobby::ConnectionId},
};

/// Errors that end or skip work on a single player connection.
///
/// Distinct from `ServiceError`, which describes rejected lobby requests and
/// is reported back to the player by the dispatcher.
#[derive(Debug, Error)]
enum SessionError {
    /// The text frame was not a valid client message.
    #[error("malformed message: {0}")]
    MalformedFrame(#[from] serde_json::Error),
    /// The dispatcher could not accept the message.
    #[error("service error: {0}")]
    Service(#[from] ServiceError),
}

/// Handle the full lifecycle for an individual player WebSocket connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let connection_id: ConnectionId = Uuid::new_v4();
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<ServerMessage>();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            let Some(frame) = encode_frame(&message) else {
                continue;
            };
            if sender.send(frame).await.is_err() {
                break;
            }
        }
    });

    if let Err(err) = state
        .dispatcher()
        .connect(connection_id, outbound_tx.clone())
    {
        warn!(connection = %connection_id, error = %err, "rejecting connection");
        finalize(writer_task, outbound_tx).await;
        return;
    }
    info!(connection = %connection_id, "player connected");

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                debug!(connection = %connection_id, payload = %text, "received player message");

                match forward_text(&state, connection_id, &text) {
                    Ok(()) => {}
                    Err(SessionError::MalformedFrame(err)) => {
                        warn!(connection = %connection_id, error = %err, "failed to parse player message");
                        let _ = outbound_tx.send(ServerMessage::ErrorMessage {
                            text: SessionError::MalformedFrame(err).to_string(),
                        });
                    }
                    Err(err @ SessionError::Service(_)) => {
                        warn!(connection = %connection_id, error = %err, "dispatcher gone, closing connection");
                        break;
                    }
                }
            }
            Ok(Message::Close(_)) => {
                info!(connection = %connection_id, "player closed");
                break;
            }
            Ok(Message::Binary(_) | Message::Ping(_) | Message::Pong(_)) => {}
            Err(err) => {
                warn!(connection = %connection_id, error = %err, "websocket error");
                break;
            }
        }
    }

    if let Err(err) = state.dispatcher().disconnect(connection_id) {
        warn!(connection = %connection_id, error = %err, "failed to report disconnect");
    }
    info!(connection = %connection_id, "player disconnected");

    finalize(writer_task, outbound_tx).await;
}

/// Parse a text frame and queue it on the dispatcher.
fn forward_text(
    state: &SharedState,
    connection_id: ConnectionId,
    text: &str,
) -> Result<(), SessionError> {
    let message = ClientMessage::from_json_str(text)?;
    state.dispatcher().dispatch(connection_id, message)?;
    Ok(())
}

/// Serialize an outbound event into a text frame.
///
/// Serialization failures are logged and the event is skipped; they are a bug,
/// not a connection problem.
fn encode_frame(message: &ServerMessage) -> Option<Message> {
    match serde_json::to_string(message) {
        Ok(payload) => Some(Message::Text(payload.into())),
        Err(err) => {
            warn!(error = %err, "failed to serialize message `{message:?}`");
            None
        }
    }
}

/// Ensure the writer task winds down before we return from the socket handler.
///
/// The dispatcher drops its copy of the sender once it processed the disconnect.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<ServerMessage>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
