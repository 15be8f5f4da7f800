//! Client-facing WebSocket endpoint.
//!
//! Bridges the axum socket to the transport-agnostic [`Frame`] channels the
//! [`ClientSession`] proxy runs on, one pump task per direction.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::debug;

use crate::agent_link::Frame;
use crate::server::GatewayContext;
use crate::session::ClientSession;

/// HTTP handler for `GET /ws`.
pub async fn client_handler(
    ws: WebSocketUpgrade,
    State(ctx): State<Arc<GatewayContext>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, ctx))
}

async fn handle_socket(socket: WebSocket, ctx: Arc<GatewayContext>) {
    let (mut sink, mut stream) = socket.split();
    let (to_client, mut to_client_rx) = mpsc::channel::<Frame>(256);
    let (from_client, from_client_rx) = mpsc::channel::<Frame>(256);

    // Session → socket.
    let writer = tokio::spawn(async move {
        while let Some(frame) = to_client_rx.recv().await {
            let message = match frame {
                Frame::Text(text) => Message::Text(text),
                Frame::Binary(bytes) => Message::Binary(bytes),
                Frame::Ping => Message::Ping(Vec::new()),
            };
            if sink.send(message).await.is_err() {
                break;
            }
        }
        let _ = sink.send(Message::Close(None)).await;
    });

    // Socket → session.
    let reader = tokio::spawn(async move {
        while let Some(message) = stream.next().await {
            let frame = match message {
                Ok(Message::Text(text)) => Frame::Text(text),
                Ok(Message::Binary(bytes)) => Frame::Binary(bytes),
                // Pongs and pings count as traffic; content is irrelevant.
                Ok(Message::Pong(_) | Message::Ping(_)) => Frame::Ping,
                Ok(Message::Close(_)) => break,
                Err(e) => {
                    debug!(error = %e, "Client socket error");
                    break;
                }
            };
            if from_client.send(frame).await.is_err() {
                break;
            }
        }
        // Dropping `from_client` tells the session the client is gone.
    });

    ClientSession::new(ctx.session_deps(), to_client, from_client_rx)
        .run()
        .await;

    reader.abort();
    let _ = writer.await;
}
