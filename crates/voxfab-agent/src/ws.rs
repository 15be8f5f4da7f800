//! WebSocket endpoint for the gateway leg.
//!
//! The gateway opens one socket per session against `GET /session` and
//! speaks `session_init` / `end_session` control frames plus verbatim
//! client traffic. This module is a thin shim: it decodes frames into
//! [`SessionInput`]s for the owning actor and encodes the actor's
//! [`Outbound`]s back onto the socket.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use voxfab_core::contracts::pcm;
use voxfab_core::{AgentBound, ClientFrame, ProtocolError};

use crate::server::AgentContext;
use crate::session::{Outbound, SessionActor, SessionInput};

/// Deadline for flushing queued outbound frames after a session ends.
const DRAIN_DEADLINE: Duration = Duration::from_secs(2);

/// HTTP handler for `GET /session`.
pub async fn session_handler(
    ws: WebSocketUpgrade,
    State(ctx): State<Arc<AgentContext>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, ctx))
}

async fn handle_socket(socket: WebSocket, ctx: Arc<AgentContext>) {
    let (mut sink, mut stream) = socket.split();

    // The first frame must bind a session.
    let (session_id, memory) = loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => match AgentBound::decode(&text) {
                Ok(AgentBound::SessionInit {
                    session_id,
                    memory,
                    trace_id,
                    ..
                }) => {
                    debug!(session_id = %session_id, trace_id = %trace_id, "Session bound");
                    break (session_id, memory);
                }
                Ok(AgentBound::EndSession { .. }) => return,
                Err(e) => {
                    warn!(error = %e, "Expected session_init as first frame");
                    return;
                }
            },
            Some(Ok(Message::Close(_))) | None => return,
            Some(Ok(_)) => {} // ignore pre-init audio/ping frames
            Some(Err(e)) => {
                debug!(error = %e, "Socket error before session_init");
                return;
            }
        }
    };

    let (input_tx, input_rx) = mpsc::channel::<SessionInput>(256);
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<Outbound>(256);

    let actor = SessionActor::new(ctx.session_deps(), &session_id, &memory, outbound_tx);
    let mut actor_task = tokio::spawn(actor.run(memory, input_rx));

    // Writer: drains the actor's outbound queue onto the socket.
    let mut writer = tokio::spawn(async move {
        while let Some(outbound) = outbound_rx.recv().await {
            let message = match outbound {
                Outbound::Server(frame) => match frame.encode() {
                    Ok(text) => Message::Text(text),
                    Err(e) => {
                        warn!(error = %e, "Dropping unencodable frame");
                        continue;
                    }
                },
                Outbound::Gateway(frame) => match frame.encode() {
                    Ok(text) => Message::Text(text),
                    Err(e) => {
                        warn!(error = %e, "Dropping unencodable gateway frame");
                        continue;
                    }
                },
                // Egress half of the even-length defence.
                Outbound::Audio(bytes) => Message::Binary(pcm::pad_even(bytes)),
            };
            if sink.send(message).await.is_err() {
                break;
            }
        }
        let _ = sink.send(Message::Close(None)).await;
    });

    // Reader: socket frames → session inputs, until either side ends.
    while let Some(message) = stream.next().await {
        let input = match message {
            Ok(Message::Binary(bytes)) => {
                // Ingress half of the even-length defence.
                Some(SessionInput::Audio(pcm::pad_even(bytes)))
            }
            Ok(Message::Text(text)) => decode_text_frame(&text),
            Ok(Message::Close(_)) => Some(SessionInput::EndSession),
            Ok(_) => None,
            Err(e) => {
                debug!(session_id = %session_id, error = %e, "Socket error");
                Some(SessionInput::EndSession)
            }
        };
        let ending = input == Some(SessionInput::EndSession);
        if let Some(input) = input {
            if input_tx.send(input).await.is_err() {
                break; // actor already gone
            }
        }
        if ending {
            break;
        }
    }
    drop(input_tx);

    // Give the writer a bounded window to flush, then fold the actor. An
    // actor still busy past the deadline is mid-tool-call; aborting it
    // cancels the outstanding HTTP dispatch along with the bridge.
    if tokio::time::timeout(DRAIN_DEADLINE, &mut writer).await.is_err() {
        warn!(session_id = %session_id, "Outbound drain exceeded deadline");
        writer.abort();
    }
    if tokio::time::timeout(DRAIN_DEADLINE, &mut actor_task).await.is_err() {
        warn!(session_id = %session_id, "Session actor exceeded drain deadline");
        actor_task.abort();
    }
}

/// Map one text frame to a session input. `None` means ignore.
fn decode_text_frame(text: &str) -> Option<SessionInput> {
    match AgentBound::decode(text) {
        Ok(AgentBound::EndSession { .. }) => return Some(SessionInput::EndSession),
        Ok(AgentBound::SessionInit { .. }) => {
            warn!("Duplicate session_init ignored");
            return None;
        }
        Err(ProtocolError::UnknownType(_)) => {} // fall through to client vocabulary
        Err(e) => {
            debug!(error = %e, "Undecodable control frame from gateway");
            return None;
        }
    }

    match ClientFrame::decode(text) {
        Ok(ClientFrame::UserInput { text }) => Some(SessionInput::UserText(text)),
        Ok(ClientFrame::EndOfSpeech) => Some(SessionInput::EndOfSpeech),
        // Liveness is the gateway's concern; workflow selection happened
        // before this leg existed.
        Ok(ClientFrame::Ping | ClientFrame::SelectWorkflow { .. } | ClientFrame::SessionInit { .. }) => {
            None
        }
        Err(ProtocolError::UnknownType(ty)) => {
            debug!(frame_type = %ty, "Ignoring unknown frame type");
            None
        }
        Err(e) => {
            debug!(error = %e, "Undecodable frame on agent leg");
            None
        }
    }
}
