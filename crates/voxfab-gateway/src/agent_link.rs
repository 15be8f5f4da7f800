//! The gateway's leg to an agent: a channel-backed frame pipe.
//!
//! Opening a leg is behind the [`AgentConnector`] port so the handoff
//! orchestrator and session proxy can be exercised in tests without
//! sockets. The production connector dials the agent's `/session` endpoint
//! over WebSocket and pumps frames between the socket and a pair of mpsc
//! channels, one task per direction.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::connect_async;
use tracing::debug;

use voxfab_core::AgentInfo;

use crate::error::GatewayError;

/// One WebSocket frame, transport-agnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
    /// Keepalive probe (client leg only; agent legs rely on TCP).
    Ping,
}

/// A live leg to one agent for one session.
///
/// Dropping `tx` closes the leg; the agent side sees a socket close. The
/// receiver yields `None` when the agent hangs up.
pub struct AgentChannel {
    pub tx: mpsc::Sender<Frame>,
    pub rx: mpsc::Receiver<Frame>,
}

/// Port for opening agent legs.
#[async_trait]
pub trait AgentConnector: Send + Sync {
    async fn connect(&self, agent: &AgentInfo) -> Result<AgentChannel, GatewayError>;
}

/// Production connector: WebSocket to `ws://host:port/session`.
#[derive(Debug, Clone, Default)]
pub struct WsAgentConnector;

#[async_trait]
impl AgentConnector for WsAgentConnector {
    async fn connect(&self, agent: &AgentInfo) -> Result<AgentChannel, GatewayError> {
        let url = agent.session_url();
        let (socket, _) = connect_async(url.as_str())
            .await
            .map_err(|e| GatewayError::AgentConnection(format!("{url}: {e}")))?;
        debug!(agent_id = %agent.id, url = %url, "Agent leg opened");

        let (mut sink, mut stream) = socket.split();
        let (tx, mut tx_rx) = mpsc::channel::<Frame>(256);
        let (rx_tx, rx) = mpsc::channel::<Frame>(256);

        // Gateway → agent.
        tokio::spawn(async move {
            while let Some(frame) = tx_rx.recv().await {
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

        // Agent → gateway.
        tokio::spawn(async move {
            while let Some(message) = stream.next().await {
                let frame = match message {
                    Ok(Message::Text(text)) => Frame::Text(text),
                    Ok(Message::Binary(bytes)) => Frame::Binary(bytes),
                    Ok(Message::Close(_)) | Err(_) => break,
                    Ok(_) => continue,
                };
                if rx_tx.send(frame).await.is_err() {
                    break;
                }
            }
        });

        Ok(AgentChannel { tx, rx })
    }
}
