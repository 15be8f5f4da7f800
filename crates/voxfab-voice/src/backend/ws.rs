//! WebSocket model backend.
//!
//! Speaks the model's JSON event protocol over a WebSocket: text frames
//! carry tagged events, audio rides inside them as base64 PCM16. The
//! session opens with a `session_start` event carrying the composed
//! inference configuration, system prompt, tool list, and voice identity;
//! after that the model never rereads any of them.

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest as _;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, warn};

use voxfab_core::Role;
use voxfab_core::contracts::pcm;

use crate::backend::{ModelBackend, ModelClientEvent, ModelSink, ModelStream};
use crate::config::BridgeConfig;
use crate::error::BridgeError;
use crate::events::BridgeEvent;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Backend connecting to a speech-to-speech model WebSocket endpoint.
#[derive(Debug, Clone)]
pub struct WsModelBackend {
    url: String,
    api_key: Option<String>,
}

impl WsModelBackend {
    /// `url` is the model endpoint (`wss://…`); `api_key`, when set, is sent
    /// as a bearer token on the upgrade request.
    #[must_use]
    pub const fn new(url: String, api_key: Option<String>) -> Self {
        Self { url, api_key }
    }
}

#[async_trait]
impl ModelBackend for WsModelBackend {
    async fn open(
        &self,
        session_id: &str,
        config: &BridgeConfig,
    ) -> Result<(Box<dyn ModelSink>, Box<dyn ModelStream>), BridgeError> {
        let mut request = self
            .url
            .clone()
            .into_client_request()
            .map_err(|e| BridgeError::Transport(format!("bad model endpoint url: {e}")))?;
        if let Some(key) = &self.api_key {
            let value = format!("Bearer {key}")
                .parse()
                .map_err(|_| BridgeError::Transport("api key is not header-safe".to_string()))?;
            request.headers_mut().insert("authorization", value);
        }

        let (stream, _) = connect_async(request)
            .await
            .map_err(|e| BridgeError::Transport(e.to_string()))?;
        let (mut sink, stream) = stream.split();

        // Configuration is applied exactly once, at open.
        let open_event = json!({
            "type": "session_start",
            "sessionId": session_id,
            "inferenceConfig": config.inference,
            "systemPrompt": config.system_prompt,
            "tools": config.tools,
            "voiceId": config.voice_id,
            "runtimeArn": config.runtime_arn,
        });
        sink.send(Message::Text(open_event.to_string()))
            .await
            .map_err(|e| BridgeError::Transport(e.to_string()))?;

        debug!(session_id, "Opened model stream");
        Ok((
            Box::new(WsModelSink { sink }),
            Box::new(WsModelStream { stream }),
        ))
    }
}

// ── Uplink ─────────────────────────────────────────────────────────

struct WsModelSink {
    sink: SplitSink<WsStream, Message>,
}

#[async_trait]
impl ModelSink for WsModelSink {
    async fn send(&mut self, event: ModelClientEvent) -> Result<(), BridgeError> {
        let payload = match event {
            ModelClientEvent::AudioChunk(pcm) => json!({
                "type": "audio_input",
                "audio": BASE64.encode(pcm),
            }),
            ModelClientEvent::Text { content } => json!({
                "type": "text_input",
                "role": "user",
                "content": content,
            }),
            ModelClientEvent::ToolResult {
                tool_use_id,
                content,
                is_error,
            } => json!({
                "type": "tool_result",
                "toolUseId": tool_use_id,
                "content": content,
                "isError": is_error,
            }),
            ModelClientEvent::EndAudio => json!({ "type": "end_audio" }),
        };
        self.sink
            .send(Message::Text(payload.to_string()))
            .await
            .map_err(|e| BridgeError::Transport(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), BridgeError> {
        // Best effort: announce the end, then close the socket.
        let _ = self
            .sink
            .send(Message::Text(json!({"type": "session_end"}).to_string()))
            .await;
        self.sink
            .close()
            .await
            .map_err(|e| BridgeError::Transport(e.to_string()))
    }
}

// ── Downlink ───────────────────────────────────────────────────────

struct WsModelStream {
    stream: SplitStream<WsStream>,
}

/// Tagged wire events from the model. Unknown tags are skipped with a log
/// line rather than failing the stream.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum WireEvent {
    #[serde(rename = "audio")]
    Audio { audio: String },

    #[serde(rename = "transcript")]
    Transcript {
        role: Role,
        text: String,
        #[serde(rename = "final", alias = "isFinal", default)]
        is_final: bool,
    },

    #[serde(rename = "toolUse", alias = "tool_use")]
    ToolUse {
        #[serde(rename = "toolName")]
        tool_name: String,
        #[serde(rename = "toolUseId")]
        tool_use_id: String,
        input: Value,
    },

    #[serde(rename = "metadata")]
    Metadata {
        #[serde(flatten)]
        data: Map<String, Value>,
    },

    #[serde(rename = "interruption")]
    Interruption {
        #[serde(flatten)]
        data: Map<String, Value>,
    },

    #[serde(rename = "usage", alias = "usageEvent")]
    Usage {
        #[serde(rename = "inputTokens", default)]
        input_tokens: u64,
        #[serde(rename = "outputTokens", default)]
        output_tokens: u64,
        #[serde(rename = "totalTokens", default)]
        total_tokens: u64,
    },

    #[serde(rename = "session_start")]
    SessionStart {
        #[serde(flatten)]
        data: Map<String, Value>,
    },

    #[serde(rename = "contentStart")]
    ContentStart {
        #[serde(flatten)]
        data: Map<String, Value>,
    },

    #[serde(rename = "contentEnd")]
    ContentEnd {
        #[serde(flatten)]
        data: Map<String, Value>,
    },

    #[serde(rename = "interactionTurnEnd")]
    InteractionTurnEnd,

    #[serde(rename = "error")]
    Error {
        message: String,
        #[serde(default)]
        fatal: bool,
    },
}

impl WireEvent {
    fn into_bridge_event(self) -> Result<BridgeEvent, BridgeError> {
        Ok(match self {
            Self::Audio { audio } => {
                let bytes = BASE64
                    .decode(audio)
                    .map_err(|e| BridgeError::Protocol(format!("undecodable audio: {e}")))?;
                // Producer-side half of the even-length defence; the bridge
                // pads again on the consumer side.
                BridgeEvent::Audio(pcm::pad_even(bytes))
            }
            Self::Transcript {
                role,
                text,
                is_final,
            } => BridgeEvent::Transcript {
                role,
                text,
                is_final,
            },
            Self::ToolUse {
                tool_name,
                tool_use_id,
                input,
            } => BridgeEvent::ToolUse {
                tool_name,
                tool_use_id,
                input,
            },
            Self::Metadata { data } => BridgeEvent::Metadata(data),
            Self::Interruption { data } => BridgeEvent::Interruption(data),
            Self::Usage {
                input_tokens,
                output_tokens,
                total_tokens,
            } => BridgeEvent::Usage {
                input_tokens,
                output_tokens,
                total_tokens,
            },
            Self::SessionStart { data } => BridgeEvent::SessionStart(data),
            Self::ContentStart { data } => BridgeEvent::ContentStart(data),
            Self::ContentEnd { data } => BridgeEvent::ContentEnd(data),
            Self::InteractionTurnEnd => BridgeEvent::InteractionTurnEnd,
            Self::Error { message, fatal } => BridgeEvent::Error { message, fatal },
        })
    }
}

#[async_trait]
impl ModelStream for WsModelStream {
    async fn next(&mut self) -> Option<Result<BridgeEvent, BridgeError>> {
        loop {
            let message = match self.stream.next().await? {
                Ok(message) => message,
                Err(e) => return Some(Err(BridgeError::Transport(e.to_string()))),
            };
            match message {
                Message::Text(text) => match serde_json::from_str::<WireEvent>(&text) {
                    Ok(event) => return Some(event.into_bridge_event()),
                    Err(e) => {
                        // Unknown or malformed event: skip, keep the stream.
                        warn!(error = %e, "Skipping unrecognised model event");
                    }
                },
                // Some model endpoints ship audio as raw binary frames.
                Message::Binary(bytes) => {
                    return Some(Ok(BridgeEvent::Audio(pcm::pad_even(bytes))));
                }
                Message::Close(_) => return None,
                // Ping/pong handled by tungstenite; frames ignored here.
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_wire_event_decodes_and_pads() {
        let event: WireEvent = serde_json::from_str(&format!(
            r#"{{"type":"audio","audio":"{}"}}"#,
            BASE64.encode([1u8, 2, 3]) // odd length
        ))
        .unwrap();
        match event.into_bridge_event().unwrap() {
            BridgeEvent::Audio(bytes) => assert_eq!(bytes, vec![1, 2, 3, 0]),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn tool_use_accepts_both_tag_spellings() {
        for tag in ["toolUse", "tool_use"] {
            let text = format!(
                r#"{{"type":"{tag}","toolName":"agentcore_balance","toolUseId":"u-1","input":{{}}}}"#
            );
            let event: WireEvent = serde_json::from_str(&text).unwrap();
            assert!(matches!(
                event.into_bridge_event().unwrap(),
                BridgeEvent::ToolUse { .. }
            ));
        }
    }

    #[test]
    fn undecodable_audio_is_a_protocol_error() {
        let event: WireEvent =
            serde_json::from_str(r#"{"type":"audio","audio":"%%%"}"#).unwrap();
        assert!(matches!(
            event.into_bridge_event(),
            Err(BridgeError::Protocol(_))
        ));
    }
}
