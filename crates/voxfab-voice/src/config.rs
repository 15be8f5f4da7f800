//! Bridge session configuration.
//!
//! Applied once, before `start`. The model composes its system prompt and
//! tool set from this at stream open and never rereads them.

use serde::{Deserialize, Serialize};

use voxfab_core::ToolDefinition;

/// Speech endpointing sensitivity for the model's built-in turn detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum EndpointingSensitivity {
    High,
    #[default]
    Medium,
    Low,
}

/// Inference parameters for the model stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceConfig {
    pub max_tokens: u32,
    pub top_p: f32,
    pub temperature: f32,
    pub endpointing_sensitivity: EndpointingSensitivity,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            max_tokens: 1024,
            top_p: 0.9,
            temperature: 0.7,
            endpointing_sensitivity: EndpointingSensitivity::default(),
        }
    }
}

/// Everything a model stream needs at open time.
#[derive(Debug, Clone, Default)]
pub struct BridgeConfig {
    /// Fully composed system prompt (section order matters to the persona;
    /// composition happens in the agent runtime, not here).
    pub system_prompt: String,

    /// Tools the model may invoke this session.
    pub tools: Vec<ToolDefinition>,

    /// Voice identity for synthesis.
    pub voice_id: Option<String>,

    /// Remote agent-runtime identifier, when runtime tools are in play.
    pub runtime_arn: Option<String>,

    pub inference: InferenceConfig,
}
