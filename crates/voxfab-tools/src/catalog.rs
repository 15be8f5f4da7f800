//! Tool file loading and the load-time classified catalog.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use voxfab_core::{ToolDefinition, ToolKind};

use crate::error::CatalogError;

/// On-disk tool file shape. The three schema spellings are mutually
/// exclusive in practice; the first present wins in the order below.
#[derive(Debug, Deserialize)]
struct RawTool {
    name: String,
    #[serde(default)]
    description: String,
    input_schema: Option<Value>,
    #[serde(rename = "inputSchema")]
    input_schema_camel: Option<Value>,
    parameters: Option<Value>,
    #[serde(default)]
    instruction: Option<String>,
    #[serde(default, rename = "agentPrompt")]
    agent_prompt: Option<String>,
    // Present in some files; routing is by classification, not this hint.
    #[serde(default, rename = "gatewayTarget")]
    _gateway_target: Option<String>,
}

/// A normalised tool record with its load-time classification.
#[derive(Debug, Clone)]
pub struct LoadedTool {
    pub definition: ToolDefinition,
    pub kind: ToolKind,

    /// Prompt-building guidance shipped with the tool file, if any.
    pub instruction: Option<String>,
}

/// All tools an agent exposes, classified once at load time.
#[derive(Debug, Default, Clone)]
pub struct ToolCatalog {
    tools: HashMap<String, LoadedTool>,
    /// Definition order, for deterministic prompt and capability lists.
    order: Vec<String>,
}

impl ToolCatalog {
    /// Load every `*.json` file in a directory, in file-name order.
    pub fn load_dir(dir: &Path) -> Result<Self, CatalogError> {
        let mut paths: Vec<_> = std::fs::read_dir(dir)
            .map_err(|source| CatalogError::Io {
                path: dir.display().to_string(),
                source,
            })?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        let mut catalog = Self::default();
        for path in paths {
            catalog.load_file(&path)?;
        }
        info!(tools = catalog.order.len(), dir = %dir.display(), "Loaded tool catalog");
        Ok(catalog)
    }

    /// Load a single tool file into the catalog.
    pub fn load_file(&mut self, path: &Path) -> Result<(), CatalogError> {
        let text = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let raw: RawTool = serde_json::from_str(&text).map_err(|source| CatalogError::Parse {
            path: path.display().to_string(),
            source,
        })?;

        let input_schema = raw
            .input_schema
            .or(raw.input_schema_camel)
            .or(raw.parameters)
            .ok_or_else(|| CatalogError::MissingSchema {
                path: path.display().to_string(),
            })?;

        if self.tools.contains_key(&raw.name) {
            return Err(CatalogError::Duplicate {
                name: raw.name,
                path: path.display().to_string(),
            });
        }

        let kind = ToolKind::classify(&raw.name);
        self.order.push(raw.name.clone());
        self.tools.insert(
            raw.name.clone(),
            LoadedTool {
                definition: ToolDefinition {
                    name: raw.name,
                    description: raw.description,
                    input_schema,
                },
                kind,
                instruction: raw.instruction.or(raw.agent_prompt),
            },
        );
        Ok(())
    }

    /// Look up a tool by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&LoadedTool> {
        self.tools.get(name)
    }

    /// Classification for a name: catalog entry first, name rules otherwise.
    ///
    /// The model can invoke tools the catalog has never seen (it is a
    /// statistical component); those still classify deterministically.
    #[must_use]
    pub fn kind_of(&self, name: &str) -> ToolKind {
        self.tools
            .get(name)
            .map_or_else(|| ToolKind::classify(name), |t| t.kind.clone())
    }

    /// Definitions in load order, for the bridge configuration.
    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|t| t.definition.clone())
            .collect()
    }

    /// Tool names in load order (the agent's declared capability set).
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.order.clone()
    }

    /// Handoff tools in load order, for the prompt's handoff section.
    pub fn handoff_tools(&self) -> impl Iterator<Item = &LoadedTool> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .filter(|t| t.kind.is_handoff())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use voxfab_core::HandoffTool;

    fn write_tool(dir: &Path, file: &str, body: &str) {
        let mut f = std::fs::File::create(dir.join(file)).unwrap();
        write!(f, "{body}").unwrap();
    }

    #[test]
    fn loads_and_normalises_all_schema_spellings() {
        let dir = tempfile::tempdir().unwrap();
        write_tool(
            dir.path(),
            "a_balance.json",
            r#"{"name":"agentcore_balance","description":"Balance lookup",
                "input_schema":{"type":"object"}}"#,
        );
        write_tool(
            dir.path(),
            "b_idv.json",
            r#"{"name":"perform_idv_check","description":"IDV",
                "inputSchema":{"type":"object"},"instruction":"Verify before account talk."}"#,
        );
        write_tool(
            dir.path(),
            "c_transfer.json",
            r#"{"name":"transfer_to_banking","description":"To banking",
                "parameters":{"type":"object"}}"#,
        );

        let catalog = ToolCatalog::load_dir(dir.path()).unwrap();
        assert_eq!(catalog.len(), 3);
        assert_eq!(
            catalog.names(),
            vec!["agentcore_balance", "perform_idv_check", "transfer_to_banking"]
        );
        assert_eq!(
            catalog.get("perform_idv_check").unwrap().instruction.as_deref(),
            Some("Verify before account talk.")
        );
        assert_eq!(
            catalog.kind_of("transfer_to_banking"),
            ToolKind::Handoff(HandoffTool::Transfer {
                handle: "banking".into()
            })
        );
    }

    #[test]
    fn missing_schema_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_tool(dir.path(), "bad.json", r#"{"name":"x","description":"no schema"}"#);
        assert!(matches!(
            ToolCatalog::load_dir(dir.path()),
            Err(CatalogError::MissingSchema { .. })
        ));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let body = r#"{"name":"x","description":"","input_schema":{}}"#;
        write_tool(dir.path(), "a.json", body);
        write_tool(dir.path(), "b.json", body);
        assert!(matches!(
            ToolCatalog::load_dir(dir.path()),
            Err(CatalogError::Duplicate { .. })
        ));
    }

    #[test]
    fn unknown_names_still_classify() {
        let catalog = ToolCatalog::default();
        assert_eq!(catalog.kind_of("get_weather"), ToolKind::Remote);
        assert_eq!(
            catalog.kind_of("return_to_triage"),
            ToolKind::Handoff(HandoffTool::ReturnToTriage)
        );
    }
}
