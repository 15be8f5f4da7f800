//! Workflow graph interpreter.
//!
//! The engine tracks where a conversation is in its workflow graph and
//! answers two questions: "where are we?" and "is this move legal?".
//! Invalid transitions are *reported*, never raised — the voice model is a
//! statistical component and the caller decides whether to enforce the
//! graph or merely log the drift.

use std::fmt::Write as _;

use serde_json::Value;
use tracing::debug;

use voxfab_core::{NodeType, WorkflowDefinition};

/// Outcome of a transition attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// Node the engine was on before the attempt (`None` before entry).
    pub previous: Option<String>,

    /// Node the engine is on after the attempt.
    pub current: String,

    /// Whether an edge `previous → current` exists (or the move was the
    /// unconditional initialisation to the start node).
    pub valid: bool,
}

/// Per-session interpreter over one workflow definition.
#[derive(Debug, Clone)]
pub struct WorkflowEngine {
    definition: WorkflowDefinition,
    current: Option<String>,
}

impl WorkflowEngine {
    /// Wrap a (validated) definition. The engine starts outside the graph;
    /// the first transition to the start node is always valid.
    #[must_use]
    pub const fn new(definition: WorkflowDefinition) -> Self {
        Self {
            definition,
            current: None,
        }
    }

    /// The underlying definition.
    #[must_use]
    pub const fn definition(&self) -> &WorkflowDefinition {
        &self.definition
    }

    /// Current node id, once the graph has been entered.
    #[must_use]
    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Enter the graph at its start node.
    pub fn enter(&mut self) -> Transition {
        let start = self
            .definition
            .start_node()
            .map(|n| n.id.clone())
            .unwrap_or_default();
        self.transition(&start)
    }

    /// Move to `to`, reporting validity.
    ///
    /// The move happens regardless of validity — the model has already
    /// taken the conversation there; refusing to follow would only make
    /// the engine's view of the session wrong in a second way.
    pub fn transition(&mut self, to: &str) -> Transition {
        let previous = self.current.clone();
        let valid = match previous.as_deref() {
            // Unconditional initialisation to the start node.
            None => self
                .definition
                .start_node()
                .is_some_and(|start| start.id == to),
            Some(from) => self.definition.edges_from(from).any(|e| e.to == to),
        };

        if !valid {
            debug!(
                workflow = %self.definition.id,
                from = ?previous,
                to = %to,
                "Workflow transition has no matching edge"
            );
        }

        self.current = Some(to.to_string());
        Transition {
            previous,
            current: to.to_string(),
            valid,
        }
    }

    /// Restore engine position from an opaque graph-state snapshot
    /// (`{"currentNodeId": ...}`), as carried across handoff.
    pub fn restore(&mut self, graph_state: &Value) {
        if let Some(node) = graph_state.get("currentNodeId").and_then(Value::as_str) {
            if self.definition.node(node).is_some() {
                self.current = Some(node.to_string());
            }
        }
    }

    /// Snapshot of the engine position for handoff carry-forward.
    #[must_use]
    pub fn snapshot(&self) -> Value {
        match &self.current {
            Some(node) => serde_json::json!({ "currentNodeId": node }),
            None => serde_json::json!({}),
        }
    }

    /// Render the workflow as flat text for the system prompt.
    ///
    /// Deterministic definition order; one line per node with its outgoing
    /// edges, so the model can follow the graph without seeing JSON.
    #[must_use]
    pub fn describe(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Workflow: {}", self.definition.name);
        for node in &self.definition.nodes {
            let kind = match node.node_type {
                NodeType::Start => "start",
                NodeType::Message => "message",
                NodeType::Decision => "decision",
                NodeType::Tool => "tool",
                NodeType::End => "end",
                NodeType::Process => "process",
            };
            let _ = write!(out, "- [{kind}] {} ({})", node.id, node.label);
            if let Some(message) = &node.message {
                let _ = write!(out, ": say \"{message}\"");
            }
            if let Some(tool) = &node.tool_name {
                let _ = write!(out, ": call {tool}");
            }
            if let Some(outcome) = &node.outcome {
                let _ = write!(out, ": outcome {outcome}");
            }
            let edges: Vec<String> = self
                .definition
                .edges_from(&node.id)
                .map(|e| match &e.label {
                    Some(label) => format!("{} [{label}]", e.to),
                    None => e.to.clone(),
                })
                .collect();
            if !edges.is_empty() {
                let _ = write!(out, " -> {}", edges.join(", "));
            }
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn triage() -> WorkflowDefinition {
        serde_json::from_value(json!({
            "id": "triage",
            "name": "Triage",
            "nodes": [
                {"id": "start", "type": "start", "label": "Greet"},
                {"id": "intent", "type": "decision", "label": "Classify intent"},
                {"id": "verify", "type": "tool", "label": "Verify identity",
                 "toolName": "transfer_to_idv"},
                {"id": "done", "type": "end", "label": "Done", "outcome": "resolved"}
            ],
            "edges": [
                {"from": "start", "to": "intent"},
                {"from": "intent", "to": "verify", "label": "needs account access"},
                {"from": "intent", "to": "done", "label": "general question"},
                {"from": "verify", "to": "done"}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn entry_to_start_is_valid() {
        let mut engine = WorkflowEngine::new(triage());
        let t = engine.enter();
        assert!(t.valid);
        assert_eq!(t.previous, None);
        assert_eq!(engine.current(), Some("start"));
    }

    #[test]
    fn edge_transitions_are_valid_others_reported() {
        let mut engine = WorkflowEngine::new(triage());
        engine.enter();

        let t = engine.transition("intent");
        assert!(t.valid);

        // No edge intent -> intent: reported invalid, but the move happens.
        let t = engine.transition("intent");
        assert!(!t.valid);
        assert_eq!(engine.current(), Some("intent"));

        let t = engine.transition("verify");
        assert!(t.valid);
        assert_eq!(t.previous.as_deref(), Some("intent"));
    }

    #[test]
    fn initial_transition_to_non_start_is_invalid() {
        let mut engine = WorkflowEngine::new(triage());
        let t = engine.transition("done");
        assert!(!t.valid);
    }

    #[test]
    fn snapshot_and_restore_round_trip() {
        let mut engine = WorkflowEngine::new(triage());
        engine.enter();
        engine.transition("intent");

        let mut other = WorkflowEngine::new(triage());
        other.restore(&engine.snapshot());
        assert_eq!(other.current(), Some("intent"));
    }

    #[test]
    fn restore_ignores_unknown_nodes() {
        let mut engine = WorkflowEngine::new(triage());
        engine.restore(&json!({"currentNodeId": "not-a-node"}));
        assert_eq!(engine.current(), None);
    }

    #[test]
    fn describe_renders_every_node_and_edge_label() {
        let engine = WorkflowEngine::new(triage());
        let text = engine.describe();
        assert!(text.starts_with("Workflow: Triage"));
        assert!(text.contains("[decision] intent"));
        assert!(text.contains("call transfer_to_idv"));
        assert!(text.contains("verify [needs account access]"));
        assert!(text.contains("outcome resolved"));
    }
}
