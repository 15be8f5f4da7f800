//! Workflow definitions — the directed conversation graph an agent follows.
//!
//! These are pure definition types; interpretation (current node, transition
//! validity, prompt rendering) lives in the workflow engine crate.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Node kind in a workflow graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    /// Unique entry point. Exactly one per workflow.
    Start,
    /// The agent speaks a scripted message.
    Message,
    /// Branch point; outgoing edge labels name the outcomes.
    Decision,
    /// The agent is expected to invoke a named tool here.
    Tool,
    /// Terminal node.
    End,
    /// Delegates to a nested workflow.
    Process,
}

/// One node of a workflow graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowNode {
    pub id: String,

    #[serde(rename = "type")]
    pub node_type: NodeType,

    pub label: String,

    /// Scripted text for `message` nodes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Expected tool for `tool` nodes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,

    /// Outcome tag for `end` nodes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,

    /// Nested workflow for `process` nodes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<String>,
}

/// Directed edge between two nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowEdge {
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Free-form workflow metadata (persona tag, language, ...).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkflowMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persona: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// A complete workflow definition as loaded from a workflow file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDefinition {
    pub id: String,
    pub name: String,
    pub nodes: Vec<WorkflowNode>,
    pub edges: Vec<WorkflowEdge>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<WorkflowMetadata>,

    /// Opaque harness configuration, carried but not interpreted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_config: Option<Value>,
}

impl WorkflowDefinition {
    /// Look up a node by id.
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&WorkflowNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// The unique `start` node, if the definition is well-formed.
    #[must_use]
    pub fn start_node(&self) -> Option<&WorkflowNode> {
        self.nodes.iter().find(|n| n.node_type == NodeType::Start)
    }

    /// Outgoing edges of a node, in definition order.
    pub fn edges_from<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a WorkflowEdge> {
        self.edges.iter().filter(move |e| e.from == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn node_type_tag_is_lowercase_type_field() {
        let node: WorkflowNode = serde_json::from_value(json!({
            "id": "n1",
            "type": "decision",
            "label": "Verified?"
        }))
        .unwrap();
        assert_eq!(node.node_type, NodeType::Decision);
    }

    #[test]
    fn edges_from_preserves_definition_order() {
        let wf: WorkflowDefinition = serde_json::from_value(json!({
            "id": "triage",
            "name": "Triage",
            "nodes": [
                {"id": "a", "type": "start", "label": "Start"},
                {"id": "b", "type": "end", "label": "Done"}
            ],
            "edges": [
                {"from": "a", "to": "b", "label": "yes"},
                {"from": "a", "to": "b", "label": "no"}
            ]
        }))
        .unwrap();

        let labels: Vec<_> = wf.edges_from("a").filter_map(|e| e.label.as_deref()).collect();
        assert_eq!(labels, vec!["yes", "no"]);
    }
}
