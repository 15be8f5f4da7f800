//! Workflow file loading and structural validation.

use std::collections::HashSet;
use std::path::Path;

use tracing::info;

use voxfab_core::{NodeType, WorkflowDefinition};

use crate::error::WorkflowError;

/// Load and validate a workflow definition from a JSON file.
pub fn load_workflow(path: &Path) -> Result<WorkflowDefinition, WorkflowError> {
    let text = std::fs::read_to_string(path).map_err(|source| WorkflowError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let definition: WorkflowDefinition =
        serde_json::from_str(&text).map_err(|source| WorkflowError::Parse {
            path: path.display().to_string(),
            source,
        })?;
    validate_definition(&definition)?;
    info!(
        workflow = %definition.id,
        nodes = definition.nodes.len(),
        edges = definition.edges.len(),
        "Loaded workflow"
    );
    Ok(definition)
}

/// Structural validation of a workflow definition.
///
/// Checks, in order: unique node ids, exactly one `start` node, every edge
/// endpoint resolvable, and every terminal (no outgoing edges) node typed
/// `end`. The first violation is returned.
pub fn validate_definition(definition: &WorkflowDefinition) -> Result<(), WorkflowError> {
    let workflow = definition.id.clone();

    let mut seen = HashSet::new();
    for node in &definition.nodes {
        if !seen.insert(node.id.as_str()) {
            return Err(WorkflowError::DuplicateNode {
                workflow,
                node: node.id.clone(),
            });
        }
    }

    let starts = definition
        .nodes
        .iter()
        .filter(|n| n.node_type == NodeType::Start)
        .count();
    if starts != 1 {
        return Err(WorkflowError::StartNodeCount {
            workflow,
            found: starts,
        });
    }

    for edge in &definition.edges {
        if definition.node(&edge.from).is_none() || definition.node(&edge.to).is_none() {
            return Err(WorkflowError::UnknownEdgeEndpoint {
                workflow,
                from: edge.from.clone(),
                to: edge.to.clone(),
            });
        }
    }

    for node in &definition.nodes {
        let terminal = definition.edges_from(&node.id).next().is_none();
        if terminal && node.node_type != NodeType::End {
            return Err(WorkflowError::DanglingTerminal {
                workflow,
                node: node.id.clone(),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write as _;

    fn minimal(nodes: serde_json::Value, edges: serde_json::Value) -> WorkflowDefinition {
        serde_json::from_value(json!({
            "id": "wf",
            "name": "Test",
            "nodes": nodes,
            "edges": edges
        }))
        .unwrap()
    }

    #[test]
    fn valid_definition_passes() {
        let wf = minimal(
            json!([
                {"id": "a", "type": "start", "label": "A"},
                {"id": "b", "type": "end", "label": "B"}
            ]),
            json!([{"from": "a", "to": "b"}]),
        );
        assert!(validate_definition(&wf).is_ok());
    }

    #[test]
    fn missing_start_node_is_rejected() {
        let wf = minimal(
            json!([{"id": "b", "type": "end", "label": "B"}]),
            json!([]),
        );
        assert!(matches!(
            validate_definition(&wf),
            Err(WorkflowError::StartNodeCount { found: 0, .. })
        ));
    }

    #[test]
    fn two_start_nodes_are_rejected() {
        let wf = minimal(
            json!([
                {"id": "a", "type": "start", "label": "A"},
                {"id": "b", "type": "start", "label": "B"},
                {"id": "c", "type": "end", "label": "C"}
            ]),
            json!([{"from": "a", "to": "c"}, {"from": "b", "to": "c"}]),
        );
        assert!(matches!(
            validate_definition(&wf),
            Err(WorkflowError::StartNodeCount { found: 2, .. })
        ));
    }

    #[test]
    fn duplicate_node_ids_are_rejected() {
        let wf = minimal(
            json!([
                {"id": "a", "type": "start", "label": "A"},
                {"id": "a", "type": "end", "label": "A again"}
            ]),
            json!([]),
        );
        assert!(matches!(
            validate_definition(&wf),
            Err(WorkflowError::DuplicateNode { .. })
        ));
    }

    #[test]
    fn dangling_non_end_terminal_is_rejected() {
        let wf = minimal(
            json!([
                {"id": "a", "type": "start", "label": "A"},
                {"id": "b", "type": "message", "label": "B"}
            ]),
            json!([{"from": "a", "to": "b"}]),
        );
        assert!(matches!(
            validate_definition(&wf),
            Err(WorkflowError::DanglingTerminal { .. })
        ));
    }

    #[test]
    fn edge_to_unknown_node_is_rejected() {
        let wf = minimal(
            json!([
                {"id": "a", "type": "start", "label": "A"},
                {"id": "b", "type": "end", "label": "B"}
            ]),
            json!([{"from": "a", "to": "nowhere"}]),
        );
        assert!(matches!(
            validate_definition(&wf),
            Err(WorkflowError::UnknownEdgeEndpoint { .. })
        ));
    }

    #[test]
    fn load_workflow_reads_and_validates() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "id": "triage", "name": "Triage",
                "nodes": [
                    {{"id": "s", "type": "start", "label": "Greet"}},
                    {{"id": "e", "type": "end", "label": "Done"}}
                ],
                "edges": [{{"from": "s", "to": "e"}}],
                "voiceId": "amy",
                "metadata": {{"persona": "helpful triage assistant"}}
            }}"#
        )
        .unwrap();

        let wf = load_workflow(file.path()).unwrap();
        assert_eq!(wf.id, "triage");
        assert_eq!(wf.voice_id.as_deref(), Some("amy"));
        assert_eq!(
            wf.metadata.unwrap().persona.as_deref(),
            Some("helpful triage assistant")
        );
    }

    #[test]
    fn load_workflow_surfaces_parse_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            load_workflow(file.path()),
            Err(WorkflowError::Parse { .. })
        ));
    }
}
