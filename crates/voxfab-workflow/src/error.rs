//! Workflow engine and loader error types.

use thiserror::Error;

/// Errors raised while loading or interpreting a workflow.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// The workflow file could not be read.
    #[error("failed to read workflow file `{path}`: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// The workflow file is not valid JSON for the expected shape.
    #[error("failed to parse workflow file `{path}`: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },

    /// The definition has no `start` node, or more than one.
    #[error("workflow `{workflow}` must have exactly one start node, found {found}")]
    StartNodeCount { workflow: String, found: usize },

    /// A node with no outgoing edges is not typed `end`.
    #[error("workflow `{workflow}`: terminal node `{node}` is not typed `end`")]
    DanglingTerminal { workflow: String, node: String },

    /// Two nodes share an id.
    #[error("workflow `{workflow}`: duplicate node id `{node}`")]
    DuplicateNode { workflow: String, node: String },

    /// An edge references a node that does not exist.
    #[error("workflow `{workflow}`: edge `{from}` → `{to}` references an unknown node")]
    UnknownEdgeEndpoint {
        workflow: String,
        from: String,
        to: String,
    },
}
