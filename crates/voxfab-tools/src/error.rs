//! Tool pipeline error types.

use thiserror::Error;

/// Errors inside the tool execution pipeline.
///
/// These never escape [`crate::ToolExecutor::execute`] — they are mapped
/// into `{success: false, error}` results so the session continues.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Input failed validation against the tool's requirements.
    #[error("{0}")]
    InvalidInput(String),

    /// The tool service could not be reached or answered abnormally.
    #[error("{0}")]
    Transport(String),

    /// The tool service answered with an unusable body.
    #[error("unexpected tool service response: {0}")]
    BadResponse(String),
}

/// Errors while loading tool files into a catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read tool file `{path}`: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse tool file `{path}`: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },

    #[error("tool file `{path}` has no input schema (input_schema/inputSchema/parameters)")]
    MissingSchema { path: String },

    #[error("duplicate tool `{name}` (second definition in `{path}`)")]
    Duplicate { name: String, path: String },
}
