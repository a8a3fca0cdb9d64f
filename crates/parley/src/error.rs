//! Error types shared by every component.

use thiserror::Error;

/// Errors raised by the orchestration pipeline, the registries and the linter.
///
/// Schema anomalies and malformed call blocks are *not* errors: they are
/// reported as [`Diagnostic`](crate::call::Diagnostic)s and
/// [`MalformedBlock`](crate::call::MalformedBlock)s instead.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("generation failed: {0}")]
    /// The generator could not produce a completion.
    Generation(String),
    #[error("execution failed: {0}")]
    /// The executor failed while running a batch of calls.
    Execution(String),
    #[error("no result was returned for call #{index} to `{name}`")]
    /// A submitted call could not be correlated with any executor result.
    MissingResult {
        /// Zero-based position of the call in the submitted batch.
        index: usize,
        /// Name of the called function.
        name: String,
    },
    #[error("function `{0}` is registered both as a tool and as an action")]
    /// A function name appears in both the tool and the action registry.
    ConflictingProvenance(String),
    #[error("function `{0}` is registered more than once")]
    /// A function name appears twice in one registry.
    DuplicateFunction(String),
    #[error("invalid registry: {0}")]
    /// The registry document does not have the expected shape.
    InvalidRegistry(String),
    #[error("invalid dataset `{path}`: {reason}")]
    /// A dataset file is not a JSON array of records.
    InvalidDataset {
        /// Path of the offending file.
        path: String,
        /// Why the file was rejected.
        reason: String,
    },
    #[error("template rendering failed: {0}")]
    /// A prompt template failed to render.
    Template(#[from] minijinja::Error),
    #[error("JSON error: {0}")]
    /// JSON serialization or deserialization failed.
    Json(#[from] serde_json::Error),
    #[error("config error: {0}")]
    /// The TOML configuration could not be parsed.
    Config(#[from] toml::de::Error),
    #[error("IO error: {0}")]
    /// Reading a file failed.
    Io(#[from] std::io::Error),
}

/// Result type with [`Error`] as the default error.
pub type Result<T, E = Error> = std::result::Result<T, E>;
