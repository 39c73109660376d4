//! Error taxonomy shared by every ragdesk operation.
//!
//! Extraction, chunking and embedding errors abort the current document;
//! dispatch errors abort only the current query. Nothing is retried.

use thiserror::Error;

/// Result alias for ragdesk operations.
pub type Result<T> = std::result::Result<T, AssistantError>;

#[derive(Debug, Error)]
pub enum AssistantError {
    /// Input bytes are not valid for the declared encoding.
    #[error("failed to decode document: {0}")]
    Decode(String),

    /// The document type could not be mapped to a supported kind.
    #[error("unsupported document type: {0}")]
    UnsupportedType(String),

    /// The document container itself could not be read.
    #[error("{kind} extraction failed: {message}")]
    Extraction { kind: &'static str, message: String },

    /// Segment and vector sequences passed to an index build differ in length.
    #[error("index build needs one vector per segment (segments: {segments}, vectors: {vectors})")]
    LengthMismatch { segments: usize, vectors: usize },

    /// A vector does not have the dimensionality of the index.
    #[error("vector has {actual} dimensions, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Missing or rejected backend credential.
    #[error("authentication failed for {backend}: {message}")]
    Authentication { backend: String, message: String },

    /// Backend or embedding model unreachable, overloaded, or not loadable.
    #[error("{service} unavailable: {message}")]
    Unavailable { service: String, message: String },

    /// The backend declined to answer (safety block, bad request).
    #[error("{backend} rejected the request: {message}")]
    Rejected { backend: String, message: String },

    /// The backend answered with a body we could not interpret.
    #[error("malformed response from {backend}: {message}")]
    MalformedResponse { backend: String, message: String },

    /// The model's text does not fit the shape the task expects.
    #[error("unexpected model output: {0}")]
    InvalidOutput(String),

    /// Nothing to work on.
    #[error("{0} must not be empty")]
    EmptyInput(&'static str),
}

impl AssistantError {
    pub fn unavailable(service: impl Into<String>, message: impl ToString) -> Self {
        AssistantError::Unavailable {
            service: service.into(),
            message: message.to_string(),
        }
    }

    /// True for failures that only affect the current query.
    pub fn is_dispatch_error(&self) -> bool {
        matches!(
            self,
            AssistantError::Authentication { .. }
                | AssistantError::Unavailable { .. }
                | AssistantError::Rejected { .. }
                | AssistantError::MalformedResponse { .. }
                | AssistantError::InvalidOutput(_)
        )
    }
}
