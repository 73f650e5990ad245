//! Domain-level errors (no external dependencies)

use std::path::PathBuf;
use thiserror::Error;

/// Domain errors represent structural violations found while building the model graph.
/// These are independent of infrastructure concerns.
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("{field} required for {id} (file: {file:?})")]
    MissingField {
        field: String,
        id: String,
        file: PathBuf,
    },

    #[error("scope is empty in {id}, please check the threat model file {file:?}")]
    MissingScope { id: String, file: PathBuf },

    #[error("REFID required in reference owned by {owner} (file: {file:?})")]
    MalformedReference { owner: String, file: PathBuf },

    #[error("REFID or ID needed to define a countermeasure in {owner} (file: {file:?})")]
    MissingCountermeasureKey { owner: String, file: PathBuf },

    #[error("{field} is not allowed in {id}: {message}")]
    ForbiddenField {
        field: String,
        id: String,
        message: String,
    },

    #[error("invalid value for {field} in {id}: {message}")]
    InvalidField {
        field: String,
        id: String,
        message: String,
    },

    #[error("invalid CVSS vector '{vector}': {message}")]
    InvalidCvss { vector: String, message: String },

    #[error("cannot load document {path:?}: {message}")]
    DocumentLoad { path: PathBuf, message: String },

    #[error("unknown template name: {0}")]
    UnknownTemplate(String),

    #[error("threat model id not found: {0}")]
    UnknownId(String),
}

/// Result type for model construction.
pub type DomainResult<T> = Result<T, DomainError>;
