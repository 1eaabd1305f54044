//! Error types for document ingestion.
//!
//! Runtime tree mutations never raise these; a malformed action is a silent
//! no-op so an in-progress edit can never be lost to a hard failure. Only
//! the ingestion boundary (deserializing a document from the host) validates
//! strictly.

use crate::component::ComponentId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("invalid document JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Every id must appear exactly once in the tree.
    #[error("duplicate component id {0}")]
    DuplicateId(ComponentId),
}
