//! Error types for the editor

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EditorError {
    #[error("Parse error: {0}")]
    Parse(#[from] scl_parser::error::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Mutation error: {0}")]
    Mutation(#[from] crate::actions::MutationError),

    #[error("Intent error: {0}")]
    Intent(#[from] crate::intent::IntentError),

    #[error("Document is not file-backed")]
    NotFileBacked,
}
