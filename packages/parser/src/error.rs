use thiserror::Error;

use crate::ast::NodeId;

pub type ParseResult<T> = Result<T, ParseError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Malformed XML at {pos}: {message}")]
    Malformed { pos: usize, message: String },

    #[error("Mismatched closing tag at {pos}: expected </{expected}>, found </{found}>")]
    MismatchedTag {
        pos: usize,
        expected: String,
        found: String,
    },

    #[error("Unexpected end of file at {pos}: <{open}> is never closed")]
    UnexpectedEof { pos: usize, open: String },

    #[error("Document has no root element")]
    NoRootElement,

    #[error("Second root element at {pos}")]
    MultipleRoots { pos: usize },
}

impl ParseError {
    pub fn malformed(pos: usize, message: impl ToString) -> Self {
        Self::Malformed {
            pos,
            message: message.to_string(),
        }
    }

    pub fn mismatched_tag(pos: usize, expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::MismatchedTag {
            pos,
            expected: expected.into(),
            found: found.into(),
        }
    }

    pub fn unexpected_eof(pos: usize, open: impl Into<String>) -> Self {
        Self::UnexpectedEof {
            pos,
            open: open.into(),
        }
    }
}

/// Failures of the structural tree primitives
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("Node is not an element: {0}")]
    NotAnElement(NodeId),

    #[error("Node id already in use: {0}")]
    IdInUse(NodeId),

    #[error("Reference {reference} is not a child of {parent}")]
    NotAChild { parent: NodeId, reference: NodeId },

    #[error("The root element cannot be removed")]
    RootRemoval,

    #[error("Node is already detached: {0}")]
    Detached(NodeId),

    #[error("Cannot insert {0} into its own subtree")]
    Cycle(NodeId),
}
