pub mod ast;
pub mod error;
pub mod parser;
pub mod serializer;

pub use ast::{Attribute, Document, Fragment, Node, NodeId, NodeKind, Removed};
pub use error::{ParseError, ParseResult, TreeError};
pub use parser::parse;
pub use serializer::{serialize, Serializer};
