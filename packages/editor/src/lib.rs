//! # SCL Editor
//!
//! Consistency-preserving edits of IEC 61850 SCL documents.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ parser: SCL text → XML tree                 │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ queries: identity, ExtRef matching,         │
//! │  control blocks, supervision, schema order  │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ mutators: data sets, FCDAs, GSE,            │
//! │  GSEControl, unsubscribe → EditAction list  │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ host: Document + UndoStack apply actions    │
//! │  as one transaction                         │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **Read, then write**: mutators only read the tree and return actions
//! 2. **Cascades are explicit**: every dependent change is its own action
//! 3. **All or nothing**: an action list applies completely or not at all
//! 4. **Every edit is reversible**: applying an action yields its inverse
//!
//! ## Usage
//!
//! ```rust,ignore
//! use scl_editor::{Document, Intent};
//!
//! let mut doc = Document::load("station.scd".into())?;
//!
//! let intent: Intent = serde_json::from_str(r#"{
//!     "intent": "removeControlBlock",
//!     "controlBlock": "GSEControl: IED1>>ld1>>gse"
//! }"#)?;
//! doc.execute(&intent)?;
//!
//! doc.undo()?;
//! doc.save()?;
//! ```
//!
//! Mutators can also be called directly on a parsed tree:
//!
//! ```rust,ignore
//! use scl_editor::{apply_transaction, data_set::remove_data_set};
//!
//! let mut tree = scl_parser::parse(source)?;
//! let data_set = tree.elements_by_tag("DataSet").next().unwrap();
//! let actions = remove_data_set(data_set);
//! apply_transaction(&mut tree, &actions)?;
//! ```

pub mod actions;
pub mod connected_ap;
pub mod control_block;
pub mod data_set;
pub mod ext_ref;
pub mod fcda;
pub mod generators;
pub mod gse;
pub mod gse_control;
pub mod identity;
pub mod intent;
pub mod schema;
pub mod scl;
pub mod supervision;

mod document;
mod errors;
mod undo_stack;

pub use actions::{apply_transaction, Attributes, EditAction, MutationError};
pub use document::{Document, DocumentStorage};
pub use errors::EditorError;
pub use identity::{identity, selector, Selector, SelectorError};
pub use intent::{FcPathSelector, Intent, IntentError};
pub use undo_stack::{ActionBatch, UndoStack};

// Re-export common types for convenience
pub use scl_parser::ast::Document as XmlDocument;
