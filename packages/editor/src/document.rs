//! # Document Handle
//!
//! A Document is one SCL file and its editing state. Documents are either
//! memory-backed (tests, piped input) or file-backed with disk persistence.
//!
//! ## Lifecycle
//!
//! ```text
//! Load → Parse → Plan → Apply → Save
//!   ↓      ↓       ↓       ↓      ↓
//! File   Tree  Actions  Tree   File
//! ```

use std::path::PathBuf;

use scl_parser::ast::Document as XmlDocument;
use scl_parser::{parse, Serializer};
use tracing::{debug, info};

use crate::actions::EditAction;
use crate::errors::EditorError;
use crate::intent::Intent;
use crate::undo_stack::UndoStack;

/// Editable SCL document
#[derive(Debug)]
pub struct Document {
    /// Path to source file (if any)
    pub path: PathBuf,

    /// Incremented by every applied edit, undo and redo
    pub version: u64,

    storage: DocumentStorage,
    history: UndoStack,
    indent: String,
}

/// Storage backend for document
#[derive(Debug)]
pub enum DocumentStorage {
    Memory {
        source: String,
        tree: XmlDocument,
    },

    File {
        source: String,
        tree: XmlDocument,
        dirty: bool,
    },
}

impl Document {
    /// Create document from source text (memory-backed)
    pub fn from_source(path: PathBuf, source: String) -> Result<Self, EditorError> {
        let tree = parse(&source)?;

        Ok(Self::new(path, DocumentStorage::Memory { source, tree }))
    }

    /// Load document from file (file-backed)
    pub fn load(path: PathBuf) -> Result<Self, EditorError> {
        let source = std::fs::read_to_string(&path)?;
        let tree = parse(&source)?;
        debug!(path = %path.display(), bytes = source.len(), "loaded");

        Ok(Self::new(
            path,
            DocumentStorage::File {
                source,
                tree,
                dirty: false,
            },
        ))
    }

    fn new(path: PathBuf, storage: DocumentStorage) -> Self {
        Self {
            path,
            version: 0,
            storage,
            history: UndoStack::new(),
            indent: "  ".to_string(),
        }
    }

    /// Indentation used when the tree is written back
    pub fn with_indent(mut self, indent: impl Into<String>) -> Self {
        self.indent = indent.into();
        self
    }

    pub fn tree(&self) -> &XmlDocument {
        match &self.storage {
            DocumentStorage::Memory { tree, .. } => tree,
            DocumentStorage::File { tree, .. } => tree,
        }
    }

    /// Source text of the current tree
    pub fn source(&self) -> &str {
        match &self.storage {
            DocumentStorage::Memory { source, .. } => source,
            DocumentStorage::File { source, .. } => source,
        }
    }

    /// Plan the actions for an intent against the current tree
    pub fn plan(&self, intent: &Intent) -> Result<Vec<EditAction>, EditorError> {
        Ok(intent.plan(self.tree())?)
    }

    /// Apply actions as one undoable transaction.
    ///
    /// Returns the inverse actions. A failing action leaves the document
    /// unchanged.
    pub fn apply(&mut self, actions: &[EditAction]) -> Result<Vec<EditAction>, EditorError> {
        let inverses = {
            let (history, tree) = self.split();
            history.apply(actions, tree)?
        };
        self.touch();
        info!(version = self.version, actions = actions.len(), "applied");
        Ok(inverses)
    }

    /// Plan and apply an intent
    pub fn execute(&mut self, intent: &Intent) -> Result<Vec<EditAction>, EditorError> {
        let actions = self.plan(intent)?;
        self.apply(&actions)?;
        Ok(actions)
    }

    /// Revert the last edit, `false` if there is nothing to undo
    pub fn undo(&mut self) -> Result<bool, EditorError> {
        let undone = {
            let (history, tree) = self.split();
            history.undo(tree)?
        };
        if undone {
            self.touch();
        }
        Ok(undone)
    }

    /// Reapply the last undone edit, `false` if there is nothing to redo
    pub fn redo(&mut self) -> Result<bool, EditorError> {
        let redone = {
            let (history, tree) = self.split();
            history.redo(tree)?
        };
        if redone {
            self.touch();
        }
        Ok(redone)
    }

    pub fn history(&self) -> &UndoStack {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut UndoStack {
        &mut self.history
    }

    pub fn is_dirty(&self) -> bool {
        match &self.storage {
            DocumentStorage::Memory { .. } => false,
            DocumentStorage::File { dirty, .. } => *dirty,
        }
    }

    /// Save document to its file
    pub fn save(&mut self) -> Result<(), EditorError> {
        match &mut self.storage {
            DocumentStorage::Memory { .. } => Err(EditorError::NotFileBacked),
            DocumentStorage::File { source, dirty, .. } => {
                std::fs::write(&self.path, source.as_bytes())?;
                *dirty = false;
                info!(path = %self.path.display(), "saved");
                Ok(())
            }
        }
    }

    fn split(&mut self) -> (&mut UndoStack, &mut XmlDocument) {
        let tree = match &mut self.storage {
            DocumentStorage::Memory { tree, .. } => tree,
            DocumentStorage::File { tree, .. } => tree,
        };
        (&mut self.history, tree)
    }

    /// Bump the version and rewrite the source after the tree changed
    fn touch(&mut self) {
        self.version += 1;
        let mut serializer = Serializer::with_indent(&self.indent);
        match &mut self.storage {
            DocumentStorage::Memory { source, tree } => *source = serializer.serialize(tree),
            DocumentStorage::File {
                source,
                tree,
                dirty,
            } => {
                *source = serializer.serialize(tree);
                *dirty = true;
            }
        }
    }
}
