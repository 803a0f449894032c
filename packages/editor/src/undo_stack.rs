//! # Undo/Redo Stack
//!
//! Edit history of a document.
//!
//! ## Design
//!
//! - Every action list is applied as one transaction and its inverses kept
//! - Undo applies the inverses and moves the batch to the redo stack
//! - Redo reapplies the original actions
//! - New edits clear the redo stack
//! - Several action lists can be grouped into one undo step
//!
//! ## Example
//!
//! ```rust,ignore
//! let mut stack = UndoStack::new();
//! let actions = remove_control_block(gse_control);
//!
//! stack.apply(&actions, &mut doc)?;
//! stack.undo(&mut doc)?;
//! stack.redo(&mut doc)?;
//! ```

use scl_parser::ast::Document;
use tracing::debug;

use crate::actions::{apply_transaction, EditAction, MutationError};

/// Actions undone and redone together
#[derive(Debug, Clone)]
pub struct ActionBatch {
    /// The actions in application order
    pub actions: Vec<EditAction>,

    /// Actions reverting the batch, in application order
    pub inverses: Vec<EditAction>,

    pub description: Option<String>,
}

impl ActionBatch {
    pub fn new(actions: Vec<EditAction>, inverses: Vec<EditAction>) -> Self {
        Self {
            actions,
            inverses,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    fn append(&mut self, actions: &[EditAction], mut inverses: Vec<EditAction>) {
        self.actions.extend_from_slice(actions);
        // later edits are reverted first
        inverses.append(&mut self.inverses);
        self.inverses = inverses;
    }
}

/// Undo/redo stack for document editing
#[derive(Debug)]
pub struct UndoStack {
    /// Applied batches, most recent last
    undo_stack: Vec<ActionBatch>,

    /// Undone batches, most recent last
    redo_stack: Vec<ActionBatch>,

    /// Maximum number of undo levels
    max_levels: usize,

    /// Batch being collected between `begin_batch` and `end_batch`
    current_batch: Option<ActionBatch>,
}

impl UndoStack {
    /// Create a new undo stack with default settings (100 levels)
    pub fn new() -> Self {
        Self::with_max_levels(100)
    }

    pub fn with_max_levels(max_levels: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_levels,
            current_batch: None,
        }
    }

    /// Apply actions as one transaction and record them.
    ///
    /// Returns the inverses of the applied actions. Nothing is recorded when
    /// the transaction fails.
    pub fn apply(
        &mut self,
        actions: &[EditAction],
        doc: &mut Document,
    ) -> Result<Vec<EditAction>, MutationError> {
        let inverses = apply_transaction(doc, actions)?;
        if actions.is_empty() {
            return Ok(inverses);
        }

        match &mut self.current_batch {
            Some(batch) => batch.append(actions, inverses.clone()),
            None => self.push_batch(ActionBatch::new(actions.to_vec(), inverses.clone())),
        }
        Ok(inverses)
    }

    /// Group following edits into one undo step
    pub fn begin_batch(&mut self) {
        if self.current_batch.is_none() {
            self.current_batch = Some(ActionBatch::new(Vec::new(), Vec::new()));
        }
    }

    /// Close the current group, empty groups are dropped
    pub fn end_batch(&mut self) {
        if let Some(batch) = self.current_batch.take() {
            if !batch.actions.is_empty() {
                self.push_batch(batch);
            }
        }
    }

    pub fn set_batch_description(&mut self, description: impl Into<String>) {
        if let Some(batch) = &mut self.current_batch {
            batch.description = Some(description.into());
        }
    }

    /// Record an already applied batch
    pub fn push_batch(&mut self, batch: ActionBatch) {
        self.undo_stack.push(batch);
        self.redo_stack.clear();

        if self.undo_stack.len() > self.max_levels {
            self.undo_stack.remove(0);
        }
    }

    /// Revert the most recent batch, `false` if there is none
    pub fn undo(&mut self, doc: &mut Document) -> Result<bool, MutationError> {
        let Some(batch) = self.undo_stack.pop() else {
            return Ok(false);
        };

        match apply_transaction(doc, &batch.inverses) {
            Ok(_) => {
                debug!(actions = batch.actions.len(), "undone");
                self.redo_stack.push(batch);
                Ok(true)
            }
            Err(err) => {
                self.undo_stack.push(batch);
                Err(err)
            }
        }
    }

    /// Reapply the most recently undone batch, `false` if there is none
    pub fn redo(&mut self, doc: &mut Document) -> Result<bool, MutationError> {
        let Some(mut batch) = self.redo_stack.pop() else {
            return Ok(false);
        };

        match apply_transaction(doc, &batch.actions) {
            Ok(inverses) => {
                debug!(actions = batch.actions.len(), "redone");
                batch.inverses = inverses;
                self.undo_stack.push(batch);
                Ok(true)
            }
            Err(err) => {
                self.redo_stack.push(batch);
                Err(err)
            }
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_levels(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_levels(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.current_batch = None;
    }

    pub fn undo_description(&self) -> Option<&str> {
        self.undo_stack
            .last()
            .and_then(|batch| batch.description.as_deref())
    }

    pub fn redo_description(&self) -> Option<&str> {
        self.redo_stack
            .last()
            .and_then(|batch| batch.description.as_deref())
    }
}

impl Default for UndoStack {
    fn default() -> Self {
        Self::new()
    }
}
