//! Undo/redo functionality for tracking and reversing diagram mutations.
//!
//! Every entity on the canvas — tables, transitions, shapes — goes through
//! the same history, so undo semantics stay consistent regardless of what
//! was edited. The state container records an action per mutation and
//! applies inverses from here.

use crate::constants::MAX_UNDO_HISTORY;
use crate::types::{Diagram, Shape, ShapeId, Table, TableId, Transition, TransitionId};

/// Represents different kinds of mutations that can be undone.
#[derive(Debug, Clone)]
pub enum UndoAction {
    /// A table was moved from one position to another
    TableMoved {
        table_id: TableId,
        old_position: (f32, f32),
        new_position: (f32, f32),
    },
    /// A table was deleted along with the transitions touching it
    TableDeleted {
        table: Table,
        transitions: Vec<Transition>,
    },
    /// A table was created (possibly with a linking transition)
    TableCreated { table_id: TableId },
    /// A transition's label was changed
    TransitionTextChanged {
        transition_id: TransitionId,
        old_text: String,
        new_text: String,
    },
    /// A shape was added
    ShapeAdded { shape_id: ShapeId },
    /// A shape was deleted
    ShapeDeleted { shape: Shape },
    /// A shape was moved
    ShapeMoved {
        shape_id: ShapeId,
        old_position: (f32, f32),
        new_position: (f32, f32),
    },
    /// A shape's text was changed
    ShapeTextChanged {
        shape_id: ShapeId,
        old_text: String,
        new_text: String,
    },
}

/// Manages undo/redo history for the editor.
#[derive(Debug, Clone, Default)]
pub struct UndoHistory {
    /// Stack of actions that can be undone
    undo_stack: Vec<UndoAction>,
    /// Stack of actions that can be redone
    redo_stack: Vec<UndoAction>,
}

impl UndoHistory {
    /// Creates a new empty undo history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an action to the undo history.
    ///
    /// Clears the redo stack, since a new action invalidates any previously
    /// undone actions.
    pub fn push_action(&mut self, action: UndoAction) {
        self.undo_stack.push(action);
        self.redo_stack.clear();

        if self.undo_stack.len() > MAX_UNDO_HISTORY {
            self.undo_stack.remove(0);
        }
    }

    /// Returns true if there are actions that can be undone.
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    /// Returns true if there are actions that can be redone.
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Pops the most recent action from the undo stack.
    pub fn pop_undo(&mut self) -> Option<UndoAction> {
        self.undo_stack.pop()
    }

    /// Pops the most recent action from the redo stack.
    pub fn pop_redo(&mut self) -> Option<UndoAction> {
        self.redo_stack.pop()
    }

    /// Pushes an undone action onto the redo stack.
    pub fn push_redo(&mut self, action: UndoAction) {
        self.redo_stack.push(action);
    }

    /// Pushes a redone action back onto the undo stack.
    ///
    /// Unlike [`push_action`](Self::push_action) this keeps the redo stack,
    /// so a chain of redos stays walkable.
    pub fn push_undone(&mut self, action: UndoAction) {
        self.undo_stack.push(action);
    }

    /// Clears all undo and redo history.
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

/// Extension methods for applying undo/redo actions to a diagram.
pub trait UndoableDiagram {
    /// Reverses an action, returning the action that would redo it.
    fn apply_undo(&mut self, action: &UndoAction) -> Option<UndoAction>;

    /// Re-applies an undone action.
    fn apply_redo(&mut self, action: &UndoAction) -> Option<UndoAction>;
}

impl UndoableDiagram for Diagram {
    fn apply_undo(&mut self, action: &UndoAction) -> Option<UndoAction> {
        match action {
            UndoAction::TableMoved {
                table_id,
                old_position,
                new_position,
            } => {
                let table = self.table_mut(*table_id)?;
                table.position = *old_position;
                Some(UndoAction::TableMoved {
                    table_id: *table_id,
                    old_position: *new_position,
                    new_position: *old_position,
                })
            }
            UndoAction::TableDeleted { table, transitions } => {
                self.tables.push(table.clone());
                for transition in transitions {
                    self.transitions.push(transition.clone());
                }
                Some(UndoAction::TableCreated { table_id: table.id })
            }
            UndoAction::TableCreated { table_id } => {
                let table = self
                    .tables
                    .iter()
                    .find(|t| t.id == *table_id)
                    .cloned()?;
                let transitions: Vec<Transition> = self
                    .transitions
                    .iter()
                    .filter(|t| t.from == *table_id || t.to == *table_id)
                    .cloned()
                    .collect();
                self.remove_table(*table_id);
                Some(UndoAction::TableDeleted { table, transitions })
            }
            UndoAction::TransitionTextChanged {
                transition_id,
                old_text,
                new_text,
            } => {
                let transition = self.transition_mut(*transition_id)?;
                transition.text = old_text.clone();
                Some(UndoAction::TransitionTextChanged {
                    transition_id: *transition_id,
                    old_text: new_text.clone(),
                    new_text: old_text.clone(),
                })
            }
            UndoAction::ShapeAdded { shape_id } => {
                let shape = self.shape(*shape_id).cloned()?;
                self.remove_shape(*shape_id);
                Some(UndoAction::ShapeDeleted { shape })
            }
            UndoAction::ShapeDeleted { shape } => {
                self.shapes.push(shape.clone());
                Some(UndoAction::ShapeAdded { shape_id: shape.id })
            }
            UndoAction::ShapeMoved {
                shape_id,
                old_position,
                new_position,
            } => {
                let shape = self.shape_mut(*shape_id)?;
                shape.position = *old_position;
                Some(UndoAction::ShapeMoved {
                    shape_id: *shape_id,
                    old_position: *new_position,
                    new_position: *old_position,
                })
            }
            UndoAction::ShapeTextChanged {
                shape_id,
                old_text,
                new_text,
            } => {
                let shape = self.shape_mut(*shape_id)?;
                shape.text = old_text.clone();
                Some(UndoAction::ShapeTextChanged {
                    shape_id: *shape_id,
                    old_text: new_text.clone(),
                    new_text: old_text.clone(),
                })
            }
        }
    }

    fn apply_redo(&mut self, action: &UndoAction) -> Option<UndoAction> {
        // Redo is just applying the inverse of an undo.
        self.apply_undo(action)
    }
}
