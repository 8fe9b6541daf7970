//! The state container coordinating every diagram mutation.
//!
//! A single coordinator owns the canonical [`Diagram`] and mediates all
//! changes through an explicit event surface: the UI never mutates tables,
//! transitions, or shapes directly. Each mutation recalculates what it
//! touched, records its undo inverse, and writes through the persistence
//! adapter before returning — the new collections become canonical
//! atomically, never partially.

use crate::constants::{DEFAULT_TABLE_POSITION, NEW_TABLE_OFFSET_X};
use crate::recalc::recalculate;
use crate::storage::Persistence;
use crate::types::{
    Diagram, Row, Shape, ShapeId, Table, TableId, Transition, TransitionId,
};
use crate::undo::{UndoAction, UndoHistory, UndoableDiagram};

/// Which interaction phase the editor is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorPhase {
    /// Default; the canvas is fully interactive
    Idle,
    /// The row-editing dialog is open
    DialogOpen {
        /// The table whose dialog this is; `None` when creating a fresh table
        target: Option<TableId>,
    },
}

/// A mutation request. The only way the UI changes the diagram.
#[derive(Debug, Clone)]
pub enum EditorEvent {
    /// Open the row-editing dialog, optionally targeting an existing table
    OpenDialog { target: Option<TableId> },
    /// Close the dialog without committing
    CloseDialog,
    /// Commit the dialog's row set
    SaveState { rows: Vec<Row> },
    /// Reposition a table
    MoveTable {
        table_id: TableId,
        position: (f32, f32),
    },
    /// Delete a table and every transition touching it
    DeleteTable { table_id: TableId },
    /// Relabel a transition
    UpdateTransition {
        transition_id: TransitionId,
        text: String,
    },
    /// Add an annotation shape
    AddShape { shape: Shape },
    /// Reposition a shape
    MoveShape {
        shape_id: ShapeId,
        position: (f32, f32),
    },
    /// Change a shape's text
    UpdateShapeText { shape_id: ShapeId, text: String },
    /// Delete a shape
    DeleteShape { shape_id: ShapeId },
}

/// The coordinator owning the canonical diagram.
pub struct StateContainer {
    phase: EditorPhase,
    diagram: Diagram,
    persistence: Persistence,
    history: UndoHistory,
}

impl StateContainer {
    /// Creates a container, loading whatever the persistence adapter holds.
    ///
    /// The loaded diagram arrives rehydrated and recalculated.
    pub fn new(persistence: Persistence) -> Self {
        let diagram = persistence.load();
        Self {
            phase: EditorPhase::Idle,
            diagram,
            persistence,
            history: UndoHistory::new(),
        }
    }

    /// The current interaction phase.
    pub fn phase(&self) -> EditorPhase {
        self.phase
    }

    /// The canonical diagram.
    pub fn diagram(&self) -> &Diagram {
        &self.diagram
    }

    /// All state tables.
    pub fn tables(&self) -> &[Table] {
        &self.diagram.tables
    }

    /// All transitions.
    pub fn transitions(&self) -> &[Transition] {
        &self.diagram.transitions
    }

    /// All annotation shapes.
    pub fn shapes(&self) -> &[Shape] {
        &self.diagram.shapes
    }

    /// True if there is an action to undo.
    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    /// True if there is an action to redo.
    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Applies a mutation event.
    ///
    /// Events that are invalid in the current phase are ignored with a debug
    /// log; the UI cannot normally produce them.
    pub fn apply(&mut self, event: EditorEvent) {
        match event {
            EditorEvent::OpenDialog { target } => {
                if self.phase != EditorPhase::Idle {
                    log::debug!("ignoring OpenDialog while dialog already open");
                    return;
                }
                self.phase = EditorPhase::DialogOpen { target };
            }
            EditorEvent::CloseDialog => {
                self.phase = EditorPhase::Idle;
            }
            EditorEvent::SaveState { rows } => {
                let target = match self.phase {
                    EditorPhase::DialogOpen { target } => target,
                    EditorPhase::Idle => {
                        log::debug!("ignoring SaveState outside the dialog");
                        return;
                    }
                };
                self.commit_dialog(rows, target);
            }
            EditorEvent::MoveTable { table_id, position } => {
                if !self.expect_idle("MoveTable") {
                    return;
                }
                let Some(table) = self.diagram.table_mut(table_id) else {
                    log::debug!("MoveTable: no table {table_id}");
                    return;
                };
                let old_position = table.position;
                table.position = position;
                self.history.push_action(UndoAction::TableMoved {
                    table_id,
                    old_position,
                    new_position: position,
                });
                self.persistence.save(&self.diagram);
            }
            EditorEvent::DeleteTable { table_id } => {
                if !self.expect_idle("DeleteTable") {
                    return;
                }
                let Some(table) = self.diagram.table(table_id).cloned() else {
                    log::debug!("DeleteTable: no table {table_id}");
                    return;
                };
                let transitions: Vec<Transition> = self
                    .diagram
                    .transitions
                    .iter()
                    .filter(|t| t.from == table_id || t.to == table_id)
                    .cloned()
                    .collect();
                self.diagram.remove_table(table_id);
                self.history
                    .push_action(UndoAction::TableDeleted { table, transitions });
                self.persistence.save(&self.diagram);
            }
            EditorEvent::UpdateTransition {
                transition_id,
                text,
            } => {
                if !self.expect_idle("UpdateTransition") {
                    return;
                }
                let Some(transition) = self.diagram.transition_mut(transition_id) else {
                    log::debug!("UpdateTransition: no transition {transition_id}");
                    return;
                };
                let old_text = std::mem::replace(&mut transition.text, text.clone());
                self.history.push_action(UndoAction::TransitionTextChanged {
                    transition_id,
                    old_text,
                    new_text: text,
                });
                // Label edits alone do not write the store; the next
                // persisting mutation carries them along.
            }
            EditorEvent::AddShape { shape } => {
                if !self.expect_idle("AddShape") {
                    return;
                }
                let shape_id = shape.id;
                self.diagram.shapes.push(shape);
                self.history.push_action(UndoAction::ShapeAdded { shape_id });
                self.persistence.save(&self.diagram);
            }
            EditorEvent::MoveShape { shape_id, position } => {
                if !self.expect_idle("MoveShape") {
                    return;
                }
                let Some(shape) = self.diagram.shape_mut(shape_id) else {
                    log::debug!("MoveShape: no shape {shape_id}");
                    return;
                };
                let old_position = shape.position;
                shape.position = position;
                self.history.push_action(UndoAction::ShapeMoved {
                    shape_id,
                    old_position,
                    new_position: position,
                });
                self.persistence.save(&self.diagram);
            }
            EditorEvent::UpdateShapeText { shape_id, text } => {
                if !self.expect_idle("UpdateShapeText") {
                    return;
                }
                let Some(shape) = self.diagram.shape_mut(shape_id) else {
                    log::debug!("UpdateShapeText: no shape {shape_id}");
                    return;
                };
                let old_text = std::mem::replace(&mut shape.text, text.clone());
                self.history.push_action(UndoAction::ShapeTextChanged {
                    shape_id,
                    old_text,
                    new_text: text,
                });
                self.persistence.save(&self.diagram);
            }
            EditorEvent::DeleteShape { shape_id } => {
                if !self.expect_idle("DeleteShape") {
                    return;
                }
                let Some(shape) = self.diagram.shape(shape_id).cloned() else {
                    log::debug!("DeleteShape: no shape {shape_id}");
                    return;
                };
                self.diagram.remove_shape(shape_id);
                self.history
                    .push_action(UndoAction::ShapeDeleted { shape });
                self.persistence.save(&self.diagram);
            }
        }
    }

    /// Commits the dialog's rows: recalculate, then either spawn a successor
    /// table linked to the source, or append a brand-new table.
    fn commit_dialog(&mut self, rows: Vec<Row>, target: Option<TableId>) {
        let rows = recalculate(&rows, &self.diagram.tables);

        let source = target.and_then(|id| self.diagram.table(id).map(|t| (id, t.position)));
        let created = match source {
            Some((source_id, source_position)) => {
                let table = Table::new(
                    (source_position.0 + NEW_TABLE_OFFSET_X, source_position.1),
                    rows,
                );
                // The transition's endpoint reuses the id generated for the
                // table, so the edge can never dangle.
                let new_id = self.diagram.add_table(table);
                if let Err(err) = self
                    .diagram
                    .add_transition(Transition::new(source_id, new_id))
                {
                    log::error!("failed to link new table: {err}");
                }
                new_id
            }
            None => self
                .diagram
                .add_table(Table::new(DEFAULT_TABLE_POSITION, rows)),
        };

        self.history
            .push_action(UndoAction::TableCreated { table_id: created });
        self.phase = EditorPhase::Idle;
        self.persistence.save(&self.diagram);
    }

    /// Undoes the most recent mutation and persists the result.
    pub fn undo(&mut self) {
        if let Some(action) = self.history.pop_undo() {
            if let Some(inverse) = self.diagram.apply_undo(&action) {
                self.history.push_redo(inverse);
            }
            self.persistence.save(&self.diagram);
        }
    }

    /// Redoes the most recently undone mutation and persists the result.
    pub fn redo(&mut self) {
        if let Some(action) = self.history.pop_redo() {
            if let Some(inverse) = self.diagram.apply_redo(&action) {
                self.history.push_undone(inverse);
            }
            self.persistence.save(&self.diagram);
        }
    }

    /// Replaces the whole diagram (file import, sample loading).
    ///
    /// Recalculates every table of the replacement, clears history, and
    /// persists.
    pub fn replace_diagram(&mut self, diagram: Diagram) {
        let mut diagram = diagram;
        let context = diagram.tables.clone();
        for table in &mut diagram.tables {
            table.data = recalculate(&table.data, &context);
        }
        self.diagram = diagram;
        self.phase = EditorPhase::Idle;
        self.history.clear();
        self.persistence.save(&self.diagram);
    }

    fn expect_idle(&self, event: &str) -> bool {
        if self.phase == EditorPhase::Idle {
            true
        } else {
            log::debug!("ignoring {event} while the dialog is open");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryBackend, StorageBackend, StoreError};
    use crate::types::{RowValue, ShapeKind};
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Memory backend with a shared handle so tests can inspect what the
    /// container actually persisted.
    #[derive(Clone, Default)]
    struct SharedBackend(Rc<RefCell<MemoryBackend>>);

    impl SharedBackend {
        fn record(&self) -> Option<String> {
            self.0.borrow().record().map(str::to_string)
        }
    }

    impl StorageBackend for SharedBackend {
        fn read(&self) -> Result<Option<String>, StoreError> {
            self.0.borrow().read()
        }

        fn write(&mut self, record: &str) -> Result<(), StoreError> {
            self.0.borrow_mut().write(record)
        }
    }

    fn new_container() -> (StateContainer, SharedBackend) {
        let backend = SharedBackend::default();
        let container = StateContainer::new(Persistence::new(Box::new(backend.clone())));
        (container, backend)
    }

    #[test]
    fn test_fresh_table_created_at_default_position() {
        let (mut container, backend) = new_container();

        container.apply(EditorEvent::OpenDialog { target: None });
        assert_eq!(
            container.phase(),
            EditorPhase::DialogOpen { target: None }
        );

        container.apply(EditorEvent::SaveState {
            rows: vec![Row::number(1, "x", 10.0)],
        });

        assert_eq!(container.phase(), EditorPhase::Idle);
        assert_eq!(container.tables().len(), 1);
        assert_eq!(container.tables()[0].position, DEFAULT_TABLE_POSITION);
        assert!(backend.record().is_some());
    }

    #[test]
    fn test_targeted_save_spawns_linked_successor() {
        // The §8 scenario: edit table A, save, and a successor B appears
        // 500 world units to the right with a transition A→B.
        let (mut container, _backend) = new_container();

        container.apply(EditorEvent::OpenDialog { target: None });
        container.apply(EditorEvent::SaveState {
            rows: vec![Row::number(1, "x", 10.0)],
        });
        let a = container.tables()[0].id;
        let a_position = container.tables()[0].position;

        container.apply(EditorEvent::OpenDialog { target: Some(a) });
        container.apply(EditorEvent::SaveState {
            rows: vec![Row::number(1, "x", 10.0), Row::formula(2, "y", "x * 2")],
        });

        assert_eq!(container.tables().len(), 2);
        let b = &container.tables()[1];
        assert_eq!(b.position, (a_position.0 + 500.0, a_position.1));
        assert_eq!(b.data[1].result, Some(20.0));

        assert_eq!(container.transitions().len(), 1);
        let transition = &container.transitions()[0];
        assert_eq!(transition.from, a);
        // One id, generated once, shared by table and edge.
        assert_eq!(transition.to, b.id);
    }

    #[test]
    fn test_save_recalculates_before_commit() {
        let (mut container, backend) = new_container();
        container.apply(EditorEvent::OpenDialog { target: None });
        let mut formula_row = Row::formula(2, "y", "x + 5");
        formula_row.result = Some(999.0);
        container.apply(EditorEvent::SaveState {
            rows: vec![Row::number(1, "x", 1.0), formula_row],
        });

        assert_eq!(container.tables()[0].data[1].result, Some(6.0));
        let record = backend.record().unwrap();
        let value: serde_json::Value = serde_json::from_str(&record).unwrap();
        assert_eq!(value["stateTables"][0]["data"][1]["result"], 6.0);
    }

    #[test]
    fn test_delete_table_removes_referencing_transitions() {
        let (mut container, _backend) = new_container();
        container.apply(EditorEvent::OpenDialog { target: None });
        container.apply(EditorEvent::SaveState { rows: vec![] });
        let a = container.tables()[0].id;
        container.apply(EditorEvent::OpenDialog { target: Some(a) });
        container.apply(EditorEvent::SaveState { rows: vec![] });
        let b = container.tables()[1].id;
        assert_eq!(container.transitions().len(), 1);

        container.apply(EditorEvent::DeleteTable { table_id: b });

        assert_eq!(container.tables().len(), 1);
        assert!(container
            .transitions()
            .iter()
            .all(|t| t.from != b && t.to != b));
        assert!(container.transitions().is_empty());
    }

    #[test]
    fn test_move_table_updates_and_persists() {
        let (mut container, backend) = new_container();
        container.apply(EditorEvent::OpenDialog { target: None });
        container.apply(EditorEvent::SaveState { rows: vec![] });
        let id = container.tables()[0].id;

        container.apply(EditorEvent::MoveTable {
            table_id: id,
            position: (300.0, 400.0),
        });

        assert_eq!(container.tables()[0].position, (300.0, 400.0));
        let record = backend.record().unwrap();
        assert!(record.contains("300.0"));
    }

    #[test]
    fn test_update_transition_sets_text_without_persisting() {
        let (mut container, backend) = new_container();
        container.apply(EditorEvent::OpenDialog { target: None });
        container.apply(EditorEvent::SaveState { rows: vec![] });
        let a = container.tables()[0].id;
        container.apply(EditorEvent::OpenDialog { target: Some(a) });
        container.apply(EditorEvent::SaveState { rows: vec![] });
        let transition_id = container.transitions()[0].id;

        let before = backend.record();
        container.apply(EditorEvent::UpdateTransition {
            transition_id,
            text: "on submit".to_string(),
        });

        assert_eq!(container.transitions()[0].text, "on submit");
        // Label edits ride along with the next persisting mutation.
        assert_eq!(backend.record(), before);
    }

    #[test]
    fn test_out_of_phase_events_are_ignored() {
        let (mut container, _backend) = new_container();

        // SaveState without an open dialog does nothing.
        container.apply(EditorEvent::SaveState {
            rows: vec![Row::number(1, "x", 1.0)],
        });
        assert!(container.tables().is_empty());

        // Canvas mutations are refused while the dialog is open.
        container.apply(EditorEvent::OpenDialog { target: None });
        container.apply(EditorEvent::AddShape {
            shape: Shape::new(ShapeKind::Rectangle, (0.0, 0.0), (10.0, 10.0)),
        });
        assert!(container.shapes().is_empty());

        // A second OpenDialog cannot retarget the open dialog.
        container.apply(EditorEvent::OpenDialog {
            target: Some(uuid::Uuid::new_v4()),
        });
        assert_eq!(
            container.phase(),
            EditorPhase::DialogOpen { target: None }
        );
    }

    #[test]
    fn test_close_dialog_returns_to_idle() {
        let (mut container, _backend) = new_container();
        container.apply(EditorEvent::OpenDialog { target: None });
        container.apply(EditorEvent::CloseDialog);
        assert_eq!(container.phase(), EditorPhase::Idle);
        assert!(container.tables().is_empty());
    }

    #[test]
    fn test_undo_save_state_removes_table_and_transition() {
        let (mut container, _backend) = new_container();
        container.apply(EditorEvent::OpenDialog { target: None });
        container.apply(EditorEvent::SaveState { rows: vec![] });
        let a = container.tables()[0].id;
        container.apply(EditorEvent::OpenDialog { target: Some(a) });
        container.apply(EditorEvent::SaveState { rows: vec![] });
        assert_eq!(container.tables().len(), 2);
        assert_eq!(container.transitions().len(), 1);

        container.undo();
        assert_eq!(container.tables().len(), 1);
        assert!(container.transitions().is_empty());

        container.redo();
        assert_eq!(container.tables().len(), 2);
        assert_eq!(container.transitions().len(), 1);
    }

    #[test]
    fn test_undo_move_restores_position() {
        let (mut container, _backend) = new_container();
        container.apply(EditorEvent::OpenDialog { target: None });
        container.apply(EditorEvent::SaveState { rows: vec![] });
        let id = container.tables()[0].id;
        let original = container.tables()[0].position;

        container.apply(EditorEvent::MoveTable {
            table_id: id,
            position: (900.0, 900.0),
        });
        container.undo();
        assert_eq!(container.tables()[0].position, original);
        container.redo();
        assert_eq!(container.tables()[0].position, (900.0, 900.0));
    }

    #[test]
    fn test_shape_events_roundtrip() {
        let (mut container, backend) = new_container();
        let shape = Shape::new(ShapeKind::Line, (1.0, 2.0), (30.0, 0.0));
        let id = shape.id;

        container.apply(EditorEvent::AddShape { shape });
        assert_eq!(container.shapes().len(), 1);
        assert!(backend.record().unwrap().contains("stateShapes"));

        container.apply(EditorEvent::MoveShape {
            shape_id: id,
            position: (50.0, 60.0),
        });
        assert_eq!(container.shapes()[0].position, (50.0, 60.0));

        container.apply(EditorEvent::UpdateShapeText {
            shape_id: id,
            text: "note".to_string(),
        });
        assert_eq!(container.shapes()[0].text, "note");

        container.apply(EditorEvent::DeleteShape { shape_id: id });
        assert!(container.shapes().is_empty());

        container.undo();
        assert_eq!(container.shapes().len(), 1);
        assert_eq!(container.shapes()[0].text, "note");
    }

    #[test]
    fn test_replace_diagram_recalculates_and_clears_history() {
        let (mut container, _backend) = new_container();
        container.apply(EditorEvent::OpenDialog { target: None });
        container.apply(EditorEvent::SaveState { rows: vec![] });
        assert!(container.can_undo());

        let mut diagram = Diagram::new();
        diagram.add_table(Table::new(
            (0.0, 0.0),
            vec![Row::number(1, "x", 4.0), Row::formula(2, "y", "x + 1")],
        ));
        container.replace_diagram(diagram);

        assert_eq!(container.tables()[0].data[1].result, Some(5.0));
        assert!(!container.can_undo());
        assert!(!container.can_redo());
    }

    #[test]
    fn test_container_restores_from_backend() {
        let (mut container, backend) = new_container();
        container.apply(EditorEvent::OpenDialog { target: None });
        container.apply(EditorEvent::SaveState {
            rows: vec![
                Row::number(1, "x", 3.0),
                Row::formula(2, "y", "x * 7"),
            ],
        });

        // A second container over the same backend sees the same diagram,
        // recalculated.
        let revived = StateContainer::new(Persistence::new(Box::new(backend)));
        assert_eq!(revived.tables().len(), 1);
        assert_eq!(revived.tables()[0].data[1].result, Some(21.0));
        assert_eq!(
            revived.tables()[0].data[0].value,
            RowValue::Number(3.0)
        );
    }
}
