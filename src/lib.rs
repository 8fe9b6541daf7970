//! # Statesheet
//!
//! A visual editor for state diagrams whose states are small tables of
//! typed, named rows — numbers, percentages, dates, and spreadsheet-like
//! formulas over row names. Tables are dragged around a canvas, connected
//! by labeled transition arrows, and annotated with simple shapes; the
//! whole diagram persists across sessions in a local store.
//!
//! ## Features
//! - Formula rows computed from arithmetic over row names, resolved across
//!   every table on the canvas
//! - Full recalculation whenever any input value changes
//! - A state container mediating every mutation, with undo/redo across all
//!   canvas entities
//! - Automatic persistence with date round-tripping, plus JSON export and
//!   import of diagram documents
//! - Canvas panning, zooming, and annotation shapes

#![warn(missing_docs)]
#![deny(unsafe_code)]

mod constants;
mod formula;
mod recalc;
mod samples;
mod state;
mod storage;
mod types;
mod ui;
mod undo;

// Re-export public types and functions
pub use formula::{evaluate_formula, evaluate_formula_checked, FormulaError};
pub use recalc::recalculate;
pub use samples::{all_samples, build_sample, SampleKind};
pub use state::{EditorEvent, EditorPhase, StateContainer};
pub use storage::{
    encode_record, restore_record, MemoryBackend, Persistence, StorageBackend, StoreError,
};
pub use types::*;
pub use ui::{CanvasTool, DiagramApp};
pub use undo::{UndoAction, UndoHistory, UndoableDiagram};

#[cfg(not(target_arch = "wasm32"))]
pub use storage::JsonFileBackend;

/// Runs the editor application with default settings.
///
/// This function initializes the egui application window and starts the
/// main event loop.
///
/// # Returns
///
/// Returns `Ok(())` if the application runs successfully, or an
/// `eframe::Error` if initialization fails.
///
/// # Example
///
/// ```no_run
/// use statesheet::run_app;
///
/// fn main() -> Result<(), eframe::Error> {
///     run_app()
/// }
/// ```
#[cfg(not(target_arch = "wasm32"))]
pub fn run_app() -> Result<(), eframe::Error> {
    let options = eframe::NativeOptions::default();
    eframe::run_native(
        "Statesheet",
        options,
        Box::new(|cc| Ok(Box::new(DiagramApp::new(cc)))),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagram_default() {
        let diagram = Diagram::default();
        assert!(diagram.tables.is_empty());
        assert!(diagram.transitions.is_empty());
        assert!(diagram.shapes.is_empty());
    }

    #[test]
    fn test_public_formula_surface() {
        let rows = vec![Row::number(1, "a", 2.0), Row::number(2, "b", 3.0)];
        assert_eq!(evaluate_formula("a + b * 2", &rows, &[]), 8.0);
        assert_eq!(evaluate_formula("nope + 1", &rows, &[]), 0.0);
    }

    #[test]
    fn test_public_recalculate_surface() {
        let rows = vec![Row::number(1, "a", 2.0), Row::formula(2, "twice", "a * 2")];
        let out = recalculate(&rows, &[]);
        assert_eq!(out[1].result, Some(4.0));
    }
}
