//! Application state management structures.
//!
//! This module contains the UI-side state that tracks canvas navigation,
//! in-flight interactions, and the row-editing dialog's draft, plus the main
//! [`DiagramApp`] struct. None of this is canonical diagram state — that
//! lives in the [`StateContainer`] and only changes through its events.

use crate::recalc::recalculate;
use crate::state::StateContainer;
use crate::storage::Persistence;
use crate::types::{
    DateFormat, Row, RowKind, RowValue, ShapeId, Table, TableId, TransitionId,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use eframe::egui;

/// Tool selected in the toolbar, deciding what canvas clicks do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanvasTool {
    /// Select, drag, and edit existing elements
    Select,
    /// Drag out a rectangle annotation
    Rectangle,
    /// Drag out a line annotation
    Line,
    /// Place a text annotation
    Text,
}

/// State related to canvas navigation and display.
pub struct CanvasState {
    /// Current canvas pan offset for navigation (in screen space)
    pub offset: egui::Vec2,
    /// Current zoom level (1.0 = normal)
    pub zoom_factor: f32,
    /// Whether the grid should be displayed on the canvas
    pub show_grid: bool,
}

impl Default for CanvasState {
    fn default() -> Self {
        Self {
            offset: egui::Vec2::ZERO,
            zoom_factor: 1.0,
            show_grid: true,
        }
    }
}

/// State related to in-flight user interactions with the canvas.
#[derive(Default)]
pub struct InteractionState {
    /// Currently selected table, if any
    pub selected_table: Option<TableId>,
    /// Currently selected transition, if any
    pub selected_transition: Option<TransitionId>,
    /// Currently selected shape, if any
    pub selected_shape: Option<ShapeId>,
    /// Table currently being dragged
    pub dragging_table: Option<TableId>,
    /// Shape currently being dragged
    pub dragging_shape: Option<ShapeId>,
    /// Offset from the pointer to the dragged element's origin (world units)
    pub drag_offset: egui::Vec2,
    /// The dragged element's position before the drag started
    pub drag_original_position: Option<(f32, f32)>,
    /// Live position of the dragged element; committed on release
    pub drag_preview: Option<(f32, f32)>,
    /// World position where a rectangle/line drag began
    pub drawing_shape_start: Option<egui::Pos2>,
    /// Current world position of an in-flight shape drag
    pub drawing_shape_end: Option<egui::Pos2>,
    /// Whether the user is currently panning the canvas
    pub is_panning: bool,
    /// Last pointer position during panning
    pub last_pan_pos: Option<egui::Pos2>,
    /// Edit buffer for the selected transition's label
    pub transition_text_draft: String,
    /// Edit buffer for the selected shape's text
    pub shape_text_draft: String,
}

impl InteractionState {
    /// Clears every selection and edit buffer.
    pub fn clear_selection(&mut self) {
        self.selected_table = None;
        self.selected_transition = None;
        self.selected_shape = None;
        self.transition_text_draft.clear();
        self.shape_text_draft.clear();
    }
}

/// One row being edited in the dialog: the row itself plus the text the user
/// is typing into its value cell (parsed on every change).
pub struct RowDraft {
    /// The row under edit
    pub row: Row,
    /// Raw text of the value cell
    pub value_text: String,
}

impl RowDraft {
    /// Wraps an existing row for editing.
    pub fn from_row(row: Row) -> Self {
        let value_text = row.value.raw_text();
        Self { row, value_text }
    }

    /// Re-parses the value cell into the row's typed value.
    pub fn sync_value(&mut self) {
        self.row.value = parse_value(&self.value_text, self.row.kind);
    }
}

/// Draft state of the row-editing dialog.
#[derive(Default)]
pub struct DialogState {
    /// Rows under edit
    pub drafts: Vec<RowDraft>,
    /// Next per-table row id to hand out
    pub next_row_id: u32,
}

impl DialogState {
    /// Seeds the dialog from an existing table's rows.
    pub fn from_rows(rows: &[Row]) -> Self {
        let next_row_id = rows.iter().map(|r| r.id + 1).max().unwrap_or(1);
        Self {
            drafts: rows.iter().cloned().map(RowDraft::from_row).collect(),
            next_row_id,
        }
    }

    /// Appends a fresh empty row.
    pub fn add_row(&mut self) {
        let row = Row::new(
            self.next_row_id,
            String::new(),
            RowValue::Number(0.0),
            RowKind::Number,
        );
        self.next_row_id += 1;
        self.drafts.push(RowDraft::from_row(row));
    }

    /// Removes the row at `index`.
    pub fn remove_row(&mut self, index: usize) {
        if index < self.drafts.len() {
            self.drafts.remove(index);
        }
    }

    /// The current draft rows.
    pub fn rows(&self) -> Vec<Row> {
        self.drafts.iter().map(|d| d.row.clone()).collect()
    }

    /// Recomputes every formula row of the draft against the given tables.
    ///
    /// Called on every cell edit, so one row's edited value immediately
    /// shows up in its siblings' results.
    pub fn recalculate(&mut self, all_tables: &[Table]) {
        let rows = self.rows();
        let recalculated = recalculate(&rows, all_tables);
        for (draft, row) in self.drafts.iter_mut().zip(recalculated) {
            draft.row = row;
        }
    }
}

/// Parses a value cell's text into a typed value for the given row kind.
///
/// Numeric kinds parse strictly; date kinds accept ISO-8601 as well as
/// `YYYY-MM-DD` and `YYYY-MM-DD HH:MM`. Anything unparseable stays text.
pub fn parse_value(text: &str, kind: RowKind) -> RowValue {
    let trimmed = text.trim();
    match kind {
        RowKind::Number | RowKind::Percentage | RowKind::Formula => trimmed
            .parse::<f64>()
            .map(RowValue::Number)
            .unwrap_or_else(|_| RowValue::Text(text.to_string())),
        RowKind::Date | RowKind::DateTime => parse_date(trimmed)
            .map(RowValue::Instant)
            .unwrap_or_else(|| RowValue::Text(text.to_string())),
        RowKind::Text => RowValue::Text(text.to_string()),
    }
}

fn parse_date(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(text) {
        return Some(instant.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M") {
        return Some(naive.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc());
    }
    None
}

/// Default display format for a freshly typed date value.
pub fn default_date_format(kind: RowKind) -> Option<DateFormat> {
    match kind {
        RowKind::Date => Some(DateFormat::Date),
        RowKind::DateTime => Some(DateFormat::DateTime),
        _ => None,
    }
}

/// The main application structure containing UI state and the state
/// container that owns the diagram.
pub struct DiagramApp {
    /// The coordinator owning the canonical diagram
    pub container: StateContainer,
    /// Canvas navigation and display state
    pub canvas: CanvasState,
    /// User interaction state
    pub interaction: InteractionState,
    /// Row-editing dialog draft
    pub dialog: DialogState,
    /// Active canvas tool
    pub tool: CanvasTool,
    /// Whether dark mode visuals are enabled
    pub dark_mode: bool,
}

impl DiagramApp {
    /// Creates the app over an explicit persistence adapter.
    pub fn with_persistence(persistence: Persistence) -> Self {
        Self {
            container: StateContainer::new(persistence),
            canvas: CanvasState::default(),
            interaction: InteractionState::default(),
            dialog: DialogState::default(),
            tool: CanvasTool::Select,
            dark_mode: true,
        }
    }

    /// Creates the app with platform-appropriate storage.
    ///
    /// Native builds read and write a JSON file next to the executable's
    /// working directory; WASM builds keep the record in memory and mirror
    /// it into eframe storage (browser local storage) on save points.
    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        #[cfg(not(target_arch = "wasm32"))]
        {
            let _ = cc;
            Self::with_persistence(Persistence::new(Box::new(
                crate::storage::JsonFileBackend::default(),
            )))
        }
        #[cfg(target_arch = "wasm32")]
        {
            use crate::storage::MemoryBackend;
            let backend = cc
                .storage
                .and_then(|s| s.get_string(crate::constants::STORAGE_KEY))
                .map(MemoryBackend::with_record)
                .unwrap_or_default();
            Self::with_persistence(Persistence::new(Box::new(backend)))
        }
    }
}

impl Default for DiagramApp {
    /// An app over an empty in-memory store; used by tests.
    fn default() -> Self {
        Self::with_persistence(Persistence::new(Box::new(
            crate::storage::MemoryBackend::new(),
        )))
    }
}
