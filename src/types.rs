//! Core data types and structures for the state-table diagram editor.
//!
//! This module defines all the fundamental data structures used throughout the
//! application: typed rows, state tables, transitions between tables, canvas
//! annotation shapes, and the diagram aggregate that owns them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for state tables.
pub type TableId = Uuid;

/// Unique identifier for transitions between tables.
pub type TransitionId = Uuid;

/// Unique identifier for canvas annotation shapes.
pub type ShapeId = Uuid;

/// The declared type of a row's value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RowKind {
    /// Free text, not usable in arithmetic unless it parses as a number
    #[serde(rename = "string")]
    Text,
    /// A plain numeric value
    Number,
    /// A calendar date instant
    Date,
    /// A date-and-time instant
    DateTime,
    /// A fraction stored as e.g. 0.25 and displayed as "25.00%"
    Percentage,
    /// A row whose value is computed from an arithmetic formula
    Formula,
}

/// Display format applied to date-valued rows.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DateFormat {
    /// Date only, `YYYY-MM-DD`
    Date,
    /// Date and time, `YYYY-MM-DD HH:MM`
    DateTime,
}

/// A row's stored value.
///
/// Dates serialize as ISO-8601 strings; a freshly deserialized record
/// therefore carries them as [`RowValue::Text`] until the storage layer's
/// rehydration pass converts date-kind rows back to instants.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum RowValue {
    /// A numeric value
    Number(f64),
    /// A text value (also the degraded form of a serialized date)
    Text(String),
    /// A concrete date-time instant
    Instant(DateTime<Utc>),
}

impl RowValue {
    /// Renders the raw value without any row-kind-specific formatting.
    pub fn raw_text(&self) -> String {
        match self {
            RowValue::Number(n) => format_number(*n),
            RowValue::Text(s) => s.clone(),
            RowValue::Instant(t) => t.to_rfc3339(),
        }
    }
}

/// One named, typed value (or formula) within a state table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Row {
    /// Identifier unique within the owning table (not globally)
    pub id: u32,
    /// Name other rows' formulas refer to
    pub name: String,
    /// The stored value; for formula rows this is the raw input, never the
    /// computed result
    pub value: RowValue,
    /// Declared type of the value
    #[serde(rename = "type")]
    pub kind: RowKind,
    /// Display format for date-valued rows
    #[serde(rename = "dateFormat", default, skip_serializing_if = "Option::is_none")]
    pub date_format: Option<DateFormat>,
    /// Free-text annotation, never computed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    /// Arithmetic expression over row names; empty means no formula
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub formula: String,
    /// Computed value; present only while `formula` is non-empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<f64>,
    /// Why the last evaluation failed, if it did; diagnostic only
    #[serde(skip)]
    pub diagnostic: Option<crate::formula::FormulaError>,
}

impl Row {
    /// Creates a new row with the given identity, value, and kind.
    pub fn new(id: u32, name: impl Into<String>, value: RowValue, kind: RowKind) -> Self {
        Self {
            id,
            name: name.into(),
            value,
            kind,
            date_format: None,
            output: None,
            formula: String::new(),
            result: None,
            diagnostic: None,
        }
    }

    /// Creates a plain numeric row.
    pub fn number(id: u32, name: impl Into<String>, value: f64) -> Self {
        Self::new(id, name, RowValue::Number(value), RowKind::Number)
    }

    /// Creates a formula row with the given expression and a zero raw value.
    pub fn formula(id: u32, name: impl Into<String>, expr: impl Into<String>) -> Self {
        let mut row = Self::new(id, name, RowValue::Number(0.0), RowKind::Formula);
        row.formula = expr.into();
        row
    }

    /// Renders the row's value the way the canvas shows it.
    ///
    /// Formula rows display their computed result; percentage rows display
    /// their stored fraction as a percentage with two decimals; date rows
    /// follow their display format, falling back to the raw string when the
    /// stored date never rehydrated.
    pub fn display_value(&self) -> String {
        if !self.formula.is_empty() {
            return self.result.map(format_number).unwrap_or_default();
        }
        match self.kind {
            RowKind::Percentage => match &self.value {
                RowValue::Number(f) => format!("{:.2}%", f * 100.0),
                other => other.raw_text(),
            },
            RowKind::Date | RowKind::DateTime => match &self.value {
                RowValue::Instant(t) => {
                    let format = self.date_format.unwrap_or(match self.kind {
                        RowKind::DateTime => DateFormat::DateTime,
                        _ => DateFormat::Date,
                    });
                    match format {
                        DateFormat::Date => t.format("%Y-%m-%d").to_string(),
                        DateFormat::DateTime => t.format("%Y-%m-%d %H:%M").to_string(),
                    }
                }
                other => other.raw_text(),
            },
            _ => self.value.raw_text(),
        }
    }
}

/// Formats a number without a trailing `.0` on whole values.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// A positioned, ordered collection of typed rows rendered as a grid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Table {
    /// Unique identifier for this table
    pub id: TableId,
    /// Position on the canvas as (x, y) world coordinates
    pub position: (f32, f32),
    /// Ordered rows of this table
    pub data: Vec<Row>,
}

impl Table {
    /// Creates a new table with a fresh id at the given position.
    pub fn new(position: (f32, f32), data: Vec<Row>) -> Self {
        Self {
            id: Uuid::new_v4(),
            position,
            data,
        }
    }
}

/// A directed, optionally labeled edge between two tables.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transition {
    /// Unique identifier for this transition
    pub id: TransitionId,
    /// ID of the source table
    #[serde(rename = "fromId")]
    pub from: TableId,
    /// ID of the destination table
    #[serde(rename = "toId")]
    pub to: TableId,
    /// Label drawn along the edge
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,
}

impl Transition {
    /// Creates a new unlabeled transition between two tables.
    pub fn new(from: TableId, to: TableId) -> Self {
        Self {
            id: Uuid::new_v4(),
            from,
            to,
            text: String::new(),
        }
    }
}

/// The geometric kind of a canvas annotation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    /// An axis-aligned rectangle outline
    Rectangle,
    /// A straight line from `position` to `position + size`
    Line,
    /// A free-standing text label
    Text,
}

/// A decorative canvas annotation, independent of tables and transitions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Shape {
    /// Unique identifier for this shape
    pub id: ShapeId,
    /// Geometric kind
    #[serde(rename = "type")]
    pub kind: ShapeKind,
    /// Anchor position in world coordinates
    pub position: (f32, f32),
    /// Extent; for lines this is the delta to the far endpoint
    pub size: (f32, f32),
    /// Text content, used by text shapes
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,
}

impl Shape {
    /// Creates a new shape with a fresh id.
    pub fn new(kind: ShapeKind, position: (f32, f32), size: (f32, f32)) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            position,
            size,
            text: String::new(),
        }
    }
}

/// The canonical diagram: every table, transition, and shape on the canvas.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Diagram {
    /// All state tables, in creation order
    pub tables: Vec<Table>,
    /// All transitions between tables
    pub transitions: Vec<Transition>,
    /// All annotation shapes
    pub shapes: Vec<Shape>,
}

impl Diagram {
    /// Creates a new empty diagram.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialize the diagram to a JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize a diagram from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Adds a table and returns its id.
    pub fn add_table(&mut self, table: Table) -> TableId {
        let id = table.id;
        self.tables.push(table);
        id
    }

    /// Removes a table and every transition referencing it.
    ///
    /// Returns `true` if the table existed.
    pub fn remove_table(&mut self, id: TableId) -> bool {
        let before = self.tables.len();
        self.tables.retain(|t| t.id != id);
        let removed = self.tables.len() != before;
        if removed {
            self.transitions.retain(|t| t.from != id && t.to != id);
        }
        removed
    }

    /// Adds a transition between two existing tables.
    pub fn add_transition(&mut self, transition: Transition) -> Result<TransitionId, String> {
        if self.table(transition.from).is_none() {
            return Err("Source table does not exist".to_string());
        }
        if self.table(transition.to).is_none() {
            return Err("Destination table does not exist".to_string());
        }
        let id = transition.id;
        self.transitions.push(transition);
        Ok(id)
    }

    /// Looks up a table by id.
    pub fn table(&self, id: TableId) -> Option<&Table> {
        self.tables.iter().find(|t| t.id == id)
    }

    /// Looks up a table by id, mutably.
    pub fn table_mut(&mut self, id: TableId) -> Option<&mut Table> {
        self.tables.iter_mut().find(|t| t.id == id)
    }

    /// Looks up a transition by id.
    pub fn transition(&self, id: TransitionId) -> Option<&Transition> {
        self.transitions.iter().find(|t| t.id == id)
    }

    /// Looks up a transition by id, mutably.
    pub fn transition_mut(&mut self, id: TransitionId) -> Option<&mut Transition> {
        self.transitions.iter_mut().find(|t| t.id == id)
    }

    /// Looks up a shape by id.
    pub fn shape(&self, id: ShapeId) -> Option<&Shape> {
        self.shapes.iter().find(|s| s.id == id)
    }

    /// Looks up a shape by id, mutably.
    pub fn shape_mut(&mut self, id: ShapeId) -> Option<&mut Shape> {
        self.shapes.iter_mut().find(|s| s.id == id)
    }

    /// Removes a shape. Returns `true` if it existed.
    pub fn remove_shape(&mut self, id: ShapeId) -> bool {
        let before = self.shapes.len();
        self.shapes.retain(|s| s.id != id);
        self.shapes.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_row_creation() {
        let row = Row::number(1, "principal", 1200.0);
        assert_eq!(row.name, "principal");
        assert_eq!(row.value, RowValue::Number(1200.0));
        assert_eq!(row.kind, RowKind::Number);
        assert!(row.formula.is_empty());
        assert!(row.result.is_none());
    }

    #[test]
    fn test_percentage_display_law() {
        let row = Row::new(1, "rate", RowValue::Number(0.25), RowKind::Percentage);
        assert_eq!(row.display_value(), "25.00%");
    }

    #[test]
    fn test_formula_row_displays_result() {
        let mut row = Row::formula(1, "total", "a + b");
        assert_eq!(row.display_value(), "");
        row.result = Some(8.0);
        assert_eq!(row.display_value(), "8");
        row.result = Some(2.5);
        assert_eq!(row.display_value(), "2.5");
    }

    #[test]
    fn test_date_display_follows_format() {
        let instant = Utc.with_ymd_and_hms(2024, 3, 15, 9, 30, 0).unwrap();
        let mut row = Row::new(1, "start", RowValue::Instant(instant), RowKind::Date);
        assert_eq!(row.display_value(), "2024-03-15");

        row.date_format = Some(DateFormat::DateTime);
        assert_eq!(row.display_value(), "2024-03-15 09:30");
    }

    #[test]
    fn test_unhydrated_date_displays_raw_string() {
        let row = Row::new(
            1,
            "start",
            RowValue::Text("not a date".to_string()),
            RowKind::Date,
        );
        assert_eq!(row.display_value(), "not a date");
    }

    #[test]
    fn test_table_creation() {
        let table = Table::new((100.0, 200.0), vec![Row::number(1, "x", 10.0)]);
        assert_eq!(table.position, (100.0, 200.0));
        assert_eq!(table.data.len(), 1);
        assert!(!table.id.is_nil());
    }

    #[test]
    fn test_transition_creation() {
        let from = Uuid::new_v4();
        let to = Uuid::new_v4();
        let transition = Transition::new(from, to);
        assert_eq!(transition.from, from);
        assert_eq!(transition.to, to);
        assert!(transition.text.is_empty());
    }

    #[test]
    fn test_diagram_add_transition_requires_endpoints() {
        let mut diagram = Diagram::new();
        let table = Table::new((0.0, 0.0), vec![]);
        let id = diagram.add_table(table);

        let bad = Transition::new(Uuid::new_v4(), id);
        assert!(diagram.add_transition(bad).is_err());
        let bad = Transition::new(id, Uuid::new_v4());
        assert!(diagram.add_transition(bad).is_err());
        assert!(diagram.transitions.is_empty());
    }

    #[test]
    fn test_remove_table_removes_transitions() {
        let mut diagram = Diagram::new();
        let a = diagram.add_table(Table::new((0.0, 0.0), vec![]));
        let b = diagram.add_table(Table::new((100.0, 0.0), vec![]));
        let c = diagram.add_table(Table::new((200.0, 0.0), vec![]));

        diagram.add_transition(Transition::new(a, b)).unwrap();
        diagram.add_transition(Transition::new(b, c)).unwrap();
        diagram.add_transition(Transition::new(a, c)).unwrap();
        assert_eq!(diagram.transitions.len(), 3);

        assert!(diagram.remove_table(b));

        assert_eq!(diagram.transitions.len(), 1);
        assert!(diagram
            .transitions
            .iter()
            .all(|t| t.from != b && t.to != b));
    }

    #[test]
    fn test_remove_nonexistent_table() {
        let mut diagram = Diagram::new();
        assert!(!diagram.remove_table(Uuid::new_v4()));
    }

    #[test]
    fn test_shape_lifecycle() {
        let mut diagram = Diagram::new();
        let shape = Shape::new(ShapeKind::Rectangle, (10.0, 10.0), (50.0, 30.0));
        let id = shape.id;
        diagram.shapes.push(shape);

        assert!(diagram.shape(id).is_some());
        assert!(diagram.remove_shape(id));
        assert!(!diagram.remove_shape(id));
    }

    #[test]
    fn test_row_value_serialization_forms() {
        let number = serde_json::to_value(RowValue::Number(2.5)).unwrap();
        assert_eq!(number, serde_json::json!(2.5));

        let text = serde_json::to_value(RowValue::Text("hi".into())).unwrap();
        assert_eq!(text, serde_json::json!("hi"));

        let instant = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let date = serde_json::to_value(RowValue::Instant(instant)).unwrap();
        assert!(date.as_str().unwrap().starts_with("2024-01-02T03:04:05"));
    }

    #[test]
    fn test_serialized_date_deserializes_as_text() {
        // Rehydration back to an instant is the storage layer's job.
        let value: RowValue = serde_json::from_str("\"2024-01-02T03:04:05Z\"").unwrap();
        assert_eq!(value, RowValue::Text("2024-01-02T03:04:05Z".to_string()));
    }

    #[test]
    fn test_row_serializes_with_record_field_names() {
        let mut row = Row::formula(3, "total", "a * 2");
        row.output = Some("note".to_string());
        row.result = Some(4.0);
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["type"], "formula");
        assert_eq!(json["formula"], "a * 2");
        assert_eq!(json["output"], "note");
        assert_eq!(json["result"], 4.0);
        assert!(json.get("dateFormat").is_none());
    }

    #[test]
    fn test_transition_serializes_with_record_field_names() {
        let transition = Transition::new(Uuid::new_v4(), Uuid::new_v4());
        let json = serde_json::to_value(&transition).unwrap();
        assert!(json.get("fromId").is_some());
        assert!(json.get("toId").is_some());
        assert!(json.get("text").is_none());
    }

    #[test]
    fn test_diagram_roundtrip_serialization() {
        let mut diagram = Diagram::new();
        let a = diagram.add_table(Table::new(
            (0.0, 0.0),
            vec![Row::number(1, "x", 10.0), Row::formula(2, "y", "x * 2")],
        ));
        let b = diagram.add_table(Table::new((500.0, 0.0), vec![]));
        diagram.add_transition(Transition::new(a, b)).unwrap();
        diagram
            .shapes
            .push(Shape::new(ShapeKind::Line, (5.0, 5.0), (20.0, 0.0)));

        let json = diagram.to_json().unwrap();
        let restored = Diagram::from_json(&json).unwrap();

        assert_eq!(restored.tables.len(), 2);
        assert_eq!(restored.transitions.len(), 1);
        assert_eq!(restored.shapes.len(), 1);
        assert_eq!(restored.transitions[0].from, a);
        assert_eq!(restored.transitions[0].to, b);
    }
}
