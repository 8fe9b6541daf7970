//! Persistence adapter for the diagram.
//!
//! The whole diagram round-trips as one JSON record through a pluggable
//! [`StorageBackend`], so tests run against an in-memory store and the
//! application against a local file (native) or browser storage (WASM).
//!
//! This is a best-effort cache, not a durable store: read and write failures
//! are logged and swallowed, and a failed load degrades to an empty diagram
//! instead of propagating an error.

use crate::recalc::recalculate;
use crate::types::{Diagram, RowKind, RowValue, Shape, Table, Transition};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure of the backing store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The underlying I/O operation failed
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    /// Backend-specific failure
    #[error("{0}")]
    Backend(String),
}

/// A place the serialized diagram record lives.
///
/// One record under one well-known location; how the location is addressed
/// (file path, storage key) is the backend's business.
pub trait StorageBackend {
    /// Reads the record, `None` when nothing was stored yet.
    fn read(&self) -> Result<Option<String>, StoreError>;
    /// Replaces the record.
    fn write(&mut self, record: &str) -> Result<(), StoreError>;
}

/// In-memory backend for tests and as the WASM working set.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    record: Option<String>,
}

impl MemoryBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend pre-seeded with a record.
    pub fn with_record(record: impl Into<String>) -> Self {
        Self {
            record: Some(record.into()),
        }
    }

    /// The currently stored record, if any.
    pub fn record(&self) -> Option<&str> {
        self.record.as_deref()
    }
}

impl StorageBackend for MemoryBackend {
    fn read(&self) -> Result<Option<String>, StoreError> {
        Ok(self.record.clone())
    }

    fn write(&mut self, record: &str) -> Result<(), StoreError> {
        self.record = Some(record.to_string());
        Ok(())
    }
}

/// File-backed storage for native builds.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug)]
pub struct JsonFileBackend {
    path: std::path::PathBuf,
}

#[cfg(not(target_arch = "wasm32"))]
impl JsonFileBackend {
    /// Creates a backend writing to the given path.
    pub fn new(path: impl Into<std::path::PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl Default for JsonFileBackend {
    fn default() -> Self {
        Self::new(crate::constants::STORAGE_FILE)
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl StorageBackend for JsonFileBackend {
    fn read(&self) -> Result<Option<String>, StoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(record) => Ok(Some(record)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn write(&mut self, record: &str) -> Result<(), StoreError> {
        std::fs::write(&self.path, record).map_err(Into::into)
    }
}

/// The persisted record shape.
#[derive(Serialize, Deserialize)]
struct DiagramRecord {
    #[serde(rename = "stateTables")]
    tables: Vec<Table>,
    #[serde(rename = "stateTransitions")]
    transitions: Vec<Transition>,
    #[serde(rename = "stateShapes", default)]
    shapes: Vec<Shape>,
}

/// Serializes a diagram to the persisted record format.
///
/// Date-valued rows degrade to ISO-8601 strings through their value's own
/// serialization.
pub fn encode_record(diagram: &Diagram) -> Result<String, serde_json::Error> {
    let record = DiagramRecord {
        tables: diagram.tables.clone(),
        transitions: diagram.transitions.clone(),
        shapes: diagram.shapes.clone(),
    };
    serde_json::to_string_pretty(&record)
}

/// Rebuilds a diagram from a persisted record: parse, rehydrate date rows,
/// and recalculate every table.
pub fn restore_record(json: &str) -> Result<Diagram, serde_json::Error> {
    let record: DiagramRecord = serde_json::from_str(json)?;
    let mut diagram = Diagram {
        tables: record.tables,
        transitions: record.transitions,
        shapes: record.shapes,
    };
    rehydrate_dates(&mut diagram);
    let context = diagram.tables.clone();
    for table in &mut diagram.tables {
        table.data = recalculate(&table.data, &context);
    }
    Ok(diagram)
}

/// Converts the string form of date-kind row values back to instants.
///
/// A string that fails to parse stays text; the row renders its raw string
/// and coerces to zero in formulas.
pub fn rehydrate_dates(diagram: &mut Diagram) {
    for table in &mut diagram.tables {
        for row in &mut table.data {
            if !matches!(row.kind, RowKind::Date | RowKind::DateTime) {
                continue;
            }
            if let RowValue::Text(text) = &row.value {
                match DateTime::parse_from_rfc3339(text) {
                    Ok(instant) => row.value = RowValue::Instant(instant.with_timezone(&Utc)),
                    Err(err) => {
                        log::warn!("row `{}`: malformed stored date `{text}`: {err}", row.name);
                    }
                }
            }
        }
    }
}

/// The persistence adapter the state container writes through.
pub struct Persistence {
    backend: Box<dyn StorageBackend>,
}

impl Persistence {
    /// Creates an adapter over the given backend.
    pub fn new(backend: Box<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    /// Writes the diagram to the backing store.
    ///
    /// Every formula row is recomputed against the freshest sibling data
    /// before the write, so persisted results are never stale relative to
    /// their inputs. Write failures are logged and dropped.
    pub fn save(&mut self, diagram: &Diagram) {
        let mut snapshot = diagram.clone();
        let context = snapshot.tables.clone();
        for table in &mut snapshot.tables {
            table.data = recalculate(&table.data, &context);
        }
        match encode_record(&snapshot) {
            Ok(json) => {
                if let Err(err) = self.backend.write(&json) {
                    log::error!("failed to persist diagram: {err}");
                }
            }
            Err(err) => {
                log::error!("failed to serialize diagram: {err}");
            }
        }
    }

    /// Reads the diagram back from the backing store.
    ///
    /// Any failure — backend error, corrupt record — is logged and degrades
    /// to an empty diagram.
    pub fn load(&self) -> Diagram {
        let json = match self.backend.read() {
            Ok(Some(json)) => json,
            Ok(None) => return Diagram::new(),
            Err(err) => {
                log::error!("failed to read stored diagram: {err}");
                return Diagram::new();
            }
        };
        match restore_record(&json) {
            Ok(diagram) => diagram,
            Err(err) => {
                log::error!("stored diagram is corrupt, starting empty: {err}");
                Diagram::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Row, ShapeKind};
    use chrono::TimeZone;

    struct FailingBackend;

    impl StorageBackend for FailingBackend {
        fn read(&self) -> Result<Option<String>, StoreError> {
            Err(StoreError::Backend("read refused".to_string()))
        }

        fn write(&mut self, _record: &str) -> Result<(), StoreError> {
            Err(StoreError::Backend("write refused".to_string()))
        }
    }

    fn sample_diagram() -> Diagram {
        let mut diagram = Diagram::new();
        let instant = Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap();
        let mut date_row = Row::new(3, "start", RowValue::Instant(instant), RowKind::Date);
        date_row.date_format = Some(crate::types::DateFormat::Date);
        let a = diagram.add_table(Table::new(
            (0.0, 0.0),
            vec![
                Row::number(1, "x", 10.0),
                Row::formula(2, "y", "x * 2"),
                date_row,
            ],
        ));
        let b = diagram.add_table(Table::new((500.0, 0.0), vec![]));
        diagram
            .add_transition(Transition::new(a, b))
            .expect("endpoints exist");
        diagram
            .shapes
            .push(Shape::new(ShapeKind::Rectangle, (5.0, 5.0), (40.0, 20.0)));
        diagram
    }

    #[test]
    fn test_roundtrip_preserves_everything() {
        let diagram = sample_diagram();
        let mut persistence = Persistence::new(Box::new(MemoryBackend::new()));
        persistence.save(&diagram);
        let restored = persistence.load();

        assert_eq!(restored.tables.len(), 2);
        assert_eq!(restored.transitions.len(), 1);
        assert_eq!(restored.shapes.len(), 1);
        assert_eq!(restored.tables[0].id, diagram.tables[0].id);
        assert_eq!(restored.transitions[0].from, diagram.transitions[0].from);

        // Date instants come back at the same epoch millisecond.
        let original = &diagram.tables[0].data[2];
        let restored_row = &restored.tables[0].data[2];
        match (&original.value, &restored_row.value) {
            (RowValue::Instant(a), RowValue::Instant(b)) => {
                assert_eq!(a.timestamp_millis(), b.timestamp_millis());
            }
            other => panic!("expected instants, got {other:?}"),
        }
    }

    #[test]
    fn test_save_recomputes_stale_results() {
        let mut diagram = sample_diagram();
        diagram.tables[0].data[1].result = Some(999.0);

        let mut persistence = Persistence::new(Box::new(MemoryBackend::new()));
        persistence.save(&diagram);
        let restored = persistence.load();
        assert_eq!(restored.tables[0].data[1].result, Some(20.0));
    }

    #[test]
    fn test_load_recalculates_formula_rows() {
        let json = r#"{
            "stateTables": [{
                "id": "6f7cbf9e-0053-4c96-9618-58a00a282786",
                "position": [0.0, 0.0],
                "data": [
                    {"id": 1, "name": "x", "value": 4, "type": "number"},
                    {"id": 2, "name": "y", "value": 0, "type": "formula", "formula": "x + 1"}
                ]
            }],
            "stateTransitions": []
        }"#;
        let persistence = Persistence::new(Box::new(MemoryBackend::with_record(json)));
        let diagram = persistence.load();
        assert_eq!(diagram.tables[0].data[1].result, Some(5.0));
        // Record without a stateShapes key loads with no shapes.
        assert!(diagram.shapes.is_empty());
    }

    #[test]
    fn test_malformed_date_stays_text() {
        let json = r#"{
            "stateTables": [{
                "id": "6f7cbf9e-0053-4c96-9618-58a00a282786",
                "position": [0.0, 0.0],
                "data": [
                    {"id": 1, "name": "start", "value": "not-a-date", "type": "date"}
                ]
            }],
            "stateTransitions": []
        }"#;
        let persistence = Persistence::new(Box::new(MemoryBackend::with_record(json)));
        let diagram = persistence.load();
        assert_eq!(
            diagram.tables[0].data[0].value,
            RowValue::Text("not-a-date".to_string())
        );
    }

    #[test]
    fn test_empty_store_loads_empty_diagram() {
        let persistence = Persistence::new(Box::new(MemoryBackend::new()));
        let diagram = persistence.load();
        assert!(diagram.tables.is_empty());
        assert!(diagram.transitions.is_empty());
        assert!(diagram.shapes.is_empty());
    }

    #[test]
    fn test_corrupt_record_degrades_to_empty() {
        let persistence = Persistence::new(Box::new(MemoryBackend::with_record("{ nope")));
        let diagram = persistence.load();
        assert!(diagram.tables.is_empty());
    }

    #[test]
    fn test_backend_failures_are_swallowed() {
        let mut persistence = Persistence::new(Box::new(FailingBackend));
        persistence.save(&sample_diagram());
        let diagram = persistence.load();
        assert!(diagram.tables.is_empty());
    }

    #[test]
    fn test_record_uses_wire_key_names() {
        let diagram = sample_diagram();
        let json = encode_record(&diagram).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(value.get("stateTables").is_some());
        assert!(value.get("stateTransitions").is_some());
        assert!(value.get("stateShapes").is_some());
        let date = &value["stateTables"][0]["data"][2]["value"];
        assert!(date.as_str().unwrap().starts_with("2024-03-15T12:00:00"));
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[test]
    fn test_file_backend_roundtrip() {
        let dir = std::env::temp_dir().join("statesheet_backend_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("diagram.json");
        let _ = std::fs::remove_file(&path);

        let mut backend = JsonFileBackend::new(&path);
        assert!(backend.read().unwrap().is_none());
        backend.write("{\"stateTables\":[],\"stateTransitions\":[]}").unwrap();
        assert!(backend.read().unwrap().is_some());

        let _ = std::fs::remove_file(&path);
    }
}
