//! Shared application-wide constants.
//! Centralizes tweakable values used across the editor core and UI rendering.

// Table placement
/// Horizontal offset (in world units) between a source table and the new table
/// spawned from its edit dialog.
pub const NEW_TABLE_OFFSET_X: f32 = 500.0;
/// Default position for a table created without a source table.
pub const DEFAULT_TABLE_POSITION: (f32, f32) = (120.0, 120.0);

// Table rendering
/// Width of a rendered state table in world units.
pub const TABLE_WIDTH: f32 = 220.0;
/// Height of a table's header band in world units.
pub const TABLE_HEADER_HEIGHT: f32 = 26.0;
/// Height of one row line in world units.
pub const TABLE_ROW_HEIGHT: f32 = 20.0;
/// Corner radius for table rectangles (in screen pixels after transform).
pub const TABLE_CORNER_RADIUS: f32 = 6.0;

// Grid/drawing
/// Grid cell size in world units.
pub const GRID_SIZE: f32 = 20.0;

// Canvas interactions
/// Click threshold in world units used for distinguishing click vs drag and
/// for transition hit-testing.
pub const CLICK_THRESHOLD: f32 = 10.0;

// Persistence
/// Well-known key the persisted diagram record lives under.
pub const STORAGE_KEY: &str = "statesheet_diagram";
/// Default file name for the native JSON-file backend.
pub const STORAGE_FILE: &str = "statesheet_diagram.json";

// Undo/redo
/// Maximum number of undo history entries to retain.
pub const MAX_UNDO_HISTORY: usize = 100;
