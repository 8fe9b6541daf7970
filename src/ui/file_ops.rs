//! File operations for exporting and importing diagram documents.
//!
//! Native builds offer JSON export/import through blocking file dialogs.
//! This is separate from automatic persistence (see the storage module):
//! these are user-driven snapshots in the same record format.

use super::state::DiagramApp;
use crate::storage::{encode_record, restore_record};

impl DiagramApp {
    /// Opens a save dialog and writes the diagram as a JSON document.
    pub fn export_diagram(&self) {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("JSON", &["json"])
            .set_file_name("diagram.json")
            .save_file()
        else {
            return;
        };
        match encode_record(self.container.diagram()) {
            Ok(json) => {
                if let Err(err) = std::fs::write(&path, json) {
                    log::error!("failed to export diagram to {}: {err}", path.display());
                } else {
                    log::info!("exported diagram to {}", path.display());
                }
            }
            Err(err) => log::error!("failed to serialize diagram: {err}"),
        }
    }

    /// Opens a pick dialog and replaces the diagram with the chosen document.
    pub fn import_diagram(&mut self) {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("JSON", &["json"])
            .pick_file()
        else {
            return;
        };
        let json = match std::fs::read_to_string(&path) {
            Ok(json) => json,
            Err(err) => {
                log::error!("failed to read {}: {err}", path.display());
                return;
            }
        };
        match restore_record(&json) {
            Ok(diagram) => {
                self.container.replace_diagram(diagram);
                self.interaction.clear_selection();
                log::info!("imported diagram from {}", path.display());
            }
            Err(err) => log::error!("failed to parse diagram {}: {err}", path.display()),
        }
    }
}
