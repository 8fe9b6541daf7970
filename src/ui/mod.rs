//! User interface components and rendering logic for the state-table editor.
//!
//! This module contains all the UI-related code including the main
//! application struct, canvas rendering, the properties panel, and the
//! row-editing dialog.
//!
//! # Module Organization
//!
//! - `state` - UI state structures and the main DiagramApp
//! - `canvas` - Canvas navigation, zooming, panning, dragging, hit-testing
//! - `rendering` - Drawing tables, transitions, shapes, and the grid
//! - `file_ops` - JSON export/import of diagrams (native only)

mod canvas;
#[cfg(not(target_arch = "wasm32"))]
mod file_ops;
mod rendering;
mod state;

pub use state::{CanvasTool, DiagramApp};

use self::state::{default_date_format, DialogState};
use crate::samples::{all_samples, build_sample, SampleKind};
use crate::state::{EditorEvent, EditorPhase};
use crate::types::{Diagram, RowKind, TableId};
use eframe::egui;

impl eframe::App for DiagramApp {
    /// Mirror the persisted record into eframe storage (browser local
    /// storage on WASM) so sessions survive reloads.
    fn save(&mut self, storage: &mut dyn eframe::Storage) {
        match crate::storage::encode_record(self.container.diagram()) {
            Ok(json) => storage.set_string(crate::constants::STORAGE_KEY, json),
            Err(err) => log::error!("failed to serialize diagram for app storage: {err}"),
        }
    }

    /// Main update function called by egui for each frame.
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let visuals = if self.dark_mode {
            egui::Visuals::dark()
        } else {
            egui::Visuals::light()
        };
        ctx.set_visuals(visuals);

        self.handle_undo_redo_keys(ctx);
        self.handle_delete_key(ctx);

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            self.draw_toolbar(ui);
        });

        egui::SidePanel::right("properties")
            .default_width(260.0)
            .show(ctx, |ui| {
                self.draw_properties_panel(ui);
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.draw_canvas(ui);
        });

        self.draw_dialog(ctx);
    }
}

impl DiagramApp {
    /// Handles Ctrl/Cmd+Z and Ctrl/Cmd+Y (or Shift+Z) keyboard shortcuts.
    fn handle_undo_redo_keys(&mut self, ctx: &egui::Context) {
        if self.container.phase() != EditorPhase::Idle || ctx.wants_keyboard_input() {
            return;
        }
        let (undo, redo) = ctx.input(|i| {
            let z = i.key_pressed(egui::Key::Z);
            let y = i.key_pressed(egui::Key::Y);
            (
                i.modifiers.command && z && !i.modifiers.shift,
                i.modifiers.command && (y || (z && i.modifiers.shift)),
            )
        });
        if undo {
            self.perform_undo();
        } else if redo {
            self.perform_redo();
        }
    }

    /// Handles the Delete key for removing the selected element.
    fn handle_delete_key(&mut self, ctx: &egui::Context) {
        if self.container.phase() != EditorPhase::Idle || ctx.wants_keyboard_input() {
            return;
        }
        if ctx.input(|i| i.key_pressed(egui::Key::Delete)) {
            self.delete_selection();
        }
    }

    /// Deletes whatever is selected, if it is deletable.
    ///
    /// Transitions have no standalone delete: they live and die with their
    /// endpoint tables.
    pub fn delete_selection(&mut self) {
        if let Some(table_id) = self.interaction.selected_table.take() {
            self.container.apply(EditorEvent::DeleteTable { table_id });
        } else if let Some(shape_id) = self.interaction.selected_shape.take() {
            self.container.apply(EditorEvent::DeleteShape { shape_id });
        }
        self.interaction.clear_selection();
    }

    /// Undoes the most recent mutation.
    pub fn perform_undo(&mut self) {
        self.container.undo();
        self.interaction.clear_selection();
    }

    /// Redoes the most recently undone mutation.
    pub fn perform_redo(&mut self) {
        self.container.redo();
        self.interaction.clear_selection();
    }

    /// Replaces the diagram with an empty one.
    pub fn new_diagram(&mut self) {
        self.container.replace_diagram(Diagram::new());
        self.interaction.clear_selection();
        self.canvas.offset = egui::Vec2::ZERO;
        self.canvas.zoom_factor = 1.0;
    }

    /// Replaces the diagram with a built-in sample.
    pub fn load_sample(&mut self, kind: SampleKind) {
        self.container.replace_diagram(build_sample(kind));
        self.interaction.clear_selection();
    }

    /// Opens the row-editing dialog, seeding the draft from the target
    /// table's rows (or one blank row for a fresh table).
    pub fn open_dialog(&mut self, target: Option<TableId>) {
        if self.container.phase() != EditorPhase::Idle {
            return;
        }
        self.dialog = match target.and_then(|id| self.container.diagram().table(id)) {
            Some(table) => DialogState::from_rows(&table.data),
            None => {
                let mut dialog = DialogState::default();
                dialog.next_row_id = 1;
                dialog.add_row();
                dialog
            }
        };
        self.dialog.recalculate(self.container.tables());
        self.container.apply(EditorEvent::OpenDialog { target });
    }

    fn draw_toolbar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            #[cfg(not(target_arch = "wasm32"))]
            {
                if ui.button("New").clicked() {
                    self.new_diagram();
                }
                if ui.button("Open…").clicked() {
                    self.import_diagram();
                }
                if ui.button("Export…").clicked() {
                    self.export_diagram();
                }
                ui.separator();
            }

            ui.add_enabled_ui(self.container.can_undo(), |ui| {
                if ui.button("⟲ Undo").clicked() {
                    self.perform_undo();
                }
            });
            ui.add_enabled_ui(self.container.can_redo(), |ui| {
                if ui.button("⟳ Redo").clicked() {
                    self.perform_redo();
                }
            });

            ui.separator();

            if ui.button("New State Table").clicked() {
                self.open_dialog(None);
            }

            ui.separator();

            for (tool, label) in [
                (CanvasTool::Select, "Select"),
                (CanvasTool::Rectangle, "▭ Rect"),
                (CanvasTool::Line, "╱ Line"),
                (CanvasTool::Text, "T Text"),
            ] {
                if ui.selectable_label(self.tool == tool, label).clicked() {
                    self.tool = tool;
                }
            }

            ui.separator();

            ui.checkbox(&mut self.canvas.show_grid, "Grid");
            ui.checkbox(&mut self.dark_mode, "Dark");

            ui.separator();

            for info in all_samples() {
                if ui.button(info.name).clicked() {
                    self.load_sample(info.kind);
                }
            }
        });
    }

    fn draw_properties_panel(&mut self, ui: &mut egui::Ui) {
        ui.heading("Properties");
        ui.separator();

        if let Some(table_id) = self.interaction.selected_table {
            let Some(table) = self.container.diagram().table(table_id).cloned() else {
                return;
            };
            ui.label(format!("State table · {} rows", table.data.len()));
            ui.add_space(4.0);
            for row in &table.data {
                ui.horizontal(|ui| {
                    ui.label(&row.name);
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        ui.monospace(row.display_value());
                    });
                });
            }
            ui.add_space(8.0);
            if ui.button("Edit rules…").clicked() {
                self.open_dialog(Some(table_id));
            }
            if ui.button("Delete table").clicked() {
                self.delete_selection();
            }
        } else if let Some(transition_id) = self.interaction.selected_transition {
            ui.label("Transition");
            let response = ui.add(
                egui::TextEdit::singleline(&mut self.interaction.transition_text_draft)
                    .hint_text("label"),
            );
            let current = self
                .container
                .diagram()
                .transition(transition_id)
                .map(|t| t.text.clone())
                .unwrap_or_default();
            if response.lost_focus() && current != self.interaction.transition_text_draft {
                self.container.apply(EditorEvent::UpdateTransition {
                    transition_id,
                    text: self.interaction.transition_text_draft.clone(),
                });
            }
        } else if let Some(shape_id) = self.interaction.selected_shape {
            ui.label("Shape");
            let is_text_shape = self
                .container
                .diagram()
                .shape(shape_id)
                .map(|s| s.kind == crate::types::ShapeKind::Text)
                .unwrap_or(false);
            if is_text_shape {
                let response = ui.add(
                    egui::TextEdit::singleline(&mut self.interaction.shape_text_draft)
                        .hint_text("text"),
                );
                let current = self
                    .container
                    .diagram()
                    .shape(shape_id)
                    .map(|s| s.text.clone())
                    .unwrap_or_default();
                if response.lost_focus() && current != self.interaction.shape_text_draft {
                    self.container.apply(EditorEvent::UpdateShapeText {
                        shape_id,
                        text: self.interaction.shape_text_draft.clone(),
                    });
                }
            }
            if ui.button("Delete shape").clicked() {
                self.delete_selection();
            }
        } else {
            ui.weak("Click an element on the canvas to inspect it.");
            ui.weak("Double-click a table to edit its rules.");
        }
    }

    fn draw_canvas(&mut self, ui: &mut egui::Ui) {
        let (response, painter) =
            ui.allocate_painter(ui.available_size(), egui::Sense::click_and_drag());

        self.handle_canvas_panning(ui, &response);
        self.handle_canvas_zoom(ui, &response);
        self.handle_canvas_interactions(&response);
        self.handle_canvas_dragging(ui, &response);

        let canvas_rect = response.rect;
        self.render_diagram_elements(&painter, canvas_rect);
    }

    /// Draws the modal row-editing dialog while it is open.
    fn draw_dialog(&mut self, ctx: &egui::Context) {
        let EditorPhase::DialogOpen { target } = self.container.phase() else {
            return;
        };

        let title = if target.is_some() {
            "Edit state rules"
        } else {
            "New state table"
        };

        egui::Window::new(title)
            .collapsible(false)
            .resizable(true)
            .show(ctx, |ui| {
                let mut changed = false;
                let mut remove_index: Option<usize> = None;

                egui::Grid::new("dialog_rows")
                    .num_columns(7)
                    .spacing([6.0, 4.0])
                    .show(ui, |ui| {
                        ui.strong("Name");
                        ui.strong("Type");
                        ui.strong("Value");
                        ui.strong("Formula");
                        ui.strong("Output");
                        ui.strong("Result");
                        ui.label("");
                        ui.end_row();

                        for (index, draft) in self.dialog.drafts.iter_mut().enumerate() {
                            changed |= ui
                                .add(
                                    egui::TextEdit::singleline(&mut draft.row.name)
                                        .desired_width(90.0),
                                )
                                .changed();

                            let kind_before = draft.row.kind;
                            egui::ComboBox::from_id_source(("row_kind", index))
                                .selected_text(kind_label(draft.row.kind))
                                .show_ui(ui, |ui| {
                                    for kind in [
                                        RowKind::Text,
                                        RowKind::Number,
                                        RowKind::Date,
                                        RowKind::DateTime,
                                        RowKind::Percentage,
                                        RowKind::Formula,
                                    ] {
                                        ui.selectable_value(
                                            &mut draft.row.kind,
                                            kind,
                                            kind_label(kind),
                                        );
                                    }
                                });
                            if draft.row.kind != kind_before {
                                draft.row.date_format = default_date_format(draft.row.kind);
                                draft.sync_value();
                                changed = true;
                            }

                            if ui
                                .add(
                                    egui::TextEdit::singleline(&mut draft.value_text)
                                        .desired_width(90.0),
                                )
                                .changed()
                            {
                                draft.sync_value();
                                changed = true;
                            }

                            changed |= ui
                                .add(
                                    egui::TextEdit::singleline(&mut draft.row.formula)
                                        .desired_width(140.0)
                                        .hint_text("e.g. rate * base"),
                                )
                                .changed();

                            let mut output = draft.row.output.clone().unwrap_or_default();
                            if ui
                                .add(egui::TextEdit::singleline(&mut output).desired_width(80.0))
                                .changed()
                            {
                                draft.row.output =
                                    (!output.is_empty()).then_some(output);
                                changed = true;
                            }

                            if draft.row.formula.is_empty() {
                                ui.label("—");
                            } else if draft.row.diagnostic.is_some() {
                                ui.colored_label(
                                    egui::Color32::from_rgb(220, 80, 80),
                                    draft.row.display_value(),
                                );
                            } else {
                                ui.monospace(draft.row.display_value());
                            }

                            if ui.button("✕").clicked() {
                                remove_index = Some(index);
                            }
                            ui.end_row();
                        }
                    });

                if let Some(index) = remove_index {
                    self.dialog.remove_row(index);
                    changed = true;
                }

                if ui.button("＋ Add row").clicked() {
                    self.dialog.add_row();
                    changed = true;
                }

                // Any edit re-scans the whole draft, so one row's new value
                // immediately shows in its siblings' results.
                if changed {
                    self.dialog.recalculate(self.container.tables());
                }

                ui.separator();
                ui.horizontal(|ui| {
                    if ui.button("Save").clicked() {
                        let rows = self.dialog.rows();
                        self.container.apply(EditorEvent::SaveState { rows });
                        self.dialog = DialogState::default();
                    }
                    if ui.button("Cancel").clicked() {
                        self.container.apply(EditorEvent::CloseDialog);
                        self.dialog = DialogState::default();
                    }
                });
            });
    }
}

fn kind_label(kind: RowKind) -> &'static str {
    match kind {
        RowKind::Text => "string",
        RowKind::Number => "number",
        RowKind::Date => "date",
        RowKind::DateTime => "datetime",
        RowKind::Percentage => "percentage",
        RowKind::Formula => "formula",
    }
}
