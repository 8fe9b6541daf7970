//! Canvas interaction and navigation functionality.
//!
//! This module handles canvas panning, zooming, element dragging, shape
//! drawing, hit-testing, and coordinate transformations between screen and
//! world space. Mutations all go through the state container's events; the
//! only state touched directly here is the UI's own interaction state.

use super::state::{CanvasTool, DiagramApp};
use crate::constants::{
    CLICK_THRESHOLD, TABLE_HEADER_HEIGHT, TABLE_ROW_HEIGHT, TABLE_WIDTH,
};
use crate::state::{EditorEvent, EditorPhase};
use crate::types::{Shape, ShapeId, ShapeKind, Table, TableId, TransitionId};
use eframe::egui;

impl DiagramApp {
    /// Converts screen coordinates to world coordinates accounting for zoom
    /// and pan.
    pub fn screen_to_world(&self, screen_pos: egui::Pos2) -> egui::Pos2 {
        (screen_pos - self.canvas.offset) / self.canvas.zoom_factor
    }

    /// Converts world coordinates to screen coordinates accounting for zoom
    /// and pan.
    pub fn world_to_screen(&self, world_pos: egui::Pos2) -> egui::Pos2 {
        world_pos * self.canvas.zoom_factor + self.canvas.offset
    }

    /// The world-space rectangle a table occupies.
    ///
    /// A table's position is its top-left corner; height grows with its row
    /// count.
    pub fn table_rect(table: &Table) -> egui::Rect {
        let rows = table.data.len().max(1) as f32;
        egui::Rect::from_min_size(
            egui::pos2(table.position.0, table.position.1),
            egui::vec2(TABLE_WIDTH, TABLE_HEADER_HEIGHT + rows * TABLE_ROW_HEIGHT),
        )
    }

    /// The world-space rectangle a shape occupies, for hit-testing.
    pub fn shape_rect(shape: &Shape) -> egui::Rect {
        let origin = egui::pos2(shape.position.0, shape.position.1);
        match shape.kind {
            ShapeKind::Rectangle => {
                egui::Rect::from_two_pos(origin, origin + egui::vec2(shape.size.0, shape.size.1))
            }
            ShapeKind::Line => {
                egui::Rect::from_two_pos(origin, origin + egui::vec2(shape.size.0, shape.size.1))
            }
            // Text extent is font-dependent; a fixed box is close enough to click.
            ShapeKind::Text => egui::Rect::from_min_size(origin, egui::vec2(120.0, 24.0)),
        }
    }

    /// Finds the topmost table at the given world position, if any.
    pub fn find_table_at_position(&self, pos: egui::Pos2) -> Option<TableId> {
        self.container
            .tables()
            .iter()
            .rev()
            .find(|table| Self::table_rect(table).contains(pos))
            .map(|table| table.id)
    }

    /// Finds the topmost shape at the given world position, if any.
    pub fn find_shape_at_position(&self, pos: egui::Pos2) -> Option<ShapeId> {
        self.container
            .shapes()
            .iter()
            .rev()
            .find(|shape| match shape.kind {
                ShapeKind::Line => {
                    let start = egui::pos2(shape.position.0, shape.position.1);
                    let end = start + egui::vec2(shape.size.0, shape.size.1);
                    point_to_line_distance(pos, start, end) < CLICK_THRESHOLD
                }
                _ => Self::shape_rect(shape).contains(pos),
            })
            .map(|shape| shape.id)
    }

    /// Finds the transition nearest the given world position, if any is
    /// within the click threshold.
    pub fn find_transition_at_position(&self, pos: egui::Pos2) -> Option<TransitionId> {
        for transition in self.container.transitions() {
            let (Some(from), Some(to)) = (
                self.container.diagram().table(transition.from),
                self.container.diagram().table(transition.to),
            ) else {
                continue;
            };
            let start = Self::table_rect(from).center();
            let end = Self::table_rect(to).center();
            if point_to_line_distance(pos, start, end) < CLICK_THRESHOLD {
                return Some(transition.id);
            }
        }
        None
    }

    /// Handles middle-click or Cmd/Ctrl+left-click canvas panning.
    pub fn handle_canvas_panning(&mut self, ui: &mut egui::Ui, response: &egui::Response) {
        let should_pan = ui.input(|i| {
            i.pointer.middle_down() || (i.pointer.primary_down() && i.modifiers.command)
        });

        if should_pan {
            if let Some(current_pos) = response.interact_pointer_pos() {
                if !self.interaction.is_panning {
                    self.interaction.is_panning = true;
                    self.interaction.last_pan_pos = Some(current_pos);
                } else if let Some(last_pos) = self.interaction.last_pan_pos {
                    let delta = current_pos - last_pos;
                    self.canvas.offset += delta;
                    self.interaction.last_pan_pos = Some(current_pos);
                }
            }
        } else {
            self.interaction.is_panning = false;
            self.interaction.last_pan_pos = None;
        }
    }

    /// Handles scroll wheel zooming while keeping the point under the cursor
    /// fixed in world space. Zoom is clamped between 0.25x and 5.0x.
    pub fn handle_canvas_zoom(&mut self, ui: &mut egui::Ui, response: &egui::Response) {
        let scroll_delta = ui.input(|i| i.smooth_scroll_delta.y);
        if scroll_delta == 0.0 {
            return;
        }
        let mouse_pos = ui
            .input(|i| i.pointer.hover_pos())
            .or_else(|| response.interact_pointer_pos());
        let Some(mouse_pos) = mouse_pos else { return };
        if !response.rect.contains(mouse_pos) {
            return;
        }

        let world_before = self.screen_to_world(mouse_pos);
        let zoom_delta = if scroll_delta > 0.0 { 0.025 } else { -0.025 };
        let old_zoom = self.canvas.zoom_factor;
        self.canvas.zoom_factor = (self.canvas.zoom_factor + zoom_delta).clamp(0.25, 5.0);

        if (self.canvas.zoom_factor - old_zoom).abs() > f32::EPSILON {
            let world_after = self.world_to_screen(world_before);
            self.canvas.offset += mouse_pos - world_after;
        }
    }

    /// Handles click selection and double-click dialog opening.
    pub fn handle_canvas_interactions(&mut self, response: &egui::Response) {
        // The canvas is only interactive while the dialog is closed.
        if self.container.phase() != EditorPhase::Idle {
            return;
        }
        if self.tool != CanvasTool::Select {
            return;
        }

        if response.double_clicked() {
            if let Some(pos) = response.interact_pointer_pos() {
                let world = self.screen_to_world(pos);
                if let Some(table_id) = self.find_table_at_position(world) {
                    self.open_dialog(Some(table_id));
                    return;
                }
            }
        }

        if response.clicked() {
            if let Some(pos) = response.interact_pointer_pos() {
                let world = self.screen_to_world(pos);
                self.select_at(world);
            }
        }
    }

    /// Updates the selection for a click at the given world position.
    pub fn select_at(&mut self, world: egui::Pos2) {
        self.interaction.clear_selection();
        if let Some(table_id) = self.find_table_at_position(world) {
            self.interaction.selected_table = Some(table_id);
        } else if let Some(shape_id) = self.find_shape_at_position(world) {
            self.interaction.selected_shape = Some(shape_id);
            if let Some(shape) = self.container.diagram().shape(shape_id) {
                self.interaction.shape_text_draft = shape.text.clone();
            }
        } else if let Some(transition_id) = self.find_transition_at_position(world) {
            self.interaction.selected_transition = Some(transition_id);
            if let Some(transition) = self.container.diagram().transition(transition_id) {
                self.interaction.transition_text_draft = transition.text.clone();
            }
        }
    }

    /// Handles element dragging and shape drawing with the left mouse button.
    pub fn handle_canvas_dragging(&mut self, ui: &mut egui::Ui, response: &egui::Response) {
        if self.container.phase() != EditorPhase::Idle {
            return;
        }
        let primary_down = ui.input(|i| i.pointer.primary_down());

        if primary_down && !self.interaction.is_panning {
            let Some(current_pos) = response.interact_pointer_pos() else {
                return;
            };
            let world = self.screen_to_world(current_pos);

            if self.tool != CanvasTool::Select {
                self.update_shape_drawing(world);
                return;
            }

            if self.interaction.dragging_table.is_none() && self.interaction.dragging_shape.is_none()
            {
                if let Some(table_id) = self.find_table_at_position(world) {
                    self.start_table_drag(table_id, world);
                } else if let Some(shape_id) = self.find_shape_at_position(world) {
                    self.start_shape_drag(shape_id, world);
                }
            } else {
                let dragged = world + self.interaction.drag_offset;
                self.interaction.drag_preview = Some((dragged.x, dragged.y));
            }
        } else {
            self.finish_shape_drawing();
            self.finish_element_drag();
        }
    }

    fn start_table_drag(&mut self, table_id: TableId, world: egui::Pos2) {
        let Some(table) = self.container.diagram().table(table_id) else {
            return;
        };
        self.interaction.clear_selection();
        self.interaction.selected_table = Some(table_id);
        self.interaction.dragging_table = Some(table_id);
        self.interaction.drag_original_position = Some(table.position);
        self.interaction.drag_offset =
            egui::pos2(table.position.0, table.position.1) - world;
        self.interaction.drag_preview = Some(table.position);
    }

    fn start_shape_drag(&mut self, shape_id: ShapeId, world: egui::Pos2) {
        let Some(shape) = self.container.diagram().shape(shape_id) else {
            return;
        };
        self.interaction.clear_selection();
        self.interaction.selected_shape = Some(shape_id);
        self.interaction.shape_text_draft = shape.text.clone();
        self.interaction.dragging_shape = Some(shape_id);
        self.interaction.drag_original_position = Some(shape.position);
        self.interaction.drag_offset =
            egui::pos2(shape.position.0, shape.position.1) - world;
        self.interaction.drag_preview = Some(shape.position);
    }

    /// Commits a finished drag as a move event, or drops it if the pointer
    /// barely travelled.
    fn finish_element_drag(&mut self) {
        let (Some(original), Some(preview)) = (
            self.interaction.drag_original_position,
            self.interaction.drag_preview,
        ) else {
            self.interaction.dragging_table = None;
            self.interaction.dragging_shape = None;
            self.interaction.drag_preview = None;
            self.interaction.drag_original_position = None;
            return;
        };

        let travelled =
            egui::vec2(preview.0 - original.0, preview.1 - original.1).length();
        if travelled >= CLICK_THRESHOLD {
            if let Some(table_id) = self.interaction.dragging_table {
                self.container.apply(EditorEvent::MoveTable {
                    table_id,
                    position: preview,
                });
            } else if let Some(shape_id) = self.interaction.dragging_shape {
                self.container.apply(EditorEvent::MoveShape {
                    shape_id,
                    position: preview,
                });
            }
        }

        self.interaction.dragging_table = None;
        self.interaction.dragging_shape = None;
        self.interaction.drag_preview = None;
        self.interaction.drag_original_position = None;
    }

    fn update_shape_drawing(&mut self, world: egui::Pos2) {
        if self.interaction.drawing_shape_start.is_none() {
            self.interaction.drawing_shape_start = Some(world);
        }
        self.interaction.drawing_shape_end = Some(world);
    }

    /// Commits an in-flight shape drawing gesture as an AddShape event.
    fn finish_shape_drawing(&mut self) {
        let (Some(start), Some(end)) = (
            self.interaction.drawing_shape_start.take(),
            self.interaction.drawing_shape_end.take(),
        ) else {
            return;
        };

        let shape = match self.tool {
            CanvasTool::Rectangle => {
                let rect = egui::Rect::from_two_pos(start, end);
                if rect.width() < CLICK_THRESHOLD && rect.height() < CLICK_THRESHOLD {
                    return;
                }
                Shape::new(
                    ShapeKind::Rectangle,
                    (rect.min.x, rect.min.y),
                    (rect.width(), rect.height()),
                )
            }
            CanvasTool::Line => {
                let delta = end - start;
                if delta.length() < CLICK_THRESHOLD {
                    return;
                }
                Shape::new(ShapeKind::Line, (start.x, start.y), (delta.x, delta.y))
            }
            CanvasTool::Text => {
                let mut shape = Shape::new(ShapeKind::Text, (start.x, start.y), (0.0, 0.0));
                shape.text = "text".to_string();
                shape
            }
            CanvasTool::Select => return,
        };

        let shape_id = shape.id;
        self.container.apply(EditorEvent::AddShape { shape });
        self.interaction.clear_selection();
        self.interaction.selected_shape = Some(shape_id);
        self.interaction.shape_text_draft = self
            .container
            .diagram()
            .shape(shape_id)
            .map(|s| s.text.clone())
            .unwrap_or_default();
        // Drop back to selection so the new annotation can be adjusted.
        self.tool = CanvasTool::Select;
    }
}

/// Calculates the distance from a point to a line segment.
pub fn point_to_line_distance(
    point: egui::Pos2,
    line_start: egui::Pos2,
    line_end: egui::Pos2,
) -> f32 {
    let line_vec = line_end - line_start;
    let point_vec = point - line_start;
    let line_len_sq = line_vec.length_sq();

    if line_len_sq < 0.0001 {
        return point_vec.length();
    }

    // Project onto the segment, clamped to its endpoints.
    let t = (point_vec.dot(line_vec) / line_len_sq).clamp(0.0, 1.0);
    let projection = line_start + line_vec * t;

    (point - projection).length()
}
