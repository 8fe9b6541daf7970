//! Canvas rendering functionality for tables, transitions, shapes, and grid.
//!
//! Elements are drawn in layers: grid first, then annotation shapes, then
//! transitions, then tables on top, ensuring proper visual hierarchy.

use super::state::{CanvasTool, DiagramApp};
use crate::constants::{GRID_SIZE, TABLE_CORNER_RADIUS, TABLE_HEADER_HEIGHT, TABLE_ROW_HEIGHT};
use crate::types::{Shape, ShapeKind, Table, Transition};
use eframe::egui;
use eframe::epaint::StrokeKind;

impl DiagramApp {
    /// Renders all diagram elements on the canvas.
    pub fn render_diagram_elements(&self, painter: &egui::Painter, canvas_rect: egui::Rect) {
        if self.canvas.show_grid {
            self.draw_grid(painter, canvas_rect);
        }

        for shape in self.container.shapes() {
            let is_selected = self.interaction.selected_shape == Some(shape.id);
            self.draw_shape(painter, shape, is_selected);
        }

        for transition in self.container.transitions() {
            let is_selected = self.interaction.selected_transition == Some(transition.id);
            self.draw_transition(painter, transition, is_selected);
        }

        for table in self.container.tables() {
            let is_selected = self.interaction.selected_table == Some(table.id);
            self.draw_table(painter, table, is_selected);
        }

        self.draw_shape_drawing_preview(painter);
    }

    /// Draws a zoom-aware grid for visual reference.
    pub fn draw_grid(&self, painter: &egui::Painter, canvas_rect: egui::Rect) {
        let spacing = GRID_SIZE * self.canvas.zoom_factor;
        if spacing < 5.0 {
            return;
        }

        let color = if self.dark_mode {
            egui::Color32::from_gray(45)
        } else {
            egui::Color32::from_gray(220)
        };
        let stroke = egui::Stroke::new(1.0, color);

        let first_x = canvas_rect.min.x + (self.canvas.offset.x - canvas_rect.min.x) % spacing;
        let mut x = first_x - spacing;
        while x <= canvas_rect.max.x {
            painter.line_segment(
                [
                    egui::pos2(x, canvas_rect.min.y),
                    egui::pos2(x, canvas_rect.max.y),
                ],
                stroke,
            );
            x += spacing;
        }

        let first_y = canvas_rect.min.y + (self.canvas.offset.y - canvas_rect.min.y) % spacing;
        let mut y = first_y - spacing;
        while y <= canvas_rect.max.y {
            painter.line_segment(
                [
                    egui::pos2(canvas_rect.min.x, y),
                    egui::pos2(canvas_rect.max.x, y),
                ],
                stroke,
            );
            y += spacing;
        }
    }

    /// The table's world position, honoring an in-flight drag preview.
    fn effective_table_position(&self, table: &Table) -> (f32, f32) {
        if self.interaction.dragging_table == Some(table.id) {
            self.interaction.drag_preview.unwrap_or(table.position)
        } else {
            table.position
        }
    }

    /// The shape's world position, honoring an in-flight drag preview.
    fn effective_shape_position(&self, shape: &Shape) -> (f32, f32) {
        if self.interaction.dragging_shape == Some(shape.id) {
            self.interaction.drag_preview.unwrap_or(shape.position)
        } else {
            shape.position
        }
    }

    /// Draws one state table: header band plus one line per row.
    pub fn draw_table(&self, painter: &egui::Painter, table: &Table, is_selected: bool) {
        let mut positioned = table.clone();
        positioned.position = self.effective_table_position(table);
        let world_rect = Self::table_rect(&positioned);
        let screen_rect = egui::Rect::from_min_max(
            self.world_to_screen(world_rect.min),
            self.world_to_screen(world_rect.max),
        );

        let (fill, header_fill, text_color) = if self.dark_mode {
            (
                egui::Color32::from_gray(30),
                egui::Color32::from_rgb(45, 70, 100),
                egui::Color32::from_gray(220),
            )
        } else {
            (
                egui::Color32::WHITE,
                egui::Color32::from_rgb(200, 220, 245),
                egui::Color32::from_gray(30),
            )
        };
        let stroke_color = if is_selected {
            egui::Color32::from_rgb(100, 150, 255)
        } else {
            egui::Color32::from_gray(128)
        };

        painter.rect_filled(screen_rect, TABLE_CORNER_RADIUS, fill);

        // Header band
        let header_height = TABLE_HEADER_HEIGHT * self.canvas.zoom_factor;
        let header_rect = egui::Rect::from_min_size(
            screen_rect.min,
            egui::vec2(screen_rect.width(), header_height),
        );
        painter.rect_filled(header_rect, TABLE_CORNER_RADIUS, header_fill);

        let font_size = (12.0 * self.canvas.zoom_factor).clamp(8.0, 24.0);
        let font = egui::FontId::proportional(font_size);
        painter.text(
            header_rect.left_center() + egui::vec2(6.0, 0.0),
            egui::Align2::LEFT_CENTER,
            "State",
            font.clone(),
            text_color,
        );

        // Row lines: name left, rendered value right
        let row_height = TABLE_ROW_HEIGHT * self.canvas.zoom_factor;
        for (index, row) in positioned.data.iter().enumerate() {
            let y = header_rect.max.y + (index as f32 + 0.5) * row_height;
            painter.text(
                egui::pos2(screen_rect.min.x + 6.0, y),
                egui::Align2::LEFT_CENTER,
                &row.name,
                font.clone(),
                text_color,
            );
            let value_color = if row.diagnostic.is_some() {
                egui::Color32::from_rgb(220, 80, 80)
            } else {
                text_color
            };
            let mut rendered = row.display_value();
            if let Some(output) = &row.output {
                if !output.is_empty() {
                    rendered = format!("{rendered} ({output})");
                }
            }
            painter.text(
                egui::pos2(screen_rect.max.x - 6.0, y),
                egui::Align2::RIGHT_CENTER,
                rendered,
                font.clone(),
                value_color,
            );
        }

        painter.rect_stroke(
            screen_rect,
            TABLE_CORNER_RADIUS,
            egui::Stroke::new(if is_selected { 2.0 } else { 1.0 }, stroke_color),
            StrokeKind::Inside,
        );
    }

    /// Draws a transition as an arrowed line between table centers, with its
    /// label near the midpoint.
    pub fn draw_transition(
        &self,
        painter: &egui::Painter,
        transition: &Transition,
        is_selected: bool,
    ) {
        let (Some(from), Some(to)) = (
            self.container.diagram().table(transition.from),
            self.container.diagram().table(transition.to),
        ) else {
            return;
        };

        let mut from_positioned = from.clone();
        from_positioned.position = self.effective_table_position(from);
        let mut to_positioned = to.clone();
        to_positioned.position = self.effective_table_position(to);

        let start = self.world_to_screen(Self::table_rect(&from_positioned).center());
        let end = self.world_to_screen(Self::table_rect(&to_positioned).center());

        let color = if is_selected {
            egui::Color32::from_rgb(100, 150, 255)
        } else if self.dark_mode {
            egui::Color32::from_gray(170)
        } else {
            egui::Color32::from_gray(90)
        };
        let stroke = egui::Stroke::new(if is_selected { 2.5 } else { 1.5 }, color);

        painter.line_segment([start, end], stroke);
        self.draw_arrow_at_center(painter, start, end, stroke);

        if !transition.text.is_empty() {
            let midpoint = start + (end - start) / 2.0;
            let font_size = (11.0 * self.canvas.zoom_factor).clamp(8.0, 22.0);
            painter.text(
                midpoint + egui::vec2(0.0, -10.0),
                egui::Align2::CENTER_BOTTOM,
                &transition.text,
                egui::FontId::proportional(font_size),
                color,
            );
        }
    }

    /// Draws a direction arrowhead at the midpoint of a transition.
    fn draw_arrow_at_center(
        &self,
        painter: &egui::Painter,
        start: egui::Pos2,
        end: egui::Pos2,
        stroke: egui::Stroke,
    ) {
        let direction = end - start;
        if direction.length() < 1.0 {
            return;
        }
        let direction = direction.normalized();
        let center = start + (end - start) / 2.0;
        let arrow_size = 8.0 * self.canvas.zoom_factor.clamp(0.5, 2.0);

        let left = egui::vec2(
            -direction.x * arrow_size - direction.y * arrow_size * 0.5,
            -direction.y * arrow_size + direction.x * arrow_size * 0.5,
        );
        let right = egui::vec2(
            -direction.x * arrow_size + direction.y * arrow_size * 0.5,
            -direction.y * arrow_size - direction.x * arrow_size * 0.5,
        );

        painter.line_segment([center, center + left], stroke);
        painter.line_segment([center, center + right], stroke);
    }

    /// Draws one annotation shape.
    pub fn draw_shape(&self, painter: &egui::Painter, shape: &Shape, is_selected: bool) {
        let color = if is_selected {
            egui::Color32::from_rgb(100, 150, 255)
        } else if self.dark_mode {
            egui::Color32::from_gray(150)
        } else {
            egui::Color32::from_gray(110)
        };
        let stroke = egui::Stroke::new(if is_selected { 2.0 } else { 1.5 }, color);

        let position = self.effective_shape_position(shape);
        let origin = self.world_to_screen(egui::pos2(position.0, position.1));

        match shape.kind {
            ShapeKind::Rectangle => {
                let far = self.world_to_screen(egui::pos2(
                    position.0 + shape.size.0,
                    position.1 + shape.size.1,
                ));
                painter.rect_stroke(
                    egui::Rect::from_two_pos(origin, far),
                    0.0,
                    stroke,
                    StrokeKind::Inside,
                );
            }
            ShapeKind::Line => {
                let far = self.world_to_screen(egui::pos2(
                    position.0 + shape.size.0,
                    position.1 + shape.size.1,
                ));
                painter.line_segment([origin, far], stroke);
            }
            ShapeKind::Text => {
                let font_size = (13.0 * self.canvas.zoom_factor).clamp(8.0, 26.0);
                painter.text(
                    origin,
                    egui::Align2::LEFT_TOP,
                    if shape.text.is_empty() { "text" } else { &shape.text },
                    egui::FontId::proportional(font_size),
                    color,
                );
            }
        }
    }

    /// Draws the preview of a rectangle/line currently being dragged out.
    fn draw_shape_drawing_preview(&self, painter: &egui::Painter) {
        let (Some(start), Some(end)) = (
            self.interaction.drawing_shape_start,
            self.interaction.drawing_shape_end,
        ) else {
            return;
        };
        let start = self.world_to_screen(start);
        let end = self.world_to_screen(end);
        let stroke = egui::Stroke::new(1.0, egui::Color32::from_rgb(100, 150, 255));

        match self.tool {
            CanvasTool::Rectangle => {
                painter.rect_stroke(
                    egui::Rect::from_two_pos(start, end),
                    0.0,
                    stroke,
                    StrokeKind::Inside,
                );
            }
            CanvasTool::Line => {
                painter.line_segment([start, end], stroke);
            }
            _ => {}
        }
    }
}
