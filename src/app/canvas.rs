use eframe::egui::{
    self, Align2, Color32, CursorIcon, FontId, Id, Key, Modifiers, PointerButton, Rect, Response,
    Sense, Shape, Stroke, Ui, vec2,
};

use crate::chart::scene::{NodeShape, Scene};
use crate::util::{initials, truncate_label};

use super::ViewModel;
use super::render_utils::{
    blend_color, circle_visible, draw_background, polyline, polyline_visible, with_opacity,
};

const LABEL_MAX_CHARS: usize = 24;
const SEARCH_RING: Color32 = Color32::from_rgb(103, 196, 255);
const SELECTED_RING: Color32 = Color32::from_rgb(245, 206, 93);

/// Shortcuts go to the chart when it has focus, or when it is hovered and no
/// other widget (such as the search box) holds keyboard focus.
fn chart_owns_keys(focused: Option<Id>, canvas: Id, hovered: bool) -> bool {
    match focused {
        Some(id) => id == canvas,
        None => hovered,
    }
}

impl ViewModel {
    pub(in crate::app) fn draw_chart(&mut self, ui: &mut Ui) {
        let (rect, response) =
            ui.allocate_exact_size(ui.available_size(), Sense::click_and_drag());
        let now = ui.input(|input| input.time);

        self.chart.resize(rect, now);
        self.handle_chart_pointer(ui, &response);
        self.handle_chart_zoom(ui, rect, &response);
        self.handle_chart_keys(ui, &response, now);

        self.chart.frame(now);
        let scene = self.chart.scene();
        let painter = ui.painter_at(rect);
        let graph_origin = self.chart.viewport().to_screen(egui::Vec2::ZERO);
        draw_background(&painter, rect, graph_origin, scene.zoom);
        self.paint_scene(ui, &painter, &scene, now);

        if self.chart.dragging().is_some() {
            ui.output_mut(|output| output.cursor_icon = CursorIcon::Grabbing);
        } else if self.chart.hover().node.is_some() {
            ui.output_mut(|output| output.cursor_icon = CursorIcon::PointingHand);
        }

        self.drain_chart_events();
        if self.chart.wants_frame() || self.chart.dragging().is_some() {
            ui.ctx().request_repaint();
        }
    }

    fn handle_chart_pointer(&mut self, ui: &Ui, response: &Response) {
        if response.drag_started_by(PointerButton::Primary) {
            let origin = ui.input(|input| input.pointer.press_origin());
            self.node_drag_active = origin.is_some_and(|origin| self.chart.press(origin));
        }

        if response.dragged_by(PointerButton::Primary) {
            if self.node_drag_active {
                if let Some(pointer) = response.interact_pointer_pos() {
                    self.chart.pointer_moved(pointer);
                }
            } else {
                self.chart.pan_by(response.drag_delta());
            }
        } else if response.dragged_by(PointerButton::Secondary)
            || response.dragged_by(PointerButton::Middle)
        {
            self.chart.pan_by(response.drag_delta());
        }

        if response.drag_stopped() && self.node_drag_active {
            self.node_drag_active = false;
            self.chart.release();
        }

        if !self.node_drag_active {
            match response.hover_pos() {
                Some(pointer) => self.chart.pointer_moved(pointer),
                None => self.chart.pointer_left(),
            }
        }

        if response.clicked_by(PointerButton::Primary)
            && let Some(pointer) = response.interact_pointer_pos()
        {
            self.chart.click(pointer);
            response.request_focus();
        }
    }

    fn handle_chart_zoom(&mut self, ui: &Ui, rect: Rect, response: &Response) {
        if !response.hovered() {
            return;
        }

        let (scroll, pinch, pointer) = ui.input(|input| {
            (
                input.raw_scroll_delta.y,
                input.zoom_delta(),
                input.pointer.hover_pos(),
            )
        });
        let scroll_factor = if scroll.abs() > f32::EPSILON {
            (1.0 + (scroll * 0.0018)).clamp(0.85, 1.15)
        } else {
            1.0
        };
        let factor = scroll_factor * pinch;
        if (factor - 1.0).abs() <= f32::EPSILON {
            return;
        }
        self.chart
            .zoom_at(pointer.unwrap_or_else(|| rect.center()), factor);
    }

    fn handle_chart_keys(&mut self, ui: &Ui, response: &Response, now: f64) {
        let focused = ui.memory(|memory| memory.focused());
        if !chart_owns_keys(focused, response.id, response.hovered()) {
            return;
        }

        // Shift+Tab first: a plain pattern also matches shifted presses.
        let (prev, next, activate, zoom_in, zoom_out, reset) = ui.input_mut(|input| {
            (
                input.consume_key(Modifiers::SHIFT, Key::Tab),
                input.consume_key(Modifiers::NONE, Key::Tab),
                input.consume_key(Modifiers::NONE, Key::Enter)
                    || input.consume_key(Modifiers::NONE, Key::Space),
                input.consume_key(Modifiers::NONE, Key::Plus)
                    || input.consume_key(Modifiers::NONE, Key::Equals),
                input.consume_key(Modifiers::NONE, Key::Minus),
                input.consume_key(Modifiers::NONE, Key::Num0),
            )
        });

        if next {
            self.chart.focus_next();
        }
        if prev {
            self.chart.focus_prev();
        }
        if activate {
            self.chart.activate_focused();
        }
        if zoom_in {
            self.chart.zoom_in(now);
        }
        if zoom_out {
            self.chart.zoom_out(now);
        }
        if reset {
            self.chart.reset();
        }
        if next || prev {
            response.request_focus();
        }
    }

    fn paint_scene(&self, ui: &Ui, painter: &egui::Painter, scene: &Scene, now: f64) {
        let rect = scene.canvas;
        let line_width = (1.4 * scene.zoom.sqrt()).clamp(0.8, 2.2);

        for link in &scene.links {
            if !polyline_visible(rect, &link.points, 12.0) {
                continue;
            }
            let color = with_opacity(link.color, link.opacity * 0.85);
            polyline(painter, &link.points, Stroke::new(line_width, color), link.dashed);
            if let Some(arrow) = link.arrow {
                painter.add(Shape::convex_polygon(arrow.to_vec(), color, Stroke::NONE));
            }
        }

        let mut hovered = None;
        for node in &scene.nodes {
            if !circle_visible(rect, node.center, node.radius + 8.0) {
                continue;
            }
            self.paint_node(ui, painter, node, scene.zoom, now);
            if node.hovered {
                hovered = Some(node);
            }
        }

        if let Some(node) = hovered {
            let panel_text = format!(
                "{}  |  {}  |  {}",
                node.label,
                node.title,
                node.department.label()
            );
            painter.text(
                rect.left_top() + vec2(10.0, 10.0),
                Align2::LEFT_TOP,
                panel_text,
                FontId::proportional(13.0),
                Color32::from_gray(240),
            );
        }
    }

    fn paint_node(&self, ui: &Ui, painter: &egui::Painter, node: &NodeShape, zoom: f32, now: f64) {
        let base = if node.hovered {
            blend_color(node.color, Color32::WHITE, 0.25)
        } else {
            node.color
        };
        let fill = with_opacity(base, node.opacity);
        painter.circle_filled(node.center, node.radius, fill);

        let selection_mix = ui.ctx().animate_bool(
            ui.make_persistent_id(("node-selection", node.id.as_str())),
            node.selected,
        );
        if selection_mix > 0.0 {
            painter.circle_stroke(
                node.center,
                node.radius + 3.0 + ((1.0 - selection_mix) * 6.0),
                Stroke::new(2.0, with_opacity(SELECTED_RING, selection_mix * node.opacity)),
            );
        }

        if node.search_match {
            let pulse = ((now * 4.0).sin() as f32 + 1.0) * 0.5;
            painter.circle_stroke(
                node.center,
                node.radius + 5.0 + pulse * 3.0,
                Stroke::new(1.6, with_opacity(SEARCH_RING, 0.5 + pulse * 0.5)),
            );
        }

        if node.focused {
            painter.circle_stroke(
                node.center,
                node.radius + 8.0,
                Stroke::new(1.2, Color32::from_gray(235)),
            );
        }

        painter.circle_stroke(
            node.center,
            node.radius,
            Stroke::new(1.0, Color32::from_rgba_unmultiplied(15, 15, 15, 190)),
        );

        if node.radius >= 10.0 {
            painter.text(
                node.center,
                Align2::CENTER_CENTER,
                initials(&node.label),
                FontId::proportional((node.radius * 0.7).clamp(8.0, 18.0)),
                with_opacity(Color32::from_gray(250), node.opacity),
            );
        }

        let should_draw_label =
            node.selected || node.hovered || node.search_match || node.focused || zoom > 0.55;
        if should_draw_label {
            painter.text(
                node.center + vec2(0.0, node.radius + 4.0),
                Align2::CENTER_TOP,
                truncate_label(&node.label, LABEL_MAX_CHARS),
                FontId::proportional(12.0),
                with_opacity(Color32::from_gray(238), node.opacity),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn focused_text_field_keeps_keys_from_the_chart() {
        let canvas = Id::new("chart-canvas");
        let search = Id::new("search");
        assert!(!chart_owns_keys(Some(search), canvas, true));
        assert!(chart_owns_keys(Some(canvas), canvas, false));
        assert!(chart_owns_keys(None, canvas, true));
        assert!(!chart_owns_keys(None, canvas, false));
    }
}
