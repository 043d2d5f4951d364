use eframe::egui::{self, Color32, RichText, Sense, Ui, vec2};

use crate::org::EdgeKind;

use super::super::ViewModel;

fn swatch(ui: &mut Ui, color: Color32) {
    let (rect, _) = ui.allocate_exact_size(vec2(10.0, 10.0), Sense::hover());
    ui.painter().circle_filled(rect.center(), 5.0, color);
}

impl ViewModel {
    pub(in crate::app) fn draw_controls(&mut self, ui: &mut Ui) {
        let now = ui.input(|input| input.time);

        ui.heading("Chart Controls");
        ui.separator();
        ui.add_space(4.0);

        ui.label("Search (name, title or department)")
            .on_hover_text("Matching people stay visible along with everyone they report to.");
        let search_response = ui.text_edit_singleline(&mut self.search);
        if search_response.changed() {
            self.chart.set_query(&self.search, now);
        }
        if !self.chart.filter().applied_query().is_empty() {
            ui.small(format!(
                "{} people match",
                self.chart.subset().person_count()
            ));
        }

        ui.separator();
        ui.horizontal(|ui| {
            ui.label(RichText::new("Departments").strong());
            let any_active = !self.chart.filter().departments().is_empty();
            if ui
                .add_enabled(any_active, egui::Button::new("All"))
                .on_hover_text("Show every department.")
                .clicked()
            {
                self.chart.clear_departments(now);
            }
        });

        let departments = self.catalog.departments().to_vec();
        for department in departments {
            let active = self.chart.filter().is_department_active(department);
            let size = self.catalog.department_size(department);
            let clicked = ui
                .horizontal(|ui| {
                    swatch(ui, department.color());
                    ui.selectable_label(active, format!("{}  ({size})", department.label()))
                        .clicked()
                })
                .inner;
            if clicked {
                self.chart.toggle_department(department, now);
            }
        }

        ui.separator();
        ui.label(RichText::new("View").strong());
        ui.horizontal(|ui| {
            if ui.button("-").on_hover_text("Zoom out").clicked() {
                self.chart.zoom_out(now);
            }
            ui.label(format!("{}%", self.chart.zoom_percent()));
            if ui.button("+").on_hover_text("Zoom in").clicked() {
                self.chart.zoom_in(now);
            }
            if ui
                .button("Reset")
                .on_hover_text("Restore the default view, clear the selection and re-level nodes.")
                .clicked()
            {
                self.chart.reset();
            }
        });
        ui.small("Wheel or pinch to zoom, drag the background to pan.");

        ui.add_space(6.0);
        if ui
            .button("Export SVG")
            .on_hover_text("Save the current view as organizational_chart.svg.")
            .clicked()
        {
            self.chart.request_export();
        }
        if let Some(status) = &self.status {
            let color = if status.is_error {
                Color32::from_rgb(235, 110, 100)
            } else {
                Color32::from_gray(190)
            };
            ui.label(RichText::new(status.text.as_str()).small().color(color));
        }

        ui.separator();
        ui.label(RichText::new("Legend").strong());
        for (kind, text) in [
            (EdgeKind::ReportsTo, "solid arrow: reports to"),
            (EdgeKind::DepartmentMembership, "dashed: department membership"),
        ] {
            let dashed = kind == EdgeKind::DepartmentMembership;
            ui.horizontal(|ui| {
                let (rect, _) = ui.allocate_exact_size(vec2(28.0, 10.0), Sense::hover());
                let stroke = egui::Stroke::new(1.4, Color32::from_gray(170));
                let points = [rect.left_center(), rect.right_center()];
                if dashed {
                    ui.painter()
                        .extend(egui::Shape::dashed_line(&points, stroke, 4.0, 3.0));
                } else {
                    ui.painter().line_segment(points, stroke);
                }
                ui.small(text);
            });
        }
    }
}
