use chrono::Local;
use eframe::egui::{self, RichText, Ui};

use crate::util::format_tenure;

use super::super::ViewModel;

impl ViewModel {
    pub(in crate::app) fn draw_details(&mut self, ui: &mut Ui) {
        ui.horizontal(|ui| {
            ui.heading("Person Details");
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if ui.small_button("Close").clicked() {
                    self.chart.select(None);
                }
            });
        });
        ui.add_space(6.0);

        let Some(selected_id) = self.selected.clone() else {
            ui.label("Click a person in the chart to see their details.");
            return;
        };

        let Some(node) = self.catalog.node(&selected_id).cloned() else {
            ui.label("Selected person no longer exists in the catalog.");
            return;
        };

        let mut pending_selection = None;

        egui::ScrollArea::vertical()
            .auto_shrink([false, false])
            .show(ui, |ui| {
                ui.label(RichText::new(node.name.as_str()).strong().size(18.0));
                ui.label(node.display_title());
                ui.small(node.id.as_str());
                ui.add_space(6.0);

                ui.label(format!("Department: {}", node.department.label()));
                ui.label(format!("Role: {}", node.role.label()));
                if let Some(email) = &node.email {
                    ui.label(format!("Email: {email}"));
                }
                if let Some(phone) = &node.phone {
                    ui.label(format!("Phone: {phone}"));
                }
                if let Some(location) = &node.location {
                    ui.label(format!("Location: {location}"));
                }
                if let Some(start) = node.start_date {
                    let today = Local::now().date_naive();
                    ui.label(format!("Started: {start} ({})", format_tenure(start, today)));
                }

                if let Some(manager) = self.catalog.manager_of(&node.id) {
                    ui.horizontal(|ui| {
                        ui.label("Manager:");
                        if ui.link(manager.name.as_str()).clicked() {
                            pending_selection = Some(manager.id.clone());
                        }
                    });
                }

                let chain = self.catalog.reporting_chain(&node.id);
                let superiors = chain
                    .iter()
                    .filter(|entry| !entry.is_grouping() && entry.id != node.id)
                    .collect::<Vec<_>>();

                ui.separator();
                ui.label(RichText::new("Reporting line").strong());
                if superiors.is_empty() {
                    ui.label("Top of the organization.");
                } else {
                    ui.horizontal_wrapped(|ui| {
                        for superior in &superiors {
                            if ui.link(superior.name.as_str()).clicked() {
                                pending_selection = Some(superior.id.clone());
                            }
                            ui.label(">");
                        }
                        ui.label(RichText::new(node.name.as_str()).strong());
                    });
                }

                let reports = self.catalog.direct_reports(&node.id);
                ui.separator();
                ui.label(RichText::new(format!("Direct reports ({})", reports.len())).strong());
                if reports.is_empty() {
                    ui.label("None.");
                }
                for report in reports {
                    let text = format!("{}  -  {}", report.name, report.display_title());
                    if ui.link(text).clicked() {
                        pending_selection = Some(report.id.clone());
                    }
                }
            });

        if let Some(id) = pending_selection {
            self.chart.select(Some(&id));
        }
    }
}
