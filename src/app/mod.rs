use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use anyhow::Context as _;
use eframe::egui::{self, Context};
use tracing::{info, warn};

use crate::chart::svg::write_export;
use crate::chart::{ChartConfig, ChartEvent, OrgChart};
use crate::org::OrgCatalog;

mod canvas;
mod render_utils;
mod ui;

/// Where the catalog comes from; the bundled sample when no path is given.
#[derive(Clone, Debug)]
pub enum CatalogSource {
    Bundled,
    File(PathBuf),
}

impl CatalogSource {
    pub fn describe(&self) -> String {
        match self {
            Self::Bundled => "bundled sample".to_owned(),
            Self::File(path) => path.display().to_string(),
        }
    }

    pub fn load(&self) -> anyhow::Result<OrgCatalog> {
        match self {
            Self::Bundled => OrgCatalog::sample().context("bundled sample catalog is invalid"),
            Self::File(path) => OrgCatalog::load(path)
                .with_context(|| format!("failed to load catalog from {}", path.display())),
        }
    }
}

pub struct OrgChartApp {
    source: CatalogSource,
    export_dir: PathBuf,
    state: AppState,
    reload_rx: Option<Receiver<Result<OrgCatalog, String>>>,
}

enum AppState {
    Loading {
        rx: Receiver<Result<OrgCatalog, String>>,
    },
    Ready(Box<ViewModel>),
    Error(String),
}

struct ViewModel {
    catalog: Arc<OrgCatalog>,
    chart: OrgChart,
    export_dir: PathBuf,
    search: String,
    selected: Option<String>,
    node_drag_active: bool,
    status: Option<StatusLine>,
}

struct StatusLine {
    text: String,
    is_error: bool,
}

impl OrgChartApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, source: CatalogSource, export_dir: PathBuf) -> Self {
        let state = Self::start_load(source.clone());
        Self {
            source,
            export_dir,
            state,
            reload_rx: None,
        }
    }

    fn spawn_load(source: CatalogSource) -> Receiver<Result<OrgCatalog, String>> {
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            let result = source.load().map_err(|error| format!("{error:#}"));
            let _ = tx.send(result);
        });

        rx
    }

    fn start_load(source: CatalogSource) -> AppState {
        AppState::Loading {
            rx: Self::spawn_load(source),
        }
    }

    fn ready(&self, catalog: OrgCatalog, now: f64) -> AppState {
        AppState::Ready(Box::new(ViewModel::new(
            catalog,
            self.export_dir.clone(),
            now,
        )))
    }
}

impl eframe::App for OrgChartApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        let now = ctx.input(|input| input.time);
        let mut transition = None;

        match &mut self.state {
            AppState::Loading { rx } => {
                match rx.try_recv() {
                    Ok(Ok(catalog)) => transition = Some(Ok(catalog)),
                    Ok(Err(error)) => transition = Some(Err(error)),
                    Err(TryRecvError::Empty) => ctx.request_repaint(),
                    Err(TryRecvError::Disconnected) => {
                        transition = Some(Err("Background load worker disconnected".to_owned()));
                    }
                }

                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.vertical_centered(|ui| {
                        ui.add_space(120.0);
                        ui.heading("Loading organization catalog...");
                        ui.add_space(8.0);
                        ui.spinner();
                    });
                });
            }
            AppState::Error(error) => {
                let mut retry = false;
                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.heading("Failed to load the organization catalog");
                    ui.add_space(6.0);
                    ui.label(error.as_str());
                    ui.add_space(10.0);
                    retry = ui.button("Retry").clicked();
                });
                if retry {
                    self.state = Self::start_load(self.source.clone());
                    return;
                }
            }
            AppState::Ready(model) => {
                let mut reload_requested = false;
                let is_reloading = self.reload_rx.is_some();
                model.show(ctx, &self.source, &mut reload_requested, is_reloading);

                if reload_requested && self.reload_rx.is_none() {
                    self.reload_rx = Some(Self::spawn_load(self.source.clone()));
                }

                if let Some(rx) = self.reload_rx.take() {
                    match rx.try_recv() {
                        Ok(result) => transition = Some(result),
                        Err(TryRecvError::Empty) => {
                            self.reload_rx = Some(rx);
                            ctx.request_repaint();
                        }
                        Err(TryRecvError::Disconnected) => {
                            transition =
                                Some(Err("Background load worker disconnected".to_owned()));
                        }
                    }
                }
            }
        }

        if let Some(result) = transition {
            self.reload_rx = None;
            self.state = match result {
                Ok(catalog) => {
                    info!(source = %self.source.describe(), "catalog ready");
                    self.ready(catalog, now)
                }
                Err(error) => {
                    warn!(%error, "catalog load failed");
                    AppState::Error(error)
                }
            };
        }
    }
}

impl ViewModel {
    fn new(catalog: OrgCatalog, export_dir: PathBuf, now: f64) -> Self {
        let catalog = Arc::new(catalog);
        let initial_canvas =
            egui::Rect::from_min_size(egui::Pos2::ZERO, egui::vec2(1280.0, 800.0));
        let chart = OrgChart::new(
            Arc::clone(&catalog),
            initial_canvas,
            ChartConfig::default(),
            now,
        );

        Self {
            catalog,
            chart,
            export_dir,
            search: String::new(),
            selected: None,
            node_drag_active: false,
            status: None,
        }
    }

    fn drain_chart_events(&mut self) {
        for event in self.chart.take_events() {
            match event {
                ChartEvent::NodeSelected(selected) => self.selected = selected,
                ChartEvent::ExportRequested => self.export(),
            }
        }
    }

    fn export(&mut self) {
        let svg = self.chart.export_svg();
        self.status = Some(match write_export(&self.export_dir, &svg) {
            Ok(path) => StatusLine {
                text: format!("Saved {}", path.display()),
                is_error: false,
            },
            Err(error) => {
                warn!(%error, "export failed");
                StatusLine {
                    text: format!("Export failed: {error}"),
                    is_error: true,
                }
            }
        });
    }
}
