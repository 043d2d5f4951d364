mod app;
mod chart;
mod org;
mod util;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser;
use eframe::egui::{Pos2, Rect, vec2};
use tracing::info;
use tracing_subscriber::EnvFilter;

use app::CatalogSource;
use chart::svg::write_export;
use chart::{ChartConfig, OrgChart};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Catalog JSON file; the bundled sample is used when omitted.
    #[arg(long)]
    catalog: Option<PathBuf>,
    #[arg(long, default_value = ".")]
    export_dir: PathBuf,
    /// Lay the chart out without a window and write the SVG export.
    #[arg(long)]
    headless_export: bool,
    #[arg(long, default_value_t = 300)]
    ticks: u32,
    #[arg(long, default_value_t = 1280.0)]
    width: f32,
    #[arg(long, default_value_t = 800.0)]
    height: f32,
}

fn headless_export(source: &CatalogSource, args: &Args) -> anyhow::Result<()> {
    let catalog = Arc::new(source.load()?);
    let canvas = Rect::from_min_size(Pos2::ZERO, vec2(args.width, args.height));
    let mut chart = OrgChart::new(catalog, canvas, ChartConfig::default(), 0.0);

    let mut now = 0.0;
    for _ in 0..args.ticks {
        now += 1.0 / 60.0;
        chart.frame(now);
    }

    let path = write_export(&args.export_dir, &chart.export_svg())
        .context("failed to write the SVG export")?;
    chart.teardown();
    info!(path = %path.display(), ticks = args.ticks, "headless export finished");
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let source = match &args.catalog {
        Some(path) => CatalogSource::File(path.clone()),
        None => CatalogSource::Bundled,
    };

    if args.headless_export {
        return headless_export(&source, &args);
    }

    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default().with_inner_size([1440.0, 920.0]),
        ..Default::default()
    };

    let export_dir = args.export_dir.clone();
    eframe::run_native(
        "org-chart",
        options,
        Box::new(move |cc| Ok(Box::new(app::OrgChartApp::new(cc, source, export_dir)))),
    )
    .map_err(|error| anyhow::anyhow!("failed to start the chart window: {error}"))
}
