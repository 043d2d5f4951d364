use std::path::{Path, PathBuf};

use eframe::egui::{Color32, Pos2, Vec2};
use thiserror::Error;
use tracing::info;

use super::scene::Scene;

pub const EXPORT_FILE_NAME: &str = "organizational_chart.svg";
const BACKGROUND: &str = "#13171d";
const LABEL_COLOR: &str = "#eeeeee";
const FONT_FAMILY: &str = "Inter, Helvetica, Arial, sans-serif";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn hex(color: Color32) -> String {
    format!("#{:02x}{:02x}{:02x}", color.r(), color.g(), color.b())
}

fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn points_to_path(points: &[Pos2], offset: Vec2) -> String {
    let mut d = String::new();
    for (index, point) in points.iter().enumerate() {
        let point = *point - offset;
        let command = if index == 0 { 'M' } else { 'L' };
        d.push_str(&format!("{command} {:.2} {:.2} ", point.x, point.y));
    }
    d.trim_end().to_owned()
}

/// Serializes the scene as drawn: canvas-relative coordinates, current
/// zoom and highlight state included.
pub fn render_svg(scene: &Scene) -> String {
    let width = scene.canvas.width().max(1.0);
    let height = scene.canvas.height().max(1.0);
    let offset = scene.canvas.min.to_vec2();
    let mut svg = String::new();

    svg.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width}\" height=\"{height}\" viewBox=\"0 0 {width} {height}\">",
    ));
    svg.push_str(&format!(
        "<rect width=\"100%\" height=\"100%\" fill=\"{BACKGROUND}\"/>"
    ));

    svg.push_str("<g class=\"links\">");
    for link in &scene.links {
        let dash = if link.dashed {
            " stroke-dasharray=\"6 4\""
        } else {
            ""
        };
        svg.push_str(&format!(
            "<path class=\"link {}\" d=\"{}\" fill=\"none\" stroke=\"{}\" stroke-width=\"1.4\" stroke-opacity=\"{:.2}\"{dash}/>",
            if link.dashed { "membership" } else { "reports-to" },
            points_to_path(&link.points, offset),
            hex(link.color),
            link.opacity,
        ));
        if let Some(arrow) = link.arrow {
            svg.push_str(&format!(
                "<path d=\"{} Z\" fill=\"{}\" fill-opacity=\"{:.2}\"/>",
                points_to_path(&arrow, offset),
                hex(link.color),
                link.opacity,
            ));
        }
    }
    svg.push_str("</g>");

    svg.push_str("<g class=\"nodes\">");
    for node in &scene.nodes {
        let center = node.center - offset;
        let (stroke, stroke_width) = if node.selected {
            ("#f5ce5d".to_owned(), 3.0)
        } else if node.search_match {
            ("#67c4ff".to_owned(), 2.5)
        } else {
            (hex(node.color), 1.0)
        };
        svg.push_str(&format!(
            "<g class=\"node\" data-id=\"{}\" data-department=\"{}\" opacity=\"{:.2}\">",
            escape_xml(&node.id),
            node.department.slug(),
            node.opacity
        ));
        svg.push_str(&format!(
            "<circle cx=\"{:.2}\" cy=\"{:.2}\" r=\"{:.2}\" fill=\"{}\" fill-opacity=\"0.85\" stroke=\"{stroke}\" stroke-width=\"{stroke_width}\"/>",
            center.x,
            center.y,
            node.radius,
            hex(node.color),
        ));
        svg.push_str(&format!(
            "<text x=\"{:.2}\" y=\"{:.2}\" text-anchor=\"middle\" font-family=\"{FONT_FAMILY}\" font-size=\"12\" fill=\"{LABEL_COLOR}\">{}</text>",
            center.x,
            center.y + node.radius + 14.0,
            escape_xml(&node.label)
        ));
        svg.push_str("</g>");
    }
    svg.push_str("</g>");

    svg.push_str("</svg>");
    svg
}

/// Writes `organizational_chart.svg` into `dir` and returns its path.
pub fn write_export(dir: &Path, svg: &str) -> Result<PathBuf, ExportError> {
    let path = dir.join(EXPORT_FILE_NAME);
    std::fs::write(&path, svg).map_err(|source| ExportError::Io {
        path: path.clone(),
        source,
    })?;
    info!(path = %path.display(), bytes = svg.len(), "exported chart");
    Ok(path)
}
