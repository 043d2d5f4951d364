use std::collections::HashSet;

use eframe::egui::{Color32, Pos2, Rect, Vec2, pos2};

use crate::org::{Department, EdgeKind, NodeRole};

use super::hit_test::HoverState;
use super::layout::SimulationFrame;
use super::viewport::ViewTransform;

pub const DIMMED_OPACITY: f32 = 0.25;
const CURVE_SEGMENTS: usize = 16;
const CURVE_BEND: f32 = 0.12;
const ARROW_LENGTH: f32 = 9.0;
const ARROW_HALF_WIDTH: f32 = 4.5;

/// Drawn radius in graph units; hit radii are configured separately.
pub fn node_radius(role: NodeRole) -> f32 {
    match role {
        NodeRole::Executive => 28.0,
        NodeRole::Manager => 22.0,
        NodeRole::Employee => 16.0,
        NodeRole::DepartmentGroup => 0.0,
    }
}

/// Per-frame inputs that change styling but never geometry.
#[derive(Clone, Copy)]
pub struct Highlight<'a> {
    pub hover: &'a HoverState,
    pub search: &'a HashSet<String>,
    pub selected: Option<&'a str>,
    pub focused: Option<&'a str>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NodeShape {
    pub id: String,
    pub label: String,
    pub title: String,
    pub department: Department,
    pub role: NodeRole,
    pub center: Pos2,
    pub radius: f32,
    pub color: Color32,
    pub opacity: f32,
    pub selected: bool,
    pub focused: bool,
    pub hovered: bool,
    pub search_match: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LinkShape {
    pub kind: EdgeKind,
    pub points: Vec<Pos2>,
    /// Tip first, then the two barbs.
    pub arrow: Option<[Pos2; 3]>,
    pub dashed: bool,
    pub color: Color32,
    pub opacity: f32,
}

#[derive(Clone, Debug)]
pub struct Scene {
    pub canvas: Rect,
    pub zoom: f32,
    pub nodes: Vec<NodeShape>,
    pub links: Vec<LinkShape>,
}

fn quadratic_curve(start: Pos2, end: Pos2) -> Vec<Pos2> {
    let delta = end - start;
    let normal = Vec2::new(-delta.y, delta.x) * CURVE_BEND;
    let control = start + delta * 0.5 + normal;

    (0..=CURVE_SEGMENTS)
        .map(|step| {
            let t = step as f32 / CURVE_SEGMENTS as f32;
            let inverse = 1.0 - t;
            let x = inverse * inverse * start.x + 2.0 * inverse * t * control.x + t * t * end.x;
            let y = inverse * inverse * start.y + 2.0 * inverse * t * control.y + t * t * end.y;
            pos2(x, y)
        })
        .collect()
}

/// Trims the curve so it stops at the target's rim, then builds the head.
fn arrow_head(points: &mut Vec<Pos2>, target_radius: f32, zoom: f32) -> Option<[Pos2; 3]> {
    let end = *points.last()?;
    let outside = points[..points.len() - 1]
        .iter()
        .rposition(|point| point.distance(end) > target_radius)
        .unwrap_or(0);

    let direction = (end - points[outside]).normalized();
    if !direction.is_finite() || direction == Vec2::ZERO {
        return None;
    }
    let tip = end - direction * target_radius;
    points.truncate(outside + 1);
    points.push(tip);

    let back = tip - direction * ARROW_LENGTH * zoom;
    let side = direction.rot90() * ARROW_HALF_WIDTH * zoom;
    Some([tip, back + side, back - side])
}

impl Scene {
    /// Pure projection of one frame through the viewport transform.
    pub fn project(
        frame: &SimulationFrame,
        transform: ViewTransform,
        origin: Pos2,
        canvas: Rect,
        highlight: Highlight<'_>,
    ) -> Self {
        let zoom = transform.zoom;
        let screen = frame
            .nodes
            .iter()
            .map(|entry| transform.to_screen(origin, entry.position))
            .collect::<Vec<_>>();

        let opacity_for = |department: Department, search_match: bool| {
            match highlight.hover.department {
                Some(hovered) if hovered != department && !search_match => DIMMED_OPACITY,
                _ => 1.0,
            }
        };

        let links = frame
            .links
            .iter()
            .filter_map(|link| {
                let source = frame.nodes.get(link.source)?;
                let target = frame.nodes.get(link.target)?;
                let start = screen[link.source];
                let end = screen[link.target];
                if !start.is_finite() || !end.is_finite() {
                    return None;
                }

                let mut points = quadratic_curve(start, end);
                let arrow = match link.kind {
                    EdgeKind::ReportsTo => {
                        arrow_head(&mut points, node_radius(target.node.role) * zoom, zoom)
                    }
                    EdgeKind::DepartmentMembership => None,
                };
                let color = if source.node.is_grouping() || target.node.is_grouping() {
                    target.node.department.color()
                } else {
                    Color32::from_gray(150)
                };

                Some(LinkShape {
                    kind: link.kind,
                    points,
                    arrow,
                    dashed: link.kind == EdgeKind::DepartmentMembership,
                    color,
                    opacity: opacity_for(target.node.department, false),
                })
            })
            .collect();

        let nodes = frame
            .nodes
            .iter()
            .zip(&screen)
            .filter(|(entry, center)| !entry.node.is_grouping() && center.is_finite())
            .map(|(entry, center)| {
                let node = &entry.node;
                let search_match = highlight.search.contains(&node.id);
                NodeShape {
                    id: node.id.clone(),
                    label: node.name.clone(),
                    title: node.display_title().to_owned(),
                    department: node.department,
                    role: node.role,
                    center: *center,
                    radius: node_radius(node.role) * zoom,
                    color: node.department.color(),
                    opacity: opacity_for(node.department, search_match),
                    selected: highlight.selected == Some(node.id.as_str()),
                    focused: highlight.focused == Some(node.id.as_str()),
                    hovered: highlight.hover.node.as_deref() == Some(node.id.as_str()),
                    search_match,
                }
            })
            .collect();

        Self {
            canvas,
            zoom,
            nodes,
            links,
        }
    }

    pub fn node(&self, id: &str) -> Option<&NodeShape> {
        self.nodes.iter().find(|shape| shape.id == id)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use eframe::egui::vec2;

    use super::*;
    use crate::chart::layout::{LayoutConfig, LayoutEngine};
    use crate::org::derive_active_subset;
    use crate::org::fixtures::small_catalog;

    fn frame() -> SimulationFrame {
        let catalog = small_catalog();
        let subset = derive_active_subset(&catalog, "", &BTreeSet::new());
        let mut engine = LayoutEngine::build(
            &subset,
            vec2(800.0, 600.0),
            catalog.departments(),
            LayoutConfig::default(),
            None,
        );
        engine.pin_levels();
        engine.tick();
        engine.frame()
    }

    fn canvas() -> Rect {
        Rect::from_min_size(pos2(20.0, 30.0), vec2(800.0, 600.0))
    }

    fn project(frame: &SimulationFrame, hover: &HoverState, search: &HashSet<String>) -> Scene {
        Scene::project(
            frame,
            ViewTransform::IDENTITY,
            canvas().min,
            canvas(),
            Highlight {
                hover,
                search,
                selected: Some("cto"),
                focused: None,
            },
        )
    }

    #[test]
    fn grouping_nodes_are_not_drawn_but_their_links_are() {
        let frame = frame();
        let scene = project(&frame, &HoverState::default(), &HashSet::new());
        assert_eq!(scene.nodes.len(), 8);
        assert!(scene.node("grp-engineering").is_none());
        assert_eq!(scene.links.len(), frame.links.len());
        assert!(scene.node("cto").unwrap().selected);
    }

    #[test]
    fn link_styles_follow_edge_kind() {
        let frame = frame();
        let scene = project(&frame, &HoverState::default(), &HashSet::new());
        for link in &scene.links {
            match link.kind {
                EdgeKind::ReportsTo => {
                    assert!(!link.dashed);
                    assert!(link.arrow.is_some());
                }
                EdgeKind::DepartmentMembership => {
                    assert!(link.dashed);
                    assert!(link.arrow.is_none());
                }
            }
            assert!(link.points.len() >= 2);
        }
    }

    #[test]
    fn positions_follow_the_viewport_transform() {
        let frame = frame();
        let transform = ViewTransform {
            pan: vec2(15.0, -5.0),
            zoom: 0.5,
        };
        let hover = HoverState::default();
        let search = HashSet::new();
        let scene = Scene::project(
            &frame,
            transform,
            canvas().min,
            canvas(),
            Highlight {
                hover: &hover,
                search: &search,
                selected: None,
                focused: None,
            },
        );
        let graph = frame.position_of("ceo").unwrap();
        let shape = scene.node("ceo").unwrap();
        assert_eq!(shape.center, canvas().min + vec2(15.0, -5.0) + graph * 0.5);
        assert_eq!(shape.radius, node_radius(NodeRole::Executive) * 0.5);
    }

    #[test]
    fn hover_dims_other_departments_but_search_wins() {
        let frame = frame();
        let hover = HoverState {
            node: Some("engineer1".to_owned()),
            department: Some(Department::Engineering),
        };
        let search = HashSet::from(["marketer1".to_owned()]);
        let scene = project(&frame, &hover, &search);

        assert_eq!(scene.node("engineer2").unwrap().opacity, 1.0);
        assert_eq!(scene.node("mkt-manager1").unwrap().opacity, DIMMED_OPACITY);
        let marketer = scene.node("marketer1").unwrap();
        assert_eq!(marketer.opacity, 1.0);
        assert!(marketer.search_match);
        assert!(scene.node("engineer1").unwrap().hovered);

        let before = project(&frame, &HoverState::default(), &HashSet::new());
        for shape in &scene.nodes {
            assert_eq!(shape.center, before.node(&shape.id).unwrap().center);
        }
    }
}
