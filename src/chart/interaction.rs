use std::sync::Arc;

use eframe::egui::Vec2;
use thiserror::Error;
use tracing::debug;

use crate::org::OrgNode;

use super::layout::{Pin, PinIntent, RoleRadii};

#[derive(Clone, Debug)]
pub struct InteractionConfig {
    /// Vertical slack around a node's level height while dragging.
    pub drag_band: f32,
    pub hit_radii: RoleRadii,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            drag_band: 40.0,
            hit_radii: RoleRadii {
                executive: 40.0,
                manager: 32.0,
                employee: 26.0,
                grouping: 0.0,
            },
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DragRefused {
    #[error("department grouping nodes cannot be dragged")]
    GroupingNode,
    #[error("node {0} is already being dragged")]
    AlreadyDragging(String),
}

#[derive(Clone, Debug, PartialEq)]
struct DragState {
    id: String,
    level_height: f32,
}

/// New selection after a toggle; `None` inside means "nothing selected".
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectionChange {
    pub selected: Option<String>,
}

#[derive(Debug, Default)]
pub struct InteractionController {
    drag_band: f32,
    dragging: Option<DragState>,
    selected: Option<String>,
    focused: Option<String>,
}

impl InteractionController {
    pub fn new(config: &InteractionConfig) -> Self {
        Self {
            drag_band: config.drag_band,
            ..Self::default()
        }
    }

    pub fn dragging(&self) -> Option<&str> {
        self.dragging.as_ref().map(|drag| drag.id.as_str())
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn focused(&self) -> Option<&str> {
        self.focused.as_deref()
    }

    pub fn begin_drag(&mut self, node: &OrgNode, level_height: f32) -> Result<(), DragRefused> {
        if node.is_grouping() {
            return Err(DragRefused::GroupingNode);
        }
        if let Some(active) = &self.dragging {
            return Err(DragRefused::AlreadyDragging(active.id.clone()));
        }

        debug!(id = %node.id, "drag started");
        self.dragging = Some(DragState {
            id: node.id.clone(),
            level_height,
        });
        Ok(())
    }

    /// Horizontal follows the pointer; vertical stays within the level band.
    pub fn drag_to(&self, graph: Vec2) -> Option<PinIntent> {
        let drag = self.dragging.as_ref()?;
        if !graph.is_finite() {
            return None;
        }

        let y = graph.y.clamp(
            drag.level_height - self.drag_band,
            drag.level_height + self.drag_band,
        );
        Some(PinIntent {
            id: drag.id.clone(),
            x: Pin::At(graph.x),
            y: Pin::At(y),
        })
    }

    pub fn end_drag(&mut self) -> Option<PinIntent> {
        let drag = self.dragging.take()?;
        debug!(id = %drag.id, "drag ended");
        Some(PinIntent {
            id: drag.id,
            x: Pin::Clear,
            y: Pin::At(drag.level_height),
        })
    }

    /// Forgets a drag whose node left the active subset.
    pub fn cancel_drag(&mut self) {
        self.dragging = None;
    }

    pub fn toggle_selection(&mut self, node: &OrgNode) -> Option<SelectionChange> {
        if node.is_grouping() {
            debug!(id = %node.id, "ignoring selection of grouping node");
            return None;
        }
        Some(self.toggle_id(&node.id))
    }

    fn toggle_id(&mut self, id: &str) -> SelectionChange {
        if self.selected.as_deref() == Some(id) {
            self.selected = None;
        } else {
            self.selected = Some(id.to_owned());
        }
        debug!(selected = ?self.selected, "selection changed");
        SelectionChange {
            selected: self.selected.clone(),
        }
    }

    pub fn clear_selection(&mut self) -> Option<SelectionChange> {
        self.selected.take()?;
        Some(SelectionChange { selected: None })
    }

    pub fn focus_next(&mut self, nodes: &[Arc<OrgNode>]) -> Option<&str> {
        self.move_focus(nodes, true)
    }

    pub fn focus_prev(&mut self, nodes: &[Arc<OrgNode>]) -> Option<&str> {
        self.move_focus(nodes, false)
    }

    fn move_focus(&mut self, nodes: &[Arc<OrgNode>], forward: bool) -> Option<&str> {
        let order = nodes
            .iter()
            .filter(|node| !node.is_grouping())
            .collect::<Vec<_>>();
        if order.is_empty() {
            self.focused = None;
            return None;
        }

        let current = self
            .focused
            .as_deref()
            .and_then(|id| order.iter().position(|node| node.id == id));
        let next = match (current, forward) {
            (None, true) => 0,
            (None, false) => order.len() - 1,
            (Some(index), true) => (index + 1) % order.len(),
            (Some(index), false) => (index + order.len() - 1) % order.len(),
        };
        self.focused = Some(order[next].id.clone());
        self.focused.as_deref()
    }

    /// Keyboard activation: same toggle as a click on the focused node.
    pub fn activate_focused(&mut self) -> Option<SelectionChange> {
        let id = self.focused.clone()?;
        Some(self.toggle_id(&id))
    }

    /// Drops focus that no longer points at an active node.
    pub fn retain_focus(&mut self, nodes: &[Arc<OrgNode>]) {
        if let Some(id) = self.focused.as_deref()
            && !nodes.iter().any(|node| node.id == id)
        {
            self.focused = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use eframe::egui::vec2;

    use super::*;
    use crate::org::fixtures::small_catalog;

    fn controller() -> InteractionController {
        InteractionController::new(&InteractionConfig::default())
    }

    #[test]
    fn vertical_drag_stays_inside_the_level_band() {
        let catalog = small_catalog();
        let mut controller = controller();
        controller
            .begin_drag(catalog.node("engineer1").unwrap(), 600.0)
            .unwrap();

        for pointer in [
            vec2(0.0, 0.0),
            vec2(-1e9, 1e9),
            vec2(1e30, -1e30),
            vec2(5.0, f32::MAX),
            vec2(5.0, f32::MIN),
            vec2(5.0, 615.0),
        ] {
            let intent = controller.drag_to(pointer).unwrap();
            let Pin::At(y) = intent.y else {
                panic!("vertical pin missing");
            };
            assert!((560.0..=640.0).contains(&y), "y {y} escaped the band");
            assert_eq!(intent.x, Pin::At(pointer.x));
        }
        assert!(controller.drag_to(vec2(f32::NAN, 0.0)).is_none());
    }

    #[test]
    fn release_clears_horizontal_and_pins_level() {
        let catalog = small_catalog();
        let mut controller = controller();
        controller
            .begin_drag(catalog.node("engineer1").unwrap(), 600.0)
            .unwrap();
        let intent = controller.end_drag().unwrap();
        assert_eq!(intent.x, Pin::Clear);
        assert_eq!(intent.y, Pin::At(600.0));
        assert!(controller.dragging().is_none());
        assert!(controller.end_drag().is_none());
    }

    #[test]
    fn grouping_nodes_and_second_drags_are_refused() {
        let catalog = small_catalog();
        let mut controller = controller();
        assert_eq!(
            controller.begin_drag(catalog.node("grp-engineering").unwrap(), 375.0),
            Err(DragRefused::GroupingNode)
        );
        controller
            .begin_drag(catalog.node("cto").unwrap(), 150.0)
            .unwrap();
        assert_eq!(
            controller.begin_drag(catalog.node("cmo").unwrap(), 150.0),
            Err(DragRefused::AlreadyDragging("cto".to_owned()))
        );
    }

    #[test]
    fn selecting_twice_deselects() {
        let catalog = small_catalog();
        let mut controller = controller();
        let node = catalog.node("marketer1").unwrap();
        assert_eq!(
            controller.toggle_selection(node).unwrap().selected.as_deref(),
            Some("marketer1")
        );
        assert_eq!(controller.toggle_selection(node).unwrap().selected, None);
        assert!(
            controller
                .toggle_selection(catalog.node("grp-marketing").unwrap())
                .is_none()
        );
        assert_eq!(controller.selected(), None);
    }

    #[test]
    fn tab_order_skips_grouping_nodes_and_wraps() {
        let catalog = small_catalog();
        let mut controller = controller();
        let mut seen = Vec::new();
        for _ in 0..9 {
            seen.push(controller.focus_next(catalog.nodes()).unwrap().to_owned());
        }
        assert_eq!(seen[0], "ceo");
        assert_eq!(seen[8], "ceo");
        assert!(seen.iter().all(|id| !id.starts_with("grp-")));

        assert_eq!(controller.focus_prev(catalog.nodes()), Some("marketer1"));
        let change = controller.activate_focused().unwrap();
        assert_eq!(change.selected.as_deref(), Some("marketer1"));
    }
}
