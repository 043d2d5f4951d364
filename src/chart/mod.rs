//! One mounted chart: the layout engine, its timers, the viewport and every
//! piece of interaction state, behind a single owner with a single teardown.

pub mod filter;
pub mod interaction;
pub mod layout;
pub mod lifecycle;
pub mod scene;
pub mod svg;
pub mod viewport;

use std::collections::HashSet;
use std::sync::Arc;

use eframe::egui::{Pos2, Rect, Vec2};
use tracing::{debug, info};

use crate::org::{ActiveSubset, Department, OrgCatalog, OrgNode};

use filter::{FilterConfig, FilterState};
use hit_test::{HitTester, HoverState};
use interaction::{InteractionConfig, InteractionController, SelectionChange};
use layout::{LayoutConfig, LayoutEngine, SimulationFrame};
use lifecycle::{SimulationLifecycle, TimerKind};
use scene::{Highlight, Scene};
use viewport::{Viewport, ViewportConfig};

#[derive(Clone, Debug, Default)]
pub struct ChartConfig {
    pub layout: LayoutConfig,
    pub viewport: ViewportConfig,
    pub interaction: InteractionConfig,
    pub filter: FilterConfig,
}

/// Outputs for the host, drained with [`OrgChart::take_events`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChartEvent {
    NodeSelected(Option<String>),
    ExportRequested,
}

pub struct OrgChart {
    catalog: Arc<OrgCatalog>,
    config: ChartConfig,
    filter: FilterState,
    subset: ActiveSubset,
    lifecycle: SimulationLifecycle,
    viewport: Viewport,
    interaction: InteractionController,
    hit_tester: HitTester,
    hover: HoverState,
    search_highlight: HashSet<String>,
    frame: SimulationFrame,
    pending_canvas: Option<Rect>,
    events: Vec<ChartEvent>,
    torn_down: bool,
}

impl OrgChart {
    pub fn new(catalog: Arc<OrgCatalog>, canvas: Rect, config: ChartConfig, now: f64) -> Self {
        let filter = FilterState::default();
        let subset = filter.derive(&catalog);
        let mut chart = Self {
            viewport: Viewport::new(config.viewport.clone(), canvas),
            interaction: InteractionController::new(&config.interaction),
            hit_tester: HitTester::new(config.interaction.hit_radii),
            catalog,
            config,
            filter,
            subset,
            lifecycle: SimulationLifecycle::default(),
            hover: HoverState::default(),
            search_highlight: HashSet::new(),
            frame: SimulationFrame::default(),
            pending_canvas: None,
            events: Vec::new(),
            torn_down: false,
        };
        chart.restart_engine(now);
        chart
    }

    fn layout_canvas(&self) -> Vec2 {
        self.viewport.canvas().size()
    }

    /// Builds a fresh engine for the current subset, seeded from the old one.
    fn restart_engine(&mut self, now: f64) {
        let engine = LayoutEngine::build(
            &self.subset,
            self.layout_canvas(),
            self.catalog.departments(),
            self.config.layout.clone(),
            self.lifecycle.engine(),
        );
        self.lifecycle.start(engine, now);
        if let Some(engine) = self.lifecycle.engine() {
            self.frame = engine.frame();
        }
    }

    /// Re-derives the subset; the engine is rebuilt only when it changed.
    fn refresh_subset(&mut self, now: f64) {
        let subset = self.filter.derive(&self.catalog);
        self.search_highlight = self.filter.search_highlight(&subset.nodes);
        if subset.same_members(&self.subset) {
            return;
        }

        info!(
            nodes = subset.nodes.len(),
            edges = subset.edges.len(),
            people = subset.person_count(),
            "active subset changed"
        );
        self.subset = subset;
        if let Some(id) = self.interaction.dragging()
            && !self.subset.contains(id)
        {
            self.interaction.cancel_drag();
        }
        self.interaction.retain_focus(&self.subset.nodes);
        self.hover = HoverState::default();
        self.restart_engine(now);
    }

    /// Per-frame entry point: fires due timers, advances the simulation one
    /// tick and the zoom animation, then syncs the zoom readout.
    pub fn frame(&mut self, now: f64) -> &SimulationFrame {
        if self.torn_down {
            return &self.frame;
        }

        for kind in self.lifecycle.fire_due(now) {
            match kind {
                TimerKind::SearchDebounce => {
                    if self.filter.apply_query() {
                        self.refresh_subset(now);
                    }
                }
                TimerKind::ResizeDebounce => {
                    if let Some(canvas) = self.pending_canvas.take() {
                        debug!(
                            width = canvas.width(),
                            height = canvas.height(),
                            "rebuilding after resize"
                        );
                        self.restart_engine(now);
                    }
                }
                TimerKind::ReleaseLevelPins => {}
            }
        }

        if let Some(frame) = self.lifecycle.tick() {
            self.frame = frame;
        }
        self.viewport.advance(now);
        self.viewport.end_frame();
        &self.frame
    }

    /// Whether the host should schedule another frame.
    pub fn wants_frame(&mut self) -> bool {
        if self.torn_down {
            return false;
        }
        let requested = self.lifecycle.scheduler_mut().take_frame_request();
        requested || self.viewport.is_animating() || self.lifecycle.scheduler().pending_count() > 0
    }

    pub fn resize(&mut self, canvas: Rect, now: f64) {
        if self.torn_down || canvas == self.viewport.canvas() {
            return;
        }
        let size_changed = canvas.size() != self.viewport.canvas().size();
        self.viewport.set_canvas(canvas);
        if size_changed {
            self.pending_canvas = Some(canvas);
            self.lifecycle.schedule(
                TimerKind::ResizeDebounce,
                now,
                self.config.filter.resize_debounce_secs,
            );
        }
    }

    pub fn set_query(&mut self, text: &str, now: f64) {
        if self.torn_down {
            return;
        }
        if self.filter.set_query(text) {
            self.lifecycle.schedule(
                TimerKind::SearchDebounce,
                now,
                self.config.filter.search_debounce_secs,
            );
        }
    }

    pub fn toggle_department(&mut self, department: Department, now: f64) {
        if self.torn_down {
            return;
        }
        self.filter.toggle_department(department);
        self.refresh_subset(now);
    }

    pub fn clear_departments(&mut self, now: f64) {
        if !self.torn_down && self.filter.clear_departments() {
            self.refresh_subset(now);
        }
    }

    fn hit(&self, screen: Pos2) -> Option<Arc<OrgNode>> {
        let graph = self.viewport.to_graph(screen);
        self.hit_tester
            .nearest(&self.frame.nodes, graph)
            .map(|entry| Arc::clone(&entry.node))
    }

    /// Pointer moved over the canvas: updates the drag pin or the hover.
    pub fn pointer_moved(&mut self, screen: Pos2) {
        if self.torn_down {
            return;
        }
        if self.interaction.dragging().is_some() {
            let graph = self.viewport.to_graph(screen);
            if let Some(intent) = self.interaction.drag_to(graph)
                && let Some(engine) = self.lifecycle.engine_mut()
            {
                engine.queue_pin(intent);
            }
            return;
        }

        let graph = self.viewport.to_graph(screen);
        self.hover = HoverState::from_hit(self.hit_tester.nearest(&self.frame.nodes, graph));
    }

    pub fn pointer_left(&mut self) {
        if self.interaction.dragging().is_none() {
            self.hover = HoverState::default();
        }
    }

    /// Primary press. Returns `true` when a node drag began, so the host
    /// should not treat the gesture as a pan.
    pub fn press(&mut self, screen: Pos2) -> bool {
        if self.torn_down {
            return false;
        }
        let Some(node) = self.hit(screen) else {
            return false;
        };
        let Some(engine) = self.lifecycle.engine_mut() else {
            return false;
        };
        let Some(level_height) = engine.level_height_of(&node.id) else {
            return false;
        };

        match self.interaction.begin_drag(&node, level_height) {
            Ok(()) => {
                engine.reheat();
                true
            }
            Err(refused) => {
                debug!(id = %node.id, %refused, "drag refused");
                false
            }
        }
    }

    pub fn release(&mut self) {
        let Some(intent) = self.interaction.end_drag() else {
            return;
        };
        if let Some(engine) = self.lifecycle.engine_mut() {
            engine.queue_pin(intent);
            engine.cool();
        }
    }

    pub fn click(&mut self, screen: Pos2) {
        if self.torn_down {
            return;
        }
        if let Some(node) = self.hit(screen)
            && let Some(change) = self.interaction.toggle_selection(&node)
        {
            self.emit_selection(change);
        }
    }

    fn emit_selection(&mut self, change: SelectionChange) {
        self.events.push(ChartEvent::NodeSelected(change.selected));
    }

    pub fn select(&mut self, id: Option<&str>) {
        if self.torn_down || self.interaction.selected() == id {
            return;
        }
        let change = match id.and_then(|id| self.catalog.node(id)).cloned() {
            Some(node) => self.interaction.toggle_selection(&node),
            None => self.interaction.clear_selection(),
        };
        if let Some(change) = change {
            self.emit_selection(change);
        }
    }

    pub fn focus_next(&mut self) {
        if !self.torn_down {
            self.interaction.focus_next(&self.subset.nodes);
        }
    }

    pub fn focus_prev(&mut self) {
        if !self.torn_down {
            self.interaction.focus_prev(&self.subset.nodes);
        }
    }

    pub fn activate_focused(&mut self) {
        if self.torn_down {
            return;
        }
        if let Some(change) = self.interaction.activate_focused() {
            self.emit_selection(change);
        }
    }

    pub fn zoom_in(&mut self, now: f64) {
        if !self.torn_down {
            self.viewport.zoom_in(now);
        }
    }

    pub fn zoom_out(&mut self, now: f64) {
        if !self.torn_down {
            self.viewport.zoom_out(now);
        }
    }

    pub fn zoom_at(&mut self, pointer: Pos2, factor: f32) {
        if !self.torn_down {
            self.viewport.zoom_at(pointer, factor);
        }
    }

    pub fn pan_by(&mut self, delta: Vec2) {
        if !self.torn_down {
            self.viewport.pan_by(delta);
        }
    }

    /// Identity transform, no selection, every node back on its level.
    pub fn reset(&mut self) {
        if self.torn_down {
            return;
        }
        self.viewport.reset();
        if let Some(change) = self.interaction.clear_selection() {
            self.emit_selection(change);
        }
        if let Some(engine) = self.lifecycle.engine_mut() {
            engine.pin_levels();
        }
        // A release still pending from the last rebuild would undo the pins.
        self.lifecycle
            .scheduler_mut()
            .cancel(TimerKind::ReleaseLevelPins);
        info!("chart view reset");
    }

    pub fn request_export(&mut self) {
        if !self.torn_down {
            self.events.push(ChartEvent::ExportRequested);
        }
    }

    pub fn take_events(&mut self) -> Vec<ChartEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn scene(&self) -> Scene {
        Scene::project(
            &self.frame,
            self.viewport.transform(),
            self.viewport.origin(),
            self.viewport.canvas(),
            Highlight {
                hover: &self.hover,
                search: &self.search_highlight,
                selected: self.interaction.selected(),
                focused: self.interaction.focused(),
            },
        )
    }

    pub fn export_svg(&self) -> String {
        svg::render_svg(&self.scene())
    }

    /// Stops the simulation and cancels every timer and frame request.
    /// Nothing mutates chart state afterwards. Idempotent.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.interaction.cancel_drag();
        self.lifecycle.stop();
        self.pending_canvas = None;
        info!("org chart torn down");
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    pub fn filter(&self) -> &FilterState {
        &self.filter
    }

    pub fn subset(&self) -> &ActiveSubset {
        &self.subset
    }

    pub fn hover(&self) -> &HoverState {
        &self.hover
    }

    pub fn selected(&self) -> Option<&str> {
        self.interaction.selected()
    }

    pub fn focused(&self) -> Option<&str> {
        self.interaction.focused()
    }

    pub fn dragging(&self) -> Option<&str> {
        self.interaction.dragging()
    }

    pub fn zoom_percent(&self) -> u32 {
        self.viewport.zoom_percent()
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn simulation_frame(&self) -> &SimulationFrame {
        &self.frame
    }

    pub fn engine(&self) -> Option<&LayoutEngine> {
        self.lifecycle.engine()
    }

    pub fn lifecycle(&self) -> &SimulationLifecycle {
        &self.lifecycle
    }
}

impl Drop for OrgChart {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use eframe::egui::{pos2, vec2};

    use super::*;
    use crate::org::fixtures::small_catalog;

    const DT: f64 = 1.0 / 60.0;

    fn canvas() -> Rect {
        Rect::from_min_size(pos2(0.0, 0.0), vec2(1200.0, 800.0))
    }

    fn chart() -> OrgChart {
        OrgChart::new(
            Arc::new(small_catalog()),
            canvas(),
            ChartConfig::default(),
            0.0,
        )
    }

    fn run(chart: &mut OrgChart, from: f64, frames: usize) -> f64 {
        let mut now = from;
        for _ in 0..frames {
            now += DT;
            chart.frame(now);
        }
        now
    }

    fn screen_of(chart: &OrgChart, id: &str) -> Pos2 {
        let graph = chart.simulation_frame().position_of(id).unwrap();
        chart.viewport().to_screen(graph)
    }

    #[test]
    fn dragging_far_away_ends_exactly_on_the_level() {
        let mut chart = chart();
        let now = run(&mut chart, 0.0, 90);

        let start = screen_of(&chart, "engineer1");
        assert!(chart.press(start));
        assert_eq!(chart.dragging(), Some("engineer1"));
        chart.pointer_moved(pos2(-50_000.0, 90_000.0));
        let now = run(&mut chart, now, 1);

        let level = chart.engine().unwrap().level_height_of("engineer1").unwrap();
        let mid = chart.simulation_frame().position_of("engineer1").unwrap();
        assert!((mid.y - level).abs() <= 40.0);
        assert!(mid.x < -10_000.0);

        chart.release();
        run(&mut chart, now, 1);
        let released = chart.simulation_frame().position_of("engineer1").unwrap();
        assert_eq!(released.y, level);
        assert!(chart.dragging().is_none());
    }

    #[test]
    fn drag_reheats_and_release_cools() {
        let mut chart = chart();
        let now = run(&mut chart, 0.0, 5);
        let floor = chart.engine().unwrap().config().alpha_floor;
        let reheat = chart.engine().unwrap().config().reheat_alpha_target;

        assert!(chart.press(screen_of(&chart, "cmo")));
        assert_eq!(chart.engine().unwrap().alpha_target(), reheat);
        chart.release();
        assert_eq!(chart.engine().unwrap().alpha_target(), floor);
        run(&mut chart, now, 1);
    }

    #[test]
    fn clicks_toggle_selection_and_emit_events() {
        let mut chart = chart();
        run(&mut chart, 0.0, 2);
        let at = screen_of(&chart, "cto");
        chart.click(at);
        chart.click(at);
        assert_eq!(
            chart.take_events(),
            vec![
                ChartEvent::NodeSelected(Some("cto".to_owned())),
                ChartEvent::NodeSelected(None),
            ]
        );
        chart.click(pos2(-9_999.0, -9_999.0));
        assert!(chart.take_events().is_empty());
    }

    #[test]
    fn reset_restores_identity_clears_selection_and_repins_levels() {
        let mut chart = chart();
        let now = run(&mut chart, 0.0, 120);
        chart.select(Some("marketer1"));
        chart.pan_by(vec2(300.0, -120.0));
        chart.zoom_in(now);
        chart.take_events();

        chart.reset();
        assert_eq!(chart.viewport().transform(), viewport::ViewTransform::IDENTITY);
        assert_eq!(chart.selected(), None);
        assert_eq!(chart.take_events(), vec![ChartEvent::NodeSelected(None)]);

        let engine = chart.engine().unwrap();
        let config = engine.config().clone();
        for node in chart.subset().nodes.iter() {
            let state = engine.node_state(&node.id).unwrap();
            assert_eq!(state.fy, Some(config.level_height(node.level)));
            assert_eq!(state.fx, None);
        }
    }

    #[test]
    fn reset_pins_survive_the_release_timer_of_the_last_rebuild() {
        let mut chart = chart();
        let now = run(&mut chart, 0.0, 6);
        assert!(chart
            .lifecycle()
            .scheduler()
            .is_pending(TimerKind::ReleaseLevelPins));

        chart.reset();
        assert!(!chart
            .lifecycle()
            .scheduler()
            .is_pending(TimerKind::ReleaseLevelPins));
        run(&mut chart, now, 120);

        let level = chart.engine().unwrap().level_height_of("engineer1").unwrap();
        let state = chart.engine().unwrap().node_state("engineer1").unwrap();
        assert_eq!(state.fy, Some(level));
        assert_eq!(
            chart.simulation_frame().position_of("engineer1").unwrap().y,
            level
        );
    }

    #[test]
    fn search_waits_for_the_debounce_then_rebuilds() {
        let mut chart = chart();
        let now = run(&mut chart, 0.0, 2);
        chart.set_query("marketer", now);
        chart.frame(now + 0.1);
        assert!(chart.subset().contains("engineer1"));

        chart.set_query("marketer1", now + 0.2);
        chart.frame(now + 0.45);
        assert!(chart.subset().contains("engineer1"));

        chart.frame(now + 0.55);
        assert!(!chart.subset().contains("engineer1"));
        assert!(chart.subset().contains("marketer1"));
        let scene = chart.scene();
        assert!(scene.node("marketer1").unwrap().search_match);
        assert!(!scene.node("mkt-manager1").unwrap().search_match);
    }

    #[test]
    fn filter_change_keeps_surviving_positions() {
        let mut chart = chart();
        let now = run(&mut chart, 0.0, 30);
        let before = chart.simulation_frame().position_of("engineer2").unwrap();
        chart.toggle_department(Department::Engineering, now);
        assert!(!chart.subset().contains("marketer1"));
        assert_eq!(
            chart.simulation_frame().position_of("engineer2").unwrap(),
            before
        );
    }

    #[test]
    fn hover_tracks_the_nearest_person() {
        let mut chart = chart();
        run(&mut chart, 0.0, 2);
        chart.pointer_moved(screen_of(&chart, "mkt-manager1"));
        assert_eq!(chart.hover().node.as_deref(), Some("mkt-manager1"));
        assert_eq!(chart.hover().department, Some(Department::Marketing));
        chart.pointer_left();
        assert_eq!(chart.hover(), &HoverState::default());
    }

    #[test]
    fn keyboard_activation_selects_the_focused_person() {
        let mut chart = chart();
        chart.focus_next();
        chart.focus_next();
        assert_eq!(chart.focused(), Some("cto"));
        chart.activate_focused();
        assert_eq!(chart.selected(), Some("cto"));
        assert_eq!(
            chart.take_events(),
            vec![ChartEvent::NodeSelected(Some("cto".to_owned()))]
        );
    }

    #[test]
    fn teardown_cancels_timers_and_freezes_the_graph() {
        let mut chart = chart();
        let now = run(&mut chart, 0.0, 3);
        chart.set_query("engineer", now);
        chart.resize(Rect::from_min_size(pos2(0.0, 0.0), vec2(900.0, 700.0)), now);
        assert!(chart.lifecycle().scheduler().pending_count() >= 2);

        chart.teardown();
        assert!(chart.is_torn_down());
        assert_eq!(chart.lifecycle().scheduler().pending_count(), 0);
        assert!(!chart.wants_frame());
        assert!(!chart.engine().unwrap().is_running());

        let frozen = chart.simulation_frame().clone();
        let ticks = chart.engine().unwrap().ticks();
        run(&mut chart, now, 120);
        chart.pointer_moved(pos2(10.0, 10.0));
        chart.toggle_department(Department::Marketing, now + 5.0);
        chart.reset();

        assert_eq!(chart.engine().unwrap().ticks(), ticks);
        assert!(chart.subset().contains("engineer1"));
        for (a, b) in frozen.nodes.iter().zip(&chart.simulation_frame().nodes) {
            assert_eq!(a.position, b.position);
        }
        chart.teardown();
    }

    #[test]
    fn resize_rebuilds_after_the_debounce() {
        let mut chart = chart();
        let now = run(&mut chart, 0.0, 3);
        let bigger = Rect::from_min_size(pos2(0.0, 0.0), vec2(1600.0, 900.0));
        chart.resize(bigger, now);
        assert_eq!(chart.viewport().canvas(), bigger);
        chart.frame(now + 0.1);
        assert_eq!(chart.engine().unwrap().canvas(), vec2(1200.0, 800.0));
        assert!(chart.lifecycle().scheduler().is_pending(TimerKind::ResizeDebounce));

        chart.frame(now + 0.3);
        assert_eq!(chart.engine().unwrap().canvas(), vec2(1600.0, 900.0));
        assert!(!chart.lifecycle().scheduler().is_pending(TimerKind::ResizeDebounce));
        assert!(chart.lifecycle().scheduler().is_pending(TimerKind::ReleaseLevelPins));
    }

    #[test]
    fn export_serializes_the_current_scene() {
        let mut chart = chart();
        run(&mut chart, 0.0, 2);
        chart.request_export();
        assert_eq!(chart.take_events(), vec![ChartEvent::ExportRequested]);
        let svg = chart.export_svg();
        assert!(svg.contains("data-id=\"engineer1\""));
        assert!(!svg.contains("grp-engineering"));
    }
}
