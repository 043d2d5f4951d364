//! Hierarchy-aware force layout.
//!
//! Velocity-Verlet integration in the style of d3-force: every force adds to
//! node velocities, then velocities decay and are applied to positions. Pins
//! (`fx`/`fy`) override the integrated value on their axis.

mod forces;
mod quadtree;

use std::collections::HashMap;
use std::sync::Arc;

use eframe::egui::{Vec2, vec2};
use tracing::{debug, warn};

use crate::org::{ActiveSubset, Department, EdgeKind, NodeRole, OrgNode};

use forces::{
    CollisionParams, accumulate_charge_for_node, accumulate_collision_pairs, apply_center,
    apply_horizontal, apply_links, apply_vertical,
};
use quadtree::QuadNode;

/// Per-role scalar, used for collision and hit radii.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RoleRadii {
    pub executive: f32,
    pub manager: f32,
    pub employee: f32,
    pub grouping: f32,
}

impl RoleRadii {
    pub fn for_role(&self, role: NodeRole) -> f32 {
        match role {
            NodeRole::Executive => self.executive,
            NodeRole::Manager => self.manager,
            NodeRole::Employee => self.employee,
            NodeRole::DepartmentGroup => self.grouping,
        }
    }
}

#[derive(Clone, Debug)]
pub struct LayoutConfig {
    pub vertical_spacing: f32,
    pub department_separation: f32,
    pub reports_to_distance: f32,
    pub reports_to_strength: f32,
    pub membership_distance: f32,
    pub membership_strength: f32,
    pub vertical_strength: f32,
    pub horizontal_strength: f32,
    pub collision_radii: RoleRadii,
    pub collision_strength: f32,
    pub collision_iterations: usize,
    pub center_strength: f32,
    pub charge_strength: f32,
    pub charge_theta: f32,
    pub initial_alpha: f32,
    pub alpha_decay: f32,
    /// Idle alpha target; the engine never cools below it while running.
    pub alpha_floor: f32,
    pub reheat_alpha_target: f32,
    pub velocity_decay: f32,
    pub level_pin_release_secs: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            vertical_spacing: 150.0,
            department_separation: 0.9,
            reports_to_distance: 90.0,
            reports_to_strength: 0.7,
            membership_distance: 180.0,
            membership_strength: 0.15,
            vertical_strength: 0.1,
            horizontal_strength: 0.03,
            collision_radii: RoleRadii {
                executive: 46.0,
                manager: 38.0,
                employee: 30.0,
                grouping: 12.0,
            },
            collision_strength: 0.8,
            collision_iterations: 3,
            center_strength: 0.02,
            charge_strength: -220.0,
            charge_theta: 0.9,
            initial_alpha: 0.1,
            alpha_decay: 0.0076,
            alpha_floor: 0.012,
            reheat_alpha_target: 0.3,
            velocity_decay: 0.4,
            level_pin_release_secs: 1.0,
        }
    }
}

impl LayoutConfig {
    pub fn level_height(&self, level: f32) -> f32 {
        level * self.vertical_spacing
    }
}

/// Axis update carried by a [`PinIntent`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Pin {
    Keep,
    Clear,
    At(f32),
}

impl Pin {
    fn apply(self, slot: &mut Option<f32>) {
        match self {
            Self::Keep => {}
            Self::Clear => *slot = None,
            Self::At(value) => *slot = Some(value),
        }
    }
}

/// Declarative pin request, consumed at the start of the next tick.
#[derive(Clone, Debug, PartialEq)]
pub struct PinIntent {
    pub id: String,
    pub x: Pin,
    pub y: Pin,
}

pub(crate) struct SimNode {
    node: Arc<OrgNode>,
    position: Vec2,
    velocity: Vec2,
    fx: Option<f32>,
    fy: Option<f32>,
    target_x: f32,
    radius: f32,
}

pub(crate) struct SimLink {
    source: usize,
    target: usize,
    distance: f32,
    strength: f32,
    bias: f32,
}

#[derive(Clone, Debug)]
pub struct FrameNode {
    pub node: Arc<OrgNode>,
    pub position: Vec2,
}

#[derive(Clone, Debug)]
pub struct FrameLink {
    pub source: usize,
    pub target: usize,
    pub kind: EdgeKind,
}

/// Immutable per-tick snapshot consumed by render sync and hit-testing.
#[derive(Clone, Debug, Default)]
pub struct SimulationFrame {
    pub alpha: f32,
    pub nodes: Vec<FrameNode>,
    pub links: Vec<FrameLink>,
}

impl SimulationFrame {
    pub fn position_of(&self, id: &str) -> Option<Vec2> {
        self.nodes
            .iter()
            .find(|entry| entry.node.id == id)
            .map(|entry| entry.position)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NodeState {
    pub position: Vec2,
    pub velocity: Vec2,
    pub fx: Option<f32>,
    pub fy: Option<f32>,
}

pub struct LayoutEngine {
    config: LayoutConfig,
    canvas: Vec2,
    nodes: Vec<SimNode>,
    links: Vec<SimLink>,
    link_kinds: Vec<EdgeKind>,
    index_by_id: HashMap<String, usize>,
    alpha: f32,
    alpha_target: f32,
    pending_pins: Vec<PinIntent>,
    running: bool,
    ticks: u64,
    scratch_positions: Vec<Vec2>,
    scratch_radii: Vec<f32>,
    scratch_corrections: Vec<Vec2>,
}

fn column_x(department: Department, columns: &[Department], canvas: Vec2, separation: f32) -> f32 {
    let center = canvas.x * 0.5;
    let Some(index) = columns.iter().position(|column| *column == department) else {
        return center;
    };
    let count = columns.len() as f32;
    let fraction = (index as f32 + 0.5) / count - 0.5;
    center + fraction * canvas.x * separation
}

/// Spiral seed around `anchor`, the node's column at its level height.
fn phyllotaxis(index: usize, anchor: Vec2) -> Vec2 {
    const INITIAL_RADIUS: f32 = 10.0;
    let angle = index as f32 * std::f32::consts::PI * (3.0 - 5.0_f32.sqrt());
    let radius = INITIAL_RADIUS * (0.5 + index as f32).sqrt();
    anchor + vec2(angle.cos(), angle.sin()) * radius
}

impl LayoutEngine {
    /// Builds a fresh simulation for `subset`, copying position and velocity
    /// by id from `prior` so the picture stays continuous across rebuilds.
    pub fn build(
        subset: &ActiveSubset,
        canvas: Vec2,
        columns: &[Department],
        config: LayoutConfig,
        prior: Option<&LayoutEngine>,
    ) -> Self {
        let mut index_by_id = HashMap::with_capacity(subset.nodes.len());
        let mut carried = 0usize;

        let nodes = subset
            .nodes
            .iter()
            .enumerate()
            .map(|(index, node)| {
                index_by_id.insert(node.id.clone(), index);
                let target_x = column_x(
                    node.department,
                    columns,
                    canvas,
                    config.department_separation,
                );
                let previous = prior.and_then(|engine| engine.node_state(&node.id));
                let (position, velocity) = match previous {
                    Some(state) => {
                        carried += 1;
                        (state.position, state.velocity)
                    }
                    None => {
                        let anchor = vec2(target_x, config.level_height(node.level));
                        (phyllotaxis(index, anchor), Vec2::ZERO)
                    }
                };

                SimNode {
                    node: Arc::clone(node),
                    position,
                    velocity,
                    fx: None,
                    fy: None,
                    target_x,
                    radius: config.collision_radii.for_role(node.role),
                }
            })
            .collect::<Vec<_>>();

        let mut degree = vec![0usize; nodes.len()];
        let mut resolved = Vec::with_capacity(subset.edges.len());
        for edge in &subset.edges {
            if let (Some(&source), Some(&target)) =
                (index_by_id.get(&edge.source), index_by_id.get(&edge.target))
            {
                degree[source] += 1;
                degree[target] += 1;
                resolved.push((source, target, edge.kind));
            }
        }

        let mut links = Vec::with_capacity(resolved.len());
        let mut link_kinds = Vec::with_capacity(resolved.len());
        for (source, target, kind) in resolved {
            let (distance, strength) = match kind {
                EdgeKind::ReportsTo => (config.reports_to_distance, config.reports_to_strength),
                EdgeKind::DepartmentMembership => {
                    (config.membership_distance, config.membership_strength)
                }
            };
            let bias = degree[source] as f32 / (degree[source] + degree[target]) as f32;
            links.push(SimLink {
                source,
                target,
                distance,
                strength,
                bias,
            });
            link_kinds.push(kind);
        }

        debug!(
            nodes = nodes.len(),
            links = links.len(),
            carried,
            "built layout engine"
        );

        Self {
            alpha: config.initial_alpha,
            alpha_target: config.alpha_floor,
            config,
            canvas,
            nodes,
            links,
            link_kinds,
            index_by_id,
            pending_pins: Vec::new(),
            running: true,
            ticks: 0,
            scratch_positions: Vec::new(),
            scratch_radii: Vec::new(),
            scratch_corrections: Vec::new(),
        }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn canvas(&self) -> Vec2 {
        self.canvas
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn alpha_target(&self) -> f32 {
        self.alpha_target
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index_by_id.contains_key(id)
    }

    pub fn node(&self, id: &str) -> Option<&Arc<OrgNode>> {
        self.index_by_id.get(id).map(|&index| &self.nodes[index].node)
    }

    pub fn node_state(&self, id: &str) -> Option<NodeState> {
        self.index_by_id.get(id).map(|&index| {
            let node = &self.nodes[index];
            NodeState {
                position: node.position,
                velocity: node.velocity,
                fx: node.fx,
                fy: node.fy,
            }
        })
    }

    pub fn level_height_of(&self, id: &str) -> Option<f32> {
        self.node(id)
            .map(|node| self.config.level_height(node.level))
    }

    /// Pins every node to its level height and clears horizontal pins.
    pub fn pin_levels(&mut self) {
        self.pending_pins.clear();
        for node in &mut self.nodes {
            node.fx = None;
            node.fy = Some(self.config.level_height(node.node.level));
        }
    }

    /// Releases vertical pins on people; grouping nodes stay on their level.
    pub fn release_level_pins(&mut self) {
        let mut released = 0usize;
        for node in &mut self.nodes {
            if !node.node.is_grouping() && node.fy.is_some() {
                node.fy = None;
                released += 1;
            }
        }
        debug!(released, "released level pins");
    }

    pub fn queue_pin(&mut self, intent: PinIntent) {
        if self.running {
            self.pending_pins.push(intent);
        }
    }

    pub fn pending_pin_count(&self) -> usize {
        self.pending_pins.len()
    }

    pub fn reheat(&mut self) {
        self.alpha_target = self.config.reheat_alpha_target;
    }

    pub fn cool(&mut self) {
        self.alpha_target = self.config.alpha_floor;
    }

    pub fn stop(&mut self) {
        self.running = false;
        self.pending_pins.clear();
    }

    fn apply_pending_pins(&mut self) {
        for intent in std::mem::take(&mut self.pending_pins) {
            let Some(&index) = self.index_by_id.get(&intent.id) else {
                continue;
            };
            let node = &mut self.nodes[index];
            intent.x.apply(&mut node.fx);
            intent.y.apply(&mut node.fy);
        }
    }

    /// Advances the simulation by one step. Returns `false` once stopped.
    pub fn tick(&mut self) -> bool {
        if !self.running {
            return false;
        }

        self.apply_pending_pins();
        self.reset_non_finite();

        self.alpha += (self.alpha_target - self.alpha) * self.config.alpha_decay;
        self.alpha = self.alpha.max(self.config.alpha_floor);
        let alpha = self.alpha;

        apply_links(&mut self.nodes, &self.links, alpha);
        apply_vertical(
            &mut self.nodes,
            self.config.vertical_spacing,
            self.config.vertical_strength,
        );
        apply_horizontal(&mut self.nodes, self.config.horizontal_strength);
        self.apply_charge(alpha);
        self.apply_collisions();
        apply_center(&mut self.nodes, self.canvas * 0.5, self.config.center_strength);

        let keep = 1.0 - self.config.velocity_decay;
        for node in &mut self.nodes {
            match node.fx {
                Some(fx) => {
                    node.position.x = fx;
                    node.velocity.x = 0.0;
                }
                None => {
                    node.velocity.x *= keep;
                    node.position.x += node.velocity.x;
                }
            }
            match node.fy {
                Some(fy) => {
                    node.position.y = fy;
                    node.velocity.y = 0.0;
                }
                None => {
                    node.velocity.y *= keep;
                    node.position.y += node.velocity.y;
                }
            }
        }

        self.reset_non_finite();
        self.ticks += 1;
        true
    }

    fn apply_charge(&mut self, alpha: f32) {
        if self.nodes.len() < 2 || self.config.charge_strength == 0.0 {
            return;
        }

        self.scratch_positions.clear();
        self.scratch_positions
            .extend(self.nodes.iter().map(|node| node.position));
        let Some(tree) = QuadNode::build(&self.scratch_positions) else {
            return;
        };

        let strength = self.config.charge_strength * alpha;
        for (index, node) in self.nodes.iter_mut().enumerate() {
            accumulate_charge_for_node(
                &tree,
                index,
                &self.scratch_positions,
                strength,
                self.config.charge_theta,
                &mut node.velocity,
            );
        }
    }

    fn apply_collisions(&mut self) {
        let count = self.nodes.len();
        if count < 2 {
            return;
        }

        self.scratch_radii.clear();
        self.scratch_radii
            .extend(self.nodes.iter().map(|node| node.radius));
        let max_radius = self.scratch_radii.iter().copied().fold(0.0_f32, f32::max);
        let params = CollisionParams {
            strength: self.config.collision_strength,
            max_distance_sq: (max_radius * 2.0) * (max_radius * 2.0),
        };

        for _ in 0..self.config.collision_iterations {
            self.scratch_positions.clear();
            self.scratch_positions.extend(
                self.nodes
                    .iter()
                    .map(|node| node.position + node.velocity),
            );
            let Some(tree) = QuadNode::build(&self.scratch_positions) else {
                return;
            };

            self.scratch_corrections.clear();
            self.scratch_corrections.resize(count, Vec2::ZERO);
            accumulate_collision_pairs(
                &tree,
                &tree,
                true,
                &self.scratch_positions,
                &self.scratch_radii,
                params,
                &mut self.scratch_corrections,
            );

            for (node, correction) in self.nodes.iter_mut().zip(&self.scratch_corrections) {
                node.velocity += *correction;
            }
        }
    }

    fn reset_non_finite(&mut self) {
        for node in &mut self.nodes {
            if node.position.is_finite() && node.velocity.is_finite() {
                continue;
            }
            let target = vec2(node.target_x, self.config.level_height(node.node.level));
            warn!(
                id = %node.node.id,
                "non-finite layout state; resetting node to its force target"
            );
            node.position = vec2(node.fx.unwrap_or(target.x), node.fy.unwrap_or(target.y));
            node.velocity = Vec2::ZERO;
        }
    }

    pub fn frame(&self) -> SimulationFrame {
        SimulationFrame {
            alpha: self.alpha,
            nodes: self
                .nodes
                .iter()
                .map(|node| FrameNode {
                    node: Arc::clone(&node.node),
                    position: node.position,
                })
                .collect(),
            links: self
                .links
                .iter()
                .zip(&self.link_kinds)
                .map(|(link, kind)| FrameLink {
                    source: link.source,
                    target: link.target,
                    kind: *kind,
                })
                .collect(),
        }
    }

    #[cfg(test)]
    pub(crate) fn corrupt_position(&mut self, id: &str) {
        if let Some(&index) = self.index_by_id.get(id) {
            self.nodes[index].position = vec2(f32::NAN, f32::INFINITY);
        }
    }
}
