use eframe::egui::{Vec2, vec2};

use super::quadtree::QuadNode;
use super::{SimLink, SimNode};

const MIN_DISTANCE: f32 = 1e-4;

fn fallback_direction(a: usize, b: usize) -> Vec2 {
    let angle = ((a as f32) * 0.618_034 + (b as f32) * 0.414_214) * std::f32::consts::TAU;
    vec2(angle.cos(), angle.sin())
}

/// Springs between linked nodes, evaluated on predicted positions.
pub(super) fn apply_links(nodes: &mut [SimNode], links: &[SimLink], alpha: f32) {
    for (link_index, link) in links.iter().enumerate() {
        let source = &nodes[link.source];
        let target = &nodes[link.target];
        let mut delta = (target.position + target.velocity) - (source.position + source.velocity);
        if delta.length_sq() < MIN_DISTANCE * MIN_DISTANCE {
            delta = fallback_direction(link_index, link.target) * 1e-3;
        }

        let distance = delta.length();
        let scale = (distance - link.distance) / distance * alpha * link.strength;
        let correction = delta * scale;

        nodes[link.target].velocity -= correction * link.bias;
        nodes[link.source].velocity += correction * (1.0 - link.bias);
    }
}

/// Pull toward the node's level height. Not scaled by alpha, so levels hold
/// at the warm floor.
pub(super) fn apply_vertical(nodes: &mut [SimNode], vertical_spacing: f32, strength: f32) {
    for node in nodes {
        let target = node.node.level * vertical_spacing;
        node.velocity.y += (target - node.position.y) * strength;
    }
}

/// Pull toward the department column; unscaled like [`apply_vertical`].
pub(super) fn apply_horizontal(nodes: &mut [SimNode], strength: f32) {
    for node in nodes {
        node.velocity.x += (node.target_x - node.position.x) * strength;
    }
}

/// Shifts every node so the centroid moves toward `center`.
pub(super) fn apply_center(nodes: &mut [SimNode], center: Vec2, strength: f32) {
    if nodes.is_empty() {
        return;
    }

    let mut centroid = Vec2::ZERO;
    for node in nodes.iter() {
        centroid += node.position;
    }
    centroid /= nodes.len() as f32;

    let shift = (centroid - center) * strength;
    if shift.length_sq() <= f32::EPSILON {
        return;
    }
    for node in nodes {
        node.position -= shift;
    }
}

pub(super) fn accumulate_charge_for_node(
    quad: &QuadNode,
    index: usize,
    positions: &[Vec2],
    strength: f32,
    theta: f32,
    velocity: &mut Vec2,
) {
    if quad.mass <= 0.0 {
        return;
    }

    let point = positions[index];

    if quad.is_leaf() {
        for &other_index in &quad.indices {
            if other_index == index {
                continue;
            }
            let mut delta = positions[other_index] - point;
            if delta.length_sq() < MIN_DISTANCE * MIN_DISTANCE {
                delta = fallback_direction(index, other_index);
            }
            let distance_sq = delta.length_sq().max(1.0);
            *velocity += delta * (strength / distance_sq);
        }
        return;
    }

    let delta = quad.center_of_mass - point;
    let distance_sq = delta.length_sq().max(1.0);
    let distance = distance_sq.sqrt();
    let can_approximate = !quad.bounds.contains(point)
        && (quad.bounds.side_length() / distance) < theta
        && quad.mass > 1.0;

    if can_approximate {
        *velocity += delta * (strength * quad.mass / distance_sq);
        return;
    }

    for child in quad.children.iter().flatten() {
        accumulate_charge_for_node(child, index, positions, strength, theta, velocity);
    }
}

#[derive(Clone, Copy)]
pub(super) struct CollisionParams {
    pub(super) strength: f32,
    pub(super) max_distance_sq: f32,
}

fn collide_pair(
    from: usize,
    to: usize,
    positions: &[Vec2],
    radii: &[f32],
    strength: f32,
    corrections: &mut [Vec2],
) {
    let min_distance = radii[from] + radii[to];
    let mut delta = positions[from] - positions[to];
    let mut distance_sq = delta.length_sq();
    if distance_sq >= min_distance * min_distance {
        return;
    }
    if distance_sq < MIN_DISTANCE * MIN_DISTANCE {
        delta = fallback_direction(from, to) * 1e-3;
        distance_sq = delta.length_sq();
    }

    let distance = distance_sq.sqrt();
    let push = delta * ((min_distance - distance) / distance * strength);
    let from_sq = radii[from] * radii[from];
    let to_sq = radii[to] * radii[to];
    let share = to_sq / (from_sq + to_sq);

    corrections[from] += push * share;
    corrections[to] -= push * (1.0 - share);
}

/// Walks pairs of quadtree cells that are close enough to overlap.
pub(super) fn accumulate_collision_pairs(
    node_a: &QuadNode,
    node_b: &QuadNode,
    same_node: bool,
    positions: &[Vec2],
    radii: &[f32],
    params: CollisionParams,
    corrections: &mut [Vec2],
) {
    if node_a.bounds.distance_sq_to(node_b.bounds) > params.max_distance_sq {
        return;
    }

    if node_a.is_leaf() && node_b.is_leaf() {
        if same_node {
            for i in 0..node_a.indices.len() {
                for j in (i + 1)..node_a.indices.len() {
                    collide_pair(
                        node_a.indices[i],
                        node_a.indices[j],
                        positions,
                        radii,
                        params.strength,
                        corrections,
                    );
                }
            }
        } else {
            for &from in &node_a.indices {
                for &to in &node_b.indices {
                    collide_pair(from, to, positions, radii, params.strength, corrections);
                }
            }
        }
        return;
    }

    if same_node {
        for first in 0..4 {
            let Some(child_a) = node_a.children[first].as_ref() else {
                continue;
            };

            accumulate_collision_pairs(child_a, child_a, true, positions, radii, params, corrections);

            for second in (first + 1)..4 {
                let Some(child_b) = node_a.children[second].as_ref() else {
                    continue;
                };
                accumulate_collision_pairs(
                    child_a,
                    child_b,
                    false,
                    positions,
                    radii,
                    params,
                    corrections,
                );
            }
        }
        return;
    }

    let split_a = if node_a.is_leaf() {
        false
    } else if node_b.is_leaf() {
        true
    } else {
        node_a.bounds.half_extent >= node_b.bounds.half_extent
    };

    if split_a {
        for child in node_a.children.iter().flatten() {
            accumulate_collision_pairs(child, node_b, false, positions, radii, params, corrections);
        }
    } else {
        for child in node_b.children.iter().flatten() {
            accumulate_collision_pairs(node_a, child, false, positions, radii, params, corrections);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlapping_pair_is_pushed_apart_weighted_by_radius() {
        let positions = [vec2(0.0, 0.0), vec2(10.0, 0.0)];
        let radii = [20.0, 10.0];
        let mut corrections = [Vec2::ZERO; 2];
        collide_pair(0, 1, &positions, &radii, 1.0, &mut corrections);

        assert!(corrections[0].x < 0.0);
        assert!(corrections[1].x > 0.0);
        // The larger node moves less.
        assert!(corrections[0].x.abs() < corrections[1].x.abs());
        let total = corrections[1].x - corrections[0].x;
        assert!((total - 20.0).abs() < 1e-3);
    }

    #[test]
    fn separated_pair_is_left_alone() {
        let positions = [vec2(0.0, 0.0), vec2(100.0, 0.0)];
        let mut corrections = [Vec2::ZERO; 2];
        collide_pair(0, 1, &positions, &[20.0, 20.0], 1.0, &mut corrections);
        assert_eq!(corrections, [Vec2::ZERO; 2]);
    }

    #[test]
    fn coincident_nodes_still_separate() {
        let positions = [vec2(5.0, 5.0), vec2(5.0, 5.0)];
        let mut corrections = [Vec2::ZERO; 2];
        collide_pair(0, 1, &positions, &[10.0, 10.0], 1.0, &mut corrections);
        assert!(corrections[0].length() > 0.0);
        assert!(corrections[0].is_finite() && corrections[1].is_finite());
    }

    #[test]
    fn negative_charge_repels() {
        let positions = vec![vec2(0.0, 0.0), vec2(30.0, 0.0)];
        let tree = QuadNode::build(&positions).unwrap();
        let mut velocity = Vec2::ZERO;
        accumulate_charge_for_node(&tree, 0, &positions, -100.0, 0.9, &mut velocity);
        assert!(velocity.x < 0.0);
    }
}
