use eframe::egui::{Vec2, vec2};

use super::quadtree::QuadNode;

/// Barnes–Hut opening angle.
const THETA: f32 = 0.72;

#[derive(Clone, Copy, Debug)]
pub(super) struct Repulsion {
    pub(super) strength: f32,
    pub(super) softening: f32,
}

impl Repulsion {
    fn between(self, point: Vec2, source: Vec2, mass: f32) -> Vec2 {
        let delta = point - source;
        let distance_sq = delta.length_sq();
        let direction = if distance_sq > 1e-8 {
            delta / distance_sq.sqrt()
        } else {
            vec2(1.0, 0.0)
        };
        direction * (self.strength * mass / (distance_sq + self.softening))
    }
}

/// Adds the repulsion every other point exerts on `index`, approximating far cells by their
/// center of mass.
pub(super) fn repulsion_on(
    tree: &QuadNode,
    index: usize,
    positions: &[Vec2],
    repulsion: Repulsion,
    force: &mut Vec2,
) {
    if tree.mass <= 0.0 {
        return;
    }
    let point = positions[index];

    if tree.is_leaf() {
        *force += tree
            .points
            .iter()
            .filter(|&&other| other != index)
            .fold(Vec2::ZERO, |sum, &other| {
                sum + repulsion.between(point, positions[other], 1.0)
            });
        return;
    }

    let distance = (point - tree.center_of_mass).length().max(0.01);
    if tree.mass > 1.0 && !tree.cell.contains(point) && tree.cell.side() / distance < THETA {
        *force += repulsion.between(point, tree.center_of_mass, tree.mass);
        return;
    }

    for child in &tree.children {
        repulsion_on(child, index, positions, repulsion, force);
    }
}

#[derive(Clone, Copy, Debug)]
pub(super) struct Collision {
    /// Minimum center distance between two nodes.
    pub(super) min_distance: f32,
    pub(super) strength: f32,
}

impl Collision {
    fn push_apart(self, from: usize, to: usize, positions: &[Vec2], forces: &mut [Vec2]) {
        let delta = positions[from] - positions[to];
        let distance = delta.length();
        if distance >= self.min_distance {
            return;
        }

        let direction = if distance > 1e-4 {
            delta / distance
        } else {
            // Coincident points: pick a deterministic direction per pair.
            let angle = (from as f32 * 0.618_034 + to as f32 * 0.414_214) * std::f32::consts::TAU;
            vec2(angle.cos(), angle.sin())
        };
        let push = direction * (self.min_distance - distance) * self.strength;
        forces[from] += push;
        forces[to] -= push;
    }
}

/// Resolves overlapping pairs with a dual-tree walk, skipping cell pairs that are farther
/// apart than the collision distance.
pub(super) fn collisions(
    a: &QuadNode,
    b: &QuadNode,
    same: bool,
    positions: &[Vec2],
    collision: Collision,
    forces: &mut [Vec2],
) {
    if a.cell.gap_sq(b.cell) > collision.min_distance * collision.min_distance {
        return;
    }

    match (a.is_leaf(), b.is_leaf()) {
        (true, true) if same => {
            for (offset, &from) in a.points.iter().enumerate() {
                for &to in &a.points[offset + 1..] {
                    collision.push_apart(from, to, positions, forces);
                }
            }
        }
        (true, true) => {
            for &from in &a.points {
                for &to in &b.points {
                    collision.push_apart(from, to, positions, forces);
                }
            }
        }
        _ if same => {
            for (offset, first) in a.children.iter().enumerate() {
                collisions(first, first, true, positions, collision, forces);
                for second in &a.children[offset + 1..] {
                    collisions(first, second, false, positions, collision, forces);
                }
            }
        }
        (false, true) => {
            for child in &a.children {
                collisions(child, b, false, positions, collision, forces);
            }
        }
        (true, false) => {
            for child in &b.children {
                collisions(a, child, false, positions, collision, forces);
            }
        }
        (false, false) if a.cell.half >= b.cell.half => {
            for child in &a.children {
                collisions(child, b, false, positions, collision, forces);
            }
        }
        (false, false) => {
            for child in &b.children {
                collisions(a, child, false, positions, collision, forces);
            }
        }
    }
}
