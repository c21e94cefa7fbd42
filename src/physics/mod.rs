//! Force simulation over the visible subgraph.
//!
//! Repulsion runs through a Barnes–Hut quadtree, overlaps are resolved with a dual-tree
//! collision pass, and edges act as damped springs. All forces scale with `alpha`, which
//! decays toward `alpha_target`; once both are below `alpha_min` the simulation stops.

mod forces;
mod quadtree;
mod stabilizer;

use std::collections::HashMap;

use eframe::egui::Vec2;
use serde::Deserialize;
use tracing::debug;

use crate::filter::Visibility;
use crate::graph::{GraphStore, NodeId};
use crate::layout::SimulationRequest;
use crate::util::stable_pair;

use forces::{Collision, Repulsion, collisions, repulsion_on};
use quadtree::QuadNode;

pub use stabilizer::{StabilizerConfig, StabilizerReport, stabilize};

#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ForceConfig {
    pub repulsion: f32,
    pub softening: f32,
    pub link_distance: f32,
    pub link_strength: f32,
    pub link_damping: f32,
    pub collision_radius: f32,
    pub collision_strength: f32,
    pub center_pull: f32,
    pub velocity_damping: f32,
    pub max_force: f32,
    pub alpha_decay: f32,
    pub alpha_min: f32,
    pub perturb_radius: f32,
    pub perturb_alpha: f32,
}

impl Default for ForceConfig {
    fn default() -> Self {
        Self {
            repulsion: 60_000.0,
            softening: 620.0,
            link_distance: 150.0,
            link_strength: 0.016,
            link_damping: 0.22,
            collision_radius: 40.0,
            collision_strength: 0.6,
            center_pull: 0.0011,
            velocity_damping: 0.9,
            max_force: 255.0,
            alpha_decay: 0.0228,
            alpha_min: 0.001,
            perturb_radius: 20.0,
            perturb_alpha: 0.8,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StepReport {
    pub moving: bool,
    pub stabilizer: StabilizerReport,
}

#[derive(Default)]
struct Scratch {
    slots: Vec<usize>,
    local: HashMap<NodeId, usize>,
    positions: Vec<Vec2>,
    velocities: Vec<Vec2>,
    forces: Vec<Vec2>,
    edges: Vec<(usize, usize)>,
}

pub struct Simulation {
    forces: ForceConfig,
    stabilizer: StabilizerConfig,
    alpha: f32,
    alpha_target: f32,
    stabilizing: bool,
    perturb_round: u64,
    scratch: Scratch,
}

impl Simulation {
    pub fn new(forces: ForceConfig, stabilizer: StabilizerConfig) -> Self {
        Self {
            forces,
            stabilizer,
            alpha: 1.0,
            alpha_target: 0.0,
            stabilizing: true,
            perturb_round: 0,
            scratch: Scratch::default(),
        }
    }

    pub fn forces(&self) -> &ForceConfig {
        &self.forces
    }

    pub fn forces_mut(&mut self) -> &mut ForceConfig {
        &mut self.forces
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    #[cfg(test)]
    pub fn alpha_target(&self) -> f32 {
        self.alpha_target
    }

    /// Motion stabilizing only belongs to free force layouts; tier rows turn it off.
    pub fn set_stabilizing(&mut self, on: bool) {
        self.stabilizing = on;
    }

    pub fn is_active(&self) -> bool {
        self.alpha >= self.forces.alpha_min || self.alpha_target >= self.forces.alpha_min
    }

    pub fn reheat(&mut self, alpha: f32) {
        self.alpha = alpha.clamp(0.0, 1.0);
    }

    pub fn set_alpha_target(&mut self, target: f32) {
        self.alpha_target = target.clamp(0.0, 1.0);
    }

    pub fn apply(&mut self, request: SimulationRequest) {
        match request {
            SimulationRequest::Keep => {}
            SimulationRequest::Reheat(alpha) => self.reheat(alpha),
            SimulationRequest::Nudge(alpha) => self.reheat(self.alpha.max(alpha)),
            SimulationRequest::Target(target) => {
                self.set_alpha_target(target);
                if self.alpha < self.alpha_target {
                    self.alpha = self.alpha_target;
                }
            }
        }
    }

    /// Jitters every visible, unpinned node by up to `perturb_radius` on each axis.
    pub fn perturb(&mut self, store: &mut GraphStore, visibility: &Visibility) {
        self.perturb_round += 1;
        let radius = self.forces.perturb_radius;
        for node in store.nodes_mut() {
            if !visibility.shows_node(node.id) {
                continue;
            }
            let (jx, jy) = stable_pair((node.id, self.perturb_round));
            if node.body.fx.is_none() {
                node.body.pos.x += jx * radius;
            }
            if node.body.fy.is_none() {
                node.body.pos.y += jy * radius;
            }
        }
    }

    /// Halves every node's velocity.
    pub fn dampen(&mut self, store: &mut GraphStore) {
        for node in store.nodes_mut() {
            node.body.velocity *= 0.5;
        }
    }

    /// Advances one tick. Only visible nodes move; pinned axes are held at their pin.
    pub fn step(
        &mut self,
        store: &mut GraphStore,
        visibility: &Visibility,
        delta_seconds: f32,
    ) -> StepReport {
        if !self.is_active() {
            return StepReport::default();
        }
        self.alpha += (self.alpha_target - self.alpha) * self.forces.alpha_decay;
        let alpha = self.alpha;
        let config = self.forces;

        let scratch = &mut self.scratch;
        scratch.slots.clear();
        scratch.local.clear();
        scratch.positions.clear();
        scratch.velocities.clear();
        for (slot, node) in store.nodes().iter().enumerate() {
            if visibility.shows_node(node.id) {
                scratch.local.insert(node.id, scratch.slots.len());
                scratch.slots.push(slot);
                scratch.positions.push(node.body.pos);
                scratch.velocities.push(node.body.velocity);
            }
        }
        let count = scratch.slots.len();
        if count == 0 {
            return StepReport::default();
        }

        scratch.edges.clear();
        for edge in store.edges() {
            if !visibility.shows_edge(edge.id) {
                continue;
            }
            if let (Some(&from), Some(&to)) =
                (scratch.local.get(&edge.id1), scratch.local.get(&edge.id2))
                && from != to
            {
                scratch.edges.push((from, to));
            }
        }

        scratch.forces.clear();
        scratch.forces.resize(count, Vec2::ZERO);
        let positions = &scratch.positions;
        let forces = &mut scratch.forces;

        if let Some(tree) = QuadNode::build(positions) {
            let repulsion = Repulsion {
                strength: config.repulsion,
                softening: config.softening,
            };
            for (index, force) in forces.iter_mut().enumerate() {
                repulsion_on(&tree, index, positions, repulsion, force);
            }
            collisions(
                &tree,
                &tree,
                true,
                positions,
                Collision {
                    min_distance: config.collision_radius * 2.0,
                    strength: config.collision_strength,
                },
                forces,
            );
        }

        for &(from, to) in &scratch.edges {
            let delta = positions[from] - positions[to];
            let distance = delta.length();
            if distance <= 1e-4 {
                continue;
            }
            let direction = delta / distance;
            let stretch = (distance - config.link_distance) * config.link_strength;
            let closing = (scratch.velocities[from] - scratch.velocities[to]).dot(direction)
                * config.link_damping;
            let correction = direction * (stretch + closing);
            forces[from] -= correction;
            forces[to] += correction;
        }

        for (force, position) in forces.iter_mut().zip(positions) {
            *force -= *position * config.center_pull;
        }

        let time_scale = (delta_seconds * 60.0).clamp(0.25, 3.0);
        let damping = config.velocity_damping.clamp(0.0, 1.0).powf(time_scale);
        for (velocity, force) in scratch.velocities.iter_mut().zip(forces.iter()) {
            let mut force = *force;
            let magnitude = force.length();
            if magnitude > config.max_force {
                force *= config.max_force / magnitude;
            }

            *velocity = (*velocity + force * (0.055 * time_scale * alpha)) * damping;
            if velocity.length_sq() < 0.02 * 0.02 && magnitude * alpha < 0.08 {
                *velocity = Vec2::ZERO;
            }
        }

        let stabilizer = if self.stabilizing {
            stabilize(
                &mut scratch.velocities,
                &scratch.edges,
                alpha,
                &self.stabilizer,
            )
        } else {
            StabilizerReport::default()
        };
        if stabilizer != StabilizerReport::default() {
            debug!(
                capped = stabilizer.capped,
                components = stabilizer.damped_components,
                alpha,
                "stabilizer damped motion"
            );
        }

        let nodes = store.nodes_mut();
        let mut moving = false;
        for (&slot, &velocity) in scratch.slots.iter().zip(&scratch.velocities) {
            let body = &mut nodes[slot].body;
            let mut next = body.pos + velocity * time_scale;
            let mut velocity = velocity;
            if let Some(fx) = body.fx {
                next.x = fx;
                velocity.x = 0.0;
            }
            if let Some(fy) = body.fy {
                next.y = fy;
                velocity.y = 0.0;
            }
            moving |= velocity.length_sq() > 1e-6;
            body.pos = next;
            body.velocity = velocity;
        }

        StepReport { moving, stabilizer }
    }
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new(ForceConfig::default(), StabilizerConfig::default())
    }
}
