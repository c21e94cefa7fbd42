use std::collections::VecDeque;

use eframe::egui::Vec2;
use serde::Deserialize;
use tracing::trace;

#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct StabilizerConfig {
    /// Below this energy the stabilizer leaves velocities alone.
    pub energy_threshold: f32,
    pub speed_ceiling: f32,
    /// Factor applied to a node above the ceiling.
    pub cap_factor: f32,
    pub drift_speed: f32,
    /// Mean cosine similarity above which a component counts as moving as a block.
    pub alignment_threshold: f32,
    /// Components larger than this share of all nodes are left alone.
    pub max_component_share: f32,
    pub small_component_size: usize,
    pub small_component_damping: f32,
    pub component_damping: f32,
}

impl Default for StabilizerConfig {
    fn default() -> Self {
        Self {
            energy_threshold: 0.01,
            speed_ceiling: 12.0,
            cap_factor: 0.3,
            drift_speed: 0.5,
            alignment_threshold: 0.85,
            max_component_share: 0.5,
            small_component_size: 3,
            small_component_damping: 0.5,
            component_damping: 0.8,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StabilizerReport {
    pub capped: usize,
    pub damped_components: usize,
}

/// Connected components over local indices `0..count`, each in discovery order.
pub fn connected_components(count: usize, edges: &[(usize, usize)]) -> Vec<Vec<usize>> {
    let mut adjacency = vec![Vec::new(); count];
    for &(a, b) in edges {
        if a < count && b < count && a != b {
            adjacency[a].push(b);
            adjacency[b].push(a);
        }
    }

    let mut seen = vec![false; count];
    let mut components = Vec::new();
    for start in 0..count {
        if seen[start] {
            continue;
        }
        seen[start] = true;

        let mut component = vec![start];
        let mut queue = VecDeque::from([start]);
        while let Some(current) = queue.pop_front() {
            for &next in &adjacency[current] {
                if !seen[next] {
                    seen[next] = true;
                    component.push(next);
                    queue.push_back(next);
                }
            }
        }
        components.push(component);
    }

    components
}

/// Damps runaway nodes and clusters that glide as a block.
///
/// `velocities` and `edges` cover the simulated (visible) nodes only. Does nothing while
/// `energy` is below the configured threshold.
pub fn stabilize(
    velocities: &mut [Vec2],
    edges: &[(usize, usize)],
    energy: f32,
    config: &StabilizerConfig,
) -> StabilizerReport {
    let mut report = StabilizerReport::default();
    if energy < config.energy_threshold || velocities.is_empty() {
        return report;
    }

    for velocity in velocities.iter_mut() {
        if velocity.length() > config.speed_ceiling {
            *velocity *= config.cap_factor;
            report.capped += 1;
        }
    }

    let total = velocities.len();
    let largest = total as f32 * config.max_component_share;
    for component in connected_components(total, edges) {
        // Lone nodes are covered by the speed cap.
        if component.len() < 2 || component.len() as f32 > largest {
            continue;
        }

        let mean = component
            .iter()
            .fold(Vec2::ZERO, |sum, &index| sum + velocities[index])
            / component.len() as f32;
        let mean_speed = mean.length();
        if mean_speed <= config.drift_speed {
            continue;
        }

        let direction = mean / mean_speed;
        let alignment = component
            .iter()
            .map(|&index| {
                let speed = velocities[index].length();
                if speed > 0.0 {
                    velocities[index].dot(direction) / speed
                } else {
                    0.0
                }
            })
            .sum::<f32>()
            / component.len() as f32;
        if alignment <= config.alignment_threshold {
            continue;
        }

        let factor = if component.len() <= config.small_component_size {
            config.small_component_damping
        } else {
            config.component_damping
        };
        for &index in &component {
            velocities[index] *= factor;
        }
        report.damped_components += 1;
        trace!(
            size = component.len(),
            alignment, mean_speed, "damped drifting component"
        );
    }

    report
}
