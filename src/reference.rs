//! CPU mirror of the update pass.
//!
//! [`update_agent`] computes exactly what `update.wgsl` writes for one texel,
//! in the same order and with the same constants. Tests and benchmarks use it
//! to check flock behavior on machines without a GPU adapter.

use glam::Vec2;

use crate::grid::AgentGrid;
use crate::pingpong::PingPong;
use crate::settings::{
    Settings, MAX_COMPONENT, MAX_SPEED, PREDATOR_FORCE, PREDATOR_IMPULSE, STALL_KICK, STALL_SPEED,
};
use crate::state::{baseline, stall_direction, AgentState};

/// Fluid velocity lookup at a position in the unit square.
pub type FluidSample<'a> = &'a dyn Fn(Vec2) -> Vec2;

/// Compute the next state of agent `index` from the read generation `agents`.
pub fn update_agent(
    settings: &Settings,
    grid: &AgentGrid,
    agents: &[AgentState],
    index: usize,
    dt: f32,
    fluid: Option<FluidSample<'_>>,
) -> AgentState {
    let me = agents[index];
    let position = me.position;
    let mut velocity = me.velocity;

    if velocity.length() < STALL_SPEED {
        velocity += stall_direction(grid.texel_center(index as u32)) * STALL_KICK;
    }

    let mut acceleration = Vec2::ZERO;

    let to_predator = position - settings.predator_position;
    let predator_dist = to_predator.length();
    if predator_dist < settings.predator_radius {
        // Directly under the predator there is no away, so borrow the stall hash.
        let away = if predator_dist > 0.0 {
            to_predator / predator_dist
        } else {
            stall_direction(grid.texel_center(index as u32))
        };
        let ramp = 1.0 - predator_dist / settings.predator_radius;
        let repulsion = away * ramp * ramp * PREDATOR_FORCE;
        velocity += repulsion * PREDATOR_IMPULSE;
        acceleration += repulsion * settings.predator_weight;
    }

    let mut separation = Vec2::ZERO;
    let mut alignment = Vec2::ZERO;
    let mut cohesion = Vec2::ZERO;
    let mut neighbors = 0u32;
    for (other_index, other) in agents.iter().enumerate() {
        if other_index == index {
            continue;
        }
        let diff = position - other.position;
        let dist = diff.length();
        if dist > 0.0 && dist < settings.sight_radius {
            separation += diff / dist / dist;
            alignment += other.velocity;
            cohesion += other.position;
            neighbors += 1;
        }
    }

    if neighbors > 0 {
        let n = neighbors as f32;
        acceleration += separation.normalize_or_zero() * settings.separation_weight;
        acceleration += (alignment / n).normalize_or_zero() * settings.alignment_weight;
        acceleration += (cohesion / n - position).normalize_or_zero() * settings.cohesion_weight;
    }

    if !settings.boundary.is_wrap() {
        acceleration += wall_push(position, settings.wall_avoidance_threshold)
            * settings.wall_avoidance_weight;
    }

    if settings.fluid_enabled {
        if let Some(sample) = fluid {
            velocity += sample(position) * settings.fluid_weight;
        }
    }

    velocity += acceleration * dt;
    let speed = velocity.length();
    if speed > MAX_SPEED {
        velocity = velocity / speed * MAX_SPEED;
    }
    velocity = velocity.clamp(Vec2::splat(-MAX_COMPONENT), Vec2::splat(MAX_COMPONENT));

    let mut position = position + velocity * dt;
    if settings.boundary.is_wrap() {
        position = Vec2::new(wrap_unit(position.x), wrap_unit(position.y));
    } else {
        position = position.clamp(Vec2::ZERO, Vec2::ONE);
        if position.x == 0.0 || position.x == 1.0 {
            velocity.x = 0.0;
        }
        if position.y == 0.0 || position.y == 1.0 {
            velocity.y = 0.0;
        }
    }

    AgentState { position, velocity }
}

/// Compute a whole write generation from a read generation.
pub fn update_generation(
    settings: &Settings,
    grid: &AgentGrid,
    agents: &[AgentState],
    dt: f32,
    fluid: Option<FluidSample<'_>>,
) -> Vec<AgentState> {
    (0..agents.len())
        .map(|i| update_agent(settings, grid, agents, i, dt, fluid))
        .collect()
}

/// Unit steering away from the nearer wall, per axis, once it is closer than `threshold`.
fn wall_push(position: Vec2, threshold: f32) -> Vec2 {
    let axis = |p: f32| {
        if p.min(1.0 - p) >= threshold || p == 0.5 {
            0.0
        } else {
            (0.5 - p).signum()
        }
    };
    Vec2::new(axis(position.x), axis(position.y))
}

/// `p mod 1` in `[0, 1)`. Tiny negative inputs round to exactly 1.0 in f32, so fold that back.
fn wrap_unit(p: f32) -> f32 {
    let w = p - p.floor();
    if w >= 1.0 {
        0.0
    } else {
        w
    }
}

/// A CPU flock stepped generation by generation through a ping-pong pair.
#[derive(Debug)]
pub struct ReferenceFlock {
    settings: Settings,
    grid: AgentGrid,
    generations: PingPong<Vec<AgentState>>,
}

impl ReferenceFlock {
    /// Start from the reset baseline.
    pub fn new(settings: Settings) -> Self {
        let grid = settings.grid();
        let agents = baseline(&grid);
        Self::with_agents(settings, agents)
    }

    /// Start from explicit agents. The agent count is taken from `agents`.
    pub fn with_agents(settings: Settings, agents: Vec<AgentState>) -> Self {
        let settings = Settings {
            agent_count: agents.len().max(1) as u32,
            ..settings
        };
        let grid = settings.grid();
        let scratch = agents.clone();
        Self {
            settings,
            grid,
            generations: PingPong::new(agents, scratch),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Replace per-frame parameters. The agent count is kept.
    pub fn set_settings(&mut self, settings: Settings) {
        self.settings = Settings {
            agent_count: self.settings.agent_count,
            ..settings
        };
    }

    pub fn grid(&self) -> AgentGrid {
        self.grid
    }

    /// Current generation.
    pub fn agents(&self) -> &[AgentState] {
        self.generations.read()
    }

    /// Number of update passes run so far.
    pub fn generation(&self) -> u64 {
        self.generations.swaps()
    }

    pub fn step(&mut self, dt: f32, fluid: Option<FluidSample<'_>>) {
        let next = update_generation(&self.settings, &self.grid, self.agents(), dt, fluid);
        *self.generations.write_mut() = next;
        self.generations.swap();
    }

    /// Put every agent back at its texel center with zero velocity.
    pub fn reset(&mut self) {
        *self.generations.read_mut() = baseline(&self.grid);
    }
}
