//! Per-agent state and its texel encoding.
//!
//! One agent is one `Rgba32Float` texel laid out as `(x, y, vx, vy)`. Every
//! pass that writes state writes all four channels in this order.

use bytemuck::{Pod, Zeroable};
use glam::Vec2;
use rand::Rng;

use crate::grid::AgentGrid;

/// Position and velocity of one agent.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AgentState {
    /// Position in the unit square, origin bottom-left.
    pub position: Vec2,
    pub velocity: Vec2,
}

/// Raw texel as stored on the GPU.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct StateTexel(pub [f32; 4]);

impl AgentState {
    pub fn new(position: Vec2, velocity: Vec2) -> Self {
        Self { position, velocity }
    }

    pub fn to_texel(self) -> StateTexel {
        StateTexel([
            self.position.x,
            self.position.y,
            self.velocity.x,
            self.velocity.y,
        ])
    }

    pub fn from_texel(texel: StateTexel) -> Self {
        let [x, y, vx, vy] = texel.0;
        Self {
            position: Vec2::new(x, y),
            velocity: Vec2::new(vx, vy),
        }
    }
}

/// Encode a generation into a full grid of texels, zero-padding the tail.
pub fn encode_generation(grid: &AgentGrid, agents: &[AgentState]) -> Vec<StateTexel> {
    let mut texels = vec![StateTexel::default(); grid.texel_count() as usize];
    for (texel, agent) in texels.iter_mut().zip(agents) {
        *texel = agent.to_texel();
    }
    texels
}

/// Decode the live agents of a grid, dropping padding texels.
pub fn decode_generation(grid: &AgentGrid, texels: &[StateTexel]) -> Vec<AgentState> {
    texels
        .iter()
        .take(grid.agent_count() as usize)
        .map(|t| AgentState::from_texel(*t))
        .collect()
}

/// Uniformly random positions and small random velocities.
pub fn seed_random<R: Rng + ?Sized>(grid: &AgentGrid, rng: &mut R) -> Vec<AgentState> {
    (0..grid.agent_count())
        .map(|_| AgentState {
            position: Vec2::new(rng.gen_range(0.0..1.0), rng.gen_range(0.0..1.0)),
            velocity: Vec2::new(rng.gen_range(-0.05..0.05), rng.gen_range(-0.05..0.05)),
        })
        .collect()
}

/// Reset baseline: each agent sits at its own texel center with zero velocity.
pub fn baseline(grid: &AgentGrid) -> Vec<AgentState> {
    (0..grid.agent_count())
        .map(|i| AgentState::new(grid.texel_center(i), Vec2::ZERO))
        .collect()
}

/// Deterministic pseudo-random value in `[0, 1)` seeded by a texel center.
///
/// Same hash as `hash_coord` in the WGSL prelude.
pub fn hash_coord(coord: Vec2) -> f32 {
    let v = (coord.dot(Vec2::new(12.9898, 78.233))).sin() * 43758.5453;
    v - v.floor()
}

/// Unit direction used to kick a stalled agent out of rest.
pub fn stall_direction(coord: Vec2) -> Vec2 {
    let angle = hash_coord(coord) * std::f32::consts::TAU;
    Vec2::new(angle.cos(), angle.sin())
}
