//! # texflock
//!
//! A flocking simulation whose agent state lives in GPU textures.
//!
//! Every agent owns one texel of a square `Rgba32Float` texture: `rg` holds
//! its position in the unit square, `ba` its velocity. Two such textures are
//! ping-ponged. Each frame a fullscreen fragment pass reads the current
//! generation, applies the boids rules (separation, alignment, cohesion),
//! predator avoidance, wall avoidance and optional fluid advection, and writes
//! the next generation. A second pass draws one quad per agent.
//!
//! ## Quick Start
//!
//! ```ignore
//! use texflock::prelude::*;
//!
//! fn main() -> Result<(), SimulationError> {
//!     Simulation::new()
//!         .with_patch(&SettingsPatch::new().agent_count(1024))
//!         .with_fluid(true)
//!         .run()
//! }
//! ```
//!
//! ## Headless use
//!
//! [`FlockEngine`] does not need a window. Build a [`GpuContext`] with
//! [`GpuContext::headless_blocking`], render into any texture of the format
//! you passed at construction, and read the state back with
//! [`FlockEngine::read_state`].
//!
//! ## CPU reference
//!
//! [`reference::ReferenceFlock`] runs the same update rule on the CPU. It is
//! used to pin down the behavior the shaders implement and for benchmarks.
//!
//! ## Controls (windowed runner)
//!
//! See [`input`] for the full table: pointer is the predator, left drag
//! pushes the fluid, Space pauses, R resets, W/F/C toggle wrap, fluid and
//! color mode, ↑/↓ change the agent count.

mod engine;
mod error;
pub mod fluid;
pub mod gpu;
pub mod grid;
pub mod input;
pub mod pass;
pub mod pingpong;
pub mod reference;
pub mod settings;
pub mod shaders;
mod simulation;
pub mod state;
pub mod time;
pub mod uniforms;

pub use engine::{FlockEngine, CLEAR_COLOR};
pub use error::{GpuError, SettingsError, SimulationError};
pub use fluid::{FluidCoupling, FluidField, Impulse, NoFluid};
pub use glam::Vec2;
pub use gpu::{DampedFluid, GpuContext};
pub use grid::{nearest_square, AgentGrid};
pub use settings::{BoundaryMode, ColorMode, Settings, SettingsChange, SettingsPatch};
pub use simulation::Simulation;
pub use state::AgentState;
pub use time::FrameClock;

/// Convenient re-exports for common usage.
///
/// ```ignore
/// use texflock::prelude::*;
/// ```
pub mod prelude {
    pub use crate::engine::FlockEngine;
    pub use crate::error::{GpuError, SettingsError, SimulationError};
    pub use crate::fluid::{FluidCoupling, FluidField, Impulse, NoFluid};
    pub use crate::gpu::{DampedFluid, GpuContext};
    pub use crate::input::{Control, Controls};
    pub use crate::settings::{BoundaryMode, ColorMode, Settings, SettingsPatch};
    pub use crate::simulation::Simulation;
    pub use crate::state::AgentState;
    pub use crate::time::FrameClock;
    pub use glam::Vec2;
}
