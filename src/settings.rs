//! Flock parameters.
//!
//! A [`Settings`] value is an immutable snapshot read once at the start of
//! each update pass. Changes go through a [`SettingsPatch`], which overrides
//! only the fields it names and produces the next snapshot:
//!
//! ```ignore
//! let next = settings.apply(
//!     &SettingsPatch::new()
//!         .separation_weight(0.4)
//!         .boundary(BoundaryMode::Wrap),
//! );
//! ```
//!
//! Weights and radii are tuning parameters and are accepted as given, even
//! when negative. Only the agent count is sanitized (raised to at least one),
//! because the texture grid is derived from it.

use std::path::Path;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::error::SettingsError;
use crate::grid::AgentGrid;

/// Speed limit applied after the velocity update.
pub const MAX_SPEED: f32 = 0.1;
/// Absolute per-component velocity clamp applied after the speed limit.
pub const MAX_COMPONENT: f32 = MAX_SPEED * 3.0;
/// Below this speed an agent counts as stalled and gets a kick.
pub const STALL_SPEED: f32 = 1e-4;
/// Magnitude of the kick given to a stalled agent.
pub const STALL_KICK: f32 = 5e-4;
/// Scale of the predator repulsion vector before weighting.
pub const PREDATOR_FORCE: f32 = 0.005;
/// Multiplier for the part of the predator repulsion applied straight to velocity.
pub const PREDATOR_IMPULSE: f32 = 5.0;
/// Predator position meaning "no pointer over the canvas".
pub const PREDATOR_ABSENT: Vec2 = Vec2::new(-1.0, -1.0);

/// What happens when an agent reaches the edge of the unit square.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryMode {
    /// Toroidal: leaving one edge re-enters from the opposite one.
    Wrap,
    /// Positions are clamped to the square and wall avoidance steers agents inward.
    #[default]
    Clamp,
}

impl BoundaryMode {
    pub fn is_wrap(self) -> bool {
        matches!(self, BoundaryMode::Wrap)
    }

    pub fn toggled(self) -> Self {
        match self {
            BoundaryMode::Wrap => BoundaryMode::Clamp,
            BoundaryMode::Clamp => BoundaryMode::Wrap,
        }
    }
}

/// How the render pass colors each agent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorMode {
    /// Constant white.
    #[default]
    Solid,
    /// Hue from heading, brightness from speed.
    Velocity,
    /// Velocity change between the previous and current generation.
    Acceleration,
}

impl ColorMode {
    pub(crate) fn to_gpu(self) -> u32 {
        match self {
            ColorMode::Solid => 0,
            ColorMode::Velocity => 1,
            ColorMode::Acceleration => 2,
        }
    }

    /// Next mode in display order, wrapping around.
    pub fn next(self) -> Self {
        match self {
            ColorMode::Solid => ColorMode::Velocity,
            ColorMode::Velocity => ColorMode::Acceleration,
            ColorMode::Acceleration => ColorMode::Solid,
        }
    }
}

/// Snapshot of every tunable flock parameter.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Number of agents. Changing it reallocates the state textures.
    pub agent_count: u32,
    pub separation_weight: f32,
    pub alignment_weight: f32,
    pub cohesion_weight: f32,
    /// Neighbors closer than this (in unit-square distance) influence an agent.
    pub sight_radius: f32,
    /// Pointer position in `[0,1]²`; [`PREDATOR_ABSENT`] when off-canvas.
    pub predator_position: Vec2,
    pub predator_radius: f32,
    pub predator_weight: f32,
    /// Distance from a wall at which wall avoidance starts (clamp mode only).
    pub wall_avoidance_threshold: f32,
    pub wall_avoidance_weight: f32,
    /// Rendered point diameter in pixels.
    pub point_size: f32,
    pub boundary: BoundaryMode,
    pub fluid_enabled: bool,
    /// How strongly the fluid velocity field is blended into agent velocity.
    pub fluid_weight: f32,
    /// How strongly agent velocities are splatted into the fluid forcing texture.
    pub boid_weight: f32,
    pub color_mode: ColorMode,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            agent_count: 64,
            separation_weight: 0.15,
            alignment_weight: 0.1,
            cohesion_weight: 0.15,
            sight_radius: 0.05,
            predator_position: PREDATOR_ABSENT,
            predator_radius: 0.2,
            predator_weight: 0.1,
            wall_avoidance_threshold: 0.12,
            wall_avoidance_weight: 0.15,
            point_size: 4.0,
            boundary: BoundaryMode::Clamp,
            fluid_enabled: false,
            fluid_weight: 0.5,
            boid_weight: 1.0,
            color_mode: ColorMode::Solid,
        }
    }
}

impl Settings {
    /// Produce the next snapshot by overriding the fields named in `patch`.
    pub fn apply(&self, patch: &SettingsPatch) -> Settings {
        let mut next = *self;
        if let Some(count) = patch.agent_count {
            if count == 0 {
                log::warn!("agent count 0 requested, using 1");
            }
            next.agent_count = count.max(1);
        }
        override_field(&mut next.separation_weight, patch.separation_weight);
        override_field(&mut next.alignment_weight, patch.alignment_weight);
        override_field(&mut next.cohesion_weight, patch.cohesion_weight);
        override_field(&mut next.sight_radius, patch.sight_radius);
        override_field(&mut next.predator_position, patch.predator_position);
        override_field(&mut next.predator_radius, patch.predator_radius);
        override_field(&mut next.predator_weight, patch.predator_weight);
        override_field(
            &mut next.wall_avoidance_threshold,
            patch.wall_avoidance_threshold,
        );
        override_field(&mut next.wall_avoidance_weight, patch.wall_avoidance_weight);
        override_field(&mut next.point_size, patch.point_size);
        override_field(&mut next.boundary, patch.boundary);
        override_field(&mut next.fluid_enabled, patch.fluid_enabled);
        override_field(&mut next.fluid_weight, patch.fluid_weight);
        override_field(&mut next.boid_weight, patch.boid_weight);
        override_field(&mut next.color_mode, patch.color_mode);
        next
    }

    /// Grid layout derived from the agent count.
    pub fn grid(&self) -> AgentGrid {
        AgentGrid::for_count(self.agent_count)
    }

    /// Whether moving from `self` to `next` requires reallocating the state textures.
    pub fn needs_regrid(&self, next: &Settings) -> bool {
        self.grid() != next.grid()
    }

    /// Classify the transition from `self` to `next`.
    pub fn change_to(&self, next: &Settings) -> SettingsChange {
        if self.needs_regrid(next) {
            SettingsChange::Regrid
        } else if self != next {
            SettingsChange::Parameters
        } else {
            SettingsChange::Unchanged
        }
    }

    /// Load a settings file. Missing fields keep their defaults.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Settings, SettingsError> {
        let data = std::fs::read_to_string(path)?;
        let patch = SettingsPatch::from_json_str(&data)?;
        Ok(Settings::default().apply(&patch))
    }
}

/// What a settings update did to the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SettingsChange {
    Unchanged,
    /// Only per-frame parameters changed; agent state is untouched.
    Parameters,
    /// Agent count changed; state textures were reallocated and re-seeded.
    Regrid,
}

fn override_field<T: Copy>(field: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *field = value;
    }
}

/// A partial settings update. Unset fields keep their previous value.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsPatch {
    pub agent_count: Option<u32>,
    pub separation_weight: Option<f32>,
    pub alignment_weight: Option<f32>,
    pub cohesion_weight: Option<f32>,
    pub sight_radius: Option<f32>,
    pub predator_position: Option<Vec2>,
    pub predator_radius: Option<f32>,
    pub predator_weight: Option<f32>,
    pub wall_avoidance_threshold: Option<f32>,
    pub wall_avoidance_weight: Option<f32>,
    pub point_size: Option<f32>,
    pub boundary: Option<BoundaryMode>,
    pub fluid_enabled: Option<bool>,
    pub fluid_weight: Option<f32>,
    pub boid_weight: Option<f32>,
    pub color_mode: Option<ColorMode>,
}

macro_rules! patch_setters {
    ($($name:ident: $ty:ty),* $(,)?) => {
        $(
            pub fn $name(mut self, value: $ty) -> Self {
                self.$name = Some(value);
                self
            }
        )*
    };
}

impl SettingsPatch {
    pub fn new() -> Self {
        Self::default()
    }

    patch_setters! {
        agent_count: u32,
        separation_weight: f32,
        alignment_weight: f32,
        cohesion_weight: f32,
        sight_radius: f32,
        predator_position: Vec2,
        predator_radius: f32,
        predator_weight: f32,
        wall_avoidance_threshold: f32,
        wall_avoidance_weight: f32,
        point_size: f32,
        boundary: BoundaryMode,
        fluid_enabled: bool,
        fluid_weight: f32,
        boid_weight: f32,
        color_mode: ColorMode,
    }

    /// Whether the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        *self == SettingsPatch::default()
    }

    /// Parse a patch from JSON, e.g. `{"agent_count": 256, "boundary": "wrap"}`.
    pub fn from_json_str(json: &str) -> Result<SettingsPatch, SettingsError> {
        Ok(serde_json::from_str(json)?)
    }
}
