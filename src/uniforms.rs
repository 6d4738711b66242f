//! Uniform blocks uploaded once per pass.
//!
//! Each struct matches a WGSL struct in [`crate::shaders`] field for field.
//! Sizes are pinned at compile time; offsets are checked in tests against
//! the layout naga computes for the WGSL side.

use bytemuck::{Pod, Zeroable};
use glam::Vec2;

use crate::fluid::Impulse;
use crate::settings::{Settings, MAX_SPEED};

/// Parameters for the reset and update passes (`FlockUniforms` in WGSL).
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct UpdateUniforms {
    pub predator_position: [f32; 2],
    pub grid_size: u32,
    pub agent_count: u32,
    pub delta_time: f32,
    pub separation_weight: f32,
    pub alignment_weight: f32,
    pub cohesion_weight: f32,
    pub sight_radius: f32,
    pub predator_radius: f32,
    pub predator_weight: f32,
    pub wall_threshold: f32,
    pub wall_weight: f32,
    pub fluid_weight: f32,
    pub wrap: u32,
    pub fluid_enabled: u32,
    pub max_speed: f32,
    pub _pad: [f32; 3],
}

const _: [(); 80] = [(); std::mem::size_of::<UpdateUniforms>()];

impl UpdateUniforms {
    pub fn new(settings: &Settings, delta_time: f32) -> Self {
        let grid = settings.grid();
        Self {
            predator_position: settings.predator_position.to_array(),
            grid_size: grid.side(),
            agent_count: grid.agent_count(),
            delta_time,
            separation_weight: settings.separation_weight,
            alignment_weight: settings.alignment_weight,
            cohesion_weight: settings.cohesion_weight,
            sight_radius: settings.sight_radius,
            predator_radius: settings.predator_radius,
            predator_weight: settings.predator_weight,
            wall_threshold: settings.wall_avoidance_threshold,
            wall_weight: settings.wall_avoidance_weight,
            fluid_weight: settings.fluid_weight,
            wrap: settings.boundary.is_wrap() as u32,
            fluid_enabled: settings.fluid_enabled as u32,
            max_speed: MAX_SPEED,
            _pad: [0.0; 3],
        }
    }
}

/// Parameters for drawing agents.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct RenderUniforms {
    /// Target size in pixels.
    pub viewport: [f32; 2],
    pub grid_size: u32,
    pub agent_count: u32,
    pub point_size: f32,
    pub color_mode: u32,
    pub max_speed: f32,
    pub _pad: f32,
}

const _: [(); 32] = [(); std::mem::size_of::<RenderUniforms>()];

impl RenderUniforms {
    pub fn new(settings: &Settings, viewport: (u32, u32)) -> Self {
        let grid = settings.grid();
        Self {
            viewport: [viewport.0.max(1) as f32, viewport.1.max(1) as f32],
            grid_size: grid.side(),
            agent_count: grid.agent_count(),
            point_size: settings.point_size,
            color_mode: settings.color_mode.to_gpu(),
            max_speed: MAX_SPEED,
            _pad: 0.0,
        }
    }
}

/// Parameters for splatting agents into the fluid forcing texture.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct ProjectUniforms {
    pub target_size: [f32; 2],
    pub grid_size: u32,
    pub agent_count: u32,
    pub boid_weight: f32,
    /// Splat radius in unit-square distance.
    pub splat_radius: f32,
    pub _pad: [f32; 2],
}

const _: [(); 32] = [(); std::mem::size_of::<ProjectUniforms>()];

impl ProjectUniforms {
    pub fn new(settings: &Settings, target_size: (u32, u32), splat_radius: f32) -> Self {
        let grid = settings.grid();
        Self {
            target_size: [target_size.0 as f32, target_size.1 as f32],
            grid_size: grid.side(),
            agent_count: grid.agent_count(),
            boid_weight: settings.boid_weight,
            splat_radius,
            _pad: [0.0; 2],
        }
    }
}

/// Parameters for one step of the damped stand-in fluid field.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct FluidUniforms {
    pub impulse_position: [f32; 2],
    pub impulse_direction: [f32; 2],
    pub impulse_radius: f32,
    pub impulse_magnitude: f32,
    pub decay: f32,
    pub forcing_gain: f32,
    pub delta_time: f32,
    pub impulse_active: u32,
    pub field_size: [f32; 2],
}

const _: [(); 48] = [(); std::mem::size_of::<FluidUniforms>()];

impl FluidUniforms {
    pub fn new(
        field_size: (u32, u32),
        decay: f32,
        forcing_gain: f32,
        delta_time: f32,
        impulse: Option<&Impulse>,
    ) -> Self {
        let (position, direction, radius, magnitude) = match impulse {
            Some(i) => (i.position, i.direction, i.radius, i.magnitude),
            None => (Vec2::ZERO, Vec2::ZERO, 0.0, 0.0),
        };
        Self {
            impulse_position: position.to_array(),
            impulse_direction: direction.to_array(),
            impulse_radius: radius,
            impulse_magnitude: magnitude,
            decay,
            forcing_gain,
            delta_time,
            impulse_active: impulse.is_some() as u32,
            field_size: [field_size.0 as f32, field_size.1 as f32],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{BoundaryMode, ColorMode, SettingsPatch};
    use std::mem::offset_of;

    #[test]
    fn test_update_offsets() {
        assert_eq!(offset_of!(UpdateUniforms, grid_size), 8);
        assert_eq!(offset_of!(UpdateUniforms, delta_time), 16);
        assert_eq!(offset_of!(UpdateUniforms, sight_radius), 32);
        assert_eq!(offset_of!(UpdateUniforms, wrap), 56);
        assert_eq!(offset_of!(UpdateUniforms, max_speed), 64);
    }

    #[test]
    fn test_update_from_settings() {
        let settings = Settings::default().apply(
            &SettingsPatch::new()
                .agent_count(10)
                .boundary(BoundaryMode::Wrap)
                .fluid_enabled(true),
        );
        let u = UpdateUniforms::new(&settings, 0.016);
        assert_eq!(u.grid_size, 4);
        assert_eq!(u.agent_count, 10);
        assert_eq!(u.wrap, 1);
        assert_eq!(u.fluid_enabled, 1);
        assert_eq!(u.delta_time, 0.016);
        assert_eq!(u.predator_position, [-1.0, -1.0]);
    }

    #[test]
    fn test_render_color_mode() {
        let settings =
            Settings::default().apply(&SettingsPatch::new().color_mode(ColorMode::Acceleration));
        let u = RenderUniforms::new(&settings, (0, 600));
        assert_eq!(u.color_mode, 2);
        assert_eq!(u.viewport, [1.0, 600.0]);
        assert_eq!(offset_of!(RenderUniforms, point_size), 16);
    }

    #[test]
    fn test_fluid_without_impulse() {
        let u = FluidUniforms::new((128, 128), 0.99, 1.0, 0.016, None);
        assert_eq!(u.impulse_active, 0);
        assert_eq!(offset_of!(FluidUniforms, field_size), 40);

        let impulse = Impulse::new(Vec2::splat(0.5), Vec2::X, 1e-4, 3.0);
        let u = FluidUniforms::new((128, 128), 0.99, 1.0, 0.016, Some(&impulse));
        assert_eq!(u.impulse_active, 1);
        assert_eq!(u.impulse_magnitude, 3.0);
    }
}
