//! Coupling between the flock and an external fluid velocity field.
//!
//! The engine only ever sees a [`FluidCoupling`]: something that may lend it a
//! velocity texture for one frame. A full fluid module implements
//! [`FluidField`], which adds the calls the control layer makes (impulses,
//! its own time step, reset). When coupling is off the engine is handed
//! [`NoFluid`] and binds a zero field instead.

use glam::Vec2;

use crate::gpu::GpuContext;

/// Read side of a fluid module, as seen by the update pass.
pub trait FluidCoupling {
    /// Velocity field in the same layout as the screen (row 0 at the top),
    /// `xy` channels holding velocity in unit-square units per second.
    fn velocity_field(&self) -> Option<&wgpu::TextureView>;
}

/// The full interface of a fluid module.
pub trait FluidField: FluidCoupling {
    /// Queue a directional splat, applied on the next [`step`](FluidField::step).
    fn inject_impulse(&mut self, impulse: Impulse);

    /// Advance the field by `dt` seconds, optionally driven by the flock's
    /// forcing texture.
    fn step(&mut self, gpu: &GpuContext, dt: f32, forcing: Option<&wgpu::TextureView>);

    /// Clear the field back to rest.
    fn reset(&mut self, gpu: &GpuContext);
}

/// A transient directional force injected into the fluid at a point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Impulse {
    /// Center in the unit square, origin bottom-left.
    pub position: Vec2,
    /// Unit direction.
    pub direction: Vec2,
    /// Gaussian splat width: weight is `exp(-d² / radius)`.
    pub radius: f32,
    pub magnitude: f32,
}

impl Impulse {
    pub fn new(position: Vec2, direction: Vec2, radius: f32, magnitude: f32) -> Self {
        Self {
            position,
            direction: direction.normalize_or_zero(),
            radius,
            magnitude,
        }
    }

    /// Velocity this impulse adds at `point`, before scaling by time.
    pub fn splat_at(&self, point: Vec2) -> Vec2 {
        let d = point - self.position;
        let weight = (-d.length_squared() / self.radius.max(1e-8)).exp();
        self.direction * self.magnitude * weight
    }
}

/// Coupling that never provides a field.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoFluid;

impl FluidCoupling for NoFluid {
    fn velocity_field(&self) -> Option<&wgpu::TextureView> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_fluid_has_no_field() {
        assert!(NoFluid.velocity_field().is_none());
    }

    #[test]
    fn test_impulse_direction_normalized() {
        let impulse = Impulse::new(Vec2::ZERO, Vec2::new(3.0, 4.0), 0.1, 1.0);
        assert!((impulse.direction.length() - 1.0).abs() < 1e-6);
        let still = Impulse::new(Vec2::ZERO, Vec2::ZERO, 0.1, 1.0);
        assert_eq!(still.direction, Vec2::ZERO);
    }

    #[test]
    fn test_splat_peaks_at_center() {
        let impulse = Impulse::new(Vec2::splat(0.5), Vec2::X, 0.01, 2.0);
        assert_eq!(impulse.splat_at(Vec2::splat(0.5)), Vec2::new(2.0, 0.0));
        let off = impulse.splat_at(Vec2::new(0.6, 0.5));
        assert!(off.x > 0.0 && off.x < 2.0);
    }
}
