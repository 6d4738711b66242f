//! Flock-side half of the fluid coupling.
//!
//! Each frame with coupling enabled, every agent's velocity (scaled by the
//! boid weight) is splatted into a forcing texture that a fluid module can
//! read. The other direction needs no pass of its own: the update pass reads
//! the fluid's velocity field directly, or a 1×1 zero field when coupling is
//! off.

use super::{draw_agents, zero_texture, GpuContext, PassInputs, ShaderProgram, FORCING_FORMAT};
use crate::error::GpuError;
use crate::fluid::FluidCoupling;
use crate::pass::PassKind;
use crate::settings::Settings;
use crate::uniforms::ProjectUniforms;

/// Owns the forcing texture and the projection pipeline.
pub struct FluidProjector {
    program: ShaderProgram,
    uniform_buffer: wgpu::Buffer,
    forcing: wgpu::Texture,
    forcing_view: wgpu::TextureView,
    _zero_field: wgpu::Texture,
    zero_field_view: wgpu::TextureView,
    resolution: u32,
}

impl FluidProjector {
    pub const DEFAULT_RESOLUTION: u32 = 128;

    pub fn new(gpu: &GpuContext, resolution: u32) -> Self {
        let resolution = resolution.clamp(1, gpu.max_texture_side());
        let program = ShaderProgram::new(gpu, PassKind::FluidProject, FORCING_FORMAT);

        let uniform_buffer = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Project Uniforms"),
            size: std::mem::size_of::<ProjectUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let forcing = gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Fluid Forcing"),
            size: wgpu::Extent3d {
                width: resolution,
                height: resolution,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: FORCING_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let forcing_view = forcing.create_view(&wgpu::TextureViewDescriptor::default());

        let (zero_field, zero_field_view) =
            zero_texture(gpu, "Zero Fluid Field", super::STATE_FORMAT);

        Self {
            program,
            uniform_buffer,
            forcing,
            forcing_view,
            _zero_field: zero_field,
            zero_field_view,
            resolution,
        }
    }

    /// Splat radius in unit-square distance: two forcing texels.
    pub fn splat_radius(&self) -> f32 {
        2.0 / self.resolution as f32
    }

    /// Rebuild the forcing texture from the agents in `state`. Does nothing
    /// when coupling is disabled.
    pub fn project(
        &self,
        gpu: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        settings: &Settings,
        state: &wgpu::TextureView,
    ) {
        if !settings.fluid_enabled {
            return;
        }
        let uniforms = ProjectUniforms::new(
            settings,
            (self.resolution, self.resolution),
            self.splat_radius(),
        );
        gpu.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));

        let bind_group = self.program.bind(
            gpu,
            PassInputs::FluidProject {
                uniforms: &self.uniform_buffer,
                state,
            },
        );
        draw_agents(
            encoder,
            &self.program,
            &bind_group,
            &self.forcing_view,
            settings.grid().agent_count(),
            Some(wgpu::Color::TRANSPARENT),
        );
    }

    /// Zero the forcing texture.
    pub fn clear(&self, encoder: &mut wgpu::CommandEncoder) {
        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Clear Fluid Forcing"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &self.forcing_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
    }

    pub fn forcing_view(&self) -> &wgpu::TextureView {
        &self.forcing_view
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    /// Copy the forcing texture back to the CPU, rows top to bottom.
    pub fn read_forcing(&self, gpu: &GpuContext) -> Result<Vec<[f32; 4]>, GpuError> {
        gpu.read_texture_rgba16(&self.forcing)
    }

    /// The velocity view the update pass should bind this frame.
    pub fn velocity_source<'a>(
        &'a self,
        settings: &Settings,
        fluid: &'a dyn FluidCoupling,
    ) -> &'a wgpu::TextureView {
        if !settings.fluid_enabled {
            return &self.zero_field_view;
        }
        fluid.velocity_field().unwrap_or(&self.zero_field_view)
    }
}
