//! A minimal fluid field for driving the coupling path.
//!
//! Not a Navier-Stokes solver: each step the velocity decays, gains the
//! flock's forcing, and gains a Gaussian splat for a pending impulse. Any
//! real fluid module can replace it by implementing [`FluidField`].

use super::{
    draw_fullscreen, zero_texture, GpuContext, PassInputs, ShaderProgram, FORCING_FORMAT,
    STATE_FORMAT,
};
use crate::fluid::{FluidCoupling, FluidField, Impulse};
use crate::pass::PassKind;
use crate::pingpong::PingPong;
use crate::uniforms::FluidUniforms;

struct FieldTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl FieldTexture {
    fn new(gpu: &GpuContext, resolution: u32, label: &str) -> Self {
        let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: resolution,
                height: resolution,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: STATE_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }
}

/// Ping-ponged velocity grid with exponential decay.
pub struct DampedFluid {
    program: ShaderProgram,
    uniform_buffer: wgpu::Buffer,
    field: PingPong<FieldTexture>,
    _no_forcing: wgpu::Texture,
    no_forcing_view: wgpu::TextureView,
    resolution: u32,
    /// Fraction of velocity kept per step.
    pub decay: f32,
    /// Scale applied to the flock forcing, per second.
    pub forcing_gain: f32,
    pending: Option<Impulse>,
}

impl DampedFluid {
    pub fn new(gpu: &GpuContext, resolution: u32) -> Self {
        let resolution = resolution.clamp(1, gpu.max_texture_side());
        let program = ShaderProgram::new(gpu, PassKind::FluidStep, STATE_FORMAT);
        let uniform_buffer = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Fluid Uniforms"),
            size: std::mem::size_of::<FluidUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let (no_forcing, no_forcing_view) = zero_texture(gpu, "No Forcing", FORCING_FORMAT);

        log::info!("damped fluid field {0}x{0}", resolution);
        Self {
            program,
            uniform_buffer,
            field: PingPong::new(
                FieldTexture::new(gpu, resolution, "Fluid Velocity A"),
                FieldTexture::new(gpu, resolution, "Fluid Velocity B"),
            ),
            _no_forcing: no_forcing,
            no_forcing_view,
            resolution,
            decay: 0.98,
            forcing_gain: 1.0,
            pending: None,
        }
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    /// Impulse waiting for the next step, if any.
    pub fn pending_impulse(&self) -> Option<&Impulse> {
        self.pending.as_ref()
    }

    /// Copy the current field back to the CPU (row 0 at the top).
    pub fn read_velocity(&self, gpu: &GpuContext) -> Result<Vec<[f32; 4]>, crate::GpuError> {
        gpu.read_texture_rgba32(&self.field.read().texture)
    }
}

impl FluidCoupling for DampedFluid {
    fn velocity_field(&self) -> Option<&wgpu::TextureView> {
        Some(&self.field.read().view)
    }
}

impl FluidField for DampedFluid {
    fn inject_impulse(&mut self, impulse: Impulse) {
        self.pending = Some(impulse);
    }

    fn step(&mut self, gpu: &GpuContext, dt: f32, forcing: Option<&wgpu::TextureView>) {
        let uniforms = FluidUniforms::new(
            (self.resolution, self.resolution),
            self.decay,
            self.forcing_gain,
            dt,
            self.pending.as_ref(),
        );
        gpu.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));

        let (read, write) = self.field.split();
        let bind_group = self.program.bind(
            gpu,
            PassInputs::FluidStep {
                uniforms: &self.uniform_buffer,
                velocity: &read.view,
                forcing: forcing.unwrap_or(&self.no_forcing_view),
            },
        );

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Fluid Step Encoder"),
            });
        draw_fullscreen(&mut encoder, &self.program, &bind_group, &write.view);
        gpu.queue.submit(Some(encoder.finish()));

        self.field.swap();
        self.pending = None;
    }

    fn reset(&mut self, gpu: &GpuContext) {
        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Fluid Reset Encoder"),
            });
        let (a, b) = self.field.split();
        for target in [a, b] {
            encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Fluid Reset"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.view,
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
        gpu.queue.submit(Some(encoder.finish()));
        self.pending = None;
    }
}
