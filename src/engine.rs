//! The flock engine: owns the state pair and sequences the passes.
//!
//! One [`FlockEngine::step`] runs, in order:
//!
//! 1. fluid projection (coupling enabled only): current state → forcing texture
//! 2. update: read generation → write generation
//! 3. swap
//! 4. render: current generation (and the previous one, for acceleration
//!    coloring) → caller's target
//!
//! Settings are a snapshot read at the start of each pass. Changing the agent
//! count through [`FlockEngine::update_settings`] reallocates and re-seeds
//! the state pair before returning, so the next render always decodes
//! indices against a matching grid.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::error::GpuError;
use crate::fluid::FluidCoupling;
use crate::gpu::{
    draw_agents, draw_fullscreen, DoubleTarget, FluidProjector, GpuContext, PassInputs,
    ShaderProgram,
};
use crate::grid::AgentGrid;
use crate::pass::PassKind;
use crate::settings::{Settings, SettingsChange, SettingsPatch};
use crate::state::AgentState;
use crate::uniforms::{RenderUniforms, UpdateUniforms};

/// Background the render pass clears to.
pub const CLEAR_COLOR: wgpu::Color = wgpu::Color::BLACK;

/// GPU flock simulation.
pub struct FlockEngine {
    gpu: Arc<GpuContext>,
    settings: Settings,
    targets: DoubleTarget,
    reset_program: ShaderProgram,
    update_program: ShaderProgram,
    render_program: ShaderProgram,
    reset_uniforms: wgpu::Buffer,
    update_uniforms: wgpu::Buffer,
    render_uniforms: wgpu::Buffer,
    projector: FluidProjector,
    rng: StdRng,
}

fn uniform_buffer<T>(gpu: &GpuContext, label: &str) -> wgpu::Buffer {
    gpu.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: std::mem::size_of::<T>() as u64,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

impl FlockEngine {
    /// Build an engine rendering into `target_format`, seeded from OS entropy.
    pub fn new(
        gpu: Arc<GpuContext>,
        settings: Settings,
        target_format: wgpu::TextureFormat,
    ) -> Result<Self, GpuError> {
        Self::with_rng(gpu, settings, target_format, StdRng::from_entropy())
    }

    /// Like [`new`](FlockEngine::new) with a fixed seed for the random re-seeds.
    pub fn with_seed(
        gpu: Arc<GpuContext>,
        settings: Settings,
        target_format: wgpu::TextureFormat,
        seed: u64,
    ) -> Result<Self, GpuError> {
        Self::with_rng(gpu, settings, target_format, StdRng::seed_from_u64(seed))
    }

    fn with_rng(
        gpu: Arc<GpuContext>,
        settings: Settings,
        target_format: wgpu::TextureFormat,
        mut rng: StdRng,
    ) -> Result<Self, GpuError> {
        // Goes through apply() so a zero count is clamped like any other update.
        let settings = settings.apply(&SettingsPatch::new().agent_count(settings.agent_count));
        let targets = DoubleTarget::allocate(&gpu, settings.grid(), &mut rng)?;

        let engine = Self {
            reset_program: ShaderProgram::new(&gpu, PassKind::Reset, target_format),
            update_program: ShaderProgram::new(&gpu, PassKind::Update, target_format),
            render_program: ShaderProgram::new(&gpu, PassKind::Render, target_format),
            reset_uniforms: uniform_buffer::<UpdateUniforms>(&gpu, "Reset Uniforms"),
            update_uniforms: uniform_buffer::<UpdateUniforms>(&gpu, "Update Uniforms"),
            render_uniforms: uniform_buffer::<RenderUniforms>(&gpu, "Render Uniforms"),
            projector: FluidProjector::new(&gpu, FluidProjector::DEFAULT_RESOLUTION),
            gpu,
            settings,
            targets,
            rng,
        };
        engine.run_reset();

        log::info!(
            "flock engine ready: {} agents on a {}x{} grid",
            engine.settings.agent_count,
            engine.grid().side(),
            engine.grid().side()
        );
        Ok(engine)
    }

    pub fn gpu(&self) -> &Arc<GpuContext> {
        &self.gpu
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn grid(&self) -> AgentGrid {
        self.targets.grid()
    }

    /// Number of update passes since the state pair was last allocated.
    pub fn generation(&self) -> u64 {
        self.targets.swaps()
    }

    /// Merge `patch` into the current settings.
    ///
    /// A changed agent count reallocates the state pair and re-seeds it with
    /// random agents. If that allocation fails, both the settings and the
    /// old pair are kept.
    pub fn update_settings(&mut self, patch: &SettingsPatch) -> Result<SettingsChange, GpuError> {
        let next = self.settings.apply(patch);
        let change = self.settings.change_to(&next);
        match change {
            SettingsChange::Unchanged => {}
            SettingsChange::Parameters => {
                log::debug!("settings updated: {:?}", patch);
            }
            SettingsChange::Regrid => {
                self.targets.resize(&self.gpu, next.grid(), &mut self.rng)?;
                log::info!(
                    "agent count {} -> {}, state reallocated",
                    self.settings.agent_count,
                    next.agent_count
                );
            }
        }
        self.settings = next;
        Ok(change)
    }

    /// Advance by `dt` seconds and draw into `target` (`size` in pixels).
    pub fn step(
        &mut self,
        dt: f32,
        fluid: &dyn FluidCoupling,
        target: &wgpu::TextureView,
        size: (u32, u32),
    ) {
        self.update(dt, fluid);
        self.render(target, size);
    }

    /// Run projection (if coupled) and one update pass, then swap.
    pub fn update(&mut self, dt: f32, fluid: &dyn FluidCoupling) {
        let settings = self.settings;
        let uniforms = UpdateUniforms::new(&settings, dt);
        self.gpu
            .queue
            .write_buffer(&self.update_uniforms, 0, bytemuck::bytes_of(&uniforms));

        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Update Encoder"),
            });

        self.projector
            .project(&self.gpu, &mut encoder, &settings, self.targets.read().view());

        let bind_group = self.update_program.bind(
            &self.gpu,
            PassInputs::Update {
                uniforms: &self.update_uniforms,
                state: self.targets.read().view(),
                fluid_velocity: self.projector.velocity_source(&settings, fluid),
            },
        );
        draw_fullscreen(
            &mut encoder,
            &self.update_program,
            &bind_group,
            self.targets.write().view(),
        );
        self.gpu.queue.submit(Some(encoder.finish()));

        self.targets.swap();
    }

    /// Draw the current generation into `target`.
    pub fn render(&self, target: &wgpu::TextureView, size: (u32, u32)) {
        let uniforms = RenderUniforms::new(&self.settings, size);
        self.gpu
            .queue
            .write_buffer(&self.render_uniforms, 0, bytemuck::bytes_of(&uniforms));

        // After a swap the write side holds the generation before the current one.
        let bind_group = self.render_program.bind(
            &self.gpu,
            PassInputs::Render {
                uniforms: &self.render_uniforms,
                current: self.targets.read().view(),
                previous: self.targets.write().view(),
            },
        );

        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });
        draw_agents(
            &mut encoder,
            &self.render_program,
            &bind_group,
            target,
            self.grid().agent_count(),
            Some(CLEAR_COLOR),
        );
        self.gpu.queue.submit(Some(encoder.finish()));
    }

    /// Put every agent at its texel center with zero velocity and clear the
    /// forcing texture. The write generation is left alone until the next update.
    pub fn reset_all(&mut self) {
        self.run_reset();
        log::info!("flock reset");
    }

    fn run_reset(&self) {
        let uniforms = UpdateUniforms::new(&self.settings, 0.0);
        self.gpu
            .queue
            .write_buffer(&self.reset_uniforms, 0, bytemuck::bytes_of(&uniforms));

        let bind_group = self.reset_program.bind(
            &self.gpu,
            PassInputs::Reset {
                uniforms: &self.reset_uniforms,
            },
        );
        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Reset Encoder"),
            });
        draw_fullscreen(
            &mut encoder,
            &self.reset_program,
            &bind_group,
            self.targets.read().view(),
        );
        self.projector.clear(&mut encoder);
        self.gpu.queue.submit(Some(encoder.finish()));
    }

    /// Replace the current generation with `agents` (extra agents are ignored,
    /// missing ones are zero).
    pub fn load_state(&self, agents: &[AgentState]) {
        self.targets.upload(&self.gpu, agents);
    }

    /// Copy the current generation back to the CPU.
    pub fn read_state(&self) -> Result<Vec<AgentState>, GpuError> {
        self.targets.read_back(&self.gpu)
    }

    /// Copy the forcing texture back to the CPU with its side length.
    pub fn read_forcing(&self) -> Result<(u32, Vec<[f32; 4]>), GpuError> {
        let texels = self.projector.read_forcing(&self.gpu)?;
        Ok((self.projector.resolution(), texels))
    }

    /// Forcing texture a fluid module should consume after this frame's update.
    pub fn fluid_forcing(&self) -> Option<&wgpu::TextureView> {
        self.settings
            .fluid_enabled
            .then(|| self.projector.forcing_view())
    }
}
