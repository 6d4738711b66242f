//! Simulation builder and windowed runner.
//!
//! Wires a [`FlockEngine`], an optional [`DampedFluid`], the frame clock and
//! the input controls into a winit event loop.

use std::sync::Arc;

use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowId},
};

use crate::engine::FlockEngine;
use crate::error::SimulationError;
use crate::fluid::{FluidCoupling, FluidField, NoFluid};
use crate::gpu::{DampedFluid, GpuContext, SurfaceState};
use crate::input::{Control, Controls};
use crate::settings::{Settings, SettingsPatch};
use crate::time::FrameClock;

/// A flock simulation builder.
///
/// Use method chaining to configure, then call `.run()` to start.
///
/// ```ignore
/// Simulation::new()
///     .with_patch(&SettingsPatch::new().agent_count(1024).boundary(BoundaryMode::Wrap))
///     .with_fluid(true)
///     .run()?;
/// ```
pub struct Simulation {
    settings: Settings,
    fluid: bool,
    fluid_resolution: u32,
    title: String,
    window_size: (u32, u32),
}

impl Simulation {
    pub fn new() -> Self {
        Self {
            settings: Settings::default(),
            fluid: true,
            fluid_resolution: 128,
            title: "texflock".to_string(),
            window_size: (800, 800),
        }
    }

    /// Replace the starting settings.
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Override some of the starting settings.
    pub fn with_patch(mut self, patch: &SettingsPatch) -> Self {
        self.settings = self.settings.apply(patch);
        self
    }

    /// Whether to attach a fluid field. Without one, coupling reads a zero field
    /// even when enabled in the settings.
    pub fn with_fluid(mut self, enabled: bool) -> Self {
        self.fluid = enabled;
        self
    }

    pub fn with_fluid_resolution(mut self, resolution: u32) -> Self {
        self.fluid_resolution = resolution.max(1);
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Initial window size in logical pixels.
    pub fn with_window_size(mut self, width: u32, height: u32) -> Self {
        self.window_size = (width.max(1), height.max(1));
        self
    }

    /// Run the simulation. This blocks until the window is closed.
    pub fn run(self) -> Result<(), SimulationError> {
        let event_loop = EventLoop::new()?;
        event_loop.set_control_flow(ControlFlow::Poll);

        let mut app = App::new(self);
        event_loop.run_app(&mut app)?;
        match app.error.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new()
    }
}

struct Running {
    window: Arc<Window>,
    surface: SurfaceState,
    engine: FlockEngine,
    fluid: Option<DampedFluid>,
}

struct App {
    config: Simulation,
    running: Option<Running>,
    clock: FrameClock,
    controls: Controls,
    error: Option<SimulationError>,
}

impl App {
    fn new(config: Simulation) -> Self {
        let controls = Controls::new(config.window_size);
        Self {
            config,
            running: None,
            clock: FrameClock::new(),
            controls,
            error: None,
        }
    }

    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<(), SimulationError> {
        let (width, height) = self.config.window_size;
        let window_attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(winit::dpi::LogicalSize::new(width, height));
        let window = Arc::new(event_loop.create_window(window_attrs)?);

        let (gpu, surface) = pollster::block_on(GpuContext::for_window(window.clone()))?;
        let gpu = Arc::new(gpu);
        let engine = FlockEngine::new(gpu.clone(), self.config.settings, surface.format())?;
        let fluid = self
            .config
            .fluid
            .then(|| DampedFluid::new(&gpu, self.config.fluid_resolution));

        let (w, h) = surface.size();
        self.controls.set_window_size(w, h);
        self.running = Some(Running {
            window,
            surface,
            engine,
            fluid,
        });
        Ok(())
    }

    fn apply(&mut self, control: Control) {
        let Some(running) = self.running.as_mut() else {
            return;
        };
        match control {
            Control::TogglePause => {
                self.clock.toggle_pause();
                log::info!("{}", if self.clock.is_paused() { "paused" } else { "resumed" });
            }
            Control::Reset => {
                running.engine.reset_all();
                if let Some(fluid) = running.fluid.as_mut() {
                    fluid.reset(running.engine.gpu());
                }
            }
            Control::Impulse(impulse) => {
                if running.engine.settings().fluid_enabled {
                    if let Some(fluid) = running.fluid.as_mut() {
                        fluid.inject_impulse(impulse);
                    }
                }
            }
            Control::Settings(patch) => {
                let was_coupled = running.engine.settings().fluid_enabled;
                if let Err(e) = running.engine.update_settings(&patch) {
                    log::warn!("settings update rejected: {}", e);
                    return;
                }
                if was_coupled && !running.engine.settings().fluid_enabled {
                    if let Some(fluid) = running.fluid.as_mut() {
                        fluid.reset(running.engine.gpu());
                    }
                }
            }
        }
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let dt = self.clock.tick();
        let paused = self.clock.is_paused();
        let Some(running) = self.running.as_mut() else {
            return;
        };

        let frame = match running.surface.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                let (w, h) = running.surface.size();
                running.surface.resize(&running.engine.gpu().device, w, h);
                return;
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                log::error!("surface out of memory, exiting");
                event_loop.exit();
                return;
            }
            Err(e) => {
                log::warn!("dropped frame: {:?}", e);
                return;
            }
        };
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let size = running.surface.size();

        if paused {
            running.engine.render(&view, size);
        } else {
            let coupling: &dyn FluidCoupling = match running.fluid.as_ref() {
                Some(fluid) => fluid,
                None => &NoFluid,
            };
            running.engine.step(dt, coupling, &view, size);

            if let Some(fluid) = running.fluid.as_mut() {
                if running.engine.settings().fluid_enabled {
                    fluid.step(running.engine.gpu(), dt, running.engine.fluid_forcing());
                }
            }
        }
        frame.present();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.running.is_some() {
            return;
        }
        if let Err(e) = self.start(event_loop) {
            log::error!("failed to start: {}", e);
            self.error = Some(e);
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(physical_size) => {
                self.controls
                    .set_window_size(physical_size.width, physical_size.height);
                if let Some(running) = self.running.as_mut() {
                    running.surface.resize(
                        &running.engine.gpu().device,
                        physical_size.width,
                        physical_size.height,
                    );
                }
            }
            WindowEvent::RedrawRequested => {
                self.redraw(event_loop);
                if let Some(running) = &self.running {
                    running.window.request_redraw();
                }
            }
            other => {
                let Some(running) = self.running.as_ref() else {
                    return;
                };
                let settings = *running.engine.settings();
                for control in self.controls.handle_event(&other, &settings) {
                    self.apply(control);
                }
            }
        }
    }
}
