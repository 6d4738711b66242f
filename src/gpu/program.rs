//! Compiled pipelines for each [`PassKind`].

use super::{GpuContext, FORCING_FORMAT, STATE_FORMAT};
use crate::pass::{Binding, BlendMode, PassKind, TargetKind};
use crate::shaders;

/// Resources bound by one pass, typed per pass kind.
///
/// The variant fixes which views go where; [`ShaderProgram::bind`] turns it
/// into a bind group in the slot order given by the pass descriptor.
#[derive(Clone, Copy)]
pub enum PassInputs<'a> {
    Reset {
        uniforms: &'a wgpu::Buffer,
    },
    Update {
        uniforms: &'a wgpu::Buffer,
        state: &'a wgpu::TextureView,
        fluid_velocity: &'a wgpu::TextureView,
    },
    Render {
        uniforms: &'a wgpu::Buffer,
        current: &'a wgpu::TextureView,
        previous: &'a wgpu::TextureView,
    },
    FluidProject {
        uniforms: &'a wgpu::Buffer,
        state: &'a wgpu::TextureView,
    },
    FluidStep {
        uniforms: &'a wgpu::Buffer,
        velocity: &'a wgpu::TextureView,
        forcing: &'a wgpu::TextureView,
    },
}

impl<'a> PassInputs<'a> {
    pub fn kind(&self) -> PassKind {
        match self {
            PassInputs::Reset { .. } => PassKind::Reset,
            PassInputs::Update { .. } => PassKind::Update,
            PassInputs::Render { .. } => PassKind::Render,
            PassInputs::FluidProject { .. } => PassKind::FluidProject,
            PassInputs::FluidStep { .. } => PassKind::FluidStep,
        }
    }

    fn uniforms(&self) -> &'a wgpu::Buffer {
        match *self {
            PassInputs::Reset { uniforms }
            | PassInputs::Update { uniforms, .. }
            | PassInputs::Render { uniforms, .. }
            | PassInputs::FluidProject { uniforms, .. }
            | PassInputs::FluidStep { uniforms, .. } => uniforms,
        }
    }

    fn texture(&self, binding: Binding) -> Option<&'a wgpu::TextureView> {
        match (*self, binding) {
            (PassInputs::Update { state, .. }, Binding::StateCurrent) => Some(state),
            (PassInputs::Update { fluid_velocity, .. }, Binding::FluidVelocity) => {
                Some(fluid_velocity)
            }
            (PassInputs::Render { current, .. }, Binding::StateCurrent) => Some(current),
            (PassInputs::Render { previous, .. }, Binding::StatePrevious) => Some(previous),
            (PassInputs::FluidProject { state, .. }, Binding::StateCurrent) => Some(state),
            (PassInputs::FluidStep { velocity, .. }, Binding::FluidVelocity) => Some(velocity),
            (PassInputs::FluidStep { forcing, .. }, Binding::Forcing) => Some(forcing),
            _ => None,
        }
    }
}

/// Color format written by a target kind.
pub fn target_format(target: TargetKind, screen: wgpu::TextureFormat) -> wgpu::TextureFormat {
    match target {
        TargetKind::StateRead | TargetKind::StateWrite | TargetKind::FluidField => STATE_FORMAT,
        TargetKind::Forcing => FORCING_FORMAT,
        TargetKind::Screen => screen,
    }
}

fn layout_entry(slot: u32, binding: Binding) -> wgpu::BindGroupLayoutEntry {
    let ty = match binding {
        Binding::Uniforms => wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        Binding::StateCurrent
        | Binding::StatePrevious
        | Binding::FluidVelocity
        | Binding::Forcing => wgpu::BindingType::Texture {
            // Read with textureLoad only; 32-bit float textures are not filterable.
            sample_type: wgpu::TextureSampleType::Float { filterable: false },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
    };
    wgpu::BindGroupLayoutEntry {
        binding: slot,
        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
        ty,
        count: None,
    }
}

fn blend_state(mode: BlendMode) -> Option<wgpu::BlendState> {
    match mode {
        BlendMode::Replace => None,
        BlendMode::Additive => {
            let add = wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::One,
                dst_factor: wgpu::BlendFactor::One,
                operation: wgpu::BlendOperation::Add,
            };
            Some(wgpu::BlendState {
                color: add,
                alpha: add,
            })
        }
    }
}

/// A compiled vertex+fragment pipeline for one pass kind.
pub struct ShaderProgram {
    kind: PassKind,
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
}

impl ShaderProgram {
    /// Compile the pass. `screen_format` is only used by passes targeting the screen.
    pub fn new(gpu: &GpuContext, kind: PassKind, screen_format: wgpu::TextureFormat) -> Self {
        let desc = kind.descriptor();
        let device = &gpu.device;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(desc.label),
            source: wgpu::ShaderSource::Wgsl(shaders::source(kind).into()),
        });

        let entries: Vec<_> = desc
            .bindings
            .iter()
            .enumerate()
            .map(|(slot, binding)| layout_entry(slot as u32, *binding))
            .collect();
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(desc.label),
            entries: &entries,
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(desc.label),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(desc.label),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: target_format(desc.target, screen_format),
                    blend: blend_state(desc.blend),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Self {
            kind,
            pipeline,
            bind_group_layout,
        }
    }

    pub fn kind(&self) -> PassKind {
        self.kind
    }

    pub fn pipeline(&self) -> &wgpu::RenderPipeline {
        &self.pipeline
    }

    /// Build the bind group for this pass from typed inputs.
    pub fn bind(&self, gpu: &GpuContext, inputs: PassInputs<'_>) -> wgpu::BindGroup {
        debug_assert_eq!(inputs.kind(), self.kind, "inputs for the wrong pass");
        let desc = self.kind.descriptor();

        let entries: Vec<_> = desc
            .bindings
            .iter()
            .enumerate()
            .filter_map(|(slot, binding)| {
                let resource = match binding {
                    Binding::Uniforms => inputs.uniforms().as_entire_binding(),
                    other => wgpu::BindingResource::TextureView(inputs.texture(*other)?),
                };
                Some(wgpu::BindGroupEntry {
                    binding: slot as u32,
                    resource,
                })
            })
            .collect();

        gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(desc.label),
            layout: &self.bind_group_layout,
            entries: &entries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_formats() {
        let screen = wgpu::TextureFormat::Bgra8UnormSrgb;
        assert_eq!(target_format(TargetKind::StateWrite, screen), STATE_FORMAT);
        assert_eq!(target_format(TargetKind::Forcing, screen), FORCING_FORMAT);
        assert_eq!(target_format(TargetKind::Screen, screen), screen);
    }

    #[test]
    fn test_layout_slots_follow_descriptor() {
        let desc = PassKind::Render.descriptor();
        let entries: Vec<_> = desc
            .bindings
            .iter()
            .enumerate()
            .map(|(slot, b)| layout_entry(slot as u32, *b))
            .collect();
        assert_eq!(entries.len(), 3);
        assert!(matches!(entries[0].ty, wgpu::BindingType::Buffer { .. }));
        assert!(matches!(entries[2].ty, wgpu::BindingType::Texture { .. }));
        assert_eq!(entries[2].binding, 2);
    }

    #[test]
    fn test_only_additive_blends() {
        assert!(blend_state(BlendMode::Replace).is_none());
        assert!(blend_state(BlendMode::Additive).is_some());
    }
}
