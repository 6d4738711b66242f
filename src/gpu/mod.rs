//! GPU device setup and shared helpers.
//!
//! [`GpuContext`] owns the device and queue. It is created either headless
//! (tests, offline use) or together with a window [`SurfaceState`]. Both
//! paths verify that the adapter can render into the float formats the
//! passes need before any engine is built.

mod damped_fluid;
mod draw;
mod program;
mod projector;
mod target;

use std::sync::mpsc::channel;
use std::sync::Arc;

use winit::window::Window;

use crate::error::GpuError;

pub use damped_fluid::DampedFluid;
pub use draw::{draw_agents, draw_fullscreen};
pub use program::{PassInputs, ShaderProgram};
pub use projector::FluidProjector;
pub use target::{DoubleTarget, StateTarget};

/// Format of agent state and fluid velocity textures.
pub const STATE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;
/// Format of the flock-to-fluid forcing texture. Needs additive blending.
pub const FORCING_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

/// Device, queue and the facts about the adapter the engine depends on.
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub adapter_info: wgpu::AdapterInfo,
}

/// A configured window surface.
pub struct SurfaceState {
    pub surface: wgpu::Surface<'static>,
    pub config: wgpu::SurfaceConfiguration,
}

impl GpuContext {
    /// Create a context without a surface.
    pub async fn headless() -> Result<Self, GpuError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(GpuError::NoAdapter)?;
        Self::from_adapter(&adapter).await
    }

    /// Blocking wrapper around [`headless`](GpuContext::headless).
    pub fn headless_blocking() -> Result<Self, GpuError> {
        pollster::block_on(Self::headless())
    }

    /// Create a context and a configured surface for `window`.
    pub async fn for_window(window: Arc<Window>) -> Result<(Self, SurfaceState), GpuError> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = instance.create_surface(window)?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(GpuError::NoAdapter)?;

        let gpu = Self::from_adapter(&adapter).await?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .ok_or(GpuError::UnsupportedFormat(wgpu::TextureFormat::Bgra8UnormSrgb))?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&gpu.device, &config);

        Ok((gpu, SurfaceState { surface, config }))
    }

    async fn from_adapter(adapter: &wgpu::Adapter) -> Result<Self, GpuError> {
        for format in [STATE_FORMAT, FORCING_FORMAT] {
            let features = adapter.get_texture_format_features(format);
            let needed =
                wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING;
            if !features.allowed_usages.contains(needed) {
                return Err(GpuError::UnsupportedFormat(format));
            }
        }
        let forcing = adapter.get_texture_format_features(FORCING_FORMAT);
        if !forcing
            .flags
            .contains(wgpu::TextureFormatFeatureFlags::BLENDABLE)
        {
            return Err(GpuError::UnsupportedFormat(FORCING_FORMAT));
        }

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default().using_resolution(adapter.limits()),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await?;

        let adapter_info = adapter.get_info();
        log::info!(
            "using {} ({:?}, {:?})",
            adapter_info.name,
            adapter_info.device_type,
            adapter_info.backend
        );

        Ok(Self {
            device,
            queue,
            adapter_info,
        })
    }

    /// Largest square texture side the device accepts.
    pub fn max_texture_side(&self) -> u32 {
        self.device.limits().max_texture_dimension_2d
    }

    /// Copy a whole texture back to the CPU as raw bytes, row-major, padding stripped.
    pub fn read_texture_bytes(&self, texture: &wgpu::Texture) -> Result<Vec<u8>, GpuError> {
        let format = texture.format();
        let texel_bytes = format
            .block_copy_size(None)
            .ok_or(GpuError::UnsupportedFormat(format))?;
        let width = texture.width();
        let height = texture.height();
        let unpadded_row = width * texel_bytes;
        let padded_row = padded_bytes_per_row(unpadded_row);

        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Readback Buffer"),
            size: (padded_row * height) as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Readback Encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row),
                    rows_per_image: Some(height),
                },
            },
            texture.size(),
        );
        self.queue.submit(Some(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|e| GpuError::BufferMapping(e.to_string()))?
            .map_err(|e| GpuError::BufferMapping(e.to_string()))?;

        let data = slice.get_mapped_range();
        let mut bytes = Vec::with_capacity((unpadded_row * height) as usize);
        for row in data.chunks(padded_row as usize) {
            bytes.extend_from_slice(&row[..unpadded_row as usize]);
        }
        drop(data);
        staging.unmap();

        Ok(bytes)
    }

    /// Copy a whole `Rgba32Float` texture back to the CPU, row-major.
    pub fn read_texture_rgba32(
        &self,
        texture: &wgpu::Texture,
    ) -> Result<Vec<[f32; 4]>, GpuError> {
        expect_format(texture, wgpu::TextureFormat::Rgba32Float)?;
        let bytes = self.read_texture_bytes(texture)?;
        Ok(bytes
            .chunks_exact(16)
            .map(bytemuck::pod_read_unaligned::<[f32; 4]>)
            .collect())
    }

    /// Copy a whole `Rgba16Float` texture back to the CPU, widened to `f32`.
    pub fn read_texture_rgba16(
        &self,
        texture: &wgpu::Texture,
    ) -> Result<Vec<[f32; 4]>, GpuError> {
        expect_format(texture, wgpu::TextureFormat::Rgba16Float)?;
        let bytes = self.read_texture_bytes(texture)?;
        Ok(bytes
            .chunks_exact(8)
            .map(|texel| bytemuck::pod_read_unaligned::<[u16; 4]>(texel).map(f16_to_f32))
            .collect())
    }

    /// Upload row-major `Rgba32Float` texels into `texture`.
    pub fn write_texture_rgba32(&self, texture: &wgpu::Texture, texels: &[[f32; 4]]) {
        let width = texture.width();
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(texels),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width * std::mem::size_of::<[f32; 4]>() as u32),
                rows_per_image: Some(texture.height()),
            },
            texture.size(),
        );
    }
}

impl SurfaceState {
    pub fn format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    pub fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    /// Reconfigure after a window resize. Zero-sized requests are ignored.
    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.config.width = width;
            self.config.height = height;
            self.surface.configure(device, &self.config);
        }
    }
}

/// Round a row size up to the copy alignment wgpu requires.
pub fn padded_bytes_per_row(unpadded: u32) -> u32 {
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

fn expect_format(texture: &wgpu::Texture, format: wgpu::TextureFormat) -> Result<(), GpuError> {
    if texture.format() == format {
        Ok(())
    } else {
        Err(GpuError::UnsupportedFormat(texture.format()))
    }
}

/// Widen an IEEE 754 half to `f32`.
pub fn f16_to_f32(bits: u16) -> f32 {
    let exponent = ((bits >> 10) & 0x1f) as u32;
    let mantissa = (bits & 0x3ff) as u32;
    let magnitude = match exponent {
        0 => mantissa as f32 / (1u32 << 24) as f32,
        0x1f if mantissa == 0 => f32::INFINITY,
        0x1f => f32::NAN,
        _ => f32::from_bits(((exponent + 127 - 15) << 23) | (mantissa << 13)),
    };
    if bits & 0x8000 != 0 {
        -magnitude
    } else {
        magnitude
    }
}

/// A 1×1 sampled texture. wgpu zero-initializes it, so it reads as a zero field.
pub(crate) fn zero_texture(
    gpu: &GpuContext,
    label: &str,
    format: wgpu::TextureFormat,
) -> (wgpu::Texture, wgpu::TextureView) {
    let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width: 1,
            height: 1,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}
