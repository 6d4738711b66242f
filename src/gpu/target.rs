//! Double-buffered agent state textures.

use rand::Rng;

use super::{GpuContext, STATE_FORMAT};
use crate::error::GpuError;
use crate::grid::AgentGrid;
use crate::pingpong::PingPong;
use crate::state::{decode_generation, encode_generation, seed_random, AgentState, StateTexel};

/// One generation of agent state: a `side × side` float texture.
pub struct StateTarget {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl StateTarget {
    fn new(gpu: &GpuContext, grid: &AgentGrid, label: &str) -> Self {
        let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: grid.side(),
                height: grid.side(),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: STATE_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }

    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }
}

/// The read/write pair of state targets plus the grid they were sized for.
///
/// Passes read [`read`](DoubleTarget::read) and write
/// [`write`](DoubleTarget::write); [`swap`](DoubleTarget::swap) only exchanges
/// handles. Both targets always share the same grid.
pub struct DoubleTarget {
    grid: AgentGrid,
    pair: PingPong<StateTarget>,
}

impl DoubleTarget {
    /// Create both targets for `grid` and fill them with the same random generation.
    pub fn allocate<R: Rng + ?Sized>(
        gpu: &GpuContext,
        grid: AgentGrid,
        rng: &mut R,
    ) -> Result<Self, GpuError> {
        let limit = gpu.max_texture_side();
        if grid.side() > limit {
            return Err(GpuError::TargetTooLarge {
                side: grid.side(),
                limit,
            });
        }

        let target = Self {
            grid,
            pair: PingPong::new(
                StateTarget::new(gpu, &grid, "Agent State A"),
                StateTarget::new(gpu, &grid, "Agent State B"),
            ),
        };
        let seed = seed_random(&grid, rng);
        target.upload_both(gpu, &seed);
        log::debug!(
            "allocated {0}x{0} state targets for {1} agents",
            grid.side(),
            grid.agent_count()
        );
        Ok(target)
    }

    /// Reallocate for a new grid and re-seed.
    ///
    /// The new pair is fully built before the old one is dropped, so on error
    /// the engine keeps its previous, consistent pair.
    pub fn resize<R: Rng + ?Sized>(
        &mut self,
        gpu: &GpuContext,
        grid: AgentGrid,
        rng: &mut R,
    ) -> Result<(), GpuError> {
        let next = Self::allocate(gpu, grid, rng)?;
        *self = next;
        Ok(())
    }

    pub fn grid(&self) -> AgentGrid {
        self.grid
    }

    pub fn read(&self) -> &StateTarget {
        self.pair.read()
    }

    pub fn write(&self) -> &StateTarget {
        self.pair.write()
    }

    pub fn swap(&mut self) {
        self.pair.swap();
    }

    /// Swaps since allocation.
    pub fn swaps(&self) -> u64 {
        self.pair.swaps()
    }

    /// Overwrite the read generation with `agents`.
    pub fn upload(&self, gpu: &GpuContext, agents: &[AgentState]) {
        let texels = encode_generation(&self.grid, agents);
        gpu.write_texture_rgba32(self.read().texture(), bytemuck::cast_slice(&texels));
    }

    fn upload_both(&self, gpu: &GpuContext, agents: &[AgentState]) {
        let texels = encode_generation(&self.grid, agents);
        for target in [self.read(), self.write()] {
            gpu.write_texture_rgba32(target.texture(), bytemuck::cast_slice(&texels));
        }
    }

    /// Copy the read generation back to the CPU.
    pub fn read_back(&self, gpu: &GpuContext) -> Result<Vec<AgentState>, GpuError> {
        let raw = gpu.read_texture_rgba32(self.read().texture())?;
        let texels: &[StateTexel] = bytemuck::cast_slice(&raw);
        Ok(decode_generation(&self.grid, texels))
    }
}
