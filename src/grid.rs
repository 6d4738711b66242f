//! Square texel grid that packs one agent per texel.
//!
//! Agents are stored row-major in a `side × side` texture where
//! `side = ceil(sqrt(agent_count))`. Every pass that looks an agent up by
//! index goes through [`AgentGrid::texel`] (or the WGSL `decode_index` in
//! [`crate::shaders`], which computes the same thing).

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Layout of the agent-state texture for a given agent count.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentGrid {
    agent_count: u32,
    side: u32,
}

impl AgentGrid {
    /// Build the grid for `agent_count` agents. Counts below one are raised to one.
    pub fn for_count(agent_count: u32) -> Self {
        let agent_count = agent_count.max(1);
        Self {
            agent_count,
            side: ceil_sqrt(agent_count),
        }
    }

    /// Number of live agents.
    #[inline]
    pub fn agent_count(&self) -> u32 {
        self.agent_count
    }

    /// Width and height of the state texture in texels.
    #[inline]
    pub fn side(&self) -> u32 {
        self.side
    }

    /// Total texels, including the unused padding after the last agent.
    #[inline]
    pub fn texel_count(&self) -> u64 {
        self.side as u64 * self.side as u64
    }

    /// Integer texel `(col, row)` holding agent `index`.
    #[inline]
    pub fn texel(&self, index: u32) -> (u32, u32) {
        (index % self.side, index / self.side)
    }

    /// Normalized texel center `((col + 0.5) / side, (row + 0.5) / side)`.
    pub fn texel_center(&self, index: u32) -> Vec2 {
        let (col, row) = self.texel(index);
        (Vec2::new(col as f32, row as f32) + 0.5) / self.side as f32
    }

    /// Linear index of texel `(col, row)`. May be `>= agent_count` for padding texels.
    #[inline]
    pub fn index_of(&self, col: u32, row: u32) -> u32 {
        row * self.side + col
    }

    /// Whether texel `(col, row)` holds a live agent.
    #[inline]
    pub fn is_live(&self, col: u32, row: u32) -> bool {
        col < self.side && row < self.side && self.index_of(col, row) < self.agent_count
    }
}

impl Default for AgentGrid {
    fn default() -> Self {
        Self::for_count(1)
    }
}

fn ceil_sqrt(n: u32) -> u32 {
    let n = n as u64;
    let mut side = (n as f64).sqrt().ceil() as u64;
    // Float sqrt can be off by one for large inputs.
    while side * side < n {
        side += 1;
    }
    while side > 1 && (side - 1) * (side - 1) >= n {
        side -= 1;
    }
    side as u32
}

/// Snap a requested agent count to the closest perfect square (ties round up).
///
/// Square counts fill the grid exactly, so the control layer offers them.
pub fn nearest_square(requested: u32) -> u32 {
    let root = (requested as f64).sqrt();
    let lo = root.floor() as u64;
    let hi = root.ceil() as u64;
    let n = requested as u64;
    let snapped = if n.abs_diff(lo * lo) < n.abs_diff(hi * hi) {
        lo * lo
    } else {
        hi * hi
    };
    snapped.clamp(1, u32::MAX as u64) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_side_is_ceil_sqrt() {
        assert_eq!(AgentGrid::for_count(1).side(), 1);
        assert_eq!(AgentGrid::for_count(2).side(), 2);
        assert_eq!(AgentGrid::for_count(4).side(), 2);
        assert_eq!(AgentGrid::for_count(5).side(), 3);
        assert_eq!(AgentGrid::for_count(64).side(), 8);
        assert_eq!(AgentGrid::for_count(65).side(), 9);
    }

    #[test]
    fn test_zero_count_clamps_to_one() {
        let grid = AgentGrid::for_count(0);
        assert_eq!(grid.agent_count(), 1);
        assert_eq!(grid.side(), 1);
    }

    #[test]
    fn test_mapping_is_injective_and_in_bounds() {
        for n in 1..300 {
            let grid = AgentGrid::for_count(n);
            assert!(grid.texel_count() >= n as u64);
            let mut seen = HashSet::new();
            for i in 0..n {
                let (col, row) = grid.texel(i);
                assert!(col < grid.side() && row < grid.side());
                assert!(seen.insert((col, row)), "duplicate texel for n={n} i={i}");
                assert_eq!(grid.index_of(col, row), i);
            }
        }
    }

    #[test]
    fn test_texel_count_past_u32() {
        let grid = AgentGrid::for_count(u32::MAX);
        assert_eq!(grid.side(), 65536);
        assert_eq!(grid.texel_count(), 1u64 << 32);
    }

    #[test]
    fn test_texel_center() {
        let grid = AgentGrid::for_count(4);
        assert_eq!(grid.texel_center(0), Vec2::new(0.25, 0.25));
        assert_eq!(grid.texel_center(3), Vec2::new(0.75, 0.75));
        assert_eq!(AgentGrid::for_count(1).texel_center(0), Vec2::splat(0.5));
    }

    #[test]
    fn test_padding_texels_are_not_live() {
        let grid = AgentGrid::for_count(5);
        assert!(grid.is_live(1, 1));
        assert!(!grid.is_live(2, 1));
        assert!(!grid.is_live(0, 2));
    }

    #[test]
    fn test_nearest_square() {
        assert_eq!(nearest_square(0), 1);
        assert_eq!(nearest_square(1), 1);
        assert_eq!(nearest_square(60), 64);
        assert_eq!(nearest_square(70), 64);
        assert_eq!(nearest_square(1000), 1024);
    }
}
