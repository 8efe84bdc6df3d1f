//! Render payload structures pushed from the simulation to the renderer.
//!
//! All structs use `#[repr(C)]` and implement `Pod`/`Zeroable` so a renderer
//! can copy them straight into vertex buffers.

use bytemuck::{Pod, Zeroable};

/// Per-point vertex attributes, indexed by point index.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable, Debug, PartialEq)]
pub struct PointVertex {
    /// Position (x, y) in world coordinates
    pub position: [f32; 2],
    /// Material render color; alpha fades debris out
    pub color: [f32; 4],
    /// Light received from lamps, 0..1
    pub light: f32,
    /// Water content
    pub water: f32,
    /// Structural integrity, 0..1
    pub decay: f32,
    /// Temperature in Kelvin
    pub temperature: f32,
    /// Plane (connected component) for z-ordering
    pub plane_id: f32,
    /// Padding for 16-byte alignment (48 bytes total)
    pub _padding: f32,
}

/// A spring or rope drawn as a line segment between two point indices.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable, Debug, PartialEq, Eq)]
pub struct SpringElement {
    pub point_a: u32,
    pub point_b: u32,
}

/// A triangle drawn over three point indices.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable, Debug, PartialEq, Eq)]
pub struct TriangleElement {
    pub point_a: u32,
    pub point_b: u32,
    pub point_c: u32,
}

/// One flame, uploaded in plane order.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable, Debug, PartialEq)]
pub struct FlameInstance {
    pub plane_id: f32,
    pub position: [f32; 2],
    /// Flame size, 0..~1.5
    pub flame_development: f32,
    /// Random per-flame value in [0, 1) used to vary the flame shape
    pub personality: f32,
    /// 1 when the burning point has no triangles (chains, ropes)
    pub is_on_chain: u32,
}

/// Ephemeral particle sprite.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable, Debug, PartialEq)]
pub struct EphemeralSprite {
    /// One of [`sprite_kind`]
    pub kind: u32,
    pub frame_index: u32,
    pub plane_id: f32,
    pub position: [f32; 2],
    pub scale: f32,
    /// Kind-specific progress (sparkle trail length)
    pub progress: f32,
    pub alpha: f32,
}

/// Sprite kind constants
pub mod sprite_kind {
    pub const AIR_BUBBLE: u32 = 0;
    pub const DEBRIS: u32 = 1;
    pub const SPARKLE: u32 = 2;
}

/// Ocean surface height at a world X.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable, Debug, PartialEq)]
pub struct OceanSlice {
    pub x: f32,
    pub y: f32,
}

/// Ocean floor height at a world X.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable, Debug, PartialEq)]
pub struct LandSlice {
    pub x: f32,
    pub y: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_sizes_are_packed() {
        assert_eq!(std::mem::size_of::<PointVertex>(), 48);
        assert_eq!(std::mem::size_of::<SpringElement>(), 8);
        assert_eq!(std::mem::size_of::<TriangleElement>(), 12);
        assert_eq!(std::mem::size_of::<FlameInstance>(), 24);
        assert_eq!(std::mem::size_of::<EphemeralSprite>(), 32);
    }
}
