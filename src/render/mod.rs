//! Renderer interface.
//!
//! The simulation pushes pre-computed vertex data through [`RenderSink`] and
//! never reads anything back. [`FrameBuffers`] is the sink used by the Bevy
//! app: it keeps the latest frame so a graphics backend (or a test) can pick
//! up the raw bytes.

use std::collections::BTreeMap;

use bevy::prelude::*;

use crate::resources::{
    EphemeralSprite, FlameInstance, LandSlice, OceanSlice, PointVertex, SpringElement,
    TriangleElement,
};
use crate::simulation::WorldState;

/// Everything a ship uploads in one frame.
#[derive(Debug, Clone, Copy)]
pub struct ShipRenderData<'a> {
    /// One vertex per point, indexed by point index
    pub points: &'a [PointVertex],
    /// Orphaned points, drawn as dots
    pub point_elements: &'a [u32],
    pub springs: &'a [SpringElement],
    pub ropes: &'a [SpringElement],
    pub triangles: &'a [TriangleElement],
    /// Flames sorted by plane id
    pub flames: &'a [FlameInstance],
    pub ephemeral: &'a [EphemeralSprite],
    /// Current wind speed (km/h), used to bend flames
    pub wind_speed_magnitude: f32,
}

/// Write-only renderer API.
pub trait RenderSink {
    fn upload_land(&mut self, slices: &[LandSlice]);

    fn upload_ocean(&mut self, slices: &[OceanSlice]);

    fn upload_ship(&mut self, ship_id: usize, data: ShipRenderData<'_>);
}

/// Owned copy of one ship's render data.
#[derive(Debug, Clone, Default)]
pub struct ShipFrame {
    pub points: Vec<PointVertex>,
    pub point_elements: Vec<u32>,
    pub springs: Vec<SpringElement>,
    pub ropes: Vec<SpringElement>,
    pub triangles: Vec<TriangleElement>,
    pub flames: Vec<FlameInstance>,
    pub ephemeral: Vec<EphemeralSprite>,
    pub wind_speed_magnitude: f32,
}

impl ShipFrame {
    pub fn point_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.points)
    }

    pub fn spring_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.springs)
    }

    pub fn triangle_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.triangles)
    }
}

/// Recording sink holding the most recent frame.
#[derive(Resource, Debug, Default)]
pub struct FrameBuffers {
    land: Vec<LandSlice>,
    ocean: Vec<OceanSlice>,
    ships: BTreeMap<usize, ShipFrame>,
}

impl FrameBuffers {
    pub fn land(&self) -> &[LandSlice] {
        &self.land
    }

    pub fn ocean(&self) -> &[OceanSlice] {
        &self.ocean
    }

    pub fn ocean_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.ocean)
    }

    pub fn ship(&self, ship_id: usize) -> Option<&ShipFrame> {
        self.ships.get(&ship_id)
    }

    pub fn ship_count(&self) -> usize {
        self.ships.len()
    }
}

impl RenderSink for FrameBuffers {
    fn upload_land(&mut self, slices: &[LandSlice]) {
        self.land.clear();
        self.land.extend_from_slice(slices);
    }

    fn upload_ocean(&mut self, slices: &[OceanSlice]) {
        self.ocean.clear();
        self.ocean.extend_from_slice(slices);
    }

    fn upload_ship(&mut self, ship_id: usize, data: ShipRenderData<'_>) {
        let frame = self.ships.entry(ship_id).or_default();
        frame.points.clear();
        frame.points.extend_from_slice(data.points);
        frame.point_elements.clear();
        frame.point_elements.extend_from_slice(data.point_elements);
        frame.springs.clear();
        frame.springs.extend_from_slice(data.springs);
        frame.ropes.clear();
        frame.ropes.extend_from_slice(data.ropes);
        frame.triangles.clear();
        frame.triangles.extend_from_slice(data.triangles);
        frame.flames.clear();
        frame.flames.extend_from_slice(data.flames);
        frame.ephemeral.clear();
        frame.ephemeral.extend_from_slice(data.ephemeral);
        frame.wind_speed_magnitude = data.wind_speed_magnitude;
    }
}

/// World-space horizontal range currently on screen.
#[derive(Resource, Debug, Clone, Copy)]
pub struct Viewport {
    pub left: f32,
    pub right: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            left: -100.0,
            right: 100.0,
        }
    }
}

/// Plugin that uploads the world into [`FrameBuffers`] once per frame.
pub struct FrameUploadPlugin;

impl Plugin for FrameUploadPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<FrameBuffers>()
            .init_resource::<Viewport>()
            .add_systems(Update, upload_frame);
    }
}

fn upload_frame(
    world: Option<Res<WorldState>>,
    viewport: Res<Viewport>,
    mut frame: ResMut<FrameBuffers>,
) {
    let Some(world) = world else {
        return;
    };
    world.0.render(viewport.left, viewport.right, &mut *frame);
}
