//! Interaction queue for tools.
//!
//! Tool requests are queued from anywhere in the app and applied to the
//! world at the start of the next fixed step.

use bevy::prelude::*;

use crate::simulation::points::ElementIndex;
use crate::simulation::ship::{HeatBlasterAction, ShipId};

/// One tool request against the world.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolRequest {
    Destroy { position: Vec2, radius_multiplier: f32 },
    Repair { position: Vec2, radius_multiplier: f32 },
    Saw { start: Vec2, end: Vec2 },
    HeatBlaster { position: Vec2, action: HeatBlasterAction },
    ExtinguishFire { position: Vec2 },
    InjectBubbles { position: Vec2 },
    Flood { position: Vec2, quantity_multiplier: f32 },
    TogglePin { position: Vec2 },
    SetSwitch { ship_id: ShipId, element_index: ElementIndex, is_on: bool },
    /// `None` releases the surface.
    AdjustOceanSurface(Option<Vec2>),
    AdjustOceanFloor { start: Vec2, end: Vec2 },
    Tsunami { from_left: bool },
    RogueWave { from_left: bool },
}

/// Resource holding tool requests not yet applied.
#[derive(Resource, Default, Debug)]
pub struct InteractionQueue {
    pending: Vec<ToolRequest>,
}

impl InteractionQueue {
    pub fn push(&mut self, request: ToolRequest) {
        self.pending.push(request);
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Take the queued requests in submission order.
    pub fn drain(&mut self) -> Vec<ToolRequest> {
        std::mem::take(&mut self.pending)
    }
}
