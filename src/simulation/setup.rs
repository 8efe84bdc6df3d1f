//! World initialization.

use bevy::log::{error, info};
use bevy::prelude::*;

use crate::simulation::events::EventRecorder;
use crate::simulation::materials::MaterialDatabase;
use crate::simulation::physics_config::GameParameters;
use crate::simulation::scenarios::selected_scenario;
use crate::simulation::world::{World, WorldState};

// ==================== SIMULATION CONFIG ====================
/// Seed for the world RNGs
pub const WORLD_SEED: u64 = 0x5EA_D06;
// =============================================================

/// Resource holding the recorder every ship reports its events to.
#[derive(Resource, Clone)]
pub struct EventLog(pub std::sync::Arc<EventRecorder>);

impl Default for EventLog {
    fn default() -> Self {
        Self(EventRecorder::new())
    }
}

/// Startup system: build the world and add the selected scenario ship.
pub fn setup_world(
    mut commands: Commands,
    parameters: Res<GameParameters>,
    materials: Res<MaterialDatabase>,
    event_log: Res<EventLog>,
) {
    let mut world = World::new(WORLD_SEED, event_log.0.clone(), &parameters);

    let definition = selected_scenario();
    match world.add_ship(&definition, &materials, &parameters) {
        Ok(ship_id) => info!("Scenario '{}' loaded as ship {}", definition.name, ship_id),
        Err(err) => error!("Scenario '{}' failed to build: {}", definition.name, err),
    }

    commands.insert_resource(WorldState(world));
}
