//! Simulation module - structural, fluid, thermal and combustion physics for
//! destructible ships on a shallow-water ocean.

pub mod electrical;
pub mod events;
pub mod input;
pub mod materials;
pub mod numerics;
pub mod ocean_floor;
pub mod ocean_surface;
pub mod physics_config;
pub mod points;
pub mod scenarios;
pub mod setup;
pub mod ship;
pub mod springs;
pub mod systems;
pub mod triangles;
pub mod wind;
pub mod world;

use bevy::prelude::*;

pub use events::{EventRecorder, GameEvent, GameEventHandler, NullEventHandler, SharedEventHandler};
pub use input::{InteractionQueue, ToolRequest};
pub use materials::MaterialDatabase;
pub use physics_config::{GameParameters, SIMULATION_STEP_TIME_DURATION};
pub use setup::EventLog;
pub use ship::{HeatBlasterAction, Ship, ShipDefinition, ShipId};
pub use world::{World, WorldState};

/// Plugin that owns the world and steps it at the fixed simulation rate.
///
/// Parameters and materials already inserted by the app are kept.
pub struct SimulationPlugin;

impl Plugin for SimulationPlugin {
    fn build(&self, app: &mut App) {
        if !app.world().contains_resource::<GameParameters>() {
            app.insert_resource(GameParameters::default());
        }
        if !app.world().contains_resource::<MaterialDatabase>() {
            app.insert_resource(MaterialDatabase::builtin());
        }

        app.init_resource::<EventLog>()
            .init_resource::<InteractionQueue>()
            .insert_resource(Time::<Fixed>::from_seconds(SIMULATION_STEP_TIME_DURATION as f64))
            .add_systems(Startup, setup::setup_world)
            .add_systems(
                FixedUpdate,
                (
                    systems::apply_interactions,
                    systems::step_world,
                    systems::log_world_stats,
                    systems::drain_events,
                )
                    .chain(),
            );
    }
}
