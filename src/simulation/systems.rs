//! Fixed-step systems: tool requests, world stepping and event logging.

use bevy::log::{debug, info};
use bevy::prelude::*;

use crate::simulation::events::GameEvent;
use crate::simulation::input::{InteractionQueue, ToolRequest};
use crate::simulation::physics_config::GameParameters;
use crate::simulation::setup::EventLog;
use crate::simulation::world::{World, WorldState};

/// Log world statistics every this many fixed steps
const STATS_LOG_INTERVAL: u64 = 250;

/// Apply queued tool requests before stepping.
pub fn apply_interactions(
    mut world: ResMut<WorldState>,
    mut queue: ResMut<InteractionQueue>,
    parameters: Res<GameParameters>,
) {
    if queue.is_empty() {
        return;
    }
    for request in queue.drain() {
        let applied = apply_request(&mut world.0, &request, &parameters);
        debug!("{:?} -> {}", request, applied);
    }
}

/// Apply one request; returns whether it affected anything.
pub fn apply_request(world: &mut World, request: &ToolRequest, parameters: &GameParameters) -> bool {
    match *request {
        ToolRequest::Destroy {
            position,
            radius_multiplier,
        } => world.destroy_at(position, radius_multiplier, parameters),
        ToolRequest::Repair {
            position,
            radius_multiplier,
        } => world.repair_at(position, radius_multiplier, parameters),
        ToolRequest::Saw { start, end } => world.saw_through(start, end, parameters),
        ToolRequest::HeatBlaster { position, action } => world.apply_heat_blaster_at(position, action, parameters),
        ToolRequest::ExtinguishFire { position } => world.extinguish_fire_at(position),
        ToolRequest::InjectBubbles { position } => world.inject_bubbles_at(position, parameters),
        ToolRequest::Flood {
            position,
            quantity_multiplier,
        } => world.flood_at(position, quantity_multiplier, parameters),
        ToolRequest::TogglePin { position } => world.toggle_pin_at(position),
        ToolRequest::SetSwitch {
            ship_id,
            element_index,
            is_on,
        } => world.set_switch_state(ship_id, element_index, is_on),
        ToolRequest::AdjustOceanSurface(target) => {
            world.adjust_ocean_surface_to(target);
            true
        }
        ToolRequest::AdjustOceanFloor { start, end } => world.adjust_ocean_floor_to(start.x, start.y, end.x, end.y),
        ToolRequest::Tsunami { from_left } => world.trigger_tsunami(from_left),
        ToolRequest::RogueWave { from_left } => world.trigger_rogue_wave(from_left),
    }
}

/// Advance the world by one simulation step.
pub fn step_world(mut world: ResMut<WorldState>, parameters: Res<GameParameters>) {
    world.0.update(&parameters);
}

/// Periodic world statistics.
pub fn log_world_stats(world: Res<WorldState>) {
    let world = &world.0;
    if world.current_step() % STATS_LOG_INTERVAL != 0 {
        return;
    }
    for ship in world.ships() {
        info!(
            "Step {} (t={:.1}s) ship {}: {} components, {} burning, water {:.1}{}",
            world.current_step(),
            world.current_simulation_time(),
            ship.id(),
            ship.connected_component_count(),
            ship.burning_point_count(),
            ship.total_water(),
            if ship.is_sinking() { ", sinking" } else { "" }
        );
    }
}

/// Forward recorded game events to the log.
pub fn drain_events(event_log: Res<EventLog>) {
    for event in event_log.0.drain() {
        match event {
            GameEvent::SinkingBegin { ship_id } => info!("Ship {} is sinking", ship_id),
            other => debug!("{:?}", other),
        }
    }
    let water_taken = event_log.0.drain_water_taken();
    if water_taken > 0.0 {
        debug!("Water taken: {:.3}", water_taken);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::simulation::events::NullEventHandler;
    use crate::simulation::materials::{builtin, MaterialDatabase};
    use crate::simulation::ship::ShipDefinition;

    #[test]
    fn requests_reach_the_world() {
        let parameters = GameParameters::default();
        let mut world = World::new(1, Arc::new(NullEventHandler), &parameters);
        let mut definition = ShipDefinition::new("block", 2, 2);
        for (x, y) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
            definition.set_structural(x, y, builtin::IRON_HULL);
        }
        world
            .add_ship(&definition.with_offset(Vec2::new(0.0, 10.0)), &MaterialDatabase::builtin(), &parameters)
            .unwrap();

        let pin = ToolRequest::TogglePin {
            position: Vec2::new(-1.0, 10.0),
        };
        assert!(apply_request(&mut world, &pin, &parameters));
        assert!(world.ship(0).unwrap().points().is_pinned(0));

        let miss = ToolRequest::Flood {
            position: Vec2::new(300.0, 300.0),
            quantity_multiplier: 1.0,
        };
        assert!(!apply_request(&mut world, &miss, &parameters));
    }

    #[test]
    fn fixed_step_systems_advance_the_world() {
        let mut app = App::new();
        let parameters = GameParameters::default();
        let world = World::new(1, Arc::new(NullEventHandler), &parameters);
        app.insert_resource(parameters)
            .insert_resource(WorldState(world))
            .init_resource::<InteractionQueue>()
            .init_resource::<EventLog>()
            .add_systems(Update, (apply_interactions, step_world, log_world_stats, drain_events).chain());

        app.world_mut()
            .resource_mut::<InteractionQueue>()
            .push(ToolRequest::Tsunami { from_left: true });
        app.update();
        app.update();

        let world = &app.world().resource::<WorldState>().0;
        assert_eq!(world.current_step(), 2);
        assert!(app.world().resource::<InteractionQueue>().is_empty());
    }
}
