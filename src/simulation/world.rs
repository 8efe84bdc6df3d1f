//! The world: ocean, wind and every ship, stepped together.
//!
//! [`World`] owns the environment and the ships and is the single entry point
//! for stepping, rendering and interactive tools. Tools address every ship at
//! once, except where a [`ShipId`] is given.

use bevy::log::{debug, info, warn};
use bevy::prelude::{Resource, Vec2};

use crate::error::ShipBuildError;
use crate::render::RenderSink;
use crate::simulation::events::SharedEventHandler;
use crate::simulation::materials::MaterialDatabase;
use crate::simulation::ocean_floor::OceanFloor;
use crate::simulation::ocean_surface::OceanSurface;
use crate::simulation::physics_config::{GameParameters, SIMULATION_STEP_TIME_DURATION};
use crate::simulation::points::ElementIndex;
use crate::simulation::ship::{Environment, HeatBlasterAction, Ship, ShipDefinition, ShipId};
use crate::simulation::wind::Wind;

pub struct World {
    current_simulation_time: f32,
    current_step: u64,
    seed: u64,
    wind: Wind,
    ocean_surface: OceanSurface,
    ocean_floor: OceanFloor,
    ships: Vec<Ship>,
    events: SharedEventHandler,
}

/// The world as a Bevy resource.
#[derive(Resource)]
pub struct WorldState(pub World);

impl World {
    pub fn new(seed: u64, events: SharedEventHandler, parameters: &GameParameters) -> Self {
        let mut ocean_floor = OceanFloor::new();
        ocean_floor.update(parameters);

        info!("World created (seed {}, sea depth {})", seed, parameters.sea_depth);

        Self {
            current_simulation_time: 0.0,
            current_step: 0,
            seed,
            wind: Wind::new(seed),
            ocean_surface: OceanSurface::new(),
            ocean_floor,
            ships: Vec::new(),
            events,
        }
    }

    /// Build a ship from `definition` and add it to the world.
    pub fn add_ship(
        &mut self,
        definition: &ShipDefinition,
        materials: &MaterialDatabase,
        parameters: &GameParameters,
    ) -> Result<ShipId, ShipBuildError> {
        let ship_id = self.ships.len();
        let ship_seed = self.seed ^ (ship_id as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15);
        let ship = Ship::build(ship_id, definition, materials, parameters, self.events.clone(), ship_seed)?;

        info!(
            "Ship {} '{}' added: {} points, {} springs, {} triangles",
            ship_id,
            ship.name(),
            ship.points().ship_point_count(),
            ship.springs().len(),
            ship.triangles().len()
        );
        self.ships.push(ship);
        Ok(ship_id)
    }

    /// Advance the whole world by one simulation step.
    pub fn update(&mut self, parameters: &GameParameters) {
        self.current_simulation_time += SIMULATION_STEP_TIME_DURATION;
        self.current_step += 1;
        let current_simulation_time = self.current_simulation_time;

        self.wind.update(current_simulation_time, parameters);
        self.ocean_surface.update(current_simulation_time, &self.wind, parameters);
        self.ocean_floor.update(parameters);

        let environment = Environment {
            ocean_surface: &self.ocean_surface,
            ocean_floor: &self.ocean_floor,
            wind: &self.wind,
        };
        for ship in &mut self.ships {
            ship.update(current_simulation_time, &environment, parameters);
        }
    }

    /// Upload the visible slice of the world to `sink`.
    pub fn render(&self, visible_left: f32, visible_right: f32, sink: &mut dyn RenderSink) {
        self.ocean_floor.upload(visible_left, visible_right, sink);
        self.ocean_surface.upload(visible_left, visible_right, sink);

        let wind_speed_magnitude = self.wind.current_speed_magnitude();
        for ship in &self.ships {
            ship.render(wind_speed_magnitude, sink);
        }
    }

    // ==================== QUERIES ====================

    pub fn current_simulation_time(&self) -> f32 {
        self.current_simulation_time
    }

    pub fn current_step(&self) -> u64 {
        self.current_step
    }

    pub fn ship(&self, ship_id: ShipId) -> Option<&Ship> {
        self.ships.get(ship_id)
    }

    pub fn ship_mut(&mut self, ship_id: ShipId) -> Option<&mut Ship> {
        self.ships.get_mut(ship_id)
    }

    pub fn ships(&self) -> &[Ship] {
        &self.ships
    }

    pub fn wind(&self) -> &Wind {
        &self.wind
    }

    pub fn ocean_surface(&self) -> &OceanSurface {
        &self.ocean_surface
    }

    pub fn ocean_floor(&self) -> &OceanFloor {
        &self.ocean_floor
    }

    pub fn is_underwater(&self, position: Vec2) -> bool {
        self.ocean_surface.is_underwater(position)
    }

    pub fn ocean_surface_height_at(&self, x: f32) -> f32 {
        self.ocean_surface.height_at(x)
    }

    pub fn ocean_floor_height_at(&self, x: f32) -> f32 {
        self.ocean_floor.height_at(x)
    }

    // ==================== OCEAN ====================

    /// Drag the ocean surface toward `target`, or release it with `None`.
    pub fn adjust_ocean_surface_to(&mut self, target: Option<Vec2>) {
        self.ocean_surface.adjust_to(target, self.current_simulation_time);
    }

    pub fn adjust_ocean_floor_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32) -> bool {
        self.ocean_floor.adjust_to(x1, y1, x2, y2)
    }

    pub fn trigger_tsunami(&mut self, from_left: bool) -> bool {
        let triggered = self.ocean_surface.trigger_tsunami(from_left, self.current_simulation_time);
        if triggered {
            info!("Tsunami triggered from the {}", if from_left { "left" } else { "right" });
        }
        triggered
    }

    pub fn trigger_rogue_wave(&mut self, from_left: bool) -> bool {
        let triggered = self.ocean_surface.trigger_rogue_wave(from_left, self.current_simulation_time);
        if triggered {
            info!("Rogue wave triggered from the {}", if from_left { "left" } else { "right" });
        }
        triggered
    }

    // ==================== TOOLS ====================

    pub fn destroy_at(&mut self, position: Vec2, radius_multiplier: f32, parameters: &GameParameters) -> bool {
        let current_simulation_time = self.current_simulation_time;
        let ocean_surface = &self.ocean_surface;
        self.ships.iter_mut().fold(false, |any, ship| {
            ship.destroy_at(position, radius_multiplier, current_simulation_time, ocean_surface, parameters) || any
        })
    }

    pub fn repair_at(&mut self, position: Vec2, radius_multiplier: f32, parameters: &GameParameters) -> bool {
        let ocean_surface = &self.ocean_surface;
        self.ships.iter_mut().fold(false, |any, ship| {
            ship.repair_at(position, radius_multiplier, ocean_surface, parameters) || any
        })
    }

    pub fn saw_through(&mut self, start: Vec2, end: Vec2, parameters: &GameParameters) -> bool {
        let current_simulation_time = self.current_simulation_time;
        let ocean_surface = &self.ocean_surface;
        self.ships.iter_mut().fold(false, |any, ship| {
            ship.saw_through(start, end, current_simulation_time, ocean_surface, parameters) || any
        })
    }

    pub fn apply_heat_blaster_at(
        &mut self,
        position: Vec2,
        action: HeatBlasterAction,
        parameters: &GameParameters,
    ) -> bool {
        let radius = parameters.heat_blaster_radius;
        self.ships.iter_mut().fold(false, |any, ship| {
            ship.apply_heat_blaster_at(position, action, radius, parameters) || any
        })
    }

    pub fn extinguish_fire_at(&mut self, position: Vec2) -> bool {
        self.ships
            .iter_mut()
            .fold(false, |any, ship| ship.extinguish_fire_at(position) || any)
    }

    /// Inject air bubbles into the first ship, if any; bubbles belong to a ship.
    pub fn inject_bubbles_at(&mut self, position: Vec2, parameters: &GameParameters) -> bool {
        let current_simulation_time = self.current_simulation_time;
        let Some(ship) = self.ships.first_mut() else {
            return false;
        };
        ship.inject_bubbles_at(position, current_simulation_time, &self.ocean_surface, parameters)
    }

    pub fn flood_at(&mut self, position: Vec2, water_quantity_multiplier: f32, parameters: &GameParameters) -> bool {
        self.ships.iter_mut().fold(false, |any, ship| {
            ship.flood_at(position, water_quantity_multiplier, parameters) || any
        })
    }

    /// Toggle the pin of the nearest point, stopping at the first ship that has one.
    pub fn toggle_pin_at(&mut self, position: Vec2) -> bool {
        self.ships.iter_mut().any(|ship| ship.toggle_pin_at(position))
    }

    /// The nearest ship point within `radius`, across all ships.
    pub fn query_nearest_point_at(&self, position: Vec2, radius: f32) -> Option<(ShipId, ElementIndex)> {
        self.ships
            .iter()
            .filter_map(|ship| {
                ship.query_nearest_point_at(position, radius).map(|p| {
                    let distance = ship.points().position(p).distance_squared(position);
                    (ship.id(), p, distance)
                })
            })
            .min_by(|a, b| a.2.total_cmp(&b.2))
            .map(|(ship_id, point_index, _)| (ship_id, point_index))
    }

    pub fn set_switch_state(&mut self, ship_id: ShipId, element_index: ElementIndex, is_on: bool) -> bool {
        let Some(ship) = self.ships.get_mut(ship_id) else {
            warn!("set_switch_state: no ship with id {}", ship_id);
            return false;
        };
        let changed = ship.set_switch_state(element_index, is_on);
        if changed {
            debug!("Ship {}: switch {} turned {}", ship_id, element_index, if is_on { "on" } else { "off" });
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::FrameBuffers;
    use crate::simulation::events::{EventRecorder, NullEventHandler};
    use crate::simulation::materials::builtin;
    use std::sync::Arc;

    fn raft(width: usize, height: usize) -> ShipDefinition {
        let mut definition = ShipDefinition::new("raft", width, height);
        for y in 0..height {
            for x in 0..width {
                definition.set_structural(x, y, builtin::IRON_HULL);
            }
        }
        definition
    }

    #[test]
    fn update_advances_time_and_steps() {
        let parameters = GameParameters::default();
        let mut world = World::new(3, Arc::new(NullEventHandler), &parameters);
        for _ in 0..10 {
            world.update(&parameters);
        }
        assert_eq!(world.current_step(), 10);
        assert!((world.current_simulation_time() - 10.0 * SIMULATION_STEP_TIME_DURATION).abs() < 1e-5);
    }

    #[test]
    fn ships_get_sequential_ids() {
        let parameters = GameParameters::default();
        let materials = MaterialDatabase::builtin();
        let mut world = World::new(3, Arc::new(NullEventHandler), &parameters);
        let first = world.add_ship(&raft(2, 2), &materials, &parameters).unwrap();
        let second = world
            .add_ship(&raft(3, 1).with_offset(Vec2::new(20.0, 0.0)), &materials, &parameters)
            .unwrap();
        assert_eq!((first, second), (0, 1));
        assert_eq!(world.ships().len(), 2);
        assert_eq!(world.ship(1).map(|s| s.points().ship_point_count()), Some(3));
    }

    #[test]
    fn failed_build_adds_nothing() {
        let parameters = GameParameters::default();
        let mut world = World::new(3, Arc::new(NullEventHandler), &parameters);
        let empty = ShipDefinition::new("empty", 2, 2);
        assert!(world.add_ship(&empty, &MaterialDatabase::builtin(), &parameters).is_err());
        assert!(world.ships().is_empty());
    }

    #[test]
    fn render_uploads_land_ocean_and_ships() {
        let parameters = GameParameters::default();
        let mut world = World::new(3, Arc::new(NullEventHandler), &parameters);
        world.add_ship(&raft(2, 2), &MaterialDatabase::builtin(), &parameters).unwrap();
        world.update(&parameters);

        let mut frame = FrameBuffers::default();
        world.render(-50.0, 50.0, &mut frame);
        assert!(!frame.land().is_empty());
        assert!(!frame.ocean().is_empty());
        assert_eq!(frame.ship_count(), 1);
    }

    #[test]
    fn destroy_tool_reaches_the_ship_under_the_cursor() {
        let parameters = GameParameters::default();
        let recorder = EventRecorder::new();
        let mut world = World::new(3, recorder.clone(), &parameters);
        world
            .add_ship(&raft(4, 2).with_offset(Vec2::new(0.0, 20.0)), &MaterialDatabase::builtin(), &parameters)
            .unwrap();

        assert!(!world.destroy_at(Vec2::new(500.0, 500.0), 1.0, &parameters));
        let (ship_id, point_index) = world.query_nearest_point_at(Vec2::new(0.0, 20.0), 1.0).unwrap();
        let target = world.ship(ship_id).unwrap().points().position(point_index);
        assert!(world.destroy_at(target, 1.0, &parameters));
        assert!(recorder.count(|e| matches!(e, crate::simulation::events::GameEvent::Destroy { .. })) > 0);
    }

    #[test]
    fn unknown_ship_switch_is_ignored() {
        let parameters = GameParameters::default();
        let mut world = World::new(3, Arc::new(NullEventHandler), &parameters);
        assert!(!world.set_switch_state(7, 0, true));
    }
}
