//! Physics Regression Tests
//!
//! These tests drive whole worlds through the public API and verify that the
//! structural solver stays stable, breaks where it should and is reproducible.
//!
//! # Running tests
//! ```bash
//! cargo test physics_regression
//! ```

use std::sync::Arc;

use bevy::prelude::Vec2;
use proptest::prelude::*;
use wreckage::simulation::materials::builtin;
use wreckage::simulation::scenarios::{scenario_chain, scenario_dry_dock, scenario_raft};
use wreckage::simulation::{
    EventRecorder, GameEvent, GameParameters, MaterialDatabase, NullEventHandler, Ship, ShipDefinition, World,
};

// ==================== UNIVERSAL CONSTANTS ====================

/// Maximum velocity threshold - anything above this is an "explosion"
const EXPLOSION_VELOCITY_THRESHOLD: f32 = 500.0;

const SEED: u64 = 7;

// ==================== HELPER FUNCTIONS ====================

fn world_with(definition: &ShipDefinition, parameters: &GameParameters) -> World {
    let mut world = World::new(SEED, Arc::new(NullEventHandler), parameters);
    world
        .add_ship(definition, &MaterialDatabase::builtin(), parameters)
        .expect("scenario builds");
    world
}

fn run(world: &mut World, parameters: &GameParameters, steps: usize) {
    for _ in 0..steps {
        world.update(parameters);
    }
}

/// Assert that every ship point is finite and below the explosion threshold.
fn assert_no_explosion(ship: &Ship) {
    let points = ship.points();
    for p in points.ship_points() {
        let position = points.position(p);
        let velocity = points.velocity(p);
        assert!(position.is_finite(), "point {} has non-finite position {:?}", p, position);
        assert!(
            velocity.length() < EXPLOSION_VELOCITY_THRESHOLD,
            "point {} exploded with speed {}",
            p,
            velocity.length()
        );
    }
}

/// Assert the per-point invariants that must hold after any step.
fn assert_point_invariants(ship: &Ship) {
    let points = ship.points();
    for p in points.ship_points() {
        assert!(points.mass(p) > 0.0, "point {} has mass {}", p, points.mass(p));
        let decay = points.decay(p);
        assert!((0.0..=1.0).contains(&decay), "point {} has decay {}", p, decay);
        assert!(points.water(p) >= 0.0, "point {} has water {}", p, points.water(p));
    }
}

// ==================== TESTS ====================

#[test]
fn test_dry_dock_is_stable() {
    let parameters = GameParameters::default();
    let mut world = world_with(&scenario_dry_dock(), &parameters);
    run(&mut world, &parameters, 300);

    let ship = &world.ships()[0];
    assert_no_explosion(ship);
    assert_point_invariants(ship);
    assert_eq!(ship.connected_component_count(), 1, "dry dock broke apart on calm water");
}

#[test]
fn test_overstretched_chain_breaks_in_two() {
    let parameters = GameParameters::default();
    let recorder = EventRecorder::new();
    let mut world = World::new(SEED, recorder.clone(), &parameters);
    let ship_id = world
        .add_ship(&scenario_chain(), &MaterialDatabase::builtin(), &parameters)
        .unwrap();

    let middle = world.ship(ship_id).unwrap().springs().find(4, 5).unwrap();

    // Pull the right half of the chain away, well past the breaking strain,
    // and freeze everything so only the middle link is strained
    {
        let points = world.ship_mut(ship_id).unwrap().points_mut();
        for p in 5..10 {
            let position = points.position(p);
            points.set_position(p, position + Vec2::new(3.0, 0.0));
        }
        for p in 0..10 {
            points.pin(p);
        }
    }
    world.update(&parameters);

    let ship = world.ship(ship_id).unwrap();
    assert!(ship.springs().is_deleted(middle));
    assert!(!ship.points().connected_springs(4).contains(middle));
    assert!(!ship.points().connected_springs(5).contains(middle));
    assert_eq!(ship.connected_component_count(), 2);
    assert_ne!(
        ship.points().connected_component_id(4),
        ship.points().connected_component_id(5)
    );
    assert_eq!(recorder.count(|e| matches!(e, GameEvent::Break { .. })), 1);

    // Every other link holds
    for (a, b) in (0..9).map(|p| (p, p + 1)).filter(|&(a, _)| a != 4) {
        let spring = ship.springs().find(a, b).unwrap();
        assert!(!ship.springs().is_deleted(spring), "spring {}-{} broke", a, b);
    }
}

#[test]
fn test_unstressed_chain_falls_intact() {
    let parameters = GameParameters::default();
    let mut world = world_with(&scenario_chain(), &parameters);
    let start_y = world.ships()[0].points().position(0).y;
    run(&mut world, &parameters, 50);

    let ship = &world.ships()[0];
    assert_eq!(ship.connected_component_count(), 1);
    assert!(ship.points().position(0).y < start_y, "chain did not fall");
    assert_no_explosion(ship);
}

#[test]
fn test_same_seed_is_bit_identical() {
    let parameters = GameParameters::default();
    let mut first = world_with(&scenario_dry_dock(), &parameters);
    let mut second = world_with(&scenario_dry_dock(), &parameters);
    run(&mut first, &parameters, 200);
    run(&mut second, &parameters, 200);

    let (a, b) = (first.ships()[0].points(), second.ships()[0].points());
    for p in 0..a.all_point_count() {
        assert_eq!(a.position(p).to_array(), b.position(p).to_array(), "point {} diverged", p);
        assert_eq!(a.water(p).to_bits(), b.water(p).to_bits(), "point {} water diverged", p);
    }
}

#[test]
fn test_leaky_raft_takes_water() {
    let parameters = GameParameters::default();
    let mut world = world_with(&scenario_raft(), &parameters);
    run(&mut world, &parameters, 500);

    let ship = &world.ships()[0];
    assert!(ship.total_water() > 0.0, "raft stayed dry");
    assert_point_invariants(ship);
}

#[test]
fn test_partial_toml_overrides_parameters() {
    let parameters = GameParameters::from_toml_str("sea_depth = 150.0\ndo_modulate_wind = false\n").unwrap();
    assert_eq!(parameters.sea_depth, 150.0);
    assert!(!parameters.do_modulate_wind);
    assert_eq!(parameters.max_burning_particles, GameParameters::default().max_burning_particles);

    let shallow = World::new(SEED, Arc::new(NullEventHandler), &parameters);
    let deep = World::new(SEED, Arc::new(NullEventHandler), &GameParameters::default());
    let difference = shallow.ocean_floor_height_at(0.0) - deep.ocean_floor_height_at(0.0);
    assert!((difference - 150.0).abs() < 1e-2, "floor moved by {}", difference);
}

#[test]
fn test_material_catalog_drives_build() {
    let mut definition = ShipDefinition::new("mixed", 2, 1);
    definition.set_structural(0, 0, builtin::IRON_HULL);
    definition.set_structural(1, 0, builtin::WOOD);
    let parameters = GameParameters::default();
    let world = world_with(&definition, &parameters);

    let points = world.ships()[0].points();
    assert!(points.is_hull(0));
    assert!(!points.is_hull(1));
    assert!(points.mass(0) > points.mass(1));
}

// ==================== PROPERTIES ====================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn prop_point_invariants_hold_for_any_parameters(
        stiffness in 0.5f32..2.0,
        strength in 0.2f32..3.0,
        water_density in 0.5f32..2.0,
        intake in 0.0f32..3.0,
        rot in 0.0f32..1000.0,
        wind in -60.0f32..60.0,
        steps in 20usize..80,
    ) {
        let parameters = GameParameters {
            spring_stiffness_adjustment: stiffness,
            spring_strength_adjustment: strength,
            water_density_adjustment: water_density,
            water_intake_adjustment: intake,
            rot_acceleration: rot,
            wind_speed_base: wind,
            ..GameParameters::default()
        };
        let mut world = world_with(&scenario_raft(), &parameters);
        run(&mut world, &parameters, steps);

        let points = world.ships()[0].points();
        for p in points.ship_points() {
            prop_assert!(points.mass(p) > 0.0);
            prop_assert!((0.0..=1.0).contains(&points.decay(p)));
            prop_assert!(points.position(p).is_finite());
        }
    }
}
