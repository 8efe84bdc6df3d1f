//! Test Scenarios for the Wreckage Simulation
//!
//! To switch scenarios, change the call in `selected_scenario()`.

use bevy::prelude::Vec2;

use crate::simulation::materials::builtin;
use crate::simulation::ship::ShipDefinition;

// ==================== SCENARIO SELECTION ====================
// Each scenario returns a ship definition built from the builtin
// material catalog.
// =============================================================

/// Main entry point - returns the selected scenario
pub fn selected_scenario() -> ShipDefinition {
    scenario_dry_dock()
    // scenario_chain()
    // scenario_raft()
}

// ==================== SCENARIO CONFIGS ====================

pub mod config {
    // Hull Configuration
    pub const HULL_WIDTH: usize = 24;
    pub const HULL_HEIGHT: usize = 6;
    pub const HULL_START_Y: f32 = 2.0;

    // Mast Configuration
    pub const MAST_X: usize = 12;
    pub const MAST_HEIGHT: usize = 10;

    // Chain Configuration
    pub const CHAIN_LENGTH: usize = 10;
    pub const CHAIN_START_Y: f32 = 40.0;
}

// ==================== SCENARIOS ====================

/// Scenario: Dry Dock
/// Iron-hulled boat with a wooden deck, a mast with a rope stay, and a
/// generator feeding a lamp through a switch.
pub fn scenario_dry_dock() -> ShipDefinition {
    use config::*;

    let width = HULL_WIDTH;
    let height = HULL_HEIGHT + MAST_HEIGHT;
    let mut ship = ShipDefinition::new("Dry Dock", width, height);

    // Hull: iron keel and sides, wooden interior
    for y in 0..HULL_HEIGHT {
        // Taper the bottom rows inward
        let inset = HULL_HEIGHT.saturating_sub(y + 3);
        for x in inset..width - inset {
            let is_shell = y == 0 || x == inset || x == width - inset - 1;
            ship.set_structural(x, y, if is_shell { builtin::IRON_HULL } else { builtin::WOOD });
        }
    }

    // Mast
    for y in HULL_HEIGHT..height {
        ship.set_structural(MAST_X, y, builtin::WOOD);
    }

    // Stay from the masthead down to the bow
    let stay_top = height - 1;
    for step in 1..(width - 1 - MAST_X) {
        let (x, y) = (MAST_X + step, stay_top - step);
        if y < HULL_HEIGHT {
            break;
        }
        ship.set_structural(x, y, builtin::ROPE);
    }

    // Wiring along the deck
    let deck = HULL_HEIGHT - 1;
    ship.set_electrical(2, deck, builtin::GENERATOR);
    for x in 3..8 {
        ship.set_electrical(x, deck, builtin::CABLE);
    }
    ship.set_electrical(8, deck, builtin::SWITCH);
    for x in 9..MAST_X {
        ship.set_electrical(x, deck, builtin::CABLE);
    }
    ship.set_electrical(MAST_X, deck, builtin::CABLE);
    ship.set_electrical(MAST_X, deck + 1, builtin::LAMP);

    ship.with_offset(Vec2::new(0.0, HULL_START_Y))
}

/// Scenario: Chain
/// A single row of iron points hanging in the air. Good for tuning springs
/// and breakage.
#[allow(dead_code)]
pub fn scenario_chain() -> ShipDefinition {
    use config::*;

    let mut ship = ShipDefinition::new("Chain", CHAIN_LENGTH, 1);
    for x in 0..CHAIN_LENGTH {
        ship.set_structural(x, 0, builtin::IRON_HULL);
    }
    ship.with_offset(Vec2::new(0.0, CHAIN_START_Y))
}

/// Scenario: Raft
/// Leaky wooden raft. Takes water, emits bubbles and eventually sinks.
#[allow(dead_code)]
pub fn scenario_raft() -> ShipDefinition {
    let mut ship = ShipDefinition::new("Raft", 8, 2);
    for y in 0..2 {
        for x in 0..8 {
            ship.set_structural(x, y, builtin::WOOD);
        }
    }
    ship
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::simulation::events::NullEventHandler;
    use crate::simulation::materials::MaterialDatabase;
    use crate::simulation::physics_config::GameParameters;
    use crate::simulation::ship::Ship;

    fn build(definition: &ShipDefinition) -> Ship {
        Ship::build(
            0,
            definition,
            &MaterialDatabase::builtin(),
            &GameParameters::default(),
            Arc::new(NullEventHandler),
            42,
        )
        .unwrap()
    }

    #[test]
    fn every_scenario_builds_as_one_piece() {
        for definition in [scenario_dry_dock(), scenario_chain(), scenario_raft()] {
            let ship = build(&definition);
            assert_eq!(ship.connected_component_count(), 1, "{} is split", definition.name);
        }
    }

    #[test]
    fn dry_dock_is_wired() {
        let ship = build(&scenario_dry_dock());
        assert!(ship.electrical().len() > 10);
        assert!(ship.springs().active().any(|s| ship.springs().is_rope(s)));
    }

    #[test]
    fn chain_is_a_line() {
        let ship = build(&scenario_chain());
        assert_eq!(ship.points().ship_point_count(), config::CHAIN_LENGTH);
        assert_eq!(ship.springs().len(), config::CHAIN_LENGTH - 1);
        assert!(ship.triangles().is_empty());
    }
}
