//! A ship: points, springs, triangles and electrical elements, plus the
//! per-step pipeline that runs over them.

mod builder;
mod dynamics;
mod render;
mod structure;
mod tools;

use std::sync::Arc;

use bevy::log::info;

pub use builder::ShipDefinition;
pub use tools::HeatBlasterAction;

use super::electrical::ElectricalElements;
use super::events::SharedEventHandler;
use super::materials::StructuralMaterial;
use super::ocean_floor::OceanFloor;
use super::ocean_surface::OceanSurface;
use super::physics_config::{
    GameParameters, LOW_FREQUENCY_SIMULATION_STEP_TIME_DURATION, LOW_FREQUENCY_STRIDE,
    SIMULATION_STEP_TIME_DURATION,
};
use super::points::Points;
use super::springs::Springs;
use super::triangles::Triangles;
use super::wind::Wind;

pub type ShipId = usize;

/// World state a ship reads during its update.
#[derive(Clone, Copy)]
pub struct Environment<'a> {
    pub ocean_surface: &'a OceanSurface,
    pub ocean_floor: &'a OceanFloor,
    pub wind: &'a Wind,
}

pub struct Ship {
    id: ShipId,
    name: String,

    points: Points,
    springs: Springs,
    triangles: Triangles,
    electrical: ElectricalElements,

    events: SharedEventHandler,
    air_bubble_material: Arc<StructuralMaterial>,

    current_step: u64,
    current_connectivity_visit_sequence: u64,
    connected_component_count: usize,
    is_structure_dirty: bool,
    is_sinking: bool,

    // Two-phase write buffers
    temperature_scratch: Vec<f32>,
    water_scratch: Vec<f32>,
}

impl Ship {
    pub fn id(&self) -> ShipId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn points(&self) -> &Points {
        &self.points
    }

    pub fn points_mut(&mut self) -> &mut Points {
        &mut self.points
    }

    pub fn springs(&self) -> &Springs {
        &self.springs
    }

    pub fn triangles(&self) -> &Triangles {
        &self.triangles
    }

    pub fn electrical(&self) -> &ElectricalElements {
        &self.electrical
    }

    pub fn connected_component_count(&self) -> usize {
        self.connected_component_count
    }

    pub fn is_sinking(&self) -> bool {
        self.is_sinking
    }

    pub fn current_step(&self) -> u64 {
        self.current_step
    }

    /// Total water held by ship points.
    pub fn total_water(&self) -> f32 {
        self.points.ship_points().map(|p| self.points.water(p)).sum()
    }

    /// Advance the ship by one simulation step.
    ///
    /// Order matters: forces and integration, then breakage and connectivity,
    /// then water, electrical, heat and combustion, then ephemeral particles.
    pub fn update(&mut self, current_simulation_time: f32, environment: &Environment<'_>, parameters: &GameParameters) {
        let ocean_surface = environment.ocean_surface;

        // Parameters
        self.points.update_for_game_parameters(parameters);
        self.springs.update_for_game_parameters(parameters, &self.points);

        // Mechanics
        self.update_mechanical_dynamics(environment, parameters);
        self.update_spring_strains(current_simulation_time, ocean_surface, parameters);
        if self.is_structure_dirty {
            self.run_connectivity_visit();
        }

        // Water
        self.update_water_dynamics(current_simulation_time, ocean_surface, parameters);
        self.points.update_masses(parameters);

        // Electrics
        self.electrical.update(
            current_simulation_time,
            SIMULATION_STEP_TIME_DURATION,
            &mut self.points,
            ocean_surface,
            self.events.as_ref(),
        );
        self.electrical.diffuse_light(&mut self.points, parameters);

        // Heat and combustion
        self.update_heat_dynamics(ocean_surface, parameters);
        let low_frequency_offset = (self.current_step % LOW_FREQUENCY_STRIDE as u64) as usize;
        self.points.update_combustion_low_frequency(
            low_frequency_offset,
            LOW_FREQUENCY_STRIDE,
            LOW_FREQUENCY_SIMULATION_STEP_TIME_DURATION,
            ocean_surface,
            parameters,
        );
        self.points
            .update_combustion_high_frequency(SIMULATION_STEP_TIME_DURATION, ocean_surface, parameters);
        self.rot_points(low_frequency_offset, ocean_surface, parameters);

        // Ephemeral particles
        self.points.update_ephemeral_particles(current_simulation_time, ocean_surface);

        self.update_sinking(ocean_surface);

        self.current_step += 1;
    }

    fn update_sinking(&mut self, ocean_surface: &OceanSurface) {
        let ship_point_count = self.points.ship_point_count();
        let underwater_count = self
            .points
            .ship_points()
            .filter(|&p| self.points.is_underwater(p, ocean_surface))
            .count();

        if !self.is_sinking && underwater_count * 2 > ship_point_count {
            self.is_sinking = true;
            info!("Ship {} '{}' is sinking", self.id, self.name);
            self.events.on_sinking_begin(self.id);
        } else if self.is_sinking && underwater_count * 10 < ship_point_count {
            self.is_sinking = false;
        }
    }
}
