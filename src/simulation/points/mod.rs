//! Structure-of-arrays particle store.
//!
//! Every per-particle attribute lives in its own buffer indexed by the point
//! index. Ship points occupy `0..ship_point_count`; a fixed-size pool of
//! ephemeral particles (air bubbles, debris, sparkles) follows them and is
//! recycled in place, so indices stay stable for the life of the ship.

mod combustion;
mod ephemeral;

use std::sync::Arc;

use bevy::prelude::Vec2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub use combustion::{CombustionState, CombustionStateType};
pub use ephemeral::{AirBubbleState, EphemeralState, EphemeralType, SparkleState};

use super::events::SharedEventHandler;
use super::materials::StructuralMaterial;
use super::ocean_surface::OceanSurface;
use super::physics_config::{GameParameters, INITIAL_TEMPERATURE, MAX_SPRINGS_PER_POINT, MAX_TRIANGLES_PER_POINT};
use super::springs::Springs;

pub type ElementIndex = usize;
pub type PlaneId = u32;
pub type ConnectedComponentId = u32;

// ==================== CONNECTIVITY LISTS ====================

/// A spring as seen from one of its endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectedSpring {
    pub spring_index: ElementIndex,
    pub other_endpoint_index: ElementIndex,
}

/// Springs connected to a point. Springs this point owns (for rendering and
/// iteration without duplicates) are kept at the front.
#[derive(Debug, Clone, Default)]
pub struct ConnectedSprings {
    springs: Vec<ConnectedSpring>,
    owned_count: usize,
}

impl ConnectedSprings {
    pub fn connect(&mut self, spring_index: ElementIndex, other_endpoint_index: ElementIndex, is_owner: bool) {
        debug_assert!(self.springs.len() < MAX_SPRINGS_PER_POINT);
        let entry = ConnectedSpring {
            spring_index,
            other_endpoint_index,
        };
        if is_owner {
            self.springs.insert(self.owned_count, entry);
            self.owned_count += 1;
        } else {
            self.springs.push(entry);
        }
    }

    /// Returns false when the spring was not connected.
    pub fn disconnect(&mut self, spring_index: ElementIndex) -> bool {
        let Some(position) = self.springs.iter().position(|s| s.spring_index == spring_index) else {
            return false;
        };
        self.springs.remove(position);
        if position < self.owned_count {
            self.owned_count -= 1;
        }
        true
    }

    pub fn contains(&self, spring_index: ElementIndex) -> bool {
        self.springs.iter().any(|s| s.spring_index == spring_index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConnectedSpring> + '_ {
        self.springs.iter()
    }

    pub fn owned(&self) -> &[ConnectedSpring] {
        &self.springs[..self.owned_count]
    }

    pub fn len(&self) -> usize {
        self.springs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.springs.is_empty()
    }
}

/// Triangles connected to a point, owned ones first.
#[derive(Debug, Clone, Default)]
pub struct ConnectedTriangles {
    triangles: Vec<ElementIndex>,
    owned_count: usize,
}

impl ConnectedTriangles {
    pub fn connect(&mut self, triangle_index: ElementIndex, is_owner: bool) {
        debug_assert!(self.triangles.len() < MAX_TRIANGLES_PER_POINT);
        if is_owner {
            self.triangles.insert(self.owned_count, triangle_index);
            self.owned_count += 1;
        } else {
            self.triangles.push(triangle_index);
        }
    }

    pub fn disconnect(&mut self, triangle_index: ElementIndex) -> bool {
        let Some(position) = self.triangles.iter().position(|&t| t == triangle_index) else {
            return false;
        };
        self.triangles.remove(position);
        if position < self.owned_count {
            self.owned_count -= 1;
        }
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = ElementIndex> + '_ {
        self.triangles.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }
}

// ==================== DETACH ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetachOptions {
    pub generate_debris: bool,
    pub fire_destroy_event: bool,
}

/// Structural side effects of detaching a point, supplied by whoever owns
/// the springs and triangles.
pub trait DetachHandler {
    fn handle_detach(
        &mut self,
        points: &mut Points,
        point_index: ElementIndex,
        options: DetachOptions,
        current_simulation_time: f32,
        parameters: &GameParameters,
    );
}

// ==================== POINTS ====================

pub struct Points {
    ship_point_count: usize,
    ephemeral_point_count: usize,
    all_point_count: usize,
    added_ship_point_count: usize,

    // Materials
    pub(crate) structural_material: Vec<Option<Arc<StructuralMaterial>>>,
    pub(crate) is_rope: Vec<bool>,

    // Mechanics
    pub(crate) position: Vec<Vec2>,
    pub(crate) velocity: Vec<Vec2>,
    /// Force accumulated by springs during one mechanical iteration.
    pub(crate) spring_force: Vec<Vec2>,
    /// Gravity, buoyancy, drag and wind; computed once per step.
    pub(crate) external_force: Vec<Vec2>,
    pub(crate) material_mass: Vec<f32>,
    pub(crate) augmented_material_mass: Vec<f32>,
    pub(crate) mass: Vec<f32>,
    pub(crate) material_buoyancy_volume_fill: Vec<f32>,
    /// dt^2 of a mechanical iteration, or zero when frozen.
    pub(crate) integration_factor_time_coefficient: Vec<f32>,
    /// integration_factor_time_coefficient / mass
    pub(crate) integration_factor: Vec<f32>,
    pub(crate) decay: Vec<f32>,
    pub(crate) is_pinned: Vec<bool>,

    // Water
    pub(crate) material_is_hull: Vec<bool>,
    pub(crate) material_water_volume_fill: Vec<f32>,
    pub(crate) material_water_intake: Vec<f32>,
    pub(crate) material_water_restitution: Vec<f32>,
    pub(crate) material_water_diffusion_speed: Vec<f32>,
    pub(crate) water: Vec<f32>,
    pub(crate) cumulated_intaken_water: Vec<f32>,
    pub(crate) is_leaking: Vec<bool>,
    factory_is_leaking: Vec<bool>,

    // Heat and combustion
    pub(crate) temperature: Vec<f32>,
    pub(crate) material_heat_capacity: Vec<f32>,
    pub(crate) material_ignition_temperature: Vec<f32>,
    pub(crate) material_thermal_conductivity: Vec<f32>,
    pub(crate) combustion_state: Vec<CombustionState>,

    // Electrical and light
    pub(crate) electrical_element: Vec<Option<ElementIndex>>,
    pub(crate) light: Vec<f32>,

    // Receptivities
    pub(crate) material_wind_receptivity: Vec<f32>,
    pub(crate) material_rust_receptivity: Vec<f32>,

    // Ephemeral particles
    pub(crate) ephemeral_state: Vec<EphemeralState>,
    pub(crate) ephemeral_start_time: Vec<f32>,
    pub(crate) ephemeral_max_lifetime: Vec<f32>,

    // Structure
    pub(crate) connected_springs: Vec<ConnectedSprings>,
    pub(crate) factory_connected_springs: Vec<ConnectedSprings>,
    pub(crate) connected_triangles: Vec<ConnectedTriangles>,
    pub(crate) factory_connected_triangles: Vec<ConnectedTriangles>,
    pub(crate) connected_component_id: Vec<Option<ConnectedComponentId>>,
    pub(crate) plane_id: Vec<Option<PlaneId>>,
    pub(crate) current_connectivity_visit_sequence: Vec<u64>,

    // Render
    pub(crate) color: Vec<[f32; 4]>,

    // Combustion bookkeeping
    /// Burning points, sorted by plane id.
    pub(crate) burning_points: Vec<ElementIndex>,
    ignition_candidates: Vec<(ElementIndex, f32)>,

    free_ephemeral_particle_search_start_index: ElementIndex,

    current_num_mechanical_dynamics_iterations: usize,
    current_cumulated_intaken_water_threshold: f32,

    pub(crate) events: SharedEventHandler,
    pub(crate) rng: StdRng,
}

impl Points {
    /// Allocate buffers for `ship_point_count` ship points plus the
    /// configured ephemeral pool. Ship points are then filled via [`Points::add`].
    pub fn new(
        ship_point_count: usize,
        parameters: &GameParameters,
        events: SharedEventHandler,
        seed: u64,
    ) -> Self {
        let ephemeral_point_count = parameters.max_ephemeral_particles;
        let all_point_count = ship_point_count + ephemeral_point_count;

        Self {
            ship_point_count,
            ephemeral_point_count,
            all_point_count,
            added_ship_point_count: 0,

            structural_material: vec![None; all_point_count],
            is_rope: vec![false; all_point_count],

            position: vec![Vec2::ZERO; all_point_count],
            velocity: vec![Vec2::ZERO; all_point_count],
            spring_force: vec![Vec2::ZERO; all_point_count],
            external_force: vec![Vec2::ZERO; all_point_count],
            material_mass: vec![1.0; all_point_count],
            augmented_material_mass: vec![1.0; all_point_count],
            mass: vec![1.0; all_point_count],
            material_buoyancy_volume_fill: vec![0.0; all_point_count],
            integration_factor_time_coefficient: vec![0.0; all_point_count],
            integration_factor: vec![0.0; all_point_count],
            decay: vec![1.0; all_point_count],
            is_pinned: vec![false; all_point_count],

            material_is_hull: vec![false; all_point_count],
            material_water_volume_fill: vec![0.0; all_point_count],
            material_water_intake: vec![0.0; all_point_count],
            material_water_restitution: vec![0.0; all_point_count],
            material_water_diffusion_speed: vec![0.0; all_point_count],
            water: vec![0.0; all_point_count],
            cumulated_intaken_water: vec![0.0; all_point_count],
            is_leaking: vec![false; all_point_count],
            factory_is_leaking: vec![false; all_point_count],

            temperature: vec![INITIAL_TEMPERATURE; all_point_count],
            material_heat_capacity: vec![1.0; all_point_count],
            material_ignition_temperature: vec![f32::MAX; all_point_count],
            material_thermal_conductivity: vec![0.0; all_point_count],
            combustion_state: vec![CombustionState::default(); all_point_count],

            electrical_element: vec![None; all_point_count],
            light: vec![0.0; all_point_count],

            material_wind_receptivity: vec![0.0; all_point_count],
            material_rust_receptivity: vec![0.0; all_point_count],

            ephemeral_state: vec![EphemeralState::None; all_point_count],
            ephemeral_start_time: vec![0.0; all_point_count],
            ephemeral_max_lifetime: vec![0.0; all_point_count],

            connected_springs: vec![ConnectedSprings::default(); all_point_count],
            factory_connected_springs: vec![ConnectedSprings::default(); all_point_count],
            connected_triangles: vec![ConnectedTriangles::default(); all_point_count],
            factory_connected_triangles: vec![ConnectedTriangles::default(); all_point_count],
            connected_component_id: vec![None; all_point_count],
            plane_id: vec![None; all_point_count],
            current_connectivity_visit_sequence: vec![0; all_point_count],

            color: vec![[0.0; 4]; all_point_count],

            burning_points: Vec::new(),
            ignition_candidates: Vec::new(),

            free_ephemeral_particle_search_start_index: ship_point_count,

            current_num_mechanical_dynamics_iterations: parameters.num_mechanical_dynamics_iterations(),
            current_cumulated_intaken_water_threshold: parameters
                .cumulated_intaken_water_threshold_for_air_bubbles,

            events,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Initialize the next ship point.
    pub fn add(
        &mut self,
        position: Vec2,
        material: &Arc<StructuralMaterial>,
        is_leaking: bool,
        parameters: &GameParameters,
    ) -> ElementIndex {
        let point_index = self.added_ship_point_count;
        debug_assert!(point_index < self.ship_point_count, "too many ship points added");
        self.added_ship_point_count += 1;

        self.assign_material(point_index, material);
        self.position[point_index] = position;
        self.velocity[point_index] = Vec2::ZERO;
        self.integration_factor_time_coefficient[point_index] =
            Self::calculate_integration_factor_time_coefficient(parameters.num_mechanical_dynamics_iterations());
        self.integration_factor[point_index] =
            self.integration_factor_time_coefficient[point_index] / self.mass[point_index];

        self.is_leaking[point_index] = is_leaking;
        self.factory_is_leaking[point_index] = is_leaking;
        self.cumulated_intaken_water[point_index] = if is_leaking {
            self.randomize_cumulated_intaken_water(self.current_cumulated_intaken_water_threshold)
        } else {
            0.0
        };

        point_index
    }

    /// Reset all material-derived and state buffers of a slot.
    fn assign_material(&mut self, point_index: ElementIndex, material: &Arc<StructuralMaterial>) {
        self.structural_material[point_index] = Some(Arc::clone(material));
        self.is_rope[point_index] = material.is_rope;

        self.spring_force[point_index] = Vec2::ZERO;
        self.external_force[point_index] = Vec2::ZERO;
        self.material_mass[point_index] = material.mass;
        self.augmented_material_mass[point_index] = material.mass;
        self.mass[point_index] = material.mass;
        self.material_buoyancy_volume_fill[point_index] = material.buoyancy_volume_fill;
        self.decay[point_index] = 1.0;
        self.is_pinned[point_index] = false;

        self.material_is_hull[point_index] = material.is_hull;
        self.material_water_volume_fill[point_index] = material.water_volume_fill;
        self.material_water_intake[point_index] = material.water_intake;
        self.material_water_restitution[point_index] = material.water_restitution;
        self.material_water_diffusion_speed[point_index] = material.water_diffusion_speed;
        self.water[point_index] = 0.0;
        self.cumulated_intaken_water[point_index] = 0.0;
        self.is_leaking[point_index] = false;

        self.temperature[point_index] = INITIAL_TEMPERATURE;
        self.material_heat_capacity[point_index] = material.heat_capacity();
        self.material_ignition_temperature[point_index] = material.ignition_temperature;
        self.material_thermal_conductivity[point_index] = material.thermal_conductivity;
        self.combustion_state[point_index] = CombustionState::default();

        self.light[point_index] = 0.0;
        self.material_wind_receptivity[point_index] = material.wind_receptivity;
        self.material_rust_receptivity[point_index] = material.rust_receptivity;

        self.plane_id[point_index] = None;
        self.color[point_index] = material.render_color;
    }

    pub(crate) fn calculate_integration_factor_time_coefficient(num_mechanical_dynamics_iterations: usize) -> f32 {
        let dt = super::physics_config::SIMULATION_STEP_TIME_DURATION / num_mechanical_dynamics_iterations as f32;
        dt * dt
    }

    fn randomize_cumulated_intaken_water(&mut self, threshold: f32) -> f32 {
        self.rng.gen_range(0.0..=threshold)
    }

    // ==================== MUTATIONS ====================

    /// Detach a point from the structure, letting `handler` tear down its
    /// springs and triangles, then imprint `velocity` unless pinned.
    pub fn detach(
        &mut self,
        point_index: ElementIndex,
        velocity: Vec2,
        options: DetachOptions,
        current_simulation_time: f32,
        parameters: &GameParameters,
        handler: &mut dyn DetachHandler,
    ) {
        handler.handle_detach(self, point_index, options, current_simulation_time, parameters);

        if !self.is_pinned[point_index] {
            self.velocity[point_index] = velocity;
        }
    }

    /// Called when a point has lost its last spring.
    pub fn on_orphaned(&mut self, point_index: ElementIndex) {
        // Shrink an active flame instead of snapping it out
        if self.combustion_state[point_index].state == CombustionStateType::Burning {
            self.combustion_state[point_index].flame_development = self.rng.gen_range(0.1..0.14);
        }
    }

    pub fn pin(&mut self, point_index: ElementIndex) {
        self.is_pinned[point_index] = true;
        self.freeze(point_index);
    }

    pub fn unpin(&mut self, point_index: ElementIndex) {
        self.is_pinned[point_index] = false;
        self.thaw(point_index);
    }

    fn freeze(&mut self, point_index: ElementIndex) {
        self.integration_factor_time_coefficient[point_index] = 0.0;
        self.integration_factor[point_index] = 0.0;
        self.velocity[point_index] = Vec2::ZERO;
    }

    fn thaw(&mut self, point_index: ElementIndex) {
        self.integration_factor_time_coefficient[point_index] =
            Self::calculate_integration_factor_time_coefficient(self.current_num_mechanical_dynamics_iterations);
        self.integration_factor[point_index] =
            self.integration_factor_time_coefficient[point_index] / self.mass[point_index];
    }

    pub fn set_leaking(&mut self, point_index: ElementIndex) {
        self.is_leaking[point_index] = true;
        self.cumulated_intaken_water[point_index] =
            self.randomize_cumulated_intaken_water(self.current_cumulated_intaken_water_threshold);
    }

    pub fn restore_factory_is_leaking(&mut self, point_index: ElementIndex) {
        self.is_leaking[point_index] = self.factory_is_leaking[point_index];
    }

    /// Add `offset` kg to a point's material mass and refresh the springs
    /// whose coefficients depend on it.
    pub fn augment_material_mass(&mut self, point_index: ElementIndex, offset: f32, springs: &mut Springs) {
        debug_assert!(offset >= 0.0, "mass augmentation must be non-negative");
        self.augmented_material_mass[point_index] = self.material_mass[point_index] + offset;
        for connected in self.connected_springs[point_index].iter() {
            springs.update_for_mass(connected.spring_index, self);
        }
    }

    pub(crate) fn connect_spring(&mut self, point_index: ElementIndex, spring_index: ElementIndex, other: ElementIndex, is_owner: bool) {
        self.connected_springs[point_index].connect(spring_index, other, is_owner);
    }

    pub(crate) fn add_factory_connected_spring(&mut self, point_index: ElementIndex, spring_index: ElementIndex, other: ElementIndex, is_owner: bool) {
        self.factory_connected_springs[point_index].connect(spring_index, other, is_owner);
    }

    pub(crate) fn disconnect_spring(&mut self, point_index: ElementIndex, spring_index: ElementIndex) -> bool {
        self.connected_springs[point_index].disconnect(spring_index)
    }

    pub(crate) fn connect_triangle(&mut self, point_index: ElementIndex, triangle_index: ElementIndex, is_owner: bool) {
        self.connected_triangles[point_index].connect(triangle_index, is_owner);
    }

    pub(crate) fn add_factory_connected_triangle(&mut self, point_index: ElementIndex, triangle_index: ElementIndex, is_owner: bool) {
        self.factory_connected_triangles[point_index].connect(triangle_index, is_owner);
    }

    pub(crate) fn disconnect_triangle(&mut self, point_index: ElementIndex, triangle_index: ElementIndex) -> bool {
        self.connected_triangles[point_index].disconnect(triangle_index)
    }

    // ==================== PER-STEP ====================

    /// Refresh caches that depend on parameters, only when they changed.
    pub fn update_for_game_parameters(&mut self, parameters: &GameParameters) {
        let iterations = parameters.num_mechanical_dynamics_iterations();
        if iterations != self.current_num_mechanical_dynamics_iterations {
            let coefficient = Self::calculate_integration_factor_time_coefficient(iterations);
            for point_index in 0..self.all_point_count {
                if self.integration_factor_time_coefficient[point_index] != 0.0 {
                    self.integration_factor_time_coefficient[point_index] = coefficient;
                }
            }
            self.current_num_mechanical_dynamics_iterations = iterations;
        }

        let threshold = parameters.cumulated_intaken_water_threshold_for_air_bubbles;
        if threshold != self.current_cumulated_intaken_water_threshold {
            for point_index in 0..self.ship_point_count {
                if self.is_leaking[point_index] {
                    self.cumulated_intaken_water[point_index] = self.randomize_cumulated_intaken_water(threshold);
                }
            }
            self.current_cumulated_intaken_water_threshold = threshold;
        }
    }

    /// Recompute total masses (material + augmentation + water) and the
    /// integration factors derived from them.
    pub fn update_masses(&mut self, parameters: &GameParameters) {
        let water_mass = super::physics_config::WATER_MASS * parameters.water_density_adjustment;
        for point_index in 0..self.all_point_count {
            let entrained_water = self.water[point_index].min(self.material_water_volume_fill[point_index]);
            self.mass[point_index] = self.augmented_material_mass[point_index] + entrained_water.max(0.0) * water_mass;
            debug_assert!(self.mass[point_index] > 0.0);
            self.integration_factor[point_index] =
                self.integration_factor_time_coefficient[point_index] / self.mass[point_index];
        }
    }

    // ==================== QUERIES ====================

    pub fn ship_point_count(&self) -> usize {
        self.ship_point_count
    }

    pub fn ephemeral_point_count(&self) -> usize {
        self.ephemeral_point_count
    }

    pub fn all_point_count(&self) -> usize {
        self.all_point_count
    }

    pub fn ship_points(&self) -> std::ops::Range<ElementIndex> {
        0..self.ship_point_count
    }

    pub fn ephemeral_points(&self) -> std::ops::Range<ElementIndex> {
        self.ship_point_count..self.all_point_count
    }

    /// Ship points and live ephemeral particles.
    pub fn is_active(&self, point_index: ElementIndex) -> bool {
        point_index < self.ship_point_count || !matches!(self.ephemeral_state[point_index], EphemeralState::None)
    }

    pub fn position(&self, point_index: ElementIndex) -> Vec2 {
        self.position[point_index]
    }

    pub fn set_position(&mut self, point_index: ElementIndex, position: Vec2) {
        self.position[point_index] = position;
    }

    pub fn velocity(&self, point_index: ElementIndex) -> Vec2 {
        self.velocity[point_index]
    }

    pub fn set_velocity(&mut self, point_index: ElementIndex, velocity: Vec2) {
        self.velocity[point_index] = velocity;
    }

    pub fn mass(&self, point_index: ElementIndex) -> f32 {
        self.mass[point_index]
    }

    pub fn augmented_material_mass(&self, point_index: ElementIndex) -> f32 {
        self.augmented_material_mass[point_index]
    }

    pub fn integration_factor(&self, point_index: ElementIndex) -> f32 {
        self.integration_factor[point_index]
    }

    pub fn decay(&self, point_index: ElementIndex) -> f32 {
        self.decay[point_index]
    }

    pub fn water(&self, point_index: ElementIndex) -> f32 {
        self.water[point_index]
    }

    pub fn add_water(&mut self, point_index: ElementIndex, quantity: f32) {
        self.water[point_index] = (self.water[point_index] + quantity).max(0.0);
    }

    pub fn cumulated_intaken_water(&self, point_index: ElementIndex) -> f32 {
        self.cumulated_intaken_water[point_index]
    }

    pub fn is_leaking(&self, point_index: ElementIndex) -> bool {
        self.is_leaking[point_index]
    }

    pub fn temperature(&self, point_index: ElementIndex) -> f32 {
        self.temperature[point_index]
    }

    pub fn set_temperature(&mut self, point_index: ElementIndex, temperature: f32) {
        self.temperature[point_index] = temperature;
    }

    pub fn combustion_state(&self, point_index: ElementIndex) -> &CombustionState {
        &self.combustion_state[point_index]
    }

    pub fn burning_points(&self) -> &[ElementIndex] {
        &self.burning_points
    }

    pub fn light(&self, point_index: ElementIndex) -> f32 {
        self.light[point_index]
    }

    pub fn is_pinned(&self, point_index: ElementIndex) -> bool {
        self.is_pinned[point_index]
    }

    pub fn is_hull(&self, point_index: ElementIndex) -> bool {
        self.material_is_hull[point_index]
    }

    pub fn structural_material(&self, point_index: ElementIndex) -> Option<&Arc<StructuralMaterial>> {
        self.structural_material[point_index].as_ref()
    }

    pub fn connected_springs(&self, point_index: ElementIndex) -> &ConnectedSprings {
        &self.connected_springs[point_index]
    }

    pub fn factory_connected_springs(&self, point_index: ElementIndex) -> &ConnectedSprings {
        &self.factory_connected_springs[point_index]
    }

    pub fn connected_triangles(&self, point_index: ElementIndex) -> &ConnectedTriangles {
        &self.connected_triangles[point_index]
    }

    pub fn connected_component_id(&self, point_index: ElementIndex) -> Option<ConnectedComponentId> {
        self.connected_component_id[point_index]
    }

    pub fn plane_id(&self, point_index: ElementIndex) -> Option<PlaneId> {
        self.plane_id[point_index]
    }

    pub fn electrical_element(&self, point_index: ElementIndex) -> Option<ElementIndex> {
        self.electrical_element[point_index]
    }

    pub fn color(&self, point_index: ElementIndex) -> [f32; 4] {
        self.color[point_index]
    }

    /// Material name for events; empty for unassigned slots.
    pub(crate) fn material_name(&self, point_index: ElementIndex) -> &str {
        self.structural_material[point_index]
            .as_ref()
            .map(|m| m.name.as_str())
            .unwrap_or("")
    }

    pub fn is_underwater(&self, point_index: ElementIndex, ocean_surface: &OceanSurface) -> bool {
        ocean_surface.is_underwater(self.position[point_index])
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::simulation::events::NullEventHandler;
    use crate::simulation::materials::{builtin, MaterialDatabase};

    pub(crate) fn test_parameters() -> GameParameters {
        GameParameters {
            max_ephemeral_particles: 8,
            ..Default::default()
        }
    }

    pub(crate) fn make_points(ship_point_count: usize, parameters: &GameParameters) -> Points {
        let database = MaterialDatabase::builtin();
        let wood = database.structural(builtin::WOOD).unwrap().clone();
        let mut points = Points::new(ship_point_count, parameters, Arc::new(NullEventHandler), 42);
        for i in 0..ship_point_count {
            points.add(Vec2::new(i as f32, 10.0), &wood, false, parameters);
        }
        points
    }

    #[test]
    fn add_initializes_point() {
        let parameters = test_parameters();
        let points = make_points(3, &parameters);
        assert_eq!(points.all_point_count(), 3 + 8);
        assert_eq!(points.mass(1), 500.0);
        assert_eq!(points.decay(1), 1.0);
        assert_eq!(points.temperature(1), INITIAL_TEMPERATURE);
        assert_eq!(points.combustion_state(1).state, CombustionStateType::NotBurning);
        let dt = 0.02 / 30.0;
        assert!((points.integration_factor(1) - dt * dt / 500.0).abs() < 1e-12);
        assert!(!points.is_active(3));
    }

    #[test]
    fn leaking_points_get_randomized_intake() {
        let parameters = test_parameters();
        let database = MaterialDatabase::builtin();
        let wood = database.structural(builtin::WOOD).unwrap().clone();
        let mut points = Points::new(20, &parameters, Arc::new(NullEventHandler), 3);
        for i in 0..20 {
            points.add(Vec2::new(i as f32, 0.0), &wood, true, &parameters);
        }
        let threshold = parameters.cumulated_intaken_water_threshold_for_air_bubbles;
        assert!((0..20).all(|p| (0.0..=threshold).contains(&points.cumulated_intaken_water(p))));
        assert!((0..20).any(|p| points.cumulated_intaken_water(p) > 0.0));
    }

    #[test]
    fn water_adds_mass_up_to_volume_fill() {
        let parameters = test_parameters();
        let mut points = make_points(2, &parameters);
        points.add_water(0, 3.0);
        points.update_masses(&parameters);
        // wood holds at most half a cubic meter
        assert!((points.mass(0) - (500.0 + 0.5 * 1000.0)).abs() < 1e-3);
        assert_eq!(points.mass(1), 500.0);
    }

    #[test]
    fn pinned_point_is_frozen() {
        let parameters = test_parameters();
        let mut points = make_points(1, &parameters);
        points.set_velocity(0, Vec2::new(3.0, 0.0));
        points.pin(0);
        assert_eq!(points.velocity(0), Vec2::ZERO);
        assert_eq!(points.integration_factor(0), 0.0);
        points.unpin(0);
        assert!(points.integration_factor(0) > 0.0);
    }

    #[test]
    fn iteration_change_recomputes_coefficients_lazily() {
        let mut parameters = test_parameters();
        let mut points = make_points(2, &parameters);
        points.pin(1);
        parameters.num_mechanical_dynamics_iterations_adjustment = 2.0;
        points.update_for_game_parameters(&parameters);
        points.update_masses(&parameters);
        let dt = 0.02 / 60.0;
        assert!((points.integration_factor(0) - dt * dt / 500.0).abs() < 1e-12);
        assert_eq!(points.integration_factor(1), 0.0);
    }

    #[test]
    fn connected_springs_keep_owned_prefix() {
        let mut springs = ConnectedSprings::default();
        springs.connect(10, 1, false);
        springs.connect(11, 2, true);
        springs.connect(12, 3, true);
        assert_eq!(springs.owned().len(), 2);
        assert_eq!(springs.owned()[0].spring_index, 11);
        assert!(springs.disconnect(11));
        assert_eq!(springs.owned().len(), 1);
        assert!(!springs.disconnect(11));
        assert!(springs.disconnect(10));
        assert_eq!(springs.owned().len(), 1);
        assert_eq!(springs.len(), 1);
    }

    #[test]
    fn orphaned_flame_shrinks() {
        let parameters = test_parameters();
        let mut points = make_points(1, &parameters);
        points.combustion_state[0] = CombustionState {
            state: CombustionStateType::Burning,
            flame_development: 0.9,
            max_flame_development: 0.9,
            personality: 0.5,
        };
        points.on_orphaned(0);
        let development = points.combustion_state(0).flame_development;
        assert!((0.1..0.14).contains(&development));
        assert_eq!(points.combustion_state(0).state, CombustionStateType::Burning);
    }
}
