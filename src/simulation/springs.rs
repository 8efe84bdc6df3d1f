//! Springs: pairwise structural connections.
//!
//! Springs form a tombstoned arena; a destroyed spring keeps its index and
//! data so repair can bring it back.

use std::sync::Arc;

use bevy::log::debug;
use bevy::prelude::Vec2;

use super::materials::StructuralMaterial;
use super::physics_config::{
    GameParameters, SPRING_DAMPING_COEFFICIENT, SPRING_REDUCTION_FRACTION, SPRING_STRENGTH_TO_BREAKING_STRAIN,
};
use super::points::{ElementIndex, Points};

/// Triangles a spring can be an edge of.
pub const MAX_SUPER_TRIANGLES: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq)]
struct ParameterSnapshot {
    stiffness_adjustment: f32,
    damping_adjustment: f32,
    strength_adjustment: f32,
    num_mechanical_dynamics_iterations: usize,
}

impl ParameterSnapshot {
    fn of(parameters: &GameParameters) -> Self {
        Self {
            stiffness_adjustment: parameters.spring_stiffness_adjustment,
            damping_adjustment: parameters.spring_damping_adjustment,
            strength_adjustment: parameters.spring_strength_adjustment,
            num_mechanical_dynamics_iterations: parameters.num_mechanical_dynamics_iterations(),
        }
    }
}

pub struct Springs {
    is_deleted: Vec<bool>,
    endpoint_a: Vec<ElementIndex>,
    endpoint_b: Vec<ElementIndex>,
    rest_length: Vec<f32>,
    material: Vec<Arc<StructuralMaterial>>,
    is_rope: Vec<bool>,

    stiffness_coefficient: Vec<f32>,
    damping_coefficient: Vec<f32>,
    /// Strain at which an undecayed spring breaks.
    breaking_strain: Vec<f32>,
    /// Largest strain seen during the current step.
    stress: Vec<f32>,

    super_triangles: Vec<Vec<ElementIndex>>,
    factory_super_triangles: Vec<Vec<ElementIndex>>,

    snapshot: ParameterSnapshot,
}

impl Springs {
    pub fn new(parameters: &GameParameters) -> Self {
        Self {
            is_deleted: Vec::new(),
            endpoint_a: Vec::new(),
            endpoint_b: Vec::new(),
            rest_length: Vec::new(),
            material: Vec::new(),
            is_rope: Vec::new(),
            stiffness_coefficient: Vec::new(),
            damping_coefficient: Vec::new(),
            breaking_strain: Vec::new(),
            stress: Vec::new(),
            super_triangles: Vec::new(),
            factory_super_triangles: Vec::new(),
            snapshot: ParameterSnapshot::of(parameters),
        }
    }

    /// Add a spring at its current length. Connecting it to the endpoints
    /// is up to the caller.
    pub fn add(
        &mut self,
        point_a: ElementIndex,
        point_b: ElementIndex,
        material: Arc<StructuralMaterial>,
        is_rope: bool,
        points: &Points,
    ) -> ElementIndex {
        let spring_index = self.is_deleted.len();
        let rest_length = (points.position(point_a) - points.position(point_b)).length();
        debug_assert!(rest_length > 0.0, "degenerate spring");

        self.is_deleted.push(false);
        self.endpoint_a.push(point_a);
        self.endpoint_b.push(point_b);
        self.rest_length.push(rest_length);
        self.breaking_strain.push(Self::calculate_breaking_strain(&material, &self.snapshot));
        self.material.push(material);
        self.is_rope.push(is_rope);
        self.stiffness_coefficient.push(0.0);
        self.damping_coefficient.push(0.0);
        self.stress.push(0.0);
        self.super_triangles.push(Vec::with_capacity(MAX_SUPER_TRIANGLES));
        self.factory_super_triangles.push(Vec::with_capacity(MAX_SUPER_TRIANGLES));

        self.update_for_mass(spring_index, points);
        spring_index
    }

    pub fn len(&self) -> usize {
        self.is_deleted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.is_deleted.is_empty()
    }

    pub fn is_deleted(&self, spring_index: ElementIndex) -> bool {
        self.is_deleted[spring_index]
    }

    pub fn endpoints(&self, spring_index: ElementIndex) -> (ElementIndex, ElementIndex) {
        (self.endpoint_a[spring_index], self.endpoint_b[spring_index])
    }

    pub fn other_endpoint(&self, spring_index: ElementIndex, point_index: ElementIndex) -> ElementIndex {
        if self.endpoint_a[spring_index] == point_index {
            self.endpoint_b[spring_index]
        } else {
            self.endpoint_a[spring_index]
        }
    }

    pub fn rest_length(&self, spring_index: ElementIndex) -> f32 {
        self.rest_length[spring_index]
    }

    pub fn material(&self, spring_index: ElementIndex) -> &Arc<StructuralMaterial> {
        &self.material[spring_index]
    }

    pub fn is_rope(&self, spring_index: ElementIndex) -> bool {
        self.is_rope[spring_index]
    }

    pub fn stiffness_coefficient(&self, spring_index: ElementIndex) -> f32 {
        self.stiffness_coefficient[spring_index]
    }

    pub fn damping_coefficient(&self, spring_index: ElementIndex) -> f32 {
        self.damping_coefficient[spring_index]
    }

    pub fn breaking_strain(&self, spring_index: ElementIndex) -> f32 {
        self.breaking_strain[spring_index]
    }

    pub fn stress(&self, spring_index: ElementIndex) -> f32 {
        self.stress[spring_index]
    }

    pub fn super_triangles(&self, spring_index: ElementIndex) -> &[ElementIndex] {
        &self.super_triangles[spring_index]
    }

    pub fn factory_super_triangles(&self, spring_index: ElementIndex) -> &[ElementIndex] {
        &self.factory_super_triangles[spring_index]
    }

    /// Live springs.
    pub fn active(&self) -> impl Iterator<Item = ElementIndex> + '_ {
        (0..self.len()).filter(|&s| !self.is_deleted[s])
    }

    pub fn length(&self, spring_index: ElementIndex, points: &Points) -> f32 {
        (points.position(self.endpoint_b[spring_index]) - points.position(self.endpoint_a[spring_index])).length()
    }

    /// First live or deleted spring between two points, in either direction.
    pub fn find(&self, point_a: ElementIndex, point_b: ElementIndex) -> Option<ElementIndex> {
        (0..self.len()).find(|&s| {
            (self.endpoint_a[s] == point_a && self.endpoint_b[s] == point_b)
                || (self.endpoint_a[s] == point_b && self.endpoint_b[s] == point_a)
        })
    }

    // ==================== COEFFICIENTS ====================

    fn calculate_breaking_strain(material: &StructuralMaterial, snapshot: &ParameterSnapshot) -> f32 {
        material.strength * snapshot.strength_adjustment * SPRING_STRENGTH_TO_BREAKING_STRAIN
    }

    /// Recompute the coefficients that depend on the endpoints' masses.
    ///
    /// Stiffness is expressed as the fraction of the spring's displacement
    /// resolved in one mechanical iteration, hence the reduced mass and dt².
    pub fn update_for_mass(&mut self, spring_index: ElementIndex, points: &Points) {
        let mass_a = points.augmented_material_mass(self.endpoint_a[spring_index]);
        let mass_b = points.augmented_material_mass(self.endpoint_b[spring_index]);
        let reduced_mass = mass_a * mass_b / (mass_a + mass_b);
        let dt = super::physics_config::SIMULATION_STEP_TIME_DURATION
            / self.snapshot.num_mechanical_dynamics_iterations as f32;

        self.stiffness_coefficient[spring_index] = SPRING_REDUCTION_FRACTION
            * self.material[spring_index].stiffness
            * self.snapshot.stiffness_adjustment
            * reduced_mass
            / (dt * dt);

        self.damping_coefficient[spring_index] =
            SPRING_DAMPING_COEFFICIENT * self.snapshot.damping_adjustment * reduced_mass / dt;
    }

    /// Refresh every coefficient when a relevant parameter changed.
    pub fn update_for_game_parameters(&mut self, parameters: &GameParameters, points: &Points) {
        let snapshot = ParameterSnapshot::of(parameters);
        if snapshot == self.snapshot {
            return;
        }

        self.snapshot = snapshot;
        for spring_index in 0..self.len() {
            self.breaking_strain[spring_index] =
                Self::calculate_breaking_strain(&self.material[spring_index], &self.snapshot);
            self.update_for_mass(spring_index, points);
        }
        debug!("Recomputed coefficients of {} springs", self.len());
    }

    // ==================== DYNAMICS ====================

    pub fn reset_stress(&mut self) {
        self.stress.fill(0.0);
    }

    /// Accumulate Hookean and damping forces into the endpoints' spring force
    /// buffers, tracking the peak strain of each spring.
    pub fn apply_forces(&mut self, points: &mut Points) {
        let positions = &points.position;
        let velocities = &points.velocity;
        let forces = &mut points.spring_force;

        for spring_index in 0..self.is_deleted.len() {
            if self.is_deleted[spring_index] {
                continue;
            }

            let point_a = self.endpoint_a[spring_index];
            let point_b = self.endpoint_b[spring_index];
            let displacement = positions[point_b] - positions[point_a];
            let length = displacement.length();
            let direction = if length > 0.0 { displacement / length } else { Vec2::ZERO };

            let rest_length = self.rest_length[spring_index];
            let hooke_force = self.stiffness_coefficient[spring_index] * (length - rest_length);
            let relative_velocity = velocities[point_b] - velocities[point_a];
            let damping_force = self.damping_coefficient[spring_index] * relative_velocity.dot(direction);

            let force = direction * (hooke_force + damping_force);
            forces[point_a] += force;
            forces[point_b] -= force;

            let strain = (length - rest_length).abs() / rest_length;
            if strain > self.stress[spring_index] {
                self.stress[spring_index] = strain;
            }
        }
    }

    /// Springs whose peak strain this step exceeded their decayed breaking strain.
    pub fn over_stressed(&self, points: &Points) -> Vec<ElementIndex> {
        self.active()
            .filter(|&s| {
                let mean_decay = (points.decay(self.endpoint_a[s]) + points.decay(self.endpoint_b[s])) / 2.0;
                self.stress[s] > self.breaking_strain[s] * mean_decay
            })
            .collect()
    }

    // ==================== LIFECYCLE ====================

    pub(crate) fn add_super_triangle(&mut self, spring_index: ElementIndex, triangle_index: ElementIndex) {
        debug_assert!(self.super_triangles[spring_index].len() < MAX_SUPER_TRIANGLES);
        self.super_triangles[spring_index].push(triangle_index);
    }

    pub(crate) fn add_factory_super_triangle(&mut self, spring_index: ElementIndex, triangle_index: ElementIndex) {
        self.factory_super_triangles[spring_index].push(triangle_index);
    }

    pub(crate) fn remove_super_triangle(&mut self, spring_index: ElementIndex, triangle_index: ElementIndex) {
        self.super_triangles[spring_index].retain(|&t| t != triangle_index);
    }

    /// Tombstone a spring. Returns false when it was already deleted.
    pub(crate) fn mark_deleted(&mut self, spring_index: ElementIndex) -> bool {
        if self.is_deleted[spring_index] {
            return false;
        }
        self.is_deleted[spring_index] = true;
        self.stress[spring_index] = 0.0;
        true
    }

    /// Bring a deleted spring back at its factory rest length.
    pub(crate) fn restore(&mut self, spring_index: ElementIndex, points: &Points) -> bool {
        if !self.is_deleted[spring_index] {
            return false;
        }
        self.is_deleted[spring_index] = false;
        self.stress[spring_index] = 0.0;
        self.update_for_mass(spring_index, points);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::points::tests::{make_points, test_parameters};

    fn pair() -> (Points, Springs, GameParameters) {
        let parameters = test_parameters();
        let points = make_points(2, &parameters);
        let mut springs = Springs::new(&parameters);
        let material = points.structural_material(0).unwrap().clone();
        springs.add(0, 1, material, false, &points);
        (points, springs, parameters)
    }

    #[test]
    fn coefficients_use_reduced_mass() {
        let (points, springs, _) = pair();
        let dt = 0.02 / 30.0;
        let material = points.structural_material(0).unwrap();
        // Two 500 kg points
        let expected = 0.4 * material.stiffness * 250.0 / (dt * dt);
        assert!((springs.stiffness_coefficient(0) - expected).abs() / expected < 1e-5);
        let expected_damping = 0.03 * 250.0 / dt;
        assert!((springs.damping_coefficient(0) - expected_damping).abs() / expected_damping < 1e-5);
        assert!((springs.breaking_strain(0) - material.strength * 0.839).abs() < 1e-6);
        assert_eq!(springs.rest_length(0), 1.0);
    }

    #[test]
    fn mass_augmentation_stiffens_spring() {
        let (mut points, mut springs, _) = pair();
        points.connect_spring(0, 0, 1, true);
        points.connect_spring(1, 0, 0, false);
        let before = springs.stiffness_coefficient(0);
        points.augment_material_mass(0, 500.0, &mut springs);
        assert!(springs.stiffness_coefficient(0) > before);
    }

    #[test]
    fn stretched_spring_pulls_endpoints_together() {
        let (mut points, mut springs, _) = pair();
        points.set_position(1, Vec2::new(2.0, 10.0));
        springs.reset_stress();
        springs.apply_forces(&mut points);
        assert!(points.spring_force[0].x > 0.0);
        assert!(points.spring_force[1].x < 0.0);
        assert!((points.spring_force[0] + points.spring_force[1]).length() < 1e-3);
        assert!((springs.stress(0) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn over_stressed_accounts_for_decay() {
        let (mut points, mut springs, _) = pair();
        let threshold = springs.breaking_strain(0);
        points.set_position(1, Vec2::new(1.0 + threshold * 0.75, 10.0));
        springs.apply_forces(&mut points);
        assert!(springs.over_stressed(&points).is_empty());

        points.decay[0] = 0.25;
        points.decay[1] = 0.25;
        assert_eq!(springs.over_stressed(&points), vec![0]);
    }

    #[test]
    fn parameter_change_recomputes_lazily() {
        let (points, mut springs, mut parameters) = pair();
        let before = springs.breaking_strain(0);
        springs.update_for_game_parameters(&parameters, &points);
        assert_eq!(springs.breaking_strain(0), before);
        parameters.spring_strength_adjustment = 2.0;
        springs.update_for_game_parameters(&parameters, &points);
        assert!((springs.breaking_strain(0) - 2.0 * before).abs() < 1e-6);
    }

    #[test]
    fn deleted_springs_exert_no_force() {
        let (mut points, mut springs, _) = pair();
        points.set_position(1, Vec2::new(3.0, 10.0));
        assert!(springs.mark_deleted(0));
        assert!(!springs.mark_deleted(0));
        springs.apply_forces(&mut points);
        assert_eq!(points.spring_force[0], Vec2::ZERO);
        assert!(springs.restore(0, &points));
        assert_eq!(springs.active().count(), 1);
        assert_eq!(springs.find(1, 0), Some(0));
    }
}
