//! Structural edits: destroying and restoring springs and triangles,
//! detaching points, breakage and the connectivity visit.

use std::collections::VecDeque;
use std::f32::consts::TAU;

use bevy::log::debug;
use bevy::prelude::Vec2;
use rand::Rng;

use super::Ship;
use crate::simulation::electrical::ElectricalElements;
use crate::simulation::events::GameEventHandler;
use crate::simulation::ocean_surface::OceanSurface;
use crate::simulation::physics_config::ephemeral::*;
use crate::simulation::physics_config::GameParameters;
use crate::simulation::points::{DetachHandler, DetachOptions, ElementIndex, Points};
use crate::simulation::springs::Springs;
use crate::simulation::triangles::Triangles;

/// Mutable view over everything but the points, so that edits can be driven
/// from [`Points::detach`].
pub(super) struct StructuralEdit<'a> {
    pub springs: &'a mut Springs,
    pub triangles: &'a mut Triangles,
    pub electrical: &'a mut ElectricalElements,
    pub ocean_surface: &'a OceanSurface,
    pub events: &'a dyn GameEventHandler,
    pub is_structure_dirty: &'a mut bool,
}

impl StructuralEdit<'_> {
    pub fn destroy_spring(&mut self, points: &mut Points, spring_index: ElementIndex, fire_break_event: bool) {
        if !self.springs.mark_deleted(spring_index) {
            return;
        }

        for triangle_index in self.springs.super_triangles(spring_index).to_vec() {
            self.destroy_triangle(points, triangle_index);
        }

        let (point_a, point_b) = self.springs.endpoints(spring_index);
        points.disconnect_spring(point_a, spring_index);
        points.disconnect_spring(point_b, spring_index);

        if let (Some(element_a), Some(element_b)) = (points.electrical_element(point_a), points.electrical_element(point_b)) {
            self.electrical.disconnect(element_a, element_b);
        }

        if fire_break_event {
            self.events.on_break(
                &self.springs.material(spring_index).name,
                points.is_underwater(point_a, self.ocean_surface),
                1,
            );
        }

        for point_index in [point_a, point_b] {
            if points.connected_springs(point_index).is_empty() {
                points.on_orphaned(point_index);
            }
        }

        *self.is_structure_dirty = true;
    }

    pub fn destroy_triangle(&mut self, points: &mut Points, triangle_index: ElementIndex) {
        if !self.triangles.mark_deleted(triangle_index) {
            return;
        }
        for point_index in self.triangles.points(triangle_index) {
            points.disconnect_triangle(point_index, triangle_index);
        }
        for spring_index in self.triangles.sub_springs(triangle_index) {
            self.springs.remove_super_triangle(spring_index, triangle_index);
        }
    }

    pub fn restore_spring(&mut self, points: &mut Points, spring_index: ElementIndex) -> bool {
        if !self.springs.restore(spring_index, points) {
            return false;
        }

        let (point_a, point_b) = self.springs.endpoints(spring_index);
        points.connect_spring(point_a, spring_index, point_b, true);
        points.connect_spring(point_b, spring_index, point_a, false);

        for point_index in [point_a, point_b] {
            if let Some(element) = points.electrical_element(point_index) {
                self.electrical.restore(element);
            }
        }
        if let (Some(element_a), Some(element_b)) = (points.electrical_element(point_a), points.electrical_element(point_b)) {
            self.electrical.connect(element_a, element_b);
        }

        *self.is_structure_dirty = true;
        true
    }

    /// Restore a deleted triangle whose edges are all back.
    pub fn restore_triangle(&mut self, points: &mut Points, triangle_index: ElementIndex) -> bool {
        if !self.triangles.is_deleted(triangle_index) {
            return false;
        }
        let sub_springs = self.triangles.sub_springs(triangle_index);
        if sub_springs.iter().any(|&s| self.springs.is_deleted(s)) {
            return false;
        }

        self.triangles.restore(triangle_index);
        for (i, point_index) in self.triangles.points(triangle_index).into_iter().enumerate() {
            points.connect_triangle(point_index, triangle_index, i == 0);
        }
        for spring_index in sub_springs {
            self.springs.add_super_triangle(spring_index, triangle_index);
        }
        true
    }

    pub fn generate_debris(&mut self, points: &mut Points, point_index: ElementIndex, current_simulation_time: f32) {
        let Some(material) = points.structural_material(point_index).cloned() else {
            return;
        };
        let position = points.position(point_index);
        let plane_id = points.plane_id(point_index);

        let count = points
            .rng
            .gen_range(MIN_DEBRIS_PARTICLES_PER_EVENT..=MAX_DEBRIS_PARTICLES_PER_EVENT);
        for _ in 0..count {
            let speed = points
                .rng
                .gen_range(MIN_DEBRIS_PARTICLES_VELOCITY..MAX_DEBRIS_PARTICLES_VELOCITY);
            let angle = points.rng.gen_range(0.0..TAU);
            let lifetime = points
                .rng
                .gen_range(MIN_DEBRIS_PARTICLES_LIFETIME..MAX_DEBRIS_PARTICLES_LIFETIME);
            points.create_ephemeral_particle_debris(
                position,
                Vec2::from_angle(angle) * speed,
                &material,
                current_simulation_time,
                lifetime,
                plane_id,
            );
        }
    }

    /// Sparkles fly off a sawed spring, away from the cut direction.
    pub fn generate_sparkles(
        &mut self,
        points: &mut Points,
        spring_index: ElementIndex,
        cut_point: Vec2,
        cut_direction: Vec2,
        current_simulation_time: f32,
    ) {
        let material = self.springs.material(spring_index).clone();
        let (point_a, _) = self.springs.endpoints(spring_index);
        let plane_id = points.plane_id(point_a);
        let base_angle = (-cut_direction.y).atan2(-cut_direction.x);

        let count = points
            .rng
            .gen_range(MIN_SPARKLE_PARTICLES_FOR_CUT_EVENT..=MAX_SPARKLE_PARTICLES_FOR_CUT_EVENT);
        for _ in 0..count {
            let speed = points
                .rng
                .gen_range(MIN_SPARKLE_PARTICLES_VELOCITY..MAX_SPARKLE_PARTICLES_VELOCITY);
            let angle = base_angle + points.rng.gen_range(-0.25 * TAU..0.25 * TAU) * 0.5;
            let lifetime = points
                .rng
                .gen_range(MIN_SPARKLE_PARTICLES_LIFETIME..MAX_SPARKLE_PARTICLES_LIFETIME);
            points.create_ephemeral_particle_sparkle(
                cut_point,
                Vec2::from_angle(angle) * speed,
                &material,
                current_simulation_time,
                lifetime,
                plane_id,
            );
        }
    }
}

impl DetachHandler for StructuralEdit<'_> {
    fn handle_detach(
        &mut self,
        points: &mut Points,
        point_index: ElementIndex,
        options: DetachOptions,
        current_simulation_time: f32,
        parameters: &GameParameters,
    ) {
        let mut has_anything_been_destroyed = false;

        let connected_springs: Vec<ElementIndex> =
            points.connected_springs(point_index).iter().map(|c| c.spring_index).collect();
        for spring_index in connected_springs {
            self.destroy_spring(points, spring_index, false);
            has_anything_been_destroyed = true;
        }

        let connected_triangles: Vec<ElementIndex> = points.connected_triangles(point_index).iter().collect();
        for triangle_index in connected_triangles {
            self.destroy_triangle(points, triangle_index);
            has_anything_been_destroyed = true;
        }

        if let Some(element) = points.electrical_element(point_index) {
            if !self.electrical.is_deleted(element) {
                self.electrical.destroy(element);
                has_anything_been_destroyed = true;
            }
        }

        if has_anything_been_destroyed {
            if options.generate_debris && parameters.do_generate_debris {
                self.generate_debris(points, point_index, current_simulation_time);
            }
            if options.fire_destroy_event {
                self.events.on_destroy(
                    points.material_name(point_index),
                    points.is_underwater(point_index, self.ocean_surface),
                    1,
                );
            }
            *self.is_structure_dirty = true;
        }
    }
}

impl Ship {
    /// Split the ship into the points and an edit view over the rest.
    pub(super) fn edit<'a>(&'a mut self, ocean_surface: &'a OceanSurface) -> (&'a mut Points, StructuralEdit<'a>) {
        (
            &mut self.points,
            StructuralEdit {
                springs: &mut self.springs,
                triangles: &mut self.triangles,
                electrical: &mut self.electrical,
                ocean_surface,
                events: self.events.as_ref(),
                is_structure_dirty: &mut self.is_structure_dirty,
            },
        )
    }

    /// Break every spring whose peak strain this step exceeded its threshold.
    pub(super) fn update_spring_strains(
        &mut self,
        _current_simulation_time: f32,
        ocean_surface: &OceanSurface,
        _parameters: &GameParameters,
    ) {
        let broken = self.springs.over_stressed(&self.points);
        if broken.is_empty() {
            return;
        }

        debug!("Ship {}: {} springs broke", self.id, broken.len());
        let (points, mut edit) = self.edit(ocean_surface);
        for spring_index in broken {
            edit.destroy_spring(points, spring_index, true);
        }
    }

    /// Flood-fill ship points over live springs, assigning one connected
    /// component (and plane) id per island.
    pub(super) fn run_connectivity_visit(&mut self) {
        self.current_connectivity_visit_sequence += 1;
        let sequence = self.current_connectivity_visit_sequence;
        let points = &mut self.points;

        let mut component_id = 0;
        let mut queue = VecDeque::new();
        for start in 0..points.ship_point_count() {
            if points.current_connectivity_visit_sequence[start] == sequence {
                continue;
            }

            component_id += 1;
            points.current_connectivity_visit_sequence[start] = sequence;
            queue.push_back(start);
            while let Some(point_index) = queue.pop_front() {
                points.connected_component_id[point_index] = Some(component_id);
                points.plane_id[point_index] = Some(component_id);
                for connected in points.connected_springs[point_index].iter() {
                    let other = connected.other_endpoint_index;
                    if points.current_connectivity_visit_sequence[other] != sequence {
                        points.current_connectivity_visit_sequence[other] = sequence;
                        queue.push_back(other);
                    }
                }
            }
        }

        self.connected_component_count = component_id as usize;
        self.points.reorder_burning_points_for_depth();
        self.is_structure_dirty = false;
    }
}
