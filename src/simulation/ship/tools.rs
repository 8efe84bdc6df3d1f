//! Interactive tools acting on a ship around a world position.

use bevy::log::debug;
use bevy::prelude::Vec2;
use rand::Rng;

use super::Ship;
use crate::simulation::ocean_surface::OceanSurface;
use crate::simulation::physics_config::ephemeral::*;
use crate::simulation::physics_config::{GameParameters, SIMULATION_STEP_TIME_DURATION};
use crate::simulation::points::{CombustionStateType, DetachOptions, ElementIndex};

/// Radius of the fire extinguisher, in meters.
const FIRE_EXTINGUISHER_RADIUS: f32 = 4.0;
/// Radius within which a pin can be placed or removed, in meters.
const PIN_RADIUS: f32 = 1.0;
/// A broken spring is only repaired when its endpoints are at most this
/// multiple of its rest length apart.
const MAX_REPAIR_STRETCH: f32 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeatBlasterAction {
    Heat,
    Cool,
}

/// Intersection of segments `p1-p2` and `q1-q2`, if any.
fn segment_intersection(p1: Vec2, p2: Vec2, q1: Vec2, q2: Vec2) -> Option<Vec2> {
    let r = p2 - p1;
    let s = q2 - q1;
    let denominator = r.perp_dot(s);
    if denominator.abs() < f32::EPSILON {
        return None;
    }
    let t = (q1 - p1).perp_dot(s) / denominator;
    let u = (q1 - p1).perp_dot(r) / denominator;
    ((0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u)).then(|| p1 + r * t)
}

impl Ship {
    fn ship_points_within(&self, position: Vec2, radius: f32) -> Vec<ElementIndex> {
        let square_radius = radius * radius;
        self.points
            .ship_points()
            .filter(|&p| self.points.position(p).distance_squared(position) <= square_radius)
            .collect()
    }

    /// Detach every ship point within the destroy radius and destroy the
    /// ephemeral particles there. Returns whether anything was hit.
    pub fn destroy_at(
        &mut self,
        position: Vec2,
        radius_multiplier: f32,
        current_simulation_time: f32,
        ocean_surface: &OceanSurface,
        parameters: &GameParameters,
    ) -> bool {
        let radius = parameters.destroy_radius * radius_multiplier;
        let square_radius = radius * radius;
        let targets = self.ship_points_within(position, radius);

        let options = DetachOptions {
            generate_debris: true,
            fire_destroy_event: true,
        };
        let (points, mut edit) = self.edit(ocean_surface);

        // Ephemeral particles go first, so the debris spawned below survives
        let mut destroyed_ephemeral_count = 0;
        for point_index in points.ephemeral_points() {
            if points.is_active(point_index) && points.position(point_index).distance_squared(position) <= square_radius {
                points.destroy_ephemeral_particle(point_index, ocean_surface);
                destroyed_ephemeral_count += 1;
            }
        }

        for &point_index in &targets {
            let velocity = points.velocity(point_index);
            points.detach(point_index, velocity, options, current_simulation_time, parameters, &mut edit);
        }

        !targets.is_empty() || destroyed_ephemeral_count > 0
    }

    /// Restore broken factory springs and triangles around a position.
    pub fn repair_at(
        &mut self,
        position: Vec2,
        radius_multiplier: f32,
        ocean_surface: &OceanSurface,
        parameters: &GameParameters,
    ) -> bool {
        let targets = self.ship_points_within(position, parameters.repair_radius * radius_multiplier);

        let mut repaired_springs: Vec<ElementIndex> = Vec::new();
        let (points, mut edit) = self.edit(ocean_surface);
        for &point_index in &targets {
            let factory_springs: Vec<ElementIndex> = points
                .factory_connected_springs(point_index)
                .iter()
                .map(|c| c.spring_index)
                .collect();
            for spring_index in factory_springs {
                if !edit.springs.is_deleted(spring_index) {
                    continue;
                }
                let length = edit.springs.length(spring_index, points);
                if length > edit.springs.rest_length(spring_index) * MAX_REPAIR_STRETCH {
                    continue;
                }
                if edit.restore_spring(points, spring_index) {
                    repaired_springs.push(spring_index);
                }
            }
        }

        for &spring_index in &repaired_springs {
            for triangle_index in edit.springs.factory_super_triangles(spring_index).to_vec() {
                edit.restore_triangle(points, triangle_index);
            }
        }

        for &point_index in &targets {
            if points.connected_springs(point_index).len() == points.factory_connected_springs(point_index).len() {
                points.restore_factory_is_leaking(point_index);
            }
        }

        if repaired_springs.is_empty() {
            return false;
        }

        let material_name = edit.springs.material(repaired_springs[0]).name.clone();
        edit.events.on_spring_repaired(&material_name, repaired_springs.len());
        debug!("Ship {}: repaired {} springs", self.id, repaired_springs.len());
        true
    }

    /// Cut every spring crossed by the segment, throwing sparkles.
    pub fn saw_through(
        &mut self,
        start: Vec2,
        end: Vec2,
        current_simulation_time: f32,
        ocean_surface: &OceanSurface,
        parameters: &GameParameters,
    ) -> bool {
        let cut_direction = (end - start).normalize_or_zero();
        let cuts: Vec<(ElementIndex, Vec2)> = self
            .springs
            .active()
            .filter_map(|s| {
                let (a, b) = self.springs.endpoints(s);
                segment_intersection(start, end, self.points.position(a), self.points.position(b)).map(|p| (s, p))
            })
            .collect();

        let (points, mut edit) = self.edit(ocean_surface);
        for &(spring_index, cut_point) in &cuts {
            if parameters.do_generate_sparkles && !edit.springs.is_rope(spring_index) {
                edit.generate_sparkles(points, spring_index, cut_point, cut_direction, current_simulation_time);
            }
            edit.destroy_spring(points, spring_index, true);
        }

        !cuts.is_empty()
    }

    pub fn apply_heat_blaster_at(
        &mut self,
        position: Vec2,
        action: HeatBlasterAction,
        radius: f32,
        parameters: &GameParameters,
    ) -> bool {
        let targets = self.ship_points_within(position, radius);
        let heat = parameters.heat_blaster_heat_flow
            * SIMULATION_STEP_TIME_DURATION
            * match action {
                HeatBlasterAction::Heat => 1.0,
                HeatBlasterAction::Cool => -1.0,
            };

        for &point_index in &targets {
            let heat_capacity = self.points.material_heat_capacity[point_index];
            if heat_capacity > 0.0 {
                let temperature = self.points.temperature(point_index) + heat / heat_capacity;
                self.points.set_temperature(point_index, temperature.max(0.0));
            }
        }

        !targets.is_empty()
    }

    pub fn extinguish_fire_at(&mut self, position: Vec2) -> bool {
        let targets: Vec<ElementIndex> = self
            .ship_points_within(position, FIRE_EXTINGUISHER_RADIUS)
            .into_iter()
            .filter(|&p| self.points.combustion_state(p).is_burning_for_smothering())
            .collect();
        for &point_index in &targets {
            self.points.smother_combustion(point_index);
        }
        !targets.is_empty()
    }

    /// Release one air bubble at `position` if it is underwater.
    pub fn inject_bubbles_at(
        &mut self,
        position: Vec2,
        current_simulation_time: f32,
        ocean_surface: &OceanSurface,
        parameters: &GameParameters,
    ) -> bool {
        if !parameters.do_generate_air_bubbles || !ocean_surface.is_underwater(position) {
            return false;
        }

        let rng = &mut self.points.rng;
        let vortex_amplitude = rng.gen_range(MIN_AIR_BUBBLES_VORTEX_AMPLITUDE..MAX_AIR_BUBBLES_VORTEX_AMPLITUDE);
        let vortex_period = rng.gen_range(MIN_AIR_BUBBLES_VORTEX_PERIOD..MAX_AIR_BUBBLES_VORTEX_PERIOD);
        self.points
            .create_ephemeral_particle_air_bubble(
                position,
                0.3,
                vortex_amplitude,
                vortex_period,
                &self.air_bubble_material,
                current_simulation_time,
                None,
            )
            .is_some()
    }

    /// Add (or with a negative multiplier remove) water around a position.
    pub fn flood_at(&mut self, position: Vec2, water_quantity_multiplier: f32, parameters: &GameParameters) -> bool {
        let targets = self.ship_points_within(position, parameters.flood_radius);
        let quantity = parameters.flood_quantity * water_quantity_multiplier;
        for &point_index in &targets {
            self.points.add_water(point_index, quantity);
        }
        !targets.is_empty()
    }

    /// Unpin the nearest pinned point, or pin the nearest free one.
    pub fn toggle_pin_at(&mut self, position: Vec2) -> bool {
        let nearest = |pinned: bool| {
            self.ship_points_within(position, PIN_RADIUS)
                .into_iter()
                .filter(|&p| self.points.is_pinned(p) == pinned)
                .min_by(|&a, &b| {
                    let distance_a = self.points.position(a).distance_squared(position);
                    let distance_b = self.points.position(b).distance_squared(position);
                    distance_a.total_cmp(&distance_b)
                })
        };

        let nearest_pinned = nearest(true);
        let nearest_free = nearest(false);
        match (nearest_pinned, nearest_free) {
            (Some(point_index), _) => self.points.unpin(point_index),
            (None, Some(point_index)) => self.points.pin(point_index),
            (None, None) => return false,
        }
        true
    }

    pub fn query_nearest_point_at(&self, position: Vec2, radius: f32) -> Option<ElementIndex> {
        self.ship_points_within(position, radius).into_iter().min_by(|&a, &b| {
            let distance_a = self.points.position(a).distance_squared(position);
            let distance_b = self.points.position(b).distance_squared(position);
            distance_a.total_cmp(&distance_b)
        })
    }

    pub fn set_switch_state(&mut self, element_index: ElementIndex, is_on: bool) -> bool {
        self.electrical.set_switch_state(element_index, is_on)
    }

    /// Number of points currently burning or developing a flame.
    pub fn burning_point_count(&self) -> usize {
        self.points
            .burning_points()
            .iter()
            .filter(|&&p| self.points.combustion_state(p).state != CombustionStateType::NotBurning)
            .count()
    }
}
