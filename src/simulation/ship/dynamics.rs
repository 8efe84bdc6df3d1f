//! Per-step continuous dynamics of a ship: forces and integration, sea-floor
//! collisions, water ingress and diffusion, heat transfer and rot.

use bevy::log::trace;
use bevy::prelude::Vec2;
use rand::Rng;

use super::{Environment, Ship};
use crate::simulation::ocean_floor::OceanFloor;
use crate::simulation::ocean_surface::OceanSurface;
use crate::simulation::physics_config::ephemeral::*;
use crate::simulation::physics_config::{
    GameParameters, AIR_MASS, GLOBAL_DAMPING, GRAVITY, HALF_MAX_WORLD_HEIGHT, HALF_MAX_WORLD_WIDTH,
    LOW_FREQUENCY_SIMULATION_STEP_TIME_DURATION, LOW_FREQUENCY_STRIDE, SIMULATION_STEP_TIME_DURATION,
    WATER_DRAG_LINEAR_COEFFICIENT, WATER_MASS,
};

/// Fraction of the pressure head difference that flows through a leak per second.
const WATER_FLOW_RATE: f32 = 0.5;
/// Upper bound of the fraction of water exchanged along one spring per step.
const MAX_WATER_DIFFUSION_FRACTION: f32 = 0.05;
const WATER_DIFFUSION_RATE: f32 = 0.05;

const MIN_AIR_BUBBLE_SIZE: f32 = 0.3;
const MAX_AIR_BUBBLE_SIZE: f32 = 1.0;

/// Per-second relaxation rates toward the ambient temperature.
const AIR_HEAT_DISSIPATION_RATE: f32 = 0.002;
const WATER_HEAT_DISSIPATION_RATE: f32 = 0.05;

/// Decay lost per low-frequency visit by a fully wet, fully rust-receptive point.
const ROT_RATE: f32 = 0.0002;

impl Ship {
    // ==================== MECHANICS ====================

    pub(super) fn update_mechanical_dynamics(&mut self, environment: &Environment<'_>, parameters: &GameParameters) {
        self.update_point_forces(environment, parameters);
        self.springs.reset_stress();

        let dt = parameters.mechanical_simulation_step_time_duration();
        let velocity_factor = (1.0 - GLOBAL_DAMPING * parameters.global_damping_adjustment).clamp(0.0, 1.0) / dt;

        for _ in 0..parameters.num_mechanical_dynamics_iterations() {
            self.points.spring_force.fill(Vec2::ZERO);
            self.springs.apply_forces(&mut self.points);
            self.integrate(dt, velocity_factor);
            self.handle_collisions_with_sea_floor(environment.ocean_floor, parameters);
        }

        self.trim_for_world_bounds();
    }

    /// Forces that stay constant across the mechanical iterations of a step.
    fn update_point_forces(&mut self, environment: &Environment<'_>, parameters: &GameParameters) {
        let wind_speed = environment.wind.current_speed_mps();
        let wind_force = wind_speed * wind_speed.length() * 0.5 * AIR_MASS;
        let water_mass = WATER_MASS * parameters.water_density_adjustment;
        let drag_coefficient = WATER_DRAG_LINEAR_COEFFICIENT * water_mass * parameters.water_drag_adjustment;

        let points = &mut self.points;
        for point_index in 0..points.all_point_count() {
            if !points.is_active(point_index) {
                points.external_force[point_index] = Vec2::ZERO;
                continue;
            }

            let mut force = GRAVITY * points.mass[point_index];
            if environment.ocean_surface.is_underwater(points.position[point_index]) {
                force += -GRAVITY * water_mass * points.material_buoyancy_volume_fill[point_index];
                force -= points.velocity[point_index] * drag_coefficient;
            } else {
                force += wind_force * points.material_wind_receptivity[point_index];
            }

            points.external_force[point_index] = force;
        }
    }

    fn integrate(&mut self, dt: f32, velocity_factor: f32) {
        let points = &mut self.points;
        for point_index in 0..points.all_point_count() {
            let force = points.spring_force[point_index] + points.external_force[point_index];
            let delta_position =
                points.velocity[point_index] * dt + force * points.integration_factor[point_index];
            points.position[point_index] += delta_position;
            points.velocity[point_index] = delta_position * velocity_factor;
        }
    }

    /// Push points back onto the floor, bouncing off the normal component
    /// and applying friction to the tangential one.
    fn handle_collisions_with_sea_floor(&mut self, ocean_floor: &OceanFloor, parameters: &GameParameters) {
        let points = &mut self.points;
        for point_index in 0..points.all_point_count() {
            if points.integration_factor[point_index] == 0.0 {
                continue;
            }

            let position = points.position[point_index];
            let floor_height = ocean_floor.height_at(position.x);
            if position.y >= floor_height {
                continue;
            }

            let slope = ocean_floor.height_at(position.x + 0.01) - floor_height;
            let normal = Vec2::new(-slope, 0.01).try_normalize().unwrap_or(Vec2::Y);
            points.position[point_index].y = floor_height;

            let velocity = points.velocity[point_index];
            let normal_speed = velocity.dot(normal);
            if normal_speed < 0.0 {
                let tangential = velocity - normal * normal_speed;
                points.velocity[point_index] = tangential * (1.0 - parameters.ocean_floor_friction)
                    - normal * normal_speed * parameters.ocean_floor_elasticity;
            }
        }
    }

    fn trim_for_world_bounds(&mut self) {
        let points = &mut self.points;
        for point_index in 0..points.all_point_count() {
            let position = points.position[point_index];
            let clamped = Vec2::new(
                position.x.clamp(-HALF_MAX_WORLD_WIDTH, HALF_MAX_WORLD_WIDTH),
                position.y.clamp(-HALF_MAX_WORLD_HEIGHT, HALF_MAX_WORLD_HEIGHT),
            );
            if clamped != position {
                points.position[point_index] = clamped;
                points.velocity[point_index] = Vec2::ZERO;
            }
        }
    }

    // ==================== WATER ====================

    pub(super) fn update_water_dynamics(
        &mut self,
        current_simulation_time: f32,
        ocean_surface: &OceanSurface,
        parameters: &GameParameters,
    ) {
        let water_taken = self.update_water_inflow(current_simulation_time, ocean_surface, parameters);
        if water_taken != 0.0 {
            self.events.on_water_taken(water_taken);
        }
        self.diffuse_water(parameters);
    }

    /// Exchange water between leaking points and the sea; returns the net
    /// quantity that entered the ship.
    fn update_water_inflow(
        &mut self,
        current_simulation_time: f32,
        ocean_surface: &OceanSurface,
        parameters: &GameParameters,
    ) -> f32 {
        let threshold = parameters.cumulated_intaken_water_threshold_for_air_bubbles;
        let mut water_taken = 0.0;

        for point_index in self.points.ship_points() {
            if !self.points.is_leaking[point_index] {
                continue;
            }

            let position = self.points.position[point_index];
            let external_water_height = (ocean_surface.height_at(position.x) - position.y).max(0.0);
            let internal_water_height = self.points.water[point_index];
            let head = external_water_height - internal_water_height;

            let rate = if head > 0.0 {
                self.points.material_water_intake[point_index] * parameters.water_intake_adjustment
            } else {
                self.points.material_water_restitution[point_index]
            };
            let delta = (head * rate * WATER_FLOW_RATE * SIMULATION_STEP_TIME_DURATION).max(-internal_water_height);
            if delta == 0.0 {
                continue;
            }

            self.points.water[point_index] += delta;
            water_taken += delta;

            if delta > 0.0 {
                self.points.cumulated_intaken_water[point_index] += delta;
                if self.points.cumulated_intaken_water[point_index] > threshold {
                    if parameters.do_generate_air_bubbles {
                        self.emit_air_bubble(point_index, current_simulation_time);
                    }
                    self.points.cumulated_intaken_water[point_index] = 0.0;
                }
            }
        }

        water_taken
    }

    fn emit_air_bubble(&mut self, point_index: usize, current_simulation_time: f32) {
        let rng = &mut self.points.rng;
        let initial_size = rng.gen_range(MIN_AIR_BUBBLE_SIZE..MAX_AIR_BUBBLE_SIZE);
        let vortex_amplitude = rng.gen_range(MIN_AIR_BUBBLES_VORTEX_AMPLITUDE..MAX_AIR_BUBBLES_VORTEX_AMPLITUDE);
        let vortex_period = rng.gen_range(MIN_AIR_BUBBLES_VORTEX_PERIOD..MAX_AIR_BUBBLES_VORTEX_PERIOD);

        let position = self.points.position(point_index);
        let plane_id = self.points.plane_id(point_index);
        if self
            .points
            .create_ephemeral_particle_air_bubble(
                position,
                initial_size,
                vortex_amplitude,
                vortex_period,
                &self.air_bubble_material,
                current_simulation_time,
                plane_id,
            )
            .is_none()
        {
            trace!("Ship {}: no free slot for an air bubble", self.id);
        }
    }

    /// Spread water along springs between non-hull points, in two phases so
    /// the result does not depend on spring order.
    fn diffuse_water(&mut self, parameters: &GameParameters) {
        let points = &mut self.points;
        self.water_scratch.clear();
        self.water_scratch.extend_from_slice(&points.water[..points.ship_point_count()]);

        for spring_index in self.springs.active() {
            let (point_a, point_b) = self.springs.endpoints(spring_index);
            if points.material_is_hull[point_a] || points.material_is_hull[point_b] {
                continue;
            }

            let speed = points.material_water_diffusion_speed[point_a]
                .min(points.material_water_diffusion_speed[point_b]);
            let fraction = (speed * parameters.water_diffusion_speed_adjustment * WATER_DIFFUSION_RATE)
                .clamp(0.0, MAX_WATER_DIFFUSION_FRACTION);
            let flow = (points.water[point_a] - points.water[point_b]) * fraction;

            self.water_scratch[point_a] -= flow;
            self.water_scratch[point_b] += flow;
        }

        for (water, &new_water) in points.water.iter_mut().zip(&self.water_scratch) {
            *water = new_water.max(0.0);
        }
    }

    // ==================== HEAT ====================

    pub(super) fn update_heat_dynamics(&mut self, ocean_surface: &OceanSurface, parameters: &GameParameters) {
        let dt = SIMULATION_STEP_TIME_DURATION;
        let points = &mut self.points;

        // Conduction
        self.temperature_scratch.clear();
        self.temperature_scratch
            .extend_from_slice(&points.temperature[..points.ship_point_count()]);
        for spring_index in self.springs.active() {
            let (point_a, point_b) = self.springs.endpoints(spring_index);
            let conductivity = points.material_thermal_conductivity[point_a]
                .min(points.material_thermal_conductivity[point_b])
                * parameters.thermal_conductivity_adjustment;
            let heat_capacity_a = points.material_heat_capacity[point_a];
            let heat_capacity_b = points.material_heat_capacity[point_b];

            let heat = (points.temperature[point_a] - points.temperature[point_b])
                * (conductivity * dt).min(0.5)
                * 0.5
                * heat_capacity_a.min(heat_capacity_b);
            self.temperature_scratch[point_a] -= heat / heat_capacity_a;
            self.temperature_scratch[point_b] += heat / heat_capacity_b;
        }
        points.temperature[..self.temperature_scratch.len()].copy_from_slice(&self.temperature_scratch);

        // Dissipation
        for point_index in points.ship_points() {
            let (ambient, rate) = if ocean_surface.is_underwater(points.position[point_index]) {
                (parameters.water_temperature, WATER_HEAT_DISSIPATION_RATE)
            } else {
                (parameters.air_temperature, AIR_HEAT_DISSIPATION_RATE)
            };
            let fraction = (rate * parameters.heat_dissipation_adjustment * dt).clamp(0.0, 1.0);
            points.temperature[point_index] += (ambient - points.temperature[point_index]) * fraction;
        }
    }

    // ==================== ROT ====================

    /// Visit one stride-partition of the ship points and let wet, rust-prone
    /// points lose decay.
    pub(super) fn rot_points(&mut self, offset: usize, ocean_surface: &OceanSurface, parameters: &GameParameters) {
        let rate = parameters.rot_acceleration * ROT_RATE * LOW_FREQUENCY_SIMULATION_STEP_TIME_DURATION;
        if rate <= 0.0 {
            return;
        }

        let points = &mut self.points;
        for point_index in (offset..points.ship_point_count()).step_by(LOW_FREQUENCY_STRIDE) {
            let wetness = if ocean_surface.is_underwater(points.position[point_index]) {
                1.0
            } else {
                points.water[point_index].min(1.0)
            };
            let loss = points.material_rust_receptivity[point_index] * wetness * rate;
            points.decay[point_index] *= (1.0 - loss).clamp(0.0, 1.0);
        }
    }
}
