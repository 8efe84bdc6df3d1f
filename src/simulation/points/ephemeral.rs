//! Ephemeral particles: air bubbles, debris and sparkles.
//!
//! They live in the pool following the ship points. A slot is free when its
//! state is [`EphemeralState::None`]; when the pool is full, forced requests
//! evict the oldest particle.

use std::f32::consts::TAU;
use std::sync::Arc;

use bevy::prelude::Vec2;
use rand::Rng;

use super::{ElementIndex, PlaneId, Points};
use crate::simulation::materials::StructuralMaterial;
use crate::simulation::ocean_surface::OceanSurface;
use crate::simulation::physics_config::ephemeral::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EphemeralType {
    None,
    AirBubble,
    Debris,
    Sparkle,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AirBubbleState {
    pub frame_index: u32,
    pub initial_size: f32,
    pub vortex_amplitude: f32,
    /// Vortex revolutions per second.
    pub normalized_vortex_angular_velocity: f32,
    /// Distance below the surface at the last update.
    pub current_delta_y: f32,
    /// 1 at the surface, approaching 0 at depth.
    pub progress: f32,
    pub last_vortex_value: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SparkleState {
    pub frame_index: u32,
    /// Fraction of the lifetime elapsed.
    pub progress: f32,
}

/// Per-particle payload, tagged by particle type.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum EphemeralState {
    #[default]
    None,
    AirBubble(AirBubbleState),
    Debris,
    Sparkle(SparkleState),
}

impl EphemeralState {
    pub fn ephemeral_type(&self) -> EphemeralType {
        match self {
            EphemeralState::None => EphemeralType::None,
            EphemeralState::AirBubble(_) => EphemeralType::AirBubble,
            EphemeralState::Debris => EphemeralType::Debris,
            EphemeralState::Sparkle(_) => EphemeralType::Sparkle,
        }
    }
}

impl Points {
    /// Spawn an air bubble if a slot is free; never evicts.
    #[allow(clippy::too_many_arguments)]
    pub fn create_ephemeral_particle_air_bubble(
        &mut self,
        position: Vec2,
        initial_size: f32,
        vortex_amplitude: f32,
        vortex_period: f32,
        material: &Arc<StructuralMaterial>,
        current_simulation_time: f32,
        plane_id: Option<PlaneId>,
    ) -> Option<ElementIndex> {
        let point_index = self.find_free_ephemeral_particle(current_simulation_time, false)?;
        self.setup_ephemeral_particle(point_index, position, Vec2::ZERO, material, current_simulation_time, plane_id);

        self.material_wind_receptivity[point_index] = 0.0;
        self.ephemeral_max_lifetime[point_index] = f32::MAX;
        self.ephemeral_state[point_index] = EphemeralState::AirBubble(AirBubbleState {
            frame_index: self.rng.gen_range(0..2),
            initial_size,
            vortex_amplitude,
            normalized_vortex_angular_velocity: 1.0 / vortex_period,
            current_delta_y: 0.0,
            progress: 0.0,
            last_vortex_value: 0.0,
        });

        Some(point_index)
    }

    /// Spawn a debris particle, evicting the oldest particle when full.
    pub fn create_ephemeral_particle_debris(
        &mut self,
        position: Vec2,
        velocity: Vec2,
        material: &Arc<StructuralMaterial>,
        current_simulation_time: f32,
        max_lifetime: f32,
        plane_id: Option<PlaneId>,
    ) -> Option<ElementIndex> {
        let point_index = self.find_free_ephemeral_particle(current_simulation_time, true)?;
        self.setup_ephemeral_particle(point_index, position, velocity, material, current_simulation_time, plane_id);

        // No buoyancy
        self.material_buoyancy_volume_fill[point_index] = 0.0;
        self.material_water_volume_fill[point_index] = 0.0;
        self.material_wind_receptivity[point_index] = DEBRIS_WIND_RECEPTIVITY;
        self.ephemeral_max_lifetime[point_index] = max_lifetime;
        self.ephemeral_state[point_index] = EphemeralState::Debris;

        Some(point_index)
    }

    /// Spawn a sparkle, evicting the oldest particle when full.
    pub fn create_ephemeral_particle_sparkle(
        &mut self,
        position: Vec2,
        velocity: Vec2,
        material: &Arc<StructuralMaterial>,
        current_simulation_time: f32,
        max_lifetime: f32,
        plane_id: Option<PlaneId>,
    ) -> Option<ElementIndex> {
        let point_index = self.find_free_ephemeral_particle(current_simulation_time, true)?;
        self.setup_ephemeral_particle(point_index, position, velocity, material, current_simulation_time, plane_id);

        self.material_buoyancy_volume_fill[point_index] = 0.0;
        self.material_water_volume_fill[point_index] = 0.0;
        self.temperature[point_index] = SPARKLE_TEMPERATURE;
        self.material_wind_receptivity[point_index] = SPARKLE_WIND_RECEPTIVITY;
        self.ephemeral_max_lifetime[point_index] = max_lifetime;
        self.ephemeral_state[point_index] = EphemeralState::Sparkle(SparkleState {
            frame_index: self.rng.gen_range(0..2),
            progress: 0.0,
        });

        Some(point_index)
    }

    fn setup_ephemeral_particle(
        &mut self,
        point_index: ElementIndex,
        position: Vec2,
        velocity: Vec2,
        material: &Arc<StructuralMaterial>,
        current_simulation_time: f32,
        plane_id: Option<PlaneId>,
    ) {
        self.assign_material(point_index, material);
        self.position[point_index] = position;
        self.velocity[point_index] = velocity;
        self.material_rust_receptivity[point_index] = 0.0;
        self.ephemeral_start_time[point_index] = current_simulation_time;
        self.connected_component_id[point_index] = None;
        self.plane_id[point_index] = plane_id;
        self.thaw(point_index);
    }

    /// Round-robin search for a free slot; with `force`, fall back to the
    /// oldest live particle.
    pub fn find_free_ephemeral_particle(&mut self, current_simulation_time: f32, force: bool) -> Option<ElementIndex> {
        if self.ephemeral_point_count == 0 {
            return None;
        }

        debug_assert!(
            self.free_ephemeral_particle_search_start_index >= self.ship_point_count
                && self.free_ephemeral_particle_search_start_index < self.all_point_count
        );

        let mut oldest_particle = None;
        let mut oldest_particle_lifetime = 0.0_f32;

        let start = self.free_ephemeral_particle_search_start_index;
        let mut point_index = start;
        loop {
            if matches!(self.ephemeral_state[point_index], EphemeralState::None) {
                self.free_ephemeral_particle_search_start_index = self.next_ephemeral_index(point_index);
                return Some(point_index);
            }

            let lifetime = current_simulation_time - self.ephemeral_start_time[point_index];
            if lifetime >= oldest_particle_lifetime {
                oldest_particle = Some(point_index);
                oldest_particle_lifetime = lifetime;
            }

            point_index = self.next_ephemeral_index(point_index);
            if point_index == start {
                break;
            }
        }

        if !force {
            return None;
        }

        let oldest_particle = oldest_particle?;
        self.free_ephemeral_particle_search_start_index = self.next_ephemeral_index(oldest_particle);
        Some(oldest_particle)
    }

    fn next_ephemeral_index(&self, point_index: ElementIndex) -> ElementIndex {
        if point_index + 1 >= self.all_point_count {
            self.ship_point_count
        } else {
            point_index + 1
        }
    }

    /// Hide a particle and stop it from drifting.
    pub fn expire_ephemeral_particle(&mut self, point_index: ElementIndex) {
        self.freeze(point_index);
        self.ephemeral_state[point_index] = EphemeralState::None;
    }

    /// Destroy a live particle, notifying listeners with its material.
    pub fn destroy_ephemeral_particle(&mut self, point_index: ElementIndex, ocean_surface: &OceanSurface) {
        debug_assert!(point_index >= self.ship_point_count);
        let is_underwater = ocean_surface.is_underwater(self.position[point_index]);
        self.events.on_destroy(self.material_name(point_index), is_underwater, 1);
        self.expire_ephemeral_particle(point_index);
    }

    pub fn ephemeral_type(&self, point_index: ElementIndex) -> EphemeralType {
        self.ephemeral_state[point_index].ephemeral_type()
    }

    pub fn ephemeral_state(&self, point_index: ElementIndex) -> &EphemeralState {
        &self.ephemeral_state[point_index]
    }

    pub fn active_ephemeral_particle_count(&self) -> usize {
        self.ephemeral_points()
            .filter(|&p| !matches!(self.ephemeral_state[p], EphemeralState::None))
            .count()
    }

    /// Run every live particle's lifecycle.
    pub fn update_ephemeral_particles(&mut self, current_simulation_time: f32, ocean_surface: &OceanSurface) {
        let mut surfaced_bubbles = 0;

        for point_index in self.ephemeral_points() {
            let elapsed_lifetime = current_simulation_time - self.ephemeral_start_time[point_index];
            let max_lifetime = self.ephemeral_max_lifetime[point_index];

            let state = self.ephemeral_state[point_index];
            match state {
                EphemeralState::None => {}
                EphemeralState::AirBubble(mut bubble) => {
                    if self.is_pinned[point_index] {
                        continue;
                    }

                    let position = self.position[point_index];
                    let delta_y = ocean_surface.height_at(position.x) - position.y;
                    if delta_y <= 0.0 {
                        self.expire_ephemeral_particle(point_index);
                        surfaced_bubbles += 1;
                        continue;
                    }

                    bubble.current_delta_y = delta_y;
                    bubble.progress = -1.0 / (-1.0 + position.y.min(0.0));

                    let vortex_amplitude = bubble.vortex_amplitude + bubble.progress;
                    let vortex_value =
                        vortex_amplitude * (TAU * bubble.normalized_vortex_angular_velocity * elapsed_lifetime).sin();
                    self.position[point_index].x += vortex_value - bubble.last_vortex_value;
                    bubble.last_vortex_value = vortex_value;

                    self.ephemeral_state[point_index] = EphemeralState::AirBubble(bubble);
                }
                EphemeralState::Debris => {
                    if elapsed_lifetime >= max_lifetime {
                        self.expire_ephemeral_particle(point_index);
                    } else {
                        self.color[point_index][3] = (1.0 - elapsed_lifetime / max_lifetime).max(0.0);
                    }
                }
                EphemeralState::Sparkle(mut sparkle) => {
                    if elapsed_lifetime >= max_lifetime {
                        self.expire_ephemeral_particle(point_index);
                    } else {
                        sparkle.progress = elapsed_lifetime / max_lifetime;
                        self.ephemeral_state[point_index] = EphemeralState::Sparkle(sparkle);
                    }
                }
            }
        }

        if surfaced_bubbles > 0 {
            self.events.on_air_bubble_surfaced(surfaced_bubbles);
        }
    }
}
