//! Combustion state machine.
//!
//! Ignition and consumption are evaluated at low frequency over a strided
//! subset of points; flame development and heat release run every step over
//! the burning set only.

use bevy::log::trace;
use rand::Rng;

use super::{ElementIndex, Points};
use crate::simulation::numerics::smooth_step;
use crate::simulation::ocean_surface::OceanSurface;
use crate::simulation::physics_config::combustion::*;
use crate::simulation::physics_config::{GameParameters, GRAVITY_NORMALIZED};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CombustionStateType {
    #[default]
    NotBurning,
    Developing1,
    Developing2,
    Burning,
    ExtinguishingConsumed,
    ExtinguishingSmothered,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CombustionState {
    pub state: CombustionStateType,
    pub flame_development: f32,
    pub max_flame_development: f32,
    /// Random value in [0, 1) assigned at ignition.
    pub personality: f32,
}

impl CombustionState {
    /// Whether the flame can still be smothered.
    pub fn is_burning_for_smothering(&self) -> bool {
        matches!(
            self.state,
            CombustionStateType::Developing1
                | CombustionStateType::Developing2
                | CombustionStateType::Burning
                | CombustionStateType::ExtinguishingConsumed
        )
    }
}

impl Points {
    /// Visit points `offset, offset + stride, ...` for ignition and
    /// consumption, then admit a capped number of ignition candidates.
    pub fn update_combustion_low_frequency(
        &mut self,
        point_offset: usize,
        point_stride: usize,
        dt: f32,
        ocean_surface: &OceanSurface,
        parameters: &GameParameters,
    ) {
        debug_assert!(point_stride > 0);
        self.ignition_candidates.clear();

        // The higher this is, the slower fire consumes materials
        let effective_combustion_decay_rate = COMBUSTION_DECAY_STEPS / (parameters.combustion_speed_adjustment * dt);

        for point_index in (point_offset..self.ship_point_count).step_by(point_stride) {
            let effective_ignition_temperature =
                self.material_ignition_temperature[point_index] * parameters.ignition_temperature_adjustment;

            match self.combustion_state[point_index].state {
                CombustionStateType::NotBurning => {
                    if self.temperature[point_index] >= effective_ignition_temperature + IGNITION_TEMPERATURE_HIGH_WATERMARK
                        && !ocean_surface.is_underwater(self.position[point_index])
                        && self.water[point_index] < SMOTHERING_WATER_LOW_WATERMARK
                        && self.decay[point_index] > SMOTHERING_DECAY_HIGH_WATERMARK
                    {
                        let margin = (self.temperature[point_index] - effective_ignition_temperature)
                            / effective_ignition_temperature;
                        self.ignition_candidates.push((point_index, margin));
                    }
                }
                CombustionStateType::Burning => {
                    if self.temperature[point_index] <= effective_ignition_temperature + IGNITION_TEMPERATURE_LOW_WATERMARK
                        || self.decay[point_index] < SMOTHERING_DECAY_LOW_WATERMARK
                    {
                        self.combustion_state[point_index].state = CombustionStateType::ExtinguishingConsumed;
                        self.events.on_point_combustion_end();
                    } else {
                        // Reference mass decays to 1% in the configured number of steps;
                        // one tenth of the mass takes 0.7 times as long
                        let mass_multiplier = (self.material_mass[point_index] / REFERENCE_COMBUSTION_MASS).powf(0.15);
                        let total_decay_steps = effective_combustion_decay_rate * mass_multiplier;
                        let decay_alpha = 0.01_f32.powf(1.0 / total_decay_steps);

                        self.decay[point_index] *= decay_alpha;
                        for connected in self.connected_springs[point_index].iter() {
                            self.decay[connected.other_endpoint_index] *= decay_alpha;
                        }
                    }
                }
                _ => {}
            }
        }

        let remaining_capacity = parameters.max_burning_particles.saturating_sub(self.burning_points.len());
        let max_points = (4 + self.rng.gen_range(0..6_usize))
            .min(remaining_capacity)
            .min(self.ignition_candidates.len());
        if max_points == 0 {
            return;
        }

        // Highest margins first
        self.ignition_candidates
            .select_nth_unstable_by(max_points - 1, |a, b| b.1.total_cmp(&a.1));

        for i in 0..max_points {
            let (point_index, margin) = self.ignition_candidates[i];
            self.ignite(point_index, margin);
        }
    }

    fn ignite(&mut self, point_index: ElementIndex, margin: f32) {
        let flame_development = 0.1 + 0.5 * smooth_step(0.0, 2.0, margin);
        let personality: f32 = self.rng.gen();
        // Chains get smaller flames
        let delta_size_due_to_connected_springs = self.connected_springs[point_index].len() as f32 * 0.0625;

        self.combustion_state[point_index] = CombustionState {
            state: CombustionStateType::Developing1,
            flame_development,
            max_flame_development: (0.25 + delta_size_due_to_connected_springs + 0.5 * personality)
                .max(flame_development),
            personality,
        };

        // Before others at the same plane, so it's drawn behind them
        let plane_id = self.plane_id[point_index];
        let insert_at = self
            .burning_points
            .partition_point(|&p| self.plane_id[p] < plane_id);
        debug_assert!(!self.burning_points.contains(&point_index));
        self.burning_points.insert(insert_at, point_index);

        trace!("Point {} ignited (margin {:.3})", point_index, margin);
        self.events.on_point_combustion_begin();
    }

    /// Advance every burning point's flame and release heat.
    pub fn update_combustion_high_frequency(
        &mut self,
        dt: f32,
        ocean_surface: &OceanSurface,
        parameters: &GameParameters,
    ) {
        let effective_combustion_heat = COMBUSTION_HEAT * dt * parameters.combustion_heat_adjustment;

        let mut extinguished = Vec::new();

        for burning_index in 0..self.burning_points.len() {
            let point_index = self.burning_points[burning_index];
            let current_state = self.combustion_state[point_index].state;

            if self.combustion_state[point_index].is_burning_for_smothering()
                && (ocean_surface.is_underwater(self.position[point_index])
                    || self.water[point_index] > SMOTHERING_WATER_HIGH_WATERMARK)
            {
                self.smother_combustion(point_index);
            } else if current_state == CombustionStateType::Burning {
                self.temperature[point_index] = self.material_ignition_temperature[point_index]
                    * parameters.ignition_temperature_adjustment
                    * BURNING_TEMPERATURE_FACTOR;

                let position = self.position[point_index];
                for connected in self.connected_springs[point_index].iter() {
                    let other = connected.other_endpoint_index;
                    // 3.2 upwards, 0.2 downwards, 1.7 sideways
                    let spring_dir = (self.position[other] - position).normalize_or_zero();
                    let dir_alpha = 0.2 + 1.5 * (1.0 - spring_dir.dot(GRAVITY_NORMALIZED));
                    self.temperature[other] +=
                        effective_combustion_heat * dir_alpha / self.material_heat_capacity[other];
                }
            }

            let state = &mut self.combustion_state[point_index];
            match state.state {
                CombustionStateType::Developing1 => {
                    // From 0.1, reaches 1.21 after 25 steps (0.5s)
                    state.flame_development += 0.105 * state.flame_development;
                    if state.flame_development > state.max_flame_development + 0.2 {
                        state.state = CombustionStateType::Developing2;
                    }
                }
                CombustionStateType::Developing2 => {
                    // From 0.2, falls below 0.02 after 10 steps (0.2s)
                    let mut extra_flame_development = state.flame_development - state.max_flame_development;
                    extra_flame_development -= 0.2 * extra_flame_development;
                    state.flame_development = state.max_flame_development + extra_flame_development;
                    if extra_flame_development < 0.02 {
                        state.state = CombustionStateType::Burning;
                        state.flame_development = state.max_flame_development;
                    }
                }
                CombustionStateType::ExtinguishingConsumed | CombustionStateType::ExtinguishingSmothered => {
                    if state.state == CombustionStateType::ExtinguishingConsumed {
                        // From 1, below 0.02 after 75 steps (1.5s)
                        state.flame_development -=
                            0.0625 * (state.max_flame_development - state.flame_development + 0.01);
                    } else {
                        // From 1, below 0.02 after 10 steps (0.2s)
                        state.flame_development -= 0.3 * state.flame_development;
                    }

                    if state.flame_development <= 0.02 {
                        state.state = CombustionStateType::NotBurning;
                        extinguished.push(point_index);
                    }
                }
                CombustionStateType::Burning | CombustionStateType::NotBurning => {}
            }
        }

        if !extinguished.is_empty() {
            self.burning_points.retain(|p| !extinguished.contains(p));
        }
    }

    /// Start the fast extinguishing path for a burning point.
    pub fn smother_combustion(&mut self, point_index: ElementIndex) {
        let state = &mut self.combustion_state[point_index];
        debug_assert!(state.is_burning_for_smothering());

        if matches!(
            state.state,
            CombustionStateType::Developing1 | CombustionStateType::Developing2 | CombustionStateType::Burning
        ) {
            self.events.on_point_combustion_end();
        }
        state.state = CombustionStateType::ExtinguishingSmothered;
        self.events.on_combustion_smothered();
    }

    /// Re-sort the burning set after plane ids changed.
    pub(crate) fn reorder_burning_points_for_depth(&mut self) {
        let plane_id = &self.plane_id;
        self.burning_points.sort_by_key(|&p| plane_id[p]);
    }
}

#[cfg(test)]
mod tests {
    use bevy::prelude::Vec2;

    use super::*;
    use crate::simulation::events::{EventRecorder, GameEvent};
    use crate::simulation::materials::{builtin, MaterialDatabase};
    use crate::simulation::points::tests::{make_points, test_parameters};

    fn ignition_temperature() -> f32 {
        MaterialDatabase::builtin()
            .structural(builtin::WOOD)
            .unwrap()
            .ignition_temperature
    }

    #[test]
    fn admission_is_capped_and_prefers_hottest() {
        let parameters = test_parameters();
        let ocean = OceanSurface::new();
        let mut points = make_points(20, &parameters);
        let ignition = ignition_temperature();
        for p in 0..20 {
            // Distinct margins, hottest last
            points.set_temperature(p, ignition + 10.0 * (p as f32 + 1.0));
        }

        points.update_combustion_low_frequency(0, 1, 1.0, &ocean, &parameters);

        let ignited: Vec<ElementIndex> = (0..20)
            .filter(|&p| points.combustion_state(p).state == CombustionStateType::Developing1)
            .collect();
        assert!((4..=9).contains(&ignited.len()), "ignited {}", ignited.len());
        let top: Vec<ElementIndex> = (20 - ignited.len()..20).collect();
        assert_eq!(ignited, top);
        assert_eq!(points.burning_points().len(), ignited.len());
    }

    #[test]
    fn admission_respects_remaining_capacity() {
        let mut parameters = test_parameters();
        parameters.max_burning_particles = 2;
        let ocean = OceanSurface::new();
        let mut points = make_points(20, &parameters);
        let ignition = ignition_temperature();
        for p in 0..20 {
            points.set_temperature(p, ignition + 1.0);
        }
        points.update_combustion_low_frequency(0, 1, 1.0, &ocean, &parameters);
        assert_eq!(points.burning_points().len(), 2);
        points.update_combustion_low_frequency(0, 1, 1.0, &ocean, &parameters);
        assert_eq!(points.burning_points().len(), 2);
    }

    #[test]
    fn stride_only_visits_selected_points() {
        let parameters = test_parameters();
        let ocean = OceanSurface::new();
        let mut points = make_points(6, &parameters);
        let ignition = ignition_temperature();
        for p in 0..6 {
            points.set_temperature(p, ignition + 50.0);
        }
        points.update_combustion_low_frequency(1, 3, 1.0, &ocean, &parameters);
        let ignited: Vec<ElementIndex> = (0..6)
            .filter(|&p| points.combustion_state(p).state != CombustionStateType::NotBurning)
            .collect();
        assert_eq!(ignited, vec![1, 4]);
    }

    #[test]
    fn submerged_points_do_not_ignite() {
        let parameters = test_parameters();
        let ocean = OceanSurface::new();
        let mut points = make_points(3, &parameters);
        for p in 0..3 {
            points.set_position(p, Vec2::new(p as f32, -5.0));
            points.set_temperature(p, ignition_temperature() + 100.0);
        }
        points.update_combustion_low_frequency(0, 1, 1.0, &ocean, &parameters);
        assert!(points.burning_points().is_empty());
    }

    #[test]
    fn flame_develops_then_burns() {
        let parameters = test_parameters();
        let ocean = OceanSurface::new();
        let mut points = make_points(1, &parameters);
        points.set_temperature(0, ignition_temperature() + 10.0);
        points.update_combustion_low_frequency(0, 1, 1.0, &ocean, &parameters);
        assert_eq!(points.combustion_state(0).state, CombustionStateType::Developing1);

        let mut seen_developing_2 = false;
        for _ in 0..200 {
            points.update_combustion_high_frequency(0.02, &ocean, &parameters);
            seen_developing_2 |= points.combustion_state(0).state == CombustionStateType::Developing2;
            if points.combustion_state(0).state == CombustionStateType::Burning {
                break;
            }
        }
        assert!(seen_developing_2);
        let state = points.combustion_state(0);
        assert_eq!(state.state, CombustionStateType::Burning);
        assert_eq!(state.flame_development, state.max_flame_development);
    }

    #[test]
    fn smothering_ends_combustion_and_notifies() {
        let parameters = test_parameters();
        let ocean = OceanSurface::new();
        let recorder = EventRecorder::new();
        let mut points = make_points(1, &parameters);
        points.events = recorder.clone();
        points.set_temperature(0, ignition_temperature() + 10.0);
        points.update_combustion_low_frequency(0, 1, 1.0, &ocean, &parameters);

        points.set_position(0, Vec2::new(0.0, -3.0));
        for _ in 0..30 {
            points.update_combustion_high_frequency(0.02, &ocean, &parameters);
        }

        assert_eq!(points.combustion_state(0).state, CombustionStateType::NotBurning);
        assert!(points.burning_points().is_empty());
        let events = recorder.drain();
        assert!(events.contains(&GameEvent::CombustionBegin));
        assert!(events.contains(&GameEvent::CombustionEnd));
        assert!(events.contains(&GameEvent::CombustionSmothered));
    }

    #[test]
    fn burning_decays_self_and_neighbors_monotonically() {
        let parameters = test_parameters();
        let ocean = OceanSurface::new();
        let mut points = make_points(2, &parameters);
        points.connect_spring(0, 0, 1, true);
        points.connect_spring(1, 0, 0, false);
        points.combustion_state[0] = CombustionState {
            state: CombustionStateType::Burning,
            flame_development: 0.5,
            max_flame_development: 0.5,
            personality: 0.0,
        };
        points.burning_points.push(0);
        points.set_temperature(0, ignition_temperature() * 1.1);

        let mut previous = (points.decay(0), points.decay(1));
        for _ in 0..10 {
            points.update_combustion_low_frequency(0, 1, 1.0, &ocean, &parameters);
            let current = (points.decay(0), points.decay(1));
            assert!(current.0 < previous.0 && current.1 < previous.1);
            assert!(current.0 >= 0.0 && current.1 >= 0.0);
            previous = current;
        }
    }

    #[test]
    fn burning_point_heats_upper_neighbor_more() {
        let parameters = test_parameters();
        let ocean = OceanSurface::new();
        let mut points = make_points(3, &parameters);
        points.set_position(0, Vec2::new(0.0, 10.0));
        points.set_position(1, Vec2::new(0.0, 11.0));
        points.set_position(2, Vec2::new(0.0, 9.0));
        points.connect_spring(0, 0, 1, true);
        points.connect_spring(0, 1, 2, true);
        points.combustion_state[0] = CombustionState {
            state: CombustionStateType::Burning,
            flame_development: 0.5,
            max_flame_development: 0.5,
            personality: 0.0,
        };
        points.burning_points.push(0);

        points.update_combustion_high_frequency(0.02, &ocean, &parameters);
        let above = points.temperature(1);
        let below = points.temperature(2);
        assert!(above > below);
        assert!(below > crate::simulation::physics_config::INITIAL_TEMPERATURE);
    }
}
