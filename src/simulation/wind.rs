//! Wind: a base speed along the world X axis plus an optional gust model.
//!
//! Speeds are in km/h. With modulation on, the wind alternates between a
//! calm phase at base speed and gusting phases where the speed jitters
//! between the base and `base * max_factor`.

use bevy::log::debug;
use bevy::prelude::Vec2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::physics_config::{GameParameters, WIND_DIRECTION};

/// Mean duration of the calm phase at unit gust frequency, in seconds.
const MEAN_CALM_DURATION: f32 = 12.0;
const MIN_GUST_DURATION: f32 = 1.0;
const MAX_GUST_DURATION: f32 = 4.0;
/// Time between two gust target changes, in seconds.
const GUST_JITTER_INTERVAL: f32 = 0.25;
/// Fraction of the distance to the target covered each step.
const SPEED_CONVERGENCE_RATE: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq)]
enum GustPhase {
    Calm { end_time: f32 },
    Gusting { end_time: f32, next_jitter_time: f32 },
}

#[derive(Debug, Clone)]
pub struct Wind {
    base_speed_magnitude: f32,
    max_speed_magnitude: f32,
    target_speed_magnitude: f32,
    current_speed_magnitude: f32,
    phase: GustPhase,
    last_parameters: Option<(f32, f32)>,
    rng: StdRng,
}

impl Wind {
    pub fn new(seed: u64) -> Self {
        Self {
            base_speed_magnitude: 0.0,
            max_speed_magnitude: 0.0,
            target_speed_magnitude: 0.0,
            current_speed_magnitude: 0.0,
            phase: GustPhase::Calm { end_time: 0.0 },
            last_parameters: None,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn update(&mut self, current_simulation_time: f32, parameters: &GameParameters) {
        let snapshot = (parameters.wind_speed_base, parameters.wind_speed_max_factor);
        if self.last_parameters != Some(snapshot) {
            self.base_speed_magnitude = parameters.wind_speed_base;
            self.max_speed_magnitude = parameters.wind_speed_base * parameters.wind_speed_max_factor;
            self.last_parameters = Some(snapshot);
            debug!(
                "Wind base {} km/h, max {} km/h",
                self.base_speed_magnitude, self.max_speed_magnitude
            );
        }

        if !parameters.do_modulate_wind {
            self.phase = GustPhase::Calm {
                end_time: current_simulation_time,
            };
            self.target_speed_magnitude = self.base_speed_magnitude;
            self.current_speed_magnitude = self.base_speed_magnitude;
            return;
        }

        let frequency = parameters.wind_gust_frequency_adjustment.max(0.01);
        match self.phase {
            GustPhase::Calm { end_time } => {
                self.target_speed_magnitude = self.base_speed_magnitude;
                if current_simulation_time >= end_time {
                    let duration = self.rng.gen_range(MIN_GUST_DURATION..MAX_GUST_DURATION);
                    self.phase = GustPhase::Gusting {
                        end_time: current_simulation_time + duration,
                        next_jitter_time: current_simulation_time,
                    };
                }
            }
            GustPhase::Gusting {
                end_time,
                next_jitter_time,
            } => {
                if current_simulation_time >= end_time {
                    // Exponentially distributed calm time
                    let u: f32 = self.rng.gen_range(f32::EPSILON..1.0);
                    let duration = -u.ln() * MEAN_CALM_DURATION / frequency;
                    self.phase = GustPhase::Calm {
                        end_time: current_simulation_time + duration,
                    };
                    self.target_speed_magnitude = self.base_speed_magnitude;
                } else if current_simulation_time >= next_jitter_time {
                    let fraction: f32 = self.rng.gen();
                    self.target_speed_magnitude = self.base_speed_magnitude
                        + (self.max_speed_magnitude - self.base_speed_magnitude) * fraction;
                    self.phase = GustPhase::Gusting {
                        end_time,
                        next_jitter_time: next_jitter_time + GUST_JITTER_INTERVAL,
                    };
                }
            }
        }

        self.current_speed_magnitude +=
            (self.target_speed_magnitude - self.current_speed_magnitude) * SPEED_CONVERGENCE_RATE;
    }

    /// Current wind velocity, in km/h.
    pub fn current_speed(&self) -> Vec2 {
        WIND_DIRECTION * self.current_speed_magnitude
    }

    /// Current wind velocity, in m/s.
    pub fn current_speed_mps(&self) -> Vec2 {
        self.current_speed() / 3.6
    }

    pub fn current_speed_magnitude(&self) -> f32 {
        self.current_speed_magnitude
    }

    pub fn base_speed_magnitude(&self) -> f32 {
        self.base_speed_magnitude
    }

    pub fn max_speed_magnitude(&self) -> f32 {
        self.max_speed_magnitude
    }

    pub fn is_gusting(&self) -> bool {
        matches!(self.phase, GustPhase::Gusting { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::physics_config::SIMULATION_STEP_TIME_DURATION;

    #[test]
    fn unmodulated_wind_equals_base() {
        let parameters = GameParameters {
            do_modulate_wind: false,
            wind_speed_base: 30.0,
            ..Default::default()
        };
        let mut wind = Wind::new(1);
        wind.update(0.02, &parameters);
        assert_eq!(wind.current_speed(), Vec2::new(30.0, 0.0));
        assert_eq!(wind.max_speed_magnitude(), 30.0 * parameters.wind_speed_max_factor);
    }

    #[test]
    fn gusts_stay_between_base_and_max() {
        let parameters = GameParameters {
            wind_speed_base: -20.0,
            wind_speed_max_factor: 3.0,
            ..Default::default()
        };
        let mut wind = Wind::new(7);
        let mut saw_gust = false;
        for step in 1..20_000 {
            wind.update(step as f32 * SIMULATION_STEP_TIME_DURATION, &parameters);
            saw_gust |= wind.is_gusting();
            let magnitude = wind.current_speed_magnitude();
            assert!(magnitude <= 0.0 && magnitude >= -60.0, "speed {magnitude} out of range");
        }
        assert!(saw_gust);
    }
}
