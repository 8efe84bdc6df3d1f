//! Physics configuration: calibrated constants and the per-step parameter snapshot.
//!
//! Constants that never change at runtime live in the small `pub mod` blocks
//! below. Everything a user may tune lives in [`GameParameters`], which is
//! passed by reference into every `update` call; derived caches compare
//! against the last snapshot they saw and recompute only on change.

use bevy::prelude::{Resource, Vec2};
use serde::Deserialize;

use crate::error::{ConfigError, WreckageError};

// ==================== SIMULATION CONSTANTS ====================

/// Duration of one simulation step, in seconds.
pub const SIMULATION_STEP_TIME_DURATION: f32 = 0.02;

/// Time between two low-frequency visits of the same point, in seconds.
pub const LOW_FREQUENCY_SIMULATION_STEP_TIME_DURATION: f32 = 1.0;

/// Number of steps over which the low-frequency passes visit every point once.
pub const LOW_FREQUENCY_STRIDE: usize =
    (LOW_FREQUENCY_SIMULATION_STEP_TIME_DURATION / SIMULATION_STEP_TIME_DURATION) as usize;

pub const GRAVITY: Vec2 = Vec2::new(0.0, -9.80);
pub const GRAVITY_NORMALIZED: Vec2 = Vec2::new(0.0, -1.0);
pub const GRAVITY_MAGNITUDE: f32 = 9.80;

/// Mass of one cubic meter of air, in kg.
pub const AIR_MASS: f32 = 1.2754;
/// Mass of one cubic meter of sea water, in kg.
pub const WATER_MASS: f32 = 1000.0;

/// Temperature every point starts at, in Kelvin.
pub const INITIAL_TEMPERATURE: f32 = 298.15;

pub const SPRING_REDUCTION_FRACTION: f32 = 0.4;
pub const SPRING_DAMPING_COEFFICIENT: f32 = 0.03;
/// Converts material strength into the strain at which a spring breaks.
pub const SPRING_STRENGTH_TO_BREAKING_STRAIN: f32 = 0.839;
pub const GLOBAL_DAMPING: f32 = 0.0004;
pub const WATER_DRAG_LINEAR_COEFFICIENT: f32 = 0.020;
pub const BASIS_NUM_MECHANICAL_DYNAMICS_ITERATIONS: f32 = 30.0;

pub const MAX_SPRINGS_PER_POINT: usize = 9;
pub const MAX_TRIANGLES_PER_POINT: usize = 8;

/// World extent, in meters.
pub const MAX_WORLD_WIDTH: f32 = 5000.0;
pub const HALF_MAX_WORLD_WIDTH: f32 = MAX_WORLD_WIDTH / 2.0;
pub const MAX_WORLD_HEIGHT: f32 = 40000.0;
pub const HALF_MAX_WORLD_HEIGHT: f32 = MAX_WORLD_HEIGHT / 2.0;

/// Accepted sea depth, in meters; negative depths raise the terrain above sea level.
pub const MIN_SEA_DEPTH: f32 = -50.0;
pub const MAX_SEA_DEPTH: f32 = 10000.0;

/// Wind blows along this direction; the sign of the base speed flips it.
pub const WIND_DIRECTION: Vec2 = Vec2::new(1.0, 0.0);

/// Combustion watermarks and calibration.
pub mod combustion {
    /// Offset above the effective ignition temperature at which ignition starts.
    pub const IGNITION_TEMPERATURE_HIGH_WATERMARK: f32 = 0.0;
    /// Offset below the effective ignition temperature at which a fire dies out.
    pub const IGNITION_TEMPERATURE_LOW_WATERMARK: f32 = -30.0;
    pub const SMOTHERING_WATER_LOW_WATERMARK: f32 = 0.05;
    pub const SMOTHERING_WATER_HIGH_WATERMARK: f32 = 0.1;
    pub const SMOTHERING_DECAY_LOW_WATERMARK: f32 = 0.0005;
    pub const SMOTHERING_DECAY_HIGH_WATERMARK: f32 = 0.05;
    /// Heat released by a burning point per second, in Joules.
    pub const COMBUSTION_HEAT: f32 = 100.0 * 1000.0;
    /// Decay steps for a 750 kg reference mass at unit speed adjustment.
    pub const COMBUSTION_DECAY_STEPS: f32 = 90.0;
    pub const REFERENCE_COMBUSTION_MASS: f32 = 750.0;
    /// Burning points are kept at this multiple of their ignition temperature.
    pub const BURNING_TEMPERATURE_FACTOR: f32 = 1.1;
}

/// Ephemeral particle calibration.
pub mod ephemeral {
    pub const MIN_DEBRIS_PARTICLES_PER_EVENT: usize = 4;
    pub const MAX_DEBRIS_PARTICLES_PER_EVENT: usize = 9;
    pub const MIN_DEBRIS_PARTICLES_VELOCITY: f32 = 12.5;
    pub const MAX_DEBRIS_PARTICLES_VELOCITY: f32 = 20.0;
    pub const MIN_DEBRIS_PARTICLES_LIFETIME: f32 = 0.4;
    pub const MAX_DEBRIS_PARTICLES_LIFETIME: f32 = 0.9;

    pub const MIN_SPARKLE_PARTICLES_FOR_CUT_EVENT: usize = 4;
    pub const MAX_SPARKLE_PARTICLES_FOR_CUT_EVENT: usize = 10;
    pub const MIN_SPARKLE_PARTICLES_VELOCITY: f32 = 75.0;
    pub const MAX_SPARKLE_PARTICLES_VELOCITY: f32 = 150.0;
    pub const MIN_SPARKLE_PARTICLES_LIFETIME: f32 = 0.2;
    pub const MAX_SPARKLE_PARTICLES_LIFETIME: f32 = 0.5;
    pub const SPARKLE_TEMPERATURE: f32 = 773.15;

    pub const MIN_AIR_BUBBLES_VORTEX_AMPLITUDE: f32 = 0.05;
    pub const MAX_AIR_BUBBLES_VORTEX_AMPLITUDE: f32 = 2.0;
    pub const MIN_AIR_BUBBLES_VORTEX_PERIOD: f32 = 3.0;
    pub const MAX_AIR_BUBBLES_VORTEX_PERIOD: f32 = 7.5;

    pub const DEBRIS_WIND_RECEPTIVITY: f32 = 3.0;
    pub const SPARKLE_WIND_RECEPTIVITY: f32 = 5.0;
}

// ==================== GAME PARAMETERS ====================

/// Snapshot of every tunable the simulation reads during a step.
///
/// Missing keys in a TOML document fall back to [`GameParameters::default`].
#[derive(Resource, Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct GameParameters {
    // Mechanics
    pub num_mechanical_dynamics_iterations_adjustment: f32,
    pub spring_stiffness_adjustment: f32,
    pub spring_damping_adjustment: f32,
    pub spring_strength_adjustment: f32,
    pub global_damping_adjustment: f32,
    pub rot_acceleration: f32,

    // Water
    pub water_density_adjustment: f32,
    pub water_drag_adjustment: f32,
    pub water_intake_adjustment: f32,
    pub water_diffusion_speed_adjustment: f32,
    pub cumulated_intaken_water_threshold_for_air_bubbles: f32,

    // Heat and combustion
    pub air_temperature: f32,
    pub water_temperature: f32,
    pub thermal_conductivity_adjustment: f32,
    pub heat_dissipation_adjustment: f32,
    pub ignition_temperature_adjustment: f32,
    pub combustion_speed_adjustment: f32,
    pub combustion_heat_adjustment: f32,
    pub max_burning_particles: usize,

    // Wind
    /// Base wind speed in km/h; negative blows right to left.
    pub wind_speed_base: f32,
    pub wind_speed_max_factor: f32,
    pub wind_gust_frequency_adjustment: f32,
    pub do_modulate_wind: bool,

    // Ocean floor
    pub sea_depth: f32,
    pub ocean_floor_elasticity: f32,
    pub ocean_floor_friction: f32,

    // Electrical
    pub luminiscence_adjustment: f32,
    pub light_spread_adjustment: f32,

    // Particles
    pub max_ephemeral_particles: usize,
    pub do_generate_debris: bool,
    pub do_generate_sparkles: bool,
    pub do_generate_air_bubbles: bool,

    // Tools
    pub destroy_radius: f32,
    pub repair_radius: f32,
    pub heat_blaster_radius: f32,
    /// Heat injected by the heat blaster per second, in Joules.
    pub heat_blaster_heat_flow: f32,
    pub flood_radius: f32,
    pub flood_quantity: f32,
}

impl Default for GameParameters {
    fn default() -> Self {
        Self {
            num_mechanical_dynamics_iterations_adjustment: 1.0,
            spring_stiffness_adjustment: 1.0,
            spring_damping_adjustment: 1.0,
            spring_strength_adjustment: 1.0,
            global_damping_adjustment: 1.0,
            rot_acceleration: 1.0,

            water_density_adjustment: 1.0,
            water_drag_adjustment: 1.0,
            water_intake_adjustment: 1.0,
            water_diffusion_speed_adjustment: 1.0,
            cumulated_intaken_water_threshold_for_air_bubbles: 8.0,

            air_temperature: 298.15,
            water_temperature: 288.15,
            thermal_conductivity_adjustment: 1.0,
            heat_dissipation_adjustment: 1.0,
            ignition_temperature_adjustment: 1.0,
            combustion_speed_adjustment: 1.0,
            combustion_heat_adjustment: 1.0,
            max_burning_particles: 112,

            wind_speed_base: -20.0,
            wind_speed_max_factor: 2.5,
            wind_gust_frequency_adjustment: 1.0,
            do_modulate_wind: true,

            sea_depth: 300.0,
            ocean_floor_elasticity: 0.5,
            ocean_floor_friction: 0.25,

            luminiscence_adjustment: 1.0,
            light_spread_adjustment: 1.0,

            max_ephemeral_particles: 4096,
            do_generate_debris: true,
            do_generate_sparkles: true,
            do_generate_air_bubbles: true,

            destroy_radius: 0.75,
            repair_radius: 2.0,
            heat_blaster_radius: 8.0,
            heat_blaster_heat_flow: 2_000_000.0,
            flood_radius: 0.75,
            flood_quantity: 1.0,
        }
    }
}

impl GameParameters {
    /// Parse a (possibly partial) TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let parameters: Self = toml::from_str(source)?;
        parameters.validate()?;
        Ok(parameters)
    }

    /// Read and validate a TOML parameter file.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, WreckageError> {
        let source = std::fs::read_to_string(path)?;
        Ok(Self::from_toml_str(&source)?)
    }

    /// Reject values that would break solver invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            (
                "num_mechanical_dynamics_iterations_adjustment",
                self.num_mechanical_dynamics_iterations_adjustment,
            ),
            ("water_density_adjustment", self.water_density_adjustment),
            ("combustion_speed_adjustment", self.combustion_speed_adjustment),
            (
                "cumulated_intaken_water_threshold_for_air_bubbles",
                self.cumulated_intaken_water_threshold_for_air_bubbles,
            ),
            ("wind_speed_max_factor", self.wind_speed_max_factor),
        ];
        for (name, value) in positive {
            if value.is_nan() || value <= 0.0 {
                return Err(ConfigError::OutOfRange { name, value });
            }
        }

        let unit = [
            ("ocean_floor_elasticity", self.ocean_floor_elasticity),
            ("ocean_floor_friction", self.ocean_floor_friction),
        ];
        for (name, value) in unit {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::OutOfRange { name, value });
            }
        }

        if !(MIN_SEA_DEPTH..=MAX_SEA_DEPTH).contains(&self.sea_depth) {
            return Err(ConfigError::OutOfRange {
                name: "sea_depth",
                value: self.sea_depth,
            });
        }

        Ok(())
    }

    /// Number of mechanical sub-iterations per simulation step.
    pub fn num_mechanical_dynamics_iterations(&self) -> usize {
        (BASIS_NUM_MECHANICAL_DYNAMICS_ITERATIONS
            * self.num_mechanical_dynamics_iterations_adjustment)
            .round()
            .max(1.0) as usize
    }

    /// Duration of one mechanical sub-iteration, in seconds.
    pub fn mechanical_simulation_step_time_duration(&self) -> f32 {
        SIMULATION_STEP_TIME_DURATION / self.num_mechanical_dynamics_iterations() as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_iterations_match_basis() {
        let parameters = GameParameters::default();
        assert_eq!(parameters.num_mechanical_dynamics_iterations(), 30);
        let dt = parameters.mechanical_simulation_step_time_duration();
        assert!((dt * 30.0 - SIMULATION_STEP_TIME_DURATION).abs() < 1e-7);
    }

    #[test]
    fn low_frequency_stride_covers_one_second() {
        assert_eq!(LOW_FREQUENCY_STRIDE, 50);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let parameters = GameParameters::from_toml_str(
            "sea_depth = 120.0\nmax_burning_particles = 20\ndo_modulate_wind = false\n",
        )
        .unwrap();
        assert_eq!(parameters.sea_depth, 120.0);
        assert_eq!(parameters.max_burning_particles, 20);
        assert!(!parameters.do_modulate_wind);
        assert_eq!(parameters.wind_speed_base, GameParameters::default().wind_speed_base);
    }

    #[test]
    fn zero_water_density_rejected() {
        let result = GameParameters::from_toml_str("water_density_adjustment = 0.0");
        assert!(matches!(
            result,
            Err(ConfigError::OutOfRange {
                name: "water_density_adjustment",
                ..
            })
        ));
    }

    #[test]
    fn sea_depth_outside_range_rejected() {
        for depth in [-60.0, 20_000.0, f32::NAN] {
            let parameters = GameParameters {
                sea_depth: depth,
                ..Default::default()
            };
            assert!(
                matches!(
                    parameters.validate(),
                    Err(ConfigError::OutOfRange { name: "sea_depth", .. })
                ),
                "depth {depth} accepted"
            );
        }
        for depth in [MIN_SEA_DEPTH, 0.0, MAX_SEA_DEPTH] {
            let parameters = GameParameters {
                sea_depth: depth,
                ..Default::default()
            };
            assert!(parameters.validate().is_ok(), "depth {depth} rejected");
        }
        assert!(GameParameters::from_toml_str("sea_depth = -200.0").is_err());
    }

    #[test]
    fn parameter_file_errors_are_reported() {
        let missing = std::env::temp_dir().join("wreckage-missing-parameters.toml");
        assert!(matches!(GameParameters::from_file(&missing), Err(WreckageError::Io(_))));

        let shallow = std::env::temp_dir().join(format!("wreckage-parameters-{}.toml", std::process::id()));
        std::fs::write(&shallow, "sea_depth = -75.0\n").unwrap();
        let result = GameParameters::from_file(&shallow);
        std::fs::remove_file(&shallow).unwrap();
        assert!(matches!(
            result,
            Err(WreckageError::Config(ConfigError::OutOfRange { name: "sea_depth", .. }))
        ));
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        let result = GameParameters::from_toml_str("sea_depth = \"deep\"");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
