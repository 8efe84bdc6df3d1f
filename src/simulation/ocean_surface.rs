//! Ocean surface: a 1D shallow-water-equation solver plus wind ripples.
//!
//! The SWE state lives in double-buffered height and velocity fields with
//! two extra cells on each side (one for wave injection, one for the
//! reflective boundary). Velocities are staggered: `v[i]` sits on the left
//! face of cell `i`. Each step the interior is advected semi-Lagrangian,
//! updated with the continuity and momentum terms, mirrored at the edges,
//! swapped, and finally resampled into the visible samples.

use bevy::log::{debug, warn};
use bevy::prelude::Vec2;

use super::numerics::RunningAverage;
use super::physics_config::{
    GameParameters, GRAVITY_MAGNITUDE, HALF_MAX_WORLD_WIDTH, MAX_WORLD_WIDTH,
    SIMULATION_STEP_TIME_DURATION,
};
use super::wind::Wind;
use crate::render::RenderSink;
use crate::resources::OceanSlice;

// ==================== SURFACE CONFIG ====================
pub const SAMPLES_COUNT: usize = 8192;
/// Distance between two samples, in meters.
pub const DX: f32 = MAX_WORLD_WIDTH / (SAMPLES_COUNT - 1) as f32;

/// Rest height of the SWE field.
pub const SWE_HEIGHT_FIELD_OFFSET: f32 = 100.0;
/// Visible meters per SWE height unit.
pub const SWE_HEIGHT_FIELD_AMPLIFICATION: f32 = 50.0;

const SWE_WAVE_GENERATION_SAMPLES: usize = 1;
const SWE_BOUNDARY_CONDITIONS_SAMPLES: usize = 1;
pub const SWE_OUTER_LAYER_SAMPLES: usize = SWE_WAVE_GENERATION_SAMPLES + SWE_BOUNDARY_CONDITIONS_SAMPLES;
pub const SWE_TOTAL_SAMPLES: usize = SWE_OUTER_LAYER_SAMPLES + SAMPLES_COUNT + SWE_OUTER_LAYER_SAMPLES;

const WIND_RIPPLE_SPATIAL_FREQUENCY: f32 = 0.5;
const WIND_RIPPLE_TIME_FREQUENCY: f32 = 128.0;
const WIND_RIPPLE_HEIGHT_FACTOR: f32 = 0.7;

/// Visible height of automatically generated waves, in meters.
const TSUNAMI_HEIGHT: f32 = 8.0;
const ROGUE_WAVE_HEIGHT: f32 = 4.0;

pub const RENDER_SLICES: usize = 500;
// =============================================================

#[derive(Debug, Clone, Copy, Default)]
struct Sample {
    value: f32,
    /// Delta to the next sample, for linear interpolation.
    delta: f32,
}

#[derive(Debug, Clone)]
pub struct OceanSurface {
    /// Visible samples plus one trailing copy of the last.
    samples: Vec<Sample>,

    // Both fields carry one extra cell so advection can read `prev + 1`.
    current_height_field: Vec<f32>,
    next_height_field: Vec<f32>,
    current_velocity_field: Vec<f32>,
    next_velocity_field: Vec<f32>,

    /// Disturbance driven by the interactive adjust tool.
    external_wave: Option<SweWaveStateMachine>,
    /// Disturbance started by tsunami and rogue-wave triggers.
    genesis_wave: Option<SweWaveStateMachine>,

    wind_incisiveness: RunningAverage<15>,
}

impl Default for OceanSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl OceanSurface {
    pub fn new() -> Self {
        let mut surface = Self {
            samples: vec![Sample::default(); SAMPLES_COUNT + 1],
            current_height_field: vec![SWE_HEIGHT_FIELD_OFFSET; SWE_TOTAL_SAMPLES + 1],
            next_height_field: vec![SWE_HEIGHT_FIELD_OFFSET; SWE_TOTAL_SAMPLES + 1],
            current_velocity_field: vec![0.0; SWE_TOTAL_SAMPLES + 1],
            next_velocity_field: vec![0.0; SWE_TOTAL_SAMPLES + 1],
            external_wave: None,
            genesis_wave: None,
            wind_incisiveness: RunningAverage::default(),
        };
        surface.generate_samples(0.0, 0.0, 0.0);
        surface
    }

    pub fn update(&mut self, current_simulation_time: f32, wind: &Wind, parameters: &GameParameters) {
        // Waves
        if let Some(wave) = self.genesis_wave.as_mut() {
            match wave.update(current_simulation_time) {
                Some(height) => self.current_height_field[wave.sample_index()] = height,
                None => self.genesis_wave = None,
            }
        }
        if let Some(wave) = self.external_wave.as_mut() {
            match wave.update(current_simulation_time) {
                Some(height) => self.current_height_field[wave.sample_index()] = height,
                None => {
                    debug!("External ocean wave completed");
                    self.external_wave = None;
                }
            }
        }

        // SWE
        self.advect_height_field();
        self.advect_velocity_field();
        self.update_height_field();
        self.update_velocity_field();
        self.apply_boundary_conditions();
        std::mem::swap(&mut self.current_height_field, &mut self.next_height_field);
        std::mem::swap(&mut self.current_velocity_field, &mut self.next_velocity_field);

        // Wind ripples
        let base = wind.base_speed_magnitude();
        let gust_amplitude = wind.max_speed_magnitude() - base;
        let incisiveness = if gust_amplitude == 0.0 {
            0.0
        } else {
            (wind.current_speed_magnitude().abs() - base.abs()).max(0.0) / gust_amplitude.abs()
        };
        let smoothed_incisiveness = self.wind_incisiveness.update(incisiveness);
        let ripple_time_frequency = if parameters.wind_speed_base >= 0.0 {
            WIND_RIPPLE_TIME_FREQUENCY
        } else {
            -WIND_RIPPLE_TIME_FREQUENCY
        };

        self.generate_samples(
            current_simulation_time,
            ripple_time_frequency,
            WIND_RIPPLE_HEIGHT_FACTOR * smoothed_incisiveness,
        );
    }

    /// Visible surface height at world X, linearly interpolated.
    pub fn height_at(&self, x: f32) -> f32 {
        let sample_index_f = ((x + HALF_MAX_WORLD_WIDTH) / DX).clamp(0.0, (SAMPLES_COUNT - 1) as f32);
        let sample_index = sample_index_f as usize;
        let fraction = sample_index_f - sample_index as f32;
        let sample = &self.samples[sample_index];
        sample.value + sample.delta * fraction
    }

    pub fn is_underwater(&self, position: Vec2) -> bool {
        position.y < self.height_at(position.x)
    }

    /// Drive the surface at `target` toward its height, or release the
    /// current disturbance when `target` is `None`.
    pub fn adjust_to(&mut self, target: Option<Vec2>, current_simulation_time: f32) {
        let Some(position) = target else {
            match self.external_wave.as_mut() {
                Some(wave) => wave.release(current_simulation_time),
                None => warn!("Ocean surface released without an active wave"),
            }
            return;
        };

        let target_height = position.y / SWE_HEIGHT_FIELD_AMPLIFICATION + SWE_HEIGHT_FIELD_OFFSET;
        if let Some(wave) = self.external_wave.as_mut() {
            wave.restart(target_height, current_simulation_time);
            return;
        }

        let sample_index = ((position.x + HALF_MAX_WORLD_WIDTH) / DX + 0.5)
            .clamp(0.0, (SAMPLES_COUNT - 1) as f32) as usize;
        let swe_index = SWE_OUTER_LAYER_SAMPLES + sample_index;
        debug!("Starting external ocean wave at sample {}", sample_index);
        self.external_wave = Some(SweWaveStateMachine::new(
            swe_index,
            self.current_height_field[swe_index],
            target_height,
            ReleaseMode::OnCue,
            current_simulation_time,
        ));
    }

    /// Start a tall automatic wave at one of the wave-generation cells.
    /// Returns false when a generated wave is already running.
    pub fn trigger_tsunami(&mut self, from_left: bool, current_simulation_time: f32) -> bool {
        self.trigger_genesis_wave(from_left, TSUNAMI_HEIGHT, current_simulation_time)
    }

    pub fn trigger_rogue_wave(&mut self, from_left: bool, current_simulation_time: f32) -> bool {
        self.trigger_genesis_wave(from_left, ROGUE_WAVE_HEIGHT, current_simulation_time)
    }

    fn trigger_genesis_wave(&mut self, from_left: bool, height: f32, current_simulation_time: f32) -> bool {
        if self.genesis_wave.is_some() {
            return false;
        }
        let swe_index = if from_left {
            SWE_BOUNDARY_CONDITIONS_SAMPLES
        } else {
            SWE_TOTAL_SAMPLES - 1 - SWE_BOUNDARY_CONDITIONS_SAMPLES
        };
        let low_height = self.current_height_field[swe_index];
        self.genesis_wave = Some(SweWaveStateMachine::new(
            swe_index,
            low_height,
            low_height + height / SWE_HEIGHT_FIELD_AMPLIFICATION,
            ReleaseMode::Automatic,
            current_simulation_time,
        ));
        debug!("Wave genesis at SWE cell {} ({} m)", swe_index, height);
        true
    }

    pub fn external_wave(&self) -> Option<&SweWaveStateMachine> {
        self.external_wave.as_ref()
    }

    pub fn swe_height_field(&self) -> &[f32] {
        &self.current_height_field[..SWE_TOTAL_SAMPLES]
    }

    pub fn swe_velocity_field(&self) -> &[f32] {
        &self.current_velocity_field[..SWE_TOTAL_SAMPLES]
    }

    /// Upload the visible window to the renderer.
    pub fn upload(&self, visible_left: f32, visible_right: f32, sink: &mut dyn RenderSink) {
        let first_sample = ((visible_left + HALF_MAX_WORLD_WIDTH) / DX)
            .clamp(0.0, (SAMPLES_COUNT - 1) as f32) as usize;
        let width = (visible_right - visible_left).max(DX);
        let sample_count = (width / DX).ceil() as usize + 1;

        let slices: Vec<OceanSlice> = if sample_count >= RENDER_SLICES {
            // Super-sample; the renderer interpolates between slices
            (0..=RENDER_SLICES)
                .map(|i| {
                    let x = visible_left + width * i as f32 / RENDER_SLICES as f32;
                    OceanSlice {
                        x,
                        y: self.height_at(x),
                    }
                })
                .collect()
        } else {
            let last_sample = (first_sample + sample_count).min(SAMPLES_COUNT);
            (first_sample..=last_sample)
                .map(|i| OceanSlice {
                    x: i as f32 * DX - HALF_MAX_WORLD_WIDTH,
                    y: self.samples[i].value,
                })
                .collect()
        };

        sink.upload_ocean(&slices);
    }

    // ==================== SWE STEPS ====================

    fn advect_height_field(&mut self) {
        let dt = SIMULATION_STEP_TIME_DURATION;
        for i in 1..SWE_TOTAL_SAMPLES - 1 {
            let v = (self.current_velocity_field[i] + self.current_velocity_field[i + 1]) / 2.0;
            self.next_height_field[i] = Self::sample_back_traced(&self.current_height_field, i, v, dt);
        }
    }

    fn advect_velocity_field(&mut self) {
        let dt = SIMULATION_STEP_TIME_DURATION;
        for i in 1..SWE_TOTAL_SAMPLES - 1 {
            let v = self.current_velocity_field[i];
            self.next_velocity_field[i] = Self::sample_back_traced(&self.current_velocity_field, i, v, dt);
        }
    }

    fn sample_back_traced(field: &[f32], i: usize, v: f32, dt: f32) -> f32 {
        let previous_index = (i as f32 - v * dt / DX).clamp(0.0, (SWE_TOTAL_SAMPLES - 1) as f32);
        let previous_index_i = previous_index.floor() as usize;
        let fraction = previous_index - previous_index_i as f32;
        (1.0 - fraction) * field[previous_index_i] + fraction * field[previous_index_i + 1]
    }

    fn update_height_field(&mut self) {
        let dt = SIMULATION_STEP_TIME_DURATION;
        for i in 1..SWE_TOTAL_SAMPLES - 1 {
            self.next_height_field[i] -= self.next_height_field[i]
                * (self.next_velocity_field[i + 1] - self.next_velocity_field[i])
                / DX
                * dt;
        }
    }

    fn update_velocity_field(&mut self) {
        let dt = SIMULATION_STEP_TIME_DURATION;
        for i in 1..SWE_TOTAL_SAMPLES - 1 {
            self.next_velocity_field[i] += GRAVITY_MAGNITUDE
                * (self.next_height_field[i - 1] - self.next_height_field[i])
                / DX
                * dt;
        }
    }

    fn apply_boundary_conditions(&mut self) {
        self.next_height_field[0] = self.next_height_field[1];
        self.next_height_field[SWE_TOTAL_SAMPLES - 1] = self.next_height_field[SWE_TOTAL_SAMPLES - 2];
        self.next_velocity_field[0] = 0.0;
        self.next_velocity_field[SWE_TOTAL_SAMPLES - 1] = 0.0;
    }

    fn generate_samples(&mut self, current_simulation_time: f32, ripple_time_frequency: f32, ripple_height: f32) {
        for i in 0..SAMPLES_COUNT {
            let x = i as f32 * DX;
            let swe_height = (self.current_height_field[SWE_OUTER_LAYER_SAMPLES + i] - SWE_HEIGHT_FIELD_OFFSET)
                * SWE_HEIGHT_FIELD_AMPLIFICATION;
            let ripple = (x * WIND_RIPPLE_SPATIAL_FREQUENCY - current_simulation_time * ripple_time_frequency).sin()
                * ripple_height;
            self.samples[i].value = swe_height + ripple;
        }

        for i in 0..SAMPLES_COUNT - 1 {
            self.samples[i].delta = self.samples[i + 1].value - self.samples[i].value;
        }
        self.samples[SAMPLES_COUNT - 1].delta = 0.0;
        self.samples[SAMPLES_COUNT] = self.samples[SAMPLES_COUNT - 1];
    }
}

// ==================== WAVE STATE MACHINE ====================

/// Phase of a [`SweWaveStateMachine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WavePhase {
    Rise,
    Fall,
}

/// When a wave starts falling back to its low height.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseMode {
    /// Falls as soon as the rise completes.
    Automatic,
    /// Holds the rise target until released.
    OnCue,
}

/// A single injected disturbance at one SWE cell.
#[derive(Debug, Clone)]
pub struct SweWaveStateMachine {
    sample_index: usize,
    low_height: f32,
    phase_start_height: f32,
    phase_target_height: f32,
    current_height: f32,
    current_progress: f32,
    start_simulation_time: f32,
    current_phase: WavePhase,
    release_mode: ReleaseMode,
    current_smoothing_delay: f32,
}

impl SweWaveStateMachine {
    pub fn new(
        sample_index: usize,
        low_height: f32,
        high_height: f32,
        release_mode: ReleaseMode,
        current_simulation_time: f32,
    ) -> Self {
        let mut machine = Self {
            sample_index,
            low_height,
            phase_start_height: low_height,
            phase_target_height: high_height,
            current_height: low_height,
            current_progress: 0.0,
            start_simulation_time: current_simulation_time,
            current_phase: WavePhase::Rise,
            release_mode,
            current_smoothing_delay: 0.0,
        };
        machine.current_smoothing_delay = machine.calculate_smoothing_delay();
        machine
    }

    /// Rise again from the current height toward a new target.
    pub fn restart(&mut self, new_target_height: f32, current_simulation_time: f32) {
        self.phase_start_height = self.current_height;
        self.phase_target_height = new_target_height;
        self.current_progress = 0.0;
        self.start_simulation_time = current_simulation_time;
        self.current_phase = WavePhase::Rise;
        self.current_smoothing_delay = self.calculate_smoothing_delay();
    }

    pub fn release(&mut self, current_simulation_time: f32) {
        match self.current_phase {
            WavePhase::Rise => self.start_fall_phase(current_simulation_time),
            WavePhase::Fall => self.current_progress = 1.0,
        }
    }

    /// Height for this step, or `None` once the fall phase has completed.
    pub fn update(&mut self, current_simulation_time: f32) -> Option<f32> {
        if self.current_progress < 1.0 {
            self.current_progress =
                (current_simulation_time - self.start_simulation_time) / self.current_smoothing_delay;
        }

        self.current_height = self.phase_start_height
            + (self.phase_target_height - self.phase_start_height)
                * (std::f32::consts::FRAC_PI_2 * self.current_progress.min(1.0)).sin();

        if self.current_progress >= 1.0 {
            match self.current_phase {
                WavePhase::Rise => {
                    if self.release_mode == ReleaseMode::Automatic {
                        self.start_fall_phase(current_simulation_time);
                    }
                }
                WavePhase::Fall => return None,
            }
        }

        Some(self.current_height)
    }

    pub fn sample_index(&self) -> usize {
        self.sample_index
    }

    pub fn phase(&self) -> WavePhase {
        self.current_phase
    }

    pub fn current_height(&self) -> f32 {
        self.current_height
    }

    pub fn low_height(&self) -> f32 {
        self.low_height
    }

    fn start_fall_phase(&mut self, current_simulation_time: f32) {
        self.phase_start_height = self.current_height;
        self.phase_target_height = self.low_height;
        self.current_progress = 0.0;
        self.start_simulation_time = current_simulation_time;
        self.current_phase = WavePhase::Fall;
        self.current_smoothing_delay = self.calculate_smoothing_delay();
    }

    /// Seconds to cover the current phase, from fitted tick curves.
    fn calculate_smoothing_delay(&self) -> f32 {
        let delta_height = (self.phase_target_height - self.current_height)
            .abs()
            .min(SWE_HEIGHT_FIELD_OFFSET / 5.0);

        let delay_ticks = match self.current_phase {
            WavePhase::Rise => {
                -19.88881 + (147.403 / 0.6126081) * (1.0 - (-0.6126081 * delta_height).exp())
            }
            WavePhase::Fall => {
                1.220013 + (7.8394 / 0.6485749) * (1.0 - (-0.6485749 * delta_height).exp())
            }
        };

        delay_ticks.max(1.0) * SIMULATION_STEP_TIME_DURATION
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calm_wind() -> (Wind, GameParameters) {
        let parameters = GameParameters {
            do_modulate_wind: false,
            wind_speed_base: 0.0,
            ..Default::default()
        };
        let mut wind = Wind::new(0);
        wind.update(0.0, &parameters);
        (wind, parameters)
    }

    #[test]
    fn flat_surface_stays_flat() {
        let (wind, parameters) = calm_wind();
        let mut surface = OceanSurface::new();
        for step in 1..=50 {
            surface.update(step as f32 * SIMULATION_STEP_TIME_DURATION, &wind, &parameters);
        }
        for x in [-2000.0, -10.0, 0.0, 333.3, 2400.0] {
            assert!(surface.height_at(x).abs() < 1e-3, "height at {x}: {}", surface.height_at(x));
        }
        assert!(surface.swe_velocity_field().iter().all(|v| v.abs() < 1e-6));
    }

    #[test]
    fn wave_rise_uses_fitted_delay() {
        let machine = SweWaveStateMachine::new(10, 100.0, 101.0, ReleaseMode::OnCue, 0.0);
        let expected_ticks = -19.88881 + (147.403 / 0.6126081) * (1.0 - (-0.6126081f32).exp());
        assert!((machine.current_smoothing_delay - expected_ticks * 0.02).abs() < 1e-5);
    }

    #[test]
    fn tiny_delta_uses_one_tick() {
        let machine = SweWaveStateMachine::new(10, 100.0, 100.001, ReleaseMode::OnCue, 0.0);
        assert!((machine.current_smoothing_delay - SIMULATION_STEP_TIME_DURATION).abs() < 1e-7);
    }

    #[test]
    fn automatic_wave_falls_by_itself() {
        let mut machine = SweWaveStateMachine::new(10, 100.0, 100.2, ReleaseMode::Automatic, 0.0);
        let mut t = 0.0;
        let mut steps = 0;
        while machine.update(t).is_some() {
            t += SIMULATION_STEP_TIME_DURATION;
            steps += 1;
            assert!(steps < 10_000, "automatic wave never completed");
        }
        assert_eq!(machine.phase(), WavePhase::Fall);
        assert!((machine.current_height() - 100.0).abs() < 1e-4);
    }

    #[test]
    fn on_cue_wave_holds_until_released_then_settles() {
        let mut machine = SweWaveStateMachine::new(10, 100.0, 101.0, ReleaseMode::OnCue, 0.0);
        let hold_until = machine.current_smoothing_delay * 5.0;
        let mut t = 0.0;
        while t < hold_until {
            assert!(machine.update(t).is_some(), "wave ended before release at t={t}");
            assert_eq!(machine.phase(), WavePhase::Rise);
            t += SIMULATION_STEP_TIME_DURATION;
        }
        assert!((machine.current_height() - 101.0).abs() < 1e-4);

        machine.release(t);
        let mut steps = 0;
        while machine.update(t).is_some() {
            t += SIMULATION_STEP_TIME_DURATION;
            steps += 1;
            assert!(steps < 10_000, "released wave never completed");
        }
        assert_eq!(machine.phase(), WavePhase::Fall);
        assert!((machine.current_height() - 100.0).abs() < 1e-4);
    }

    #[test]
    fn boundaries_mirror_height_and_pin_velocity() {
        let (wind, parameters) = calm_wind();
        let mut surface = OceanSurface::new();
        assert!(surface.trigger_tsunami(true, 0.0));
        surface.adjust_to(Some(Vec2::new(HALF_MAX_WORLD_WIDTH - DX, 5.0)), 0.0);

        let last = SWE_TOTAL_SAMPLES - 1;
        for step in 1..=200 {
            surface.update(step as f32 * SIMULATION_STEP_TIME_DURATION, &wind, &parameters);
            let heights = surface.swe_height_field();
            let velocities = surface.swe_velocity_field();
            assert_eq!(heights[0], heights[1], "left height not mirrored at step {step}");
            assert_eq!(heights[last], heights[last - 1], "right height not mirrored at step {step}");
            assert_eq!(velocities[0], 0.0, "left velocity at step {step}");
            assert_eq!(velocities[last], 0.0, "right velocity at step {step}");
        }
        assert!(surface.swe_velocity_field()[2..last].iter().any(|v| *v != 0.0));
    }

    #[test]
    fn adjust_raises_surface_near_target() {
        let (wind, parameters) = calm_wind();
        let mut surface = OceanSurface::new();
        surface.adjust_to(Some(Vec2::new(0.0, 5.0)), 0.0);
        for step in 1..=30 {
            surface.update(step as f32 * SIMULATION_STEP_TIME_DURATION, &wind, &parameters);
        }
        let highest = (-10..=10)
            .map(|k| surface.height_at(k as f32 * DX))
            .fold(f32::MIN, f32::max);
        assert!(highest > 0.5, "highest sample near the wave: {highest}");
        assert_eq!(surface.external_wave().map(|w| w.phase()), Some(WavePhase::Rise));

        surface.adjust_to(None, 0.6);
        assert_eq!(surface.external_wave().map(|w| w.phase()), Some(WavePhase::Fall));
    }

    #[test]
    fn upload_covers_window() {
        struct Capture(Vec<OceanSlice>);
        impl RenderSink for Capture {
            fn upload_land(&mut self, _: &[crate::resources::LandSlice]) {}
            fn upload_ocean(&mut self, slices: &[OceanSlice]) {
                self.0 = slices.to_vec();
            }
            fn upload_ship(&mut self, _: usize, _: crate::render::ShipRenderData<'_>) {}
        }

        let surface = OceanSurface::new();
        let mut capture = Capture(Vec::new());
        surface.upload(-20.0, 20.0, &mut capture);
        assert!(!capture.0.is_empty() && capture.0.len() < RENDER_SLICES);
        assert!(capture.0[0].x <= -20.0 + DX);

        surface.upload(-1000.0, 1000.0, &mut capture);
        assert_eq!(capture.0.len(), RENDER_SLICES + 1);
    }
}
