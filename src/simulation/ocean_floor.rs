//! Procedural sea-floor terrain.
//!
//! A fixed-resolution height field built from three sines and offset by the
//! sea depth. It is regenerated only when the sea depth parameter changes.

use bevy::log::debug;

use super::physics_config::{GameParameters, HALF_MAX_WORLD_WIDTH, MAX_WORLD_WIDTH};
use crate::render::RenderSink;
use crate::resources::LandSlice;

pub const SAMPLES_COUNT: usize = 2048;
/// Distance between two samples, in meters.
pub const DX: f32 = MAX_WORLD_WIDTH / (SAMPLES_COUNT - 1) as f32;

const FREQUENCY_1: f32 = 0.005;
const FREQUENCY_2: f32 = 0.015;
const FREQUENCY_3: f32 = 0.001;
const AMPLITUDE_1: f32 = 10.0;
const AMPLITUDE_2: f32 = 6.0;
const AMPLITUDE_3: f32 = 45.0;

/// Render slices uploaded for the visible window.
pub const RENDER_SLICES: usize = 500;

#[derive(Debug, Clone, Copy, Default)]
struct Sample {
    value: f32,
    /// Delta to the next sample, for linear interpolation.
    delta: f32,
}

#[derive(Debug, Clone)]
pub struct OceanFloor {
    /// One extra sample so interpolation at the right edge stays in range.
    samples: Vec<Sample>,
    current_sea_depth: f32,
}

impl Default for OceanFloor {
    fn default() -> Self {
        Self::new()
    }
}

impl OceanFloor {
    pub fn new() -> Self {
        Self {
            samples: vec![Sample::default(); SAMPLES_COUNT + 1],
            current_sea_depth: f32::MIN,
        }
    }

    pub fn update(&mut self, parameters: &GameParameters) {
        if self.current_sea_depth == parameters.sea_depth {
            return;
        }

        for (i, sample) in self.samples.iter_mut().take(SAMPLES_COUNT).enumerate() {
            let x = i as f32 * DX;
            sample.value = (x * FREQUENCY_1).sin() * AMPLITUDE_1
                + (x * FREQUENCY_2).sin() * AMPLITUDE_2
                - (x * FREQUENCY_3).sin() * AMPLITUDE_3
                - parameters.sea_depth;
        }
        self.samples[SAMPLES_COUNT] = self.samples[SAMPLES_COUNT - 1];
        self.recompute_deltas(0, SAMPLES_COUNT);

        self.current_sea_depth = parameters.sea_depth;
        debug!("Ocean floor regenerated for sea depth {}", parameters.sea_depth);
    }

    fn recompute_deltas(&mut self, first: usize, last: usize) {
        for i in first..last.min(SAMPLES_COUNT) {
            self.samples[i].delta = self.samples[i + 1].value - self.samples[i].value;
        }
        self.samples[SAMPLES_COUNT].delta = 0.0;
    }

    /// Terrain height at world X, linearly interpolated.
    pub fn height_at(&self, x: f32) -> f32 {
        let sample_index_f = ((x + HALF_MAX_WORLD_WIDTH) / DX).clamp(0.0, (SAMPLES_COUNT - 1) as f32);
        let sample_index = sample_index_f as usize;
        let fraction = sample_index_f - sample_index as f32;
        let sample = &self.samples[sample_index];
        sample.value + sample.delta * fraction
    }

    /// Reshape the terrain between two world positions, interpolating the
    /// heights linearly. Returns whether any sample changed.
    pub fn adjust_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32) -> bool {
        let (left_x, left_y, right_x, right_y) = if x1 <= x2 {
            (x1, y1, x2, y2)
        } else {
            (x2, y2, x1, y1)
        };

        let to_index = |x: f32| {
            ((x + HALF_MAX_WORLD_WIDTH) / DX).round().clamp(0.0, (SAMPLES_COUNT - 1) as f32) as usize
        };
        let first = to_index(left_x);
        let last = to_index(right_x);

        let mut has_changed = false;
        for i in first..=last {
            let target = if last == first {
                right_y
            } else {
                left_y + (right_y - left_y) * (i - first) as f32 / (last - first) as f32
            };
            if self.samples[i].value != target {
                self.samples[i].value = target;
                has_changed = true;
            }
        }

        if last == SAMPLES_COUNT - 1 {
            self.samples[SAMPLES_COUNT].value = self.samples[SAMPLES_COUNT - 1].value;
        }

        if has_changed {
            self.recompute_deltas(first.saturating_sub(1), last + 1);
        }

        has_changed
    }

    /// Upload the visible window to the renderer.
    pub fn upload(&self, visible_left: f32, visible_right: f32, sink: &mut dyn RenderSink) {
        let width = (visible_right - visible_left).max(f32::EPSILON);
        let slices: Vec<LandSlice> = (0..=RENDER_SLICES)
            .map(|i| {
                let x = visible_left + width * i as f32 / RENDER_SLICES as f32;
                LandSlice {
                    x,
                    y: self.height_at(x),
                }
            })
            .collect();
        sink.upload_land(&slices);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_offsets_terrain() {
        let mut floor = OceanFloor::new();
        floor.update(&GameParameters {
            sea_depth: 100.0,
            ..Default::default()
        });
        // sin(0) components vanish at the left edge
        assert!((floor.height_at(-HALF_MAX_WORLD_WIDTH) + 100.0).abs() < 1e-3);

        let before = floor.height_at(123.0);
        floor.update(&GameParameters {
            sea_depth: 200.0,
            ..Default::default()
        });
        assert!((floor.height_at(123.0) - (before - 100.0)).abs() < 1e-2);
    }

    #[test]
    fn terrain_stays_within_amplitude_band() {
        let mut floor = OceanFloor::new();
        floor.update(&GameParameters::default());
        let depth = GameParameters::default().sea_depth;
        for i in 0..1000 {
            let x = -HALF_MAX_WORLD_WIDTH + i as f32 * 5.0;
            let h = floor.height_at(x) + depth;
            assert!(h.abs() <= AMPLITUDE_1 + AMPLITUDE_2 + AMPLITUDE_3 + 1e-3);
        }
    }

    #[test]
    fn extra_sample_repeats_last_sample() {
        let mut floor = OceanFloor::new();
        floor.update(&GameParameters::default());
        let last = floor.samples[SAMPLES_COUNT - 1];
        let extra = floor.samples[SAMPLES_COUNT];
        assert_eq!(extra.value, last.value);
        assert_eq!(last.delta, 0.0);
        assert_eq!(extra.delta, 0.0);
        assert!((floor.height_at(HALF_MAX_WORLD_WIDTH) - last.value).abs() < 1e-2);
        assert_eq!(floor.height_at(HALF_MAX_WORLD_WIDTH + 50.0), last.value);
    }

    #[test]
    fn adjust_to_reshapes_and_reports_change() {
        let mut floor = OceanFloor::new();
        floor.update(&GameParameters::default());
        assert!(floor.adjust_to(10.0, -50.0, -10.0, -50.0));
        assert!((floor.height_at(0.0) + 50.0).abs() < 1e-3);
        assert!(!floor.adjust_to(-10.0, -50.0, 10.0, -50.0));
    }
}
