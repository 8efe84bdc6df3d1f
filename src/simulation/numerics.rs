//! Small numeric helpers shared by the solvers.

/// Hermite interpolation between `edge0` and `edge1`, clamped to [0, 1].
pub fn smooth_step(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Fixed-window running average.
#[derive(Debug, Clone)]
pub struct RunningAverage<const N: usize> {
    samples: [f32; N],
    next: usize,
    sum: f32,
}

impl<const N: usize> Default for RunningAverage<N> {
    fn default() -> Self {
        Self {
            samples: [0.0; N],
            next: 0,
            sum: 0.0,
        }
    }
}

impl<const N: usize> RunningAverage<N> {
    /// Push a sample and return the new average.
    pub fn update(&mut self, value: f32) -> f32 {
        self.sum += value - self.samples[self.next];
        self.samples[self.next] = value;
        self.next = (self.next + 1) % N;
        self.average()
    }

    pub fn average(&self) -> f32 {
        self.sum / N as f32
    }
}
