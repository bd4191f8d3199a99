// src/background.rs
//
// Adaptive per-pixel background model. Each pixel carries a {mean, sigma}
// estimate of the empty scene: an exact Welford pass while the background
// is first built, then a weighted rolling update in steady state. The
// rolling sigma drifts from a true standard deviation, which is acceptable
// because the activity gate only needs a robust scale estimate.

use crate::config::TrackerConfig;
use crate::types::{Frame, FRAME_HEIGHT, FRAME_WIDTH, NUM_PIXELS};
use tracing::{debug, info};

pub struct BackgroundModel {
    means: Frame,
    /// Welford M2 accumulator during the build phase, sigma afterwards.
    deviations: Frame,
    num_frames: u32,
    window: u32,
}

impl BackgroundModel {
    pub fn new(running_average_size: u32) -> Self {
        Self {
            means: [[0.0; FRAME_WIDTH]; FRAME_HEIGHT],
            deviations: [[0.0; FRAME_WIDTH]; FRAME_HEIGHT],
            num_frames: 0,
            window: running_average_size,
        }
    }

    /// Forget the collected background. The next frame restarts the build phase.
    pub fn reset(&mut self) {
        self.num_frames = 0;
        debug!("background model reset");
    }

    pub fn is_ready(&self) -> bool {
        self.num_frames >= self.window
    }

    /// Fold a frame into the background during the initial build phase.
    ///
    /// The first frame seeds the means directly; subsequent frames apply
    /// Welford's recurrences. When the window fills, the M2 accumulators
    /// are converted to per-pixel standard deviations and the model
    /// becomes ready.
    pub fn add_initial(&mut self, frame: &Frame) {
        if self.num_frames == 0 {
            for row in 0..FRAME_HEIGHT {
                for col in 0..FRAME_WIDTH {
                    let temp = frame[row][col];
                    self.means[row][col] = if temp.is_finite() { temp } else { 0.0 };
                    self.deviations[row][col] = 0.0;
                }
            }
        } else {
            for row in 0..FRAME_HEIGHT {
                for col in 0..FRAME_WIDTH {
                    let temp = frame[row][col];
                    if !temp.is_finite() {
                        // Bad sample; this pixel's estimate just sees one frame fewer.
                        continue;
                    }
                    let last_mean = self.means[row][col];
                    self.means[row][col] += (temp - last_mean) / (self.num_frames + 1) as f32;
                    self.deviations[row][col] += (temp - self.means[row][col]) * (temp - last_mean);
                }
            }
        }

        self.num_frames += 1;

        if self.num_frames == self.window {
            let samples = (self.num_frames - 1).max(1) as f32;
            for row in 0..FRAME_HEIGHT {
                for col in 0..FRAME_WIDTH {
                    self.deviations[row][col] = (self.deviations[row][col] / samples).sqrt();
                }
            }
            info!(
                frames = self.num_frames,
                ambient = self.average_temperature(),
                "background model ready"
            );
        }
    }

    /// Fold a frame into the established background.
    ///
    /// Both mean and sigma are weighted rolling values: old frames are
    /// averaged out of significance as new ones arrive.
    pub fn add_rolling(&mut self, frame: &Frame) {
        let window = self.window as f32;
        for row in 0..FRAME_HEIGHT {
            for col in 0..FRAME_WIDTH {
                let temp = frame[row][col];
                if !temp.is_finite() {
                    continue;
                }

                let mean = (self.means[row][col] * (window - 1.0) + temp) / window;
                self.means[row][col] = mean;

                let deviation = (temp - mean).abs();
                self.deviations[row][col] =
                    (self.deviations[row][col] * (window - 1.0) + deviation) / window;
            }
        }
    }

    /// Activity gate: does this sample stand out from the background?
    ///
    /// The deviation must clear both the scaled per-pixel sigma and the
    /// absolute temperature differential. Non-finite samples never pass.
    pub fn is_active(
        &self,
        row: usize,
        col: usize,
        temperature: f32,
        config: &TrackerConfig,
    ) -> bool {
        if !temperature.is_finite() {
            return false;
        }

        let deviation = (self.means[row][col] - temperature).abs();

        deviation > self.deviations[row][col] * config.active_pixel_variance_scalar
            && deviation > config.minimum_temperature_differential
    }

    pub fn means(&self) -> &Frame {
        &self.means
    }

    /// Per-pixel scale estimates. Only meaningful once the model is ready.
    pub fn deviations(&self) -> &Frame {
        &self.deviations
    }

    /// Mean of the background means: the ambient scene temperature in deg C.
    pub fn average_temperature(&self) -> f32 {
        let mut total = 0.0;
        for row in 0..FRAME_HEIGHT {
            for col in 0..FRAME_WIDTH {
                total += self.means[row][col];
            }
        }
        total / NUM_PIXELS as f32
    }
}
