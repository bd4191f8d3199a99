// src/config.rs
//
// All tunables for the tracking pipeline. Every track scores candidates
// against the weights held here; there is no process-wide mutable state.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Weights applied to the per-dimension difference scores when matching a
/// tracked blob against a candidate. Lower total = more similar.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    /// Weight per pixel of centroid error against the predicted position
    pub position_penalty: f32,
    /// Weight per pixel of size mismatch
    pub area_penalty: f32,
    /// Weight per unit of aspect-ratio mismatch
    pub aspect_ratio_penalty: f32,
    /// Weight per degree C of average-temperature mismatch
    pub temperature_penalty: f32,
    /// Flat penalty for reversing travel direction mid-track
    pub direction_penalty: f32,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            position_penalty: 2.0,
            area_penalty: 5.0,
            aspect_ratio_penalty: 10.0,
            temperature_penalty: 10.0,
            direction_penalty: 50.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Frames in the background window. The initial build phase gathers this
    /// many frames before tracking starts; the steady-state rolling update
    /// weighs each new frame at 1/running_average_size.
    pub running_average_size: u32,
    /// Blobs with fewer pixels than this are dropped after grouping
    pub min_blob_size: usize,
    /// Net pixels of travel required to register a directional event
    pub minimum_travel_threshold: f32,
    /// Match scores at or above this are treated as "no match"
    pub max_difference_threshold: f32,
    /// Minimum deviation from the background mean for a pixel to be active, in deg C
    pub minimum_temperature_differential: f32,
    /// Deviation must also exceed this multiple of the per-pixel sigma
    pub active_pixel_variance_scalar: f32,
    /// Consecutive frames a track survives without a match before deletion
    pub max_dead_frames: u32,
    /// Widens 8-connectivity: pixels are adjacent when both coordinate
    /// deltas are at most 1 + adjacency_fuzz
    pub adjacency_fuzz: u32,
    /// After this many consecutive active frames, the frame is folded into
    /// the background anyway so a parked warm object cannot lock the model out
    pub unchanged_frame_delay: u32,
    /// Swap LEFT/RIGHT and UP/DOWN for sensors mounted back-to-front
    pub invert_travel_direction: bool,
    pub weights: ScoringWeights,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            running_average_size: 800,
            min_blob_size: 3,
            minimum_travel_threshold: 4.0,
            max_difference_threshold: 400.0,
            minimum_temperature_differential: 0.5,
            active_pixel_variance_scalar: 4.0,
            max_dead_frames: 4,
            adjacency_fuzz: 1,
            unchanged_frame_delay: 50,
            invert_travel_direction: false,
            weights: ScoringWeights::default(),
        }
    }
}

impl TrackerConfig {
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("reading tracker config from {}", path))?;
        let config: TrackerConfig = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Penalty per dead frame, recorded on the track while it coasts unmatched.
    /// Scaled so a track at the dead-frame limit carries the full threshold.
    pub fn dead_frame_penalty(&self) -> f32 {
        self.max_difference_threshold / self.max_dead_frames.max(1) as f32
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.running_average_size < 2 {
            return Err(ConfigError::Invalid(
                "running_average_size must be at least 2".into(),
            ));
        }
        if self.min_blob_size < 1 {
            return Err(ConfigError::Invalid(
                "min_blob_size must be at least 1".into(),
            ));
        }
        if self.max_difference_threshold <= 0.0 {
            return Err(ConfigError::Invalid(
                "max_difference_threshold must be positive".into(),
            ));
        }
        if self.minimum_travel_threshold < 0.0 {
            return Err(ConfigError::Invalid(
                "minimum_travel_threshold must not be negative".into(),
            ));
        }
        if self.minimum_temperature_differential < 0.0 {
            return Err(ConfigError::Invalid(
                "minimum_temperature_differential must not be negative".into(),
            ));
        }
        if self.active_pixel_variance_scalar < 0.0 {
            return Err(ConfigError::Invalid(
                "active_pixel_variance_scalar must not be negative".into(),
            ));
        }
        let w = &self.weights;
        if w.position_penalty < 0.0
            || w.area_penalty < 0.0
            || w.aspect_ratio_penalty < 0.0
            || w.temperature_penalty < 0.0
            || w.direction_penalty < 0.0
        {
            return Err(ConfigError::Invalid(
                "scoring weights must not be negative".into(),
            ));
        }
        Ok(())
    }
}
