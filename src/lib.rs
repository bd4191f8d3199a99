//! Motion tracking for low-resolution overhead thermopile sensors.
//!
//! The pipeline ingests 4x16 frames of per-pixel temperatures and emits
//! labelled motion events: an adaptive per-pixel background model gates
//! foreground pixels, a connected-component pass groups them into blobs,
//! a greedy scorer matches blobs to tracks across frames, and every track
//! that dies is classified by its net travel (LEFT, RIGHT, UP, DOWN, or
//! NO_DIRECTION).
//!
//! Processing is single-threaded and synchronous: each [`ThermalTracker::ingest`]
//! call runs one frame to completion in fixed-size buffers with no
//! steady-state allocation.

pub mod background;
pub mod clock;
pub mod config;
pub mod detection;
pub mod events;
pub mod tracking;
pub mod types;

pub use background::BackgroundModel;
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::{ConfigError, ScoringWeights, TrackerConfig};
pub use detection::{Blob, Pixel};
pub use events::MovementEvent;
pub use tracking::{ThermalTracker, TrackedBlob};
pub use types::{
    classify_travel, Direction, Frame, FrameError, TravelClassification, FRAME_HEIGHT,
    FRAME_WIDTH, MAX_BLOBS, NUM_DIRECTIONS, NUM_PIXELS,
};
