// src/events.rs
//
// Host-facing movement event record. The tracker's observer hooks hand
// out borrowed snapshots with no allocation; hosts that want a loggable
// or serialisable artifact build one of these from the snapshot.

use crate::config::TrackerConfig;
use crate::tracking::TrackedBlob;
use crate::types::{classify_travel, Direction, X, Y};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovementEvent {
    /// Unique event identifier (UUID)
    pub event_id: String,
    /// Event timestamp (RFC 3339)
    pub timestamp: String,
    /// Identity of the track that produced the event
    pub track_id: u32,
    /// Classified travel directions; [NO_DIRECTION] when nothing triggered
    pub directions: Vec<Direction>,
    /// Net signed displacement over the track's lifetime, (col, row)
    pub travel: [f32; 2],
    /// Sum of absolute per-frame displacements
    pub total_travel: [f32; 2],
    pub start_pos: [f32; 2],
    pub end_pos: [f32; 2],
    /// Track age at its last update in milliseconds
    pub duration_ms: u64,
    pub times_updated: u32,
    pub max_size: usize,
    pub max_width: i32,
    pub max_height: i32,
    pub max_num_dead_frames: u32,
    /// Average temperature of the final snapshot in deg C
    pub average_temperature: f32,
}

impl MovementEvent {
    /// Build an event from a dying track's final snapshot, classifying its
    /// travel with the same rules the movement counters use.
    pub fn from_track(track: &TrackedBlob, config: &TrackerConfig) -> Self {
        let classification = classify_travel(
            track.travel[X],
            track.travel[Y],
            config.minimum_travel_threshold,
        );

        let mut directions: Vec<Direction> = classification
            .directions()
            .map(|d| {
                if config.invert_travel_direction {
                    d.opposite()
                } else {
                    d
                }
            })
            .collect();
        if directions.is_empty() {
            directions.push(Direction::NoDirection);
        }

        let snapshot = track.snapshot();
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            track_id: track.id,
            directions,
            travel: track.travel,
            total_travel: track.total_travel,
            start_pos: track.start_pos,
            end_pos: [snapshot.centroid_x, snapshot.centroid_y],
            duration_ms: track.event_duration_ms,
            times_updated: track.times_updated,
            max_size: track.max_size,
            max_width: track.max_width,
            max_height: track.max_height,
            max_num_dead_frames: track.max_num_dead_frames,
            average_temperature: snapshot.average_temperature,
        }
    }

    /// Human-readable names of the classified directions.
    pub fn direction_names(&self) -> Vec<&'static str> {
        self.directions.iter().map(|d| d.as_str()).collect()
    }

    /// Convert to a JSON value for logging or transport.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "event_id": self.event_id,
            "event_type": "movement",
            "timestamp": self.timestamp,
            "track_id": self.track_id,
            "directions": self.direction_names(),
            "travel": self.travel,
            "total_travel": self.total_travel,
            "start_pos": self.start_pos,
            "end_pos": self.end_pos,
            "duration_ms": self.duration_ms,
            "times_updated": self.times_updated,
            "max_size": self.max_size,
            "max_num_dead_frames": self.max_num_dead_frames,
            "average_temperature": self.average_temperature,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{Blob, Pixel};

    fn track_with_travel(travel_x: f32, travel_y: f32) -> TrackedBlob {
        let mut blob = Blob::default();
        for col in 6..8 {
            for row in 1..3 {
                blob.add_pixel(Pixel::new(col, row, 30.0));
            }
        }
        let mut track = TrackedBlob::default();
        track.set(&blob, 3, 1_000);
        track.travel = [travel_x, travel_y];
        track
    }

    #[test]
    fn rightward_travel_produces_a_right_event() {
        let track = track_with_travel(6.0, 0.0);
        let event = MovementEvent::from_track(&track, &TrackerConfig::default());

        assert_eq!(event.track_id, 3);
        assert_eq!(event.directions, vec![Direction::Right]);
        assert_eq!(event.direction_names(), vec!["RIGHT"]);
    }

    #[test]
    fn no_travel_falls_back_to_no_direction() {
        let track = track_with_travel(0.5, -0.5);
        let event = MovementEvent::from_track(&track, &TrackerConfig::default());
        assert_eq!(event.directions, vec![Direction::NoDirection]);
    }

    #[test]
    fn inverted_sensor_flips_the_event_directions() {
        let config = TrackerConfig {
            invert_travel_direction: true,
            ..TrackerConfig::default()
        };
        let track = track_with_travel(-5.0, 0.0);
        let event = MovementEvent::from_track(&track, &config);
        assert_eq!(event.directions, vec![Direction::Right]);
    }

    #[test]
    fn json_carries_the_classification() {
        let track = track_with_travel(6.0, 0.0);
        let event = MovementEvent::from_track(&track, &TrackerConfig::default());
        let json = event.to_json();

        assert_eq!(json["event_type"], "movement");
        assert_eq!(json["directions"][0], "RIGHT");
        assert_eq!(json["track_id"], 3);
    }
}
