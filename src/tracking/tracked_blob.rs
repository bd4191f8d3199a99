// src/tracking/tracked_blob.rs
//
// A blob identity that persists across frames. Holds the last matched
// blob as its snapshot plus everything needed to score candidates in the
// next frame: a linear position prediction, cumulative travel, and the
// per-dimension difference history.

use crate::config::TrackerConfig;
use crate::detection::Blob;
use crate::types::{FRAME_WIDTH, X, Y};

#[derive(Debug, Clone, Copy)]
pub struct TrackedBlob {
    pub id: u32,
    blob: Blob,
    /// Linear extrapolation of the next centroid; [-1, -1] until the first
    /// update provides a displacement.
    pub predicted_position: [f32; 2],
    /// Net signed displacement since creation.
    pub travel: [f32; 2],
    /// Sum of absolute per-frame displacements since creation.
    pub total_travel: [f32; 2],
    pub start_pos: [f32; 2],
    pub start_time_ms: u64,
    /// Age at the most recent update.
    pub event_duration_ms: u64,
    pub has_updated: bool,
    /// Successful matches since creation.
    pub times_updated: u32,
    pub max_size: usize,
    pub max_width: i32,
    pub max_height: i32,
    /// Consecutive frames without a match.
    pub num_dead_frames: u32,
    pub max_num_dead_frames: u32,

    pub max_difference: f32,
    pub average_difference: f32,

    // Last difference components, refreshed by every scoring pass.
    pub position_difference: f32,
    pub area_difference: f32,
    pub aspect_ratio_difference: f32,
    pub temperature_difference: f32,
    pub direction_difference: f32,
    pub dead_frame_difference: f32,
    pub edge_penalty: f32,

    pub average_position_difference: f32,
    pub average_area_difference: f32,
    pub average_aspect_ratio_difference: f32,
    pub average_temperature_difference: f32,
    pub average_direction_difference: f32,
}

impl Default for TrackedBlob {
    fn default() -> Self {
        Self {
            id: 0,
            blob: Blob::default(),
            predicted_position: [-1.0, -1.0],
            travel: [0.0, 0.0],
            total_travel: [0.0, 0.0],
            start_pos: [0.0, 0.0],
            start_time_ms: 0,
            event_duration_ms: 0,
            has_updated: false,
            times_updated: 0,
            max_size: 0,
            max_width: 0,
            max_height: 0,
            num_dead_frames: 0,
            max_num_dead_frames: 0,
            max_difference: 0.0,
            average_difference: 0.0,
            position_difference: 0.0,
            area_difference: 0.0,
            aspect_ratio_difference: 0.0,
            temperature_difference: 0.0,
            direction_difference: 0.0,
            dead_frame_difference: 0.0,
            edge_penalty: 1.0,
            average_position_difference: 0.0,
            average_area_difference: 0.0,
            average_aspect_ratio_difference: 0.0,
            average_temperature_difference: 0.0,
            average_direction_difference: 0.0,
        }
    }
}

impl TrackedBlob {
    /// Mark the slot empty. All tracking history is lost.
    pub fn clear(&mut self) {
        *self = TrackedBlob::default();
    }

    /// Begin tracking a blob. Previous history in this slot is discarded.
    pub fn set(&mut self, blob: &Blob, id: u32, now_ms: u64) {
        self.clear();
        self.id = id;
        self.blob = *blob;
        self.has_updated = true;
        self.start_pos = [blob.centroid_x, blob.centroid_y];
        self.start_time_ms = now_ms;
        self.max_size = blob.size();
        self.max_width = blob.width;
        self.max_height = blob.height;
    }

    /// A slot is in use while its embedded snapshot holds pixels.
    pub fn is_active(&self) -> bool {
        self.blob.is_active()
    }

    /// The last matched blob.
    pub fn snapshot(&self) -> &Blob {
        &self.blob
    }

    pub fn reset_updated_status(&mut self) {
        self.has_updated = false;
    }

    /// Fold a matched candidate into the track: refresh the difference
    /// history, record the displacement and new prediction, replace the
    /// snapshot, and grow the lifetime envelope.
    pub fn update_blob(&mut self, candidate: &Blob, now_ms: u64, config: &TrackerConfig) {
        self.event_duration_ms = now_ms.saturating_sub(self.start_time_ms);
        self.update_differences(candidate, config);
        self.update_movements(candidate);
        self.blob = *candidate;
        self.update_geometry(candidate);

        self.has_updated = true;
        if self.num_dead_frames > self.max_num_dead_frames {
            self.max_num_dead_frames = self.num_dead_frames;
        }
        self.num_dead_frames = 0;
        self.times_updated += 1;
    }

    // ========================================================================
    // Difference scoring
    // ========================================================================

    /// How different this track is from a candidate blob; low means likely
    /// the same object. Refreshes the stored per-dimension components as a
    /// side effect.
    ///
    /// The dead-frame component is recorded for introspection but kept out
    /// of the total; it only weighs on lifecycle decisions.
    pub fn difference(&mut self, candidate: &Blob, config: &TrackerConfig) -> f32 {
        let weights = &config.weights;

        self.edge_penalty = self.edge_penalty_for(candidate.centroid_x);
        self.position_difference = self.position_difference_for(candidate, weights.position_penalty);
        self.area_difference = (self.blob.size() as f32 - candidate.size() as f32).abs()
            * weights.area_penalty
            * self.edge_penalty;
        self.aspect_ratio_difference = (self.blob.aspect_ratio - candidate.aspect_ratio).abs()
            * weights.aspect_ratio_penalty
            * self.edge_penalty;
        self.temperature_difference = (self.blob.average_temperature
            - candidate.average_temperature)
            .abs()
            * weights.temperature_penalty;
        self.direction_difference = self.direction_difference_for(weights.direction_penalty);
        self.dead_frame_difference = self.num_dead_frames as f32 * config.dead_frame_penalty();

        self.position_difference
            + self.area_difference
            + self.aspect_ratio_difference
            + self.temperature_difference
            + self.direction_difference
    }

    /// Whether the tracked snapshot is judged to be touching a vertical
    /// edge of the frame.
    ///
    /// The right-hand comparison keeps its historical `<=` orientation, so
    /// most blobs away from the right edge also count as touching; the
    /// scoring weights have been tuned around that behaviour. Flipping it
    /// would harden matching across most of the frame.
    pub fn is_touching_side(&self) -> bool {
        let half_width = self.blob.width as f32 / 2.0;

        self.blob.centroid_x - half_width <= 1.0
            || self.blob.centroid_x + half_width <= (FRAME_WIDTH - 1) as f32
    }

    /// Softens the score while the snapshot touches a side: blobs there are
    /// probably still forming, so mismatches carry less weight. Candidates
    /// near the frame centre get no leeway.
    fn edge_penalty_for(&self, candidate_x: f32) -> f32 {
        if self.is_touching_side() {
            let half_frame = FRAME_WIDTH as f32 / 2.0;
            1.0 - (half_frame - candidate_x).abs() / half_frame
        } else {
            1.0
        }
    }

    fn position_difference_for(&self, candidate: &Blob, penalty: f32) -> f32 {
        let mut difference = 0.0;

        if self.predicted_position[X] >= 0.0 && self.predicted_position[Y] >= 0.0 {
            difference += (self.predicted_position[X] - candidate.centroid_x).abs() * penalty;
            difference += (self.predicted_position[Y] - candidate.centroid_y).abs() * penalty;
        } else {
            // No displacement seen yet; score against the raw centroid.
            difference += (self.blob.centroid_x - candidate.centroid_x).abs() * penalty;
            difference += (self.blob.centroid_y - candidate.centroid_y).abs() * penalty;
        }

        difference * self.edge_penalty
    }

    /// Binary penalty for reversing the net travel direction. Only applies
    /// to established tracks away from the frame edges, where a sign flip
    /// is more likely a mismatch than a real turn-around.
    fn direction_difference_for(&self, penalty: f32) -> f32 {
        let latest_direction = self.predicted_position[X] - self.blob.centroid_x;

        if !self.is_touching_side()
            && self.times_updated > 1
            && (latest_direction >= 0.0) != (self.travel[X] >= 0.0)
        {
            penalty
        } else {
            0.0
        }
    }

    // ========================================================================
    // Update helpers
    // ========================================================================

    fn update_differences(&mut self, candidate: &Blob, config: &TrackerConfig) {
        let difference = self.difference(candidate, config);
        let count = self.times_updated as f32;

        self.average_difference = (self.average_difference * count + difference) / (count + 1.0);
        if difference > self.max_difference {
            self.max_difference = difference;
        }

        self.average_area_difference =
            (self.average_area_difference * count + self.area_difference) / (count + 1.0);
        self.average_position_difference =
            (self.average_position_difference * count + self.position_difference) / (count + 1.0);
        self.average_aspect_ratio_difference = (self.average_aspect_ratio_difference * count
            + self.aspect_ratio_difference)
            / (count + 1.0);
        self.average_direction_difference =
            (self.average_direction_difference * count + self.direction_difference) / (count + 1.0);
        self.average_temperature_difference = (self.average_temperature_difference * count
            + self.temperature_difference)
            / (count + 1.0);
    }

    fn update_movements(&mut self, candidate: &Blob) {
        let movement = [
            candidate.centroid_x - self.blob.centroid_x,
            candidate.centroid_y - self.blob.centroid_y,
        ];

        self.predicted_position = [
            candidate.centroid_x + movement[X],
            candidate.centroid_y + movement[Y],
        ];

        self.travel[X] += movement[X];
        self.travel[Y] += movement[Y];
        self.total_travel[X] += movement[X].abs();
        self.total_travel[Y] += movement[Y].abs();
    }

    fn update_geometry(&mut self, candidate: &Blob) {
        if candidate.size() > self.max_size {
            self.max_size = candidate.size();
        }
        if candidate.width > self.max_width {
            self.max_width = candidate.width;
        }
        if candidate.height > self.max_height {
            self.max_height = candidate.height;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::Pixel;
    use approx::assert_relative_eq;

    /// A rectangular blob of the given footprint at a uniform temperature.
    fn blob_at(col: i32, row: i32, width: i32, height: i32, temp: f32) -> Blob {
        let mut blob = Blob::default();
        for dy in 0..height {
            for dx in 0..width {
                blob.add_pixel(Pixel::new(col + dx, row + dy, temp));
            }
        }
        blob
    }

    fn config() -> TrackerConfig {
        TrackerConfig::default()
    }

    #[test]
    fn set_seeds_the_track() {
        let blob = blob_at(3, 1, 2, 2, 30.0);
        let mut track = TrackedBlob::default();
        track.set(&blob, 7, 1_000);

        assert!(track.is_active());
        assert_eq!(track.id, 7);
        assert_eq!(track.times_updated, 0);
        assert!(track.has_updated);
        assert_eq!(track.start_time_ms, 1_000);
        assert_relative_eq!(track.start_pos[X], 3.5);
        assert_relative_eq!(track.start_pos[Y], 1.5);
        assert_eq!(track.max_size, 4);
        assert_eq!(track.predicted_position, [-1.0, -1.0]);
    }

    #[test]
    fn update_records_movement_and_prediction() {
        let mut track = TrackedBlob::default();
        track.set(&blob_at(2, 1, 2, 2, 30.0), 0, 0);

        track.update_blob(&blob_at(3, 1, 2, 2, 30.0), 62, &config());

        assert_eq!(track.times_updated, 1);
        assert_eq!(track.event_duration_ms, 62);
        assert_relative_eq!(track.travel[X], 1.0);
        assert_relative_eq!(track.travel[Y], 0.0);
        // Next centroid extrapolated one more column to the right.
        assert_relative_eq!(track.predicted_position[X], 4.5);
        assert_relative_eq!(track.predicted_position[Y], 1.5);
        assert_relative_eq!(track.snapshot().centroid_x, 3.5);
    }

    #[test]
    fn travel_is_signed_and_total_travel_is_not() {
        let mut track = TrackedBlob::default();
        track.set(&blob_at(5, 1, 2, 2, 30.0), 0, 0);

        track.update_blob(&blob_at(7, 1, 2, 2, 30.0), 62, &config());
        track.update_blob(&blob_at(5, 1, 2, 2, 30.0), 124, &config());

        assert_relative_eq!(track.travel[X], 0.0);
        assert_relative_eq!(track.total_travel[X], 4.0);
    }

    #[test]
    fn first_score_uses_raw_centroid_not_prediction() {
        let mut track = TrackedBlob::default();
        track.set(&blob_at(2, 1, 2, 2, 30.0), 0, 0);

        // Identical blob one column over: only position differs.
        let score = track.difference(&blob_at(3, 1, 2, 2, 30.0), &config());
        let expected = 1.0 * config().weights.position_penalty * track.edge_penalty;
        assert_relative_eq!(score, expected, epsilon = 1e-5);
    }

    #[test]
    fn perfect_candidate_scores_zero() {
        let blob = blob_at(6, 1, 3, 2, 31.0);
        let mut track = TrackedBlob::default();
        track.set(&blob, 0, 0);

        assert_relative_eq!(track.difference(&blob, &config()), 0.0);
    }

    #[test]
    fn temperature_mismatch_ignores_edge_penalty() {
        let mut track = TrackedBlob::default();
        track.set(&blob_at(0, 0, 2, 2, 30.0), 0, 0);

        let _ = track.difference(&blob_at(0, 0, 2, 2, 32.0), &config());
        // 2 degC * weight, with no edge softening applied.
        assert_relative_eq!(track.temperature_difference, 20.0, epsilon = 1e-5);
    }

    #[test]
    fn touching_side_predicate_cases() {
        // (centroid_x, width, historical verdict, near-an-edge reading).
        // The two columns disagree in the middle of the frame and at the
        // right edge; the implementation follows the historical verdict.
        let cases = [
            (0.5_f32, 2, true, true),
            (1.5, 2, true, true),
            (7.5, 2, true, false),
            (11.5, 4, true, false),
            (15.0, 1, false, true),
            (14.5, 2, false, true),
        ];

        for (centroid_x, width, historical, _near_edge) in cases {
            let col = (centroid_x - (width as f32 - 1.0) / 2.0) as i32;
            let mut track = TrackedBlob::default();
            track.set(&blob_at(col, 1, width, 2, 30.0), 0, 0);
            assert_eq!(
                track.is_touching_side(),
                historical,
                "centroid_x={} width={}",
                centroid_x,
                width
            );
        }
    }

    #[test]
    fn direction_penalty_needs_established_track_off_the_edge() {
        let config = config();
        // A single pixel at the right edge is the one place the predicate
        // reports "not touching", so the direction gate can open.
        let mut track = TrackedBlob::default();
        track.set(&blob_at(13, 1, 1, 1, 30.0), 0, 0);
        track.update_blob(&blob_at(14, 1, 1, 1, 30.0), 62, &config);
        track.update_blob(&blob_at(15, 1, 1, 1, 30.0), 124, &config);
        assert!(!track.is_touching_side());
        assert!(track.times_updated > 1);

        // Prediction says col 16, net travel is rightward; a candidate is
        // scored with the penalty only if the sign of the incoming motion
        // disagrees -- which it cannot here, so craft the disagreement by
        // reversing the track's accumulated travel.
        let before = track.difference(&blob_at(14, 1, 1, 1, 30.0), &config);
        assert_relative_eq!(track.direction_difference, 0.0);

        track.travel[X] = -3.0;
        let after = track.difference(&blob_at(14, 1, 1, 1, 30.0), &config);
        assert_relative_eq!(track.direction_difference, config.weights.direction_penalty);
        assert_relative_eq!(after - before, config.weights.direction_penalty, epsilon = 1e-4);
    }

    #[test]
    fn dead_frame_score_is_recorded_but_not_totalled() {
        let config = config();
        let blob = blob_at(4, 1, 2, 2, 30.0);
        let mut track = TrackedBlob::default();
        track.set(&blob, 0, 0);

        let clean = track.difference(&blob, &config);
        track.num_dead_frames = 2;
        let coasting = track.difference(&blob, &config);

        assert_relative_eq!(clean, coasting);
        assert_relative_eq!(
            track.dead_frame_difference,
            2.0 * config.dead_frame_penalty()
        );
    }

    #[test]
    fn update_resets_dead_frames_and_records_the_worst_run() {
        let mut track = TrackedBlob::default();
        track.set(&blob_at(4, 1, 2, 2, 30.0), 0, 0);

        track.num_dead_frames = 3;
        track.update_blob(&blob_at(5, 1, 2, 2, 30.0), 62, &config());

        assert_eq!(track.num_dead_frames, 0);
        assert_eq!(track.max_num_dead_frames, 3);

        track.num_dead_frames = 1;
        track.update_blob(&blob_at(6, 1, 2, 2, 30.0), 124, &config());
        assert_eq!(track.max_num_dead_frames, 3);
    }

    #[test]
    fn averages_accumulate_over_updates() {
        let config = config();
        let mut track = TrackedBlob::default();
        track.set(&blob_at(2, 1, 2, 2, 30.0), 0, 0);

        track.update_blob(&blob_at(3, 1, 2, 2, 30.0), 62, &config);
        let first = track.average_difference;
        assert!(first > 0.0);
        assert_eq!(track.times_updated, 1);

        // A perfectly predicted second step scores zero and halves the average.
        track.update_blob(&blob_at(4, 1, 2, 2, 30.0), 124, &config);
        assert_relative_eq!(track.average_difference, first / 2.0, epsilon = 1e-4);
        assert_relative_eq!(track.max_difference, first, epsilon = 1e-5);
    }

    #[test]
    fn geometry_envelope_only_grows() {
        let mut track = TrackedBlob::default();
        track.set(&blob_at(4, 0, 2, 2, 30.0), 0, 0);

        track.update_blob(&blob_at(4, 0, 4, 3, 30.0), 62, &config());
        assert_eq!((track.max_width, track.max_height, track.max_size), (4, 3, 12));

        track.update_blob(&blob_at(5, 1, 2, 1, 30.0), 124, &config());
        assert_eq!((track.max_width, track.max_height, track.max_size), (4, 3, 12));
    }
}
