// src/tracking/tracker.rs
//
// Top-level pipeline state. Each ingest() call runs one frame to
// completion: snapshot the frame, build or consult the background,
// extract blobs, match them against live tracks with a greedy
// minimum-score sweep, age out the unmatched, promote the new, and
// classify every track that dies. Everything sits in fixed-size arrays;
// steady-state processing performs no allocation.
//
// Greedy matching is deliberate: with at most 8 tracks and 8 blobs the
// optimal assignment problem is tiny, and the global-minimum sweep is
// simple to reason about and test. Swapping in a Hungarian solver would
// only change outcomes under pathological scoring ties.

use crate::background::BackgroundModel;
use crate::clock::{Clock, MonotonicClock};
use crate::config::TrackerConfig;
use crate::detection::{extract_blobs, Blob};
use crate::tracking::TrackedBlob;
use crate::types::{
    classify_travel, Direction, Frame, FrameError, FRAME_HEIGHT, FRAME_WIDTH, MAX_BLOBS,
    NUM_DIRECTIONS, NUM_PIXELS, X, Y,
};
use tracing::debug;

type Observer = Box<dyn FnMut(&TrackedBlob)>;

pub struct ThermalTracker<C: Clock = MonotonicClock> {
    config: TrackerConfig,
    clock: C,
    frame: Frame,
    background: BackgroundModel,
    tracked_blobs: [TrackedBlob; MAX_BLOBS],
    movements: [i64; NUM_DIRECTIONS],
    movement_changed: bool,
    num_unchanged_frames: u32,
    num_last_blobs: usize,
    next_track_id: u32,
    on_track_start: Option<Observer>,
    on_track_end: Option<Observer>,
}

impl ThermalTracker<MonotonicClock> {
    /// A tracker in background-building state using the wall clock.
    pub fn new(config: TrackerConfig) -> Self {
        Self::with_clock(config, MonotonicClock::new())
    }
}

impl<C: Clock> ThermalTracker<C> {
    pub fn with_clock(config: TrackerConfig, clock: C) -> Self {
        let background = BackgroundModel::new(config.running_average_size);
        Self {
            config,
            clock,
            frame: [[0.0; FRAME_WIDTH]; FRAME_HEIGHT],
            background,
            tracked_blobs: [TrackedBlob::default(); MAX_BLOBS],
            movements: [0; NUM_DIRECTIONS],
            movement_changed: false,
            num_unchanged_frames: 0,
            num_last_blobs: 0,
            next_track_id: 0,
            on_track_start: None,
            on_track_end: None,
        }
    }

    // ========================================================================
    // Frame ingest
    // ========================================================================

    /// Process one thermal frame to completion.
    ///
    /// While the background is still building, the frame feeds the model
    /// and tracking stays suppressed. Afterwards the full detect/match/
    /// classify pipeline runs. Observer callbacks fire synchronously from
    /// inside this call and must not re-enter the tracker.
    pub fn ingest(&mut self, frame: &Frame) {
        self.frame = *frame;

        if !self.background.is_ready() {
            self.background.add_initial(&self.frame);
        } else {
            self.process_steady_state();
        }

        #[cfg(debug_assertions)]
        self.check_frame_invariants();
    }

    /// Ingest a flat row-major pixel buffer, validating its shape.
    pub fn ingest_slice(&mut self, pixels: &[f32]) -> Result<(), FrameError> {
        if pixels.len() != NUM_PIXELS {
            return Err(FrameError::Shape {
                expected: NUM_PIXELS,
                actual: pixels.len(),
            });
        }

        let mut frame = [[0.0; FRAME_WIDTH]; FRAME_HEIGHT];
        for row in 0..FRAME_HEIGHT {
            for col in 0..FRAME_WIDTH {
                frame[row][col] = pixels[row * FRAME_WIDTH + col];
            }
        }
        self.ingest(&frame);
        Ok(())
    }

    fn process_steady_state(&mut self) {
        let mut blobs = [Blob::default(); MAX_BLOBS];
        let num_blobs = extract_blobs(&self.frame, &self.background, &self.config, &mut blobs);

        // Activity gate: frames with foreground stay out of the background,
        // unless the activity has sat there so long it must be scenery.
        let mut add_to_background = true;
        if num_blobs > 0 {
            add_to_background = false;
            self.num_unchanged_frames += 1;
            if self.num_unchanged_frames > self.config.unchanged_frame_delay {
                add_to_background = true;
            }
        } else {
            self.num_unchanged_frames = 0;
        }

        self.num_last_blobs = num_blobs;
        self.track_blobs(&mut blobs);

        if add_to_background {
            self.background.add_rolling(&self.frame);
        }
    }

    // ========================================================================
    // Matching and lifecycle
    // ========================================================================

    fn track_blobs(&mut self, blobs: &mut [Blob; MAX_BLOBS]) {
        let now_ms = self.clock.now_ms();

        if self.active_track_count() > 0 {
            self.match_tracks(blobs, now_ms);
            self.age_and_compact_tracks();
        }

        self.promote_new_tracks(blobs, now_ms);
    }

    /// Greedy minimum-score assignment between live tracks and new blobs.
    /// Each accepted pair blanks its row and column, so no track or blob
    /// can match twice.
    fn match_tracks(&mut self, blobs: &mut [Blob; MAX_BLOBS], now_ms: u64) {
        for i in 0..MAX_BLOBS {
            self.tracked_blobs[i].reset_updated_status();
            blobs[i].clear_assigned();
        }

        let threshold = self.config.max_difference_threshold;
        let mut matrix = self.difference_matrix(blobs);

        while let Some((track_index, blob_index, score)) = lowest_difference(&matrix, threshold) {
            self.tracked_blobs[track_index].update_blob(&blobs[blob_index], now_ms, &self.config);
            blobs[blob_index].set_assigned();
            debug!(
                track = self.tracked_blobs[track_index].id,
                score, "matched track to blob"
            );
            blank_row_col(&mut matrix, track_index, blob_index, threshold);
        }
    }

    fn difference_matrix(&mut self, blobs: &[Blob; MAX_BLOBS]) -> [[f32; MAX_BLOBS]; MAX_BLOBS] {
        let threshold = self.config.max_difference_threshold;
        let mut matrix = [[threshold; MAX_BLOBS]; MAX_BLOBS];

        for i in 0..MAX_BLOBS {
            for j in 0..MAX_BLOBS {
                if self.tracked_blobs[i].is_active() && blobs[j].is_active() {
                    matrix[i][j] = self.tracked_blobs[i].difference(&blobs[j], &self.config);
                }
            }
        }

        matrix
    }

    /// One pass over the slots: bump dead-frame counts, keep survivors
    /// compacted at the front, and finalise tracks that have been dead
    /// too long.
    fn age_and_compact_tracks(&mut self) {
        let mut free_index = MAX_BLOBS + 1;

        for i in 0..MAX_BLOBS {
            if !self.tracked_blobs[i].has_updated {
                self.tracked_blobs[i].num_dead_frames += 1;
            }

            if self.tracked_blobs[i].has_updated
                || self.tracked_blobs[i].num_dead_frames < self.config.max_dead_frames
            {
                if free_index < i {
                    self.tracked_blobs[free_index] = self.tracked_blobs[i];
                    self.tracked_blobs[i].clear();
                    free_index += 1;
                }
            } else {
                if self.tracked_blobs[i].is_active() {
                    let dying = self.tracked_blobs[i];
                    self.finalize_track(&dying);
                }
                self.tracked_blobs[i].clear();
                if free_index > i {
                    free_index = i;
                }
            }
        }
    }

    /// Classify a dying track's net travel, bump the movement counters,
    /// and hand the final snapshot to the end observer.
    fn finalize_track(&mut self, dying: &TrackedBlob) {
        let classification = classify_travel(
            dying.travel[X],
            dying.travel[Y],
            self.config.minimum_travel_threshold,
        );

        if classification.is_empty() {
            self.add_movement(Direction::NoDirection);
        } else {
            for direction in classification.directions() {
                let direction = if self.config.invert_travel_direction {
                    direction.opposite()
                } else {
                    direction
                };
                self.add_movement(direction);
            }
        }

        debug!(
            track = dying.id,
            travel_x = dying.travel[X],
            travel_y = dying.travel[Y],
            updates = dying.times_updated,
            duration_ms = dying.event_duration_ms,
            "track ended"
        );

        if let Some(callback) = self.on_track_end.as_mut() {
            callback(dying);
        }
    }

    /// Give every unassigned blob a free slot, if one remains. Occupied
    /// slots are never evicted: existing tracks outrank newcomers.
    fn promote_new_tracks(&mut self, blobs: &mut [Blob; MAX_BLOBS], now_ms: u64) {
        for blob_index in 0..MAX_BLOBS {
            if !blobs[blob_index].is_active() || blobs[blob_index].is_assigned() {
                continue;
            }

            let Some(slot) = self.tracked_blobs.iter().position(|t| !t.is_active()) else {
                debug!("track slots full, dropping unmatched blob");
                break;
            };

            let id = self.next_track_id;
            self.next_track_id = self.next_track_id.wrapping_add(1);
            self.tracked_blobs[slot].set(&blobs[blob_index], id, now_ms);
            blobs[blob_index].set_assigned();
            debug!(
                track = id,
                x = blobs[blob_index].centroid_x,
                y = blobs[blob_index].centroid_y,
                "new track started"
            );

            if let Some(callback) = self.on_track_start.as_mut() {
                callback(&self.tracked_blobs[slot]);
            }
        }
    }

    fn add_movement(&mut self, direction: Direction) {
        self.movements[direction.index()] += 1;
        self.movement_changed = true;
    }

    // ========================================================================
    // Host surface
    // ========================================================================

    /// Called when a new track is created. Fires synchronously from
    /// `ingest`; the handler must not re-enter the tracker.
    pub fn set_track_start_observer<F>(&mut self, observer: F)
    where
        F: FnMut(&TrackedBlob) + 'static,
    {
        self.on_track_start = Some(Box::new(observer));
    }

    /// Called with the final snapshot when a track is dropped.
    pub fn set_track_end_observer<F>(&mut self, observer: F)
    where
        F: FnMut(&TrackedBlob) + 'static,
    {
        self.on_track_end = Some(Box::new(observer));
    }

    /// Copy out the movement counters, clearing the changed flag.
    /// Layout: [LEFT, RIGHT, UP, DOWN, NO_DIRECTION].
    pub fn read_movement_counters(&mut self) -> [i64; NUM_DIRECTIONS] {
        self.movement_changed = false;
        self.movements
    }

    /// Whether any movement has been recorded since the last read.
    pub fn has_new_movements(&self) -> bool {
        self.movement_changed
    }

    pub fn reset_movements(&mut self) {
        self.movements = [0; NUM_DIRECTIONS];
        self.movement_changed = false;
    }

    /// Throw away the background and rebuild it from the next frames.
    /// Tracking stays suppressed until the build completes.
    pub fn reset_background(&mut self) {
        self.background.reset();
    }

    pub fn is_background_ready(&self) -> bool {
        self.background.is_ready()
    }

    /// Surviving blob count from the most recent steady-state frame.
    pub fn num_last_blobs(&self) -> usize {
        self.num_last_blobs
    }

    /// Per-pixel background mean temperatures in deg C.
    pub fn background_means(&self) -> Frame {
        *self.background.means()
    }

    /// Per-pixel background scale estimates.
    pub fn background_deviations(&self) -> Frame {
        *self.background.deviations()
    }

    /// Ambient scene temperature: the mean of the background means.
    pub fn average_ambient_temperature(&self) -> f32 {
        self.background.average_temperature()
    }

    /// The live tracks, in slot order.
    pub fn tracks(&self) -> impl Iterator<Item = &TrackedBlob> {
        self.tracked_blobs.iter().filter(|t| t.is_active())
    }

    pub fn active_track_count(&self) -> usize {
        self.tracked_blobs.iter().filter(|t| t.is_active()).count()
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    #[cfg(debug_assertions)]
    fn check_frame_invariants(&self) {
        debug_assert!(self.num_last_blobs <= MAX_BLOBS);
        debug_assert!(self.active_track_count() <= MAX_BLOBS);

        let mut seen_empty = false;
        for track in &self.tracked_blobs {
            if track.is_active() {
                debug_assert!(!seen_empty, "track slots must stay compacted");
            } else {
                seen_empty = true;
            }
        }
    }
}

fn lowest_difference(
    matrix: &[[f32; MAX_BLOBS]; MAX_BLOBS],
    threshold: f32,
) -> Option<(usize, usize, f32)> {
    let mut lowest = threshold;
    let mut found = None;

    for (i, row) in matrix.iter().enumerate() {
        for (j, &difference) in row.iter().enumerate() {
            if difference < lowest {
                lowest = difference;
                found = Some((i, j, difference));
            }
        }
    }

    found
}

/// Mark a matched pair's row and column unusable for further matching.
fn blank_row_col(
    matrix: &mut [[f32; MAX_BLOBS]; MAX_BLOBS],
    row: usize,
    col: usize,
    threshold: f32,
) {
    for i in 0..MAX_BLOBS {
        matrix[row][i] = threshold;
        matrix[i][col] = threshold;
    }
}
