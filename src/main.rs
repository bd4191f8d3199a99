// src/main.rs
//
// Synthetic-scene demo: warms up the background on an empty room, then
// walks warm bodies across the field of view and prints the movement
// events and final counters. Useful for eyeballing the pipeline without
// a sensor attached.

use anyhow::Result;
use thermal_tracker::{
    Frame, MovementEvent, ThermalTracker, TrackerConfig, FRAME_HEIGHT, FRAME_WIDTH,
};
use tracing::info;

const AMBIENT: f32 = 22.0;
const BODY: f32 = 30.5;

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "thermal_tracker=info".into()),
        )
        .init();

    info!("Thermal motion tracker demo starting");

    // Load configuration (optional path argument), else defaults
    let config = match std::env::args().nth(1) {
        Some(path) => {
            let config = TrackerConfig::load(&path)?;
            info!("Configuration loaded from {}", path);
            config
        }
        None => TrackerConfig::default(),
    };
    config.validate()?;

    let mut tracker = ThermalTracker::new(config.clone());

    let event_config = config.clone();
    tracker.set_track_start_observer(|track| {
        info!(
            track = track.id,
            x = track.start_pos[0],
            y = track.start_pos[1],
            "track started"
        );
    });
    tracker.set_track_end_observer(move |track| {
        let event = MovementEvent::from_track(track, &event_config);
        info!("{}", event.to_json());
    });

    // Build the background on an empty scene
    info!(
        frames = config.running_average_size,
        "building background on an empty scene"
    );
    for _ in 0..config.running_average_size {
        tracker.ingest(&flat(AMBIENT));
    }
    info!(
        ambient = tracker.average_ambient_temperature(),
        "background ready"
    );

    // A body crossing left to right, then another crossing right to left
    for col in 1..13 {
        tracker.ingest(&body_frame(1, col));
    }
    drain(&mut tracker);

    for col in (1..13).rev() {
        tracker.ingest(&body_frame(1, col));
    }
    drain(&mut tracker);

    // A visitor that appears mid-frame and leaves without going anywhere
    for _ in 0..3 {
        tracker.ingest(&body_frame(1, 7));
    }
    drain(&mut tracker);

    let counters = tracker.read_movement_counters();
    info!("========================================");
    info!("Movement summary");
    info!("  LEFT:         {}", counters[0]);
    info!("  RIGHT:        {}", counters[1]);
    info!("  UP:           {}", counters[2]);
    info!("  DOWN:         {}", counters[3]);
    info!("  NO_DIRECTION: {}", counters[4]);
    info!("========================================");

    Ok(())
}

fn flat(temp: f32) -> Frame {
    [[temp; FRAME_WIDTH]; FRAME_HEIGHT]
}

/// A 3x2 warm body with its top-left corner at (row, col).
fn body_frame(row: usize, col: usize) -> Frame {
    let mut frame = flat(AMBIENT);
    for r in row..(row + 2).min(FRAME_HEIGHT) {
        for c in col..(col + 3).min(FRAME_WIDTH) {
            frame[r][c] = BODY;
        }
    }
    frame
}

/// Quiet frames until coasting tracks have aged out.
fn drain(tracker: &mut ThermalTracker) {
    for _ in 0..8 {
        tracker.ingest(&flat(AMBIENT));
    }
}
