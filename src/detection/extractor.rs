// src/detection/extractor.rs
//
// Turns one frame plus the background model into at most MAX_BLOBS blobs.
//
// Grouping walks a sort-queue over the active-pixel buffer: the queue is
// seeded with the first remaining pixel, every queue pixel pulls its
// adjacent survivors into the queue, and non-adjacent survivors are
// compacted toward the front of the buffer on the fly. A queue pixel that
// has finished scanning is absorbed into the current blob and never
// touched again; the blob is complete when the queue cursor catches its
// tail. Everything runs in two fixed W*H scratch buffers.

use crate::background::BackgroundModel;
use crate::config::TrackerConfig;
use crate::detection::blob::{Blob, Pixel};
use crate::types::{Frame, FRAME_HEIGHT, FRAME_WIDTH, MAX_BLOBS, NUM_PIXELS};
use tracing::debug;

/// Scan the frame, group active pixels into blobs, and prune the runts.
/// Returns the number of surviving blobs, compacted to the front of `blobs`.
pub fn extract_blobs(
    frame: &Frame,
    background: &BackgroundModel,
    config: &TrackerConfig,
    blobs: &mut [Blob; MAX_BLOBS],
) -> usize {
    for blob in blobs.iter_mut() {
        blob.clear();
    }

    let mut active = [Pixel::default(); NUM_PIXELS];
    let num_active = collect_active_pixels(frame, background, config, &mut active);

    group_into_blobs(&mut active, num_active, config.adjacency_fuzz, blobs);
    prune_small_blobs(blobs, config.min_blob_size);

    count_active_blobs(blobs)
}

/// Row-major scan for pixels that stand out from the background.
fn collect_active_pixels(
    frame: &Frame,
    background: &BackgroundModel,
    config: &TrackerConfig,
    out: &mut [Pixel; NUM_PIXELS],
) -> usize {
    let mut num_active = 0;

    for row in 0..FRAME_HEIGHT {
        for col in 0..FRAME_WIDTH {
            let temp = frame[row][col];
            if background.is_active(row, col, temp, config) {
                out[num_active] = Pixel::new(col as i32, row as i32, temp);
                num_active += 1;
            }
        }
    }

    num_active
}

fn group_into_blobs(
    active: &mut [Pixel; NUM_PIXELS],
    mut num_active: usize,
    fuzz: u32,
    blobs: &mut [Blob; MAX_BLOBS],
) -> usize {
    let mut num_blobs = 0;

    while num_active > 0 && num_blobs < MAX_BLOBS {
        let mut sort_queue = [Pixel::default(); NUM_PIXELS];
        let mut num_queued = 1;
        sort_queue[0] = active[0];

        // The seed still occupies active[0]; the first sweep skips it and
        // the compaction below reclaims its slot.
        let mut seed_in_buffer = true;
        let mut queue_index = 0;

        while queue_index < num_queued {
            let mut vacant = 0;
            let first = if seed_in_buffer { 1 } else { 0 };

            for i in first..num_active {
                if sort_queue[queue_index].is_adjacent(&active[i], fuzz) {
                    sort_queue[num_queued] = active[i];
                    num_queued += 1;
                } else {
                    if vacant < i {
                        active[vacant] = active[i];
                    }
                    vacant += 1;
                }
            }
            seed_in_buffer = false;

            // Survivor count only changes between sweeps, never during one.
            num_active = vacant;

            blobs[num_blobs].add_pixel(sort_queue[queue_index]);
            queue_index += 1;
        }

        num_blobs += 1;
    }

    if num_active > 0 {
        debug!(
            dropped_pixels = num_active,
            "blob capacity reached, leftover active pixels ignored"
        );
    }

    num_blobs
}

/// Drop blobs below the minimum size and close the gaps so survivors sit
/// at the front of the array.
fn prune_small_blobs(blobs: &mut [Blob; MAX_BLOBS], min_blob_size: usize) {
    let mut vacant = MAX_BLOBS + 1;

    for i in 0..MAX_BLOBS {
        if blobs[i].size() < min_blob_size {
            blobs[i].clear();
            if i < vacant {
                vacant = i;
            }
        } else if i > vacant {
            blobs[vacant] = blobs[i];
            blobs[i].clear();
            vacant += 1;
        }
    }
}

pub fn count_active_blobs(blobs: &[Blob; MAX_BLOBS]) -> usize {
    blobs.iter().filter(|b| b.is_active()).count()
}
