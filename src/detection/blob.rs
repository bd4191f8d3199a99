// src/detection/blob.rs
//
// Blobs are clumps of adjacent active pixels aggregated into generalised
// characteristics. Pixels themselves are transient: a blob absorbs their
// information without storing them, so every aggregate update is O(1).

use serde::{Deserialize, Serialize};

/// A single foreground sample from the frame scan.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Pixel {
    pub col: i32,
    pub row: i32,
    pub temperature: f32,
}

impl Pixel {
    pub fn new(col: i32, row: i32, temperature: f32) -> Self {
        Self {
            col,
            row,
            temperature,
        }
    }

    /// Chebyshev adjacency widened by the configured fuzz: two pixels
    /// belong to the same blob when both coordinate deltas are at most
    /// 1 + fuzz. Symmetric by construction.
    pub fn is_adjacent(&self, other: &Pixel, fuzz: u32) -> bool {
        let d_col = (self.col - other.col).abs();
        let d_row = (self.row - other.row).abs();
        d_col.max(d_row) <= 1 + fuzz as i32
    }
}

/// A connected aggregate of active pixels with derived geometry and
/// temperature. Inactive until the first pixel is added; lives only for
/// the duration of one frame.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Blob {
    /// Mean (col, row) of the member pixels.
    pub centroid_x: f32,
    pub centroid_y: f32,
    pub min_x: i32,
    pub min_y: i32,
    pub max_x: i32,
    pub max_y: i32,
    pub width: i32,
    pub height: i32,
    pub aspect_ratio: f32,
    pub average_temperature: f32,
    pub num_pixels: usize,
    assigned: bool,
    total_x: f32,
    total_y: f32,
}

impl Blob {
    /// Absorb a pixel, updating centroid, bounds, and average temperature.
    ///
    /// Nothing prevents the same pixel being absorbed twice; the extractor
    /// consumes each active pixel exactly once.
    pub fn add_pixel(&mut self, pixel: Pixel) {
        self.num_pixels += 1;
        let count = self.num_pixels as f32;

        self.total_x += pixel.col as f32;
        self.total_y += pixel.row as f32;
        self.centroid_x = self.total_x / count;
        self.centroid_y = self.total_y / count;

        self.average_temperature =
            (self.average_temperature * (count - 1.0) + pixel.temperature) / count;

        if self.num_pixels == 1 {
            self.min_x = pixel.col;
            self.max_x = pixel.col;
            self.min_y = pixel.row;
            self.max_y = pixel.row;
        } else {
            self.min_x = self.min_x.min(pixel.col);
            self.max_x = self.max_x.max(pixel.col);
            self.min_y = self.min_y.min(pixel.row);
            self.max_y = self.max_y.max(pixel.row);
        }

        self.width = self.max_x - self.min_x + 1;
        self.height = self.max_y - self.min_y + 1;
        self.aspect_ratio = self.width as f32 / self.height.max(1) as f32;
    }

    /// Reset to empty and inactive.
    pub fn clear(&mut self) {
        *self = Blob::default();
    }

    /// A blob is active once it holds at least one pixel.
    pub fn is_active(&self) -> bool {
        self.num_pixels > 0
    }

    pub fn size(&self) -> usize {
        self.num_pixels
    }

    /// Mark the blob as claimed by a track for this frame.
    pub fn set_assigned(&mut self) {
        self.assigned = true;
    }

    pub fn clear_assigned(&mut self) {
        self.assigned = false;
    }

    pub fn is_assigned(&self) -> bool {
        self.assigned
    }
}
