//! Row bands: the unit of parallel work for a frame.
//!
//! The image rows are cut into contiguous, disjoint ranges. Each band is
//! rendered by a single work unit, so bands never write the same pixel.
//! Row 0 is the bottom of the image; band 0 holds the top rows.

/// A contiguous range of image rows, `start_row..end_row`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Band {
    /// Position of this band in the frame, top band first
    pub index: usize,
    /// Lowest row (inclusive), row 0 is the bottom of the image
    pub start_row: u32,
    /// Last row (exclusive)
    pub end_row: u32,
}

impl Band {
    pub fn new(index: usize, start_row: u32, end_row: u32) -> Self {
        Self { index, start_row, end_row }
    }

    /// Number of rows in this band.
    pub fn row_count(&self) -> u32 {
        self.end_row - self.start_row
    }

    /// Number of pixels in this band for an image `width` pixels wide.
    pub fn pixel_count(&self, width: u32) -> usize {
        self.row_count() as usize * width as usize
    }
}

/// Split `height` rows into `band_count` bands.
///
/// Bands are laid out from the top of the image down: band 0 owns the
/// highest rows. Every band gets `height / band_count` rows and the last
/// one, at the bottom, also takes the remainder. A band count above the row
/// count is clamped so no band is empty; zero bands yields nothing.
pub fn split_rows(height: u32, band_count: u32) -> Vec<Band> {
    let band_count = band_count.min(height);
    if band_count == 0 {
        return Vec::new();
    }

    let rows_per_band = height / band_count;
    (0..band_count)
        .map(|i| {
            // Distance from the top edge
            let top = i * rows_per_band;
            let bottom = if i + 1 == band_count { height } else { top + rows_per_band };
            Band::new(i as usize, height - bottom, height - top)
        })
        .collect()
}
