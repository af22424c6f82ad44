use crate::body::GridCoord;
use anyhow::{Context, Result};
use gravity_common::{MergeCategory, TrailImage};
use image::{Rgb, RgbImage};
use rayon::prelude::*;
use std::path::Path;

/// Merge history of one seed cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrailCell {
    pub last_merge_tick: u64,
    pub category: MergeCategory,
}

/// Records, per seed grid cell, when and how the body launched from it merged.
#[derive(Debug, Clone)]
pub struct TrailGrid {
    width: u32,
    height: u32,
    cells: Vec<TrailCell>,
}

impl TrailGrid {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            cells: vec![TrailCell::default(); width as usize * height as usize],
        }
    }

    fn index(&self, coord: GridCoord) -> Option<usize> {
        if coord.ix < self.width && coord.iy < self.height {
            Some((coord.iy * self.width + coord.ix) as usize)
        } else {
            None
        }
    }

    pub fn cell(&self, coord: GridCoord) -> Option<&TrailCell> {
        self.index(coord).map(|i| &self.cells[i])
    }

    /// Returns false when the coordinate lies outside the grid.
    pub fn record(&mut self, coord: GridCoord, tick: u64, category: MergeCategory) -> bool {
        match self.index(coord) {
            Some(i) => {
                self.cells[i] = TrailCell { last_merge_tick: tick, category };
                true
            }
            None => false,
        }
    }

    pub fn recorded_count(&self) -> usize {
        self.cells.iter().filter(|c| c.category != MergeCategory::None).count()
    }

    /// `log(1 + tick)` per cell, rescaled linearly onto 0..=255.
    ///
    /// A flat grid (max == min) maps to all zeros.
    pub fn log_normalized(&self) -> Vec<u8> {
        let logs: Vec<f64> = self
            .cells
            .par_iter()
            .map(|c| (c.last_merge_tick as f64).ln_1p())
            .collect();
        let min = logs.iter().copied().fold(f64::INFINITY, f64::min);
        let max = logs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let range = max - min;
        if !(range > 0.0) {
            return vec![0; logs.len()];
        }
        let scale = 255.0 / range;
        logs.par_iter().map(|&v| ((v - min) * scale) as u8).collect()
    }

    /// Red/blue carry the merge category, green the normalized recency.
    pub fn image(&self) -> TrailImage {
        let intensity = self.log_normalized();
        let pixels = self
            .cells
            .iter()
            .zip(intensity)
            .map(|(cell, green)| match cell.category {
                MergeCategory::None => [0, 0, 0],
                category => {
                    let (red, blue) = category.channels();
                    [red, green, blue]
                }
            })
            .collect();
        TrailImage { width: self.width, height: self.height, pixels }
    }

    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let trail = self.image();
        let img = RgbImage::from_fn(trail.width, trail.height, |x, y| Rgb(trail.pixel(x, y)));
        img.save(path)
            .with_context(|| format!("Failed to write trail image {}", path.display()))?;
        log::info!("Trail image saved to {} ({}x{})", path.display(), trail.width, trail.height);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coord(ix: u32, iy: u32) -> GridCoord {
        GridCoord { ix, iy }
    }

    #[test]
    fn empty_grid_normalizes_to_black() {
        let grid = TrailGrid::new(3, 2);
        assert!(grid.log_normalized().iter().all(|&v| v == 0));
        assert!(grid.image().pixels.iter().all(|&p| p == [0, 0, 0]));
    }

    #[test]
    fn most_recent_merge_is_brightest() {
        let mut grid = TrailGrid::new(3, 1);
        assert!(grid.record(coord(0, 0), 10, MergeCategory::SunMerge));
        assert!(grid.record(coord(2, 0), 100, MergeCategory::OtherMerge));
        let norm = grid.log_normalized();
        assert_eq!(norm[1], 0);
        assert_eq!(norm[2], 255);
        let expected = (11f64.ln() / 101f64.ln() * 255.0) as u8;
        assert_eq!(norm[0], expected);

        let image = grid.image();
        assert_eq!(image.pixel(0, 0), [255, expected, 0]);
        assert_eq!(image.pixel(1, 0), [0, 0, 0]);
        assert_eq!(image.pixel(2, 0), [0, 255, 255]);
    }

    #[test]
    fn record_overwrites_and_rejects_out_of_range() {
        let mut grid = TrailGrid::new(2, 2);
        grid.record(coord(1, 1), 3, MergeCategory::OtherMerge);
        grid.record(coord(1, 1), 7, MergeCategory::SunMerge);
        let cell = grid.cell(coord(1, 1)).unwrap();
        assert_eq!(cell.last_merge_tick, 7);
        assert_eq!(cell.category, MergeCategory::SunMerge);
        assert!(!grid.record(coord(2, 0), 1, MergeCategory::SunMerge));
        assert_eq!(grid.recorded_count(), 1);
    }

    #[test]
    fn save_png_writes_one_pixel_per_cell() {
        let mut grid = TrailGrid::new(4, 3);
        grid.record(coord(3, 2), 5, MergeCategory::SunMerge);
        let path = std::env::temp_dir().join(format!("trail_test_{}.png", std::process::id()));
        grid.save_png(&path).unwrap();
        let loaded = image::open(&path).unwrap().to_rgb8();
        assert_eq!(loaded.dimensions(), (4, 3));
        assert_eq!(loaded.get_pixel(3, 2).0, [255, 255, 0]);
        std::fs::remove_file(&path).ok();
    }
}
