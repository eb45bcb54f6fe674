// THEORY:
// The `ZoneCoverageBinner` is the coarse counterpart of the spatial accumulator.
// Instead of a pixel-accurate density it divides the plane into a small grid of
// zones (5x5 by default) and asks a simpler question: how often was anyone in
// each zone?
//
// Key principles:
// 1.  **Spatial pooling**: each sample lands in exactly one zone. The zone index is
//     `floor(coord / zone_extent)`, clamped to the last row/column so that a
//     coordinate sitting on the far boundary cannot index past the grid.
// 2.  **No memory**: the binner counts whatever it is given. Windowing is the
//     scheduler's job.
// 3.  **Tiling**: rendered cells are integer divisions of the plane. When the
//     plane does not divide evenly, the last row and column absorb the remainder
//     so the whole plane is covered.

use crate::core_modules::palette::ZoneRamp;
use crate::core_modules::position::{PlaneSize, Position, PositionSample};
use image::RgbImage;
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;
use serde::{Deserialize, Serialize};

/// Number of zones along each axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSize {
    pub cols: u32,
    pub rows: u32,
}

impl Default for GridSize {
    fn default() -> Self {
        Self { cols: 5, rows: 5 }
    }
}

impl GridSize {
    pub fn cell_count(&self) -> usize {
        self.cols as usize * self.rows as usize
    }
}

/// Sample counts per zone, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageGrid {
    size: GridSize,
    counts: Vec<u32>,
    dropped: usize,
}

impl CoverageGrid {
    pub fn empty(size: GridSize) -> Self {
        Self {
            size,
            counts: vec![0; size.cell_count()],
            dropped: 0,
        }
    }

    pub fn size(&self) -> GridSize {
        self.size
    }

    pub fn count(&self, zx: u32, zy: u32) -> u32 {
        self.counts[(zy * self.size.cols + zx) as usize]
    }

    pub fn counts(&self) -> &[u32] {
        &self.counts
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().map(|c| *c as u64).sum()
    }

    /// Samples that fell outside the plane and were not counted.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Min–max rescale into `0..=255`, rounded. A grid without contrast maps to all zero.
    pub fn normalized(&self) -> Vec<u8> {
        let min = self.counts.iter().copied().min().unwrap_or(0);
        let max = self.counts.iter().copied().max().unwrap_or(0);
        if max == min {
            return vec![0; self.counts.len()];
        }
        let range = (max - min) as f64;
        self.counts
            .iter()
            .map(|c| ((*c - min) as f64 * 255.0 / range).round().clamp(0.0, 255.0) as u8)
            .collect()
    }
}

/// Counts samples per zone over a fixed plane.
#[derive(Debug, Clone, Copy)]
pub struct ZoneCoverageBinner {
    grid: GridSize,
    plane: PlaneSize,
}

impl ZoneCoverageBinner {
    pub fn new(grid: GridSize, plane: PlaneSize) -> Self {
        Self { grid, plane }
    }

    pub fn grid(&self) -> GridSize {
        self.grid
    }

    /// Zone of an arbitrary coordinate, always inside `[0, cols-1] x [0, rows-1]`.
    pub fn zone_index(&self, position: Position) -> (u32, u32) {
        let zone_w = self.plane.width as f64 / self.grid.cols as f64;
        let zone_h = self.plane.height as f64 / self.grid.rows as f64;
        let zx = clamp_index((position.x as f64 / zone_w).floor(), self.grid.cols);
        let zy = clamp_index((position.y as f64 / zone_h).floor(), self.grid.rows);
        (zx, zy)
    }

    pub fn bin<'a>(&self, samples: impl IntoIterator<Item = &'a PositionSample>) -> CoverageGrid {
        let mut grid = CoverageGrid::empty(self.grid);
        for sample in samples {
            if !self.plane.contains(sample.position) {
                grid.dropped += 1;
                continue;
            }
            let (zx, zy) = self.zone_index(sample.position);
            grid.counts[(zy * self.grid.cols + zx) as usize] += 1;
        }
        grid
    }

    /// Pixel rectangle `(x, y, width, height)` of a zone on the plane.
    pub fn cell_bounds(&self, zx: u32, zy: u32) -> (u32, u32, u32, u32) {
        let cell_w = self.plane.width / self.grid.cols;
        let cell_h = self.plane.height / self.grid.rows;
        let x = zx * cell_w;
        let y = zy * cell_h;
        let w = if zx + 1 == self.grid.cols { self.plane.width - x } else { cell_w };
        let h = if zy + 1 == self.grid.rows { self.plane.height - y } else { cell_h };
        (x, y, w, h)
    }

    /// Full-plane rendering, one solid rectangle per zone.
    pub fn render(&self, coverage: &CoverageGrid, ramp: ZoneRamp) -> RgbImage {
        let intensities = coverage.normalized();
        let mut image = RgbImage::new(self.plane.width, self.plane.height);
        for zy in 0..self.grid.rows {
            for zx in 0..self.grid.cols {
                let (x, y, w, h) = self.cell_bounds(zx, zy);
                if w == 0 || h == 0 {
                    continue;
                }
                let intensity = intensities[(zy * self.grid.cols + zx) as usize];
                draw_filled_rect_mut(
                    &mut image,
                    Rect::at(x as i32, y as i32).of_size(w, h),
                    ramp.color(intensity),
                );
            }
        }
        image
    }
}

fn clamp_index(raw: f64, extent: u32) -> u32 {
    // NaN compares false everywhere and ends up in zone 0.
    if raw >= (extent - 1) as f64 {
        extent - 1
    } else if raw > 0.0 {
        raw as u32
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples(points: &[(f32, f32)]) -> Vec<PositionSample> {
        points
            .iter()
            .enumerate()
            .map(|(frame, (x, y))| PositionSample {
                entity: 9,
                frame,
                position: Position::new(*x, *y),
            })
            .collect()
    }

    fn binner() -> ZoneCoverageBinner {
        ZoneCoverageBinner::new(GridSize::default(), PlaneSize::default())
    }

    #[test]
    fn zone_indices_stay_in_grid() {
        let binner = binner();
        let probes = [
            (0.0, 0.0),
            (256.0, 144.0),
            (255.999, 143.999),
            (1279.0, 719.0),
            (1280.0, 720.0),
            (-50.0, -50.0),
            (1.0e9, 1.0e9),
            (f32::NAN, f32::INFINITY),
        ];
        for (x, y) in probes {
            let (zx, zy) = binner.zone_index(Position::new(x, y));
            assert!(zx < 5 && zy < 5, "({x}, {y}) -> ({zx}, {zy})");
        }
        assert_eq!(binner.zone_index(Position::new(256.0, 144.0)), (1, 1));
        assert_eq!(binner.zone_index(Position::new(255.999, 143.999)), (0, 0));
        assert_eq!(binner.zone_index(Position::new(1279.0, 719.0)), (4, 4));
    }

    #[test]
    fn binning_counts_per_zone_and_drops_off_plane() {
        let grid = binner().bin(&samples(&[
            (100.0, 100.0),
            (100.0, 100.0),
            (1279.0, 719.0),
            (1280.0, 720.0),
        ]));
        assert_eq!(grid.count(0, 0), 2);
        assert_eq!(grid.count(4, 4), 1);
        assert_eq!(grid.total(), 3);
        assert_eq!(grid.dropped(), 1);
    }

    #[test]
    fn normalization_matches_min_max_rule() {
        let grid = binner().bin(&samples(&[(10.0, 10.0), (10.0, 10.0), (300.0, 10.0)]));
        let normalized = grid.normalized();
        assert_eq!(normalized[0], 255);
        assert_eq!(normalized[1], 128);
        assert_eq!(normalized[2], 0);
    }

    #[test]
    fn empty_grid_renders_blank_low_color() {
        let binner = binner();
        let grid = binner.bin(std::iter::empty());
        assert_eq!(grid.total(), 0);
        assert!(grid.normalized().iter().all(|v| *v == 0));

        let image = binner.render(&grid, ZoneRamp::default());
        assert_eq!(image.dimensions(), (1280, 720));
        assert_eq!(*image.get_pixel(640, 360), ZoneRamp::default().color(0));
    }

    #[test]
    fn cells_tile_the_whole_plane() {
        let binner = ZoneCoverageBinner::new(GridSize { cols: 3, rows: 7 }, PlaneSize::new(100, 50));
        assert_eq!(binner.cell_bounds(0, 0), (0, 0, 33, 7));
        assert_eq!(binner.cell_bounds(2, 6), (66, 42, 34, 8));

        let grid = binner.bin(&samples(&[(99.0, 49.0)]));
        let ramp = ZoneRamp::default();
        let image = binner.render(&grid, ramp);
        assert_eq!(*image.get_pixel(99, 49), ramp.color(255));
        assert_eq!(*image.get_pixel(0, 0), ramp.color(0));
    }
}
