// THEORY:
// The `SpatialAccumulator` turns a cloud of position samples into a picture of
// where entities spent their time. It is the density half of the analytics layer.
//
// Algorithm:
// 1.  **Stamping**: every in-bounds sample stamps a filled disc of constant weight
//     onto a plane-sized `f32` surface. Stamps add, so overlapping discs sum and
//     busy areas grow hotter than isolated visits.
// 2.  **Normalization**: the finished surface is stretched linearly so its minimum
//     becomes 0 and its maximum 255. A flat surface (including an empty one) has
//     no contrast to stretch and normalizes to all zero.
// 3.  **Color mapping**: normalized values index a `Palette` lookup table and
//     produce an RGB raster the compositor can blend onto the pitch plate.
//
// The accumulator can be used two ways. `accumulate` builds a fresh surface per
// call, which gives a windowed heatmap. A long-lived `SpatialAccumulator` keeps
// its surface between `ingest` calls for a cumulative heatmap.

use crate::core_modules::palette::Palette;
use crate::core_modules::position::{PlaneSize, PositionSample};
use image::RgbImage;
use serde::{Deserialize, Serialize};

/// The disc each sample stamps onto the surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscBrush {
    /// Radius in plane pixels. Zero stamps a single pixel.
    pub radius: u32,
    pub weight: f32,
}

impl Default for DiscBrush {
    fn default() -> Self {
        Self {
            radius: 10,
            weight: 1.0,
        }
    }
}

/// A plane-sized grid of accumulated weights, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct DensitySurface {
    width: u32,
    height: u32,
    values: Vec<f32>,
}

impl DensitySurface {
    pub fn zeros(plane: PlaneSize) -> Self {
        Self {
            width: plane.width,
            height: plane.height,
            values: vec![0.0; plane.area()],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.values[(y * self.width + x) as usize]
    }

    pub fn is_zero(&self) -> bool {
        self.values.iter().all(|v| *v == 0.0)
    }

    pub fn min_max(&self) -> (f32, f32) {
        if self.values.is_empty() {
            return (0.0, 0.0);
        }
        self.values
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(*v), hi.max(*v))
            })
    }

    /// Adds `brush.weight` to every pixel within `brush.radius` of `(cx, cy)`,
    /// clipped to the surface.
    fn stamp(&mut self, cx: u32, cy: u32, brush: DiscBrush) {
        let (w, h) = (self.width as i64, self.height as i64);
        // A radius of w + h already covers the whole surface from any center.
        let r = (brush.radius as i64).min(w + h);
        let (cx, cy) = (cx as i64, cy as i64);

        for y in (cy - r).max(0)..=(cy + r).min(h - 1) {
            let dy = (y - cy) as f64;
            let half_span = ((r as f64).powi(2) - dy * dy).sqrt().floor() as i64;
            let x0 = (cx - half_span).max(0);
            let x1 = (cx + half_span).min(w - 1);
            let row = (y * w) as usize;
            for x in x0..=x1 {
                self.values[row + x as usize] += brush.weight;
            }
        }
    }

    /// Min–max rescale into `[0, 255]`. A surface without contrast maps to all zero.
    pub fn normalized(&self) -> DensitySurface {
        let (min, max) = self.min_max();
        let range = max - min;
        let values = if range > 0.0 && range.is_finite() {
            let scale = 255.0 / range;
            self.values
                .iter()
                .map(|v| ((v - min) * scale).clamp(0.0, 255.0))
                .collect()
        } else {
            vec![0.0; self.values.len()]
        };
        DensitySurface {
            width: self.width,
            height: self.height,
            values,
        }
    }

    /// Colors a normalized surface. Values are truncated to whole intensities.
    pub fn render(&self, palette: Palette) -> RgbImage {
        let lut = palette.lut();
        let mut image = RgbImage::new(self.width, self.height);
        for (pixel, value) in image.pixels_mut().zip(&self.values) {
            *pixel = lut[value.clamp(0.0, 255.0) as usize];
        }
        image
    }
}

/// How many samples an ingest call stamped and how many fell off the plane.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub accepted: usize,
    pub dropped: usize,
}

/// Accumulates disc stamps onto a surface it owns.
#[derive(Debug, Clone)]
pub struct SpatialAccumulator {
    plane: PlaneSize,
    brush: DiscBrush,
    surface: DensitySurface,
}

impl SpatialAccumulator {
    pub fn new(plane: PlaneSize, brush: DiscBrush) -> Self {
        Self {
            plane,
            brush,
            surface: DensitySurface::zeros(plane),
        }
    }

    pub fn ingest<'a>(
        &mut self,
        samples: impl IntoIterator<Item = &'a PositionSample>,
    ) -> IngestStats {
        let mut stats = IngestStats::default();
        for sample in samples {
            match self.plane.pixel_of(sample.position) {
                Some((x, y)) => {
                    self.surface.stamp(x, y, self.brush);
                    stats.accepted += 1;
                }
                None => stats.dropped += 1,
            }
        }
        stats
    }

    pub fn surface(&self) -> &DensitySurface {
        &self.surface
    }

    pub fn normalized(&self) -> DensitySurface {
        self.surface.normalized()
    }

    pub fn render(&self, palette: Palette) -> RgbImage {
        self.surface.normalized().render(palette)
    }

    /// Zeroes the surface, keeping its allocation.
    pub fn reset(&mut self) {
        self.surface.values.fill(0.0);
    }

    pub fn into_surface(self) -> DensitySurface {
        self.surface
    }
}

/// Stamps `samples` onto a fresh surface and returns it un-normalized.
pub fn accumulate<'a>(
    plane: PlaneSize,
    brush: DiscBrush,
    samples: impl IntoIterator<Item = &'a PositionSample>,
) -> DensitySurface {
    let mut accumulator = SpatialAccumulator::new(plane, brush);
    accumulator.ingest(samples);
    accumulator.into_surface()
}
