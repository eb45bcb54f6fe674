//! Color scales used to turn normalized intensities into pixels.

use image::Rgb;
use serde::{Deserialize, Serialize};

/// Perceptual color scale for the density heatmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Palette {
    /// Black through red and yellow to white.
    #[default]
    Hot,
    /// Red to yellow. Every value is warm, so empty areas still tint the plate.
    Autumn,
    /// Blue through cyan, yellow to red.
    Jet,
}

impl Palette {
    /// Maps a normalized intensity in `0..=255` to a color.
    pub fn color(self, intensity: u8) -> Rgb<u8> {
        let v = intensity as f32 / 255.0;
        match self {
            Palette::Hot => Rgb([
                unit_to_byte(3.0 * v),
                unit_to_byte(3.0 * v - 1.0),
                unit_to_byte(3.0 * v - 2.0),
            ]),
            Palette::Autumn => Rgb([255, intensity, 0]),
            Palette::Jet => Rgb([
                unit_to_byte(1.5 - (4.0 * v - 3.0).abs()),
                unit_to_byte(1.5 - (4.0 * v - 2.0).abs()),
                unit_to_byte(1.5 - (4.0 * v - 1.0).abs()),
            ]),
        }
    }

    /// Precomputes all 256 colors, so rendering a surface is a table lookup per pixel.
    pub fn lut(self) -> [Rgb<u8>; 256] {
        let mut table = [Rgb([0, 0, 0]); 256];
        for (i, entry) in table.iter_mut().enumerate() {
            *entry = self.color(i as u8);
        }
        table
    }
}

fn unit_to_byte(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Two-color linear ramp for zone cells. Each channel moves independently from
/// `low` to `high`, so the default red→green ramp lowers red while green rises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneRamp {
    pub low: [u8; 3],
    pub high: [u8; 3],
}

impl Default for ZoneRamp {
    fn default() -> Self {
        Self {
            low: [255, 0, 0],
            high: [0, 255, 0],
        }
    }
}

impl ZoneRamp {
    pub fn color(&self, intensity: u8) -> Rgb<u8> {
        let t = intensity as u32;
        let mut out = [0u8; 3];
        for (c, slot) in out.iter_mut().enumerate() {
            let low = self.low[c] as u32;
            let high = self.high[c] as u32;
            // Integer lerp; exact at both ends.
            *slot = ((low * (255 - t) + high * t + 127) / 255) as u8;
        }
        Rgb(out)
    }
}
