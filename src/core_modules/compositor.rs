// THEORY:
// The compositor is where analytics become pixels on the broadcast frame. It has
// two jobs, kept separate:
// 1.  `composite` blends a rendered visualization over a background plate with a
//     single alpha weight. Both inputs share one size, and the output is always a
//     valid byte image.
// 2.  `place` copies a finished overlay into a rectangle of the target frame and
//     draws a caption above it. The rectangle is resolved from an anchor corner
//     plus margins. Validating that it fits the frame is the caller's duty
//     (`OverlayPlacement::resolve`); `place` itself writes nothing outside the
//     rectangle and the caption strip.

use crate::error::{OverlayError, OverlayResult};
use ab_glyph::{Font, FontArc, PxScale, ScaleFont, point};
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_text_mut, text_size};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default weight of the overlay in `composite`; the background keeps `1 - alpha`.
pub const DEFAULT_OVERLAY_ALPHA: f32 = 0.4;

// Caption font used when no font file is configured.
const EMBEDDED_FONT: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans.ttf");

/// Alpha-blends `foreground` over `background`: `bg * (1 - alpha) + fg * alpha`.
pub fn composite(
    background: &RgbImage,
    foreground: &RgbImage,
    alpha: f32,
) -> OverlayResult<RgbImage> {
    if background.dimensions() != foreground.dimensions() {
        return Err(OverlayError::DimensionMismatch {
            background: background.dimensions(),
            foreground: foreground.dimensions(),
        });
    }
    let alpha = if alpha.is_nan() { 0.0 } else { alpha.clamp(0.0, 1.0) };
    let keep = 1.0 - alpha;

    let mut blended = background.clone();
    for (out, fg) in blended.pixels_mut().zip(foreground.pixels()) {
        for c in 0..3 {
            let value = out[c] as f32 * keep + fg[c] as f32 * alpha;
            out[c] = value.round().clamp(0.0, 255.0) as u8;
        }
    }
    Ok(blended)
}

/// Resizes `image` to exactly `width` x `height`. Shrinking uses area averaging;
/// enlarging falls back to a triangle filter.
pub fn fit_to_box(image: &RgbImage, width: u32, height: u32) -> RgbImage {
    if image.dimensions() == (width, height) {
        return image.clone();
    }
    if width <= image.width() && height <= image.height() {
        imageops::thumbnail(image, width, height)
    } else {
        imageops::resize(image, width, height, FilterType::Triangle)
    }
}

/// Frame corner the overlay box is anchored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Anchor {
    TopLeft,
    TopRight,
    #[default]
    BottomLeft,
    BottomRight,
}

/// Size and position of the overlay box relative to a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayPlacement {
    pub width: u32,
    pub height: u32,
    pub anchor: Anchor,
    /// Horizontal inset from the anchored edge.
    pub margin_x: u32,
    /// Vertical inset from the anchored edge.
    pub margin_y: u32,
}

impl Default for OverlayPlacement {
    fn default() -> Self {
        Self {
            width: 300,
            height: 200,
            anchor: Anchor::BottomLeft,
            margin_x: 20,
            margin_y: 0,
        }
    }
}

/// A resolved box in frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacedBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl OverlayPlacement {
    /// Resolves the box for a frame, failing when it does not fit entirely inside.
    pub fn resolve(&self, frame_width: u32, frame_height: u32) -> OverlayResult<PlacedBox> {
        let (fw, fh) = (frame_width as i64, frame_height as i64);
        let (w, h) = (self.width as i64, self.height as i64);
        let (mx, my) = (self.margin_x as i64, self.margin_y as i64);
        let x = match self.anchor {
            Anchor::TopLeft | Anchor::BottomLeft => mx,
            Anchor::TopRight | Anchor::BottomRight => fw - w - mx,
        };
        let y = match self.anchor {
            Anchor::TopLeft | Anchor::TopRight => my,
            Anchor::BottomLeft | Anchor::BottomRight => fh - h - my,
        };

        if x < 0 || y < 0 || x + w > fw || y + h > fh {
            return Err(OverlayError::PlacementGeometry {
                x,
                y,
                box_width: self.width,
                box_height: self.height,
                frame_width,
                frame_height,
            });
        }
        Ok(PlacedBox {
            x: x as u32,
            y: y as u32,
            width: self.width,
            height: self.height,
        })
    }
}

/// Draws caption text above an overlay box.
pub struct CaptionRenderer {
    font: FontArc,
    scale: PxScale,
    color: Rgb<u8>,
    gap: u32,
}

impl std::fmt::Debug for CaptionRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptionRenderer")
            .field("scale", &self.scale)
            .field("color", &self.color)
            .field("gap", &self.gap)
            .finish_non_exhaustive()
    }
}

impl CaptionRenderer {
    pub fn new(font: FontArc, scale: f32, color: Rgb<u8>, gap: u32) -> Self {
        Self {
            font,
            scale: PxScale::from(scale),
            color,
            gap,
        }
    }

    /// Uses the bundled DejaVu Sans face.
    pub fn embedded(scale: f32, color: Rgb<u8>, gap: u32) -> OverlayResult<Self> {
        let font = FontArc::try_from_slice(EMBEDDED_FONT)?;
        Ok(Self::new(font, scale, color, gap))
    }

    /// Loads a TTF/OTF font file.
    pub fn from_font_file(
        path: &Path,
        scale: f32,
        color: Rgb<u8>,
        gap: u32,
    ) -> OverlayResult<Self> {
        let bytes = std::fs::read(path).map_err(|e| OverlayError::FontLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let font = FontArc::try_from_vec(bytes).map_err(|e| OverlayError::FontLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(Self::new(font, scale, color, gap))
    }

    /// Advance width and inked height of `text`.
    pub fn text_size(&self, text: &str) -> (u32, u32) {
        let (width, _) = text_size(self.scale, &self.font, text);
        let height = self
            .ink_rows(text)
            .map_or(0, |(top, bottom)| (bottom - top) as u32);
        (width, height)
    }

    /// First and one-past-last pixel row the glyphs cover, relative to the draw
    /// origin. `None` when nothing would be inked.
    fn ink_rows(&self, text: &str) -> Option<(i32, i32)> {
        let font = self.font.as_scaled(self.scale);
        text.chars()
            .filter_map(|c| {
                let mut glyph = font.scaled_glyph(c);
                glyph.position = point(0.0, font.ascent());
                font.outline_glyph(glyph)
            })
            .map(|outlined| {
                let bounds = outlined.px_bounds();
                let top = bounds.min.y.round() as i32;
                (top, top + bounds.height() as i32)
            })
            .reduce(|(top, bottom), (t, b)| (top.min(t), bottom.max(b)))
    }

    /// Draws `text` so its lowest inked row sits `gap` pixels above the box. Text
    /// that would rise past the top of the frame is clipped by the canvas. Empty
    /// text draws nothing.
    pub fn draw_above(&self, frame: &mut RgbImage, placed: PlacedBox, text: &str) {
        let Some((_, ink_bottom)) = self.ink_rows(text) else {
            return;
        };
        let origin_y = placed.y as i32 - self.gap as i32 - ink_bottom;
        draw_text_mut(frame, self.color, placed.x as i32, origin_y, self.scale, &self.font, text);
    }
}

/// Copies `overlay` into `placed` on `frame`, then draws the caption if a renderer
/// is given. `overlay` must already have the box's dimensions and the box must
/// have been resolved against this frame.
pub fn place(
    frame: &mut RgbImage,
    overlay: &RgbImage,
    placed: PlacedBox,
    caption: Option<(&CaptionRenderer, &str)>,
) {
    debug_assert_eq!(overlay.dimensions(), (placed.width, placed.height));
    imageops::replace(frame, overlay, placed.x as i64, placed.y as i64);
    if let Some((renderer, text)) = caption {
        renderer.draw_above(frame, placed, text);
    }
}
