//! The background plate every analytic is blended onto.

use crate::core_modules::position::PlaneSize;
use crate::error::{OverlayError, OverlayResult};
use image::RgbImage;
use image::imageops::{self, FilterType};
use std::path::Path;
use tracing::debug;

/// A pitch image resized to the reference plane. Loaded once per run.
#[derive(Debug, Clone)]
pub struct PitchPlate {
    image: RgbImage,
}

impl PitchPlate {
    /// Loads and resizes the plate. Any failure is a missing background.
    pub fn load(path: &Path, plane: PlaneSize) -> OverlayResult<Self> {
        let decoded = image::open(path).map_err(|source| OverlayError::MissingBackground {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(
            path = %path.display(),
            width = decoded.width(),
            height = decoded.height(),
            "loaded pitch plate"
        );
        Ok(Self::from_image(decoded.to_rgb8(), plane))
    }

    pub fn from_image(image: RgbImage, plane: PlaneSize) -> Self {
        let image = if image.dimensions() == (plane.width, plane.height) {
            image
        } else {
            imageops::resize(&image, plane.width, plane.height, FilterType::Triangle)
        };
        Self { image }
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }
}
