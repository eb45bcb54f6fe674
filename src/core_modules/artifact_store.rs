// THEORY:
// Rendered analytics are also written to disk so they can be inspected outside
// the video. The store owns one output directory, handed over at construction
// rather than read from process state, so parallel runs (and tests) never share
// files by accident. Every write replaces the previous file of the same kind.

use crate::error::{OverlayError, OverlayResult};
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbImage};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::debug;

/// The two images a run persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    HeatmapOverlay,
    ZoneCoverage,
}

impl ArtifactKind {
    pub fn file_name(self) -> &'static str {
        match self {
            ArtifactKind::HeatmapOverlay => "heatmap_overlay.png",
            ArtifactKind::ZoneCoverage => "zone_coverage.png",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    /// Creates the directory if needed.
    pub fn create(dir: impl Into<PathBuf>) -> OverlayResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_of(&self, kind: ArtifactKind) -> PathBuf {
        self.dir.join(kind.file_name())
    }

    /// Writes `image` as a lossless PNG, overwriting any previous artifact of this kind.
    pub fn write(&self, kind: ArtifactKind, image: &RgbImage) -> OverlayResult<PathBuf> {
        let path = self.path_of(kind);
        save_png(&path, image).map_err(|source| OverlayError::ArtifactWrite {
            path: path.clone(),
            source,
        })?;
        debug!(path = %path.display(), "artifact written");
        Ok(path)
    }
}

/// Encodes an RGB image to `path` as PNG.
pub fn save_png(path: &Path, image: &RgbImage) -> Result<(), image::ImageError> {
    let output = BufWriter::new(File::create(path)?);
    let encoder = PngEncoder::new(output);
    encoder.write_image(image.as_raw(), image.width(), image.height(), ExtendedColorType::Rgb8)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn writes_and_overwrites_named_artifacts() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = ArtifactStore::create(dir.path().join("nested/out")).expect("store");

        let first = RgbImage::from_pixel(6, 4, Rgb([1, 2, 3]));
        let path = store.write(ArtifactKind::ZoneCoverage, &first).expect("first write");
        assert!(path.ends_with("zone_coverage.png"));

        let second = RgbImage::from_pixel(3, 2, Rgb([200, 100, 50]));
        store.write(ArtifactKind::ZoneCoverage, &second).expect("second write");

        let read_back = image::open(&path).expect("decodable").to_rgb8();
        assert_eq!(read_back, second);
    }

    #[test]
    fn artifact_names_are_stable() {
        assert_eq!(ArtifactKind::HeatmapOverlay.file_name(), "heatmap_overlay.png");
        assert_eq!(ArtifactKind::ZoneCoverage.file_name(), "zone_coverage.png");
    }
}
