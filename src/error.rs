//! Error types for the overlay engine.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for overlay operations.
pub type OverlayResult<T> = Result<T, OverlayError>;

/// Errors that can surface from the analytics engine to the orchestrating pipeline.
///
/// Out-of-bounds samples and empty windows are not errors: they are dropped or
/// produce blank renderings.
#[derive(Debug, Error)]
pub enum OverlayError {
    #[error("background plate could not be loaded from {path}: {source}")]
    MissingBackground {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error(
        "overlay box {box_width}x{box_height} at ({x}, {y}) does not fit a {frame_width}x{frame_height} frame"
    )]
    PlacementGeometry {
        x: i64,
        y: i64,
        box_width: u32,
        box_height: u32,
        frame_width: u32,
        frame_height: u32,
    },

    #[error("cannot blend a {foreground:?} image onto a {background:?} background")]
    DimensionMismatch {
        background: (u32, u32),
        foreground: (u32, u32),
    },

    #[error("caption font {path} is unusable: {reason}")]
    FontLoad { path: PathBuf, reason: String },

    #[error("bundled caption font is unusable: {0}")]
    EmbeddedFont(#[from] ab_glyph::InvalidFont),

    #[error("failed to write artifact {path}: {source}")]
    ArtifactWrite {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl OverlayError {
    /// Create an invalid-configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }
}
