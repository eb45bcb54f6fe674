//! Run configuration, loadable from TOML. Every section has defaults, so a file
//! only needs to name what it changes.

use crate::core_modules::compositor::{DEFAULT_OVERLAY_ALPHA, OverlayPlacement};
use crate::core_modules::palette::{Palette, ZoneRamp};
use crate::core_modules::position::PlaneSize;
use crate::core_modules::scheduler::ScheduleConfig;
use crate::core_modules::spatial_accumulator::DiscBrush;
use crate::core_modules::zone_coverage::GridSize;
use crate::error::{OverlayError, OverlayResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Whether the heatmap surface survives from one frame to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccumulationMode {
    /// Fresh surface per frame, built from the trailing window only.
    #[default]
    Windowed,
    /// One surface for the whole heatmap phase. Each frame adds the samples that
    /// entered since the previous frame, so frame `f` shows everything before `f`.
    Cumulative,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HeatmapConfig {
    pub brush: DiscBrush,
    pub palette: Palette,
    pub accumulation: AccumulationMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneConfig {
    pub grid: GridSize,
    pub ramp: ZoneRamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositeConfig {
    /// Overlay weight when blending onto the pitch plate. The plate keeps `1 - alpha`.
    pub alpha: f32,
    pub placement: OverlayPlacement,
}

impl Default for CompositeConfig {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_OVERLAY_ALPHA,
            placement: OverlayPlacement::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptionConfig {
    /// TTF/OTF file. Without one, the bundled DejaVu Sans is used.
    pub font: Option<PathBuf>,
    pub scale: f32,
    pub color: [u8; 3],
    /// Pixels between the caption's bottom edge and the overlay box.
    pub gap: u32,
    /// Empty text disables that caption.
    pub heatmap_text: String,
    pub zone_coverage_text: String,
}

impl Default for CaptionConfig {
    fn default() -> Self {
        Self {
            font: None,
            scale: 32.0,
            color: [255, 255, 255],
            gap: 10,
            heatmap_text: "Heatmap".to_string(),
            zone_coverage_text: "Zone Coverage".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    pub background: PathBuf,
    /// Where `heatmap_overlay.png` and `zone_coverage.png` go. `None` disables persistence.
    pub output_dir: Option<PathBuf>,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            background: PathBuf::from("assets/pitch.jpg"),
            output_dir: Some(PathBuf::from("output")),
        }
    }
}

/// Top-level configuration of an overlay run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    pub plane: PlaneSize,
    pub schedule: ScheduleConfig,
    pub heatmap: HeatmapConfig,
    pub zones: ZoneConfig,
    pub composite: CompositeConfig,
    pub caption: CaptionConfig,
    pub assets: AssetConfig,
}

impl OverlayConfig {
    pub fn load(path: &Path) -> OverlayResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> OverlayResult<Self> {
        let config: OverlayConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values the engine cannot work with. Placement against the actual
    /// frame size is checked per frame, since frames are not known here.
    pub fn validate(&self) -> OverlayResult<()> {
        if self.plane.width == 0 || self.plane.height == 0 {
            return Err(OverlayError::invalid_config("plane dimensions must be non-zero"));
        }
        let grid = self.zones.grid;
        if grid.cols == 0 || grid.rows == 0 {
            return Err(OverlayError::invalid_config("zone grid needs at least one row and column"));
        }
        if grid.cols > self.plane.width || grid.rows > self.plane.height {
            return Err(OverlayError::invalid_config(format!(
                "a {}x{} zone grid does not fit a {}x{} plane",
                grid.cols, grid.rows, self.plane.width, self.plane.height
            )));
        }
        if !(0.0..=1.0).contains(&self.composite.alpha) {
            return Err(OverlayError::invalid_config(format!(
                "composite alpha {} is outside [0, 1]",
                self.composite.alpha
            )));
        }
        let brush = self.heatmap.brush;
        if !brush.weight.is_finite() || brush.weight <= 0.0 {
            return Err(OverlayError::invalid_config("disc weight must be positive"));
        }
        let diagonal = (self.plane.width as f64).hypot(self.plane.height as f64).ceil();
        if brush.radius as f64 > diagonal {
            return Err(OverlayError::invalid_config(format!(
                "disc radius {} exceeds the plane diagonal of {diagonal} px",
                brush.radius
            )));
        }
        let placement = self.composite.placement;
        if placement.width == 0 || placement.height == 0 {
            return Err(OverlayError::invalid_config("display box must be non-empty"));
        }
        if !self.caption.scale.is_finite() || self.caption.scale <= 0.0 {
            return Err(OverlayError::invalid_config("caption scale must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::compositor::Anchor;

    #[test]
    fn defaults_are_valid() {
        let config = OverlayConfig::default();
        config.validate().expect("defaults validate");
        assert_eq!(config.plane, PlaneSize::new(1280, 720));
        assert_eq!(config.zones.grid, GridSize { cols: 5, rows: 5 });
        assert_eq!(config.composite.alpha, 0.4);
        assert_eq!(config.heatmap.brush.radius, 10);
        assert_eq!(config.heatmap.accumulation, AccumulationMode::Windowed);
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let config = OverlayConfig::from_toml(
            r#"
            [schedule]
            heatmap_frames = 10
            zone_coverage_frames = 10
            window_frames = 5

            [heatmap]
            palette = "autumn"
            accumulation = "cumulative"

            [composite.placement]
            anchor = "top-right"
            margin_y = 12

            [assets]
            background = "pitch.png"
            "#,
        )
        .expect("valid config");

        assert_eq!(config.schedule, ScheduleConfig::new(10, 10, 5));
        assert_eq!(config.heatmap.palette, Palette::Autumn);
        assert_eq!(config.heatmap.accumulation, AccumulationMode::Cumulative);
        assert_eq!(config.heatmap.brush, DiscBrush::default());
        assert_eq!(config.composite.placement.anchor, Anchor::TopRight);
        assert_eq!(config.composite.placement.width, 300);
        assert_eq!(config.composite.placement.margin_y, 12);
        assert_eq!(config.assets.background, PathBuf::from("pitch.png"));
        assert_eq!(config.caption.heatmap_text, "Heatmap");
    }

    #[test]
    fn invalid_values_are_rejected() {
        let bad_alpha = OverlayConfig::from_toml("[composite]\nalpha = 1.5\n").unwrap_err();
        assert!(matches!(bad_alpha, OverlayError::InvalidConfig(_)));

        let bad_grid = OverlayConfig::from_toml("[zones.grid]\ncols = 0\nrows = 5\n").unwrap_err();
        assert!(matches!(bad_grid, OverlayError::InvalidConfig(_)));

        let huge_radius =
            OverlayConfig::from_toml("[heatmap.brush]\nradius = 4294967295\n").unwrap_err();
        assert!(matches!(huge_radius, OverlayError::InvalidConfig(_)));

        // 1280x720 has a diagonal of about 1468.6 px.
        assert!(OverlayConfig::from_toml("[heatmap.brush]\nradius = 1469\n").is_ok());
        assert!(OverlayConfig::from_toml("[heatmap.brush]\nradius = 1470\n").is_err());

        let not_toml = OverlayConfig::from_toml("[plane\nwidth = ").unwrap_err();
        assert!(matches!(not_toml, OverlayError::Toml(_)));
    }
}
