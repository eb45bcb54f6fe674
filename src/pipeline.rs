// THEORY:
// The `pipeline` module is the top-level API of the overlay engine. It wires the
// scheduler, the two analytics and the compositor into one object that the
// surrounding video pipeline drives frame by frame, in playback order.
//
// Per frame:
// 1.  **Scheduling**: the scheduler picks Heatmap, ZoneCoverage or None and slices
//     the trailing window out of every entity's history.
// 2.  **Analysis**: the active analytic turns the window into a plane-sized
//     rendering (density discs or zone cells).
// 3.  **Blending**: the rendering is blended onto the pitch plate and the result is
//     persisted as an artifact when an output directory is configured.
// 4.  **Placement**: the blend is shrunk to the display box with area averaging
//     and written into the frame, with its caption above it.
//
// Frames the scheduler leaves idle are returned untouched.

use crate::config::{AccumulationMode, OverlayConfig};
use crate::core_modules::artifact_store::{ArtifactKind, ArtifactStore};
use crate::core_modules::compositor::{self, CaptionRenderer};
use crate::core_modules::pitch_plate::PitchPlate;
use crate::core_modules::position::{EntityPositionHistory, PositionSample};
use crate::core_modules::scheduler::{OverlayScheduler, SampleWindow};
use crate::core_modules::spatial_accumulator::{DensitySurface, SpatialAccumulator};
use crate::core_modules::zone_coverage::ZoneCoverageBinner;
use crate::error::OverlayResult;
use image::{Rgb, RgbImage};
use tracing::{debug, info};

// Re-export key data structures for the public API.
pub use crate::core_modules::scheduler::{FramePlan, ScheduleConfig, ScheduleDecision};

/// What happened to one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameOutcome {
    pub frame: usize,
    pub decision: ScheduleDecision,
    /// Samples in the window that fed the analytic (0 for idle frames).
    pub window_samples: usize,
}

/// Per-phase frame tally of a whole run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub frames: usize,
    pub heatmap_frames: usize,
    pub zone_coverage_frames: usize,
    pub passthrough_frames: usize,
}

impl RunSummary {
    fn record(&mut self, decision: ScheduleDecision) {
        self.frames += 1;
        match decision {
            ScheduleDecision::Heatmap => self.heatmap_frames += 1,
            ScheduleDecision::ZoneCoverage => self.zone_coverage_frames += 1,
            ScheduleDecision::None => self.passthrough_frames += 1,
        }
    }
}

/// Heatmap surface that lives across frames in cumulative mode.
struct CumulativeHeatmap {
    accumulator: SpatialAccumulator,
    /// History index up to which every entity has been ingested.
    ingested_until: usize,
}

/// The main, top-level struct of the overlay engine.
pub struct OverlayPipeline {
    config: OverlayConfig,
    scheduler: OverlayScheduler,
    plate: PitchPlate,
    binner: ZoneCoverageBinner,
    cumulative: Option<CumulativeHeatmap>,
    caption: CaptionRenderer,
    store: Option<ArtifactStore>,
}

impl OverlayPipeline {
    /// Builds the engine, loading the pitch plate named in the configuration.
    pub fn new(config: OverlayConfig) -> OverlayResult<Self> {
        config.validate()?;
        let plate = PitchPlate::load(&config.assets.background, config.plane)?;
        Self::with_plate(config, plate)
    }

    /// Builds the engine around an already loaded plate.
    pub fn with_plate(config: OverlayConfig, plate: PitchPlate) -> OverlayResult<Self> {
        config.validate()?;

        let caption_color = Rgb(config.caption.color);
        let caption = match &config.caption.font {
            Some(path) => CaptionRenderer::from_font_file(
                path,
                config.caption.scale,
                caption_color,
                config.caption.gap,
            )?,
            None => {
                CaptionRenderer::embedded(config.caption.scale, caption_color, config.caption.gap)?
            }
        };

        let store = config
            .assets
            .output_dir
            .as_ref()
            .map(ArtifactStore::create)
            .transpose()?;

        let cumulative = match config.heatmap.accumulation {
            AccumulationMode::Windowed => None,
            AccumulationMode::Cumulative => Some(CumulativeHeatmap {
                accumulator: SpatialAccumulator::new(config.plane, config.heatmap.brush),
                ingested_until: 0,
            }),
        };

        Ok(Self {
            scheduler: OverlayScheduler::new(config.schedule),
            plate: PitchPlate::from_image(plate.into_image(), config.plane),
            binner: ZoneCoverageBinner::new(config.zones.grid, config.plane),
            cumulative,
            caption,
            store,
            config,
        })
    }

    pub fn config(&self) -> &OverlayConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &OverlayScheduler {
        &self.scheduler
    }

    pub fn artifact_store(&self) -> Option<&ArtifactStore> {
        self.store.as_ref()
    }

    /// Which analytic applies to `frame`, without rendering anything.
    pub fn decision_for(&self, frame: usize) -> ScheduleDecision {
        self.scheduler.decide(frame)
    }

    /// Applies the scheduled analytic for `frame` to `buffer` in place.
    pub fn process_frame(
        &mut self,
        frame: usize,
        history: &EntityPositionHistory,
        buffer: &mut RgbImage,
    ) -> OverlayResult<FrameOutcome> {
        let plan = self.scheduler.plan(frame, history);
        let outcome = FrameOutcome {
            frame,
            decision: plan.decision,
            window_samples: plan.window.len(),
        };
        debug!(
            frame,
            decision = ?plan.decision,
            window = ?plan.window.range(),
            samples = outcome.window_samples,
            "frame scheduled"
        );

        let placement = self.config.composite.placement;
        // Geometry is checked before anything is rendered.
        let (overlay, placed, text) = match plan.decision {
            ScheduleDecision::None => return Ok(outcome),
            ScheduleDecision::Heatmap => {
                let placed = placement.resolve(buffer.width(), buffer.height())?;
                let surface = self.heatmap_surface(frame, &plan.window, history);
                let blended = self.heatmap_overlay(&surface)?;
                let overlay = self.fit_display_box(&blended);
                (overlay, placed, self.config.caption.heatmap_text.as_str())
            }
            ScheduleDecision::ZoneCoverage => {
                let placed = placement.resolve(buffer.width(), buffer.height())?;
                let overlay = self.zone_coverage(plan.window.samples())?;
                (overlay, placed, self.config.caption.zone_coverage_text.as_str())
            }
        };
        compositor::place(buffer, &overlay, placed, Some((&self.caption, text)));
        Ok(outcome)
    }

    /// Processes a whole, ordered frame sequence and hands the frames back.
    pub fn run(
        &mut self,
        history: &EntityPositionHistory,
        frames: Vec<RgbImage>,
    ) -> OverlayResult<(Vec<RgbImage>, RunSummary)> {
        let mut summary = RunSummary::default();
        let mut output = Vec::with_capacity(frames.len());
        for (index, mut frame) in frames.into_iter().enumerate() {
            let outcome = self.process_frame(index, history, &mut frame)?;
            summary.record(outcome.decision);
            output.push(frame);
        }
        info!(
            frames = summary.frames,
            heatmap = summary.heatmap_frames,
            zone_coverage = summary.zone_coverage_frames,
            passthrough = summary.passthrough_frames,
            "overlay run complete"
        );
        Ok((output, summary))
    }

    /// Renders both analytics over every sample of `history` and persists them.
    /// Returns the plane-sized heatmap overlay and the display-box zone coverage.
    pub fn snapshot(&self, history: &EntityPositionHistory) -> OverlayResult<(RgbImage, RgbImage)> {
        let mut accumulator = SpatialAccumulator::new(self.config.plane, self.config.heatmap.brush);
        let stats = accumulator.ingest(history.samples());
        info!(
            entities = history.entity_count(),
            accepted = stats.accepted,
            dropped = stats.dropped,
            "rendering whole-history snapshot"
        );
        let heatmap = self.heatmap_overlay(&accumulator.normalized())?;
        let zones = self.zone_coverage(history.samples())?;
        Ok((heatmap, zones))
    }

    /// Normalized density for a heatmap frame, honoring the accumulation mode.
    fn heatmap_surface(
        &mut self,
        frame: usize,
        window: &SampleWindow<'_>,
        history: &EntityPositionHistory,
    ) -> DensitySurface {
        let Some(cumulative) = self.cumulative.as_mut() else {
            let mut accumulator =
                SpatialAccumulator::new(self.config.plane, self.config.heatmap.brush);
            let stats = accumulator.ingest(window.samples());
            if stats.dropped > 0 {
                debug!(frame, dropped = stats.dropped, "off-plane samples ignored");
            }
            return accumulator.normalized();
        };

        if frame < cumulative.ingested_until {
            // Frames came back out of order; rebuild from the start.
            cumulative.accumulator.reset();
            cumulative.ingested_until = 0;
        }
        let from = cumulative.ingested_until;
        let fresh = history.entities().flat_map(|(_, samples)| {
            let start = from.min(samples.len());
            let end = frame.min(samples.len());
            samples[start..end].iter()
        });
        let stats = cumulative.accumulator.ingest(fresh);
        if stats.dropped > 0 {
            debug!(frame, dropped = stats.dropped, "off-plane samples ignored");
        }
        cumulative.ingested_until = frame;
        cumulative.accumulator.normalized()
    }

    /// Colors a normalized surface, blends it onto the plate and persists it.
    fn heatmap_overlay(&self, normalized: &DensitySurface) -> OverlayResult<RgbImage> {
        let colored = normalized.render(self.config.heatmap.palette);
        let blended = compositor::composite(self.plate.image(), &colored, self.config.composite.alpha)?;
        if let Some(store) = &self.store {
            store.write(ArtifactKind::HeatmapOverlay, &blended)?;
        }
        Ok(blended)
    }

    /// Bins, renders, blends and shrinks zone coverage to the display box.
    fn zone_coverage<'a>(
        &self,
        samples: impl IntoIterator<Item = &'a PositionSample>,
    ) -> OverlayResult<RgbImage> {
        let grid = self.binner.bin(samples);
        if grid.dropped() > 0 {
            debug!(dropped = grid.dropped(), "off-plane samples ignored");
        }
        let cells = self.binner.render(&grid, self.config.zones.ramp);
        let blended = compositor::composite(self.plate.image(), &cells, self.config.composite.alpha)?;
        let small = self.fit_display_box(&blended);
        if let Some(store) = &self.store {
            store.write(ArtifactKind::ZoneCoverage, &small)?;
        }
        Ok(small)
    }

    fn fit_display_box(&self, image: &RgbImage) -> RgbImage {
        let placement = self.config.composite.placement;
        compositor::fit_to_box(image, placement.width, placement.height)
    }
}
