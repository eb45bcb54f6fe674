// THEORY:
// The `OverlayScheduler` decides, for every output frame, which analytic the
// viewer sees and which positions feed it. It holds no state beyond three
// constants, so the same frame index always produces the same plan:
//
//     f < H           -> Heatmap
//     H <= f < H + Z  -> ZoneCoverage
//     f >= H + Z      -> None (frame passes through untouched)
//
// The window for an active frame is the slice `[max(0, f - W), f)` of every
// entity's history. The current frame is excluded, and nothing older than `W`
// samples leaks into the analytic.

use crate::core_modules::position::{EntityId, EntityPositionHistory, PositionSample};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Phase lengths and window size, all in frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub heatmap_frames: usize,
    pub zone_coverage_frames: usize,
    pub window_frames: usize,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self::from_seconds(30.0, 12.0, 12.0, 30)
    }
}

impl ScheduleConfig {
    pub fn new(heatmap_frames: usize, zone_coverage_frames: usize, window_frames: usize) -> Self {
        Self {
            heatmap_frames,
            zone_coverage_frames,
            window_frames,
        }
    }

    /// Converts phase durations in seconds to frame counts at `fps`.
    pub fn from_seconds(
        fps: f64,
        heatmap_seconds: f64,
        zone_coverage_seconds: f64,
        window_frames: usize,
    ) -> Self {
        let to_frames = |seconds: f64| (seconds * fps).round().max(0.0) as usize;
        Self::new(to_frames(heatmap_seconds), to_frames(zone_coverage_seconds), window_frames)
    }

    /// First frame after both phases.
    pub fn active_frames(&self) -> usize {
        self.heatmap_frames.saturating_add(self.zone_coverage_frames)
    }
}

/// Which analytic, if any, applies to a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScheduleDecision {
    Heatmap,
    ZoneCoverage,
    None,
}

impl ScheduleDecision {
    pub fn is_active(self) -> bool {
        !matches!(self, ScheduleDecision::None)
    }
}

/// The trailing slice of each entity's history considered for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleWindow<'h> {
    range: Range<usize>,
    slices: Vec<(EntityId, &'h [PositionSample])>,
}

impl<'h> SampleWindow<'h> {
    pub fn empty() -> Self {
        Self {
            range: 0..0,
            slices: Vec::new(),
        }
    }

    /// Index range requested from every entity's history.
    pub fn range(&self) -> Range<usize> {
        self.range.clone()
    }

    pub fn entities(&self) -> &[(EntityId, &'h [PositionSample])] {
        &self.slices
    }

    pub fn entity(&self, entity: EntityId) -> &'h [PositionSample] {
        self.slices
            .iter()
            .find(|(id, _)| *id == entity)
            .map(|(_, slice)| *slice)
            .unwrap_or(&[])
    }

    pub fn samples(&self) -> impl Iterator<Item = &'h PositionSample> + '_ {
        self.slices.iter().flat_map(|(_, slice)| slice.iter())
    }

    pub fn len(&self) -> usize {
        self.slices.iter().map(|(_, slice)| slice.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Everything the pipeline needs to treat one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FramePlan<'h> {
    pub frame: usize,
    pub decision: ScheduleDecision,
    pub window: SampleWindow<'h>,
}

/// Pure frame-index → plan function over fixed phase constants.
#[derive(Debug, Clone, Copy, Default)]
pub struct OverlayScheduler {
    config: ScheduleConfig,
}

impl OverlayScheduler {
    pub fn new(config: ScheduleConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> ScheduleConfig {
        self.config
    }

    pub fn decide(&self, frame: usize) -> ScheduleDecision {
        if frame < self.config.heatmap_frames {
            ScheduleDecision::Heatmap
        } else if frame < self.config.active_frames() {
            ScheduleDecision::ZoneCoverage
        } else {
            ScheduleDecision::None
        }
    }

    /// `[max(0, f - W), f)`.
    pub fn window_range(&self, frame: usize) -> Range<usize> {
        frame.saturating_sub(self.config.window_frames)..frame
    }

    /// Slices every entity's history to the window of `frame`. Entities with a
    /// shorter history contribute whatever part of the range they have.
    pub fn window<'h>(&self, frame: usize, history: &'h EntityPositionHistory) -> SampleWindow<'h> {
        let range = self.window_range(frame);
        let slices = history
            .entities()
            .map(|(id, samples)| {
                let start = range.start.min(samples.len());
                let end = range.end.min(samples.len());
                (id, &samples[start..end])
            })
            .collect();
        SampleWindow { range, slices }
    }

    pub fn plan<'h>(&self, frame: usize, history: &'h EntityPositionHistory) -> FramePlan<'h> {
        let decision = self.decide(frame);
        let window = if decision.is_active() {
            self.window(frame, history)
        } else {
            SampleWindow::empty()
        };
        FramePlan {
            frame,
            decision,
            window,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::position::Position;

    fn still_entity(frames: usize) -> EntityPositionHistory {
        EntityPositionHistory::from_points([(1, vec![Position::new(100.0, 100.0); frames])])
    }

    #[test]
    fn default_durations_follow_frame_rate() {
        let config = ScheduleConfig::default();
        assert_eq!(config, ScheduleConfig::new(360, 360, 30));
        assert_eq!(config.active_frames(), 720);
    }

    #[test]
    fn phases_switch_at_configured_boundaries() {
        let scheduler = OverlayScheduler::new(ScheduleConfig::new(10, 10, 5));
        let history = still_entity(40);

        for f in 0..10 {
            let plan = scheduler.plan(f, &history);
            assert_eq!(plan.decision, ScheduleDecision::Heatmap, "frame {f}");
            assert_eq!(plan.window.len(), f.min(5), "frame {f}");
        }
        for f in 10..20 {
            let plan = scheduler.plan(f, &history);
            assert_eq!(plan.decision, ScheduleDecision::ZoneCoverage, "frame {f}");
            assert_eq!(plan.window.len(), 5);
        }
        for f in [20, 21, 39, 1000] {
            let plan = scheduler.plan(f, &history);
            assert_eq!(plan.decision, ScheduleDecision::None);
            assert!(plan.window.is_empty());
        }
    }

    #[test]
    fn window_boundaries() {
        let scheduler = OverlayScheduler::new(ScheduleConfig::new(100, 0, 5));
        let history = still_entity(40);

        let first = scheduler.window(0, &history);
        assert_eq!(first.range(), 0..0);
        assert!(first.is_empty());

        let full = scheduler.window(5, &history);
        assert_eq!(full.entity(1).len(), 5);

        let later = scheduler.window(12, &history);
        assert_eq!(later.range(), 7..12);
        assert_eq!(later.entity(1)[0].frame, 7);
        assert_eq!(later.entity(1)[4].frame, 11);
    }

    #[test]
    fn window_clips_short_histories() {
        let scheduler = OverlayScheduler::new(ScheduleConfig::new(100, 0, 5));
        let mut history = still_entity(3);
        history.record(2, 0, Position::new(1.0, 1.0));

        let window = scheduler.window(6, &history);
        assert_eq!(window.range(), 1..6);
        assert_eq!(window.entity(1).len(), 2);
        assert!(window.entity(2).is_empty());
        assert!(window.entity(77).is_empty());
    }

    #[test]
    fn planning_is_pure() {
        let scheduler = OverlayScheduler::new(ScheduleConfig::new(4, 4, 3));
        let history = still_entity(20);
        for f in 0..12 {
            assert_eq!(scheduler.plan(f, &history), scheduler.plan(f, &history));
        }
    }

    #[test]
    fn zero_length_phases_skip_straight_through() {
        let scheduler = OverlayScheduler::new(ScheduleConfig::new(0, 3, 2));
        assert_eq!(scheduler.decide(0), ScheduleDecision::ZoneCoverage);
        assert_eq!(scheduler.decide(3), ScheduleDecision::None);

        let idle = OverlayScheduler::new(ScheduleConfig::new(0, 0, 2));
        assert_eq!(idle.decide(0), ScheduleDecision::None);
    }
}
