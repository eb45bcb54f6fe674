// THEORY:
// The `position` module holds the raw material of every analytic: where each
// tracked entity stood on the reference plane, frame after frame. It is a "dumb"
// data layer in the same spirit as a pixel container. It knows how to store and
// slice positions but nothing about density, zones or colors.
//
// Key principles:
// 1.  **Static shape**: a `Position` is always exactly two numbers. It is
//     deserialized from a two-element array, so the analytics never need to
//     check what shape a coordinate has.
// 2.  **Plane membership**: the `PlaneSize` owns the half-open bounds check
//     `[0, width) x [0, height)`. Anything outside is dropped by the consumers,
//     never clamped.
// 3.  **Caller ownership**: an `EntityPositionHistory` is built once by the caller
//     and only ever read through slices afterwards.

use crate::error::OverlayResult;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Identifier assigned to a tracked entity by the upstream tracker.
pub type EntityId = u32;

/// A coordinate in reference-plane pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 2]", into = "[f32; 2]")]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl From<[f32; 2]> for Position {
    fn from([x, y]: [f32; 2]) -> Self {
        Self { x, y }
    }
}

impl From<Position> for [f32; 2] {
    fn from(position: Position) -> Self {
        [position.x, position.y]
    }
}

impl From<(f32, f32)> for Position {
    fn from((x, y): (f32, f32)) -> Self {
        Self { x, y }
    }
}

/// Dimensions of the reference plane all positions were recorded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaneSize {
    pub width: u32,
    pub height: u32,
}

impl Default for PlaneSize {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

impl PlaneSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Half-open membership test. NaN coordinates are never contained.
    pub fn contains(&self, position: Position) -> bool {
        position.x >= 0.0
            && position.y >= 0.0
            && position.x < self.width as f32
            && position.y < self.height as f32
    }

    /// The pixel a contained position falls on.
    pub fn pixel_of(&self, position: Position) -> Option<(u32, u32)> {
        if !self.contains(position) {
            return None;
        }
        let px = (position.x.floor() as u32).min(self.width - 1);
        let py = (position.y.floor() as u32).min(self.height - 1);
        Some((px, py))
    }

    pub fn area(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// One observation of one entity. Immutable once recorded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionSample {
    pub entity: EntityId,
    pub frame: usize,
    pub position: Position,
}

/// Axis-aligned bounding box `[x1, y1, x2, y2]` as reported by the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(from = "[f32; 4]")]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl From<[f32; 4]> for BoundingBox {
    fn from([x1, y1, x2, y2]: [f32; 4]) -> Self {
        Self { x1, y1, x2, y2 }
    }
}

/// Which point of a bounding box stands for the entity's position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BoxAnchor {
    /// The box's first corner, `(x1, y1)`.
    #[default]
    TopLeft,
    /// Midpoint of the bottom edge, where a player's feet are.
    BottomCenter,
    Center,
}

impl BoundingBox {
    pub fn anchor(&self, anchor: BoxAnchor) -> Position {
        match anchor {
            BoxAnchor::TopLeft => Position::new(self.x1, self.y1),
            BoxAnchor::BottomCenter => Position::new((self.x1 + self.x2) / 2.0, self.y2),
            BoxAnchor::Center => {
                Position::new((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
            }
        }
    }
}

/// A single entity's entry in one frame of tracker output.
#[derive(Debug, Clone, Deserialize)]
pub struct TrackEntry {
    pub bbox: BoundingBox,
}

/// Per-frame tracker output: `frame -> {entity -> entry}`.
pub type TrackFrames = Vec<HashMap<EntityId, TrackEntry>>;

/// Ordered position history for every entity observed in a run.
#[derive(Debug, Clone, Default)]
pub struct EntityPositionHistory {
    tracks: BTreeMap<EntityId, Vec<PositionSample>>,
}

impl EntityPositionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a sample to its entity's sequence. Insertion order is temporal order.
    pub fn record(&mut self, entity: EntityId, frame: usize, position: Position) {
        self.tracks.entry(entity).or_default().push(PositionSample {
            entity,
            frame,
            position,
        });
    }

    /// Builds a history from bare coordinate lists. The frame index of each
    /// sample is its position in the list.
    pub fn from_points<I, P>(points: impl IntoIterator<Item = (EntityId, I)>) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Position>,
    {
        let mut history = Self::new();
        for (entity, sequence) in points {
            for (frame, position) in sequence.into_iter().enumerate() {
                history.record(entity, frame, position.into());
            }
        }
        history
    }

    /// Collects one anchor point per entity per frame from tracker output.
    pub fn from_tracks(frames: &[HashMap<EntityId, TrackEntry>], anchor: BoxAnchor) -> Self {
        let mut history = Self::new();
        for (frame, entries) in frames.iter().enumerate() {
            // HashMap order is arbitrary; keep per-frame insertion deterministic.
            let mut ids: Vec<&EntityId> = entries.keys().collect();
            ids.sort_unstable();
            for id in ids {
                history.record(*id, frame, entries[id].bbox.anchor(anchor));
            }
        }
        history
    }

    /// Parses the `{"<entity>": [[x, y], ...]}` history format.
    pub fn from_json(text: &str) -> OverlayResult<Self> {
        let raw: BTreeMap<EntityId, Vec<Position>> = serde_json::from_str(text)?;
        Ok(Self::from_points(raw))
    }

    pub fn entity(&self, entity: EntityId) -> Option<&[PositionSample]> {
        self.tracks.get(&entity).map(Vec::as_slice)
    }

    pub fn entities(&self) -> impl Iterator<Item = (EntityId, &[PositionSample])> {
        self.tracks.iter().map(|(id, samples)| (*id, samples.as_slice()))
    }

    pub fn entity_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn sample_count(&self) -> usize {
        self.tracks.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.sample_count() == 0
    }

    /// Every sample of every entity, entity by entity.
    pub fn samples(&self) -> impl Iterator<Item = &PositionSample> {
        self.tracks.values().flatten()
    }

    /// Length of the longest entity sequence.
    pub fn longest_track(&self) -> usize {
        self.tracks.values().map(Vec::len).max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OverlayError;

    #[test]
    fn plane_bounds_are_half_open() {
        let plane = PlaneSize::default();
        assert!(plane.contains(Position::new(0.0, 0.0)));
        assert!(plane.contains(Position::new(1279.9, 719.9)));
        assert!(!plane.contains(Position::new(1280.0, 100.0)));
        assert!(!plane.contains(Position::new(100.0, 720.0)));
        assert!(!plane.contains(Position::new(-0.5, 10.0)));
        assert!(!plane.contains(Position::new(f32::NAN, 10.0)));
        assert_eq!(plane.pixel_of(Position::new(1279.9, 719.9)), Some((1279, 719)));
        assert_eq!(plane.pixel_of(Position::new(1280.0, 720.0)), None);
    }

    #[test]
    fn history_keeps_insertion_order() {
        let history = EntityPositionHistory::from_points([
            (3, vec![Position::new(1.0, 2.0), Position::new(3.0, 4.0)]),
            (1, vec![Position::new(5.0, 6.0)]),
        ]);
        assert_eq!(history.entity_count(), 2);
        assert_eq!(history.sample_count(), 3);
        let three = history.entity(3).unwrap();
        assert_eq!(three[0].frame, 0);
        assert_eq!(three[1].position, Position::new(3.0, 4.0));
        assert_eq!(history.longest_track(), 2);
    }

    #[test]
    fn json_history_requires_coordinate_pairs() {
        let history = EntityPositionHistory::from_json(r#"{"7": [[100, 100], [101.5, 99]]}"#)
            .expect("valid history");
        assert_eq!(history.entity(7).unwrap().len(), 2);

        for bad in [r#"{"7": [[100]]}"#, r#"{"7": [[1, 2, 3]]}"#, r#"{"seven": []}"#] {
            let err = EntityPositionHistory::from_json(bad).unwrap_err();
            assert!(matches!(err, OverlayError::Json(_)), "{bad}");
        }
    }

    #[test]
    fn tracks_use_requested_anchor() {
        let frames: TrackFrames = serde_json::from_str(
            r#"[
                {"4": {"bbox": [10, 20, 30, 60]}},
                {},
                {"4": {"bbox": [12, 22, 32, 62]}, "2": {"bbox": [0, 0, 2, 2]}}
            ]"#,
        )
        .expect("valid tracks");

        let top_left = EntityPositionHistory::from_tracks(&frames, BoxAnchor::TopLeft);
        let four = top_left.entity(4).unwrap();
        assert_eq!(four.len(), 2);
        assert_eq!(four[0].position, Position::new(10.0, 20.0));
        assert_eq!(four[1].frame, 2);

        let feet = EntityPositionHistory::from_tracks(&frames, BoxAnchor::BottomCenter);
        assert_eq!(feet.entity(4).unwrap()[0].position, Position::new(20.0, 60.0));
        assert_eq!(feet.entity(2).unwrap()[0].position, Position::new(1.0, 2.0));
    }
}
