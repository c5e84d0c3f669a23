//! Asset model: placed overlay instances, their identity, and the channel store.
//!
//! Geometry is held as percentages of the canvas so the synchronized model is
//! independent of any viewport. `CanvasSize` turns percentages into pixels at
//! hit-test and render time; pixel values are never stored on an asset.
//!
//! `ChannelState` is the per-channel asset set. Writers mutate it from local
//! edits, readers from inbound sync messages. It keeps insertion order because
//! hit testing and draw order depend on it, but equality ignores order.

#[cfg(test)]
#[path = "asset_test.rs"]
mod asset_test;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Upper bound of the percentage coordinate space.
pub const PERCENT_MAX: f64 = 100.0;

/// Clamp a value into `[0, 100]`. Non-finite input collapses to `0`.
#[must_use]
pub fn clamp_percent(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, PERCENT_MAX)
    } else {
        0.0
    }
}

// =============================================================================
// IDENTITY
// =============================================================================

/// Stable identifier of a placed asset. The only join key between peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(Uuid);

impl AssetId {
    /// Generate a fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl From<Uuid> for AssetId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl FromStr for AssetId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// =============================================================================
// GEOMETRY
// =============================================================================

/// Top-left corner of an asset, in percent of the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    /// Build a position, clamping both axes into `[0, 100]`.
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x: clamp_percent(x), y: clamp_percent(y) }
    }
}

/// Extent of an asset, in percent of the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Size {
    pub w: f64,
    pub h: f64,
}

impl Size {
    /// Build a size, clamping both axes into `[0, 100]`.
    #[must_use]
    pub fn new(w: f64, h: f64) -> Self {
        Self { w: clamp_percent(w), h: clamp_percent(h) }
    }
}

/// Current render-surface dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasSize {
    pub width: f64,
    pub height: f64,
}

impl CanvasSize {
    #[must_use]
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// A canvas with no area cannot map pixels back to percentages.
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        !(self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0)
    }

    /// Convert a pixel offset to a percentage offset. `None` on a degenerate canvas.
    #[must_use]
    pub fn pixels_to_percent(&self, px: f64, py: f64) -> Option<(f64, f64)> {
        if self.is_degenerate() {
            return None;
        }
        Some((px * PERCENT_MAX / self.width, py * PERCENT_MAX / self.height))
    }
}

/// Axis-aligned rectangle in canvas pixels, derived at view time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelRect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl PixelRect {
    /// Inclusive containment test; points on the edge are inside.
    #[must_use]
    pub fn contains(&self, px: f64, py: f64) -> bool {
        px >= self.x && px <= self.x + self.w && py >= self.y && py <= self.y + self.h
    }
}

// =============================================================================
// ASSET INSTANCE
// =============================================================================

/// A placed overlay. The `id` is fixed at construction and never reassigned.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetInstance {
    id: AssetId,
    /// Locator for the image content. Opaque to the sync core.
    pub source_ref: String,
    pub position: Position,
    pub size: Size,
}

impl AssetInstance {
    #[must_use]
    pub fn new(id: AssetId, source_ref: impl Into<String>, position: Position, size: Size) -> Self {
        Self {
            id,
            source_ref: source_ref.into(),
            position: Position::new(position.x, position.y),
            size: Size::new(size.w, size.h),
        }
    }

    #[must_use]
    pub fn id(&self) -> AssetId {
        self.id
    }

    /// Move the top-left corner, clamped to the canvas.
    pub fn move_to(&mut self, x: f64, y: f64) {
        self.position = Position::new(x, y);
    }

    /// Shift by a percentage delta, clamped to the canvas.
    pub fn translate(&mut self, dx: f64, dy: f64) {
        self.move_to(self.position.x + dx, self.position.y + dy);
    }

    /// Overwrite every field except the identity with `other`'s values.
    pub fn assign_fields(&mut self, other: &AssetInstance) {
        self.source_ref.clone_from(&other.source_ref);
        self.position = other.position;
        self.size = other.size;
    }

    /// Pixel bounding box on a canvas of the given size.
    #[must_use]
    pub fn pixel_rect(&self, canvas: CanvasSize) -> PixelRect {
        PixelRect {
            x: self.position.x * canvas.width / PERCENT_MAX,
            y: self.position.y * canvas.height / PERCENT_MAX,
            w: self.size.w * canvas.width / PERCENT_MAX,
            h: self.size.h * canvas.height / PERCENT_MAX,
        }
    }
}

// =============================================================================
// CHANNEL STATE
// =============================================================================

/// The asset set of one channel, kept in insertion order.
#[derive(Debug, Clone, Default)]
pub struct ChannelState {
    assets: Vec<AssetInstance>,
}

impl ChannelState {
    #[must_use]
    pub fn new() -> Self {
        Self { assets: Vec::new() }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.assets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    #[must_use]
    pub fn contains(&self, id: AssetId) -> bool {
        self.get(id).is_some()
    }

    #[must_use]
    pub fn get(&self, id: AssetId) -> Option<&AssetInstance> {
        self.assets.iter().find(|a| a.id == id)
    }

    pub fn get_mut(&mut self, id: AssetId) -> Option<&mut AssetInstance> {
        self.assets.iter_mut().find(|a| a.id == id)
    }

    /// Append an asset. An existing entry with the same id is replaced in place.
    pub fn insert(&mut self, asset: AssetInstance) {
        if let Some(existing) = self.get_mut(asset.id) {
            *existing = asset;
        } else {
            self.assets.push(asset);
        }
    }

    /// Replace the fields of an existing entry. Returns false if the id is unknown.
    pub fn replace(&mut self, asset: &AssetInstance) -> bool {
        let Some(existing) = self.get_mut(asset.id) else {
            return false;
        };
        existing.assign_fields(asset);
        true
    }

    /// Remove an asset by id, returning it if it was present.
    pub fn remove(&mut self, id: AssetId) -> Option<AssetInstance> {
        let index = self.assets.iter().position(|a| a.id == id)?;
        Some(self.assets.remove(index))
    }

    /// Replace everything with a full snapshot. Duplicate ids keep the last record.
    pub fn load_snapshot(&mut self, assets: impl IntoIterator<Item = AssetInstance>) {
        self.assets.clear();
        for asset in assets {
            self.insert(asset);
        }
    }

    /// Assets in insertion order (bottom to top when drawn).
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &AssetInstance> {
        self.assets.iter()
    }

    /// Topmost asset whose pixel box contains the point. Later insertions win.
    #[must_use]
    pub fn hit_test(&self, canvas: CanvasSize, px: f64, py: f64) -> Option<AssetId> {
        self.assets
            .iter()
            .rev()
            .find(|a| a.pixel_rect(canvas).contains(px, py))
            .map(AssetInstance::id)
    }
}

impl PartialEq for ChannelState {
    /// Set equality: same ids with identical fields, order ignored.
    fn eq(&self, other: &Self) -> bool {
        self.assets.len() == other.assets.len()
            && self
                .assets
                .iter()
                .all(|a| other.get(a.id).is_some_and(|b| a == b))
    }
}

impl FromIterator<AssetInstance> for ChannelState {
    fn from_iter<I: IntoIterator<Item = AssetInstance>>(iter: I) -> Self {
        let mut state = Self::new();
        state.load_snapshot(iter);
        state
    }
}
