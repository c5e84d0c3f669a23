//! Writer session: the authoritative asset list on the editing side.
//!
//! DESIGN
//! ======
//! `WriterSession` owns everything the editor needs between input events: the
//! channel state, the current selection, and the active drag gesture. Each
//! mutating operation changes local state first and then posts exactly one
//! `SyncMessage` to its `Outbox`; there is no batching or debouncing.
//!
//! Message choice per operation:
//! - add → `New` snapshot, so a reader with no prior context can apply it
//! - move / drag → `Update` with the moved asset's full record
//! - delete → `Delete` carrying only the id
//!
//! Pixel input is converted to percentages against the canvas size at the
//! moment of the event; pixel values are never stored.

#[cfg(test)]
#[path = "writer_test.rs"]
mod writer_test;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::asset::{AssetId, AssetInstance, CanvasSize, ChannelState, PERCENT_MAX, Position, Size};
use crate::message::SyncMessage;

/// Range for the initial edge length of a freshly added asset, in percent.
const INITIAL_SIZE_RANGE: std::ops::Range<f64> = 10.0..20.0;

// =============================================================================
// COLLABORATORS
// =============================================================================

/// Destination for outgoing sync messages.
pub trait Outbox {
    fn post(&mut self, message: SyncMessage);
}

impl Outbox for Vec<SyncMessage> {
    fn post(&mut self, message: SyncMessage) {
        self.push(message);
    }
}

impl Outbox for mpsc::UnboundedSender<SyncMessage> {
    fn post(&mut self, message: SyncMessage) {
        if self.send(message).is_err() {
            warn!("writer: relay queue closed, message dropped");
        }
    }
}

/// Supplies the current render-surface size.
pub trait CanvasDimensions {
    fn canvas_size(&self) -> CanvasSize;
}

impl CanvasDimensions for CanvasSize {
    fn canvas_size(&self) -> CanvasSize {
        *self
    }
}

impl<F: Fn() -> CanvasSize> CanvasDimensions for F {
    fn canvas_size(&self) -> CanvasSize {
        self()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WriterError {
    #[error("no asset is selected")]
    NoSelection,
    #[error("canvas has no area; cannot convert pixels to percentages")]
    DegenerateCanvas,
}

// =============================================================================
// DRAG
// =============================================================================

/// Active drag gesture on the selected asset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragState {
    /// Asset being dragged.
    pub id: AssetId,
    /// Pointer offset from the asset's top-left corner at press time, in pixels.
    pub offset_x: f64,
    pub offset_y: f64,
}

// =============================================================================
// WRITER SESSION
// =============================================================================

pub struct WriterSession<O, D> {
    state: ChannelState,
    selected: Option<AssetId>,
    drag: Option<DragState>,
    outbox: O,
    canvas: D,
    rng: StdRng,
}

impl<O: Outbox, D: CanvasDimensions> WriterSession<O, D> {
    /// Start an empty session.
    pub fn new(outbox: O, canvas: D) -> Self {
        Self::with_rng(outbox, canvas, StdRng::from_os_rng())
    }

    /// Start an empty session with a deterministic placement RNG.
    pub fn with_seed(outbox: O, canvas: D, seed: u64) -> Self {
        Self::with_rng(outbox, canvas, StdRng::seed_from_u64(seed))
    }

    fn with_rng(outbox: O, canvas: D, rng: StdRng) -> Self {
        Self { state: ChannelState::new(), selected: None, drag: None, outbox, canvas, rng }
    }

    #[must_use]
    pub fn state(&self) -> &ChannelState {
        &self.state
    }

    #[must_use]
    pub fn selected(&self) -> Option<AssetId> {
        self.selected
    }

    #[must_use]
    pub fn drag(&self) -> Option<DragState> {
        self.drag
    }

    #[must_use]
    pub fn outbox(&self) -> &O {
        &self.outbox
    }

    pub fn outbox_mut(&mut self) -> &mut O {
        &mut self.outbox
    }

    // --- Edits ---

    /// Place a new asset at a random spot, select it, and publish a snapshot.
    pub fn add_asset(&mut self, source_ref: impl Into<String>) -> AssetId {
        let id = AssetId::generate();
        let position = Position::new(self.rng.random_range(0.0..PERCENT_MAX), self.rng.random_range(0.0..PERCENT_MAX));
        let size = Size::new(self.rng.random_range(INITIAL_SIZE_RANGE), self.rng.random_range(INITIAL_SIZE_RANGE));
        let asset = AssetInstance::new(id, source_ref, position, size);
        info!(%id, source_ref = %asset.source_ref, "writer: asset added");

        self.state.insert(asset);
        self.selected = Some(id);
        self.outbox.post(SyncMessage::snapshot(&self.state));
        id
    }

    /// Move the selected asset by a pixel delta and publish its new record.
    ///
    /// # Errors
    ///
    /// Returns [`WriterError::NoSelection`] when nothing is selected and
    /// [`WriterError::DegenerateCanvas`] when the canvas has no area. Neither
    /// case mutates state or sends a message.
    pub fn move_selected(&mut self, dx: f64, dy: f64) -> Result<AssetId, WriterError> {
        let id = self.selected.ok_or(WriterError::NoSelection)?;
        let (dx_pct, dy_pct) = self
            .canvas
            .canvas_size()
            .pixels_to_percent(dx, dy)
            .ok_or(WriterError::DegenerateCanvas)?;
        let asset = self.state.get_mut(id).ok_or(WriterError::NoSelection)?;
        asset.translate(dx_pct, dy_pct);
        let message = SyncMessage::update(asset);
        debug!(%id, dx, dy, "writer: asset moved");
        self.outbox.post(message);
        Ok(id)
    }

    /// Remove the selected asset, clear the selection, and publish the delete.
    ///
    /// # Errors
    ///
    /// Returns [`WriterError::NoSelection`] when nothing is selected.
    pub fn delete_selected(&mut self) -> Result<AssetId, WriterError> {
        let id = self.selected.take().ok_or(WriterError::NoSelection)?;
        self.drag = None;
        if self.state.remove(id).is_none() {
            return Err(WriterError::NoSelection);
        }
        info!(%id, "writer: asset deleted");
        self.outbox.post(SyncMessage::delete(id));
        Ok(id)
    }

    /// Select the topmost asset under a pixel point; a miss clears the selection.
    pub fn select_at(&mut self, px: f64, py: f64) -> Option<AssetId> {
        self.selected = self.state.hit_test(self.canvas.canvas_size(), px, py);
        self.selected
    }

    /// Publish the full local state as a `New` snapshot.
    ///
    /// Called after the relay link is replaced so readers re-checkpoint.
    pub fn resync(&mut self) {
        info!(assets = self.state.len(), "writer: publishing resync snapshot");
        self.outbox.post(SyncMessage::snapshot(&self.state));
    }

    // --- Drag gesture ---

    /// Start dragging if the press lands inside the selected asset.
    pub fn begin_drag(&mut self, px: f64, py: f64) -> bool {
        let canvas = self.canvas.canvas_size();
        let Some(asset) = self.selected.and_then(|id| self.state.get(id)) else {
            return false;
        };
        let rect = asset.pixel_rect(canvas);
        if !rect.contains(px, py) {
            return false;
        }
        self.drag = Some(DragState { id: asset.id(), offset_x: px - rect.x, offset_y: py - rect.y });
        true
    }

    /// Move the dragged asset so its corner follows the pointer, and publish it.
    ///
    /// Returns `None` without sending when no drag is active or the canvas has
    /// no area.
    pub fn drag_to(&mut self, px: f64, py: f64) -> Option<AssetId> {
        let drag = self.drag?;
        let (x, y) = self
            .canvas
            .canvas_size()
            .pixels_to_percent(px - drag.offset_x, py - drag.offset_y)?;
        let Some(asset) = self.state.get_mut(drag.id) else {
            self.drag = None;
            return None;
        };
        asset.move_to(x, y);
        self.outbox.post(SyncMessage::update(asset));
        Some(drag.id)
    }

    /// Finish the drag gesture. Sends nothing.
    pub fn end_drag(&mut self) {
        self.drag = None;
    }
}
