//! Reader-side reconciliation of relayed sync messages.
//!
//! DESIGN
//! ======
//! The `Reconciler` keeps a derived copy of the writer's asset list plus one
//! resource slot per asset. Messages are applied atomically, one at a time, on
//! the task that owns the reconciler:
//!
//! - `New` is an authoritative checkpoint: the state becomes exactly the
//!   snapshot, whatever came before.
//! - `Update` overwrites a known asset. An unknown id is an inconsistency; it
//!   is logged and dropped, never turned into a create.
//! - `Delete` removes a known asset; an unknown id is a no-op.
//!
//! Resource loading is delegated to a `ResourceLoader` and completes out of
//! band through `on_resource_loaded`. A completion is attached only if the
//! asset still exists and still points at the same URL, so loads racing a
//! delete or a source change are discarded without error.
//!
//! ERROR HANDLING
//! ==============
//! Nothing here returns an error. Every failure degrades to a stale or
//! incomplete view and is visible through `ApplyOutcome` and the counters in
//! `ReconcilerStats`.

#[cfg(test)]
#[path = "reader_test.rs"]
mod reader_test;

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::asset::{AssetId, AssetInstance, CanvasSize, ChannelState, PixelRect};
use crate::loader::LoadCompletion;
use crate::message::SyncMessage;
use crate::relay::RelayEvent;

// =============================================================================
// RESOURCES
// =============================================================================

/// Starts asynchronous resolution of an asset's image content.
///
/// Implementations must not call back synchronously; results are delivered
/// later through [`Reconciler::on_resource_loaded`].
pub trait ResourceLoader {
    type Resource;

    fn request(&mut self, id: AssetId, url: &str);
}

/// Load status of one asset's resource.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceState<R> {
    Pending,
    Ready(R),
    Failed(String),
}

#[derive(Debug)]
struct ResourceSlot<R> {
    url: String,
    state: ResourceState<R>,
}

// =============================================================================
// OUTCOMES
// =============================================================================

/// What applying one message did to the reconciled state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// A snapshot replaced the state; `count` assets remain.
    Replaced { count: usize },
    Updated(AssetId),
    /// Update for an id the reader has never seen; discarded.
    Inconsistent(AssetId),
    Deleted(AssetId),
    /// Delete for an id not present; no-op.
    DeleteIgnored(AssetId),
}

/// Running counters since the reconciler was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcilerStats {
    pub snapshots: u64,
    pub updates: u64,
    pub deletes: u64,
    pub inconsistencies: u64,
    pub ignored_deletes: u64,
    /// Frames the relay delivered that could not be decoded.
    pub discarded: u64,
    pub reconnects: u64,
}

/// One renderable entry, resolved against a concrete canvas.
#[derive(Debug)]
pub struct Drawable<'a, R> {
    pub id: AssetId,
    pub rect: PixelRect,
    pub resource: &'a R,
}

// =============================================================================
// RECONCILER
// =============================================================================

pub struct Reconciler<L: ResourceLoader> {
    state: ChannelState,
    resources: HashMap<AssetId, ResourceSlot<L::Resource>>,
    loader: L,
    stale: bool,
    stats: ReconcilerStats,
}

impl<L: ResourceLoader> Reconciler<L> {
    pub fn new(loader: L) -> Self {
        Self { state: ChannelState::new(), resources: HashMap::new(), loader, stale: false, stats: ReconcilerStats::default() }
    }

    #[must_use]
    pub fn state(&self) -> &ChannelState {
        &self.state
    }

    #[must_use]
    pub fn stats(&self) -> ReconcilerStats {
        self.stats
    }

    /// True between a relay reconnect and the next `New` snapshot.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    #[must_use]
    pub fn resource(&self, id: AssetId) -> Option<&ResourceState<L::Resource>> {
        self.resources.get(&id).map(|slot| &slot.state)
    }

    #[must_use]
    pub fn loader(&self) -> &L {
        &self.loader
    }

    /// Apply one decoded sync message.
    pub fn apply(&mut self, message: SyncMessage) -> ApplyOutcome {
        match message {
            SyncMessage::New(snapshot) => {
                self.state.load_snapshot(snapshot.into_instances());
                self.sync_resources();
                if self.stale {
                    info!(assets = self.state.len(), "reader: resynchronized from snapshot");
                }
                self.stale = false;
                self.stats.snapshots += 1;
                ApplyOutcome::Replaced { count: self.state.len() }
            }
            SyncMessage::Update(wire) => {
                let incoming = AssetInstance::from(wire);
                let id = incoming.id();
                if !self.state.replace(&incoming) {
                    warn!(%id, "reader: update for unknown asset discarded");
                    self.stats.inconsistencies += 1;
                    return ApplyOutcome::Inconsistent(id);
                }
                ensure_resource(&mut self.resources, &mut self.loader, id, &incoming.source_ref);
                self.stats.updates += 1;
                ApplyOutcome::Updated(id)
            }
            SyncMessage::Delete(id) => {
                if self.state.remove(id).is_none() {
                    debug!(%id, "reader: delete for unknown asset ignored");
                    self.stats.ignored_deletes += 1;
                    return ApplyOutcome::DeleteIgnored(id);
                }
                self.resources.remove(&id);
                self.stats.deletes += 1;
                ApplyOutcome::Deleted(id)
            }
        }
    }

    /// Feed one relay event. Returns the outcome when the event carried a message.
    pub fn apply_event(&mut self, event: RelayEvent) -> Option<ApplyOutcome> {
        match event {
            RelayEvent::Message(message) => Some(self.apply(message)),
            RelayEvent::Rejected { reason } => {
                warn!(%reason, "reader: discarded undecodable frame");
                self.stats.discarded += 1;
                None
            }
            RelayEvent::Dropped { reason } => {
                debug!(%reason, "reader: relay link dropped");
                None
            }
            RelayEvent::Reconnected { generation } => {
                info!(generation, assets = self.state.len(), "reader: relay reconnected, state stale until next snapshot");
                self.stale = true;
                self.stats.reconnects += 1;
                None
            }
        }
    }

    /// Attach a finished load. Returns false when the completion was discarded.
    pub fn on_resource_loaded(&mut self, completion: LoadCompletion<L::Resource>) -> bool {
        let LoadCompletion { id, url, result } = completion;
        let Some(slot) = self.resources.get_mut(&id) else {
            debug!(%id, %url, "reader: load finished for removed asset, discarding");
            return false;
        };
        if slot.url != url {
            debug!(%id, %url, current = %slot.url, "reader: load finished for superseded url, discarding");
            return false;
        }
        slot.state = match result {
            Ok(resource) => ResourceState::Ready(resource),
            Err(e) => {
                warn!(%id, %url, error = %e, "reader: resource failed to load");
                ResourceState::Failed(e.to_string())
            }
        };
        true
    }

    /// Entries with a ready resource, in draw order (first added at the bottom).
    pub fn drawables(&self, canvas: CanvasSize) -> impl Iterator<Item = Drawable<'_, L::Resource>> {
        self.state.iter().filter_map(move |asset| {
            let id = asset.id();
            match &self.resources.get(&id)?.state {
                ResourceState::Ready(resource) => Some(Drawable { id, rect: asset.pixel_rect(canvas), resource }),
                ResourceState::Pending | ResourceState::Failed(_) => None,
            }
        })
    }

    fn sync_resources(&mut self) {
        let state = &self.state;
        self.resources.retain(|id, _| state.contains(*id));
        for asset in self.state.iter() {
            ensure_resource(&mut self.resources, &mut self.loader, asset.id(), &asset.source_ref);
        }
    }
}

/// Request a load unless the slot already tracks this exact URL.
fn ensure_resource<L: ResourceLoader>(
    resources: &mut HashMap<AssetId, ResourceSlot<L::Resource>>,
    loader: &mut L,
    id: AssetId,
    url: &str,
) {
    if resources.get(&id).is_some_and(|slot| slot.url == url) {
        return;
    }
    resources.insert(id, ResourceSlot { url: url.to_owned(), state: ResourceState::Pending });
    loader.request(id, url);
}
