//! In-process relay: a dumb broadcast hub keyed by channel name.
//!
//! Behaves like the production relay as seen from a client:
//! - writer frames are rebroadcast to every reader on the same channel
//! - writers receive nothing; reader frames are accepted and ignored
//! - the last writer frame per channel is cached and replayed to each newly
//!   connected reader
//!
//! `sever` closes every live link on a channel to simulate a transport drop,
//! and `set_accepting(false)` makes new connects fail.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{broadcast, watch};
use tracing::{debug, warn};

use super::{Connector, Link, RelayError, Role};

/// Per-channel rebroadcast buffer, matching the relay's queue depth.
const CHANNEL_CAPACITY: usize = 100;

struct ChannelHub {
    readers: broadcast::Sender<String>,
    last_message: Option<String>,
    epoch: watch::Sender<u64>,
}

impl ChannelHub {
    fn new() -> Self {
        let (readers, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (epoch, _) = watch::channel(0);
        Self { readers, last_message: None, epoch }
    }
}

struct RelayInner {
    channels: HashMap<String, ChannelHub>,
    accepting: bool,
}

/// Shared handle to an in-process relay. Clones refer to the same hub.
#[derive(Clone)]
pub struct MemoryRelay {
    inner: Arc<Mutex<RelayInner>>,
}

impl Default for MemoryRelay {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRelay {
    #[must_use]
    pub fn new() -> Self {
        Self { inner: Arc::new(Mutex::new(RelayInner { channels: HashMap::new(), accepting: true })) }
    }

    /// Connector for one side of the relay.
    #[must_use]
    pub fn connector(&self, role: Role) -> MemoryConnector {
        MemoryConnector { relay: self.clone(), role }
    }

    /// Close every live link on `channel`. New connects still succeed.
    pub fn sever(&self, channel: &str) {
        let inner = self.lock();
        if let Some(hub) = inner.channels.get(channel) {
            hub.epoch.send_modify(|epoch| *epoch += 1);
            debug!(%channel, "memory relay: severed links");
        }
    }

    /// Toggle whether new connects are accepted.
    pub fn set_accepting(&self, accepting: bool) {
        self.lock().accepting = accepting;
    }

    /// Number of readers currently subscribed to `channel`.
    #[must_use]
    pub fn reader_count(&self, channel: &str) -> usize {
        self.lock().channels.get(channel).map_or(0, |hub| hub.readers.receiver_count())
    }

    /// Last writer frame cached for `channel`.
    #[must_use]
    pub fn last_message(&self, channel: &str) -> Option<String> {
        self.lock().channels.get(channel).and_then(|hub| hub.last_message.clone())
    }

    fn lock(&self) -> MutexGuard<'_, RelayInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn open(&self, channel: &str, role: Role) -> Result<MemoryLink, RelayError> {
        let mut inner = self.lock();
        if !inner.accepting {
            return Err(RelayError::Connect { channel: channel.to_owned(), reason: "relay not accepting".to_owned() });
        }
        let hub = inner.channels.entry(channel.to_owned()).or_insert_with(ChannelHub::new);
        let epoch_rx = hub.epoch.subscribe();
        let epoch = *epoch_rx.borrow();
        let (inbound, pending) = match role {
            Role::Reader => (Some(hub.readers.subscribe()), hub.last_message.clone()),
            Role::Writer => (None, None),
        };
        Ok(MemoryLink { relay: self.clone(), channel: channel.to_owned(), role, epoch, epoch_rx, inbound, pending })
    }

    fn publish(&self, channel: &str, text: String) {
        let mut inner = self.lock();
        let hub = inner.channels.entry(channel.to_owned()).or_insert_with(ChannelHub::new);
        if hub.readers.receiver_count() == 0 {
            debug!(%channel, "memory relay: skipping broadcast (no readers)");
        } else if hub.readers.send(text.clone()).is_err() {
            debug!(%channel, "memory relay: readers left before broadcast");
        }
        hub.last_message = Some(text);
    }
}

/// Connector bound to one role on a [`MemoryRelay`].
#[derive(Clone)]
pub struct MemoryConnector {
    relay: MemoryRelay,
    role: Role,
}

#[async_trait::async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, channel: &str) -> Result<Box<dyn Link>, RelayError> {
        let link = self.relay.open(channel, self.role)?;
        Ok(Box::new(link))
    }
}

struct MemoryLink {
    relay: MemoryRelay,
    channel: String,
    role: Role,
    epoch: u64,
    epoch_rx: watch::Receiver<u64>,
    inbound: Option<broadcast::Receiver<String>>,
    pending: Option<String>,
}

impl MemoryLink {
    fn is_severed(&self) -> bool {
        *self.epoch_rx.borrow() != self.epoch
    }
}

#[async_trait::async_trait]
impl Link for MemoryLink {
    async fn send_text(&mut self, text: String) -> Result<(), RelayError> {
        if self.is_severed() {
            return Err(RelayError::Closed);
        }
        match self.role {
            Role::Writer => self.relay.publish(&self.channel, text),
            Role::Reader => debug!(channel = %self.channel, "memory relay: ignoring reader frame"),
        }
        Ok(())
    }

    async fn recv_text(&mut self) -> Option<Result<String, RelayError>> {
        loop {
            if self.is_severed() {
                return None;
            }
            if let Some(text) = self.pending.take() {
                return Some(Ok(text));
            }
            match &mut self.inbound {
                None => {
                    if self.epoch_rx.changed().await.is_err() {
                        return None;
                    }
                }
                Some(rx) => {
                    tokio::select! {
                        changed = self.epoch_rx.changed() => {
                            if changed.is_err() {
                                return None;
                            }
                        }
                        received = rx.recv() => match received {
                            Ok(text) => return Some(Ok(text)),
                            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                                warn!(channel = %self.channel, skipped, "memory relay: reader lagged, frames dropped");
                            }
                            Err(broadcast::error::RecvError::Closed) => return None,
                        },
                    }
                }
            }
        }
    }
}
