//! Relay channel — a reconnecting duplex link to one named broadcast channel.
//!
//! DESIGN
//! ======
//! A `Connector` opens raw `Link`s to the relay. `RelayChannel` owns the
//! current link, encodes and decodes `SyncMessage`s at the boundary, and fans
//! inbound events out to its subscribers. Subscribers belong to the channel,
//! not to the link, so a reconnect never re-binds or loses them.
//!
//! ERROR HANDLING
//! ==============
//! A closed or failed link is replaced at once with a fresh connection to the
//! same channel name; there is no backoff. Messages in flight on the dead link
//! are lost. By default the channel retries forever, yielding to the runtime
//! between attempts. A caller that opts into a cap sees
//! `RelayError::Exhausted` once that many consecutive connects have failed.

pub mod memory;
pub mod ws;

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::message::{CodecError, SyncMessage, decode_message, encode_message};

/// Default cap on consecutive failed connects; `0` never gives up.
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 0;

// =============================================================================
// TYPES
// =============================================================================

/// Which side of the relay a client connects as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Publishes edits; receives nothing from the relay.
    Writer,
    /// Receives every message the writer publishes.
    Reader,
}

impl Role {
    /// Path segment used by the relay's connect endpoint.
    #[must_use]
    pub fn path_segment(self) -> &'static str {
        match self {
            Self::Writer => "write",
            Self::Reader => "read",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("invalid relay URL: {0}")]
    InvalidUrl(String),
    #[error("connect to channel `{channel}` failed: {reason}")]
    Connect { channel: String, reason: String },
    #[error("link closed")]
    Closed,
    #[error("link send failed: {0}")]
    Send(String),
    #[error("link receive failed: {0}")]
    Receive(String),
    #[error("gave up on channel `{channel}` after {attempts} failed connect attempts")]
    Exhausted { channel: String, attempts: u32 },
    #[error("message encode failed: {0}")]
    Encode(#[from] CodecError),
}

/// Opens raw links to a named channel.
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    /// Open a new link to `channel`.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Connect`] if the relay cannot be reached.
    async fn connect(&self, channel: &str) -> Result<Box<dyn Link>, RelayError>;
}

/// One physical connection carrying JSON text frames.
#[async_trait::async_trait]
pub trait Link: Send {
    /// Send one text frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the link is closed or the write fails.
    async fn send_text(&mut self, text: String) -> Result<(), RelayError>;

    /// Wait for the next text frame. `None` means the peer closed the link.
    async fn recv_text(&mut self) -> Option<Result<String, RelayError>>;
}

/// Notification fanned out to every subscriber of a channel.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayEvent {
    /// A decoded sync message.
    Message(SyncMessage),
    /// An inbound frame that failed to decode and was discarded.
    Rejected { reason: String },
    /// The current link closed or failed; a reconnect follows immediately.
    Dropped { reason: String },
    /// A fresh link is up. `generation` counts links opened since connect.
    Reconnected { generation: u64 },
}

/// Outcome of [`RelayChannel::send`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Handed to the live link.
    Sent,
    /// The link failed during the write; the message is gone and the link was replaced.
    Lost,
}

// =============================================================================
// RELAY CHANNEL
// =============================================================================

pub struct RelayChannel {
    connector: Arc<dyn Connector>,
    channel: String,
    link: Box<dyn Link>,
    subscribers: Vec<mpsc::UnboundedSender<RelayEvent>>,
    generation: u64,
    max_reconnect_attempts: u32,
}

impl RelayChannel {
    /// Open the first link to `channel`.
    ///
    /// # Errors
    ///
    /// Returns the connector's error if the initial connect fails.
    pub async fn connect(connector: Arc<dyn Connector>, channel: impl Into<String>) -> Result<Self, RelayError> {
        let channel = channel.into();
        let link = connector.connect(&channel).await?;
        info!(%channel, "relay: connected");
        Ok(Self {
            connector,
            channel,
            link,
            subscribers: Vec::new(),
            generation: 1,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
        })
    }

    /// Cap consecutive failed connects per reconnect. `0` retries forever.
    #[must_use]
    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    /// Number of links opened so far, including the first.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Register a subscriber. It keeps receiving events across reconnects.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<RelayEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    /// Encode and send one message on the current link.
    ///
    /// A failed write replaces the link and reports [`Delivery::Lost`].
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Encode`] if the message cannot be encoded, or
    /// [`RelayError::Exhausted`] if the replacement link cannot be opened.
    pub async fn send(&mut self, message: &SyncMessage) -> Result<Delivery, RelayError> {
        let text = encode_message(message)?;
        match self.link.send_text(text).await {
            Ok(()) => Ok(Delivery::Sent),
            Err(e) => {
                warn!(channel = %self.channel, kind = %message.kind(), error = %e, "relay: send failed, message lost");
                self.handle_drop(e.to_string()).await?;
                Ok(Delivery::Lost)
            }
        }
    }

    /// Drop the current link and open a new one to the same channel.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Exhausted`] after `max_reconnect_attempts`
    /// consecutive connect failures, when a cap is set.
    pub async fn reconnect(&mut self) -> Result<(), RelayError> {
        let mut attempts: u32 = 0;
        loop {
            match self.connector.connect(&self.channel).await {
                Ok(link) => {
                    self.link = link;
                    self.generation += 1;
                    info!(channel = %self.channel, generation = self.generation, "relay: reconnected");
                    self.publish(&RelayEvent::Reconnected { generation: self.generation });
                    return Ok(());
                }
                Err(e) => {
                    attempts = attempts.saturating_add(1);
                    if attempts == 1 {
                        warn!(channel = %self.channel, error = %e, "relay: reconnect failed, retrying");
                    } else {
                        debug!(channel = %self.channel, attempts, error = %e, "relay: reconnect attempt failed");
                    }
                    if self.max_reconnect_attempts != 0 && attempts >= self.max_reconnect_attempts {
                        return Err(RelayError::Exhausted { channel: self.channel.clone(), attempts });
                    }
                    // A refused connect can fail without ever suspending.
                    tokio::task::yield_now().await;
                }
            }
        }
    }

    /// Wait for one inbound frame and fan it out, reconnecting if the link ends.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Exhausted`] if a needed reconnect cannot be made.
    pub async fn pump(&mut self) -> Result<(), RelayError> {
        let inbound = self.link.recv_text().await;
        self.handle_inbound(inbound).await
    }

    /// Drive the channel until `outbound` closes: forward queued messages to
    /// the link and fan inbound frames out to subscribers.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Exhausted`] if the relay stays unreachable, or
    /// [`RelayError::Encode`] for a message that cannot be encoded.
    pub async fn run(mut self, mut outbound: mpsc::UnboundedReceiver<SyncMessage>) -> Result<(), RelayError> {
        loop {
            tokio::select! {
                inbound = self.link.recv_text() => {
                    self.handle_inbound(inbound).await?;
                }
                message = outbound.recv() => {
                    let Some(message) = message else {
                        info!(channel = %self.channel, "relay: outbound queue closed, stopping");
                        return Ok(());
                    };
                    self.send(&message).await?;
                }
            }
        }
    }

    async fn handle_inbound(&mut self, inbound: Option<Result<String, RelayError>>) -> Result<(), RelayError> {
        match inbound {
            Some(Ok(text)) => {
                self.dispatch_text(&text);
                Ok(())
            }
            Some(Err(e)) => self.handle_drop(e.to_string()).await,
            None => self.handle_drop("closed by peer".to_owned()).await,
        }
    }

    fn dispatch_text(&mut self, text: &str) {
        match decode_message(text) {
            Ok(message) => {
                debug!(channel = %self.channel, kind = %message.kind(), "relay: message received");
                self.publish(&RelayEvent::Message(message));
            }
            Err(e) => {
                warn!(channel = %self.channel, error = %e, "relay: discarding undecodable frame");
                self.publish(&RelayEvent::Rejected { reason: e.to_string() });
            }
        }
    }

    async fn handle_drop(&mut self, reason: String) -> Result<(), RelayError> {
        warn!(channel = %self.channel, %reason, "relay: link dropped");
        self.publish(&RelayEvent::Dropped { reason });
        self.reconnect().await
    }

    fn publish(&mut self, event: &RelayEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}
