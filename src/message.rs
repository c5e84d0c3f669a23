//! Sync message model and JSON text codec.
//!
//! Every writer edit travels as exactly one `SyncMessage`. The wire shape is
//! externally tagged by kind:
//!
//! ```text
//! {"New":    {"assets": [{"id", "x", "y", "w", "h", "url"}, ...]}}
//! {"Update": {"id", "x", "y", "w", "h", "url"}}
//! {"Delete": "<id>"}
//! ```
//!
//! Ids are opaque to every consumer but must be UUID strings on the wire. A
//! record whose id is not a UUID fails the whole frame with
//! `CodecError::InvalidPayload`; it is never read as an unknown id.
//!
//! Frames are decoded once, here, into the tagged enum; everything downstream
//! matches on `SyncMessage` exhaustively and never inspects raw JSON.

#[cfg(test)]
#[path = "message_test.rs"]
mod message_test;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::asset::{AssetId, AssetInstance, ChannelState, Position, Size};

/// Error returned by [`encode_message`] and [`decode_message`].
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The text is not valid JSON.
    #[error("malformed message JSON: {0}")]
    Malformed(#[source] serde_json::Error),
    /// The JSON is valid but not a single-key object.
    #[error("message must be an object with exactly one kind key, found {0} keys")]
    Shape(usize),
    /// The top-level value is not an object at all.
    #[error("message must be a JSON object")]
    NotAnObject,
    /// The kind key is not one of `New`, `Update`, `Delete`.
    #[error("unrecognized message kind `{0}`")]
    UnknownKind(String),
    /// The kind is known but its payload does not match the expected shape.
    #[error("invalid `{kind}` payload: {source}")]
    InvalidPayload {
        kind: MessageKind,
        #[source]
        source: serde_json::Error,
    },
    /// Serialization failed.
    #[error("failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Discriminant of a [`SyncMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    New,
    Update,
    Delete,
}

impl MessageKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "New",
            Self::Update => "Update",
            Self::Delete => "Delete",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "New" => Some(Self::New),
            "Update" => Some(Self::Update),
            "Delete" => Some(Self::Delete),
            _ => None,
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One asset record as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireAsset {
    pub id: AssetId,
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
    pub url: String,
}

impl From<&AssetInstance> for WireAsset {
    fn from(asset: &AssetInstance) -> Self {
        Self {
            id: asset.id(),
            x: asset.position.x,
            y: asset.position.y,
            w: asset.size.w,
            h: asset.size.h,
            url: asset.source_ref.clone(),
        }
    }
}

impl From<WireAsset> for AssetInstance {
    /// Out-of-range coordinates are clamped into the percentage space.
    fn from(wire: WireAsset) -> Self {
        AssetInstance::new(wire.id, wire.url, Position::new(wire.x, wire.y), Size::new(wire.w, wire.h))
    }
}

/// Full asset list carried by a `New` message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub assets: Vec<WireAsset>,
}

impl Snapshot {
    /// Convert into model instances, preserving order.
    #[must_use]
    pub fn into_instances(self) -> Vec<AssetInstance> {
        self.assets.into_iter().map(AssetInstance::from).collect()
    }
}

/// A synchronization message from the writer to every reader on a channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SyncMessage {
    /// Authoritative full state; supersedes everything a reader knew before.
    New(Snapshot),
    /// Full record of one asset that the reader is expected to know already.
    Update(WireAsset),
    /// Removal of one asset by id.
    Delete(AssetId),
}

impl SyncMessage {
    /// Build a `New` snapshot of the whole state, in insertion order.
    #[must_use]
    pub fn snapshot(state: &ChannelState) -> Self {
        Self::New(Snapshot { assets: state.iter().map(WireAsset::from).collect() })
    }

    #[must_use]
    pub fn update(asset: &AssetInstance) -> Self {
        Self::Update(WireAsset::from(asset))
    }

    #[must_use]
    pub fn delete(id: AssetId) -> Self {
        Self::Delete(id)
    }

    #[must_use]
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::New(_) => MessageKind::New,
            Self::Update(_) => MessageKind::Update,
            Self::Delete(_) => MessageKind::Delete,
        }
    }
}

/// Encode a message as a JSON text frame.
///
/// # Errors
///
/// Returns [`CodecError::Encode`] if serialization fails.
pub fn encode_message(message: &SyncMessage) -> Result<String, CodecError> {
    serde_json::to_string(message).map_err(CodecError::Encode)
}

/// Decode a JSON text frame into a message.
///
/// # Errors
///
/// Returns [`CodecError::Malformed`] for invalid JSON, [`CodecError::NotAnObject`]
/// or [`CodecError::Shape`] when the frame is not a single-key object,
/// [`CodecError::UnknownKind`] for an unrecognized kind, and
/// [`CodecError::InvalidPayload`] when the payload does not fit its kind.
pub fn decode_message(text: &str) -> Result<SyncMessage, CodecError> {
    let value: Value = serde_json::from_str(text).map_err(CodecError::Malformed)?;
    let Value::Object(map) = &value else {
        return Err(CodecError::NotAnObject);
    };
    if map.len() != 1 {
        return Err(CodecError::Shape(map.len()));
    }
    let Some(raw_kind) = map.keys().next() else {
        return Err(CodecError::Shape(0));
    };
    let Some(kind) = MessageKind::parse(raw_kind) else {
        return Err(CodecError::UnknownKind(raw_kind.clone()));
    };

    serde_json::from_value(value).map_err(|source| CodecError::InvalidPayload { kind, source })
}
