//! Real-time image overlay synchronization.
//!
//! One writer places, moves, and deletes image overlays on a named channel;
//! any number of readers subscribed to that channel converge on the writer's
//! asset list. Positions and sizes are percentages of the canvas, so every
//! reader resolves them against its own render surface.
//!
//! Data flows writer edit → [`message::SyncMessage`] → relay broadcast →
//! [`reader::Reconciler`]. The relay itself is a dumb fan-out; clients reach
//! it through the [`relay::Connector`] seam, implemented over websockets for
//! production and in memory for tests and the demo.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`asset`] | Asset ids, percentage geometry, and the per-channel asset list |
//! | [`message`] | Sync message model and JSON text codec |
//! | [`relay`] | Reconnecting relay channel over pluggable connectors |
//! | [`writer`] | Writer session: selection, drag, and outgoing edits |
//! | [`reader`] | Reader reconciler and resource tracking |
//! | [`loader`] | HTTP image loader feeding the reconciler |
//! | [`catalog`] | Uploaded-asset listing client |
//! | [`config`] | Environment-driven client configuration |

pub mod asset;
pub mod catalog;
pub mod config;
pub mod loader;
pub mod message;
pub mod reader;
pub mod relay;
pub mod writer;
