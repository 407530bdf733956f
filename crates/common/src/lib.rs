//! Shared types for the entity streamer: entity ids and the immutable
//! snapshots the upstream transport delivers.

mod types;

pub use types::{EntityId, EntitySnapshot, xyz};
