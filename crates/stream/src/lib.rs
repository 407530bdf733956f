//! Entity streaming: decides which world entities a moving observer should
//! have streamed in, one inbound message at a time.
//!
//! # Invariants
//! - The grid never misses an entity whose influence square overlaps a cell;
//!   it may over-include, and the exact 3-D distance check filters the rest.
//! - An entity is streamed in at most once until its matching stream-out.
//! - Work per message is bounded by the tracked set plus the observer's cell,
//!   never by the world population.
//!
//! The [`Streamer`] is the only caller of [`AreaGrid`] and [`Tracker`]; the
//! two know nothing of each other. [`StreamWorker`] hosts a streamer on its
//! own thread behind channels.

mod config;
mod engine;
mod grid;
mod message;
mod tracker;
mod worker;

pub use config::{ConfigError, RebuildPolicy, StreamConfig};
pub use engine::{StreamStats, Streamer};
pub use grid::{AreaGrid, CellCoord, CellRect};
pub use message::{
    CodecError, EntityRef, InboundMessage, Notification, decode_inbound, encode_notification,
};
pub use tracker::Tracker;
pub use worker::{StreamWorker, WorkerError};

pub use entstream_common::{EntityId, EntitySnapshot};

pub fn crate_info() -> &'static str {
    concat!("entstream-core v", env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("entstream-core"));
    }
}
