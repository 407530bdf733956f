//! Hosts one observer's [`Streamer`] on its own thread.
//!
//! The streamer is owned exclusively by the worker thread; the outside world
//! only talks to it through channels. Inbound messages are processed one at a
//! time, in arrival order, each to completion before the next is taken.
//! Channels are unbounded so notifications are never dropped.

use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, unbounded};

use crate::config::{ConfigError, StreamConfig};
use crate::engine::{StreamStats, Streamer};
use crate::message::{InboundMessage, Notification};

/// Errors from driving a [`StreamWorker`].
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("invalid stream config: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to spawn stream worker thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("stream worker has stopped")]
    Disconnected,
    #[error("stream worker thread panicked")]
    Panicked,
}

pub struct StreamWorker {
    inbound: Option<Sender<InboundMessage>>,
    notifications: Receiver<Notification>,
    handle: Option<JoinHandle<Result<StreamStats, ConfigError>>>,
}

impl StreamWorker {
    /// Validate `config` and start the worker thread. The streamer itself is
    /// built when the first message arrives.
    pub fn spawn(config: StreamConfig) -> Result<Self, WorkerError> {
        config.validate()?;
        let (inbound_tx, inbound_rx) = unbounded();
        let (outbound_tx, outbound_rx) = unbounded();
        let handle = thread::Builder::new()
            .name("stream-worker".into())
            .spawn(move || run(config, inbound_rx, outbound_tx))?;

        Ok(Self {
            inbound: Some(inbound_tx),
            notifications: outbound_rx,
            handle: Some(handle),
        })
    }

    pub fn send(&self, msg: InboundMessage) -> Result<(), WorkerError> {
        let inbound = self.inbound.as_ref().ok_or(WorkerError::Disconnected)?;
        inbound.send(msg).map_err(|_| WorkerError::Disconnected)
    }

    /// Outbound notifications, in emission order.
    pub fn notifications(&self) -> &Receiver<Notification> {
        &self.notifications
    }

    /// Close the inbound channel, let the worker drain what it already has,
    /// and return its final statistics.
    pub fn shutdown(mut self) -> Result<StreamStats, WorkerError> {
        self.inbound.take();
        let handle = self.handle.take().ok_or(WorkerError::Disconnected)?;
        Ok(handle.join().map_err(|_| WorkerError::Panicked)??)
    }
}

impl Drop for StreamWorker {
    fn drop(&mut self) {
        self.inbound.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run(
    config: StreamConfig,
    inbound: Receiver<InboundMessage>,
    outbound: Sender<Notification>,
) -> Result<StreamStats, ConfigError> {
    let mut streamer: Option<Streamer> = None;

    for msg in inbound {
        if streamer.is_none() {
            streamer = Some(Streamer::new(config.clone())?);
            tracing::debug!("streamer initialized on first message");
        }
        let Some(active) = streamer.as_mut() else {
            break;
        };
        for notification in active.handle(msg) {
            if outbound.send(notification).is_err() {
                tracing::debug!("notification receiver dropped, stopping worker");
                return Ok(active.stats().clone());
            }
        }
    }

    Ok(streamer.map(|s| s.stats().clone()).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use entstream_common::{EntityId, EntitySnapshot};
    use glam::Vec3;
    use std::time::Duration;

    #[test]
    fn streams_through_channels() {
        let worker = StreamWorker::spawn(StreamConfig::default()).unwrap();
        let rx = worker.notifications().clone();
        let entity = EntitySnapshot::new(1, Vec3::ZERO, 50.0);

        worker.send(InboundMessage::at(Vec3::new(-20.0, 0.0, 0.0))).unwrap();
        worker.send(InboundMessage::add(entity)).unwrap();
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(5)).unwrap(),
            Notification::StreamIn(entity)
        );

        worker.send(InboundMessage::at(Vec3::new(1_000.0, 0.0, 0.0))).unwrap();
        let stats = worker.shutdown().unwrap();
        let rest: Vec<_> = rx.try_iter().collect();
        assert_eq!(rest, vec![Notification::StreamOut(entity)]);
        assert_eq!(stats.messages_handled, 3);
        assert_eq!(stats.tracked, 0);
    }

    #[test]
    fn preserves_message_order() {
        let worker = StreamWorker::spawn(StreamConfig::default()).unwrap();
        let rx = worker.notifications().clone();
        worker.send(InboundMessage::at(Vec3::ZERO)).unwrap();
        for id in 1..=20u64 {
            let entity = EntitySnapshot::new(id, Vec3::new(id as f32, 0.0, 0.0), 30.0);
            worker.send(InboundMessage::add(entity)).unwrap();
        }
        worker.shutdown().unwrap();

        let ids: Vec<_> = rx.try_iter().map(|n| n.id()).collect();
        let expected: Vec<_> = (1..=20).map(EntityId).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn idle_worker_never_builds_a_streamer() {
        let worker = StreamWorker::spawn(StreamConfig::default()).unwrap();
        let stats = worker.shutdown().unwrap();
        assert_eq!(stats, StreamStats::default());
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let config = StreamConfig {
            area_size: 0.0,
            ..StreamConfig::default()
        };
        assert!(matches!(
            StreamWorker::spawn(config),
            Err(WorkerError::Config(ConfigError::AreaSize(_)))
        ));
    }
}
