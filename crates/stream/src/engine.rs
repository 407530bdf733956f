use entstream_common::{EntityId, EntitySnapshot};
use glam::Vec3;

use crate::config::{ConfigError, RebuildPolicy, StreamConfig};
use crate::grid::AreaGrid;
use crate::message::{InboundMessage, Notification};
use crate::tracker::Tracker;

/// Per-message streaming statistics for instrumentation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub messages_handled: u64,
    pub streamed_in_last: usize,
    pub streamed_out_last: usize,
    /// Entities streamed in after the last message.
    pub tracked: usize,
    /// Entities held by the grid after the last message.
    pub indexed: usize,
    /// Entities the last sweep-in had to look at.
    pub last_cell_population: usize,
}

/// Streaming state for a single observer.
///
/// Owns the observer's last position, the area grid and the tracker of
/// streamed-in entities. Every inbound message is applied in a fixed order
/// (position, full set, add, remove) and always finishes with an evaluate
/// pass, whose cost depends only on the tracker size and the population of
/// the observer's own cell.
#[derive(Debug, Clone)]
pub struct Streamer {
    config: StreamConfig,
    position: Option<Vec3>,
    grid: AreaGrid,
    tracker: Tracker,
    stats: StreamStats,
}

impl Streamer {
    pub fn new(config: StreamConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            grid: AreaGrid::new(&config),
            config,
            position: None,
            tracker: Tracker::new(),
            stats: StreamStats::default(),
        })
    }

    /// Apply one inbound message and return the notifications it caused, in
    /// emission order.
    pub fn handle(&mut self, msg: InboundMessage) -> Vec<Notification> {
        let _span =
            tracing::info_span!("stream_handle", seq = self.stats.messages_handled).entered();
        let mut out = Vec::new();

        if let Some(position) = msg.position {
            if position.is_finite() {
                self.position = Some(position);
            } else {
                tracing::warn!(?position, "ignoring non-finite observer position");
            }
        }
        if let Some(entities) = msg.entities {
            self.rebuild(entities.into_iter().map(|(_, entity)| entity), &mut out);
        }
        if let Some(entity) = msg.entity_to_add {
            self.add(entity);
        }
        if let Some(target) = msg.entity_to_remove {
            self.remove(target.id, &mut out);
        }
        self.evaluate(&mut out);

        let streamed_in = out.iter().filter(|n| n.is_stream_in()).count();
        self.stats.messages_handled += 1;
        self.stats.streamed_in_last = streamed_in;
        self.stats.streamed_out_last = out.len() - streamed_in;
        self.stats.tracked = self.tracker.len();
        self.stats.indexed = self.grid.indexed_count();
        out
    }

    fn rebuild(
        &mut self,
        entities: impl IntoIterator<Item = EntitySnapshot>,
        out: &mut Vec<Notification>,
    ) {
        self.grid.rebuild(entities);
        tracing::debug!(indexed = self.grid.indexed_count(), "grid rebuilt from full set");

        if self.config.rebuild_policy == RebuildPolicy::Retain {
            return;
        }
        let dropped: Vec<EntityId> = self
            .tracker
            .ids()
            .filter(|id| !self.grid.contains(*id))
            .collect();
        for id in dropped {
            if let Some(entity) = self.tracker.mark_out(id) {
                tracing::debug!(%id, "stream out, absent from full set");
                out.push(Notification::StreamOut(entity));
            }
        }
        let fresh: Vec<EntitySnapshot> = self
            .tracker
            .ids()
            .filter_map(|id| self.grid.get(id).copied())
            .collect();
        for entity in fresh {
            self.tracker.refresh(entity);
        }
    }

    fn add(&mut self, entity: EntitySnapshot) {
        if self.grid.insert(entity).is_some()
            && self.config.rebuild_policy == RebuildPolicy::Reconcile
        {
            self.tracker.refresh(entity);
        }
    }

    fn remove(&mut self, id: EntityId, out: &mut Vec<Notification>) {
        if let Some(entity) = self.tracker.mark_out(id) {
            tracing::debug!(%id, "stream out, removed");
            out.push(Notification::StreamOut(entity));
        }
        self.grid.remove(id);
    }

    fn evaluate(&mut self, out: &mut Vec<Notification>) {
        let Some(observer) = self.position else {
            return;
        };
        let emitted_before = out.len();

        let leaving: Vec<EntityId> = self
            .tracker
            .iter()
            .filter(|entity| !entity.reaches(observer))
            .map(|entity| entity.id)
            .collect();
        for id in leaving {
            if let Some(entity) = self.tracker.mark_out(id) {
                tracing::debug!(%id, distance = entity.distance_to(observer), "stream out");
                out.push(Notification::StreamOut(entity));
            }
        }
        let swept_out = out.len() - emitted_before;

        let candidates = self.grid.cell_at(observer);
        for entity in candidates {
            if self.tracker.contains(entity.id) {
                continue;
            }
            if entity.reaches(observer) {
                tracing::debug!(id = %entity.id, distance = entity.distance_to(observer), "stream in");
                self.tracker.mark_in(entity.id, *entity);
                out.push(Notification::StreamIn(*entity));
            }
        }
        self.stats.last_cell_population = candidates.len();

        tracing::trace!(
            tracked = self.tracker.len(),
            cell_population = candidates.len(),
            swept_out,
            swept_in = out.len() - emitted_before - swept_out,
            "evaluate complete"
        );
    }

    /// Last observer position received, if any.
    pub fn position(&self) -> Option<Vec3> {
        self.position
    }

    pub fn grid(&self) -> &AreaGrid {
        &self.grid
    }

    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    pub fn is_streamed_in(&self, id: EntityId) -> bool {
        self.tracker.contains(id)
    }

    /// Statistics from the last handled message.
    pub fn stats(&self) -> &StreamStats {
        &self.stats
    }
}
