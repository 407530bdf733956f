use std::collections::HashMap;
use std::collections::hash_map::Entry;

use entstream_common::{EntityId, EntitySnapshot};
use glam::{Vec2, Vec3};

use crate::config::StreamConfig;

/// A cell in the area grid. Rows follow the offset y axis, columns the
/// offset x axis; z is ignored for partitioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellCoord {
    pub row: usize,
    pub col: usize,
}

impl CellCoord {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

/// Inclusive rectangle of cells an entity's influence square overlaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRect {
    pub min: CellCoord,
    pub max: CellCoord,
}

impl CellRect {
    /// Number of cells covered.
    pub fn area(&self) -> usize {
        (self.max.row - self.min.row + 1) * (self.max.col - self.min.col + 1)
    }

    pub fn cells(self) -> impl Iterator<Item = CellCoord> {
        let (min, max) = (self.min, self.max);
        (min.row..=max.row)
            .flat_map(move |row| (min.col..=max.col).map(move |col| CellCoord::new(row, col)))
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Placement {
    snapshot: EntitySnapshot,
    footprint: CellRect,
}

/// Fixed-resolution broad-phase index over the bounded world domain.
///
/// Each cell lists every entity whose axis-aligned influence square
/// `[pos - range, pos + range]` overlaps it. The square over-includes
/// compared to the real sphere; the exact distance check belongs to the
/// caller. Only non-empty cells are stored.
#[derive(Debug, Clone, PartialEq)]
pub struct AreaGrid {
    area_size: f32,
    max_coordinate: f32,
    offset: f32,
    cells_per_axis: usize,
    cells: HashMap<CellCoord, Vec<EntitySnapshot>>,
    placements: HashMap<EntityId, Placement>,
}

impl AreaGrid {
    /// Create an empty grid. The config is assumed to be validated.
    pub fn new(config: &StreamConfig) -> Self {
        Self {
            area_size: config.area_size,
            max_coordinate: config.max_coordinate,
            offset: config.coordinate_offset,
            cells_per_axis: config.cells_per_axis(),
            cells: HashMap::new(),
            placements: HashMap::new(),
        }
    }

    /// Shift a raw world position into grid space (x and y only).
    pub fn offset_position(&self, position: Vec3) -> Vec2 {
        Vec2::new(position.x + self.offset, position.y + self.offset)
    }

    fn in_domain(&self, p: Vec2) -> bool {
        // NaN fails every comparison and lands outside.
        p.x >= 0.0 && p.y >= 0.0 && p.x <= self.max_coordinate && p.y <= self.max_coordinate
    }

    fn axis_index(&self, value: f32) -> usize {
        let index = (value / self.area_size).floor().max(0.0) as usize;
        index.min(self.cells_per_axis - 1)
    }

    /// The cell a point falls in, or `None` outside the domain.
    pub fn cell_of(&self, position: Vec3) -> Option<CellCoord> {
        let p = self.offset_position(position);
        if !self.in_domain(p) {
            return None;
        }
        Some(CellCoord::new(self.axis_index(p.y), self.axis_index(p.x)))
    }

    /// Cells an entity would occupy, or `None` when its position lies
    /// outside the domain.
    pub fn footprint(&self, entity: &EntitySnapshot) -> Option<CellRect> {
        let p = self.offset_position(entity.position);
        if !self.in_domain(p) {
            return None;
        }
        let reach = Vec2::splat(entity.range);
        let (lo, hi) = (p - reach, p + reach);
        Some(CellRect {
            min: CellCoord::new(self.axis_index(lo.y), self.axis_index(lo.x)),
            max: CellCoord::new(self.axis_index(hi.y), self.axis_index(hi.x)),
        })
    }

    /// Index an entity in every cell its influence square overlaps.
    ///
    /// Returns the covered rectangle, or `None` if the snapshot was rejected
    /// (malformed or outside the domain), in which case the grid is unchanged.
    /// A snapshot for an id that is already placed replaces the old one.
    pub fn insert(&mut self, entity: EntitySnapshot) -> Option<CellRect> {
        if !entity.is_well_formed() {
            tracing::warn!(
                id = %entity.id,
                position = ?entity.position,
                range = entity.range,
                "rejecting malformed entity snapshot"
            );
            return None;
        }
        let Some(footprint) = self.footprint(&entity) else {
            tracing::debug!(
                id = %entity.id,
                position = ?entity.position,
                "entity outside indexed domain, not placed"
            );
            return None;
        };

        self.remove(entity.id);
        for cell in footprint.cells() {
            self.cells.entry(cell).or_default().push(entity);
        }
        self.placements.insert(
            entity.id,
            Placement {
                snapshot: entity,
                footprint,
            },
        );
        Some(footprint)
    }

    /// Delete an entity from every cell of the footprint it was placed with.
    /// Returns the snapshot it was indexed under.
    pub fn remove(&mut self, id: EntityId) -> Option<EntitySnapshot> {
        let placement = self.placements.remove(&id)?;
        for cell in placement.footprint.cells() {
            if let Entry::Occupied(mut occupied) = self.cells.entry(cell) {
                occupied.get_mut().retain(|e| e.id != id);
                if occupied.get().is_empty() {
                    occupied.remove();
                }
            }
        }
        Some(placement.snapshot)
    }

    /// Drop every cell and index the supplied entities from scratch.
    pub fn rebuild(&mut self, entities: impl IntoIterator<Item = EntitySnapshot>) {
        self.cells.clear();
        self.placements.clear();
        for entity in entities {
            self.insert(entity);
        }
    }

    /// Entities referenced by the single cell containing `position`; empty
    /// outside the domain.
    pub fn cell_at(&self, position: Vec3) -> &[EntitySnapshot] {
        self.cell_of(position)
            .map(|cell| self.entities_in_cell(cell))
            .unwrap_or(&[])
    }

    pub fn entities_in_cell(&self, cell: CellCoord) -> &[EntitySnapshot] {
        self.cells.get(&cell).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.placements.contains_key(&id)
    }

    /// The snapshot an id is currently indexed under.
    pub fn get(&self, id: EntityId) -> Option<&EntitySnapshot> {
        self.placements.get(&id).map(|p| &p.snapshot)
    }

    /// Number of entities currently indexed.
    pub fn indexed_count(&self) -> usize {
        self.placements.len()
    }

    /// Number of non-empty cells.
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Total number of entity placements across all cells.
    pub fn total_placements(&self) -> usize {
        self.cells.values().map(Vec::len).sum()
    }
}
