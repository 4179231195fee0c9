//! Spatial partitioning: the cell grid and the per-frame spatial index.
//!
//! The unit square is divided into `grid_size * grid_size` cells. Each
//! agent belongs to exactly one resident cell (its home, fixed at
//! initialization) and may additionally appear in one visitor list while
//! traveling. The index also keeps per-state entity groups so systems can
//! iterate one state's members without scanning the whole population.

use hecs::{Entity, World};
use serde::{Deserialize, Serialize};

use crate::components::{DiseaseState, Health};

/// Rectangular region of the unit square.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// Clamp a point into the region.
    pub fn clamp(&self, x: f64, y: f64) -> (f64, f64) {
        (
            x.clamp(self.min_x, self.max_x),
            y.clamp(self.min_y, self.max_y),
        )
    }
}

/// Which cell contains the point. Points on the far edge of the unit
/// square land in the last row/column.
pub fn cell_of(grid_size: usize, x: f64, y: f64) -> (usize, usize) {
    let last = grid_size - 1;
    let row = ((y * grid_size as f64) as usize).min(last);
    let col = ((x * grid_size as f64) as usize).min(last);
    (row, col)
}

/// Square grid of per-cell values, indexed by (row, col).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellGrid<T> {
    size: usize,
    cells: Vec<T>,
}

impl<T: Default + Clone> CellGrid<T> {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            cells: vec![T::default(); size * size],
        }
    }
}

impl<T: Clone> CellGrid<T> {
    /// Set every cell to `value`.
    pub fn fill(&mut self, value: T) {
        for cell in &mut self.cells {
            *cell = value.clone();
        }
    }
}

impl<T> CellGrid<T> {
    /// Grid side length in cells.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn get(&self, row: usize, col: usize) -> &T {
        &self.cells[row * self.size + col]
    }

    pub fn get_mut(&mut self, row: usize, col: usize) -> &mut T {
        &mut self.cells[row * self.size + col]
    }

    /// Iterate cells in row-major order with their coordinates.
    pub fn iter(&self) -> impl Iterator<Item = ((usize, usize), &T)> {
        let size = self.size;
        self.cells
            .iter()
            .enumerate()
            .map(move |(i, cell)| ((i / size, i % size), cell))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = ((usize, usize), &mut T)> {
        let size = self.size;
        self.cells
            .iter_mut()
            .enumerate()
            .map(move |(i, cell)| ((i / size, i % size), cell))
    }

    /// World-space rectangle of one cell.
    pub fn cell_bounds(&self, row: usize, col: usize) -> Bounds {
        let cell_size = 1.0 / self.size as f64;
        Bounds::new(
            col as f64 * cell_size,
            row as f64 * cell_size,
            (col + 1) as f64 * cell_size,
            (row + 1) as f64 * cell_size,
        )
    }
}

/// Agent placement and per-state lookup for one frame.
///
/// Resident lists are fixed after initialization (home cells never
/// change; dead agents stay where they fell). Visitor lists are cleared
/// and rebuilt by the movement system each frame; state groups are
/// rebuilt after all mutation for the frame completes.
pub struct SpatialIndex {
    pub residents: CellGrid<Vec<Entity>>,
    pub visitors: CellGrid<Vec<Entity>>,
    pub lockdown: CellGrid<bool>,
    groups: [Vec<Entity>; DiseaseState::COUNT],
}

impl SpatialIndex {
    pub fn new(grid_size: usize) -> Self {
        Self {
            residents: CellGrid::new(grid_size),
            visitors: CellGrid::new(grid_size),
            lockdown: CellGrid::new(grid_size),
            groups: Default::default(),
        }
    }

    /// Entities currently indexed under `state`. Valid until the next
    /// `rebuild_groups`; passes that consume a group must re-check the
    /// live component state, which may have moved on within the frame.
    pub fn group(&self, state: DiseaseState) -> &[Entity] {
        &self.groups[state.index()]
    }

    /// Per-state group sizes, in `DiseaseState` index order.
    pub fn state_counts(&self) -> [usize; DiseaseState::COUNT] {
        let mut counts = [0; DiseaseState::COUNT];
        for (i, group) in self.groups.iter().enumerate() {
            counts[i] = group.len();
        }
        counts
    }

    /// Total number of agents across all resident lists.
    pub fn population(&self) -> usize {
        self.residents.iter().map(|(_, cell)| cell.len()).sum()
    }

    pub fn clear_visitors(&mut self) {
        for (_, cell) in self.visitors.iter_mut() {
            cell.clear();
        }
    }

    /// Rebuild the per-state groups with one scan over all resident
    /// cells. Each agent sits in exactly one resident list, so the scan
    /// touches every agent exactly once.
    pub fn rebuild_groups(&mut self, world: &World) {
        for group in &mut self.groups {
            group.clear();
        }
        for (_, cell) in self.residents.iter() {
            for &entity in cell {
                if let Ok(health) = world.get::<&Health>(entity) {
                    self.groups[health.state.index()].push(entity);
                }
            }
        }
        debug_assert_eq!(
            self.groups.iter().map(Vec::len).sum::<usize>(),
            self.population(),
            "state groups must partition the population"
        );
    }
}
