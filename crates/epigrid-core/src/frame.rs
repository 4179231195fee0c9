//! Immutable per-frame snapshots handed to external consumers.
//!
//! A `Frame` owns plain copies of everything rendering and charting
//! collaborators need; it never holds `Entity` handles, so it stays valid
//! after the engine mutates the world for the next frame.

use hecs::World;
use serde::{Deserialize, Serialize};

use crate::components::{DiseaseState, Health, Position};
use crate::grid::{CellGrid, SpatialIndex};

/// One agent as seen by a renderer: position and state only.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AgentView {
    pub x: f64,
    pub y: f64,
    pub state: DiseaseState,
}

/// Scalar aggregates derived for one frame.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct FrameMetrics {
    /// Mean secondary infections per agent removed this frame.
    pub reproduction_number: f64,
    /// Mean recorded contacts per agent removed this frame.
    pub average_contacts: f64,
    /// Fraction of hospital beds in use.
    pub hospital_occupancy: f64,
    /// Estimated infected-count doubling time in frames.
    pub doubling_time: f64,
    /// Intervention cost accrued this frame.
    pub cost_this_frame: f64,
    /// Running intervention cost for the whole run so far.
    pub total_cost: f64,
}

/// Accumulators filled by the systems while one frame is computed, then
/// folded into [`FrameMetrics`] by the driver.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameLedger {
    /// Sum of `Episode::infected` over agents removed this frame.
    pub reproductive_sum: u64,
    /// Sum of `Episode::contacted` over agents removed this frame.
    pub contact_sum: u64,
    /// Agents that left the infected state this frame.
    pub removed: u64,
    /// Intervention cost accrued this frame.
    pub cost: f64,
}

/// One discrete time step of the whole population.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    /// Frame number; 0 is the initial state before any transitions.
    pub number: u32,
    /// Agents by home cell (includes agents currently visiting
    /// elsewhere, drawn at their away position).
    pub residents: CellGrid<Vec<AgentView>>,
    /// Agents temporarily present in each cell due to travel.
    pub visitors: CellGrid<Vec<AgentView>>,
    /// Per-cell lockdown flags.
    pub lockdown: CellGrid<bool>,
    /// Per-state population counts, in `DiseaseState` index order.
    pub state_counts: [usize; DiseaseState::COUNT],
    pub metrics: FrameMetrics,
}

impl Frame {
    /// Copy the current world and index into an owned snapshot. Called
    /// after all mutation for the frame has completed.
    pub fn snapshot(
        number: u32,
        world: &World,
        index: &SpatialIndex,
        metrics: FrameMetrics,
    ) -> Self {
        let residents = view_grid(world, &index.residents);
        let visitors = view_grid(world, &index.visitors);
        Self {
            number,
            residents,
            visitors,
            lockdown: index.lockdown.clone(),
            state_counts: index.state_counts(),
            metrics,
        }
    }

    /// Number of agents in `state` this frame.
    pub fn count(&self, state: DiseaseState) -> usize {
        self.state_counts[state.index()]
    }

    /// Total population covered by the snapshot.
    pub fn population(&self) -> usize {
        self.state_counts.iter().sum()
    }
}

fn view_grid(world: &World, cells: &CellGrid<Vec<hecs::Entity>>) -> CellGrid<Vec<AgentView>> {
    let mut views: CellGrid<Vec<AgentView>> = CellGrid::new(cells.size());
    for ((row, col), cell) in cells.iter() {
        let out = views.get_mut(row, col);
        out.reserve(cell.len());
        for &entity in cell {
            let (Ok(position), Ok(health)) = (
                world.get::<&Position>(entity),
                world.get::<&Health>(entity),
            ) else {
                continue;
            };
            out.push(AgentView {
                x: position.x,
                y: position.y,
                state: health.state,
            });
        }
    }
    views
}
