//! Intervention systems - vaccination, lockdown and hospitalization cost.

use hecs::World;
use rand::Rng;

use epigrid_logic::schedule::LockdownStrategy;

use crate::components::{DiseaseState, Health};
use crate::frame::FrameLedger;
use crate::grid::SpatialIndex;
use crate::params::Params;

/// Vaccinate a random fraction of the susceptible population each frame
/// once the campaign has started. Each dose moves the agent straight to
/// the vaccinated state and charges the per-dose cost.
pub fn vaccination_system(
    world: &mut World,
    index: &SpatialIndex,
    params: &Params,
    frame_number: u32,
    rng: &mut impl Rng,
    ledger: &mut FrameLedger,
) {
    if !params.vaccination_enabled || frame_number < params.vaccination_start {
        return;
    }

    for &entity in index.group(DiseaseState::Susceptible) {
        if let Ok(mut health) = world.get::<&mut Health>(entity) {
            if health.state != DiseaseState::Susceptible {
                continue;
            }
            if rng.gen::<f64>() < params.vaccination_rate {
                health.transition(DiseaseState::Vaccinated);
                ledger.cost += params.vaccination_cost;
            }
        }
    }
}

/// Recompute the per-cell lockdown flags for this frame and charge the
/// economic cost of every locked cell.
///
/// The local strategy locks a cell while the infected share of its
/// residents reaches the trigger level; global strategies follow a
/// frame-number schedule and lock every cell at once.
pub fn lockdown_system(
    world: &World,
    index: &mut SpatialIndex,
    params: &Params,
    frame_number: u32,
    ledger: &mut FrameLedger,
) {
    if !params.lockdown_enabled {
        index.lockdown.fill(false);
        return;
    }

    match params.lockdown_strategy.global_lockdown_active(frame_number) {
        Some(active) => {
            index.lockdown.fill(active);
        }
        None => {
            let grid_size = index.residents.size();
            for row in 0..grid_size {
                for col in 0..grid_size {
                    let residents = index.residents.get(row, col);
                    let locked = if residents.is_empty() {
                        false
                    } else {
                        let infected = residents
                            .iter()
                            .filter(|&&entity| {
                                matches!(
                                    world.get::<&Health>(entity),
                                    Ok(h) if h.state == DiseaseState::Infected
                                )
                            })
                            .count();
                        infected as f64 / residents.len() as f64 >= params.lockdown_level
                    };
                    *index.lockdown.get_mut(row, col) = locked;
                }
            }
        }
    }

    // Dead residents incur no cost; living residents are charged at
    // their home cell even while visiting elsewhere.
    for ((row, col), &flag) in index.lockdown.iter() {
        if flag {
            let living = index
                .residents
                .get(row, col)
                .iter()
                .filter(|&&entity| {
                    matches!(
                        world.get::<&Health>(entity),
                        Ok(h) if h.state != DiseaseState::Dead
                    )
                })
                .count();
            ledger.cost += living as f64 * params.lockdown_cost * params.rule_compliance_rate;
        }
    }
}

/// Charge the care cost of the agents occupying hospital beds this frame.
pub fn accrue_hospitalization_cost(
    index: &SpatialIndex,
    params: &Params,
    ledger: &mut FrameLedger,
) {
    let infected = index.group(DiseaseState::Infected).len() as f64;
    ledger.cost += infected * params.hospitalization_rate * params.hospitalization_cost;
}
