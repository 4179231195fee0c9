//! Movement system - computes each live agent's position for the frame.
//!
//! Agents either travel to another cell (drawn from their home cell's
//! cumulative destination table) or jitter around their home anchor,
//! clamped to the home cell. Quarantined agents are confined to the
//! quarantine region and never travel. Dead agents are skipped entirely.

use hecs::World;
use rand::Rng;

use crate::components::{DiseaseState, Health, Home, Mobility, Position, Traits};
use crate::frame::FrameLedger;
use crate::grid::{Bounds, SpatialIndex};
use crate::params::{Derived, Params};

/// Bounded destination re-rolls for compliant agents under travel
/// restrictions. Keeps the frame O(population) when every cell is locked.
pub const MAX_TRAVEL_REROLLS: usize = 8;

/// Update every agent's position and rebuild the visitor lists.
pub fn movement_system(
    world: &mut World,
    index: &mut SpatialIndex,
    params: &Params,
    derived: &Derived,
    rng: &mut impl Rng,
    ledger: &mut FrameLedger,
) {
    index.clear_visitors();
    let grid_size = index.residents.size();

    for row in 0..grid_size {
        for col in 0..grid_size {
            for slot in 0..index.residents.get(row, col).len() {
                let entity = index.residents.get(row, col)[slot];

                let Ok(state) = world.get::<&Health>(entity).map(|h| h.state) else {
                    continue;
                };
                if state == DiseaseState::Dead {
                    continue;
                }
                let Ok(complies) = world.get::<&Traits>(entity).map(|t| t.complies) else {
                    continue;
                };
                let Ok(quarantined) = world.get::<&Mobility>(entity).map(|m| m.quarantined)
                else {
                    continue;
                };

                let mut step = params.max_movement;
                if params.distancing_enabled && complies {
                    step *= params.distancing_factor;
                }

                // Travel decision; quarantined agents stay put.
                let mut destination = None;
                if !quarantined && rng.gen::<f64>() < params.travel_rate {
                    let table = derived.travel_cumulative.get(row, col);
                    if params.travel_restrictions_enabled && complies {
                        for _ in 0..MAX_TRAVEL_REROLLS {
                            let (dest_row, dest_col) = draw_destination(table, grid_size, rng);
                            if !*index.lockdown.get(dest_row, dest_col) {
                                destination = Some((dest_row, dest_col));
                                break;
                            }
                        }
                        if destination.is_none() {
                            ledger.cost += params.travel_restriction_cost;
                        }
                    } else {
                        destination = Some(draw_destination(table, grid_size, rng));
                    }
                }

                match destination {
                    Some((dest_row, dest_col)) => {
                        let bounds = index.residents.cell_bounds(dest_row, dest_col);
                        let x = rng.gen_range(bounds.min_x..bounds.max_x);
                        let y = rng.gen_range(bounds.min_y..bounds.max_y);
                        set_position(world, entity, x, y);
                        set_visiting(world, entity, Some((dest_row, dest_col)));
                        index.visitors.get_mut(dest_row, dest_col).push(entity);
                    }
                    None => {
                        set_visiting(world, entity, None);
                        if quarantined {
                            let region = Bounds::new(
                                0.0,
                                0.0,
                                params.quarantine_size,
                                params.quarantine_size,
                            );
                            let Ok(current) =
                                world.get::<&Position>(entity).map(|p| (p.x, p.y))
                            else {
                                continue;
                            };
                            let (x, y) = region.clamp(
                                current.0 + jitter(rng, step),
                                current.1 + jitter(rng, step),
                            );
                            set_position(world, entity, x, y);
                        } else {
                            let Ok(home) = world.get::<&Home>(entity).map(|h| *h) else {
                                continue;
                            };
                            let bounds = index.residents.cell_bounds(home.row, home.col);
                            let (x, y) = bounds.clamp(
                                home.anchor_x + jitter(rng, step),
                                home.anchor_y + jitter(rng, step),
                            );
                            set_position(world, entity, x, y);
                        }
                    }
                }
            }
        }
    }
}

/// Uniform jitter in `[-max, max)`; 0 when movement is fully suppressed.
fn jitter(rng: &mut impl Rng, max: f64) -> f64 {
    if max > 0.0 {
        rng.gen_range(-max..max)
    } else {
        0.0
    }
}

/// Draw a destination cell from a cumulative probability table.
fn draw_destination(table: &[f64], grid_size: usize, rng: &mut impl Rng) -> (usize, usize) {
    let roll = rng.gen::<f64>();
    let flat = table
        .iter()
        .position(|&threshold| roll < threshold)
        .unwrap_or(table.len() - 1);
    (flat / grid_size, flat % grid_size)
}

fn set_position(world: &mut World, entity: hecs::Entity, x: f64, y: f64) {
    if let Ok(mut position) = world.get::<&mut Position>(entity) {
        position.x = x;
        position.y = y;
    }
}

fn set_visiting(world: &mut World, entity: hecs::Entity, visiting: Option<(usize, usize)>) {
    if let Ok(mut mobility) = world.get::<&mut Mobility>(entity) {
        mobility.visiting = visiting;
    }
}
