//! Transition system - contact detection and the disease state machine.
//!
//! Passes run in a fixed order against the previous frame's state groups:
//! exposure, then incubation, removal and waning immunity. Every pass
//! re-checks the live component state before acting, so an agent
//! transitions at most once per frame and its dwell counter advances
//! exactly once per frame.

use hecs::{Entity, World};
use rand::Rng;

use epigrid_logic::mortality;

use crate::components::{DiseaseState, Episode, Health, Mobility, Position, Traits};
use crate::frame::FrameLedger;
use crate::grid::SpatialIndex;
use crate::params::{Derived, Params};

/// Run the full state machine for one frame.
pub fn transition_system(
    world: &mut World,
    index: &SpatialIndex,
    params: &Params,
    derived: &Derived,
    rng: &mut impl Rng,
    ledger: &mut FrameLedger,
) {
    find_exposed(world, index, params, derived, rng, ledger);
    advance_susceptible(world, index);
    advance_exposed(world, index, params, rng);
    advance_infected(world, index, params, derived, rng, ledger);
    advance_immune(world, index, params, DiseaseState::Recovered);
    advance_immune(world, index, params, DiseaseState::Vaccinated);
}

/// Agent gathered into a cell's contact candidate list.
#[derive(Clone, Copy)]
struct Candidate {
    entity: Entity,
    x: f64,
    y: f64,
    complies: bool,
}

/// Contact detection: per cell, a sort-based sweep pairs infected agents
/// with susceptible agents within the contact radius.
///
/// Both candidate lists are sorted by x; a two-pointer window per
/// infected agent bounds the x-distance, and only window members are
/// checked against the squared Euclidean radius. O(n log n) per cell
/// versus O(n^2) for the naive all-pairs scan.
fn find_exposed(
    world: &mut World,
    index: &SpatialIndex,
    params: &Params,
    derived: &Derived,
    rng: &mut impl Rng,
    ledger: &mut FrameLedger,
) {
    let grid_size = index.residents.size();
    let mut susceptible: Vec<Candidate> = Vec::with_capacity(256);
    let mut infected: Vec<Candidate> = Vec::with_capacity(64);

    for row in 0..grid_size {
        for col in 0..grid_size {
            susceptible.clear();
            infected.clear();
            gather_present(
                world,
                index.residents.get(row, col),
                true,
                &mut susceptible,
                &mut infected,
            );
            gather_present(
                world,
                index.visitors.get(row, col),
                false,
                &mut susceptible,
                &mut infected,
            );
            if susceptible.is_empty() || infected.is_empty() {
                continue;
            }

            susceptible.sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal));
            infected.sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal));

            let locked = *index.lockdown.get(row, col);
            sweep_cell(
                world,
                &susceptible,
                &infected,
                locked,
                params,
                derived,
                rng,
                ledger,
            );
        }
    }
}

/// Collect the susceptible and infected agents present in one cell.
/// Residents currently visiting elsewhere or quarantined are excluded;
/// visitors were placed here by the movement system this frame.
fn gather_present(
    world: &World,
    entities: &[Entity],
    check_presence: bool,
    susceptible: &mut Vec<Candidate>,
    infected: &mut Vec<Candidate>,
) {
    for &entity in entities {
        if check_presence {
            let Ok(mobility) = world.get::<&Mobility>(entity).map(|m| *m) else {
                continue;
            };
            if mobility.visiting.is_some() || mobility.quarantined {
                continue;
            }
        }
        let Ok(state) = world.get::<&Health>(entity).map(|h| h.state) else {
            continue;
        };
        let bucket = match state {
            DiseaseState::Susceptible => &mut *susceptible,
            DiseaseState::Infected => &mut *infected,
            _ => continue,
        };
        let Ok(position) = world.get::<&Position>(entity).map(|p| *p) else {
            continue;
        };
        let Ok(complies) = world.get::<&Traits>(entity).map(|t| t.complies) else {
            continue;
        };
        bucket.push(Candidate {
            entity,
            x: position.x,
            y: position.y,
            complies,
        });
    }
}

#[allow(clippy::too_many_arguments)]
fn sweep_cell(
    world: &mut World,
    susceptible: &[Candidate],
    infected: &[Candidate],
    locked: bool,
    params: &Params,
    derived: &Derived,
    rng: &mut impl Rng,
    ledger: &mut FrameLedger,
) {
    let radius = params.contact_radius;
    let mut left = 0;
    let mut right = 0;

    for carrier in infected {
        while right < susceptible.len() && susceptible[right].x <= carrier.x + radius {
            right += 1;
        }
        while left < susceptible.len() && susceptible[left].x < carrier.x - radius {
            left += 1;
        }

        for candidate in &susceptible[left..right] {
            // Lockdown suppresses contacts between compliant agents only.
            if locked && carrier.complies && candidate.complies {
                continue;
            }
            let dx = carrier.x - candidate.x;
            let dy = carrier.y - candidate.y;
            if dx * dx + dy * dy > derived.contact_radius_sq {
                continue;
            }
            // Another carrier may have exposed this candidate earlier in
            // the same frame.
            let still_susceptible = matches!(
                world.get::<&Health>(candidate.entity),
                Ok(h) if h.state == DiseaseState::Susceptible
            );
            if !still_susceptible {
                continue;
            }

            if let Ok(mut episode) = world.get::<&mut Episode>(carrier.entity) {
                episode.contacted += 1;
            }

            let hygiene_applied = params.hygiene_enabled && carrier.complies && candidate.complies;
            let mut transmission = params.infection_rate;
            if hygiene_applied {
                transmission *= params.hygiene_rate;
            }

            if rng.gen::<f64>() < transmission {
                if let Ok(mut health) = world.get::<&mut Health>(candidate.entity) {
                    health.transition(DiseaseState::Exposed);
                }
                if let Ok(mut episode) = world.get::<&mut Episode>(carrier.entity) {
                    episode.infected += 1;
                }
            } else if hygiene_applied {
                ledger.cost += params.hygiene_cost;
            }
        }
    }
}

/// Susceptible agents only age their dwell counter.
fn advance_susceptible(world: &mut World, index: &SpatialIndex) {
    for &entity in index.group(DiseaseState::Susceptible) {
        if let Ok(mut health) = world.get::<&mut Health>(entity) {
            if health.state == DiseaseState::Susceptible {
                health.frames_in_state += 1;
            }
        }
    }
}

/// Exposed agents become infectious after the incubation period; a
/// fraction is placed in quarantine at that moment.
fn advance_exposed(world: &mut World, index: &SpatialIndex, params: &Params, rng: &mut impl Rng) {
    for &entity in index.group(DiseaseState::Exposed) {
        let mut became_infectious = false;
        if let Ok(mut health) = world.get::<&mut Health>(entity) {
            if health.state != DiseaseState::Exposed {
                continue;
            }
            health.frames_in_state += 1;
            if health.frames_in_state >= params.incubation_period {
                health.transition(DiseaseState::Infected);
                became_infectious = true;
            }
        }
        if !became_infectious {
            continue;
        }

        // Fresh infectious episode: the counters feeding the
        // reproduction metrics start over.
        if let Ok(mut episode) = world.get::<&mut Episode>(entity) {
            episode.reset();
        }

        if params.quarantine_enabled && rng.gen::<f64>() < params.quarantine_rate {
            if let Ok(mut mobility) = world.get::<&mut Mobility>(entity) {
                mobility.quarantined = true;
            }
            if let Ok(mut position) = world.get::<&mut Position>(entity) {
                position.x = rng.gen_range(0.0..params.quarantine_size);
                position.y = rng.gen_range(0.0..params.quarantine_size);
            }
        }
    }
}

/// Infected agents are removed after the infection period: the mortality
/// roll uses the hospitalization-adjusted rate weighted by the agent's
/// comorbidity bracket, and the episode counters flow into the ledger.
fn advance_infected(
    world: &mut World,
    index: &SpatialIndex,
    params: &Params,
    derived: &Derived,
    rng: &mut impl Rng,
    ledger: &mut FrameLedger,
) {
    let infected_count = index.group(DiseaseState::Infected).len();
    let hospitalized = infected_count as f64 * params.hospitalization_rate;
    let frame_rate = mortality::effective_mortality_rate(
        params.mortality_rate,
        hospitalized,
        derived.hospital_beds,
        params.mortality_coefficient,
    );

    for &entity in index.group(DiseaseState::Infected) {
        let mut due = false;
        if let Ok(mut health) = world.get::<&mut Health>(entity) {
            if health.state != DiseaseState::Infected {
                continue;
            }
            health.frames_in_state += 1;
            due = health.frames_in_state >= params.infection_period;
        }
        if !due {
            continue;
        }

        let Ok(traits) = world.get::<&Traits>(entity).map(|t| *t) else {
            continue;
        };
        let rate = mortality::bracket_adjusted(
            frame_rate,
            params.comorbidity_coefficients[traits.bracket],
        );
        let dies = rng.gen::<f64>() < rate;

        if let Ok(mut episode) = world.get::<&mut Episode>(entity) {
            ledger.reproductive_sum += u64::from(episode.infected);
            ledger.contact_sum += u64::from(episode.contacted);
            episode.reset();
        }
        ledger.removed += 1;

        if let Ok(mut mobility) = world.get::<&mut Mobility>(entity) {
            mobility.quarantined = false;
        }
        if let Ok(mut health) = world.get::<&mut Health>(entity) {
            health.transition(if dies {
                DiseaseState::Dead
            } else {
                DiseaseState::Recovered
            });
        }
    }
}

/// Recovered and vaccinated immunity wanes back to susceptible.
fn advance_immune(world: &mut World, index: &SpatialIndex, params: &Params, state: DiseaseState) {
    for &entity in index.group(state) {
        if let Ok(mut health) = world.get::<&mut Health>(entity) {
            if health.state != state {
                continue;
            }
            health.frames_in_state += 1;
            if health.frames_in_state >= params.immunity_period {
                health.transition(DiseaseState::Susceptible);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Agent, Home};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn spawn_at(
        world: &mut World,
        index: &mut SpatialIndex,
        x: f64,
        y: f64,
        state: DiseaseState,
        complies: bool,
    ) -> Entity {
        let grid_size = index.residents.size();
        let (row, col) = crate::grid::cell_of(grid_size, x, y);
        let entity = world.spawn((
            Agent,
            Position::new(x, y),
            Home {
                row,
                col,
                anchor_x: x,
                anchor_y: y,
            },
            Health::new(state),
            Traits {
                complies,
                bracket: 0,
            },
            Episode::default(),
            Mobility::default(),
        ));
        index.residents.get_mut(row, col).push(entity);
        entity
    }

    fn run_exposure(
        world: &mut World,
        index: &mut SpatialIndex,
        params: &Params,
        seed: u64,
    ) -> FrameLedger {
        let derived = Derived::new(params);
        index.rebuild_groups(world);
        let mut rng = StdRng::seed_from_u64(seed);
        let mut ledger = FrameLedger::default();
        find_exposed(world, index, params, &derived, &mut rng, &mut ledger);
        ledger
    }

    #[test]
    fn sweep_matches_brute_force() {
        // With certain transmission, the set of newly exposed agents must
        // equal the brute-force set of susceptibles within the radius of
        // any infected agent.
        for seed in 0..5u64 {
            let params = Params {
                grid_size: 1,
                population_size: 200,
                infection_rate: 1.0,
                contact_radius: 0.07,
                ..Params::default()
            };
            let mut world = World::new();
            let mut index = SpatialIndex::new(1);
            let mut rng = StdRng::seed_from_u64(seed);

            let mut positions = Vec::new();
            let mut entities = Vec::new();
            for i in 0..200 {
                let x: f64 = rng.gen();
                let y: f64 = rng.gen();
                let state = if i % 10 == 0 {
                    DiseaseState::Infected
                } else {
                    DiseaseState::Susceptible
                };
                let entity = spawn_at(&mut world, &mut index, x, y, state, false);
                positions.push((x, y, state));
                entities.push(entity);
            }

            let radius_sq = params.contact_radius * params.contact_radius;
            let mut expected: Vec<Entity> = Vec::new();
            for (i, &(sx, sy, s_state)) in positions.iter().enumerate() {
                if s_state != DiseaseState::Susceptible {
                    continue;
                }
                let near_carrier = positions.iter().any(|&(ix, iy, i_state)| {
                    i_state == DiseaseState::Infected
                        && (sx - ix).powi(2) + (sy - iy).powi(2) <= radius_sq
                });
                if near_carrier {
                    expected.push(entities[i]);
                }
            }

            run_exposure(&mut world, &mut index, &params, seed + 100);

            let mut exposed: Vec<Entity> = Vec::new();
            for (entity, health) in world.query::<&Health>().iter() {
                if health.state == DiseaseState::Exposed {
                    exposed.push(entity);
                }
            }
            exposed.sort();
            expected.sort();
            assert_eq!(exposed, expected, "seed {}", seed);
        }
    }

    #[test]
    fn lockdown_suppresses_compliant_pairs_only() {
        let params = Params {
            grid_size: 1,
            infection_rate: 1.0,
            contact_radius: 0.5,
            lockdown_enabled: true,
            ..Params::default()
        };
        let mut world = World::new();
        let mut index = SpatialIndex::new(1);
        *index.lockdown.get_mut(0, 0) = true;

        let compliant = spawn_at(
            &mut world,
            &mut index,
            0.50,
            0.5,
            DiseaseState::Susceptible,
            true,
        );
        let defiant = spawn_at(
            &mut world,
            &mut index,
            0.52,
            0.5,
            DiseaseState::Susceptible,
            false,
        );
        let carrier = spawn_at(&mut world, &mut index, 0.51, 0.5, DiseaseState::Infected, true);

        run_exposure(&mut world, &mut index, &params, 1);

        assert_eq!(
            world.get::<&Health>(compliant).unwrap().state,
            DiseaseState::Susceptible
        );
        assert_eq!(
            world.get::<&Health>(defiant).unwrap().state,
            DiseaseState::Exposed
        );
        // Only the non-compliant contact was recorded
        assert_eq!(world.get::<&Episode>(carrier).unwrap().contacted, 1);
        assert_eq!(world.get::<&Episode>(carrier).unwrap().infected, 1);
    }

    #[test]
    fn hygiene_scales_transmission_and_accrues_prevention_cost() {
        let params = Params {
            grid_size: 1,
            infection_rate: 1.0,
            hygiene_enabled: true,
            hygiene_rate: 0.0, // full prevention between compliant agents
            hygiene_cost: 0.25,
            contact_radius: 0.5,
            ..Params::default()
        };
        let mut world = World::new();
        let mut index = SpatialIndex::new(1);
        let susceptible = spawn_at(
            &mut world,
            &mut index,
            0.50,
            0.5,
            DiseaseState::Susceptible,
            true,
        );
        spawn_at(&mut world, &mut index, 0.51, 0.5, DiseaseState::Infected, true);

        let ledger = run_exposure(&mut world, &mut index, &params, 1);

        assert_eq!(
            world.get::<&Health>(susceptible).unwrap().state,
            DiseaseState::Susceptible
        );
        assert!((ledger.cost - 0.25).abs() < 1e-12);
    }

    #[test]
    fn visiting_residents_are_excluded_from_home_contacts() {
        let params = Params {
            grid_size: 2,
            infection_rate: 1.0,
            contact_radius: 0.5,
            ..Params::default()
        };
        let mut world = World::new();
        let mut index = SpatialIndex::new(2);
        let susceptible = spawn_at(
            &mut world,
            &mut index,
            0.1,
            0.1,
            DiseaseState::Susceptible,
            false,
        );
        let carrier = spawn_at(&mut world, &mut index, 0.12, 0.1, DiseaseState::Infected, false);
        // The carrier is away this frame
        world.get::<&mut Mobility>(carrier).unwrap().visiting = Some((1, 1));
        index.visitors.get_mut(1, 1).push(carrier);

        run_exposure(&mut world, &mut index, &params, 1);

        assert_eq!(
            world.get::<&Health>(susceptible).unwrap().state,
            DiseaseState::Susceptible
        );
    }

    #[test]
    fn incubation_runs_its_course() {
        let params = Params {
            incubation_period: 3,
            quarantine_enabled: false,
            ..Params::default()
        };
        let mut world = World::new();
        let mut index = SpatialIndex::new(1);
        let entity = spawn_at(&mut world, &mut index, 0.5, 0.5, DiseaseState::Exposed, false);
        let mut rng = StdRng::seed_from_u64(1);

        for expected_timer in 1..3 {
            index.rebuild_groups(&world);
            advance_exposed(&mut world, &index, &params, &mut rng);
            let health = world.get::<&Health>(entity).map(|h| *h).unwrap();
            assert_eq!(health.state, DiseaseState::Exposed);
            assert_eq!(health.frames_in_state, expected_timer);
        }

        index.rebuild_groups(&world);
        advance_exposed(&mut world, &index, &params, &mut rng);
        let health = world.get::<&Health>(entity).map(|h| *h).unwrap();
        assert_eq!(health.state, DiseaseState::Infected);
        assert_eq!(health.frames_in_state, 0);
    }

    #[test]
    fn zero_mortality_always_recovers() {
        let params = Params {
            infection_period: 1,
            mortality_rate: 0.0,
            ..Params::default()
        };
        let derived = Derived::new(&params);
        let mut world = World::new();
        let mut index = SpatialIndex::new(1);
        let entity = spawn_at(&mut world, &mut index, 0.5, 0.5, DiseaseState::Infected, false);
        index.rebuild_groups(&world);

        let mut rng = StdRng::seed_from_u64(1);
        let mut ledger = FrameLedger::default();
        advance_infected(&mut world, &index, &params, &derived, &mut rng, &mut ledger);

        assert_eq!(
            world.get::<&Health>(entity).unwrap().state,
            DiseaseState::Recovered
        );
        assert_eq!(ledger.removed, 1);
    }

    #[test]
    fn certain_mortality_kills_and_feeds_the_ledger() {
        let mut params = Params {
            infection_period: 1,
            mortality_rate: 1.0,
            hospitalization_rate: 0.0,
            ..Params::default()
        };
        params.comorbidity_coefficients = vec![1.0; params.age_distribution.len()];
        let derived = Derived::new(&params);
        let mut world = World::new();
        let mut index = SpatialIndex::new(1);
        let entity = spawn_at(&mut world, &mut index, 0.5, 0.5, DiseaseState::Infected, false);
        {
            let mut episode = world.get::<&mut Episode>(entity).unwrap();
            episode.infected = 4;
            episode.contacted = 9;
        }
        index.rebuild_groups(&world);

        let mut rng = StdRng::seed_from_u64(1);
        let mut ledger = FrameLedger::default();
        advance_infected(&mut world, &index, &params, &derived, &mut rng, &mut ledger);

        assert_eq!(world.get::<&Health>(entity).unwrap().state, DiseaseState::Dead);
        assert_eq!(ledger.reproductive_sum, 4);
        assert_eq!(ledger.contact_sum, 9);
        assert_eq!(ledger.removed, 1);
        // Counters were folded in and reset
        assert_eq!(world.get::<&Episode>(entity).unwrap().infected, 0);
    }

    #[test]
    fn immunity_wanes_back_to_susceptible() {
        let params = Params {
            immunity_period: 2,
            ..Params::default()
        };
        let mut world = World::new();
        let mut index = SpatialIndex::new(1);
        let recovered = spawn_at(&mut world, &mut index, 0.4, 0.4, DiseaseState::Recovered, false);
        let vaccinated = spawn_at(
            &mut world,
            &mut index,
            0.6,
            0.6,
            DiseaseState::Vaccinated,
            false,
        );

        for _ in 0..2 {
            index.rebuild_groups(&world);
            advance_immune(&mut world, &index, &params, DiseaseState::Recovered);
            advance_immune(&mut world, &index, &params, DiseaseState::Vaccinated);
        }

        assert_eq!(
            world.get::<&Health>(recovered).unwrap().state,
            DiseaseState::Susceptible
        );
        assert_eq!(
            world.get::<&Health>(vaccinated).unwrap().state,
            DiseaseState::Susceptible
        );
    }
}
