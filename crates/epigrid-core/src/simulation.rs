//! Simulation driver - owns the world, the spatial index and the RNG,
//! and yields one frame snapshot per step.

use hecs::World;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use epigrid_logic::metrics;

use crate::components::{Agent, DiseaseState, Episode, Health, Home, Mobility, Position, Traits};
use crate::frame::{Frame, FrameLedger, FrameMetrics};
use crate::grid::{cell_of, SpatialIndex};
use crate::params::{Derived, Params, ParamsError};
use crate::systems::{
    accrue_hospitalization_cost, lockdown_system, movement_system, transition_system,
    vaccination_system,
};

/// A complete simulation run.
///
/// `Simulation` is an iterator over [`Frame`] snapshots: frame 0 is the
/// initial state before any system has run, and each call to `next`
/// afterwards advances the world by one frame. A run yields exactly
/// `simulation_length + 1` frames. All randomness flows from the single
/// seeded RNG owned here, so two runs with the same parameters and seed
/// produce identical frame sequences.
pub struct Simulation {
    params: Params,
    derived: Derived,
    world: World,
    index: SpatialIndex,
    rng: StdRng,
    seed: u64,
    next_frame: u32,
    total_cost: f64,
    // Infected count per completed frame, for the doubling-time window.
    infected_history: Vec<usize>,
}

impl Simulation {
    /// Create a run seeded from OS entropy.
    pub fn new(params: Params) -> Result<Self, ParamsError> {
        let seed = rand::thread_rng().gen();
        Self::with_seed(params, seed)
    }

    /// Create a run with an explicit seed for reproducibility.
    pub fn with_seed(params: Params, seed: u64) -> Result<Self, ParamsError> {
        params.validate()?;
        let derived = Derived::new(&params);
        let mut world = World::new();
        let mut index = SpatialIndex::new(params.grid_size);
        let mut rng = StdRng::seed_from_u64(seed);

        spawn_population(&mut world, &mut index, &params, &derived, &mut rng);
        index.rebuild_groups(&world);

        let infected = index.state_counts()[DiseaseState::Infected.index()];
        log::info!(
            "simulation initialized: {} agents, {}x{} grid, {} infected, seed {}",
            params.population_size,
            params.grid_size,
            params.grid_size,
            infected,
            seed
        );

        Ok(Self {
            params,
            derived,
            world,
            index,
            rng,
            seed,
            next_frame: 0,
            total_cost: 0.0,
            infected_history: vec![infected],
        })
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Intervention cost accumulated over all frames stepped so far.
    pub fn total_cost(&self) -> f64 {
        self.total_cost
    }

    /// Advance the world by one frame and snapshot the result.
    fn step(&mut self, number: u32) -> Frame {
        let mut ledger = FrameLedger::default();

        movement_system(
            &mut self.world,
            &mut self.index,
            &self.params,
            &self.derived,
            &mut self.rng,
            &mut ledger,
        );
        lockdown_system(
            &self.world,
            &mut self.index,
            &self.params,
            number,
            &mut ledger,
        );
        vaccination_system(
            &mut self.world,
            &self.index,
            &self.params,
            number,
            &mut self.rng,
            &mut ledger,
        );
        accrue_hospitalization_cost(&self.index, &self.params, &mut ledger);
        transition_system(
            &mut self.world,
            &self.index,
            &self.params,
            &self.derived,
            &mut self.rng,
            &mut ledger,
        );

        self.index.rebuild_groups(&self.world);

        self.total_cost += ledger.cost;

        // The history holds counts for frames 0..number, so the count
        // `doubling_window` frames back sits at `len - doubling_window`.
        let infected = self.index.state_counts()[DiseaseState::Infected.index()];
        let doubling_time = if self.infected_history.len() >= self.params.doubling_window {
            let past =
                self.infected_history[self.infected_history.len() - self.params.doubling_window];
            metrics::doubling_time(past, infected, self.params.doubling_window)
        } else {
            0.0
        };
        self.infected_history.push(infected);

        let frame_metrics = FrameMetrics {
            reproduction_number: metrics::reproduction_number(
                ledger.reproductive_sum,
                ledger.removed,
            ),
            average_contacts: metrics::average_contacts(ledger.contact_sum, ledger.removed),
            hospital_occupancy: metrics::hospital_occupancy(
                infected,
                self.params.hospitalization_rate,
                self.params.hospital_capacity,
                self.params.population_size,
            ),
            doubling_time,
            cost_this_frame: ledger.cost,
            total_cost: self.total_cost,
        };

        Frame::snapshot(number, &self.world, &self.index, frame_metrics)
    }
}

impl Iterator for Simulation {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        if self.next_frame > self.params.simulation_length {
            return None;
        }
        let number = self.next_frame;
        self.next_frame += 1;

        if number == 0 {
            return Some(Frame::snapshot(
                0,
                &self.world,
                &self.index,
                FrameMetrics::default(),
            ));
        }
        Some(self.step(number))
    }
}

/// Scatter the population uniformly over the unit square. The first
/// `initial_infected` agents spawn already infectious; everyone else
/// starts susceptible.
fn spawn_population(
    world: &mut World,
    index: &mut SpatialIndex,
    params: &Params,
    derived: &Derived,
    rng: &mut impl Rng,
) {
    for i in 0..params.population_size {
        let x: f64 = rng.gen();
        let y: f64 = rng.gen();
        let (row, col) = cell_of(params.grid_size, x, y);

        let state = if i < params.initial_infected {
            DiseaseState::Infected
        } else {
            DiseaseState::Susceptible
        };
        let complies = rng.gen::<f64>() < params.rule_compliance_rate;
        let bracket = draw_bracket(&derived.age_cumulative, rng);

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
            Traits { complies, bracket },
            Episode::default(),
            Mobility::default(),
        ));
        index.residents.get_mut(row, col).push(entity);
    }
}

/// Draw an age bracket index from a cumulative distribution table.
fn draw_bracket(cumulative: &[f64], rng: &mut impl Rng) -> usize {
    let roll: f64 = rng.gen();
    cumulative
        .iter()
        .position(|&bound| roll < bound)
        .unwrap_or(cumulative.len().saturating_sub(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use epigrid_logic::schedule::LockdownStrategy;

    fn small_params() -> Params {
        Params {
            population_size: 150,
            simulation_length: 12,
            grid_size: 3,
            initial_infected: 3,
            ..Params::default()
        }
    }

    #[test]
    fn run_yields_length_plus_one_frames() {
        let sim = Simulation::with_seed(small_params(), 7).unwrap();
        let frames: Vec<Frame> = sim.collect();
        assert_eq!(frames.len(), 13);
        assert_eq!(frames[0].number, 0);
        assert_eq!(frames[12].number, 12);
    }

    #[test]
    fn initial_frame_matches_spawn_counts() {
        let params = small_params();
        let mut sim = Simulation::with_seed(params, 7).unwrap();
        let first = sim.next().unwrap();
        assert_eq!(first.count(DiseaseState::Infected), 3);
        assert_eq!(first.count(DiseaseState::Susceptible), 147);
        assert_eq!(first.metrics.total_cost, 0.0);
    }

    #[test]
    fn population_is_conserved_every_frame() {
        let sim = Simulation::with_seed(small_params(), 11).unwrap();
        for frame in sim {
            assert_eq!(frame.population(), 150, "frame {}", frame.number);
        }
    }

    #[test]
    fn identical_seeds_produce_identical_runs() {
        let a = Simulation::with_seed(small_params(), 99).unwrap();
        let b = Simulation::with_seed(small_params(), 99).unwrap();
        for (fa, fb) in a.zip(b) {
            let bytes_a = bincode::serialize(&fa).unwrap();
            let bytes_b = bincode::serialize(&fb).unwrap();
            assert_eq!(bytes_a, bytes_b, "frame {}", fa.number);
        }
    }

    #[test]
    fn different_seeds_diverge() {
        let a: Vec<Frame> = Simulation::with_seed(small_params(), 1).unwrap().collect();
        let b: Vec<Frame> = Simulation::with_seed(small_params(), 2).unwrap().collect();
        let diverged = a
            .iter()
            .zip(&b)
            .any(|(fa, fb)| fa.state_counts != fb.state_counts);
        assert!(diverged);
    }

    #[test]
    fn full_contact_outbreak_burns_out() {
        // Everyone in one cell within contact range, certain transmission,
        // one-frame incubation and infection, no deaths, no waning: the
        // whole population must be recovered within a few frames.
        let params = Params {
            population_size: 100,
            simulation_length: 10,
            grid_size: 1,
            initial_infected: 1,
            contact_radius: 2.0,
            infection_rate: 1.0,
            incubation_period: 1,
            infection_period: 1,
            immunity_period: 100,
            mortality_rate: 0.0,
            travel_rate: 0.0,
            max_movement: 0.0,
            ..Params::default()
        };
        let frames: Vec<Frame> = Simulation::with_seed(params, 5).unwrap().collect();
        let last = frames.last().unwrap();
        assert_eq!(last.count(DiseaseState::Recovered), 100);
        assert_eq!(last.count(DiseaseState::Dead), 0);

        let all_recovered_by = frames
            .iter()
            .find(|f| f.count(DiseaseState::Recovered) == 100)
            .map(|f| f.number)
            .unwrap();
        assert!(all_recovered_by <= 5, "burned out at frame {}", all_recovered_by);
    }

    #[test]
    fn doubling_time_reads_the_window_start() {
        // Whatever epidemic curve the run produces, every frame's
        // doubling time must equal the pure formula applied to the
        // infected counts exactly `doubling_window` frames apart.
        let params = Params {
            population_size: 200,
            simulation_length: 15,
            grid_size: 2,
            initial_infected: 2,
            contact_radius: 0.25,
            infection_rate: 1.0,
            incubation_period: 1,
            doubling_window: 3,
            ..Params::default()
        };
        let frames: Vec<Frame> = Simulation::with_seed(params, 9).unwrap().collect();
        let counts: Vec<usize> = frames
            .iter()
            .map(|f| f.count(DiseaseState::Infected))
            .collect();

        let mut saw_growth = false;
        for (n, frame) in frames.iter().enumerate() {
            let expected = if n >= 3 {
                metrics::doubling_time(counts[n - 3], counts[n], 3)
            } else {
                0.0
            };
            assert!(
                (frame.metrics.doubling_time - expected).abs() < 1e-12,
                "frame {}: got {}, expected {}",
                n,
                frame.metrics.doubling_time,
                expected
            );
            if expected > 0.0 {
                saw_growth = true;
            }
        }
        assert!(saw_growth, "infected counts: {:?}", counts);
    }

    #[test]
    fn reproduction_metrics_are_per_frame() {
        // Single crowded cell, certain transmission, one-frame periods:
        // the initial carrier is removed at frame 1 having infected the
        // other 99 agents, and after the outbreak burns out the
        // removal-free frames must report 0, not a running mean.
        let params = Params {
            population_size: 100,
            simulation_length: 10,
            grid_size: 1,
            initial_infected: 1,
            contact_radius: 2.0,
            infection_rate: 1.0,
            incubation_period: 1,
            infection_period: 1,
            immunity_period: 100,
            mortality_rate: 0.0,
            travel_rate: 0.0,
            max_movement: 0.0,
            ..Params::default()
        };
        let frames: Vec<Frame> = Simulation::with_seed(params, 5).unwrap().collect();

        assert_eq!(frames[1].metrics.reproduction_number, 99.0);
        assert_eq!(frames[1].metrics.average_contacts, 99.0);

        for frame in frames.iter().filter(|f| f.number >= 4) {
            assert_eq!(
                frame.metrics.reproduction_number, 0.0,
                "frame {}",
                frame.number
            );
            assert_eq!(frame.metrics.average_contacts, 0.0, "frame {}", frame.number);
        }
    }

    #[test]
    fn global_lockdown_cost_matches_closed_form() {
        // A permanent global lockdown with no disease costs exactly
        // frames x population x lockdown_cost x compliance.
        let params = Params {
            population_size: 40,
            simulation_length: 6,
            grid_size: 2,
            initial_infected: 0,
            lockdown_enabled: true,
            lockdown_cost: 2.0,
            rule_compliance_rate: 0.5,
            lockdown_strategy: LockdownStrategy::Window { start: 0, end: 1000 },
            vaccination_enabled: false,
            hygiene_enabled: false,
            quarantine_enabled: false,
            hospitalization_rate: 0.0,
            ..Params::default()
        };
        let last = Simulation::with_seed(params, 3).unwrap().last().unwrap();
        let expected = 6.0 * 40.0 * 2.0 * 0.5;
        assert!(
            (last.metrics.total_cost - expected).abs() < 1e-9,
            "total cost {}",
            last.metrics.total_cost
        );
    }

    #[test]
    fn state_machine_stays_legal_across_a_run() {
        // Legal transitions only: S->{E,V}, E->I, I->{R,D}, {R,V}->S,
        // D is terminal. Checked per-agent against consecutive frames by
        // tracking aggregate invariants: dead count never decreases and
        // exposed agents only come from the susceptible pool.
        let params = Params {
            population_size: 300,
            simulation_length: 40,
            grid_size: 4,
            initial_infected: 10,
            mortality_rate: 0.5,
            vaccination_enabled: true,
            vaccination_rate: 0.05,
            quarantine_enabled: true,
            ..Params::default()
        };
        let frames: Vec<Frame> = Simulation::with_seed(params, 21).unwrap().collect();
        for pair in frames.windows(2) {
            let prev = &pair[0];
            let cur = &pair[1];
            assert!(cur.count(DiseaseState::Dead) >= prev.count(DiseaseState::Dead));
            // New exposures cannot exceed the susceptibles available.
            let new_exposed = cur
                .count(DiseaseState::Exposed)
                .saturating_sub(prev.count(DiseaseState::Exposed) + prev.count(DiseaseState::Infected));
            assert!(new_exposed <= prev.count(DiseaseState::Susceptible));
        }
    }

    #[test]
    fn total_cost_tracks_frame_metrics() {
        let params = Params {
            population_size: 50,
            simulation_length: 5,
            grid_size: 2,
            lockdown_enabled: true,
            lockdown_strategy: LockdownStrategy::Window { start: 0, end: 1000 },
            ..Params::default()
        };
        let mut sim = Simulation::with_seed(params, 31).unwrap();
        let mut last_metric = 0.0;
        for frame in &mut sim {
            last_metric = frame.metrics.total_cost;
        }
        assert!(last_metric > 0.0);
        assert_eq!(sim.total_cost(), last_metric);
    }

    #[test]
    fn invalid_params_are_rejected() {
        let params = Params {
            population_size: 0,
            ..Params::default()
        };
        assert!(Simulation::with_seed(params, 1).is_err());
    }
}
