//! Epigrid Headless Simulation Harness
//!
//! Validates the simulation engine end to end without any frontend.
//! Runs entirely in-process. No rendering, no persistence service.
//!
//! Usage:
//!   cargo run -p epigrid-simtest
//!   cargo run -p epigrid-simtest -- --verbose

use epigrid_core::prelude::*;
use epigrid_core::report::{ReportError, RunReport, REPORT_VERSION};
use epigrid_logic::{metrics, mortality};
use serde::Deserialize;

use log4rs::append::console::ConsoleAppender;
use log4rs::config::{Appender, Root};
use log4rs::encode::pattern::PatternEncoder;
use log4rs::Config;

// ── Scenario manifest (partial parameter overrides per scenario) ────────
const SCENARIOS_JSON: &str = include_str!("../../../data/scenarios.json");

#[derive(Debug, Deserialize)]
struct Scenario {
    name: String,
    seed: u64,
    params: serde_json::Value,
}

// ── Test harness ────────────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

fn main() {
    let verbose = std::env::args().any(|a| a == "--verbose");
    init_logging(verbose);
    println!("=== Epigrid Simulation Harness ===\n");

    let mut results = Vec::new();

    // 1. Scenario manifest validation
    let scenarios = load_scenarios(&mut results);

    // 2. Scenario sweep: every scenario runs to completion cleanly
    results.extend(validate_scenarios(&scenarios, verbose));

    // 3. Determinism
    results.extend(validate_determinism());

    // 4. Epidemic dynamics
    results.extend(validate_dynamics(verbose));

    // 5. Interventions
    results.extend(validate_interventions());

    // 6. Metric formulas
    results.extend(validate_metrics());

    // 7. Report persistence
    results.extend(validate_reports());

    // ── Summary ──
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.iter().filter(|r| !r.passed).count();
    let total = results.len();

    for r in &results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    println!(
        "\n=== RESULT: {}/{} passed, {} failed ===",
        passed, total, failed
    );

    if failed > 0 {
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let encoder = PatternEncoder::new("{d(%Y-%m-%dT%H:%M:%SZ)} {h({l})} {t} - {m}{n}");
    let stdout = ConsoleAppender::builder().encoder(Box::new(encoder)).build();
    let level = if verbose {
        log::LevelFilter::Info
    } else {
        log::LevelFilter::Warn
    };
    let config = Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .build(Root::builder().appender("stdout").build(level));
    if let Ok(config) = config {
        // A second init in the same process is harmless here.
        let _ = log4rs::init_config(config);
    }
}

// ── 1. Scenario Manifest ────────────────────────────────────────────────

fn load_scenarios(results: &mut Vec<TestResult>) -> Vec<(Scenario, Params)> {
    println!("--- Scenario Manifest ---");

    let scenarios: Vec<Scenario> = match serde_json::from_str(SCENARIOS_JSON) {
        Ok(s) => s,
        Err(e) => {
            results.push(TestResult {
                name: "scenarios_parse".into(),
                passed: false,
                detail: format!("JSON parse error: {}", e),
            });
            return Vec::new();
        }
    };

    results.push(TestResult {
        name: "scenarios_not_empty".into(),
        passed: scenarios.len() >= 3,
        detail: format!("{} scenarios loaded", scenarios.len()),
    });

    let mut resolved = Vec::new();
    for scenario in scenarios {
        match serde_json::from_value::<Params>(scenario.params.clone()) {
            Ok(params) => {
                let valid = params.validate().is_ok();
                results.push(TestResult {
                    name: format!("scenario_{}_params", scenario.name),
                    passed: valid,
                    detail: if valid {
                        format!(
                            "pop={} frames={} grid={}",
                            params.population_size, params.simulation_length, params.grid_size
                        )
                    } else {
                        "parameter validation failed".into()
                    },
                });
                if valid {
                    resolved.push((scenario, params));
                }
            }
            Err(e) => {
                results.push(TestResult {
                    name: format!("scenario_{}_params", scenario.name),
                    passed: false,
                    detail: format!("override parse error: {}", e),
                });
            }
        }
    }
    resolved
}

// ── 2. Scenario Sweep ───────────────────────────────────────────────────

fn validate_scenarios(scenarios: &[(Scenario, Params)], verbose: bool) -> Vec<TestResult> {
    println!("--- Scenario Sweep ---");
    let mut results = Vec::new();

    for (scenario, params) in scenarios {
        let population = params.population_size;
        let expected_frames = params.simulation_length as usize + 1;

        let sim = match Simulation::with_seed(params.clone(), scenario.seed) {
            Ok(sim) => sim,
            Err(e) => {
                results.push(TestResult {
                    name: format!("scenario_{}_run", scenario.name),
                    passed: false,
                    detail: format!("setup failed: {}", e),
                });
                continue;
            }
        };

        let mut frames = 0usize;
        let mut conserved = true;
        let mut dead_monotonic = true;
        let mut cost_monotonic = true;
        let mut prev_dead = 0usize;
        let mut prev_cost = 0.0;
        let mut peak_infected = 0usize;
        let mut final_cost = 0.0;

        for frame in sim {
            frames += 1;
            if frame.population() != population {
                conserved = false;
            }
            let dead = frame.count(DiseaseState::Dead);
            if dead < prev_dead {
                dead_monotonic = false;
            }
            prev_dead = dead;
            if frame.metrics.total_cost < prev_cost {
                cost_monotonic = false;
            }
            prev_cost = frame.metrics.total_cost;
            peak_infected = peak_infected.max(frame.count(DiseaseState::Infected));
            final_cost = frame.metrics.total_cost;
        }

        let passed = frames == expected_frames && conserved && dead_monotonic && cost_monotonic;
        results.push(TestResult {
            name: format!("scenario_{}_run", scenario.name),
            passed,
            detail: format!(
                "{} frames, peak infected {}, total cost {:.1}",
                frames, peak_infected, final_cost
            ),
        });

        if verbose {
            println!(
                "  {}: peak infected {}/{}, final cost {:.1}",
                scenario.name, peak_infected, population, final_cost
            );
            let defaults = Params::default().flat_map();
            for (key, value) in params.flat_map() {
                if defaults.get(&key) != Some(&value) {
                    println!("    {} = {}", key, value);
                }
            }
        }
    }

    results
}

// ── 3. Determinism ──────────────────────────────────────────────────────

fn validate_determinism() -> Vec<TestResult> {
    println!("--- Determinism ---");
    let mut results = Vec::new();

    let params = Params {
        population_size: 300,
        simulation_length: 25,
        grid_size: 3,
        initial_infected: 5,
        ..Params::default()
    };

    let series =
        |seed: u64| -> Option<Vec<[usize; DiseaseState::COUNT]>> {
            let sim = Simulation::with_seed(params.clone(), seed).ok()?;
            Some(sim.map(|f| f.state_counts).collect())
        };

    let a = series(42);
    let b = series(42);
    results.push(TestResult {
        name: "determinism_same_seed".into(),
        passed: a.is_some() && a == b,
        detail: "identical seed reproduces the full series".into(),
    });

    let c = series(43);
    results.push(TestResult {
        name: "determinism_seed_sensitivity".into(),
        passed: a.is_some() && c.is_some() && a != c,
        detail: "different seed diverges".into(),
    });

    results
}

// ── 4. Epidemic Dynamics ────────────────────────────────────────────────

fn validate_dynamics(verbose: bool) -> Vec<TestResult> {
    println!("--- Epidemic Dynamics ---");
    let mut results = Vec::new();

    // No transmission: the infected pool can only shrink.
    let inert = Params {
        population_size: 200,
        simulation_length: 30,
        grid_size: 2,
        initial_infected: 10,
        infection_rate: 0.0,
        mortality_rate: 0.0,
        ..Params::default()
    };
    match Simulation::with_seed(inert, 7) {
        Ok(sim) => {
            let frames: Vec<_> = sim.collect();
            let no_exposures = frames.iter().all(|f| f.count(DiseaseState::Exposed) == 0);
            let last = frames.last().map(|f| f.count(DiseaseState::Recovered));
            results.push(TestResult {
                name: "dynamics_zero_transmission".into(),
                passed: no_exposures && last == Some(10),
                detail: format!("no exposures, {} recovered at end", last.unwrap_or(0)),
            });
        }
        Err(e) => results.push(TestResult {
            name: "dynamics_zero_transmission".into(),
            passed: false,
            detail: format!("setup failed: {}", e),
        }),
    }

    // Full contact: certain transmission in a single crowded cell burns
    // through the whole population within a few frames.
    let dense = Params {
        population_size: 120,
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
    match Simulation::with_seed(dense, 9) {
        Ok(sim) => {
            let frames: Vec<_> = sim.collect();
            let burnout = frames
                .iter()
                .find(|f| f.count(DiseaseState::Recovered) == 120)
                .map(|f| f.number);
            results.push(TestResult {
                name: "dynamics_full_contact_burnout".into(),
                passed: matches!(burnout, Some(n) if n <= 5),
                detail: format!("population recovered by frame {:?}", burnout),
            });
            if verbose {
                for f in &frames {
                    println!(
                        "  frame {:2}: S={:3} E={:3} I={:3} R={:3}",
                        f.number,
                        f.count(DiseaseState::Susceptible),
                        f.count(DiseaseState::Exposed),
                        f.count(DiseaseState::Infected),
                        f.count(DiseaseState::Recovered)
                    );
                }
            }
        }
        Err(e) => results.push(TestResult {
            name: "dynamics_full_contact_burnout".into(),
            passed: false,
            detail: format!("setup failed: {}", e),
        }),
    }

    // Waning immunity: with a short immunity period the recovered pool
    // drains back into the susceptible pool.
    let waning = Params {
        population_size: 100,
        simulation_length: 12,
        grid_size: 1,
        initial_infected: 10,
        infection_rate: 0.0,
        infection_period: 1,
        immunity_period: 3,
        mortality_rate: 0.0,
        ..Params::default()
    };
    match Simulation::with_seed(waning, 11) {
        Ok(sim) => {
            let last = sim.last();
            let susceptible = last.as_ref().map(|f| f.count(DiseaseState::Susceptible));
            results.push(TestResult {
                name: "dynamics_immunity_wanes".into(),
                passed: susceptible == Some(100),
                detail: format!("{:?}/100 susceptible after immunity lapses", susceptible),
            });
        }
        Err(e) => results.push(TestResult {
            name: "dynamics_immunity_wanes".into(),
            passed: false,
            detail: format!("setup failed: {}", e),
        }),
    }

    results
}

// ── 5. Interventions ────────────────────────────────────────────────────

fn validate_interventions() -> Vec<TestResult> {
    println!("--- Interventions ---");
    let mut results = Vec::new();

    // Fully compliant population under a permanent global lockdown:
    // transmission is completely suppressed and the cost is closed-form.
    let locked = Params {
        population_size: 80,
        simulation_length: 8,
        grid_size: 2,
        initial_infected: 4,
        contact_radius: 2.0,
        infection_rate: 1.0,
        mortality_rate: 0.0,
        hospitalization_rate: 0.0,
        rule_compliance_rate: 1.0,
        lockdown_enabled: true,
        lockdown_cost: 3.0,
        lockdown_strategy: LockdownStrategy::Window { start: 0, end: 1000 },
        ..Params::default()
    };
    match Simulation::with_seed(locked, 13) {
        Ok(sim) => {
            let frames: Vec<_> = sim.collect();
            let no_exposures = frames.iter().all(|f| f.count(DiseaseState::Exposed) == 0);
            let total_cost = frames.last().map(|f| f.metrics.total_cost).unwrap_or(0.0);
            let expected = 8.0 * 80.0 * 3.0 * 1.0;
            let cost_ok = (total_cost - expected).abs() < 1e-9;
            results.push(TestResult {
                name: "intervention_global_lockdown".into(),
                passed: no_exposures && cost_ok,
                detail: format!(
                    "suppressed={} cost {:.0} (expected {:.0})",
                    no_exposures, total_cost, expected
                ),
            });
        }
        Err(e) => results.push(TestResult {
            name: "intervention_global_lockdown".into(),
            passed: false,
            detail: format!("setup failed: {}", e),
        }),
    }

    // A certain-rate vaccination campaign moves the whole susceptible
    // pool to vaccinated on its first frame.
    let vax = Params {
        population_size: 60,
        simulation_length: 4,
        grid_size: 2,
        initial_infected: 0,
        vaccination_enabled: true,
        vaccination_rate: 1.0,
        vaccination_start: 2,
        vaccination_cost: 10.0,
        ..Params::default()
    };
    match Simulation::with_seed(vax, 17) {
        Ok(sim) => {
            let frames: Vec<_> = sim.collect();
            let before = frames[1].count(DiseaseState::Vaccinated);
            let after = frames[2].count(DiseaseState::Vaccinated);
            let cost = frames[2].metrics.cost_this_frame;
            let passed = before == 0 && after == 60 && (cost - 600.0).abs() < 1e-9;
            results.push(TestResult {
                name: "intervention_vaccination_campaign".into(),
                passed,
                detail: format!(
                    "vaccinated {}→{} at campaign start, frame cost {:.0}",
                    before, after, cost
                ),
            });
        }
        Err(e) => results.push(TestResult {
            name: "intervention_vaccination_campaign".into(),
            passed: false,
            detail: format!("setup failed: {}", e),
        }),
    }

    results
}

// ── 6. Metric Formulas ──────────────────────────────────────────────────

fn validate_metrics() -> Vec<TestResult> {
    println!("--- Metric Formulas ---");
    let mut results = Vec::new();

    let re = metrics::reproduction_number(12, 4);
    results.push(TestResult {
        name: "metrics_reproduction_number".into(),
        passed: (re - 3.0).abs() < 1e-12,
        detail: format!("12 secondary / 4 removed = {:.2}", re),
    });

    results.push(TestResult {
        name: "metrics_reproduction_no_removals".into(),
        passed: metrics::reproduction_number(5, 0) == 0.0,
        detail: "no removals → 0".into(),
    });

    let dt = metrics::doubling_time(12, 32, 3);
    let expected_dt = 3.0 * 2.0_f64.ln() / (32.0_f64 / 12.0).ln();
    results.push(TestResult {
        name: "metrics_doubling_time".into(),
        passed: (dt - expected_dt).abs() < 1e-12,
        detail: format!("12→32 over window 3 = {:.3} frames", dt),
    });

    let occ = metrics::hospital_occupancy(100, 0.1, 0.05, 1000);
    results.push(TestResult {
        name: "metrics_hospital_occupancy".into(),
        passed: (occ - 0.2).abs() < 1e-12,
        detail: format!("10 patients / 50 beds = {:.2}", occ),
    });

    // Over capacity the blended mortality rate sits above base.
    let base = 0.3;
    let scaled = mortality::effective_mortality_rate(base, 100.0, 50.0, 2.0);
    let expected = base * (50.0 + 50.0 * 2.0) / 100.0;
    results.push(TestResult {
        name: "metrics_overcapacity_mortality".into(),
        passed: (scaled - expected).abs() < 1e-12 && scaled > base,
        detail: format!("base {:.2} → {:.3} at 2x capacity", base, scaled),
    });

    results.push(TestResult {
        name: "metrics_undercapacity_mortality".into(),
        passed: mortality::effective_mortality_rate(base, 30.0, 50.0, 2.0) == base,
        detail: "under capacity keeps the base rate".into(),
    });

    results
}

// ── 7. Report Persistence ───────────────────────────────────────────────

fn validate_reports() -> Vec<TestResult> {
    println!("--- Report Persistence ---");
    let mut results = Vec::new();

    let params = Params {
        population_size: 100,
        simulation_length: 8,
        grid_size: 2,
        ..Params::default()
    };
    let sim = match Simulation::with_seed(params.clone(), 23) {
        Ok(sim) => sim,
        Err(e) => {
            results.push(TestResult {
                name: "report_round_trip".into(),
                passed: false,
                detail: format!("setup failed: {}", e),
            });
            return results;
        }
    };

    let mut report = RunReport::new(params, 23);
    for frame in sim {
        report.record(&frame);
    }

    results.push(TestResult {
        name: "report_records_all_frames".into(),
        passed: report.len() == 9,
        detail: format!("{} frames recorded", report.len()),
    });

    let path = std::env::temp_dir().join("epigrid-simtest-report.bin");
    let round_trip = report.save(&path).and_then(|_| RunReport::load(&path));
    let ok = matches!(
        &round_trip,
        Ok(loaded) if loaded.state_series == report.state_series && loaded.seed == 23
    );
    results.push(TestResult {
        name: "report_round_trip".into(),
        passed: ok,
        detail: match &round_trip {
            Ok(_) => "save/load preserves the series".into(),
            Err(e) => format!("round trip failed: {}", e),
        },
    });

    let mut stale = report.clone();
    stale.version = REPORT_VERSION + 1;
    let stale_path = std::env::temp_dir().join("epigrid-simtest-stale.bin");
    let rejected = stale
        .save(&stale_path)
        .and_then(|_| RunReport::load(&stale_path));
    results.push(TestResult {
        name: "report_version_check".into(),
        passed: matches!(rejected, Err(ReportError::VersionMismatch { .. })),
        detail: "stale version is rejected on load".into(),
    });

    let _ = std::fs::remove_file(&path);
    let _ = std::fs::remove_file(&stale_path);

    results
}
