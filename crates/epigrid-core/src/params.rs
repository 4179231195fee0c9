//! Run configuration: the flat parameter set and its precomputed tables.
//!
//! `Params` is created once per run and shared read-only with every
//! system. Overrides are plain struct updates (or partial JSON thanks to
//! `serde(default)`); there is no dynamic field injection. Validation
//! rejects malformed configurations outright instead of clamping them.

use serde::{Deserialize, Serialize};

use epigrid_logic::schedule::LockdownStrategy;

use crate::grid::CellGrid;

/// Every tunable of a simulation run. All fields are plain values;
/// derived quantities (cumulative tables, squared radius, bed counts)
/// live in [`Derived`], computed once at setup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Params {
    // Population and space
    pub population_size: usize,
    pub simulation_length: u32,
    pub grid_size: usize,
    pub initial_infected: usize,

    // Disease
    pub contact_radius: f64,
    pub infection_rate: f64,
    pub incubation_period: u32,
    pub infection_period: u32,
    pub immunity_period: u32,
    pub mortality_rate: f64,

    // Hospitalization
    pub hospitalization_rate: f64,
    /// Bed capacity as a fraction of the population.
    pub hospital_capacity: f64,
    pub hospitalization_cost: f64,
    /// Mortality multiplier applied to patients over bed capacity.
    pub mortality_coefficient: f64,

    // Vaccination
    pub vaccination_enabled: bool,
    pub vaccination_rate: f64,
    pub vaccination_start: u32,
    pub vaccination_cost: f64,

    // Lockdown
    pub lockdown_enabled: bool,
    pub lockdown_strategy: LockdownStrategy,
    /// Infected fraction that locks a cell under the `Local` strategy.
    pub lockdown_level: f64,
    /// Cost per person-frame spent in a locked cell.
    pub lockdown_cost: f64,

    // Hygiene
    pub hygiene_enabled: bool,
    /// Multiplier applied to the infection rate between compliant agents.
    pub hygiene_rate: f64,
    pub hygiene_cost: f64,

    // Travel
    pub travel_rate: f64,
    pub travel_restrictions_enabled: bool,
    pub travel_restriction_cost: f64,
    /// Destination weights `[row][col][dest_row * grid_size + dest_col]`.
    /// `None` draws destinations uniformly.
    pub travel_weights: Option<Vec<Vec<Vec<f64>>>>,

    // Distancing and compliance
    pub distancing_enabled: bool,
    /// Maximum per-axis displacement per frame.
    pub max_movement: f64,
    /// Displacement multiplier for compliant agents while distancing.
    pub distancing_factor: f64,
    pub rule_compliance_rate: f64,

    // Quarantine
    pub quarantine_enabled: bool,
    pub quarantine_rate: f64,
    /// Side length of the quarantine region in the square's corner.
    pub quarantine_size: f64,

    // Demographics
    pub age_distribution: Vec<f64>,
    pub comorbidity_coefficients: Vec<f64>,

    // Metrics
    pub doubling_window: usize,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            population_size: 1000,
            simulation_length: 100,
            grid_size: 5,
            initial_infected: 2,
            contact_radius: 0.02,
            infection_rate: 0.6,
            incubation_period: 5,
            infection_period: 10,
            immunity_period: 30,
            mortality_rate: 0.3,
            hospitalization_rate: 0.1,
            hospital_capacity: 0.05,
            hospitalization_cost: 100.0,
            mortality_coefficient: 2.0,
            vaccination_enabled: false,
            vaccination_rate: 0.01,
            vaccination_start: 0,
            vaccination_cost: 10.0,
            lockdown_enabled: false,
            lockdown_strategy: LockdownStrategy::Local,
            lockdown_level: 0.1,
            lockdown_cost: 1.0,
            hygiene_enabled: false,
            hygiene_rate: 0.5,
            hygiene_cost: 0.1,
            travel_rate: 0.1,
            travel_restrictions_enabled: false,
            travel_restriction_cost: 1.0,
            travel_weights: None,
            distancing_enabled: false,
            max_movement: 0.05,
            distancing_factor: 0.2,
            rule_compliance_rate: 0.9,
            quarantine_enabled: false,
            quarantine_rate: 0.5,
            quarantine_size: 0.1,
            age_distribution: vec![0.25, 0.35, 0.25, 0.15],
            comorbidity_coefficients: vec![0.2, 0.5, 1.0, 2.5],
            doubling_window: 7,
        }
    }
}

impl Params {
    /// Reject malformed configurations before a run starts. No silent
    /// clamping: a bad value is an error, not a suggestion.
    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.population_size == 0 {
            return Err(ParamsError::NotPositive("population_size"));
        }
        if self.grid_size == 0 {
            return Err(ParamsError::NotPositive("grid_size"));
        }
        if self.initial_infected > self.population_size {
            return Err(ParamsError::TooManyInitialInfected {
                initial: self.initial_infected,
                population: self.population_size,
            });
        }
        if !(self.contact_radius > 0.0) {
            return Err(ParamsError::NotPositive("contact_radius"));
        }
        if self.incubation_period == 0 {
            return Err(ParamsError::NotPositive("incubation_period"));
        }
        if self.infection_period == 0 {
            return Err(ParamsError::NotPositive("infection_period"));
        }
        if self.immunity_period == 0 {
            return Err(ParamsError::NotPositive("immunity_period"));
        }
        if self.doubling_window == 0 {
            return Err(ParamsError::NotPositive("doubling_window"));
        }
        if !(self.quarantine_size > 0.0 && self.quarantine_size <= 1.0) {
            return Err(ParamsError::NotAProbability("quarantine_size"));
        }

        let probabilities = [
            ("infection_rate", self.infection_rate),
            ("mortality_rate", self.mortality_rate),
            ("hospitalization_rate", self.hospitalization_rate),
            ("hospital_capacity", self.hospital_capacity),
            ("vaccination_rate", self.vaccination_rate),
            ("lockdown_level", self.lockdown_level),
            ("hygiene_rate", self.hygiene_rate),
            ("travel_rate", self.travel_rate),
            ("distancing_factor", self.distancing_factor),
            ("rule_compliance_rate", self.rule_compliance_rate),
            ("quarantine_rate", self.quarantine_rate),
        ];
        for (name, value) in probabilities {
            if !(0.0..=1.0).contains(&value) {
                return Err(ParamsError::NotAProbability(name));
            }
        }

        let non_negative = [
            ("mortality_coefficient", self.mortality_coefficient),
            ("max_movement", self.max_movement),
            ("hospitalization_cost", self.hospitalization_cost),
            ("vaccination_cost", self.vaccination_cost),
            ("lockdown_cost", self.lockdown_cost),
            ("hygiene_cost", self.hygiene_cost),
            ("travel_restriction_cost", self.travel_restriction_cost),
        ];
        for (name, value) in non_negative {
            if !(value >= 0.0) {
                return Err(ParamsError::Negative(name));
            }
        }

        self.validate_demographics()?;
        self.validate_travel_weights()?;
        Ok(())
    }

    fn validate_demographics(&self) -> Result<(), ParamsError> {
        if self.age_distribution.is_empty() {
            return Err(ParamsError::Table(
                "age_distribution must not be empty".to_string(),
            ));
        }
        if self.age_distribution.len() != self.comorbidity_coefficients.len() {
            return Err(ParamsError::Table(format!(
                "age_distribution has {} brackets but comorbidity_coefficients has {}",
                self.age_distribution.len(),
                self.comorbidity_coefficients.len()
            )));
        }
        if self.age_distribution.iter().any(|&w| !(w >= 0.0)) {
            return Err(ParamsError::Table(
                "age_distribution weights must be non-negative".to_string(),
            ));
        }
        if self.age_distribution.iter().sum::<f64>() <= 0.0 {
            return Err(ParamsError::Table(
                "age_distribution weights must sum to a positive value".to_string(),
            ));
        }
        if self.comorbidity_coefficients.iter().any(|&c| !(c >= 0.0)) {
            return Err(ParamsError::Table(
                "comorbidity_coefficients must be non-negative".to_string(),
            ));
        }
        Ok(())
    }

    fn validate_travel_weights(&self) -> Result<(), ParamsError> {
        let Some(weights) = &self.travel_weights else {
            return Ok(());
        };
        let cells = self.grid_size * self.grid_size;
        if weights.len() != self.grid_size {
            return Err(ParamsError::Table(format!(
                "travel_weights has {} rows for a {}-row grid",
                weights.len(),
                self.grid_size
            )));
        }
        for row in weights {
            if row.len() != self.grid_size {
                return Err(ParamsError::Table(format!(
                    "travel_weights row has {} columns for a {}-column grid",
                    row.len(),
                    self.grid_size
                )));
            }
            for table in row {
                if table.len() != cells {
                    return Err(ParamsError::Table(format!(
                        "travel destination table has {} entries for {} cells",
                        table.len(),
                        cells
                    )));
                }
                if table.iter().any(|&w| !(w >= 0.0)) {
                    return Err(ParamsError::Table(
                        "travel weights must be non-negative".to_string(),
                    ));
                }
                if table.iter().sum::<f64>() <= 0.0 {
                    return Err(ParamsError::Table(
                        "each travel destination table must have positive total weight".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Flat key/value view of every parameter, for diffing and display.
    pub fn flat_map(&self) -> serde_json::Map<String, serde_json::Value> {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        }
    }
}

/// Quantities computed once at setup from a validated `Params`.
pub struct Derived {
    pub cell_size: f64,
    pub contact_radius_sq: f64,
    /// Absolute bed count: `hospital_capacity * population_size`.
    pub hospital_beds: f64,
    /// Normalized cumulative age-bracket distribution.
    pub age_cumulative: Vec<f64>,
    /// Per-cell normalized cumulative destination tables.
    pub travel_cumulative: CellGrid<Vec<f64>>,
}

impl Derived {
    /// Precompute the derived tables. Call only with validated params.
    pub fn new(params: &Params) -> Self {
        let cells = params.grid_size * params.grid_size;
        let mut travel_cumulative: CellGrid<Vec<f64>> = CellGrid::new(params.grid_size);
        for ((row, col), table) in travel_cumulative.iter_mut() {
            let weights: Vec<f64> = match &params.travel_weights {
                Some(weights) => weights[row][col].clone(),
                None => vec![1.0; cells],
            };
            *table = cumulative(&weights);
        }

        Self {
            cell_size: 1.0 / params.grid_size as f64,
            contact_radius_sq: params.contact_radius * params.contact_radius,
            hospital_beds: params.hospital_capacity * params.population_size as f64,
            age_cumulative: cumulative(&params.age_distribution),
            travel_cumulative,
        }
    }
}

/// Normalized running sum; the final entry is forced to exactly 1 so a
/// uniform draw in [0, 1) always lands in some bucket.
fn cumulative(weights: &[f64]) -> Vec<f64> {
    let total: f64 = weights.iter().sum();
    let mut running = 0.0;
    let mut table: Vec<f64> = weights
        .iter()
        .map(|w| {
            running += w / total;
            running
        })
        .collect();
    if let Some(last) = table.last_mut() {
        *last = 1.0;
    }
    table
}

/// Configuration rejected at setup.
#[derive(Debug)]
pub enum ParamsError {
    /// A count, period or length that must be strictly positive is not.
    NotPositive(&'static str),
    /// A rate or fraction lies outside [0, 1].
    NotAProbability(&'static str),
    /// A cost or coefficient is negative (or NaN).
    Negative(&'static str),
    /// More seeded infections than agents.
    TooManyInitialInfected { initial: usize, population: usize },
    /// A demographic or travel table has the wrong shape or contents.
    Table(String),
}

impl std::fmt::Display for ParamsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParamsError::NotPositive(field) => {
                write!(f, "parameter `{}` must be positive", field)
            }
            ParamsError::NotAProbability(field) => {
                write!(f, "parameter `{}` must lie in [0, 1]", field)
            }
            ParamsError::Negative(field) => {
                write!(f, "parameter `{}` must be non-negative", field)
            }
            ParamsError::TooManyInitialInfected {
                initial,
                population,
            } => {
                write!(
                    f,
                    "initial_infected ({}) exceeds population_size ({})",
                    initial, population
                )
            }
            ParamsError::Table(reason) => write!(f, "invalid parameter table: {}", reason),
        }
    }
}

impl std::error::Error for ParamsError {}
