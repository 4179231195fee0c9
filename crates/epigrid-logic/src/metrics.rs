//! Frame-level epidemic metrics as pure functions.
//!
//! Every formula here substitutes 0 for a degenerate denominator. That is
//! the defined value, not an error: a frame with no removals has no
//! observable reproduction number, and a run without hospital beds has no
//! occupancy to report.

/// Effective reproduction number: mean secondary infections per agent
/// removed this frame. 0 when nobody was removed.
pub fn reproduction_number(reproductive_sum: u64, removed: u64) -> f64 {
    if removed == 0 {
        0.0
    } else {
        reproductive_sum as f64 / removed as f64
    }
}

/// Mean contacts recorded per agent removed this frame.
pub fn average_contacts(contact_sum: u64, removed: u64) -> f64 {
    if removed == 0 {
        0.0
    } else {
        contact_sum as f64 / removed as f64
    }
}

/// Fraction of hospital beds in use.
///
/// Bed count is `hospital_capacity * population` (`hospital_capacity` is a
/// fraction of the population); the hospitalized count is
/// `infected * hospitalization_rate`. 0 when there are no beds.
pub fn hospital_occupancy(
    infected: usize,
    hospitalization_rate: f64,
    hospital_capacity: f64,
    population: usize,
) -> f64 {
    let beds = hospital_capacity * population as f64;
    if beds <= 0.0 {
        0.0
    } else {
        infected as f64 * hospitalization_rate / beds
    }
}

/// Doubling time of the infected count over a rolling window.
///
/// `past` is the infected count `window` frames ago. Defined as
/// `window * ln(2) / ln(current / past)` when both counts are positive
/// and differ; 0 otherwise (flat or empty epidemics have no doubling
/// time).
pub fn doubling_time(past: usize, current: usize, window: usize) -> f64 {
    if past == 0 || current == 0 || past == current {
        return 0.0;
    }
    window as f64 * 2.0_f64.ln() / (current as f64 / past as f64).ln()
}
