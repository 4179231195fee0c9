//! Mortality-rate adjustment for hospital overcapacity and comorbidity.
//!
//! When the hospitalized count exceeds bed capacity, excess patients face
//! a worse outcome; the effective rate blends in-capacity and
//! over-capacity cases so the population-level rate degrades smoothly as
//! the overflow grows.

/// Scale the base mortality rate for hospital load.
///
/// `hospitalized` and `capacity` are absolute counts (the engine derives
/// capacity as `hospital_capacity * population_size`). At or under
/// capacity the base rate applies. Over capacity:
///
/// `base * (capacity + (hospitalized - capacity) * coefficient) / hospitalized`
///
/// With `coefficient > 1` the overflow fraction dies at a scaled-up rate.
pub fn effective_mortality_rate(
    base: f64,
    hospitalized: f64,
    capacity: f64,
    mortality_coefficient: f64,
) -> f64 {
    if hospitalized <= capacity || hospitalized <= 0.0 {
        return base;
    }
    base * (capacity + (hospitalized - capacity) * mortality_coefficient) / hospitalized
}

/// Apply an age-bracket comorbidity coefficient to a mortality rate.
pub fn bracket_adjusted(rate: f64, coefficient: f64) -> f64 {
    rate * coefficient
}
