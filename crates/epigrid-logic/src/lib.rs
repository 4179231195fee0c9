//! Epigrid Logic - pure epidemic simulation math
//!
//! Formulas shared by the engine and external tooling, kept free of ECS
//! and engine dependencies so they can be tested and reused in isolation:
//! frame-level metrics, hospitalization-aware mortality scaling, and the
//! lockdown schedule variants.

pub mod metrics;
pub mod mortality;
pub mod schedule;
