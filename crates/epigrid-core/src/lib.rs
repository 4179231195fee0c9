//! Epigrid Core - Agent-Based Epidemic Simulation Engine
//!
//! A population of agents is scattered over a spatial grid of cells; each
//! agent carries a disease state, and the simulation advances in discrete
//! frames applying movement, contact-based transmission, state
//! transitions, and configurable interventions.
//!
//! # Architecture
//!
//! Agents are entities in a `hecs` world carrying pure-data components
//! (Position, Health, Traits, ...). Systems are free functions that query
//! and mutate those components once per frame:
//! - **Movement** jitters agents around their home cell and handles
//!   inter-cell travel.
//! - **Interventions** apply vaccination, lockdown decisions and cost
//!   accounting.
//! - **Transitions** run the contact sweep and the disease state machine.
//!
//! The [`Simulation`](simulation::Simulation) driver owns the world, the
//! spatial index and a seeded RNG, and yields one immutable
//! [`Frame`](frame::Frame) snapshot per step.
//!
//! # Example
//!
//! ```rust
//! use epigrid_core::prelude::*;
//!
//! let params = Params {
//!     population_size: 200,
//!     simulation_length: 20,
//!     ..Params::default()
//! };
//!
//! let sim = Simulation::with_seed(params, 42).unwrap();
//! for frame in sim {
//!     let infected = frame.count(DiseaseState::Infected);
//!     println!("frame {}: {} infected", frame.number, infected);
//! }
//! ```

pub mod components;
pub mod frame;
pub mod grid;
pub mod params;
pub mod report;
pub mod simulation;
pub mod systems;

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::components::*;
    pub use crate::frame::{AgentView, Frame, FrameMetrics};
    pub use crate::params::{Params, ParamsError};
    pub use crate::simulation::Simulation;
    pub use epigrid_logic::schedule::LockdownStrategy;
}
