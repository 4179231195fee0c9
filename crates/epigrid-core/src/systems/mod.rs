//! Systems - per-frame logic that queries and mutates agent components

mod interventions;
mod movement;
mod transitions;

pub use interventions::*;
pub use movement::*;
pub use transitions::*;
