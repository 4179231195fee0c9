//! Agent components for the ECS simulation.
//!
//! Components are pure data attached to agent entities. They have no
//! behavior beyond small helpers - the per-frame logic lives in systems.

use serde::{Deserialize, Serialize};

/// Marker component identifying an entity as a simulated agent
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Agent;

/// Disease state of one agent. Every agent is in exactly one state at
/// every frame boundary; `Dead` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiseaseState {
    Susceptible,
    Exposed,
    Infected,
    Recovered,
    Dead,
    Vaccinated,
}

impl DiseaseState {
    /// Number of disease states.
    pub const COUNT: usize = 6;

    /// All states in index order.
    pub const ALL: [DiseaseState; Self::COUNT] = [
        DiseaseState::Susceptible,
        DiseaseState::Exposed,
        DiseaseState::Infected,
        DiseaseState::Recovered,
        DiseaseState::Dead,
        DiseaseState::Vaccinated,
    ];

    /// Stable index used for state groups and count arrays.
    pub fn index(self) -> usize {
        match self {
            DiseaseState::Susceptible => 0,
            DiseaseState::Exposed => 1,
            DiseaseState::Infected => 2,
            DiseaseState::Recovered => 3,
            DiseaseState::Dead => 4,
            DiseaseState::Vaccinated => 5,
        }
    }

    /// Display color for rendering collaborators.
    pub fn color(self) -> &'static str {
        match self {
            DiseaseState::Susceptible => "#4a90d9",
            DiseaseState::Exposed => "#f5a623",
            DiseaseState::Infected => "#d0021b",
            DiseaseState::Recovered => "#7ed321",
            DiseaseState::Dead => "#4a4a4a",
            DiseaseState::Vaccinated => "#9013fe",
        }
    }

    /// Whether charting collaborators include this state's count in the
    /// per-state plot series. All current states are charted.
    pub fn countable(self) -> bool {
        true
    }

    /// Whether the state admits no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, DiseaseState::Dead)
    }
}

/// Disease state plus the frame counter driving dwell-time transitions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Health {
    pub state: DiseaseState,
    /// Frames elapsed since the last state change. Advances by exactly
    /// one per frame and resets to 0 only on a transition.
    pub frames_in_state: u32,
}

impl Health {
    pub fn new(state: DiseaseState) -> Self {
        Self {
            state,
            frames_in_state: 0,
        }
    }

    /// Enter `next` and reset the dwell counter.
    pub fn transition(&mut self, next: DiseaseState) {
        self.state = next;
        self.frames_in_state = 0;
    }
}

/// Continuous position on the unit square.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_squared(&self, other: &Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }
}

/// Home cell and the fixed anchor point jitter is applied around.
/// Assigned at population initialization and never changed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Home {
    pub row: usize,
    pub col: usize,
    pub anchor_x: f64,
    pub anchor_y: f64,
}

/// Attributes fixed at creation: rule compliance and age bracket.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Traits {
    /// Whether the agent follows distancing, hygiene, lockdown and
    /// travel-restriction rules.
    pub complies: bool,
    /// Index into the comorbidity coefficient table.
    pub bracket: usize,
}

/// Per-infection-episode counters, reset each time the agent becomes
/// infectious. Their final values feed the reproduction metrics when the
/// agent is removed.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Episode {
    pub contacted: u32,
    pub infected: u32,
}

impl Episode {
    pub fn reset(&mut self) {
        self.contacted = 0;
        self.infected = 0;
    }
}

/// Transient placement flags recomputed by the movement system.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Mobility {
    /// Cell the agent is visiting this frame, if it traveled.
    pub visiting: Option<(usize, usize)>,
    /// Quarantined agents are confined to the quarantine region and
    /// excluded from contact detection.
    pub quarantined: bool,
}
