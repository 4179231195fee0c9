//! Run reports - compact per-run time series persisted with bincode.
//!
//! A report records the epidemic curve of one run (state counts per
//! frame) plus the inputs needed to reproduce it. Reports are saved in a
//! versioned binary format and can also be exported as JSON for
//! external tooling.

use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::components::DiseaseState;
use crate::frame::Frame;
use crate::params::Params;

/// Bumped whenever the report layout changes incompatibly.
pub const REPORT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub version: u32,
    /// Seed that, together with `params`, reproduces the run exactly.
    pub seed: u64,
    pub params: Params,
    /// Per-state population counts for every recorded frame, in
    /// `DiseaseState` index order.
    pub state_series: Vec<[usize; DiseaseState::COUNT]>,
    /// Total intervention cost at the last recorded frame.
    pub total_cost: f64,
}

impl RunReport {
    pub fn new(params: Params, seed: u64) -> Self {
        Self {
            version: REPORT_VERSION,
            seed,
            params,
            state_series: Vec::new(),
            total_cost: 0.0,
        }
    }

    /// Append one frame to the series. Frames are expected in order.
    pub fn record(&mut self, frame: &Frame) {
        self.state_series.push(frame.state_counts);
        self.total_cost = frame.metrics.total_cost;
    }

    /// Number of frames recorded so far.
    pub fn len(&self) -> usize {
        self.state_series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state_series.is_empty()
    }

    /// The time series of one disease state across the run.
    pub fn series(&self, state: DiseaseState) -> impl Iterator<Item = usize> + '_ {
        let idx = state.index();
        self.state_series.iter().map(move |counts| counts[idx])
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ReportError> {
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        bincode::serialize_into(writer, self)?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ReportError> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let report: RunReport = bincode::deserialize_from(reader)?;
        if report.version != REPORT_VERSION {
            return Err(ReportError::VersionMismatch {
                found: report.version,
                expected: REPORT_VERSION,
            });
        }
        Ok(report)
    }

    /// JSON export for plotting and external analysis.
    pub fn to_json(&self) -> Result<String, ReportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[derive(Debug)]
pub enum ReportError {
    Io(std::io::Error),
    Bincode(bincode::Error),
    Json(serde_json::Error),
    VersionMismatch { found: u32, expected: u32 },
}

impl fmt::Display for ReportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportError::Io(e) => write!(f, "io error: {}", e),
            ReportError::Bincode(e) => write!(f, "serialization error: {}", e),
            ReportError::Json(e) => write!(f, "json error: {}", e),
            ReportError::VersionMismatch { found, expected } => write!(
                f,
                "report version mismatch: found {}, expected {}",
                found, expected
            ),
        }
    }
}

impl std::error::Error for ReportError {}

impl From<std::io::Error> for ReportError {
    fn from(e: std::io::Error) -> Self {
        ReportError::Io(e)
    }
}

impl From<bincode::Error> for ReportError {
    fn from(e: bincode::Error) -> Self {
        ReportError::Bincode(e)
    }
}

impl From<serde_json::Error> for ReportError {
    fn from(e: serde_json::Error) -> Self {
        ReportError::Json(e)
    }
}
