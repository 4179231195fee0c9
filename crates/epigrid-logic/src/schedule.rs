//! Lockdown strategies as a closed set of variants.
//!
//! `Local` is decided per cell by the intervention engine from infected
//! fractions; the other variants are global schedules evaluated purely
//! against the frame index, so every cell locks and unlocks together.

use serde::{Deserialize, Serialize};

/// How lockdown decisions are made for the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LockdownStrategy {
    /// Lock each cell whose resident infected fraction reaches the
    /// configured threshold.
    Local,
    /// Repeating on/off blocks: `period_on` locked frames followed by
    /// `period_off` open frames, starting locked at frame 0.
    Alternating { period_on: u32, period_off: u32 },
    /// Weekly pattern: `active[d]` locks day `d` (0 = frame 0's day),
    /// with `frames_per_day` frames to a day.
    DayOfWeek {
        active: [bool; 7],
        frames_per_day: u32,
    },
    /// One contiguous locked block over `start..end` (end exclusive).
    Window { start: u32, end: u32 },
}

impl Default for LockdownStrategy {
    fn default() -> Self {
        LockdownStrategy::Local
    }
}

impl LockdownStrategy {
    /// Whether the whole grid is locked at `frame`. `None` for `Local`,
    /// which is not a global schedule.
    pub fn global_lockdown_active(&self, frame: u32) -> Option<bool> {
        match self {
            LockdownStrategy::Local => None,
            LockdownStrategy::Alternating {
                period_on,
                period_off,
            } => {
                let cycle = period_on + period_off;
                if cycle == 0 {
                    Some(false)
                } else {
                    Some(frame % cycle < *period_on)
                }
            }
            LockdownStrategy::DayOfWeek {
                active,
                frames_per_day,
            } => {
                if *frames_per_day == 0 {
                    Some(false)
                } else {
                    let day = (frame / frames_per_day) % 7;
                    Some(active[day as usize])
                }
            }
            LockdownStrategy::Window { start, end } => Some(frame >= *start && frame < *end),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_has_no_global_schedule() {
        assert_eq!(LockdownStrategy::Local.global_lockdown_active(0), None);
    }

    #[test]
    fn alternating_cycles_on_then_off() {
        let s = LockdownStrategy::Alternating {
            period_on: 3,
            period_off: 2,
        };
        let pattern: Vec<bool> = (0..10)
            .map(|f| s.global_lockdown_active(f).unwrap())
            .collect();
        assert_eq!(
            pattern,
            vec![true, true, true, false, false, true, true, true, false, false]
        );
    }

    #[test]
    fn alternating_zero_cycle_stays_open() {
        let s = LockdownStrategy::Alternating {
            period_on: 0,
            period_off: 0,
        };
        assert_eq!(s.global_lockdown_active(5), Some(false));
    }

    #[test]
    fn day_of_week_pattern() {
        let s = LockdownStrategy::DayOfWeek {
            active: [false, true, false, false, false, false, true],
            frames_per_day: 2,
        };
        assert_eq!(s.global_lockdown_active(0), Some(false)); // day 0
        assert_eq!(s.global_lockdown_active(2), Some(true)); // day 1
        assert_eq!(s.global_lockdown_active(3), Some(true));
        assert_eq!(s.global_lockdown_active(13), Some(true)); // day 6
        assert_eq!(s.global_lockdown_active(14), Some(false)); // wraps to day 0
    }

    #[test]
    fn window_is_half_open() {
        let s = LockdownStrategy::Window { start: 5, end: 8 };
        assert_eq!(s.global_lockdown_active(4), Some(false));
        assert_eq!(s.global_lockdown_active(5), Some(true));
        assert_eq!(s.global_lockdown_active(7), Some(true));
        assert_eq!(s.global_lockdown_active(8), Some(false));
    }
}
