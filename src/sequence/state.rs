use serde::{Deserialize, Serialize};
use std::fmt;

/// Phases of one analysis run.
///
/// `Start`, `LowerFound` and `UpperFound` only exist while their entry
/// action runs; a frame is never delivered to them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SequenceState {
    Idle,
    Start,
    SeekingLower,
    LowerFound,
    SeekingUpper,
    UpperFound,
}

impl SequenceState {
    pub fn is_running(&self) -> bool {
        !matches!(self, SequenceState::Idle)
    }

    /// States that consume frames
    pub fn is_seeking(&self) -> bool {
        matches!(
            self,
            SequenceState::SeekingLower | SequenceState::SeekingUpper
        )
    }
}

impl fmt::Display for SequenceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SequenceState::Idle => "idle",
            SequenceState::Start => "start",
            SequenceState::SeekingLower => "seeking lower",
            SequenceState::LowerFound => "lower found",
            SequenceState::SeekingUpper => "seeking upper",
            SequenceState::UpperFound => "upper found",
        };
        f.write_str(name)
    }
}

/// Which end of the bracket a boundary shot marks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Boundary {
    /// Darkest shot, limited by over-exposure
    Lower,
    /// Brightest shot, limited by under-exposure
    Upper,
}

impl fmt::Display for Boundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Boundary::Lower => f.write_str("Lower"),
            Boundary::Upper => f.write_str("Upper"),
        }
    }
}

/// Status line shown while a phase is entered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseStatus {
    pub phase: SequenceState,
    pub message: String,
    /// Rough completion in percent
    pub progress: u8,
}

impl PhaseStatus {
    pub fn computing() -> Self {
        Self {
            phase: SequenceState::Start,
            message: "Computing sequence...".to_string(),
            progress: 10,
        }
    }

    pub fn lower_found() -> Self {
        Self {
            phase: SequenceState::LowerFound,
            message: "Found lower criteria.".to_string(),
            progress: 50,
        }
    }

    pub fn completed(shot_count: usize) -> Self {
        Self {
            phase: SequenceState::UpperFound,
            message: format!(
                "Measurements completed ! Capture will take {} shot(s).",
                shot_count
            ),
            progress: 100,
        }
    }
}
