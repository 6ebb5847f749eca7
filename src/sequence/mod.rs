mod machine;
mod runner;
mod state;


pub use machine::{AnalysisSettings, SequenceStateMachine, StepOutcome};
pub use runner::{AnalysisOutcome, AnalysisRunner};
pub use state::{Boundary, PhaseStatus, SequenceState};
