use super::machine::{SequenceStateMachine, StepOutcome};
use super::state::Boundary;
use crate::camera::CameraSettings;
use crate::error::SequenceError;
use crate::events::{AutoHdrEvent, EventBus};
use crate::frame::PreviewFrame;
use crate::shots::Sequence;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

/// How an analysis run ended without error
#[derive(Debug)]
pub enum AnalysisOutcome {
    Completed(Sequence),
    Aborted,
}

/// Single consumer of the live-view channel.
///
/// Owns the state machine for one run, feeds it frames in arrival order and
/// reports every phase on the event bus.
pub struct AnalysisRunner {
    machine: SequenceStateMachine,
    event_bus: Arc<EventBus>,
}

impl AnalysisRunner {
    pub fn new(machine: SequenceStateMachine, event_bus: Arc<EventBus>) -> Self {
        Self { machine, event_bus }
    }

    pub fn machine(&self) -> &SequenceStateMachine {
        &self.machine
    }

    /// Run one analysis until the shot list is ready, an error ends it or
    /// `cancel` fires.
    pub async fn run(
        mut self,
        frames: &mut mpsc::Receiver<PreviewFrame>,
        cancel: CancellationToken,
        start: Option<CameraSettings>,
    ) -> Result<AnalysisOutcome, SequenceError> {
        self.machine.start_computing(start)?;
        let run_id = self.machine.run_id();
        let criteria = self.machine.criteria();

        let _ = self
            .event_bus
            .publish(AutoHdrEvent::AnalysisStarted {
                run_id,
                lower_pct: criteria.lower_pct(),
                upper_pct: criteria.upper_pct(),
                max_shots: criteria.max_shots(),
                timestamp: SystemTime::now(),
            })
            .await;
        self.publish_statuses().await;

        let mut dropped = 0u64;
        loop {
            let frame = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    let restored = self.machine.abort_computing();
                    let _ = self
                        .event_bus
                        .publish(AutoHdrEvent::AnalysisAborted { run_id })
                        .await;
                    restored?;
                    return Ok(AnalysisOutcome::Aborted);
                }
                frame = frames.recv() => frame,
            };

            let Some(frame) = frame else {
                let error = self.machine.terminate(SequenceError::FrameSourceClosed);
                return Err(self.report_failure(error).await);
            };

            let outcome = match self.machine.process_frame(&frame) {
                Ok(outcome) => outcome,
                Err(error) => return Err(self.report_failure(error).await),
            };
            self.publish_statuses().await;

            match outcome {
                StepOutcome::Ignored => {}
                StepOutcome::NotReady | StepOutcome::Stale { .. } => {
                    dropped += 1;
                    trace!("Analysis {}: {} frame(s) skipped so far", run_id, dropped);
                }
                StepOutcome::Stepped {
                    exposure, stops, ..
                } => {
                    let _ = self
                        .event_bus
                        .publish(AutoHdrEvent::ExposureStepped {
                            run_id,
                            exposure,
                            stops,
                        })
                        .await;
                }
                StepOutcome::LowerFound { exposure } => {
                    let _ = self
                        .event_bus
                        .publish(AutoHdrEvent::BoundaryFound {
                            run_id,
                            boundary: Boundary::Lower,
                            exposure,
                        })
                        .await;
                }
                StepOutcome::Completed { upper_exposure, .. } => {
                    let _ = self
                        .event_bus
                        .publish(AutoHdrEvent::BoundaryFound {
                            run_id,
                            boundary: Boundary::Upper,
                            exposure: upper_exposure,
                        })
                        .await;

                    let sequence = self.machine.take_sequence();
                    info!(
                        "Analysis {} completed with {} shot(s), {} frame(s) skipped",
                        run_id,
                        sequence.len(),
                        dropped
                    );
                    let _ = self
                        .event_bus
                        .publish(AutoHdrEvent::AnalysisCompleted {
                            run_id,
                            shot_count: sequence.len(),
                            exposures: sequence.exposures(),
                        })
                        .await;
                    return Ok(AnalysisOutcome::Completed(sequence));
                }
            }
        }
    }

    async fn publish_statuses(&mut self) {
        let run_id = self.machine.run_id();
        for status in self.machine.drain_statuses() {
            debug!("Analysis {}: {}", run_id, status.message);
            let _ = self
                .event_bus
                .publish(AutoHdrEvent::AnalysisStatus {
                    run_id,
                    phase: status.phase,
                    message: status.message,
                    progress: status.progress,
                })
                .await;
        }
    }

    async fn report_failure(&self, error: SequenceError) -> SequenceError {
        let _ = self
            .event_bus
            .publish(AutoHdrEvent::AnalysisFailed {
                run_id: self.machine.run_id(),
                error: error.to_string(),
            })
            .await;
        error
    }
}
