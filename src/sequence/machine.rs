use super::state::{Boundary, PhaseStatus, SequenceState};
use crate::camera::{CameraHandle, CameraSettings, ExposureScale};
use crate::config::AutoHdrConfig;
use crate::distribute::distribute;
use crate::error::{CameraError, SequenceError};
use crate::exposure::{rate, ExposureKind, ExposureRating, Thresholds};
use crate::frame::PreviewFrame;
use crate::shots::{Criteria, Sequence, ShotList, ShotParameters};
use std::mem;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

/// Analysis settings that do not change between runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisSettings {
    pub thresholds: Thresholds,
    /// Spacing between shots, in camera scale steps
    pub shot_gap: usize,
    /// Exposure the upper search must never step onto. The search fails
    /// with `MaximumExposure` one step before it.
    pub max_exposure: Option<String>,
}

impl AnalysisSettings {
    pub fn from_config(config: &AutoHdrConfig) -> Self {
        Self {
            thresholds: config.thresholds(),
            shot_gap: config.shot_gap(),
            max_exposure: config.analysis.max_exposure.clone(),
        }
    }
}

/// Result of feeding one frame to the machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Machine is idle; the frame was dropped
    Ignored,
    /// Frame had no measurable area
    NotReady,
    /// Frame predates the last commanded exposure
    Stale { expected: String, reported: String },
    /// Criterion not met; exposure moved one step
    Stepped {
        exposure: String,
        stops: usize,
        rating: u8,
    },
    /// Lower boundary recorded; the upper search starts from the start exposure
    LowerFound { exposure: String },
    /// Upper boundary recorded and the bracket distributed
    Completed {
        upper_exposure: String,
        shot_count: usize,
    },
}

/// Exposure-bracketing control loop.
///
/// Consumes live-view frames one at a time and walks the camera exposure
/// darker until over-exposure drops below the lower criterion, then brighter
/// from the start exposure until under-exposure drops below the upper
/// criterion. The stops travelled in both directions are then spread into a
/// shot list.
///
/// Every exit from a run (completion, error or abort) puts the camera back to
/// the parameters snapshotted when the run started.
pub struct SequenceStateMachine {
    camera: CameraHandle,
    settings: AnalysisSettings,
    criteria: Criteria,
    state: SequenceState,
    run_id: Uuid,
    scale: ExposureScale,
    start: Option<CameraSettings>,
    shots: ShotList,
    stops: usize,
    commanded: String,
    statuses: Vec<PhaseStatus>,
}

impl SequenceStateMachine {
    pub fn new(camera: CameraHandle, settings: AnalysisSettings, criteria: Criteria) -> Self {
        Self {
            camera,
            settings,
            criteria,
            state: SequenceState::Idle,
            run_id: Uuid::nil(),
            scale: ExposureScale::default(),
            start: None,
            shots: Vec::new(),
            stops: 0,
            commanded: String::new(),
            statuses: Vec::new(),
        }
    }

    pub fn state(&self) -> SequenceState {
        self.state
    }

    pub fn criteria(&self) -> Criteria {
        self.criteria
    }

    /// Criteria only change between runs
    pub fn set_criteria(&mut self, criteria: Criteria) -> Result<(), SequenceError> {
        if self.state.is_running() {
            return Err(SequenceError::NotIdle);
        }
        self.criteria = criteria;
        Ok(())
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Steps travelled so far in the current run
    pub fn stops(&self) -> usize {
        self.stops
    }

    /// Exposure the machine last asked the camera for
    pub fn commanded_exposure(&self) -> &str {
        &self.commanded
    }

    pub fn start_parameters(&self) -> Option<&CameraSettings> {
        self.start.as_ref()
    }

    pub fn shots(&self) -> &[ShotParameters] {
        &self.shots
    }

    /// Status lines of the phases entered since the last call
    pub fn drain_statuses(&mut self) -> Vec<PhaseStatus> {
        mem::take(&mut self.statuses)
    }

    /// Hand the finished shot list over, leaving the machine empty
    pub fn take_sequence(&mut self) -> Sequence {
        Sequence::with_shots(self.criteria, mem::take(&mut self.shots))
    }

    /// Begin a run from the camera's current parameters, or from `start`
    /// when the operator picked them beforehand.
    ///
    /// Clears any previous shot list. Fails with [`SequenceError::NotIdle`]
    /// while a run is in progress.
    pub fn start_computing(&mut self, start: Option<CameraSettings>) -> Result<(), SequenceError> {
        if self.state.is_running() {
            return Err(SequenceError::NotIdle);
        }

        self.state = SequenceState::Start;
        self.run_id = Uuid::new_v4();
        self.shots.clear();
        self.stops = 0;
        self.statuses.clear();

        let start = match start {
            Some(settings) => settings,
            None => match self.camera.snapshot() {
                Ok(settings) => settings,
                Err(e) => {
                    self.state = SequenceState::Idle;
                    return Err(e.into());
                }
            },
        };
        self.scale = self.camera.lock().exposure_scale().clone();
        self.commanded = start.exposure.clone();
        self.start = Some(start.clone());

        // Operator may have touched the body since the snapshot
        if let Err(e) = self.camera.restore(&start) {
            return Err(self.fail(e.into()));
        }

        info!(
            "Analysis {} started at ISO {}, aperture {}, exposure {} (lower {}%, upper {}%, max {} shots)",
            self.run_id,
            start.iso,
            start.aperture,
            start.exposure,
            self.criteria.lower_pct(),
            self.criteria.upper_pct(),
            self.criteria.max_shots()
        );
        self.statuses.push(PhaseStatus::computing());
        self.state = SequenceState::SeekingLower;
        Ok(())
    }

    /// Stop the run and restore the start parameters.
    ///
    /// Aborting an idle machine does nothing.
    pub fn abort_computing(&mut self) -> Result<(), SequenceError> {
        if !self.state.is_running() && self.start.is_none() {
            return Ok(());
        }

        info!("Analysis {} aborted in state {}", self.run_id, self.state);
        self.state = SequenceState::Idle;
        self.shots.clear();
        self.restore_start()
            .map_err(|e| SequenceError::RestoreFailed {
                cause: Box::new(SequenceError::Aborted),
                details: e.to_string(),
            })
    }

    /// Run one transition for `frame`.
    ///
    /// Frames are only measured while seeking a boundary, and only when both
    /// the camera and the frame agree with the last commanded exposure.
    pub fn process_frame(&mut self, frame: &PreviewFrame) -> Result<StepOutcome, SequenceError> {
        let boundary = match self.state {
            SequenceState::SeekingLower => Boundary::Lower,
            SequenceState::SeekingUpper => Boundary::Upper,
            _ => return Ok(StepOutcome::Ignored),
        };

        let reported = self.camera.lock().current_exposure();
        let reported = match reported {
            Ok(exposure) => exposure,
            Err(e) => return Err(self.fail(e.into())),
        };
        if !self.scale.same_step(&reported, &self.commanded) {
            trace!(
                "Frame {} dropped: camera reports {}, expected {}",
                frame.id,
                reported,
                self.commanded
            );
            return Ok(StepOutcome::Stale {
                expected: self.commanded.clone(),
                reported,
            });
        }
        if let Some(tagged) = &frame.exposure {
            if !self.scale.same_step(tagged, &self.commanded) {
                trace!(
                    "Frame {} dropped: taken at {}, expected {}",
                    frame.id,
                    tagged,
                    self.commanded
                );
                return Ok(StepOutcome::Stale {
                    expected: self.commanded.clone(),
                    reported: tagged.clone(),
                });
            }
        }

        let (kind, criterion) = match boundary {
            Boundary::Lower => (ExposureKind::Over, self.criteria.lower_pct()),
            Boundary::Upper => (ExposureKind::Under, self.criteria.upper_pct()),
        };
        let rating = match rate(frame, self.settings.thresholds, kind) {
            ExposureRating::NotReady => return Ok(StepOutcome::NotReady),
            ExposureRating::Percent(p) => p,
        };
        debug!(
            "Frame {} at {}: {}% {:?}-exposed (criterion {}%)",
            frame.id, self.commanded, rating, kind, criterion
        );

        if rating < criterion {
            if let Err(e) = self.record_boundary(frame) {
                return Err(self.fail(e.into()));
            }
            return match boundary {
                Boundary::Lower => self.enter_lower_found(),
                Boundary::Upper => self.enter_upper_found(),
            };
        }

        match self.step(boundary) {
            Ok(exposure) => {
                self.stops += 1;
                self.commanded = exposure.clone();
                Ok(StepOutcome::Stepped {
                    exposure,
                    stops: self.stops,
                    rating,
                })
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// End the run with `error`, restoring the start parameters
    pub fn terminate(&mut self, error: SequenceError) -> SequenceError {
        self.fail(error)
    }

    fn step(&mut self, boundary: Boundary) -> Result<String, SequenceError> {
        match boundary {
            Boundary::Lower => self
                .camera
                .lock()
                .step_exposure_down(&self.commanded)
                .map_err(|e| match e {
                    CameraError::LimitReached { .. } => SequenceError::UnderExposureLimit,
                    other => SequenceError::Camera(other),
                }),
            Boundary::Upper => {
                if let (Some(ceiling), Some(next)) = (
                    self.settings.max_exposure.as_deref(),
                    self.scale.brighter(&self.commanded),
                ) {
                    if self.scale.same_step(next, ceiling) {
                        return Err(SequenceError::MaximumExposure);
                    }
                }
                self.camera
                    .lock()
                    .step_exposure_up(&self.commanded)
                    .map_err(|e| match e {
                        CameraError::LimitReached { .. } => SequenceError::MaximumExposure,
                        other => SequenceError::Camera(other),
                    })
            }
        }
    }

    fn record_boundary(&mut self, frame: &PreviewFrame) -> Result<(), CameraError> {
        let settings = self.camera.lock().settings()?;
        let mut shot = ShotParameters::from_settings(&settings);
        shot.preview = Some(frame.clone());
        self.shots.push(shot);
        Ok(())
    }

    fn enter_lower_found(&mut self) -> Result<StepOutcome, SequenceError> {
        self.state = SequenceState::LowerFound;
        let exposure = self.commanded.clone();
        info!(
            "Analysis {}: lower boundary at {} after {} stop(s)",
            self.run_id, exposure, self.stops
        );

        if let Some(start) = self.start.clone() {
            if let Err(e) = self.camera.restore(&start) {
                return Err(self.fail(e.into()));
            }
            self.commanded = start.exposure;
        }
        self.statuses.push(PhaseStatus::lower_found());
        self.state = SequenceState::SeekingUpper;

        Ok(StepOutcome::LowerFound { exposure })
    }

    fn enter_upper_found(&mut self) -> Result<StepOutcome, SequenceError> {
        self.state = SequenceState::UpperFound;
        let upper_exposure = self.commanded.clone();
        info!(
            "Analysis {}: upper boundary at {}, {} stop(s) travelled",
            self.run_id, upper_exposure, self.stops
        );

        // Both boundaries are recorded at this point
        let distributed = distribute(
            &self.shots[0],
            &self.shots[self.shots.len() - 1],
            self.stops,
            self.settings.shot_gap,
            self.criteria.max_shots(),
            &self.scale,
        );
        let shots = match distributed {
            Ok(shots) => shots,
            Err(e) => return Err(self.fail(e.into())),
        };

        self.state = SequenceState::Idle;
        if let Err(e) = self.restore_start() {
            self.shots.clear();
            return Err(e.into());
        }
        self.shots = shots;

        let shot_count = self.shots.len();
        self.statuses.push(PhaseStatus::completed(shot_count));
        Ok(StepOutcome::Completed {
            upper_exposure,
            shot_count,
        })
    }

    fn fail(&mut self, error: SequenceError) -> SequenceError {
        warn!(
            "Analysis {} failed in state {}: {}",
            self.run_id, self.state, error
        );
        self.state = SequenceState::Idle;
        self.shots.clear();
        match self.restore_start() {
            Ok(()) => error,
            Err(e) => SequenceError::RestoreFailed {
                cause: Box::new(error),
                details: e.to_string(),
            },
        }
    }

    /// Put the camera back to the start snapshot and discard it
    fn restore_start(&mut self) -> Result<(), CameraError> {
        match self.start.take() {
            Some(start) => self.camera.restore(&start),
            None => Ok(()),
        }
    }
}
