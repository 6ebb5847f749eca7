use super::state::ActivityTracker;
use super::types::{Activity, ShutdownReason};
use crate::camera::{CameraHandle, SimulatedCamera};
use crate::capture::{CaptureOutcome, CaptureSession};
use crate::composition::{Composer, CompositionInvoker, CompositionOutcome};
use crate::config::AutoHdrConfig;
use crate::error::{AutoHdrError, CompositionError, Result};
use crate::events::{AutoHdrEvent, EventBus};
use crate::liveview::LiveViewProducer;
use crate::sequence::{AnalysisOutcome, AnalysisRunner, AnalysisSettings, SequenceStateMachine};
use crate::shots::{Criteria, Sequence};
use std::sync::Arc;
use std::time::SystemTime;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Owns everything an HDR bracketing session needs and runs one activity
/// at a time against the camera.
pub struct AutoHdrSession {
    pub(super) config: AutoHdrConfig,
    pub(super) camera: CameraHandle,
    pub(super) event_bus: Arc<EventBus>,
    pub(super) composer: Arc<dyn Composer>,
    pub(super) activity: ActivityTracker,
    pub(super) shutdown_token: CancellationToken,
}

impl AutoHdrSession {
    /// Session on the built-in simulated camera
    pub fn new(config: AutoHdrConfig) -> Result<Self> {
        let camera = SimulatedCamera::new(config.simulation.clone())?
            .with_parameter_names(&config.camera);
        Ok(Self::with_camera(config, CameraHandle::new(camera)))
    }

    pub fn with_camera(config: AutoHdrConfig, camera: CameraHandle) -> Self {
        let event_bus = Arc::new(EventBus::new(config.system.event_bus_capacity));
        let composer: Arc<dyn Composer> =
            Arc::new(CompositionInvoker::from_config(&config.composition));

        Self {
            config,
            camera,
            event_bus,
            composer,
            activity: ActivityTracker::new(),
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Replace the external merge tool
    pub fn with_composer(mut self, composer: Arc<dyn Composer>) -> Self {
        self.composer = composer;
        self
    }

    pub fn config(&self) -> &AutoHdrConfig {
        &self.config
    }

    pub fn camera(&self) -> &CameraHandle {
        &self.camera
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.event_bus)
    }

    pub fn activity(&self) -> Activity {
        self.activity.current()
    }

    /// Shared handle able to abort whatever runs, for signal and key handlers
    pub fn activity_tracker(&self) -> ActivityTracker {
        self.activity.clone()
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    /// Measure the scene from the live view and compute the shot list
    pub async fn analyze(&self, criteria: Criteria) -> Result<AnalysisOutcome> {
        let guard = self
            .activity
            .begin(Activity::Analyzing, &self.shutdown_token)?;
        let cancel = guard.token();

        let machine = SequenceStateMachine::new(
            self.camera.clone(),
            AnalysisSettings::from_config(&self.config),
            criteria,
        );
        let producer =
            LiveViewProducer::new(self.camera.clone(), &self.config.liveview, self.event_bus());

        // The live view gets its own token so it can stop once the analysis is done
        let liveview_cancel = cancel.child_token();
        let (mut frames, liveview) = producer.spawn(liveview_cancel.clone());

        let result = AnalysisRunner::new(machine, self.event_bus())
            .run(&mut frames, cancel, None)
            .await;

        liveview_cancel.cancel();
        drop(frames);
        if let Err(e) = liveview.await {
            warn!("Live view task ended abnormally: {}", e);
        }
        debug!(
            "Analysis used {} live view frame(s)",
            producer.frames_delivered()
        );

        match result {
            Ok(AnalysisOutcome::Completed(sequence)) => {
                info!(
                    "Analysis completed with {} shot(s): {:?}",
                    sequence.len(),
                    sequence.exposures()
                );
                Ok(AnalysisOutcome::Completed(sequence))
            }
            Ok(AnalysisOutcome::Aborted) => {
                info!("Analysis aborted");
                Ok(AnalysisOutcome::Aborted)
            }
            Err(e) => {
                error!("Analysis failed: {}", e);
                Err(e.into())
            }
        }
    }

    /// Shoot every planned exposure of `sequence`
    pub async fn capture(&self, sequence: &mut Sequence) -> Result<CaptureOutcome> {
        let guard = self
            .activity
            .begin(Activity::Capturing, &self.shutdown_token)?;

        let session =
            CaptureSession::new(self.camera.clone(), self.config.capture.clone(), self.event_bus());
        let outcome = session
            .capture(sequence, guard.token(), |progress| {
                info!("Shot {}/{} taken", progress.index, progress.total);
            })
            .await?;

        Ok(outcome)
    }

    /// Merge the captured files of `sequence` into HDR and LDR images
    pub async fn compose(&self, sequence: &Sequence) -> Result<CompositionOutcome> {
        let guard = self
            .activity
            .begin(Activity::Composing, &self.shutdown_token)?;

        let inputs = sequence.paths();
        let hdr_output = self.config.hdr_output();
        let ldr_output = self.config.ldr_output();

        let _ = self
            .event_bus
            .publish(AutoHdrEvent::CompositionStarted {
                inputs: inputs.len(),
                timestamp: SystemTime::now(),
            })
            .await;

        let result = match tokio::fs::create_dir_all(&self.config.composition.folder).await {
            Ok(()) => {
                self.composer
                    .compose(&inputs, &hdr_output, &ldr_output, guard.token())
                    .await
            }
            Err(e) => Err(CompositionError::FailedToStart {
                program: self.config.composition.program.clone(),
                source: e,
            }),
        };

        let event = match &result {
            Ok(CompositionOutcome::Finished { code }) => {
                if *code != 0 {
                    warn!("HDR composition exited with code {}", code);
                }
                Some(AutoHdrEvent::CompositionFinished { code: *code })
            }
            Ok(CompositionOutcome::Cancelled) => None,
            Err(e) => {
                error!("HDR composition failed: {}", e);
                Some(AutoHdrEvent::CompositionFailed {
                    error: e.to_string(),
                })
            }
        };
        if let Some(event) = event {
            let _ = self.event_bus.publish(event).await;
        }

        result.map_err(AutoHdrError::from)
    }

    /// Cancel the running activity; false when the session is idle
    pub fn abort(&self) -> bool {
        self.activity.abort()
    }

    /// Cancel everything and refuse further activities
    pub async fn shutdown(&self, reason: ShutdownReason) {
        info!("Shutdown requested: {}", reason);
        self.shutdown_token.cancel();
        let _ = self
            .event_bus
            .publish(AutoHdrEvent::ShutdownRequested {
                timestamp: SystemTime::now(),
                reason: reason.to_string(),
            })
            .await;
    }
}
