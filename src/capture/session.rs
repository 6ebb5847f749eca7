use super::metadata::{save_metadata, CaptureMetadata};
use super::runner::{CaptureOutcome, CaptureProgress, CaptureRunner};
use crate::camera::CameraHandle;
use crate::config::CaptureConfig;
use crate::error::CaptureError;
use crate::events::{AutoHdrEvent, EventBus};
use crate::shots::Sequence;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Runs a capture in the background and reports it on the event bus.
///
/// The blocking [`CaptureRunner`] is moved onto the blocking pool so the
/// live view and the caller stay responsive while the camera works.
pub struct CaptureSession {
    camera: CameraHandle,
    config: CaptureConfig,
    event_bus: Arc<EventBus>,
}

impl CaptureSession {
    pub fn new(camera: CameraHandle, config: CaptureConfig, event_bus: Arc<EventBus>) -> Self {
        Self {
            camera,
            config,
            event_bus,
        }
    }

    /// Folder receiving the shots of a run started at `started_at`, created
    /// if missing
    pub async fn prepare_folder(
        &self,
        started_at: DateTime<Utc>,
    ) -> Result<PathBuf, CaptureError> {
        let mut folder = PathBuf::from(&self.config.folder);
        if self.config.session_subfolder {
            folder = folder.join(started_at.format("%Y%m%d_%H%M%S_%3f").to_string());
        }
        tokio::fs::create_dir_all(&folder).await?;
        Ok(folder)
    }

    /// Capture every shot of `sequence`, attaching the written files to it.
    ///
    /// The worker gets its own copy of the sequence. Paths are attached to
    /// `sequence` as progress arrives, so the caller keeps its shots and
    /// every reported file even when the worker dies.
    ///
    /// `on_progress` sees the same `(index, total)` reports as the
    /// `CaptureProgress` events, in order.
    pub async fn capture<F>(
        &self,
        sequence: &mut Sequence,
        cancel: CancellationToken,
        mut on_progress: F,
    ) -> Result<CaptureOutcome, CaptureError>
    where
        F: FnMut(&CaptureProgress),
    {
        if sequence.is_empty() {
            return Err(CaptureError::EmptySequence);
        }

        let session_id = Uuid::new_v4();
        let started_at = Utc::now();
        let folder = self.prepare_folder(started_at).await?;
        let total = sequence.len();

        info!(
            "Capture session {} started: {} shot(s) into {}",
            session_id,
            total,
            folder.display()
        );
        let _ = self
            .event_bus
            .publish(AutoHdrEvent::CaptureStarted {
                total,
                timestamp: SystemTime::now(),
            })
            .await;

        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();
        let runner = CaptureRunner::new(self.camera.clone());
        let config = self.config.clone();
        let worker_folder = folder.clone();
        let worker_cancel = cancel.clone();
        sequence.clear_paths();
        let mut owned = sequence.clone();

        let mut worker = tokio::task::spawn_blocking(move || {
            let result = runner.run(
                &mut owned,
                &worker_folder,
                |index| config.shot_name(index),
                &worker_cancel,
                |progress| {
                    let _ = progress_tx.send(progress);
                },
            );
            (owned, result)
        });

        let joined = loop {
            tokio::select! {
                Some(progress) = progress_rx.recv() => {
                    sequence.set_shot_path(progress.index - 1, progress.path.clone());
                    self.report_progress(&progress, &mut on_progress).await;
                }
                joined = &mut worker => break joined,
            }
        };
        while let Ok(progress) = progress_rx.try_recv() {
            sequence.set_shot_path(progress.index - 1, progress.path.clone());
            self.report_progress(&progress, &mut on_progress).await;
        }

        let result = match joined {
            Ok((captured, result)) => {
                *sequence = captured;
                result
            }
            Err(e) => {
                warn!(
                    "Capture worker died, keeping {} reported shot(s): {}",
                    sequence.paths().len(),
                    e
                );
                Err(CaptureError::Worker {
                    details: e.to_string(),
                })
            }
        };

        let (event, outcome_label) = match &result {
            Ok(CaptureOutcome::Completed { captured }) => (
                AutoHdrEvent::CaptureCompleted { total: *captured },
                "completed",
            ),
            Ok(CaptureOutcome::Cancelled { captured, total }) => (
                AutoHdrEvent::CaptureAborted {
                    captured: *captured,
                    total: *total,
                },
                "cancelled",
            ),
            Err(e) => {
                let index = match e {
                    CaptureError::ShotFailed { index, .. } => index + 1,
                    _ => 0,
                };
                (
                    AutoHdrEvent::CaptureFailed {
                        index,
                        total,
                        error: e.to_string(),
                    },
                    "failed",
                )
            }
        };

        if self.config.save_metadata {
            let metadata =
                CaptureMetadata::new(session_id, started_at, sequence, outcome_label.to_string());
            if let Err(e) = save_metadata(&metadata, &folder).await {
                warn!("Capture metadata not saved: {}", e);
            }
        }

        let _ = self.event_bus.publish(event).await;
        result
    }

    async fn report_progress<F>(&self, progress: &CaptureProgress, on_progress: &mut F)
    where
        F: FnMut(&CaptureProgress),
    {
        debug!(
            "Took shot {} of {}: {}",
            progress.index,
            progress.total,
            progress.path.display()
        );
        on_progress(progress);
        let _ = self
            .event_bus
            .publish(AutoHdrEvent::CaptureProgress {
                index: progress.index,
                total: progress.total,
                path: progress.path.clone(),
            })
            .await;
    }
}
