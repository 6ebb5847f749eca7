use crate::camera::CameraHandle;
use crate::error::CaptureError;
use crate::shots::Sequence;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Shot `index` (1-based) of `total` was written to `path`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureProgress {
    pub index: usize,
    pub total: usize,
    pub path: PathBuf,
}

/// How a capture run ended without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    Completed { captured: usize },
    Cancelled { captured: usize, total: usize },
}

/// Takes the shots of a sequence one after the other.
///
/// Blocking: every shot waits for the camera round trip. Run it off the async
/// executor (see [`super::CaptureSession`]).
pub struct CaptureRunner {
    camera: CameraHandle,
}

impl CaptureRunner {
    pub fn new(camera: CameraHandle) -> Self {
        Self { camera }
    }

    /// Capture every shot of `sequence` into `folder`.
    ///
    /// Each shot's settings are applied before the capture, the written file
    /// is attached to the shot and `progress` is told about it. The first
    /// failure ends the run; shots taken before it keep their paths. The
    /// cancellation token is checked before each shot. Camera settings found
    /// at the start are put back whatever the outcome.
    pub fn run<N, P>(
        &self,
        sequence: &mut Sequence,
        folder: &Path,
        name_fn: N,
        cancel: &CancellationToken,
        mut progress: P,
    ) -> Result<CaptureOutcome, CaptureError>
    where
        N: Fn(usize) -> String,
        P: FnMut(CaptureProgress),
    {
        if sequence.is_empty() {
            return Err(CaptureError::EmptySequence);
        }

        let snapshot = self.camera.snapshot()?;
        sequence.clear_paths();

        let result = self.capture_all(sequence, folder, name_fn, cancel, &mut progress);

        match (result, self.camera.restore(&snapshot)) {
            (Ok(outcome), Ok(())) => Ok(outcome),
            (Ok(_), Err(e)) => Err(CaptureError::Camera(e)),
            (Err(e), restored) => {
                if let Err(restore_error) = restored {
                    warn!("Camera not restored after failed capture: {}", restore_error);
                }
                Err(e)
            }
        }
    }

    fn capture_all<N, P>(
        &self,
        sequence: &mut Sequence,
        folder: &Path,
        name_fn: N,
        cancel: &CancellationToken,
        progress: &mut P,
    ) -> Result<CaptureOutcome, CaptureError>
    where
        N: Fn(usize) -> String,
        P: FnMut(CaptureProgress),
    {
        let total = sequence.len();
        info!("Capturing {} shot(s) into {}", total, folder.display());

        for index in 0..total {
            if cancel.is_cancelled() {
                info!("Capture cancelled after {} of {} shot(s)", index, total);
                return Ok(CaptureOutcome::Cancelled {
                    captured: index,
                    total,
                });
            }

            let settings = match sequence.shot(index) {
                Some(shot) => shot.settings(),
                None => break,
            };
            let base_path = folder.join(name_fn(index));
            debug!(
                "Shot {}/{}: ISO {}, aperture {}, exposure {}",
                index + 1,
                total,
                settings.iso,
                settings.aperture,
                settings.exposure
            );

            let captured = {
                let mut camera = self.camera.lock();
                camera
                    .apply(&settings)
                    .and_then(|_| camera.capture_shot(&base_path))
            };

            match captured {
                Ok(path) => {
                    sequence.set_shot_path(index, path.clone());
                    progress(CaptureProgress {
                        index: index + 1,
                        total,
                        path,
                    });
                }
                Err(source) => {
                    error!("Sequence capture failed at shot {}: {}", index + 1, source);
                    return Err(CaptureError::ShotFailed {
                        index,
                        total,
                        source,
                    });
                }
            }
        }

        info!("{} images successfully captured.", total);
        Ok(CaptureOutcome::Completed { captured: total })
    }
}
