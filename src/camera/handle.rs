use super::{CameraControl, CameraSettings};
use crate::error::CameraError;
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;
use tracing::{debug, error};

/// Shared, serialized access to the single tethered camera.
///
/// The live-view producer, the sequence state machine and the capture runner
/// all hold clones of the same handle; every hardware call happens under the
/// one lock since the device has no notion of concurrent sessions.
#[derive(Clone)]
pub struct CameraHandle {
    inner: Arc<Mutex<Box<dyn CameraControl>>>,
}

impl CameraHandle {
    pub fn new<C: CameraControl + 'static>(camera: C) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Box::new(camera))),
        }
    }

    /// Lock the camera for a series of calls
    pub fn lock(&self) -> MutexGuard<'_, Box<dyn CameraControl>> {
        self.inner.lock()
    }

    pub fn is_connected(&self) -> bool {
        self.lock().is_connected()
    }

    /// Read current ISO, aperture and exposure
    pub fn snapshot(&self) -> Result<CameraSettings, CameraError> {
        let settings = self.lock().settings()?;
        debug!(
            "Camera snapshot: ISO {}, aperture {}, exposure {}",
            settings.iso, settings.aperture, settings.exposure
        );
        Ok(settings)
    }

    /// Put the camera back to a previous snapshot
    pub fn restore(&self, settings: &CameraSettings) -> Result<(), CameraError> {
        debug!(
            "Restoring camera to ISO {}, aperture {}, exposure {}",
            settings.iso, settings.aperture, settings.exposure
        );
        self.lock().apply(settings).map_err(|e| {
            error!("Could not restore camera parameters: {}", e);
            e
        })
    }
}

impl std::fmt::Debug for CameraHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.inner.try_lock() {
            Some(camera) => f
                .debug_struct("CameraHandle")
                .field("camera", &camera.name())
                .finish(),
            None => f
                .debug_struct("CameraHandle")
                .field("camera", &"<locked>")
                .finish(),
        }
    }
}
