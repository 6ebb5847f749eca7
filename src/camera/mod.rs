mod handle;
mod scale;
mod simulated;
#[cfg(test)]
mod tests;

pub use handle::CameraHandle;
pub use scale::ExposureScale;
pub use simulated::SimulatedCamera;

use crate::error::{CameraError, StepDirection};
use crate::frame::PreviewFrame;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// ISO, aperture and exposure as the camera names them
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraSettings {
    pub iso: String,
    pub aperture: String,
    pub exposure: String,
}

/// Capabilities the bracketing core needs from a tethered camera.
///
/// Every call may fail; implementations report failures and never retry on
/// their own. Calls that change hardware state must go through a
/// [`CameraHandle`] so only one of them runs at a time.
pub trait CameraControl: Send {
    /// Human readable model name
    fn name(&self) -> &str;

    fn is_connected(&self) -> bool;

    fn current_iso(&mut self) -> Result<String, CameraError>;
    fn current_aperture(&mut self) -> Result<String, CameraError>;
    fn current_exposure(&mut self) -> Result<String, CameraError>;

    fn set_iso(&mut self, value: &str) -> Result<(), CameraError>;
    fn set_aperture(&mut self, value: &str) -> Result<(), CameraError>;
    fn set_exposure(&mut self, value: &str) -> Result<(), CameraError>;

    /// Exposure values the camera accepts, darkest first
    fn exposure_scale(&self) -> &ExposureScale;

    /// Grab one live-view frame
    fn capture_preview(&mut self) -> Result<PreviewFrame, CameraError>;

    /// Take a full resolution shot and store it at `base_path` plus the
    /// camera's file extension. Returns the written path.
    fn capture_shot(&mut self, base_path: &Path) -> Result<PathBuf, CameraError>;

    /// Move one stop darker than `from` and return the new exposure
    fn step_exposure_down(&mut self, from: &str) -> Result<String, CameraError> {
        let next = self
            .exposure_scale()
            .darker(from)
            .map(str::to_owned)
            .ok_or(CameraError::LimitReached {
                direction: StepDirection::Darker,
            })?;
        self.set_exposure(&next)?;
        Ok(next)
    }

    /// Move one stop brighter than `from` and return the new exposure
    fn step_exposure_up(&mut self, from: &str) -> Result<String, CameraError> {
        let next = self
            .exposure_scale()
            .brighter(from)
            .map(str::to_owned)
            .ok_or(CameraError::LimitReached {
                direction: StepDirection::Brighter,
            })?;
        self.set_exposure(&next)?;
        Ok(next)
    }

    fn settings(&mut self) -> Result<CameraSettings, CameraError> {
        Ok(CameraSettings {
            iso: self.current_iso()?,
            aperture: self.current_aperture()?,
            exposure: self.current_exposure()?,
        })
    }

    /// Apply ISO, aperture and exposure. An empty aperture is left alone
    /// since some lenses offer no remote aperture control.
    fn apply(&mut self, settings: &CameraSettings) -> Result<(), CameraError> {
        self.set_iso(&settings.iso)?;
        if !settings.aperture.is_empty() {
            self.set_aperture(&settings.aperture)?;
        }
        self.set_exposure(&settings.exposure)
    }
}
