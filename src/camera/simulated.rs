use super::{CameraControl, ExposureScale};
use crate::config::{CameraConfig, SimulationConfig};
use crate::error::CameraError;
use crate::frame::PreviewFrame;
use image::RgbImage;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace, warn};

/// Camera without hardware, rendering a synthetic high-contrast scene.
///
/// The scene is a horizontal luminance ramp spanning `scene_stops` EV,
/// metered so that its middle renders mid-gray at the start exposure. Each
/// scale step changes exposure by `1 / steps_per_ev` EV. The camera reports a
/// newly set exposure at once, but the live view only renders and tags it
/// after `settle_frames` previews, the way a real body's preview stream lags
/// behind remote configuration changes.
pub struct SimulatedCamera {
    config: SimulationConfig,
    names: CameraConfig,
    scale: ExposureScale,
    reference_position: usize,
    iso: String,
    aperture: String,
    applied_exposure: String,
    pending_exposure: Option<(String, u32)>,
    connected: bool,
    preview_count: u64,
    capture_count: usize,
    fail_capture_at: Option<usize>,
    disconnect_after_previews: Option<u64>,
}

impl SimulatedCamera {
    pub fn new(config: SimulationConfig) -> Result<Self, CameraError> {
        let names = CameraConfig::default();
        let scale = ExposureScale::new(config.exposures.clone());
        let reference_position =
            scale
                .position(&config.start_exposure)
                .ok_or_else(|| CameraError::UnknownValue {
                    parameter: names.exposure_key.clone(),
                    value: config.start_exposure.clone(),
                })?;

        info!(
            "Simulated camera ready: {} exposures, start {}, scene {} EV",
            scale.len(),
            config.start_exposure,
            config.scene_stops
        );

        Ok(Self {
            iso: config.iso.clone(),
            aperture: config.aperture.clone(),
            applied_exposure: config.start_exposure.clone(),
            scale,
            reference_position,
            names,
            pending_exposure: None,
            connected: true,
            preview_count: 0,
            capture_count: 0,
            fail_capture_at: None,
            disconnect_after_previews: None,
            config,
        })
    }

    /// Report errors under the configured camera parameter names
    pub fn with_parameter_names(mut self, names: &CameraConfig) -> Self {
        self.names = names.clone();
        self
    }

    /// Make the n-th full resolution capture (0-based) fail
    pub fn fail_capture_at(mut self, index: usize) -> Self {
        self.fail_capture_at = Some(index);
        self
    }

    /// Drop the connection once `previews` live-view frames were delivered
    pub fn disconnect_after(mut self, previews: u64) -> Self {
        self.disconnect_after_previews = Some(previews);
        self
    }

    pub fn disconnect(&mut self) {
        warn!("Simulated camera disconnected");
        self.connected = false;
    }

    pub fn capture_count(&self) -> usize {
        self.capture_count
    }

    fn ensure_connected(&self) -> Result<(), CameraError> {
        if self.connected {
            Ok(())
        } else {
            Err(CameraError::Disconnected)
        }
    }

    /// Last exposure set, whether or not the live view shows it yet
    fn requested_exposure(&self) -> &str {
        match &self.pending_exposure {
            Some((exposure, _)) => exposure,
            None => &self.applied_exposure,
        }
    }

    /// EV offset of the applied exposure relative to the metered one
    fn ev_offset(&self) -> f32 {
        let position = self
            .scale
            .position(&self.applied_exposure)
            .unwrap_or(self.reference_position);
        (position as f32 - self.reference_position as f32) / self.config.steps_per_ev.max(1) as f32
    }

    fn settle(&mut self) {
        if let Some((exposure, remaining)) = self.pending_exposure.take() {
            if remaining <= 1 {
                trace!("Exposure {} reached the live view", exposure);
                self.applied_exposure = exposure;
            } else {
                self.pending_exposure = Some((exposure, remaining - 1));
            }
        }
    }

    /// Render the scene at the applied exposure
    fn render(&self, width: u32, height: u32) -> Vec<u8> {
        let stops = self.config.scene_stops;
        let ev = self.ev_offset();
        let mut row = Vec::with_capacity(width as usize * 3);

        for x in 0..width {
            let luminance = -stops / 2.0 + stops * (x as f32 + 0.5) / width as f32;
            let value = (128.0 * (luminance + ev).exp2()).clamp(0.0, 255.0) as u8;
            row.extend_from_slice(&[value, value, value]);
        }

        let mut data = Vec::with_capacity(row.len() * height as usize);
        for _ in 0..height {
            data.extend_from_slice(&row);
        }
        data
    }

    fn check_value(parameter: &str, value: &str, accepted: &str) -> Result<(), CameraError> {
        if value.trim() == accepted.trim() {
            Ok(())
        } else {
            Err(CameraError::UnknownValue {
                parameter: parameter.to_string(),
                value: value.to_string(),
            })
        }
    }
}

impl CameraControl for SimulatedCamera {
    fn name(&self) -> &str {
        "simulated"
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn current_iso(&mut self) -> Result<String, CameraError> {
        self.ensure_connected()?;
        Ok(self.iso.clone())
    }

    fn current_aperture(&mut self) -> Result<String, CameraError> {
        self.ensure_connected()?;
        Ok(self.aperture.clone())
    }

    fn current_exposure(&mut self) -> Result<String, CameraError> {
        self.ensure_connected()?;
        Ok(self.requested_exposure().to_string())
    }

    fn set_iso(&mut self, value: &str) -> Result<(), CameraError> {
        self.ensure_connected()?;
        Self::check_value(&self.names.iso_key, value, &self.config.iso)?;
        self.iso = value.to_string();
        Ok(())
    }

    fn set_aperture(&mut self, value: &str) -> Result<(), CameraError> {
        self.ensure_connected()?;
        Self::check_value(&self.names.aperture_key, value, &self.config.aperture)?;
        self.aperture = value.to_string();
        Ok(())
    }

    fn set_exposure(&mut self, value: &str) -> Result<(), CameraError> {
        self.ensure_connected()?;
        let position = self
            .scale
            .position(value)
            .ok_or_else(|| CameraError::UnknownValue {
                parameter: self.names.exposure_key.clone(),
                value: value.to_string(),
            })?;
        let exposure = self.scale.values()[position].clone();

        if self.scale.same_step(&exposure, &self.applied_exposure) {
            self.pending_exposure = None;
        } else if self.config.settle_frames == 0 {
            self.applied_exposure = exposure;
        } else {
            debug!(
                "{} {} pending for {} preview(s)",
                self.names.exposure_key, exposure, self.config.settle_frames
            );
            self.pending_exposure = Some((exposure, self.config.settle_frames));
        }
        Ok(())
    }

    fn exposure_scale(&self) -> &ExposureScale {
        &self.scale
    }

    fn capture_preview(&mut self) -> Result<PreviewFrame, CameraError> {
        self.ensure_connected()?;
        if let Some(limit) = self.disconnect_after_previews {
            if self.preview_count >= limit {
                self.disconnect();
                return Err(CameraError::Disconnected);
            }
        }

        let (width, height) = self.config.preview_size;
        let frame = PreviewFrame::new(self.preview_count, self.render(width, height), width, height)
            .with_exposure(self.applied_exposure.clone());
        self.preview_count += 1;
        self.settle();
        Ok(frame)
    }

    fn capture_shot(&mut self, base_path: &Path) -> Result<PathBuf, CameraError> {
        self.ensure_connected()?;
        let index = self.capture_count;
        self.capture_count += 1;

        if self.fail_capture_at == Some(index) {
            warn!("Simulated capture {} failing on request", index);
            return Err(CameraError::CaptureFailed {
                details: format!("simulated transfer failure on capture {}", index),
            });
        }

        // A shot is never taken before the requested exposure is in effect
        if let Some((exposure, _)) = self.pending_exposure.take() {
            self.applied_exposure = exposure;
        }

        let (width, height) = self.config.preview_size;
        let image = RgbImage::from_raw(width, height, self.render(width, height)).ok_or_else(|| {
            CameraError::CaptureFailed {
                details: "rendered buffer does not match preview size".to_string(),
            }
        })?;

        let mut path = OsString::from(base_path.as_os_str());
        path.push(".jpg");
        let path = PathBuf::from(path);

        image.save(&path).map_err(|e| CameraError::CaptureFailed {
            details: format!("could not write {}: {}", path.display(), e),
        })?;

        info!("Captured {}", path.display());
        Ok(path)
    }
}
