use crate::camera::CameraSettings;
use crate::frame::PreviewFrame;
use serde::Serialize;
use std::path::PathBuf;

/// One planned or captured exposure of a bracket
#[derive(Debug, Clone, Default)]
pub struct ShotParameters {
    pub iso: String,
    pub aperture: String,
    pub exposure: String,
    /// Live-view frame that qualified a boundary shot
    pub preview: Option<PreviewFrame>,
    /// File written by the capture runner
    pub path: Option<PathBuf>,
}

impl ShotParameters {
    pub fn new<S: Into<String>>(iso: S, aperture: S, exposure: S) -> Self {
        Self {
            iso: iso.into(),
            aperture: aperture.into(),
            exposure: exposure.into(),
            preview: None,
            path: None,
        }
    }

    /// Shot planned from the current camera settings
    pub fn from_settings(settings: &CameraSettings) -> Self {
        Self::new(
            settings.iso.as_str(),
            settings.aperture.as_str(),
            settings.exposure.as_str(),
        )
    }

    /// Same ISO and aperture, different exposure
    pub fn with_exposure<S: Into<String>>(&self, exposure: S) -> Self {
        Self {
            iso: self.iso.clone(),
            aperture: self.aperture.clone(),
            exposure: exposure.into(),
            preview: None,
            path: None,
        }
    }

    pub fn settings(&self) -> CameraSettings {
        CameraSettings {
            iso: self.iso.clone(),
            aperture: self.aperture.clone(),
            exposure: self.exposure.clone(),
        }
    }
}

/// Ordered shots, darkest boundary first
pub type ShotList = Vec<ShotParameters>;

/// Analysis criteria, clamped to valid percentages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Criteria {
    /// Maximum share of over-exposed pixels in the darkest shot
    lower_pct: u8,
    /// Maximum share of under-exposed pixels in the brightest shot
    upper_pct: u8,
    /// Maximum number of shots, boundaries included
    max_shots: usize,
}

pub const MIN_SHOTS: usize = 2;

fn clamp_percent(value: i64) -> u8 {
    value.clamp(1, 100) as u8
}

impl Criteria {
    /// Build criteria, clamping percentages into 1..=100 and shot count to at least 2
    pub fn new(lower: i64, upper: i64, max_shots: i64) -> Self {
        Self {
            lower_pct: clamp_percent(lower),
            upper_pct: clamp_percent(upper),
            max_shots: max_shots.max(MIN_SHOTS as i64) as usize,
        }
    }

    pub fn lower_pct(&self) -> u8 {
        self.lower_pct
    }

    pub fn upper_pct(&self) -> u8 {
        self.upper_pct
    }

    pub fn max_shots(&self) -> usize {
        self.max_shots
    }
}

impl Default for Criteria {
    fn default() -> Self {
        Self::new(5, 5, 10)
    }
}

/// Criteria plus the shot list they produced
#[derive(Debug, Clone, Default)]
pub struct Sequence {
    criteria: Criteria,
    shots: ShotList,
}

impl Sequence {
    pub fn new(criteria: Criteria) -> Self {
        Self {
            criteria,
            shots: Vec::new(),
        }
    }

    pub fn with_shots(criteria: Criteria, shots: ShotList) -> Self {
        Self { criteria, shots }
    }

    pub fn criteria(&self) -> Criteria {
        self.criteria
    }

    pub fn set_criteria(&mut self, lower: i64, upper: i64, max_shots: i64) {
        self.criteria = Criteria::new(lower, upper, max_shots);
    }

    pub fn push_shot(&mut self, shot: ShotParameters) {
        self.shots.push(shot);
    }

    pub fn shots(&self) -> &[ShotParameters] {
        &self.shots
    }

    pub fn shot(&self, index: usize) -> Option<&ShotParameters> {
        self.shots.get(index)
    }

    /// Attach a captured file to a shot; returns false for an unknown index
    pub fn set_shot_path(&mut self, index: usize, path: PathBuf) -> bool {
        match self.shots.get_mut(index) {
            Some(shot) => {
                shot.path = Some(path);
                true
            }
            None => false,
        }
    }

    /// Forget previously captured files so the sequence can be shot again
    pub fn clear_paths(&mut self) {
        for shot in &mut self.shots {
            shot.path = None;
        }
    }

    pub fn len(&self) -> usize {
        self.shots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shots.is_empty()
    }

    pub fn clear(&mut self) {
        self.shots.clear();
    }

    /// Captured files in shot order
    pub fn paths(&self) -> Vec<PathBuf> {
        self.shots.iter().filter_map(|s| s.path.clone()).collect()
    }

    pub fn exposures(&self) -> Vec<String> {
        self.shots.iter().map(|s| s.exposure.clone()).collect()
    }
}
