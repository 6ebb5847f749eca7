use crate::exposure::Thresholds;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct AutoHdrConfig {
    pub camera: CameraConfig,
    pub analysis: AnalysisConfig,
    pub capture: CaptureConfig,
    pub composition: CompositionConfig,
    pub liveview: LiveViewConfig,
    pub simulation: SimulationConfig,
    pub system: SystemConfig,
}

/// Camera-specific names of the bracketed parameters
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CameraConfig {
    #[serde(default = "default_iso_key")]
    pub iso_key: String,

    #[serde(default = "default_aperture_key")]
    pub aperture_key: String,

    #[serde(default = "default_exposure_key")]
    pub exposure_key: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AnalysisConfig {
    /// A pixel with any channel at or above this value is over-exposed
    #[serde(default = "default_white_threshold")]
    pub white_threshold: u8,

    /// A pixel with all channels at or below this value is under-exposed
    #[serde(default = "default_black_threshold")]
    pub black_threshold: u8,

    /// Maximum gap between two shots, in EV
    #[serde(default = "default_ev_gap")]
    pub ev_gap: u32,

    /// Camera scale steps per EV
    #[serde(default = "default_ev_steps")]
    pub ev_steps: u32,

    /// Over-exposed percentage accepted in the darkest shot
    #[serde(default = "default_lower_criteria")]
    pub lower_criteria: i64,

    /// Under-exposed percentage accepted in the brightest shot
    #[serde(default = "default_upper_criteria")]
    pub upper_criteria: i64,

    /// Maximum number of shots in a sequence, boundaries included
    #[serde(default = "default_max_shots")]
    pub max_shots: i64,

    /// Exposure the brighter search must never reach
    #[serde(default)]
    pub max_exposure: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CaptureConfig {
    /// Folder receiving captured shots
    #[serde(default = "default_folder")]
    pub folder: String,

    /// Shot file name prefix, followed by the shot index
    #[serde(default = "default_shot_prefix")]
    pub shot_prefix: String,

    /// Store each capture run in its own timestamped subfolder
    #[serde(default)]
    pub session_subfolder: bool,

    /// Write a JSON record of the captured shots next to them
    #[serde(default = "default_save_metadata")]
    pub save_metadata: bool,
}

impl CaptureConfig {
    /// File name of the n-th shot, without extension
    pub fn shot_name(&self, index: usize) -> String {
        format!("{}{}", self.shot_prefix, index)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CompositionConfig {
    /// Folder receiving HDR and LDR results
    #[serde(default = "default_folder")]
    pub folder: String,

    /// External merge tool
    #[serde(default = "default_composition_program")]
    pub program: String,

    #[serde(default = "default_hdr_file_name")]
    pub hdr_file_name: String,

    #[serde(default = "default_ldr_file_name")]
    pub ldr_file_name: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LiveViewConfig {
    /// Delay between two preview captures
    #[serde(default = "default_liveview_interval_ms")]
    pub interval_ms: u64,

    /// Frames buffered between the live view and the analysis
    #[serde(default = "default_frame_channel_capacity")]
    pub frame_channel_capacity: usize,
}

/// Built-in simulated camera
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SimulationConfig {
    /// Exposure values, darkest first
    #[serde(default = "default_sim_exposures")]
    pub exposures: Vec<String>,

    #[serde(default = "default_sim_start_exposure")]
    pub start_exposure: String,

    #[serde(default = "default_sim_iso")]
    pub iso: String,

    #[serde(default = "default_sim_aperture")]
    pub aperture: String,

    /// Scale steps per EV of the simulated camera
    #[serde(default = "default_ev_steps")]
    pub steps_per_ev: u32,

    /// Scene dynamic range in EV
    #[serde(default = "default_sim_scene_stops")]
    pub scene_stops: f32,

    /// Preview frames needed before a new exposure shows in the live view
    #[serde(default = "default_sim_settle_frames")]
    pub settle_frames: u32,

    /// Preview resolution (width, height)
    #[serde(default = "default_sim_preview_size")]
    pub preview_size: (u32, u32),
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SystemConfig {
    /// Event bus capacity
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,
}

impl AutoHdrConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("autohdr.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        // Missing sections and keys fall back to serde defaults
        let settings = Config::builder()
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // Add environment variables with AUTOHDR_ prefix
            .add_source(
                Environment::with_prefix("AUTOHDR")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: AutoHdrConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.analysis.black_threshold >= self.analysis.white_threshold {
            return Err(ConfigError::Message(
                "Black threshold must be lower than white threshold".to_string(),
            ));
        }

        if self.analysis.ev_gap == 0 || self.analysis.ev_steps == 0 {
            return Err(ConfigError::Message(
                "Analysis ev_gap and ev_steps must be greater than 0".to_string(),
            ));
        }

        if self
            .analysis
            .ev_gap
            .checked_mul(self.analysis.ev_steps)
            .is_none()
        {
            return Err(ConfigError::Message(format!(
                "Shot gap of {} EV at {} steps per EV is out of range",
                self.analysis.ev_gap, self.analysis.ev_steps
            )));
        }

        if [
            &self.camera.iso_key,
            &self.camera.aperture_key,
            &self.camera.exposure_key,
        ]
        .iter()
        .any(|key| key.trim().is_empty())
        {
            return Err(ConfigError::Message(
                "Camera parameter names must not be empty".to_string(),
            ));
        }

        if self.analysis.max_shots < 2 {
            return Err(ConfigError::Message(
                "A sequence needs at least 2 shots".to_string(),
            ));
        }

        if self.capture.shot_prefix.is_empty() {
            return Err(ConfigError::Message(
                "Capture shot_prefix must not be empty".to_string(),
            ));
        }

        if self.liveview.frame_channel_capacity == 0 {
            return Err(ConfigError::Message(
                "Live view frame channel capacity must be greater than 0".to_string(),
            ));
        }

        if self.system.event_bus_capacity == 0 {
            return Err(ConfigError::Message(
                "Event bus capacity must be greater than 0".to_string(),
            ));
        }

        if self.simulation.exposures.is_empty() {
            return Err(ConfigError::Message(
                "Simulated exposure scale must not be empty".to_string(),
            ));
        }

        if !self
            .simulation
            .exposures
            .contains(&self.simulation.start_exposure)
        {
            return Err(ConfigError::Message(format!(
                "Simulated start exposure '{}' is not on the exposure scale",
                self.simulation.start_exposure
            )));
        }

        Ok(())
    }

    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            white: self.analysis.white_threshold,
            black: self.analysis.black_threshold,
        }
    }

    /// Spacing between shots, in camera scale steps
    pub fn shot_gap(&self) -> usize {
        (self.analysis.ev_gap as usize).saturating_mul(self.analysis.ev_steps as usize)
    }

    /// File name of the n-th shot, without extension
    pub fn shot_name(&self, index: usize) -> String {
        self.capture.shot_name(index)
    }

    pub fn capture_folder(&self) -> PathBuf {
        PathBuf::from(&self.capture.folder)
    }

    pub fn hdr_output(&self) -> PathBuf {
        PathBuf::from(&self.composition.folder).join(&self.composition.hdr_file_name)
    }

    pub fn ldr_output(&self) -> PathBuf {
        PathBuf::from(&self.composition.folder).join(&self.composition.ldr_file_name)
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            iso_key: default_iso_key(),
            aperture_key: default_aperture_key(),
            exposure_key: default_exposure_key(),
        }
    }
}

impl Default for AutoHdrConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig::default(),
            analysis: AnalysisConfig {
                white_threshold: default_white_threshold(),
                black_threshold: default_black_threshold(),
                ev_gap: default_ev_gap(),
                ev_steps: default_ev_steps(),
                lower_criteria: default_lower_criteria(),
                upper_criteria: default_upper_criteria(),
                max_shots: default_max_shots(),
                max_exposure: None,
            },
            capture: CaptureConfig {
                folder: default_folder(),
                shot_prefix: default_shot_prefix(),
                session_subfolder: false,
                save_metadata: default_save_metadata(),
            },
            composition: CompositionConfig {
                folder: default_folder(),
                program: default_composition_program(),
                hdr_file_name: default_hdr_file_name(),
                ldr_file_name: default_ldr_file_name(),
            },
            liveview: LiveViewConfig {
                interval_ms: default_liveview_interval_ms(),
                frame_channel_capacity: default_frame_channel_capacity(),
            },
            simulation: SimulationConfig {
                exposures: default_sim_exposures(),
                start_exposure: default_sim_start_exposure(),
                iso: default_sim_iso(),
                aperture: default_sim_aperture(),
                steps_per_ev: default_ev_steps(),
                scene_stops: default_sim_scene_stops(),
                settle_frames: default_sim_settle_frames(),
                preview_size: default_sim_preview_size(),
            },
            system: SystemConfig {
                event_bus_capacity: default_event_bus_capacity(),
            },
        }
    }
}

// Default value functions
fn default_iso_key() -> String {
    "iso".to_string()
}
fn default_aperture_key() -> String {
    "aperture".to_string()
}
fn default_exposure_key() -> String {
    "shutterspeed".to_string()
}

fn default_white_threshold() -> u8 {
    254
}
fn default_black_threshold() -> u8 {
    5
}
fn default_ev_gap() -> u32 {
    2
}
fn default_ev_steps() -> u32 {
    3
}
fn default_lower_criteria() -> i64 {
    5
}
fn default_upper_criteria() -> i64 {
    5
}
fn default_max_shots() -> i64 {
    10
}

fn default_folder() -> String {
    ".".to_string()
}
fn default_shot_prefix() -> String {
    "Image_".to_string()
}
fn default_save_metadata() -> bool {
    true
}

fn default_composition_program() -> String {
    "luminance-hdr-cli".to_string()
}
fn default_hdr_file_name() -> String {
    "hdr_result.tif".to_string()
}
fn default_ldr_file_name() -> String {
    "ldr_result.tif".to_string()
}

fn default_liveview_interval_ms() -> u64 {
    100
}
fn default_frame_channel_capacity() -> usize {
    2
}

/// Third-stop shutter speeds from 1/4000 s to 30 s
pub fn default_sim_exposures() -> Vec<String> {
    [
        "1/4000", "1/3200", "1/2500", "1/2000", "1/1600", "1/1250", "1/1000", "1/800", "1/640",
        "1/500", "1/400", "1/320", "1/250", "1/200", "1/160", "1/125", "1/100", "1/80", "1/60",
        "1/50", "1/40", "1/30", "1/25", "1/20", "1/15", "1/13", "1/10", "1/8", "1/6", "1/5",
        "1/4", "0.3", "0.4", "0.5", "0.6", "0.8", "1", "1.3", "1.6", "2", "2.5", "3.2", "4", "5",
        "6", "8", "10", "13", "15", "20", "25", "30",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
fn default_sim_start_exposure() -> String {
    "1/60".to_string()
}
fn default_sim_iso() -> String {
    "100".to_string()
}
fn default_sim_aperture() -> String {
    "8".to_string()
}
fn default_sim_scene_stops() -> f32 {
    12.0
}
fn default_sim_settle_frames() -> u32 {
    1
}
fn default_sim_preview_size() -> (u32, u32) {
    (160, 120)
}

fn default_event_bus_capacity() -> usize {
    100
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AutoHdrConfig::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.shot_gap(), 6);
        assert_eq!(config.thresholds(), Thresholds { white: 254, black: 5 });
        assert_eq!(config.camera.exposure_key, "shutterspeed");
    }

    #[test]
    fn test_large_shot_gap_does_not_overflow() {
        let mut config = AutoHdrConfig::default();
        config.analysis.ev_gap = u32::MAX;
        config.analysis.ev_steps = 3;

        assert_eq!(
            config.shot_gap(),
            (u32::MAX as usize).saturating_mul(3)
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_camera_parameter_name_rejected() {
        let mut config = AutoHdrConfig::default();
        config.camera.exposure_key = " ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_shot_name() {
        let config = AutoHdrConfig::default();
        assert_eq!(config.shot_name(0), "Image_0");
        assert_eq!(config.shot_name(12), "Image_12");
    }

    #[test]
    fn test_output_paths() {
        let mut config = AutoHdrConfig::default();
        config.composition.folder = "/tmp/out".to_string();

        assert_eq!(config.hdr_output(), PathBuf::from("/tmp/out/hdr_result.tif"));
        assert_eq!(config.ldr_output(), PathBuf::from("/tmp/out/ldr_result.tif"));
    }

    #[test]
    fn test_config_validation() {
        let mut config = AutoHdrConfig::default();

        config.analysis.black_threshold = 254;
        assert!(config.validate().is_err());
        config.analysis.black_threshold = 5;

        config.analysis.ev_gap = 0;
        assert!(config.validate().is_err());
        config.analysis.ev_gap = 2;

        config.analysis.max_shots = 1;
        assert!(config.validate().is_err());
        config.analysis.max_shots = 10;

        config.simulation.start_exposure = "1/7".to_string();
        assert!(config.validate().is_err());
        config.simulation.start_exposure = "1/60".to_string();

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[analysis]
white_threshold = 250
ev_gap = 1

[capture]
folder = "/srv/shots"
"#
        )
        .unwrap();

        let config = AutoHdrConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.analysis.white_threshold, 250);
        assert_eq!(config.analysis.black_threshold, 5);
        assert_eq!(config.shot_gap(), 3);
        assert_eq!(config.capture.folder, "/srv/shots");
        assert_eq!(config.composition.program, "luminance-hdr-cli");
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = AutoHdrConfig::load_from_file("/nonexistent/autohdr.toml").unwrap();
        assert_eq!(config.analysis.max_shots, 10);
        assert_eq!(config.simulation.exposures.len(), default_sim_exposures().len());
    }
}
