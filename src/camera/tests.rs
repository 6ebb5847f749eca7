use super::*;
use crate::config::{CameraConfig, SimulationConfig};
use crate::error::{CameraError, StepDirection};
use crate::exposure::{rate, ExposureKind, Thresholds};

fn create_test_simulation_config() -> SimulationConfig {
    SimulationConfig {
        exposures: ["1/1000", "1/500", "1/250", "1/125", "1/60", "1/30", "1/15"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        start_exposure: "1/125".to_string(),
        iso: "100".to_string(),
        aperture: "8".to_string(),
        steps_per_ev: 1,
        scene_stops: 8.0,
        settle_frames: 0,
        preview_size: (32, 4),
    }
}

#[test]
fn test_scale_neighbours() {
    let scale = ExposureScale::new(["1/500", "1/250", "1/125"]);

    assert_eq!(scale.darker("1/250"), Some("1/500"));
    assert_eq!(scale.brighter("1/250"), Some("1/125"));
    assert_eq!(scale.darker("1/500"), None);
    assert_eq!(scale.brighter("1/125"), None);
    assert_eq!(scale.darker("1/7"), None);
}

#[test]
fn test_scale_identity_ignores_whitespace() {
    let scale = ExposureScale::new(["1/500", "1/250"]);

    assert_eq!(scale.position(" 1/250 "), Some(1));
    assert!(scale.same_step("1/250", "1/250 "));
    assert!(!scale.same_step("1/250", "1/500"));
    assert_eq!(scale.distance("1/500", "1/250"), Some(1));
}

#[test]
fn test_scale_walk_both_directions() {
    let scale = ExposureScale::new((0..10).map(|i| i.to_string()));

    assert_eq!(scale.walk("1", "8", 3).unwrap(), vec!["4", "7"]);
    assert_eq!(scale.walk("8", "1", 3).unwrap(), vec!["5", "2"]);
    assert_eq!(scale.walk("2", "8", 6).unwrap(), Vec::<String>::new());
    assert!(scale.walk("2", "8", 0).is_none());
    assert!(scale.walk("2", "x", 1).is_none());
}

#[test]
fn test_step_limits() {
    let mut camera = SimulatedCamera::new(create_test_simulation_config()).unwrap();

    assert_eq!(camera.step_exposure_down("1/500").unwrap(), "1/1000");
    assert_eq!(camera.current_exposure().unwrap(), "1/1000");

    match camera.step_exposure_down("1/1000") {
        Err(CameraError::LimitReached { direction }) => {
            assert_eq!(direction, StepDirection::Darker)
        }
        other => panic!("expected limit error, got {:?}", other),
    }

    match camera.step_exposure_up("1/15") {
        Err(CameraError::LimitReached { direction }) => {
            assert_eq!(direction, StepDirection::Brighter)
        }
        other => panic!("expected limit error, got {:?}", other),
    }
}

#[test]
fn test_unknown_start_exposure_rejected() {
    let mut config = create_test_simulation_config();
    config.start_exposure = "1/7".to_string();
    assert!(SimulatedCamera::new(config).is_err());
}

#[test]
fn test_settle_frames_delay_live_view() {
    let mut config = create_test_simulation_config();
    config.settle_frames = 2;
    let mut camera = SimulatedCamera::new(config).unwrap();

    camera.set_exposure("1/30").unwrap();
    // Reported at once, rendered later
    assert_eq!(camera.current_exposure().unwrap(), "1/30");

    let first = camera.capture_preview().unwrap();
    assert_eq!(first.exposure.as_deref(), Some("1/125"));
    let second = camera.capture_preview().unwrap();
    assert_eq!(second.exposure.as_deref(), Some("1/125"));

    let third = camera.capture_preview().unwrap();
    assert_eq!(third.exposure.as_deref(), Some("1/30"));
}

#[test]
fn test_restore_reported_before_live_view_settles() {
    let mut config = create_test_simulation_config();
    config.settle_frames = 3;
    let handle = CameraHandle::new(SimulatedCamera::new(config).unwrap());
    let snapshot = handle.snapshot().unwrap();

    handle.lock().set_exposure("1/15").unwrap();
    for _ in 0..3 {
        handle.lock().capture_preview().unwrap();
    }
    let settled = handle.lock().capture_preview().unwrap();
    assert_eq!(settled.exposure.as_deref(), Some("1/15"));

    handle.restore(&snapshot).unwrap();
    // No preview needed for the restored value to be reported
    assert_eq!(handle.snapshot().unwrap().exposure, "1/125");
    let lagging = handle.lock().capture_preview().unwrap();
    assert_eq!(lagging.exposure.as_deref(), Some("1/15"));
}

#[test]
fn test_unknown_values_use_configured_parameter_names() {
    let names = CameraConfig {
        iso_key: "isospeed".to_string(),
        aperture_key: "f-number".to_string(),
        exposure_key: "shutterspeed2".to_string(),
    };
    let mut camera = SimulatedCamera::new(create_test_simulation_config())
        .unwrap()
        .with_parameter_names(&names);

    match camera.set_exposure("1/8000") {
        Err(CameraError::UnknownValue { parameter, value }) => {
            assert_eq!(parameter, "shutterspeed2");
            assert_eq!(value, "1/8000");
        }
        other => panic!("unexpected result {:?}", other),
    }
    assert!(matches!(
        camera.set_iso("3200"),
        Err(CameraError::UnknownValue { parameter, .. }) if parameter == "isospeed"
    ));
    assert!(matches!(
        camera.set_aperture("2.8"),
        Err(CameraError::UnknownValue { parameter, .. }) if parameter == "f-number"
    ));
}

#[test]
fn test_darker_exposure_reduces_clipping() {
    let mut camera = SimulatedCamera::new(create_test_simulation_config()).unwrap();
    let thresholds = Thresholds::default();

    let metered = camera.capture_preview().unwrap();
    camera.set_exposure("1/1000").unwrap();
    let darker = camera.capture_preview().unwrap();

    let metered_over = rate(&metered, thresholds, ExposureKind::Over).percent().unwrap();
    let darker_over = rate(&darker, thresholds, ExposureKind::Over).percent().unwrap();
    assert!(darker_over < metered_over);
}

#[test]
fn test_disconnect_fails_every_call() {
    let mut camera = SimulatedCamera::new(create_test_simulation_config())
        .unwrap()
        .disconnect_after(1);

    assert!(camera.capture_preview().is_ok());
    assert!(matches!(camera.capture_preview(), Err(CameraError::Disconnected)));
    assert!(!camera.is_connected());
    assert!(matches!(camera.current_exposure(), Err(CameraError::Disconnected)));
}

#[test]
fn test_capture_shot_writes_file_with_extension() {
    let dir = tempfile::tempdir().unwrap();
    let mut camera = SimulatedCamera::new(create_test_simulation_config()).unwrap();

    let path = camera.capture_shot(&dir.path().join("Image_0")).unwrap();
    assert_eq!(path, dir.path().join("Image_0.jpg"));
    assert!(path.exists());
    assert_eq!(camera.capture_count(), 1);
}

#[test]
fn test_capture_failure_injection() {
    let dir = tempfile::tempdir().unwrap();
    let mut camera = SimulatedCamera::new(create_test_simulation_config())
        .unwrap()
        .fail_capture_at(1);

    assert!(camera.capture_shot(&dir.path().join("a")).is_ok());
    assert!(matches!(
        camera.capture_shot(&dir.path().join("b")),
        Err(CameraError::CaptureFailed { .. })
    ));
}

#[test]
fn test_handle_snapshot_and_restore() {
    let handle = CameraHandle::new(SimulatedCamera::new(create_test_simulation_config()).unwrap());
    let snapshot = handle.snapshot().unwrap();
    assert_eq!(snapshot.exposure, "1/125");

    handle.lock().set_exposure("1/15").unwrap();
    assert_eq!(handle.lock().current_exposure().unwrap(), "1/15");

    handle.restore(&snapshot).unwrap();
    assert_eq!(handle.snapshot().unwrap(), snapshot);
}

#[test]
fn test_apply_skips_empty_aperture() {
    let mut camera = SimulatedCamera::new(create_test_simulation_config()).unwrap();
    let settings = CameraSettings {
        iso: "100".to_string(),
        aperture: String::new(),
        exposure: "1/60".to_string(),
    };

    camera.apply(&settings).unwrap();
    assert_eq!(camera.current_aperture().unwrap(), "8");
    assert_eq!(camera.current_exposure().unwrap(), "1/60");
}
