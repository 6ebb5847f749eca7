pub mod app;
pub mod camera;
pub mod capture;
pub mod composition;
pub mod config;
pub mod distribute;
pub mod error;
pub mod events;
pub mod exposure;
pub mod frame;
pub mod liveview;
pub mod sequence;
pub mod sequence_file;
pub mod shots;

pub use app::{Activity, ActivityTracker, AutoHdrSession, KeyboardInputHandler, ShutdownReason};
pub use camera::{CameraControl, CameraHandle, CameraSettings, ExposureScale, SimulatedCamera};
pub use capture::{CaptureMetadata, CaptureOutcome, CaptureProgress, CaptureRunner, CaptureSession};
pub use composition::{Composer, CompositionInvoker, CompositionOutcome};
pub use config::AutoHdrConfig;
pub use distribute::distribute;
pub use error::{
    AutoHdrError, CameraError, CaptureError, CompositionError, DistributeError, Result,
    SequenceError,
};
pub use events::{AutoHdrEvent, EventBus, EventFilter, EventReceiver};
pub use exposure::{rate, ExposureKind, ExposureRating, Thresholds};
pub use frame::PreviewFrame;
pub use liveview::LiveViewProducer;
pub use sequence::{
    AnalysisOutcome, AnalysisRunner, AnalysisSettings, Boundary, SequenceState,
    SequenceStateMachine, StepOutcome,
};
pub use sequence_file::{load_sequence, save_sequence};
pub use shots::{Criteria, Sequence, ShotList, ShotParameters};
