use thiserror::Error;

#[derive(Error, Debug)]
pub enum AutoHdrError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Deserialization error: {0}")]
    Deserialization(#[from] toml::de::Error),

    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("Sequence error: {0}")]
    Sequence(#[from] SequenceError),

    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Composition error: {0}")]
    Composition(#[from] CompositionError),

    #[error("Cannot start {requested} while {current}")]
    Busy { requested: String, current: String },

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

impl AutoHdrError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component<C: Into<String>, M: Into<String>>(component: C, message: M) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }
}

/// Direction of an exposure step on the camera scale
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepDirection {
    Darker,
    Brighter,
}

impl std::fmt::Display for StepDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepDirection::Darker => write!(f, "darker"),
            StepDirection::Brighter => write!(f, "brighter"),
        }
    }
}

/// Errors reported by a camera implementation
#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Camera is disconnected")]
    Disconnected,

    #[error("No {direction} exposure available on the camera scale")]
    LimitReached { direction: StepDirection },

    #[error("Unknown {parameter} value '{value}'")]
    UnknownValue { parameter: String, value: String },

    #[error("Camera rejected {parameter}={value}: {details}")]
    Rejected {
        parameter: String,
        value: String,
        details: String,
    },

    #[error("Capture failed: {details}")]
    CaptureFailed { details: String },

    #[error("Camera IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors terminating an analysis run
#[derive(Error, Debug)]
pub enum SequenceError {
    #[error("Reached camera under-exposition limit")]
    UnderExposureLimit,

    #[error("Reached maximum exposition")]
    MaximumExposure,

    #[error("{0}")]
    Distribution(#[from] DistributeError),

    #[error("Analysis is already running")]
    NotIdle,

    #[error("Analysis aborted")]
    Aborted,

    #[error("Frame source closed before analysis completed")]
    FrameSourceClosed,

    #[error("Camera error during analysis: {0}")]
    Camera(#[from] CameraError),

    #[error("{cause}; camera parameters could not be restored: {details}")]
    RestoreFailed {
        cause: Box<SequenceError>,
        details: String,
    },
}

/// Errors computing the shots between two boundaries
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DistributeError {
    #[error("Maximum shots in sequence exceeded ({required} needed, {max} allowed)")]
    MaximumShotsExceeded { required: usize, max: usize },

    #[error("Shot gap must be at least one step")]
    InvalidGap,

    #[error("Exposure '{value}' is not on the camera scale")]
    UnknownExposure { value: String },
}

/// Errors terminating a capture run
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Sequence capture failed at shot {} of {total}: {source}", .index + 1)]
    ShotFailed {
        index: usize,
        total: usize,
        #[source]
        source: CameraError,
    },

    #[error("Sequence has no shots to capture")]
    EmptySequence,

    #[error("Camera error during capture: {0}")]
    Camera(#[from] CameraError),

    #[error("Capture worker failed: {details}")]
    Worker { details: String },

    #[error("Capture folder error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors reported by the external composition tool
#[derive(Error, Debug)]
pub enum CompositionError {
    #[error("Failed to start HDR composition with '{program}': {source}")]
    FailedToStart {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("HDR composition with '{program}' crashed")]
    Crashed { program: String },

    #[error("No captured shots to compose")]
    NoInputs,
}

pub type Result<T> = std::result::Result<T, AutoHdrError>;

/// Event bus errors
#[derive(Error, Debug)]
pub enum EventBusError {
    #[error("Failed to publish event: {details}")]
    PublishFailed { details: String },

    #[error("Receiver lagged behind by {skipped} events")]
    Lagged { skipped: u64 },

    #[error("Event bus channel closed")]
    ChannelClosed,
}
