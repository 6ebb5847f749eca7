use serde::Serialize;

/// What the session is currently doing with the camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Activity {
    Idle,
    Analyzing,
    Capturing,
    Composing,
}

impl std::fmt::Display for Activity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Activity::Idle => write!(f, "idle"),
            Activity::Analyzing => write!(f, "analyzing"),
            Activity::Capturing => write!(f, "capturing"),
            Activity::Composing => write!(f, "composing"),
        }
    }
}

/// System shutdown reason
#[derive(Debug, Clone, PartialEq)]
pub enum ShutdownReason {
    Signal(String),
    UserRequest,
}

impl std::fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownReason::Signal(name) => write!(f, "received {}", name),
            ShutdownReason::UserRequest => write!(f, "user request"),
        }
    }
}
