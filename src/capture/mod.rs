mod metadata;
mod runner;
mod session;

pub use metadata::{CaptureMetadata, ShotRecord, METADATA_FILE_NAME};
pub use runner::{CaptureOutcome, CaptureProgress, CaptureRunner};
pub use session::CaptureSession;
