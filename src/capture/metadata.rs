use crate::error::AutoHdrError;
use crate::shots::Sequence;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

pub const METADATA_FILE_NAME: &str = "capture.json";

/// One shot as it ended up on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShotRecord {
    pub iso: String,
    pub aperture: String,
    pub exposure: String,
    pub path: Option<PathBuf>,
}

/// Record of a capture run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureMetadata {
    pub session_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub lower_pct: u8,
    pub upper_pct: u8,
    pub max_shots: usize,
    pub outcome: String,
    pub shots: Vec<ShotRecord>,
}

impl CaptureMetadata {
    pub fn new(
        session_id: Uuid,
        started_at: DateTime<Utc>,
        sequence: &Sequence,
        outcome: String,
    ) -> Self {
        let criteria = sequence.criteria();
        Self {
            session_id,
            started_at,
            finished_at: Utc::now(),
            lower_pct: criteria.lower_pct(),
            upper_pct: criteria.upper_pct(),
            max_shots: criteria.max_shots(),
            outcome,
            shots: sequence
                .shots()
                .iter()
                .map(|s| ShotRecord {
                    iso: s.iso.clone(),
                    aperture: s.aperture.clone(),
                    exposure: s.exposure.clone(),
                    path: s.path.clone(),
                })
                .collect(),
        }
    }

    /// Number of shots that have a file
    pub fn captured(&self) -> usize {
        self.shots.iter().filter(|s| s.path.is_some()).count()
    }
}

pub(crate) async fn save_metadata(
    metadata: &CaptureMetadata,
    folder: &Path,
) -> Result<PathBuf, AutoHdrError> {
    let metadata_json = serde_json::to_string_pretty(&metadata).map_err(|e| {
        AutoHdrError::component("capture", format!("Failed to serialize metadata: {}", e))
    })?;

    let metadata_path = folder.join(METADATA_FILE_NAME);
    fs::write(&metadata_path, metadata_json)
        .await
        .map_err(|e| {
            AutoHdrError::component("capture", format!("Failed to write metadata file: {}", e))
        })?;

    debug!("Saved capture metadata to {}", metadata_path.display());
    Ok(metadata_path)
}
