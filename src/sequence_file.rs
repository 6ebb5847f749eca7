use crate::error::{AutoHdrError, Result};
use crate::shots::{Criteria, Sequence, ShotParameters};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Serialize, Deserialize)]
struct SavedCriteria {
    lower: i64,
    upper: i64,
    max_nb: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct SavedShot {
    iso: String,
    #[serde(default)]
    aperture: String,
    exposure: String,
}

/// On-disk form of a sequence
#[derive(Debug, Serialize, Deserialize)]
struct SavedSequence {
    criteria: SavedCriteria,
    #[serde(default)]
    shots: Vec<SavedShot>,
}

impl From<&Sequence> for SavedSequence {
    fn from(sequence: &Sequence) -> Self {
        let criteria = sequence.criteria();
        Self {
            criteria: SavedCriteria {
                lower: criteria.lower_pct() as i64,
                upper: criteria.upper_pct() as i64,
                max_nb: criteria.max_shots() as i64,
            },
            shots: sequence
                .shots()
                .iter()
                .map(|shot| SavedShot {
                    iso: shot.iso.clone(),
                    aperture: shot.aperture.clone(),
                    exposure: shot.exposure.clone(),
                })
                .collect(),
        }
    }
}

impl From<SavedSequence> for Sequence {
    fn from(saved: SavedSequence) -> Self {
        let criteria = Criteria::new(
            saved.criteria.lower,
            saved.criteria.upper,
            saved.criteria.max_nb,
        );
        Sequence::with_shots(
            criteria,
            saved
                .shots
                .into_iter()
                .map(|shot| ShotParameters::new(shot.iso, shot.aperture, shot.exposure))
                .collect(),
        )
    }
}

/// Render a sequence as TOML; previews and captured paths are not kept
pub fn sequence_to_toml(sequence: &Sequence) -> Result<String> {
    Ok(toml::to_string_pretty(&SavedSequence::from(sequence))?)
}

pub fn sequence_from_toml(contents: &str) -> Result<Sequence> {
    let saved: SavedSequence = toml::from_str(contents)?;
    Ok(saved.into())
}

pub async fn save_sequence<P: AsRef<Path>>(path: P, sequence: &Sequence) -> Result<()> {
    let path = path.as_ref();
    let contents = sequence_to_toml(sequence)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, contents).await?;

    info!(
        "Saved sequence of {} shot(s) to {}",
        sequence.len(),
        path.display()
    );
    Ok(())
}

pub async fn load_sequence<P: AsRef<Path>>(path: P) -> Result<Sequence> {
    let path = path.as_ref();
    let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
        AutoHdrError::component(
            "sequence_file",
            format!("Cannot read {}: {}", path.display(), e),
        )
    })?;
    let sequence = sequence_from_toml(&contents)?;

    debug!(
        "Loaded sequence from {}: {:?}",
        path.display(),
        sequence.exposures()
    );
    Ok(sequence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn create_test_sequence() -> Sequence {
        let mut sequence = Sequence::new(Criteria::new(3, 7, 6));
        sequence.push_shot(ShotParameters::new("100", "8", "1/1600"));
        sequence.push_shot(ShotParameters::new("100", "8", "1/400"));
        sequence.push_shot(ShotParameters::new("100", "8", "1/100"));
        sequence
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("saved").join("bracket.toml");
        let mut sequence = create_test_sequence();
        sequence.set_shot_path(0, PathBuf::from("/tmp/Image_0.jpg"));

        save_sequence(&path, &sequence).await.unwrap();
        let loaded = load_sequence(&path).await.unwrap();

        assert_eq!(loaded.criteria(), Criteria::new(3, 7, 6));
        assert_eq!(loaded.exposures(), vec!["1/1600", "1/400", "1/100"]);
        assert!(loaded.paths().is_empty());
        assert!(loaded.shots().iter().all(|s| s.preview.is_none()));
    }

    #[test]
    fn test_file_layout() {
        let toml = sequence_to_toml(&create_test_sequence()).unwrap();
        assert!(toml.contains("[criteria]"));
        assert!(toml.contains("max_nb = 6"));
        assert!(toml.contains("[[shots]]"));
        assert!(toml.contains("exposure = \"1/400\""));
    }

    #[test]
    fn test_loaded_criteria_are_clamped() {
        let sequence = sequence_from_toml(
            r#"
[criteria]
lower = 0
upper = 250
max_nb = 1

[[shots]]
iso = "200"
exposure = "1/30"
"#,
        )
        .unwrap();

        assert_eq!(sequence.criteria().lower_pct(), 1);
        assert_eq!(sequence.criteria().upper_pct(), 100);
        assert_eq!(sequence.criteria().max_shots(), 2);
        assert_eq!(sequence.shot(0).unwrap().aperture, "");
    }

    #[test]
    fn test_missing_shots_is_an_empty_sequence() {
        let sequence =
            sequence_from_toml("[criteria]\nlower = 5\nupper = 5\nmax_nb = 10\n").unwrap();
        assert!(sequence.is_empty());
    }

    #[test]
    fn test_malformed_file_is_rejected() {
        let result = sequence_from_toml("[criteria]\nlower = \"five\"\n");
        assert!(matches!(result, Err(AutoHdrError::Deserialization(_))));
    }

    #[tokio::test]
    async fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_sequence(dir.path().join("none.toml")).await;
        assert!(matches!(result, Err(AutoHdrError::Component { .. })));
    }
}
