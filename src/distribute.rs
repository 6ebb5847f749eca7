//! Spreading shots between the two boundaries of a bracket.

use crate::camera::ExposureScale;
use crate::error::DistributeError;
use crate::shots::{ShotList, ShotParameters};
use tracing::debug;

/// Number of shots needed between the boundaries so that no two neighbours
/// are more than `gap` steps apart. May be negative for close boundaries.
pub fn intermediate_count(stops: usize, gap: usize) -> isize {
    let mut n = (stops / gap) as isize - 1;
    if stops % gap != 0 {
        n += 1;
    }
    n
}

/// Build the ordered shot list from the darker boundary `first` to the
/// brighter boundary `last`, `stops` scale steps apart.
///
/// * no travel at all collapses the bracket to a single shot
/// * otherwise intermediates are taken every `gap` steps from `first`
/// * a bracket needing more than `max_shots` shots fails as a whole
///
/// Intermediates copy ISO and aperture from `first`.
pub fn distribute(
    first: &ShotParameters,
    last: &ShotParameters,
    stops: usize,
    gap: usize,
    max_shots: usize,
    scale: &ExposureScale,
) -> Result<ShotList, DistributeError> {
    if stops == 0 {
        debug!("No exposure travel, sequence collapses to {}", first.exposure);
        return Ok(vec![first.clone()]);
    }

    if gap == 0 {
        return Err(DistributeError::InvalidGap);
    }

    let n = intermediate_count(stops, gap);
    if n > max_shots as isize - 2 {
        return Err(DistributeError::MaximumShotsExceeded {
            required: (n + 2) as usize,
            max: max_shots,
        });
    }

    let mut shots = Vec::with_capacity((n.max(0) + 2) as usize);
    shots.push(first.clone());

    if n > 0 {
        let exposures = scale
            .walk(&first.exposure, &last.exposure, gap)
            .ok_or_else(|| {
                let value = if scale.position(&first.exposure).is_none() {
                    first.exposure.clone()
                } else {
                    last.exposure.clone()
                };
                DistributeError::UnknownExposure { value }
            })?;
        shots.extend(exposures.into_iter().map(|e| first.with_exposure(e)));
    }

    shots.push(last.clone());

    debug!(
        "Sequence needs {} shots: {}",
        shots.len(),
        shots
            .iter()
            .map(|s| s.exposure.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    );

    Ok(shots)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scale(len: usize) -> ExposureScale {
        ExposureScale::new((0..len).map(|i| format!("e{}", i)))
    }

    fn shot(exposure: &str) -> ShotParameters {
        ShotParameters::new("100", "8", exposure)
    }

    fn exposures(shots: &ShotList) -> Vec<&str> {
        shots.iter().map(|s| s.exposure.as_str()).collect()
    }

    #[test]
    fn test_intermediate_count_rounds_up() {
        assert_eq!(intermediate_count(12, 6), 1);
        assert_eq!(intermediate_count(13, 6), 2);
        assert_eq!(intermediate_count(6, 6), 0);
        assert_eq!(intermediate_count(7, 6), 1);
        assert_eq!(intermediate_count(3, 6), 0);
    }

    #[test]
    fn test_zero_stops_collapses_to_one_shot() {
        let shots = distribute(&shot("e4"), &shot("e4"), 0, 6, 10, &scale(10)).unwrap();
        assert_eq!(exposures(&shots), vec!["e4"]);
    }

    #[test]
    fn test_close_boundaries_need_no_intermediates() {
        let shots = distribute(&shot("e2"), &shot("e6"), 4, 6, 10, &scale(10)).unwrap();
        assert_eq!(exposures(&shots), vec!["e2", "e6"]);
    }

    #[test]
    fn test_intermediates_follow_scale_order() {
        let shots = distribute(&shot("e1"), &shot("e18"), 17, 6, 10, &scale(20)).unwrap();
        assert_eq!(exposures(&shots), vec!["e1", "e7", "e13", "e18"]);
        assert_eq!(shots[1].iso, "100");
        assert!(shots[1].preview.is_none());
    }

    #[test]
    fn test_no_gap_exceeds_configured_gap() {
        let scale = scale(40);
        for stops in 1..30 {
            let shots = distribute(
                &shot("e0"),
                &shot(&format!("e{}", stops)),
                stops,
                4,
                40,
                &scale,
            )
            .unwrap();
            let positions: Vec<usize> = shots
                .iter()
                .map(|s| scale.position(&s.exposure).unwrap())
                .collect();
            assert!(positions.windows(2).all(|w| w[1] > w[0] && w[1] - w[0] <= 4));
        }
    }

    #[test]
    fn test_exceeding_maximum_fails_instead_of_truncating() {
        let result = distribute(&shot("e0"), &shot("e9"), 9, 1, 4, &scale(10));
        assert_eq!(
            result.unwrap_err(),
            DistributeError::MaximumShotsExceeded {
                required: 10,
                max: 4
            }
        );
    }

    #[test]
    fn test_two_shot_maximum_rejects_any_intermediate() {
        assert!(distribute(&shot("e0"), &shot("e7"), 7, 6, 2, &scale(10)).is_err());
        assert!(distribute(&shot("e0"), &shot("e6"), 6, 6, 2, &scale(10)).is_ok());
    }

    #[test]
    fn test_distribution_is_deterministic() {
        let scale = scale(30);
        let a = distribute(&shot("e3"), &shot("e25"), 22, 5, 10, &scale).unwrap();
        let b = distribute(&shot("e3"), &shot("e25"), 22, 5, 10, &scale).unwrap();
        assert_eq!(exposures(&a), exposures(&b));
    }

    #[test]
    fn test_unknown_boundary_is_reported() {
        let result = distribute(&shot("e0"), &shot("x"), 12, 3, 10, &scale(10));
        assert_eq!(
            result.unwrap_err(),
            DistributeError::UnknownExposure {
                value: "x".to_string()
            }
        );
    }

    #[test]
    fn test_zero_gap_rejected() {
        assert_eq!(
            distribute(&shot("e0"), &shot("e5"), 5, 0, 10, &scale(10)).unwrap_err(),
            DistributeError::InvalidGap
        );
    }
}
