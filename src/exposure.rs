//! Exposure rating of live-view frames.
//!
//! A pixel is over-exposed when at least one of its color components reaches
//! the white threshold, and under-exposed when all of its components are at or
//! below the black threshold.

use crate::frame::PreviewFrame;
use serde::{Deserialize, Serialize};

/// Which exposure defect to measure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExposureKind {
    Over,
    Under,
}

/// Byte thresholds defining white and black pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Not far from 0xFF
    pub white: u8,
    /// Above zero because of sensor noise
    pub black: u8,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            white: 254,
            black: 5,
        }
    }
}

/// Result of rating a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExposureRating {
    /// Frame has no usable pixels yet; try again with the next frame
    NotReady,
    /// Share of matching pixels, 0..=100
    Percent(u8),
}

impl ExposureRating {
    pub fn percent(&self) -> Option<u8> {
        match self {
            ExposureRating::NotReady => None,
            ExposureRating::Percent(p) => Some(*p),
        }
    }
}

#[inline]
pub fn is_over_exposed(px: [u8; 3], white: u8) -> bool {
    px.iter().any(|&c| c >= white)
}

#[inline]
pub fn is_under_exposed(px: [u8; 3], black: u8) -> bool {
    px.iter().all(|&c| c <= black)
}

/// Rate a frame for over- or under-exposure.
///
/// Returns `NotReady` for zero-area frames and for frames whose buffer does not
/// hold `width * height` RGB pixels.
pub fn rate(frame: &PreviewFrame, thresholds: Thresholds, kind: ExposureKind) -> ExposureRating {
    if frame.is_empty_area() || !frame.validate_size() {
        return ExposureRating::NotReady;
    }

    let matching = match kind {
        ExposureKind::Over => frame
            .pixels()
            .filter(|&px| is_over_exposed(px, thresholds.white))
            .count(),
        ExposureKind::Under => frame
            .pixels()
            .filter(|&px| is_under_exposed(px, thresholds.black))
            .count(),
    };

    ExposureRating::Percent((matching * 100 / frame.pixel_count()) as u8)
}
