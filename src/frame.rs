use crate::error::CameraError;
use std::sync::Arc;
use std::time::SystemTime;

/// Bytes per pixel of a decoded preview (RGB24)
pub const RGB_BYTES_PER_PIXEL: usize = 3;

/// Decoded live-view frame
#[derive(Debug, Clone)]
pub struct PreviewFrame {
    /// Monotonic frame identifier assigned by the live-view producer
    pub id: u64,
    /// Timestamp when frame was captured
    pub timestamp: SystemTime,
    /// RGB24 pixel data, row major (shared ownership for efficiency)
    pub data: Arc<Vec<u8>>,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Exposure the camera reported when the frame was taken
    pub exposure: Option<String>,
}

impl PreviewFrame {
    /// Create a new frame from RGB24 data
    pub fn new(id: u64, data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            id,
            timestamp: SystemTime::now(),
            data: Arc::new(data),
            width,
            height,
            exposure: None,
        }
    }

    /// A frame with no pixels, as delivered by a camera that has no live view yet
    pub fn empty(id: u64) -> Self {
        Self::new(id, Vec::new(), 0, 0)
    }

    /// Tag the frame with the exposure in effect when it was taken
    pub fn with_exposure<S: Into<String>>(mut self, exposure: S) -> Self {
        self.exposure = Some(exposure.into());
        self
    }

    /// Decode a JPEG (or any format enabled on the `image` crate) preview
    pub fn decode(id: u64, bytes: &[u8]) -> Result<Self, CameraError> {
        let decoded = image::load_from_memory(bytes).map_err(|e| CameraError::CaptureFailed {
            details: format!("preview decode failed: {}", e),
        })?;
        let rgb = decoded.to_rgb8();
        let (width, height) = rgb.dimensions();

        Ok(Self::new(id, rgb.into_raw(), width, height))
    }

    /// Whether the frame carries no measurable area
    pub fn is_empty_area(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Number of pixels the frame claims to hold
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Validate frame data size against the declared dimensions
    pub fn validate_size(&self) -> bool {
        self.data.len() == self.pixel_count() * RGB_BYTES_PER_PIXEL
    }

    /// Iterate over pixels as `[r, g, b]`
    pub fn pixels(&self) -> impl Iterator<Item = [u8; 3]> + '_ {
        self.data
            .chunks_exact(RGB_BYTES_PER_PIXEL)
            .map(|px| [px[0], px[1], px[2]])
    }
}
