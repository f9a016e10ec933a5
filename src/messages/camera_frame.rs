use std::sync::Arc;

use chrono::{DateTime, Local};
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;

use crate::error::Result;

/// One decoded RGB frame, immutable once produced.
#[derive(Clone, Debug)]
pub struct CameraFrame {
    captured_at: DateTime<Local>,
    image: Arc<RgbImage>,
}

impl CameraFrame {
    pub(crate) fn new(image: RgbImage) -> Self {
        Self::with_timestamp(Local::now(), image)
    }

    pub(crate) fn with_timestamp(captured_at: DateTime<Local>, image: RgbImage) -> Self {
        Self {
            captured_at,
            image: Arc::new(image),
        }
    }

    /// Uniform frame, used by synthetic sources.
    #[cfg(test)]
    pub(crate) fn filled(width: u32, height: u32, value: u8) -> Self {
        Self::new(RgbImage::from_pixel(width, height, image::Rgb([value; 3])))
    }

    pub fn captured_at(&self) -> DateTime<Local> {
        self.captured_at
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Baseline JPEG of the frame at `quality` (1..=100).
    pub fn to_jpeg(&self, quality: u8) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        JpegEncoder::new_with_quality(&mut buf, quality).encode_image(&*self.image)?;
        Ok(buf)
    }
}
