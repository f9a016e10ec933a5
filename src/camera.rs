use image::imageops;
use image::RgbImage;
use log::{debug, info, warn};
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    ApiBackend, CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution,
};
use nokhwa::{query, Camera};

use crate::config::CameraConfig;
use crate::error::{GestureError, Result};
use crate::messages::camera_frame::CameraFrame;

/// Pulls frames from a camera, a file or a test generator.
///
/// A failed read is reported per call; the source stays usable afterwards.
pub trait FrameSource {
    fn open(config: &CameraConfig) -> Result<Self>
    where
        Self: Sized;

    fn next_frame(&mut self) -> Result<CameraFrame>;
}

pub struct NokhwaSource {
    camera: Camera,
    rotate_180: bool,
}

impl NokhwaSource {
    fn open_index(index: u32, config: &CameraConfig) -> std::result::Result<Camera, String> {
        let format = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(CameraFormat::new(
            Resolution::new(config.width, config.height),
            FrameFormat::MJPEG,
            config.fps,
        )));
        let mut camera = Camera::new(CameraIndex::Index(index), format).map_err(|e| e.to_string())?;
        camera.open_stream().map_err(|e| e.to_string())?;
        Ok(camera)
    }
}

impl FrameSource for NokhwaSource {
    /// Opens the configured camera, then each fallback index in turn.
    fn open(config: &CameraConfig) -> Result<Self> {
        match query(ApiBackend::Auto) {
            Ok(devices) => devices
                .iter()
                .for_each(|d| debug!("Found camera {} ({})", d.human_name(), d.index())),
            Err(e) => debug!("Camera query failed: {}", e),
        }

        let mut candidates = vec![config.index];
        candidates.extend(config.fallback_indices.iter().filter(|&&i| i != config.index));

        let mut last_error = String::from("no camera index configured");
        for index in candidates {
            match Self::open_index(index, config) {
                Ok(camera) => {
                    info!("Camera {} opened with {}", index, camera.camera_format());
                    return Ok(Self { camera, rotate_180: config.rotate_180 });
                }
                Err(e) => {
                    warn!("Camera {} unavailable: {}", index, e);
                    last_error = e;
                }
            }
        }
        Err(GestureError::CameraOpen(last_error))
    }

    fn next_frame(&mut self) -> Result<CameraFrame> {
        let buffer = self.camera.frame().map_err(|e| GestureError::FrameRead(e.to_string()))?;
        let decoded = buffer
            .decode_image::<RgbFormat>()
            .map_err(|e| GestureError::FrameRead(e.to_string()))?;
        let (width, height) = (decoded.width(), decoded.height());
        let image = RgbImage::from_raw(width, height, decoded.into_raw())
            .ok_or_else(|| GestureError::FrameRead(format!("short frame buffer for {width}x{height}")))?;

        let image = if self.rotate_180 { imageops::rotate180(&image) } else { image };
        Ok(CameraFrame::new(image))
    }
}

impl Drop for NokhwaSource {
    fn drop(&mut self) {
        if let Err(e) = self.camera.stop_stream() {
            warn!("Failed to stop camera stream: {}", e);
        }
    }
}
