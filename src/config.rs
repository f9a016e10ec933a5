//! Fixed configuration for the capture, streaming and deployment tools.
//!
//! Every value has a compiled-in default; a handful can be overridden from
//! the environment so the tools can be pointed elsewhere without a rebuild.

use std::path::PathBuf;
use std::time::Duration;

use log::LevelFilter;

pub const OUTPUT_DIR: &str = "jetson_dataset";
pub const STREAM_PORT: u16 = 5000;
pub const MODEL_PATH: &str = "gesture_recognition_model.onnx";

pub const IMG_WIDTH: u32 = 128;
pub const IMG_HEIGHT: u32 = 128;
pub const JPEG_QUALITY: u8 = 85;
/// Percent confidence above which a prediction is shown as certain.
pub const CONFIDENCE_THRESHOLD: f32 = 70.0;

pub const CAMERA_INDEX: u32 = 0;
pub const CAMERA_WIDTH: u32 = 640;
pub const CAMERA_HEIGHT: u32 = 480;
pub const CAMERA_FPS: u32 = 30;
pub const MAX_READ_FAILURES: u32 = 100;
pub const MAX_INFERENCE_FAILURES: u32 = 100;

/// Pace of the streaming capture loop (~30 fps).
pub const STREAM_FRAME_INTERVAL: Duration = Duration::from_millis(30);
pub const NOT_READY_BACKOFF: Duration = Duration::from_millis(100);
pub const REPEAT_BACKOFF: Duration = Duration::from_millis(10);
pub const KEY_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Data folders handled by `unpack` when none are named.
pub const MOVEMENT_DIRS: [&str; 3] = [
    "Door movement data",
    "letter O movement data",
    "throwing ball movement data",
];

#[derive(Debug, Clone)]
pub struct CameraConfig {
    pub index: u32,
    /// Tried in order when `index` cannot be opened.
    pub fallback_indices: Vec<u32>,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// The CSI sensor is mounted upside down on the capture rig.
    pub rotate_180: bool,
    pub max_read_failures: u32,
    pub frame_interval: Option<Duration>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            index: env_parse("GESTURE_CAMERA_INDEX").unwrap_or(CAMERA_INDEX),
            fallback_indices: vec![0],
            width: CAMERA_WIDTH,
            height: CAMERA_HEIGHT,
            fps: CAMERA_FPS,
            rotate_180: false,
            max_read_failures: MAX_READ_FAILURES,
            frame_interval: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub port: u16,
    pub jpeg_quality: u8,
    pub not_ready_backoff: Duration,
    pub repeat_backoff: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            port: env_parse("GESTURE_STREAM_PORT").unwrap_or(STREAM_PORT),
            jpeg_quality: JPEG_QUALITY,
            not_ready_backoff: NOT_READY_BACKOFF,
            repeat_backoff: REPEAT_BACKOFF,
        }
    }
}

#[derive(Debug, Clone)]
pub struct InferenceConfig {
    pub model_path: PathBuf,
    pub input_width: u32,
    pub input_height: u32,
    /// Multiplier applied to raw 0..=255 channel values before inference.
    pub input_scale: f32,
    pub confidence_threshold: f32,
    /// Consecutive failed inferences before the model is given up on.
    pub max_failures: u32,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            model_path: std::env::var("GESTURE_MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(MODEL_PATH)),
            input_width: IMG_WIDTH,
            input_height: IMG_HEIGHT,
            input_scale: 1.0,
            confidence_threshold: CONFIDENCE_THRESHOLD,
            max_failures: MAX_INFERENCE_FAILURES,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub output_dir: PathBuf,
    pub log_level: LevelFilter,
    pub camera: CameraConfig,
    pub stream: StreamConfig,
    pub inference: InferenceConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output_dir: std::env::var("GESTURE_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(OUTPUT_DIR)),
            log_level: env_parse("GESTURE_LOG_LEVEL").unwrap_or(LevelFilter::Info),
            camera: CameraConfig::default(),
            stream: StreamConfig::default(),
            inference: InferenceConfig::default(),
        }
    }
}

impl AppConfig {
    /// Settings of the dataset capture tools: flipped sensor, optional pacing.
    pub fn for_capture(mut self, paced: bool) -> Self {
        self.camera.rotate_180 = true;
        if paced {
            self.camera.frame_interval = Some(STREAM_FRAME_INTERVAL);
        }
        self
    }

    /// Settings of the live deployment: unflipped sensor, unpaced.
    pub fn for_deploy(mut self) -> Self {
        self.camera.rotate_180 = false;
        self.camera.frame_interval = None;
        self
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
