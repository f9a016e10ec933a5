use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, GestureError>;

#[derive(Debug, thiserror::Error)]
pub enum GestureError {
    #[error("could not open camera: {0}")]
    CameraOpen(String),

    #[error("frame read failed: {0}")]
    FrameRead(String),

    #[error("failed to load model {path}: {reason}")]
    ModelLoad { path: PathBuf, reason: String },

    /// The archive is not a readable zip file.
    #[error("{0} is a bad zip file")]
    BadArchive(PathBuf),

    #[error("error processing {path}: {reason}")]
    Archive { path: PathBuf, reason: String },

    #[error("inference failed: {0}")]
    Inference(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),
}
