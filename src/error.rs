// Crate error type. Every variant states *where* things went wrong.
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Creating the window failed
    #[error("Window init error: {0}")]
    WindowInit(String),

    /// Updating the window buffer failed
    #[error("Window update error: {0}")]
    WindowUpdate(String),

    /// Opening/starting the camera failed
    #[error("Camera init error: {0}")]
    CameraInit(String),

    /// Grabbing/decoding a frame failed
    #[error("Camera frame error: {0}")]
    CameraFrame(String),

    /// Degenerate geometry or raster sizes
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The vision engine is missing or one of its operations failed
    #[error("Vision engine error: {0}")]
    Vision(String),

    /// Face model could not be loaded or run
    #[error("Face model error: {0}")]
    FaceModel(String),

    /// JPEG encoding of the still failed
    #[error("Encode error: {0}")]
    Encode(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
