//! Error types for pixdust.
//!
//! Only a handful of operations can fail: decoding an image, projecting a
//! pointer onto the hit-plane, loading a configuration file, and assembling a
//! [`Controller`](crate::Controller) without its collaborators. Everything that
//! runs once per frame is total and never returns one of these.

use thiserror::Error;

/// Errors that can occur while turning an image reference into pixels.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The image could not be read from disk.
    #[error("failed to read image '{reference}': {source}")]
    Io {
        reference: String,
        #[source]
        source: std::io::Error,
    },
    /// The bytes were read but are not a supported or valid image.
    #[error("failed to decode image '{reference}': {source}")]
    Image {
        reference: String,
        #[source]
        source: image::ImageError,
    },
    /// The image decoded to zero width or height.
    #[error("image '{reference}' has no pixels")]
    Empty { reference: String },
    /// Raw pixel data does not match the stated dimensions.
    #[error("pixel buffer holds {actual} bytes, expected {expected}")]
    SizeMismatch { expected: usize, actual: usize },
    /// No image is registered under this reference.
    #[error("no image registered for '{reference}'")]
    NotFound { reference: String },
}

impl DecodeError {
    /// Wrap an `image` crate error, routing I/O failures to [`DecodeError::Io`].
    pub fn from_image(reference: impl Into<String>, err: image::ImageError) -> Self {
        let reference = reference.into();
        match err {
            image::ImageError::IoError(source) => DecodeError::Io { reference, source },
            source => DecodeError::Image { reference, source },
        }
    }
}

/// Errors from projecting a pointer onto the field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProjectError {
    /// The pointer ray misses the hit-plane, or hits it outside its bounds.
    #[error("pointer ray does not intersect the hit-plane")]
    NoIntersection,
}

/// Errors that can occur when loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    /// The file is not valid configuration JSON.
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Errors raised while assembling a controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// A required collaborator was not supplied to the builder.
    #[error("missing required collaborator: {0}")]
    MissingCollaborator(&'static str),
}
