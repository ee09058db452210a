use atlas_core::AtlasError;
use thiserror::Error;

/// Failures of the capture-compose-export pipeline. Every variant ends the
/// current job only; the capturing flag is released by its guard.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("an export is already in progress")]
    Busy,

    #[error("instance '{0}' is not ready")]
    ResourceNotReady(String),

    #[error("rasterization failed: {0}")]
    Rasterization(String),

    /// The whole control overlay of a target came back empty.
    #[error("overlay of '{0}' rasterized to nothing")]
    NullTarget(String),

    #[error("png encoding: {0}")]
    Encode(#[from] png::EncodingError),

    #[error("document: {0}")]
    Document(String),

    #[error("delivery: {0}")]
    Delivery(String),

    #[error("panel: {0}")]
    Panel(String),
}

impl From<AtlasError> for ExportError {
    fn from(e: AtlasError) -> Self {
        match e {
            AtlasError::ResourceNotReady(id) => ExportError::ResourceNotReady(id),
            other => ExportError::Rasterization(other.to_string()),
        }
    }
}
