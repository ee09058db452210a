use thiserror::Error;

/// Errors raised by the registry, viewport and query layers.
///
/// Callers at the view boundary treat all of these as "no data for this
/// extent" and keep rendering; none of them is fatal to the dashboard.
#[derive(Debug, Error)]
pub enum AtlasError {
    /// The instance (or its renderer) is not mounted yet. Retry after the next mount tick.
    #[error("instance '{0}' is not ready")]
    ResourceNotReady(String),

    #[error("overlay for '{0}' registered before its vector renderer")]
    OverlayBeforeVector(String),

    #[error("feature #{index} is malformed: {reason}")]
    GeometryQuery { index: usize, reason: String },

    #[error("invalid extent [{xmin}, {xmax}] x [{ymin}, {ymax}]")]
    InvalidExtent {
        xmin: f64,
        xmax: f64,
        ymin: f64,
        ymax: f64,
    },

    #[error("config: {0}")]
    Config(#[from] serde_json::Error),
}
