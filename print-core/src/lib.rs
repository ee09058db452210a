//! Capture, compose and export of map prints: raster helpers, compositing,
//! the print panel, PDF assembly and the export pipeline that ties them.

pub mod capture;
pub mod compose;
pub mod dialog;
pub mod document;
pub mod error;
pub mod export;
pub mod layout;
pub mod panel;
pub mod raster;
#[cfg(feature = "svg-panel")]
pub mod svg;

pub use capture::{CaptureFlag, CaptureGuard};
pub use compose::{Composite, Fit, OverlayPart, OverlaySource, RasterPart, compose};
pub use dialog::{DialogTicket, ExportDialog};
pub use error::ExportError;
pub use export::{
    CaptureHost, DocumentSink, ExportReport, ExportRequest, ExportStatus, Exporter, JobCounter,
};
pub use panel::{LegendEntry, PanelContent, PanelDetails, PanelRenderer};
#[cfg(feature = "svg-panel")]
pub use svg::SvgPanelRenderer;
