use std::cell::RefCell;
use std::path::{Path, PathBuf};

use print_core::raster::decode_png;
use print_core::{
    CaptureHost, DocumentSink, ExportError, OverlayPart, OverlaySource, PanelContent,
    PanelRenderer,
};
use tiny_skia::Pixmap;

use crate::scene::Scene;

fn read_png(path: &Path) -> Result<Pixmap, ExportError> {
    let bytes = std::fs::read(path)
        .map_err(|e| ExportError::Rasterization(format!("{}: {e}", path.display())))?;
    decode_png(&bytes)
}

/// Capture host backed by PNG files listed in a scene.
pub struct FileCapture<'a> {
    scene: &'a Scene,
}

impl<'a> FileCapture<'a> {
    pub fn new(scene: &'a Scene) -> Self {
        Self { scene }
    }
}

impl CaptureHost for FileCapture<'_> {
    fn read_canvas(&self, target: &str) -> Result<Pixmap, ExportError> {
        let t = self
            .scene
            .target(target)
            .ok_or_else(|| ExportError::ResourceNotReady(target.to_string()))?;
        read_png(&t.image)
    }

    fn overlay(&self, target: &str) -> Option<OverlaySource> {
        let t = self.scene.target(target)?;
        if t.css_width <= 0.0 || t.css_height <= 0.0 {
            return None;
        }
        Some(OverlaySource {
            width: t.css_width,
            height: t.css_height,
            parts: t
                .controls
                .iter()
                .map(|c| OverlayPart {
                    name: c.name.clone(),
                    x: c.x,
                    y: c.y,
                    width: c.width,
                    height: c.height,
                })
                .collect(),
        })
    }

    async fn rasterize_part(&self, target: &str, part: &OverlayPart) -> Result<Pixmap, ExportError> {
        let control = self
            .scene
            .target(target)
            .and_then(|t| t.controls.iter().find(|c| c.name == part.name))
            .ok_or_else(|| ExportError::Rasterization(format!("no image for '{}'", part.name)))?;
        read_png(&control.image)
    }
}

/// Writes the document to a fixed path; the request's file name is only logged.
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl DocumentSink for FileSink {
    fn deliver(&self, file_name: &str, bytes: &[u8]) -> Result<(), ExportError> {
        std::fs::write(&self.path, bytes)
            .map_err(|e| ExportError::Delivery(format!("{}: {e}", self.path.display())))?;
        log::debug!("'{file_name}' written to {}", self.path.display());
        Ok(())
    }
}

/// Wraps a panel renderer and keeps the last panel for `--png`.
pub struct KeepPanel<R> {
    inner: R,
    last: RefCell<Option<Pixmap>>,
}

impl<R> KeepPanel<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            last: RefCell::new(None),
        }
    }

    pub fn take(&self) -> Option<Pixmap> {
        self.last.borrow_mut().take()
    }
}

impl<R: PanelRenderer> PanelRenderer for KeepPanel<R> {
    async fn render(&self, content: &PanelContent) -> Result<Option<Pixmap>, ExportError> {
        let panel = self.inner.render(content).await?;
        self.last.replace(panel.clone());
        Ok(panel)
    }
}
