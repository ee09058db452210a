use std::cell::RefCell;
use std::rc::Rc;

use print_core::{CaptureHost, DocumentSink, ExportError, OverlayPart, OverlaySource};
use tiny_skia::Pixmap;
use wasm_bindgen::JsCast;
use web_sys::{CanvasRenderingContext2d, Document, HtmlCanvasElement, HtmlElement};

use crate::bindings::to_canvas;
use crate::state::State;
use crate::utils::{canvas_to_pixmap, save_bytes_as_file, scratch_canvas};

/// Reads map canvases and rasterizes the registered DOM controls. The state
/// is only borrowed between suspension points.
pub struct BrowserCapture {
    state: Rc<RefCell<State>>,
}

impl BrowserCapture {
    pub fn new(state: Rc<RefCell<State>>) -> Self {
        Self { state }
    }

    fn control(&self, target: &str, name: &str) -> Option<HtmlElement> {
        let st = self.state.borrow();
        st.controls
            .get(target)?
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.element.clone())
    }
}

fn not_ready(target: &str) -> ExportError {
    ExportError::ResourceNotReady(target.to_string())
}

impl CaptureHost for BrowserCapture {
    fn read_canvas(&self, target: &str) -> Result<Pixmap, ExportError> {
        let st = self
            .state
            .try_borrow()
            .map_err(|_| ExportError::Rasterization("state busy".into()))?;
        let inst = st.registry.mounted(target)?;
        let map = inst.vector().ok_or_else(|| not_ready(target))?;
        let base = map.get_canvas();
        let (w, h) = (base.width(), base.height());
        if w == 0 || h == 0 {
            return Err(not_ready(target));
        }
        let (_cv, ctx) = scratch_canvas(&st.document, w, h)
            .map_err(|e| ExportError::Rasterization(format!("scratch canvas: {e:?}")))?;
        draw_canvas(&ctx, &base, w, h)?;
        // a separate overlay canvas sits on top; interleaved overlays are
        // already part of the map canvas
        if let Some(overlay) = inst.overlay().and_then(|o| o.get_canvas()) {
            draw_canvas(&ctx, &overlay, w, h)?;
        }
        canvas_to_pixmap(&ctx, w, h)
    }

    fn overlay(&self, target: &str) -> Option<OverlaySource> {
        let st = self.state.try_borrow().ok()?;
        let container = st.registry.mounted(target).ok()?.vector()?.get_container();
        let rect = container.get_bounding_client_rect();
        if rect.width() <= 0.0 || rect.height() <= 0.0 {
            return None;
        }
        let parts = st
            .controls
            .get(target)
            .map(|controls| {
                controls
                    .iter()
                    .filter_map(|c| {
                        let r = c.element.get_bounding_client_rect();
                        // hidden controls have an empty box
                        (r.width() > 0.0 && r.height() > 0.0).then(|| OverlayPart {
                            name: c.name.clone(),
                            x: r.left() - rect.left(),
                            y: r.top() - rect.top(),
                            width: r.width(),
                            height: r.height(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        Some(OverlaySource {
            width: rect.width(),
            height: rect.height(),
            parts,
        })
    }

    async fn rasterize_part(&self, target: &str, part: &OverlayPart) -> Result<Pixmap, ExportError> {
        let element = self
            .control(target, &part.name)
            .ok_or_else(|| ExportError::Rasterization(format!("control '{}' gone", part.name)))?;
        let ratio = self.state.borrow().window.device_pixel_ratio().max(1.0);
        let options = js_sys::JSON::parse(&format!(r#"{{"pixelRatio":{ratio},"cacheBust":true}}"#))
            .map_err(|e| ExportError::Rasterization(format!("{e:?}")))?;
        let canvas = to_canvas(&element, &options)
            .await
            .map_err(|e| ExportError::Rasterization(format!("toCanvas: {e:?}")))?
            .dyn_into::<HtmlCanvasElement>()
            .map_err(|_| ExportError::Rasterization("toCanvas returned no canvas".into()))?;
        let ctx = canvas
            .get_context("2d")
            .ok()
            .flatten()
            .and_then(|c| c.dyn_into::<CanvasRenderingContext2d>().ok())
            .ok_or_else(|| ExportError::Rasterization("2D context not available".into()))?;
        canvas_to_pixmap(&ctx, canvas.width(), canvas.height())
    }
}

fn draw_canvas(
    ctx: &CanvasRenderingContext2d,
    src: &HtmlCanvasElement,
    w: u32,
    h: u32,
) -> Result<(), ExportError> {
    ctx.draw_image_with_html_canvas_element_and_dw_and_dh(src, 0.0, 0.0, f64::from(w), f64::from(h))
        .map_err(|e| ExportError::Rasterization(format!("drawImage: {e:?}")))
}

/// Delivers the PDF as a browser download.
pub struct BrowserDownload {
    document: Document,
}

impl BrowserDownload {
    pub fn new(document: Document) -> Self {
        Self { document }
    }
}

impl DocumentSink for BrowserDownload {
    fn deliver(&self, file_name: &str, bytes: &[u8]) -> Result<(), ExportError> {
        save_bytes_as_file(&self.document, file_name, bytes, "application/pdf")
            .map_err(|e| ExportError::Delivery(format!("{e:?}")))
    }
}
