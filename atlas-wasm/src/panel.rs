use atlas_core::Axis;
use print_core::layout::{PanelLayout, Rect};
use print_core::panel::{extent_caption, stats_lines};
use print_core::raster::encode_png;
use print_core::{ExportError, PanelContent, PanelRenderer};
use tiny_skia::Pixmap;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use web_sys::{CanvasRenderingContext2d, Document, HtmlCanvasElement, HtmlElement, HtmlImageElement, Url};

use crate::bindings::to_canvas;
use crate::utils::{canvas_to_pixmap, object_url};

/// Print panel built as an off-screen DOM tree and rasterized with
/// html-to-image, so text uses the page's fonts.
pub struct HiddenPanel {
    document: Document,
    width: u32,
}

fn panel_err(e: JsValue) -> ExportError {
    ExportError::Panel(format!("{e:?}"))
}

fn boxed(r: Rect) -> String {
    format!(
        "position:absolute;left:{:.1}px;top:{:.1}px;width:{:.1}px;height:{:.1}px;",
        r.x, r.y, r.w, r.h
    )
}

/// Tree under construction; object URLs are revoked when it is dropped.
struct Tree<'a> {
    document: &'a Document,
    root: HtmlElement,
    urls: Vec<String>,
    images: Vec<HtmlImageElement>,
}

impl<'a> Tree<'a> {
    fn new(document: &'a Document, layout: &PanelLayout) -> Result<Self, JsValue> {
        let root = document.create_element("div")?.dyn_into::<HtmlElement>()?;
        root.set_attribute(
            "style",
            &format!(
                "position:fixed;left:-100000px;top:0;width:{}px;height:{}px;background:#fff;color:#111;font-family:sans-serif;font-size:{}px;overflow:hidden;",
                layout.width, layout.height, layout.font_size
            ),
        )?;
        Ok(Self {
            document,
            root,
            urls: Vec::new(),
            images: Vec::new(),
        })
    }

    fn node(&self, style: &str, text: Option<&str>) -> Result<HtmlElement, JsValue> {
        let el = self.document.create_element("div")?.dyn_into::<HtmlElement>()?;
        el.set_attribute("style", style)?;
        el.set_text_content(text);
        self.root.append_child(&el)?;
        Ok(el)
    }

    fn image(&mut self, pixmap: &Pixmap, r: Rect) -> Result<(), JsValue> {
        let png = encode_png(pixmap).map_err(|e| JsValue::from_str(&e.to_string()))?;
        let url = object_url(&png, "image/png")?;
        self.urls.push(url.clone());
        let img = self.document.create_element("img")?.dyn_into::<HtmlImageElement>()?;
        img.set_attribute(
            "style",
            &format!("{}object-fit:contain;border:2px solid #333;box-sizing:border-box;", boxed(r)),
        )?;
        img.set_src(&url);
        self.root.append_child(&img)?;
        self.images.push(img);
        Ok(())
    }
}

impl Drop for Tree<'_> {
    fn drop(&mut self) {
        self.root.remove();
        for url in &self.urls {
            let _ = Url::revoke_object_url(url);
        }
    }
}

impl HiddenPanel {
    pub fn new(document: Document, width: u32) -> Self {
        Self { document, width }
    }

    fn build<'a>(&'a self, content: &PanelContent) -> Result<(Tree<'a>, PanelLayout), JsValue> {
        let d = &content.details;
        let aspect = content.primary.width() as f32 / content.primary.height().max(1) as f32;
        let layout = PanelLayout::new(self.width, aspect, d.legend.len(), d.stats.len());
        let mut tree = Tree::new(&self.document, &layout)?;
        let fs = layout.font_size;

        tree.node(
            &format!("{}font-size:{:.0}px;font-weight:bold;", boxed(layout.title), fs * 1.8),
            Some(&d.title),
        )?;
        if let Some(sub) = &d.subtitle {
            tree.node(&format!("{}text-align:right;color:#555;", boxed(layout.title)), Some(sub))?;
        }

        tree.image(&content.primary, layout.primary)?;
        if let Some(mini) = &content.mini {
            tree.image(mini, layout.mini)?;
        }

        let m = content.map_area(layout.primary);
        for line in &d.graticule {
            let pos = line.position as f32;
            let (rule, label) = match line.axis {
                Axis::Vertical => {
                    let x = m.x + pos * m.w;
                    (
                        format!("left:{x:.1}px;top:{:.1}px;height:{:.1}px;border-left:1.5px dashed rgba(255,255,255,0.8);", m.y, m.h),
                        format!("left:{:.1}px;top:{:.1}px;", x + 4.0, m.bottom() - fs * 1.4),
                    )
                }
                Axis::Horizontal => {
                    let y = m.bottom() - pos * m.h;
                    (
                        format!("left:{:.1}px;top:{y:.1}px;width:{:.1}px;border-top:1.5px dashed rgba(255,255,255,0.8);", m.x, m.w),
                        format!("left:{:.1}px;top:{:.1}px;", m.x + 6.0, y - fs * 1.2),
                    )
                }
            };
            tree.node(&format!("position:absolute;{rule}"), None)?;
            tree.node(
                &format!(
                    "position:absolute;{label}font-size:{:.0}px;text-shadow:0 0 3px #fff,0 0 3px #fff;",
                    fs * 0.85
                ),
                Some(&line.label()),
            )?;
        }

        let lg = layout.legend;
        let row = layout.row_height;
        tree.node(
            &format!("{}font-weight:bold;", boxed(Rect { h: row, ..lg })),
            Some("Legend"),
        )?;
        for (i, entry) in d.legend.iter().enumerate() {
            let y = lg.y + row * (i as f32 + 1.0);
            tree.node(
                &format!(
                    "position:absolute;left:{:.1}px;top:{:.1}px;width:{:.1}px;height:{:.1}px;background:{};border:1px solid #333;",
                    lg.x,
                    y + row * 0.2,
                    row * 0.9,
                    row * 0.6,
                    entry.color
                ),
                None,
            )?;
            tree.node(
                &format!(
                    "position:absolute;left:{:.1}px;top:{y:.1}px;line-height:{row:.1}px;",
                    lg.x + row * 1.2
                ),
                Some(&entry.label),
            )?;
        }

        let st = layout.stats;
        tree.node(
            &format!("{}font-weight:bold;", boxed(Rect { h: row, ..st })),
            Some("Visible features"),
        )?;
        for (i, text) in stats_lines(&d.stats).iter().enumerate() {
            let r = Rect {
                y: st.y + row * (i as f32 + 1.0),
                h: row,
                ..st
            };
            tree.node(&format!("{}white-space:nowrap;color:#333;", boxed(r)), Some(text))?;
        }

        if let Some(extent) = &d.extent {
            tree.node(
                &format!("{}color:#555;", boxed(layout.footer)),
                Some(&extent_caption(extent)),
            )?;
        }
        Ok((tree, layout))
    }
}

impl PanelRenderer for HiddenPanel {
    async fn render(&self, content: &PanelContent) -> Result<Option<Pixmap>, ExportError> {
        let body = self
            .document
            .body()
            .ok_or_else(|| ExportError::Panel("document has no body".into()))?;
        let (tree, layout) = self.build(content).map_err(panel_err)?;
        body.append_child(&tree.root).map_err(panel_err)?;
        for img in &tree.images {
            JsFuture::from(img.decode()).await.map_err(panel_err)?;
        }
        let options = js_sys::JSON::parse(&format!(
            r##"{{"pixelRatio":1,"width":{},"height":{},"backgroundColor":"#ffffff","style":{{"left":"0px"}}}}"##,
            layout.width, layout.height
        ))
        .map_err(panel_err)?;
        let canvas = to_canvas(&tree.root, &options)
            .await
            .map_err(panel_err)?
            .dyn_into::<HtmlCanvasElement>()
            .map_err(panel_err)?;
        drop(tree);
        let (w, h) = (canvas.width(), canvas.height());
        if w == 0 || h == 0 {
            return Ok(None);
        }
        let ctx = canvas
            .get_context("2d")
            .map_err(panel_err)?
            .ok_or_else(|| ExportError::Panel("2D context not available".into()))?
            .dyn_into::<CanvasRenderingContext2d>()
            .map_err(|o| panel_err(o.into()))?;
        canvas_to_pixmap(&ctx, w, h).map(Some)
    }
}
