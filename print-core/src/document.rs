use std::io::Write;

use atlas_core::config::ExportConfig;
use flate2::Compression;
use flate2::write::ZlibEncoder;
use pdf_writer::{Content, Filter, Finish, Name, Pdf, Rect, Ref, TextStr};
use tiny_skia::Pixmap;

use crate::error::ExportError;

/// Where the panel image sits on the page, in PDF points (origin bottom-left).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Placement {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Fit an `image_w` x `image_h` image onto `page`: aim for `content_width`,
/// never closer than `min_margin` to any edge, centred.
pub fn place_image(
    page: [f32; 2],
    content_width: f32,
    min_margin: f32,
    image_w: u32,
    image_h: u32,
) -> Placement {
    let [pw, ph] = page;
    let max_w = (pw - 2.0 * min_margin).max(1.0);
    let max_h = (ph - 2.0 * min_margin).max(1.0);
    let aspect = image_h.max(1) as f32 / image_w.max(1) as f32;
    let mut width = content_width.clamp(1.0, max_w);
    let mut height = width * aspect;
    if height > max_h {
        height = max_h;
        width = height / aspect;
    }
    Placement {
        x: (pw - width) / 2.0,
        y: (ph - height) / 2.0,
        width,
        height,
    }
}

/// Premultiplied pixels flattened onto white, as packed RGB.
fn rgb_on_white(pixmap: &Pixmap) -> Vec<u8> {
    let mut out = Vec::with_capacity(pixmap.pixels().len() * 3);
    for p in pixmap.pixels() {
        let under = 255 - p.alpha();
        out.extend_from_slice(&[
            p.red().saturating_add(under),
            p.green().saturating_add(under),
            p.blue().saturating_add(under),
        ]);
    }
    out
}

fn deflate(data: &[u8]) -> Result<Vec<u8>, ExportError> {
    let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
    enc.write_all(data)
        .map_err(|e| ExportError::Document(format!("deflate: {e}")))?;
    enc.finish()
        .map_err(|e| ExportError::Document(format!("deflate: {e}")))
}

/// Single-page landscape PDF with `panel` embedded as a Flate-compressed
/// RGB image.
pub fn build_pdf(panel: &Pixmap, cfg: &ExportConfig, title: &str) -> Result<Vec<u8>, ExportError> {
    let (w, h) = (panel.width(), panel.height());
    if w == 0 || h == 0 {
        return Err(ExportError::Document("empty panel image".into()));
    }
    let placement = place_image(cfg.page_pt, cfg.content_width_pt, cfg.min_margin_pt, w, h);
    let image_data = deflate(&rgb_on_white(panel))?;

    let catalog_id = Ref::new(1);
    let page_tree_id = Ref::new(2);
    let page_id = Ref::new(3);
    let image_id = Ref::new(4);
    let content_id = Ref::new(5);
    let info_id = Ref::new(6);
    let image_name = Name(b"Im1");

    let mut pdf = Pdf::new();
    pdf.catalog(catalog_id).pages(page_tree_id);
    pdf.pages(page_tree_id).kids([page_id]).count(1);

    let mut page = pdf.page(page_id);
    page.media_box(Rect::new(0.0, 0.0, cfg.page_pt[0], cfg.page_pt[1]));
    page.parent(page_tree_id);
    page.contents(content_id);
    page.resources().x_objects().pair(image_name, image_id);
    page.finish();

    let mut image = pdf.image_xobject(image_id, &image_data);
    image.filter(Filter::FlateDecode);
    image.width(w as i32);
    image.height(h as i32);
    image.color_space().device_rgb();
    image.bits_per_component(8);
    image.finish();

    let mut content = Content::new();
    content.save_state();
    content.transform([
        placement.width,
        0.0,
        0.0,
        placement.height,
        placement.x,
        placement.y,
    ]);
    content.x_object(image_name);
    content.restore_state();
    pdf.stream(content_id, &content.finish());

    pdf.document_info(info_id)
        .title(TextStr(title))
        .producer(TextStr("atlas print-core"));

    Ok(pdf.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn wide_image_uses_content_width() {
        let p = place_image([841.89, 595.28], 780.0, 24.0, 2400, 1200);
        assert_eq!(p.width, 780.0);
        assert_eq!(p.height, 390.0);
        assert!((p.x - 30.945).abs() < 1e-3);
    }

    #[test]
    fn tall_image_is_limited_by_height() {
        let p = place_image([841.89, 595.28], 780.0, 24.0, 1000, 1000);
        assert!((p.height - 547.28).abs() < 1e-3);
        assert!((p.width - p.height).abs() < 1e-3);
    }

    #[test]
    fn pdf_has_header_and_one_image() {
        let mut panel = Pixmap::new(30, 20).unwrap();
        panel.fill(tiny_skia::Color::from_rgba8(10, 20, 30, 255));
        let bytes = build_pdf(&panel, &ExportConfig::default(), "Map").unwrap();
        assert!(bytes.starts_with(b"%PDF-"));
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("/FlateDecode"));
        assert!(text.contains("/Im1"));
        assert!(text.trim_end().ends_with("%%EOF"));
    }

    #[test]
    fn transparent_pixels_become_white() {
        let panel = Pixmap::new(2, 1).unwrap();
        assert_eq!(rgb_on_white(&panel), vec![255; 6]);
    }

    proptest! {
        #[test]
        fn image_never_overflows_the_page(
            w in 1u32..5000,
            h in 1u32..5000,
            content in 10.0f32..2000.0,
        ) {
            let page = [841.89f32, 595.28];
            let margin = 24.0;
            let p = place_image(page, content, margin, w, h);
            prop_assert!(p.x >= margin - 1e-2);
            prop_assert!(p.y >= margin - 1e-2);
            prop_assert!(p.x + p.width <= page[0] - margin + 1e-2);
            prop_assert!(p.y + p.height <= page[1] - margin + 1e-2);
        }
    }
}
