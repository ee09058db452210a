use std::fmt::Write as _;
use std::sync::Arc;

use atlas_core::Axis;
use tiny_skia::{Color, FilterQuality, Pixmap, PixmapPaint, Transform};

use crate::compose::letterbox;
use crate::error::ExportError;
use crate::layout::{PanelLayout, Rect};
use crate::panel::{PanelContent, PanelDetails, PanelRenderer, extent_caption, stats_lines};
use crate::raster::alloc;

/// Native panel renderer: images are drawn with tiny-skia, text, frames and
/// the graticule come from an SVG overlay rendered by resvg.
pub struct SvgPanelRenderer {
    width: u32,
    options: usvg::Options<'static>,
}

impl SvgPanelRenderer {
    pub fn new(width: u32) -> Self {
        let mut opt = usvg::Options::default();
        opt.fontdb = Arc::new(font_database());
        Self {
            width,
            options: opt,
        }
    }

    pub fn layout(&self, content: &PanelContent) -> PanelLayout {
        let aspect = content.primary.width() as f32 / content.primary.height().max(1) as f32;
        PanelLayout::new(
            self.width,
            aspect,
            content.details.legend.len(),
            content.details.stats.len(),
        )
    }

    pub fn render_now(&self, content: &PanelContent) -> Result<Pixmap, ExportError> {
        let layout = self.layout(content);
        let mut pixmap = alloc(layout.width, layout.height)?;
        pixmap.fill(Color::WHITE);
        draw_into(&mut pixmap, &content.primary, layout.primary);
        if let Some(mini) = &content.mini {
            draw_into(&mut pixmap, mini, layout.mini);
        }

        let map = content.map_area(layout.primary);
        let svg = build_panel_svg(&layout, map, &content.details, content.mini.is_some());
        let tree = usvg::Tree::from_str(&svg, &self.options)
            .map_err(|e| ExportError::Panel(format!("SVG parse error: {e:?}")))?;
        let mut pm = pixmap.as_mut();
        resvg::render(&tree, Transform::identity(), &mut pm);
        Ok(pixmap)
    }
}

impl PanelRenderer for SvgPanelRenderer {
    async fn render(&self, content: &PanelContent) -> Result<Option<Pixmap>, ExportError> {
        self.render_now(content).map(Some)
    }
}

fn font_database() -> usvg::fontdb::Database {
    let mut fontdb = usvg::fontdb::Database::new();
    if fonts::FONT_BYTES.is_empty() {
        log::warn!("embedded font missing; falling back to system fonts");
        fontdb.load_system_fonts();
        return fontdb;
    }
    fontdb.load_font_data(fonts::FONT_BYTES.to_vec());
    // Map generic 'sans-serif' to the embedded font family
    let family_name = fontdb
        .faces()
        .next()
        .and_then(|face| face.families.first().map(|(n, _)| n.clone()));
    if let Some(name) = family_name {
        fontdb.set_sans_serif_family(name);
    }
    fontdb
}

fn draw_into(canvas: &mut Pixmap, image: &Pixmap, rect: Rect) {
    let fit = letterbox(
        (image.width(), image.height()),
        (rect.w.max(0.0) as u32, rect.h.max(0.0) as u32),
    );
    let s = fit.scale(image.width());
    let paint = PixmapPaint {
        quality: FilterQuality::Bicubic,
        ..PixmapPaint::default()
    };
    canvas.draw_pixmap(
        0,
        0,
        image.as_ref(),
        &paint,
        Transform::from_row(s, 0.0, 0.0, s, rect.x + fit.x, rect.y + fit.y),
        None,
    );
}

fn svg_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn frame(s: &mut String, r: Rect) {
    let _ = writeln!(
        s,
        "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\" stroke=\"#333\" stroke-width=\"2\"/>",
        r.x, r.y, r.w, r.h
    );
}

/// Transparent SVG overlay with everything except the map images. `map` is
/// the part of the primary box the base map covers.
pub fn build_panel_svg(
    layout: &PanelLayout,
    map: Rect,
    details: &PanelDetails,
    with_mini: bool,
) -> String {
    let (w, h) = (layout.width, layout.height);
    let fs = layout.font_size;
    let mut s = String::new();
    s.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    let _ = writeln!(
        s,
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\" viewBox=\"0 0 {w} {h}\" fill=\"none\" font-family=\"sans-serif\" font-size=\"{fs}\">"
    );

    let t = layout.title;
    let _ = writeln!(
        s,
        "<text x=\"{:.2}\" y=\"{:.2}\" fill=\"#111\" font-size=\"{:.0}\" font-weight=\"bold\">{}</text>",
        t.x,
        t.y + fs * 1.6,
        fs * 1.8,
        svg_escape(&details.title)
    );
    if let Some(sub) = &details.subtitle {
        let _ = writeln!(
            s,
            "<text x=\"{:.2}\" y=\"{:.2}\" text-anchor=\"end\" fill=\"#555\">{}</text>",
            t.right(),
            t.y + fs * 1.6,
            svg_escape(sub)
        );
    }

    // graticule over the base map, labels just inside its edge
    let m = map;
    for line in &details.graticule {
        let pos = line.position as f32;
        let (x1, y1, x2, y2, lx, ly, anchor) = match line.axis {
            Axis::Vertical => {
                let x = m.x + pos * m.w;
                (x, m.y, x, m.bottom(), x + 4.0, m.bottom() - 6.0, "start")
            }
            // latitude grows upwards, the image y axis downwards
            Axis::Horizontal => {
                let y = m.bottom() - pos * m.h;
                (m.x, y, m.right(), y, m.x + 6.0, y - 4.0, "start")
            }
        };
        let _ = writeln!(
            s,
            "<path d=\"M {x1:.2} {y1:.2} L {x2:.2} {y2:.2}\" stroke=\"#ffffff\" stroke-opacity=\"0.8\" stroke-width=\"1.5\" stroke-dasharray=\"8 6\"/>"
        );
        let _ = writeln!(
            s,
            "<text x=\"{lx:.2}\" y=\"{ly:.2}\" text-anchor=\"{anchor}\" fill=\"#111\" stroke=\"#fff\" stroke-width=\"3\" paint-order=\"stroke\" font-size=\"{:.0}\">{}</text>",
            fs * 0.85,
            svg_escape(&line.label())
        );
    }
    frame(&mut s, layout.primary);
    if with_mini {
        frame(&mut s, layout.mini);
    }

    let lg = layout.legend;
    let row = layout.row_height;
    let _ = writeln!(
        s,
        "<text x=\"{:.2}\" y=\"{:.2}\" fill=\"#111\" font-weight=\"bold\">Legend</text>",
        lg.x,
        lg.y + row * 0.7
    );
    for (i, entry) in details.legend.iter().enumerate() {
        let y = lg.y + row * (i as f32 + 1.0);
        let _ = writeln!(
            s,
            "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\" fill=\"{}\" stroke=\"#333\"/>",
            lg.x,
            y + row * 0.2,
            row * 0.9,
            row * 0.6,
            svg_escape(&entry.color)
        );
        let _ = writeln!(
            s,
            "<text x=\"{:.2}\" y=\"{:.2}\" fill=\"#333\">{}</text>",
            lg.x + row * 1.2,
            y + row * 0.7,
            svg_escape(&entry.label)
        );
    }

    let st = layout.stats;
    let _ = writeln!(
        s,
        "<text x=\"{:.2}\" y=\"{:.2}\" fill=\"#111\" font-weight=\"bold\">Visible extent</text>",
        st.x,
        st.y + row * 0.7
    );
    for (i, text) in stats_lines(&details.stats).iter().enumerate() {
        let _ = writeln!(
            s,
            "<text x=\"{:.2}\" y=\"{:.2}\" fill=\"#333\" font-size=\"{:.0}\">{}</text>",
            st.x,
            st.y + row * (i as f32 + 1.7),
            fs * 0.9,
            svg_escape(text)
        );
    }

    if let Some(extent) = &details.extent {
        let f = layout.footer;
        let _ = writeln!(
            s,
            "<text x=\"{:.2}\" y=\"{:.2}\" fill=\"#555\" font-size=\"{:.0}\">{}</text>",
            f.x,
            f.y + row * 0.7,
            fs * 0.9,
            svg_escape(&extent_caption(extent))
        );
    }

    s.push_str("</svg>\n");
    s
}
