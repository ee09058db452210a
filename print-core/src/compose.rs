use tiny_skia::{Color, FilterQuality, Pixmap, PixmapPaint, Transform};

use crate::error::ExportError;
use crate::raster::alloc;

/// One DOM control (legend, compass, scale bar...) placed over a map, in the
/// container's CSS pixel space.
#[derive(Clone, Debug, PartialEq)]
pub struct OverlayPart {
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Control overlay of one target: container size plus its parts.
#[derive(Clone, Debug, PartialEq)]
pub struct OverlaySource {
    pub width: f64,
    pub height: f64,
    pub parts: Vec<OverlayPart>,
}

/// A part that rasterized successfully.
pub struct RasterPart {
    pub part: OverlayPart,
    pub pixmap: Pixmap,
}

/// Placement of a letterboxed image: offset and size in target pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Fit {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Fit {
    pub fn scale(&self, src_width: u32) -> f32 {
        self.width / src_width as f32
    }
}

/// Largest rectangle with the source aspect ratio that fits `dst`, centred.
pub fn letterbox(src: (u32, u32), dst: (u32, u32)) -> Fit {
    let (sw, sh) = (src.0.max(1) as f32, src.1.max(1) as f32);
    let (dw, dh) = (dst.0 as f32, dst.1 as f32);
    let s = (dw / sw).min(dh / sh);
    let (width, height) = (sw * s, sh * s);
    Fit {
        x: (dw - width) / 2.0,
        y: (dh - height) / 2.0,
        width,
        height,
    }
}

fn paint() -> PixmapPaint {
    PixmapPaint {
        quality: FilterQuality::Bilinear,
        ..PixmapPaint::default()
    }
}

/// A composed map image and where the base map landed inside it.
pub struct Composite {
    pub pixmap: Pixmap,
    pub map: Fit,
}

/// Draw `base` and its control `parts` onto a white canvas of `size` pixels.
///
/// The base keeps its aspect ratio; each part is scaled with the base and
/// placed at its position relative to the overlay container.
pub fn compose(
    base: &Pixmap,
    overlay: &OverlaySource,
    parts: &[RasterPart],
    size: [u32; 2],
) -> Result<Composite, ExportError> {
    let mut canvas = alloc(size[0], size[1])?;
    canvas.fill(Color::WHITE);

    let fit = letterbox((base.width(), base.height()), (size[0], size[1]));
    let s = fit.scale(base.width());
    canvas.draw_pixmap(
        0,
        0,
        base.as_ref(),
        &paint(),
        Transform::from_row(s, 0.0, 0.0, s, fit.x, fit.y),
        None,
    );

    // container px -> composite px; a zero-sized container means "same as base"
    let (cw, ch) = if overlay.width > 0.0 && overlay.height > 0.0 {
        (overlay.width as f32, overlay.height as f32)
    } else {
        (base.width() as f32, base.height() as f32)
    };
    let kx = fit.width / cw;
    let ky = fit.height / ch;
    for rp in parts {
        let p = &rp.part;
        if rp.pixmap.width() == 0 || rp.pixmap.height() == 0 {
            continue;
        }
        let sx = p.width as f32 * kx / rp.pixmap.width() as f32;
        let sy = p.height as f32 * ky / rp.pixmap.height() as f32;
        canvas.draw_pixmap(
            0,
            0,
            rp.pixmap.as_ref(),
            &paint(),
            Transform::from_row(
                sx,
                0.0,
                0.0,
                sy,
                fit.x + p.x as f32 * kx,
                fit.y + p.y as f32 * ky,
            ),
            None,
        );
    }
    Ok(Composite {
        pixmap: canvas,
        map: fit,
    })
}
