use png::{BitDepth, ColorType, Encoder};
use tiny_skia::{ColorU8, Pixmap};

use crate::error::ExportError;

/// Build a pixmap from straight (non-premultiplied) RGBA, the layout returned
/// by canvas `getImageData` and by PNG decoders.
pub fn pixmap_from_rgba(width: u32, height: u32, rgba: &[u8]) -> Result<Pixmap, ExportError> {
    let expected = width as usize * height as usize * 4;
    if rgba.len() != expected {
        return Err(ExportError::Rasterization(format!(
            "{width}x{height} raster needs {expected} bytes, got {}",
            rgba.len()
        )));
    }
    let mut pixmap = alloc(width, height)?;
    for (dst, src) in pixmap.pixels_mut().iter_mut().zip(rgba.chunks_exact(4)) {
        *dst = ColorU8::from_rgba(src[0], src[1], src[2], src[3]).premultiply();
    }
    Ok(pixmap)
}

/// Straight RGBA copy of `pixmap`.
pub fn pixmap_to_rgba(pixmap: &Pixmap) -> Vec<u8> {
    pixmap
        .pixels()
        .iter()
        .flat_map(|p| {
            let c = p.demultiply();
            [c.red(), c.green(), c.blue(), c.alpha()]
        })
        .collect()
}

pub(crate) fn alloc(width: u32, height: u32) -> Result<Pixmap, ExportError> {
    Pixmap::new(width, height)
        .ok_or_else(|| ExportError::Rasterization(format!("cannot allocate {width}x{height} raster")))
}

// Shared PNG encoder: RGBA -> PNG bytes (deterministic for same input)
pub fn encode_rgba_to_png_bytes(
    width: u32,
    height: u32,
    rgba: &[u8],
) -> Result<Vec<u8>, png::EncodingError> {
    let mut buf = Vec::new();
    {
        let mut enc = Encoder::new(&mut buf, width, height);
        enc.set_color(ColorType::Rgba);
        enc.set_depth(BitDepth::Eight);
        let mut writer = enc.write_header()?;
        writer.write_image_data(rgba)?;
    }
    Ok(buf)
}

pub fn encode_png(pixmap: &Pixmap) -> Result<Vec<u8>, ExportError> {
    Ok(encode_rgba_to_png_bytes(
        pixmap.width(),
        pixmap.height(),
        &pixmap_to_rgba(pixmap),
    )?)
}

pub fn decode_png(bytes: &[u8]) -> Result<Pixmap, ExportError> {
    Pixmap::decode_png(bytes).map_err(|e| ExportError::Rasterization(format!("png decode: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn straight_alpha_survives_premultiplication() {
        let rgba = [255, 0, 0, 255, 0, 0, 255, 0, 10, 20, 30, 255, 0, 255, 0, 255];
        let p = pixmap_from_rgba(2, 2, &rgba).unwrap();
        assert_eq!(pixmap_to_rgba(&p)[..4], [255, 0, 0, 255]);
        // fully transparent pixels lose their colour
        assert_eq!(pixmap_to_rgba(&p)[4..8], [0, 0, 0, 0]);
    }

    #[test]
    fn wrong_length_is_rejected() {
        assert!(matches!(
            pixmap_from_rgba(2, 2, &[0; 15]),
            Err(ExportError::Rasterization(_))
        ));
    }

    #[test]
    fn png_is_deterministic_and_decodable() {
        let p = pixmap_from_rgba(1, 2, &[1, 2, 3, 255, 4, 5, 6, 255]).unwrap();
        let a = encode_png(&p).unwrap();
        assert_eq!(a, encode_png(&p).unwrap());
        let back = decode_png(&a).unwrap();
        assert_eq!(pixmap_to_rgba(&back), pixmap_to_rgba(&p));
    }
}
