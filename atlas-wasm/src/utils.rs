use std::fmt::Display;

use js_sys::{Array, Uint8Array};
use serde::Serialize;
use tiny_skia::Pixmap;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use web_sys::{
    Blob, BlobPropertyBag, CanvasRenderingContext2d, Document, HtmlCanvasElement, HtmlElement,
    Url, Window,
};

use print_core::ExportError;
use print_core::raster::pixmap_from_rgba;

pub fn js_err(e: impl Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

/// Serialize through JSON so JS receives plain objects.
pub fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    let text = serde_json::to_string(value).map_err(js_err)?;
    js_sys::JSON::parse(&text)
}

/// Resolve `path` against `window.__BASE_URL` (default `/`). Absolute and
/// data URLs pass through.
pub fn asset_url(path: &str) -> String {
    let p = path.trim();
    if p.starts_with("http://") || p.starts_with("https://") || p.starts_with("data:") {
        return p.to_string();
    }
    let base = web_sys::window()
        .and_then(|w| js_sys::Reflect::get(&w, &JsValue::from_str("__BASE_URL")).ok())
        .and_then(|v| v.as_string())
        .unwrap_or_else(|| "/".to_string());
    format!("{}/{}", base.trim_end_matches('/'), p.trim_start_matches('/'))
}

/// First successful response body among `urls`.
pub async fn fetch_text_with_fallbacks(window: &Window, urls: &[&str]) -> Option<String> {
    for url in urls {
        let Ok(resp_value) = JsFuture::from(window.fetch_with_str(url)).await else {
            log::debug!("fetch {url}: network error");
            continue;
        };
        let Ok(resp) = resp_value.dyn_into::<web_sys::Response>() else {
            continue;
        };
        if !resp.ok() {
            log::debug!("fetch {url}: HTTP {}", resp.status());
            continue;
        }
        if let Ok(text_promise) = resp.text()
            && let Ok(text_js) = JsFuture::from(text_promise).await
            && let Some(s) = text_js.as_string()
        {
            return Some(s);
        }
    }
    None
}

pub fn get_query_param(search: &str, key: &str) -> Option<String> {
    search
        .trim_start_matches('?')
        .split('&')
        .filter_map(|pair| {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            (k == key).then(|| url_decode(v))
        })
        .next()
}

fn url_decode(s: &str) -> String {
    let s = s.replace('+', " ");
    percent_encoding::percent_decode_str(&s)
        .decode_utf8_lossy()
        .to_string()
}

/// `window.__ATLAS_CONFIG` as JSON text; the page may set a string or an object.
pub fn window_config(window: &Window) -> Option<String> {
    let v = js_sys::Reflect::get(window, &JsValue::from_str("__ATLAS_CONFIG")).ok()?;
    if v.is_undefined() || v.is_null() {
        return None;
    }
    if let Some(s) = v.as_string() {
        return Some(s);
    }
    js_sys::JSON::stringify(&v).ok().and_then(|s| s.as_string())
}

fn blob_of(bytes: &[u8], mime: &str) -> Result<Blob, JsValue> {
    let parts = Array::new();
    parts.push(&Uint8Array::from(bytes));
    let opts = BlobPropertyBag::new();
    opts.set_type(mime);
    Blob::new_with_u8_array_sequence_and_options(&parts, &opts)
}

/// Object URL for in-memory bytes. The caller revokes it.
pub fn object_url(bytes: &[u8], mime: &str) -> Result<String, JsValue> {
    Url::create_object_url_with_blob(&blob_of(bytes, mime)?)
}

/// Offer `bytes` as a download and revoke the temporary URL.
pub fn save_bytes_as_file(
    document: &Document,
    file_name: &str,
    bytes: &[u8],
    mime: &str,
) -> Result<(), JsValue> {
    let url = object_url(bytes, mime)?;
    let clicked = (|| -> Result<(), JsValue> {
        let a = document.create_element("a")?.dyn_into::<HtmlElement>()?;
        a.set_attribute("href", &url)?;
        a.set_attribute("download", file_name)?;
        a.click();
        Ok(())
    })();
    Url::revoke_object_url(&url)?;
    clicked
}

/// 2D canvas of the given size.
pub fn scratch_canvas(
    document: &Document,
    width: u32,
    height: u32,
) -> Result<(HtmlCanvasElement, CanvasRenderingContext2d), JsValue> {
    let cv = document
        .create_element("canvas")?
        .dyn_into::<HtmlCanvasElement>()?;
    cv.set_width(width);
    cv.set_height(height);
    let ctx = cv
        .get_context("2d")?
        .ok_or_else(|| JsValue::from_str("2D context not available"))?
        .dyn_into::<CanvasRenderingContext2d>()?;
    Ok((cv, ctx))
}

/// Read a 2D-drawable canvas into a pixmap.
pub fn canvas_to_pixmap(ctx: &CanvasRenderingContext2d, width: u32, height: u32) -> Result<Pixmap, ExportError> {
    let data = ctx
        .get_image_data(0.0, 0.0, f64::from(width), f64::from(height))
        .map_err(|e| ExportError::Rasterization(format!("getImageData: {e:?}")))?;
    pixmap_from_rgba(width, height, &data.data().0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_param_is_decoded() {
        assert_eq!(
            get_query_param("?a=1&config=cfg%2Fprint%20A4.json", "config").as_deref(),
            Some("cfg/print A4.json")
        );
        assert_eq!(get_query_param("?flag", "flag").as_deref(), Some(""));
        assert_eq!(get_query_param("?a=1", "config"), None);
    }
}
