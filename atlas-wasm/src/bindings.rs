//! Imports of the JS renderers the dashboard page loads as globals:
//! maplibre-gl, deck.gl's MapboxOverlay, mapbox-gl-draw and html-to-image.

use js_sys::Function;
use wasm_bindgen::prelude::*;
use web_sys::{HtmlCanvasElement, HtmlElement};

#[wasm_bindgen]
extern "C" {
    /// Vector basemap renderer (maplibre-gl `Map`).
    #[derive(Clone, Debug)]
    pub type VectorMap;

    #[wasm_bindgen(method, js_name = getBounds)]
    pub fn get_bounds(this: &VectorMap) -> LngLatBounds;

    #[wasm_bindgen(method, js_name = getCenter)]
    pub fn get_center(this: &VectorMap) -> LngLat;

    #[wasm_bindgen(method, js_name = getZoom)]
    pub fn get_zoom(this: &VectorMap) -> f64;

    #[wasm_bindgen(method, js_name = getBearing)]
    pub fn get_bearing(this: &VectorMap) -> f64;

    #[wasm_bindgen(method, js_name = getPitch)]
    pub fn get_pitch(this: &VectorMap) -> f64;

    #[wasm_bindgen(method, js_name = getCanvas)]
    pub fn get_canvas(this: &VectorMap) -> HtmlCanvasElement;

    #[wasm_bindgen(method, js_name = getContainer)]
    pub fn get_container(this: &VectorMap) -> HtmlElement;

    #[wasm_bindgen(method)]
    pub fn on(this: &VectorMap, event: &str, handler: &Function);

    #[wasm_bindgen(method)]
    pub fn off(this: &VectorMap, event: &str, handler: &Function);

    #[wasm_bindgen(method, js_name = fitBounds)]
    pub fn fit_bounds(this: &VectorMap, bounds: &JsValue, options: &JsValue);

    #[wasm_bindgen(method, js_name = getSource)]
    pub fn get_source(this: &VectorMap, id: &str) -> Option<GeoJsonSource>;

    #[wasm_bindgen(method, js_name = addControl)]
    pub fn add_control(this: &VectorMap, control: &JsValue);

    #[wasm_bindgen(method, js_name = removeControl)]
    pub fn remove_control(this: &VectorMap, control: &JsValue);

    pub type LngLatBounds;

    #[wasm_bindgen(method, js_name = getWest)]
    pub fn get_west(this: &LngLatBounds) -> f64;

    #[wasm_bindgen(method, js_name = getEast)]
    pub fn get_east(this: &LngLatBounds) -> f64;

    #[wasm_bindgen(method, js_name = getSouth)]
    pub fn get_south(this: &LngLatBounds) -> f64;

    #[wasm_bindgen(method, js_name = getNorth)]
    pub fn get_north(this: &LngLatBounds) -> f64;

    pub type LngLat;

    #[wasm_bindgen(method, getter)]
    pub fn lng(this: &LngLat) -> f64;

    #[wasm_bindgen(method, getter)]
    pub fn lat(this: &LngLat) -> f64;

    pub type GeoJsonSource;

    #[wasm_bindgen(method, js_name = setData)]
    pub fn set_data(this: &GeoJsonSource, data: &JsValue);

    /// WebGL data overlay (deck.gl `MapboxOverlay`), mounted as a map control.
    #[derive(Clone, Debug)]
    pub type DataOverlay;

    #[wasm_bindgen(method)]
    pub fn finalize(this: &DataOverlay);

    /// `null` in interleaved mode, where deck draws into the map canvas.
    #[wasm_bindgen(method, js_name = getCanvas)]
    pub fn get_canvas(this: &DataOverlay) -> Option<HtmlCanvasElement>;

    /// mapbox-gl-draw control.
    #[wasm_bindgen(js_name = MapboxDraw)]
    #[derive(Clone, Debug)]
    pub type DrawControl;

    #[wasm_bindgen(constructor, js_class = "MapboxDraw")]
    pub fn new(options: &JsValue) -> DrawControl;

    #[wasm_bindgen(method, js_name = changeMode)]
    pub fn change_mode(this: &DrawControl, mode: &str);

    #[wasm_bindgen(method, js_name = getAll)]
    pub fn get_all(this: &DrawControl) -> JsValue;

    #[wasm_bindgen(method, js_name = deleteAll)]
    pub fn delete_all(this: &DrawControl);
}

#[wasm_bindgen(js_namespace = htmlToImage)]
extern "C" {
    /// Rasterize a DOM subtree into a fresh canvas.
    #[wasm_bindgen(catch, js_name = toCanvas)]
    pub async fn to_canvas(node: &HtmlElement, options: &JsValue) -> Result<JsValue, JsValue>;
}
