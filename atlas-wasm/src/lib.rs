//! Browser side of the atlas dashboard. The page creates the renderers
//! (maplibre, deck.gl, mapbox-gl-draw) and hands their handles to the
//! functions exported here.

use std::cell::RefCell;
use std::rc::Rc;

use atlas_core::extent::ring_to_geojson;
use atlas_core::features::Dataset;
use atlas_core::measure::{AreaUnit, DrawMode, LengthUnit, MeasurementEngine};
use atlas_core::{
    AtlasConfig, AtlasError, BoundingExtent, ExtentChanged, Ring5, Subscription, ViewState,
    graticule, visible_dataset, visible_stats,
};
use print_core::{ExportRequest, Exporter, LegendEntry, PanelDetails};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;

mod bindings;
mod capture;
mod logger;
mod measure;
mod panel;
mod state;
mod utils;

use bindings::{DataOverlay, VectorMap};
use capture::{BrowserCapture, BrowserDownload};
use measure::MapDrawSurface;
use panel::HiddenPanel;
use state::{Measuring, State, with_state};
use utils::{asset_url, fetch_text_with_fallbacks, get_query_param, js_err, to_js, window_config};

#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    let window = web_sys::window().ok_or("no window")?;
    let config = match window_config(&window) {
        Some(text) => AtlasConfig::from_json(&text).unwrap_or_else(|e| {
            web_sys::console::warn_1(&format!("__ATLAS_CONFIG ignored: {e}").into());
            AtlasConfig::default()
        }),
        None => AtlasConfig::default(),
    };
    install(config)?;

    // ?config=<file> replaces the inline configuration once fetched
    if let Ok(search) = window.location().search()
        && let Some(name) = get_query_param(&search, "config")
    {
        spawn_local(async move {
            if let Err(e) = reload_config(&name).await {
                log::warn!("config '{name}' not applied: {e:?}");
            }
        });
    }
    Ok(())
}

async fn reload_config(name: &str) -> Result<(), JsValue> {
    let window = web_sys::window().ok_or("no window")?;
    let text = fetch_text_with_fallbacks(&window, &[&asset_url(name), name])
        .await
        .ok_or_else(|| JsValue::from_str("config not reachable"))?;
    let config = AtlasConfig::from_json(&text).map_err(js_err)?;
    logger::init(config.log_filter());
    with_state(|s| {
        s.sync.set_locator(config.locator);
        s.config = config;
    })?;
    log::info!("config '{name}' applied");
    Ok(())
}

fn install(config: AtlasConfig) -> Result<(), JsValue> {
    logger::init(config.log_filter());
    let window = web_sys::window().ok_or("no window")?;
    let document = window.document().ok_or("no document")?;
    let mut st = State::new(window, document, config);
    // locator box and statistics follow the primary map; both touch the
    // state, so the work is queued instead of run inside the dispatch
    let internal = st.sync.subscribe(|ev| {
        let ev = ev.clone();
        spawn_local(async move { on_extent_published(ev) });
    });
    st.internal.push(internal);
    state::install(st);
    log::debug!("atlas state installed");
    Ok(())
}

/// Replace the running state with a fresh one built from `config_json`
/// (defaults when absent). Mounted instances are released first.
#[wasm_bindgen]
pub fn init(config_json: Option<String>) -> Result<(), JsValue> {
    let config = match config_json {
        Some(text) => AtlasConfig::from_json(&text).map_err(js_err)?,
        None => AtlasConfig::default(),
    };
    teardown();
    install(config)
}

/// Release every instance and drop the application state.
#[wasm_bindgen]
pub fn teardown() {
    let Some(rc) = state::take() else {
        return;
    };
    let detached = match rc.try_borrow_mut() {
        Ok(mut s) => {
            let ids: Vec<String> = s.registry.ids().map(str::to_string).collect();
            let mut out: Vec<Detached> = ids.iter().map(|id| detach(&mut s, id)).collect();
            out.push(Detached {
                measuring: s.measuring.take(),
                ..Detached::default()
            });
            s.internal.clear();
            out
        }
        Err(_) => {
            log::warn!("teardown during a state borrow; handles left to the page");
            Vec::new()
        }
    };
    for d in detached {
        d.dispose();
    }
    log::debug!("atlas state dropped");
}

/// Handles taken out of the state that must be released with no borrow held.
#[derive(Default)]
struct Detached {
    map: Option<VectorMap>,
    overlay: Option<DataOverlay>,
    handler: Option<Closure<dyn FnMut()>>,
    measuring: Option<Measuring>,
}

impl Detached {
    fn dispose(self) {
        if let Some(mut m) = self.measuring {
            m.engine.close();
        }
        if let (Some(map), Some(h)) = (&self.map, &self.handler) {
            map.off("moveend", h.as_ref().unchecked_ref());
        }
        if let Some(overlay) = self.overlay {
            match &self.map {
                Some(map) => map.remove_control(&overlay),
                None => overlay.finalize(),
            }
        }
    }
}

fn detach(s: &mut State, id: &str) -> Detached {
    let released = s.registry.unregister(id);
    s.controls.remove(id);
    s.sync.teardown_instance(id);
    let measuring = s
        .measuring
        .take_if(|m| m.instance == id);
    Detached {
        map: released.vector,
        overlay: released.overlay,
        handler: s.settle_handlers.remove(id),
        measuring,
    }
}

/// Mount the vector renderer of `id`. A previously registered handle is
/// detached from the viewport events and returned to the page.
#[wasm_bindgen(js_name = registerInstance)]
pub fn register_instance(id: String, map: VectorMap) -> Result<JsValue, JsValue> {
    let key = id.clone();
    let handler = Closure::<dyn FnMut()>::wrap(Box::new(move || {
        let key = key.clone();
        spawn_local(async move { on_settled(&key) });
    }));
    let (old_map, old_handler) = with_state(|s| {
        map.on("moveend", handler.as_ref().unchecked_ref());
        let old_map = s.registry.register(&id, map.clone());
        (old_map, s.settle_handlers.insert(id.clone(), handler))
    })?;
    if let (Some(m), Some(h)) = (&old_map, &old_handler) {
        m.off("moveend", h.as_ref().unchecked_ref());
        log::info!("instance '{id}': replaced");
    } else {
        log::info!("instance '{id}': registered");
    }
    // run the first query without waiting for a gesture
    spawn_local(async move { on_settled(&id) });
    Ok(old_map.map(JsValue::from).unwrap_or(JsValue::NULL))
}

/// Mount the data overlay of `id`; the vector renderer must be registered.
#[wasm_bindgen(js_name = registerOverlay)]
pub fn register_overlay(id: String, overlay: DataOverlay) -> Result<(), JsValue> {
    let old = with_state(|s| s.registry.register_overlay(&id, overlay))?.map_err(js_err)?;
    if let Some(old) = old {
        old.finalize();
    }
    Ok(())
}

/// Null both handles of `id` and drop its subscriptions and controls.
#[wasm_bindgen(js_name = unregisterInstance)]
pub fn unregister_instance(id: String) -> Result<(), JsValue> {
    let detached = with_state(|s| detach(s, &id))?;
    detached.dispose();
    log::info!("instance '{id}': unregistered");
    Ok(())
}

/// Descriptor of `id` (`null` if unknown); `map` holds the vector handle
/// while mounted.
#[wasm_bindgen(js_name = getInstance)]
pub fn get_instance(id: String) -> Result<JsValue, JsValue> {
    let found = with_state(|s| {
        s.registry.get(&id).map(|inst| {
            (
                serde_json::json!({
                    "id": inst.key,
                    "mounted": inst.is_mounted(),
                    "hasOverlay": inst.overlay().is_some(),
                    "view": inst.view,
                    "extent": inst.extent,
                    "ring": inst.bounds_ring,
                }),
                inst.vector().cloned(),
            )
        })
    })?;
    let Some((descriptor, map)) = found else {
        return Ok(JsValue::NULL);
    };
    let obj = to_js(&descriptor)?;
    if let Some(map) = map {
        js_sys::Reflect::set(&obj, &JsValue::from_str("map"), &map)?;
    }
    Ok(obj)
}

fn read_view(map: &VectorMap) -> Result<(ViewState, BoundingExtent), AtlasError> {
    let b = map.get_bounds();
    let extent = BoundingExtent::from_corners(
        (b.get_west(), b.get_south()),
        (b.get_east(), b.get_north()),
    )?;
    let c = map.get_center();
    let view = ViewState {
        center: (c.lng(), c.lat()),
        zoom: map.get_zoom(),
        bearing: map.get_bearing(),
        pitch: map.get_pitch(),
    };
    Ok((view, extent))
}

/// Deferred "moveend" handler. Subscribers run after the state borrow ends.
fn on_settled(id: &str) {
    let recorded = with_state(|s| -> Result<_, AtlasError> {
        let map = s
            .registry
            .mounted(id)?
            .vector()
            .cloned()
            .ok_or_else(|| AtlasError::ResourceNotReady(id.to_string()))?;
        let (view, extent) = read_view(&map)?;
        let event = s.sync.record(&mut s.registry, id, view, extent)?;
        Ok(event.map(|ev| (s.sync.clone(), ev)))
    });
    match recorded {
        Ok(Ok(Some((sync, ev)))) => sync.publish(&ev),
        Ok(Ok(None)) => {}
        Ok(Err(e)) => log::debug!("settle on '{id}' ignored: {e}"),
        Err(e) => log::debug!("settle on '{id}' ignored: {e:?}"),
    }
}

fn on_extent_published(ev: ExtentChanged) {
    let mini = with_state(|s| {
        if ev.instance != s.config.instances.primary {
            return None;
        }
        s.stats = visible_stats(&s.datasets, &ev.extent);
        log::debug!("statistics refreshed for {} dataset(s)", s.stats.len());
        let mini_id = s.config.instances.mini.clone();
        s.registry
            .mounted(&mini_id)
            .ok()
            .and_then(|inst| inst.vector().cloned())
    });
    match mini {
        Ok(Some(mini)) => push_locator(&mini, &ev.locator),
        Ok(None) => {}
        Err(e) => log::debug!("extent event dropped: {e:?}"),
    }
}

fn push_locator(mini: &VectorMap, locator: &Ring5) {
    let Some(source) = mini.get_source("locator") else {
        log::debug!("mini map has no 'locator' source yet");
        return;
    };
    match to_js(&ring_to_geojson(locator)) {
        Ok(data) => source.set_data(&data),
        Err(e) => log::warn!("locator not pushed: {e:?}"),
    }
}

/// Handle returned by [`on_extent_changed`]; `unsubscribe()` or `free()`
/// stops delivery.
#[wasm_bindgen]
pub struct ExtentSubscription {
    inner: Option<Subscription>,
}

#[wasm_bindgen]
impl ExtentSubscription {
    pub fn unsubscribe(&mut self) {
        if let Some(sub) = self.inner.take() {
            sub.unsubscribe();
        }
    }

    #[wasm_bindgen(getter)]
    pub fn active(&self) -> bool {
        self.inner.as_ref().is_some_and(Subscription::is_active)
    }
}

/// Call `callback(event)` after every published extent change, optionally
/// only for `instance`. Instance-scoped subscriptions end with the instance.
#[wasm_bindgen(js_name = onExtentChanged)]
pub fn on_extent_changed(
    callback: js_sys::Function,
    instance: Option<String>,
) -> Result<ExtentSubscription, JsValue> {
    let deliver = move |ev: &ExtentChanged| {
        let result = to_js(ev).and_then(|v| callback.call1(&JsValue::NULL, &v));
        if let Err(e) = result {
            log::warn!("extent subscriber threw: {e:?}");
        }
    };
    let sub = with_state(|s| match &instance {
        Some(id) => s.sync.subscribe_instance(id, deliver),
        None => s.sync.subscribe(deliver),
    })?;
    Ok(ExtentSubscription { inner: Some(sub) })
}

/// Programmatic fit; the settle that follows is always published.
#[wasm_bindgen(js_name = fitToBounds)]
pub fn fit_to_bounds(
    id: String,
    xmin: f64,
    xmax: f64,
    ymin: f64,
    ymax: f64,
    padding: Option<f64>,
) -> Result<(), JsValue> {
    let extent = BoundingExtent::new(xmin, xmax, ymin, ymax).map_err(js_err)?;
    let map = with_state(|s| -> Result<VectorMap, AtlasError> {
        let inst = s.registry.mounted(&id)?;
        let map = inst
            .vector()
            .cloned()
            .ok_or_else(|| AtlasError::ResourceNotReady(id.clone()))?;
        s.sync.expect_fit(&id);
        Ok(map)
    })?
    .map_err(js_err)?;
    let bounds = to_js(&[[extent.xmin, extent.ymin], [extent.xmax, extent.ymax]])?;
    let options = to_js(&serde_json::json!({ "padding": padding.unwrap_or(0.0) }))?;
    // may fire "moveend" synchronously; no borrow is held here
    map.fit_bounds(&bounds, &options);
    Ok(())
}

/// Replace datasets by kind. `datasets_json` is an array of
/// `{ "kind": "...", "features": [...] }`.
#[wasm_bindgen(js_name = setFeatures)]
pub fn set_features(datasets_json: &str) -> Result<(), JsValue> {
    let incoming: Vec<Dataset> = serde_json::from_str(datasets_json).map_err(js_err)?;
    with_state(|s| {
        for ds in incoming {
            log::info!("{}: {} feature(s) loaded", ds.kind().label(), ds.len());
            s.datasets.retain(|d| d.kind() != ds.kind());
            s.datasets.push(ds);
        }
        let primary = s.config.instances.primary.clone();
        if let Some(extent) = s.registry.get(&primary).and_then(|i| i.extent) {
            s.stats = visible_stats(&s.datasets, &extent);
        }
    })
}

/// Statistics of the primary map's last published extent.
#[wasm_bindgen(js_name = visibleStats)]
pub fn visible_stats_js() -> Result<JsValue, JsValue> {
    with_state(|s| to_js(&s.stats))?
}

/// Features of one dataset kind intersecting the given extent.
#[wasm_bindgen(js_name = filterByExtent)]
pub fn filter_by_extent_js(
    kind: &str,
    xmin: f64,
    xmax: f64,
    ymin: f64,
    ymax: f64,
) -> Result<JsValue, JsValue> {
    let extent = BoundingExtent::new(xmin, xmax, ymin, ymax).map_err(js_err)?;
    with_state(|s| {
        // no data for this kind yields an empty list
        let visible = s
            .datasets
            .iter()
            .find(|d| serde_json::to_value(d.kind()).is_ok_and(|k| k == kind))
            .map(|d| visible_dataset(d, &extent));
        match visible {
            Some(ds) => to_js(&ds),
            None => Ok(js_sys::Array::new().into()),
        }
    })?
}

/// Graticule lines for an extent using the configured grid, with labels.
#[wasm_bindgen(js_name = graticuleFor)]
pub fn graticule_for(xmin: f64, xmax: f64, ymin: f64, ymax: f64) -> Result<JsValue, JsValue> {
    let extent = BoundingExtent::new(xmin, xmax, ymin, ymax).map_err(js_err)?;
    let grid = with_state(|s| s.config.graticule)?;
    let lines: Vec<serde_json::Value> = graticule(&extent, grid)
        .iter()
        .map(|l| {
            serde_json::json!({
                "axis": l.axis,
                "position": l.position,
                "value": l.value,
                "label": l.label(),
            })
        })
        .collect();
    to_js(&lines)
}

/// Register a DOM control drawn over `instance`, captured on export.
#[wasm_bindgen(js_name = registerControl)]
pub fn register_control(
    instance: String,
    name: String,
    element: web_sys::HtmlElement,
) -> Result<(), JsValue> {
    with_state(|s| {
        let controls = s.controls.entry(instance).or_default();
        controls.retain(|c| c.name != name);
        controls.push(state::Control { name, element });
    })
}

#[wasm_bindgen(js_name = unregisterControl)]
pub fn unregister_control(instance: String, name: String) -> Result<(), JsValue> {
    with_state(|s| {
        if let Some(controls) = s.controls.get_mut(&instance) {
            controls.retain(|c| c.name != name);
        }
    })
}

/// Legend rows shown on the print panel: `[{ "label", "color" }]`.
#[wasm_bindgen(js_name = setLegend)]
pub fn set_legend(legend_json: &str) -> Result<(), JsValue> {
    let legend: Vec<LegendEntry> = serde_json::from_str(legend_json).map_err(js_err)?;
    with_state(|s| s.legend = legend)
}

/// Start measuring on `instance` in mode `"line"` or `"polygon"`. Starting on
/// another instance closes the running session.
#[wasm_bindgen(js_name = measureStart)]
pub fn measure_start(
    instance: String,
    mode: &str,
    readout: web_sys::HtmlElement,
) -> Result<(), JsValue> {
    let mode: DrawMode =
        serde_json::from_value(serde_json::Value::String(mode.to_string())).map_err(js_err)?;
    let previous = with_state(|s| -> Result<Option<Measuring>, AtlasError> {
        if let Some(m) = s.measuring.as_mut()
            && m.instance == instance
        {
            m.engine.select_mode(mode);
            return Ok(None);
        }
        let map = s
            .registry
            .mounted(&instance)?
            .vector()
            .cloned()
            .ok_or_else(|| AtlasError::ResourceNotReady(instance.clone()))?;
        let previous = s.measuring.take();
        let mut engine = MeasurementEngine::new(MapDrawSurface::new(map, readout));
        engine.select_mode(mode);
        s.measuring = Some(Measuring { instance, engine });
        Ok(previous)
    })?
    .map_err(js_err)?;
    if let Some(mut m) = previous {
        m.engine.close();
    }
    Ok(())
}

#[wasm_bindgen(js_name = measureClose)]
pub fn measure_close() -> Result<(), JsValue> {
    if let Some(mut m) = with_state(|s| s.measuring.take())? {
        m.engine.close();
    }
    Ok(())
}

/// Change display units (`"meters"`/`"kilometers"`,
/// `"squaremeters"`/`"squarekilometers"`); the stored value is untouched.
#[wasm_bindgen(js_name = measureUnits)]
pub fn measure_units(length: Option<String>, area: Option<String>) -> Result<(), JsValue> {
    let length: Option<LengthUnit> = length
        .map(|l| serde_json::from_value(serde_json::Value::String(l)))
        .transpose()
        .map_err(js_err)?;
    let area: Option<AreaUnit> = area
        .map(|a| serde_json::from_value(serde_json::Value::String(a)))
        .transpose()
        .map_err(js_err)?;
    with_state(|s| {
        if let Some(m) = s.measuring.as_mut() {
            if let Some(u) = length {
                m.engine.set_length_unit(u);
            }
            if let Some(u) = area {
                m.engine.set_area_unit(u);
            }
        }
    })
}

/// `{ state, readout }` of the running measurement, or `null`.
#[wasm_bindgen(js_name = measureState)]
pub fn measure_state() -> Result<JsValue, JsValue> {
    with_state(|s| match &s.measuring {
        Some(m) => to_js(&serde_json::json!({
            "instance": m.instance,
            "state": m.engine.state(),
            "readout": m.engine.readout(),
        })),
        None => Ok(JsValue::NULL),
    })?
}

#[wasm_bindgen(js_name = openExportDialog)]
pub fn open_export_dialog() -> Result<(), JsValue> {
    with_state(|s| s.dialog.open())
}

/// Closing does not cancel a running export; its late status is dropped.
#[wasm_bindgen(js_name = closeExportDialog)]
pub fn close_export_dialog() -> Result<(), JsValue> {
    with_state(|s| s.dialog.close())
}

#[wasm_bindgen(js_name = exportDialogState)]
pub fn export_dialog_state() -> Result<JsValue, JsValue> {
    with_state(|s| to_js(&s.dialog.view()))?
}

/// True while an export holds the capturing flag; the page disables its
/// export control meanwhile.
#[wasm_bindgen(js_name = isCapturing)]
pub fn is_capturing() -> Result<bool, JsValue> {
    with_state(|s| s.flag.is_capturing())
}

fn panel_details(s: &State, primary: &str) -> PanelDetails {
    let extent = s.registry.get(primary).and_then(|i| i.extent);
    PanelDetails {
        title: s.config.export.title.clone(),
        subtitle: None,
        extent,
        graticule: extent
            .map(|e| graticule(&e, s.config.graticule))
            .unwrap_or_default(),
        legend: s.legend.clone(),
        stats: extent
            .map(|e| visible_stats(&s.datasets, &e))
            .unwrap_or_default(),
    }
}

/// Capture `ids` (primary first, then the optional mini map), build the
/// print document and offer it as a download. Resolves to the export report.
#[wasm_bindgen(js_name = exportToFile)]
pub async fn export_to_file(
    ids: Vec<String>,
    file_name: Option<String>,
) -> Result<JsValue, JsValue> {
    let rc: Rc<RefCell<State>> =
        state::current().ok_or_else(|| JsValue::from_str("atlas not initialised; call init() first"))?;
    let (exporter, request, details, ticket) = {
        let s = rc
            .try_borrow()
            .map_err(|_| JsValue::from_str("atlas state is busy (re-entrant call)"))?;
        let name = file_name.unwrap_or_else(|| s.config.export.file_name.clone());
        let request = ExportRequest::from_ids(&ids, &name).map_err(js_err)?;
        let details = panel_details(&s, &request.primary);
        let exporter = Exporter::new(
            BrowserCapture::new(rc.clone()),
            HiddenPanel::new(s.document.clone(), s.config.export.panel_width_px),
            BrowserDownload::new(s.document.clone()),
            s.flag.clone(),
            s.config.export.clone(),
        )
        .with_jobs(s.jobs.clone());
        (exporter, request, details, s.dialog.ticket())
    };
    let report = exporter
        .export(&request, details, Some(&ticket))
        .await
        .map_err(js_err)?;
    to_js(&report)
}
