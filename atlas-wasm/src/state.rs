use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use atlas_core::features::Dataset;
use atlas_core::{AtlasConfig, DatasetStats, InstanceRegistry, Subscription, ViewportSync};
use print_core::{CaptureFlag, ExportDialog, JobCounter, LegendEntry};
use wasm_bindgen::prelude::*;
use web_sys::{Document, HtmlElement, Window};

use crate::bindings::{DataOverlay, VectorMap};
use crate::measure::MapDrawSurface;
use atlas_core::measure::MeasurementEngine;

/// A DOM control drawn over a map, registered by reference.
pub struct Control {
    pub name: String,
    pub element: HtmlElement,
}

pub struct Measuring {
    pub instance: String,
    pub engine: MeasurementEngine<MapDrawSurface>,
}

pub struct State {
    pub window: Window,
    pub document: Document,
    pub config: AtlasConfig,
    pub registry: InstanceRegistry<VectorMap, DataOverlay>,
    pub sync: ViewportSync,
    /// "moveend" listeners, one per mounted instance.
    pub settle_handlers: HashMap<String, Closure<dyn FnMut()>>,
    pub controls: HashMap<String, Vec<Control>>,
    pub datasets: Vec<Dataset>,
    pub stats: Vec<DatasetStats>,
    pub legend: Vec<LegendEntry>,
    pub measuring: Option<Measuring>,
    pub flag: CaptureFlag,
    pub dialog: ExportDialog,
    /// Export job ids, continued across `exportToFile` calls.
    pub jobs: JobCounter,
    /// Internal subscribers (locator box, statistics); dropped on teardown.
    pub internal: Vec<Subscription>,
}

impl State {
    pub fn new(window: Window, document: Document, config: AtlasConfig) -> Self {
        Self {
            window,
            document,
            sync: ViewportSync::new(config.locator),
            config,
            registry: InstanceRegistry::new(),
            settle_handlers: HashMap::new(),
            controls: HashMap::new(),
            datasets: Vec::new(),
            stats: Vec::new(),
            legend: Vec::new(),
            measuring: None,
            flag: CaptureFlag::new(),
            dialog: ExportDialog::new(),
            jobs: JobCounter::default(),
            internal: Vec::new(),
        }
    }
}

thread_local! {
    static STATE: RefCell<Option<Rc<RefCell<State>>>> = const { RefCell::new(None) };
}

pub fn install(state: State) -> Rc<RefCell<State>> {
    let rc = Rc::new(RefCell::new(state));
    STATE.with(|st| st.replace(Some(rc.clone())));
    rc
}

/// Detach the application state; `None` if it was never installed.
pub fn take() -> Option<Rc<RefCell<State>>> {
    STATE.with(|st| st.borrow_mut().take())
}

pub fn current() -> Option<Rc<RefCell<State>>> {
    STATE.with(|st| st.borrow().clone())
}

/// Run `f` with the state mutably borrowed. Do not call into JS code that
/// may synchronously re-enter the exported API from inside `f`.
pub fn with_state<R>(f: impl FnOnce(&mut State) -> R) -> Result<R, JsValue> {
    let rc = current().ok_or_else(|| JsValue::from_str("atlas not initialised; call init() first"))?;
    let mut guard = rc
        .try_borrow_mut()
        .map_err(|_| JsValue::from_str("atlas state is busy (re-entrant call)"))?;
    Ok(f(&mut guard))
}
