use atlas_core::measure::{DrawMode, DrawSurface, Readout, VertexEvent};
use geo_types::Coord;
use serde_json::Value;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::HtmlElement;

use crate::bindings::{DrawControl, VectorMap};
use crate::state::with_state;

const DRAW_EVENTS: [&str; 4] = ["draw.create", "draw.update", "draw.delete", "draw.render"];

/// Measurement tool mounted on one map: the draw control plus the readout
/// element.
pub struct MapDrawSurface {
    map: VectorMap,
    readout: HtmlElement,
    draw: Option<DrawControl>,
    handlers: Vec<(&'static str, Closure<dyn FnMut(JsValue)>)>,
}

impl MapDrawSurface {
    pub fn new(map: VectorMap, readout: HtmlElement) -> Self {
        Self {
            map,
            readout,
            draw: None,
            handlers: Vec::new(),
        }
    }

    /// Vertices of the shape currently held by the draw control.
    pub fn current_vertices(&self) -> Option<Vec<Coord<f64>>> {
        let draw = self.draw.as_ref()?;
        let text = js_sys::JSON::stringify(&draw.get_all()).ok()?.as_string()?;
        let fc: Value = serde_json::from_str(&text).ok()?;
        Some(parse_draw_vertices(&fc))
    }
}

impl DrawSurface for MapDrawSurface {
    fn attach(&mut self, mode: DrawMode) {
        let options = js_sys::JSON::parse(r#"{"displayControlsDefault":false}"#)
            .unwrap_or(JsValue::UNDEFINED);
        let draw = DrawControl::new(&options);
        self.map.add_control(&draw);
        for event in DRAW_EVENTS {
            // handlers only queue work: the draw control fires synchronously
            // from inside calls we make while the state is borrowed
            let h = Closure::<dyn FnMut(JsValue)>::wrap(Box::new(move |_e: JsValue| {
                wasm_bindgen_futures::spawn_local(async move { on_draw_event(event) });
            }));
            self.map.on(event, h.as_ref().unchecked_ref());
            self.handlers.push((event, h));
        }
        draw.change_mode(match mode {
            DrawMode::Line => "draw_line_string",
            DrawMode::Polygon => "draw_polygon",
        });
        self.draw = Some(draw);
    }

    fn detach(&mut self) {
        for (event, h) in self.handlers.drain(..) {
            self.map.off(event, h.as_ref().unchecked_ref());
        }
        if let Some(draw) = self.draw.take() {
            draw.delete_all();
            self.map.remove_control(&draw);
        }
    }

    fn render(&mut self, readout: Option<&Readout>) {
        match readout {
            Some(r) => {
                self.readout
                    .set_text_content(Some(&format!("{} ({} vertices)", r.text, r.vertices)));
                let _ = self.readout.remove_attribute("hidden");
            }
            None => {
                self.readout.set_text_content(None);
                let _ = self.readout.set_attribute("hidden", "");
            }
        }
    }
}

/// Deferred handler for draw-control events.
fn on_draw_event(event: &str) {
    let result = with_state(|s| {
        let Some(m) = s.measuring.as_mut() else {
            return;
        };
        let Some(vertices) = m.engine.surface().current_vertices() else {
            return;
        };
        let stored = m.engine.session().map(|sess| sess.vertices().to_vec());
        if event == "draw.delete" || vertices.is_empty() {
            if stored.is_some_and(|v| !v.is_empty()) {
                m.engine.on_vertex(VertexEvent::Replace(Vec::new()));
            }
            return;
        }
        if stored.as_ref() != Some(&vertices) {
            m.engine.on_vertex(VertexEvent::Replace(vertices));
        }
        if event == "draw.create" {
            m.engine.finish();
        }
    });
    if let Err(e) = result {
        log::debug!("draw event {event} ignored: {e:?}");
    }
}

/// Vertices of the first line or polygon in a draw FeatureCollection; the
/// closing vertex of a polygon ring is dropped.
pub fn parse_draw_vertices(fc: &Value) -> Vec<Coord<f64>> {
    let Some(geometry) = fc["features"]
        .as_array()
        .and_then(|f| f.iter().find(|f| f["geometry"].is_object()))
        .map(|f| &f["geometry"])
    else {
        return Vec::new();
    };
    let positions = match geometry["type"].as_str() {
        Some("LineString") => geometry["coordinates"].as_array(),
        Some("Polygon") => geometry["coordinates"][0].as_array(),
        _ => None,
    };
    let mut out: Vec<Coord<f64>> = positions
        .into_iter()
        .flatten()
        .filter_map(|p| {
            Some(Coord {
                x: p[0].as_f64()?,
                y: p[1].as_f64()?,
            })
        })
        .collect();
    if geometry["type"] == "Polygon" && out.len() > 1 && out.first() == out.last() {
        out.pop();
    }
    out
}
