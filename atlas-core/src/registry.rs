use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::AtlasError;
use crate::extent::{BoundingExtent, Ring5};

/// Camera of one map instance as reported on the last settle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    /// (lng, lat) in degrees
    pub center: (f64, f64),
    pub zoom: f64,
    pub bearing: f64,
    pub pitch: f64,
}

/// One mounted pair of (vector basemap renderer, data overlay renderer).
///
/// `V` and `O` are the renderer handles; in the browser they are JS objects,
/// in tests they are plain values.
#[derive(Debug)]
pub struct MapInstance<V, O> {
    pub key: String,
    vector: Option<V>,
    overlay: Option<O>,
    pub view: ViewState,
    pub extent: Option<BoundingExtent>,
    pub bounds_ring: Option<Ring5>,
}

impl<V, O> MapInstance<V, O> {
    fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            vector: None,
            overlay: None,
            view: ViewState::default(),
            extent: None,
            bounds_ring: None,
        }
    }

    pub fn vector(&self) -> Option<&V> {
        self.vector.as_ref()
    }

    pub fn overlay(&self) -> Option<&O> {
        self.overlay.as_ref()
    }

    pub fn is_mounted(&self) -> bool {
        self.vector.is_some()
    }
}

/// Handles released by [`InstanceRegistry::unregister`]; the caller disposes them.
pub struct Released<V, O> {
    pub vector: Option<V>,
    pub overlay: Option<O>,
}

/// Keyed store of map instances. Owned by the application root and passed
/// explicitly to consumers; there is no process-wide instance.
pub struct InstanceRegistry<V, O> {
    instances: HashMap<String, MapInstance<V, O>>,
}

impl<V, O> Default for InstanceRegistry<V, O> {
    fn default() -> Self {
        Self {
            instances: HashMap::new(),
        }
    }
}

impl<V, O> InstanceRegistry<V, O> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mount a vector renderer under `id`. Returns the previously active
    /// handle, if any, so it can be disposed; at most one stays active.
    pub fn register(&mut self, id: &str, vector: V) -> Option<V> {
        let inst = self
            .instances
            .entry(id.to_string())
            .or_insert_with(|| MapInstance::new(id));
        let previous = inst.vector.replace(vector);
        if previous.is_some() {
            log::debug!("instance '{id}': vector handle replaced");
        }
        previous
    }

    /// Mount the data overlay. The overlay is a control of the vector
    /// renderer, so the vector handle must already be registered.
    pub fn register_overlay(&mut self, id: &str, overlay: O) -> Result<Option<O>, AtlasError> {
        match self.instances.get_mut(id) {
            Some(inst) if inst.vector.is_some() => Ok(inst.overlay.replace(overlay)),
            _ => Err(AtlasError::OverlayBeforeVector(id.to_string())),
        }
    }

    pub fn get(&self, id: &str) -> Option<&MapInstance<V, O>> {
        self.instances.get(id)
    }

    /// Like [`get`](Self::get) but only for instances whose vector handle is live.
    pub fn mounted(&self, id: &str) -> Result<&MapInstance<V, O>, AtlasError> {
        self.instances
            .get(id)
            .filter(|inst| inst.is_mounted())
            .ok_or_else(|| AtlasError::ResourceNotReady(id.to_string()))
    }

    /// Null both handles of `id` and hand them back. Viewport state is kept
    /// so a remount starts from the last known camera.
    pub fn unregister(&mut self, id: &str) -> Released<V, O> {
        match self.instances.get_mut(id) {
            Some(inst) => Released {
                // overlay first: it lives inside the vector renderer
                overlay: inst.overlay.take(),
                vector: inst.vector.take(),
            },
            None => Released {
                vector: None,
                overlay: None,
            },
        }
    }

    /// Record a settled camera. Fails for unknown or unmounted instances.
    pub fn update_view(
        &mut self,
        id: &str,
        view: ViewState,
        extent: BoundingExtent,
    ) -> Result<Ring5, AtlasError> {
        let inst = self
            .instances
            .get_mut(id)
            .filter(|inst| inst.vector.is_some())
            .ok_or_else(|| AtlasError::ResourceNotReady(id.to_string()))?;
        let ring = extent.ring();
        inst.view = view;
        inst.extent = Some(extent);
        inst.bounds_ring = Some(ring);
        Ok(ring)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.instances.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}
