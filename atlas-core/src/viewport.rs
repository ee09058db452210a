use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::{Rc, Weak};

use serde::Serialize;

use crate::config::LocatorConfig;
use crate::error::AtlasError;
use crate::extent::{BoundingExtent, Ring5, locator_ring};
use crate::registry::{InstanceRegistry, ViewState};

/// Published after an instance's view settles.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ExtentChanged {
    pub instance: String,
    pub view: ViewState,
    pub extent: BoundingExtent,
    pub ring: Ring5,
    pub locator: Ring5,
}

type Callback = Rc<RefCell<dyn FnMut(&ExtentChanged)>>;

struct Slot {
    id: u64,
    // None: every instance; Some(id): only events from that instance
    scope: Option<String>,
    callback: Callback,
}

struct SyncInner {
    next_id: u64,
    slots: Vec<Slot>,
    last_published: HashMap<String, BoundingExtent>,
    fit_pending: HashSet<String>,
    locator: LocatorConfig,
}

/// Turns "view settled" notifications into extent/locator events.
///
/// Settle events are already debounced by the renderer (one per finished
/// gesture), so no timer lives here. A settle that reports the same extent as
/// the last published one is suppressed, except right after
/// [`expect_fit`](Self::expect_fit).
#[derive(Clone)]
pub struct ViewportSync {
    inner: Rc<RefCell<SyncInner>>,
}

impl ViewportSync {
    pub fn new(locator: LocatorConfig) -> Self {
        Self {
            inner: Rc::new(RefCell::new(SyncInner {
                next_id: 1,
                slots: Vec::new(),
                last_published: HashMap::new(),
                fit_pending: HashSet::new(),
                locator,
            })),
        }
    }

    /// Receive events from every instance.
    pub fn subscribe(&self, f: impl FnMut(&ExtentChanged) + 'static) -> Subscription {
        self.add_slot(None, Rc::new(RefCell::new(f)))
    }

    /// Receive events from `id` only. Removed automatically by
    /// [`teardown_instance`](Self::teardown_instance).
    pub fn subscribe_instance(
        &self,
        id: &str,
        f: impl FnMut(&ExtentChanged) + 'static,
    ) -> Subscription {
        self.add_slot(Some(id.to_string()), Rc::new(RefCell::new(f)))
    }

    fn add_slot(&self, scope: Option<String>, callback: Callback) -> Subscription {
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.slots.push(Slot {
            id,
            scope,
            callback,
        });
        Subscription {
            id,
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Called right before a programmatic fit-to-bounds: the next settle on
    /// `id` is published even if its extent did not change.
    pub fn expect_fit(&self, id: &str) {
        self.inner.borrow_mut().fit_pending.insert(id.to_string());
    }

    /// Store the settled camera in the registry and derive the event to
    /// publish. `Ok(None)` means the settle was a duplicate and is suppressed.
    pub fn record<V, O>(
        &self,
        registry: &mut InstanceRegistry<V, O>,
        id: &str,
        view: ViewState,
        extent: BoundingExtent,
    ) -> Result<Option<ExtentChanged>, AtlasError> {
        let ring = registry.update_view(id, view, extent)?;
        let mut inner = self.inner.borrow_mut();
        let forced = inner.fit_pending.remove(id);
        let unchanged = inner.last_published.get(id) == Some(&extent);
        if unchanged && !forced {
            log::debug!("instance '{id}': settle without extent change suppressed");
            return Ok(None);
        }
        inner.last_published.insert(id.to_string(), extent);
        let locator = locator_ring(view.center, inner.locator.half_lng, inner.locator.half_lat);
        Ok(Some(ExtentChanged {
            instance: id.to_string(),
            view,
            extent,
            ring,
            locator,
        }))
    }

    /// Deliver `event` to the matching subscribers. No internal borrow is held
    /// while callbacks run, so they may subscribe or unsubscribe freely.
    pub fn publish(&self, event: &ExtentChanged) {
        let targets: Vec<(u64, Callback)> = self
            .inner
            .borrow()
            .slots
            .iter()
            .filter(|s| s.scope.as_deref().is_none_or(|scope| scope == event.instance))
            .map(|s| (s.id, s.callback.clone()))
            .collect();
        for (id, cb) in targets {
            if !self.inner.borrow().slots.iter().any(|s| s.id == id) {
                continue;
            }
            match cb.try_borrow_mut() {
                Ok(mut f) => f(event),
                Err(_) => log::warn!("subscriber {id} re-entered during dispatch; skipped"),
            }
        }
    }

    /// `record` followed by `publish`.
    pub fn settle<V, O>(
        &self,
        registry: &mut InstanceRegistry<V, O>,
        id: &str,
        view: ViewState,
        extent: BoundingExtent,
    ) -> Result<Option<ExtentChanged>, AtlasError> {
        let event = self.record(registry, id, view, extent)?;
        if let Some(ev) = &event {
            self.publish(ev);
        }
        Ok(event)
    }

    /// Drop everything tied to `id`: scoped subscriptions, the dedupe memory
    /// and a pending fit flag.
    pub fn teardown_instance(&self, id: &str) {
        let removed: Vec<Slot> = {
            let mut inner = self.inner.borrow_mut();
            let (gone, keep): (Vec<Slot>, Vec<Slot>) = std::mem::take(&mut inner.slots)
                .into_iter()
                .partition(|s| s.scope.as_deref() == Some(id));
            inner.slots = keep;
            inner.last_published.remove(id);
            inner.fit_pending.remove(id);
            gone
        };
        // callbacks may own subscriptions; release them outside the borrow
        drop(removed);
    }

    /// Applies to events recorded from now on.
    pub fn set_locator(&self, locator: LocatorConfig) {
        self.inner.borrow_mut().locator = locator;
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.borrow().slots.len()
    }
}

/// Live registration with a [`ViewportSync`]. Dropping it unsubscribes.
pub struct Subscription {
    id: u64,
    inner: Weak<RefCell<SyncInner>>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        // Drop does the work
    }

    /// False once unsubscribed, torn down with its instance, or the sync is gone.
    pub fn is_active(&self) -> bool {
        self.inner
            .upgrade()
            .is_some_and(|inner| {
                let guard = inner.borrow();
                guard.slots.iter().any(|s| s.id == self.id)
            })
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(inner) = self.inner.upgrade() else {
            return;
        };
        let removed = match inner.try_borrow_mut() {
            Ok(mut guard) => guard
                .slots
                .iter()
                .position(|s| s.id == self.id)
                .map(|i| guard.slots.remove(i)),
            Err(_) => None,
        };
        drop(removed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn locator() -> LocatorConfig {
        LocatorConfig {
            half_lng: 0.25,
            half_lat: 0.5,
        }
    }

    fn view(cx: f64, cy: f64) -> ViewState {
        ViewState {
            center: (cx, cy),
            zoom: 9.0,
            ..Default::default()
        }
    }

    fn setup() -> (ViewportSync, InstanceRegistry<(), ()>) {
        let mut reg = InstanceRegistry::new();
        reg.register("main", ());
        reg.register("mini", ());
        (ViewportSync::new(locator()), reg)
    }

    #[test]
    fn publishes_extent_and_locator() {
        let (sync, mut reg) = setup();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let _sub = sync.subscribe(move |ev| sink.borrow_mut().push(ev.clone()));
        let e = BoundingExtent::new(100.0, 101.0, 13.0, 14.0).unwrap();
        sync.settle(&mut reg, "main", view(100.5, 13.5), e).unwrap();
        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].extent, e);
        assert_eq!(seen[0].ring, e.ring());
        assert_eq!(seen[0].locator[0].x, 100.25);
        assert_eq!(seen[0].locator[0].y, 13.0);
    }

    #[test]
    fn duplicate_settle_is_suppressed_unless_fit_expected() {
        let (sync, mut reg) = setup();
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        let _sub = sync.subscribe(move |_| c.set(c.get() + 1));
        let e = BoundingExtent::new(0.0, 1.0, 0.0, 1.0).unwrap();
        sync.settle(&mut reg, "main", view(0.5, 0.5), e).unwrap();
        assert!(sync.settle(&mut reg, "main", view(0.5, 0.5), e).unwrap().is_none());
        assert_eq!(count.get(), 1);

        sync.expect_fit("main");
        assert!(sync.settle(&mut reg, "main", view(0.5, 0.5), e).unwrap().is_some());
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn instance_scoped_subscription_is_removed_on_teardown() {
        let (sync, mut reg) = setup();
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        let sub = sync.subscribe_instance("mini", move |_| c.set(c.get() + 1));
        let e = BoundingExtent::new(0.0, 1.0, 0.0, 1.0).unwrap();
        sync.settle(&mut reg, "main", view(0.5, 0.5), e).unwrap();
        assert_eq!(count.get(), 0);
        sync.settle(&mut reg, "mini", view(0.5, 0.5), e).unwrap();
        assert_eq!(count.get(), 1);

        sync.teardown_instance("mini");
        assert!(!sub.is_active());
        let e2 = BoundingExtent::new(0.0, 2.0, 0.0, 2.0).unwrap();
        sync.settle(&mut reg, "mini", view(1.0, 1.0), e2).unwrap();
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn dropping_subscription_unsubscribes() {
        let (sync, _reg) = setup();
        let sub = sync.subscribe(|_| {});
        assert_eq!(sync.subscriber_count(), 1);
        sub.unsubscribe();
        assert_eq!(sync.subscriber_count(), 0);
    }

    #[test]
    fn callbacks_may_subscribe_during_dispatch() {
        let (sync, mut reg) = setup();
        let held = Rc::new(RefCell::new(Vec::new()));
        let (s2, h2) = (sync.clone(), held.clone());
        let _sub = sync.subscribe(move |_| h2.borrow_mut().push(s2.subscribe(|_| {})));
        let e = BoundingExtent::new(0.0, 1.0, 0.0, 1.0).unwrap();
        sync.settle(&mut reg, "main", view(0.5, 0.5), e).unwrap();
        assert_eq!(sync.subscriber_count(), 2);
        assert_eq!(held.borrow().len(), 1);
    }

    #[test]
    fn settle_on_unmounted_instance_is_not_ready() {
        let (sync, mut reg) = setup();
        reg.unregister("mini");
        let e = BoundingExtent::new(0.0, 1.0, 0.0, 1.0).unwrap();
        assert!(matches!(
            sync.settle(&mut reg, "mini", view(0.5, 0.5), e),
            Err(AtlasError::ResourceNotReady(_))
        ));
    }
}
