//! Observation context
//!
//! A [`SensorContext`] owns everything the sensors of one document share:
//! the host document, the listener registry and the overlay arena. Hosts
//! create one context per document (or isolated root) and route every scroll
//! event of that document into [`SensorContext::handle_scroll`], so the
//! number of host listeners stays at one no matter how many elements are
//! observed.
//!
//! The context is a cheap `Rc` handle; clones share the same state. Listener
//! callbacks run while the state is not borrowed, so they may attach, detach
//! or reset sensors through a clone of the context.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use rustc_hash::FxHashMap;
use slotmap::SlotMap;

use crate::dom::{BoxSize, Dom};
use crate::error::Result;
use crate::options::SensorOptions;
use crate::overlay::{self, SensorId, SensorOverlay};
use crate::registry::{ElementId, EventRegistry, ResizeListener};
use crate::targets::Targets;

/// Identities are unique across contexts sharing a document
static NEXT_IDENTITY: AtomicU64 = AtomicU64::new(1);

/// State shared by all sensors of a context
pub struct SensorState<D: Dom> {
    pub(crate) dom: D,
    pub(crate) registry: EventRegistry<D::Node>,
    pub(crate) overlays: SlotMap<SensorId, SensorOverlay<D::Node>>,
    /// Instrumented elements, by identity
    pub(crate) sensors: FxHashMap<ElementId, SensorId>,
    /// Element → identity side table
    ///
    /// The identity attribute on the element is only a marker for the host;
    /// cloned nodes and other contexts can carry copies of it.
    elements: Vec<(D::Node, ElementId)>,
    pub(crate) options: SensorOptions,
}

impl<D: Dom> SensorState<D> {
    fn new(dom: D, options: SensorOptions) -> Self {
        Self {
            dom,
            registry: EventRegistry::new(),
            overlays: SlotMap::with_key(),
            sensors: FxHashMap::default(),
            elements: Vec::new(),
            options,
        }
    }

    /// Identity this context assigned to the element, if any
    pub(crate) fn identity(&self, element: &D::Node) -> Option<ElementId> {
        self.elements
            .iter()
            .find(|(node, _)| node == element)
            .map(|&(_, id)| id)
    }

    /// Identity of the element, assigning a fresh one if it has none
    fn ensure_identity(&mut self, element: &D::Node) -> Result<ElementId> {
        if let Some(id) = self.identity(element) {
            return Ok(id);
        }
        let id = ElementId::from_raw(NEXT_IDENTITY.fetch_add(1, Ordering::Relaxed));
        if let Some(stale) = self.dom.attribute(element, &self.options.identity_attribute) {
            tracing::debug!(value = %stale, %id, "replacing identity marker not owned by this context");
        }
        self.dom
            .set_attribute(element, &self.options.identity_attribute, &id.to_string())?;
        self.elements.push((element.clone(), id));
        Ok(id)
    }

    /// Remove the identity marker unless another context has rewritten it
    fn clear_marker(&mut self, element: &D::Node, id: ElementId) -> Result<()> {
        let marker = self.dom.attribute(element, &self.options.identity_attribute);
        if marker.as_deref() == Some(id.to_string().as_str()) {
            self.dom
                .remove_attribute(element, &self.options.identity_attribute)?;
        }
        Ok(())
    }

    pub(crate) fn sensor_of(&self, element: &D::Node) -> Option<SensorId> {
        let id = self.identity(element)?;
        self.sensors.get(&id).copied()
    }

    fn attach_one(&mut self, element: &D::Node, listener: &ResizeListener<D::Node>) -> Result<()> {
        let id = self.ensure_identity(element)?;

        if !self.sensors.contains_key(&id) {
            let sensor = overlay::mount(
                &mut self.dom,
                &mut self.overlays,
                element,
                id,
                &self.options,
            )?;
            self.overlays[sensor].owner = Some(listener.clone());
            self.sensors.insert(id, sensor);
        }

        self.registry.add(id, listener.clone());
        Ok(())
    }

    fn detach_one(
        &mut self,
        element: &D::Node,
        listener: Option<&ResizeListener<D::Node>>,
    ) -> Result<()> {
        let Some(id) = self.identity(element) else {
            return Ok(());
        };

        if let Some(listener) = listener {
            self.registry.remove(id, listener);
            if self.registry.length(id).unwrap_or(0) > 0 {
                return Ok(());
            }
        }

        self.teardown(element, id)
    }

    /// Remove the overlay, the registrations and the identity of an element
    fn teardown(&mut self, element: &D::Node, id: ElementId) -> Result<()> {
        self.registry.purge(id);
        self.elements.retain(|(_, known)| *known != id);
        let overlay = self
            .sensors
            .remove(&id)
            .and_then(|sensor| self.overlays.remove(sensor));
        if let Some(overlay) = overlay {
            overlay::unmount(&mut self.dom, &overlay)?;
        }
        self.clear_marker(element, id)
    }

    fn reset_one(&mut self, element: &D::Node) -> Result<()> {
        let Some(sensor) = self.sensor_of(element) else {
            return Ok(());
        };
        let Some(overlay) = self.overlays.get_mut(sensor) else {
            return Ok(());
        };

        // External DOM edits may have dropped the container
        if self.dom.parent_element(&overlay.container).as_ref() != Some(element) {
            tracing::debug!(identity = %overlay.identity, "re-attaching detached sensor overlay");
            self.dom.append_child(element, &overlay.container)?;
        }
        overlay::rearm(&mut self.dom, overlay, self.options.expand_extent)
    }
}

impl<D: Dom> fmt::Debug for SensorState<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SensorState")
            .field("registry", &self.registry)
            .field("overlays", &self.overlays.len())
            .field("options", &self.options)
            .finish()
    }
}

/// Shared handle to the sensor state of one document
pub struct SensorContext<D: Dom> {
    pub(crate) state: Rc<RefCell<SensorState<D>>>,
}

impl<D: Dom> Clone for SensorContext<D> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
        }
    }
}

impl<D: Dom> fmt::Debug for SensorContext<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.state.try_borrow() {
            Ok(state) => f.debug_tuple("SensorContext").field(&*state).finish(),
            Err(_) => f.write_str("SensorContext(<borrowed>)"),
        }
    }
}

impl<D: Dom> SensorContext<D> {
    /// Create a context with default options
    pub fn new(dom: D) -> Self {
        Self::with_options(dom, SensorOptions::default())
    }

    pub fn with_options(dom: D, options: SensorOptions) -> Self {
        Self {
            state: Rc::new(RefCell::new(SensorState::new(dom, options))),
        }
    }

    /// Non-owning handle, for host listeners that must not keep the context alive
    pub fn downgrade(&self) -> WeakSensorContext<D> {
        WeakSensorContext {
            state: Rc::downgrade(&self.state),
        }
    }

    pub fn options(&self) -> SensorOptions {
        self.state.borrow().options.clone()
    }

    /// Run `f` with mutable access to the host document
    pub fn with_dom<R>(&self, f: impl FnOnce(&mut D) -> R) -> R {
        f(&mut self.state.borrow_mut().dom)
    }

    /// Mount sensors where missing and register `listener` on every target
    pub fn attach(
        &self,
        targets: impl Into<Targets<D::Node>>,
        listener: &ResizeListener<D::Node>,
    ) -> Result<()> {
        let targets = targets.into();
        let mut state = self.state.borrow_mut();
        for element in &targets {
            state.attach_one(element, listener)?;
        }
        Ok(())
    }

    /// Unregister from every target
    ///
    /// With a listener, one registration of it is removed and the sensor is
    /// torn down once the element has no listeners left. Without one, the
    /// sensor and all registrations are removed.
    pub fn detach(
        &self,
        targets: impl Into<Targets<D::Node>>,
        listener: Option<&ResizeListener<D::Node>>,
    ) -> Result<()> {
        let targets = targets.into();
        let mut state = self.state.borrow_mut();
        for element in &targets {
            state.detach_one(element, listener)?;
        }
        Ok(())
    }

    /// Detach the listener of the sensor that mounted the element's overlay
    pub fn detach_overlay_owner(&self, element: &D::Node) -> Result<()> {
        let mut state = self.state.borrow_mut();
        let Some(sensor) = state.sensor_of(element) else {
            return Ok(());
        };
        let owner = state.overlays.get(sensor).and_then(|o| o.owner.clone());
        state.detach_one(element, owner.as_ref())
    }

    /// Re-attach and re-arm the sensors of every instrumented target
    pub fn reset(&self, targets: impl Into<Targets<D::Node>>) -> Result<()> {
        let targets = targets.into();
        let mut state = self.state.borrow_mut();
        for element in &targets {
            state.reset_one(element)?;
        }
        Ok(())
    }

    /// Whether the element currently carries a sensor overlay
    pub fn is_instrumented(&self, element: &D::Node) -> bool {
        self.state.borrow().sensor_of(element).is_some()
    }

    /// Number of listener registrations for the element
    ///
    /// `None` once the element was never attached or has been fully detached.
    pub fn length(&self, element: &D::Node) -> Option<usize> {
        let state = self.state.borrow();
        let id = state.identity(element)?;
        state.registry.length(id)
    }

    /// Whether `listener` still has a registration on any element
    pub fn is_registered(&self, listener: &ResizeListener<D::Node>) -> bool {
        self.state.borrow().registry.contains_listener(listener)
    }

    pub fn identity(&self, element: &D::Node) -> Option<ElementId> {
        self.state.borrow().identity(element)
    }

    /// Last confirmed size of an instrumented element
    pub fn last_size(&self, element: &D::Node) -> Option<BoxSize> {
        let state = self.state.borrow();
        let sensor = state.sensor_of(element)?;
        state.overlays.get(sensor).map(SensorOverlay::last_size)
    }

    /// Overlay container mounted on the element
    pub fn overlay_container(&self, element: &D::Node) -> Option<D::Node> {
        let state = self.state.borrow();
        let sensor = state.sensor_of(element)?;
        state.overlays.get(sensor).map(|o| o.container.clone())
    }

    /// Expand and shrink panes of the element's overlay
    pub fn overlay_panes(&self, element: &D::Node) -> Option<(D::Node, D::Node)> {
        let state = self.state.borrow();
        let sensor = state.sensor_of(element)?;
        state
            .overlays
            .get(sensor)
            .map(|o| (o.expand_pane.clone(), o.shrink_pane.clone()))
    }

    /// Number of mounted overlays
    pub fn overlay_count(&self) -> usize {
        self.state.borrow().overlays.len()
    }
}

/// Weak counterpart of [`SensorContext`]
pub struct WeakSensorContext<D: Dom> {
    state: Weak<RefCell<SensorState<D>>>,
}

impl<D: Dom> Clone for WeakSensorContext<D> {
    fn clone(&self) -> Self {
        Self {
            state: Weak::clone(&self.state),
        }
    }
}

impl<D: Dom> WeakSensorContext<D> {
    pub fn upgrade(&self) -> Option<SensorContext<D>> {
        self.state.upgrade().map(|state| SensorContext { state })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::{HeadlessDom, HeadlessNode};

    fn context_with(sizes: &[(i32, i32)]) -> (SensorContext<HeadlessDom>, Vec<HeadlessNode>) {
        let mut dom = HeadlessDom::new();
        let elements = sizes
            .iter()
            .map(|&(w, h)| {
                let element = dom.create_element("div").unwrap();
                dom.set_size(&element, w, h);
                element
            })
            .collect();
        (SensorContext::new(dom), elements)
    }

    fn noop() -> ResizeListener<HeadlessNode> {
        ResizeListener::new(|_, _, _| {})
    }

    #[test]
    fn test_attach_assigns_identity_once() {
        let (ctx, elements) = context_with(&[(100, 50)]);
        let element = elements[0];

        ctx.attach(Targets::One(element), &noop()).unwrap();
        let first = ctx.identity(&element).unwrap();
        ctx.attach(Targets::One(element), &noop()).unwrap();

        assert_eq!(ctx.identity(&element), Some(first));
        assert_eq!(
            ctx.with_dom(|dom| dom.attribute(&element, "data-rs-guid")),
            Some(first.to_string())
        );
        assert_eq!(ctx.overlay_count(), 1);
        assert_eq!(ctx.length(&element), Some(2));
    }

    #[test]
    fn test_detach_with_listener_keeps_others() {
        let (ctx, elements) = context_with(&[(100, 50)]);
        let element = elements[0];
        let a = noop();
        let b = noop();

        ctx.attach(Targets::One(element), &a).unwrap();
        ctx.attach(Targets::One(element), &b).unwrap();
        ctx.detach(Targets::One(element), Some(&a)).unwrap();

        assert!(ctx.is_instrumented(&element));
        assert_eq!(ctx.length(&element), Some(1));
    }

    #[test]
    fn test_detach_last_listener_tears_down() {
        let (ctx, elements) = context_with(&[(100, 50)]);
        let element = elements[0];
        let a = noop();

        ctx.attach(Targets::One(element), &a).unwrap();
        ctx.detach(Targets::One(element), Some(&a)).unwrap();

        assert!(!ctx.is_instrumented(&element));
        assert_eq!(ctx.length(&element), None);
        assert_eq!(ctx.identity(&element), None);
        assert_eq!(ctx.overlay_count(), 0);
        assert!(ctx.with_dom(|dom| dom.children(&element)).is_empty());
    }

    #[test]
    fn test_detach_without_listener_removes_everything() {
        let (ctx, elements) = context_with(&[(100, 50)]);
        let element = elements[0];

        ctx.attach(Targets::One(element), &noop()).unwrap();
        ctx.attach(Targets::One(element), &noop()).unwrap();
        ctx.detach(Targets::One(element), None).unwrap();

        assert!(!ctx.is_instrumented(&element));
        assert_eq!(ctx.length(&element), None);
    }

    #[test]
    fn test_is_registered_until_last_registration_goes() {
        let (ctx, elements) = context_with(&[(100, 50), (80, 40)]);
        let listener = noop();

        ctx.attach(Targets::Many(elements.clone()), &listener).unwrap();
        ctx.detach(Targets::One(elements[0]), Some(&listener)).unwrap();
        assert!(ctx.is_registered(&listener));

        ctx.detach(Targets::One(elements[1]), None).unwrap();
        assert!(!ctx.is_registered(&listener));
    }

    #[test]
    fn test_detach_unknown_element_is_noop() {
        let (ctx, elements) = context_with(&[(100, 50)]);
        ctx.detach(Targets::One(elements[0]), Some(&noop())).unwrap();
        ctx.detach(Targets::One(elements[0]), None).unwrap();
        assert_eq!(ctx.overlay_count(), 0);
    }

    #[test]
    fn test_detach_foreign_listener_keeps_sensor() {
        let (ctx, elements) = context_with(&[(100, 50)]);
        let element = elements[0];

        ctx.attach(Targets::One(element), &noop()).unwrap();
        ctx.detach(Targets::One(element), Some(&noop())).unwrap();

        assert!(ctx.is_instrumented(&element));
        assert_eq!(ctx.length(&element), Some(1));
    }

    #[test]
    fn test_detach_overlay_owner() {
        let (ctx, elements) = context_with(&[(100, 50)]);
        let element = elements[0];
        let owner = noop();
        let other = noop();

        ctx.attach(Targets::One(element), &owner).unwrap();
        ctx.attach(Targets::One(element), &other).unwrap();
        ctx.detach_overlay_owner(&element).unwrap();
        assert_eq!(ctx.length(&element), Some(1));

        ctx.detach(Targets::One(element), Some(&other)).unwrap();
        assert!(!ctx.is_instrumented(&element));
    }

    #[test]
    fn test_reset_reattaches_removed_overlay() {
        let (ctx, elements) = context_with(&[(100, 50)]);
        let element = elements[0];
        ctx.attach(Targets::One(element), &noop()).unwrap();
        let container = ctx.overlay_container(&element).unwrap();

        ctx.with_dom(|dom| dom.remove_child(&element, &container)).unwrap();
        assert!(ctx.with_dom(|dom| dom.children(&element)).is_empty());

        ctx.reset(Targets::One(element)).unwrap();
        assert_eq!(ctx.with_dom(|dom| dom.children(&element)), vec![container]);

        let (expand, shrink) = ctx.overlay_panes(&element).unwrap();
        assert_eq!(ctx.with_dom(|dom| dom.scroll_position(&expand)), (99_900, 99_950));
        assert_eq!(ctx.with_dom(|dom| dom.scroll_position(&shrink)), (100, 50));
    }

    #[test]
    fn test_reset_ignores_uninstrumented() {
        let (ctx, elements) = context_with(&[(100, 50)]);
        ctx.reset(Targets::One(elements[0])).unwrap();
        assert_eq!(ctx.overlay_count(), 0);
    }

    #[test]
    fn test_foreign_identity_marker_is_ignored() {
        let (ctx, elements) = context_with(&[(100, 50)]);
        let element = elements[0];
        ctx.with_dom(|dom| dom.set_attribute(&element, "data-rs-guid", "bogus"))
            .unwrap();

        assert_eq!(ctx.identity(&element), None);
        ctx.attach(Targets::One(element), &noop()).unwrap();
        assert!(ctx.is_instrumented(&element));
        assert_eq!(
            ctx.with_dom(|dom| dom.attribute(&element, "data-rs-guid")),
            ctx.identity(&element).map(|id| id.to_string())
        );
    }

    #[test]
    fn test_copied_identity_marker_gets_own_sensor() {
        let (ctx, elements) = context_with(&[(100, 50), (80, 40)]);
        let (original, copy) = (elements[0], elements[1]);
        let calls = Rc::new(RefCell::new(Vec::new()));
        let listener = |tag: &'static str| {
            let calls = Rc::clone(&calls);
            ResizeListener::new(move |_, _, _| calls.borrow_mut().push(tag))
        };

        ctx.attach(Targets::One(original), &listener("original")).unwrap();
        let marker = ctx
            .with_dom(|dom| dom.attribute(&original, "data-rs-guid"))
            .unwrap();
        // A cloned node carries the same attributes
        ctx.with_dom(|dom| dom.set_attribute(&copy, "data-rs-guid", &marker))
            .unwrap();
        ctx.attach(Targets::One(copy), &listener("copy")).unwrap();
        ctx.dispatch_pending().unwrap();

        assert_eq!(ctx.overlay_count(), 2);
        assert_ne!(ctx.identity(&original), ctx.identity(&copy));
        assert_eq!(ctx.with_dom(|dom| dom.children(&copy)).len(), 1);
        assert_eq!(ctx.length(&original), Some(1));
        assert_eq!(ctx.length(&copy), Some(1));

        ctx.with_dom(|dom| dom.set_size(&copy, 90, 40));
        ctx.dispatch_pending().unwrap();
        assert_eq!(*calls.borrow(), vec!["copy"]);

        ctx.with_dom(|dom| dom.set_size(&original, 120, 50));
        ctx.dispatch_pending().unwrap();
        assert_eq!(*calls.borrow(), vec!["copy", "original"]);

        ctx.detach(Targets::One(copy), None).unwrap();
        assert!(ctx.is_instrumented(&original));
        assert!(!ctx.is_instrumented(&copy));
    }

    #[test]
    fn test_identities_unique_across_contexts() {
        let (first, _) = context_with(&[]);
        let (second, _) = context_with(&[]);
        let a = first.with_dom(|dom| {
            let node = dom.create_element("div").unwrap();
            dom.set_size(&node, 10, 10);
            node
        });
        let b = second.with_dom(|dom| {
            let node = dom.create_element("div").unwrap();
            dom.set_size(&node, 10, 10);
            node
        });

        first.attach(Targets::One(a), &noop()).unwrap();
        second.attach(Targets::One(b), &noop()).unwrap();

        assert_ne!(first.identity(&a), second.identity(&b));
    }

    #[test]
    fn test_teardown_keeps_marker_rewritten_elsewhere() {
        let (ctx, elements) = context_with(&[(100, 50)]);
        let element = elements[0];
        ctx.attach(Targets::One(element), &noop()).unwrap();
        ctx.with_dom(|dom| dom.set_attribute(&element, "data-rs-guid", "rs-999999"))
            .unwrap();

        ctx.detach(Targets::One(element), None).unwrap();

        assert!(!ctx.is_instrumented(&element));
        assert_eq!(
            ctx.with_dom(|dom| dom.attribute(&element, "data-rs-guid")).as_deref(),
            Some("rs-999999")
        );
    }

    #[test]
    fn test_weak_context() {
        let (ctx, _) = context_with(&[]);
        let weak = ctx.downgrade();
        assert!(weak.upgrade().is_some());
        drop(ctx);
        assert!(weak.upgrade().is_none());
    }
}
