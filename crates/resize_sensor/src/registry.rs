//! Resize listener registry
//!
//! Maps element identities to the ordered list of listeners registered for
//! them. Many elements share one registry, and an element may carry the same
//! listener more than once; each registration fires and is removed
//! independently.
//!
//! ```text
//! ElementId("rs-1") → [A, B, A]
//! ElementId("rs-2") → [B]
//! ```

use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::dom::BoxSize;

/// Opaque per-element identity used as the registry key
///
/// Rendered as `rs-<n>` when stored on the element.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(u64);

impl ElementId {
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn to_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rs-{}", self.0)
    }
}

impl FromStr for ElementId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.strip_prefix("rs-").unwrap_or(s).parse().map(Self)
    }
}

/// Change payload delivered to listeners
///
/// Dimensions are the observed element's new offset box; differences are
/// `current - last` and go negative when the element shrinks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "camelCase")
)]
pub struct ResizeInfo {
    pub width: i32,
    pub width_difference: i32,
    pub height: i32,
    pub height_difference: i32,
}

impl ResizeInfo {
    /// Payload for a change from `last` to `current`
    pub fn between(last: BoxSize, current: BoxSize) -> Self {
        Self {
            width: current.width,
            width_difference: current.width - last.width,
            height: current.height,
            height_difference: current.height - last.height,
        }
    }

    /// The new box size
    pub fn size(&self) -> BoxSize {
        BoxSize::new(self.width, self.height)
    }
}

/// The scroll event that led to a detected change
#[derive(Clone, Debug, PartialEq)]
pub struct ScrollEvent<N> {
    /// Node the scroll happened on (one of the sensor panes)
    pub target: N,
}

impl<N> ScrollEvent<N> {
    pub fn new(target: N) -> Self {
        Self { target }
    }
}

/// Listener signature: `(element, event, info)`
///
/// `element` is the observed element the change belongs to.
pub type ResizeCallback<N> = dyn Fn(&N, &ScrollEvent<N>, &ResizeInfo);

/// Shared handle to a resize callback
///
/// Uses Rc since dispatch is single-threaded. Two listeners are equal when
/// they share the same allocation, so clone a listener to register it again
/// or to remove it later.
pub struct ResizeListener<N>(Rc<ResizeCallback<N>>);

impl<N> ResizeListener<N> {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&N, &ScrollEvent<N>, &ResizeInfo) + 'static,
    {
        Self(Rc::new(callback))
    }

    /// Call the listener
    pub fn invoke(&self, element: &N, event: &ScrollEvent<N>, info: &ResizeInfo) {
        (self.0)(element, event, info);
    }
}

impl<N> Clone for ResizeListener<N> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<N> PartialEq for ResizeListener<N> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl<N> Eq for ResizeListener<N> {}

impl<N> fmt::Debug for ResizeListener<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ResizeListener")
            .field(&Rc::as_ptr(&self.0).cast::<()>())
            .finish()
    }
}

/// Listeners of one element, in registration order
pub type ListenerList<N> = SmallVec<[ResizeListener<N>; 2]>;

/// Identity → listeners table shared by every sensor of a context
pub struct EventRegistry<N> {
    queues: FxHashMap<ElementId, ListenerList<N>>,
}

impl<N> Default for EventRegistry<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N> fmt::Debug for EventRegistry<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (id, listeners) in &self.queues {
            map.entry(id, &listeners.len());
        }
        map.finish()
    }
}

impl<N> EventRegistry<N> {
    pub fn new() -> Self {
        Self {
            queues: FxHashMap::default(),
        }
    }

    /// Append a listener to the identity's list
    pub fn add(&mut self, id: ElementId, listener: ResizeListener<N>) {
        self.queues.entry(id).or_default().push(listener);
    }

    /// Invoke every listener of `id` in registration order
    ///
    /// Unknown identities are ignored: the element may be mid-detach.
    pub fn call(&self, id: ElementId, element: &N, event: &ScrollEvent<N>, info: &ResizeInfo) {
        for listener in self.snapshot(id) {
            listener.invoke(element, event, info);
        }
    }

    /// Copy of the identity's listener list
    ///
    /// Dispatch iterates a snapshot so listeners can add or remove
    /// registrations while being invoked.
    pub fn snapshot(&self, id: ElementId) -> ListenerList<N> {
        self.queues.get(&id).cloned().unwrap_or_default()
    }

    /// Remove the first registration of `listener` for `id`
    ///
    /// Returns whether a registration was removed.
    pub fn remove(&mut self, id: ElementId, listener: &ResizeListener<N>) -> bool {
        let Some(listeners) = self.queues.get_mut(&id) else {
            return false;
        };
        match listeners.iter().position(|registered| registered == listener) {
            Some(index) => {
                listeners.remove(index);
                true
            }
            None => false,
        }
    }

    /// Number of registrations for `id`, or `None` if the identity is unknown
    pub fn length(&self, id: ElementId) -> Option<usize> {
        self.queues.get(&id).map(|listeners| listeners.len())
    }

    /// Whether `listener` is registered for any identity
    pub fn contains_listener(&self, listener: &ResizeListener<N>) -> bool {
        self.queues
            .values()
            .any(|listeners| listeners.contains(listener))
    }

    /// Drop the identity and all its registrations
    pub fn purge(&mut self, id: ElementId) -> Option<ListenerList<N>> {
        self.queues.remove(&id)
    }

    /// Number of identities with an entry
    pub fn len(&self) -> usize {
        self.queues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }

    pub fn clear(&mut self) {
        self.queues.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn recorder(log: &Rc<RefCell<Vec<&'static str>>>, tag: &'static str) -> ResizeListener<u32> {
        let log = Rc::clone(log);
        ResizeListener::new(move |_, _, _| log.borrow_mut().push(tag))
    }

    fn fire(registry: &EventRegistry<u32>, id: ElementId) {
        registry.call(id, &0, &ScrollEvent::new(0), &ResizeInfo::default());
    }

    #[test]
    fn test_call_in_registration_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut registry = EventRegistry::new();
        let id = ElementId::from_raw(1);

        registry.add(id, recorder(&log, "a"));
        registry.add(id, recorder(&log, "b"));
        fire(&registry, id);

        assert_eq!(*log.borrow(), vec!["a", "b"]);
    }

    #[test]
    fn test_duplicates_fire_per_registration() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut registry = EventRegistry::new();
        let id = ElementId::from_raw(1);
        let listener = recorder(&log, "a");

        registry.add(id, listener.clone());
        registry.add(id, listener.clone());
        assert_eq!(registry.length(id), Some(2));

        fire(&registry, id);
        assert_eq!(log.borrow().len(), 2);

        // One removal per registration
        assert!(registry.remove(id, &listener));
        assert_eq!(registry.length(id), Some(1));
        fire(&registry, id);
        assert_eq!(log.borrow().len(), 3);
    }

    #[test]
    fn test_remove_keeps_other_listeners() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut registry = EventRegistry::new();
        let id = ElementId::from_raw(4);
        let a = recorder(&log, "a");
        let b = recorder(&log, "b");

        registry.add(id, a.clone());
        registry.add(id, b.clone());
        registry.add(id, a.clone());
        registry.remove(id, &a);
        fire(&registry, id);

        assert_eq!(*log.borrow(), vec!["b", "a"]);
    }

    #[test]
    fn test_unknown_identity_is_noop() {
        let mut registry: EventRegistry<u32> = EventRegistry::new();
        let id = ElementId::from_raw(9);
        let listener = ResizeListener::new(|_, _, _| panic!("must not run"));

        fire(&registry, id);
        assert!(!registry.remove(id, &listener));
        assert_eq!(registry.length(id), None);
    }

    #[test]
    fn test_length_after_emptying_and_purge() {
        let mut registry: EventRegistry<u32> = EventRegistry::new();
        let id = ElementId::from_raw(2);
        let listener = ResizeListener::new(|_, _, _| {});

        registry.add(id, listener.clone());
        registry.remove(id, &listener);
        assert_eq!(registry.length(id), Some(0));

        registry.purge(id);
        assert_eq!(registry.length(id), None);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_contains_listener_across_identities() {
        let mut registry: EventRegistry<u32> = EventRegistry::new();
        let listener = ResizeListener::new(|_, _, _| {});
        let (one, two) = (ElementId::from_raw(1), ElementId::from_raw(2));

        registry.add(one, listener.clone());
        registry.add(two, listener.clone());
        registry.remove(one, &listener);
        assert!(registry.contains_listener(&listener));

        registry.remove(two, &listener);
        assert!(!registry.contains_listener(&listener));
        assert!(!registry.contains_listener(&ResizeListener::new(|_, _, _| {})));
    }

    #[test]
    fn test_identities_are_independent() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut registry = EventRegistry::new();
        registry.add(ElementId::from_raw(1), recorder(&log, "one"));
        registry.add(ElementId::from_raw(2), recorder(&log, "two"));

        fire(&registry, ElementId::from_raw(2));
        assert_eq!(*log.borrow(), vec!["two"]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_element_id_text_form() {
        let id = ElementId::from_raw(12);
        assert_eq!(id.to_string(), "rs-12");
        assert_eq!("rs-12".parse::<ElementId>(), Ok(id));
        assert!("rs-x".parse::<ElementId>().is_err());
    }

    #[test]
    fn test_resize_info_between() {
        let info = ResizeInfo::between(BoxSize::new(100, 50), BoxSize::new(120, 50));
        assert_eq!(
            info,
            ResizeInfo {
                width: 120,
                width_difference: 20,
                height: 50,
                height_difference: 0,
            }
        );

        let shrink = ResizeInfo::between(BoxSize::new(100, 50), BoxSize::new(80, 30));
        assert_eq!(shrink.width_difference, -20);
        assert_eq!(shrink.height_difference, -20);
        assert_eq!(shrink.size(), BoxSize::new(80, 30));
    }
}
