//! Sensor overlays
//!
//! Each observed element gets one invisible overlay made of two scrollable
//! panes stretched over the element's box:
//!
//! ```text
//! element (position: relative)
//! └─ container  .resize-sensor          absolute, full size, hidden
//!    ├─ expand pane                     content 100000×100000, scrolled to the end
//!    └─ shrink pane                     content 200%×200%, scrolled to the end
//! ```
//!
//! Both panes sit at their maximum scroll offset. Growing the element shrinks
//! the expand pane's scroll range and shrinking it shrinks the shrink pane's
//! range, so either change clamps a scroll offset and the host fires a scroll
//! event. [`rearm`] puts both panes back at the end afterwards.
//!
//! Overlay state lives in a slotmap arena keyed by [`SensorId`]; the host
//! nodes only carry the key as an attribute.

use slotmap::{new_key_type, Key, SlotMap};

use crate::dom::{BoxSize, Dom};
use crate::error::Result;
use crate::options::SensorOptions;
use crate::registry::{ElementId, ResizeListener};
use crate::style_probe;

new_key_type! {
    /// Handle to an overlay in a context's arena
    pub struct SensorId;
}

impl SensorId {
    /// Convert to a raw u64 representation
    pub fn to_raw(self) -> u64 {
        self.data().as_ffi()
    }

    /// Create from a raw u64 representation
    ///
    /// Keys that were removed or never issued simply fail to resolve.
    pub fn from_raw(raw: u64) -> Self {
        Self::from(slotmap::KeyData::from_ffi(raw))
    }
}

const CONTAINER_STYLE: &[(&str, &str)] = &[
    ("display", "block"),
    ("position", "absolute"),
    ("left", "0"),
    ("top", "0"),
    ("right", "0"),
    ("bottom", "0"),
    ("overflow", "scroll"),
    ("z-index", "-1"),
    ("visibility", "hidden"),
];

const CHILD_STYLE: &[(&str, &str)] = &[
    ("position", "absolute"),
    ("left", "0"),
    ("top", "0"),
    ("transition", "0s"),
];

/// Per-element sensor state
#[derive(Debug)]
pub struct SensorOverlay<N> {
    pub(crate) element: N,
    pub(crate) identity: ElementId,
    pub(crate) container: N,
    pub(crate) expand_pane: N,
    pub(crate) expand_child: N,
    pub(crate) shrink_pane: N,
    /// Set while [`rearm`] moves the panes
    pub(crate) resetting: bool,
    pub(crate) last_width: i32,
    pub(crate) last_height: i32,
    /// Listener of the sensor that mounted this overlay
    pub(crate) owner: Option<ResizeListener<N>>,
}

impl<N> SensorOverlay<N> {
    /// The observed element
    pub fn element(&self) -> &N {
        &self.element
    }

    pub fn identity(&self) -> ElementId {
        self.identity
    }

    /// Root node of the overlay substructure
    pub fn container(&self) -> &N {
        &self.container
    }

    /// Pane whose scroll range shrinks when the element grows
    pub fn expand_pane(&self) -> &N {
        &self.expand_pane
    }

    /// Pane whose scroll range shrinks when the element shrinks
    pub fn shrink_pane(&self) -> &N {
        &self.shrink_pane
    }

    pub fn is_resetting(&self) -> bool {
        self.resetting
    }

    /// Last confirmed size of the element
    pub fn last_size(&self) -> BoxSize {
        BoxSize::new(self.last_width, self.last_height)
    }

    pub(crate) fn record_size(&mut self, size: BoxSize) {
        self.last_width = size.width;
        self.last_height = size.height;
    }
}

fn apply_styles<D: Dom>(dom: &mut D, node: &D::Node, styles: &[(&str, &str)]) -> Result<()> {
    for (property, value) in styles {
        dom.set_style(node, property, value)?;
    }
    Ok(())
}

/// Build a detector pane and its content node
fn build_pane<D: Dom>(
    dom: &mut D,
    class: &str,
    child_size: Option<&str>,
) -> Result<(D::Node, D::Node)> {
    let pane = dom.create_element("div")?;
    dom.set_attribute(&pane, "class", class)?;
    apply_styles(dom, &pane, CONTAINER_STYLE)?;

    let child = dom.create_element("div")?;
    apply_styles(dom, &child, CHILD_STYLE)?;
    if let Some(size) = child_size {
        dom.set_style(&child, "width", size)?;
        dom.set_style(&child, "height", size)?;
    }

    dom.append_child(&pane, &child)?;
    Ok((pane, child))
}

/// Build an overlay for `element`, attach it and arm it
///
/// The caller guarantees the element has no overlay yet.
pub(crate) fn mount<D: Dom>(
    dom: &mut D,
    overlays: &mut SlotMap<SensorId, SensorOverlay<D::Node>>,
    element: &D::Node,
    identity: ElementId,
    options: &SensorOptions,
) -> Result<SensorId> {
    // Absolute panes need a positioned containing block
    if style_probe::is_statically_positioned(dom, element) {
        dom.set_style(element, "position", "relative")?;
    }

    let container = dom.create_element(&options.tag_name)?;
    dom.set_attribute(&container, "class", &options.sensor_class)?;
    apply_styles(dom, &container, CONTAINER_STYLE)?;

    let (expand_pane, expand_child) = build_pane(dom, &options.expand_pane_class(), None)?;
    let shrink_ratio = format!("{}%", options.shrink_ratio);
    let (shrink_pane, _) =
        build_pane(dom, &options.shrink_pane_class(), Some(&shrink_ratio))?;
    dom.append_child(&container, &expand_pane)?;
    dom.append_child(&container, &shrink_pane)?;

    let baseline = dom.offset_size(element);
    let id = overlays.insert(SensorOverlay {
        element: element.clone(),
        identity,
        container: container.clone(),
        expand_pane,
        expand_child,
        shrink_pane,
        resetting: false,
        last_width: baseline.width,
        last_height: baseline.height,
        owner: None,
    });

    let attached = dom
        .set_attribute(&container, &options.sensor_attribute, &id.to_raw().to_string())
        .and_then(|()| dom.append_child(element, &container));
    if let Err(err) = attached {
        overlays.remove(id);
        return Err(err);
    }

    tracing::debug!(%identity, size = %baseline, "mounted resize sensor");

    if let Err(err) = rearm(dom, &mut overlays[id], options.expand_extent) {
        if let Some(overlay) = overlays.remove(id) {
            let _ = unmount(dom, &overlay);
        }
        return Err(err);
    }
    Ok(id)
}

/// Put both panes back at their maximum scroll offset
///
/// Safe to call any number of times. The `resetting` flag is raised for the
/// duration so scrolls caused by the re-arm itself are not taken for a resize.
pub(crate) fn rearm<D: Dom>(
    dom: &mut D,
    overlay: &mut SensorOverlay<D::Node>,
    extent: i32,
) -> Result<()> {
    overlay.resetting = true;

    let px = format!("{extent}px");
    let sized = dom
        .set_style(&overlay.expand_child, "width", &px)
        .and_then(|()| dom.set_style(&overlay.expand_child, "height", &px));

    dom.set_scroll_position(&overlay.expand_pane, extent, extent);
    dom.set_scroll_position(&overlay.shrink_pane, extent, extent);

    overlay.resetting = false;
    tracing::trace!(identity = %overlay.identity, "re-armed resize sensor");
    sized
}

/// Detach the overlay container from its element if it is still attached
pub(crate) fn unmount<D: Dom>(dom: &mut D, overlay: &SensorOverlay<D::Node>) -> Result<()> {
    if dom.parent_element(&overlay.container).as_ref() == Some(&overlay.element) {
        dom.remove_child(&overlay.element, &overlay.container)?;
    }
    tracing::debug!(identity = %overlay.identity, "unmounted resize sensor");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::has_class;
    use crate::headless::HeadlessDom;

    fn setup(width: i32, height: i32) -> (HeadlessDom, <HeadlessDom as Dom>::Node) {
        let mut dom = HeadlessDom::new();
        let element = dom.create_element("div").unwrap();
        dom.set_size(&element, width, height);
        (dom, element)
    }

    #[test]
    fn test_mount_builds_overlay() {
        let (mut dom, element) = setup(100, 50);
        let mut overlays = SlotMap::with_key();
        let options = SensorOptions::default();

        let id = mount(&mut dom, &mut overlays, &element, ElementId::from_raw(1), &options)
            .unwrap();
        let overlay = &overlays[id];

        assert_eq!(dom.children(&element), vec![overlay.container]);
        assert_eq!(dom.tag(&overlay.container).as_deref(), Some("resize-sensor"));
        assert!(has_class(&dom, &overlay.container, "resize-sensor"));
        assert!(has_class(&dom, &overlay.expand_pane, "resize-sensor-expand"));
        assert!(has_class(&dom, &overlay.shrink_pane, "resize-sensor-shrink"));
        assert_eq!(
            dom.attribute(&overlay.container, "data-resize-sensor"),
            Some(id.to_raw().to_string())
        );
        assert_eq!(overlay.last_size(), BoxSize::new(100, 50));
        assert!(!overlay.is_resetting());
    }

    #[test]
    fn test_mount_positions_static_element() {
        let (mut dom, element) = setup(100, 50);
        let mut overlays = SlotMap::with_key();
        mount(&mut dom, &mut overlays, &element, ElementId::from_raw(1), &SensorOptions::default())
            .unwrap();

        assert_eq!(dom.inline_style(&element, "position").as_deref(), Some("relative"));
    }

    #[test]
    fn test_mount_keeps_existing_position() {
        let (mut dom, element) = setup(100, 50);
        dom.set_style(&element, "position", "absolute").unwrap();
        let mut overlays = SlotMap::with_key();
        mount(&mut dom, &mut overlays, &element, ElementId::from_raw(1), &SensorOptions::default())
            .unwrap();

        assert_eq!(dom.inline_style(&element, "position").as_deref(), Some("absolute"));
    }

    #[test]
    fn test_mount_arms_both_panes() {
        let (mut dom, element) = setup(100, 50);
        let mut overlays = SlotMap::with_key();
        let id = mount(&mut dom, &mut overlays, &element, ElementId::from_raw(1), &SensorOptions::default())
            .unwrap();
        let overlay = &overlays[id];

        assert_eq!(dom.offset_size(&overlay.expand_child), BoxSize::new(100_000, 100_000));
        let shrink_child = dom.children(&overlay.shrink_pane)[0];
        assert_eq!(dom.offset_size(&shrink_child), BoxSize::new(200, 100));
        assert_eq!(dom.scroll_position(&overlay.expand_pane), (99_900, 99_950));
        assert_eq!(dom.scroll_position(&overlay.shrink_pane), (100, 50));
    }

    #[test]
    fn test_rearm_is_idempotent() {
        let (mut dom, element) = setup(100, 50);
        let mut overlays = SlotMap::with_key();
        let id = mount(&mut dom, &mut overlays, &element, ElementId::from_raw(1), &SensorOptions::default())
            .unwrap();
        dom.take_scroll_events();

        rearm(&mut dom, &mut overlays[id], 100_000).unwrap();
        rearm(&mut dom, &mut overlays[id], 100_000).unwrap();

        assert!(dom.take_scroll_events().is_empty());
        assert_eq!(dom.scroll_position(&overlays[id].expand_pane), (99_900, 99_950));
        assert!(!overlays[id].is_resetting());
    }

    #[test]
    fn test_unmount_detaches_container() {
        let (mut dom, element) = setup(100, 50);
        let mut overlays = SlotMap::with_key();
        let id = mount(&mut dom, &mut overlays, &element, ElementId::from_raw(1), &SensorOptions::default())
            .unwrap();

        unmount(&mut dom, &overlays[id]).unwrap();
        assert!(dom.children(&element).is_empty());

        // Already detached
        unmount(&mut dom, &overlays[id]).unwrap();
    }

    #[test]
    fn test_sensor_id_raw_round_trip() {
        let mut overlays: SlotMap<SensorId, ()> = SlotMap::with_key();
        let id = overlays.insert(());
        assert_eq!(SensorId::from_raw(id.to_raw()), id);
    }
}
