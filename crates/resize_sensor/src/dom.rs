//! Host document abstraction
//!
//! The sensor never talks to a concrete document. Everything it needs from
//! the host (node creation, tree edits, attributes, styles, box metrics and
//! scroll offsets) goes through the [`Dom`] trait, which is implemented by
//! the in-memory [`HeadlessDom`](crate::headless::HeadlessDom) and by the
//! browser host in `resize_sensor_web`.

use std::fmt;

use crate::error::Result;

/// Rendered box dimensions of a node in device-independent pixels
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoxSize {
    pub width: i32,
    pub height: i32,
}

impl BoxSize {
    pub const ZERO: Self = Self::new(0, 0);

    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for BoxSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A DOM-like host document
///
/// Node handles are cheap to clone and compare by node identity.
pub trait Dom {
    /// Handle to a node owned by the host
    type Node: Clone + PartialEq + fmt::Debug + 'static;

    /// Create a detached element with the given tag name
    fn create_element(&mut self, tag: &str) -> Result<Self::Node>;

    /// Append `child` as the last child of `parent`
    fn append_child(&mut self, parent: &Self::Node, child: &Self::Node) -> Result<()>;

    /// Remove `child` from `parent`
    fn remove_child(&mut self, parent: &Self::Node, child: &Self::Node) -> Result<()>;

    /// Parent element of `node`, if it is attached to one
    fn parent_element(&self, node: &Self::Node) -> Option<Self::Node>;

    fn attribute(&self, node: &Self::Node, name: &str) -> Option<String>;

    fn set_attribute(&mut self, node: &Self::Node, name: &str, value: &str) -> Result<()>;

    fn remove_attribute(&mut self, node: &Self::Node, name: &str) -> Result<()>;

    /// Set a single inline style property
    fn set_style(&mut self, node: &Self::Node, property: &str, value: &str) -> Result<()>;

    /// Inline style property as written on the node
    fn inline_style(&self, node: &Self::Node, property: &str) -> Option<String>;

    /// Style property as resolved by the host's style engine
    ///
    /// Hosts without a style engine keep the default and let
    /// [`style_probe`](crate::style_probe) fall back to inline styles.
    fn computed_style(&self, _node: &Self::Node, _property: &str) -> Option<String> {
        None
    }

    /// Current offset box of the node
    fn offset_size(&self, node: &Self::Node) -> BoxSize;

    /// Scroll the node to the given offsets
    ///
    /// Hosts clamp the offsets to the node's scrollable range.
    fn set_scroll_position(&mut self, node: &Self::Node, left: i32, top: i32);
}

/// Check whether a node's `class` attribute contains `class` as a token
pub fn has_class<D: Dom + ?Sized>(dom: &D, node: &D::Node, class: &str) -> bool {
    dom.attribute(node, "class")
        .is_some_and(|classes| classes.split_ascii_whitespace().any(|token| token == class))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessDom;

    #[test]
    fn test_has_class_matches_whole_tokens() {
        let mut dom = HeadlessDom::new();
        let node = dom.create_element("div").unwrap();
        dom.set_attribute(&node, "class", "resize-sensor-detector\tresize-sensor-expand")
            .unwrap();

        assert!(has_class(&dom, &node, "resize-sensor-expand"));
        assert!(has_class(&dom, &node, "resize-sensor-detector"));
        assert!(!has_class(&dom, &node, "resize-sensor"));
    }

    #[test]
    fn test_has_class_without_attribute() {
        let mut dom = HeadlessDom::new();
        let node = dom.create_element("div").unwrap();
        assert!(!has_class(&dom, &node, "resize-sensor"));
    }

    #[test]
    fn test_box_size_display() {
        assert_eq!(BoxSize::new(120, 50).to_string(), "120x50");
        assert_eq!(BoxSize::default(), BoxSize::ZERO);
    }
}
