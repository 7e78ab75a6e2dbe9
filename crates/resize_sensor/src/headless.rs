//! In-memory host document
//!
//! [`HeadlessDom`] implements [`Dom`] without a browser. It keeps a node
//! arena with attributes and inline styles, resolves box sizes from a small
//! subset of CSS and clamps scroll offsets like a browser does:
//!
//! - `width`/`height` in `px` or `%` of the parent box
//! - absolutely positioned nodes with both insets set stretch between them
//! - other nodes fill the parent's width; in-flow content height is not modelled
//! - nodes with `overflow: scroll | auto | hidden` can scroll over their
//!   largest child
//!
//! Every change of a scroll offset, whether set directly or forced by a
//! layout change, queues a scroll event. Events are delivered later through
//! [`SensorContext::dispatch_pending`], the way a browser delivers scroll
//! events after the script that caused them returns.

use std::collections::VecDeque;

use rustc_hash::FxHashMap;
use slotmap::{new_key_type, SlotMap};

use crate::context::SensorContext;
use crate::detector::ScrollOutcome;
use crate::dom::{BoxSize, Dom};
use crate::error::{Result, SensorError};
use crate::registry::ScrollEvent;

new_key_type! {
    /// Node handle of a [`HeadlessDom`]
    pub struct HeadlessNode;
}

/// Upper bound on events delivered by one `dispatch_pending` call
const MAX_DISPATCH: usize = 10_000;

#[derive(Debug, Default)]
struct NodeData {
    tag: String,
    parent: Option<HeadlessNode>,
    children: Vec<HeadlessNode>,
    attributes: FxHashMap<String, String>,
    styles: FxHashMap<String, String>,
    /// Size forced by the embedder, overrides styles
    fixed: Option<BoxSize>,
    size: BoxSize,
    scroll: (i32, i32),
}

impl NodeData {
    fn style(&self, property: &str) -> Option<&str> {
        self.styles.get(property).map(|value| value.trim())
    }

    fn is_absolute(&self) -> bool {
        matches!(self.style("position"), Some("absolute" | "fixed"))
    }

    fn is_scroll_container(&self) -> bool {
        matches!(self.style("overflow"), Some("scroll" | "auto" | "hidden"))
    }
}

#[derive(Clone, Copy)]
enum Axis {
    Horizontal,
    Vertical,
}

/// Parse a `px`/unitless or `%` length
fn parse_length(value: &str, reference: i32) -> Option<i32> {
    let value = value.trim();
    if let Some(percent) = value.strip_suffix('%') {
        let percent: f64 = percent.trim().parse().ok()?;
        return Some((f64::from(reference) * percent / 100.0).round() as i32);
    }
    let px = value.strip_suffix("px").unwrap_or(value);
    px.trim().parse::<f64>().ok().map(|px| px.round() as i32)
}

fn resolve_axis(node: &NodeData, axis: Axis, parent: i32) -> i32 {
    let (length, start, end) = match axis {
        Axis::Horizontal => ("width", "left", "right"),
        Axis::Vertical => ("height", "top", "bottom"),
    };

    if let Some(length) = node.style(length).and_then(|v| parse_length(v, parent)) {
        return length.max(0);
    }

    if node.is_absolute() {
        let inset = |property: &str| node.style(property).and_then(|v| parse_length(v, parent));
        return match (inset(start), inset(end)) {
            (Some(start), Some(end)) => parent.saturating_sub(start).saturating_sub(end).max(0),
            _ => 0,
        };
    }

    match axis {
        Axis::Horizontal => parent,
        Axis::Vertical => 0,
    }
}

fn unknown_node(node: HeadlessNode) -> SensorError {
    SensorError::Dom(format!("unknown node {node:?}"))
}

/// In-memory [`Dom`] with browser-like scroll clamping
#[derive(Debug, Default)]
pub struct HeadlessDom {
    nodes: SlotMap<HeadlessNode, NodeData>,
    scroll_events: VecDeque<HeadlessNode>,
}

impl HeadlessDom {
    pub fn new() -> Self {
        Self::default()
    }

    /// Force a node's box size, as the page's own layout would
    pub fn set_size(&mut self, node: &HeadlessNode, width: i32, height: i32) {
        if let Some(data) = self.nodes.get_mut(*node) {
            data.fixed = Some(BoxSize::new(width, height));
            self.relayout(*node);
        }
    }

    /// Let styles decide the node's size again
    pub fn clear_size(&mut self, node: &HeadlessNode) {
        if let Some(data) = self.nodes.get_mut(*node) {
            data.fixed = None;
            self.relayout(*node);
        }
    }

    pub fn contains(&self, node: &HeadlessNode) -> bool {
        self.nodes.contains_key(*node)
    }

    pub fn tag(&self, node: &HeadlessNode) -> Option<String> {
        self.nodes.get(*node).map(|data| data.tag.clone())
    }

    pub fn children(&self, node: &HeadlessNode) -> Vec<HeadlessNode> {
        self.nodes
            .get(*node)
            .map(|data| data.children.clone())
            .unwrap_or_default()
    }

    /// Current `(left, top)` scroll offset
    pub fn scroll_position(&self, node: &HeadlessNode) -> (i32, i32) {
        self.nodes
            .get(*node)
            .map(|data| data.scroll)
            .unwrap_or_default()
    }

    /// Maximum `(left, top)` scroll offset
    pub fn scroll_range(&self, node: &HeadlessNode) -> (i32, i32) {
        let Some(data) = self.nodes.get(*node) else {
            return (0, 0);
        };
        if !data.is_scroll_container() {
            return (0, 0);
        }

        let (content_width, content_height) = data
            .children
            .iter()
            .filter_map(|child| self.nodes.get(*child))
            .fold((0, 0), |(w, h), child| {
                (w.max(child.size.width), h.max(child.size.height))
            });

        (
            (content_width - data.size.width).max(0),
            (content_height - data.size.height).max(0),
        )
    }

    /// Next queued scroll event target
    pub fn pop_scroll_event(&mut self) -> Option<HeadlessNode> {
        self.scroll_events.pop_front()
    }

    /// Drain the queued scroll events without delivering them
    pub fn take_scroll_events(&mut self) -> Vec<HeadlessNode> {
        self.scroll_events.drain(..).collect()
    }

    pub fn pending_scroll_events(&self) -> usize {
        self.scroll_events.len()
    }

    /// Number of nodes ever created
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn node_mut(&mut self, node: &HeadlessNode) -> Result<&mut NodeData> {
        self.nodes.get_mut(*node).ok_or_else(|| unknown_node(*node))
    }

    fn is_ancestor(&self, ancestor: HeadlessNode, node: HeadlessNode) -> bool {
        let mut current = Some(node);
        while let Some(n) = current {
            if n == ancestor {
                return true;
            }
            current = self.nodes.get(n).and_then(|data| data.parent);
        }
        false
    }

    /// Recompute sizes of the tree containing `node`
    fn relayout(&mut self, node: HeadlessNode) {
        let mut root = node;
        while let Some(parent) = self.nodes.get(root).and_then(|data| data.parent) {
            root = parent;
        }
        self.layout_subtree(root, BoxSize::ZERO);
    }

    fn layout_subtree(&mut self, node: HeadlessNode, parent: BoxSize) {
        let Some(data) = self.nodes.get(node) else {
            return;
        };
        let size = data.fixed.unwrap_or_else(|| {
            BoxSize::new(
                resolve_axis(data, Axis::Horizontal, parent.width),
                resolve_axis(data, Axis::Vertical, parent.height),
            )
        });
        let children = data.children.clone();
        self.nodes[node].size = size;

        for child in children {
            self.layout_subtree(child, size);
        }

        // Shrinking content clamps the offset
        let (left, top) = self.nodes[node].scroll;
        self.scroll_to(node, left, top);
    }

    fn scroll_to(&mut self, node: HeadlessNode, left: i32, top: i32) {
        let (max_left, max_top) = self.scroll_range(&node);
        let next = (left.clamp(0, max_left), top.clamp(0, max_top));
        if let Some(data) = self.nodes.get_mut(node) {
            if data.scroll != next {
                data.scroll = next;
                self.scroll_events.push_back(node);
            }
        }
    }
}

impl Dom for HeadlessDom {
    type Node = HeadlessNode;

    fn create_element(&mut self, tag: &str) -> Result<HeadlessNode> {
        Ok(self.nodes.insert(NodeData {
            tag: tag.to_string(),
            ..Default::default()
        }))
    }

    fn append_child(&mut self, parent: &HeadlessNode, child: &HeadlessNode) -> Result<()> {
        if !self.nodes.contains_key(*parent) {
            return Err(unknown_node(*parent));
        }
        if !self.nodes.contains_key(*child) {
            return Err(unknown_node(*child));
        }
        if self.is_ancestor(*child, *parent) {
            return Err(SensorError::Dom(format!(
                "cannot append {child:?} inside its own subtree"
            )));
        }

        // Appending moves the node
        if let Some(previous) = self.nodes[*child].parent.take() {
            self.nodes[previous].children.retain(|c| c != child);
            self.relayout(previous);
        }

        self.nodes[*parent].children.push(*child);
        self.nodes[*child].parent = Some(*parent);
        self.relayout(*parent);
        Ok(())
    }

    fn remove_child(&mut self, parent: &HeadlessNode, child: &HeadlessNode) -> Result<()> {
        if self.nodes.get(*child).and_then(|data| data.parent) != Some(*parent) {
            return Err(SensorError::Dom(format!(
                "{child:?} is not a child of {parent:?}"
            )));
        }

        self.nodes[*parent].children.retain(|c| c != child);
        self.nodes[*child].parent = None;
        self.relayout(*parent);
        self.relayout(*child);
        Ok(())
    }

    fn parent_element(&self, node: &HeadlessNode) -> Option<HeadlessNode> {
        self.nodes.get(*node)?.parent
    }

    fn attribute(&self, node: &HeadlessNode, name: &str) -> Option<String> {
        self.nodes.get(*node)?.attributes.get(name).cloned()
    }

    fn set_attribute(&mut self, node: &HeadlessNode, name: &str, value: &str) -> Result<()> {
        self.node_mut(node)?
            .attributes
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn remove_attribute(&mut self, node: &HeadlessNode, name: &str) -> Result<()> {
        self.node_mut(node)?.attributes.remove(name);
        Ok(())
    }

    fn set_style(&mut self, node: &HeadlessNode, property: &str, value: &str) -> Result<()> {
        let data = self.node_mut(node)?;
        if value.trim().is_empty() {
            data.styles.remove(property);
        } else {
            data.styles.insert(property.to_string(), value.to_string());
        }
        self.relayout(*node);
        Ok(())
    }

    fn inline_style(&self, node: &HeadlessNode, property: &str) -> Option<String> {
        self.nodes.get(*node)?.styles.get(property).cloned()
    }

    fn computed_style(&self, node: &HeadlessNode, property: &str) -> Option<String> {
        let data = self.nodes.get(*node)?;
        match property {
            "position" => Some(data.style("position").unwrap_or("static").to_string()),
            _ => data.style(property).map(str::to_string),
        }
    }

    fn offset_size(&self, node: &HeadlessNode) -> BoxSize {
        self.nodes
            .get(*node)
            .map(|data| data.size)
            .unwrap_or_default()
    }

    fn set_scroll_position(&mut self, node: &HeadlessNode, left: i32, top: i32) {
        self.scroll_to(*node, left, top);
    }
}

impl SensorContext<HeadlessDom> {
    /// Deliver queued scroll events until the document settles
    ///
    /// Scrolls caused by re-arming are queued as well and delivered within
    /// the same call. Returns the outcome of every delivered event.
    pub fn dispatch_pending(&self) -> Result<Vec<ScrollOutcome>> {
        let mut outcomes = Vec::new();
        while let Some(target) = self.with_dom(HeadlessDom::pop_scroll_event) {
            if outcomes.len() >= MAX_DISPATCH {
                tracing::warn!(
                    delivered = outcomes.len(),
                    "scroll events keep coming, stopping dispatch"
                );
                break;
            }
            outcomes.push(self.handle_scroll(&ScrollEvent::new(target))?);
        }
        Ok(outcomes)
    }
}
