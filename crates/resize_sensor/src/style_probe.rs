//! Effective style lookup
//!
//! Prefers the host's computed style and falls back to the inline style when
//! the host has no style engine or reports nothing for the property.

use crate::dom::Dom;

/// Effective value of a style property, or `None` if the host reports none
pub fn computed_style<D: Dom + ?Sized>(dom: &D, node: &D::Node, property: &str) -> Option<String> {
    dom.computed_style(node, property)
        .filter(|value| !value.trim().is_empty())
        .or_else(|| {
            dom.inline_style(node, property)
                .filter(|value| !value.trim().is_empty())
        })
}

/// Whether the node lays out with the initial `position: static`
///
/// An unreported position counts as static since that is the CSS initial
/// value.
pub fn is_statically_positioned<D: Dom + ?Sized>(dom: &D, node: &D::Node) -> bool {
    computed_style(dom, node, "position")
        .map_or(true, |position| position.trim().eq_ignore_ascii_case("static"))
}
