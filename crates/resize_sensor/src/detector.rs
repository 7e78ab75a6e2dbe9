//! Scroll-driven change detection
//!
//! Hosts deliver every scroll event of the document to
//! [`SensorContext::handle_scroll`]. Events whose target is not inside a
//! sensor overlay are ignored; for the rest the owning element's box is
//! compared with the size cached on its overlay:
//!
//! ```text
//! scroll on pane
//!     ↓ walk ancestors to the .resize-sensor container
//! overlay (resetting? → ignore)
//!     ↓ element offset size != cached size
//! fan-out to listeners (element, event, info)
//!     ↓
//! cache new size, re-arm panes
//! ```

use crate::context::{SensorContext, SensorState};
use crate::dom::{has_class, Dom};
use crate::error::Result;
use crate::overlay::{self, SensorId};
use crate::registry::{ResizeInfo, ScrollEvent};

/// What a scroll event amounted to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScrollOutcome {
    /// The target is not part of a live sensor overlay
    NotSensor,
    /// The scroll was caused by the sensor re-arming itself
    Suppressed,
    /// The element kept its size; the overlay was re-armed
    Unchanged,
    /// The element changed size and listeners were notified
    Resized(ResizeInfo),
}

/// Find the live overlay whose container encloses `target`
fn resolve_sensor<D: Dom>(state: &SensorState<D>, target: &D::Node) -> Option<SensorId> {
    let options = &state.options;
    let mut current = Some(target.clone());

    while let Some(node) = current {
        if has_class(&state.dom, &node, &options.sensor_class) {
            let raw = state.dom.attribute(&node, &options.sensor_attribute)?;
            let Ok(raw) = raw.parse::<u64>() else {
                tracing::warn!(value = %raw, "sensor container with malformed key");
                return None;
            };
            let sensor = SensorId::from_raw(raw);
            return state
                .overlays
                .get(sensor)
                .filter(|overlay| overlay.container == node)
                .map(|_| sensor);
        }
        current = state.dom.parent_element(&node);
    }

    None
}

impl<D: Dom> SensorContext<D> {
    /// Process one scroll event of the document
    ///
    /// Detection, notification and re-arm run to completion before this
    /// returns. A scroll delivered while the context is busy mounting or
    /// re-arming (synchronous hosts) is treated like any other
    /// self-induced scroll and ignored.
    pub fn handle_scroll(&self, event: &ScrollEvent<D::Node>) -> Result<ScrollOutcome> {
        let (sensor, element, info, listeners) = {
            let Ok(state) = self.state.try_borrow() else {
                tracing::trace!("scroll during sensor update, ignoring");
                return Ok(ScrollOutcome::Suppressed);
            };
            let Some(sensor) = resolve_sensor(&state, &event.target) else {
                return Ok(ScrollOutcome::NotSensor);
            };
            let overlay = &state.overlays[sensor];
            if overlay.resetting {
                tracing::trace!(identity = %overlay.identity, "scroll while re-arming, ignoring");
                return Ok(ScrollOutcome::Suppressed);
            }

            let current = state.dom.offset_size(&overlay.element);
            let last = overlay.last_size();
            let info = (current != last).then(|| ResizeInfo::between(last, current));
            let listeners = match info {
                Some(_) => state.registry.snapshot(overlay.identity),
                None => Default::default(),
            };
            (sensor, overlay.element.clone(), info, listeners)
        };

        if let Some(info) = &info {
            tracing::debug!(
                width = info.width,
                height = info.height,
                dw = info.width_difference,
                dh = info.height_difference,
                listeners = listeners.len(),
                "element resized"
            );
            for listener in &listeners {
                listener.invoke(&element, event, info);
            }
        }

        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        // Listeners may have detached the element
        let Some(overlay) = state.overlays.get_mut(sensor) else {
            tracing::debug!("sensor detached during notification");
            return Ok(info.map_or(ScrollOutcome::Unchanged, ScrollOutcome::Resized));
        };
        if let Some(info) = &info {
            overlay.record_size(info.size());
        }
        overlay::rearm(&mut state.dom, overlay, state.options.expand_extent)?;

        Ok(info.map_or(ScrollOutcome::Unchanged, ScrollOutcome::Resized))
    }
}
