//! Resize sensor handle
//!
//! # Example
//!
//! ```
//! use resize_sensor::headless::HeadlessDom;
//! use resize_sensor::{Dom, ResizeSensor, SensorContext, Targets};
//!
//! let mut dom = HeadlessDom::new();
//! let panel = dom.create_element("div").unwrap();
//! dom.set_size(&panel, 100, 50);
//!
//! let ctx = SensorContext::new(dom);
//! let sensor = ResizeSensor::new(&ctx, Targets::One(panel), |_, _, info| {
//!     println!("panel is now {}x{}", info.width, info.height);
//! })
//! .unwrap();
//!
//! ctx.with_dom(|dom| dom.set_size(&panel, 120, 50));
//! ctx.dispatch_pending().unwrap();
//!
//! sensor.detach(None, None).unwrap();
//! ```

use std::fmt;

use crate::context::SensorContext;
use crate::dom::Dom;
use crate::error::Result;
use crate::registry::{ResizeInfo, ResizeListener, ScrollEvent};
use crate::targets::Targets;

/// A listener observing the size of one or more elements
///
/// Dropping the handle does not stop observation; call
/// [`detach`](Self::detach).
pub struct ResizeSensor<D: Dom> {
    context: SensorContext<D>,
    targets: Targets<D::Node>,
    listener: ResizeListener<D::Node>,
}

impl<D: Dom> ResizeSensor<D> {
    /// Start observing `targets`, calling `callback` on every size change
    pub fn new<F>(
        context: &SensorContext<D>,
        targets: impl Into<Targets<D::Node>>,
        callback: F,
    ) -> Result<Self>
    where
        F: Fn(&D::Node, &ScrollEvent<D::Node>, &ResizeInfo) + 'static,
    {
        Self::with_listener(context, targets, ResizeListener::new(callback))
    }

    /// Start observing with an existing listener
    ///
    /// Registering the same listener on the same element again adds a second
    /// registration; it then fires twice per change.
    pub fn with_listener(
        context: &SensorContext<D>,
        targets: impl Into<Targets<D::Node>>,
        listener: ResizeListener<D::Node>,
    ) -> Result<Self> {
        let targets = targets.into();
        context.attach(targets.clone(), &listener)?;
        Ok(Self {
            context: context.clone(),
            targets,
            listener,
        })
    }

    pub fn listener(&self) -> &ResizeListener<D::Node> {
        &self.listener
    }

    pub fn targets(&self) -> &Targets<D::Node> {
        &self.targets
    }

    pub fn context(&self) -> &SensorContext<D> {
        &self.context
    }

    /// Unregister from the given targets, or from this sensor's targets
    ///
    /// Without a listener every registration and the overlays are removed;
    /// see [`SensorContext::detach`].
    pub fn detach(
        &self,
        listener: Option<&ResizeListener<D::Node>>,
        targets: Option<Targets<D::Node>>,
    ) -> Result<()> {
        let targets = targets.unwrap_or_else(|| self.targets.clone());
        self.context.detach(targets, listener)
    }

    /// Remove this sensor's own registration from its targets
    pub fn detach_self(&self) -> Result<()> {
        self.detach(Some(&self.listener), None)
    }

    /// Re-attach and re-arm the overlays of this sensor's targets
    pub fn reset(&self) -> Result<()> {
        self.context.reset(self.targets.clone())
    }
}

impl<D: Dom> fmt::Debug for ResizeSensor<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResizeSensor")
            .field("targets", &self.targets)
            .field("listener", &self.listener)
            .finish()
    }
}
