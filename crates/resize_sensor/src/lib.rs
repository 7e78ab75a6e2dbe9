//! Element resize detection without a native resize signal
//!
//! Every observed element gets an invisible overlay of two scrollable panes
//! held at their maximum scroll offset. When the element's box changes, one
//! of the panes loses scroll range, the host clamps its offset and fires a
//! scroll event. A single scroll entry point per document turns those events
//! into size-change notifications:
//!
//! - **Dom**: the host document seam ([`Dom`], [`headless::HeadlessDom`])
//! - **Registry**: identity → ordered listeners ([`EventRegistry`])
//! - **Overlays**: mount and re-arm of the detector panes ([`overlay`])
//! - **Detector**: scroll-to-resize translation ([`SensorContext::handle_scroll`])
//! - **Sensors**: the public attach/detach/reset handle ([`ResizeSensor`])
//!
//! # Example
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! use resize_sensor::headless::HeadlessDom;
//! use resize_sensor::{Dom, ResizeSensor, SensorContext, Targets};
//!
//! let mut dom = HeadlessDom::new();
//! let card = dom.create_element("div").unwrap();
//! dom.set_size(&card, 100, 50);
//!
//! let ctx = SensorContext::new(dom);
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! let sink = Rc::clone(&seen);
//! let _sensor = ResizeSensor::new(&ctx, Targets::One(card), move |_, _, info| {
//!     sink.borrow_mut().push((info.width, info.width_difference));
//! })
//! .unwrap();
//!
//! // The page layout changes the card's box
//! ctx.with_dom(|dom| dom.set_size(&card, 120, 50));
//! ctx.dispatch_pending().unwrap();
//!
//! assert_eq!(*seen.borrow(), vec![(120, 20)]);
//! ```

pub mod context;
pub mod detector;
pub mod dom;
pub mod error;
pub mod headless;
pub mod options;
pub mod overlay;
pub mod registry;
pub mod sensor;
pub mod style_probe;
pub mod targets;

pub use context::{SensorContext, SensorState, WeakSensorContext};
pub use detector::ScrollOutcome;
pub use dom::{has_class, BoxSize, Dom};
pub use error::{Result, SensorError};
pub use options::SensorOptions;
pub use overlay::{SensorId, SensorOverlay};
pub use registry::{
    ElementId, EventRegistry, ListenerList, ResizeCallback, ResizeInfo, ResizeListener,
    ScrollEvent,
};
pub use sensor::ResizeSensor;
pub use targets::Targets;
