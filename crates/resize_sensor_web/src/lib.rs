//! Browser host for `resize_sensor`
//!
//! - [`WebDom`] implements the sensor's `Dom` trait on `web-sys`
//! - [`WebSensors`] owns a sensor context for one document and installs the
//!   single capturing `scroll` listener that feeds it
//! - [`ResizeSensors`] is the `wasm-bindgen` surface for JavaScript callers
//!
//! Everything here is only compiled for `wasm32` targets.

#![forbid(unsafe_code)]

#[cfg(target_arch = "wasm32")]
mod bindings;
#[cfg(target_arch = "wasm32")]
mod web_dom;

#[cfg(target_arch = "wasm32")]
pub use bindings::ResizeSensors;
#[cfg(target_arch = "wasm32")]
pub use web_dom::{WebDom, WebSensors};
