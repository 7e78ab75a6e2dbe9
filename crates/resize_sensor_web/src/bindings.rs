//! `wasm-bindgen` exports
//!
//! JavaScript callbacks are invoked as `callback.call(element, event, info)`
//! where `info` is `{ width, widthDifference, height, heightDifference }`.

use std::cell::RefCell;
use std::rc::Rc;

use js_sys::{Array, Function, Object, Reflect};
use resize_sensor::{ResizeInfo, ResizeListener, ScrollEvent, SensorError, Targets};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::HtmlElement;

use crate::web_dom::{WebDom, WebSensors};

fn to_js(err: SensorError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

fn info_object(info: &ResizeInfo) -> Result<JsValue, JsValue> {
    let obj = Object::new();
    Reflect::set(&obj, &"width".into(), &info.width.into())?;
    Reflect::set(
        &obj,
        &"widthDifference".into(),
        &info.width_difference.into(),
    )?;
    Reflect::set(&obj, &"height".into(), &info.height.into())?;
    Reflect::set(
        &obj,
        &"heightDifference".into(),
        &info.height_difference.into(),
    )?;
    Ok(obj.into())
}

/// A single element or an array of elements
fn targets_from_js(value: &JsValue) -> Result<Targets<HtmlElement>, JsValue> {
    if let Some(element) = value.dyn_ref::<HtmlElement>() {
        return Ok(Targets::One(element.clone()));
    }
    if Array::is_array(value) {
        return Array::from(value)
            .iter()
            .map(|item| {
                item.dyn_into::<HtmlElement>()
                    .map_err(|_| JsValue::from_str("target array holds a non-element"))
            })
            .collect();
    }
    Err(JsValue::from_str("expected an element or an array of elements"))
}

/// Resize sensors for the page's document
#[wasm_bindgen]
pub struct ResizeSensors {
    inner: WebSensors,
    /// JS functions and the listeners wrapping them, so detach can match by identity
    callbacks: Vec<(Function, ResizeListener<HtmlElement>)>,
}

#[wasm_bindgen]
impl ResizeSensors {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Result<ResizeSensors, JsValue> {
        let dom = WebDom::from_global().map_err(to_js)?;
        Ok(Self {
            inner: WebSensors::new(dom).map_err(to_js)?,
            callbacks: Vec::new(),
        })
    }

    /// Start observing `targets`, calling `callback` on every size change
    pub fn attach(&mut self, targets: JsValue, callback: Function) -> Result<(), JsValue> {
        let targets = targets_from_js(&targets)?;
        let listener = self.listener_for(&callback);
        let attached = self.inner.context().attach(targets, &listener);
        if attached.is_err() {
            self.prune_callbacks();
        }
        attached.map_err(to_js)
    }

    /// Remove one registration of `callback`, or every registration when omitted
    pub fn detach(&mut self, targets: JsValue, callback: Option<Function>) -> Result<(), JsValue> {
        let targets = targets_from_js(&targets)?;
        let detached = match callback {
            Some(callback) => {
                // A function never attached has nothing to remove
                let Some(listener) = self.known_listener(&callback) else {
                    return Ok(());
                };
                self.inner.context().detach(targets, Some(&listener))
            }
            None => self.inner.context().detach(targets, None),
        };
        self.prune_callbacks();
        detached.map_err(to_js)
    }

    /// Re-attach and re-arm sensors after outside DOM changes
    pub fn reset(&self, targets: JsValue) -> Result<(), JsValue> {
        let targets = targets_from_js(&targets)?;
        self.inner.context().reset(targets).map_err(to_js)
    }

    /// Registration count for `element`, `undefined` when it has none
    pub fn length(&self, element: &HtmlElement) -> Option<u32> {
        self.inner
            .context()
            .length(element)
            .map(|count| count as u32)
    }
}

impl ResizeSensors {
    pub fn sensors(&self) -> &WebSensors {
        &self.inner
    }

    fn listener_for(&mut self, callback: &Function) -> ResizeListener<HtmlElement> {
        if let Some((_, listener)) = self.callbacks.iter().find(|(f, _)| f == callback) {
            return listener.clone();
        }

        let function = callback.clone();
        let current = self.inner.current_event();
        let listener = ResizeListener::new(
            move |element: &HtmlElement, _: &ScrollEvent<HtmlElement>, info: &ResizeInfo| {
                let event = current
                    .borrow()
                    .clone()
                    .map(JsValue::from)
                    .unwrap_or(JsValue::UNDEFINED);
                let called = info_object(info)
                    .and_then(|info| function.call2(element, &event, &info));
                if let Err(err) = called {
                    tracing::warn!(?err, "resize callback failed");
                }
            },
        );
        self.callbacks.push((callback.clone(), listener.clone()));
        listener
    }

    /// Drop wrappers whose listener has no registration left
    fn prune_callbacks(&mut self) {
        let context = self.inner.context();
        self.callbacks
            .retain(|(_, listener)| context.is_registered(listener));
    }

    fn known_listener(&self, callback: &Function) -> Option<ResizeListener<HtmlElement>> {
        self.callbacks
            .iter()
            .find(|(f, _)| f == callback)
            .map(|(_, listener)| listener.clone())
    }
}
