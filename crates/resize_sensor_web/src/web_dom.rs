//! `web-sys` implementation of the sensor host

use std::cell::RefCell;
use std::rc::Rc;

use resize_sensor::{BoxSize, Dom, Result, ScrollEvent, SensorContext, SensorError, SensorOptions};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Document, Event, HtmlElement, Window};

fn js_error(err: JsValue) -> SensorError {
    SensorError::Dom(format!("{err:?}"))
}

/// A browser document as a sensor host
pub struct WebDom {
    window: Window,
    document: Document,
}

impl WebDom {
    pub fn new(window: Window, document: Document) -> Self {
        Self { window, document }
    }

    /// Host for the page's own document
    pub fn from_global() -> Result<Self> {
        let window =
            web_sys::window().ok_or_else(|| SensorError::Dom("no global window".into()))?;
        let document = window
            .document()
            .ok_or_else(|| SensorError::Dom("window has no document".into()))?;
        Ok(Self::new(window, document))
    }

    pub fn document(&self) -> &Document {
        &self.document
    }
}

impl Dom for WebDom {
    type Node = HtmlElement;

    fn create_element(&mut self, tag: &str) -> Result<HtmlElement> {
        self.document
            .create_element(tag)
            .map_err(js_error)?
            .dyn_into::<HtmlElement>()
            .map_err(|_| SensorError::Dom(format!("<{tag}> is not an HTML element")))
    }

    fn append_child(&mut self, parent: &HtmlElement, child: &HtmlElement) -> Result<()> {
        parent.append_child(child).map(drop).map_err(js_error)
    }

    fn remove_child(&mut self, parent: &HtmlElement, child: &HtmlElement) -> Result<()> {
        parent.remove_child(child).map(drop).map_err(js_error)
    }

    fn parent_element(&self, node: &HtmlElement) -> Option<HtmlElement> {
        node.parent_element()?.dyn_into::<HtmlElement>().ok()
    }

    fn attribute(&self, node: &HtmlElement, name: &str) -> Option<String> {
        node.get_attribute(name)
    }

    fn set_attribute(&mut self, node: &HtmlElement, name: &str, value: &str) -> Result<()> {
        node.set_attribute(name, value).map_err(js_error)
    }

    fn remove_attribute(&mut self, node: &HtmlElement, name: &str) -> Result<()> {
        node.remove_attribute(name).map_err(js_error)
    }

    fn set_style(&mut self, node: &HtmlElement, property: &str, value: &str) -> Result<()> {
        node.style().set_property(property, value).map_err(js_error)
    }

    fn inline_style(&self, node: &HtmlElement, property: &str) -> Option<String> {
        node.style().get_property_value(property).ok()
    }

    fn computed_style(&self, node: &HtmlElement, property: &str) -> Option<String> {
        self.window
            .get_computed_style(node)
            .ok()
            .flatten()?
            .get_property_value(property)
            .ok()
    }

    fn offset_size(&self, node: &HtmlElement) -> BoxSize {
        BoxSize::new(node.offset_width(), node.offset_height())
    }

    fn set_scroll_position(&mut self, node: &HtmlElement, left: i32, top: i32) {
        node.set_scroll_left(left);
        node.set_scroll_top(top);
    }
}

/// Sensor context bound to a browser document
///
/// Installs one capturing `scroll` listener on the document for the lifetime
/// of the value; scroll events do not bubble, so capture is what lets a
/// single listener see the scrolls of every sensor pane.
pub struct WebSensors {
    context: SensorContext<WebDom>,
    document: Document,
    listener: Closure<dyn FnMut(Event)>,
    current_event: Rc<RefCell<Option<Event>>>,
}

impl WebSensors {
    pub fn new(dom: WebDom) -> Result<Self> {
        Self::with_options(dom, SensorOptions::default())
    }

    pub fn with_options(dom: WebDom, options: SensorOptions) -> Result<Self> {
        let document = dom.document().clone();
        let context = SensorContext::with_options(dom, options);
        let current_event = Rc::new(RefCell::new(None));

        let weak = context.downgrade();
        let current = Rc::clone(&current_event);
        let listener = Closure::<dyn FnMut(Event)>::new(move |event: Event| {
            let Some(context) = weak.upgrade() else {
                return;
            };
            let Some(target) = event
                .target()
                .and_then(|target| target.dyn_into::<HtmlElement>().ok())
            else {
                return;
            };

            *current.borrow_mut() = Some(event);
            if let Err(err) = context.handle_scroll(&ScrollEvent::new(target)) {
                tracing::warn!(%err, "resize sensor scroll handling failed");
            }
            current.borrow_mut().take();
        });

        document
            .add_event_listener_with_callback_and_bool(
                "scroll",
                listener.as_ref().unchecked_ref(),
                true,
            )
            .map_err(js_error)?;

        Ok(Self {
            context,
            document,
            listener,
            current_event,
        })
    }

    pub fn context(&self) -> &SensorContext<WebDom> {
        &self.context
    }

    /// Native event being dispatched, while listeners run
    pub(crate) fn current_event(&self) -> Rc<RefCell<Option<Event>>> {
        Rc::clone(&self.current_event)
    }
}

impl Drop for WebSensors {
    fn drop(&mut self) {
        let _ = self.document.remove_event_listener_with_callback_and_bool(
            "scroll",
            self.listener.as_ref().unchecked_ref(),
            true,
        );
    }
}
