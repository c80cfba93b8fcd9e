//! DOM helpers.

use wasm_bindgen::prelude::*;
use web_sys::{Document, Element, HtmlInputElement};

fn doc() -> Document {
    window().document().expect("window has a document")
}

pub fn window() -> web_sys::Window {
    web_sys::window().expect("running in a browser window")
}

pub fn by_id(id: &str) -> Option<Element> {
    doc().get_element_by_id(id)
}

pub fn by_id_typed<T: JsCast>(id: &str) -> Option<T> {
    by_id(id).and_then(|e| e.dyn_into::<T>().ok())
}

pub fn input_value(id: &str) -> String {
    by_id_typed::<HtmlInputElement>(id)
        .map(|input| input.value())
        .unwrap_or_default()
}

pub fn input_checked(id: &str) -> bool {
    by_id_typed::<HtmlInputElement>(id)
        .map(|input| input.checked())
        .unwrap_or_default()
}

pub fn location_search() -> String {
    window().location().search().unwrap_or_default()
}

pub fn location_href() -> String {
    window().location().href().unwrap_or_default()
}

/// Nearest element at or above the event target carrying `data-action`.
pub fn action_target(event: &web_sys::Event) -> Option<(Element, String)> {
    let target = event.target()?.dyn_into::<Element>().ok()?;
    let element = target.closest("[data-action]").ok()??;
    let action = element.get_attribute("data-action")?;
    Some((element, action))
}

// ── Elements ──

/// Mount point of the page. The app renders everything beneath `#app`.
#[derive(Clone)]
pub struct Elements {
    pub root: Element,
}

impl Elements {
    pub fn bind() -> Result<Self, JsValue> {
        let root = by_id("app").ok_or_else(|| JsValue::from_str("missing #app mount point"))?;
        Ok(Self { root })
    }

    pub fn paint(&self, html: &str) {
        self.root.set_inner_html(html);
    }
}
