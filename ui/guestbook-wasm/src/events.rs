//! Event binding.
//!
//! The page is re-rendered wholesale, so listeners are attached once to the
//! `#app` root and dispatch on the event target.

use crate::Controller;
use crate::dom::{self, Elements};
use gloo_storage::{LocalStorage, Storage};
use tracing::warn;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

/// Helper: attach a listener for `$event` on the root element.
macro_rules! on_root {
    ($els:expr, $event:literal, $cb:expr) => {{
        let cb = Closure::wrap(Box::new($cb) as Box<dyn FnMut(web_sys::Event)>);
        $els.root
            .add_event_listener_with_callback($event, cb.as_ref().unchecked_ref())
            .unwrap();
        cb.forget();
    }};
}

/// Bind all UI event listeners. Call once after the first paint.
pub fn bind_events(els: &Elements, controller: &Controller) {
    // ── Form submission ──
    {
        let controller = controller.clone();
        on_root!(els, "submit", move |event: web_sys::Event| {
            event.prevent_default();
            sync_draft(&controller);
            let controller = controller.clone();
            wasm_bindgen_futures::spawn_local(async move {
                if let Err(err) = controller.submit().await {
                    warn!(error = %err, "submit failed");
                }
            });
        });
    }

    // ── Draft edits ──
    {
        let controller = controller.clone();
        on_root!(els, "input", move |_: web_sys::Event| sync_draft(&controller));
    }
    {
        let controller = controller.clone();
        on_root!(els, "change", move |_: web_sys::Event| sync_draft(&controller));
    }

    // ── Buttons and links ──
    {
        let controller = controller.clone();
        on_root!(els, "click", move |event: web_sys::Event| {
            let Some((_, action)) = dom::action_target(&event) else {
                return;
            };
            match action.as_str() {
                "sign-in" => {
                    let controller = controller.clone();
                    wasm_bindgen_futures::spawn_local(async move {
                        let _ = controller.sign_in().await;
                    });
                }
                "sign-out" => {
                    let controller = controller.clone();
                    wasm_bindgen_futures::spawn_local(async move {
                        let _ = controller.sign_out().await;
                    });
                }
                "dismiss" => controller.dismiss_notice(),
                // The wallet selector caches the network's session in local storage.
                "switch-network" => LocalStorage::clear(),
                _ => {}
            }
        });
    }
}

/// Copies the form inputs into the controller's draft.
fn sync_draft(controller: &Controller) {
    if dom::by_id("message").is_none() {
        return;
    }
    let text = dom::input_value("message");
    let donation = dom::input_value("donation");
    let send_as_two = dom::input_checked("multiple");
    controller.edit_draft(|draft| {
        draft.text = text;
        draft.donation = donation;
        draft.send_as_two = send_as_two;
    });
}
