//! Guest Book WASM Frontend
//!
//! Resolves the network from the page URL, connects the wallet and renders
//! the guest book into `#app`.

pub mod dom;
pub mod events;
pub mod logging;
pub mod render;
pub mod wallet;

use gb_config::{network_hint_from_query, resolve_config};
use gb_controller::GuestBookController;
use std::rc::Rc;
use tracing::{error, info};
use wasm_bindgen::prelude::*;

use crate::dom::Elements;
use crate::wallet::BrowserWallet;

pub type Controller = GuestBookController<BrowserWallet>;

/// WASM entry point – called automatically when the module is instantiated.
#[wasm_bindgen(start)]
pub async fn start() -> Result<(), JsValue> {
    console_error_panic_hook::set_once();
    logging::init();

    init().await
}

async fn init() -> Result<(), JsValue> {
    let els = Elements::bind()?;

    let hint = network_hint_from_query(&dom::location_search());
    let config = match resolve_config(hint.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "cannot start guest book");
            els.paint(&format!(
                r#"<main><p class="notice notice--error" role="alert">{}</p></main>"#,
                render::escape(&err.to_string())
            ));
            return Err(JsValue::from_str(&err.to_string()));
        }
    };
    info!(network = %config.network_id, contract = %config.contract_id, "starting guest book");

    let wallet = Rc::new(BrowserWallet::new(&config));
    let controller = Controller::new(config, wallet);
    {
        let els = els.clone();
        let view = controller.clone();
        controller.set_on_change(move || paint(&els, &view));
    }

    paint(&els, &controller);
    events::bind_events(&els, &controller);

    // A failed session leaves the page in its loading state; the error is
    // already logged by the controller.
    let _ = controller.mount().await;
    Ok(())
}

fn paint(els: &Elements, controller: &Controller) {
    let html = render::render_page(&controller.snapshot(), controller.config(), &dom::location_href());
    els.paint(&html);
}
