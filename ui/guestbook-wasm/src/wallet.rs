//! Browser wallet adapter.
//!
//! Reads go straight to the NEAR RPC node. Signing goes through the page's
//! wallet selector, exposed as a global `guestbookWallet` object:
//!
//! - `init(networkId, contractId, onAccountChange)` → `Promise<string | null>`
//! - `signIn()`, `signOut()` → `Promise<void>`
//! - `signAndSendTransactions(transactions)` → `Promise<outcome[]>`

use async_trait::async_trait;
use gb_api_types::{AccountId, CallOutcome, CurrentUser, FunctionCall, Transaction};
use gb_config::NetworkConfig;
use gb_near_rpc::NearRpcClient;
use gb_wallet_client::{AccountObserver, ObserverRegistry, SessionHandle, WalletAdapter, WalletError};
use serde::Serialize;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{info, warn};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(catch, js_namespace = guestbookWallet, js_name = init)]
    async fn selector_init(
        network_id: &str,
        contract_id: &str,
        on_account_change: &js_sys::Function,
    ) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch, js_namespace = guestbookWallet, js_name = signIn)]
    async fn selector_sign_in() -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch, js_namespace = guestbookWallet, js_name = signOut)]
    async fn selector_sign_out() -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch, js_namespace = guestbookWallet, js_name = signAndSendTransactions)]
    async fn selector_sign_and_send(transactions: JsValue) -> Result<JsValue, JsValue>;
}

struct Shared {
    rpc: NearRpcClient,
    observers: ObserverRegistry,
    account: RefCell<Option<AccountId>>,
}

impl Shared {
    fn account(&self) -> Option<AccountId> {
        self.account.borrow().clone()
    }

    /// Builds the current user with a live balance.
    async fn lookup(&self, account: Option<AccountId>) -> Result<Option<CurrentUser>, WalletError> {
        let Some(account_id) = account else {
            return Ok(None);
        };
        let balance = self
            .rpc
            .available_balance(&account_id)
            .await
            .map_err(|err| WalletError::Provider(format!("{err:#}")))?;
        Ok(Some(CurrentUser {
            account_id,
            balance: balance.to_string(),
        }))
    }

    async fn announce(&self, account: Option<AccountId>) {
        let user = match self.lookup(account.clone()).await {
            Ok(user) => user,
            Err(err) => {
                warn!(error = %err, "balance lookup failed");
                unknown_balance(account)
            }
        };
        self.observers.notify(user);
    }
}

pub struct BrowserWallet {
    shared: Rc<Shared>,
    on_change: RefCell<Option<Closure<dyn FnMut(JsValue)>>>,
}

impl BrowserWallet {
    pub fn new(config: &NetworkConfig) -> Self {
        Self {
            shared: Rc::new(Shared {
                rpc: NearRpcClient::new(config),
                observers: ObserverRegistry::default(),
                account: RefCell::new(None),
            }),
            on_change: RefCell::new(None),
        }
    }

    fn account_change_callback(&self) -> js_sys::Function {
        let shared = Rc::clone(&self.shared);
        let closure = Closure::wrap(Box::new(move |value: JsValue| {
            let account = account_from_js(&value);
            info!(account = ?account.as_ref().map(|id| &id.0), "wallet account changed");
            *shared.account.borrow_mut() = account.clone();
            let shared = Rc::clone(&shared);
            wasm_bindgen_futures::spawn_local(async move {
                shared.announce(account).await;
            });
        }) as Box<dyn FnMut(JsValue)>);

        let function = closure.as_ref().unchecked_ref::<js_sys::Function>().clone();
        *self.on_change.borrow_mut() = Some(closure);
        function
    }
}

#[async_trait(?Send)]
impl WalletAdapter for BrowserWallet {
    async fn init_session(
        &self,
        config: &NetworkConfig,
        observer: Rc<dyn AccountObserver>,
    ) -> Result<SessionHandle, WalletError> {
        let callback = self.account_change_callback();
        let account = selector_init(&config.network_id.0, &config.contract_id.0, &callback)
            .await
            .map_err(js_error)?;
        let account = account_from_js(&account);
        *self.shared.account.borrow_mut() = account.clone();

        let subscription = self.shared.observers.subscribe(Rc::clone(&observer));
        if account.is_some() {
            let user = self.shared.lookup(account).await?;
            observer.account_changed(user);
        }

        Ok(SessionHandle { subscription })
    }

    fn end_session(&self, session: &SessionHandle) {
        self.shared.observers.unsubscribe(session.subscription);
    }

    async fn current_account(&self, session: &SessionHandle) -> Result<Option<CurrentUser>, WalletError> {
        if !self.shared.observers.is_subscribed(session.subscription) {
            return Err(WalletError::Unavailable);
        }
        self.shared.lookup(self.shared.account()).await
    }

    async fn view(
        &self,
        contract_id: &AccountId,
        method_name: &str,
        args: serde_json::Value,
    ) -> Result<serde_json::Value, WalletError> {
        self.shared
            .rpc
            .view_function(contract_id, method_name, &args)
            .await
            .map_err(|err| WalletError::Provider(format!("{err:#}")))
    }

    async fn call(&self, contract_id: &AccountId, call: FunctionCall) -> Result<CallOutcome, WalletError> {
        self.call_batch(vec![Transaction::function_call(contract_id.clone(), call)])
            .await
    }

    async fn call_batch(&self, transactions: Vec<Transaction>) -> Result<CallOutcome, WalletError> {
        if self.shared.account().is_none() {
            return Err(WalletError::NotSignedIn);
        }

        let serializer = serde_wasm_bindgen::Serializer::json_compatible();
        let payload = transactions
            .serialize(&serializer)
            .map_err(|err| WalletError::Rejected(format!("encode transactions: {err}")))?;

        let outcomes = selector_sign_and_send(payload).await.map_err(js_error)?;
        let outcomes: serde_json::Value = serde_wasm_bindgen::from_value(outcomes).unwrap_or_default();
        Ok(CallOutcome {
            transaction_hashes: transaction_hashes(&outcomes),
        })
    }

    async fn sign_in(&self) -> Result<(), WalletError> {
        selector_sign_in().await.map_err(js_error)?;
        Ok(())
    }

    async fn sign_out(&self) -> Result<(), WalletError> {
        selector_sign_out().await.map_err(js_error)?;
        *self.shared.account.borrow_mut() = None;
        self.shared.observers.notify(None);
        Ok(())
    }
}

/// The account is still signed in; an empty balance renders as unavailable.
fn unknown_balance(account: Option<AccountId>) -> Option<CurrentUser> {
    account.map(|account_id| CurrentUser {
        account_id,
        balance: String::new(),
    })
}

fn account_from_js(value: &JsValue) -> Option<AccountId> {
    value
        .as_string()
        .map(|id| id.trim().to_owned())
        .filter(|id| !id.is_empty())
        .map(AccountId)
}

fn transaction_hashes(outcomes: &serde_json::Value) -> Vec<String> {
    let outcomes = match outcomes {
        serde_json::Value::Array(items) => items.as_slice(),
        other => std::slice::from_ref(other),
    };
    outcomes
        .iter()
        .filter_map(|outcome| outcome.pointer("/transaction/hash"))
        .filter_map(|hash| hash.as_str().map(ToOwned::to_owned))
        .collect()
}

fn js_error(value: JsValue) -> WalletError {
    let message = value
        .dyn_ref::<js_sys::Error>()
        .map(|err| String::from(err.message()))
        .or_else(|| value.as_string())
        .unwrap_or_else(|| format!("{value:?}"));
    classify_error(message)
}

fn classify_error(message: String) -> WalletError {
    let lower = message.to_ascii_lowercase();
    if lower.contains("not signed in") || lower.contains("no accounts") {
        WalletError::NotSignedIn
    } else if lower.contains("reject") || lower.contains("denied") || lower.contains("cancel") {
        WalletError::Rejected(message)
    } else {
        WalletError::Provider(message)
    }
}
