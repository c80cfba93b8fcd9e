use async_trait::async_trait;
use gb_api_types::{AccountId, CallOutcome, CurrentUser, FunctionCall, GET_MESSAGES, Message, Transaction};
use gb_config::NetworkConfig;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use thiserror::Error;

mod memory;

pub use memory::InMemoryWallet;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WalletError {
    #[error("no signed-in account")]
    NotSignedIn,
    #[error("request rejected: {0}")]
    Rejected(String),
    #[error("wallet provider failure: {0}")]
    Provider(String),
    #[error("malformed response: {0}")]
    Decode(String),
    #[error("wallet session is not initialised")]
    Unavailable,
}

/// Receives account changes pushed by the wallet.
///
/// `None` means the wallet no longer has a signed-in account.
pub trait AccountObserver {
    fn account_changed(&self, account: Option<CurrentUser>);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// An established wallet connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
    pub subscription: SubscriptionId,
}

/// Everything the guest book needs from a wallet and the ledger behind it.
///
/// Futures are not `Send`: the page runs on a single event loop.
#[async_trait(?Send)]
pub trait WalletAdapter {
    async fn init_session(
        &self,
        config: &NetworkConfig,
        observer: Rc<dyn AccountObserver>,
    ) -> Result<SessionHandle, WalletError>;

    fn end_session(&self, session: &SessionHandle);

    async fn current_account(&self, session: &SessionHandle) -> Result<Option<CurrentUser>, WalletError>;

    async fn view(
        &self,
        contract_id: &AccountId,
        method_name: &str,
        args: serde_json::Value,
    ) -> Result<serde_json::Value, WalletError>;

    async fn call(&self, contract_id: &AccountId, call: FunctionCall) -> Result<CallOutcome, WalletError>;

    async fn call_batch(&self, transactions: Vec<Transaction>) -> Result<CallOutcome, WalletError>;

    async fn sign_in(&self) -> Result<(), WalletError>;

    async fn sign_out(&self) -> Result<(), WalletError>;
}

/// Fetches and decodes the full message list.
pub async fn view_messages<W>(wallet: &W, contract_id: &AccountId) -> Result<Vec<Message>, WalletError>
where
    W: WalletAdapter + ?Sized,
{
    let raw = wallet
        .view(contract_id, GET_MESSAGES, serde_json::json!({}))
        .await?;
    serde_json::from_value(raw).map_err(|err| WalletError::Decode(err.to_string()))
}

/// Observer bookkeeping shared by adapter implementations.
#[derive(Default)]
pub struct ObserverRegistry {
    next_id: Cell<u64>,
    observers: RefCell<Vec<(SubscriptionId, Rc<dyn AccountObserver>)>>,
}

impl ObserverRegistry {
    pub fn subscribe(&self, observer: Rc<dyn AccountObserver>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.get() + 1);
        self.next_id.set(id.0);
        self.observers.borrow_mut().push((id, observer));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.observers.borrow_mut().retain(|(existing, _)| *existing != id);
    }

    pub fn is_subscribed(&self, id: SubscriptionId) -> bool {
        self.observers.borrow().iter().any(|(existing, _)| *existing == id)
    }

    pub fn len(&self) -> usize {
        self.observers.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn notify(&self, account: Option<CurrentUser>) {
        // Observers may subscribe or unsubscribe from inside the callback.
        let observers: Vec<_> = self
            .observers
            .borrow()
            .iter()
            .map(|(_, observer)| Rc::clone(observer))
            .collect();
        for observer in observers {
            observer.account_changed(account.clone());
        }
    }
}
