//! In-process wallet and contract used for local runs and tests.

use async_trait::async_trait;
use gb_api_types::{
    ADD_MESSAGE, AccountId, Action, AddMessageArgs, CallOutcome, CurrentUser, FunctionCall, GET_MESSAGES,
    Message, Transaction,
};
use gb_config::NetworkConfig;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use tracing::{debug, info};

use crate::{AccountObserver, ObserverRegistry, SessionHandle, WalletAdapter, WalletError};

#[derive(Default)]
struct Ledger {
    contract_id: Option<AccountId>,
    messages: Vec<Message>,
    balances: HashMap<AccountId, u128>,
    account: Option<AccountId>,
    signed_in: bool,
    fail_next_init: Option<WalletError>,
    fail_next_call: Option<WalletError>,
    calls: Vec<FunctionCall>,
    batches: Vec<Vec<Transaction>>,
    next_tx: u64,
}

/// A wallet that keeps the guest book contract state in memory.
///
/// Account notifications are delivered synchronously, including during
/// `init_session` when an account is already signed in.
#[derive(Default)]
pub struct InMemoryWallet {
    ledger: RefCell<Ledger>,
    observers: ObserverRegistry,
    init_calls: Cell<usize>,
    view_calls: Cell<usize>,
}

impl InMemoryWallet {
    /// A wallet that signs in as `account_id` holding `balance` yoctoNEAR.
    pub fn new(account_id: &str, balance: u128) -> Self {
        let wallet = Self::default();
        {
            let mut ledger = wallet.ledger.borrow_mut();
            let account = AccountId::from(account_id);
            ledger.balances.insert(account.clone(), balance);
            ledger.account = Some(account);
        }
        wallet
    }

    /// Starts with the account already signed in.
    pub fn signed_in(self) -> Self {
        self.ledger.borrow_mut().signed_in = true;
        self
    }

    pub fn with_messages(self, messages: Vec<Message>) -> Self {
        self.ledger.borrow_mut().messages = messages;
        self
    }

    pub fn fail_next_init(&self, err: WalletError) {
        self.ledger.borrow_mut().fail_next_init = Some(err);
    }

    /// Makes the next `call` or `call_batch` fail without touching state.
    pub fn fail_next_call(&self, err: WalletError) {
        self.ledger.borrow_mut().fail_next_call = Some(err);
    }

    /// Drops the signed-in account without notifying observers, the way a
    /// wallet whose key was revoked elsewhere behaves.
    pub fn expire_session(&self) {
        self.ledger.borrow_mut().signed_in = false;
    }

    pub fn init_calls(&self) -> usize {
        self.init_calls.get()
    }

    pub fn view_calls(&self) -> usize {
        self.view_calls.get()
    }

    pub fn calls(&self) -> Vec<FunctionCall> {
        self.ledger.borrow().calls.clone()
    }

    pub fn batches(&self) -> Vec<Vec<Transaction>> {
        self.ledger.borrow().batches.clone()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.ledger.borrow().messages.clone()
    }

    pub fn balance_of(&self, account_id: &str) -> u128 {
        self.ledger
            .borrow()
            .balances
            .get(&AccountId::from(account_id))
            .copied()
            .unwrap_or(0)
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    fn current_user(&self) -> Option<CurrentUser> {
        let ledger = self.ledger.borrow();
        if !ledger.signed_in {
            return None;
        }
        let account_id = ledger.account.clone()?;
        let balance = ledger.balances.get(&account_id).copied().unwrap_or(0);
        Some(CurrentUser {
            account_id,
            balance: balance.to_string(),
        })
    }
}

impl Ledger {
    fn signer(&self) -> Result<AccountId, WalletError> {
        match (&self.account, self.signed_in) {
            (Some(account), true) => Ok(account.clone()),
            _ => Err(WalletError::NotSignedIn),
        }
    }

    fn check_receiver(&self, receiver_id: &AccountId) -> Result<(), WalletError> {
        match &self.contract_id {
            Some(contract_id) if contract_id == receiver_id => Ok(()),
            Some(_) => Err(WalletError::Rejected(format!("account {receiver_id} does not exist"))),
            None => Err(WalletError::Unavailable),
        }
    }

    fn decode_add_message(call: &FunctionCall) -> Result<String, WalletError> {
        if call.method_name != ADD_MESSAGE {
            return Err(WalletError::Rejected(format!(
                "contract method {} not found",
                call.method_name
            )));
        }
        let args: AddMessageArgs = serde_json::from_value(call.args.clone())
            .map_err(|err| WalletError::Rejected(format!("invalid addMessage args: {err}")))?;
        Ok(args.text)
    }

    /// Validates every call first so a batch either applies fully or not at all.
    fn apply(&mut self, calls: &[FunctionCall]) -> Result<CallOutcome, WalletError> {
        let signer = self.signer()?;
        if let Some(err) = self.fail_next_call.take() {
            return Err(err);
        }

        let texts = calls
            .iter()
            .map(Self::decode_add_message)
            .collect::<Result<Vec<_>, _>>()?;

        let total = calls
            .iter()
            .try_fold(0_u128, |acc, call| acc.checked_add(call.deposit))
            .ok_or_else(|| WalletError::Rejected("deposit overflow".to_owned()))?;
        let balance = self.balances.get(&signer).copied().unwrap_or(0);
        if total > balance {
            return Err(WalletError::Rejected(format!(
                "insufficient funds: {balance} < {total}"
            )));
        }
        self.balances.insert(signer.clone(), balance - total);

        let mut outcome = CallOutcome::default();
        for (call, text) in calls.iter().zip(texts) {
            self.messages.push(Message {
                sender: signer.0.clone(),
                text,
                premium: call.deposit > 0,
            });
            self.calls.push(call.clone());
            self.next_tx += 1;
            outcome.transaction_hashes.push(format!("tx-{}", self.next_tx));
        }
        Ok(outcome)
    }
}

#[async_trait(?Send)]
impl WalletAdapter for InMemoryWallet {
    async fn init_session(
        &self,
        config: &NetworkConfig,
        observer: Rc<dyn AccountObserver>,
    ) -> Result<SessionHandle, WalletError> {
        self.init_calls.set(self.init_calls.get() + 1);
        {
            let mut ledger = self.ledger.borrow_mut();
            if let Some(err) = ledger.fail_next_init.take() {
                return Err(err);
            }
            ledger.contract_id = Some(config.contract_id.clone());
        }

        let subscription = self.observers.subscribe(Rc::clone(&observer));
        if let Some(user) = self.current_user() {
            observer.account_changed(Some(user));
        }
        debug!(network = %config.network_id, "in-memory wallet session ready");

        Ok(SessionHandle { subscription })
    }

    fn end_session(&self, session: &SessionHandle) {
        self.observers.unsubscribe(session.subscription);
    }

    async fn current_account(&self, session: &SessionHandle) -> Result<Option<CurrentUser>, WalletError> {
        if !self.observers.is_subscribed(session.subscription) {
            return Err(WalletError::Unavailable);
        }
        Ok(self.current_user())
    }

    async fn view(
        &self,
        contract_id: &AccountId,
        method_name: &str,
        _args: serde_json::Value,
    ) -> Result<serde_json::Value, WalletError> {
        self.view_calls.set(self.view_calls.get() + 1);
        let ledger = self.ledger.borrow();
        ledger.check_receiver(contract_id)?;
        if method_name != GET_MESSAGES {
            return Err(WalletError::Rejected(format!("contract method {method_name} not found")));
        }
        serde_json::to_value(&ledger.messages).map_err(|err| WalletError::Decode(err.to_string()))
    }

    async fn call(&self, contract_id: &AccountId, call: FunctionCall) -> Result<CallOutcome, WalletError> {
        let mut ledger = self.ledger.borrow_mut();
        ledger.check_receiver(contract_id)?;
        ledger.apply(std::slice::from_ref(&call))
    }

    async fn call_batch(&self, transactions: Vec<Transaction>) -> Result<CallOutcome, WalletError> {
        let mut ledger = self.ledger.borrow_mut();
        let mut calls = Vec::new();
        for tx in &transactions {
            ledger.check_receiver(&tx.receiver_id)?;
            for action in &tx.actions {
                let Action::FunctionCall(call) = action;
                calls.push(call.clone());
            }
        }
        let outcome = ledger.apply(&calls)?;
        ledger.batches.push(transactions);
        Ok(outcome)
    }

    async fn sign_in(&self) -> Result<(), WalletError> {
        {
            let mut ledger = self.ledger.borrow_mut();
            if ledger.account.is_none() {
                return Err(WalletError::Rejected("no account available to sign in".to_owned()));
            }
            ledger.signed_in = true;
        }
        let user = self.current_user();
        info!(account = ?user.as_ref().map(|u| &u.account_id.0), "signed in");
        self.observers.notify(user);
        Ok(())
    }

    async fn sign_out(&self) -> Result<(), WalletError> {
        self.ledger.borrow_mut().signed_in = false;
        info!("signed out");
        self.observers.notify(None);
        Ok(())
    }
}
