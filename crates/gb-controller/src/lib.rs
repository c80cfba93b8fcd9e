//! Guest book application controller.
//!
//! Owns the page state (wallet session, signed-in account, message list and
//! submission form) and drives the wallet adapter on mount and on submit.
//! All state sits behind one `Rc<RefCell<_>>`; borrows never span an `.await`.

use gb_api_types::{
    ADD_MESSAGE, AccountId, AmountError, BOATLOAD_OF_GAS, CallOutcome, CurrentUser,
    DraftSubmission, FunctionCall, Message, SUGGESTED_DONATION, Transaction, parse_near_amount,
};
use gb_config::NetworkConfig;
use gb_wallet_client::{AccountObserver, SessionHandle, WalletAdapter, WalletError, view_messages};
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use thiserror::Error;
use tracing::{debug, info, warn};

mod view;

pub use view::{ControllerState, FormState, FormStatus, Notice, Snapshot};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("wallet session failed to initialise: {0}")]
    Init(#[source] WalletError),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("a submission is already in progress")]
    InFlight,
    #[error("sign in to post a message")]
    NotSignedIn,
    #[error("invalid donation: {0}")]
    InvalidDonation(#[from] AmountError),
    #[error(transparent)]
    Wallet(#[from] WalletError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountOutcome {
    Mounted,
    /// Mount was already running or done; nothing was issued.
    AlreadyMounted,
    /// The controller was torn down while the session was opening; the
    /// session has been closed again.
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Uninitialized,
    Initializing,
    Ready,
    Failed,
}

type RenderHook = Rc<dyn Fn()>;

struct Inner {
    phase: Phase,
    /// Bumped by teardown; work started under an older epoch is stale.
    epoch: u64,
    session: Option<SessionHandle>,
    current_user: Option<CurrentUser>,
    messages: Vec<Message>,
    form: FormState,
    notice: Option<Notice>,
    in_flight: bool,
    on_change: Option<RenderHook>,
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            phase: Phase::Uninitialized,
            epoch: 0,
            session: None,
            current_user: None,
            messages: Vec::new(),
            form: FormState::default(),
            notice: None,
            in_flight: false,
            on_change: None,
        }
    }
}

impl Inner {
    fn state(&self) -> ControllerState {
        match (self.phase, &self.current_user) {
            (Phase::Uninitialized, _) => ControllerState::Uninitialized,
            (Phase::Initializing, _) => ControllerState::Initializing,
            (Phase::Failed, _) => ControllerState::SessionFailed,
            (Phase::Ready, Some(_)) => ControllerState::SignedIn,
            (Phase::Ready, None) => ControllerState::SignedOut,
        }
    }
}

/// Pushes wallet account changes into the controller state.
struct AccountSink {
    inner: Weak<RefCell<Inner>>,
    epoch: u64,
}

impl AccountObserver for AccountSink {
    fn account_changed(&self, account: Option<CurrentUser>) {
        let Some(inner) = self.inner.upgrade() else {
            return;
        };
        let hook = {
            let mut inner = inner.borrow_mut();
            if inner.epoch != self.epoch {
                return;
            }
            debug!(account = ?account.as_ref().map(|user| &user.account_id.0), "account changed");
            inner.current_user = account;
            inner.on_change.clone()
        };
        if let Some(hook) = hook {
            hook();
        }
    }
}

pub struct GuestBookController<W> {
    config: NetworkConfig,
    wallet: Rc<W>,
    inner: Rc<RefCell<Inner>>,
}

impl<W> Clone for GuestBookController<W> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            wallet: Rc::clone(&self.wallet),
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<W> GuestBookController<W>
where
    W: WalletAdapter + 'static,
{
    pub fn new(config: NetworkConfig, wallet: Rc<W>) -> Self {
        Self {
            config,
            wallet,
            inner: Rc::new(RefCell::new(Inner::default())),
        }
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn wallet(&self) -> &Rc<W> {
        &self.wallet
    }

    /// Registers the callback run after every state change.
    pub fn set_on_change(&self, hook: impl Fn() + 'static) {
        self.inner.borrow_mut().on_change = Some(Rc::new(hook));
    }

    pub fn state(&self) -> ControllerState {
        self.inner.borrow().state()
    }

    pub fn current_user(&self) -> Option<CurrentUser> {
        self.inner.borrow().current_user.clone()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.inner.borrow().messages.clone()
    }

    pub fn form(&self) -> FormState {
        self.inner.borrow().form.clone()
    }

    pub fn notice(&self) -> Option<Notice> {
        self.inner.borrow().notice.clone()
    }

    pub fn snapshot(&self) -> Snapshot {
        let inner = self.inner.borrow();
        Snapshot {
            state: inner.state(),
            network_id: self.config.network_id.clone(),
            current_user: inner.current_user.clone(),
            messages: inner.messages.clone(),
            form: inner.form.clone(),
            notice: inner.notice.clone(),
        }
    }

    /// Opens the wallet session and loads the first message list.
    ///
    /// Only the first call does anything; later calls return
    /// [`MountOutcome::AlreadyMounted`] without touching the wallet.
    pub async fn mount(&self) -> Result<MountOutcome, SessionError> {
        let epoch = {
            let mut inner = self.inner.borrow_mut();
            if inner.phase != Phase::Uninitialized {
                debug!("mount ignored; controller already mounted");
                return Ok(MountOutcome::AlreadyMounted);
            }
            inner.phase = Phase::Initializing;
            inner.epoch
        };
        self.changed();

        let observer: Rc<dyn AccountObserver> = Rc::new(AccountSink {
            inner: Rc::downgrade(&self.inner),
            epoch,
        });
        let session = match self.wallet.init_session(&self.config, observer).await {
            Ok(session) => session,
            Err(_) if !self.is_current(epoch) => {
                debug!("session init failed after teardown");
                return Ok(MountOutcome::Cancelled);
            }
            Err(err) => {
                warn!(error = %err, "wallet session init failed");
                self.inner.borrow_mut().phase = Phase::Failed;
                self.changed();
                return Err(SessionError::Init(err));
            }
        };
        if !self.is_current(epoch) {
            return Ok(self.cancel_mount(&session));
        }

        let reported = self.inner.borrow().current_user.is_some();
        if !reported {
            let account = self.wallet.current_account(&session).await;
            if !self.is_current(epoch) {
                return Ok(self.cancel_mount(&session));
            }
            match account {
                Ok(account) => self.inner.borrow_mut().current_user = account,
                Err(err) => warn!(error = %err, "current account lookup failed"),
            }
        }

        {
            let mut inner = self.inner.borrow_mut();
            inner.session = Some(session);
            inner.phase = Phase::Ready;
            info!(
                network = %self.config.network_id,
                signed_in = inner.current_user.is_some(),
                "guest book ready"
            );
        }
        self.changed();

        // A failed first fetch is reported through the notice and leaves the
        // list empty; the session itself is fine.
        let _ = self.refresh_messages().await;
        Ok(MountOutcome::Mounted)
    }

    /// Replaces the message list with the contract's current contents.
    ///
    /// On failure the previous list is kept and a notice is raised.
    pub async fn refresh_messages(&self) -> Result<(), WalletError> {
        match view_messages(self.wallet.as_ref(), &self.config.contract_id).await {
            Ok(messages) => {
                debug!(count = messages.len(), "messages refreshed");
                self.inner.borrow_mut().messages = messages;
                self.changed();
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "message refresh failed");
                self.inner.borrow_mut().notice = Some(Notice::error(format!("Failed to load messages: {err}")));
                self.changed();
                Err(err)
            }
        }
    }

    /// Re-reads the signed-in account so the balance reflects new donations.
    pub async fn refresh_account(&self) -> Result<(), WalletError> {
        let Some(session) = self.inner.borrow().session.clone() else {
            return Err(WalletError::Unavailable);
        };
        let account = self.wallet.current_account(&session).await?;
        self.inner.borrow_mut().current_user = account;
        self.changed();
        Ok(())
    }

    pub async fn sign_in(&self) -> Result<(), WalletError> {
        if !self.state().is_ready() {
            return Err(WalletError::Unavailable);
        }
        if let Err(err) = self.wallet.sign_in().await {
            self.inner.borrow_mut().notice = Some(Notice::error(format!("Sign in failed: {err}")));
            self.changed();
            return Err(err);
        }
        Ok(())
    }

    /// Signs out and drops the cached account, which hides the form.
    pub async fn sign_out(&self) -> Result<(), WalletError> {
        if !self.state().is_ready() {
            return Err(WalletError::Unavailable);
        }
        if let Err(err) = self.wallet.sign_out().await {
            self.inner.borrow_mut().notice = Some(Notice::error(format!("Sign out failed: {err}")));
            self.changed();
            return Err(err);
        }
        {
            let mut inner = self.inner.borrow_mut();
            inner.current_user = None;
            inner.form.status = FormStatus::Idle;
        }
        info!("signed out");
        self.changed();
        Ok(())
    }

    /// Applies an edit made in the form inputs.
    ///
    /// The inputs already show the edit, so no re-render is requested.
    /// Ignored while a submission is in flight.
    pub fn edit_draft(&self, edit: impl FnOnce(&mut DraftSubmission)) {
        let mut inner = self.inner.borrow_mut();
        if !inner.form.is_disabled() {
            edit(&mut inner.form.draft);
        }
    }

    /// Clears the notice banner and returns a failed form to idle.
    pub fn dismiss_notice(&self) {
        {
            let mut inner = self.inner.borrow_mut();
            inner.notice = None;
            if matches!(inner.form.status, FormStatus::Failed { .. }) {
                inner.form.status = FormStatus::Idle;
            }
        }
        self.changed();
    }

    /// Posts the current draft.
    ///
    /// With "send as two" set, both halves go out as one batched request.
    /// On success the form is reset and the list refetched; on failure the
    /// draft is kept, the form reports the failure and the error is returned.
    pub async fn submit(&self) -> Result<CallOutcome, SubmitError> {
        let (draft, deposit) = {
            let mut inner = self.inner.borrow_mut();
            if inner.in_flight {
                return Err(SubmitError::InFlight);
            }
            if inner.phase != Phase::Ready || inner.current_user.is_none() {
                return Err(SubmitError::NotSignedIn);
            }
            let draft = inner.form.draft.clone();
            let deposit = match donation_deposit(&draft.donation) {
                Ok(deposit) => deposit,
                Err(err) => {
                    inner.form.status = FormStatus::Failed {
                        reason: err.to_string(),
                    };
                    inner.notice = Some(Notice::error(format!("Invalid donation: {err}")));
                    drop(inner);
                    self.changed();
                    return Err(err.into());
                }
            };
            inner.in_flight = true;
            inner.form.status = FormStatus::Submitting;
            (draft, deposit)
        };
        self.changed();

        let contract_id = &self.config.contract_id;
        let result = if draft.send_as_two {
            let batch = split_message_batch(contract_id, &draft.text, deposit);
            self.wallet.call_batch(batch).await
        } else {
            self.wallet
                .call(contract_id, add_message_call(&draft.text, deposit))
                .await
        };

        match result {
            Ok(outcome) => {
                {
                    let mut inner = self.inner.borrow_mut();
                    inner.in_flight = false;
                    inner.form.draft.text.clear();
                    inner.form.draft.donation = SUGGESTED_DONATION.to_owned();
                    inner.form.status = FormStatus::Idle;
                    inner.notice = None;
                }
                info!(
                    transactions = outcome.transaction_hashes.len(),
                    deposit = %deposit,
                    "message submitted"
                );
                self.changed();

                let _ = self.refresh_messages().await;
                if let Err(err) = self.refresh_account().await {
                    warn!(error = %err, "balance refresh failed");
                }
                Ok(outcome)
            }
            Err(err) => {
                warn!(error = %err, "message submission failed");
                {
                    let mut inner = self.inner.borrow_mut();
                    inner.in_flight = false;
                    inner.form.status = FormStatus::Failed {
                        reason: err.to_string(),
                    };
                    if err == WalletError::NotSignedIn {
                        inner.current_user = None;
                        inner.notice = Some(Notice::error("Your wallet session has expired. Sign in again."));
                    } else {
                        inner.notice = Some(Notice::error(format!("Failed to add message: {err}")));
                    }
                }
                self.changed();
                Err(err.into())
            }
        }
    }

    /// Ends the wallet session and unregisters the account observer.
    ///
    /// A mount still waiting on the wallet closes its session when it
    /// resumes and reports [`MountOutcome::Cancelled`].
    pub fn teardown(&self) {
        let session = {
            let mut inner = self.inner.borrow_mut();
            inner.epoch += 1;
            inner.phase = Phase::Uninitialized;
            inner.current_user = None;
            inner.session.take()
        };
        if let Some(session) = session {
            self.wallet.end_session(&session);
        }
        self.changed();
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.inner.borrow().epoch == epoch
    }

    fn cancel_mount(&self, session: &SessionHandle) -> MountOutcome {
        debug!("mount cancelled by teardown; closing session");
        self.wallet.end_session(session);
        MountOutcome::Cancelled
    }

    fn changed(&self) {
        let hook = self.inner.borrow().on_change.clone();
        if let Some(hook) = hook {
            hook();
        }
    }
}

/// Converts the donation field to a deposit; an empty field means no deposit.
pub fn donation_deposit(donation: &str) -> Result<u128, AmountError> {
    if donation.trim().is_empty() {
        return Ok(0);
    }
    parse_near_amount(donation)
}

pub fn add_message_call(text: &str, deposit: u128) -> FunctionCall {
    FunctionCall {
        method_name: ADD_MESSAGE.to_owned(),
        args: serde_json::json!({ "text": text }),
        gas: BOATLOAD_OF_GAS,
        deposit,
    }
}

/// Two `addMessage` transactions, suffixed `(1/2)` and `(2/2)`, each
/// carrying the full deposit.
pub fn split_message_batch(contract_id: &AccountId, text: &str, deposit: u128) -> Vec<Transaction> {
    (1..=2)
        .map(|part| {
            Transaction::function_call(
                contract_id.clone(),
                add_message_call(&format!("{text} ({part}/2)"), deposit),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests;
