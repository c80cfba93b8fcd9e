use super::*;
use async_trait::async_trait;
use gb_api_types::amount::NEAR_NOMINATION;
use gb_wallet_client::InMemoryWallet;
use std::cell::Cell;
use tokio::sync::Notify;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn message(sender: &str, text: &str) -> Message {
    Message {
        sender: sender.to_owned(),
        text: text.to_owned(),
        premium: false,
    }
}

fn controller(wallet: InMemoryWallet) -> GuestBookController<InMemoryWallet> {
    init_tracing();
    GuestBookController::new(NetworkConfig::testnet(), Rc::new(wallet))
}

async fn signed_in_controller() -> anyhow::Result<GuestBookController<InMemoryWallet>> {
    let wallet = InMemoryWallet::new("alice.testnet", 10 * NEAR_NOMINATION)
        .signed_in()
        .with_messages(vec![message("bob.testnet", "first")]);
    let controller = controller(wallet);
    controller.mount().await?;
    Ok(controller)
}

/// Holds `call`/`call_batch`, and `init_session` when `gate_init` is set,
/// until the gate is opened.
struct GatedWallet {
    inner: InMemoryWallet,
    gate: Notify,
    gate_init: bool,
}

impl GatedWallet {
    fn calls(inner: InMemoryWallet) -> Rc<Self> {
        Rc::new(Self {
            inner,
            gate: Notify::new(),
            gate_init: false,
        })
    }

    fn init(inner: InMemoryWallet) -> Rc<Self> {
        Rc::new(Self {
            inner,
            gate: Notify::new(),
            gate_init: true,
        })
    }
}

#[async_trait(?Send)]
impl WalletAdapter for GatedWallet {
    async fn init_session(
        &self,
        config: &NetworkConfig,
        observer: Rc<dyn AccountObserver>,
    ) -> Result<SessionHandle, WalletError> {
        if self.gate_init {
            self.gate.notified().await;
        }
        self.inner.init_session(config, observer).await
    }

    fn end_session(&self, session: &SessionHandle) {
        self.inner.end_session(session)
    }

    async fn current_account(&self, session: &SessionHandle) -> Result<Option<CurrentUser>, WalletError> {
        self.inner.current_account(session).await
    }

    async fn view(
        &self,
        contract_id: &AccountId,
        method_name: &str,
        args: serde_json::Value,
    ) -> Result<serde_json::Value, WalletError> {
        self.inner.view(contract_id, method_name, args).await
    }

    async fn call(&self, contract_id: &AccountId, call: FunctionCall) -> Result<CallOutcome, WalletError> {
        self.gate.notified().await;
        self.inner.call(contract_id, call).await
    }

    async fn call_batch(&self, transactions: Vec<Transaction>) -> Result<CallOutcome, WalletError> {
        self.gate.notified().await;
        self.inner.call_batch(transactions).await
    }

    async fn sign_in(&self) -> Result<(), WalletError> {
        self.inner.sign_in().await
    }

    async fn sign_out(&self) -> Result<(), WalletError> {
        self.inner.sign_out().await
    }
}

#[tokio::test]
async fn mount_is_idempotent() -> anyhow::Result<()> {
    let controller = controller(InMemoryWallet::new("alice.testnet", 0));

    let (first, second) = tokio::join!(controller.mount(), controller.mount());

    assert_eq!(first?, MountOutcome::Mounted);
    assert_eq!(second?, MountOutcome::AlreadyMounted);
    assert_eq!(controller.mount().await?, MountOutcome::AlreadyMounted);
    assert_eq!(controller.wallet().init_calls(), 1);
    assert_eq!(controller.wallet().view_calls(), 1);
    Ok(())
}

#[tokio::test]
async fn mount_while_initializing_is_ignored() -> anyhow::Result<()> {
    init_tracing();
    let wallet = GatedWallet::init(InMemoryWallet::new("alice.testnet", 0).signed_in());
    let controller = GuestBookController::new(NetworkConfig::testnet(), Rc::clone(&wallet));

    let (first, second) = tokio::join!(controller.mount(), async {
        assert_eq!(controller.state(), ControllerState::Initializing);
        let second = controller.mount().await;
        assert_eq!(wallet.inner.init_calls(), 0);
        wallet.gate.notify_one();
        second
    });

    assert_eq!(second?, MountOutcome::AlreadyMounted);
    assert_eq!(first?, MountOutcome::Mounted);
    assert_eq!(wallet.inner.init_calls(), 1);
    assert_eq!(controller.state(), ControllerState::SignedIn);
    Ok(())
}

#[tokio::test]
async fn teardown_during_mount_closes_session() -> anyhow::Result<()> {
    init_tracing();
    let wallet = GatedWallet::init(InMemoryWallet::new("alice.testnet", 0).signed_in());
    let controller = GuestBookController::new(NetworkConfig::testnet(), Rc::clone(&wallet));

    let (mounted, ()) = tokio::join!(controller.mount(), async {
        controller.teardown();
        wallet.gate.notify_one();
    });

    assert_eq!(mounted?, MountOutcome::Cancelled);
    assert_eq!(wallet.inner.init_calls(), 1);
    assert_eq!(wallet.inner.observer_count(), 0);
    assert_eq!(controller.state(), ControllerState::Uninitialized);
    assert_eq!(controller.current_user(), None);
    assert_eq!(wallet.inner.view_calls(), 0);

    wallet.gate.notify_one();
    assert_eq!(controller.mount().await?, MountOutcome::Mounted);
    assert_eq!(controller.state(), ControllerState::SignedIn);
    assert_eq!(wallet.inner.observer_count(), 1);
    Ok(())
}

#[tokio::test]
async fn mount_reports_signed_in_account_and_messages() -> anyhow::Result<()> {
    let controller = signed_in_controller().await?;

    assert_eq!(controller.state(), ControllerState::SignedIn);
    let user = controller.current_user().expect("signed in");
    assert_eq!(user.account_id.0, "alice.testnet");
    assert_eq!(user.balance, (10 * NEAR_NOMINATION).to_string());
    assert_eq!(controller.messages(), vec![message("bob.testnet", "first")]);
    assert!(controller.snapshot().show_messages());
    Ok(())
}

#[tokio::test]
async fn mount_without_account_is_signed_out() -> anyhow::Result<()> {
    let controller = controller(InMemoryWallet::new("alice.testnet", 0).with_messages(vec![message("bob.testnet", "hi")]));
    controller.mount().await?;

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.state, ControllerState::SignedOut);
    assert!(snapshot.show_sign_in_button());
    assert!(!snapshot.show_form());
    assert!(!snapshot.show_messages());
    Ok(())
}

#[tokio::test]
async fn session_init_failure_leaves_page_not_ready() -> anyhow::Result<()> {
    let wallet = InMemoryWallet::new("alice.testnet", 0);
    wallet.fail_next_init(WalletError::Provider("wallet selector unreachable".to_owned()));
    let controller = controller(wallet);

    let err = controller.mount().await.unwrap_err();

    assert!(matches!(err, SessionError::Init(WalletError::Provider(_))));
    assert_eq!(controller.state(), ControllerState::SessionFailed);
    assert!(!controller.snapshot().show_sign_in_button());
    assert_eq!(controller.wallet().view_calls(), 0);
    Ok(())
}

#[tokio::test]
async fn sign_in_notification_switches_to_signed_in() -> anyhow::Result<()> {
    let controller = controller(InMemoryWallet::new("alice.testnet", 0));
    let renders = Rc::new(Cell::new(0));
    let counter = Rc::clone(&renders);
    controller.set_on_change(move || counter.set(counter.get() + 1));
    controller.mount().await?;
    let before = renders.get();

    controller.sign_in().await?;

    assert_eq!(controller.state(), ControllerState::SignedIn);
    assert!(renders.get() > before);
    Ok(())
}

#[tokio::test]
async fn donation_is_converted_to_yocto() -> anyhow::Result<()> {
    let controller = signed_in_controller().await?;
    controller.edit_draft(|draft| {
        draft.text = "thanks".to_owned();
        draft.donation = "1".to_owned();
    });

    controller.submit().await?;

    let calls = controller.wallet().calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].deposit, NEAR_NOMINATION);
    assert_eq!(calls[0].gas, BOATLOAD_OF_GAS);
    assert_eq!(calls[0].args, serde_json::json!({ "text": "thanks" }));
    Ok(())
}

#[tokio::test]
async fn send_as_two_batches_both_halves() -> anyhow::Result<()> {
    let controller = signed_in_controller().await?;
    controller.edit_draft(|draft| {
        draft.text = "hello".to_owned();
        draft.donation = "0.5".to_owned();
        draft.send_as_two = true;
    });

    let outcome = controller.submit().await?;

    let batches = controller.wallet().batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(outcome.transaction_hashes.len(), 2);
    let expected = split_message_batch(&controller.config().contract_id, "hello", NEAR_NOMINATION / 2);
    assert_eq!(batches[0], expected);

    let texts: Vec<_> = controller.wallet().calls().iter().map(|c| c.args["text"].clone()).collect();
    assert_eq!(texts, vec!["hello (1/2)", "hello (2/2)"]);
    assert!(controller.wallet().calls().iter().all(|c| c.deposit == NEAR_NOMINATION / 2));
    Ok(())
}

#[tokio::test]
async fn successful_submit_resets_form_and_refetches() -> anyhow::Result<()> {
    let controller = signed_in_controller().await?;
    controller.edit_draft(|draft| {
        draft.text = "gm".to_owned();
        draft.donation = "2".to_owned();
    });

    controller.submit().await?;

    let form = controller.form();
    assert_eq!(form.draft.text, "");
    assert_eq!(form.draft.donation, SUGGESTED_DONATION);
    assert_eq!(form.status, FormStatus::Idle);

    let messages = controller.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(
        messages[1],
        Message {
            sender: "alice.testnet".to_owned(),
            text: "gm".to_owned(),
            premium: true,
        }
    );
    let balance = controller.current_user().expect("signed in").balance;
    assert_eq!(balance, (8 * NEAR_NOMINATION).to_string());
    Ok(())
}

#[tokio::test]
async fn failed_submit_keeps_list_and_surfaces_notice() -> anyhow::Result<()> {
    let controller = signed_in_controller().await?;
    let before = controller.messages();
    controller.edit_draft(|draft| draft.text = "will fail".to_owned());
    controller
        .wallet()
        .fail_next_call(WalletError::Rejected("user rejected signing".to_owned()));

    let err = controller.submit().await.unwrap_err();

    assert!(matches!(err, SubmitError::Wallet(WalletError::Rejected(_))));
    assert_eq!(controller.messages(), before);
    let form = controller.form();
    assert_eq!(form.draft.text, "will fail");
    assert!(matches!(form.status, FormStatus::Failed { .. }));
    assert!(!form.is_disabled());
    let notice = controller.notice().expect("notice raised");
    assert!(notice.text.contains("user rejected signing"));

    controller.dismiss_notice();
    assert_eq!(controller.form().status, FormStatus::Idle);
    assert_eq!(controller.notice(), None);
    Ok(())
}

#[tokio::test]
async fn malformed_donation_fails_without_calling() -> anyhow::Result<()> {
    let controller = signed_in_controller().await?;
    controller.edit_draft(|draft| {
        draft.text = "hi".to_owned();
        draft.donation = "1.2.3".to_owned();
    });

    let err = controller.submit().await.unwrap_err();

    assert!(matches!(err, SubmitError::InvalidDonation(AmountError::Malformed(_))));
    assert!(controller.wallet().calls().is_empty());
    assert_eq!(controller.form().draft.text, "hi");
    Ok(())
}

#[tokio::test]
async fn empty_donation_means_no_deposit() -> anyhow::Result<()> {
    let controller = signed_in_controller().await?;
    controller.edit_draft(|draft| {
        draft.text = "free".to_owned();
        draft.donation = " ".to_owned();
    });

    controller.submit().await?;

    assert_eq!(controller.wallet().calls()[0].deposit, 0);
    assert!(!controller.messages()[1].premium);
    Ok(())
}

#[tokio::test]
async fn overlapping_submit_is_rejected() -> anyhow::Result<()> {
    init_tracing();
    let wallet = GatedWallet::calls(InMemoryWallet::new("alice.testnet", NEAR_NOMINATION).signed_in());
    let controller = GuestBookController::new(NetworkConfig::testnet(), Rc::clone(&wallet));
    controller.mount().await?;
    controller.edit_draft(|draft| draft.text = "once".to_owned());

    let (first, second) = tokio::join!(controller.submit(), async {
        assert!(controller.form().is_disabled());
        let result = controller.submit().await;
        wallet.gate.notify_one();
        result
    });

    first?;
    assert_eq!(second, Err(SubmitError::InFlight));
    assert_eq!(wallet.inner.calls().len(), 1);
    Ok(())
}

#[tokio::test]
async fn stale_session_is_treated_as_signed_out() -> anyhow::Result<()> {
    let controller = signed_in_controller().await?;
    controller.edit_draft(|draft| draft.text = "late".to_owned());
    controller.wallet().expire_session();

    let err = controller.submit().await.unwrap_err();

    assert_eq!(err, SubmitError::Wallet(WalletError::NotSignedIn));
    assert_eq!(controller.state(), ControllerState::SignedOut);
    assert!(controller.snapshot().show_sign_in_button());
    Ok(())
}

#[tokio::test]
async fn sign_out_hides_form_and_messages() -> anyhow::Result<()> {
    let controller = signed_in_controller().await?;
    assert!(controller.snapshot().show_form());

    controller.sign_out().await?;

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.current_user, None);
    assert!(!snapshot.show_form());
    assert!(!snapshot.show_messages());
    assert_eq!(snapshot.messages.len(), 1);
    assert_eq!(controller.submit().await, Err(SubmitError::NotSignedIn));
    Ok(())
}

#[tokio::test]
async fn teardown_unregisters_observer() -> anyhow::Result<()> {
    let controller = signed_in_controller().await?;
    assert_eq!(controller.wallet().observer_count(), 1);

    controller.teardown();

    assert_eq!(controller.wallet().observer_count(), 0);
    assert_eq!(controller.state(), ControllerState::Uninitialized);
    Ok(())
}

#[test]
fn batch_texts_are_numbered() {
    let batch = split_message_batch(&AccountId::from("guest-book.testnet"), "hello", 7);
    assert_eq!(batch.len(), 2);
    for (index, tx) in batch.iter().enumerate() {
        assert_eq!(tx.receiver_id.0, "guest-book.testnet");
        let gb_api_types::Action::FunctionCall(call) = &tx.actions[0];
        assert_eq!(call.args["text"], format!("hello ({}/2)", index + 1));
        assert_eq!(call.deposit, 7);
    }
}
