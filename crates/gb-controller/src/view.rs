//! Controller state as the presentation layer sees it.

use gb_api_types::{CurrentUser, DraftSubmission, Message, NetworkId};

/// Lifecycle of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Uninitialized,
    Initializing,
    SignedOut,
    SignedIn,
    /// The wallet never became ready; the page stays in its loading state.
    SessionFailed,
}

impl ControllerState {
    pub fn is_ready(self) -> bool {
        matches!(self, Self::SignedOut | Self::SignedIn)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FormStatus {
    #[default]
    Idle,
    Submitting,
    /// Last submission failed. Inputs are editable again and the draft kept.
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FormState {
    pub draft: DraftSubmission,
    pub status: FormStatus,
}

impl FormState {
    pub fn is_disabled(&self) -> bool {
        self.status == FormStatus::Submitting
    }
}

/// User-visible error the page renders as a dismissable banner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub text: String,
}

impl Notice {
    pub fn error(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Everything needed to render one frame of the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub state: ControllerState,
    pub network_id: NetworkId,
    pub current_user: Option<CurrentUser>,
    pub messages: Vec<Message>,
    pub form: FormState,
    pub notice: Option<Notice>,
}

impl Snapshot {
    pub fn show_form(&self) -> bool {
        self.current_user.is_some()
    }

    pub fn show_sign_in_button(&self) -> bool {
        self.current_user.is_none() && self.state.is_ready()
    }

    pub fn show_messages(&self) -> bool {
        self.current_user.is_some() && !self.messages.is_empty()
    }
}
