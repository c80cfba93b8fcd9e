use serde::{Deserialize, Serialize};
use std::fmt;

pub mod amount;

pub use amount::{AmountError, format_near_amount, parse_near_amount};

/// Contract method returning every stored message, oldest first.
pub const GET_MESSAGES: &str = "getMessages";

/// Contract method appending one message.
pub const ADD_MESSAGE: &str = "addMessage";

/// Gas attached to every `addMessage` call (30 Tgas).
pub const BOATLOAD_OF_GAS: u64 = 30_000_000_000_000;

/// Value the donation field is reset to after a successful submission.
pub const SUGGESTED_DONATION: &str = "0";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct AccountId(pub String);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkId(pub String);

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Signed-in account as shown in the header and form.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CurrentUser {
    pub account_id: AccountId,
    /// Available balance in yoctoNEAR.
    pub balance: String,
}

/// One guest book entry as returned by `getMessages`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub sender: String,
    pub text: String,
    #[serde(default)]
    pub premium: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AddMessageArgs {
    pub text: String,
}

/// Form contents captured at submit time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftSubmission {
    pub text: String,
    pub donation: String,
    pub send_as_two: bool,
}

impl Default for DraftSubmission {
    fn default() -> Self {
        Self {
            text: String::new(),
            donation: SUGGESTED_DONATION.to_owned(),
            send_as_two: false,
        }
    }
}

/// A single state-changing contract invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FunctionCall {
    pub method_name: String,
    pub args: serde_json::Value,
    #[serde(with = "decimal_string")]
    pub gas: u64,
    #[serde(with = "decimal_string")]
    pub deposit: u128,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "params")]
pub enum Action {
    FunctionCall(FunctionCall),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub receiver_id: AccountId,
    pub actions: Vec<Action>,
}

impl Transaction {
    pub fn function_call(receiver_id: AccountId, call: FunctionCall) -> Self {
        Self {
            receiver_id,
            actions: vec![Action::FunctionCall(call)],
        }
    }
}

/// Result of a confirmed state-changing request.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CallOutcome {
    pub transaction_hashes: Vec<String>,
}

/// Gas and deposits travel as decimal strings; neither survives a JS number.
pub mod decimal_string {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};
    use std::fmt::Display;
    use std::str::FromStr;

    pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: Display,
        S: Serializer,
    {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        T: FromStr,
        T::Err: Display,
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(D::Error::custom)
    }
}
