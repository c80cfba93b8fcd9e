use gb_api_types::{AccountId, NetworkId};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

pub const MAINNET: &str = "mainnet";
pub const TESTNET: &str = "testnet";

/// Network used when the page URL carries no `network` parameter.
pub const DEFAULT_NETWORK: &str = MAINNET;

const NETH_URL: &str = "https://neardefi.github.io/neth/";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown network `{0}`; expected `mainnet` or `testnet`")]
    UnknownNetwork(String),
}

/// Endpoints and deployed contract for one network.
///
/// Resolved once per page load and passed by value into the controller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkConfig {
    pub network_id: NetworkId,
    pub contract_id: AccountId,
    pub node_url: String,
    pub wallet_url: String,
    pub helper_url: String,
    pub explorer_url: String,
    pub neth_url: String,
}

impl NetworkConfig {
    pub fn mainnet() -> Self {
        Self {
            network_id: NetworkId(MAINNET.to_owned()),
            contract_id: AccountId("guest-book.near".to_owned()),
            node_url: "https://rpc.mainnet.near.org".to_owned(),
            wallet_url: "https://app.mynearwallet.com".to_owned(),
            helper_url: "https://helper.mainnet.near.org".to_owned(),
            explorer_url: "https://explorer.near.org".to_owned(),
            neth_url: NETH_URL.to_owned(),
        }
    }

    pub fn testnet() -> Self {
        Self {
            network_id: NetworkId(TESTNET.to_owned()),
            contract_id: AccountId("guest-book.testnet".to_owned()),
            node_url: "https://rpc.testnet.near.org".to_owned(),
            wallet_url: "https://testnet.mynearwallet.com".to_owned(),
            helper_url: "https://helper.testnet.near.org".to_owned(),
            explorer_url: "https://explorer.testnet.near.org".to_owned(),
            neth_url: format!("{NETH_URL}?network=testnet"),
        }
    }

    /// Points the config at a locally deployed contract.
    pub fn with_contract_id(mut self, contract_id: impl Into<String>) -> Self {
        self.contract_id = AccountId(contract_id.into());
        self
    }

    pub fn is_mainnet(&self) -> bool {
        self.network_id.0 == MAINNET
    }

    /// Name of the network the header's switch link leads to.
    pub fn other_network(&self) -> &'static str {
        if self.is_mainnet() { TESTNET } else { MAINNET }
    }
}

/// Resolves the network hint taken from the page URL.
///
/// An absent or blank hint selects mainnet. Unknown names are rejected so a
/// typo never routes transactions to the wrong network.
pub fn resolve_config(hint: Option<&str>) -> Result<NetworkConfig, ConfigError> {
    let hint = hint.map(str::trim).filter(|value| !value.is_empty());
    let name = hint.unwrap_or(DEFAULT_NETWORK).to_ascii_lowercase();

    let config = match name.as_str() {
        MAINNET => NetworkConfig::mainnet(),
        TESTNET => NetworkConfig::testnet(),
        _ => return Err(ConfigError::UnknownNetwork(hint.unwrap_or_default().to_owned())),
    };

    debug!(network = %config.network_id, contract = %config.contract_id, "resolved network config");
    Ok(config)
}

/// Extracts the `network` parameter from a URL query string such as
/// `?network=testnet&foo=bar`.
pub fn network_hint_from_query(search: &str) -> Option<String> {
    search
        .trim_start_matches('?')
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == "network")
        .map(|(_, value)| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

/// Link target for switching to the other network from `current_href`.
pub fn switch_network_href(config: &NetworkConfig, current_href: &str) -> String {
    let base = current_href.split('?').next().unwrap_or(current_href);
    if config.is_mainnet() {
        format!("{base}?network={TESTNET}")
    } else {
        base.to_owned()
    }
}
