use anyhow::{Context, Result, anyhow};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use gb_api_types::AccountId;
use gb_config::NetworkConfig;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// yoctoNEAR locked per byte of account storage.
pub const STORAGE_PRICE_PER_BYTE: u128 = 10_000_000_000_000_000_000;

/// Read-only access to a NEAR JSON-RPC node.
///
/// Reads `NEAR_RPC_URL` from the environment at construction time and falls
/// back to the network's public node.
#[derive(Clone)]
pub struct NearRpcClient {
    endpoint: String,
    http: reqwest::Client,
}

impl NearRpcClient {
    pub fn new(config: &NetworkConfig) -> Self {
        let endpoint = std::env::var("NEAR_RPC_URL")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| config.node_url.clone());
        Self::with_endpoint(endpoint)
    }

    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_owned(),
            http: reqwest::Client::new(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Calls a view method and decodes its JSON return value.
    pub async fn view_function(
        &self,
        contract_id: &AccountId,
        method_name: &str,
        args: &serde_json::Value,
    ) -> Result<serde_json::Value> {
        let args = serde_json::to_vec(args).context("encode view args")?;
        let params = QueryParams::CallFunction {
            finality: "final",
            account_id: contract_id.0.clone(),
            method_name: method_name.to_owned(),
            args_base64: STANDARD.encode(args),
        };

        let result = self.query(params).await?;
        let value = decode_call_result(result)
            .with_context(|| format!("decode {contract_id}.{method_name}"))?;
        debug!(contract = %contract_id, method = method_name, "view call complete");
        Ok(value)
    }

    pub async fn view_account(&self, account_id: &AccountId) -> Result<AccountView> {
        let params = QueryParams::ViewAccount {
            finality: "final",
            account_id: account_id.0.clone(),
        };
        let result = self.query(params).await?;
        serde_json::from_value(result).with_context(|| format!("decode account {account_id}"))
    }

    /// Balance the account can spend right now, in yoctoNEAR.
    pub async fn available_balance(&self, account_id: &AccountId) -> Result<u128> {
        let view = self.view_account(account_id).await?;
        view.available()
    }

    async fn query(&self, params: QueryParams) -> Result<serde_json::Value> {
        let body = RpcRequest {
            jsonrpc: "2.0",
            id: "dontcare",
            method: "query",
            params,
        };

        let response = self
            .http
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .context("near rpc transport")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("near rpc HTTP {status}: {text}");
        }

        let envelope: RpcResponse = response.json().await.context("near rpc parse")?;
        envelope.into_result()
    }
}

// ── JSON-RPC wire types ──

#[derive(Debug, Serialize)]
struct RpcRequest {
    jsonrpc: &'static str,
    id: &'static str,
    method: &'static str,
    params: QueryParams,
}

#[derive(Debug, Serialize)]
#[serde(tag = "request_type", rename_all = "snake_case")]
enum QueryParams {
    CallFunction {
        finality: &'static str,
        account_id: String,
        method_name: String,
        args_base64: String,
    },
    ViewAccount {
        finality: &'static str,
        account_id: String,
    },
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<serde_json::Value>,
}

impl RpcResponse {
    fn into_result(self) -> Result<serde_json::Value> {
        if let Some(err) = self.error {
            let name = err.name.unwrap_or_else(|| "RPC_ERROR".to_owned());
            let detail = err
                .data
                .map(|data| data.to_string())
                .or(err.message)
                .unwrap_or_default();
            return Err(anyhow!("near rpc {name}: {detail}"));
        }

        let result = self.result.ok_or_else(|| anyhow!("near rpc response has no result"))?;
        // Older nodes report contract errors inside a successful result.
        if let Some(error) = result.get("error").and_then(|value| value.as_str()) {
            return Err(anyhow!("near rpc query error: {error}"));
        }
        Ok(result)
    }
}

/// Account state as reported by `view_account`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct AccountView {
    pub amount: String,
    pub locked: String,
    pub storage_usage: u64,
}

impl AccountView {
    /// `(amount + locked) - max(locked, storage cost)`, never negative.
    ///
    /// `amount` excludes staked tokens, so the stake only reduces the
    /// balance by whatever storage cost it does not already cover.
    pub fn available(&self) -> Result<u128> {
        let amount: u128 = self.amount.parse().context("account amount")?;
        let locked: u128 = self.locked.parse().context("account locked")?;
        let storage = u128::from(self.storage_usage).saturating_mul(STORAGE_PRICE_PER_BYTE);
        let total = amount.saturating_add(locked);
        let reserved = locked.max(storage);
        if reserved > total {
            warn!(%total, %reserved, "account reserve exceeds balance");
        }
        Ok(total.saturating_sub(reserved))
    }
}

fn decode_call_result(result: serde_json::Value) -> Result<serde_json::Value> {
    let bytes: Vec<u8> = serde_json::from_value(
        result
            .get("result")
            .cloned()
            .ok_or_else(|| anyhow!("call_function result missing `result` bytes"))?,
    )
    .context("call_function result is not a byte array")?;

    if bytes.is_empty() {
        return Ok(serde_json::Value::Null);
    }
    serde_json::from_slice(&bytes).context("call_function result is not JSON")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn call_function_params_encode_request_type() {
        let params = QueryParams::CallFunction {
            finality: "final",
            account_id: "guest-book.testnet".to_owned(),
            method_name: "getMessages".to_owned(),
            args_base64: STANDARD.encode(b"{}"),
        };
        let value = serde_json::to_value(&params).unwrap();
        assert_eq!(value["request_type"], "call_function");
        assert_eq!(value["args_base64"], "e30=");
        assert_eq!(value["method_name"], "getMessages");
    }

    #[test]
    fn decodes_call_result_bytes() {
        let payload = br#"[{"sender":"bob.testnet","text":"hey","premium":false}]"#;
        let result = json!({ "result": payload.to_vec(), "logs": [], "block_height": 1 });

        let value = decode_call_result(result).unwrap();
        assert_eq!(value[0]["sender"], "bob.testnet");
    }

    #[test]
    fn empty_call_result_is_null() {
        let value = decode_call_result(json!({ "result": [] })).unwrap();
        assert!(value.is_null());
    }

    #[test]
    fn rpc_errors_surface() {
        let envelope: RpcResponse = serde_json::from_value(json!({
            "error": { "name": "HANDLER_ERROR", "data": "UNKNOWN_ACCOUNT" }
        }))
        .unwrap();
        let err = envelope.into_result().unwrap_err();
        assert!(err.to_string().contains("HANDLER_ERROR"));

        let legacy: RpcResponse = serde_json::from_value(json!({
            "result": { "error": "wasm execution failed", "logs": [] }
        }))
        .unwrap();
        assert!(legacy.into_result().is_err());
    }

    #[test]
    fn available_balance_subtracts_storage_reserve() {
        let view = AccountView {
            amount: "5000000000000000000000000".to_owned(),
            locked: "0".to_owned(),
            storage_usage: 100,
        };
        assert_eq!(view.available().unwrap(), 5_000_000_000_000_000_000_000_000 - 100 * STORAGE_PRICE_PER_BYTE);

        let staked = AccountView {
            amount: "10".to_owned(),
            locked: "20".to_owned(),
            storage_usage: 0,
        };
        assert_eq!(staked.available().unwrap(), 10);

        let staked_below_storage = AccountView {
            amount: "5000000000000000000000000".to_owned(),
            locked: "10".to_owned(),
            storage_usage: 100,
        };
        assert_eq!(
            staked_below_storage.available().unwrap(),
            5_000_000_000_000_000_000_000_000 + 10 - 100 * STORAGE_PRICE_PER_BYTE
        );

        let underfunded = AccountView {
            amount: "1".to_owned(),
            locked: "0".to_owned(),
            storage_usage: 100,
        };
        assert_eq!(underfunded.available().unwrap(), 0);
    }

    #[test]
    fn endpoint_is_normalised() {
        let client = NearRpcClient::with_endpoint("http://localhost:3030/");
        assert_eq!(client.endpoint(), "http://localhost:3030");
    }
}
