use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use crate::error::ProviderError;
use crate::utils::error::compact_error_message;
use crate::utils::hex::{block_tag, normalize_address, parse_quantity};

const PAYLOAD_LOG_MAX_LEN: usize = 320;

// ---------------------------------------------------------------------------
// Block data
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BlockTransaction {
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainBlock {
    pub number: u64,
    pub transactions: Vec<BlockTransaction>,
}

impl ChainBlock {
    /// Every `from` and `to` in transaction order, normalized. Contract creations
    /// (no `to`) and malformed entries are skipped; duplicates are kept.
    pub fn candidate_addresses(&self) -> Vec<String> {
        self.transactions
            .iter()
            .flat_map(|tx| [tx.from.as_deref(), tx.to.as_deref()])
            .flatten()
            .filter_map(normalize_address)
            .collect()
    }
}

#[derive(Deserialize)]
struct RawBlock {
    #[serde(default)]
    number: Option<String>,
    #[serde(default)]
    transactions: Vec<Value>,
}

fn decode_block(requested: u64, result: Value) -> Result<Option<ChainBlock>, ProviderError> {
    if result.is_null() {
        return Ok(None);
    }
    let raw: RawBlock = serde_json::from_value(result)
        .map_err(|e| ProviderError::Malformed(format!("block {}: {e}", block_tag(requested))))?;
    let number = raw
        .number
        .as_deref()
        .and_then(parse_quantity)
        .unwrap_or(requested);
    // Hash-only transaction lists carry no addresses; they decode to empty entries.
    let transactions = raw
        .transactions
        .into_iter()
        .map(|tx| serde_json::from_value::<BlockTransaction>(tx).unwrap_or_default())
        .collect();
    Ok(Some(ChainBlock {
        number,
        transactions,
    }))
}

// ---------------------------------------------------------------------------
// Provider seam
// ---------------------------------------------------------------------------

/// Remote block-data provider. Each call is a single request with no retry;
/// retries happen in the polling loop.
#[async_trait]
pub trait ChainSource: Send + Sync {
    async fn latest_block_number(&self) -> Result<u64, ProviderError>;

    /// `Ok(None)` when the provider does not have the block yet.
    async fn block_by_number(&self, number: u64) -> Result<Option<ChainBlock>, ProviderError>;

    /// Hex bytecode, or `"0x"` when the address holds no code.
    async fn code_at(&self, address: &str) -> Result<String, ProviderError>;
}

// ---------------------------------------------------------------------------
// Explorer proxy API
// ---------------------------------------------------------------------------

/// Turn one proxy response into its `result` value.
///
/// Non-200 responses and payloads carrying a `status` (explorer-level error) or
/// an `error` (JSON-RPC error) field are fatal provider errors.
pub fn decode_proxy_payload(status: u16, reason: &str, body: &str) -> Result<Value, ProviderError> {
    if status != 200 {
        return Err(ProviderError::HttpStatus {
            status,
            reason: reason.to_string(),
        });
    }
    let payload: Value = serde_json::from_str(body).map_err(|e| {
        ProviderError::Malformed(format!(
            "{e}: {}",
            compact_error_message(body, PAYLOAD_LOG_MAX_LEN)
        ))
    })?;
    let Value::Object(mut fields) = payload else {
        return Err(ProviderError::Malformed(compact_error_message(
            body,
            PAYLOAD_LOG_MAX_LEN,
        )));
    };
    if fields.contains_key("status") || fields.contains_key("error") {
        return Err(ProviderError::Rejected(compact_error_message(
            &Value::Object(fields).to_string(),
            PAYLOAD_LOG_MAX_LEN,
        )));
    }
    fields
        .remove("result")
        .ok_or_else(|| ProviderError::Malformed("payload has no `result` field".to_string()))
}

pub struct ExplorerClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl ExplorerClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Transport(format!("http client init failed: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }

    async fn proxy_get(&self, action: &str, params: &[(&str, &str)]) -> Result<Value, ProviderError> {
        let mut query: Vec<(&str, &str)> = Vec::with_capacity(params.len() + 3);
        query.push(("module", "proxy"));
        query.push(("action", action));
        query.extend_from_slice(params);
        query.push(("apikey", self.api_key.as_str()));

        let response = self
            .client
            .get(&self.base_url)
            .query(&query)
            .send()
            .await
            .map_err(|e| {
                // reqwest embeds the URL (and with it the API key) in its errors.
                let err = ProviderError::Transport(format!("{action}: {}", e.without_url()));
                tracing::warn!("[EXPLORER] {}", err);
                err
            })?;

        let status = response.status();
        let reason = status.canonical_reason().unwrap_or("unknown").to_string();
        let body = response.text().await.map_err(|e| {
            let err = ProviderError::Transport(format!("{action}: {}", e.without_url()));
            tracing::warn!("[EXPLORER] {}", err);
            err
        })?;

        decode_proxy_payload(status.as_u16(), &reason, &body).inspect_err(|err| {
            tracing::error!("[EXPLORER] {} failed: {}", action, err);
        })
    }
}

#[async_trait]
impl ChainSource for ExplorerClient {
    async fn latest_block_number(&self) -> Result<u64, ProviderError> {
        let result = self.proxy_get("eth_blockNumber", &[]).await?;
        result
            .as_str()
            .and_then(parse_quantity)
            .ok_or_else(|| ProviderError::Malformed(format!("eth_blockNumber result: {result}")))
    }

    async fn block_by_number(&self, number: u64) -> Result<Option<ChainBlock>, ProviderError> {
        let tag = block_tag(number);
        let result = self
            .proxy_get(
                "eth_getBlockByNumber",
                &[("tag", tag.as_str()), ("boolean", "true")],
            )
            .await?;
        decode_block(number, result)
    }

    async fn code_at(&self, address: &str) -> Result<String, ProviderError> {
        let result = self
            .proxy_get("eth_getCode", &[("address", address), ("tag", "latest")])
            .await?;
        match result {
            Value::String(code) => Ok(code),
            other => Err(ProviderError::Malformed(format!(
                "eth_getCode result for {address}: {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_payload_yields_result() {
        let value = decode_proxy_payload(200, "OK", r#"{"jsonrpc":"2.0","id":83,"result":"0x10d4f"}"#)
            .expect("decode");
        assert_eq!(value, json!("0x10d4f"));
    }

    #[test]
    fn error_shapes_are_fatal() {
        let http = decode_proxy_payload(502, "Bad Gateway", "").expect_err("non-200");
        assert!(matches!(http, ProviderError::HttpStatus { status: 502, .. }));
        assert!(http.is_fatal());

        let rejected = decode_proxy_payload(
            200,
            "OK",
            r#"{"status":"0","message":"NOTOK","result":"Invalid API Key"}"#,
        )
        .expect_err("status field");
        assert!(matches!(rejected, ProviderError::Rejected(ref msg) if msg.contains("Invalid API Key")));

        let rpc_error = decode_proxy_payload(
            200,
            "OK",
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32602,"message":"invalid argument"}}"#,
        )
        .expect_err("error field");
        assert!(rpc_error.is_fatal());

        let garbage = decode_proxy_payload(200, "OK", "<html>").expect_err("not json");
        assert!(matches!(garbage, ProviderError::Malformed(_)));

        let no_result = decode_proxy_payload(200, "OK", r#"{"jsonrpc":"2.0"}"#).expect_err("no result");
        assert!(matches!(no_result, ProviderError::Malformed(_)));
    }

    #[test]
    fn block_decoding_extracts_from_and_to() {
        let result = json!({
            "number": "0x3",
            "transactions": [
                {"from": "0xAbC0000000000000000000000000000000000001", "to": "0xdef0000000000000000000000000000000000002"},
                {"from": "0xabc0000000000000000000000000000000000001", "to": null},
                {"from": "not-an-address", "to": "0xdef0000000000000000000000000000000000002"},
                "0x5c504ed432cb51138bcf09aa5e8a410dd4a1e204ef84bfed1be16dfba1b22060"
            ]
        });
        let block = decode_block(3, result).expect("decode").expect("present");
        assert_eq!(block.number, 3);
        assert_eq!(block.transactions.len(), 4);
        assert_eq!(
            block.candidate_addresses(),
            vec![
                "0xabc0000000000000000000000000000000000001".to_string(),
                "0xdef0000000000000000000000000000000000002".to_string(),
                "0xabc0000000000000000000000000000000000001".to_string(),
                "0xdef0000000000000000000000000000000000002".to_string(),
            ]
        );
    }

    #[test]
    fn null_block_means_not_yet_available() {
        assert_eq!(decode_block(7, Value::Null).expect("decode"), None);
    }
}
