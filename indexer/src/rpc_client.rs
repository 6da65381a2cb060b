//! JSON-RPC client for the claim chain full node

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::trace;

use claim_hashes::Hash;
use rpc_core::{BlockResponse, ClaimNameEntry, ClaimsForName, MempoolEntry, RawTransaction, RpcApi, RpcError};

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: serde_json::Value,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

pub struct RpcClient {
    client: reqwest::Client,
    url: Url,
    credentials: Option<(String, String)>,
    next_id: AtomicU64,
}

impl RpcClient {
    /// Credentials embedded in `url` are sent as basic auth
    pub fn new(url: &str, timeout: Duration) -> Result<Self, RpcError> {
        let mut url = Url::parse(url).map_err(|e| RpcError::Internal(format!("Invalid RPC url: {}", e)))?;
        let credentials = if url.username().is_empty() {
            None
        } else {
            let user = url.username().to_string();
            let password = url.password().unwrap_or_default().to_string();
            let _ = url.set_username("");
            let _ = url.set_password(None);
            Some((user, password))
        };

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RpcError::Internal(format!("HTTP client setup failed: {}", e)))?;

        Ok(Self { client, url, credentials, next_id: AtomicU64::new(1) })
    }

    async fn call_method<T: DeserializeOwned>(&self, method: &str, params: serde_json::Value) -> Result<T, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest { jsonrpc: "1.0", id, method, params };
        trace!("rpc #{} {}", id, method);

        let mut builder = self.client.post(self.url.clone()).json(&request);
        if let Some((user, password)) = &self.credentials {
            builder = builder.basic_auth(user, Some(password));
        }
        let response = builder.send().await.map_err(|e| RpcError::Network(format!("{} failed: {}", method, e)))?;

        // The node answers errors with HTTP 500 and a JSON body
        let status = response.status();
        let body = response.bytes().await.map_err(|e| RpcError::Network(format!("{} body: {}", method, e)))?;
        let parsed: JsonRpcResponse = serde_json::from_slice(&body).map_err(|e| {
            if status.is_success() {
                RpcError::Decode(format!("{} response: {}", method, e))
            } else {
                RpcError::Network(format!("{} returned HTTP {}", method, status))
            }
        })?;

        if let Some(error) = parsed.error {
            return Err(RpcError::Rpc { code: error.code, message: error.message });
        }
        serde_json::from_value(parsed.result).map_err(|e| RpcError::Decode(format!("{} result: {}", method, e)))
    }
}

#[async_trait]
impl RpcApi for RpcClient {
    async fn get_block_count(&self) -> Result<u64, RpcError> {
        self.call_method("getblockcount", serde_json::json!([])).await
    }

    async fn get_block_hash(&self, height: u64) -> Result<Hash, RpcError> {
        self.call_method("getblockhash", serde_json::json!([height])).await
    }

    async fn get_block(&self, hash: &Hash) -> Result<BlockResponse, RpcError> {
        self.call_method("getblock", serde_json::json!([hash.to_hex()])).await
    }

    async fn get_raw_transaction(&self, txid: &Hash) -> Result<RawTransaction, RpcError> {
        self.call_method("getrawtransaction", serde_json::json!([txid.to_hex(), 1])).await
    }

    async fn get_raw_mempool(&self) -> Result<HashMap<Hash, MempoolEntry>, RpcError> {
        self.call_method("getrawmempool", serde_json::json!([true])).await
    }

    async fn get_claims_in_trie(&self) -> Result<Vec<ClaimNameEntry>, RpcError> {
        self.call_method("getclaimsintrie", serde_json::json!([])).await
    }

    async fn get_claims_for_name(&self, name: &str) -> Result<ClaimsForName, RpcError> {
        self.call_method("getclaimsforname", serde_json::json!([name])).await
    }
}
