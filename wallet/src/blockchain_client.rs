/// Solana JSON-RPC client
///
/// [`ChainRpc`] is the read/submit capability the registry, executor and
/// pollers depend on; [`BlockchainClient`] implements it over HTTP against
/// a single endpoint.
use crate::api::types::{
    BlockhashInfo, Commitment, KeyedTokenAccount, ParsedTransaction, RpcResponse, SignatureInfo,
    SignatureStatus, TokenAccount,
};
use crate::blockchain::{Address, Amount};
use crate::errors::{WalletError, WalletResult};
use crate::transaction::TOKEN_PROGRAM_ID;
use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Chain-node capability consumed by the wallet.
#[async_trait]
pub trait ChainRpc: Send + Sync {
    /// URL of the node this handle talks to.
    fn endpoint(&self) -> &str;

    async fn get_balance(&self, address: &Address) -> WalletResult<Amount>;

    async fn get_latest_blockhash(&self) -> WalletResult<BlockhashInfo>;

    /// Submit a fully signed wire transaction; returns its signature.
    async fn send_transaction(&self, wire: &[u8]) -> WalletResult<String>;

    /// `None` while the node has not seen the signature yet.
    async fn get_signature_status(&self, signature: &str)
        -> WalletResult<Option<SignatureStatus>>;

    async fn get_block_height(&self) -> WalletResult<u64>;

    async fn get_token_accounts_by_owner(&self, owner: &Address)
        -> WalletResult<Vec<TokenAccount>>;

    async fn get_minimum_balance_for_rent_exemption(&self, data_len: u64)
        -> WalletResult<Amount>;

    async fn get_signatures_for_address(
        &self,
        address: &Address,
        limit: usize,
    ) -> WalletResult<Vec<SignatureInfo>>;

    async fn get_parsed_transaction(&self, signature: &str)
        -> WalletResult<Option<ParsedTransaction>>;
}

/// HTTP client for one RPC endpoint
pub struct BlockchainClient {
    client: Client,
    endpoint: String,
    commitment: Commitment,
    next_id: AtomicU64,
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    #[serde(default = "Option::default")]
    result: Option<T>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

impl BlockchainClient {
    pub fn new(endpoint: impl Into<String>, commitment: Commitment) -> WalletResult<Self> {
        Self::with_timeout(endpoint, commitment, Duration::from_secs(30))
    }

    pub fn with_timeout(
        endpoint: impl Into<String>,
        commitment: Commitment,
        timeout: Duration,
    ) -> WalletResult<Self> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            WalletError::NetworkError(format!("Failed to create HTTP client: {}", e))
        })?;

        Ok(BlockchainClient {
            client,
            endpoint: endpoint.into(),
            commitment,
            next_id: AtomicU64::new(1),
        })
    }

    /// Call a method whose result may legitimately be `null`.
    async fn rpc_call_nullable<T: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> WalletResult<Option<T>> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        log::debug!("rpc {} -> {}", method, self.endpoint);
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(WalletError::NetworkError(format!(
                "HTTP error {} from {}",
                response.status(),
                self.endpoint
            )));
        }

        let rpc_response: JsonRpcResponse<T> = response.json().await.map_err(|e| {
            WalletError::InvalidResponse(format!("Failed to parse {} response: {}", method, e))
        })?;

        if let Some(error) = rpc_response.error {
            return Err(classify_rpc_error(method, error));
        }

        Ok(rpc_response.result)
    }

    async fn rpc_call<T: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> WalletResult<T> {
        self.rpc_call_nullable(method, params)
            .await?
            .ok_or_else(|| WalletError::InvalidResponse(format!("No result for {}", method)))
    }
}

/// Submission and preflight rejections are transaction failures, everything
/// else the node reports is treated as a transport problem.
fn classify_rpc_error(method: &str, error: JsonRpcError) -> WalletError {
    let message = format!("RPC error {} on {}: {}", error.code, method, error.message);
    if method == "sendTransaction" {
        WalletError::TransactionError(message)
    } else {
        WalletError::NetworkError(message)
    }
}

#[async_trait]
impl ChainRpc for BlockchainClient {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn get_balance(&self, address: &Address) -> WalletResult<Amount> {
        let params = json!([address.as_string(), { "commitment": self.commitment }]);
        let response: RpcResponse<u64> = self.rpc_call("getBalance", params).await?;
        Ok(Amount::from_lamports(response.value))
    }

    async fn get_latest_blockhash(&self) -> WalletResult<BlockhashInfo> {
        let params = json!([{ "commitment": self.commitment }]);
        let response: RpcResponse<BlockhashInfo> =
            self.rpc_call("getLatestBlockhash", params).await?;
        Ok(response.value)
    }

    async fn send_transaction(&self, wire: &[u8]) -> WalletResult<String> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(wire);
        let params = json!([
            encoded,
            { "encoding": "base64", "preflightCommitment": self.commitment }
        ]);
        self.rpc_call("sendTransaction", params).await
    }

    async fn get_signature_status(
        &self,
        signature: &str,
    ) -> WalletResult<Option<SignatureStatus>> {
        let params = json!([[signature], { "searchTransactionHistory": false }]);
        let response: RpcResponse<Vec<Option<SignatureStatus>>> =
            self.rpc_call("getSignatureStatuses", params).await?;
        Ok(response.value.into_iter().next().flatten())
    }

    async fn get_block_height(&self) -> WalletResult<u64> {
        let params = json!([{ "commitment": self.commitment }]);
        self.rpc_call("getBlockHeight", params).await
    }

    async fn get_token_accounts_by_owner(
        &self,
        owner: &Address,
    ) -> WalletResult<Vec<TokenAccount>> {
        let params = json!([
            owner.as_string(),
            { "programId": TOKEN_PROGRAM_ID.as_string() },
            { "encoding": "jsonParsed", "commitment": self.commitment }
        ]);
        let response: RpcResponse<Vec<KeyedTokenAccount>> =
            self.rpc_call("getTokenAccountsByOwner", params).await?;
        response
            .value
            .into_iter()
            .map(TokenAccount::try_from)
            .collect()
    }

    async fn get_minimum_balance_for_rent_exemption(&self, data_len: u64) -> WalletResult<Amount> {
        let lamports: u64 = self
            .rpc_call("getMinimumBalanceForRentExemption", json!([data_len]))
            .await?;
        Ok(Amount::from_lamports(lamports))
    }

    async fn get_signatures_for_address(
        &self,
        address: &Address,
        limit: usize,
    ) -> WalletResult<Vec<SignatureInfo>> {
        let params = json!([address.as_string(), { "limit": limit }]);
        self.rpc_call("getSignaturesForAddress", params).await
    }

    async fn get_parsed_transaction(
        &self,
        signature: &str,
    ) -> WalletResult<Option<ParsedTransaction>> {
        // History reads never go below "confirmed"; processed blocks can be dropped.
        let commitment = self.commitment.max(Commitment::Confirmed);
        let params = json!([
            signature,
            {
                "encoding": "jsonParsed",
                "commitment": commitment,
                "maxSupportedTransactionVersion": 0
            }
        ]);
        self.rpc_call_nullable("getTransaction", params).await
    }
}
