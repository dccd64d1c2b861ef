//! Wire types for the Solana JSON-RPC methods the wallet consumes.

use crate::blockchain::{Address, Amount};
use crate::errors::{WalletError, WalletResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Durability level requested when reading state or confirming a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    Processed,
    Confirmed,
    Finalized,
}

impl Commitment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Commitment::Processed => "processed",
            Commitment::Confirmed => "confirmed",
            Commitment::Finalized => "finalized",
        }
    }

    /// True when a status reported by the node is at least as durable as `self`.
    pub fn is_reached_by(&self, reported: Commitment) -> bool {
        reported >= *self
    }
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Commitment {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "processed" => Ok(Commitment::Processed),
            "confirmed" => Ok(Commitment::Confirmed),
            "finalized" => Ok(Commitment::Finalized),
            other => Err(WalletError::ValidationError(format!(
                "Unknown commitment level '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcContext {
    pub slot: u64,
}

/// `{ context, value }` envelope used by most account/state queries.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcResponse<T> {
    pub context: RpcContext,
    pub value: T,
}

/// A recent blockhash with the last block height at which it is still valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockhashInfo {
    pub blockhash: String,
    pub last_valid_block_height: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureStatus {
    pub slot: u64,
    #[serde(default)]
    pub confirmations: Option<u64>,
    #[serde(default)]
    pub err: Option<serde_json::Value>,
    #[serde(default)]
    pub confirmation_status: Option<Commitment>,
}

impl SignatureStatus {
    /// Commitment reached so far. Older nodes omit the field and only report
    /// `confirmations`, where `null` means rooted.
    pub fn reached(&self) -> Commitment {
        match (self.confirmation_status, self.confirmations) {
            (Some(status), _) => status,
            (None, None) => Commitment::Finalized,
            (None, Some(0)) => Commitment::Processed,
            (None, Some(_)) => Commitment::Confirmed,
        }
    }
}

/// `getTokenAccountsByOwner` entry with `jsonParsed` encoding.
#[derive(Debug, Clone, Deserialize)]
pub struct KeyedTokenAccount {
    pub pubkey: String,
    pub account: UiTokenAccount,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UiTokenAccount {
    pub lamports: u64,
    pub data: ParsedTokenData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParsedTokenData {
    #[serde(default)]
    pub program: String,
    pub parsed: ParsedTokenAccount,
    pub space: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParsedTokenAccount {
    pub info: TokenAccountInfo,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenAccountInfo {
    pub mint: String,
    pub owner: String,
    pub token_amount: UiTokenAmount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiTokenAmount {
    /// Raw base-unit amount as a decimal string.
    pub amount: String,
    pub decimals: u8,
    #[serde(default)]
    pub ui_amount_string: String,
}

impl UiTokenAmount {
    pub fn raw(&self) -> WalletResult<u64> {
        self.amount.parse().map_err(|_| {
            WalletError::InvalidResponse(format!("bad token amount '{}'", self.amount))
        })
    }

    pub fn is_zero(&self) -> bool {
        matches!(self.raw(), Ok(0))
    }
}

/// A token account owned by the wallet, decoded from the parsed RPC view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenAccount {
    pub address: Address,
    pub mint: Address,
    pub owner: Address,
    pub amount: UiTokenAmount,
    pub lamports: Amount,
    /// Account data size in bytes, the input to the rent-exemption minimum.
    pub space: u64,
}

impl TryFrom<KeyedTokenAccount> for TokenAccount {
    type Error = WalletError;

    fn try_from(keyed: KeyedTokenAccount) -> WalletResult<Self> {
        let invalid = |e: WalletError| WalletError::InvalidResponse(e.to_string());
        let info = keyed.account.data.parsed.info;
        Ok(TokenAccount {
            address: Address::from_string(&keyed.pubkey).map_err(invalid)?,
            mint: Address::from_string(&info.mint).map_err(invalid)?,
            owner: Address::from_string(&info.owner).map_err(invalid)?,
            amount: info.token_amount,
            lamports: Amount::from_lamports(keyed.account.lamports),
            space: keyed.account.data.space,
        })
    }
}

/// `getSignaturesForAddress` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureInfo {
    pub signature: String,
    pub slot: u64,
    #[serde(default)]
    pub err: Option<serde_json::Value>,
    #[serde(default)]
    pub memo: Option<String>,
    #[serde(default)]
    pub block_time: Option<i64>,
    #[serde(default)]
    pub confirmation_status: Option<Commitment>,
}

/// `getTransaction` with `jsonParsed` encoding, reduced to what history needs.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedTransaction {
    pub slot: u64,
    #[serde(default)]
    pub block_time: Option<i64>,
    pub transaction: ParsedTransactionBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParsedTransactionBody {
    pub message: ParsedMessage,
    #[serde(default)]
    pub signatures: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParsedMessage {
    #[serde(default)]
    pub instructions: Vec<ParsedInstruction>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedInstruction {
    #[serde(default)]
    pub program: Option<String>,
    #[serde(default)]
    pub program_id: Option<String>,
    /// Object for programs the node can decode, string for memos, absent otherwise.
    #[serde(default)]
    pub parsed: Option<serde_json::Value>,
}

/// Fields of a parsed System Program `transfer`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TransferInfo {
    pub source: String,
    pub destination: String,
    pub lamports: u64,
}

impl ParsedInstruction {
    /// `Some` when this is a decodable `transfer` instruction.
    pub fn as_transfer(&self) -> Option<TransferInfo> {
        let parsed = self.parsed.as_ref()?;
        if parsed.get("type")?.as_str()? != "transfer" {
            return None;
        }
        serde_json::from_value(parsed.get("info")?.clone()).ok()
    }
}
