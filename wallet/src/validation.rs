//! Batch transfer text: one `address,amount` row per line, validated row by row.

use crate::blockchain::{Address, Amount};
use crate::errors::{WalletError, WalletResult};
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const INVALID_ADDRESS: &str = "Invalid address";
pub const INVALID_AMOUNT: &str = "Invalid amount";

/// One recipient/amount row of a batch transfer.
///
/// `address` and `amount_input` keep the text exactly as entered (trimmed)
/// so invalid rows can be shown back to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferIntent {
    /// 1-based line number in the source text.
    pub line: usize,
    pub address: String,
    pub amount_input: String,
    pub recipient: Option<Address>,
    pub amount: Option<Amount>,
    pub valid: bool,
    pub error: Option<String>,
}

impl TransferIntent {
    /// Recipient and amount of a valid intent.
    pub fn parts(&self) -> WalletResult<(Address, Amount)> {
        match (self.valid, self.recipient, self.amount) {
            (true, Some(recipient), Some(amount)) => Ok((recipient, amount)),
            _ => Err(WalletError::ValidationError(
                self.error
                    .clone()
                    .unwrap_or_else(|| format!("Line {} is not a valid transfer", self.line)),
            )),
        }
    }
}

/// Parses batch transfer text (`address,amount` per line) into intents.
pub struct IntentValidator {
    // Compiled regex patterns for performance
    address_pattern: Regex,
    amount_pattern: Regex,
}

impl IntentValidator {
    pub const SEPARATOR: char = ',';

    pub fn new() -> WalletResult<Self> {
        let address_pattern = Regex::new(r"^[1-9A-HJ-NP-Za-km-z]{32,44}$")
            .map_err(|e| WalletError::ValidationError(format!("Invalid address regex: {}", e)))?;

        let amount_pattern = Regex::new(r"^\+?(\d+(\.\d*)?|\.\d+)([eE][+-]?\d+)?$")
            .map_err(|e| WalletError::ValidationError(format!("Invalid amount regex: {}", e)))?;

        Ok(IntentValidator {
            address_pattern,
            amount_pattern,
        })
    }

    /// One intent per non-blank line. Malformed rows become invalid intents.
    pub fn parse(&self, raw_text: &str) -> Vec<TransferIntent> {
        raw_text
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(index, line)| {
                let mut columns = line.split(Self::SEPARATOR);
                let address = columns.next().unwrap_or_default();
                let amount = columns.next().unwrap_or_default();
                self.validate_pair(index + 1, address, amount)
            })
            .collect()
    }

    /// Validate a single recipient/amount pair.
    pub fn validate_pair(&self, line: usize, address: &str, amount: &str) -> TransferIntent {
        let address = address.trim();
        let amount_input = amount.trim();

        let recipient = self.check_address(address);
        let amount = self.check_amount(amount_input);

        let mut errors = Vec::new();
        if recipient.is_none() {
            errors.push(INVALID_ADDRESS);
        }
        if amount.is_none() {
            errors.push(INVALID_AMOUNT);
        }

        TransferIntent {
            line,
            address: address.to_string(),
            amount_input: amount_input.to_string(),
            recipient,
            amount,
            valid: errors.is_empty(),
            error: (!errors.is_empty()).then(|| errors.join(", ")),
        }
    }

    fn check_address(&self, address: &str) -> Option<Address> {
        if !self.address_pattern.is_match(address) {
            return None;
        }
        Address::from_string(address).ok()
    }

    /// Any finite positive decimal is accepted. Sub-lamport precision is
    /// truncated, so a tiny amount is kept here and refused when its
    /// transfer instruction is built.
    fn check_amount(&self, amount: &str) -> Option<Amount> {
        if !self.amount_pattern.is_match(amount) || !has_nonzero_digit(amount) {
            return None;
        }
        Amount::from_string(amount).ok()
    }
}

fn has_nonzero_digit(amount: &str) -> bool {
    amount
        .split(['e', 'E'])
        .next()
        .is_some_and(|mantissa| mantissa.bytes().any(|b| matches!(b, b'1'..=b'9')))
}

pub fn valid_intents(intents: &[TransferIntent]) -> impl Iterator<Item = &TransferIntent> {
    intents.iter().filter(|intent| intent.valid)
}

pub fn valid_count(intents: &[TransferIntent]) -> usize {
    valid_intents(intents).count()
}

/// Sum over valid intents only.
pub fn total_amount(intents: &[TransferIntent]) -> Amount {
    valid_intents(intents).filter_map(|intent| intent.amount).sum()
}
