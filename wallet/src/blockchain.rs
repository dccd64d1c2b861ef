/// Core chain types for the wallet
///
/// Solana addresses are Base58 encodings of raw 32-byte Ed25519 public keys.
/// Amounts are fixed-point lamports so totals never pick up floating-point
/// drift.
use crate::errors::{WalletError, WalletResult};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A Solana account address (Ed25519 public key or program-derived address).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; 32]);

impl Address {
    /// The System Program: 32 zero bytes.
    pub const SYSTEM_PROGRAM: Address = Address([0u8; 32]);

    pub const fn new(bytes: [u8; 32]) -> Self {
        Address(bytes)
    }

    /// Create an address from a byte slice that must be exactly 32 bytes long.
    pub fn from_bytes(bytes: &[u8]) -> WalletResult<Self> {
        let arr: [u8; 32] = bytes.try_into().map_err(|_| {
            WalletError::InvalidAddress(format!("expected 32 bytes, got {}", bytes.len()))
        })?;
        Ok(Address(arr))
    }

    /// Parse a Base58 address string.
    pub fn from_string(address: &str) -> WalletResult<Self> {
        let trimmed = address.trim();
        if trimmed.is_empty() {
            return Err(WalletError::InvalidAddress(
                "Address cannot be empty".to_string(),
            ));
        }

        // 32 bytes never encode to more than 44 Base58 characters.
        if trimmed.len() > 44 {
            return Err(WalletError::InvalidAddress("Address too long".to_string()));
        }

        let bytes = bs58::decode(trimmed)
            .into_vec()
            .map_err(|e| WalletError::InvalidAddress(format!("base58 decode failed: {e}")))?;
        Self::from_bytes(&bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn as_string(&self) -> String {
        bs58::encode(self.0).into_string()
    }

    /// Shortened form used in logs: first and last four characters.
    pub fn short(&self) -> String {
        let full = self.as_string();
        if full.len() <= 10 {
            return full;
        }
        format!("{}...{}", &full[..4], &full[full.len() - 4..])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_string())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.as_string())
    }
}

impl FromStr for Address {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::from_string(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.as_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Address::from_string(&raw).map_err(serde::de::Error::custom)
    }
}

/// Represents an amount of SOL with lamport precision.
///
/// The base unit is the lamport: 1 SOL = 1_000_000_000 lamports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Amount {
    lamports: u64,
}

impl Amount {
    /// Number of decimal places for SOL
    pub const DECIMALS: u8 = 9;
    /// Lamports per SOL (10^9)
    pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

    pub const ZERO: Amount = Amount { lamports: 0 };

    pub const fn from_lamports(lamports: u64) -> Self {
        Amount { lamports }
    }

    /// Create amount from whole SOL
    pub fn from_sol(sol: u64) -> WalletResult<Self> {
        let lamports = sol
            .checked_mul(Self::LAMPORTS_PER_SOL)
            .ok_or_else(|| WalletError::InvalidAmount("Amount too large".to_string()))?;
        Ok(Amount { lamports })
    }

    /// Parse a decimal SOL amount such as `"1"`, `"0.25"`, `".5"` or `"1e-3"`.
    ///
    /// Precision beyond one lamport is truncated, so a positive input may
    /// still come out as zero lamports.
    pub fn from_string(amount_str: &str) -> WalletResult<Self> {
        let trimmed = amount_str.trim();
        let trimmed = trimmed.strip_prefix('+').unwrap_or(trimmed);
        if trimmed.is_empty() {
            return Err(WalletError::InvalidAmount(
                "Amount cannot be empty".to_string(),
            ));
        }
        let malformed = || WalletError::InvalidAmount("Invalid number format".to_string());
        let overflow = || WalletError::InvalidAmount("Amount overflow".to_string());

        let (mantissa, exponent) = match trimmed.split_once(['e', 'E']) {
            Some((mantissa, exponent)) => {
                (mantissa, exponent.parse::<i32>().map_err(|_| malformed())?)
            }
            None => (trimmed, 0),
        };
        let (whole_str, fractional_str) = mantissa.split_once('.').unwrap_or((mantissa, ""));
        if (whole_str.is_empty() && fractional_str.is_empty())
            || !whole_str
                .chars()
                .chain(fractional_str.chars())
                .all(|c| c.is_ascii_digit())
        {
            return Err(malformed());
        }

        // Position of the lamport decimal point within the mantissa digits.
        let digits = format!("{}{}", whole_str, fractional_str);
        let point = whole_str.len() as i64 + i64::from(exponent) + i64::from(Self::DECIMALS);
        if point <= 0 {
            return Ok(Amount::ZERO);
        }

        let point = point as usize;
        let kept = digits[..point.min(digits.len())].trim_start_matches('0');
        if kept.is_empty() {
            return Ok(Amount::ZERO);
        }
        let padding = point.saturating_sub(digits.len());
        if kept.len() + padding > 20 {
            return Err(overflow());
        }

        let lamports = format!("{}{}", kept, "0".repeat(padding))
            .parse::<u64>()
            .map_err(|_| overflow())?;
        Ok(Amount { lamports })
    }

    pub fn lamports(&self) -> u64 {
        self.lamports
    }

    /// Full-precision decimal string without trailing zeros.
    pub fn as_string(&self) -> String {
        let whole = self.lamports / Self::LAMPORTS_PER_SOL;
        let fractional = self.lamports % Self::LAMPORTS_PER_SOL;

        if fractional == 0 {
            whole.to_string()
        } else {
            let frac_str = format!("{:09}", fractional)
                .trim_end_matches('0')
                .to_string();
            format!("{}.{}", whole, frac_str)
        }
    }

    /// Fixed number of decimals, zero padded, truncating extra precision.
    pub fn to_fixed(&self, decimals: u8) -> String {
        let decimals = decimals.min(Self::DECIMALS);
        let whole = self.lamports / Self::LAMPORTS_PER_SOL;
        if decimals == 0 {
            return whole.to_string();
        }
        let fractional = self.lamports % Self::LAMPORTS_PER_SOL;
        let scale = 10_u64.pow((Self::DECIMALS - decimals) as u32);
        format!(
            "{}.{:0width$}",
            whole,
            fractional / scale,
            width = decimals as usize
        )
    }

    pub fn is_zero(&self) -> bool {
        self.lamports == 0
    }

    pub fn saturating_add(&self, other: &Amount) -> Amount {
        Amount::from_lamports(self.lamports.saturating_add(other.lamports))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} SOL", self.as_string())
    }
}

impl FromStr for Amount {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Amount::from_string(s)
    }
}

impl std::iter::Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Amount {
        iter.fold(Amount::ZERO, |acc, next| acc.saturating_add(&next))
    }
}
