use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WalletError {
    // Validation errors
    ValidationError(String),
    InvalidAddress(String),
    InvalidAmount(String),

    // Network errors
    NetworkError(String),
    ConnectionTimeout,
    InvalidResponse(String),

    // Transaction errors
    TransactionError(String),
    ConfirmationTimeout(String),

    // Storage errors
    StorageError(String),
    PersistenceError(String),

    // Precondition errors
    WalletNotConnected,
    BatchInProgress,

    // Application errors
    NotFound(String),
    Cancelled(String),
}

impl WalletError {
    /// Transport-level failures: the endpoint could not be reached or answered garbage.
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            WalletError::NetworkError(_)
                | WalletError::ConnectionTimeout
                | WalletError::InvalidResponse(_)
        )
    }
}

impl fmt::Display for WalletError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            WalletError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            WalletError::InvalidAddress(msg) => write!(f, "Invalid address: {}", msg),
            WalletError::InvalidAmount(msg) => write!(f, "Invalid amount: {}", msg),

            WalletError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            WalletError::ConnectionTimeout => write!(f, "Connection timeout"),
            WalletError::InvalidResponse(msg) => write!(f, "Invalid response: {}", msg),

            WalletError::TransactionError(msg) => write!(f, "Transaction failed: {}", msg),
            WalletError::ConfirmationTimeout(sig) => {
                write!(f, "Transaction {} was not confirmed in time", sig)
            }

            WalletError::StorageError(msg) => write!(f, "Storage error: {}", msg),
            WalletError::PersistenceError(msg) => write!(f, "Persisted data unusable: {}", msg),

            WalletError::WalletNotConnected => write!(f, "No wallet connected"),
            WalletError::BatchInProgress => {
                write!(f, "Network settings cannot change while a batch is running")
            }

            WalletError::NotFound(msg) => write!(f, "Not found: {}", msg),
            WalletError::Cancelled(msg) => write!(f, "Cancelled: {}", msg),
        }
    }
}

impl std::error::Error for WalletError {}

pub type WalletResult<T> = Result<T, WalletError>;

impl From<std::io::Error> for WalletError {
    fn from(error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::NotFound => WalletError::NotFound(error.to_string()),
            std::io::ErrorKind::TimedOut => WalletError::ConnectionTimeout,
            _ => WalletError::StorageError(error.to_string()),
        }
    }
}

impl From<serde_json::Error> for WalletError {
    fn from(error: serde_json::Error) -> Self {
        WalletError::PersistenceError(format!("JSON error: {}", error))
    }
}

impl From<reqwest::Error> for WalletError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            WalletError::ConnectionTimeout
        } else if error.is_decode() {
            WalletError::InvalidResponse(error.to_string())
        } else {
            WalletError::NetworkError(error.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_classification() {
        assert!(WalletError::NetworkError("down".into()).is_network());
        assert!(WalletError::ConnectionTimeout.is_network());
        assert!(WalletError::InvalidResponse("html".into()).is_network());
        assert!(!WalletError::TransactionError("rejected".into()).is_network());
        assert!(!WalletError::ValidationError("bad".into()).is_network());
    }

    #[test]
    fn display_messages() {
        assert_eq!(
            WalletError::InvalidAddress("bad".into()).to_string(),
            "Invalid address: bad"
        );
        assert_eq!(
            WalletError::WalletNotConnected.to_string(),
            "No wallet connected"
        );
        assert_eq!(
            WalletError::ConfirmationTimeout("abc".into()).to_string(),
            "Transaction abc was not confirmed in time"
        );
    }

    #[test]
    fn io_errors_map_by_kind() {
        let missing = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert!(matches!(WalletError::from(missing), WalletError::NotFound(_)));

        let denied = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        assert!(matches!(
            WalletError::from(denied),
            WalletError::StorageError(_)
        ));
    }

    #[test]
    fn json_errors_are_persistence_errors() {
        let err = serde_json::from_str::<Vec<u8>>("{not json").unwrap_err();
        assert!(matches!(
            WalletError::from(err),
            WalletError::PersistenceError(_)
        ));
    }
}
