use thiserror::Error;
use trophy_types::{GasLimitExceeded, ShapeMismatch};

/// Revert reason emitted by `getEncryptedScore` for callers that do not own the token.
pub const NOT_OWNER_REASON: &str = "Not owner";

/// Terminal errors of a CLI operation. None of them are retried.
#[derive(Debug, Error)]
pub enum TrophyError {
    /// Handle or proof could not be normalised; raised before any contract call.
    #[error(transparent)]
    ShapeMismatch(#[from] ShapeMismatch),

    /// The contract refused to reveal an encrypted score to a non-owner.
    #[error("not authorised: {0}")]
    Authorization(String),

    #[error("gas estimation failed: {message}")]
    GasEstimation {
        message: String,
        data: Option<String>,
    },

    #[error(transparent)]
    GasLimitExceeded(#[from] GasLimitExceeded),

    /// The node or the relayer rejected the request, or the transaction reverted.
    #[error("transaction failed: {message}")]
    Transaction {
        message: String,
        data: Option<String>,
    },

    #[error("configuration error: {0}")]
    Config(String),
}

impl TrophyError {
    pub fn transaction(message: impl Into<String>) -> Self {
        Self::Transaction {
            message: message.into(),
            data: None,
        }
    }

    /// Map a decoded revert reason to an error, recognising the ownership check.
    pub fn from_revert(reason: String, data: Option<String>) -> Self {
        if reason == NOT_OWNER_REASON {
            Self::Authorization(reason)
        } else {
            Self::Transaction {
                message: format!("execution reverted: {reason}"),
                data,
            }
        }
    }

    /// Diagnostic payload attached by the node or relayer, if any.
    pub fn data(&self) -> Option<&str> {
        match self {
            Self::GasEstimation { data, .. } | Self::Transaction { data, .. } => data.as_deref(),
            _ => None,
        }
    }
}

pub type Result<T, E = TrophyError> = std::result::Result<T, E>;
