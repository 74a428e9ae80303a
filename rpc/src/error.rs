//! Service errors and their JSON-RPC error codes.

use ledger_primitives::{CodecError, ErrorCode, TxError, TxKind};
use serde::Serialize;

/// JSON-RPC 2.0 reserved codes.
pub const PARSE_ERROR: i32 = -32700;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;
/// Server-defined: the transaction was rejected by the engine.
pub const TX_REJECTED: i32 = -32000;
/// Server-defined: the pool will not take the transaction.
pub const POOL_REJECTED: i32 = -32001;
pub const NOT_FOUND: i32 = -32004;

#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    #[error("invalid params: {0}")]
    InvalidParams(#[from] serde_json::Error),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("failed to decode transaction: {0}")]
    Decode(#[from] CodecError),

    #[error("expected a smart contract transaction, got {0}")]
    NotSmartContract(TxKind),

    #[error("smart contracts are not enabled until block height {enabled_at}")]
    SmartContractsDisabled { enabled_at: u64 },

    #[error("transaction rejected: {0}")]
    Rejected(TxError),

    #[error("transaction {0} is already pending")]
    AlreadyPending(String),

    #[error("transaction pool is full ({0} entries)")]
    PoolFull(usize),

    #[error("account {0} not found")]
    AccountNotFound(String),

    #[error("method not found: {0}")]
    MethodNotFound(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<TxError> for RpcError {
    fn from(err: TxError) -> Self {
        match err {
            TxError::InvariantViolation(what) => Self::Internal(what),
            TxError::Codec(err) => Self::Decode(err),
            other => Self::Rejected(other),
        }
    }
}

pub type RpcResult<T> = Result<T, RpcError>;

/// Error object of a JSON-RPC response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub code: i32,
    pub message: String,
    /// Engine error code for rejected transactions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<u32>,
}

impl RpcError {
    pub fn code(&self) -> i32 {
        match self {
            Self::InvalidHex(_)
            | Self::InvalidAddress(_)
            | Self::Decode(_)
            | Self::NotSmartContract(_) => INVALID_PARAMS,
            Self::InvalidParams(_) => PARSE_ERROR,
            Self::SmartContractsDisabled { .. } | Self::Rejected(_) => TX_REJECTED,
            Self::AlreadyPending(_) | Self::PoolFull(_) => POOL_REJECTED,
            Self::AccountNotFound(_) => NOT_FOUND,
            Self::MethodNotFound(_) => METHOD_NOT_FOUND,
            Self::Internal(_) => INTERNAL_ERROR,
        }
    }

    /// The engine's code for a rejected transaction, if this is one.
    pub fn tx_code(&self) -> Option<ErrorCode> {
        match self {
            Self::Rejected(err) => Some(err.code()),
            Self::Decode(_) => Some(ErrorCode::InvalidEncoding),
            Self::SmartContractsDisabled { .. } => Some(ErrorCode::FeatureNotEnabled),
            _ => None,
        }
    }

    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            code: self.code(),
            message: self.to_string(),
            data: self.tx_code().map(ErrorCode::as_u32),
        }
    }
}
