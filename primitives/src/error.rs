//! Error types for the ledger execution layer.
//!
//! Every rejection a transaction can receive is a [`TxError`] variant, and
//! every variant maps to a stable numeric [`ErrorCode`] that is safe to put on
//! the wire or into a receipt.

use core::fmt;

use primitive_types::U256;

use crate::coins::Coins;
use crate::tx::TxKind;
use crate::types::{address_to_hex, Address, BlockHeight};

/// Stable numeric codes for transaction rejections.
///
/// These repr values are part of the receipt format and MUST NOT be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u32)]
pub enum ErrorCode {
    Ok = 0,
    MalformedInput = 1,
    UnknownAddress = 2,
    InvalidSequence = 3,
    InvalidSignature = 4,
    InsufficientFunds = 5,
    InvalidFee = 6,
    TooManyAccounts = 7,
    ConservationViolation = 8,
    DisallowedRecipient = 9,
    InvalidCollateral = 10,
    InvalidDuration = 11,
    FundStillFrozen = 12,
    NoMatchingReservation = 13,
    InvalidSplitPercentage = 14,
    SplitRuleOwnedByOther = 15,
    NoMatchingStake = 16,
    InvalidGasLimit = 17,
    FeatureNotEnabled = 18,
    VmExecutionError = 19,
    InvalidEncoding = 20,
    CoinArithmetic = 21,
    SnapshotCommit = 22,
    Internal = 100,
}

impl ErrorCode {
    /// Convert from the u32 representation carried in a receipt.
    pub fn from_u32(code: u32) -> Option<Self> {
        let code = match code {
            0 => Self::Ok,
            1 => Self::MalformedInput,
            2 => Self::UnknownAddress,
            3 => Self::InvalidSequence,
            4 => Self::InvalidSignature,
            5 => Self::InsufficientFunds,
            6 => Self::InvalidFee,
            7 => Self::TooManyAccounts,
            8 => Self::ConservationViolation,
            9 => Self::DisallowedRecipient,
            10 => Self::InvalidCollateral,
            11 => Self::InvalidDuration,
            12 => Self::FundStillFrozen,
            13 => Self::NoMatchingReservation,
            14 => Self::InvalidSplitPercentage,
            15 => Self::SplitRuleOwnedByOther,
            16 => Self::NoMatchingStake,
            17 => Self::InvalidGasLimit,
            18 => Self::FeatureNotEnabled,
            19 => Self::VmExecutionError,
            20 => Self::InvalidEncoding,
            21 => Self::CoinArithmetic,
            22 => Self::SnapshotCommit,
            100 => Self::Internal,
            _ => return None,
        };
        Some(code)
    }

    /// Return the u32 representation of this error code.
    pub fn as_u32(self) -> u32 {
        self as u32
    }

    /// Returns true if this is the `Ok` variant.
    pub fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ok => "OK",
            Self::MalformedInput => "ERR_MALFORMED_INPUT",
            Self::UnknownAddress => "ERR_UNKNOWN_ADDRESS",
            Self::InvalidSequence => "ERR_INVALID_SEQUENCE",
            Self::InvalidSignature => "ERR_INVALID_SIGNATURE",
            Self::InsufficientFunds => "ERR_INSUFFICIENT_FUNDS",
            Self::InvalidFee => "ERR_INVALID_FEE",
            Self::TooManyAccounts => "ERR_TOO_MANY_ACCOUNTS",
            Self::ConservationViolation => "ERR_CONSERVATION_VIOLATION",
            Self::DisallowedRecipient => "ERR_DISALLOWED_RECIPIENT",
            Self::InvalidCollateral => "ERR_INVALID_COLLATERAL",
            Self::InvalidDuration => "ERR_INVALID_DURATION",
            Self::FundStillFrozen => "ERR_FUND_STILL_FROZEN",
            Self::NoMatchingReservation => "ERR_NO_MATCHING_RESERVATION",
            Self::InvalidSplitPercentage => "ERR_INVALID_SPLIT_PERCENTAGE",
            Self::SplitRuleOwnedByOther => "ERR_SPLIT_RULE_OWNED_BY_OTHER",
            Self::NoMatchingStake => "ERR_NO_MATCHING_STAKE",
            Self::InvalidGasLimit => "ERR_INVALID_GAS_LIMIT",
            Self::FeatureNotEnabled => "ERR_FEATURE_NOT_ENABLED",
            Self::VmExecutionError => "ERR_VM_EXECUTION",
            Self::InvalidEncoding => "ERR_INVALID_ENCODING",
            Self::CoinArithmetic => "ERR_COIN_ARITHMETIC",
            Self::SnapshotCommit => "ERR_SNAPSHOT_COMMIT",
            Self::Internal => "ERR_INTERNAL",
        };
        f.write_str(name)
    }
}

/// Failure of checked coin arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CoinsError {
    #[error("coin arithmetic underflow")]
    Underflow,
    #[error("coin arithmetic overflow")]
    Overflow,
}

/// A [`GasMeter`](crate::gas::GasMeter) charge would exceed its limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("out of gas: limit {limit}, needed {needed}")]
pub struct OutOfGas {
    pub limit: u64,
    pub needed: u64,
}

/// Failure decoding canonical bytes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("unexpected end of data")]
    UnexpectedEof,
    #[error("unknown transaction kind tag 0x{0:02x}")]
    UnknownKind(u8),
    #[error("invalid {0} flag")]
    InvalidFlag(&'static str),
    #[error("invalid stake purpose {0}")]
    InvalidStakePurpose(u8),
    #[error("invalid UTF-8 in string field")]
    InvalidUtf8,
    #[error("{0} trailing bytes after value")]
    TrailingBytes(usize),
}

/// Failure loading a [`LedgerConfig`](crate::config::LedgerConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse ledger config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid ledger config: {0}")]
    Invalid(String),
}

/// Transaction rejection or engine failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TxError {
    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("unknown address {}", address_to_hex(.0))]
    UnknownAddress(Address),

    #[error("invalid sequence for {}: expected {expected}, got {got}", address_to_hex(.address))]
    InvalidSequence {
        address: Address,
        expected: u64,
        got: u64,
    },

    #[error("invalid signature for {}", address_to_hex(.0))]
    InvalidSignature(Address),

    #[error("insufficient funds in {}: balance {balance}, need {need}", address_to_hex(.address))]
    InsufficientFunds {
        address: Address,
        balance: Coins,
        need: Coins,
    },

    #[error("insufficient fee: minimum is {minimum} secondary wei, got {got}")]
    InvalidFee { minimum: U256, got: U256 },

    #[error("transaction affects {count} accounts, at most {max} allowed")]
    TooManyAccounts { count: usize, max: usize },

    #[error("inputs total {inputs} does not equal outputs plus fee {outputs_plus_fee}")]
    ConservationViolation {
        inputs: Coins,
        outputs_plus_fee: Coins,
    },

    #[error("{kind} transaction may not send value to smart contract {}", address_to_hex(.address))]
    DisallowedRecipient { address: Address, kind: TxKind },

    #[error("invalid collateral: {0}")]
    InvalidCollateral(String),

    #[error("invalid duration {duration}: must be within [{min}, {max}]")]
    InvalidDuration { duration: u64, min: u64, max: u64 },

    #[error("reserved fund {reserve_sequence} is frozen until height {until}")]
    FundStillFrozen {
        reserve_sequence: u64,
        until: BlockHeight,
    },

    #[error("no reserved fund with sequence {0}")]
    NoMatchingReservation(u64),

    #[error("invalid split percentage: {0}")]
    InvalidSplitPercentage(String),

    #[error("split rule for resource {resource_id} is owned by another initiator")]
    SplitRuleOwnedByOther { resource_id: String },

    #[error("holder has no matching stake from the source")]
    NoMatchingStake,

    #[error("gas limit {limit} exceeds maximum {max}")]
    InvalidGasLimit { limit: u64, max: u64 },

    #[error("feature {feature} is not enabled at height {height}")]
    FeatureNotEnabled {
        feature: &'static str,
        height: BlockHeight,
    },

    #[error("vm execution error: {0}")]
    VmExecutionError(String),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("{0}")]
    Coins(#[from] CoinsError),

    #[error("cannot save a snapshot view")]
    SnapshotCommit,

    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

impl TxError {
    /// Map this error to its stable numeric code.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::MalformedInput(_) => ErrorCode::MalformedInput,
            Self::UnknownAddress(_) => ErrorCode::UnknownAddress,
            Self::InvalidSequence { .. } => ErrorCode::InvalidSequence,
            Self::InvalidSignature(_) => ErrorCode::InvalidSignature,
            Self::InsufficientFunds { .. } => ErrorCode::InsufficientFunds,
            Self::InvalidFee { .. } => ErrorCode::InvalidFee,
            Self::TooManyAccounts { .. } => ErrorCode::TooManyAccounts,
            Self::ConservationViolation { .. } => ErrorCode::ConservationViolation,
            Self::DisallowedRecipient { .. } => ErrorCode::DisallowedRecipient,
            Self::InvalidCollateral(_) => ErrorCode::InvalidCollateral,
            Self::InvalidDuration { .. } => ErrorCode::InvalidDuration,
            Self::FundStillFrozen { .. } => ErrorCode::FundStillFrozen,
            Self::NoMatchingReservation(_) => ErrorCode::NoMatchingReservation,
            Self::InvalidSplitPercentage(_) => ErrorCode::InvalidSplitPercentage,
            Self::SplitRuleOwnedByOther { .. } => ErrorCode::SplitRuleOwnedByOther,
            Self::NoMatchingStake => ErrorCode::NoMatchingStake,
            Self::InvalidGasLimit { .. } => ErrorCode::InvalidGasLimit,
            Self::FeatureNotEnabled { .. } => ErrorCode::FeatureNotEnabled,
            Self::VmExecutionError(_) => ErrorCode::VmExecutionError,
            Self::Codec(_) => ErrorCode::InvalidEncoding,
            Self::Coins(_) => ErrorCode::CoinArithmetic,
            Self::SnapshotCommit => ErrorCode::SnapshotCommit,
            Self::InvariantViolation(_) => ErrorCode::Internal,
        }
    }

    /// True for failures that indicate an engine defect rather than a bad
    /// transaction. Callers must treat these as fatal.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, Self::InvariantViolation(_))
    }
}

/// Convenience alias for transaction results.
pub type TxResult<T> = Result<T, TxError>;
