//! `ledger-primitives`: foundational types for the ledger execution engine.
//!
//! This crate provides the coin and account model, the transaction kinds and
//! their canonical encoding, error codes, the fee and gas model, ledger
//! configuration, the state write buffer and the Merkle state root shared by
//! the engine and the RPC surface.

pub mod types;
pub mod error;
pub mod coins;
pub mod account;
pub mod tx;
pub mod codec;
pub mod crypto;
pub mod gas;
pub mod config;
pub mod block;
pub mod state;
pub mod merkle;

// Re-export commonly used types at the crate root for convenience.
pub use types::{Address, BlockHeight, Hash, ZERO_ADDRESS, ZERO_HASH};
pub use error::{CodecError, CoinsError, ConfigError, ErrorCode, OutOfGas, TxError, TxResult};
pub use coins::Coins;
pub use account::{Account, ReservedFund, Split, SplitRule, Stake, StakePurpose};
pub use tx::{
    ReleaseFundTx, ReserveFundTx, RametronStakeTx, SendTx, SmartContractTx, SplitRuleTx, StakeTx,
    Tx, TxInput, TxKind, TxOutput, TxSignature, WithdrawRametronStakeTx, WithdrawStakeTx,
};
pub use config::{FeatureHeights, LedgerConfig};
pub use gas::GasMeter;
pub use block::{BlockHeader, BlockRef};
pub use state::StateOverlay;
pub use primitive_types::U256;
