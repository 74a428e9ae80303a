//! Per-kind transaction executors.
//!
//! Every transaction kind has one executor implementing [`TxExecutor`], a
//! two-phase contract:
//!
//! 1. `sanity_check`: read-only. Decides accept/reject against a view and
//!    never writes; the shared borrow of the view enforces this.
//! 2. `process`: applies an already-checked transaction through a mutating
//!    view. A failure here means the engine is broken, not the transaction.
//!
//! Sanity checks run their steps in a fixed order: basic input/output
//! validation, account-count cap, loading accounts, kind policy, then
//! sequence/signature/balance, fee floor and conservation.

mod reserve_fund;
mod send;
mod smart_contract;
mod split_rule;
mod stake;

pub use reserve_fund::{ReleaseFundExecutor, ReserveFundExecutor};
pub use send::{RametronStakeExecutor, SendExecutor, WithdrawRametronStakeExecutor};
pub use smart_contract::SmartContractExecutor;
pub use split_rule::SplitRuleExecutor;
pub use stake::{StakeExecutor, WithdrawStakeExecutor};

use ledger_primitives::{Address, BlockHeight, BlockRef, Hash, U256};

use crate::view::StoreView;
use crate::vm::ContractOutcome;
use ledger_primitives::TxResult;

/// Block-level inputs shared by every transaction in a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionContext {
    pub chain_id: String,
    /// The block the transaction executes on top of.
    pub parent: BlockRef,
    /// Consensus timestamp of the block being applied.
    pub timestamp: u64,
}

impl ExecutionContext {
    /// Context for a child of `parent`, stamped with the parent's timestamp.
    pub fn new(chain_id: impl Into<String>, parent: BlockRef) -> Self {
        Self {
            chain_id: chain_id.into(),
            timestamp: parent.timestamp,
            parent,
        }
    }

    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Result of a successful `process`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedTx {
    pub tx_hash: Hash,
    /// Present only for contract transactions.
    pub contract: Option<ContractOutcome>,
}

/// Ordering key for the transaction pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxInfo {
    /// First signer.
    pub address: Address,
    pub sequence: u64,
    pub effective_gas_price: U256,
}

pub trait TxExecutor {
    type Tx;

    fn sanity_check(
        &self,
        ctx: &ExecutionContext,
        view: &dyn StoreView,
        tx: &Self::Tx,
    ) -> TxResult<()>;

    fn process(
        &self,
        ctx: &ExecutionContext,
        view: &mut dyn StoreView,
        tx: &Self::Tx,
    ) -> TxResult<ProcessedTx>;

    /// Ordering information. Never touches state.
    fn tx_info(&self, tx: &Self::Tx) -> TxInfo;
}

/// Height of the block a transaction is applied in.
pub(crate) fn block_height(view: &dyn StoreView) -> BlockHeight {
    view.height().saturating_add(1)
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Fixtures shared by the executor unit tests.

    use ed25519_dalek::SigningKey;
    use ledger_primitives::{
        crypto::address_from_public_key, Account, Address, BlockRef, Coins, LedgerConfig,
    };
    use std::sync::Arc;

    use super::ExecutionContext;
    use crate::view::MemStore;

    pub const CHAIN_ID: &str = "ledger-unit-test";

    pub fn key(seed: u8) -> SigningKey {
        SigningKey::from_bytes(&[seed; 32])
    }

    pub fn addr(key: &SigningKey) -> Address {
        address_from_public_key(&key.verifying_key().to_bytes())
    }

    pub fn ctx() -> ExecutionContext {
        ExecutionContext::new(CHAIN_ID, BlockRef::genesis())
    }

    /// Mainnet rules with a fee floor of 10 secondary wei.
    pub fn config() -> Arc<LedgerConfig> {
        Arc::new(LedgerConfig {
            minimum_transaction_fee: 10u64.into(),
            ..LedgerConfig::default()
        })
    }

    pub fn funded(key: &SigningKey, sequence: u64, secondary: u64) -> Account {
        let mut acct = Account::new(addr(key));
        acct.sequence = sequence;
        acct.balance = Coins::secondary(secondary);
        acct
    }

    pub fn store(accounts: impl IntoIterator<Item = Account>) -> MemStore {
        MemStore::with_genesis(accounts)
    }
}
