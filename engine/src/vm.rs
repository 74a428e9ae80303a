//! Contract virtual machine boundary.
//!
//! The engine only owns the transaction envelope around a contract call:
//! gas-limit and gas-price policy, sequence and signature checks, and fee
//! charging. Running the bytecode is delegated to a [`VirtualMachine`].

use ledger_primitives::{Address, BlockRef, Hash, SmartContractTx, TxError};

use crate::view::StoreView;

/// An event emitted by a contract during execution.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContractLog {
    /// Contract that emitted the event.
    pub address: Address,
    pub topics: Vec<Hash>,
    pub data: Vec<u8>,
}

/// Result of running a contract transaction.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContractOutcome {
    pub return_data: Vec<u8>,
    /// Address of the deployed contract, or of the called one.
    pub contract_address: Address,
    pub gas_used: u64,
    /// Events in emission order. Empty when execution failed.
    pub logs: Vec<ContractLog>,
    /// Set when execution failed. A failed execution still consumes gas and
    /// is never a transaction rejection.
    pub vm_error: Option<String>,
}

impl ContractOutcome {
    pub fn succeeded(&self) -> bool {
        self.vm_error.is_none()
    }

    /// The VM failure as a [`TxError::VmExecutionError`], if any.
    pub fn error(&self) -> Option<TxError> {
        self.vm_error.clone().map(TxError::VmExecutionError)
    }
}

/// Executes contract bytecode against a view.
///
/// Implementations must be deterministic, must move `tx.from.coins` from the
/// caller to the contract on success, and must not touch the caller's
/// sequence or charge gas fees; the engine does both after `execute` returns.
/// `gas_used` must not exceed `tx.gas_limit`; a larger report is clamped.
/// Logs of a failed execution are discarded.
pub trait VirtualMachine: Send + Sync {
    fn execute(
        &self,
        parent: &BlockRef,
        tx: &SmartContractTx,
        view: &mut dyn StoreView,
    ) -> ContractOutcome;
}
