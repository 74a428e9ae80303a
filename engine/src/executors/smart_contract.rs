//! Contract call and deployment envelope.
//!
//! The executor checks what can be checked without running the contract:
//! feature gate, gas price and limit, sequence, signature, and that the
//! caller can cover `value + gas_limit * gas_price`. `process` hands the
//! transaction to the VM, then bumps the caller's sequence and charges
//! `gas_price * gas_used`. A VM error is an outcome, not a rejection.

use std::sync::Arc;

use ledger_primitives::{
    gas::contract_fee, GasMeter, LedgerConfig, SmartContractTx, TxError, TxResult,
};
use tracing::{debug, trace, warn};

use super::{block_height, ExecutionContext, ProcessedTx, TxExecutor, TxInfo};
use crate::validation::{debit_and_bump, invariant, validate_caller_basic, validate_input_advanced};
use crate::view::StoreView;
use crate::vm::VirtualMachine;

pub struct SmartContractExecutor {
    config: Arc<LedgerConfig>,
    vm: Arc<dyn VirtualMachine>,
}

impl std::fmt::Debug for SmartContractExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmartContractExecutor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SmartContractExecutor {
    pub fn new(config: Arc<LedgerConfig>, vm: Arc<dyn VirtualMachine>) -> Self {
        Self { config, vm }
    }
}

impl TxExecutor for SmartContractExecutor {
    type Tx = SmartContractTx;

    fn sanity_check(
        &self,
        ctx: &ExecutionContext,
        view: &dyn StoreView,
        tx: &SmartContractTx,
    ) -> TxResult<()> {
        let height = block_height(view);
        if !self.config.feature_heights.smart_contract_enabled(height) {
            return Err(TxError::FeatureNotEnabled {
                feature: "smart_contract",
                height,
            });
        }

        validate_caller_basic(&tx.from)?;
        if tx.gas_price < self.config.minimum_gas_price {
            return Err(TxError::InvalidFee {
                minimum: self.config.minimum_gas_price,
                got: tx.gas_price,
            });
        }
        if tx.gas_limit > self.config.maximum_tx_gas_limit {
            return Err(TxError::InvalidGasLimit {
                limit: tx.gas_limit,
                max: self.config.maximum_tx_gas_limit,
            });
        }

        let account = view
            .get_account(&tx.from.address)
            .ok_or(TxError::UnknownAddress(tx.from.address))?;
        let sign_bytes = tx.sign_bytes(&ctx.chain_id);
        validate_input_advanced(&account, &sign_bytes, &tx.from)?;

        let need = contract_fee(tx.gas_price, tx.gas_limit)?.plus(&tx.from.coins)?;
        if !account.balance.is_gte(&need) {
            return Err(TxError::InsufficientFunds {
                address: account.address,
                balance: account.balance,
                need,
            });
        }
        Ok(())
    }

    fn process(
        &self,
        ctx: &ExecutionContext,
        view: &mut dyn StoreView,
        tx: &SmartContractTx,
    ) -> TxResult<ProcessedTx> {
        let mut outcome = self.vm.execute(&ctx.parent, tx, view);
        let mut meter = GasMeter::new(tx.gas_limit);
        if let Err(err) = meter.consume(outcome.gas_used) {
            warn!(%err, "vm reported gas above the limit, clamping");
            meter.exhaust();
        }
        outcome.gas_used = meter.consumed();
        if !outcome.succeeded() && !outcome.logs.is_empty() {
            trace!(logs = outcome.logs.len(), "dropping logs of failed execution");
            outcome.logs.clear();
        }

        // the VM may have moved value, so reload the caller
        let mut caller = view
            .get_account(&tx.from.address)
            .ok_or_else(|| invariant("contract caller missing after execution"))?;
        let fee = contract_fee(tx.gas_price, outcome.gas_used)
            .map_err(|e| invariant(format!("contract fee: {e}")))?;
        debit_and_bump(view, &mut caller, &fee)?;

        debug!(
            gas_used = outcome.gas_used,
            logs = outcome.logs.len(),
            vm_error = outcome.vm_error.as_deref().unwrap_or(""),
            "executed contract transaction"
        );
        Ok(ProcessedTx {
            tx_hash: tx.hash(&ctx.chain_id),
            contract: Some(outcome),
        })
    }

    fn tx_info(&self, tx: &SmartContractTx) -> TxInfo {
        TxInfo {
            address: tx.from.address,
            sequence: tx.from.sequence,
            effective_gas_price: tx.gas_price,
        }
    }
}
