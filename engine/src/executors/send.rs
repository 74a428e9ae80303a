//! Transfer-shaped kinds: `Send` and the two rametron stake variants.
//!
//! All three move coins from one or more inputs to one or more outputs and
//! differ only in their kind tag, so they share one implementation.

use std::collections::BTreeMap;
use std::sync::Arc;

use ledger_primitives::{
    gas::effective_gas_price, Account, Address, Coins, LedgerConfig, RametronStakeTx, SendTx,
    TxError, TxInput, TxKind, TxOutput, TxResult, WithdrawRametronStakeTx, ZERO_ADDRESS,
};

use super::{block_height, ExecutionContext, ProcessedTx, TxExecutor, TxInfo};
use crate::validation::{
    adjust_by_inputs, adjust_by_outputs, check_account_cap, check_conservation, check_recipients,
    get_inputs, get_or_make_outputs, sanity_check_for_fee, validate_inputs_advanced,
    validate_inputs_basic, validate_outputs_basic,
};
use crate::view::StoreView;

/// Borrowed view of a transfer-shaped transaction.
pub(crate) struct Transfer<'a> {
    pub kind: TxKind,
    pub fee: &'a Coins,
    pub inputs: &'a [TxInput],
    pub outputs: &'a [TxOutput],
}

impl Transfer<'_> {
    fn accounts_affected(&self) -> usize {
        self.inputs.len() + self.outputs.len()
    }

    /// Full sanity check. Returns the loaded input and output accounts.
    pub(crate) fn sanity_check(
        &self,
        config: &LedgerConfig,
        view: &dyn StoreView,
        sign_bytes: &[u8],
    ) -> TxResult<BTreeMap<Address, Account>> {
        if self.inputs.is_empty() {
            return Err(TxError::MalformedInput(format!("{} has no inputs", self.kind)));
        }
        if self.outputs.is_empty() {
            return Err(TxError::MalformedInput(format!("{} has no outputs", self.kind)));
        }
        validate_inputs_basic(self.inputs)?;
        validate_outputs_basic(self.outputs)?;
        check_account_cap(config, self.accounts_affected())?;

        let mut accounts = get_inputs(view, self.inputs)?;
        get_or_make_outputs(view, &mut accounts, self.outputs);
        check_recipients(
            config,
            block_height(view),
            self.kind,
            &accounts,
            self.outputs,
        )?;

        let in_total = validate_inputs_advanced(&accounts, sign_bytes, self.inputs)?;
        sanity_check_for_fee(config, self.fee)?;
        check_conservation(&in_total, self.outputs, self.fee)?;
        Ok(accounts)
    }

    /// Debit inputs and credit outputs.
    pub(crate) fn process(&self, view: &mut dyn StoreView) -> TxResult<()> {
        let mut accounts = get_inputs(&*view, self.inputs)?;
        get_or_make_outputs(&*view, &mut accounts, self.outputs);
        adjust_by_inputs(view, &mut accounts, self.inputs)?;
        adjust_by_outputs(view, &mut accounts, self.outputs)
    }

    pub(crate) fn tx_info(&self, config: &LedgerConfig) -> TxInfo {
        let (address, sequence) = self
            .inputs
            .first()
            .map_or((ZERO_ADDRESS, 0), |i| (i.address, i.sequence));
        TxInfo {
            address,
            sequence,
            effective_gas_price: effective_gas_price(
                self.fee,
                self.accounts_affected() as u64,
                config.gas_per_account,
            ),
        }
    }
}

macro_rules! transfer_executor {
    ($(#[$doc:meta])* $name:ident, $tx:ty, $kind:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone)]
        pub struct $name {
            config: Arc<LedgerConfig>,
        }

        impl $name {
            pub fn new(config: Arc<LedgerConfig>) -> Self {
                Self { config }
            }

            fn transfer<'a>(tx: &'a $tx) -> Transfer<'a> {
                Transfer {
                    kind: $kind,
                    fee: &tx.fee,
                    inputs: &tx.inputs,
                    outputs: &tx.outputs,
                }
            }
        }

        impl TxExecutor for $name {
            type Tx = $tx;

            fn sanity_check(
                &self,
                ctx: &ExecutionContext,
                view: &dyn StoreView,
                tx: &$tx,
            ) -> TxResult<()> {
                let sign_bytes = tx.sign_bytes(&ctx.chain_id);
                Self::transfer(tx).sanity_check(&self.config, view, &sign_bytes)?;
                Ok(())
            }

            fn process(
                &self,
                ctx: &ExecutionContext,
                view: &mut dyn StoreView,
                tx: &$tx,
            ) -> TxResult<ProcessedTx> {
                Self::transfer(tx).process(view)?;
                Ok(ProcessedTx {
                    tx_hash: tx.hash(&ctx.chain_id),
                    contract: None,
                })
            }

            fn tx_info(&self, tx: &$tx) -> TxInfo {
                Self::transfer(tx).tx_info(&self.config)
            }
        }
    };
}

transfer_executor!(
    /// Plain value transfer.
    SendExecutor,
    SendTx,
    TxKind::Send
);
transfer_executor!(
    /// Transfer of stake to a rametron holder.
    RametronStakeExecutor,
    RametronStakeTx,
    TxKind::RametronStake
);
transfer_executor!(
    /// Transfer of stake back from a rametron holder.
    WithdrawRametronStakeExecutor,
    WithdrawRametronStakeTx,
    TxKind::WithdrawRametronStake
);
