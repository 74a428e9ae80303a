//! Stake deposit and withdrawal.

use std::sync::Arc;

use ledger_primitives::{
    gas::effective_gas_price, Coins, LedgerConfig, Stake, StakeTx, TxError, TxKind, TxResult,
    WithdrawStakeTx,
};
use tracing::debug;

use super::send::Transfer;
use super::{block_height, ExecutionContext, ProcessedTx, TxExecutor, TxInfo};
use crate::validation::{
    adjust_by_inputs, adjust_by_outputs, check_account_cap, check_conservation, check_recipients,
    credit_account, get_inputs, get_or_make_outputs, invariant, sanity_check_for_fee,
    validate_inputs_advanced, validate_inputs_basic, validate_outputs_basic,
};
use crate::view::StoreView;

/// Deposits stake. Inputs are debited like a transfer, but each output is
/// recorded as a stake held by the output address and owned by the first
/// input instead of being credited to its balance.
#[derive(Debug, Clone)]
pub struct StakeExecutor {
    config: Arc<LedgerConfig>,
}

impl StakeExecutor {
    pub fn new(config: Arc<LedgerConfig>) -> Self {
        Self { config }
    }

    fn transfer(tx: &StakeTx) -> Transfer<'_> {
        Transfer {
            kind: TxKind::Stake,
            fee: &tx.fee,
            inputs: &tx.inputs,
            outputs: &tx.outputs,
        }
    }
}

impl TxExecutor for StakeExecutor {
    type Tx = StakeTx;

    fn sanity_check(
        &self,
        ctx: &ExecutionContext,
        view: &dyn StoreView,
        tx: &StakeTx,
    ) -> TxResult<()> {
        let sign_bytes = tx.sign_bytes(&ctx.chain_id);
        Self::transfer(tx).sanity_check(&self.config, view, &sign_bytes)?;
        Ok(())
    }

    fn process(
        &self,
        ctx: &ExecutionContext,
        view: &mut dyn StoreView,
        tx: &StakeTx,
    ) -> TxResult<ProcessedTx> {
        let owner = tx
            .inputs
            .first()
            .map(|i| i.address)
            .ok_or_else(|| invariant("stake without inputs"))?;

        let mut accounts = get_inputs(&*view, &tx.inputs)?;
        get_or_make_outputs(&*view, &mut accounts, &tx.outputs);
        adjust_by_inputs(view, &mut accounts, &tx.inputs)?;

        for output in &tx.outputs {
            let holder = accounts
                .get_mut(&output.address)
                .ok_or_else(|| invariant("stake holder not loaded"))?;
            holder.stakes.push(Stake {
                source: owner,
                amount: output.coins,
                purpose: tx.purpose,
            });
            view.set_account(holder.clone());
        }

        Ok(ProcessedTx {
            tx_hash: tx.hash(&ctx.chain_id),
            contract: None,
        })
    }

    fn tx_info(&self, tx: &StakeTx) -> TxInfo {
        Self::transfer(tx).tx_info(&self.config)
    }
}

/// Returns every stake `source` placed with `holder` for a purpose to the
/// source's balance. The source pays the fee.
#[derive(Debug, Clone)]
pub struct WithdrawStakeExecutor {
    config: Arc<LedgerConfig>,
}

/// Source and holder.
const WITHDRAW_STAKE_ACCOUNTS: u64 = 2;

impl WithdrawStakeExecutor {
    pub fn new(config: Arc<LedgerConfig>) -> Self {
        Self { config }
    }
}

impl TxExecutor for WithdrawStakeExecutor {
    type Tx = WithdrawStakeTx;

    fn sanity_check(
        &self,
        ctx: &ExecutionContext,
        view: &dyn StoreView,
        tx: &WithdrawStakeTx,
    ) -> TxResult<()> {
        let inputs = std::slice::from_ref(&tx.source);
        let outputs = std::slice::from_ref(&tx.holder);
        validate_inputs_basic(inputs)?;
        validate_outputs_basic(outputs)?;
        check_account_cap(&self.config, WITHDRAW_STAKE_ACCOUNTS as usize)?;

        let mut accounts = get_inputs(view, inputs)?;
        if !accounts.contains_key(&tx.holder.address) {
            let holder = view
                .get_account(&tx.holder.address)
                .ok_or(TxError::UnknownAddress(tx.holder.address))?;
            accounts.insert(holder.address, holder);
        }
        check_recipients(
            &self.config,
            block_height(view),
            TxKind::WithdrawStake,
            &accounts,
            outputs,
        )?;
        let has_stake = accounts
            .get(&tx.holder.address)
            .is_some_and(|h| h.has_stake_from(&tx.source.address, tx.purpose));
        if !has_stake {
            return Err(TxError::NoMatchingStake);
        }

        let sign_bytes = tx.sign_bytes(&ctx.chain_id);
        let in_total = validate_inputs_advanced(&accounts, &sign_bytes, inputs)?;
        sanity_check_for_fee(&self.config, &tx.fee)?;
        check_conservation(&in_total, outputs, &tx.fee)
    }

    fn process(
        &self,
        ctx: &ExecutionContext,
        view: &mut dyn StoreView,
        tx: &WithdrawStakeTx,
    ) -> TxResult<ProcessedTx> {
        let inputs = std::slice::from_ref(&tx.source);
        let outputs = std::slice::from_ref(&tx.holder);

        let mut accounts = get_inputs(&*view, inputs)?;
        get_or_make_outputs(&*view, &mut accounts, outputs);
        adjust_by_inputs(view, &mut accounts, inputs)?;
        adjust_by_outputs(view, &mut accounts, outputs)?;

        let holder = accounts
            .get_mut(&tx.holder.address)
            .ok_or_else(|| invariant("stake holder not loaded"))?;
        let returned = holder.take_stakes(&tx.source.address, tx.purpose);
        let refund = Coins::sum(returned.iter().map(|s| &s.amount))
            .map_err(|e| invariant(format!("stake refund: {e}")))?;
        view.set_account(holder.clone());

        let source = accounts
            .get_mut(&tx.source.address)
            .ok_or_else(|| invariant("stake source not loaded"))?;
        credit_account(view, source, &refund)?;

        debug!(stakes = returned.len(), %refund, "withdrew stake");
        Ok(ProcessedTx {
            tx_hash: tx.hash(&ctx.chain_id),
            contract: None,
        })
    }

    fn tx_info(&self, tx: &WithdrawStakeTx) -> TxInfo {
        TxInfo {
            address: tx.source.address,
            sequence: tx.source.sequence,
            effective_gas_price: effective_gas_price(
                &tx.fee,
                WITHDRAW_STAKE_ACCOUNTS,
                self.config.gas_per_account,
            ),
        }
    }
}
