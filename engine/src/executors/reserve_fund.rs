//! Fund reservation and release.
//!
//! A reservation locks a fund plus a larger collateral on the source account
//! for a set of resources. It is keyed by the account sequence of the
//! reserving transaction and can be released once its freeze period has
//! passed.

use std::sync::Arc;

use ledger_primitives::{
    gas::effective_gas_price, Account, Coins, LedgerConfig, ReleaseFundTx, ReserveFundTx,
    ReservedFund, TxError, TxInput, TxResult,
};
use tracing::debug;

use super::{block_height, ExecutionContext, ProcessedTx, TxExecutor, TxInfo};
use crate::validation::{
    adjust_by_inputs, check_account_cap, check_conservation, credit_account, debit_and_bump,
    get_inputs, invariant, sanity_check_for_fee, validate_input_advanced, validate_inputs_basic,
};
use crate::view::StoreView;

/// Only the source account is touched.
const SINGLE_ACCOUNT: u64 = 1;

/// Load, basic-check and cap-check a lone source input.
fn load_source(
    config: &LedgerConfig,
    view: &dyn StoreView,
    source: &TxInput,
) -> TxResult<Account> {
    validate_inputs_basic(std::slice::from_ref(source))?;
    check_account_cap(config, SINGLE_ACCOUNT as usize)?;
    view.get_account(&source.address)
        .ok_or(TxError::UnknownAddress(source.address))
}

fn single_source_info(config: &LedgerConfig, source: &TxInput, fee: &Coins) -> TxInfo {
    TxInfo {
        address: source.address,
        sequence: source.sequence,
        effective_gas_price: effective_gas_price(fee, SINGLE_ACCOUNT, config.gas_per_account),
    }
}

#[derive(Debug, Clone)]
pub struct ReserveFundExecutor {
    config: Arc<LedgerConfig>,
}

impl ReserveFundExecutor {
    pub fn new(config: Arc<LedgerConfig>) -> Self {
        Self { config }
    }

    fn check_policy(&self, tx: &ReserveFundTx) -> TxResult<()> {
        if tx.resource_ids.is_empty() {
            return Err(TxError::MalformedInput("no resource ids to reserve for".into()));
        }

        let fund = &tx.source.coins;
        let collateral = &tx.collateral;
        if !collateral.is_positive() {
            return Err(TxError::InvalidCollateral("collateral must be positive".into()));
        }
        if !collateral.primary_wei().is_zero() || !fund.primary_wei().is_zero() {
            return Err(TxError::InvalidCollateral(
                "fund and collateral must be in the secondary denomination".into(),
            ));
        }
        if collateral.secondary_wei() <= fund.secondary_wei() {
            return Err(TxError::InvalidCollateral(format!(
                "collateral {} must exceed the reserved fund {}",
                collateral.secondary_wei(),
                fund.secondary_wei()
            )));
        }

        let (min, max) = (
            self.config.min_fund_reserve_duration,
            self.config.max_fund_reserve_duration,
        );
        if tx.duration < min || tx.duration > max {
            return Err(TxError::InvalidDuration {
                duration: tx.duration,
                min,
                max,
            });
        }
        Ok(())
    }

    /// Everything the reservation takes out of the balance.
    fn total_debit(tx: &ReserveFundTx) -> TxResult<Coins> {
        Ok(tx.source.coins.plus(&tx.collateral)?.plus(&tx.fee)?)
    }
}

impl TxExecutor for ReserveFundExecutor {
    type Tx = ReserveFundTx;

    fn sanity_check(
        &self,
        ctx: &ExecutionContext,
        view: &dyn StoreView,
        tx: &ReserveFundTx,
    ) -> TxResult<()> {
        let account = load_source(&self.config, view, &tx.source)?;
        self.check_policy(tx)?;

        let sign_bytes = tx.sign_bytes(&ctx.chain_id);
        validate_input_advanced(&account, &sign_bytes, &tx.source)?;
        sanity_check_for_fee(&self.config, &tx.fee)?;

        let need = Self::total_debit(tx)?;
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
        tx: &ReserveFundTx,
    ) -> TxResult<ProcessedTx> {
        let height = block_height(&*view);
        let mut account = view
            .get_account(&tx.source.address)
            .ok_or_else(|| invariant("reserving account missing"))?;

        let debit = Self::total_debit(tx).map_err(|e| invariant(e.to_string()))?;
        debit_and_bump(view, &mut account, &debit)?;
        account.reserved_funds.push(ReservedFund {
            reserve_sequence: account.sequence,
            collateral: tx.collateral,
            initial_fund: tx.source.coins,
            resource_ids: tx.resource_ids.clone(),
            reserved_at: height,
            end_block_height: height.saturating_add(tx.duration),
        });
        debug!(
            reserve_sequence = account.sequence,
            height, "reserved fund"
        );
        view.set_account(account);

        Ok(ProcessedTx {
            tx_hash: tx.hash(&ctx.chain_id),
            contract: None,
        })
    }

    fn tx_info(&self, tx: &ReserveFundTx) -> TxInfo {
        single_source_info(&self.config, &tx.source, &tx.fee)
    }
}

/// Releases a reservation back to the balance once it has thawed. The
/// source input pays exactly the fee.
#[derive(Debug, Clone)]
pub struct ReleaseFundExecutor {
    config: Arc<LedgerConfig>,
}

impl ReleaseFundExecutor {
    pub fn new(config: Arc<LedgerConfig>) -> Self {
        Self { config }
    }
}

impl TxExecutor for ReleaseFundExecutor {
    type Tx = ReleaseFundTx;

    fn sanity_check(
        &self,
        ctx: &ExecutionContext,
        view: &dyn StoreView,
        tx: &ReleaseFundTx,
    ) -> TxResult<()> {
        let account = load_source(&self.config, view, &tx.source)?;

        let fund = account
            .find_reserved_fund(tx.reserve_sequence)
            .ok_or(TxError::NoMatchingReservation(tx.reserve_sequence))?;
        let until = fund.release_height(self.config.reserved_fund_freeze_period);
        if block_height(view) < until {
            return Err(TxError::FundStillFrozen {
                reserve_sequence: tx.reserve_sequence,
                until,
            });
        }

        let sign_bytes = tx.sign_bytes(&ctx.chain_id);
        validate_input_advanced(&account, &sign_bytes, &tx.source)?;
        sanity_check_for_fee(&self.config, &tx.fee)?;
        check_conservation(&tx.source.coins, &[], &tx.fee)
    }

    fn process(
        &self,
        ctx: &ExecutionContext,
        view: &mut dyn StoreView,
        tx: &ReleaseFundTx,
    ) -> TxResult<ProcessedTx> {
        let inputs = std::slice::from_ref(&tx.source);
        let mut accounts = get_inputs(&*view, inputs)?;
        let account = accounts
            .get_mut(&tx.source.address)
            .ok_or_else(|| invariant("releasing account missing"))?;
        let fund = account
            .take_reserved_fund(tx.reserve_sequence)
            .ok_or_else(|| invariant("reservation vanished before release"))?;
        let released = fund
            .total_locked()
            .map_err(|e| invariant(format!("release amount: {e}")))?;
        credit_account(view, account, &released)?;
        adjust_by_inputs(view, &mut accounts, inputs)?;
        debug!(reserve_sequence = tx.reserve_sequence, %released, "released fund");

        Ok(ProcessedTx {
            tx_hash: tx.hash(&ctx.chain_id),
            contract: None,
        })
    }

    fn tx_info(&self, tx: &ReleaseFundTx) -> TxInfo {
        single_source_info(&self.config, &tx.source, &tx.fee)
    }
}
