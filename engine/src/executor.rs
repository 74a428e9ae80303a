//! Transaction dispatcher and block application.
//!
//! [`Executor`] owns one executor per transaction kind and routes each
//! [`Tx`] to it by matching on the variant. `apply_block` is the block
//! replay entry point:
//!
//! 1. For each raw transaction:
//!    a. Decode (a codec error is a rejection, not a block failure)
//!    b. Sanity-check against the block's mutating view
//!    c. Process accepted transactions in order
//!    d. Produce a receipt
//! 2. Commit the view and build the block header
//!
//! Individual transaction rejections produce failed receipts but do NOT
//! abort the block. An invariant violation during `process` does, and the
//! buffered writes are never committed.

use std::sync::Arc;

use ledger_primitives::{
    codec::decode_tx, merkle::tx_root, BlockHeader, ErrorCode, Hash, LedgerConfig, Tx, TxError,
    TxResult,
};
use tracing::{debug, info};

use crate::executors::{
    ExecutionContext, ProcessedTx, RametronStakeExecutor, ReleaseFundExecutor,
    ReserveFundExecutor, SendExecutor, SmartContractExecutor, SplitRuleExecutor, StakeExecutor,
    TxExecutor, TxInfo, WithdrawRametronStakeExecutor, WithdrawStakeExecutor,
};
use crate::validation::invariant;
use crate::view::{StoreView, Version};
use crate::vm::{ContractLog, ContractOutcome, VirtualMachine};

/// Outcome of one transaction in a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    /// Position in the block.
    pub index: u32,
    /// `None` when the bytes did not decode.
    pub tx_hash: Option<Hash>,
    pub code: ErrorCode,
    /// Rejection reason, or the VM error of an accepted contract call that
    /// failed. Empty otherwise.
    pub message: String,
    pub contract: Option<ContractOutcome>,
}

impl TxReceipt {
    pub fn accepted(&self) -> bool {
        self.code.is_ok()
    }

    /// Events emitted by a successful contract call.
    pub fn logs(&self) -> &[ContractLog] {
        self.contract
            .as_ref()
            .map(|c| c.logs.as_slice())
            .unwrap_or_default()
    }

    fn rejected(index: u32, tx_hash: Option<Hash>, err: &TxError) -> Self {
        Self {
            index,
            tx_hash,
            code: err.code(),
            message: err.to_string(),
            contract: None,
        }
    }
}

/// Result of [`Executor::apply_block`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockResult {
    pub receipts: Vec<TxReceipt>,
    pub version: Version,
    pub header: BlockHeader,
}

impl BlockResult {
    pub fn accepted_count(&self) -> usize {
        self.receipts.iter().filter(|r| r.accepted()).count()
    }
}

/// Static registry of per-kind executors.
///
/// Holds no mutable state, so one instance can serve block application and
/// any number of concurrent dry runs.
#[derive(Debug)]
pub struct Executor {
    config: Arc<LedgerConfig>,
    send: SendExecutor,
    reserve_fund: ReserveFundExecutor,
    release_fund: ReleaseFundExecutor,
    split_rule: SplitRuleExecutor,
    stake: StakeExecutor,
    withdraw_stake: WithdrawStakeExecutor,
    rametron_stake: RametronStakeExecutor,
    withdraw_rametron_stake: WithdrawRametronStakeExecutor,
    smart_contract: SmartContractExecutor,
}

impl Executor {
    pub fn new(config: LedgerConfig, vm: Arc<dyn VirtualMachine>) -> Self {
        let config = Arc::new(config);
        Self {
            send: SendExecutor::new(config.clone()),
            reserve_fund: ReserveFundExecutor::new(config.clone()),
            release_fund: ReleaseFundExecutor::new(config.clone()),
            split_rule: SplitRuleExecutor::new(config.clone()),
            stake: StakeExecutor::new(config.clone()),
            withdraw_stake: WithdrawStakeExecutor::new(config.clone()),
            rametron_stake: RametronStakeExecutor::new(config.clone()),
            withdraw_rametron_stake: WithdrawRametronStakeExecutor::new(config.clone()),
            smart_contract: SmartContractExecutor::new(config.clone(), vm),
            config,
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn sanity_check_tx(
        &self,
        ctx: &ExecutionContext,
        view: &dyn StoreView,
        tx: &Tx,
    ) -> TxResult<()> {
        match tx {
            Tx::Send(tx) => self.send.sanity_check(ctx, view, tx),
            Tx::ReserveFund(tx) => self.reserve_fund.sanity_check(ctx, view, tx),
            Tx::ReleaseFund(tx) => self.release_fund.sanity_check(ctx, view, tx),
            Tx::SplitRule(tx) => self.split_rule.sanity_check(ctx, view, tx),
            Tx::Stake(tx) => self.stake.sanity_check(ctx, view, tx),
            Tx::WithdrawStake(tx) => self.withdraw_stake.sanity_check(ctx, view, tx),
            Tx::RametronStake(tx) => self.rametron_stake.sanity_check(ctx, view, tx),
            Tx::WithdrawRametronStake(tx) => {
                self.withdraw_rametron_stake.sanity_check(ctx, view, tx)
            }
            Tx::SmartContract(tx) => self.smart_contract.sanity_check(ctx, view, tx),
        }
    }

    /// Applies a transaction that already passed `sanity_check_tx` on the
    /// same view.
    pub fn process_tx(
        &self,
        ctx: &ExecutionContext,
        view: &mut dyn StoreView,
        tx: &Tx,
    ) -> TxResult<ProcessedTx> {
        match tx {
            Tx::Send(tx) => self.send.process(ctx, view, tx),
            Tx::ReserveFund(tx) => self.reserve_fund.process(ctx, view, tx),
            Tx::ReleaseFund(tx) => self.release_fund.process(ctx, view, tx),
            Tx::SplitRule(tx) => self.split_rule.process(ctx, view, tx),
            Tx::Stake(tx) => self.stake.process(ctx, view, tx),
            Tx::WithdrawStake(tx) => self.withdraw_stake.process(ctx, view, tx),
            Tx::RametronStake(tx) => self.rametron_stake.process(ctx, view, tx),
            Tx::WithdrawRametronStake(tx) => self.withdraw_rametron_stake.process(ctx, view, tx),
            Tx::SmartContract(tx) => self.smart_contract.process(ctx, view, tx),
        }
    }

    pub fn tx_info(&self, tx: &Tx) -> TxInfo {
        match tx {
            Tx::Send(tx) => self.send.tx_info(tx),
            Tx::ReserveFund(tx) => self.reserve_fund.tx_info(tx),
            Tx::ReleaseFund(tx) => self.release_fund.tx_info(tx),
            Tx::SplitRule(tx) => self.split_rule.tx_info(tx),
            Tx::Stake(tx) => self.stake.tx_info(tx),
            Tx::WithdrawStake(tx) => self.withdraw_stake.tx_info(tx),
            Tx::RametronStake(tx) => self.rametron_stake.tx_info(tx),
            Tx::WithdrawRametronStake(tx) => self.withdraw_rametron_stake.tx_info(tx),
            Tx::SmartContract(tx) => self.smart_contract.tx_info(tx),
        }
    }

    /// Sanity-checks then processes. A `process` failure after a passing
    /// check is always reported as an invariant violation.
    pub fn execute_tx(
        &self,
        ctx: &ExecutionContext,
        view: &mut dyn StoreView,
        tx: &Tx,
    ) -> TxResult<ProcessedTx> {
        self.sanity_check_tx(ctx, &*view, tx)?;
        self.process_tx(ctx, view, tx).map_err(|err| {
            if err.is_invariant_violation() {
                err
            } else {
                invariant(format!("{} failed after sanity check: {err}", tx.kind()))
            }
        })
    }

    /// Replays a block of raw transactions on `view` and commits it.
    pub fn apply_block(
        &self,
        ctx: &ExecutionContext,
        view: &mut dyn StoreView,
        raw_txs: &[Vec<u8>],
    ) -> TxResult<BlockResult> {
        if view.height() != ctx.parent.height {
            return Err(TxError::MalformedInput(format!(
                "parent height {} does not match view height {}",
                ctx.parent.height,
                view.height()
            )));
        }

        let mut receipts = Vec::with_capacity(raw_txs.len());
        let mut tx_hashes = Vec::with_capacity(raw_txs.len());

        for (idx, raw) in raw_txs.iter().enumerate() {
            let index = idx as u32;
            let tx = match decode_tx(raw) {
                Ok(tx) => tx,
                Err(err) => {
                    let err = TxError::from(err);
                    debug!(index, code = %err.code(), error = %err, "rejected undecodable transaction");
                    receipts.push(TxReceipt::rejected(index, None, &err));
                    continue;
                }
            };
            let tx_hash = tx.hash(&ctx.chain_id);

            match self.execute_tx(ctx, view, &tx) {
                Ok(processed) => {
                    tx_hashes.push(processed.tx_hash);
                    let message = match processed.contract.as_ref().and_then(ContractOutcome::error) {
                        Some(err) => {
                            debug!(index, code = %err.code(), error = %err, "contract call failed");
                            err.to_string()
                        }
                        None => String::new(),
                    };
                    receipts.push(TxReceipt {
                        index,
                        tx_hash: Some(processed.tx_hash),
                        code: ErrorCode::Ok,
                        message,
                        contract: processed.contract,
                    });
                }
                Err(err) if err.is_invariant_violation() => return Err(err),
                Err(err) => {
                    debug!(index, kind = %tx.kind(), code = %err.code(), error = %err, "rejected transaction");
                    receipts.push(TxReceipt::rejected(index, Some(tx_hash), &err));
                }
            }
        }

        let version = view.save()?;
        let header = BlockHeader {
            chain_id: ctx.chain_id.clone(),
            height: version.height,
            parent_hash: ctx.parent.hash,
            state_root: version.state_root,
            tx_root: tx_root(&tx_hashes),
            timestamp: ctx.timestamp,
        };

        let result = BlockResult {
            receipts,
            version,
            header,
        };
        info!(
            height = version.height,
            txs = raw_txs.len(),
            accepted = result.accepted_count(),
            "applied block"
        );
        Ok(result)
    }
}
