//! Payment split registration for a resource.

use std::sync::Arc;

use ledger_primitives::{
    gas::effective_gas_price, types::is_zero_address, LedgerConfig, SplitRule, SplitRuleTx,
    TxError, TxResult,
};

use super::{block_height, ExecutionContext, ProcessedTx, TxExecutor, TxInfo};
use crate::validation::{
    adjust_by_inputs, check_account_cap, check_conservation, get_inputs, sanity_check_for_fee,
    validate_input_advanced, validate_inputs_basic,
};
use crate::view::StoreView;

const MAX_PERCENTAGE: u64 = 100;

/// Registers or overwrites the split rule of a resource. The initiator input
/// pays exactly the fee.
#[derive(Debug, Clone)]
pub struct SplitRuleExecutor {
    config: Arc<LedgerConfig>,
}

impl SplitRuleExecutor {
    pub fn new(config: Arc<LedgerConfig>) -> Self {
        Self { config }
    }

    fn check_splits(tx: &SplitRuleTx) -> TxResult<()> {
        if tx.resource_id.is_empty() {
            return Err(TxError::MalformedInput("empty resource id".into()));
        }
        let mut total: u64 = 0;
        for split in &tx.splits {
            if is_zero_address(&split.address) {
                return Err(TxError::MalformedInput("split has the zero address".into()));
            }
            if u64::from(split.percentage) > MAX_PERCENTAGE {
                return Err(TxError::InvalidSplitPercentage(format!(
                    "{}% exceeds 100%",
                    split.percentage
                )));
            }
            total += u64::from(split.percentage);
        }
        if total > MAX_PERCENTAGE {
            return Err(TxError::InvalidSplitPercentage(format!(
                "splits sum to {total}%"
            )));
        }
        Ok(())
    }
}

impl TxExecutor for SplitRuleExecutor {
    type Tx = SplitRuleTx;

    fn sanity_check(
        &self,
        ctx: &ExecutionContext,
        view: &dyn StoreView,
        tx: &SplitRuleTx,
    ) -> TxResult<()> {
        validate_inputs_basic(std::slice::from_ref(&tx.initiator))?;
        check_account_cap(&self.config, 1 + tx.splits.len())?;
        let account = view
            .get_account(&tx.initiator.address)
            .ok_or(TxError::UnknownAddress(tx.initiator.address))?;

        Self::check_splits(tx)?;
        let height = block_height(view);
        if let Some(existing) = view.get_split_rule(&tx.resource_id) {
            if !existing.is_expired(height) && existing.initiator != tx.initiator.address {
                return Err(TxError::SplitRuleOwnedByOther {
                    resource_id: tx.resource_id.clone(),
                });
            }
        }

        let sign_bytes = tx.sign_bytes(&ctx.chain_id);
        validate_input_advanced(&account, &sign_bytes, &tx.initiator)?;
        sanity_check_for_fee(&self.config, &tx.fee)?;
        check_conservation(&tx.initiator.coins, &[], &tx.fee)
    }

    fn process(
        &self,
        ctx: &ExecutionContext,
        view: &mut dyn StoreView,
        tx: &SplitRuleTx,
    ) -> TxResult<ProcessedTx> {
        let height = block_height(&*view);
        let inputs = std::slice::from_ref(&tx.initiator);
        let mut accounts = get_inputs(&*view, inputs)?;
        adjust_by_inputs(view, &mut accounts, inputs)?;

        view.set_split_rule(SplitRule {
            resource_id: tx.resource_id.clone(),
            initiator: tx.initiator.address,
            splits: tx.splits.clone(),
            end_block_height: height.saturating_add(tx.duration),
        });

        Ok(ProcessedTx {
            tx_hash: tx.hash(&ctx.chain_id),
            contract: None,
        })
    }

    fn tx_info(&self, tx: &SplitRuleTx) -> TxInfo {
        TxInfo {
            address: tx.initiator.address,
            sequence: tx.initiator.sequence,
            effective_gas_price: effective_gas_price(&tx.fee, 1, self.config.gas_per_account),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executors::test_support::*;
    use ed25519_dalek::SigningKey;
    use ledger_primitives::{Coins, Split, Tx, TxInput};

    fn split_tx(owner: &SigningKey, resource_id: &str, percentages: &[u32], seq: u64) -> SplitRuleTx {
        let mut tx = Tx::SplitRule(SplitRuleTx {
            fee: Coins::secondary(10u64),
            resource_id: resource_id.into(),
            initiator: TxInput::new(addr(owner), Coins::secondary(10u64), seq),
            splits: percentages
                .iter()
                .enumerate()
                .map(|(i, p)| Split {
                    address: [i as u8 + 1; 20],
                    percentage: *p,
                })
                .collect(),
            duration: 100,
        });
        tx.sign(CHAIN_ID, owner);
        match tx {
            Tx::SplitRule(tx) => tx,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_register_split_rule() {
        let alice = key(1);
        let store = store([funded(&alice, 0, 1000)]);
        let exec = SplitRuleExecutor::new(config());
        let tx = split_tx(&alice, "video", &[30, 70], 1);

        let mut view = store.mutable_view();
        exec.sanity_check(&ctx(), &view, &tx).unwrap();
        exec.process(&ctx(), &mut view, &tx).unwrap();

        let rule = view.get_split_rule("video").unwrap();
        assert_eq!(rule.initiator, addr(&alice));
        assert_eq!(rule.splits.len(), 2);
        assert_eq!(rule.end_block_height, 101);
        assert_eq!(
            view.get_account(&addr(&alice)).unwrap().balance,
            Coins::secondary(990u64)
        );
    }

    #[test]
    fn test_percentage_bounds() {
        let alice = key(1);
        let store = store([funded(&alice, 0, 1000)]);
        let exec = SplitRuleExecutor::new(config());
        let view = store.snapshot();

        assert!(exec
            .sanity_check(&ctx(), &view, &split_tx(&alice, "r", &[100], 1))
            .is_ok());
        assert!(exec
            .sanity_check(&ctx(), &view, &split_tx(&alice, "r", &[0], 1))
            .is_ok());
        assert!(matches!(
            exec.sanity_check(&ctx(), &view, &split_tx(&alice, "r", &[101], 1)),
            Err(TxError::InvalidSplitPercentage(_))
        ));
        assert!(matches!(
            exec.sanity_check(&ctx(), &view, &split_tx(&alice, "r", &[60, 41], 1)),
            Err(TxError::InvalidSplitPercentage(_))
        ));
    }

    #[test]
    fn test_cannot_take_over_live_rule() {
        let alice = key(1);
        let bob = key(2);
        let store = store([funded(&alice, 0, 1000), funded(&bob, 0, 1000)]);
        let exec = SplitRuleExecutor::new(config());

        let mut view = store.mutable_view();
        exec.process(&ctx(), &mut view, &split_tx(&alice, "video", &[50], 1))
            .unwrap();

        let takeover = split_tx(&bob, "video", &[50], 1);
        assert!(matches!(
            exec.sanity_check(&ctx(), &view, &takeover),
            Err(TxError::SplitRuleOwnedByOther { .. })
        ));

        // the owner may overwrite its own rule
        let update = split_tx(&alice, "video", &[20], 2);
        assert!(exec.sanity_check(&ctx(), &view, &update).is_ok());
    }
}
