//! The ledger service: what a node exposes over RPC.
//!
//! Broadcast transactions are checked against a *check view*, a snapshot of
//! the latest committed state onto which every pooled transaction has been
//! applied. A sender can therefore queue several transactions with
//! consecutive sequence numbers before any of them is committed. The check
//! view is a snapshot, so none of this can reach the store.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ledger_engine::{BlockResult, ExecutionContext, Executor, LedgerView, MemStore, StoreView, VirtualMachine};
use ledger_primitives::{
    codec::decode_tx,
    types::{address_to_hex, hash_to_hex},
    BlockRef, LedgerConfig, Tx, TxError,
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, warn};

use crate::error::{RpcError, RpcResult};
use crate::txpool::TxPool;
use crate::types::{
    decode_hex, parse_address, AccountResult, BroadcastRawTransactionArgs,
    BroadcastRawTransactionResult, CallSmartContractArgs, CallSmartContractResult, GetAccountArgs,
    PendingTransactionResult, PendingTransactionsArgs,
};

pub const DEFAULT_POOL_CAPACITY: usize = 4096;

struct PoolState {
    pool: TxPool,
    check_view: LedgerView,
    parent: BlockRef,
}

pub struct LedgerService {
    chain_id: String,
    store: MemStore,
    executor: Executor,
    vm: Arc<dyn VirtualMachine>,
    state: Mutex<PoolState>,
}

impl std::fmt::Debug for LedgerService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerService")
            .field("chain_id", &self.chain_id)
            .field("executor", &self.executor)
            .finish_non_exhaustive()
    }
}

impl LedgerService {
    pub fn new(
        chain_id: impl Into<String>,
        store: MemStore,
        config: LedgerConfig,
        vm: Arc<dyn VirtualMachine>,
    ) -> Self {
        Self::with_pool_capacity(chain_id, store, config, vm, DEFAULT_POOL_CAPACITY)
    }

    pub fn with_pool_capacity(
        chain_id: impl Into<String>,
        store: MemStore,
        config: LedgerConfig,
        vm: Arc<dyn VirtualMachine>,
        capacity: usize,
    ) -> Self {
        let check_view = store.snapshot();
        let parent = BlockRef {
            height: check_view.height(),
            ..BlockRef::genesis()
        };
        Self {
            chain_id: chain_id.into(),
            executor: Executor::new(config, Arc::clone(&vm)),
            vm,
            state: Mutex::new(PoolState {
                pool: TxPool::new(capacity),
                check_view,
                parent,
            }),
            store,
        }
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn context(&self, parent: BlockRef) -> ExecutionContext {
        ExecutionContext::new(self.chain_id.clone(), parent)
    }

    /// Decode, check against the pending state and enqueue a transaction.
    pub fn broadcast_raw_transaction(
        &self,
        args: BroadcastRawTransactionArgs,
    ) -> RpcResult<BroadcastRawTransactionResult> {
        let raw = decode_hex(&args.tx_bytes)?;
        let tx = decode_tx(&raw)?;
        let hash = tx.hash(&self.chain_id);

        let mut state = self.lock();
        if state.pool.contains(&hash) {
            return Err(RpcError::AlreadyPending(hash_to_hex(&hash)));
        }
        let ctx = self.context(state.parent);
        let mut candidate = state.check_view.clone();
        if let Err(err) = self.executor.execute_tx(&ctx, &mut candidate, &tx) {
            debug!(kind = %tx.kind(), code = %err.code(), error = %err, "rejected broadcast transaction");
            return Err(err.into());
        }

        let info = self.executor.tx_info(&tx);
        state.pool.insert(hash, tx, info, raw)?;
        state.check_view = candidate;
        debug!(
            hash = %hash_to_hex(&hash),
            price = %info.effective_gas_price,
            pending = state.pool.len(),
            "queued transaction"
        );

        Ok(BroadcastRawTransactionResult {
            hash: hash_to_hex(&hash),
            block: None,
        })
    }

    /// Run a contract transaction against a throwaway snapshot of the latest
    /// committed state. Nothing is charged and nothing is kept.
    pub fn call_smart_contract(&self, args: CallSmartContractArgs) -> RpcResult<CallSmartContractResult> {
        let mut snapshot = self.store.snapshot();
        let height = snapshot.height() + 1;
        let enabled_at = self.executor.config().feature_heights.smart_contract;
        if height < enabled_at {
            return Err(RpcError::SmartContractsDisabled { enabled_at });
        }

        let raw = decode_hex(&args.sctx_bytes)?;
        let sctx = match decode_tx(&raw)? {
            Tx::SmartContract(sctx) => sctx,
            other => return Err(RpcError::NotSmartContract(other.kind())),
        };

        let parent = self.lock().parent;
        let outcome = self.vm.execute(&parent, &sctx, &mut snapshot);
        Ok(CallSmartContractResult {
            vm_return: hex::encode(&outcome.return_data),
            contract_address: address_to_hex(&outcome.contract_address),
            gas_used: outcome.gas_used,
            vm_error: outcome.vm_error.unwrap_or_default(),
        })
    }

    /// Account as of the latest committed block.
    pub fn get_account(&self, args: GetAccountArgs) -> RpcResult<AccountResult> {
        let address = parse_address(&args.address)?;
        let account = self
            .store
            .snapshot()
            .get_account(&address)
            .ok_or_else(|| RpcError::AccountNotFound(address_to_hex(&address)))?;
        Ok(AccountResult::from(&account))
    }

    pub fn pending_transactions(&self, args: PendingTransactionsArgs) -> Vec<PendingTransactionResult> {
        self.lock()
            .pool
            .pending(args.limit)
            .map(|entry| PendingTransactionResult {
                hash: hash_to_hex(&entry.hash),
                kind: entry.tx.kind().to_string(),
                address: address_to_hex(&entry.info.address),
                sequence: entry.info.sequence,
                effective_gas_price: entry.info.effective_gas_price.to_string(),
            })
            .collect()
    }

    /// Raw bytes of up to `limit` pooled transactions for a block proposer,
    /// by price but with each sender's transactions in sequence order.
    pub fn reap(&self, limit: usize) -> Vec<Vec<u8>> {
        self.lock()
            .pool
            .proposal(limit)
            .into_iter()
            .map(|entry| entry.raw.clone())
            .collect()
    }

    /// Track a newly committed block: drop the transactions it accepted and
    /// rebuild the check view on the new state, evicting pooled
    /// transactions that no longer apply. A transaction the block rejected
    /// stays pooled until the re-check says otherwise.
    pub fn on_block_committed(&self, result: &BlockResult) {
        let mut state = self.lock();
        for receipt in result.receipts.iter().filter(|r| r.accepted()) {
            if let Some(hash) = receipt.tx_hash {
                state.pool.remove(&hash);
            }
        }

        let parent = result.header.as_parent();
        let ctx = self.context(parent);
        let mut check_view = self.store.snapshot();
        let survivors: Vec<_> = state
            .pool
            .by_arrival()
            .into_iter()
            .map(|entry| (entry.hash, entry.tx.clone()))
            .collect();
        let mut evicted = 0usize;
        for (hash, tx) in survivors {
            let mut candidate = check_view.clone();
            match self.executor.execute_tx(&ctx, &mut candidate, &tx) {
                Ok(_) => check_view = candidate,
                Err(err) => {
                    if let TxError::InvariantViolation(_) = err {
                        warn!(hash = %hash_to_hex(&hash), "invariant violation while re-checking pooled transaction");
                    }
                    state.pool.remove(&hash);
                    evicted += 1;
                }
            }
        }

        state.check_view = check_view;
        state.parent = parent;
        info!(
            height = parent.height,
            pending = state.pool.len(),
            evicted,
            "pool rebased on committed block"
        );
    }

    /// JSON dispatcher for an RPC transport.
    pub fn handle(&self, method: &str, params: serde_json::Value) -> RpcResult<serde_json::Value> {
        match method {
            "ledger.BroadcastRawTransaction" => {
                respond(self.broadcast_raw_transaction(parse_params(params)?)?)
            }
            "ledger.CallSmartContract" => respond(self.call_smart_contract(parse_params(params)?)?),
            "ledger.GetAccount" => respond(self.get_account(parse_params(params)?)?),
            "ledger.PendingTransactions" => {
                respond(self.pending_transactions(parse_params(params)?))
            }
            other => Err(RpcError::MethodNotFound(other.to_string())),
        }
    }
}

fn parse_params<T: DeserializeOwned>(params: serde_json::Value) -> RpcResult<T> {
    Ok(serde_json::from_value(params)?)
}

fn respond<T: Serialize>(result: T) -> RpcResult<serde_json::Value> {
    serde_json::to_value(result).map_err(|e| RpcError::Internal(e.to_string()))
}
