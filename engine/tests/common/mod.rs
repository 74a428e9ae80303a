//! Shared test helpers for integration tests.
//!
//! Provides deterministic keypairs, signed transaction builders, store
//! helpers and a deterministic fake VM used across all integration test
//! files.

#![allow(dead_code)]

use std::sync::Arc;

use ed25519_dalek::SigningKey;
use ledger_engine::{ContractOutcome, ExecutionContext, Executor, MemStore, StoreView, VirtualMachine};
use ledger_primitives::{
    crypto::{address_from_public_key, hash_blake3},
    Account, Address, BlockRef, Coins, GasMeter, LedgerConfig, ReleaseFundTx, ReserveFundTx,
    SendTx, SmartContractTx, Tx, TxInput, TxOutput, U256, ZERO_ADDRESS,
};

pub const CHAIN_ID: &str = "ledger-integration-test";

/// Fee used by every builder. Equal to the lowered test fee floor.
pub const FEE: u64 = 10;

// ── Deterministic Keypairs ──

/// Create a deterministic Ed25519 signing key from a single seed byte.
///
/// The secret key is `[seed; 32]`, giving reproducible keys across machines.
pub fn deterministic_keypair(seed: u8) -> (Address, SigningKey) {
    let signing_key = SigningKey::from_bytes(&[seed; 32]);
    let address = address_from_public_key(signing_key.verifying_key().as_bytes());
    (address, signing_key)
}

pub fn alice() -> (Address, SigningKey) {
    deterministic_keypair(1)
}

pub fn bob() -> (Address, SigningKey) {
    deterministic_keypair(2)
}

pub fn charlie() -> (Address, SigningKey) {
    deterministic_keypair(3)
}

// ── Configuration ──

/// Default chain rules with a fee floor of [`FEE`] secondary wei.
pub fn test_config() -> LedgerConfig {
    LedgerConfig {
        minimum_transaction_fee: U256::from(FEE),
        ..LedgerConfig::default()
    }
}

pub fn executor() -> Executor {
    Executor::new(test_config(), Arc::new(FakeVm))
}

/// Context for the block after `view`'s current height.
pub fn ctx_for(view: &dyn StoreView) -> ExecutionContext {
    let parent = BlockRef {
        height: view.height(),
        ..BlockRef::genesis()
    };
    ExecutionContext::new(CHAIN_ID, parent)
}

// ── State Builders ──

pub fn account(address: Address, sequence: u64, primary: u64, secondary: u64) -> Account {
    let mut acct = Account::new(address);
    acct.sequence = sequence;
    acct.balance = Coins::new(U256::from(primary), U256::from(secondary));
    acct
}

pub fn funded_store(accounts: impl IntoIterator<Item = Account>) -> MemStore {
    MemStore::with_genesis(accounts)
}

// ── Transaction Builders ──

/// Single-input single-output send paying [`FEE`], signed by `key`.
pub fn send_tx(key: &SigningKey, sequence: u64, to: Address, amount: Coins) -> Tx {
    let from = address_from_public_key(key.verifying_key().as_bytes());
    let spend = amount.plus(&Coins::secondary(FEE)).unwrap();
    let mut tx = Tx::Send(SendTx {
        fee: Coins::secondary(FEE),
        inputs: vec![TxInput::new(from, spend, sequence)],
        outputs: vec![TxOutput::new(to, amount)],
    });
    tx.sign(CHAIN_ID, key);
    tx
}

pub fn reserve_fund_tx(key: &SigningKey, sequence: u64, fund: u64, collateral: u64, duration: u64) -> Tx {
    let from = address_from_public_key(key.verifying_key().as_bytes());
    let mut tx = Tx::ReserveFund(ReserveFundTx {
        fee: Coins::secondary(FEE),
        source: TxInput::new(from, Coins::secondary(fund), sequence),
        resource_ids: vec!["stream-42".into()],
        collateral: Coins::secondary(collateral),
        duration,
    });
    tx.sign(CHAIN_ID, key);
    tx
}

pub fn release_fund_tx(key: &SigningKey, sequence: u64, reserve_sequence: u64) -> Tx {
    let from = address_from_public_key(key.verifying_key().as_bytes());
    let mut tx = Tx::ReleaseFund(ReleaseFundTx {
        fee: Coins::secondary(FEE),
        source: TxInput::new(from, Coins::secondary(FEE), sequence),
        reserve_sequence,
    });
    tx.sign(CHAIN_ID, key);
    tx
}

pub fn contract_tx(key: &SigningKey, sequence: u64, to: Address, value: u64, data: Vec<u8>, gas_limit: u64) -> Tx {
    let from = address_from_public_key(key.verifying_key().as_bytes());
    let mut tx = Tx::SmartContract(SmartContractTx {
        from: TxInput::new(from, Coins::secondary(value), sequence),
        to: TxOutput::new(to, Coins::zero()),
        gas_limit,
        gas_price: U256::from(FakeVm::GAS_PRICE),
        data,
    });
    tx.sign(CHAIN_ID, key);
    tx
}

// ── Fake VM ──

/// Deterministic stand-in for the contract interpreter.
///
/// Charges a flat base plus a per-byte cost, moves the call value to the
/// contract, and fails with all gas consumed when the data starts with
/// `0xfe`. Deployments land at the last 20 bytes of
/// `blake3(caller || sequence)`.
pub struct FakeVm;

impl FakeVm {
    pub const BASE_GAS: u64 = 21_000;
    pub const GAS_PER_BYTE: u64 = 16;
    pub const GAS_PRICE: u64 = 100_000_000;

    pub fn deployed_address(caller: &Address, sequence: u64) -> Address {
        let mut preimage = caller.to_vec();
        preimage.extend_from_slice(&sequence.to_le_bytes());
        let digest = hash_blake3(&preimage);
        let mut address = [0u8; 20];
        address.copy_from_slice(&digest[12..]);
        address
    }
}

impl VirtualMachine for FakeVm {
    fn execute(&self, _parent: &BlockRef, tx: &SmartContractTx, view: &mut dyn StoreView) -> ContractOutcome {
        let contract_address = if tx.to.address == ZERO_ADDRESS {
            Self::deployed_address(&tx.from.address, tx.from.sequence)
        } else {
            tx.to.address
        };
        let mut meter = GasMeter::new(tx.gas_limit);
        let fail = |meter: &mut GasMeter, reason: String| {
            meter.exhaust();
            ContractOutcome {
                contract_address,
                gas_used: meter.consumed(),
                vm_error: Some(reason),
                ..ContractOutcome::default()
            }
        };

        let cost = Self::BASE_GAS + Self::GAS_PER_BYTE * tx.data.len() as u64;
        if let Err(err) = meter.consume(cost) {
            return fail(&mut meter, err.to_string());
        }
        if tx.data.first() == Some(&0xfe) {
            return fail(&mut meter, "invalid opcode 0xfe".into());
        }

        let mut caller = view.get_account(&tx.from.address).unwrap();
        caller.balance = caller.balance.minus(&tx.from.coins).unwrap();
        view.set_account(caller);
        let mut contract = view
            .get_account(&contract_address)
            .unwrap_or_else(|| Account::new(contract_address));
        if contract.code_hash.is_none() {
            contract.code_hash = Some(hash_blake3(&tx.data));
        }
        contract.balance = contract.balance.plus(&tx.from.coins).unwrap();
        view.set_account(contract);

        ContractOutcome {
            return_data: contract_address.to_vec(),
            contract_address,
            gas_used: meter.consumed(),
            logs: Vec::new(),
            vm_error: None,
        }
    }
}
