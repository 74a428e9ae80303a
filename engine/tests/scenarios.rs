//! End-to-end transaction scenarios through the dispatcher.

mod common;

use ledger_engine::{LedgerView, StoreView};
use ledger_primitives::{
    codec::encode_tx, Coins, ErrorCode, SendTx, Tx, TxError, TxInput, TxOutput, U256,
};

use common::*;

/// Commit empty blocks until `view` sits at `height`.
fn advance_to(view: &mut LedgerView, height: u64) {
    let exec = executor();
    while view.height() < height {
        let ctx = ctx_for(&*view);
        exec.apply_block(&ctx, view, &[]).unwrap();
    }
}

// ── Test: simple send ──

#[test]
fn test_simple_send() {
    let (alice_addr, alice_sk) = alice();
    let (bob_addr, _) = bob();
    let store = funded_store([account(alice_addr, 5, 1000, 1000)]);
    let exec = executor();

    let tx = send_tx(&alice_sk, 6, bob_addr, Coins::secondary(100u64));
    let mut view = store.mutable_view();
    let ctx = ctx_for(&view);
    exec.execute_tx(&ctx, &mut view, &tx).unwrap();

    let a = view.get_account(&alice_addr).unwrap();
    let b = view.get_account(&bob_addr).unwrap();
    assert_eq!(a.balance, Coins::new(U256::from(1000u64), U256::from(890u64)));
    assert_eq!(a.sequence, 6);
    assert_eq!(b.balance, Coins::secondary(100u64));
    assert_eq!(b.sequence, 0);
}

// ── Test: replay ──

#[test]
fn test_replay_rejected() {
    let (alice_addr, alice_sk) = alice();
    let (bob_addr, _) = bob();
    let store = funded_store([account(alice_addr, 5, 1000, 1000)]);
    let exec = executor();
    let tx = send_tx(&alice_sk, 6, bob_addr, Coins::secondary(100u64));

    let mut view = store.mutable_view();
    let ctx = ctx_for(&view);
    exec.apply_block(&ctx, &mut view, &[encode_tx(&tx)]).unwrap();

    let ctx = ctx_for(&view);
    let err = exec.sanity_check_tx(&ctx, &view, &tx).unwrap_err();
    assert_eq!(
        err,
        TxError::InvalidSequence {
            address: alice_addr,
            expected: 7,
            got: 6
        }
    );
}

// ── Test: fee floor ──

#[test]
fn test_fee_below_floor() {
    let (alice_addr, alice_sk) = alice();
    let (bob_addr, _) = bob();
    let store = funded_store([account(alice_addr, 0, 0, 1000)]);

    let mut tx = Tx::Send(SendTx {
        fee: Coins::secondary(FEE - 1),
        inputs: vec![TxInput::new(alice_addr, Coins::secondary(100 + FEE - 1), 1)],
        outputs: vec![TxOutput::new(bob_addr, Coins::secondary(100u64))],
    });
    tx.sign(CHAIN_ID, &alice_sk);

    let view = store.snapshot();
    let err = executor().sanity_check_tx(&ctx_for(&view), &view, &tx).unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidFee);
}

#[test]
fn test_mainnet_fee_floor_applies_by_default() {
    let (alice_addr, alice_sk) = alice();
    let (bob_addr, _) = bob();
    let store = funded_store([account(alice_addr, 0, 0, 1000)]);
    let exec = ledger_engine::Executor::new(
        ledger_primitives::LedgerConfig::default(),
        std::sync::Arc::new(FakeVm),
    );

    let tx = send_tx(&alice_sk, 1, bob_addr, Coins::secondary(100u64));
    let view = store.snapshot();
    assert!(matches!(
        exec.sanity_check_tx(&ctx_for(&view), &view, &tx),
        Err(TxError::InvalidFee { .. })
    ));
}

// ── Test: account cap boundary ──

fn fan_out(count_outputs: usize) -> (ledger_engine::MemStore, Tx) {
    let (alice_addr, alice_sk) = alice();
    let store = funded_store([account(alice_addr, 0, 0, 1_000_000)]);
    let outputs: Vec<TxOutput> = (0..count_outputs)
        .map(|i| {
            let mut address = [0xa0; 20];
            address[..8].copy_from_slice(&(i as u64 + 1).to_le_bytes());
            TxOutput::new(address, Coins::secondary(1u64))
        })
        .collect();
    let mut tx = Tx::Send(SendTx {
        fee: Coins::secondary(FEE),
        inputs: vec![TxInput::new(
            alice_addr,
            Coins::secondary(count_outputs as u64 + FEE),
            1,
        )],
        outputs,
    });
    tx.sign(CHAIN_ID, &alice_sk);
    (store, tx)
}

#[test]
fn test_account_cap_boundary() {
    let exec = executor();

    let (store, at_cap) = fan_out(511);
    let mut view = store.mutable_view();
    let ctx = ctx_for(&view);
    exec.execute_tx(&ctx, &mut view, &at_cap).unwrap();

    let (store, over_cap) = fan_out(512);
    let view = store.snapshot();
    assert_eq!(
        exec.sanity_check_tx(&ctx_for(&view), &view, &over_cap),
        Err(TxError::TooManyAccounts {
            count: 513,
            max: 512
        })
    );
}

// ── Test: reservation lifecycle ──

#[test]
fn test_reservation_lifecycle() {
    let (alice_addr, alice_sk) = alice();
    let store = funded_store([account(alice_addr, 0, 0, 10_000)]);
    let exec = executor();
    let freeze = exec.config().reserved_fund_freeze_period;

    // reserved in block H = 1
    let mut view = store.mutable_view();
    let ctx = ctx_for(&view);
    let reserve = reserve_fund_tx(&alice_sk, 1, 100, 500, 1000);
    let result = exec.apply_block(&ctx, &mut view, &[encode_tx(&reserve)]).unwrap();
    assert!(result.receipts[0].accepted());
    let reserved_at = result.version.height;

    let release = release_fund_tx(&alice_sk, 2, 1);

    advance_to(&mut view, reserved_at + freeze - 2);
    let ctx = ctx_for(&view);
    let frozen = exec.apply_block(&ctx, &mut view, &[encode_tx(&release)]).unwrap();
    assert_eq!(frozen.version.height, reserved_at + freeze - 1);
    assert_eq!(frozen.receipts[0].code, ErrorCode::FundStillFrozen);

    let ctx = ctx_for(&view);
    let thawed = exec.apply_block(&ctx, &mut view, &[encode_tx(&release)]).unwrap();
    assert_eq!(thawed.version.height, reserved_at + freeze);
    assert!(thawed.receipts[0].accepted());

    let acct = store.snapshot().get_account(&alice_addr).unwrap();
    assert!(acct.reserved_funds.is_empty());
    assert_eq!(acct.sequence, 2);
    // only the two fees are gone
    assert_eq!(acct.balance, Coins::secondary(10_000 - 2 * FEE));
}

#[test]
fn test_release_unknown_reservation() {
    let (alice_addr, alice_sk) = alice();
    let store = funded_store([account(alice_addr, 0, 0, 10_000)]);
    let view = store.snapshot();
    let err = executor()
        .sanity_check_tx(&ctx_for(&view), &view, &release_fund_tx(&alice_sk, 1, 7))
        .unwrap_err();
    assert_eq!(err, TxError::NoMatchingReservation(7));
}

// ── Test: contracts ──

#[test]
fn test_contract_deploy_and_failed_call() {
    let (alice_addr, alice_sk) = alice();
    let start = 10u64.pow(15);
    let store = funded_store([account(alice_addr, 0, 0, start)]);
    let exec = executor();

    let deploy = contract_tx(&alice_sk, 1, ledger_primitives::ZERO_ADDRESS, 1000, vec![0x60; 4], 100_000);
    let contract = FakeVm::deployed_address(&alice_addr, 1);
    let failing = contract_tx(&alice_sk, 2, contract, 0, vec![0xfe], 50_000);

    let mut view = store.mutable_view();
    let ctx = ctx_for(&view);
    let result = exec
        .apply_block(&ctx, &mut view, &[encode_tx(&deploy), encode_tx(&failing)])
        .unwrap();

    let deployed = result.receipts[0].contract.as_ref().unwrap();
    assert!(deployed.succeeded());
    assert_eq!(deployed.contract_address, contract);
    assert_eq!(deployed.gas_used, FakeVm::BASE_GAS + 4 * FakeVm::GAS_PER_BYTE);

    // a VM failure is still an accepted transaction
    assert!(result.receipts[1].accepted());
    let failed = result.receipts[1].contract.as_ref().unwrap();
    assert!(!failed.succeeded());
    assert_eq!(failed.gas_used, 50_000);
    assert_eq!(result.receipts[1].message, "vm execution error: invalid opcode 0xfe");

    let snapshot = store.snapshot();
    let caller = snapshot.get_account(&alice_addr).unwrap();
    assert_eq!(caller.sequence, 2);
    let gas = deployed.gas_used + failed.gas_used;
    let spent = 1000 + FakeVm::GAS_PRICE * gas;
    assert_eq!(caller.balance, Coins::secondary(start - spent));

    let deployed_acct = snapshot.get_account(&contract).unwrap();
    assert!(deployed_acct.is_smart_contract());
    assert_eq!(deployed_acct.balance, Coins::secondary(1000u64));
}

#[test]
fn test_send_to_contract_disallowed() {
    let (alice_addr, alice_sk) = alice();
    let store = funded_store([account(alice_addr, 0, 0, 10u64.pow(15))]);
    let exec = executor();

    let deploy = contract_tx(&alice_sk, 1, ledger_primitives::ZERO_ADDRESS, 0, vec![0x60], 100_000);
    let contract = FakeVm::deployed_address(&alice_addr, 1);
    let mut view = store.mutable_view();
    let ctx = ctx_for(&view);
    exec.apply_block(&ctx, &mut view, &[encode_tx(&deploy)]).unwrap();

    let send = send_tx(&alice_sk, 2, contract, Coins::secondary(5u64));
    let ctx = ctx_for(&view);
    let err = exec.sanity_check_tx(&ctx, &view, &send).unwrap_err();
    assert_eq!(err.code(), ErrorCode::DisallowedRecipient);
}

// ── Test: unknown sender ──

#[test]
fn test_fresh_key_has_no_account() {
    let (vk, sk) = ledger_primitives::crypto::generate_keypair();
    let stranger = ledger_primitives::crypto::address_from_public_key(vk.as_bytes());
    let (bob_addr, _) = bob();
    let store = funded_store([account(bob_addr, 0, 0, 1000)]);

    let tx = send_tx(&sk, 1, bob_addr, Coins::secondary(1u64));
    let view = store.snapshot();
    assert_eq!(
        executor().sanity_check_tx(&ctx_for(&view), &view, &tx),
        Err(TxError::UnknownAddress(stranger))
    );
}
