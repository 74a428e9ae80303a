//! Shared input/output/fee/sequence validation.
//!
//! Every executor builds its sanity check out of these functions and its
//! balance and sequence changes out of [`adjust_by_inputs`],
//! [`adjust_by_outputs`], [`debit_and_bump`] and [`credit_account`]. The
//! checks never mutate the view; the adjustments never fail unless the engine
//! itself is broken.

use std::collections::BTreeMap;

use ledger_primitives::{
    types::is_zero_address, Account, Address, BlockHeight, Coins, LedgerConfig, TxError, TxInput,
    TxKind, TxOutput, TxResult,
};
use tracing::{error, trace};

use crate::view::StoreView;

/// Structural checks shared by every kind of input.
fn check_input_structure(input: &TxInput) -> TxResult<()> {
    if is_zero_address(&input.address) {
        return Err(TxError::MalformedInput("input has the zero address".into()));
    }
    if input.sequence == 0 {
        return Err(TxError::MalformedInput("input sequence must be positive".into()));
    }
    Ok(())
}

/// Reject inputs with the zero address, a zero sequence or nothing to
/// spend.
pub fn validate_inputs_basic(inputs: &[TxInput]) -> TxResult<()> {
    for input in inputs {
        check_input_structure(input)?;
        if !input.coins.is_positive() {
            return Err(TxError::MalformedInput("input amount must be positive".into()));
        }
    }
    Ok(())
}

/// Basic checks for a contract caller, whose attached value may be zero.
pub fn validate_caller_basic(caller: &TxInput) -> TxResult<()> {
    check_input_structure(caller)
}

/// Reject outputs with the zero address.
pub fn validate_outputs_basic(outputs: &[TxOutput]) -> TxResult<()> {
    if outputs.iter().any(|o| is_zero_address(&o.address)) {
        return Err(TxError::MalformedInput("output has the zero address".into()));
    }
    Ok(())
}

/// Fail with `TooManyAccounts` when a transaction touches more accounts than
/// the configured cap.
pub fn check_account_cap(config: &LedgerConfig, count: usize) -> TxResult<()> {
    if count > config.max_accounts_affected_per_tx {
        return Err(TxError::TooManyAccounts {
            count,
            max: config.max_accounts_affected_per_tx,
        });
    }
    Ok(())
}

/// Load every input account. Inputs must name existing, distinct accounts.
pub fn get_inputs(
    view: &dyn StoreView,
    inputs: &[TxInput],
) -> TxResult<BTreeMap<Address, Account>> {
    let mut accounts = BTreeMap::new();
    for input in inputs {
        if accounts.contains_key(&input.address) {
            return Err(TxError::MalformedInput("duplicate input address".into()));
        }
        let account = view
            .get_account(&input.address)
            .ok_or(TxError::UnknownAddress(input.address))?;
        accounts.insert(input.address, account);
    }
    Ok(accounts)
}

/// Load output accounts into `accounts`, creating missing ones in memory
/// only. An address that is already present (because it is also an input)
/// keeps its single shared record.
pub fn get_or_make_outputs(
    view: &dyn StoreView,
    accounts: &mut BTreeMap<Address, Account>,
    outputs: &[TxOutput],
) {
    for output in outputs {
        accounts
            .entry(output.address)
            .or_insert_with(|| {
                view.get_account(&output.address)
                    .unwrap_or_else(|| Account::new(output.address))
            });
    }
}

/// Check one input against its account: sequence, then signature, then
/// balance.
pub fn validate_input_advanced(
    account: &Account,
    sign_bytes: &[u8],
    input: &TxInput,
) -> TxResult<()> {
    let expected = account.sequence + 1;
    if input.sequence != expected {
        return Err(TxError::InvalidSequence {
            address: input.address,
            expected,
            got: input.sequence,
        });
    }

    let signed = input
        .signature
        .as_ref()
        .is_some_and(|sig| sig.verify(&input.address, sign_bytes));
    if !signed {
        return Err(TxError::InvalidSignature(input.address));
    }

    if !account.balance.is_gte(&input.coins) {
        return Err(TxError::InsufficientFunds {
            address: input.address,
            balance: account.balance,
            need: input.coins,
        });
    }
    Ok(())
}

/// Validate every input and return their summed coins.
pub fn validate_inputs_advanced(
    accounts: &BTreeMap<Address, Account>,
    sign_bytes: &[u8],
    inputs: &[TxInput],
) -> TxResult<Coins> {
    for input in inputs {
        let account = accounts
            .get(&input.address)
            .ok_or(TxError::UnknownAddress(input.address))?;
        validate_input_advanced(account, sign_bytes, input)?;
    }
    Ok(Coins::sum(inputs.iter().map(|i| &i.coins))?)
}

/// Fee floor: the secondary denomination must reach the configured minimum.
pub fn sanity_check_for_fee(config: &LedgerConfig, fee: &Coins) -> TxResult<()> {
    if fee.secondary_wei() < config.minimum_transaction_fee {
        return Err(TxError::InvalidFee {
            minimum: config.minimum_transaction_fee,
            got: fee.secondary_wei(),
        });
    }
    Ok(())
}

/// `sum(inputs) == sum(outputs) + fee`, in both denominations.
pub fn check_conservation(in_total: &Coins, outputs: &[TxOutput], fee: &Coins) -> TxResult<()> {
    let out_total = Coins::sum(outputs.iter().map(|o| &o.coins))?;
    let outputs_plus_fee = out_total.plus(fee)?;
    if *in_total != outputs_plus_fee {
        return Err(TxError::ConservationViolation {
            inputs: *in_total,
            outputs_plus_fee,
        });
    }
    Ok(())
}

/// Once smart contracts are enabled, value may only reach a contract
/// through a contract transaction.
pub fn check_recipients(
    config: &LedgerConfig,
    height: BlockHeight,
    kind: TxKind,
    accounts: &BTreeMap<Address, Account>,
    outputs: &[TxOutput],
) -> TxResult<()> {
    if !config.feature_heights.smart_contract_enabled(height) {
        return Ok(());
    }
    for output in outputs {
        let is_contract = accounts
            .get(&output.address)
            .is_some_and(Account::is_smart_contract);
        if is_contract {
            return Err(TxError::DisallowedRecipient {
                address: output.address,
                kind,
            });
        }
    }
    Ok(())
}

/// Report an arithmetic contradiction found after a passing sanity check.
pub(crate) fn invariant(what: impl Into<String>) -> TxError {
    let what = what.into();
    error!(%what, "invariant violation while processing transaction");
    TxError::InvariantViolation(what)
}

/// Debit `amount` from `account`, bump its sequence by one and write it
/// through the view. Every sequence increment in the engine goes through
/// here.
pub fn debit_and_bump(
    view: &mut dyn StoreView,
    account: &mut Account,
    amount: &Coins,
) -> TxResult<()> {
    account.balance = account
        .balance
        .minus(amount)
        .map_err(|e| invariant(format!("debit of {amount}: {e}")))?;
    account.sequence += 1;
    trace!(
        address = %ledger_primitives::types::address_to_hex(&account.address),
        sequence = account.sequence,
        "debited account"
    );
    view.set_account(account.clone());
    Ok(())
}

/// Credit `amount` to `account` and write it through the view.
pub fn credit_account(
    view: &mut dyn StoreView,
    account: &mut Account,
    amount: &Coins,
) -> TxResult<()> {
    account.balance = account
        .balance
        .plus(amount)
        .map_err(|e| invariant(format!("credit of {amount}: {e}")))?;
    trace!(
        address = %ledger_primitives::types::address_to_hex(&account.address),
        "credited account"
    );
    view.set_account(account.clone());
    Ok(())
}

/// Debit each input, bump its sequence by one and write it through the view.
pub fn adjust_by_inputs(
    view: &mut dyn StoreView,
    accounts: &mut BTreeMap<Address, Account>,
    inputs: &[TxInput],
) -> TxResult<()> {
    for input in inputs {
        let account = accounts
            .get_mut(&input.address)
            .ok_or_else(|| invariant("input account not loaded"))?;
        debit_and_bump(view, account, &input.coins)?;
    }
    Ok(())
}

/// Credit each output and write it through the view.
pub fn adjust_by_outputs(
    view: &mut dyn StoreView,
    accounts: &mut BTreeMap<Address, Account>,
    outputs: &[TxOutput],
) -> TxResult<()> {
    for output in outputs {
        let account = accounts
            .get_mut(&output.address)
            .ok_or_else(|| invariant("output account not loaded"))?;
        credit_account(view, account, &output.coins)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::MemStore;
    use ed25519_dalek::SigningKey;
    use ledger_primitives::{crypto::address_from_public_key, TxSignature, U256};

    fn key(seed: u8) -> SigningKey {
        SigningKey::from_bytes(&[seed; 32])
    }

    fn addr(key: &SigningKey) -> Address {
        address_from_public_key(&key.verifying_key().to_bytes())
    }

    fn account(address: Address, sequence: u64, secondary: u64) -> Account {
        let mut acct = Account::new(address);
        acct.sequence = sequence;
        acct.balance = Coins::secondary(secondary);
        acct
    }

    fn signed_input(key: &SigningKey, amount: u64, sequence: u64, msg: &[u8]) -> TxInput {
        let mut input = TxInput::new(addr(key), Coins::secondary(amount), sequence);
        input.signature = Some(TxSignature::sign(msg, key));
        input
    }

    #[test]
    fn test_basic_input_checks() {
        let ok = TxInput::new([1; 20], Coins::secondary(1u64), 1);
        assert!(validate_inputs_basic(&[ok.clone()]).is_ok());
        assert!(validate_inputs_basic(&[TxInput::new([1; 20], Coins::primary(1u64), 1)]).is_ok());

        let zero_addr = TxInput::new([0; 20], Coins::secondary(1u64), 1);
        assert!(matches!(
            validate_inputs_basic(&[ok.clone(), zero_addr]),
            Err(TxError::MalformedInput(_))
        ));

        let zero_seq = TxInput::new([1; 20], Coins::secondary(1u64), 0);
        assert!(matches!(
            validate_inputs_basic(&[zero_seq]),
            Err(TxError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_zero_amount_input_is_malformed() {
        let spender = TxInput::new([1; 20], Coins::secondary(110u64), 1);
        let idle = TxInput::new([2; 20], Coins::zero(), 1);
        assert_eq!(
            validate_inputs_basic(&[spender, idle.clone()]),
            Err(TxError::MalformedInput("input amount must be positive".into()))
        );

        // a contract caller may attach no value
        assert!(validate_caller_basic(&idle).is_ok());
        assert!(validate_caller_basic(&TxInput::new([0; 20], Coins::zero(), 1)).is_err());
        assert!(validate_caller_basic(&TxInput::new([2; 20], Coins::zero(), 0)).is_err());
    }

    #[test]
    fn test_basic_output_checks() {
        assert!(validate_outputs_basic(&[TxOutput::new([1; 20], Coins::zero())]).is_ok());
        assert!(validate_outputs_basic(&[TxOutput::new([0; 20], Coins::zero())]).is_err());
    }

    #[test]
    fn test_account_cap_boundary() {
        let mut config = LedgerConfig::default();
        config.max_accounts_affected_per_tx = 4;
        assert!(check_account_cap(&config, 4).is_ok());
        assert_eq!(
            check_account_cap(&config, 5),
            Err(TxError::TooManyAccounts { count: 5, max: 4 })
        );
    }

    #[test]
    fn test_get_inputs_unknown_and_duplicate() {
        let store = MemStore::with_genesis([account([1; 20], 0, 10)]);
        let view = store.snapshot();

        let unknown = TxInput::new([2; 20], Coins::zero(), 1);
        assert_eq!(
            get_inputs(&view, &[unknown]),
            Err(TxError::UnknownAddress([2; 20]))
        );

        let dup = TxInput::new([1; 20], Coins::zero(), 1);
        assert!(matches!(
            get_inputs(&view, &[dup.clone(), dup]),
            Err(TxError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_outputs_share_input_record() {
        let store = MemStore::with_genesis([account([1; 20], 3, 10)]);
        let view = store.snapshot();
        let mut accounts = get_inputs(&view, &[TxInput::new([1; 20], Coins::zero(), 4)]).unwrap();
        get_or_make_outputs(
            &view,
            &mut accounts,
            &[
                TxOutput::new([1; 20], Coins::zero()),
                TxOutput::new([5; 20], Coins::zero()),
            ],
        );
        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[&[1; 20]].sequence, 3);
        assert_eq!(accounts[&[5; 20]], Account::new([5; 20]));
        // lazily created output is not written to the view
        assert!(view.get_account(&[5; 20]).is_none());
    }

    #[test]
    fn test_advanced_checks_in_order() {
        let alice = key(1);
        let msg = b"sign-bytes";
        let acct = account(addr(&alice), 5, 100);

        // wrong sequence wins over a bad signature and low balance
        let mut input = signed_input(&alice, 1000, 7, b"other");
        assert!(matches!(
            validate_input_advanced(&acct, msg, &input),
            Err(TxError::InvalidSequence { expected: 6, got: 7, .. })
        ));

        input.sequence = 6;
        assert!(matches!(
            validate_input_advanced(&acct, msg, &input),
            Err(TxError::InvalidSignature(_))
        ));

        input = signed_input(&alice, 1000, 6, msg);
        assert!(matches!(
            validate_input_advanced(&acct, msg, &input),
            Err(TxError::InsufficientFunds { .. })
        ));

        input = signed_input(&alice, 100, 6, msg);
        assert!(validate_input_advanced(&acct, msg, &input).is_ok());
    }

    #[test]
    fn test_missing_signature_is_invalid() {
        let acct = account([1; 20], 0, 100);
        let input = TxInput::new([1; 20], Coins::secondary(1u64), 1);
        assert_eq!(
            validate_input_advanced(&acct, b"m", &input),
            Err(TxError::InvalidSignature([1; 20]))
        );
    }

    #[test]
    fn test_signature_from_other_key_is_invalid() {
        let alice = key(1);
        let mallory = key(2);
        let acct = account(addr(&alice), 0, 100);
        let mut input = TxInput::new(addr(&alice), Coins::secondary(1u64), 1);
        input.signature = Some(TxSignature::sign(b"m", &mallory));
        assert!(matches!(
            validate_input_advanced(&acct, b"m", &input),
            Err(TxError::InvalidSignature(_))
        ));
    }

    #[test]
    fn test_inputs_advanced_sums() {
        let alice = key(1);
        let bob = key(2);
        let msg = b"m";
        let mut accounts = BTreeMap::new();
        accounts.insert(addr(&alice), account(addr(&alice), 0, 100));
        accounts.insert(addr(&bob), account(addr(&bob), 9, 100));
        let inputs = vec![signed_input(&alice, 30, 1, msg), signed_input(&bob, 12, 10, msg)];
        assert_eq!(
            validate_inputs_advanced(&accounts, msg, &inputs).unwrap(),
            Coins::secondary(42u64)
        );
    }

    #[test]
    fn test_fee_floor() {
        let config = LedgerConfig::default();
        let below = Coins::secondary(999_999_999_999u64);
        let err = sanity_check_for_fee(&config, &below).unwrap_err();
        assert_eq!(err.code(), ledger_primitives::ErrorCode::InvalidFee);
        assert!(sanity_check_for_fee(&config, &Coins::secondary(1_000_000_000_000u64)).is_ok());

        // primary coins never count toward the fee
        let primary_only = Coins::new(U256::from(10u64).pow(U256::from(18u64)), U256::zero());
        assert!(sanity_check_for_fee(&config, &primary_only).is_err());
    }

    #[test]
    fn test_conservation() {
        let outputs = vec![TxOutput::new([2; 20], Coins::secondary(100u64))];
        let fee = Coins::secondary(10u64);
        assert!(check_conservation(&Coins::secondary(110u64), &outputs, &fee).is_ok());
        assert!(matches!(
            check_conservation(&Coins::secondary(111u64), &outputs, &fee),
            Err(TxError::ConservationViolation { .. })
        ));
    }

    #[test]
    fn test_recipient_rule_respects_feature_height() {
        let mut contract = Account::new([7; 20]);
        contract.code_hash = Some([1; 32]);
        let mut accounts = BTreeMap::new();
        accounts.insert([7; 20], contract);
        let outputs = vec![TxOutput::new([7; 20], Coins::secondary(1u64))];

        let mut config = LedgerConfig::default();
        config.feature_heights.smart_contract = 10;
        assert!(check_recipients(&config, 9, TxKind::Send, &accounts, &outputs).is_ok());
        assert!(matches!(
            check_recipients(&config, 10, TxKind::Send, &accounts, &outputs),
            Err(TxError::DisallowedRecipient { kind: TxKind::Send, .. })
        ));
    }

    #[test]
    fn test_adjustments_bump_sequence_and_write_through() {
        let store = MemStore::with_genesis([account([1; 20], 5, 1000)]);
        let mut view = store.mutable_view();
        let inputs = vec![TxInput::new([1; 20], Coins::secondary(110u64), 6)];
        let outputs = vec![TxOutput::new([2; 20], Coins::secondary(100u64))];

        let mut accounts = get_inputs(&view, &inputs).unwrap();
        get_or_make_outputs(&view, &mut accounts, &outputs);
        adjust_by_inputs(&mut view, &mut accounts, &inputs).unwrap();
        adjust_by_outputs(&mut view, &mut accounts, &outputs).unwrap();

        let alice = view.get_account(&[1; 20]).unwrap();
        assert_eq!(alice.sequence, 6);
        assert_eq!(alice.balance, Coins::secondary(890u64));
        assert_eq!(view.get_account(&[2; 20]).unwrap().balance, Coins::secondary(100u64));
    }

    #[test]
    fn test_debit_and_credit_single_account() {
        let store = MemStore::with_genesis([account([1; 20], 2, 1000)]);
        let mut view = store.mutable_view();
        let mut acct = view.get_account(&[1; 20]).unwrap();

        debit_and_bump(&mut view, &mut acct, &Coins::secondary(600u64)).unwrap();
        credit_account(&mut view, &mut acct, &Coins::secondary(50u64)).unwrap();

        let stored = view.get_account(&[1; 20]).unwrap();
        assert_eq!(stored, acct);
        assert_eq!(stored.sequence, 3);
        assert_eq!(stored.balance, Coins::secondary(450u64));

        let err = debit_and_bump(&mut view, &mut acct, &Coins::secondary(451u64)).unwrap_err();
        assert!(err.is_invariant_violation());
        // a failed debit leaves the stored record alone
        assert_eq!(view.get_account(&[1; 20]).unwrap().sequence, 3);
    }

    #[test]
    fn test_overdraft_in_process_is_invariant_violation() {
        let store = MemStore::with_genesis([account([1; 20], 0, 5)]);
        let mut view = store.mutable_view();
        let inputs = vec![TxInput::new([1; 20], Coins::secondary(6u64), 1)];
        let mut accounts = get_inputs(&view, &inputs).unwrap();
        let err = adjust_by_inputs(&mut view, &mut accounts, &inputs).unwrap_err();
        assert!(err.is_invariant_violation());
    }
}
