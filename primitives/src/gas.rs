//! Fee and gas accounting.
//!
//! Non-contract transactions pay a flat fee; their priority is the fee divided
//! by a notional gas figure that grows with the number of accounts touched.
//! Contract transactions pay `gas_price * gas_used` and their priority is the
//! gas price itself.

use primitive_types::U256;

use crate::coins::Coins;
use crate::error::{CoinsError, OutOfGas};

/// Notional gas charged per account a transaction touches.
pub const GAS_PER_ACCOUNT: u64 = 5_000;

/// Minimum fee, in secondary wei, for every non-contract transaction.
pub const MINIMUM_TRANSACTION_FEE: u64 = 1_000_000_000_000;

/// Minimum gas price, in secondary wei, for contract transactions.
pub const MINIMUM_GAS_PRICE: u64 = 100_000_000;

/// Maximum gas limit of a single contract transaction.
pub const MAXIMUM_TX_GAS_LIMIT: u64 = 10_000_000;

/// Maximum number of distinct accounts one transaction may touch.
pub const MAX_ACCOUNTS_AFFECTED_PER_TX: usize = 512;

/// Effective gas price of a flat-fee transaction.
///
/// `gas = max(gas_per_account * accounts, 2 * gas_per_account)` and the price
/// is `fee.secondary_wei / gas`, truncating. A zero `gas_per_account` prices
/// at zero.
pub fn effective_gas_price(fee: &Coins, accounts_affected: u64, gas_per_account: u64) -> U256 {
    let floor = U256::from(gas_per_account).saturating_mul(U256::from(2u64));
    let gas = U256::from(gas_per_account)
        .saturating_mul(U256::from(accounts_affected))
        .max(floor);
    if gas.is_zero() {
        return U256::zero();
    }
    fee.secondary_wei() / gas
}

/// Fee of a contract transaction: `gas_price * gas_used` secondary wei.
pub fn contract_fee(gas_price: U256, gas_used: u64) -> Result<Coins, CoinsError> {
    Coins::secondary(gas_price).mul_scalar(U256::from(gas_used))
}

/// Deterministic gas meter for contract execution.
///
/// Charges are checked before they are applied, so a failed charge leaves the
/// meter unchanged.
#[derive(Debug, Clone)]
pub struct GasMeter {
    limit: u64,
    consumed: u64,
}

impl GasMeter {
    pub fn new(limit: u64) -> Self {
        Self { limit, consumed: 0 }
    }

    pub fn consume(&mut self, amount: u64) -> Result<(), OutOfGas> {
        match self.consumed.checked_add(amount) {
            Some(v) if v <= self.limit => {
                self.consumed = v;
                Ok(())
            }
            _ => Err(OutOfGas {
                limit: self.limit,
                needed: self.consumed.saturating_add(amount),
            }),
        }
    }

    /// Charge everything that is left. Used when execution aborts.
    pub fn exhaust(&mut self) {
        self.consumed = self.limit;
    }

    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    pub fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.consumed)
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }
}
