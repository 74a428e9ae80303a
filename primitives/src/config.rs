//! Ledger configuration.
//!
//! `LedgerConfig` is immutable once loaded and is passed by reference into
//! every executor. Missing fields in a config file fall back to the mainnet
//! values in [`Default`].

use primitive_types::U256;
use serde::Deserialize;

use crate::error::ConfigError;
use crate::gas::{
    GAS_PER_ACCOUNT, MAXIMUM_TX_GAS_LIMIT, MAX_ACCOUNTS_AFFECTED_PER_TX, MINIMUM_GAS_PRICE,
    MINIMUM_TRANSACTION_FEE,
};
use crate::types::BlockHeight;

/// Heights at which protocol features switch on. A check gated by a feature
/// is skipped below its height.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FeatureHeights {
    pub smart_contract: BlockHeight,
}

impl Default for FeatureHeights {
    fn default() -> Self {
        Self { smart_contract: 1 }
    }
}

impl FeatureHeights {
    pub fn smart_contract_enabled(&self, height: BlockHeight) -> bool {
        height >= self.smart_contract
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LedgerConfig {
    pub feature_heights: FeatureHeights,
    /// Minimum fee in secondary wei.
    pub minimum_transaction_fee: U256,
    pub minimum_gas_price: U256,
    pub maximum_tx_gas_limit: u64,
    pub gas_per_account: u64,
    pub max_accounts_affected_per_tx: usize,
    /// Bounds on a fund reservation's duration, in blocks.
    pub min_fund_reserve_duration: u64,
    pub max_fund_reserve_duration: u64,
    /// Blocks a reservation stays locked before it may be released.
    pub reserved_fund_freeze_period: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            feature_heights: FeatureHeights::default(),
            minimum_transaction_fee: U256::from(MINIMUM_TRANSACTION_FEE),
            minimum_gas_price: U256::from(MINIMUM_GAS_PRICE),
            maximum_tx_gas_limit: MAXIMUM_TX_GAS_LIMIT,
            gas_per_account: GAS_PER_ACCOUNT,
            max_accounts_affected_per_tx: MAX_ACCOUNTS_AFFECTED_PER_TX,
            min_fund_reserve_duration: 300,
            max_fund_reserve_duration: 12 * 3600,
            reserved_fund_freeze_period: 5,
        }
    }
}

impl LedgerConfig {
    /// Parse a JSON config document and validate it.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: LedgerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_fund_reserve_duration > self.max_fund_reserve_duration {
            return Err(ConfigError::Invalid(format!(
                "min_fund_reserve_duration {} exceeds max_fund_reserve_duration {}",
                self.min_fund_reserve_duration, self.max_fund_reserve_duration
            )));
        }
        if self.max_accounts_affected_per_tx == 0 {
            return Err(ConfigError::Invalid(
                "max_accounts_affected_per_tx must be positive".into(),
            ));
        }
        Ok(())
    }
}
