//! Account state and the records hanging off it.

use crate::coins::Coins;
use crate::types::{Address, BlockHeight, Hash};

/// What a stake backs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum StakePurpose {
    Validator = 0,
    Guardian = 1,
}

impl StakePurpose {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Validator),
            1 => Some(Self::Guardian),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// A fund reservation held on the reserving account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservedFund {
    /// Account sequence of the reserving transaction; the reservation key.
    pub reserve_sequence: u64,
    pub collateral: Coins,
    pub initial_fund: Coins,
    pub resource_ids: Vec<String>,
    /// Height of the block the reservation was applied in.
    pub reserved_at: BlockHeight,
    pub end_block_height: BlockHeight,
}

impl ReservedFund {
    /// First height at which the reservation may be released.
    pub fn release_height(&self, freeze_period: u64) -> BlockHeight {
        self.reserved_at.saturating_add(freeze_period)
    }

    /// Collateral plus remaining fund, returned to the balance on release.
    pub fn total_locked(&self) -> Result<Coins, crate::error::CoinsError> {
        self.collateral.plus(&self.initial_fund)
    }
}

/// Stake held by an account on behalf of `source`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stake {
    pub source: Address,
    pub amount: Coins,
    pub purpose: StakePurpose,
}

/// A ledger account.
///
/// Created lazily with sequence 0 and a zero balance. Never deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub address: Address,
    /// Number of accepted inputs that named this account.
    pub sequence: u64,
    pub balance: Coins,
    /// Set for smart-contract accounts.
    pub code_hash: Option<Hash>,
    pub reserved_funds: Vec<ReservedFund>,
    /// Stakes this account holds, keyed by source and purpose.
    pub stakes: Vec<Stake>,
}

impl Account {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            sequence: 0,
            balance: Coins::zero(),
            code_hash: None,
            reserved_funds: Vec::new(),
            stakes: Vec::new(),
        }
    }

    pub fn is_smart_contract(&self) -> bool {
        self.code_hash.is_some()
    }

    pub fn find_reserved_fund(&self, reserve_sequence: u64) -> Option<&ReservedFund> {
        self.reserved_funds
            .iter()
            .find(|f| f.reserve_sequence == reserve_sequence)
    }

    /// Remove and return the reservation with the given key.
    pub fn take_reserved_fund(&mut self, reserve_sequence: u64) -> Option<ReservedFund> {
        let idx = self
            .reserved_funds
            .iter()
            .position(|f| f.reserve_sequence == reserve_sequence)?;
        Some(self.reserved_funds.remove(idx))
    }

    pub fn has_stake_from(&self, source: &Address, purpose: StakePurpose) -> bool {
        self.stakes
            .iter()
            .any(|s| &s.source == source && s.purpose == purpose)
    }

    /// Remove and return every stake from `source` for `purpose`, preserving
    /// the order of the remaining stakes.
    pub fn take_stakes(&mut self, source: &Address, purpose: StakePurpose) -> Vec<Stake> {
        let (taken, kept): (Vec<Stake>, Vec<Stake>) = self
            .stakes
            .drain(..)
            .partition(|s| &s.source == source && s.purpose == purpose);
        self.stakes = kept;
        taken
    }
}

/// One beneficiary of a split rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub address: Address,
    /// Share in whole percent, `0..=100`.
    pub percentage: u32,
}

/// Payment split registered for a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitRule {
    pub resource_id: String,
    pub initiator: Address,
    pub splits: Vec<Split>,
    pub end_block_height: BlockHeight,
}

impl SplitRule {
    pub fn is_expired(&self, height: BlockHeight) -> bool {
        height > self.end_block_height
    }
}
