//! Write buffer for a mutating store view.
//!
//! Accounts and split rules written while a block is applied are buffered
//! here and read back ahead of committed state. Saving the view turns the
//! buffer into canonical key/value writes.

use std::collections::BTreeMap;

use crate::account::{Account, SplitRule};
use crate::codec::{encode_account, encode_split_rule};
use crate::types::Address;

/// Key prefix for account records in the committed store.
pub const ACCOUNT_KEY_PREFIX: &[u8] = b"acct/";

/// Key prefix for split rules in the committed store.
pub const SPLIT_RULE_KEY_PREFIX: &[u8] = b"split/";

pub fn account_key(address: &Address) -> Vec<u8> {
    let mut key = Vec::with_capacity(ACCOUNT_KEY_PREFIX.len() + address.len());
    key.extend_from_slice(ACCOUNT_KEY_PREFIX);
    key.extend_from_slice(address);
    key
}

pub fn split_rule_key(resource_id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(SPLIT_RULE_KEY_PREFIX.len() + resource_id.len());
    key.extend_from_slice(SPLIT_RULE_KEY_PREFIX);
    key.extend_from_slice(resource_id.as_bytes());
    key
}

/// Buffered writes overlaying committed state.
///
/// Uses `BTreeMap` so the drained writes come out in a deterministic order.
/// Records are never deleted, so there is no tombstone.
#[derive(Debug, Clone, Default)]
pub struct StateOverlay {
    accounts: BTreeMap<Address, Account>,
    split_rules: BTreeMap<String, SplitRule>,
}

impl StateOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// The buffered account, or `None` if the caller must check committed
    /// state.
    pub fn account(&self, address: &Address) -> Option<&Account> {
        self.accounts.get(address)
    }

    /// Buffer an account write, replacing any earlier write for the address.
    pub fn set_account(&mut self, account: Account) {
        self.accounts.insert(account.address, account);
    }

    pub fn split_rule(&self, resource_id: &str) -> Option<&SplitRule> {
        self.split_rules.get(resource_id)
    }

    pub fn set_split_rule(&mut self, rule: SplitRule) {
        self.split_rules.insert(rule.resource_id.clone(), rule);
    }

    /// Number of records touched.
    pub fn len(&self) -> usize {
        self.accounts.len() + self.split_rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty() && self.split_rules.is_empty()
    }

    /// Consume the overlay and return its canonical key/value writes, sorted
    /// by key.
    pub fn into_writes(self) -> BTreeMap<Vec<u8>, Vec<u8>> {
        let mut writes = BTreeMap::new();
        for (address, account) in &self.accounts {
            writes.insert(account_key(address), encode_account(account));
        }
        for (resource_id, rule) in &self.split_rules {
            writes.insert(split_rule_key(resource_id), encode_split_rule(rule));
        }
        writes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::decode_account;
    use crate::coins::Coins;

    #[test]
    fn test_overlay_set_and_get() {
        let mut overlay = StateOverlay::new();
        assert!(overlay.account(&[1; 20]).is_none());

        let mut acct = Account::new([1; 20]);
        acct.balance = Coins::secondary(5u64);
        overlay.set_account(acct.clone());
        assert_eq!(overlay.account(&[1; 20]), Some(&acct));
    }

    #[test]
    fn test_overlay_overwrite() {
        let mut overlay = StateOverlay::new();
        let mut acct = Account::new([1; 20]);
        overlay.set_account(acct.clone());
        acct.sequence = 4;
        overlay.set_account(acct);
        assert_eq!(overlay.len(), 1);
        assert_eq!(overlay.account(&[1; 20]).map(|a| a.sequence), Some(4));
    }

    #[test]
    fn test_overlay_writes_sorted_and_decodable() {
        let mut overlay = StateOverlay::new();
        overlay.set_account(Account::new([9; 20]));
        overlay.set_account(Account::new([1; 20]));
        overlay.set_split_rule(SplitRule {
            resource_id: "r".into(),
            initiator: [1; 20],
            splits: vec![],
            end_block_height: 3,
        });

        let writes = overlay.into_writes();
        let keys: Vec<&Vec<u8>> = writes.keys().collect();
        assert_eq!(keys[0], &account_key(&[1; 20]));
        assert_eq!(keys[1], &account_key(&[9; 20]));
        assert_eq!(keys[2], &split_rule_key("r"));

        let acct = decode_account(&writes[&account_key(&[9; 20])]).unwrap();
        assert_eq!(acct.address, [9; 20]);
    }
}
