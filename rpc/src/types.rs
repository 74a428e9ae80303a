//! JSON argument and result types.
//!
//! Byte fields are hex strings, addresses and hashes are `0x`-prefixed, and
//! 256-bit amounts are decimal strings so no JSON number loses precision.

use ledger_primitives::{
    types::{address_to_hex, hash_to_hex, ADDRESS_LEN},
    Account, Address, Coins, ReservedFund, Stake,
};
use serde::{Deserialize, Serialize};

use crate::error::{RpcError, RpcResult};

/// Decode a hex string with or without a `0x` prefix.
pub fn decode_hex(s: &str) -> RpcResult<Vec<u8>> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    Ok(hex::decode(s)?)
}

pub fn parse_address(s: &str) -> RpcResult<Address> {
    let bytes = decode_hex(s).map_err(|_| RpcError::InvalidAddress(s.to_string()))?;
    <[u8; ADDRESS_LEN]>::try_from(bytes.as_slice())
        .map_err(|_| RpcError::InvalidAddress(s.to_string()))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastRawTransactionArgs {
    pub tx_bytes: String,
}

/// Header of the block a transaction was included in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSummary {
    pub height: u64,
    pub hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastRawTransactionResult {
    pub hash: String,
    /// Always `null`: broadcasting only enqueues.
    pub block: Option<BlockSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSmartContractArgs {
    pub sctx_bytes: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSmartContractResult {
    pub vm_return: String,
    pub contract_address: String,
    pub gas_used: u64,
    /// Empty when execution succeeded.
    pub vm_error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetAccountArgs {
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinsResult {
    pub primary_wei: String,
    pub secondary_wei: String,
}

impl From<&Coins> for CoinsResult {
    fn from(coins: &Coins) -> Self {
        Self {
            primary_wei: coins.primary_wei().to_string(),
            secondary_wei: coins.secondary_wei().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservedFundResult {
    pub reserve_sequence: u64,
    pub collateral: CoinsResult,
    pub initial_fund: CoinsResult,
    pub resource_ids: Vec<String>,
    pub reserved_at: u64,
    pub end_block_height: u64,
}

impl From<&ReservedFund> for ReservedFundResult {
    fn from(fund: &ReservedFund) -> Self {
        Self {
            reserve_sequence: fund.reserve_sequence,
            collateral: (&fund.collateral).into(),
            initial_fund: (&fund.initial_fund).into(),
            resource_ids: fund.resource_ids.clone(),
            reserved_at: fund.reserved_at,
            end_block_height: fund.end_block_height,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeResult {
    pub source: String,
    pub amount: CoinsResult,
    pub purpose: u8,
}

impl From<&Stake> for StakeResult {
    fn from(stake: &Stake) -> Self {
        Self {
            source: address_to_hex(&stake.source),
            amount: (&stake.amount).into(),
            purpose: stake.purpose.as_u8(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountResult {
    pub address: String,
    pub sequence: u64,
    pub coins: CoinsResult,
    pub reserved_funds: Vec<ReservedFundResult>,
    pub stakes: Vec<StakeResult>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub code_hash: Option<String>,
}

impl From<&Account> for AccountResult {
    fn from(account: &Account) -> Self {
        Self {
            address: address_to_hex(&account.address),
            sequence: account.sequence,
            coins: (&account.balance).into(),
            reserved_funds: account.reserved_funds.iter().map(Into::into).collect(),
            stakes: account.stakes.iter().map(Into::into).collect(),
            code_hash: account.code_hash.as_ref().map(hash_to_hex),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTransactionsArgs {
    pub limit: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTransactionResult {
    pub hash: String,
    pub kind: String,
    pub address: String,
    pub sequence: u64,
    pub effective_gas_price: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_primitives::{StakePurpose, U256};

    #[test]
    fn test_parse_address() {
        let addr = [0xab; 20];
        assert_eq!(parse_address(&address_to_hex(&addr)).unwrap(), addr);
        assert_eq!(parse_address(&"ab".repeat(20)).unwrap(), addr);
        assert!(matches!(
            parse_address("0xabcd"),
            Err(RpcError::InvalidAddress(_))
        ));
        assert!(matches!(
            parse_address("0xzz"),
            Err(RpcError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_account_json_shape() {
        let mut account = Account::new([1; 20]);
        account.sequence = 4;
        account.balance = Coins::new(U256::MAX, U256::from(7u64));
        account.stakes.push(Stake {
            source: [2; 20],
            amount: Coins::secondary(5u64),
            purpose: StakePurpose::Guardian,
        });

        let json = serde_json::to_value(AccountResult::from(&account)).unwrap();
        assert_eq!(json["address"], format!("0x{}", "01".repeat(20)));
        assert_eq!(json["sequence"], 4);
        assert_eq!(json["coins"]["primary_wei"], U256::MAX.to_string());
        assert_eq!(json["coins"]["secondary_wei"], "7");
        assert_eq!(json["stakes"][0]["purpose"], 1);
        assert!(json.get("code_hash").is_none());
    }

    #[test]
    fn test_broadcast_result_has_null_block() {
        let result = BroadcastRawTransactionResult {
            hash: "0x00".into(),
            block: None,
        };
        let json = serde_json::to_value(result).unwrap();
        assert!(json["block"].is_null());
    }
}
