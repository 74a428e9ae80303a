//! Transaction kinds.
//!
//! `Tx` is a closed enum with one struct per kind. Transactions refer to
//! accounts by address only; executors resolve them against a store view.

use core::fmt;

use ed25519_dalek::SigningKey;
use primitive_types::U256;

use crate::account::{Split, StakePurpose};
use crate::codec;
use crate::coins::Coins;
use crate::crypto::{address_from_public_key, sign_ed25519, verify_ed25519};
use crate::types::{Address, Hash};

/// Ed25519 signature together with the key that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxSignature {
    pub public_key: [u8; 32],
    pub signature: [u8; 64],
}

impl TxSignature {
    pub fn sign(message: &[u8], key: &SigningKey) -> Self {
        Self {
            public_key: key.verifying_key().to_bytes(),
            signature: sign_ed25519(message, key),
        }
    }

    /// Valid iff the key derives `address` and the signature checks out.
    pub fn verify(&self, address: &Address, message: &[u8]) -> bool {
        address_from_public_key(&self.public_key) == *address
            && verify_ed25519(message, &self.signature, &self.public_key)
    }
}

/// A debit from one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxInput {
    pub address: Address,
    pub coins: Coins,
    /// Must equal the account's current sequence plus one.
    pub sequence: u64,
    pub signature: Option<TxSignature>,
}

impl TxInput {
    pub fn new(address: Address, coins: Coins, sequence: u64) -> Self {
        Self {
            address,
            coins,
            sequence,
            signature: None,
        }
    }
}

/// A credit to one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutput {
    pub address: Address,
    pub coins: Coins,
}

impl TxOutput {
    pub fn new(address: Address, coins: Coins) -> Self {
        Self { address, coins }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendTx {
    pub fee: Coins,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
}

/// Locks `source.coins` as a fund plus `collateral` against resources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReserveFundTx {
    pub fee: Coins,
    pub source: TxInput,
    pub resource_ids: Vec<String>,
    pub collateral: Coins,
    pub duration: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseFundTx {
    pub fee: Coins,
    pub source: TxInput,
    pub reserve_sequence: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitRuleTx {
    pub fee: Coins,
    pub resource_id: String,
    pub initiator: TxInput,
    pub splits: Vec<Split>,
    pub duration: u64,
}

/// Deposit stake. Each output becomes a stake held by the output address and
/// owned by the first input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StakeTx {
    pub fee: Coins,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    pub purpose: StakePurpose,
}

/// Return the stakes `source` placed with `holder` for `purpose`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawStakeTx {
    pub fee: Coins,
    pub source: TxInput,
    pub holder: TxOutput,
    pub purpose: StakePurpose,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RametronStakeTx {
    pub fee: Coins,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawRametronStakeTx {
    pub fee: Coins,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
}

/// Contract call or deployment. `to.address` is zero for a deployment and
/// `from.coins` is the value transferred. The fee is `gas_price * gas_used`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmartContractTx {
    pub from: TxInput,
    pub to: TxOutput,
    pub gas_limit: u64,
    pub gas_price: U256,
    pub data: Vec<u8>,
}

/// Transaction kind tag. The repr value is the first byte of the canonical
/// encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum TxKind {
    Send = 0x01,
    ReserveFund = 0x02,
    ReleaseFund = 0x03,
    SplitRule = 0x04,
    Stake = 0x05,
    WithdrawStake = 0x06,
    RametronStake = 0x07,
    WithdrawRametronStake = 0x08,
    SmartContract = 0x09,
}

impl TxKind {
    pub fn from_tag(tag: u8) -> Option<Self> {
        let kind = match tag {
            0x01 => Self::Send,
            0x02 => Self::ReserveFund,
            0x03 => Self::ReleaseFund,
            0x04 => Self::SplitRule,
            0x05 => Self::Stake,
            0x06 => Self::WithdrawStake,
            0x07 => Self::RametronStake,
            0x08 => Self::WithdrawRametronStake,
            0x09 => Self::SmartContract,
            _ => return None,
        };
        Some(kind)
    }

    pub fn tag(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for TxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Send => "Send",
            Self::ReserveFund => "ReserveFund",
            Self::ReleaseFund => "ReleaseFund",
            Self::SplitRule => "SplitRule",
            Self::Stake => "Stake",
            Self::WithdrawStake => "WithdrawStake",
            Self::RametronStake => "RametronStake",
            Self::WithdrawRametronStake => "WithdrawRametronStake",
            Self::SmartContract => "SmartContract",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tx {
    Send(SendTx),
    ReserveFund(ReserveFundTx),
    ReleaseFund(ReleaseFundTx),
    SplitRule(SplitRuleTx),
    Stake(StakeTx),
    WithdrawStake(WithdrawStakeTx),
    RametronStake(RametronStakeTx),
    WithdrawRametronStake(WithdrawRametronStakeTx),
    SmartContract(SmartContractTx),
}

impl Tx {
    pub fn kind(&self) -> TxKind {
        match self {
            Tx::Send(_) => TxKind::Send,
            Tx::ReserveFund(_) => TxKind::ReserveFund,
            Tx::ReleaseFund(_) => TxKind::ReleaseFund,
            Tx::SplitRule(_) => TxKind::SplitRule,
            Tx::Stake(_) => TxKind::Stake,
            Tx::WithdrawStake(_) => TxKind::WithdrawStake,
            Tx::RametronStake(_) => TxKind::RametronStake,
            Tx::WithdrawRametronStake(_) => TxKind::WithdrawRametronStake,
            Tx::SmartContract(_) => TxKind::SmartContract,
        }
    }

    /// Every signed input of the transaction, in encoding order.
    pub fn inputs_mut(&mut self) -> Vec<&mut TxInput> {
        match self {
            Tx::Send(tx) => tx.inputs.iter_mut().collect(),
            Tx::Stake(tx) => tx.inputs.iter_mut().collect(),
            Tx::RametronStake(tx) => tx.inputs.iter_mut().collect(),
            Tx::WithdrawRametronStake(tx) => tx.inputs.iter_mut().collect(),
            Tx::ReserveFund(tx) => vec![&mut tx.source],
            Tx::ReleaseFund(tx) => vec![&mut tx.source],
            Tx::SplitRule(tx) => vec![&mut tx.initiator],
            Tx::WithdrawStake(tx) => vec![&mut tx.source],
            Tx::SmartContract(tx) => vec![&mut tx.from],
        }
    }

    /// Bytes every input signs: the length-prefixed chain id followed by the
    /// canonical encoding with all signatures cleared.
    pub fn sign_bytes(&self, chain_id: &str) -> Vec<u8> {
        let mut unsigned = self.clone();
        for input in unsigned.inputs_mut() {
            input.signature = None;
        }
        codec::chain_prefixed(chain_id, &codec::encode_tx(&unsigned))
    }

    /// `BLAKE3(len-prefixed chain_id || encode_tx(tx))`.
    pub fn hash(&self, chain_id: &str) -> Hash {
        codec::tx_hash(chain_id, self)
    }

    /// Sign every input whose address belongs to `key`. Returns the number of
    /// inputs signed.
    pub fn sign(&mut self, chain_id: &str, key: &SigningKey) -> usize {
        let message = self.sign_bytes(chain_id);
        let signature = TxSignature::sign(&message, key);
        let signer = address_from_public_key(&signature.public_key);
        let mut signed = 0;
        for input in self.inputs_mut() {
            if input.address == signer {
                input.signature = Some(signature);
                signed += 1;
            }
        }
        signed
    }
}

macro_rules! tx_variant {
    ($ty:ident, $variant:ident) => {
        impl From<$ty> for Tx {
            fn from(tx: $ty) -> Self {
                Tx::$variant(tx)
            }
        }

        impl $ty {
            /// Sign-bytes of this transaction wrapped in its `Tx` variant.
            pub fn sign_bytes(&self, chain_id: &str) -> Vec<u8> {
                Tx::$variant(self.clone()).sign_bytes(chain_id)
            }

            /// Hash of this transaction wrapped in its `Tx` variant.
            pub fn hash(&self, chain_id: &str) -> Hash {
                Tx::$variant(self.clone()).hash(chain_id)
            }
        }
    };
}

tx_variant!(SendTx, Send);
tx_variant!(ReserveFundTx, ReserveFund);
tx_variant!(ReleaseFundTx, ReleaseFund);
tx_variant!(SplitRuleTx, SplitRule);
tx_variant!(StakeTx, Stake);
tx_variant!(WithdrawStakeTx, WithdrawStake);
tx_variant!(RametronStakeTx, RametronStake);
tx_variant!(WithdrawRametronStakeTx, WithdrawRametronStake);
tx_variant!(SmartContractTx, SmartContract);
