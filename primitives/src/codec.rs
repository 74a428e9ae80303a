//! Canonical binary encoding for transactions and ledger state.
//!
//! Every node must produce the same bytes for the same value; signatures,
//! transaction hashes and the state root are all computed over this format.
//!
//! Encoding format:
//! - Integers are little-endian (`u32`, `u64`)
//! - `U256` amounts are 32 bytes, big-endian
//! - `Coins` is primary then secondary
//! - Variable-length fields (`Vec<u8>`, `String`) are u32-length-prefixed
//! - Repeated fields are u32-count-prefixed then concatenated
//! - Optional values carry a 1-byte flag (0 = None, 1 = Some)
//! - A transaction starts with its 1-byte [`TxKind`] tag
//!
//! Decoding is strict: unknown tags, bad flags and trailing bytes are errors.

use primitive_types::U256;

use crate::account::{Account, ReservedFund, Split, SplitRule, Stake, StakePurpose};
use crate::coins::Coins;
use crate::crypto::hash_blake3;
use crate::error::CodecError;
use crate::tx::*;
use crate::types::{Address, Hash, ADDRESS_LEN};

/// A cursor for reading bytes during decoding.
pub(crate) struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Fail unless every byte was consumed.
    pub(crate) fn finish(self) -> Result<(), CodecError> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(CodecError::TrailingBytes(n)),
        }
    }

    fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        if n > self.remaining() {
            return Err(CodecError::UnexpectedEof);
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.read_bytes(1)?[0])
    }

    pub(crate) fn read_u32(&mut self) -> Result<u32, CodecError> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub(crate) fn read_u64(&mut self) -> Result<u64, CodecError> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    pub(crate) fn read_u256(&mut self) -> Result<U256, CodecError> {
        Ok(U256::from_big_endian(self.read_bytes(32)?))
    }

    pub(crate) fn read_hash(&mut self) -> Result<Hash, CodecError> {
        self.read_array()
    }

    pub(crate) fn read_address(&mut self) -> Result<Address, CodecError> {
        self.read_array::<ADDRESS_LEN>()
    }

    fn read_flag(&mut self, what: &'static str) -> Result<bool, CodecError> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(CodecError::InvalidFlag(what)),
        }
    }

    /// Read a u32 count, bounded by the bytes left so a hostile prefix cannot
    /// force a huge allocation.
    fn read_count(&mut self) -> Result<usize, CodecError> {
        let count = self.read_u32()? as usize;
        if count > self.remaining() {
            return Err(CodecError::UnexpectedEof);
        }
        Ok(count)
    }

    fn read_var_bytes(&mut self) -> Result<Vec<u8>, CodecError> {
        let len = self.read_u32()? as usize;
        Ok(self.read_bytes(len)?.to_vec())
    }

    pub(crate) fn read_string(&mut self) -> Result<String, CodecError> {
        String::from_utf8(self.read_var_bytes()?).map_err(|_| CodecError::InvalidUtf8)
    }

    fn read_vec<T>(
        &mut self,
        mut read_one: impl FnMut(&mut Self) -> Result<T, CodecError>,
    ) -> Result<Vec<T>, CodecError> {
        let count = self.read_count()?;
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            items.push(read_one(self)?);
        }
        Ok(items)
    }

    fn read_coins(&mut self) -> Result<Coins, CodecError> {
        let primary = self.read_u256()?;
        let secondary = self.read_u256()?;
        Ok(Coins::new(primary, secondary))
    }

    fn read_purpose(&mut self) -> Result<StakePurpose, CodecError> {
        let raw = self.read_u8()?;
        StakePurpose::from_u8(raw).ok_or(CodecError::InvalidStakePurpose(raw))
    }

    fn read_input(&mut self) -> Result<TxInput, CodecError> {
        let address = self.read_address()?;
        let coins = self.read_coins()?;
        let sequence = self.read_u64()?;
        let signature = if self.read_flag("signature")? {
            Some(TxSignature {
                public_key: self.read_array()?,
                signature: self.read_array()?,
            })
        } else {
            None
        };
        Ok(TxInput {
            address,
            coins,
            sequence,
            signature,
        })
    }

    fn read_output(&mut self) -> Result<TxOutput, CodecError> {
        Ok(TxOutput {
            address: self.read_address()?,
            coins: self.read_coins()?,
        })
    }

    fn read_split(&mut self) -> Result<Split, CodecError> {
        Ok(Split {
            address: self.read_address()?,
            percentage: self.read_u32()?,
        })
    }
}

// ── Encoding helpers ──

pub(crate) fn write_u8(buf: &mut Vec<u8>, v: u8) {
    buf.push(v);
}

pub(crate) fn write_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

pub(crate) fn write_u64(buf: &mut Vec<u8>, v: u64) {
    buf.extend_from_slice(&v.to_le_bytes());
}

pub(crate) fn write_u256(buf: &mut Vec<u8>, v: &U256) {
    let mut be = [0u8; 32];
    v.to_big_endian(&mut be);
    buf.extend_from_slice(&be);
}

pub(crate) fn write_bytes(buf: &mut Vec<u8>, data: &[u8]) {
    buf.extend_from_slice(data);
}

pub(crate) fn write_var_bytes(buf: &mut Vec<u8>, data: &[u8]) {
    write_u32(buf, data.len() as u32);
    buf.extend_from_slice(data);
}

pub(crate) fn write_string(buf: &mut Vec<u8>, s: &str) {
    write_var_bytes(buf, s.as_bytes());
}

fn write_vec<T>(buf: &mut Vec<u8>, items: &[T], write_one: impl Fn(&mut Vec<u8>, &T)) {
    write_u32(buf, items.len() as u32);
    for item in items {
        write_one(buf, item);
    }
}

fn write_coins(buf: &mut Vec<u8>, coins: &Coins) {
    write_u256(buf, &coins.primary_wei());
    write_u256(buf, &coins.secondary_wei());
}

fn write_input(buf: &mut Vec<u8>, input: &TxInput) {
    write_bytes(buf, &input.address);
    write_coins(buf, &input.coins);
    write_u64(buf, input.sequence);
    match &input.signature {
        None => write_u8(buf, 0),
        Some(sig) => {
            write_u8(buf, 1);
            write_bytes(buf, &sig.public_key);
            write_bytes(buf, &sig.signature);
        }
    }
}

fn write_output(buf: &mut Vec<u8>, output: &TxOutput) {
    write_bytes(buf, &output.address);
    write_coins(buf, &output.coins);
}

fn write_split(buf: &mut Vec<u8>, split: &Split) {
    write_bytes(buf, &split.address);
    write_u32(buf, split.percentage);
}

fn write_string_item(buf: &mut Vec<u8>, s: &String) {
    write_string(buf, s);
}

// ── Transactions ──

/// Encode a transaction to canonical bytes.
pub fn encode_tx(tx: &Tx) -> Vec<u8> {
    let mut buf = Vec::with_capacity(256);
    write_u8(&mut buf, tx.kind().tag());
    match tx {
        Tx::Send(t) => {
            write_coins(&mut buf, &t.fee);
            write_vec(&mut buf, &t.inputs, write_input);
            write_vec(&mut buf, &t.outputs, write_output);
        }
        Tx::ReserveFund(t) => {
            write_coins(&mut buf, &t.fee);
            write_input(&mut buf, &t.source);
            write_vec(&mut buf, &t.resource_ids, write_string_item);
            write_coins(&mut buf, &t.collateral);
            write_u64(&mut buf, t.duration);
        }
        Tx::ReleaseFund(t) => {
            write_coins(&mut buf, &t.fee);
            write_input(&mut buf, &t.source);
            write_u64(&mut buf, t.reserve_sequence);
        }
        Tx::SplitRule(t) => {
            write_coins(&mut buf, &t.fee);
            write_string(&mut buf, &t.resource_id);
            write_input(&mut buf, &t.initiator);
            write_vec(&mut buf, &t.splits, write_split);
            write_u64(&mut buf, t.duration);
        }
        Tx::Stake(t) => {
            write_coins(&mut buf, &t.fee);
            write_vec(&mut buf, &t.inputs, write_input);
            write_vec(&mut buf, &t.outputs, write_output);
            write_u8(&mut buf, t.purpose.as_u8());
        }
        Tx::WithdrawStake(t) => {
            write_coins(&mut buf, &t.fee);
            write_input(&mut buf, &t.source);
            write_output(&mut buf, &t.holder);
            write_u8(&mut buf, t.purpose.as_u8());
        }
        Tx::RametronStake(RametronStakeTx {
            fee,
            inputs,
            outputs,
        })
        | Tx::WithdrawRametronStake(WithdrawRametronStakeTx {
            fee,
            inputs,
            outputs,
        }) => {
            write_coins(&mut buf, fee);
            write_vec(&mut buf, inputs, write_input);
            write_vec(&mut buf, outputs, write_output);
        }
        Tx::SmartContract(t) => {
            write_input(&mut buf, &t.from);
            write_output(&mut buf, &t.to);
            write_u64(&mut buf, t.gas_limit);
            write_u256(&mut buf, &t.gas_price);
            write_var_bytes(&mut buf, &t.data);
        }
    }
    buf
}

/// Decode a transaction from canonical bytes. The whole slice must be
/// consumed.
pub fn decode_tx(data: &[u8]) -> Result<Tx, CodecError> {
    let mut r = Reader::new(data);
    let tag = r.read_u8()?;
    let kind = TxKind::from_tag(tag).ok_or(CodecError::UnknownKind(tag))?;
    let tx = match kind {
        TxKind::Send => Tx::Send(SendTx {
            fee: r.read_coins()?,
            inputs: r.read_vec(Reader::read_input)?,
            outputs: r.read_vec(Reader::read_output)?,
        }),
        TxKind::ReserveFund => Tx::ReserveFund(ReserveFundTx {
            fee: r.read_coins()?,
            source: r.read_input()?,
            resource_ids: r.read_vec(Reader::read_string)?,
            collateral: r.read_coins()?,
            duration: r.read_u64()?,
        }),
        TxKind::ReleaseFund => Tx::ReleaseFund(ReleaseFundTx {
            fee: r.read_coins()?,
            source: r.read_input()?,
            reserve_sequence: r.read_u64()?,
        }),
        TxKind::SplitRule => Tx::SplitRule(SplitRuleTx {
            fee: r.read_coins()?,
            resource_id: r.read_string()?,
            initiator: r.read_input()?,
            splits: r.read_vec(Reader::read_split)?,
            duration: r.read_u64()?,
        }),
        TxKind::Stake => Tx::Stake(StakeTx {
            fee: r.read_coins()?,
            inputs: r.read_vec(Reader::read_input)?,
            outputs: r.read_vec(Reader::read_output)?,
            purpose: r.read_purpose()?,
        }),
        TxKind::WithdrawStake => Tx::WithdrawStake(WithdrawStakeTx {
            fee: r.read_coins()?,
            source: r.read_input()?,
            holder: r.read_output()?,
            purpose: r.read_purpose()?,
        }),
        TxKind::RametronStake => Tx::RametronStake(RametronStakeTx {
            fee: r.read_coins()?,
            inputs: r.read_vec(Reader::read_input)?,
            outputs: r.read_vec(Reader::read_output)?,
        }),
        TxKind::WithdrawRametronStake => Tx::WithdrawRametronStake(WithdrawRametronStakeTx {
            fee: r.read_coins()?,
            inputs: r.read_vec(Reader::read_input)?,
            outputs: r.read_vec(Reader::read_output)?,
        }),
        TxKind::SmartContract => Tx::SmartContract(SmartContractTx {
            from: r.read_input()?,
            to: r.read_output()?,
            gas_limit: r.read_u64()?,
            gas_price: r.read_u256()?,
            data: r.read_var_bytes()?,
        }),
    };
    r.finish()?;
    Ok(tx)
}

/// Prefix `payload` with the u32-length-prefixed chain id.
pub fn chain_prefixed(chain_id: &str, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(4 + chain_id.len() + payload.len());
    write_string(&mut buf, chain_id);
    write_bytes(&mut buf, payload);
    buf
}

/// `BLAKE3(len-prefixed chain_id || encode_tx(tx))`, signatures included.
pub fn tx_hash(chain_id: &str, tx: &Tx) -> Hash {
    hash_blake3(&chain_prefixed(chain_id, &encode_tx(tx)))
}

// ── Ledger state ──

/// Encode an account record for the state store.
pub fn encode_account(account: &Account) -> Vec<u8> {
    let mut buf = Vec::with_capacity(128);
    write_bytes(&mut buf, &account.address);
    write_u64(&mut buf, account.sequence);
    write_coins(&mut buf, &account.balance);
    match &account.code_hash {
        None => write_u8(&mut buf, 0),
        Some(hash) => {
            write_u8(&mut buf, 1);
            write_bytes(&mut buf, hash);
        }
    }
    write_vec(&mut buf, &account.reserved_funds, |buf, fund| {
        write_u64(buf, fund.reserve_sequence);
        write_coins(buf, &fund.collateral);
        write_coins(buf, &fund.initial_fund);
        write_vec(buf, &fund.resource_ids, write_string_item);
        write_u64(buf, fund.reserved_at);
        write_u64(buf, fund.end_block_height);
    });
    write_vec(&mut buf, &account.stakes, |buf, stake| {
        write_bytes(buf, &stake.source);
        write_coins(buf, &stake.amount);
        write_u8(buf, stake.purpose.as_u8());
    });
    buf
}

/// Decode an account record.
pub fn decode_account(data: &[u8]) -> Result<Account, CodecError> {
    let mut r = Reader::new(data);
    let address = r.read_address()?;
    let sequence = r.read_u64()?;
    let balance = r.read_coins()?;
    let code_hash = if r.read_flag("code hash")? {
        Some(r.read_hash()?)
    } else {
        None
    };
    let reserved_funds = r.read_vec(|r| {
        Ok(ReservedFund {
            reserve_sequence: r.read_u64()?,
            collateral: r.read_coins()?,
            initial_fund: r.read_coins()?,
            resource_ids: r.read_vec(Reader::read_string)?,
            reserved_at: r.read_u64()?,
            end_block_height: r.read_u64()?,
        })
    })?;
    let stakes = r.read_vec(|r| {
        Ok(Stake {
            source: r.read_address()?,
            amount: r.read_coins()?,
            purpose: r.read_purpose()?,
        })
    })?;
    r.finish()?;
    Ok(Account {
        address,
        sequence,
        balance,
        code_hash,
        reserved_funds,
        stakes,
    })
}

/// Encode a split rule for the state store.
pub fn encode_split_rule(rule: &SplitRule) -> Vec<u8> {
    let mut buf = Vec::with_capacity(64);
    write_string(&mut buf, &rule.resource_id);
    write_bytes(&mut buf, &rule.initiator);
    write_vec(&mut buf, &rule.splits, write_split);
    write_u64(&mut buf, rule.end_block_height);
    buf
}

/// Decode a split rule.
pub fn decode_split_rule(data: &[u8]) -> Result<SplitRule, CodecError> {
    let mut r = Reader::new(data);
    let rule = SplitRule {
        resource_id: r.read_string()?,
        initiator: r.read_address()?,
        splits: r.read_vec(Reader::read_split)?,
        end_block_height: r.read_u64()?,
    };
    r.finish()?;
    Ok(rule)
}
