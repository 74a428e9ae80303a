//! Core type aliases and constants for the ledger execution engine.

use std::fmt::Write;

/// 32-byte hash used for transaction hashes, block hashes and state roots.
pub type Hash = [u8; 32];

/// Length of an account address in bytes.
pub const ADDRESS_LEN: usize = 20;

/// 20-byte account identifier derived from a public key.
pub type Address = [u8; ADDRESS_LEN];

/// Block height (monotonically increasing).
pub type BlockHeight = u64;

/// A zero-valued hash (32 zero bytes).
pub const ZERO_HASH: Hash = [0u8; 32];

/// The zero address. Never valid as a transaction input or output.
pub const ZERO_ADDRESS: Address = [0u8; ADDRESS_LEN];

/// Returns true if every byte of the address is zero.
pub fn is_zero_address(addr: &Address) -> bool {
    addr.iter().all(|b| *b == 0)
}

fn bytes_to_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(2 + bytes.len() * 2);
    s.push_str("0x");
    for byte in bytes {
        let _ = write!(s, "{:02x}", byte);
    }
    s
}

/// Convert a `Hash` to a 0x-prefixed hex string.
pub fn hash_to_hex(hash: &Hash) -> String {
    bytes_to_hex(hash)
}

/// Convert an `Address` to a 0x-prefixed hex string.
pub fn address_to_hex(addr: &Address) -> String {
    bytes_to_hex(addr)
}
