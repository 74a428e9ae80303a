//! Block headers as seen by the execution engine.
//!
//! The engine does not produce or order blocks. It receives a reference to
//! the parent block, applies transactions on top of it, and reports the
//! header fields it is responsible for (state root and transaction root).

use crate::codec::{write_bytes, write_string, write_u64};
use crate::crypto::hash_sha256;
use crate::types::{BlockHeight, Hash, ZERO_HASH};

/// The parent block a transaction executes on top of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRef {
    pub height: BlockHeight,
    pub hash: Hash,
    /// Logical time from the consensus header, never the OS clock.
    pub timestamp: u64,
}

impl BlockRef {
    /// Reference to the empty genesis parent.
    pub fn genesis() -> Self {
        Self {
            height: 0,
            hash: ZERO_HASH,
            timestamp: 0,
        }
    }
}

/// Header of a block after the engine has applied it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    pub chain_id: String,
    pub height: BlockHeight,
    pub parent_hash: Hash,
    /// Merkle root of the state after this block.
    pub state_root: Hash,
    /// Merkle root of the ordered transaction hashes.
    pub tx_root: Hash,
    pub timestamp: u64,
}

impl BlockHeader {
    /// Canonical header bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(128 + self.chain_id.len());
        write_string(&mut buf, &self.chain_id);
        write_u64(&mut buf, self.height);
        write_bytes(&mut buf, &self.parent_hash);
        write_bytes(&mut buf, &self.state_root);
        write_bytes(&mut buf, &self.tx_root);
        write_u64(&mut buf, self.timestamp);
        buf
    }

    /// SHA-256 over the canonical header bytes.
    pub fn hash(&self) -> Hash {
        hash_sha256(&self.encode())
    }

    /// Reference to this block, for executing its child.
    pub fn as_parent(&self) -> BlockRef {
        BlockRef {
            height: self.height,
            hash: self.hash(),
            timestamp: self.timestamp,
        }
    }
}
