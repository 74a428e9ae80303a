//! `ledger-rpc`: the node-facing service surface of the ledger engine.
//!
//! Transports are out of scope. [`LedgerService`] exposes typed methods and a
//! JSON dispatcher ([`LedgerService::handle`]) that a JSON-RPC server can
//! mount directly.

pub mod error;
pub mod service;
pub mod txpool;
pub mod types;

pub use error::{RpcError, RpcResult};
pub use service::LedgerService;
pub use txpool::{PoolEntry, TxPool};
