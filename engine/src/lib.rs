//! `ledger-engine`: deterministic transaction execution for the account ledger.
//!
//! This crate implements the state transition function of the ledger:
//! given a view of committed state and a transaction, decide whether the
//! transaction is acceptable and, if so, apply it.
//!
//! ## Architecture
//!
//! - [`view::StoreView`] - the engine's only access to state
//! - [`view::MemStore`] - in-memory versioned store with Merkle state roots
//! - [`validation`] - shared input/output/fee/sequence checks
//! - [`executors`] - one two-phase executor per transaction kind
//! - [`vm::VirtualMachine`] - boundary to the contract interpreter
//! - [`executor::Executor`] - dispatch by kind and block application
//!
//! Every node must compute byte-identical results from the same inputs, so
//! nothing here reads clocks, randomness, or iteration-order-dependent maps.

pub mod executor;
pub mod executors;
pub mod validation;
pub mod view;
pub mod vm;

pub use executor::{BlockResult, Executor, TxReceipt};
pub use executors::{ExecutionContext, ProcessedTx, TxExecutor, TxInfo};
pub use view::{LedgerView, MemStore, StoreView, Version};
pub use vm::{ContractLog, ContractOutcome, VirtualMachine};
