//! Store views: the engine's window onto ledger state.
//!
//! The `StoreView` trait decouples executors from the backing store. Two
//! access modes coexist:
//!
//! - a **mutating view**, one per block application, whose writes are
//!   buffered and committed by [`StoreView::save`]
//! - **snapshot views**, freely created for dry runs and queries, which may
//!   buffer writes but can never be saved
//!
//! [`MemStore`] is the in-memory versioned backing store used by tests and
//! the RPC layer. It keeps canonical key/value bytes per height so every
//! committed version has a Merkle state root.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use ledger_primitives::{
    codec::{decode_account, decode_split_rule},
    merkle::state_root,
    state::{account_key, split_rule_key},
    Account, Address, BlockHeight, Hash, SplitRule, StateOverlay, TxError, TxResult,
};
use tracing::{debug, error};

/// A committed state version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Version {
    pub height: BlockHeight,
    pub state_root: Hash,
}

/// Access to ledger state at a height.
///
/// Sanity checks receive `&dyn StoreView` and therefore cannot write.
pub trait StoreView {
    /// Height of the last committed block this view is based on. The block
    /// being applied is `height() + 1`.
    fn height(&self) -> BlockHeight;

    fn get_account(&self, address: &Address) -> Option<Account>;

    /// Buffer an account write.
    fn set_account(&mut self, account: Account);

    fn get_split_rule(&self, resource_id: &str) -> Option<SplitRule>;

    fn set_split_rule(&mut self, rule: SplitRule);

    fn is_snapshot(&self) -> bool;

    /// Commit buffered writes as the next version. Snapshot views fail with
    /// [`TxError::SnapshotCommit`].
    fn save(&mut self) -> TxResult<Version>;
}

/// One committed version of the store.
#[derive(Debug)]
struct Committed {
    height: BlockHeight,
    state_root: Hash,
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl Committed {
    fn version(&self) -> Version {
        Version {
            height: self.height,
            state_root: self.state_root,
        }
    }
}

#[derive(Debug)]
struct StoreInner {
    latest: Arc<Committed>,
    /// Every committed version, keyed by height.
    versions: BTreeMap<BlockHeight, Arc<Committed>>,
}

/// In-memory versioned store shared behind `Arc<RwLock<..>>`.
///
/// Cloning a `MemStore` shares the same underlying versions.
#[derive(Debug, Clone)]
pub struct MemStore {
    inner: Arc<RwLock<StoreInner>>,
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemStore {
    /// An empty store with a genesis version at height 0.
    pub fn new() -> Self {
        Self::with_genesis(Vec::new())
    }

    /// A store whose genesis version (height 0) holds `accounts`.
    pub fn with_genesis(accounts: impl IntoIterator<Item = Account>) -> Self {
        let mut overlay = StateOverlay::new();
        for account in accounts {
            overlay.set_account(account);
        }
        let entries = overlay.into_writes();
        let genesis = Committed {
            height: 0,
            state_root: state_root(&entries),
            entries,
        };
        let genesis = Arc::new(genesis);
        let mut versions = BTreeMap::new();
        versions.insert(0, Arc::clone(&genesis));
        Self {
            inner: Arc::new(RwLock::new(StoreInner {
                latest: genesis,
                versions,
            })),
        }
    }

    fn latest_committed(&self) -> Arc<Committed> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&inner.latest)
    }

    /// The most recently committed version.
    pub fn latest_version(&self) -> Version {
        self.latest_committed().version()
    }

    /// A mutating view on top of the latest version.
    pub fn mutable_view(&self) -> LedgerView {
        LedgerView::new(self.clone(), self.latest_committed(), false)
    }

    /// A snapshot view of the latest version.
    pub fn snapshot(&self) -> LedgerView {
        LedgerView::new(self.clone(), self.latest_committed(), true)
    }

    /// A snapshot view of the version committed at `height`.
    pub fn snapshot_at(&self, height: BlockHeight) -> Option<LedgerView> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner
            .versions
            .get(&height)
            .cloned()
            .map(|base| LedgerView::new(self.clone(), base, true))
    }

    /// Apply `writes` on top of `base` as version `base.height + 1`.
    ///
    /// Fails if another view committed on top of `base` first.
    fn commit(
        &self,
        base: &Committed,
        writes: BTreeMap<Vec<u8>, Vec<u8>>,
    ) -> TxResult<Arc<Committed>> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let latest_height = inner.latest.height;
        if latest_height != base.height {
            error!(
                base = base.height,
                latest = latest_height,
                "refusing to commit a stale view"
            );
            return Err(TxError::InvariantViolation(format!(
                "view based on height {} is stale",
                base.height
            )));
        }

        let mut entries = base.entries.clone();
        entries.extend(writes);
        let height = base.height + 1;
        let committed = Arc::new(Committed {
            height,
            state_root: state_root(&entries),
            entries,
        });
        inner.versions.insert(height, Arc::clone(&committed));
        inner.latest = Arc::clone(&committed);
        debug!(height, "committed store version");
        Ok(committed)
    }
}

/// A view over one committed version of a [`MemStore`] plus buffered writes.
#[derive(Debug, Clone)]
pub struct LedgerView {
    store: MemStore,
    base: Arc<Committed>,
    overlay: StateOverlay,
    snapshot: bool,
}

impl LedgerView {
    fn new(store: MemStore, base: Arc<Committed>, snapshot: bool) -> Self {
        Self {
            store,
            base,
            overlay: StateOverlay::new(),
            snapshot,
        }
    }

    /// Number of records written since the last save.
    pub fn pending_writes(&self) -> usize {
        self.overlay.len()
    }
}

impl StoreView for LedgerView {
    fn height(&self) -> BlockHeight {
        self.base.height
    }

    fn get_account(&self, address: &Address) -> Option<Account> {
        if let Some(account) = self.overlay.account(address) {
            return Some(account.clone());
        }
        let bytes = self.base.entries.get(&account_key(address))?;
        match decode_account(bytes) {
            Ok(account) => Some(account),
            Err(err) => {
                error!(%err, "corrupt account record in committed state");
                None
            }
        }
    }

    fn set_account(&mut self, account: Account) {
        self.overlay.set_account(account);
    }

    fn get_split_rule(&self, resource_id: &str) -> Option<SplitRule> {
        if let Some(rule) = self.overlay.split_rule(resource_id) {
            return Some(rule.clone());
        }
        let bytes = self.base.entries.get(&split_rule_key(resource_id))?;
        match decode_split_rule(bytes) {
            Ok(rule) => Some(rule),
            Err(err) => {
                error!(%err, resource_id, "corrupt split rule in committed state");
                None
            }
        }
    }

    fn set_split_rule(&mut self, rule: SplitRule) {
        self.overlay.set_split_rule(rule);
    }

    fn is_snapshot(&self) -> bool {
        self.snapshot
    }

    fn save(&mut self) -> TxResult<Version> {
        if self.snapshot {
            return Err(TxError::SnapshotCommit);
        }
        let writes = std::mem::take(&mut self.overlay).into_writes();
        let committed = self.store.commit(&self.base, writes)?;
        self.base = committed;
        Ok(self.base.version())
    }
}
