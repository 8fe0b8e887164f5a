//! Thread-safe inode tracker used by the filesystem callback threads.
//!
//! All container access happens under one mutex held for the whole
//! operation, including cascading releases and path walks. Statistics are
//! updated after the lock is dropped.

use std::sync::atomic::Ordering;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::container::{consistency_fault, InodeContainer};
use crate::short_string::{NameString, PathString};
use crate::statistics::{Statistics, StatisticsSnapshot};

/// Result of [`InodeTracker::find`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathLookup {
    /// False when the inode is unknown or its parent chain is broken
    pub found: bool,
    /// Full path on a hit; segments below the break on a broken chain
    pub path: PathString,
}

impl PathLookup {
    pub fn path(&self) -> Option<&PathString> {
        self.found.then_some(&self.path)
    }
}

/// Deep copy of a tracker, carried across a reload boundary.
#[derive(Debug, Clone)]
pub struct TrackerSnapshot {
    pub version: u32,
    pub container: InodeContainer,
    pub statistics: StatisticsSnapshot,
}

#[derive(Debug)]
pub struct InodeTracker {
    version: u32,
    inode2path: Mutex<InodeContainer>,
    statistics: Statistics,
}

impl InodeTracker {
    /// Layout version of the tracked state. Bump when `Dirent` or the
    /// statistics block changes shape.
    pub const VERSION: u32 = 2;

    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            version: Self::VERSION,
            inode2path: Mutex::new(InodeContainer::with_capacity(capacity)),
            statistics: Statistics::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, InodeContainer> {
        self.inode2path
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a kernel lookup of `inode` under `parent_inode`.
    ///
    /// Returns false, without touching the tracked state, if `name` is not
    /// empty and the parent is not tracked. The caller should then resolve the
    /// path through the catalog instead.
    pub fn vfs_get(&self, inode: u64, parent_inode: u64, name: &NameString) -> bool {
        let new_inode = {
            let mut inode2path = self.lock();
            if !name.is_empty() && !inode2path.contains(parent_inode) {
                drop(inode2path);
                debug!(inode, parent_inode, "rejecting lookup with untracked parent");
                Statistics::inc(&self.statistics.dangling_attempts);
                return false;
            }
            inode2path.get(inode, parent_inode, name)
        };

        if new_inode {
            Statistics::inc(&self.statistics.inserts);
        }
        self.statistics.references.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Register `inode` whose parent reference was already taken elsewhere.
    ///
    /// Returns true if the inode is new.
    pub fn vfs_add(&self, inode: u64, parent_inode: u64, name: &NameString) -> bool {
        let new_inode = self.lock().add(inode, parent_inode, name);
        if new_inode {
            Statistics::inc(&self.statistics.inserts);
        } else {
            self.statistics.references.fetch_add(1, Ordering::Relaxed);
            Statistics::inc(&self.statistics.duplicate_adds);
        }
        new_inode
    }

    /// Release `by` references on `inode` (kernel forget).
    pub fn vfs_put(&self, inode: u64, by: u32) {
        let removed = self.lock().put(inode, by);
        self.statistics
            .removes
            .fetch_add(u64::from(removed), Ordering::Relaxed);
        self.statistics
            .references
            .fetch_sub(i64::from(by), Ordering::Relaxed);
    }

    /// Reconstruct the path that was valid when each segment was learned.
    pub fn find(&self, inode: u64) -> PathLookup {
        let mut path = PathString::new();
        let found = self.lock().construct_path(inode, &mut path);

        if found {
            Statistics::inc(&self.statistics.reconstruction_hits);
        } else {
            Statistics::inc(&self.statistics.reconstruction_misses);
        }
        PathLookup { found, path }
    }

    pub fn contains(&self, inode: u64) -> bool {
        self.lock().contains(inode)
    }

    pub fn references(&self, inode: u64) -> Option<u32> {
        self.lock().references(inode)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn statistics(&self) -> StatisticsSnapshot {
        self.statistics.snapshot()
    }

    pub fn debug_dump(&self) -> String {
        self.lock().debug_dump()
    }

    /// Deep copy of the tracked state. Callers quiesce the tracker first.
    pub fn snapshot(&self) -> TrackerSnapshot {
        TrackerSnapshot {
            version: self.version,
            container: self.lock().clone(),
            statistics: self.statistics.snapshot(),
        }
    }

    /// Rebuild a tracker from a snapshot taken before a reload.
    ///
    /// Aborts if the snapshot was produced by an incompatible layout.
    pub fn restore(snapshot: TrackerSnapshot) -> Self {
        Self::check_version(snapshot.version);
        Self {
            version: Self::VERSION,
            inode2path: Mutex::new(snapshot.container),
            statistics: Statistics::from_snapshot(&snapshot.statistics),
        }
    }

    /// Replace this tracker's state with a deep copy of `other`'s.
    ///
    /// Neither tracker may be in use by other threads during the copy.
    pub fn migrate_from(&self, other: &InodeTracker) {
        if std::ptr::eq(self, other) {
            return;
        }
        Self::check_version(other.version);
        let container = other.lock().clone();
        let statistics = other.statistics.snapshot();

        debug!(entries = container.len(), "migrating inode tracker state");
        *self.lock() = container;
        self.statistics.store(&statistics);
    }

    fn check_version(version: u32) {
        if version != Self::VERSION {
            consistency_fault(
                "migrate",
                0,
                &format!(
                    "tracker version mismatch: source {version}, expected {}",
                    Self::VERSION
                ),
            );
        }
    }
}

impl Default for InodeTracker {
    fn default() -> Self {
        Self::new()
    }
}
