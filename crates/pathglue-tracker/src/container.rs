//! Unsynchronized inode → directory-entry map with cascading release.
//!
//! Every entry holds one reference on its parent, so an ancestor stays in the
//! map as long as any descendant does. Callers serialize access; see
//! [`crate::InodeTracker`].

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt::Write;

use tracing::{debug, error};

use crate::short_string::{NameString, PathString};

/// Directory entry for one tracked inode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dirent {
    /// Inode of the containing directory (meaningless for the root)
    pub parent_inode: u64,
    /// Name within the parent; empty exactly for the root
    pub name: NameString,
    /// Live holders: kernel lookups plus one per registered child
    pub references: u32,
}

impl Dirent {
    fn new(parent_inode: u64, name: &NameString) -> Self {
        Self {
            parent_inode,
            name: name.clone(),
            references: 1,
        }
    }

    pub fn is_root(&self) -> bool {
        self.name.is_empty()
    }

    fn grant(&mut self, op: &'static str, inode: u64) {
        self.references = match self.references.checked_add(1) {
            Some(references) => references,
            None => consistency_fault(op, inode, "reference count overflow"),
        };
    }
}

/// Report a broken invariant and bring the process down.
#[cold]
#[track_caller]
pub(crate) fn consistency_fault(op: &'static str, inode: u64, detail: &str) -> ! {
    error!(op, inode, detail, "inode tracker consistency fault");
    panic!("inode tracker consistency fault in {op} (inode {inode}): {detail}");
}

#[derive(Debug, Clone, Default)]
pub struct InodeContainer {
    map: HashMap<u64, Dirent>,
}

impl InodeContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            map: HashMap::with_capacity(capacity),
        }
    }

    /// Register `inode`, taking a reference on its parent when it is new.
    ///
    /// The parent must already be present unless `name` is empty.
    /// Returns true if the inode was not tracked before.
    pub fn get(&mut self, inode: u64, parent_inode: u64, name: &NameString) -> bool {
        debug!(inode, name = %name, "get inode");
        if let Some(dirent) = self.map.get_mut(&inode) {
            dirent.grant("get", inode);
            return false;
        }

        self.map.insert(inode, Dirent::new(parent_inode, name));
        if !name.is_empty() {
            match self.map.get_mut(&parent_inode) {
                Some(parent) => parent.grant("get", parent_inode),
                None => consistency_fault("get", inode, "parent inode not tracked"),
            }
        }
        true
    }

    /// Same as [`get`](Self::get) but leaves the parent's count alone; the
    /// caller has already accounted for it.
    pub fn add(&mut self, inode: u64, parent_inode: u64, name: &NameString) -> bool {
        debug!(inode, name = %name, "add inode");
        if let Some(dirent) = self.map.get_mut(&inode) {
            dirent.grant("add", inode);
            return false;
        }

        self.map.insert(inode, Dirent::new(parent_inode, name));
        true
    }

    /// Drop `by` references from `inode`, pruning every entry on the way to
    /// the root whose count reaches zero.
    ///
    /// Returns the number of removed entries.
    pub fn put(&mut self, inode: u64, by: u32) -> u32 {
        debug!(inode, by, "put inode");
        let mut removed = 0;
        let mut current = inode;
        let mut by = by;

        loop {
            let entry = match self.map.entry(current) {
                Entry::Occupied(entry) => entry,
                Entry::Vacant(_) => consistency_fault("put", current, "inode not tracked"),
            };

            let references = entry.get().references;
            if references < by {
                consistency_fault(
                    "put",
                    current,
                    &format!("releasing {by} references, only {references} held"),
                );
            }

            if references > by {
                entry.into_mut().references -= by;
                return removed;
            }

            let dirent = entry.remove();
            removed += 1;
            if dirent.is_root() {
                return removed;
            }
            current = dirent.parent_inode;
            by = 1;
        }
    }

    /// Append the path of `inode` to `path`.
    ///
    /// Returns false if `inode` is unknown, or if its parent chain is broken;
    /// in the latter case `path` still holds the segments below the break.
    pub fn construct_path(&self, inode: u64, path: &mut PathString) -> bool {
        let dirent = match self.map.get(&inode) {
            Some(dirent) => dirent,
            None => return false,
        };

        if dirent.is_root() {
            return true;
        }

        let complete = if self.map.contains_key(&dirent.parent_inode) {
            self.construct_path(dirent.parent_inode, path)
        } else {
            error!(
                inode,
                parent_inode = dirent.parent_inode,
                "internal error: parent chain broken while constructing path"
            );
            false
        };

        path.append(b"/");
        path.append(dirent.name.as_bytes());
        complete
    }

    pub fn contains(&self, inode: u64) -> bool {
        self.map.contains_key(&inode)
    }

    pub fn dirent(&self, inode: u64) -> Option<&Dirent> {
        self.map.get(&inode)
    }

    pub fn references(&self, inode: u64) -> Option<u32> {
        self.map.get(&inode).map(|d| d.references)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// One line per entry, sorted by inode.
    pub fn debug_dump(&self) -> String {
        let mut inodes: Vec<_> = self.map.keys().copied().collect();
        inodes.sort_unstable();

        let mut out = String::new();
        for inode in inodes {
            let d = &self.map[&inode];
            let _ = writeln!(
                out,
                "[{}]  parent: {}  name: {}  refcnt: {}",
                inode, d.parent_inode, d.name, d.references
            );
        }
        out
    }
}
