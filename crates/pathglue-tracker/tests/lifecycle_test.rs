//! Balanced lookup/forget workloads must leave nothing behind.

use std::collections::BTreeMap;
use std::io::Write;

use pathglue_tracker::{read_trace, replay, InodeTracker, NameString, TraceOutcome};
use proptest::prelude::*;
use tempfile::NamedTempFile;

const ROOT_INODE: u64 = 1;

/// One kernel-side step. `pick` selects among the currently held inodes in
/// ascending inode order.
#[derive(Debug, Clone)]
enum Op {
    /// Lookup of a new child under a held inode
    Lookup { pick: usize },
    /// Repeated lookup of a held inode
    Relookup { pick: usize },
    /// Create a child: take the parent reference through a lookup, then add
    Create { pick: usize },
    /// Add of an inode that is already tracked
    DuplicateAdd { pick: usize },
    /// Forget up to `amount` references on a held inode
    Forget { pick: usize, amount: u32 },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => any::<usize>().prop_map(|pick| Op::Lookup { pick }),
        2 => any::<usize>().prop_map(|pick| Op::Relookup { pick }),
        2 => any::<usize>().prop_map(|pick| Op::Create { pick }),
        1 => any::<usize>().prop_map(|pick| Op::DuplicateAdd { pick }),
        4 => (any::<usize>(), 1..=4u32).prop_map(|(pick, amount)| Op::Forget { pick, amount }),
    ]
}

/// What the FUSE layer knows: lookup counts it owes the tracker, and the
/// (parent, name) each inode was registered with.
struct Kernel {
    held: BTreeMap<u64, u32>,
    entries: BTreeMap<u64, (u64, NameString)>,
    next_inode: u64,
}

impl Kernel {
    fn new() -> Self {
        Self {
            held: BTreeMap::new(),
            entries: BTreeMap::new(),
            next_inode: ROOT_INODE + 1,
        }
    }

    fn pick(&self, pick: usize) -> u64 {
        let index = pick % self.held.len();
        *self.held.keys().nth(index).unwrap()
    }

    fn fresh_child(&mut self, parent: u64) -> (u64, NameString) {
        let inode = self.next_inode;
        self.next_inode += 1;
        let name = NameString::from(format!("n{}", inode).as_str());
        self.entries.insert(inode, (parent, name.clone()));
        (inode, name)
    }

    fn register_root(&mut self, tracker: &InodeTracker) {
        assert!(tracker.vfs_get(ROOT_INODE, 0, &NameString::new()));
        self.entries.insert(ROOT_INODE, (0, NameString::new()));
        self.held.insert(ROOT_INODE, 1);
    }

    fn apply(&mut self, tracker: &InodeTracker, op: &Op) {
        match *op {
            Op::Lookup { pick } => {
                let parent = self.pick(pick);
                let (inode, name) = self.fresh_child(parent);
                assert!(tracker.vfs_get(inode, parent, &name));
                self.held.insert(inode, 1);
            }
            Op::Relookup { pick } => {
                let inode = self.pick(pick);
                let (parent, name) = &self.entries[&inode];
                assert!(tracker.vfs_get(inode, *parent, name));
                *self.held.entry(inode).or_default() += 1;
            }
            Op::Create { pick } => {
                let parent = self.pick(pick);
                let (grandparent, parent_name) = self.entries[&parent].clone();
                // The child owns this reference; the kernel does not forget it
                assert!(tracker.vfs_get(parent, grandparent, &parent_name));
                let (inode, name) = self.fresh_child(parent);
                assert!(tracker.vfs_add(inode, parent, &name));
                self.held.insert(inode, 1);
            }
            Op::DuplicateAdd { pick } => {
                let inode = self.pick(pick);
                let (parent, name) = &self.entries[&inode];
                assert!(!tracker.vfs_add(inode, *parent, name));
                *self.held.entry(inode).or_default() += 1;
            }
            Op::Forget { pick, amount } => {
                let inode = self.pick(pick);
                let count = self.held[&inode];
                let by = amount.min(count);
                tracker.vfs_put(inode, by);
                if by == count {
                    self.held.remove(&inode);
                } else {
                    self.held.insert(inode, count - by);
                }
                if self.held.is_empty() {
                    assert!(tracker.is_empty(), "leaked:\n{}", tracker.debug_dump());
                    self.register_root(tracker);
                }
            }
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn test_balanced_workload_leaves_no_entries(
        ops in prop::collection::vec(op_strategy(), 1..400)
    ) {
        let tracker = InodeTracker::new();
        let mut kernel = Kernel::new();
        kernel.register_root(&tracker);

        let duplicate_adds = ops
            .iter()
            .filter(|op| matches!(op, Op::DuplicateAdd { .. }))
            .count() as u64;

        for op in &ops {
            kernel.apply(&tracker, op);

            // Anything the kernel still holds must resolve
            for inode in kernel.held.keys() {
                prop_assert!(tracker.find(*inode).found, "lost inode {} after {:?}", inode, op);
            }
        }

        let held = std::mem::take(&mut kernel.held);
        for (inode, count) in held {
            tracker.vfs_put(inode, count);
        }
        prop_assert!(tracker.is_empty(), "leaked:\n{}", tracker.debug_dump());

        let stats = tracker.statistics();
        prop_assert_eq!(stats.inserts, stats.removes);
        prop_assert_eq!(stats.references, 0);
        prop_assert_eq!(stats.duplicate_adds, duplicate_adds);
        prop_assert_eq!(stats.dangling_attempts, 0);
    }
}

#[test]
fn test_cascade_only_removes_unreferenced_ancestors() {
    let tracker = InodeTracker::new();
    let n = |s: &str| NameString::from(s);

    tracker.vfs_get(1, 0, &n(""));
    tracker.vfs_get(2, 1, &n("a"));
    tracker.vfs_get(3, 2, &n("b"));
    tracker.vfs_get(4, 3, &n("c"));
    tracker.vfs_get(5, 2, &n("sibling"));

    for inode in [1, 2, 3] {
        tracker.vfs_put(inode, 1);
    }
    assert_eq!(tracker.find(4).path.to_string(), "/a/b/c");

    // "a" is still needed by "sibling", so the cascade stops there
    tracker.vfs_put(4, 1);
    let stats = tracker.statistics();
    assert_eq!(stats.removes, 2);
    assert!(!tracker.contains(3));
    assert_eq!(tracker.references(2), Some(1));
    assert_eq!(tracker.find(5).path.to_string(), "/a/sibling");

    tracker.vfs_put(5, 1);
    assert!(tracker.is_empty());
    assert_eq!(tracker.statistics().removes, 5);
}

#[test]
fn test_replay_trace_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"{{"op":"get","inode":2,"parent":1,"name":""}}
{{"op":"get","inode":3,"parent":2,"name":"dir"}}
{{"op":"get","inode":4,"parent":3,"name":"file.txt"}}
{{"op":"find","inode":4}}
{{"op":"put","inode":2,"count":1}}
{{"op":"put","inode":3,"count":1}}
{{"op":"put","inode":4,"count":1}}
{{"op":"find","inode":4}}"#
    )
    .unwrap();

    let reader = std::io::BufReader::new(std::fs::File::open(file.path()).unwrap());
    let events = read_trace(reader).unwrap();
    assert_eq!(events.len(), 8);

    let tracker = InodeTracker::new();
    let outcomes = replay(&tracker, &events);

    let finds: Vec<_> = outcomes
        .iter()
        .filter_map(|o| match o {
            TraceOutcome::Find { lookup, .. } => Some((lookup.found, lookup.path.to_string())),
            _ => None,
        })
        .collect();
    assert_eq!(
        finds,
        vec![(true, "/dir/file.txt".to_string()), (false, String::new())]
    );
    assert!(tracker.is_empty());
    assert_eq!(tracker.statistics().removes, 3);
}
