//! # pathglue-tracker
//!
//! Inode-to-path tracking for FUSE clients.
//!
//! The kernel refers to files by inode number long after the lookup that
//! produced it. When the backing catalog is reloaded, those inodes may no
//! longer be resolvable through the new namespace, so the client records the
//! `(parent, name)` pair for every inode it hands out and reconstructs paths
//! from that chain.
//!
//! - [`InodeContainer`]: unsynchronized refcounted parent-chain map
//! - [`InodeTracker`]: mutex-guarded container plus atomic [`Statistics`]
//! - [`trace`]: JSON Lines event traces for replaying recorded sessions
//!
//! Broken invariants (releasing more references than held, registering a
//! child under an untracked parent through the checked path) panic; the
//! workspace builds with `panic = "abort"`.

pub mod container;
pub mod short_string;
pub mod statistics;
pub mod trace;
pub mod tracker;

pub use container::{Dirent, InodeContainer};
pub use short_string::{NameString, PathString, ShortString, NAME_CAPACITY, PATH_CAPACITY};
pub use statistics::{Statistics, StatisticsSnapshot};
pub use trace::{read_trace, replay, TraceError, TraceEvent, TraceOutcome};
pub use tracker::{InodeTracker, PathLookup, TrackerSnapshot};
