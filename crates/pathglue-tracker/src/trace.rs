//! Recorded filesystem events, replayable against an [`InodeTracker`].
//!
//! Traces are JSON Lines, one event per line:
//!
//! ```text
//! {"op":"get","inode":2,"parent":1,"name":""}
//! {"op":"get","inode":3,"parent":2,"name":"dir"}
//! {"op":"find","inode":3}
//! {"op":"put","inode":3,"count":1}
//! ```

use std::io::BufRead;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::short_string::NameString;
use crate::tracker::{InodeTracker, PathLookup};

#[derive(Error, Debug)]
pub enum TraceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, TraceError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum TraceEvent {
    /// Kernel lookup; parent must be tracked
    Get {
        inode: u64,
        parent: u64,
        #[serde(default)]
        name: String,
    },
    /// Registration whose parent reference is already held
    Add {
        inode: u64,
        parent: u64,
        #[serde(default)]
        name: String,
    },
    /// Kernel forget
    Put {
        inode: u64,
        #[serde(default = "default_count")]
        count: u32,
    },
    Find { inode: u64 },
}

fn default_count() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceOutcome {
    Get { inode: u64, accepted: bool },
    Add { inode: u64, new_inode: bool },
    Put { inode: u64 },
    Find { inode: u64, lookup: PathLookup },
}

impl TraceEvent {
    pub fn apply(&self, tracker: &InodeTracker) -> TraceOutcome {
        match self {
            TraceEvent::Get {
                inode,
                parent,
                name,
            } => TraceOutcome::Get {
                inode: *inode,
                accepted: tracker.vfs_get(*inode, *parent, &NameString::from(name.as_str())),
            },
            TraceEvent::Add {
                inode,
                parent,
                name,
            } => TraceOutcome::Add {
                inode: *inode,
                new_inode: tracker.vfs_add(*inode, *parent, &NameString::from(name.as_str())),
            },
            TraceEvent::Put { inode, count } => {
                tracker.vfs_put(*inode, *count);
                TraceOutcome::Put { inode: *inode }
            }
            TraceEvent::Find { inode } => TraceOutcome::Find {
                inode: *inode,
                lookup: tracker.find(*inode),
            },
        }
    }
}

/// Parse a JSON Lines trace. Blank lines and `#` comments are skipped.
pub fn read_trace<R: BufRead>(reader: R) -> Result<Vec<TraceEvent>> {
    let mut events = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let event = serde_json::from_str(trimmed).map_err(|source| TraceError::Parse {
            line: idx + 1,
            source,
        })?;
        events.push(event);
    }
    Ok(events)
}

/// Apply events in order.
pub fn replay<'a, I>(tracker: &InodeTracker, events: I) -> Vec<TraceOutcome>
where
    I: IntoIterator<Item = &'a TraceEvent>,
{
    events.into_iter().map(|e| e.apply(tracker)).collect()
}
