//! Lock-free diagnostic counters for the inode tracker.
//!
//! Counters are updated with relaxed atomics outside the tracker lock, so a
//! snapshot is only approximately consistent with the container at any
//! instant.

use std::fmt;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

#[derive(Debug, Default)]
pub struct Statistics {
    pub inserts: AtomicU64,
    pub references: AtomicI64,
    pub removes: AtomicU64,
    pub dangling_attempts: AtomicU64,
    pub duplicate_adds: AtomicU64,
    pub reconstruction_hits: AtomicU64,
    pub reconstruction_misses: AtomicU64,
}

/// Plain-value copy of [`Statistics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatisticsSnapshot {
    pub inserts: u64,
    pub references: i64,
    pub removes: u64,
    pub dangling_attempts: u64,
    pub duplicate_adds: u64,
    pub reconstruction_hits: u64,
    pub reconstruction_misses: u64,
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatisticsSnapshot {
        StatisticsSnapshot {
            inserts: self.inserts.load(Ordering::Relaxed),
            references: self.references.load(Ordering::Relaxed),
            removes: self.removes.load(Ordering::Relaxed),
            dangling_attempts: self.dangling_attempts.load(Ordering::Relaxed),
            duplicate_adds: self.duplicate_adds.load(Ordering::Relaxed),
            reconstruction_hits: self.reconstruction_hits.load(Ordering::Relaxed),
            reconstruction_misses: self.reconstruction_misses.load(Ordering::Relaxed),
        }
    }

    pub fn from_snapshot(s: &StatisticsSnapshot) -> Self {
        Self {
            inserts: AtomicU64::new(s.inserts),
            references: AtomicI64::new(s.references),
            removes: AtomicU64::new(s.removes),
            dangling_attempts: AtomicU64::new(s.dangling_attempts),
            duplicate_adds: AtomicU64::new(s.duplicate_adds),
            reconstruction_hits: AtomicU64::new(s.reconstruction_hits),
            reconstruction_misses: AtomicU64::new(s.reconstruction_misses),
        }
    }

    pub(crate) fn store(&self, s: &StatisticsSnapshot) {
        self.inserts.store(s.inserts, Ordering::Relaxed);
        self.references.store(s.references, Ordering::Relaxed);
        self.removes.store(s.removes, Ordering::Relaxed);
        self.dangling_attempts
            .store(s.dangling_attempts, Ordering::Relaxed);
        self.duplicate_adds.store(s.duplicate_adds, Ordering::Relaxed);
        self.reconstruction_hits
            .store(s.reconstruction_hits, Ordering::Relaxed);
        self.reconstruction_misses
            .store(s.reconstruction_misses, Ordering::Relaxed);
    }
}

impl fmt::Display for StatisticsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "inserts:               {}", self.inserts)?;
        writeln!(f, "references:            {}", self.references)?;
        writeln!(f, "removes:               {}", self.removes)?;
        writeln!(f, "dangling attempts:     {}", self.dangling_attempts)?;
        writeln!(f, "duplicate adds:        {}", self.duplicate_adds)?;
        writeln!(f, "reconstruction hits:   {}", self.reconstruction_hits)?;
        write!(f, "reconstruction misses: {}", self.reconstruction_misses)
    }
}
