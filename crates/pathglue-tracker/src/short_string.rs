//! Inline byte strings for names and paths on the lookup hot path.
//!
//! A `ShortString<N>` keeps up to `N` bytes inside the value itself. Appends
//! that would exceed the inline capacity move the content to a heap buffer
//! and bump a process-wide overflow counter, so oversized names keep working
//! while the overflow rate stays observable.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Inline capacity for a single path component.
pub const NAME_CAPACITY: usize = 25;
/// Inline capacity for a reconstructed path.
pub const PATH_CAPACITY: usize = 200;

/// A single path component (empty for the root entry).
pub type NameString = ShortString<NAME_CAPACITY>;
/// A `/`-separated path assembled from `NameString` segments.
pub type PathString = ShortString<PATH_CAPACITY>;

static NUM_OVERFLOWS: AtomicU64 = AtomicU64::new(0);

#[derive(Clone)]
pub struct ShortString<const N: usize> {
    stack: [u8; N],
    len: usize,
    heap: Option<Vec<u8>>,
}

impl<const N: usize> ShortString<N> {
    pub const fn new() -> Self {
        Self {
            stack: [0u8; N],
            len: 0,
            heap: None,
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut s = Self::new();
        s.append(bytes);
        s
    }

    /// Append raw bytes. Never allocates while the result fits in `N` bytes.
    pub fn append(&mut self, bytes: &[u8]) {
        if let Some(heap) = self.heap.as_mut() {
            heap.extend_from_slice(bytes);
            return;
        }

        let new_len = self.len + bytes.len();
        if new_len <= N {
            self.stack[self.len..new_len].copy_from_slice(bytes);
            self.len = new_len;
            return;
        }

        NUM_OVERFLOWS.fetch_add(1, Ordering::Relaxed);
        let mut heap = Vec::with_capacity(new_len);
        heap.extend_from_slice(&self.stack[..self.len]);
        heap.extend_from_slice(bytes);
        self.heap = Some(heap);
        self.len = 0;
    }

    pub fn as_bytes(&self) -> &[u8] {
        match &self.heap {
            Some(heap) => heap,
            None => &self.stack[..self.len],
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the content has spilled out of the inline buffer.
    pub fn is_spilled(&self) -> bool {
        self.heap.is_some()
    }

    pub fn clear(&mut self) {
        self.heap = None;
        self.len = 0;
    }

    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(self.as_bytes()).into_owned()
    }

    pub const fn capacity() -> usize {
        N
    }

    /// Number of appends, across all capacities, that had to spill to the heap.
    pub fn num_overflows() -> u64 {
        NUM_OVERFLOWS.load(Ordering::Relaxed)
    }
}

impl<const N: usize> Default for ShortString<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> From<&str> for ShortString<N> {
    fn from(s: &str) -> Self {
        Self::from_bytes(s.as_bytes())
    }
}

impl<const N: usize> PartialEq for ShortString<N> {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl<const N: usize> Eq for ShortString<N> {}

impl<const N: usize> PartialEq<str> for ShortString<N> {
    fn eq(&self, other: &str) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl<const N: usize> PartialEq<&str> for ShortString<N> {
    fn eq(&self, other: &&str) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl<const N: usize> fmt::Display for ShortString<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(self.as_bytes()))
    }
}

impl<const N: usize> fmt::Debug for ShortString<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", String::from_utf8_lossy(self.as_bytes()))
    }
}
