//! Thread state blobs
//!
//! A thread state is an opaque array of 32-bit words whose format is named
//! by a flavor. The exception protocol carries at most
//! [`THREAD_STATE_MAX`] words in either direction.

use crate::error::{ExcError, Result};

/// Largest state the protocol carries, in words
pub const THREAD_STATE_MAX: usize = 1296;

/// `ARM_THREAD_STATE64` flavor
pub const ARM_THREAD_STATE64: i32 = 6;
/// Word count of an `ARM_THREAD_STATE64` blob
pub const ARM_THREAD_STATE64_COUNT: usize = 68;

/// Bounded register-state snapshot
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ThreadState(heapless::Vec<u32, THREAD_STATE_MAX>);

impl ThreadState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy caller words, rejecting more than the protocol carries
    pub fn from_slice(words: &[u32]) -> Result<Self> {
        heapless::Vec::from_slice(words)
            .map(Self)
            .map_err(|_| ExcError::ArgumentError {
                field: "old_state",
                len: words.len(),
                max: THREAD_STATE_MAX,
            })
    }

    /// Replace the contents with at most [`THREAD_STATE_MAX`] words;
    /// returns how many were kept
    pub fn fill_truncated(&mut self, words: impl IntoIterator<Item = u32>) -> usize {
        self.0.clear();
        for w in words.into_iter().take(THREAD_STATE_MAX) {
            // take() bounds the iterator to the capacity
            let _ = self.0.push(w);
        }
        self.0.len()
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
