//! Memoization caches for heap and entity hashes.
//!
//! One [`HandleCache`] lives for the duration of a single hashing
//! invocation. Inserts are write-once in effect: every entry is computed
//! from immutable metadata, so recomputation always yields the stored value.
//! The struct-layout map is the one deliberate exception: recursive layout
//! computation pre-stores the neutral [`crate::hashing::OFFSET`] before
//! descending, and overwrites it with the final value afterwards. The
//! placeholder is the empty structural fingerprint, which is the correct
//! fixpoint for self-referential primitive types.

use rustc_hash::FxHashMap;

use crate::metadata::token::Token;

/// Per-invocation memoization state, keyed by heap index or token.
#[derive(Default)]
pub struct HandleCache {
    /// `#Strings` index -> FNV hash of the UTF-8 bytes
    pub strings: FxHashMap<u32, u64>,
    /// Entity token -> identity ("usage") hash
    pub entities: FxHashMap<Token, u64>,
    /// `TypeDef` rid -> recursive struct-layout hash
    pub struct_layouts: FxHashMap<u32, u64>,
}

impl HandleCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        HandleCache::default()
    }
}
