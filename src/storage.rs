//! # Backing store
//!
//! The trie does not own persistence: the caller supplies an associative map
//! from node hash to canonical node encoding. Writes are append-only from the
//! trie's point of view; nothing in the core ever deletes a stored entry, so
//! references committed under an old root stay resolvable.

use std::collections::HashMap;

use alloy_primitives::B256;

/// Node store interface. Keys are always hash references; inline references
/// never touch the store.
pub trait TrieDB {
    /// Get a node encoding by its hash.
    fn get(&self, hash: &B256) -> Option<Vec<u8>>;

    /// Store a node encoding under its hash.
    fn set(&mut self, hash: B256, encoding: Vec<u8>);
}

// A mutable borrow of a store is itself a store, so one caller-owned store
// can back several trie sessions in turn.
impl<T: TrieDB + ?Sized> TrieDB for &mut T {
    fn get(&self, hash: &B256) -> Option<Vec<u8>> {
        (**self).get(hash)
    }

    fn set(&mut self, hash: B256, encoding: Vec<u8>) {
        (**self).set(hash, encoding)
    }
}

/// In-memory node store.
#[derive(Debug, Clone, Default)]
pub struct MemoryDB {
    nodes: HashMap<B256, Vec<u8>>,
}

impl MemoryDB {
    pub fn new() -> Self {
        MemoryDB::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate over all stored node encodings.
    pub fn encodings(&self) -> impl Iterator<Item = &Vec<u8>> {
        self.nodes.values()
    }
}

impl TrieDB for MemoryDB {
    fn get(&self, hash: &B256) -> Option<Vec<u8>> {
        self.nodes.get(hash).cloned()
    }

    fn set(&mut self, hash: B256, encoding: Vec<u8>) {
        self.nodes.insert(hash, encoding);
    }
}
