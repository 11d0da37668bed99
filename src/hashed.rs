//! # Value-addressed trie
//!
//! A wrapper that derives every key from the value itself: the key is the
//! keccak256 digest of the value's RLP encoding. Storing the same value
//! twice yields the same key, and a value can never sit under a wrong key.

use alloy_primitives::{keccak256, B256};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrieError};
use crate::node::{rlp_encode_bytes, NodeRef};
use crate::proof::Proof;
use crate::storage::{MemoryDB, TrieDB};
use crate::trie::MerklePatriciaTrie;

/// Serialized form of a [`ValueTrie`] over an in-memory store.
#[derive(Serialize, Deserialize)]
struct Snapshot {
    root: Option<Vec<u8>>,
    nodes: Vec<Vec<u8>>,
}

/// A trie whose keys are digests of the stored values.
#[derive(Debug)]
pub struct ValueTrie<DB: TrieDB> {
    trie: MerklePatriciaTrie<DB>,
}

impl<DB: TrieDB> ValueTrie<DB> {
    pub fn new(db: DB) -> Self {
        ValueTrie {
            trie: MerklePatriciaTrie::new(db),
        }
    }

    /// The key a value would be stored under.
    pub fn key_of(value: &[u8]) -> B256 {
        keccak256(rlp_encode_bytes(value))
    }

    /// Store `value` and return its derived key.
    pub fn put(&mut self, value: &[u8]) -> Result<B256> {
        let key = Self::key_of(value);
        self.trie.update(key.as_slice(), value)?;
        Ok(key)
    }

    /// Get the value stored under `key`.
    pub fn get(&self, key: B256) -> Result<Vec<u8>> {
        self.trie.get(key.as_slice())
    }

    pub fn contains(&self, key: B256) -> bool {
        self.trie.contains(key.as_slice())
    }

    /// Replace the value under `key` with `value`, which lands under its own
    /// derived key. Fails if `key` holds nothing.
    pub fn update(&mut self, key: B256, value: &[u8]) -> Result<B256> {
        let new_key = Self::key_of(value);
        if new_key == key {
            if !self.contains(key) {
                return Err(TrieError::KeyNotFound);
            }
            return Ok(key);
        }
        self.delete(key)?;
        self.put(value)
    }

    /// Remove the value stored under `key`.
    pub fn delete(&mut self, key: B256) -> Result<()> {
        self.trie.delete(key.as_slice())
    }

    pub fn root(&self) -> Option<&NodeRef> {
        self.trie.root()
    }

    pub fn root_hash(&self) -> B256 {
        self.trie.root_hash()
    }

    pub fn is_empty(&self) -> bool {
        self.trie.is_empty()
    }

    pub fn get_proof_of_inclusion(&self, key: B256) -> Result<Proof> {
        self.trie.get_proof_of_inclusion(key.as_slice())
    }

    pub fn verify_proof_of_inclusion(&self, proof: &Proof) -> Result<bool> {
        self.trie.verify_proof_of_inclusion(proof)
    }

    pub fn get_proof_of_exclusion(&self, key: B256) -> Result<Proof> {
        self.trie.get_proof_of_exclusion(key.as_slice())
    }

    pub fn verify_proof_of_exclusion(&self, proof: &Proof) -> Result<bool> {
        self.trie.verify_proof_of_exclusion(proof)
    }
}

impl ValueTrie<MemoryDB> {
    /// Serialize the trie, node store included, into a byte blob.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let snapshot = Snapshot {
            root: self.trie.root().map(NodeRef::to_bytes),
            nodes: self.trie.db().encodings().cloned().collect(),
        };
        bincode::serialize(&snapshot).map_err(|e| TrieError::Snapshot(e.to_string()))
    }

    /// Rebuild a trie from a [`Self::to_bytes`] blob. Node encodings are
    /// re-keyed by their digest, so a corrupted blob cannot smuggle a node
    /// in under a foreign hash.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let snapshot: Snapshot =
            bincode::deserialize(bytes).map_err(|e| TrieError::Snapshot(e.to_string()))?;

        let mut db = MemoryDB::new();
        for encoding in snapshot.nodes {
            db.set(keccak256(&encoding), encoding);
        }
        let root = snapshot.root.as_deref().map(NodeRef::from_bytes).transpose()?;

        Ok(ValueTrie {
            trie: MerklePatriciaTrie::from_root(db, root, false),
        })
    }
}
