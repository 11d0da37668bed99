//! # Merkle Patricia Trie
//!
//! Implementation of Ethereum's Modified Merkle Patricia Trie.
//!
//! Key features:
//! - Persistent writes: old roots stay queryable after updates
//! - Compact proofs of inclusion and exclusion
//! - Cryptographic commitment to the entire key/value set
//! - Optional secure mode (keys hashed before use)
//! - A value-addressed wrapper where keys are derived from values

pub mod nibbles;
pub mod node;
pub mod storage;
pub mod trie;
pub mod proof;
pub mod hashed;
pub mod error;

pub use nibbles::NibblePath;
pub use node::{Node, NodeRef, EMPTY_TRIE_ROOT};
pub use storage::{MemoryDB, TrieDB};
pub use trie::MerklePatriciaTrie;
pub use proof::{Proof, ProofKind};
pub use hashed::ValueTrie;
pub use error::{Result, TrieError};
