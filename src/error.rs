//! # Error types for the trie

use alloy_primitives::B256;
use thiserror::Error;

/// Errors reported by trie and proof operations.
///
/// Traversal mismatches are deterministic functions of the trie state and the
/// key, so none of these are retryable.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TrieError {
    #[error("key not found")]
    KeyNotFound,

    #[error("leaf path does not match the remaining key")]
    LeafPath,

    #[error("extension path does not match the remaining key")]
    ExtensionPath,

    #[error("branch has no child for nibble {0:#x}")]
    BranchPath(u8),

    #[error("invalid node encoding")]
    InvalidNode,

    #[error("RLP decode error: {0}")]
    Rlp(#[from] rlp::DecoderError),

    #[error("node {0} missing from storage")]
    MissingNode(B256),

    #[error("operation on an empty trie")]
    EmptyTrie,

    #[error("key is present in the trie")]
    KeyPresent,

    #[error("proof root {proof} does not match trie root {trie}")]
    RootMismatch { proof: B256, trie: B256 },

    #[error("proof kind does not match the requested verification")]
    ProofKindMismatch,

    #[error("snapshot codec error: {0}")]
    Snapshot(String),
}

/// Result type for trie operations.
pub type Result<T> = std::result::Result<T, TrieError>;
