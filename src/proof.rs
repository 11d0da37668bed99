//! # Merkle proofs
//!
//! Compact proofs of inclusion and exclusion. A proof carries the node
//! encodings met on the walk from the root towards the target key, in walk
//! order. Inline children are embedded in their parent encoding, so the list
//! holds only the root encoding plus every hash-referenced node; a verifier
//! rebuilds the walk from the list alone and must consume it exactly.

use alloy_primitives::{keccak256, B256};

use crate::error::{Result, TrieError};
use crate::node::{Node, NodeRef};
use crate::storage::TrieDB;
use crate::trie::MerklePatriciaTrie;

/// What a proof claims about its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProofKind {
    Inclusion,
    Exclusion,
}

/// A sealed proof. Built by the trie, checked by [`MerklePatriciaTrie`]
/// verification, never modified in between.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proof {
    key: Vec<u8>,
    root_hash: B256,
    kind: ProofKind,
    nodes: Vec<Vec<u8>>,
}

impl Proof {
    /// The key the proof speaks about.
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// Root hash of the trie the proof was generated against.
    pub fn root_hash(&self) -> B256 {
        self.root_hash
    }

    pub fn kind(&self) -> ProofKind {
        self.kind
    }

    /// Node encodings in walk order.
    pub fn nodes(&self) -> &[Vec<u8>] {
        &self.nodes
    }
}

impl<DB: TrieDB> MerklePatriciaTrie<DB> {
    /// Prove that `key` holds a value.
    pub fn get_proof_of_inclusion(&self, key: &[u8]) -> Result<Proof> {
        let root = self.root().cloned().ok_or(TrieError::EmptyTrie)?;
        let mut path = self.key_path(key);
        let mut nodes = Vec::new();
        let mut node = self.proof_step(&root, &mut nodes, true)?;

        loop {
            match node {
                Node::Leaf {
                    path: leaf_path, ..
                } => {
                    if leaf_path == path {
                        break;
                    }
                    return Err(TrieError::LeafPath);
                }
                Node::Extension {
                    path: ext_path,
                    next,
                } => {
                    if !path.starts_with(&ext_path) {
                        return Err(TrieError::ExtensionPath);
                    }
                    path.consume(ext_path.len());
                    node = self.proof_step(&next, &mut nodes, false)?;
                }
                Node::Branch { children, value } => {
                    if path.is_empty() {
                        if value.is_some() {
                            break;
                        }
                        return Err(TrieError::KeyNotFound);
                    }
                    let idx = path.at(0) as usize;
                    match children[idx].clone() {
                        Some(child) => {
                            path.consume(1);
                            node = self.proof_step(&child, &mut nodes, false)?;
                        }
                        None => return Err(TrieError::BranchPath(idx as u8)),
                    }
                }
            }
        }

        Ok(Proof {
            key: key.to_vec(),
            root_hash: self.root_hash(),
            kind: ProofKind::Inclusion,
            nodes,
        })
    }

    /// Prove that `key` holds no value. The walk stops where the trie
    /// diverges from the key, and a sentinel leaf pinning the full target
    /// path is appended so the verifier can confirm what was aimed at.
    pub fn get_proof_of_exclusion(&self, key: &[u8]) -> Result<Proof> {
        let root = self.root().cloned().ok_or(TrieError::EmptyTrie)?;
        if self.contains(key) {
            return Err(TrieError::KeyPresent);
        }

        let full_path = self.key_path(key);
        let mut path = full_path.clone();
        let mut nodes = Vec::new();
        let mut node = self.proof_step(&root, &mut nodes, true)?;

        loop {
            match node {
                // The key is absent, so any leaf met here diverges.
                Node::Leaf { .. } => break,
                Node::Extension {
                    path: ext_path,
                    next,
                } => {
                    if !path.starts_with(&ext_path) {
                        break;
                    }
                    path.consume(ext_path.len());
                    node = self.proof_step(&next, &mut nodes, false)?;
                }
                Node::Branch { children, .. } => {
                    if path.is_empty() {
                        break;
                    }
                    let idx = path.at(0) as usize;
                    match children[idx].clone() {
                        Some(child) => {
                            path.consume(1);
                            node = self.proof_step(&child, &mut nodes, false)?;
                        }
                        None => break,
                    }
                }
            }
        }

        nodes.push(Node::leaf(full_path, b"null".to_vec()).encode());
        Ok(Proof {
            key: key.to_vec(),
            root_hash: self.root_hash(),
            kind: ProofKind::Exclusion,
            nodes,
        })
    }

    /// Check an inclusion proof against this trie's current root.
    ///
    /// Returns `Ok(false)` when the proof's node list does not carry a valid
    /// walk to a value, and an error when the proof is the wrong kind or was
    /// generated against a different root.
    pub fn verify_proof_of_inclusion(&self, proof: &Proof) -> Result<bool> {
        if proof.kind != ProofKind::Inclusion {
            return Err(TrieError::ProofKindMismatch);
        }
        if proof.root_hash != self.root_hash() {
            return Err(TrieError::RootMismatch {
                proof: proof.root_hash,
                trie: self.root_hash(),
            });
        }

        let mut nodes = proof.nodes.iter();
        let Some(first) = nodes.next() else {
            return Ok(false);
        };
        if keccak256(first) != proof.root_hash {
            return Ok(false);
        }

        let mut node = Node::decode(first)?;
        let mut path = self.key_path(&proof.key);
        loop {
            match node {
                Node::Leaf {
                    path: leaf_path, ..
                } => {
                    return Ok(leaf_path == path && nodes.next().is_none());
                }
                Node::Extension {
                    path: ext_path,
                    next,
                } => {
                    if !path.starts_with(&ext_path) {
                        return Ok(false);
                    }
                    path.consume(ext_path.len());
                    match deref_proof_node(&next, &mut nodes)? {
                        Some(next_node) => node = next_node,
                        None => return Ok(false),
                    }
                }
                Node::Branch { children, value } => {
                    if path.is_empty() {
                        return Ok(value.is_some() && nodes.next().is_none());
                    }
                    let idx = path.at(0) as usize;
                    let Some(child) = children[idx].clone() else {
                        return Ok(false);
                    };
                    path.consume(1);
                    match deref_proof_node(&child, &mut nodes)? {
                        Some(next_node) => node = next_node,
                        None => return Ok(false),
                    }
                }
            }
        }
    }

    /// Check an exclusion proof against this trie's current root.
    ///
    /// The walk must diverge from the key, and exactly the sentinel leaf
    /// must remain once it does. Leftover or missing nodes fail the check.
    pub fn verify_proof_of_exclusion(&self, proof: &Proof) -> Result<bool> {
        if proof.kind != ProofKind::Exclusion {
            return Err(TrieError::ProofKindMismatch);
        }
        if proof.root_hash != self.root_hash() {
            return Err(TrieError::RootMismatch {
                proof: proof.root_hash,
                trie: self.root_hash(),
            });
        }

        let full_path = self.key_path(&proof.key);
        let mut nodes = proof.nodes.iter();
        let Some(first) = nodes.next() else {
            return Ok(false);
        };
        if keccak256(first) != proof.root_hash {
            return Ok(false);
        }

        let mut node = Node::decode(first)?;
        let mut path = full_path.clone();
        loop {
            match node {
                Node::Leaf {
                    path: leaf_path, ..
                } => {
                    if leaf_path == path {
                        // The walk found the key, contradicting exclusion.
                        return Ok(false);
                    }
                    break;
                }
                Node::Extension {
                    path: ext_path,
                    next,
                } => {
                    if !path.starts_with(&ext_path) {
                        break;
                    }
                    path.consume(ext_path.len());
                    match deref_proof_node(&next, &mut nodes)? {
                        Some(next_node) => node = next_node,
                        None => return Ok(false),
                    }
                }
                Node::Branch { children, value } => {
                    if path.is_empty() {
                        if value.is_some() {
                            return Ok(false);
                        }
                        break;
                    }
                    let idx = path.at(0) as usize;
                    match children[idx].clone() {
                        Some(child) => {
                            path.consume(1);
                            match deref_proof_node(&child, &mut nodes)? {
                                Some(next_node) => node = next_node,
                                None => return Ok(false),
                            }
                        }
                        None => break,
                    }
                }
            }
        }

        let Some(sentinel) = nodes.next() else {
            return Ok(false);
        };
        if nodes.next().is_some() {
            return Ok(false);
        }
        match Node::decode(sentinel)? {
            Node::Leaf { path, data } => Ok(path == full_path && data == b"null".as_slice()),
            _ => Ok(false),
        }
    }

    /// Load one walk step, recording the encoding of every node the proof
    /// must carry. Hash-referenced nodes are carried; inline nodes travel
    /// inside their parent, except the root which is always carried.
    fn proof_step(
        &self,
        node_ref: &NodeRef,
        nodes: &mut Vec<Vec<u8>>,
        is_root: bool,
    ) -> Result<Node> {
        match node_ref {
            NodeRef::Inline(encoding) => {
                if is_root {
                    nodes.push(encoding.clone());
                }
                Node::decode(encoding)
            }
            NodeRef::Hash(hash) => {
                let encoding = self.db().get(hash).ok_or(TrieError::MissingNode(*hash))?;
                let node = Node::decode(&encoding)?;
                nodes.push(encoding);
                Ok(node)
            }
        }
    }
}

/// Resolve a child reference during verification. Hash references consume
/// the next proof node and must match its digest; `None` means the proof
/// ran out or carried the wrong node.
fn deref_proof_node<'a, I>(node_ref: &NodeRef, nodes: &mut I) -> Result<Option<Node>>
where
    I: Iterator<Item = &'a Vec<u8>>,
{
    match node_ref {
        NodeRef::Inline(encoding) => Ok(Some(Node::decode(encoding)?)),
        NodeRef::Hash(hash) => {
            let Some(encoding) = nodes.next() else {
                return Ok(None);
            };
            if keccak256(encoding) != *hash {
                return Ok(None);
            }
            Ok(Some(Node::decode(encoding)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryDB;

    fn dog_trie() -> MerklePatriciaTrie<MemoryDB> {
        let mut trie = MerklePatriciaTrie::new(MemoryDB::new());
        trie.update(b"do", b"verb").unwrap();
        trie.update(b"dog", b"puppy").unwrap();
        trie.update(b"doge", b"coin").unwrap();
        trie.update(b"horse", b"stallion").unwrap();
        trie
    }

    /// Same key set with values long enough that every node is
    /// hash-referenced, giving proofs with several carried nodes.
    fn wide_trie() -> MerklePatriciaTrie<MemoryDB> {
        let mut trie = MerklePatriciaTrie::new(MemoryDB::new());
        for key in [&b"do"[..], b"dog", b"doge", b"horse"] {
            let mut value = key.to_vec();
            value.resize(50, 0xab);
            trie.update(key, &value).unwrap();
        }
        trie
    }

    #[test]
    fn inclusion_proof_verifies_for_every_key() {
        let trie = dog_trie();
        for key in [&b"do"[..], b"dog", b"doge", b"horse"] {
            let proof = trie.get_proof_of_inclusion(key).unwrap();
            assert_eq!(proof.key(), key);
            assert_eq!(proof.kind(), ProofKind::Inclusion);
            assert_eq!(proof.root_hash(), trie.root_hash());
            assert!(trie.verify_proof_of_inclusion(&proof).unwrap());
        }
    }

    #[test]
    fn inclusion_proof_for_absent_key_fails() {
        let trie = dog_trie();
        assert!(trie.get_proof_of_inclusion(b"cat").is_err());
        assert!(trie.get_proof_of_inclusion(b"dogecoin").is_err());
    }

    #[test]
    fn proofs_on_empty_trie_fail() {
        let trie = MerklePatriciaTrie::new(MemoryDB::new());
        assert_eq!(
            trie.get_proof_of_inclusion(b"dog"),
            Err(TrieError::EmptyTrie)
        );
        assert_eq!(
            trie.get_proof_of_exclusion(b"dog"),
            Err(TrieError::EmptyTrie)
        );
    }

    #[test]
    fn exclusion_proof_verifies_for_absent_keys() {
        let trie = dog_trie();
        for key in [&b"cat"[..], b"dodo", b"dogs", b"horses", b""] {
            let proof = trie.get_proof_of_exclusion(key).unwrap();
            assert_eq!(proof.kind(), ProofKind::Exclusion);
            assert!(trie.verify_proof_of_exclusion(&proof).unwrap());
        }
    }

    #[test]
    fn exclusion_proof_for_present_key_fails() {
        let trie = dog_trie();
        assert_eq!(
            trie.get_proof_of_exclusion(b"dog"),
            Err(TrieError::KeyPresent)
        );
    }

    #[test]
    fn proof_kind_is_enforced() {
        let trie = dog_trie();
        let inclusion = trie.get_proof_of_inclusion(b"dog").unwrap();
        let exclusion = trie.get_proof_of_exclusion(b"cat").unwrap();

        assert_eq!(
            trie.verify_proof_of_exclusion(&inclusion),
            Err(TrieError::ProofKindMismatch)
        );
        assert_eq!(
            trie.verify_proof_of_inclusion(&exclusion),
            Err(TrieError::ProofKindMismatch)
        );
    }

    #[test]
    fn stale_proof_is_detected() {
        let mut trie = dog_trie();
        let inclusion = trie.get_proof_of_inclusion(b"dog").unwrap();
        let exclusion = trie.get_proof_of_exclusion(b"cat").unwrap();

        trie.update(b"cat", b"meow").unwrap();

        assert!(matches!(
            trie.verify_proof_of_inclusion(&inclusion),
            Err(TrieError::RootMismatch { .. })
        ));
        assert!(matches!(
            trie.verify_proof_of_exclusion(&exclusion),
            Err(TrieError::RootMismatch { .. })
        ));
    }

    #[test]
    fn tampered_proof_is_rejected() {
        let trie = wide_trie();
        let mut proof = trie.get_proof_of_inclusion(b"dog").unwrap();
        proof.nodes[0][0] ^= 0x01;
        assert_eq!(trie.verify_proof_of_inclusion(&proof), Ok(false));
    }

    #[test]
    fn swapped_inner_node_is_rejected() {
        let trie = wide_trie();
        let mut proof = trie.get_proof_of_inclusion(b"dog").unwrap();
        assert!(proof.nodes.len() >= 2);
        // Replace an inner node with a different, validly encoded one.
        let other = trie.get_proof_of_inclusion(b"horse").unwrap();
        proof.nodes[2] = other.nodes[2].clone();
        assert_eq!(trie.verify_proof_of_inclusion(&proof), Ok(false));
    }

    #[test]
    fn truncated_exclusion_proof_is_rejected() {
        let trie = wide_trie();
        let mut proof = trie.get_proof_of_exclusion(b"cat").unwrap();
        assert!(proof.nodes.len() >= 3);

        // Dropping an inner node desynchronizes the walk from the digests.
        proof.nodes.remove(1);
        assert_eq!(trie.verify_proof_of_exclusion(&proof), Ok(false));
    }

    #[test]
    fn exclusion_proof_without_sentinel_is_rejected() {
        let trie = dog_trie();
        let mut proof = trie.get_proof_of_exclusion(b"cat").unwrap();
        proof.nodes.pop();
        assert_eq!(trie.verify_proof_of_exclusion(&proof), Ok(false));
    }

    #[test]
    fn exclusion_proof_with_trailing_node_is_rejected() {
        let trie = dog_trie();
        let mut proof = trie.get_proof_of_exclusion(b"cat").unwrap();
        proof.nodes.push(proof.nodes[0].clone());
        assert_eq!(trie.verify_proof_of_exclusion(&proof), Ok(false));
    }

    #[test]
    fn inclusion_proof_with_trailing_node_is_rejected() {
        let trie = dog_trie();
        let mut proof = trie.get_proof_of_inclusion(b"dog").unwrap();
        proof.nodes.push(proof.nodes[0].clone());
        assert_eq!(trie.verify_proof_of_inclusion(&proof), Ok(false));
    }

    #[test]
    fn inline_root_proof_verifies() {
        let mut trie = MerklePatriciaTrie::new(MemoryDB::new());
        trie.update(b"k", b"v").unwrap();

        let proof = trie.get_proof_of_inclusion(b"k").unwrap();
        assert_eq!(proof.nodes().len(), 1);
        assert!(trie.verify_proof_of_inclusion(&proof).unwrap());
    }

    #[test]
    fn secure_trie_proofs() {
        let mut trie = MerklePatriciaTrie::new_secure(MemoryDB::new());
        trie.update(b"dog", b"puppy").unwrap();
        trie.update(b"doge", b"coin").unwrap();

        let inclusion = trie.get_proof_of_inclusion(b"dog").unwrap();
        assert!(trie.verify_proof_of_inclusion(&inclusion).unwrap());

        let exclusion = trie.get_proof_of_exclusion(b"cat").unwrap();
        assert!(trie.verify_proof_of_exclusion(&exclusion).unwrap());
    }
}
