//! # Merkle Patricia Trie
//!
//! The trie engine: get, contains, update and delete over a caller-owned
//! node store. Writes never mutate stored nodes; every mutation produces new
//! node encodings and a new root reference, so references captured under an
//! old root stay valid and independently queryable.

use alloy_primitives::{keccak256, B256};

use crate::error::{Result, TrieError};
use crate::nibbles::NibblePath;
use crate::node::{Node, NodeRef, EMPTY_TRIE_ROOT};
use crate::storage::TrieDB;

/// Outcome of deleting below a node, propagated bottom-up.
#[derive(Debug)]
enum DeleteAction {
    /// The subtree vanished entirely.
    Deleted,
    /// The subtree was replaced by a new reference.
    Updated(NodeRef),
    /// A branch collapsed to a single child; the parent must absorb the
    /// carried path prefix instead of keeping a degenerate branch.
    UselessBranch(NibblePath, NodeRef),
}

/// Merkle Patricia Trie over a backing store.
///
/// In secure mode every key is hashed with keccak256 before use, which
/// decorrelates key structure from trie shape.
#[derive(Debug)]
pub struct MerklePatriciaTrie<DB: TrieDB> {
    db: DB,
    root: Option<NodeRef>,
    secure: bool,
}

impl<DB: TrieDB> MerklePatriciaTrie<DB> {
    /// Create a new empty trie.
    pub fn new(db: DB) -> Self {
        MerklePatriciaTrie {
            db,
            root: None,
            secure: false,
        }
    }

    /// Create a new empty trie that hashes keys before use.
    pub fn new_secure(db: DB) -> Self {
        MerklePatriciaTrie {
            db,
            root: None,
            secure: true,
        }
    }

    /// Open a trie at a previously captured root reference.
    pub fn from_root(db: DB, root: Option<NodeRef>, secure: bool) -> Self {
        MerklePatriciaTrie { db, root, secure }
    }

    /// Current root reference, `None` for the empty trie.
    pub fn root(&self) -> Option<&NodeRef> {
        self.root.as_ref()
    }

    /// Hash of the root node; the well-known empty-root constant for the
    /// empty trie.
    pub fn root_hash(&self) -> B256 {
        match &self.root {
            None => EMPTY_TRIE_ROOT,
            Some(NodeRef::Inline(encoding)) => keccak256(encoding),
            Some(NodeRef::Hash(hash)) => *hash,
        }
    }

    /// Check if the trie is empty.
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Whether keys are hashed before use.
    pub fn is_secure(&self) -> bool {
        self.secure
    }

    /// Borrow the backing store.
    pub fn db(&self) -> &DB {
        &self.db
    }

    /// Give the backing store back to the caller.
    pub fn into_db(self) -> DB {
        self.db
    }

    /// Get the value stored under `key`.
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        let root = self.root.clone().ok_or(TrieError::EmptyTrie)?;
        let path = self.key_path(key);
        match self.traverse(&root, path)? {
            Node::Leaf { data, .. } => Ok(data),
            Node::Branch {
                value: Some(value), ..
            } => Ok(value),
            _ => Err(TrieError::KeyNotFound),
        }
    }

    /// Check whether `key` holds a value. Walks as far as the structure
    /// allows and never fails on a mismatch.
    pub fn contains(&self, key: &[u8]) -> bool {
        self.get(key).is_ok()
    }

    /// Store `value` under `key`, creating the entry if absent.
    pub fn update(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        let path = self.key_path(key);
        let new_root = self.update_at(self.root.clone(), path, value.to_vec())?;
        self.root = Some(new_root);
        Ok(())
    }

    /// Remove the value stored under `key`. Deleting an absent key, or
    /// deleting from an empty trie, is an error.
    pub fn delete(&mut self, key: &[u8]) -> Result<()> {
        let root = self.root.clone().ok_or(TrieError::EmptyTrie)?;
        let path = self.key_path(key);
        self.root = match self.delete_at(&root, path)? {
            DeleteAction::Deleted => None,
            DeleteAction::Updated(reference) => Some(reference),
            DeleteAction::UselessBranch(_, reference) => Some(reference),
        };
        Ok(())
    }

    /// Convert a caller key into a nibble path, hashing first in secure mode.
    pub(crate) fn key_path(&self, key: &[u8]) -> NibblePath {
        if self.secure {
            NibblePath::from_bytes(keccak256(key).as_slice())
        } else {
            NibblePath::from_bytes(key)
        }
    }

    /// Resolve a reference to a node, through the store for hash references.
    pub(crate) fn load_node(&self, node_ref: &NodeRef) -> Result<Node> {
        match node_ref {
            NodeRef::Inline(encoding) => Node::decode(encoding),
            NodeRef::Hash(hash) => {
                let encoding = self.db.get(hash).ok_or(TrieError::MissingNode(*hash))?;
                Node::decode(&encoding)
            }
        }
    }

    /// Derive a node's reference, writing the encoding to the store when it
    /// is hash-referenced.
    pub(crate) fn store_node(&mut self, node: &Node) -> NodeRef {
        let encoded = node.encode();
        if encoded.len() < 32 {
            NodeRef::Inline(encoded)
        } else {
            let hash = keccak256(&encoded);
            self.db.set(hash, encoded);
            NodeRef::Hash(hash)
        }
    }

    /// Walk down from `node_ref` consuming `path`, returning the terminal
    /// node. A leaf must match the entire remaining path; an extension must
    /// prefix it; a branch consumes one nibble per level.
    fn traverse(&self, node_ref: &NodeRef, mut path: NibblePath) -> Result<Node> {
        match self.load_node(node_ref)? {
            Node::Leaf {
                path: leaf_path,
                data,
            } => {
                if leaf_path == path {
                    Ok(Node::Leaf {
                        path: leaf_path,
                        data,
                    })
                } else {
                    Err(TrieError::LeafPath)
                }
            }
            Node::Extension {
                path: ext_path,
                next,
            } => {
                if path.starts_with(&ext_path) {
                    path.consume(ext_path.len());
                    self.traverse(&next, path)
                } else {
                    Err(TrieError::ExtensionPath)
                }
            }
            Node::Branch { children, value } => {
                if path.is_empty() {
                    return Ok(Node::Branch { children, value });
                }
                let idx = path.at(0) as usize;
                match &children[idx] {
                    Some(child) => {
                        path.consume(1);
                        self.traverse(child, path)
                    }
                    None => Err(TrieError::BranchPath(idx as u8)),
                }
            }
        }
    }

    fn update_at(
        &mut self,
        node_ref: Option<NodeRef>,
        mut path: NibblePath,
        value: Vec<u8>,
    ) -> Result<NodeRef> {
        let Some(node_ref) = node_ref else {
            return Ok(self.store_node(&Node::leaf(path, value)));
        };

        match self.load_node(&node_ref)? {
            Node::Leaf {
                path: mut leaf_path,
                data,
            } => {
                if leaf_path == path {
                    return Ok(self.store_node(&Node::leaf(leaf_path, value)));
                }

                // Paths diverge: split into a branch holding both tails,
                // behind an extension if they share a prefix.
                let common = path.common_prefix(&leaf_path);
                path.consume(common.len());
                leaf_path.consume(common.len());

                let branch_ref = self.branch_for_split(path, value, leaf_path, data);
                if common.is_empty() {
                    Ok(branch_ref)
                } else {
                    Ok(self.store_node(&Node::extension(common, branch_ref)))
                }
            }
            Node::Extension {
                path: mut ext_path,
                next,
            } => {
                if path.starts_with(&ext_path) {
                    path.consume(ext_path.len());
                    let new_next = self.update_at(Some(next), path, value)?;
                    return Ok(self.store_node(&Node::extension(ext_path, new_next)));
                }

                // Split the extension: the new value goes on one side of a
                // branch, the extension's own continuation on the other.
                let common = path.common_prefix(&ext_path);
                path.consume(common.len());
                ext_path.consume(common.len());

                let mut children: [Option<NodeRef>; 16] = Default::default();
                let mut branch_value = None;
                if path.is_empty() {
                    branch_value = Some(value);
                } else {
                    self.place_leaf(path, value, &mut children);
                }
                self.place_extension(ext_path, next, &mut children);

                let branch_ref = self.store_node(&Node::Branch {
                    children: Box::new(children),
                    value: branch_value,
                });
                if common.is_empty() {
                    Ok(branch_ref)
                } else {
                    Ok(self.store_node(&Node::extension(common, branch_ref)))
                }
            }
            Node::Branch {
                mut children,
                value: branch_value,
            } => {
                if path.is_empty() {
                    return Ok(self.store_node(&Node::Branch {
                        children,
                        value: Some(value),
                    }));
                }
                let idx = path.at(0) as usize;
                path.consume(1);
                let new_child = self.update_at(children[idx].take(), path, value)?;
                children[idx] = Some(new_child);
                Ok(self.store_node(&Node::Branch {
                    children,
                    value: branch_value,
                }))
            }
        }
    }

    /// Build a branch for two freshly split leaf tails. An empty tail puts
    /// its value on the branch itself.
    fn branch_for_split(
        &mut self,
        path_a: NibblePath,
        value_a: Vec<u8>,
        path_b: NibblePath,
        value_b: Vec<u8>,
    ) -> NodeRef {
        debug_assert!(!path_a.is_empty() || !path_b.is_empty());

        let mut children: [Option<NodeRef>; 16] = Default::default();
        let mut value = None;
        if path_a.is_empty() {
            value = Some(value_a);
        } else {
            self.place_leaf(path_a, value_a, &mut children);
        }
        if path_b.is_empty() {
            value = Some(value_b);
        } else {
            self.place_leaf(path_b, value_b, &mut children);
        }

        self.store_node(&Node::Branch {
            children: Box::new(children),
            value,
        })
    }

    fn place_leaf(
        &mut self,
        mut path: NibblePath,
        value: Vec<u8>,
        children: &mut [Option<NodeRef>; 16],
    ) {
        let idx = path.at(0) as usize;
        path.consume(1);
        children[idx] = Some(self.store_node(&Node::leaf(path, value)));
    }

    fn place_extension(
        &mut self,
        mut path: NibblePath,
        next: NodeRef,
        children: &mut [Option<NodeRef>; 16],
    ) {
        debug_assert!(!path.is_empty());

        let idx = path.at(0) as usize;
        if path.len() == 1 {
            // A one-nibble extension dissolves into the branch slot.
            children[idx] = Some(next);
        } else {
            path.consume(1);
            children[idx] = Some(self.store_node(&Node::extension(path, next)));
        }
    }

    fn delete_at(&mut self, node_ref: &NodeRef, mut path: NibblePath) -> Result<DeleteAction> {
        match self.load_node(node_ref)? {
            Node::Leaf {
                path: leaf_path, ..
            } => {
                if leaf_path == path {
                    Ok(DeleteAction::Deleted)
                } else {
                    Err(TrieError::LeafPath)
                }
            }
            Node::Extension {
                path: ext_path,
                next,
            } => {
                if !path.starts_with(&ext_path) {
                    return Err(TrieError::ExtensionPath);
                }
                path.consume(ext_path.len());

                match self.delete_at(&next, path)? {
                    DeleteAction::Deleted => Ok(DeleteAction::Deleted),
                    DeleteAction::Updated(child_ref) => Ok(DeleteAction::Updated(
                        self.store_node(&Node::extension(ext_path, child_ref)),
                    )),
                    DeleteAction::UselessBranch(child_path, child_ref) => {
                        // The branch below collapsed. Absorb the grandchild so
                        // an extension never points at a leaf or at another
                        // extension.
                        let merged = match self.load_node(&child_ref)? {
                            Node::Leaf { path, data } => {
                                Node::leaf(NibblePath::combine(&ext_path, &path), data)
                            }
                            Node::Extension { path, next } => {
                                Node::extension(NibblePath::combine(&ext_path, &path), next)
                            }
                            Node::Branch { .. } => Node::extension(
                                NibblePath::combine(&ext_path, &child_path),
                                child_ref,
                            ),
                        };
                        Ok(DeleteAction::Updated(self.store_node(&merged)))
                    }
                }
            }
            Node::Branch {
                mut children,
                value,
            } => {
                if path.is_empty() {
                    if value.is_none() {
                        return Err(TrieError::KeyNotFound);
                    }
                    return self.reshape_branch(children, None);
                }

                let idx = path.at(0) as usize;
                path.consume(1);
                let child_ref = children[idx]
                    .take()
                    .ok_or(TrieError::BranchPath(idx as u8))?;

                match self.delete_at(&child_ref, path)? {
                    DeleteAction::Deleted => self.reshape_branch(children, value),
                    DeleteAction::Updated(reference)
                    | DeleteAction::UselessBranch(_, reference) => {
                        children[idx] = Some(reference);
                        Ok(DeleteAction::Updated(
                            self.store_node(&Node::Branch { children, value }),
                        ))
                    }
                }
            }
        }
    }

    /// Classify a branch after one of its slots (or its value) was cleared.
    fn reshape_branch(
        &mut self,
        children: Box<[Option<NodeRef>; 16]>,
        value: Option<Vec<u8>>,
    ) -> Result<DeleteAction> {
        let survivors = children.iter().filter(|c| c.is_some()).count();
        match (survivors, value) {
            (0, None) => Ok(DeleteAction::Deleted),
            (0, Some(data)) => {
                // Only the value is left: collapse to a bare leaf.
                let path = NibblePath::new();
                let reference = self.store_node(&Node::leaf(path.clone(), data));
                Ok(DeleteAction::UselessBranch(path, reference))
            }
            (1, None) => self.fold_last_child(children),
            (_, value) => Ok(DeleteAction::Updated(
                self.store_node(&Node::Branch { children, value }),
            )),
        }
    }

    /// Merge a branch's single remaining child with its slot nibble.
    fn fold_last_child(&mut self, children: Box<[Option<NodeRef>; 16]>) -> Result<DeleteAction> {
        let (idx, child_ref) = children
            .iter()
            .enumerate()
            .find_map(|(i, c)| c.as_ref().map(|r| (i, r.clone())))
            .ok_or(TrieError::InvalidNode)?;
        let prefix = NibblePath::from_nibbles(&[idx as u8]);

        let (path, merged) = match self.load_node(&child_ref)? {
            Node::Leaf { path, data } => {
                let path = NibblePath::combine(&prefix, &path);
                (path.clone(), Node::leaf(path, data))
            }
            Node::Extension { path, next } => {
                let path = NibblePath::combine(&prefix, &path);
                (path.clone(), Node::extension(path, next))
            }
            Node::Branch { .. } => (prefix.clone(), Node::extension(prefix, child_ref)),
        };

        let reference = self.store_node(&merged);
        Ok(DeleteAction::UselessBranch(path, reference))
    }
}
