//! # Trie nodes
//!
//! The trie has three node shapes:
//! 1. Leaf - terminal node holding a value at the remaining key suffix
//! 2. Extension - path compression over a shared nibble prefix
//! 3. Branch - 16-way fan-out plus an optional value
//!
//! A node is referenced from its parent either inline (its own canonical
//! encoding, when shorter than the digest size) or by the keccak hash of that
//! encoding, looked up in the backing store.

use alloy_primitives::{b256, keccak256, B256};
use alloy_rlp::{BufMut, Encodable, Header, EMPTY_STRING_CODE};
use rlp::{Prototype, Rlp};

use crate::error::{Result, TrieError};
use crate::nibbles::NibblePath;

/// Root hash of the empty trie: `keccak256(rlp(""))`.
pub const EMPTY_TRIE_ROOT: B256 =
    b256!("56e81f171bcc55a6ff8345e692c0f86e5b48e01b996cadc001622fb5e363b421");

/// Content-addressed reference to a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeRef {
    /// The node's own canonical encoding (< 32 bytes).
    Inline(Vec<u8>),
    /// Keccak hash of the canonical encoding, resolved through the store.
    Hash(B256),
}

impl NodeRef {
    /// Get the digest if this is a hash reference.
    pub fn as_hash(&self) -> Option<B256> {
        match self {
            NodeRef::Hash(h) => Some(*h),
            NodeRef::Inline(_) => None,
        }
    }

    /// Raw reference bytes, as persisted in snapshots.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            NodeRef::Inline(bytes) => bytes.clone(),
            NodeRef::Hash(h) => h.to_vec(),
        }
    }

    /// Rebuild a reference from raw bytes. A 32-byte string is a hash;
    /// anything shorter is an inline encoding.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        match bytes.len() {
            0 => Err(TrieError::InvalidNode),
            32 => Ok(NodeRef::Hash(B256::from_slice(bytes))),
            n if n < 32 => Ok(NodeRef::Inline(bytes.to_vec())),
            _ => Err(TrieError::InvalidNode),
        }
    }

    /// Encoded length of this reference inside a parent node.
    fn rlp_length(&self) -> usize {
        match self {
            // Inline encodings embed as-is; they are already RLP.
            NodeRef::Inline(bytes) => bytes.len(),
            NodeRef::Hash(h) => h.as_slice().length(),
        }
    }

    /// Encode this reference into a parent node's payload.
    fn rlp_encode(&self, out: &mut dyn BufMut) {
        match self {
            NodeRef::Inline(bytes) => out.put_slice(bytes),
            NodeRef::Hash(h) => h.as_slice().encode(out),
        }
    }
}

/// A trie node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// `[hex_prefix(path, leaf), data]`
    Leaf { path: NibblePath, data: Vec<u8> },

    /// `[hex_prefix(path, extension), next]`
    Extension { path: NibblePath, next: NodeRef },

    /// `[child0, ..., child15, value]`
    Branch {
        children: Box<[Option<NodeRef>; 16]>,
        value: Option<Vec<u8>>,
    },
}

impl Node {
    /// Create a leaf node.
    pub fn leaf(path: NibblePath, data: Vec<u8>) -> Self {
        Node::Leaf { path, data }
    }

    /// Create an extension node.
    pub fn extension(path: NibblePath, next: NodeRef) -> Self {
        Node::Extension { path, next }
    }

    /// Create a branch node with no children and no value.
    pub fn empty_branch() -> Self {
        Node::Branch {
            children: Box::new(std::array::from_fn(|_| None)),
            value: None,
        }
    }

    /// Canonical RLP encoding of this node.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        match self {
            Node::Leaf { path, data } => {
                let hp = path.encode(true);
                Header {
                    list: true,
                    payload_length: hp.as_slice().length() + data.as_slice().length(),
                }
                .encode(&mut out);
                hp.as_slice().encode(&mut out);
                data.as_slice().encode(&mut out);
            }
            Node::Extension { path, next } => {
                let hp = path.encode(false);
                Header {
                    list: true,
                    payload_length: hp.as_slice().length() + next.rlp_length(),
                }
                .encode(&mut out);
                hp.as_slice().encode(&mut out);
                next.rlp_encode(&mut out);
            }
            Node::Branch { children, value } => {
                let mut payload_length = 0;
                for child in children.iter() {
                    payload_length += child.as_ref().map_or(1, NodeRef::rlp_length);
                }
                payload_length += value.as_deref().map_or(1, |v| v.length());
                Header {
                    list: true,
                    payload_length,
                }
                .encode(&mut out);
                for child in children.iter() {
                    match child {
                        Some(r) => r.rlp_encode(&mut out),
                        None => out.put_u8(EMPTY_STRING_CODE),
                    }
                }
                match value {
                    Some(v) => v.as_slice().encode(&mut out),
                    None => out.put_u8(EMPTY_STRING_CODE),
                }
            }
        }
        out
    }

    /// Decode a canonical node encoding.
    ///
    /// Only 2-item (leaf/extension) and 17-item (branch) lists are valid;
    /// any other shape is [`TrieError::InvalidNode`]. An empty string in a
    /// value slot decodes as "no value".
    pub fn decode(encoded: &[u8]) -> Result<Node> {
        let r = Rlp::new(encoded);
        match r.prototype()? {
            Prototype::List(2) => {
                let hp: Vec<u8> = r.val_at(0)?;
                let (path, is_leaf) = NibblePath::decode(&hp)?;
                if is_leaf {
                    Ok(Node::Leaf {
                        path,
                        data: r.val_at(1)?,
                    })
                } else {
                    let next = decode_ref(&r.at(1)?)?.ok_or(TrieError::InvalidNode)?;
                    Ok(Node::Extension { path, next })
                }
            }
            Prototype::List(17) => {
                let mut children: [Option<NodeRef>; 16] = Default::default();
                for (i, slot) in children.iter_mut().enumerate() {
                    *slot = decode_ref(&r.at(i)?)?;
                }
                let value: Vec<u8> = r.val_at(16)?;
                Ok(Node::Branch {
                    children: Box::new(children),
                    value: (!value.is_empty()).then_some(value),
                })
            }
            _ => Err(TrieError::InvalidNode),
        }
    }

    /// Derive this node's reference: the encoding itself when it is shorter
    /// than the digest size, the keccak hash of the encoding otherwise.
    ///
    /// Hash references must be written to the backing store by the caller;
    /// see `MerklePatriciaTrie::store_node`.
    pub fn into_reference(&self) -> NodeRef {
        let encoded = self.encode();
        if encoded.len() < 32 {
            NodeRef::Inline(encoded)
        } else {
            NodeRef::Hash(keccak256(&encoded))
        }
    }
}

/// Decode a child slot: an empty string is an empty slot, a 32-byte string is
/// a hash reference, and a nested list is an inline node encoding.
fn decode_ref(item: &Rlp) -> Result<Option<NodeRef>> {
    if item.is_data() {
        let data = item.data()?;
        match data.len() {
            0 => Ok(None),
            32 => Ok(Some(NodeRef::Hash(B256::from_slice(data)))),
            _ => Err(TrieError::InvalidNode),
        }
    } else {
        Ok(Some(NodeRef::Inline(item.as_raw().to_vec())))
    }
}

/// RLP-encode a plain byte string.
pub(crate) fn rlp_encode_bytes(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + 2);
    data.encode(&mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_root_constant() {
        assert_eq!(EMPTY_TRIE_ROOT, keccak256([EMPTY_STRING_CODE]));
    }

    #[test]
    fn test_leaf_round_trip() {
        let node = Node::leaf(NibblePath::from_nibbles(&[1, 2, 3]), b"hello".to_vec());
        let decoded = Node::decode(&node.encode()).unwrap();
        assert_eq!(decoded, node);
    }

    #[test]
    fn test_extension_round_trip_hash_ref() {
        let next = NodeRef::Hash(keccak256(b"child"));
        let node = Node::extension(NibblePath::from_nibbles(&[1, 2, 3, 4]), next);
        let decoded = Node::decode(&node.encode()).unwrap();
        assert_eq!(decoded, node);
    }

    #[test]
    fn test_extension_round_trip_inline_ref() {
        let inline = Node::leaf(NibblePath::from_nibbles(&[7]), b"v".to_vec());
        let NodeRef::Inline(_) = inline.into_reference() else {
            panic!("small leaf should be inline");
        };
        let node = Node::extension(NibblePath::from_nibbles(&[1, 2]), inline.into_reference());
        let decoded = Node::decode(&node.encode()).unwrap();
        assert_eq!(decoded, node);
    }

    #[test]
    fn test_branch_round_trip() {
        let Node::Branch { mut children, .. } = Node::empty_branch() else {
            unreachable!()
        };
        children[0] = Some(NodeRef::Hash(keccak256(b"a")));
        children[15] = Some(
            Node::leaf(NibblePath::from_nibbles(&[3]), b"x".to_vec()).into_reference(),
        );
        let node = Node::Branch {
            children,
            value: Some(b"value".to_vec()),
        };
        let decoded = Node::decode(&node.encode()).unwrap();
        assert_eq!(decoded, node);
    }

    #[test]
    fn test_branch_without_value_round_trip() {
        let Node::Branch { mut children, .. } = Node::empty_branch() else {
            unreachable!()
        };
        children[4] = Some(NodeRef::Hash(keccak256(b"a")));
        children[9] = Some(NodeRef::Hash(keccak256(b"b")));
        let node = Node::Branch {
            children,
            value: None,
        };
        let decoded = Node::decode(&node.encode()).unwrap();
        assert_eq!(decoded, node);
    }

    #[test]
    fn test_decode_rejects_wrong_arity() {
        let mut stream = rlp::RlpStream::new_list(3);
        stream.append(&b"a".to_vec());
        stream.append(&b"b".to_vec());
        stream.append(&b"c".to_vec());
        assert_eq!(
            Node::decode(&stream.out()),
            Err(TrieError::InvalidNode)
        );
    }

    #[test]
    fn test_decode_rejects_bad_reference_size() {
        // Extension whose child is a 5-byte string: neither a hash nor an
        // embedded list.
        let mut stream = rlp::RlpStream::new_list(2);
        stream.append(&NibblePath::from_nibbles(&[1, 2]).encode(false));
        stream.append(&b"bogus".to_vec());
        assert!(Node::decode(&stream.out()).is_err());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(Node::decode(&[0xff, 0x13, 0x37]).is_err());
        assert!(Node::decode(&[]).is_err());
    }

    #[test]
    fn test_reference_threshold() {
        let small = Node::leaf(NibblePath::from_nibbles(&[1]), b"v".to_vec());
        assert!(matches!(small.into_reference(), NodeRef::Inline(_)));

        let large = Node::leaf(
            NibblePath::from_bytes(&[0xab; 8]),
            b"a value long enough to push the encoding past the digest size".to_vec(),
        );
        let reference = large.into_reference();
        assert_eq!(reference.as_hash(), Some(keccak256(large.encode())));
    }

    #[test]
    fn test_reference_bytes_round_trip() {
        let hash = NodeRef::Hash(keccak256(b"node"));
        assert_eq!(NodeRef::from_bytes(&hash.to_bytes()).unwrap(), hash);

        let inline = Node::leaf(NibblePath::from_nibbles(&[1]), b"v".to_vec()).into_reference();
        assert_eq!(NodeRef::from_bytes(&inline.to_bytes()).unwrap(), inline);

        assert!(NodeRef::from_bytes(&[]).is_err());
        assert!(NodeRef::from_bytes(&[0u8; 33]).is_err());
    }
}
