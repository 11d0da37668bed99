//! # NibblePath
//!
//! Keys in the trie are traversed as nibbles (half-bytes / 4 bits), giving 16
//! possible branches at each node. A `NibblePath` is a view over a byte
//! string with a logical nibble offset, so consuming a prefix during
//! traversal never copies the underlying bytes.

use std::fmt;

use crate::error::{Result, TrieError};

/// A sequence of nibbles backed by a byte string.
///
/// Invariant: the nibble count is `2 * data.len() - offset`.
#[derive(Clone, Default)]
pub struct NibblePath {
    data: Vec<u8>,
    offset: usize,
}

impl NibblePath {
    /// Create an empty path.
    pub fn new() -> Self {
        NibblePath::default()
    }

    /// Create from bytes (each byte becomes 2 nibbles).
    pub fn from_bytes(bytes: &[u8]) -> Self {
        NibblePath {
            data: bytes.to_vec(),
            offset: 0,
        }
    }

    /// Create from raw nibble values, packing them into bytes.
    pub fn from_nibbles(nibbles: &[u8]) -> Self {
        debug_assert!(nibbles.iter().all(|n| *n < 16));

        let offset = nibbles.len() % 2;
        let mut data = Vec::with_capacity(nibbles.len() / 2 + offset);
        if offset == 1 {
            // Odd count: the first nibble sits in the low half of byte 0.
            data.push(nibbles[0]);
        }
        for pair in nibbles[offset..].chunks(2) {
            data.push(pair[0] << 4 | pair[1]);
        }
        NibblePath { data, offset }
    }

    /// Number of nibbles remaining in the path.
    pub fn len(&self) -> usize {
        self.data.len() * 2 - self.offset
    }

    /// Check if no nibbles remain.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the nibble at `index` (relative to the current offset).
    pub fn at(&self, index: usize) -> u8 {
        let idx = index + self.offset;
        let byte = self.data[idx / 2];
        if idx % 2 == 0 {
            byte >> 4
        } else {
            byte & 0x0f
        }
    }

    /// Remove `amount` nibbles from the front of the path.
    pub fn consume(&mut self, amount: usize) -> &mut Self {
        debug_assert!(amount <= self.len());
        self.offset += amount;
        self
    }

    /// Check whether this path begins with `other`.
    pub fn starts_with(&self, other: &NibblePath) -> bool {
        if other.len() > self.len() {
            return false;
        }
        (0..other.len()).all(|i| self.at(i) == other.at(i))
    }

    /// The longest shared prefix of this path and `other`.
    pub fn common_prefix(&self, other: &NibblePath) -> NibblePath {
        let shared = self
            .nibbles()
            .zip(other.nibbles())
            .take_while(|(a, b)| a == b)
            .count();
        NibblePath::from_nibbles(&self.nibbles().take(shared).collect::<Vec<_>>())
    }

    /// Concatenate two paths into a new one.
    pub fn combine(a: &NibblePath, b: &NibblePath) -> NibblePath {
        let nibbles: Vec<u8> = a.nibbles().chain(b.nibbles()).collect();
        NibblePath::from_nibbles(&nibbles)
    }

    /// Iterate over the remaining nibbles.
    pub fn nibbles(&self) -> impl Iterator<Item = u8> + '_ {
        (0..self.len()).map(move |i| self.at(i))
    }

    /// Encode into the hex-prefix format.
    ///
    /// The flag nibble carries two bits: `0x2` for leaf-vs-extension and
    /// `0x1` for odd length. An odd path packs its first nibble into the flag
    /// byte so the rest always pads to whole bytes.
    pub fn encode(&self, is_leaf: bool) -> Vec<u8> {
        let flag: u8 = if is_leaf { 0x2 } else { 0x0 };
        let odd = self.len() % 2 == 1;

        let mut out = Vec::with_capacity(self.len() / 2 + 1);
        let mut i;
        if odd {
            out.push((flag | 0x1) << 4 | self.at(0));
            i = 1;
        } else {
            out.push(flag << 4);
            i = 0;
        }
        while i < self.len() {
            out.push(self.at(i) << 4 | self.at(i + 1));
            i += 2;
        }
        out
    }

    /// Decode a hex-prefix encoded path, returning the path and the leaf flag.
    pub fn decode(encoded: &[u8]) -> Result<(Self, bool)> {
        let first = *encoded.first().ok_or(TrieError::InvalidNode)?;
        let prefix = first >> 4;
        if prefix > 3 {
            return Err(TrieError::InvalidNode);
        }
        let is_leaf = prefix & 0x2 != 0;
        let offset = if prefix & 0x1 != 0 { 1 } else { 2 };
        let path = NibblePath {
            data: encoded.to_vec(),
            offset,
        };
        Ok((path, is_leaf))
    }
}

// Paths compare by nibble sequence, independent of offset and byte padding.
impl PartialEq for NibblePath {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.nibbles().eq(other.nibbles())
    }
}

impl Eq for NibblePath {}

impl fmt::Debug for NibblePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NibblePath(")?;
        for n in self.nibbles() {
            write!(f, "{:x}", n)?;
        }
        write!(f, ")")
    }
}

impl fmt::Display for NibblePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for n in self.nibbles() {
            write!(f, "{:x}", n)?;
        }
        Ok(())
    }
}
