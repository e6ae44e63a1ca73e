// Immutable byte-blob cache value

use crate::cache::lru::ByteCost;
use std::fmt;
use std::sync::Arc;

/// An immutable view over cached bytes
///
/// Cloning a `ByteView` is cheap (the storage is shared and can never be
/// mutated); reading the bytes out with [`ByteView::to_vec`] always yields a
/// fresh allocation. Equality is by content.
#[derive(Clone, PartialEq, Eq)]
pub struct ByteView {
    bytes: Arc<[u8]>,
}

impl ByteView {
    /// Number of bytes in the view
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the view holds no bytes
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Copy the bytes into a new owned vector
    pub fn to_vec(&self) -> Vec<u8> {
        self.bytes.to_vec()
    }
}

impl ByteCost for ByteView {
    fn byte_cost(&self) -> u64 {
        self.bytes.len() as u64
    }
}

impl From<Vec<u8>> for ByteView {
    fn from(bytes: Vec<u8>) -> Self {
        ByteView {
            bytes: bytes.into(),
        }
    }
}

impl From<&[u8]> for ByteView {
    fn from(bytes: &[u8]) -> Self {
        ByteView {
            bytes: bytes.into(),
        }
    }
}

impl From<&str> for ByteView {
    fn from(s: &str) -> Self {
        ByteView {
            bytes: s.as_bytes().into(),
        }
    }
}

impl fmt::Display for ByteView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.bytes))
    }
}

impl fmt::Debug for ByteView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ByteView({:?})", String::from_utf8_lossy(&self.bytes))
    }
}
