//! Cell module - the chain's binary serialization unit
//!
//! This module provides:
//! - `Cell`: an immutable bit-string (up to 1023 bits) with up to 4 child references
//! - `CellBuilder`: append-only, bit-precise writer that seals into a `Cell`
//! - `CellSlice`: sequential reader used to decode cells back into fields
//! - `Address`: workchain + account hash, raw and user-friendly forms
//! - Bag-of-cells (BOC) transport encoding

pub mod address;
pub mod boc;
pub mod builder;
pub mod slice;

pub use address::Address;
pub use boc::{base64_to_boc, boc_to_base64};
pub use builder::CellBuilder;
pub use slice::CellSlice;

use crate::error::{LaunchError, LaunchResult};

use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::Arc;

/// Maximum data bits in a single cell
pub const MAX_CELL_BITS: usize = 1023;

/// Maximum child references in a single cell
pub const MAX_CELL_REFS: usize = 4;

/// Deepest reference chain a cell may sit on top of
pub const MAX_CELL_DEPTH: u16 = 1024;

/// Most distinct cells accepted in one bag of cells
pub const MAX_BOC_CELLS: usize = 1024;

/// Sealed cell: ordered bits plus ordered child references.
///
/// Depth and representation hash are computed once when the cell is sealed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    data: Vec<u8>,
    bit_len: usize,
    refs: Vec<Arc<Cell>>,
    depth: u16,
    hash: [u8; 32],
}

impl Cell {
    /// Assemble a cell from raw parts, enforcing capacity limits
    pub(crate) fn from_parts(
        mut data: Vec<u8>,
        bit_len: usize,
        refs: Vec<Arc<Cell>>,
    ) -> LaunchResult<Self> {
        if bit_len > MAX_CELL_BITS {
            return Err(LaunchError::CapacityExceeded {
                unit: "bits",
                needed: bit_len,
                available: MAX_CELL_BITS,
            });
        }
        if refs.len() > MAX_CELL_REFS {
            return Err(LaunchError::CapacityExceeded {
                unit: "refs",
                needed: refs.len(),
                available: MAX_CELL_REFS,
            });
        }

        let depth = refs.iter().map(|r| r.depth as usize + 1).max().unwrap_or(0);
        if depth > MAX_CELL_DEPTH as usize {
            return Err(LaunchError::CapacityExceeded {
                unit: "depth",
                needed: depth,
                available: MAX_CELL_DEPTH as usize,
            });
        }

        data.truncate(bit_len.div_ceil(8));
        Ok(Self::seal(data, bit_len, refs))
    }

    fn seal(data: Vec<u8>, bit_len: usize, refs: Vec<Arc<Cell>>) -> Self {
        let depth = refs
            .iter()
            .map(|r| r.depth.saturating_add(1))
            .max()
            .unwrap_or(0);

        let mut cell = Self {
            data,
            bit_len,
            refs,
            depth,
            hash: [0u8; 32],
        };

        let mut hasher = Sha256::new();
        hasher.update(cell.descriptors());
        hasher.update(cell.padded_data());
        for child in &cell.refs {
            hasher.update(child.depth.to_be_bytes());
        }
        for child in &cell.refs {
            hasher.update(child.hash);
        }
        cell.hash = hasher.finalize().into();
        cell
    }

    /// The empty cell (no bits, no refs)
    pub fn empty() -> Self {
        Self::seal(Vec::new(), 0, Vec::new())
    }

    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    pub fn refs(&self) -> &[Arc<Cell>] {
        &self.refs
    }

    pub fn reference(&self, index: usize) -> Option<&Cell> {
        self.refs.get(index).map(|c| c.as_ref())
    }

    /// Bit at position `index`
    pub fn bit(&self, index: usize) -> bool {
        (self.data[index / 8] >> (7 - index % 8)) & 1 == 1
    }

    /// Depth of the reference tree below this cell
    pub fn depth(&self) -> u16 {
        self.depth
    }

    /// Descriptor bytes (d1, d2) of an ordinary level-0 cell
    pub(crate) fn descriptors(&self) -> [u8; 2] {
        let d1 = self.refs.len() as u8;
        let d2 = (self.bit_len / 8 + self.bit_len.div_ceil(8)) as u8;
        [d1, d2]
    }

    /// Data bytes with the completion tag appended when the bit length is
    /// not byte-aligned
    pub(crate) fn padded_data(&self) -> Vec<u8> {
        let mut data = self.data.clone();
        let rem = self.bit_len % 8;
        if rem != 0 {
            if let Some(last) = data.last_mut() {
                *last |= 0x80 >> rem;
            }
        }
        data
    }

    /// Representation hash (SHA-256 over descriptors, data and children)
    pub fn hash(&self) -> [u8; 32] {
        self.hash
    }

    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash())
    }

    /// Number of distinct cells in the tree rooted here
    pub fn tree_size(&self) -> usize {
        let mut seen = HashSet::new();
        let mut stack = vec![self];
        while let Some(cell) = stack.pop() {
            if seen.insert(cell.hash) {
                stack.extend(cell.refs.iter().map(|r| r.as_ref()));
            }
        }
        seen.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_cell_hash() {
        assert_eq!(
            Cell::empty().hash_hex(),
            "96a296d224f285c67bee93c30f8a309157f0daa35dc5b87e410b78630a09cfc7"
        );
    }

    #[test]
    fn test_descriptors_for_unaligned_data() {
        let mut builder = CellBuilder::new();
        builder.store_uint(0b101, 3).unwrap();
        let cell = builder.build().unwrap();

        assert_eq!(cell.descriptors(), [0, 1]);
        assert_eq!(cell.padded_data(), vec![0b1011_0000]);
    }

    #[test]
    fn test_depth_follows_longest_branch() {
        let leaf = CellBuilder::new().build().unwrap();
        let mut mid = CellBuilder::new();
        mid.store_ref(leaf.clone()).unwrap();
        let mid = mid.build().unwrap();

        let mut root = CellBuilder::new();
        root.store_ref(leaf).unwrap().store_ref(mid).unwrap();
        let root = root.build().unwrap();

        assert_eq!(root.depth(), 2);
        // leaf is shared by root and mid
        assert_eq!(root.tree_size(), 3);
    }

    #[test]
    fn test_from_parts_rejects_oversized_cells() {
        let err = Cell::from_parts(vec![0; 128], 1024, Vec::new()).unwrap_err();
        assert!(matches!(err, LaunchError::CapacityExceeded { unit: "bits", .. }));
    }
}
