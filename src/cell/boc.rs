//! Bag-of-cells transport encoding
//!
//! Single-root, ordinary cells only. Identical subtrees are stored once,
//! keyed by representation hash. Serialization writes no index and no CRC;
//! deserialization accepts both.

use super::{Cell, MAX_BOC_CELLS};
use crate::error::{LaunchError, LaunchResult};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

const BOC_MAGIC: [u8; 4] = [0xb5, 0xee, 0x9c, 0x72];

/// Serialize a cell tree into BOC bytes
pub fn serialize_boc(root: &Cell) -> Vec<u8> {
    let order = topological_order(root);
    let index: HashMap<[u8; 32], usize> = order
        .iter()
        .enumerate()
        .map(|(i, cell)| (cell.hash(), i))
        .collect();

    let size_bytes = bytes_needed(order.len() as u64);

    let mut cells_data = Vec::new();
    for cell in &order {
        cells_data.extend_from_slice(&cell.descriptors());
        cells_data.extend_from_slice(&cell.padded_data());
        for child in cell.refs() {
            let child_index = index[&child.hash()] as u64;
            write_uint(&mut cells_data, child_index, size_bytes);
        }
    }

    let off_bytes = bytes_needed(cells_data.len() as u64);

    let mut out = Vec::with_capacity(cells_data.len() + 16);
    out.extend_from_slice(&BOC_MAGIC);
    out.push(size_bytes as u8);
    out.push(off_bytes as u8);
    write_uint(&mut out, order.len() as u64, size_bytes); // cells
    write_uint(&mut out, 1, size_bytes); // roots
    write_uint(&mut out, 0, size_bytes); // absent
    write_uint(&mut out, cells_data.len() as u64, off_bytes);
    write_uint(&mut out, 0, size_bytes); // root index
    out.extend_from_slice(&cells_data);
    out
}

/// Base64 transport form handed to wallets
pub fn boc_to_base64(root: &Cell) -> String {
    STANDARD.encode(serialize_boc(root))
}

pub fn base64_to_boc(input: &str) -> LaunchResult<Cell> {
    let bytes = STANDARD
        .decode(input.trim())
        .map_err(|e| LaunchError::Decode(format!("invalid base64 BOC: {}", e)))?;
    deserialize_boc(&bytes)
}

/// Parse BOC bytes back into the root cell
pub fn deserialize_boc(bytes: &[u8]) -> LaunchResult<Cell> {
    let mut reader = Reader { bytes, pos: 0 };

    if reader.take(4)? != BOC_MAGIC {
        return Err(LaunchError::Decode("bad BOC magic".into()));
    }

    let flags = reader.byte()?;
    let has_idx = flags & 0x80 != 0;
    let has_crc = flags & 0x40 != 0;
    let size_bytes = (flags & 0x07) as usize;
    let off_bytes = reader.byte()? as usize;
    if size_bytes == 0 || size_bytes > 4 || off_bytes == 0 || off_bytes > 8 {
        return Err(LaunchError::Decode("invalid BOC size fields".into()));
    }

    let cell_count = reader.uint(size_bytes)? as usize;
    let root_count = reader.uint(size_bytes)?;
    let _absent = reader.uint(size_bytes)?;
    let _total_size = reader.uint(off_bytes)?;
    if root_count != 1 {
        return Err(LaunchError::Decode(format!(
            "expected a single root, found {}",
            root_count
        )));
    }
    let root_index = reader.uint(size_bytes)? as usize;
    if cell_count == 0 || cell_count > MAX_BOC_CELLS {
        return Err(LaunchError::Decode(format!(
            "BOC declares {} cells, at most {} accepted",
            cell_count, MAX_BOC_CELLS
        )));
    }
    // Every cell takes at least its two descriptor bytes
    if cell_count * 2 > reader.remaining() {
        return Err(LaunchError::Decode(format!(
            "BOC declares {} cells but holds only {} bytes",
            cell_count,
            reader.remaining()
        )));
    }
    if has_idx {
        reader.take(cell_count * off_bytes)?;
    }

    let mut raw_cells = Vec::with_capacity(cell_count);
    for _ in 0..cell_count {
        let d1 = reader.byte()?;
        let d2 = reader.byte()?;
        if d1 & 0x08 != 0 || d1 >> 5 != 0 {
            return Err(LaunchError::Decode("exotic or leveled cells are not supported".into()));
        }
        let ref_count = (d1 & 0x07) as usize;
        let data_len = (d2 as usize).div_ceil(2);
        let data = reader.take(data_len)?.to_vec();

        let bit_len = if d2 % 2 == 0 {
            data_len * 8
        } else {
            let last = *data
                .last()
                .ok_or_else(|| LaunchError::Decode("missing completion tag".into()))?;
            if last == 0 {
                return Err(LaunchError::Decode("missing completion tag".into()));
            }
            data_len * 8 - last.trailing_zeros() as usize - 1
        };

        let mut refs = Vec::with_capacity(ref_count);
        for _ in 0..ref_count {
            refs.push(reader.uint(size_bytes)? as usize);
        }
        raw_cells.push((data, bit_len, refs));
    }

    if has_crc {
        reader.take(4)?;
    }

    // Children always follow their parents, so build from the end.
    let mut built: Vec<Option<Arc<Cell>>> = vec![None; cell_count];
    for (i, (mut data, bit_len, ref_indices)) in raw_cells.into_iter().enumerate().rev() {
        let mut refs = Vec::with_capacity(ref_indices.len());
        for ref_index in ref_indices {
            if ref_index <= i || ref_index >= cell_count {
                return Err(LaunchError::Decode(format!(
                    "cell {} references invalid index {}",
                    i, ref_index
                )));
            }
            let child = built[ref_index]
                .clone()
                .ok_or_else(|| LaunchError::Decode("unresolved reference".into()))?;
            refs.push(child);
        }

        // Clear the completion tag so the cell compares equal to a built one
        let rem = bit_len % 8;
        if rem != 0 {
            if let Some(last) = data.last_mut() {
                *last &= !(0xffu8 >> rem);
            }
        }
        let cell = Cell::from_parts(data, bit_len, refs)
            .map_err(|e| LaunchError::Decode(format!("cell {}: {}", i, e)))?;
        built[i] = Some(Arc::new(cell));
    }

    built
        .get(root_index)
        .cloned()
        .flatten()
        .map(Arc::unwrap_or_clone)
        .ok_or_else(|| LaunchError::Decode("root index out of range".into()))
}

/// Parents before children, each distinct cell once
fn topological_order(root: &Cell) -> Vec<&Cell> {
    fn visit<'a>(
        cell: &'a Cell,
        seen: &mut HashSet<[u8; 32]>,
        post_order: &mut Vec<&'a Cell>,
    ) {
        if !seen.insert(cell.hash()) {
            return;
        }
        for child in cell.refs() {
            visit(child, seen, post_order);
        }
        post_order.push(cell);
    }

    let mut seen = HashSet::new();
    let mut post_order = Vec::new();
    visit(root, &mut seen, &mut post_order);
    post_order.reverse();
    post_order
}

fn bytes_needed(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    bits.div_ceil(8).max(1)
}

fn write_uint(out: &mut Vec<u8>, value: u64, bytes: usize) {
    out.extend_from_slice(&value.to_be_bytes()[8 - bytes..]);
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn take(&mut self, len: usize) -> LaunchResult<&'a [u8]> {
        if len > self.remaining() {
            return Err(LaunchError::Decode("unexpected end of BOC".into()));
        }
        let end = self.pos + len;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn byte(&mut self) -> LaunchResult<u8> {
        Ok(self.take(1)?[0])
    }

    fn uint(&mut self, len: usize) -> LaunchResult<u64> {
        Ok(self
            .take(len)?
            .iter()
            .fold(0u64, |acc, b| (acc << 8) | *b as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::{CellBuilder, CellSlice};

    #[test]
    fn test_empty_cell_boc() {
        let bytes = serialize_boc(&Cell::empty());
        assert_eq!(hex::encode(&bytes), "b5ee9c72010101010002000000");
        assert_eq!(deserialize_boc(&bytes).unwrap(), Cell::empty());
    }

    #[test]
    fn test_tree_round_trip_through_base64() {
        let mut leaf = CellBuilder::new();
        leaf.store_uint(0b101, 3).unwrap();
        let leaf = leaf.build().unwrap();

        let mut root = CellBuilder::new();
        root.store_u32(0x7362d09c)
            .unwrap()
            .store_coins(5_000_000_000)
            .unwrap()
            .store_ref(leaf)
            .unwrap();
        let root = root.build().unwrap();

        let decoded = base64_to_boc(&boc_to_base64(&root)).unwrap();
        assert_eq!(decoded, root);
        assert_eq!(decoded.hash(), root.hash());

        let mut slice = CellSlice::new(&decoded);
        assert_eq!(slice.load_u32().unwrap(), 0x7362d09c);
        assert_eq!(slice.load_coins().unwrap(), 5_000_000_000);
        assert_eq!(CellSlice::new(slice.load_ref().unwrap()).load_uint(3).unwrap(), 0b101);
    }

    #[test]
    fn test_identical_children_are_stored_once() {
        let mut child = CellBuilder::new();
        child.store_u8(9).unwrap();
        let child = child.build().unwrap();

        let mut root = CellBuilder::new();
        root.store_ref(child.clone()).unwrap().store_ref(child).unwrap();
        let root = root.build().unwrap();

        let bytes = serialize_boc(&root);
        // header: magic, flags, off_bytes, cells = 2
        assert_eq!(bytes[6], 2);
        assert_eq!(deserialize_boc(&bytes).unwrap(), root);
    }

    /// Header plus `cells` cells forming one reference chain
    fn chain_boc(cells: usize) -> Vec<u8> {
        let mut body = Vec::new();
        for i in 0..cells {
            if i + 1 < cells {
                body.extend_from_slice(&[0x01, 0x00]);
                write_uint(&mut body, (i + 1) as u64, 2);
            } else {
                body.extend_from_slice(&[0x00, 0x00]);
            }
        }

        let mut bytes = BOC_MAGIC.to_vec();
        bytes.extend_from_slice(&[0x02, 0x04]);
        write_uint(&mut bytes, cells as u64, 2);
        write_uint(&mut bytes, 1, 2);
        write_uint(&mut bytes, 0, 2);
        write_uint(&mut bytes, body.len() as u64, 4);
        write_uint(&mut bytes, 0, 2);
        bytes.extend_from_slice(&body);
        bytes
    }

    #[test]
    fn test_huge_declared_cell_count_rejected_before_allocation() {
        let bytes = hex::decode("b5ee9c720401ffffffff00000001000000000000000000").unwrap();
        let err = deserialize_boc(&bytes).unwrap_err();
        assert!(matches!(err, LaunchError::Decode(_)));

        // Count within the cap but larger than the body can hold
        let mut bytes = chain_boc(4);
        bytes[7] = 200;
        assert!(matches!(deserialize_boc(&bytes), Err(LaunchError::Decode(_))));
    }

    #[test]
    fn test_reference_chain_depth_is_bounded() {
        let cell = deserialize_boc(&chain_boc(1000)).unwrap();
        assert_eq!(cell.depth(), 999);
        assert_eq!(cell.tree_size(), 1000);

        let err = deserialize_boc(&chain_boc(5000)).unwrap_err();
        assert!(matches!(err, LaunchError::Decode(_)));
    }

    #[test]
    fn test_cell_above_depth_limit_rejected() {
        let mut cell = Arc::new(Cell::empty());
        for _ in 0..crate::cell::MAX_CELL_DEPTH {
            cell = Arc::new(Cell::from_parts(Vec::new(), 0, vec![cell]).unwrap());
        }
        assert_eq!(cell.depth(), crate::cell::MAX_CELL_DEPTH);

        let err = Cell::from_parts(Vec::new(), 0, vec![cell]).unwrap_err();
        assert!(matches!(err, LaunchError::CapacityExceeded { unit: "depth", .. }));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(deserialize_boc(&[0, 1, 2, 3]).is_err());
        assert!(base64_to_boc("not base64!").is_err());
    }
}
