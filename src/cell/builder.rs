//! Append-only, bit-precise cell builder

use super::address::Address;
use super::{Cell, MAX_BOC_CELLS, MAX_CELL_BITS, MAX_CELL_REFS};
use crate::error::{LaunchError, LaunchResult};

use std::sync::Arc;

/// Largest byte length representable in the 4-bit coins length prefix
const MAX_COINS_BYTES: usize = 15;

/// Data bits of a standard internal address (`addr_std` without anycast)
pub const ADDRESS_BITS: usize = 2 + 1 + 8 + 256;

/// Builder for a single cell.
///
/// Every store checks capacity before writing, so a failed store leaves the
/// builder unchanged. `build` seals the builder; later stores fail.
#[derive(Debug, Default)]
pub struct CellBuilder {
    data: Vec<u8>,
    bit_len: usize,
    refs: Vec<Arc<Cell>>,
    sealed: bool,
}

impl CellBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    pub fn remaining_bits(&self) -> usize {
        MAX_CELL_BITS - self.bit_len
    }

    pub fn remaining_refs(&self) -> usize {
        MAX_CELL_REFS - self.refs.len()
    }

    fn ensure_bits(&self, needed: usize) -> LaunchResult<()> {
        if self.sealed {
            return Err(LaunchError::SealedCellMutation);
        }
        if needed > self.remaining_bits() {
            return Err(LaunchError::CapacityExceeded {
                unit: "bits",
                needed,
                available: self.remaining_bits(),
            });
        }
        Ok(())
    }

    fn push_bit(&mut self, bit: bool) {
        if self.bit_len % 8 == 0 {
            self.data.push(0);
        }
        if bit {
            self.data[self.bit_len / 8] |= 0x80 >> (self.bit_len % 8);
        }
        self.bit_len += 1;
    }

    fn push_uint(&mut self, value: u128, bits: usize) {
        for i in (0..bits).rev() {
            self.push_bit((value >> i) & 1 == 1);
        }
    }

    pub fn store_uint(&mut self, value: u128, bits: usize) -> LaunchResult<&mut Self> {
        if bits > 128 || (bits < 128 && value >> bits != 0) {
            return Err(LaunchError::Internal(format!(
                "value {} does not fit in {} bits",
                value, bits
            )));
        }
        self.ensure_bits(bits)?;
        self.push_uint(value, bits);
        Ok(self)
    }

    pub fn store_u8(&mut self, value: u8) -> LaunchResult<&mut Self> {
        self.store_uint(value as u128, 8)
    }

    pub fn store_u32(&mut self, value: u32) -> LaunchResult<&mut Self> {
        self.store_uint(value as u128, 32)
    }

    /// Store a coins amount (VarUInteger 16: 4-bit byte length, then bytes)
    pub fn store_coins(&mut self, amount: u128) -> LaunchResult<&mut Self> {
        let byte_len = (128 - amount.leading_zeros() as usize).div_ceil(8);
        if byte_len > MAX_COINS_BYTES {
            return Err(LaunchError::field(
                "amount",
                format!("{} exceeds the 120-bit coins range", amount),
            ));
        }
        self.ensure_bits(4 + byte_len * 8)?;
        self.push_uint(byte_len as u128, 4);
        self.push_uint(amount, byte_len * 8);
        Ok(self)
    }

    /// Store a standard internal address
    pub fn store_address(&mut self, address: &Address) -> LaunchResult<&mut Self> {
        self.ensure_bits(ADDRESS_BITS)?;
        // addr_std$10, no anycast
        self.push_uint(0b10, 2);
        self.push_bit(false);
        self.push_uint(address.workchain() as u8 as u128, 8);
        for byte in address.hash_part() {
            self.push_uint(*byte as u128, 8);
        }
        Ok(self)
    }

    /// Store raw bytes into this cell; fails if they do not fit
    pub fn store_bytes(&mut self, bytes: &[u8]) -> LaunchResult<&mut Self> {
        self.ensure_bits(bytes.len() * 8)?;
        for byte in bytes {
            self.push_uint(*byte as u128, 8);
        }
        Ok(self)
    }

    /// Store bytes in snake layout: fill this cell, then chain the rest
    /// through continuation cells held in the first free reference.
    pub fn store_snake_bytes(&mut self, bytes: &[u8]) -> LaunchResult<&mut Self> {
        let fit = self.remaining_bits() / 8;
        if bytes.len() <= fit {
            return self.store_bytes(bytes);
        }
        if self.remaining_refs() == 0 {
            return Err(LaunchError::CapacityExceeded {
                unit: "refs",
                needed: 1,
                available: 0,
            });
        }

        let (head, tail) = bytes.split_at(fit);
        let continuation = snake_cell(tail)?;
        self.store_bytes(head)?;
        self.store_ref(continuation)
    }

    pub fn store_ref(&mut self, cell: impl Into<Arc<Cell>>) -> LaunchResult<&mut Self> {
        if self.sealed {
            return Err(LaunchError::SealedCellMutation);
        }
        if self.remaining_refs() == 0 {
            return Err(LaunchError::CapacityExceeded {
                unit: "refs",
                needed: self.refs.len() + 1,
                available: MAX_CELL_REFS,
            });
        }
        self.refs.push(cell.into());
        Ok(self)
    }

    /// Seal the builder and return the finished cell
    pub fn build(&mut self) -> LaunchResult<Cell> {
        if self.sealed {
            return Err(LaunchError::SealedCellMutation);
        }
        self.sealed = true;
        Cell::from_parts(
            std::mem::take(&mut self.data),
            self.bit_len,
            std::mem::take(&mut self.refs),
        )
    }
}

/// Build a chain of cells holding `bytes` in snake layout
pub fn snake_cell(bytes: &[u8]) -> LaunchResult<Cell> {
    let mut next: Option<Cell> = None;
    let chunks: Vec<&[u8]> = bytes.chunks(MAX_CELL_BITS / 8).collect();
    if chunks.len() > MAX_BOC_CELLS {
        return Err(LaunchError::CapacityExceeded {
            unit: "cells",
            needed: chunks.len(),
            available: MAX_BOC_CELLS,
        });
    }

    for chunk in chunks.iter().rev() {
        let mut builder = CellBuilder::new();
        builder.store_bytes(chunk)?;
        if let Some(child) = next.take() {
            builder.store_ref(child)?;
        }
        next = Some(builder.build()?);
    }

    Ok(next.unwrap_or_else(Cell::empty))
}
