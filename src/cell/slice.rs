//! Sequential reader over a sealed cell

use super::address::Address;
use super::Cell;
use crate::error::{LaunchError, LaunchResult};

/// Reads bits and references from a cell in the order they were stored
pub struct CellSlice<'a> {
    cell: &'a Cell,
    bit_pos: usize,
    ref_pos: usize,
}

impl<'a> CellSlice<'a> {
    pub fn new(cell: &'a Cell) -> Self {
        Self {
            cell,
            bit_pos: 0,
            ref_pos: 0,
        }
    }

    pub fn remaining_bits(&self) -> usize {
        self.cell.bit_len() - self.bit_pos
    }

    pub fn remaining_refs(&self) -> usize {
        self.cell.refs().len() - self.ref_pos
    }

    fn ensure_bits(&self, needed: usize) -> LaunchResult<()> {
        if needed > self.remaining_bits() {
            return Err(LaunchError::Decode(format!(
                "need {} bits at offset {}, only {} left",
                needed,
                self.bit_pos,
                self.remaining_bits()
            )));
        }
        Ok(())
    }

    pub fn load_bit(&mut self) -> LaunchResult<bool> {
        self.ensure_bits(1)?;
        let bit = self.cell.bit(self.bit_pos);
        self.bit_pos += 1;
        Ok(bit)
    }

    pub fn load_uint(&mut self, bits: usize) -> LaunchResult<u128> {
        if bits > 128 {
            return Err(LaunchError::Decode(format!("cannot load {} bits as u128", bits)));
        }
        self.ensure_bits(bits)?;
        let mut value = 0u128;
        for _ in 0..bits {
            value = (value << 1) | self.cell.bit(self.bit_pos) as u128;
            self.bit_pos += 1;
        }
        Ok(value)
    }

    pub fn load_u8(&mut self) -> LaunchResult<u8> {
        Ok(self.load_uint(8)? as u8)
    }

    pub fn load_u32(&mut self) -> LaunchResult<u32> {
        Ok(self.load_uint(32)? as u32)
    }

    pub fn load_int(&mut self, bits: usize) -> LaunchResult<i128> {
        let raw = self.load_uint(bits)?;
        if bits == 0 || bits == 128 {
            return Ok(raw as i128);
        }
        let sign = 1u128 << (bits - 1);
        Ok(if raw & sign != 0 {
            (raw as i128) - (1i128 << bits)
        } else {
            raw as i128
        })
    }

    pub fn load_coins(&mut self) -> LaunchResult<u128> {
        let byte_len = self.load_uint(4)? as usize;
        self.load_uint(byte_len * 8)
    }

    /// Load `MsgAddressInt` or `addr_none` (returned as `None`)
    pub fn load_address(&mut self) -> LaunchResult<Option<Address>> {
        match self.load_uint(2)? {
            0b00 => Ok(None),
            0b10 => {
                if self.load_bit()? {
                    return Err(LaunchError::Decode("anycast addresses are not supported".into()));
                }
                let workchain = self.load_int(8)? as i8;
                let hash: [u8; 32] = self
                    .load_bytes(32)?
                    .try_into()
                    .map_err(|_| LaunchError::Decode("short address hash".into()))?;
                Ok(Some(Address::new(workchain, hash)))
            }
            tag => Err(LaunchError::Decode(format!("unsupported address tag {:02b}", tag))),
        }
    }

    pub fn load_bytes(&mut self, len: usize) -> LaunchResult<Vec<u8>> {
        self.ensure_bits(len * 8)?;
        (0..len).map(|_| self.load_u8()).collect()
    }

    pub fn load_ref(&mut self) -> LaunchResult<&'a Cell> {
        let cell = self
            .cell
            .reference(self.ref_pos)
            .ok_or_else(|| LaunchError::Decode("no references left".into()))?;
        self.ref_pos += 1;
        Ok(cell)
    }

    /// Load the remaining bytes of this cell and every continuation cell
    /// chained through the next reference
    pub fn load_snake_bytes(&mut self) -> LaunchResult<Vec<u8>> {
        let mut out = self.load_bytes(self.remaining_bits() / 8)?;
        let mut next = if self.remaining_refs() > 0 {
            Some(self.load_ref()?)
        } else {
            None
        };

        while let Some(cell) = next {
            let mut slice = CellSlice::new(cell);
            out.extend(slice.load_bytes(slice.remaining_bits() / 8)?);
            next = if slice.remaining_refs() > 0 {
                Some(slice.load_ref()?)
            } else {
                None
            };
        }

        Ok(out)
    }
}
