//! Bidirectional mapping between DRAM coordinates and linear addresses.
//!
//! The linear layout is `ROW | BANK | COL` from the most significant end. A
//! configurable alignment shift distinguishes burst-granular internal (DMA)
//! addressing from byte-granular bus addressing.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use thiserror::Error;

/// DRAM address with bank, row, and column components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct DramAddr {
    /// Bank number
    pub bank: usize,
    /// Row number
    pub row: usize,
    /// Column number
    pub col: usize,
}

impl DramAddr {
    /// Creates a new DRAM address.
    pub fn new(bank: usize, row: usize, col: usize) -> Self {
        DramAddr { bank, row, col }
    }
}

impl Display for DramAddr {
    fn fmt(&self, fmt: &mut Formatter) -> fmt::Result {
        write!(fmt, "({}, {}, {})", self.bank, self.row, self.col)
    }
}

/// Errors raised by the address converter.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    /// A coordinate does not fit its configured bit width.
    #[error("{field} {value} out of range for {width}-bit field")]
    OutOfRange {
        /// Name of the coordinate.
        field: &'static str,
        /// Value that was passed.
        value: usize,
        /// Configured width in bits.
        width: u32,
    },
    /// A linear address exceeds the configured geometry.
    #[error("linear address {address:#x} out of range for {width} address bits")]
    AddressOutOfRange {
        /// The linear address.
        address: usize,
        /// Total row + bank + column bits.
        width: u32,
    },
    /// A bus address lies below the configured base.
    #[error("bus address {address:#x} below base {base:#x}")]
    BelowBase {
        /// The bus address.
        address: usize,
        /// The configured base.
        base: usize,
    },
    /// A width parameter is not a power of two.
    #[error("{field} of {value} is not a power of two")]
    NotAPowerOfTwo {
        /// Name of the parameter.
        field: &'static str,
        /// Value that was passed.
        value: usize,
    },
}

fn log2_int(field: &'static str, value: usize) -> Result<u32, AddressError> {
    if value == 0 || !value.is_power_of_two() {
        return Err(AddressError::NotAPowerOfTwo { field, value });
    }
    Ok(value.trailing_zeros())
}

/// Pure bidirectional converter between `(bank, row, col)` and linear
/// addresses under a fixed `ROW | BANK | COL` field order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressConverter {
    /// Number of row bits.
    pub rowbits: u32,
    /// Number of bank bits.
    pub bankbits: u32,
    /// Number of column bits.
    pub colbits: u32,
    /// Burst alignment shift applied to internal (DMA) addresses.
    pub alignment: u32,
    /// Width of the DRAM data port in bits, used for bus addressing.
    pub port_width: u32,
}

impl AddressConverter {
    fn check(&self, field: &'static str, value: usize, width: u32) -> Result<(), AddressError> {
        if value >= 1 << width {
            return Err(AddressError::OutOfRange { field, value, width });
        }
        Ok(())
    }

    fn encode(&self, bank: usize, row: usize, col: usize) -> Result<usize, AddressError> {
        self.check("bank", bank, self.bankbits)?;
        self.check("row", row, self.rowbits)?;
        self.check("col", col, self.colbits)?;
        Ok((row << (self.bankbits + self.colbits)) | (bank << self.colbits) | col)
    }

    fn decode(&self, address: usize) -> Result<DramAddr, AddressError> {
        let width = self.rowbits + self.bankbits + self.colbits;
        if address >= 1 << width {
            return Err(AddressError::AddressOutOfRange { address, width });
        }
        let extract = |width: u32, offset: u32| (address >> offset) & ((1 << width) - 1);
        Ok(DramAddr {
            row: extract(self.rowbits, self.bankbits + self.colbits),
            bank: extract(self.bankbits, self.colbits),
            col: extract(self.colbits, 0),
        })
    }

    fn bus_shift(&self, bus_width: usize) -> Result<i32, AddressError> {
        log2_int("bus width", bus_width)?;
        let addr_shift = log2_int("port/bus ratio", self.port_width as usize / bus_width)?;
        let byte_shift = log2_int("bus byte width", bus_width / 8)?;
        Ok(addr_shift as i32 + byte_shift as i32 - self.alignment as i32)
    }

    /// Encodes coordinates into a burst-aligned internal (DMA) address.
    pub fn encode_dma(&self, bank: usize, row: usize, col: usize) -> Result<usize, AddressError> {
        Ok(self.encode(bank, row, col)? >> self.alignment)
    }

    /// Decodes a burst-aligned internal (DMA) address.
    pub fn decode_dma(&self, address: usize) -> Result<DramAddr, AddressError> {
        // Bound-check before undoing the alignment shift so oversized inputs
        // fail cleanly instead of overflowing the shift.
        let width = self.rowbits + self.bankbits + self.colbits;
        let dma_width = width.saturating_sub(self.alignment);
        if dma_width >= usize::BITS || address >= 1usize << dma_width {
            return Err(AddressError::AddressOutOfRange { address, width });
        }
        self.decode(address << self.alignment)
    }

    /// Encodes coordinates into a byte bus address above `base`.
    pub fn encode_bus(
        &self,
        bank: usize,
        row: usize,
        col: usize,
        base: usize,
        bus_width: usize,
    ) -> Result<usize, AddressError> {
        let shift = self.bus_shift(bus_width)?;
        let address = self.encode(bank, row, col)?;
        let address = if shift > 0 { address << shift } else { address >> -shift };
        Ok(base + address)
    }

    /// Decodes a byte bus address above `base`.
    pub fn decode_bus(
        &self,
        address: usize,
        base: usize,
        bus_width: usize,
    ) -> Result<DramAddr, AddressError> {
        if address < base {
            return Err(AddressError::BelowBase { address, base });
        }
        let shift = -self.bus_shift(bus_width)?;
        let address = address - base;
        let address = if shift > 0 { address << shift } else { address >> -shift };
        self.decode(address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn converter() -> AddressConverter {
        AddressConverter {
            rowbits: 14,
            bankbits: 3,
            colbits: 10,
            alignment: 3,
            port_width: 128,
        }
    }

    #[test]
    fn dma_round_trip_exact() {
        let conv = converter();
        for (bank, row, col) in [(0, 0, 0), (1, 100, 8), (7, (1 << 14) - 1, 1 << 9)] {
            let linear = conv.encode_dma(bank, row, col).unwrap();
            assert_eq!(conv.decode_dma(linear).unwrap(), DramAddr::new(bank, row, col));
        }
    }

    #[test]
    fn bus_round_trip_exact() {
        let conv = converter();
        const BASE: usize = 0x4000_0000;
        for (bank, row, col) in [(0, 1, 0), (3, 42, 512), (5, 1234, 16)] {
            let bus = conv.encode_bus(bank, row, col, BASE, 32).unwrap();
            assert!(bus >= BASE);
            assert_eq!(
                conv.decode_bus(bus, BASE, 32).unwrap(),
                DramAddr::new(bank, row, col)
            );
        }
    }

    #[test]
    fn row_orders_above_bank_and_column() {
        let conv = converter();
        let low = conv.encode_dma(7, 0, (1 << 10) - 8).unwrap();
        let high = conv.encode_dma(0, 1, 0).unwrap();
        assert!(high > low, "row must be the most significant field");
    }

    #[test]
    fn out_of_range_is_rejected() {
        let conv = converter();
        assert_eq!(
            conv.encode_dma(8, 0, 0),
            Err(AddressError::OutOfRange { field: "bank", value: 8, width: 3 })
        );
        assert_eq!(
            conv.encode_dma(0, 1 << 14, 0),
            Err(AddressError::OutOfRange { field: "row", value: 1 << 14, width: 14 })
        );
        assert!(matches!(
            conv.decode_dma(usize::MAX >> 8),
            Err(AddressError::AddressOutOfRange { .. })
        ));
    }

    #[test]
    fn absurd_inputs_error_instead_of_panicking() {
        let conv = converter();
        // Shifting this by the alignment would overflow a usize.
        assert_eq!(
            conv.decode_dma(usize::MAX),
            Err(AddressError::AddressOutOfRange { address: usize::MAX, width: 27 })
        );
        assert!(matches!(
            conv.encode_bus(0, 1, 0, 0, 0),
            Err(AddressError::NotAPowerOfTwo { field: "bus width", value: 0 })
        ));
        assert!(matches!(
            conv.decode_bus(0x100, 0, 0),
            Err(AddressError::NotAPowerOfTwo { field: "bus width", value: 0 })
        ));
    }

    #[test]
    fn bus_address_below_base_is_rejected() {
        let conv = converter();
        assert!(matches!(
            conv.decode_bus(0x100, 0x4000_0000, 32),
            Err(AddressError::BelowBase { .. })
        ));
    }
}
