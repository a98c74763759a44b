//! Row-sequence generation traits.
//!
//! This module defines the [`RowGeneration`] trait that row-sequence strategy
//! implementations must implement to produce the rows hammered in each
//! iteration, and the [`RowMapping`] remappings between logical row numbers
//! and the physical row order of the device.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// A mapping name that no known mapping carries.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown row mapping {0:?}")]
pub struct UnknownMapping(pub String);

/// Logical-to-physical row remapping of the device.
///
/// Vendors reorder rows internally; a hammering sequence built over logical
/// neighbors must be translated into the physical row numbers the device
/// actually places next to each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowMapping {
    /// Logical and physical rows coincide.
    #[default]
    Trivial,
    /// Rows with bit 3 set have bits 1 and 2 inverted.
    TypeA,
    /// Physical rows are spaced two apart.
    TypeB,
}

impl RowMapping {
    /// Translates a logical row number into the physical row number.
    pub fn logical_to_physical(self, logical: usize) -> usize {
        match self {
            RowMapping::Trivial => logical,
            RowMapping::TypeA => {
                let bit3 = (logical & 8) >> 3;
                logical ^ (bit3 << 1) ^ (bit3 << 2)
            }
            RowMapping::TypeB => logical * 2,
        }
    }

    /// Translates a physical row number back into the logical row number.
    pub fn physical_to_logical(self, physical: usize) -> usize {
        match self {
            RowMapping::Trivial => physical,
            RowMapping::TypeA => {
                let bit3 = (physical & 8) >> 3;
                physical ^ (bit3 << 1) ^ (bit3 << 2)
            }
            RowMapping::TypeB => physical / 2,
        }
    }
}

impl FromStr for RowMapping {
    type Err = UnknownMapping;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "trivial" => Ok(RowMapping::Trivial),
            "type_a" => Ok(RowMapping::TypeA),
            "type_b" => Ok(RowMapping::TypeB),
            other => Err(UnknownMapping(other.into())),
        }
    }
}

/// Trait for implementing row-sequence strategies.
///
/// Implementors of this trait decide which physical rows are toggled in each
/// hammering iteration. The returned sequence feeds directly into the payload
/// compiler; ordering matters, as the compiler preserves it. Strategies are
/// `Debug` so boxed instances can be logged and inspected in tests.
pub trait RowGeneration: std::fmt::Debug {
    /// Returns the rows to hammer in `iteration`.
    ///
    /// Successive iterations may return different rows (sweeps) or the same
    /// ones (pinned attacks); both are valid. Strategies with internal state,
    /// such as a random source, advance it here.
    fn generate_rows(&mut self, iteration: usize) -> Vec<usize>;
}
