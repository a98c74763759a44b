//! Row-sequence strategies for Fuller.
//!
//! This crate provides the built-in implementations of the
//! [`fuller_core::rowgen::RowGeneration`] trait: sweeps of evenly spaced
//! rows, sequential victim/aggressor pairs, and seeded random row picks.
//! Strategies are resolved by name through the static [`REGISTRY`] so callers
//! (such as the `compile_payload` binary) can select one from configuration
//! without dynamic discovery.

#![warn(missing_docs)]

mod even;
mod random;
mod sequential;

pub use even::EvenRows;
pub use random::RandomRows;
pub use sequential::SequentialPairs;

use fuller_core::rowgen::{RowGeneration, RowMapping};
use serde::Deserialize;
use thiserror::Error;

/// Configuration shared by all row-generator strategies.
///
/// Each strategy reads the fields it needs and validates them on
/// construction; unused fields are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct RowGeneratorConfig {
    /// Number of rows per generated sequence.
    pub nr_rows: usize,
    /// Exclusive upper bound on generated row numbers.
    pub max_row: usize,
    /// First row of the swept range.
    #[serde(default)]
    pub start_row: usize,
    /// Seed for strategies with a random source.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Logical-to-physical remapping applied to every generated row.
    #[serde(default)]
    pub mapping: RowMapping,
}

/// Errors raised when a strategy rejects its configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A parameter the strategy requires is zero.
    #[error("{strategy} requires {parameter} > 0")]
    NotPositive {
        /// Name of the strategy.
        strategy: &'static str,
        /// Name of the offending parameter.
        parameter: &'static str,
    },
    /// The configured range does not fit below `max_row`.
    #[error("{strategy}: start_row {start_row} + nr_rows {nr_rows} exceeds max_row {max_row}")]
    RangeTooWide {
        /// Name of the strategy.
        strategy: &'static str,
        /// Configured start row.
        start_row: usize,
        /// Configured sequence length.
        nr_rows: usize,
        /// Configured row bound.
        max_row: usize,
    },
    /// The requested strategy name is not registered.
    #[error("unknown row generator {0:?}")]
    UnknownGenerator(String),
}

/// Constructor signature of a registered strategy.
pub type RowGeneratorFactory =
    fn(&RowGeneratorConfig) -> Result<Box<dyn RowGeneration>, ConfigError>;

fn make_even_rows(config: &RowGeneratorConfig) -> Result<Box<dyn RowGeneration>, ConfigError> {
    Ok(Box::new(EvenRows::new(config)?))
}

fn make_sequential_pairs(
    config: &RowGeneratorConfig,
) -> Result<Box<dyn RowGeneration>, ConfigError> {
    Ok(Box::new(SequentialPairs::new(config)?))
}

fn make_random_rows(config: &RowGeneratorConfig) -> Result<Box<dyn RowGeneration>, ConfigError> {
    Ok(Box::new(RandomRows::new(config)?))
}

/// The static name-to-factory table of built-in strategies.
pub const REGISTRY: &[(&str, RowGeneratorFactory)] = &[
    ("even_rows", make_even_rows),
    ("sequential_pairs", make_sequential_pairs),
    ("random_rows", make_random_rows),
];

/// Builds the strategy registered under `name`.
///
/// # Errors
///
/// [`ConfigError::UnknownGenerator`] for unregistered names, or the
/// strategy's own validation failure.
pub fn get_by_name(
    name: &str,
    config: &RowGeneratorConfig,
) -> Result<Box<dyn RowGeneration>, ConfigError> {
    REGISTRY
        .iter()
        .find(|(registered, _)| *registered == name)
        .ok_or_else(|| ConfigError::UnknownGenerator(name.into()))
        .and_then(|(_, factory)| factory(config))
}
