//! # Fuller
//!
//! Fuller is a toolkit for building and checking DRAM rowhammer payloads.
//! It models a memory-controller payload executor in software: row sequences
//! are compiled into fixed-width instruction programs, stepped cycle by
//! cycle, and verified against the timing rules of DDR3/DDR4 devices.
//!
//! ## Quickstart guide
//!
//! ```
//! use fuller::codec::InstructionFormat;
//! use fuller::payload::{DramVariant, PayloadDescription};
//! use fuller::{PayloadCompiler, TimingParameters, verifier};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let timings = TimingParameters {
//!     ras: 7, rp: 5, rfc: 20, refi: 150, faw: 20,
//!     rcd: 4, rtp: 3, ccd: 4, ccd_s: 4, rrd: 4, rrd_s: 4,
//! };
//! let format = InstructionFormat::dfi(3, 14, 10)?;
//!
//! // Compile a double-sided hammer on rows 1 and 3 of bank 0.
//! let compiler = PayloadCompiler::new(format, timings);
//! let payload = compiler.compile(&[1, 3], 0, 100_000, 4096)?;
//!
//! // The compiled program passes the DDR3 timing model.
//! let description =
//!     PayloadDescription::from_program(&payload.program, timings, DramVariant::Ddr3);
//! verifier::verify(&description, DramVariant::Ddr3)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! The heavy lifting lives in [`fuller_core`], re-exported here. Row-sequence
//! strategies (swept, sequential-pair, and random row selection) live in the
//! `fuller-rowgen` crate behind the `rowgen` feature.

pub use fuller_core::*;

#[cfg(feature = "rowgen")]
pub use fuller_rowgen as rowgen_strategies;
