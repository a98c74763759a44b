//! # Fuller Core
//!
//! `fuller-core` is the foundational library of the Fuller payload toolkit
//! for DRAM rowhammer experiments. It models the payload-executor pipeline
//! end to end in software: compile a row sequence into a fixed-width
//! instruction program, step it cycle by cycle, and verify the resulting
//! command stream against the timing rules of the target device.
//!
//! ## Main Components
//!
//! - [`codec`] - The 32-bit instruction codec, parametrized by an
//!   [`codec::InstructionFormat`] so protocol variants share one
//!   implementation.
//!
//! - [`program`] - [`program::Program`], a bounded instruction sequence with
//!   its binary word layout.
//!
//! - [`executor`] - [`executor::PayloadExecutor`], a deterministic
//!   cycle-stepped execution model producing a command-event trace.
//!
//! - [`compiler`] - [`compiler::PayloadCompiler`], turning row sequences
//!   into refresh-aware hammering payloads.
//!
//! - [`verifier`] - a hierarchical timing model (rank, bank groups, banks)
//!   that replays payloads and reports violations.
//!
//! - [`address`] - the linear-address converter between `(bank, row, col)`
//!   coordinates and DMA/bus addresses.
//!
//! - [`rowgen`] - the [`rowgen::RowGeneration`] trait implemented by
//!   row-sequence strategy crates, and the vendor row remappings.
//!
//! Everything here is pure computation; loading programs into a device and
//! capturing bit flips is left to the transport a deployment wires in.

#![warn(missing_docs)]

pub mod address;
pub mod codec;
pub mod compiler;
pub mod executor;
pub mod payload;
pub mod program;
pub mod rowgen;
pub mod timings;
pub mod verifier;

pub use crate::codec::{Instruction, InstructionFormat, OpCode};
pub use crate::compiler::{CompiledPayload, PayloadCompiler, PayloadStats};
pub use crate::executor::{ExecutionSummary, PayloadExecutor, SyncMode, Termination};
pub use crate::payload::{DramVariant, PayloadDescription, PayloadInstr};
pub use crate::program::Program;
pub use crate::timings::TimingParameters;
pub use crate::verifier::{VerifySummary, verify, verify_all};
