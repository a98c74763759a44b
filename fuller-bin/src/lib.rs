//! # Fuller
//!
//! Fuller is a toolkit for building and checking DRAM rowhammer payloads:
//! row sequences are compiled into fixed-width instruction programs for a
//! memory-controller payload executor, simulated cycle by cycle, and
//! verified against the timing rules of the target device.
//!
//! ## Binaries
//!
//! - `compile_payload`: compiles a row list (or a named row-generator
//!   strategy) into a payload, optionally verifying it and writing a JSON
//!   report.
//! - `verify_payload`: replays a JSON payload description against the DDR3
//!   or DDR4 timing model and reports the first (or every) violation.
//!
//! Use `--help` on either binary for the available options.

#[macro_use]
extern crate log;

/// Initializes logging for the Fuller binaries, defaulting to `info`.
pub fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

/// Logs one line per opcode of an execution summary count table.
pub fn log_opcode_counts(executed: &std::collections::BTreeMap<fuller_core::OpCode, u64>) {
    for (op, count) in executed {
        info!("  {}: {}", op, count);
    }
}
