//! Compilation of row sequences into hammering payloads.
//!
//! The compiler turns a sequence of rows to toggle into a [`Program`] of
//! ACT/PRE pairs, wrapped in LOOP instructions and interleaved with REF so
//! that the refresh cadence of the memory controller is never violated. The
//! emitted programs pass the timing verifier unmodified.

use crate::codec::{
    EncodingError, Instruction, InstructionFormat, OpCode, PRECHARGE_ALL_FLAG,
};
use crate::program::{CapacityError, Program};
use crate::timings::{TimingError, TimingParameters};
use itertools::Itertools;
use log::{debug, info};
use serde::Serialize;
use thiserror::Error;

/// Errors raised during payload compilation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CompileError {
    /// The row sequence has no rows to hammer.
    #[error("row sequence is empty")]
    EmptyRowSequence,
    /// The row sequence alone overflows the largest expressible loop body.
    #[error("row sequence of {len} rows exceeds the largest loop body of {max} activations")]
    RowSequenceTooLong {
        /// Number of rows in the sequence.
        len: usize,
        /// Largest number of ACT/PRE pairs one loop body can hold.
        max: u32,
    },
    /// The refresh interval cannot fit a single activate/precharge pair.
    #[error("tREFI={refi} leaves no room for an activate/precharge pair after tRFC={rfc}")]
    RefreshIntervalTooTight {
        /// Configured refresh interval.
        refi: u32,
        /// Configured refresh cycle time.
        rfc: u32,
    },
    /// A timing parameter is not positive.
    #[error(transparent)]
    Timing(#[from] TimingError),
    /// The payload exceeds the program memory or a jump field.
    #[error(transparent)]
    Capacity(#[from] CapacityError),
    /// An operand does not fit its instruction field.
    #[error(transparent)]
    Encoding(#[from] EncodingError),
}

/// Statistics reported alongside a compiled payload.
#[derive(Debug, Clone, Serialize)]
pub struct PayloadStats {
    /// Refresh-class instructions issued over the whole execution, not
    /// counting the final phase-synchronization REF.
    pub refreshes: u64,
    /// Total execution time in cycles.
    pub expected_cycles: u64,
    /// Compiled payload size in instruction words.
    pub size_words: usize,
    /// Passes over the row sequence per repeatable unit.
    pub repetitions: u32,
    /// Activations in the repeatable unit.
    pub repeatable_unit: u32,
}

/// A compiled payload with its statistics.
#[derive(Debug, Clone)]
pub struct CompiledPayload {
    /// The compiled program.
    pub program: Program,
    /// Compilation statistics.
    pub stats: PayloadStats,
}

/// A refresh slot: a real REF, or a NOOP placeholder of the same duration
/// when refresh emission is disabled.
fn refresh_instruction(op: OpCode, timeslice: u32) -> Instruction {
    match op {
        OpCode::Ref => Instruction::Dfi { op, timeslice, address: 0 },
        _ => Instruction::Noop { timeslice },
    }
}

fn least_common_multiple(x: u64, y: u64) -> u64 {
    let mut gcd = x;
    let mut rem = y;
    while rem != 0 {
        (gcd, rem) = (rem, gcd % rem);
    }
    x * y / gcd
}

/// Compiles row sequences into hammering payloads for one instruction
/// format and timing configuration.
#[derive(Debug, Clone)]
pub struct PayloadCompiler {
    format: InstructionFormat,
    timings: TimingParameters,
    refresh: bool,
    rank: u32,
}

impl PayloadCompiler {
    /// Creates a compiler for `format` and `timings` with refresh emission
    /// enabled, targeting rank 0.
    pub fn new(format: InstructionFormat, timings: TimingParameters) -> Self {
        PayloadCompiler { format, timings, refresh: true, rank: 0 }
    }

    /// Sets whether REF instructions are emitted. When disabled, NOOPs of
    /// the same duration take their place so the cadence of the payload is
    /// unchanged.
    pub fn with_refresh(mut self, refresh: bool) -> Self {
        self.refresh = refresh;
        self
    }

    /// Sets the target rank for formats that carry rank bits.
    pub fn with_rank(mut self, rank: u32) -> Self {
        self.rank = rank;
        self
    }

    /// Compiles a payload toggling `row_sequence` in `bank` until the rows
    /// have been activated `read_count` times combined.
    ///
    /// The activation budget is spent in repeatable units that tile the row
    /// sequence evenly, so the effective count is rounded up to the next
    /// multiple of the sequence length.
    ///
    /// # Errors
    ///
    /// Fails without truncating when the payload does not fit `capacity`
    /// instruction words, besides the structural errors of [`CompileError`].
    pub fn compile(
        &self,
        row_sequence: &[u32],
        bank: u32,
        read_count: u64,
        capacity: usize,
    ) -> Result<CompiledPayload, CompileError> {
        self.timings.validate()?;
        if row_sequence.is_empty() {
            return Err(CompileError::EmptyRowSequence);
        }
        debug!(
            "compiling payload for rows [{}] in bank {}, {} activations",
            row_sequence.iter().join(", "),
            bank,
            read_count
        );
        let t = self.timings;
        let max_acts_in_loop = (self.format.max_loop_jump() - 1) / 2;
        if row_sequence.len() > max_acts_in_loop as usize {
            return Err(CompileError::RowSequenceTooLong {
                len: row_sequence.len(),
                max: max_acts_in_loop,
            });
        }
        if t.refi <= t.rfc || (t.refi - t.rfc) / (t.rp + t.ras) == 0 {
            return Err(CompileError::RefreshIntervalTooTight { refi: t.refi, rfc: t.rfc });
        }
        let acts_per_interval = ((t.refi - t.rfc) / (t.rp + t.ras)) as u64;

        let repeatable_unit = least_common_multiple(acts_per_interval, row_sequence.len() as u64)
            .min(max_acts_in_loop as u64);
        let repetitions = repeatable_unit / row_sequence.len() as u64;
        let repeatable_unit = repetitions * row_sequence.len() as u64;
        debug!(
            "repeatable unit: {} activations, {} passes over {} rows",
            repeatable_unit,
            repetitions,
            row_sequence.len()
        );

        let quotient = read_count / repeatable_unit;
        let leftover = read_count % repeatable_unit;
        let leftover_passes = leftover.div_ceil(row_sequence.len() as u64);

        // Row addresses are format-encoded once and reused every pass.
        let addresses = row_sequence
            .iter()
            .map(|&row| self.format.address(self.rank, bank, row))
            .collect::<Result<Vec<u32>, EncodingError>>()?;

        let refresh_op = if self.refresh { OpCode::Ref } else { OpCode::Noop };
        let mut program = Program::new(self.format, capacity);

        // The first instruction after the mode transition waits out the
        // refresh the controller may have in flight; the leading REF of the
        // first loop block then re-synchronizes with the refresh timer.
        program.push(Instruction::Noop {
            timeslice: 1.max(t.rfc.saturating_sub(2)).max(t.refi.saturating_sub(2)),
        })?;

        let mut refreshes = self.encode_long_loop(
            &mut program,
            &addresses,
            repetitions as u32,
            quotient,
            refresh_op,
        )?;
        refreshes += self.encode_long_loop(
            &mut program,
            &addresses,
            1,
            leftover_passes,
            refresh_op,
        )?;

        // The controller refresh timer resets on the mode transition back,
        // so a final REF brings the device back in phase with it.
        program.push(refresh_instruction(refresh_op, 1))?;
        program.push(Instruction::Stop)?;

        let stats = PayloadStats {
            refreshes,
            expected_cycles: program.expected_cycles(),
            size_words: program.len(),
            repetitions: repetitions as u32,
            repeatable_unit: repeatable_unit as u32,
        };
        info!(
            "compiled payload: {} words, {} cycles, {} refreshes",
            stats.size_words, stats.expected_cycles, stats.refreshes
        );
        Ok(CompiledPayload { program, stats })
    }

    /// Emits as many chained loop blocks as it takes to execute the body
    /// `rolled` times, working around the width of the LOOP count field.
    fn encode_long_loop(
        &self,
        program: &mut Program,
        addresses: &[u32],
        unrolled: u32,
        rolled: u64,
        refresh_op: OpCode,
    ) -> Result<u64, CompileError> {
        let count_max = self.format.max_loop_count() as u64;
        let n_loops = rolled.div_ceil(count_max + 1);
        let mut refreshes = 0;
        for outer in 0..n_loops {
            let loop_count = if outer == 0 {
                match rolled % (count_max + 1) {
                    0 => count_max,
                    m => m - 1,
                }
            } else {
                count_max
            };
            refreshes +=
                self.encode_one_loop(program, addresses, unrolled, loop_count as u32, refresh_op)?;
        }
        Ok(refreshes)
    }

    /// Emits one loop block: a leading refresh, `unrolled` passes of ACT and
    /// precharge-all pairs over the rows, more refreshes whenever the next
    /// pair would overrun tREFI, and a LOOP taking the block `rolled` more
    /// times. Returns the refreshes issued over all iterations.
    fn encode_one_loop(
        &self,
        program: &mut Program,
        addresses: &[u32],
        unrolled: u32,
        rolled: u32,
        refresh_op: OpCode,
    ) -> Result<u64, CompileError> {
        let t = self.timings;
        let pre_address = self.format.address(self.rank, 0, PRECHARGE_ALL_FLAG)?;

        let mut local_refreshes: u32 = 1;
        program.push(refresh_instruction(refresh_op, t.rfc))?;
        // One extra cycle accounts for the jump at the end of the block.
        let mut accum = t.rfc + 1;
        for _ in 0..unrolled {
            for &address in addresses {
                if accum + t.ras + t.rp > t.refi {
                    // Invariant: the time between the beginnings of two
                    // refreshes stays below tREFI.
                    program.push(refresh_instruction(refresh_op, t.rfc))?;
                    accum = t.rfc;
                    local_refreshes += 1;
                }
                accum += t.ras + t.rp;
                program.push(Instruction::Dfi {
                    op: OpCode::Act,
                    timeslice: t.ras,
                    address,
                })?;
                program.push(Instruction::Dfi {
                    op: OpCode::Pre,
                    timeslice: t.rp,
                    address: pre_address,
                })?;
            }
        }
        // A zero-count LOOP would execute the block exactly once, which the
        // block already does on its own, so it is omitted.
        if rolled > 0 {
            let jump_target = 2 * unrolled * addresses.len() as u32 + local_refreshes;
            if jump_target > self.format.max_loop_jump() {
                return Err(CapacityError::JumpTooFar { jump: jump_target as usize }.into());
            }
            program.push(Instruction::Loop { count: rolled, jump: jump_target })?;
        }
        Ok(local_refreshes as u64 * (rolled as u64 + 1))
    }
}
