//! Standalone payload descriptions.
//!
//! A [`PayloadDescription`] is the JSON surface consumed by the verifier: a
//! timing record plus an ordered list of tagged instructions. It exists in
//! two ways, parsed from a file or derived from a compiled [`Program`], so
//! the same timing checks apply to hand-written and compiled payloads alike.

use crate::codec::{
    LOOP_COUNT_BITS, LOOP_JUMP_BITS, OpCode, TIMESLICE_BITS, TIMESLICE_NOOP_BITS,
};
use crate::program::Program;
use crate::timings::TimingParameters;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use thiserror::Error;

/// Device topology variant the verifier models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DramVariant {
    /// Eight flat banks, rank-wide tCCD/tRRD.
    Ddr3,
    /// Four bank groups of four banks, with long/short tCCD and tRRD pairs.
    Ddr4,
}

impl DramVariant {
    /// Bank-group address bits. Zero for variants without bank groups.
    pub fn bank_group_bits(self) -> u32 {
        match self {
            DramVariant::Ddr3 => 0,
            DramVariant::Ddr4 => 2,
        }
    }

    /// Bank address bits within one bank group.
    pub fn bank_bits(self) -> u32 {
        match self {
            DramVariant::Ddr3 => 3,
            DramVariant::Ddr4 => 2,
        }
    }

    /// Row/column address bits of a memory instruction.
    pub fn addr_bits(self) -> u32 {
        18
    }
}

/// One instruction of a payload description.
///
/// The serialized form tags each instruction with a lowercase `type` field,
/// so a payload file reads as a list of `{"type": "mem", ...}` objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PayloadInstr {
    /// A device command occupying `timeslice` cycles.
    Mem {
        /// Command opcode; only READ, ACT, PRE, and REF are legal.
        op: OpCode,
        /// Cycles until the next instruction may issue.
        timeslice: u32,
        /// Target rank. Only rank 0 is supported.
        #[serde(default)]
        rank: u32,
        /// Target bank group. Must be 0 for variants without bank groups.
        #[serde(default)]
        bank_group: u32,
        /// Target bank within the bank group.
        bank: u32,
        /// Row address for ACT, column address for READ, flags for PRE.
        addr: u32,
    },
    /// An idle wait of `timeslice` cycles.
    Nop {
        /// Cycles to wait.
        timeslice: u32,
    },
    /// A backward jump, taken `count` times.
    Jmp {
        /// Backward distance in instructions.
        offset: u32,
        /// Number of times the jump is taken.
        count: u32,
    },
}

/// Field-width limits of the payload instruction fields, shared with the
/// binary codec so both surfaces bound-check identically.
impl PayloadInstr {
    /// Exclusive upper bound of a memory-instruction timeslice.
    pub const MAX_MEM_TIMESLICE: u32 = 1 << TIMESLICE_BITS;
    /// Exclusive upper bound of a nop timeslice.
    pub const MAX_NOP_TIMESLICE: u32 = 1 << TIMESLICE_NOOP_BITS;
    /// Exclusive upper bound of a jump offset.
    pub const MAX_JMP_OFFSET: u32 = 1 << LOOP_JUMP_BITS;
    /// Exclusive upper bound of a jump count.
    pub const MAX_JMP_COUNT: u32 = 1 << LOOP_COUNT_BITS;
}

/// A complete payload: timing parameters plus the instruction stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadDescription {
    /// Timing parameters the payload claims to respect.
    pub timing: TimingParameters,
    /// The instruction stream.
    pub instructions: Vec<PayloadInstr>,
}

/// Errors that can occur when loading a payload description from JSON.
#[derive(Debug, Error)]
pub enum PayloadLoadError {
    /// I/O error reading the payload file
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// JSON parsing error
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl PayloadDescription {
    /// Loads a payload description from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, PayloadLoadError> {
        let f = File::open(path.as_ref())?;
        let reader = BufReader::new(f);
        let payload: PayloadDescription = serde_json::from_reader(reader)?;
        Ok(payload)
    }

    /// Serializes the payload description to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Derives a payload description from a compiled program.
    ///
    /// NOOP becomes `nop`, LOOP becomes `jmp`, device commands become `mem`.
    /// STOP and trailing zero words end the stream. For variants with bank
    /// groups the low bank-address bits of the program select the group, so
    /// consecutive banks land in different groups.
    pub fn from_program(
        program: &Program,
        timing: TimingParameters,
        variant: DramVariant,
    ) -> Self {
        use crate::codec::Instruction;

        let format = program.format();
        let mut instructions = Vec::with_capacity(program.len());
        for instruction in program.instructions() {
            match *instruction {
                Instruction::Stop => break,
                Instruction::Noop { timeslice } => {
                    instructions.push(PayloadInstr::Nop { timeslice });
                }
                Instruction::Loop { count, jump } => {
                    instructions.push(PayloadInstr::Jmp { offset: jump, count });
                }
                Instruction::Dfi { op, timeslice, address } => {
                    let (rank, bank, rowcol) = format.decode_address(address);
                    let group_bits = variant.bank_group_bits();
                    let bank_group = bank & ((1 << group_bits) - 1);
                    let bank = bank >> group_bits;
                    instructions.push(PayloadInstr::Mem {
                        op,
                        timeslice,
                        rank,
                        bank_group,
                        bank,
                        addr: rowcol,
                    });
                }
            }
        }
        PayloadDescription { timing, instructions }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Instruction, InstructionFormat};

    fn timing() -> TimingParameters {
        crate::timings::tests::sample()
    }

    #[test]
    fn json_round_trip_with_type_tags() {
        let payload = PayloadDescription {
            timing: timing(),
            instructions: vec![
                PayloadInstr::Nop { timeslice: 100 },
                PayloadInstr::Mem {
                    op: OpCode::Act,
                    timeslice: 7,
                    rank: 0,
                    bank_group: 0,
                    bank: 1,
                    addr: 100,
                },
                PayloadInstr::Jmp { offset: 1, count: 3 },
            ],
        };
        let json = payload.to_json().unwrap();
        assert!(json.contains(r#""type": "mem""#));
        assert!(json.contains(r#""op": "act""#));
        let parsed: PayloadDescription = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, payload);
    }

    #[test]
    fn mem_rank_and_group_default_to_zero() {
        let json = r#"{"type": "mem", "op": "read", "timeslice": 4, "bank": 2, "addr": 8}"#;
        let instr: PayloadInstr = serde_json::from_str(json).unwrap();
        assert_eq!(
            instr,
            PayloadInstr::Mem {
                op: OpCode::Read,
                timeslice: 4,
                rank: 0,
                bank_group: 0,
                bank: 2,
                addr: 8,
            }
        );
    }

    #[test]
    fn from_program_splits_ddr4_bank_groups() {
        let format = InstructionFormat::dfi(4, 13, 10).unwrap();
        let mut program = Program::new(format, 8);
        program
            .push(Instruction::Dfi {
                op: OpCode::Act,
                timeslice: 7,
                address: format.address(0, 0b0110, 42).unwrap(),
            })
            .unwrap();
        program.push(Instruction::Stop).unwrap();

        let payload = PayloadDescription::from_program(&program, timing(), DramVariant::Ddr4);
        assert_eq!(
            payload.instructions,
            vec![PayloadInstr::Mem {
                op: OpCode::Act,
                timeslice: 7,
                rank: 0,
                bank_group: 0b10,
                bank: 0b01,
                addr: 42,
            }]
        );
    }

    #[test]
    fn from_program_stops_at_the_stop_instruction() {
        let format = InstructionFormat::dfi(3, 14, 10).unwrap();
        let mut program = Program::new(format, 8);
        program.push(Instruction::Noop { timeslice: 5 }).unwrap();
        program.push(Instruction::Stop).unwrap();
        program.push(Instruction::Noop { timeslice: 9 }).unwrap();

        let payload = PayloadDescription::from_program(&program, timing(), DramVariant::Ddr3);
        assert_eq!(payload.instructions, vec![PayloadInstr::Nop { timeslice: 5 }]);
    }
}
