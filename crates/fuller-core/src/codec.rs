//! Fixed-width instruction codec for payload-executor programs.
//!
//! All instructions are 32-bit words. The low bits carry the opcode, the
//! remaining bits are interpreted per instruction class:
//!
//! ```text
//!       LSB                       MSB
//! dfi:  OP_CODE | TIMESLICE | ADDRESS
//! noop: OP_CODE | TIMESLICE_NOOP
//! loop: OP_CODE | COUNT     | JUMP
//! ```
//!
//! A NOOP with a timeslice of zero is the STOP instruction. The LOOP
//! instruction jumps `count` times, so the enclosed block is executed
//! `count + 1` times in total.
//!
//! Field widths and the address sub-layout (rank/bank/row/column bits) are
//! carried by an [`InstructionFormat`] descriptor so that protocol variants
//! (single-rank DFI-style, rank-aware) are configurations of one codec
//! rather than separate implementations.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use thiserror::Error;

/// Width of one instruction word in bits.
pub const INSTRUCTION_BITS: u32 = 32;
/// Width of the opcode field.
pub const OP_CODE_BITS: u32 = 3;
/// Width of the timeslice field of DFI-mappable instructions.
pub const TIMESLICE_BITS: u32 = 8;
/// Width of the address field of DFI-mappable instructions.
pub const ADDRESS_BITS: u32 = 21;
/// Width of the extended timeslice field of NOOP instructions.
pub const TIMESLICE_NOOP_BITS: u32 = TIMESLICE_BITS + ADDRESS_BITS;
/// Width of the LOOP iteration count field.
pub const LOOP_COUNT_BITS: u32 = 20;
/// Width of the LOOP backward jump field.
pub const LOOP_JUMP_BITS: u32 = 9;
/// Column-address flag (A10) selecting precharge-all instead of one bank.
pub const PRECHARGE_ALL_FLAG: u32 = 1 << 10;

/// Operation codes of the payload executor.
///
/// The DFI-mappable opcodes encode `(ras, cas, we)` in their bit pattern.
/// `0b011` is the single hole in the 3-bit space; decoding it fails with
/// [`MalformedInstruction`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[repr(u32)]
pub enum OpCode {
    /// No operation; with timeslice 0 this is STOP.
    Noop = 0b000,
    /// ZQ calibration.
    Zqc = 0b001,
    /// Column read.
    Read = 0b010,
    /// Row activate.
    Act = 0b100,
    /// Precharge (all banks when the A10 column bit is set).
    Pre = 0b101,
    /// Refresh.
    Ref = 0b110,
    /// Backward jump with iteration count.
    Loop = 0b111,
}

impl OpCode {
    /// Decodes an opcode from its 3-bit pattern.
    pub fn from_bits(bits: u32) -> Option<OpCode> {
        match bits {
            0b000 => Some(OpCode::Noop),
            0b001 => Some(OpCode::Zqc),
            0b010 => Some(OpCode::Read),
            0b100 => Some(OpCode::Act),
            0b101 => Some(OpCode::Pre),
            0b110 => Some(OpCode::Ref),
            0b111 => Some(OpCode::Loop),
            _ => None,
        }
    }
}

impl Display for OpCode {
    fn fmt(&self, fmt: &mut Formatter) -> fmt::Result {
        let name = match self {
            OpCode::Noop => "NOOP",
            OpCode::Zqc => "ZQC",
            OpCode::Read => "READ",
            OpCode::Act => "ACT",
            OpCode::Pre => "PRE",
            OpCode::Ref => "REF",
            OpCode::Loop => "LOOP",
        };
        write!(fmt, "{}", name)
    }
}

/// A decoded payload-executor instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    /// A DFI-mappable device command occupying `timeslice` cycles.
    Dfi {
        /// One of ACT/PRE/REF/READ/ZQC.
        op: OpCode,
        /// Cycles this command occupies, including its post-issue wait.
        timeslice: u32,
        /// Packed RANK | BANK | ROW/COL address.
        address: u32,
    },
    /// An idle wait of `timeslice` cycles (extended timeslice field).
    Noop {
        /// Cycles to stay idle; must be positive (zero would be STOP).
        timeslice: u32,
    },
    /// Jump back `jump` instructions, `count` times.
    Loop {
        /// Number of jumps taken; the body runs `count + 1` times.
        count: u32,
        /// Backward jump distance in instructions; must be positive.
        jump: u32,
    },
    /// Terminate execution (encoded as NOOP with timeslice 0).
    Stop,
}

impl Instruction {
    /// Cycles this instruction occupies during straight-line execution.
    ///
    /// LOOP occupies one cycle per evaluation; STOP one cycle.
    pub fn timeslice(&self) -> u32 {
        match self {
            Instruction::Dfi { timeslice, .. } => *timeslice,
            Instruction::Noop { timeslice } => *timeslice,
            Instruction::Loop { .. } => 1,
            Instruction::Stop => 1,
        }
    }

    /// The opcode this instruction encodes to.
    pub fn op_code(&self) -> OpCode {
        match self {
            Instruction::Dfi { op, .. } => *op,
            Instruction::Noop { .. } | Instruction::Stop => OpCode::Noop,
            Instruction::Loop { .. } => OpCode::Loop,
        }
    }
}

/// Errors raised when an instruction cannot be encoded.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncodingError {
    /// An operand does not fit its declared field width.
    #[error("{field} value {value} exceeds the {width}-bit field")]
    FieldOverflow {
        /// Name of the offending field.
        field: &'static str,
        /// Value that was passed.
        value: u32,
        /// Declared width of the field in bits.
        width: u32,
    },
    /// A non-NOOP instruction was given a timeslice of zero.
    #[error("{0} instruction with zero timeslice")]
    ZeroTimeslice(OpCode),
    /// A LOOP jump of zero would reference the LOOP itself.
    #[error("LOOP jump must reference an earlier instruction")]
    ZeroJump,
    /// The opcode is not a DFI-mappable device command.
    #[error("{0} cannot be encoded as a device command")]
    NotADeviceCommand(OpCode),
    /// A rank was given for a format without rank bits.
    #[error("rank {0} given, but the instruction format has no rank bits")]
    UnexpectedRank(u32),
}

/// Fatal decode failure: the opcode bits cannot be classified.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("cannot classify opcode bits {bits:#05b} of word {word:#010x}")]
pub struct MalformedInstruction {
    /// The full instruction word.
    pub word: u32,
    /// The opcode bits extracted from it.
    pub bits: u32,
}

/// Errors raised when constructing an [`InstructionFormat`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormatError {
    /// Rank, bank and row/column bits do not fit the address field.
    #[error("address sub-fields need {needed} bits, the address field has {available}")]
    AddressTooWide {
        /// Bits required by rank + bank + max(row, col).
        needed: u32,
        /// Bits available in the address field.
        available: u32,
    },
    /// The rank count is not a power of two.
    #[error("rank count {0} is not a power of two")]
    BadRankCount(u32),
}

/// Protocol-variant descriptor: address sub-field layout of one codec.
///
/// The packed address of a device command is `RANK | BANK | ROW-or-COL`
/// starting from the LSB. Formats without rank bits describe the simple
/// single-rank DFI variant; [`InstructionFormat::rank_aware`] yields the
/// multi-rank variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructionFormat {
    /// Number of rank bits (0 for single-rank formats).
    pub rankbits: u32,
    /// Number of bank bits.
    pub bankbits: u32,
    /// Number of row bits.
    pub rowbits: u32,
    /// Number of column bits.
    pub colbits: u32,
}

fn mask(bits: u32) -> u32 {
    if bits >= 32 { u32::MAX } else { (1 << bits) - 1 }
}

fn check_fits(field: &'static str, value: u32, width: u32) -> Result<u32, EncodingError> {
    if value > mask(width) {
        return Err(EncodingError::FieldOverflow { field, value, width });
    }
    Ok(value)
}

impl InstructionFormat {
    /// Creates a format, validating that the address sub-fields fit.
    pub fn new(
        rankbits: u32,
        bankbits: u32,
        rowbits: u32,
        colbits: u32,
    ) -> Result<Self, FormatError> {
        let needed = rankbits + bankbits + rowbits.max(colbits);
        if needed > ADDRESS_BITS {
            return Err(FormatError::AddressTooWide {
                needed,
                available: ADDRESS_BITS,
            });
        }
        Ok(InstructionFormat {
            rankbits,
            bankbits,
            rowbits,
            colbits,
        })
    }

    /// The simple single-rank DFI-style format.
    pub fn dfi(bankbits: u32, rowbits: u32, colbits: u32) -> Result<Self, FormatError> {
        Self::new(0, bankbits, rowbits, colbits)
    }

    /// The rank-aware format for `nranks` ranks.
    pub fn rank_aware(
        nranks: u32,
        bankbits: u32,
        rowbits: u32,
        colbits: u32,
    ) -> Result<Self, FormatError> {
        if nranks == 0 || !nranks.is_power_of_two() {
            return Err(FormatError::BadRankCount(nranks));
        }
        Self::new(nranks.trailing_zeros(), bankbits, rowbits, colbits)
    }

    /// Largest encodable timeslice of a device command.
    pub fn max_timeslice(&self) -> u32 {
        mask(TIMESLICE_BITS)
    }

    /// Largest encodable timeslice of a NOOP.
    pub fn max_noop_timeslice(&self) -> u32 {
        mask(TIMESLICE_NOOP_BITS)
    }

    /// Largest encodable LOOP count.
    pub fn max_loop_count(&self) -> u32 {
        mask(LOOP_COUNT_BITS)
    }

    /// Largest encodable LOOP jump distance.
    pub fn max_loop_jump(&self) -> u32 {
        mask(LOOP_JUMP_BITS)
    }

    /// Packs rank, bank and row/column into a command address.
    ///
    /// # Errors
    ///
    /// Fails with [`EncodingError::FieldOverflow`] when a part exceeds its
    /// bit width, or [`EncodingError::UnexpectedRank`] when a nonzero rank
    /// is given for a format without rank bits.
    pub fn address(&self, rank: u32, bank: u32, rowcol: u32) -> Result<u32, EncodingError> {
        if self.rankbits == 0 && rank != 0 {
            return Err(EncodingError::UnexpectedRank(rank));
        }
        check_fits("rank", rank, self.rankbits.max(1))?;
        check_fits("bank", bank, self.bankbits)?;
        check_fits("row/col", rowcol, self.rowbits.max(self.colbits))?;
        let mut address = bank | (rowcol << self.bankbits);
        if self.rankbits > 0 {
            address = (address << self.rankbits) | rank;
        }
        Ok(address)
    }

    /// Unpacks a command address into `(rank, bank, rowcol)`.
    pub fn decode_address(&self, address: u32) -> (u32, u32, u32) {
        let rank = address & mask(self.rankbits);
        let bank = (address >> self.rankbits) & mask(self.bankbits);
        let rowcol = address >> (self.rankbits + self.bankbits);
        (rank, bank, rowcol)
    }

    /// Encodes an instruction into its 32-bit word.
    ///
    /// # Errors
    ///
    /// Fails with [`EncodingError`] when an operand exceeds its field width
    /// or a non-NOOP instruction carries a zero timeslice. Never clamps.
    pub fn encode(&self, instr: &Instruction) -> Result<u32, EncodingError> {
        match *instr {
            Instruction::Stop => Ok(OpCode::Noop as u32),
            Instruction::Noop { timeslice } => {
                if timeslice == 0 {
                    // A zero-timeslice NOOP is `Instruction::Stop`; requiring
                    // the explicit variant keeps round-trips exact.
                    return Err(EncodingError::ZeroTimeslice(OpCode::Noop));
                }
                check_fits("timeslice", timeslice, TIMESLICE_NOOP_BITS)?;
                Ok(OpCode::Noop as u32 | (timeslice << OP_CODE_BITS))
            }
            Instruction::Loop { count, jump } => {
                if jump == 0 {
                    return Err(EncodingError::ZeroJump);
                }
                check_fits("count", count, LOOP_COUNT_BITS)?;
                check_fits("jump", jump, LOOP_JUMP_BITS)?;
                Ok(OpCode::Loop as u32
                    | (count << OP_CODE_BITS)
                    | (jump << (OP_CODE_BITS + LOOP_COUNT_BITS)))
            }
            Instruction::Dfi { op, timeslice, address } => {
                if matches!(op, OpCode::Noop | OpCode::Loop) {
                    return Err(EncodingError::NotADeviceCommand(op));
                }
                if timeslice == 0 {
                    return Err(EncodingError::ZeroTimeslice(op));
                }
                check_fits("timeslice", timeslice, TIMESLICE_BITS)?;
                check_fits("address", address, ADDRESS_BITS)?;
                Ok(op as u32
                    | (timeslice << OP_CODE_BITS)
                    | (address << (OP_CODE_BITS + TIMESLICE_BITS)))
            }
        }
    }

    /// Decodes a 32-bit word.
    ///
    /// Total over all well-formed words; the only failure is the `0b011`
    /// opcode hole, reported as [`MalformedInstruction`].
    pub fn decode(&self, word: u32) -> Result<Instruction, MalformedInstruction> {
        let bits = word & mask(OP_CODE_BITS);
        let op = OpCode::from_bits(bits).ok_or(MalformedInstruction { word, bits })?;
        let tail = word >> OP_CODE_BITS;
        Ok(match op {
            OpCode::Noop => {
                let timeslice = tail & mask(TIMESLICE_NOOP_BITS);
                if timeslice == 0 {
                    Instruction::Stop
                } else {
                    Instruction::Noop { timeslice }
                }
            }
            OpCode::Loop => Instruction::Loop {
                count: tail & mask(LOOP_COUNT_BITS),
                jump: (tail >> LOOP_COUNT_BITS) & mask(LOOP_JUMP_BITS),
            },
            op => Instruction::Dfi {
                op,
                timeslice: tail & mask(TIMESLICE_BITS),
                address: (tail >> TIMESLICE_BITS) & mask(ADDRESS_BITS),
            },
        })
    }
}
