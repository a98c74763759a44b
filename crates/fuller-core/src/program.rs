//! Compiled payload programs.
//!
//! A [`Program`] is an ordered, fixed-capacity instruction sequence together
//! with the [`InstructionFormat`] it was built for. Its binary layout is a
//! bounded region of 32-bit words; words beyond the compiled length are zero
//! and decode as STOP.

use crate::codec::{
    EncodingError, Instruction, InstructionFormat, LOOP_JUMP_BITS, MalformedInstruction,
};
use log::trace;
use thiserror::Error;

/// Errors raised when a program exceeds its memory or jump-distance limits.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CapacityError {
    /// The payload does not fit the program memory.
    #[error("payload requires {required} words but program memory holds {capacity}")]
    PayloadTooLarge {
        /// Words the payload would occupy.
        required: usize,
        /// Capacity of the program memory in words.
        capacity: usize,
    },
    /// A LOOP body is longer than the jump field can express.
    #[error("loop body of {jump} instructions exceeds the {LOOP_JUMP_BITS}-bit jump field")]
    JumpTooFar {
        /// Required jump distance in instructions.
        jump: usize,
    },
    /// A LOOP jump would reach before the first instruction.
    #[error("loop at instruction {index} jumps {jump} instructions before the program start")]
    JumpBeforeStart {
        /// Index the LOOP would occupy.
        index: usize,
        /// Backward jump distance.
        jump: u32,
    },
}

/// An immutable-once-built, bounded sequence of instructions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    format: InstructionFormat,
    capacity: usize,
    instructions: Vec<Instruction>,
}

impl Program {
    /// Creates an empty program bounded to `capacity` instruction words.
    pub fn new(format: InstructionFormat, capacity: usize) -> Self {
        Program {
            format,
            capacity,
            instructions: Vec::new(),
        }
    }

    /// Appends one instruction.
    ///
    /// LOOP instructions are validated here against the backward-only jump
    /// invariant: the jump must land on an instruction that already exists.
    ///
    /// # Errors
    ///
    /// [`CapacityError::PayloadTooLarge`] when the program is full, and
    /// [`CapacityError::JumpBeforeStart`] for a jump past the start.
    pub fn push(&mut self, instruction: Instruction) -> Result<(), CapacityError> {
        if self.instructions.len() >= self.capacity {
            return Err(CapacityError::PayloadTooLarge {
                required: self.instructions.len() + 1,
                capacity: self.capacity,
            });
        }
        if let Instruction::Loop { jump, .. } = instruction {
            let index = self.instructions.len();
            if jump as usize > index {
                return Err(CapacityError::JumpBeforeStart { index, jump });
            }
        }
        trace!("program[{}] = {:?}", self.instructions.len(), instruction);
        self.instructions.push(instruction);
        Ok(())
    }

    /// The instruction format this program was compiled for.
    pub fn format(&self) -> InstructionFormat {
        self.format
    }

    /// Number of compiled instructions.
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Whether no instruction has been compiled yet.
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Capacity of the backing program memory in instruction words.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The compiled instructions, without the implicit trailing STOPs.
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Encodes the program into its binary layout.
    ///
    /// The result always has `capacity` words; unused trailing words are
    /// zero, which the execution model decodes as STOP.
    pub fn words(&self) -> Result<Vec<u32>, EncodingError> {
        let mut words = Vec::with_capacity(self.capacity);
        for instruction in &self.instructions {
            words.push(self.format.encode(instruction)?);
        }
        words.resize(self.capacity, 0);
        Ok(words)
    }

    /// Decodes a binary program image.
    ///
    /// Trailing zero words are kept as capacity, not as instructions.
    pub fn from_words(
        words: &[u32],
        format: InstructionFormat,
    ) -> Result<Self, MalformedInstruction> {
        let compiled = words.len() - words.iter().rev().take_while(|&&w| w == 0).count();
        let mut instructions = Vec::with_capacity(compiled);
        for &word in &words[..compiled] {
            instructions.push(format.decode(word)?);
        }
        Ok(Program {
            format,
            capacity: words.len(),
            instructions,
        })
    }

    /// Total execution time of the program in cycles.
    ///
    /// Sums instruction timeslices; a LOOP adds `count` further passes over
    /// its body, each costing the body timeslices plus one cycle for the
    /// taken jump. The walk stops at the first STOP. Loop bodies are assumed
    /// not to contain STOP or LOOP instructions, which holds for compiled
    /// payloads.
    pub fn expected_cycles(&self) -> u64 {
        let mut cycles: u64 = 0;
        for (i, instruction) in self.instructions.iter().enumerate() {
            cycles += 1;
            match *instruction {
                Instruction::Stop => break,
                Instruction::Loop { count, jump } => {
                    let body = &self.instructions[i.saturating_sub(jump as usize)..i];
                    let body_cycles: u64 =
                        body.iter().map(|instr| instr.timeslice() as u64).sum();
                    cycles += count as u64 * (body_cycles + 1);
                }
                _ => cycles += instruction.timeslice() as u64 - 1,
            }
        }
        cycles
    }
}
