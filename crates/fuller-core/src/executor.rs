//! Cycle-stepped execution model for compiled payloads.
//!
//! [`PayloadExecutor`] is a single-threaded abstract machine that retires
//! exactly one instruction or idle-wait tick per step, deterministically. It
//! executes the binary word image of a [`Program`], so implicit trailing
//! STOPs (zero words) behave exactly as on the device.
//!
//! The machine cycles through READY → WAIT-SYNC → RUN → IDLE → READY.
//! `start` arms it; the WAIT-SYNC → RUN transition models the alignment of
//! execution with an in-flight refresh boundary and is granted either
//! immediately or by an external call, depending on [`SyncMode`].

use crate::codec::{Instruction, InstructionFormat, MalformedInstruction, OpCode};
use crate::program::Program;
use log::{debug, trace};
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

/// Machine mode of the execution model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Mode {
    /// Not running; `start` is accepted.
    Ready,
    /// Armed, waiting for the synchronization grant.
    WaitSync,
    /// Executing one instruction per tick.
    Run,
    /// Waiting out the remainder of a command timeslice.
    Idle,
}

/// How the WAIT-SYNC → RUN transition is granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncMode {
    /// Grant on the first tick after `start`.
    #[default]
    Immediate,
    /// Grant only when [`PayloadExecutor::grant_sync`] is called, modeling
    /// alignment with a periodic-maintenance (refresh) boundary.
    External,
}

/// Why execution terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// An explicit STOP instruction was executed.
    Stop,
    /// The program counter reached the end of program memory without an
    /// explicit STOP. Treated as normal termination, but kept
    /// distinguishable for diagnostics.
    EndOfMemory,
    /// A stop request was honored at an instruction boundary.
    StopRequested,
    /// The caller-imposed cycle budget ran out.
    OutOfBudget,
}

/// One device command as it was emitted, at cycle precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CommandEvent {
    /// Tick at which the command was issued.
    pub tick: u64,
    /// The command opcode.
    pub op: OpCode,
    /// Rank the command addresses.
    pub rank: u32,
    /// Bank the command addresses.
    pub bank: u32,
    /// Row or column part of the address.
    pub rowcol: u32,
}

/// Mutable machine state, owned exclusively by one executor.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionState {
    /// Program counter in instruction words.
    pub pc: usize,
    /// Loop iteration counter.
    pub loop_counter: u32,
    /// Remaining idle cycles of the current timeslice.
    pub idle_counter: u32,
    /// Current machine mode.
    pub mode: Mode,
}

/// Summary of one execution.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionSummary {
    /// Total ticks elapsed.
    pub ticks: u64,
    /// Instructions executed per opcode.
    pub executed: BTreeMap<OpCode, u64>,
    /// Why execution ended.
    pub termination: Termination,
}

/// Errors raised while stepping the machine.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExecutionError {
    /// The word at the program counter cannot be classified. Fatal.
    #[error("malformed instruction at pc {pc}: {source}")]
    Malformed {
        /// Program counter of the offending word.
        pc: usize,
        /// The decode failure.
        source: MalformedInstruction,
    },
    /// A LOOP jump would move the program counter before the start.
    #[error("loop at pc {pc} jumps {jump} instructions before the program start")]
    JumpOutOfRange {
        /// Program counter of the LOOP.
        pc: usize,
        /// Backward jump distance.
        jump: u32,
    },
    /// `step` was called while the machine is READY.
    #[error("executor is not running")]
    NotRunning,
    /// `start` was called while the machine is not READY.
    #[error("executor already started")]
    AlreadyStarted,
    /// `run` was called in external sync mode without a grant.
    #[error("execution is gated on a refresh boundary; synchronization not granted")]
    AwaitingSync,
}

/// The payload execution machine.
pub struct PayloadExecutor {
    words: Vec<u32>,
    format: InstructionFormat,
    sync: SyncMode,
    state: ExecutionState,
    sync_granted: bool,
    stop_requested: bool,
    ticks: u64,
    trace: Vec<CommandEvent>,
    executed: BTreeMap<OpCode, u64>,
    termination: Option<Termination>,
}

impl PayloadExecutor {
    /// Creates an executor over the binary image of `program`.
    pub fn new(program: &Program, sync: SyncMode) -> Self {
        // words() cannot fail for a Program built through push(), which
        // validated every instruction already.
        let words = program.words().unwrap_or_default();
        Self::from_words(words, program.format(), sync)
    }

    /// Creates an executor over an externally supplied word image.
    pub fn from_words(words: Vec<u32>, format: InstructionFormat, sync: SyncMode) -> Self {
        PayloadExecutor {
            words,
            format,
            sync,
            state: ExecutionState {
                pc: 0,
                loop_counter: 0,
                idle_counter: 0,
                mode: Mode::Ready,
            },
            sync_granted: false,
            stop_requested: false,
            ticks: 0,
            trace: Vec::new(),
            executed: BTreeMap::new(),
            termination: None,
        }
    }

    /// Current machine state.
    pub fn state(&self) -> &ExecutionState {
        &self.state
    }

    /// Whether the machine is READY.
    pub fn ready(&self) -> bool {
        self.state.mode == Mode::Ready
    }

    /// Ticks elapsed since `start`.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// The ordered command-event trace of the last execution.
    pub fn trace(&self) -> &[CommandEvent] {
        &self.trace
    }

    /// Arms the machine: READY → WAIT-SYNC, resetting all counters.
    pub fn start(&mut self) -> Result<(), ExecutionError> {
        if self.state.mode != Mode::Ready {
            return Err(ExecutionError::AlreadyStarted);
        }
        self.state = ExecutionState {
            pc: 0,
            loop_counter: 0,
            idle_counter: 0,
            mode: Mode::WaitSync,
        };
        self.sync_granted = matches!(self.sync, SyncMode::Immediate);
        self.stop_requested = false;
        self.ticks = 0;
        self.trace.clear();
        self.executed.clear();
        self.termination = None;
        debug!("executor armed, waiting for sync");
        Ok(())
    }

    /// Grants the WAIT-SYNC → RUN transition in external sync mode.
    pub fn grant_sync(&mut self) {
        self.sync_granted = true;
    }

    /// Requests termination. Honored only at the next instruction boundary,
    /// never mid-idle-wait, so cycle accounting stays exact.
    pub fn request_stop(&mut self) {
        self.stop_requested = true;
    }

    /// Retires exactly one tick.
    ///
    /// # Errors
    ///
    /// [`ExecutionError::Malformed`] on an unclassifiable opcode (fatal) and
    /// [`ExecutionError::JumpOutOfRange`] on a loop under-running the
    /// program start.
    pub fn step(&mut self) -> Result<Mode, ExecutionError> {
        match self.state.mode {
            Mode::Ready => Err(ExecutionError::NotRunning),
            Mode::WaitSync => {
                if self.sync_granted {
                    self.state.mode = Mode::Run;
                    self.execute_cycle()
                } else {
                    // Stalled on the refresh boundary; burns real time but
                    // no program cycles.
                    Ok(Mode::WaitSync)
                }
            }
            Mode::Run => self.execute_cycle(),
            Mode::Idle => {
                self.ticks += 1;
                if self.state.idle_counter <= 1 {
                    self.state.idle_counter = 0;
                    self.state.pc += 1;
                    self.state.mode = Mode::Run;
                } else {
                    self.state.idle_counter -= 1;
                }
                Ok(self.state.mode)
            }
        }
    }

    fn execute_cycle(&mut self) -> Result<Mode, ExecutionError> {
        if self.stop_requested {
            return Ok(self.finish(Termination::StopRequested));
        }
        if self.state.pc >= self.words.len() {
            return Ok(self.finish(Termination::EndOfMemory));
        }
        let word = self.words[self.state.pc];
        let instruction = self
            .format
            .decode(word)
            .map_err(|source| ExecutionError::Malformed { pc: self.state.pc, source })?;
        *self.executed.entry(instruction.op_code()).or_insert(0) += 1;

        let issue_tick = self.ticks;
        self.ticks += 1;
        match instruction {
            Instruction::Stop => Ok(self.finish(Termination::Stop)),
            Instruction::Loop { count, jump } => {
                if self.state.loop_counter != count {
                    let pc = self.state.pc;
                    if (jump as usize) > pc {
                        return Err(ExecutionError::JumpOutOfRange { pc, jump });
                    }
                    self.state.pc = pc - jump as usize;
                    self.state.loop_counter += 1;
                } else {
                    // Reset so the next loop instruction starts fresh.
                    self.state.pc += 1;
                    self.state.loop_counter = 0;
                }
                Ok(Mode::Run)
            }
            Instruction::Noop { timeslice } => {
                self.wait_out(timeslice);
                Ok(self.state.mode)
            }
            Instruction::Dfi { op, timeslice, address } => {
                let (rank, bank, rowcol) = self.format.decode_address(address);
                trace!("tick {}: {} bank {} addr {}", issue_tick, op, bank, rowcol);
                self.trace.push(CommandEvent { tick: issue_tick, op, rank, bank, rowcol });
                self.wait_out(timeslice);
                Ok(self.state.mode)
            }
        }
    }

    fn wait_out(&mut self, timeslice: u32) {
        if timeslice > 1 {
            self.state.idle_counter = timeslice - 1;
            self.state.mode = Mode::Idle;
        } else {
            self.state.pc += 1;
        }
    }

    fn finish(&mut self, termination: Termination) -> Mode {
        debug!("execution finished after {} ticks: {:?}", self.ticks, termination);
        self.termination = Some(termination);
        self.state.mode = Mode::Ready;
        self.state.idle_counter = 0;
        self.state.loop_counter = 0;
        Mode::Ready
    }

    fn summary(&self) -> ExecutionSummary {
        ExecutionSummary {
            ticks: self.ticks,
            executed: self.executed.clone(),
            termination: self.termination.unwrap_or(Termination::OutOfBudget),
        }
    }

    /// Drives the machine to termination.
    ///
    /// A malformed program can loop forever, so callers may impose an
    /// external cycle `budget`; exceeding it ends the run with
    /// [`Termination::OutOfBudget`].
    ///
    /// # Errors
    ///
    /// Besides step errors, fails with [`ExecutionError::AwaitingSync`] when
    /// the sync mode is external and no grant has been given.
    pub fn run(&mut self, budget: Option<u64>) -> Result<ExecutionSummary, ExecutionError> {
        if self.state.mode == Mode::Ready {
            self.start()?;
        }
        if !self.sync_granted {
            return Err(ExecutionError::AwaitingSync);
        }
        while self.state.mode != Mode::Ready {
            if budget.is_some_and(|budget| self.ticks >= budget) {
                self.finish(Termination::OutOfBudget);
                break;
            }
            self.step()?;
        }
        Ok(self.summary())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::InstructionFormat;
    use crate::program::Program;

    fn format() -> InstructionFormat {
        InstructionFormat::dfi(3, 14, 10).unwrap()
    }

    fn act(format: &InstructionFormat, row: u32, timeslice: u32) -> Instruction {
        Instruction::Dfi {
            op: OpCode::Act,
            timeslice,
            address: format.address(0, 0, row).unwrap(),
        }
    }

    fn run_program(program: &Program) -> (ExecutionSummary, Vec<CommandEvent>) {
        let mut executor = PayloadExecutor::new(program, SyncMode::Immediate);
        let summary = executor.run(None).unwrap();
        (summary, executor.trace().to_vec())
    }

    #[test]
    fn loop_executes_body_count_plus_one_times() {
        let format = format();
        let mut program = Program::new(format, 16);
        program.push(act(&format, 1, 1)).unwrap();
        program.push(act(&format, 3, 1)).unwrap();
        program.push(Instruction::Loop { count: 4, jump: 2 }).unwrap();
        program.push(Instruction::Stop).unwrap();

        let (summary, trace) = run_program(&program);
        // Block of length 2, count 4: (4 + 1) * 2 commands in the trace.
        assert_eq!(trace.len(), 10);
        let rows: Vec<u32> = trace.iter().map(|e| e.rowcol).collect();
        assert_eq!(rows, [1, 3, 1, 3, 1, 3, 1, 3, 1, 3]);
        assert_eq!(summary.executed[&OpCode::Act], 10);
        assert_eq!(summary.executed[&OpCode::Loop], 5);
        assert_eq!(summary.termination, Termination::Stop);
    }

    #[test]
    fn ticks_match_expected_cycles() {
        let format = format();
        let mut program = Program::new(format, 16);
        program.push(Instruction::Noop { timeslice: 13 }).unwrap();
        program.push(act(&format, 7, 7)).unwrap();
        program.push(act(&format, 9, 5)).unwrap();
        program.push(Instruction::Loop { count: 2, jump: 2 }).unwrap();
        program.push(Instruction::Stop).unwrap();

        let (summary, _) = run_program(&program);
        assert_eq!(summary.ticks, program.expected_cycles());
    }

    #[test]
    fn timeslice_delays_the_next_command() {
        let format = format();
        let mut program = Program::new(format, 8);
        program.push(act(&format, 1, 10)).unwrap();
        program.push(act(&format, 2, 1)).unwrap();
        program.push(Instruction::Stop).unwrap();

        let (_, trace) = run_program(&program);
        assert_eq!(trace[0].tick, 0);
        assert_eq!(trace[1].tick, 10);
    }

    #[test]
    fn trailing_zero_words_terminate_at_end_of_memory() {
        let format = format();
        let mut program = Program::new(format, 4);
        program.push(act(&format, 1, 1)).unwrap();
        // No explicit STOP: the next zero word decodes as STOP already, so
        // build an image with no zero words at all to hit the boundary.
        let mut words = program.words().unwrap();
        words.truncate(1);
        let mut executor = PayloadExecutor::from_words(words, format, SyncMode::Immediate);
        let summary = executor.run(None).unwrap();
        assert_eq!(summary.termination, Termination::EndOfMemory);
        assert_eq!(summary.ticks, 1);
    }

    #[test]
    fn malformed_opcode_is_fatal() {
        let format = format();
        let mut executor =
            PayloadExecutor::from_words(vec![0b011], format, SyncMode::Immediate);
        let err = executor.run(None).unwrap_err();
        assert_eq!(
            err,
            ExecutionError::Malformed {
                pc: 0,
                source: MalformedInstruction { word: 0b011, bits: 0b011 },
            }
        );
    }

    #[test]
    fn infinite_programs_stop_at_the_cycle_budget() {
        let format = format();
        // LOOP with count=max jumping over a 1-cycle ACT runs for a long
        // time; a small budget must cut it off.
        let mut program = Program::new(format, 4);
        program.push(act(&format, 1, 1)).unwrap();
        program
            .push(Instruction::Loop { count: format.max_loop_count(), jump: 1 })
            .unwrap();
        let mut executor = PayloadExecutor::new(&program, SyncMode::Immediate);
        let summary = executor.run(Some(100)).unwrap();
        assert_eq!(summary.termination, Termination::OutOfBudget);
        assert!(summary.ticks <= 101);
    }

    #[test]
    fn external_sync_gates_the_run() {
        let format = format();
        let mut program = Program::new(format, 4);
        program.push(Instruction::Stop).unwrap();
        let mut executor = PayloadExecutor::new(&program, SyncMode::External);
        executor.start().unwrap();
        assert_eq!(executor.run(None).unwrap_err(), ExecutionError::AwaitingSync);
        executor.grant_sync();
        let summary = executor.run(None).unwrap();
        assert_eq!(summary.termination, Termination::Stop);
    }

    #[test]
    fn stop_request_waits_for_the_instruction_boundary() {
        let format = format();
        let mut program = Program::new(format, 4);
        program.push(act(&format, 1, 5)).unwrap();
        program.push(act(&format, 2, 5)).unwrap();
        program.push(Instruction::Stop).unwrap();
        let mut executor = PayloadExecutor::new(&program, SyncMode::Immediate);
        executor.start().unwrap();
        executor.step().unwrap(); // issue first ACT, enter IDLE
        executor.request_stop();
        let summary = executor.run(None).unwrap();
        // The full 5-cycle timeslice is honored before the stop.
        assert_eq!(summary.ticks, 5);
        assert_eq!(summary.termination, Termination::StopRequested);
        assert_eq!(executor.trace().len(), 1);
    }
}
