//! Step-by-step interpretation of [programs](crate::symbolic::Program).
//!
//! Every instruction passes through three phases: fetch, decode and execute. The [step]
//! function performs a single phase transition. It never modifies the state it is given and
//! returns a new [MachineState] instead, so earlier states stay valid for inspection.
//!
//! The [Emulator] drives [step], keeps the [execution history](crate::history::History) and
//! notifies [event listeners](crate::event::EventListener) of state changes.
//!
//! Jump targets are instruction indices, not the byte addresses the
//! [compiler](crate::compiler) assigns to labels.

use std::fmt;
use std::ops::{Index, IndexMut};
use std::time::Duration;

use itertools::Itertools;
use slog::{debug, o, trace, Discard, Logger};

use crate::config::MachineConfig;
use crate::error::RuntimeError;
use crate::event::{Event, EventDispatcher, EventListener};
use crate::history::{History, HistoryEntry};
use crate::instruction::{OpCode, Register};
use crate::symbolic::{validate_instruction, Instruction, Operand, Program};

/// Values of the four general purpose registers.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Registers([i32; 4]);

impl Index<Register> for Registers {
    type Output = i32;

    fn index(&self, register: Register) -> &i32 {
        &self.0[register.index()]
    }
}

impl IndexMut<Register> for Registers {
    fn index_mut(&mut self, register: Register) -> &mut i32 {
        &mut self.0[register.index()]
    }
}

impl fmt::Display for Registers {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let registers = Register::ALL
            .iter()
            .map(|reg| format!("{}={}", reg, self[*reg]))
            .join(" ");

        write!(f, "{}", registers)
    }
}

/// Flags describing the result of the latest load, arithmetic or comparison instruction.
///
/// Used to determine if JZ and JNZ result in a jump.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Flags {
    pub zero: bool,
    pub negative: bool,
}

impl Flags {
    fn from_result(value: i32) -> Flags {
        Flags {
            zero: value == 0,
            negative: value < 0,
        }
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Z={} N={}", self.zero as u8, self.negative as u8)
    }
}

/// Complete state of the emulated machine.
#[derive(Debug, Clone, PartialEq)]
pub struct MachineState {
    /// Index of the next instruction to fetch.
    pub pc: usize,
    pub registers: Registers,
    pub memory: Vec<i32>,
    pub flags: Flags,
    pub halted: bool,

    /// Number of execute phases performed so far.
    pub cycle: u64,
}

impl MachineState {
    /// Creates the state in which execution of `program` starts. An empty program starts
    /// halted.
    pub fn new(program: &Program, config: &MachineConfig) -> MachineState {
        MachineState {
            pc: 0,
            registers: Registers::default(),
            memory: vec![0; config.memory_size],
            flags: Flags::default(),
            halted: program.is_empty(),
            cycle: 0,
        }
    }
}

impl fmt::Display for MachineState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "PC={} {} {}", self.pc, self.registers, self.flags)?;

        if self.halted {
            write!(f, " (halted)")?;
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Fetch,
    Decode,
    Execute,
}

impl Phase {
    /// Pause to make before running this phase when animating a program. Execution is paced
    /// faster than fetching and decoding.
    pub fn suggested_delay(&self) -> Duration {
        match self {
            Phase::Fetch | Phase::Decode => Duration::from_millis(350),
            Phase::Execute => Duration::from_millis(150),
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Phase::Fetch => "fetch",
            Phase::Decode => "decode",
            Phase::Execute => "execute",
        };

        f.pad(name)
    }
}

/// Result of a single phase transition.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub state: MachineState,

    /// What happened, in words.
    pub explanation: String,

    /// The phase to run next.
    pub phase: Phase,

    /// The instruction between fetch and execute. `None` after the execute phase.
    pub fetched: Option<Instruction>,

    /// The fault that halted the machine during this step, if any.
    pub fault: Option<RuntimeError>,
}

/// Resolves the value of an operand.
///
/// A label resolves to the index of the instruction it points to, or 0 when it is not defined.
///
/// # Errors
/// Returns [RuntimeError::AddressOutOfRange] for a memory operand outside of the memory.
pub fn operand_value(
    state: &MachineState,
    operand: &Operand,
    program: &Program,
) -> Result<i32, RuntimeError> {
    match operand {
        Operand::Register(reg) => Ok(state.registers[*reg]),
        Operand::Immediate(value) => Ok(*value),
        Operand::Memory(address) => Ok(state.memory[memory_cell(state, *address)?]),
        Operand::Label(label) => Ok(program.label_index(label).map(|i| i as i32).unwrap_or(0)),
    }
}

fn memory_cell(state: &MachineState, address: i32) -> Result<usize, RuntimeError> {
    if address >= 0 && (address as usize) < state.memory.len() {
        Ok(address as usize)
    } else {
        Err(RuntimeError::AddressOutOfRange { address })
    }
}

fn summary(opcode: OpCode) -> &'static str {
    match opcode {
        OpCode::Load => "load a value into a register",
        OpCode::Store => "store a register into memory",
        OpCode::Add => "add a value to a register",
        OpCode::Subtract => "subtract a value from a register",
        OpCode::Increment => "increment a register",
        OpCode::Decrement => "decrement a register",
        OpCode::Compare => "compare a register with a value",
        OpCode::Jump => "jump unconditionally",
        OpCode::JumpNotZero => "jump if the zero flag is clear",
        OpCode::JumpZero => "jump if the zero flag is set",
        OpCode::Halt => "stop the processor",
    }
}

/// Utility struct for executing a single instruction against a copy of the machine state.
struct Execution<'s, 'p> {
    state: &'s mut MachineState,
    instruction: &'p Instruction,
    program: &'p Program,
}

impl<'s, 'p> Execution<'s, 'p> {
    fn malformed(&self) -> RuntimeError {
        RuntimeError::MalformedInstruction {
            line: self.instruction.line,
            opcode: self.instruction.opcode,
        }
    }

    fn operand(&self, position: usize) -> Result<&'p Operand, RuntimeError> {
        let instruction: &'p Instruction = self.instruction;
        instruction.operands.get(position).ok_or_else(|| self.malformed())
    }

    fn register(&self, position: usize) -> Result<Register, RuntimeError> {
        self.operand(position)?
            .register()
            .ok_or_else(|| self.malformed())
    }

    fn value(&self, position: usize) -> Result<i32, RuntimeError> {
        operand_value(&*self.state, self.operand(position)?, self.program)
    }

    /// Moves to the next instruction and halts if there is none.
    fn advance(&mut self, explanation: String) -> String {
        self.state.pc += 1;

        if self.state.pc >= self.program.instructions.len() {
            self.state.halted = true;
            format!("{}; end of program reached", explanation)
        } else {
            explanation
        }
    }

    /// Computes `register op operand`, updates the flags and stores the result unless the
    /// instruction is a comparison.
    fn arithmetic(&mut self, rhs: i32) -> Result<String, RuntimeError> {
        let opcode = self.instruction.opcode;
        let reg = self.register(0)?;
        let lhs = self.state.registers[reg];

        let (result, sign) = match opcode {
            OpCode::Add | OpCode::Increment => (lhs.checked_add(rhs), '+'),
            _ => (lhs.checked_sub(rhs), '-'),
        };

        let result = result.ok_or(RuntimeError::Overflow { opcode })?;

        self.state.flags = Flags::from_result(result);

        let explanation = if opcode == OpCode::Compare {
            format!("{} {} {} = {}, result discarded, {}", lhs, sign, rhs, result, self.state.flags)
        } else {
            self.state.registers[reg] = result;
            format!("{} = {} {} {} = {}, {}", reg, lhs, sign, rhs, result, self.state.flags)
        };

        Ok(self.advance(explanation))
    }

    fn jump(&mut self, taken: bool) -> Result<String, RuntimeError> {
        let label = match self.operand(0)? {
            Operand::Label(label) => label,
            _ => return Err(self.malformed()),
        };

        if !taken {
            let explanation = format!("{} not taken, {}", self.instruction.opcode, self.state.flags);
            return Ok(self.advance(explanation));
        }

        let target = self
            .program
            .label_index(label)
            .ok_or_else(|| RuntimeError::UndefinedLabel(label.clone()))?;

        self.state.pc = target;

        Ok(format!("jump to {} (instruction {})", label, target))
    }

    /// Executes the instruction.
    ///
    /// # Errors
    /// Returns the fault if the instruction cannot be executed. The state may be partially
    /// updated in that case.
    fn emulate(&mut self) -> Result<String, RuntimeError> {
        validate_instruction(self.instruction).map_err(|_| self.malformed())?;

        match self.instruction.opcode {
            OpCode::Halt => {
                self.state.halted = true;
                Ok("processor halted".to_string())
            }
            OpCode::Load => {
                let reg = self.register(0)?;
                let value = self.value(1)?;

                self.state.registers[reg] = value;
                self.state.flags = Flags::from_result(value);

                let explanation = format!("{} = {}, {}", reg, value, self.state.flags);
                Ok(self.advance(explanation))
            }
            OpCode::Store => {
                let reg = self.register(0)?;
                let cell = match self.operand(1)? {
                    Operand::Memory(address) => memory_cell(&*self.state, *address)?,
                    _ => return Err(self.malformed()),
                };

                let value = self.state.registers[reg];
                self.state.memory[cell] = value;

                let explanation = format!("memory cell [{:02X}h] = {} from register {}", cell, value, reg);
                Ok(self.advance(explanation))
            }
            OpCode::Add | OpCode::Subtract | OpCode::Compare => {
                let rhs = self.value(1)?;
                self.arithmetic(rhs)
            }
            OpCode::Increment | OpCode::Decrement => self.arithmetic(1),
            OpCode::Jump => self.jump(true),
            OpCode::JumpNotZero => {
                let taken = !self.state.flags.zero;
                self.jump(taken)
            }
            OpCode::JumpZero => {
                let taken = self.state.flags.zero;
                self.jump(taken)
            }
        }
    }
}

fn fault(state: &MachineState, error: RuntimeError, context: Option<&Instruction>) -> Step {
    let mut state = state.clone();
    state.halted = true;

    let explanation = match context {
        Some(instruction) => format!("{}: {}, halting", instruction, error),
        None => format!("{}, halting", error),
    };

    Step {
        state,
        explanation,
        phase: Phase::Fetch,
        fetched: None,
        fault: Some(error),
    }
}

fn fetch(state: &MachineState, program: &Program) -> Step {
    let mut next = state.clone();

    match program.instructions.get(state.pc) {
        None => {
            next.halted = true;

            Step {
                state: next,
                explanation: format!("no more instructions at {}, halting", state.pc),
                phase: Phase::Fetch,
                fetched: None,
                fault: None,
            }
        }
        Some(instruction) => Step {
            state: next,
            explanation: format!(
                "fetched {} from instruction {} (line {})",
                instruction, state.pc, instruction.line
            ),
            phase: Phase::Decode,
            fetched: Some(instruction.clone()),
            fault: None,
        },
    }
}

fn decode(state: &MachineState, instruction: &Instruction) -> Step {
    let mut explanation = format!("{}: {}", instruction.opcode, summary(instruction.opcode));

    if !instruction.operands.is_empty() {
        explanation.push_str("; operands: ");
        explanation.push_str(&instruction.operands.iter().map(Operand::describe).join(", "));
    }

    Step {
        state: state.clone(),
        explanation,
        phase: Phase::Execute,
        fetched: Some(instruction.clone()),
        fault: None,
    }
}

fn execute(state: &MachineState, instruction: &Instruction, program: &Program) -> Step {
    let mut next = state.clone();
    next.cycle += 1;

    let result = Execution {
        state: &mut next,
        instruction,
        program,
    }
    .emulate();

    match result {
        Ok(explanation) => Step {
            state: next,
            explanation: format!("{}: {}", instruction, explanation),
            phase: Phase::Fetch,
            fetched: None,
            fault: None,
        },
        Err(error) => {
            let mut counted = state.clone();
            counted.cycle += 1;
            fault(&counted, error, Some(instruction))
        }
    }
}

/// Performs one phase transition.
///
/// `fetched` is the instruction remembered between the fetch and execute phases. The input
/// state is never modified. A halted machine stays halted. Faults halt the machine and are
/// reported in [Step::fault] and the explanation.
pub fn step(
    state: &MachineState,
    fetched: Option<&Instruction>,
    phase: Phase,
    program: &Program,
) -> Step {
    if state.halted {
        return Step {
            state: state.clone(),
            explanation: "the processor is halted".to_string(),
            phase: Phase::Fetch,
            fetched: None,
            fault: None,
        };
    }

    match (phase, fetched) {
        (Phase::Fetch, _) => fetch(state, program),
        (Phase::Decode, Some(instruction)) => decode(state, instruction),
        (Phase::Execute, Some(instruction)) => execute(state, instruction, program),
        (_, None) => fault(state, RuntimeError::NothingFetched, None),
    }
}

/// Lists the observable effects of a transition from `old` to `new`.
fn changes(
    old: &MachineState,
    new: &MachineState,
    executed: Option<&Instruction>,
    explanation: &str,
) -> Vec<Event> {
    let mut events = Vec::new();

    for reg in Register::ALL.iter().copied() {
        if old.registers[reg] != new.registers[reg] {
            events.push(Event::RegisterChange {
                register: reg,
                value: new.registers[reg],
            });
        }
    }

    for (address, (before, after)) in old.memory.iter().zip(&new.memory).enumerate() {
        if before != after {
            events.push(Event::MemoryChange {
                address,
                value: *after,
            });
        }
    }

    if let Some(instruction) = executed {
        if instruction.opcode.is_jump() && !new.halted && new.pc != old.pc + 1 {
            events.push(Event::Jump {
                from: old.pc,
                to: new.pc,
            });
        }
    }

    if new.halted && !old.halted {
        events.push(Event::Halted {
            reason: explanation.to_string(),
        });
    }

    events
}

/// Why [Emulator::run] or [Emulator::run_with] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Halted,

    /// [MachineConfig::max_cycles] instructions were executed without halting.
    CycleLimit,

    /// The callback of [Emulator::run_with] asked to stop.
    Paused,
}

/// Runs a program phase by phase and records its history.
#[derive(Debug)]
pub struct Emulator {
    program: Program,
    config: MachineConfig,
    state: MachineState,
    phase: Phase,
    fetched: Option<Instruction>,
    history: History,
    events: EventDispatcher,
    logger: Logger,
}

impl Emulator {
    pub fn new(program: Program) -> Emulator {
        Emulator::with_config(program, MachineConfig::default())
    }

    pub fn with_config(program: Program, config: MachineConfig) -> Emulator {
        Emulator::with_logger(program, config, None)
    }

    pub fn with_logger<L>(program: Program, config: MachineConfig, logger: L) -> Emulator
    where
        L: Into<Option<Logger>>,
    {
        let logger = logger
            .into()
            .unwrap_or(Logger::root(Discard, o!()))
            .new(o!("stage" => "emulation"));

        Emulator {
            state: MachineState::new(&program, &config),
            history: History::new(config.history_limit),
            phase: Phase::Fetch,
            fetched: None,
            events: EventDispatcher::default(),
            program,
            config,
            logger,
        }
    }

    /// Registers a listener that is notified of the effects of every step.
    pub fn add_listener<L: EventListener + 'static>(&mut self, listener: L) {
        self.events.add_listener(listener);
    }

    pub fn state(&self) -> &MachineState {
        &self.state
    }

    /// The phase the next call to [step](Emulator::step) will run.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn fetched(&self) -> Option<&Instruction> {
        self.fetched.as_ref()
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn is_halted(&self) -> bool {
        self.state.halted
    }

    /// Runs a single phase.
    pub fn step(&mut self) -> Step {
        let executed = match self.phase {
            Phase::Execute if !self.state.halted => self.fetched.clone(),
            _ => None,
        };

        let next = step(&self.state, self.fetched.as_ref(), self.phase, &self.program);

        trace!(self.logger, "step";
            "phase" => %self.phase,
            "pc" => self.state.pc,
            "explanation" => &next.explanation);

        if let Some(fault) = &next.fault {
            debug!(self.logger, "fault"; "pc" => self.state.pc, "error" => %fault);
        }

        let events = changes(&self.state, &next.state, executed.as_ref(), &next.explanation);

        if let Some(instruction) = executed {
            self.history.push(HistoryEntry {
                cycle: next.state.cycle,
                instruction,
                explanation: next.explanation.clone(),
                state: next.state.clone(),
            });
        }

        if self.events.has_listeners() {
            self.events.dispatch(&events);
        }

        if next.state.halted && !self.state.halted {
            debug!(self.logger, "halted"; "cycle" => next.state.cycle, "pc" => next.state.pc);
        }

        self.state = next.state.clone();
        self.phase = next.phase;
        self.fetched = next.fetched.clone();

        next
    }

    /// Runs the program until it halts or until [MachineConfig::max_cycles] instructions have
    /// been executed.
    pub fn run(&mut self) -> RunOutcome {
        self.run_with(|_| true)
    }

    /// Like [run](Emulator::run), but passes every step to `callback`. Returning `false` from
    /// the callback pauses execution. Calling `run_with` again resumes it.
    pub fn run_with<F>(&mut self, mut callback: F) -> RunOutcome
    where
        F: FnMut(&Step) -> bool,
    {
        let limit = self.state.cycle.saturating_add(self.config.max_cycles);

        while !self.state.halted {
            if self.state.cycle >= limit {
                debug!(self.logger, "cycle limit reached"; "cycle" => self.state.cycle);
                return RunOutcome::CycleLimit;
            }

            let step = self.step();

            if !callback(&step) && !self.state.halted {
                return RunOutcome::Paused;
            }
        }

        RunOutcome::Halted
    }

    /// Restores the initial state and clears the history.
    pub fn reset(&mut self) {
        self.state = MachineState::new(&self.program, &self.config);
        self.phase = Phase::Fetch;
        self.fetched = None;
        self.history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::cell::RefCell;
    use std::rc::Rc;

    macro_rules! assert_register {
        ($state:expr, $register:expr, $value:expr) => {
            assert_eq!(
                $state.registers[$register], $value,
                "Register {} != {}", $register, $value
            );
        };
    }

    fn emulator(source: &str) -> Emulator {
        Emulator::new(Program::parse(source).expect("could not parse program"))
    }

    #[test]
    fn test_add_and_store() {
        let mut emulator = emulator("LOAD A,#5\nLOAD B,#7\nADD A,B\nSTORE A,[0x00]\nHLT");

        assert_eq!(emulator.run(), RunOutcome::Halted);

        let state = emulator.state();
        assert_register!(state, Register::A, 12);
        assert_register!(state, Register::B, 7);
        assert_eq!(state.memory[0], 12);
        assert!(state.halted);
        assert_eq!(emulator.history().len(), 5);
    }

    #[test]
    fn test_phase_order() {
        let mut emulator = emulator("INC A\nHLT");
        let mut phases = Vec::new();

        while !emulator.is_halted() {
            phases.push(emulator.phase());
            emulator.step();
        }

        use Phase::*;
        assert_eq!(phases, vec![Fetch, Decode, Execute, Fetch, Decode, Execute]);
    }

    #[test]
    fn test_step_does_not_modify_input() {
        let program = Program::parse("LOAD A, #3\nSTORE A, [1]\nHLT").unwrap();
        let initial = MachineState::new(&program, &MachineConfig::default());

        let fetched = step(&initial, None, Phase::Fetch, &program);
        let decoded = step(&fetched.state, fetched.fetched.as_ref(), fetched.phase, &program);
        let executed = step(&decoded.state, decoded.fetched.as_ref(), decoded.phase, &program);

        assert_eq!(initial, MachineState::new(&program, &MachineConfig::default()));
        assert_eq!(decoded.state, initial);
        assert_register!(executed.state, Register::A, 3);
        assert_eq!(executed.phase, Phase::Fetch);
        assert_eq!(executed.fetched, None);
        assert_eq!(executed.state.pc, 1);
    }

    #[test]
    fn test_operand_value() {
        let program = Program::parse("INC A\nskip: DEC A\nJMP skip\nend:").unwrap();
        let mut state = MachineState::new(&program, &MachineConfig::default());
        state.registers[Register::C] = -4;
        state.memory[0x10] = 9;

        let value = |operand: Operand| operand_value(&state, &operand, &program);

        assert_eq!(value(Operand::Register(Register::C)), Ok(-4));
        assert_eq!(value(Operand::Immediate(200)), Ok(200));
        assert_eq!(value(Operand::Memory(0x10)), Ok(9));
        assert_eq!(value(Operand::Label("SKIP".into())), Ok(1));
        assert_eq!(value(Operand::Label("end".into())), Ok(3));
        assert_eq!(value(Operand::Label("NOWHERE".into())), Ok(0));
        assert_eq!(
            value(Operand::Memory(256)),
            Err(RuntimeError::AddressOutOfRange { address: 256 })
        );
    }

    #[test]
    fn test_decode_explanation() {
        let program = Program::parse("loop: LOAD A, #7\nSTORE B, [0x02]\nJNZ loop").unwrap();
        let state = MachineState::new(&program, &MachineConfig::default());

        let describe = |index: usize| {
            step(&state, Some(&program.instructions[index]), Phase::Decode, &program).explanation
        };

        assert_eq!(
            describe(0),
            "LOAD: load a value into a register; operands: register A, value 7"
        );
        assert!(describe(1).ends_with("register B, memory cell [02h]"));
        assert!(describe(2).ends_with("label LOOP"));
    }

    #[test]
    fn test_step_conservation() {
        let source = r#"
                LOAD  A, #3
            top:
                DEC   A
                JZ    done
                JMP   top
            done:
                CMP   A, B
                JNZ   top
                HLT
        "#;

        let program = Program::parse(source).unwrap();
        let mut emulator = Emulator::new(program.clone());

        while !emulator.is_halted() {
            let before = emulator.state().clone();
            let phase = emulator.phase();
            let fetched = emulator.fetched().cloned();
            let after = emulator.step().state;

            if phase != Phase::Execute {
                assert_eq!(after.pc, before.pc);
                continue;
            }

            let instruction = fetched.expect("nothing fetched before execute");

            match (instruction.opcode, instruction.jump_target()) {
                (OpCode::Halt, _) => assert_eq!(after.pc, before.pc),
                (_, Some(label)) => {
                    let target = program.label_index(label).unwrap();
                    assert!(after.pc == before.pc + 1 || after.pc == target);
                }
                _ => assert_eq!(after.pc, before.pc + 1),
            }
        }

        assert_register!(emulator.state(), Register::A, 0);
    }

    #[test]
    fn test_flags() {
        let cases = vec![
            ("LOAD A, #0", true, false),
            ("LOAD A, #-2", false, true),
            ("LOAD A, #4\nLOAD B, #4\nSUB A, B", true, false),
            ("LOAD A, #4\nLOAD B, #9\nCMP A, B", false, true),
            ("LOAD A, #9\nLOAD B, #4\nCMP A, B", false, false),
            ("DEC C", false, true),
            ("LOAD D, #-1\nINC D", true, false),
            ("LOAD A, #-3\nLOAD B, #3\nADD A, B", true, false),
        ];

        for (source, zero, negative) in cases {
            let mut emulator = emulator(&format!("{}\nHLT", source));
            emulator.run();

            let flags = emulator.state().flags;
            assert_eq!((flags.zero, flags.negative), (zero, negative), "{}", source);
        }
    }

    #[test]
    fn test_compare_discards_result() {
        let mut emulator = emulator("LOAD A, #9\nLOAD B, #4\nCMP A, B\nHLT");
        emulator.run();

        assert_register!(emulator.state(), Register::A, 9);
        assert_register!(emulator.state(), Register::B, 4);
    }

    #[test]
    fn test_end_of_program_halts() {
        let mut emulator = emulator("INC A\nINC A");

        assert_eq!(emulator.run(), RunOutcome::Halted);
        assert_register!(emulator.state(), Register::A, 2);
        assert!(emulator
            .history()
            .last()
            .unwrap()
            .explanation
            .ends_with("end of program reached"));
    }

    #[test]
    fn test_empty_program() {
        let mut emulator = emulator("; nothing here");

        assert!(emulator.is_halted());
        assert_eq!(emulator.run(), RunOutcome::Halted);
        assert!(emulator.history().is_empty());
    }

    #[test]
    fn test_faults_halt() {
        let cases = vec![
            ("LOAD A, [300]", RuntimeError::AddressOutOfRange { address: 300 }),
            ("STORE A, [-1]", RuntimeError::AddressOutOfRange { address: -1 }),
            ("JMP nowhere", RuntimeError::UndefinedLabel("NOWHERE".into())),
            (
                "LOAD A, #2147483647\nINC A",
                RuntimeError::Overflow {
                    opcode: OpCode::Increment,
                },
            ),
        ];

        for (source, expected) in cases {
            let mut emulator = emulator(&format!("{}\nHLT", source));
            let mut faults = Vec::new();

            let outcome = emulator.run_with(|step| {
                faults.extend(step.fault.clone());
                true
            });

            assert_eq!(outcome, RunOutcome::Halted);
            assert_eq!(faults, vec![expected], "{}", source);
            assert!(emulator.history().last().unwrap().explanation.ends_with("halting"));
        }
    }

    #[test]
    fn test_untaken_jump_to_undefined_label() {
        let mut emulator = emulator("JZ nowhere\nHLT");

        assert_eq!(emulator.run(), RunOutcome::Halted);
        assert_eq!(emulator.history().len(), 2);
    }

    #[test]
    fn test_malformed_instruction() {
        let program = Program {
            instructions: vec![Instruction {
                opcode: OpCode::Add,
                operands: vec![Operand::Register(Register::A)],
                line: 4,
                source: "ADD A".into(),
            }],
            labels: Default::default(),
        };

        let state = MachineState::new(&program, &MachineConfig::default());
        let result = step(&state, program.instructions.first(), Phase::Execute, &program);

        assert!(result.state.halted);
        assert_eq!(
            result.fault,
            Some(RuntimeError::MalformedInstruction {
                line: 4,
                opcode: OpCode::Add
            })
        );
    }

    #[test]
    fn test_nothing_fetched() {
        let program = Program::parse("HLT").unwrap();
        let state = MachineState::new(&program, &MachineConfig::default());

        let result = step(&state, None, Phase::Execute, &program);

        assert!(result.state.halted);
        assert_eq!(result.fault, Some(RuntimeError::NothingFetched));
    }

    #[test]
    fn test_halted_stays_halted() {
        let program = Program::parse("HLT").unwrap();
        let mut state = MachineState::new(&program, &MachineConfig::default());
        state.halted = true;

        let result = step(&state, None, Phase::Fetch, &program);

        assert_eq!(result.state, state);
        assert_eq!(result.phase, Phase::Fetch);
    }

    #[test]
    fn test_cycle_limit() {
        let config = MachineConfig {
            max_cycles: 100,
            history_limit: Some(10),
            ..MachineConfig::default()
        };

        let program = Program::parse("loop: JMP loop").unwrap();
        let mut emulator = Emulator::with_config(program, config);

        assert_eq!(emulator.run(), RunOutcome::CycleLimit);
        assert_eq!(emulator.state().cycle, 100);
        assert_eq!(emulator.history().len(), 10);
        assert_eq!(emulator.history().iter().next().map(|e| e.cycle), Some(91));
    }

    #[test]
    fn test_pause_and_resume() {
        let mut emulator = emulator("INC A\nINC A\nHLT");
        let mut steps = 0;

        let outcome = emulator.run_with(|_| {
            steps += 1;
            steps < 3
        });

        assert_eq!(outcome, RunOutcome::Paused);
        assert_eq!(emulator.state().cycle, 1);
        assert_eq!(emulator.phase(), Phase::Fetch);

        assert_eq!(emulator.run(), RunOutcome::Halted);
        assert_register!(emulator.state(), Register::A, 2);
    }

    #[test]
    fn test_reset() {
        let mut emulator = emulator("LOAD A, #1\nSTORE A, [5]\nHLT");
        emulator.run();
        emulator.reset();

        assert_eq!(
            emulator.state(),
            &MachineState::new(emulator.program(), &MachineConfig::default())
        );
        assert!(emulator.history().is_empty());
        assert_eq!(emulator.fetched(), None);

        assert_eq!(emulator.run(), RunOutcome::Halted);
        assert_eq!(emulator.state().memory[5], 1);
    }

    #[test]
    fn test_events() {
        let mut emulator = emulator("LOAD A, #2\nloop: DEC A\nSTORE A, [3]\nJNZ loop\nHLT");
        let events = Rc::new(RefCell::new(Vec::new()));

        let sink = events.clone();
        emulator.add_listener(move |event: &Event| sink.borrow_mut().push(event.clone()));
        emulator.run();

        let events = events.borrow();

        assert_eq!(
            &events[..6],
            &[
                Event::RegisterChange { register: Register::A, value: 2 },
                Event::RegisterChange { register: Register::A, value: 1 },
                Event::MemoryChange { address: 3, value: 1 },
                Event::Jump { from: 3, to: 1 },
                Event::RegisterChange { register: Register::A, value: 0 },
                Event::MemoryChange { address: 3, value: 0 },
            ][..]
        );

        assert!(matches!(events.last(), Some(Event::Halted { .. })));
        assert_eq!(events.iter().filter(|e| matches!(e, Event::Jump { .. })).count(), 1);
    }

    #[test]
    fn test_suggested_delay() {
        assert_eq!(Phase::Fetch.suggested_delay(), Duration::from_millis(350));
        assert_eq!(Phase::Decode.suggested_delay(), Duration::from_millis(350));
        assert_eq!(Phase::Execute.suggested_delay(), Duration::from_millis(150));
    }

    #[test]
    fn test_with_logger() {
        use slog::Drain;

        let decorator = slog_term::PlainDecorator::new(std::io::sink());
        let drain = slog_term::FullFormat::new(decorator).build().fuse();
        let drain = slog_async::Async::new(drain).build().fuse();
        let logger = Logger::root(drain, o!());

        let program = Program::parse("LOAD B, #1\nHLT").unwrap();
        let mut emulator = Emulator::with_logger(program, MachineConfig::default(), logger);

        assert_eq!(emulator.run(), RunOutcome::Halted);
        assert_register!(emulator.state(), Register::B, 1);
    }
}
