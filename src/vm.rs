use crate::ir::{Instruction, MessagePart, Operand};
use crate::parser::{read_source, ParseError};
use crate::program::{LoadError, Program};
use crate::symbols::ResolveError;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt::{self, Display};
use std::rc::Rc;
use thiserror::Error;
use tracing::{debug, info, trace};

/// Configuration options for the virtual machine
#[derive(Debug, Clone)]
pub struct VmConfig {
    source: String,
    raw: bool,
    debug: bool,
}

impl VmConfig {
    /// Creates a new config with the given arguments
    ///
    /// - `source` the program text
    /// - `raw` log the linked instructions before running
    /// - `debug` log the register store and call stack before every executed instruction
    pub fn new(source: &str, raw: bool, debug: bool) -> VmConfig {
        VmConfig {
            source: source.to_string(),
            raw,
            debug,
        }
    }

    /// Returns a default config for the given program text
    pub fn from_source(source: &str) -> VmConfig {
        VmConfig::new(source, false, false)
    }

    /// Returns a config that logs machine state on every step
    pub fn debug(source: &str) -> VmConfig {
        VmConfig::new(source, false, true)
    }

    /// Returns a config that only logs the linked instructions
    pub fn raw(source: &str) -> VmConfig {
        VmConfig::new(source, true, false)
    }

    /// Returns a default config for the program stored in `file_name`
    pub fn from_file(file_name: &str) -> Result<VmConfig, ParseError> {
        Ok(VmConfig::from_source(&read_source(file_name)?))
    }

    pub fn with_raw(mut self, raw: bool) -> VmConfig {
        self.raw = raw;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> VmConfig {
        self.debug = debug;
        self
    }
}

/// Faults that abort a run
#[derive(Debug, Error)]
pub enum RuntimeErrorKind {
    #[error("register `{0}` is read before it is written")]
    UnsetRegister(Rc<str>),
    #[error("`ret` with an empty call stack")]
    StackUnderflow,
    #[error("conditional jump is not directly preceded by `cmp`")]
    MissingComparison,
    #[error("division by zero")]
    DivisionByZero,
    #[error("integer overflow")]
    Overflow,
}

impl RuntimeErrorKind {
    fn throw<T>(self, line: usize, instruction: &Instruction) -> Result<T, VmError> {
        Err(VmError::Runtime {
            line,
            instruction: instruction.clone(),
            kind: self,
        })
    }
}

#[derive(Debug, Error)]
pub enum VmError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error("line {line}: {kind}, failed executing `{instruction}`")]
    Runtime {
        line: usize,
        instruction: Instruction,
        kind: RuntimeErrorKind,
    },
}

impl From<LoadError> for VmError {
    fn from(err: LoadError) -> VmError {
        match err {
            LoadError::Parse(err) => VmError::Parse(err),
            LoadError::Resolve(err) => VmError::Resolve(err),
        }
    }
}

/// Result of a finished run. A program that ends while subroutine calls are still open
/// yields [`Outcome::Failure`] instead of its partial output.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Outcome {
    Output(String),
    Failure,
}

impl Outcome {
    /// Integer form of [`Outcome::Failure`]
    pub const FAILURE_SENTINEL: i64 = -1;

    pub fn output(&self) -> Option<&str> {
        match self {
            Outcome::Output(text) => Some(text.as_str()),
            Outcome::Failure => None,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failure)
    }
}

impl Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Output(text) => write!(f, "{}", text),
            Outcome::Failure => write!(f, "{}", Outcome::FAILURE_SENTINEL),
        }
    }
}

#[derive(Debug, Default, Clone)]
struct Registers {
    values: HashMap<Rc<str>, i64>,
}

impl Registers {
    fn get(&self, name: &Rc<str>) -> Result<i64, RuntimeErrorKind> {
        match self.values.get(name) {
            Some(value) => Ok(*value),
            None => Err(RuntimeErrorKind::UnsetRegister(name.clone())),
        }
    }

    fn set(&mut self, name: &Rc<str>, value: i64) {
        self.values.insert(name.clone(), value);
    }

    fn value(&self, operand: &Operand) -> Result<i64, RuntimeErrorKind> {
        match operand {
            Operand::Register(name) => self.get(name),
            Operand::Literal(value) => Ok(*value),
        }
    }
}

fn checked(value: Option<i64>) -> Result<i64, RuntimeErrorKind> {
    value.ok_or(RuntimeErrorKind::Overflow)
}

/// Integer division rounding toward negative infinity
fn floor_div(lhs: i64, rhs: i64) -> Result<i64, RuntimeErrorKind> {
    if rhs == 0 {
        return Err(RuntimeErrorKind::DivisionByZero);
    }
    let quotient = checked(lhs.checked_div(rhs))?;
    if lhs % rhs != 0 && (lhs < 0) != (rhs < 0) {
        return Ok(quotient - 1);
    }

    Ok(quotient)
}

/// The root component for the virtual machine. Every instance owns its complete execution
/// state, so independent runs never share anything.
#[derive(Debug)]
pub struct Vm {
    config: VmConfig,
    program: Program,
    registers: Registers,
    call_stack: Vec<usize>,
    comparison: Option<Ordering>,
    output: String,
    instruction_pointer: usize,
}

impl Vm {
    /// Parses and links the configured source and creates a machine ready to run it
    pub fn new(config: VmConfig) -> Result<Vm, VmError> {
        let program = Program::load(&config.source)?;
        if config.raw {
            for (address, instruction) in program.instructions().iter().enumerate() {
                info!(address, line = ?program.line(address), "{}", instruction);
            }
            for (label, address) in program.symbols().entries() {
                info!(label, address, "symbol");
            }
        }

        Ok(Vm::with_program(config, program))
    }

    /// Creates a machine for an already linked program
    pub fn from_program(program: Program) -> Vm {
        Vm::with_program(VmConfig::from_source(""), program)
    }

    fn with_program(config: VmConfig, program: Program) -> Vm {
        Vm {
            config,
            program,
            registers: Registers::default(),
            call_stack: vec![],
            comparison: None,
            output: String::new(),
            instruction_pointer: 0,
        }
    }

    /// Returns the address of the next instruction to be executed in a `Some` variant. None if
    /// the program has reached its end.
    pub fn next_instruction(&self) -> Option<usize> {
        if self.instruction_pointer < self.program.len() {
            Some(self.instruction_pointer)
        } else {
            None
        }
    }

    /// Executes all remaining instructions and reports the outcome
    pub fn run(&mut self) -> Result<Outcome, VmError> {
        while let Some(ip) = self.next_instruction() {
            self.exec(ip)?;
        }

        Ok(self.outcome())
    }

    /// Executes the next instruction. Returns `false` once the program has terminated.
    pub fn step(&mut self) -> Result<bool, VmError> {
        match self.next_instruction() {
            Some(ip) => {
                self.exec(ip)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// The current result: the accumulated output, or [`Outcome::Failure`] while calls are
    /// still open.
    pub fn outcome(&self) -> Outcome {
        if !self.call_stack.is_empty() {
            debug!(depth = self.call_stack.len(), "terminated with open calls");
            return Outcome::Failure;
        }

        Outcome::Output(self.output.clone())
    }

    /// Resets the machine state without re-parsing the program
    pub fn reset(&mut self) {
        self.registers.values.clear();
        self.call_stack.clear();
        self.comparison = None;
        self.output.clear();
        self.instruction_pointer = 0;
    }

    pub fn register(&self, name: &str) -> Option<i64> {
        self.registers.values.get(name).copied()
    }

    pub fn call_depth(&self) -> usize {
        self.call_stack.len()
    }

    pub fn instruction_pointer(&self) -> usize {
        self.instruction_pointer
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Executes a single instruction
    ///
    /// `ip` - the address of the instruction to execute
    pub fn exec(&mut self, ip: usize) -> Result<(), VmError> {
        if self.config.debug {
            debug!(
                ip,
                registers = ?self.registers.values,
                call_stack = ?self.call_stack,
                comparison = ?self.comparison,
                "machine state"
            );
        }
        trace!(ip, instruction = %self.program.instructions[ip], "exec");

        match self.dispatch(ip) {
            Ok(next) => {
                self.instruction_pointer = next;
                Ok(())
            }
            Err(kind) => kind.throw(self.program.lines[ip], &self.program.instructions[ip]),
        }
    }

    /// Applies the instruction at `ip` and returns the address to continue at
    fn dispatch(&mut self, ip: usize) -> Result<usize, RuntimeErrorKind> {
        // only the step right after a `cmp` may observe its result
        let comparison = self.comparison.take();
        let registers = &mut self.registers;
        let next = ip + 1;

        match &self.program.instructions[ip] {
            Instruction::Move(dst, src) => {
                let value = registers.value(src)?;
                registers.set(dst, value);
            }
            Instruction::Increment(dst) => {
                let value = checked(registers.get(dst)?.checked_add(1))?;
                registers.set(dst, value);
            }
            Instruction::Decrement(dst) => {
                let value = checked(registers.get(dst)?.checked_sub(1))?;
                registers.set(dst, value);
            }
            Instruction::Add(dst, src) => {
                let value = checked(registers.get(dst)?.checked_add(registers.value(src)?))?;
                registers.set(dst, value);
            }
            Instruction::Subtract(dst, src) => {
                let value = checked(registers.get(dst)?.checked_sub(registers.value(src)?))?;
                registers.set(dst, value);
            }
            Instruction::Multiply(dst, src) => {
                let value = checked(registers.get(dst)?.checked_mul(registers.value(src)?))?;
                registers.set(dst, value);
            }
            Instruction::Divide(dst, src) => {
                let value = floor_div(registers.get(dst)?, registers.value(src)?)?;
                registers.set(dst, value);
            }
            Instruction::Compare(left, right) => {
                let ordering = registers.value(left)?.cmp(&registers.value(right)?);
                self.comparison = Some(ordering);
            }
            Instruction::Branch(condition, label) => match comparison {
                Some(ordering) if condition.holds(ordering) => return Ok(label.index),
                Some(_) => (),
                None => return Err(RuntimeErrorKind::MissingComparison),
            },
            Instruction::Jump(label) => return Ok(label.index),
            Instruction::Call(label) => {
                self.call_stack.push(next);
                return Ok(label.index);
            }
            Instruction::Return => match self.call_stack.pop() {
                Some(address) => return Ok(address),
                None => return Err(RuntimeErrorKind::StackUnderflow),
            },
            Instruction::Message(parts) => {
                for part in parts {
                    match part {
                        MessagePart::Register(name) => {
                            let value = registers.get(name)?;
                            self.output.push_str(&value.to_string());
                        }
                        MessagePart::Text(text) => self.output.push_str(text),
                    }
                }
            }
            Instruction::End => return Ok(self.program.len()),
        }

        Ok(next)
    }
}
