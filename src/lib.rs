//! A small interpreter for a toy register assembly language.
//!
//! Program text goes through three stages:
//!
//! 1. [`parser`] turns lines into [`parser::Statement`]s (label definitions and [`ir::Instruction`]s)
//! 2. [`program`] strips the labels into a [`symbols::SymbolTable`] and patches every jump target
//! 3. [`vm`] executes the linked instructions and reports an [`Outcome`]
//!
//! ```
//! # use asmint::{interpret, Outcome};
//! let source = "
//! mov  a, 5
//! inc  a
//! call function
//! msg  '(5+1)/2 = ', a    ; output message
//! end
//!
//! function:
//!     div  a, 2
//!     ret
//! ";
//!
//! assert_eq!(interpret(source).unwrap(), Outcome::Output("(5+1)/2 = 3".to_string()));
//! ```
//!
//! A program that ends while a `call` is still waiting for its `ret` yields
//! [`Outcome::Failure`], whose integer form is [`Outcome::FAILURE_SENTINEL`]. Every other fault
//! is a [`VmError`].

pub mod ir;
pub mod parser;
pub mod program;
pub mod symbols;
pub mod vm;

pub use ir::Instruction;
pub use parser::{ParseError, Parser};
pub use program::Program;
pub use vm::{Outcome, Vm, VmConfig, VmError};

/// Parses, links and runs `source` on a fresh machine
pub fn interpret(source: &str) -> Result<Outcome, VmError> {
    Vm::new(VmConfig::from_source(source))?.run()
}
