use crate::ir::Instruction;
use crate::parser::{ParseError, Parser, Statement};
use crate::symbols::{ResolveError, SymbolTable};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

/// A parsed and linked program: executable instructions only, every jump target patched
/// with its address, and the source line of each instruction for diagnostics.
#[derive(Debug, Clone)]
pub struct Program {
    pub(crate) instructions: Vec<Instruction>,
    pub(crate) lines: Vec<usize>,
    symbols: SymbolTable,
}

impl Program {
    /// Parses and links `source`. Nothing is executed, so every error reported here happens
    /// before any output is produced.
    pub fn load(source: &str) -> Result<Program, LoadError> {
        let statements = Parser::new(source).collect::<Result<Vec<_>, _>>()?;
        let program = Program::link(statements)?;
        debug!(
            instructions = program.len(),
            labels = program.symbols.len(),
            "program loaded"
        );

        Ok(program)
    }

    /// Strips label definitions into the symbol table and resolves every jump target.
    pub fn link(statements: Vec<Statement>) -> Result<Program, ResolveError> {
        let symbols = SymbolTable::build(&statements)?;
        let mut instructions = Vec::with_capacity(statements.len());
        let mut lines = Vec::with_capacity(statements.len());
        let mut end: Option<usize> = None;

        for statement in statements {
            let (mut instruction, line) = match statement {
                Statement::Mark { .. } => continue,
                Statement::Instruction { instruction, line } => (instruction, line),
            };

            if let Some(label) = instruction.target_mut() {
                label.index = match symbols.get(&label.value) {
                    Some(index) => index,
                    None => {
                        return Err(ResolveError::UndefinedLabel {
                            label: label.value.clone(),
                            line,
                        })
                    }
                };
            }
            if instruction == Instruction::End {
                if let Some(first) = end {
                    return Err(ResolveError::MultipleTerminators { line, first });
                }
                end = Some(line);
            }

            instructions.push(instruction);
            lines.push(line);
        }

        if end.is_none() {
            return Err(ResolveError::MissingTerminator);
        }

        Ok(Program {
            instructions,
            lines,
            symbols,
        })
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    /// Source line of the instruction at `address`
    pub fn line(&self, address: usize) -> Option<usize> {
        self.lines.get(address).copied()
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}
