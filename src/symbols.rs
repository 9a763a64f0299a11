use crate::parser::Statement;
use std::collections::HashMap;
use std::rc::Rc;
use thiserror::Error;

/// Errors detected while linking a parsed program, before anything runs
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("line {line}: label `{label}` is already defined on line {first}")]
    DuplicateLabel {
        label: Rc<str>,
        line: usize,
        first: usize,
    },
    #[error("line {line}: undefined label `{label}`")]
    UndefinedLabel { label: Rc<str>, line: usize },
    #[error("program has no `end` instruction")]
    MissingTerminator,
    #[error("line {line}: second `end` instruction, the first one is on line {first}")]
    MultipleTerminators { line: usize, first: usize },
}

/// Maps label names to the address of the instruction that follows their definition.
/// Kept apart from the register store, so a label and a register may share a name.
#[derive(Debug, Default, Clone)]
pub struct SymbolTable {
    labels: HashMap<Rc<str>, Symbol>,
}

#[derive(Debug, Clone, Copy)]
struct Symbol {
    address: usize,
    line: usize,
}

impl SymbolTable {
    /// Scans the statements once. Addresses count executable instructions only, so a label
    /// at the very end of a program resolves to the program length.
    pub fn build(statements: &[Statement]) -> Result<SymbolTable, ResolveError> {
        let mut labels: HashMap<Rc<str>, Symbol> = HashMap::new();
        let mut address = 0;

        for statement in statements {
            match statement {
                Statement::Mark { label, line } => {
                    if let Some(first) = labels.get(label) {
                        return Err(ResolveError::DuplicateLabel {
                            label: label.clone(),
                            line: *line,
                            first: first.line,
                        });
                    }
                    labels.insert(
                        label.clone(),
                        Symbol {
                            address,
                            line: *line,
                        },
                    );
                }
                Statement::Instruction { .. } => address += 1,
            }
        }

        Ok(SymbolTable { labels })
    }

    pub fn get(&self, label: &str) -> Option<usize> {
        self.labels.get(label).map(|symbol| symbol.address)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Labels and their addresses, ordered by address
    pub fn entries(&self) -> Vec<(&str, usize)> {
        let mut entries: Vec<_> = self
            .labels
            .iter()
            .map(|(label, symbol)| (label.as_ref(), symbol.address))
            .collect();
        entries.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)));
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::{ResolveError, SymbolTable};
    use crate::parser::{ParseError, Parser, Statement};

    fn statements(source: &str) -> Result<Vec<Statement>, ParseError> {
        Parser::new(source).collect()
    }

    #[test]
    fn labels_point_past_their_definition() -> Result<(), Box<dyn std::error::Error>> {
        let source = "call a\nend\na:\nb:\n  inc x\n  ret\nc:";
        let table = SymbolTable::build(&statements(source)?)?;

        assert_eq!(table.get("a"), Some(2));
        assert_eq!(table.get("b"), Some(2));
        assert_eq!(table.get("c"), Some(4));
        assert_eq!(table.get("x"), None);
        assert_eq!(table.entries(), vec![("a", 2), ("b", 2), ("c", 4)]);

        Ok(())
    }

    #[test]
    fn duplicate_label() -> Result<(), ParseError> {
        let result = SymbolTable::build(&statements("f:\nret\nend\n\nf:\nret")?);

        assert!(matches!(
            result,
            Err(ResolveError::DuplicateLabel { line: 5, first: 1, .. })
        ));

        Ok(())
    }
}
