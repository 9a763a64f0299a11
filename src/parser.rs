use crate::ir::{Condition, Instruction, Label, MessagePart, Operand};
use memmap::Mmap;
use std::fs::File;
use std::io;
use std::iter::Enumerate;
use std::rc::Rc;
use std::str::Lines;
use thiserror::Error;

pub const COMMENT: char = ';';
pub const QUOTE: char = '\'';
pub const LABEL_SUFFIX: char = ':';

/// What went wrong on a single source line
#[derive(Debug, Error)]
pub enum SyntaxErrorKind {
    #[error("unknown instruction `{0}`")]
    UnknownOpcode(String),
    #[error("`{opcode}` takes {expected} operand(s), got {found}")]
    ArityMismatch {
        opcode: String,
        expected: usize,
        found: usize,
    },
    #[error("expected a register name, got `{0}`")]
    InvalidRegister(String),
    #[error("expected a register name or an integer, got `{0}`")]
    InvalidOperand(String),
    #[error("invalid label name `{0}`")]
    InvalidLabel(String),
    #[error("unexpected `{0}` after label definition")]
    TrailingTokens(String),
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("`msg` needs at least one argument")]
    EmptyMessage,
}

impl SyntaxErrorKind {
    fn throw<T>(self, line: usize) -> Result<T, ParseError> {
        Err(ParseError::Syntax { line, kind: self })
    }
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to open {path}: {source}")]
    FileOpen { path: String, source: io::Error },
    #[error("failed to memory map {path}: {source}")]
    MemoryMap { path: String, source: io::Error },
    #[error("{path} is not valid utf-8")]
    InvalidUtf8 { path: String },
    #[error("line {line}: {kind}")]
    Syntax { line: usize, kind: SyntaxErrorKind },
}

/// One meaningful source line: either a label definition or an executable instruction.
/// `line` is 1-based.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Statement {
    Mark { label: Rc<str>, line: usize },
    Instruction { instruction: Instruction, line: usize },
}

impl Statement {
    pub fn line(&self) -> usize {
        match self {
            Statement::Mark { line, .. } | Statement::Instruction { line, .. } => *line,
        }
    }
}

/// Reads a program from disk
pub fn read_source(file_name: &str) -> Result<String, ParseError> {
    let file = File::open(file_name).map_err(|err| ParseError::FileOpen {
        path: file_name.to_string(),
        source: err,
    })?;
    let len = file
        .metadata()
        .map_err(|err| ParseError::FileOpen {
            path: file_name.to_string(),
            source: err,
        })?
        .len();
    // zero-length mappings are rejected by the OS
    if len == 0 {
        return Ok(String::new());
    }
    let source = unsafe { Mmap::map(&file) }.map_err(|err| ParseError::MemoryMap {
        path: file_name.to_string(),
        source: err,
    })?;

    match std::str::from_utf8(&source) {
        Ok(text) => Ok(text.to_string()),
        Err(_) => Err(ParseError::InvalidUtf8 {
            path: file_name.to_string(),
        }),
    }
}

/// Turns program text into [`Statement`]s, one per non-empty, non-comment line.
///
/// ```
/// # use asmint::parser::{Parser, Statement};
/// # use asmint::ir::Instruction;
/// let statements: Result<Vec<_>, _> = Parser::new("done:\n  end ; stop").collect();
/// let statements = statements.unwrap();
///
/// assert_eq!(statements[0], Statement::Mark { label: "done".into(), line: 1 });
/// assert_eq!(statements[1], Statement::Instruction { instruction: Instruction::End, line: 2 });
/// ```
#[derive(Debug)]
pub struct Parser<'a> {
    lines: Enumerate<Lines<'a>>,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str) -> Parser<'a> {
        Parser {
            lines: source.lines().enumerate(),
        }
    }

    fn statement(&mut self) -> Option<Result<Statement, ParseError>> {
        for (index, raw) in self.lines.by_ref() {
            let code = strip_comment(raw).trim();
            if code.is_empty() {
                continue;
            }

            return Some(parse_line(code, index + 1));
        }

        None
    }
}

impl Iterator for Parser<'_> {
    type Item = Result<Statement, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.statement()
    }
}

fn strip_comment(line: &str) -> &str {
    let mut quoted = false;
    for (i, c) in line.char_indices() {
        match c {
            QUOTE => quoted = !quoted,
            COMMENT if !quoted => return &line[..i],
            _ => (),
        }
    }

    line
}

fn parse_line(code: &str, line: usize) -> Result<Statement, ParseError> {
    let (head, rest) = match code.find(char::is_whitespace) {
        Some(i) => (&code[..i], code[i..].trim_start()),
        None => (code, ""),
    };

    if let Some(label) = head.strip_suffix(LABEL_SUFFIX) {
        if !is_identifier(label) {
            return SyntaxErrorKind::InvalidLabel(head.to_string()).throw(line);
        }
        if !rest.is_empty() {
            return SyntaxErrorKind::TrailingTokens(rest.to_string()).throw(line);
        }

        return Ok(Statement::Mark {
            label: label.into(),
            line,
        });
    }

    let instruction = if head == "msg" {
        Instruction::Message(message_parts(rest, line)?)
    } else {
        let operands: Vec<&str> = rest
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|token| !token.is_empty())
            .collect();
        instruction(head, &operands, line)?
    };

    Ok(Statement::Instruction { instruction, line })
}

fn instruction(opcode: &str, operands: &[&str], line: usize) -> Result<Instruction, ParseError> {
    let instr = match opcode {
        "mov" => {
            let (dst, src) = binary(opcode, operands, line)?;
            Instruction::Move(dst, src)
        }
        "inc" => Instruction::Increment(unary(opcode, operands, line)?),
        "dec" => Instruction::Decrement(unary(opcode, operands, line)?),
        "add" => {
            let (dst, src) = binary(opcode, operands, line)?;
            Instruction::Add(dst, src)
        }
        "sub" => {
            let (dst, src) = binary(opcode, operands, line)?;
            Instruction::Subtract(dst, src)
        }
        "mul" => {
            let (dst, src) = binary(opcode, operands, line)?;
            Instruction::Multiply(dst, src)
        }
        "div" => {
            let (dst, src) = binary(opcode, operands, line)?;
            Instruction::Divide(dst, src)
        }
        "cmp" => {
            let [left, right] = args::<2>(opcode, operands, line)?;
            Instruction::Compare(operand(left, line)?, operand(right, line)?)
        }
        "jmp" => Instruction::Jump(target(opcode, operands, line)?),
        "je" => Instruction::Branch(Condition::Equal, target(opcode, operands, line)?),
        "jne" => Instruction::Branch(Condition::NotEqual, target(opcode, operands, line)?),
        "jl" => Instruction::Branch(Condition::Less, target(opcode, operands, line)?),
        "jle" => Instruction::Branch(Condition::LessEqual, target(opcode, operands, line)?),
        "jg" => Instruction::Branch(Condition::Greater, target(opcode, operands, line)?),
        "jge" => Instruction::Branch(Condition::GreaterEqual, target(opcode, operands, line)?),
        "call" => Instruction::Call(target(opcode, operands, line)?),
        "ret" => {
            let [] = args::<0>(opcode, operands, line)?;
            Instruction::Return
        }
        "end" => {
            let [] = args::<0>(opcode, operands, line)?;
            Instruction::End
        }
        _ => return SyntaxErrorKind::UnknownOpcode(opcode.to_string()).throw(line),
    };

    Ok(instr)
}

fn args<'a, const N: usize>(
    opcode: &str,
    operands: &[&'a str],
    line: usize,
) -> Result<[&'a str; N], ParseError> {
    match <[&'a str; N]>::try_from(operands) {
        Ok(args) => Ok(args),
        Err(_) => SyntaxErrorKind::ArityMismatch {
            opcode: opcode.to_string(),
            expected: N,
            found: operands.len(),
        }
        .throw(line),
    }
}

fn unary(opcode: &str, operands: &[&str], line: usize) -> Result<Rc<str>, ParseError> {
    let [dst] = args::<1>(opcode, operands, line)?;
    register(dst, line)
}

fn binary(opcode: &str, operands: &[&str], line: usize) -> Result<(Rc<str>, Operand), ParseError> {
    let [dst, src] = args::<2>(opcode, operands, line)?;
    Ok((register(dst, line)?, operand(src, line)?))
}

fn target(opcode: &str, operands: &[&str], line: usize) -> Result<Label, ParseError> {
    let [label] = args::<1>(opcode, operands, line)?;
    if !is_identifier(label) {
        return SyntaxErrorKind::InvalidLabel(label.to_string()).throw(line);
    }

    Ok(Label::unresolved(label))
}

fn register(token: &str, line: usize) -> Result<Rc<str>, ParseError> {
    if !is_identifier(token) {
        return SyntaxErrorKind::InvalidRegister(token.to_string()).throw(line);
    }

    Ok(token.into())
}

fn operand(token: &str, line: usize) -> Result<Operand, ParseError> {
    if let Ok(value) = token.parse::<i64>() {
        return Ok(Operand::Literal(value));
    }
    if is_identifier(token) {
        return Ok(Operand::Register(token.into()));
    }

    SyntaxErrorKind::InvalidOperand(token.to_string()).throw(line)
}

/// `msg` arguments are quoted literals kept verbatim and bare register names, separated by
/// commas and/or whitespace.
fn message_parts(mut rest: &str, line: usize) -> Result<Vec<MessagePart>, ParseError> {
    let mut parts = vec![];
    loop {
        rest = rest.trim_start_matches(|c: char| c == ',' || c.is_whitespace());
        if rest.is_empty() {
            break;
        }

        if let Some(body) = rest.strip_prefix(QUOTE) {
            let len = match body.find(QUOTE) {
                Some(len) => len,
                None => return SyntaxErrorKind::UnterminatedString.throw(line),
            };
            parts.push(MessagePart::Text(body[..len].into()));
            rest = &body[len + 1..];
        } else {
            let len = rest
                .find(|c: char| c == ',' || c == QUOTE || c.is_whitespace())
                .unwrap_or(rest.len());
            let token = &rest[..len];
            parts.push(MessagePart::Register(register(token, line)?));
            rest = &rest[len..];
        }
    }

    if parts.is_empty() {
        return SyntaxErrorKind::EmptyMessage.throw(line);
    }

    Ok(parts)
}

fn is_identifier(token: &str) -> bool {
    let mut chars = token.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::{read_source, ParseError, Parser, Statement, SyntaxErrorKind};
    use crate::ir::{Condition, Instruction, Label, MessagePart, Operand};

    fn parse(source: &str) -> Result<Vec<Statement>, ParseError> {
        Parser::new(source).collect()
    }

    fn instr(instruction: Instruction, line: usize) -> Statement {
        Statement::Instruction { instruction, line }
    }

    fn syntax_error(source: &str) -> (usize, SyntaxErrorKind) {
        match parse(source) {
            Err(ParseError::Syntax { line, kind }) => (line, kind),
            other => panic!("expected a syntax error, got {:?}", other),
        }
    }

    #[test]
    fn parse_first_program() -> Result<(), ParseError> {
        let source = "; My first program\n\
                      mov  a, 5\n\
                      inc  a\n\
                      call function\n\
                      msg  '(5+1)/2 = ', a    ; output message\n\
                      end\n\
                      \n\
                      function:\n    div  a, 2\n    ret\n";

        let results = vec![
            instr(Instruction::Move("a".into(), Operand::Literal(5)), 2),
            instr(Instruction::Increment("a".into()), 3),
            instr(Instruction::Call(Label::unresolved("function")), 4),
            instr(
                Instruction::Message(vec![
                    MessagePart::Text("(5+1)/2 = ".into()),
                    MessagePart::Register("a".into()),
                ]),
                5,
            ),
            instr(Instruction::End, 6),
            Statement::Mark {
                label: "function".into(),
                line: 8,
            },
            instr(Instruction::Divide("a".into(), Operand::Literal(2)), 9),
            instr(Instruction::Return, 10),
        ];

        assert_eq!(parse(source)?, results);

        Ok(())
    }

    #[test]
    fn parse_operands() -> Result<(), ParseError> {
        let statements = parse("mov a b\nmul a, -1\ncmp 3, c\njge loop_1")?;
        let instructions: Vec<_> = statements
            .into_iter()
            .map(|statement| match statement {
                Statement::Instruction { instruction, .. } => instruction,
                other => panic!("unexpected {:?}", other),
            })
            .collect();

        assert_eq!(
            instructions,
            vec![
                Instruction::Move("a".into(), Operand::Register("b".into())),
                Instruction::Multiply("a".into(), Operand::Literal(-1)),
                Instruction::Compare(Operand::Literal(3), Operand::Register("c".into())),
                Instruction::Branch(Condition::GreaterEqual, Label::unresolved("loop_1")),
            ]
        );

        Ok(())
    }

    #[test]
    fn parse_message_keeps_literals_verbatim() -> Result<(), ParseError> {
        let statements = parse("msg 'mod(', a, ', ', b,') = ' d ; x; y\nmsg 'a;b''c'")?;

        assert_eq!(
            statements,
            vec![
                instr(
                    Instruction::Message(vec![
                        MessagePart::Text("mod(".into()),
                        MessagePart::Register("a".into()),
                        MessagePart::Text(", ".into()),
                        MessagePart::Register("b".into()),
                        MessagePart::Text(") = ".into()),
                        MessagePart::Register("d".into()),
                    ]),
                    1,
                ),
                instr(
                    Instruction::Message(vec![
                        MessagePart::Text("a;b".into()),
                        MessagePart::Text("c".into()),
                    ]),
                    2,
                ),
            ]
        );

        Ok(())
    }

    #[test]
    fn erroneous_lines() {
        let (line, kind) = syntax_error("mov a, 1\nMOV a, 2");
        assert_eq!(line, 2);
        assert!(matches!(kind, SyntaxErrorKind::UnknownOpcode(op) if op == "MOV"));

        let (_, kind) = syntax_error("add a");
        assert!(matches!(
            kind,
            SyntaxErrorKind::ArityMismatch { expected: 2, found: 1, .. }
        ));

        let (_, kind) = syntax_error("ret a");
        assert!(matches!(
            kind,
            SyntaxErrorKind::ArityMismatch { expected: 0, found: 1, .. }
        ));

        let (_, kind) = syntax_error("msg 'unbalanced, a");
        assert!(matches!(kind, SyntaxErrorKind::UnterminatedString));

        let (_, kind) = syntax_error("msg ; nothing to say");
        assert!(matches!(kind, SyntaxErrorKind::EmptyMessage));

        let (_, kind) = syntax_error("mov 5, a");
        assert!(matches!(kind, SyntaxErrorKind::InvalidRegister(_)));

        let (_, kind) = syntax_error("mov a, 5x");
        assert!(matches!(kind, SyntaxErrorKind::InvalidOperand(_)));

        let (_, kind) = syntax_error("loop: inc a");
        assert!(matches!(kind, SyntaxErrorKind::TrailingTokens(_)));

        let (_, kind) = syntax_error("1st:");
        assert!(matches!(kind, SyntaxErrorKind::InvalidLabel(_)));
    }

    #[test]
    fn missing_file() {
        assert!(matches!(
            read_source("resources/does_not_exist.asm"),
            Err(ParseError::FileOpen { .. })
        ));
    }
}
