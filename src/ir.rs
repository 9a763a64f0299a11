use std::cmp::Ordering;
use std::fmt::{self, Display};
use std::rc::Rc;

/// Right-hand side of an instruction: either the current value of a register or an integer
/// literal written in the source.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Operand {
    Register(Rc<str>),
    Literal(i64),
}

/// A jump or call target. `index` is the address of the instruction following the label
/// definition and is only meaningful once the program has been resolved.
#[derive(Debug, PartialEq, Eq, Clone, Hash)]
pub struct Label {
    pub value: Rc<str>,
    pub index: usize,
}

impl Label {
    pub(crate) fn unresolved(value: &str) -> Label {
        Label {
            value: value.into(),
            index: 0,
        }
    }
}

/// The relation tested by a conditional jump
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Condition {
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

impl Condition {
    /// Whether the relation holds for the ordering `left.cmp(&right)` recorded by a `cmp`.
    pub fn holds(self, ordering: Ordering) -> bool {
        match self {
            Condition::Equal => ordering == Ordering::Equal,
            Condition::NotEqual => ordering != Ordering::Equal,
            Condition::Less => ordering == Ordering::Less,
            Condition::LessEqual => ordering != Ordering::Greater,
            Condition::Greater => ordering == Ordering::Greater,
            Condition::GreaterEqual => ordering != Ordering::Less,
        }
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Condition::Equal => "je",
            Condition::NotEqual => "jne",
            Condition::Less => "jl",
            Condition::LessEqual => "jle",
            Condition::Greater => "jg",
            Condition::GreaterEqual => "jge",
        }
    }
}

/// One argument of a `msg` instruction
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum MessagePart {
    Register(Rc<str>),
    Text(Rc<str>),
}

/// An executable instruction. Label definitions never show up here, see
/// [`crate::parser::Statement::Mark`].
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Instruction {
    Move(Rc<str>, Operand),
    Increment(Rc<str>),
    Decrement(Rc<str>),
    Add(Rc<str>, Operand),
    Subtract(Rc<str>, Operand),
    Multiply(Rc<str>, Operand),
    Divide(Rc<str>, Operand),
    Compare(Operand, Operand),
    Jump(Label),
    Branch(Condition, Label),
    Call(Label),
    Return,
    Message(Vec<MessagePart>),
    End,
}

impl Instruction {
    /// The label this instruction transfers control to, if any.
    pub fn target_mut(&mut self) -> Option<&mut Label> {
        match self {
            Instruction::Jump(label) | Instruction::Branch(_, label) | Instruction::Call(label) => {
                Some(label)
            }
            _ => None,
        }
    }
}

impl Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Register(name) => write!(f, "{}", name),
            Operand::Literal(value) => write!(f, "{}", value),
        }
    }
}

impl Display for MessagePart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessagePart::Register(name) => write!(f, "{}", name),
            MessagePart::Text(text) => write!(f, "'{}'", text),
        }
    }
}

impl Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Move(dst, src) => write!(f, "mov {}, {}", dst, src),
            Instruction::Increment(dst) => write!(f, "inc {}", dst),
            Instruction::Decrement(dst) => write!(f, "dec {}", dst),
            Instruction::Add(dst, src) => write!(f, "add {}, {}", dst, src),
            Instruction::Subtract(dst, src) => write!(f, "sub {}, {}", dst, src),
            Instruction::Multiply(dst, src) => write!(f, "mul {}, {}", dst, src),
            Instruction::Divide(dst, src) => write!(f, "div {}, {}", dst, src),
            Instruction::Compare(left, right) => write!(f, "cmp {}, {}", left, right),
            Instruction::Jump(label) => write!(f, "jmp {}", label.value),
            Instruction::Branch(cond, label) => write!(f, "{} {}", cond.mnemonic(), label.value),
            Instruction::Call(label) => write!(f, "call {}", label.value),
            Instruction::Return => write!(f, "ret"),
            Instruction::Message(parts) => {
                write!(f, "msg")?;
                for (i, part) in parts.iter().enumerate() {
                    let sep = if i == 0 { " " } else { ", " };
                    write!(f, "{}{}", sep, part)?;
                }
                Ok(())
            }
            Instruction::End => write!(f, "end"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Condition, Instruction, Label, MessagePart, Operand};
    use std::cmp::Ordering;

    #[test]
    fn conditions_match_orderings() {
        let table = [
            (Condition::Equal, [false, true, false]),
            (Condition::NotEqual, [true, false, true]),
            (Condition::Less, [true, false, false]),
            (Condition::LessEqual, [true, true, false]),
            (Condition::Greater, [false, false, true]),
            (Condition::GreaterEqual, [false, true, true]),
        ];
        let orderings = [Ordering::Less, Ordering::Equal, Ordering::Greater];

        for (cond, expected) in table {
            for (ordering, holds) in orderings.iter().zip(expected) {
                assert_eq!(cond.holds(*ordering), holds, "{:?} {:?}", cond, ordering);
            }
        }
    }

    #[test]
    fn display_renders_assembly() {
        let instr = Instruction::Message(vec![
            MessagePart::Text("(5+1)/2 = ".into()),
            MessagePart::Register("a".into()),
        ]);
        assert_eq!(instr.to_string(), "msg '(5+1)/2 = ', a");

        let instr = Instruction::Multiply("a".into(), Operand::Literal(-1));
        assert_eq!(instr.to_string(), "mul a, -1");

        let instr = Instruction::Branch(Condition::LessEqual, Label::unresolved("proc_fib"));
        assert_eq!(instr.to_string(), "jle proc_fib");
    }
}
