//! The closed instruction set.
//!
//! Every instruction has a fixed operand shape per opcode. Operands are tagged
//! once at generation time (literal, program variable or generator temporary),
//! so the machine never re-parses operand text.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Closed set of machine operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Opcode {
    /// Assign.
    Asn,
    /// Arithmetic (or unary) operation.
    Aop,
    /// Comparison / boolean operation, updates the comparison flag.
    Com,
    /// Indexed read.
    Idx,
    /// Return.
    Ret,
    /// Conditional relative skip.
    Skp,
    /// Unconditional absolute jump.
    Jmp,
}

impl Opcode {
    /// Mnemonic as printed by the disassembler.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Asn => "ASN",
            Self::Aop => "AOP",
            Self::Com => "COM",
            Self::Idx => "IDX",
            Self::Ret => "RET",
            Self::Skp => "SKP",
            Self::Jmp => "JMP",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Generator temporary, rendered `t<n>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Temp(pub u32);

impl fmt::Display for Temp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// A read operand.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Operand {
    /// Integer literal.
    Int(i64),
    /// Program variable.
    Var(String),
    /// Generator temporary.
    Temp(Temp),
}

impl Operand {
    /// Program variable operand.
    pub fn var(name: impl Into<String>) -> Self {
        Self::Var(name.into())
    }

    /// The temporary named by this operand, if any.
    #[must_use]
    pub const fn as_temp(&self) -> Option<Temp> {
        match self {
            Self::Temp(t) => Some(*t),
            _ => None,
        }
    }
}

impl From<Temp> for Operand {
    fn from(t: Temp) -> Self {
        Self::Temp(t)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Var(name) => f.write_str(name),
            Self::Temp(t) => write!(f, "{t}"),
        }
    }
}

/// Write target of an `ASN`.
///
/// `Element` is the `name[index]` encoding: there is no separate store opcode
/// for array writes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Target {
    /// Plain variable.
    Var(String),
    /// Array element.
    Element {
        /// Array slot (variable or temporary).
        array: Operand,
        /// Element index.
        index: Operand,
    },
}

impl Target {
    /// Program variable written by this target, index suffix stripped.
    /// `None` when an element write goes through a temporary.
    #[must_use]
    pub fn base_slot(&self) -> Option<&str> {
        match self {
            Self::Var(name) | Self::Element { array: Operand::Var(name), .. } => Some(name),
            Self::Element { .. } => None,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Var(name) => f.write_str(name),
            Self::Element { array, index } => write!(f, "{array}[{index}]"),
        }
    }
}

/// Operators carried by `AOP`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ArithOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/` (floor division)
    Div,
    /// `=` under `AOP`: copies the right operand through.
    Copy,
    /// `not` (unary form, single operand)
    Not,
}

impl ArithOp {
    /// Binary arithmetic operator from its spelling.
    #[must_use]
    pub fn binary(symbol: &str) -> Option<Self> {
        Some(match symbol {
            "+" => Self::Add,
            "-" => Self::Sub,
            "*" => Self::Mul,
            "/" => Self::Div,
            _ => return None,
        })
    }

    /// Unary operator from its spelling.
    #[must_use]
    pub fn unary(symbol: &str) -> Option<Self> {
        (symbol == "not").then_some(Self::Not)
    }

    /// True when the operator takes a single operand.
    #[must_use]
    pub const fn is_unary(self) -> bool {
        matches!(self, Self::Not)
    }

    /// Source spelling.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Copy => "=",
            Self::Not => "not",
        }
    }

    pub(crate) const fn code(self) -> u8 {
        match self {
            Self::Add => 0,
            Self::Sub => 1,
            Self::Mul => 2,
            Self::Div => 3,
            Self::Copy => 4,
            Self::Not => 5,
        }
    }

    pub(crate) const fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => Self::Add,
            1 => Self::Sub,
            2 => Self::Mul,
            3 => Self::Div,
            4 => Self::Copy,
            5 => Self::Not,
            _ => return None,
        })
    }
}

impl fmt::Display for ArithOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Operators carried by `COM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CmpOp {
    /// `=`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `>`
    Gt,
    /// `<=`
    Le,
    /// `>=`
    Ge,
    /// `and`
    And,
    /// `or`
    Or,
}

impl CmpOp {
    /// Comparison or boolean operator from its spelling.
    #[must_use]
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Some(match symbol {
            "=" => Self::Eq,
            "!=" => Self::Ne,
            "<" => Self::Lt,
            ">" => Self::Gt,
            "<=" => Self::Le,
            ">=" => Self::Ge,
            "and" => Self::And,
            "or" => Self::Or,
            _ => return None,
        })
    }

    /// Source spelling.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Gt => ">",
            Self::Le => "<=",
            Self::Ge => ">=",
            Self::And => "and",
            Self::Or => "or",
        }
    }

    pub(crate) const fn code(self) -> u8 {
        match self {
            Self::Eq => 0,
            Self::Ne => 1,
            Self::Lt => 2,
            Self::Gt => 3,
            Self::Le => 4,
            Self::Ge => 5,
            Self::And => 6,
            Self::Or => 7,
        }
    }

    pub(crate) const fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => Self::Eq,
            1 => Self::Ne,
            2 => Self::Lt,
            3 => Self::Gt,
            4 => Self::Le,
            5 => Self::Ge,
            6 => Self::And,
            7 => Self::Or,
            _ => return None,
        })
    }
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// One machine instruction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Instruction {
    /// `ASN target value`
    Asn {
        /// Variable or array element written.
        target: Target,
        /// Value read.
        value: Operand,
    },
    /// `AOP op lhs [rhs] dest` (`rhs` absent for unary operators)
    Aop {
        /// Operator.
        op: ArithOp,
        /// First operand.
        lhs: Operand,
        /// Second operand, binary operators only.
        rhs: Option<Operand>,
        /// Destination temporary.
        dest: Temp,
    },
    /// `COM op lhs rhs dest`
    Com {
        /// Operator.
        op: CmpOp,
        /// Left operand.
        lhs: Operand,
        /// Right operand.
        rhs: Operand,
        /// Destination temporary.
        dest: Temp,
    },
    /// `IDX array index dest`
    Idx {
        /// Array slot.
        array: Operand,
        /// Element index.
        index: Operand,
        /// Destination temporary.
        dest: Temp,
    },
    /// `RET [value]`
    Ret(Option<Operand>),
    /// `SKP n`: skip the next `n` instructions when the comparison flag is false.
    Skp(u32),
    /// `JMP target`: continue at the absolute index `target`.
    Jmp(u32),
}

impl Instruction {
    /// Closed opcode tag of the instruction.
    #[must_use]
    pub const fn opcode(&self) -> Opcode {
        match self {
            Self::Asn { .. } => Opcode::Asn,
            Self::Aop { .. } => Opcode::Aop,
            Self::Com { .. } => Opcode::Com,
            Self::Idx { .. } => Opcode::Idx,
            Self::Ret(_) => Opcode::Ret,
            Self::Skp(_) => Opcode::Skp,
            Self::Jmp(_) => Opcode::Jmp,
        }
    }

    /// True for `SKP` and `JMP`.
    #[must_use]
    pub const fn is_control(&self) -> bool {
        matches!(self, Self::Skp(_) | Self::Jmp(_))
    }

    /// Every temporary the instruction reads or writes, destination last.
    pub fn temps(&self) -> impl Iterator<Item = Temp> + '_ {
        let (operands, dest): ([Option<&Operand>; 3], Option<Temp>) = match self {
            Self::Asn { target: Target::Element { array, index }, value } => {
                ([Some(value), Some(array), Some(index)], None)
            }
            Self::Asn { value, .. } => ([Some(value), None, None], None),
            Self::Aop { lhs, rhs, dest, .. } => ([Some(lhs), rhs.as_ref(), None], Some(*dest)),
            Self::Com { lhs, rhs, dest, .. } | Self::Idx { array: lhs, index: rhs, dest } => {
                ([Some(lhs), Some(rhs), None], Some(*dest))
            }
            Self::Ret(value) => ([value.as_ref(), None, None], None),
            Self::Skp(_) | Self::Jmp(_) => ([None; 3], None),
        };
        operands.into_iter().flatten().filter_map(Operand::as_temp).chain(dest)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = self.opcode();
        match self {
            Self::Asn { target, value } => write!(f, "{op} {target} {value}"),
            Self::Aop { op: a, lhs, rhs: Some(rhs), dest } => write!(f, "{op} {a} {lhs} {rhs} {dest}"),
            Self::Aop { op: a, lhs, rhs: None, dest } => write!(f, "{op} {a} {lhs} {dest}"),
            Self::Com { op: c, lhs, rhs, dest } => write!(f, "{op} {c} {lhs} {rhs} {dest}"),
            Self::Idx { array, index, dest } => write!(f, "{op} {array} {index} {dest}"),
            Self::Ret(Some(v)) => write!(f, "{op} {v}"),
            Self::Ret(None) => write!(f, "{op}"),
            Self::Skp(n) | Self::Jmp(n) => write!(f, "{op} {n}"),
        }
    }
}
