// src/lib.rs
//! pcode AST (Abstract Syntax Tree)
//!
//! Ce crate définit les structures livrées par le tokenizer/parser (externe)
//! une fois le programme pseudocode validé. Le générateur de `pcode-compiler`
//! ne fait que les lire.
//!
//! - Les opérateurs gardent leur graphie source (`"+"`, `"<="`, `"and"`, `"not"`) ;
//!   leur classement revient au générateur.
//! - Petits constructeurs (`Expr::int`, `Stmt::assign`, …) pour écrire des
//!   arbres à la main dans les tests et l'outillage.
//!
//! # Features
//! - `serde` : sérialisation/désérialisation de l'arbre (entrée JSON du CLI)
//!
//! # Example
//! ```rust
//! use pcode_ast::{Block, Expr, Stmt};
//!
//! // x <- 5 ; return x + 2
//! let program = Block::new(vec![
//!     Stmt::assign(Expr::ident("x"), Expr::int(5)),
//!     Stmt::ret(Some(Expr::binary(Expr::ident("x"), "+", Expr::int(2)))),
//! ]);
//! assert_eq!(program.stmts.len(), 2);
//! ```

#![deny(missing_docs)]

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A sequence of statements. The root of every program is a block.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Block {
    /// Statements, in source order.
    pub stmts: Vec<Stmt>,
}

impl Block {
    /// Builds a block from its statements.
    pub fn new(stmts: Vec<Stmt>) -> Self {
        Self { stmts }
    }

    /// True when the block holds no statement.
    pub fn is_empty(&self) -> bool {
        self.stmts.is_empty()
    }
}

impl FromIterator<Stmt> for Block {
    fn from_iter<I: IntoIterator<Item = Stmt>>(iter: I) -> Self {
        Self { stmts: iter.into_iter().collect() }
    }
}

/// `target <- value`
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Assign {
    /// Identifier or array element being written.
    pub target: Expr,
    /// Right-hand side.
    pub value: Expr,
}

/// A statement.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Stmt {
    /// Bare expression (evaluated, result discarded).
    Expr(Expr),
    /// Assignment.
    Assign(Assign),
    /// `if cond then ... [else ...] end`
    If {
        /// Condition.
        condition: Expr,
        /// Taken when the condition holds.
        then_block: Block,
        /// Optional alternative.
        else_block: Option<Block>,
    },
    /// `while cond do ... end`
    While {
        /// Re-evaluated before every iteration.
        condition: Expr,
        /// Loop body.
        body: Block,
    },
    /// `for i <- start to bound do ... end` (inclusive bound)
    For {
        /// Initializing assignment of the loop variable.
        init: Assign,
        /// Upper bound, compared with `<=`.
        bound: Expr,
        /// Loop body.
        body: Block,
    },
    /// `return [value]`
    Return(Option<Expr>),
    /// Nested block.
    Block(Block),
    /// Single-body function (no parameters, no call mechanism).
    Function {
        /// Function body.
        body: Block,
    },
}

impl Stmt {
    /// `target <- value`
    pub fn assign(target: Expr, value: Expr) -> Self {
        Self::Assign(Assign { target, value })
    }

    /// `return [value]`
    pub fn ret(value: Option<Expr>) -> Self {
        Self::Return(value)
    }

    /// `if condition then ... [else ...] end`
    pub fn if_else(condition: Expr, then_block: Block, else_block: Option<Block>) -> Self {
        Self::If { condition, then_block, else_block }
    }

    /// `while condition do ... end`
    pub fn while_loop(condition: Expr, body: Block) -> Self {
        Self::While { condition, body }
    }

    /// `for var <- start to bound do ... end`
    pub fn for_loop(var: &str, start: Expr, bound: Expr, body: Block) -> Self {
        Self::For { init: Assign { target: Expr::ident(var), value: start }, bound, body }
    }
}

/// An expression.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Expr {
    /// Integer literal.
    Literal(i64),
    /// Variable reference.
    Ident(String),
    /// Array literal `[a, b, ...]`. Produced by the parser, never lowered.
    Array(Vec<Expr>),
    /// `base[index]`
    Index {
        /// Array being read.
        base: Box<Expr>,
        /// Element index.
        index: Box<Expr>,
    },
    /// `left op right`
    Binary {
        /// Left operand.
        left: Box<Expr>,
        /// Operator spelling.
        op: String,
        /// Right operand.
        right: Box<Expr>,
    },
    /// `op expr` (only `not` in the language)
    Unary {
        /// Operator spelling.
        op: String,
        /// Operand.
        expr: Box<Expr>,
    },
}

impl Expr {
    /// Integer literal.
    pub fn int(value: i64) -> Self {
        Self::Literal(value)
    }

    /// Variable reference.
    pub fn ident(name: impl Into<String>) -> Self {
        Self::Ident(name.into())
    }

    /// `base[index]`
    pub fn index(base: Self, index: Self) -> Self {
        Self::Index { base: Box::new(base), index: Box::new(index) }
    }

    /// `left op right`
    pub fn binary(left: Self, op: impl Into<String>, right: Self) -> Self {
        Self::Binary { left: Box::new(left), op: op.into(), right: Box::new(right) }
    }

    /// `op expr`
    pub fn unary(op: impl Into<String>, expr: Self) -> Self {
        Self::Unary { op: op.into(), expr: Box::new(expr) }
    }

    /// Short human-readable name of the node kind, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Literal(_) => "literal",
            Self::Ident(_) => "identifier",
            Self::Array(_) => "array literal",
            Self::Index { .. } => "array access",
            Self::Binary { .. } => "binary operation",
            Self::Unary { .. } => "unary operation",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn for_loop_builds_identifier_init() {
        let s = Stmt::for_loop("i", Expr::int(0), Expr::int(3), Block::default());
        match s {
            Stmt::For { init, .. } => assert_eq!(init.target, Expr::ident("i")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn kinds() {
        assert_eq!(Expr::Array(vec![]).kind(), "array literal");
        assert_eq!(Expr::index(Expr::ident("a"), Expr::int(0)).kind(), "array access");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn json_shape() {
        let json = r#"{"stmts":[
            {"assign":{"target":{"ident":"x"},"value":{"literal":5}}},
            {"return":{"binary":{"left":{"ident":"x"},"op":"+","right":{"literal":2}}}}
        ]}"#;
        let block: Block = serde_json::from_str(json).unwrap();
        assert_eq!(
            block,
            Block::new(vec![
                Stmt::assign(Expr::ident("x"), Expr::int(5)),
                Stmt::ret(Some(Expr::binary(Expr::ident("x"), "+", Expr::int(2)))),
            ])
        );
    }
}
