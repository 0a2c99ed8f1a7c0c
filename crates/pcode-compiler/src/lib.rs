// src/lib.rs
//! pcode compiler — AST → séquence linéaire d'instructions
//!
//! - Entrée : `pcode_ast::Block` (déjà validé par le parser externe)
//! - Sortie : `Vec<pcode_core::Instruction>`, tous les sauts résolus
//! - Erreurs : [`CompileError`] pour un arbre mal formé (fatal, sans reprise)
//!
//! API principale :
//! ```rust
//! use pcode_ast::{Block, Expr, Stmt};
//! use pcode_core::disasm::disassemble;
//!
//! let program = Block::new(vec![
//!     Stmt::assign(Expr::ident("x"), Expr::int(5)),
//!     Stmt::ret(Some(Expr::binary(Expr::ident("x"), "+", Expr::int(2)))),
//! ]);
//! let code = pcode_compiler::generate(&program)?;
//! assert_eq!(disassemble(&code), "0: ASN x 5\n1: AOP + x 2 t0\n2: RET t0\n");
//! # Ok::<(), pcode_compiler::CompileError>(())
//! ```

#![deny(missing_docs)]

mod error;
mod generator;

pub use error::CompileError;
pub use generator::Generator;

use pcode_ast::Block;
use pcode_core::Instruction;

/// Generates the instruction sequence of `program` with a fresh [`Generator`].
pub fn generate(program: &Block) -> Result<Vec<Instruction>, CompileError> {
    Generator::new().generate(program)
}
