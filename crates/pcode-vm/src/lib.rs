//! pcode-vm — interpréteur pas à pas du pcode généré
//!
//! - `infer_inputs` : passe statique qui classe les lectures libres en entrées
//! - `Vm` : compteur ordinal, table des variables, drapeau de comparaison, slot de retour
//! - `VmOptions` : plafond d'instructions optionnel (illimité par défaut)
//! - `VmError` : fautes d'exécution (division par zéro, dépassement, type…)
//!
//! ```rust
//! use pcode_core::{ArithOp, Instruction, Operand, Target, Temp, Value};
//! use pcode_vm::Vm;
//!
//! // y <- x + 2 ; return y
//! let code = vec![
//!     Instruction::Aop { op: ArithOp::Add, lhs: Operand::var("x"), rhs: Some(Operand::Int(2)), dest: Temp(0) },
//!     Instruction::Asn { target: Target::Var("y".into()), value: Operand::Temp(Temp(0)) },
//!     Instruction::Ret(Some(Operand::var("y"))),
//! ];
//! let mut vm = Vm::new(code);
//! assert_eq!(vm.inputs().keys().collect::<Vec<_>>(), ["x"]);
//! assert_eq!(vm.run(&[("x", Value::Int(5))])?, Some(Value::Int(7)));
//! # Ok::<(), pcode_vm::VmError>(())
//! ```

#![deny(missing_docs)]

mod error;
mod infer;
mod machine;

pub use error::VmError;
pub use infer::infer_inputs;
pub use machine::{Vm, VmOptions, MAX_ARRAY_LEN};
