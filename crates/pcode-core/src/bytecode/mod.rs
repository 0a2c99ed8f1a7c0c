//! Bytecode primitives: the instruction model, values, the chunk codec and
//! the textual disassembler.

/// Opcodes, operands and instructions.
pub mod instr;
/// Runtime values.
pub mod value;
/// Binary chunk representation.
pub mod chunk;
/// Structural validation.
pub mod helpers;
/// Textual disassembly.
pub mod disasm;

pub use chunk::{Chunk, ChunkError};
pub use instr::{ArithOp, CmpOp, Instruction, Opcode, Operand, Target, Temp};
pub use value::{Value, ValueParseError};
