//! Helper validations reused by tooling.

use crate::bytecode::{chunk::ChunkError, instr::Instruction};

/// Basic structural validation of an instruction sequence.
///
/// Generated code always passes; this guards sequences decoded from disk.
/// - every `JMP` targets an index `<= len`
/// - every `SKP` lands `<= len` (landing exactly on `len` ends the run)
/// - every temporary index is `< len`: the generator emits one instruction
///   per temporary it allocates
pub fn validate_code(code: &[Instruction]) -> Result<(), ChunkError> {
    let len = code.len() as u64;
    for (pc, instr) in code.iter().enumerate() {
        let at = u32::try_from(pc).unwrap_or(u32::MAX);
        if let Some(t) = instr.temps().find(|t| u64::from(t.0) >= len) {
            return Err(ChunkError::BadTemp { pc: at, temp: t.0 });
        }

        let target = match *instr {
            Instruction::Jmp(target) => u64::from(target),
            Instruction::Skp(n) => pc as u64 + 1 + u64::from(n),
            _ => continue,
        };
        if target > len {
            return Err(ChunkError::BadTarget { pc: at, target });
        }
    }
    Ok(())
}
