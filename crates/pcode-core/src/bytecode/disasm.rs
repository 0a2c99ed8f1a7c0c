//! Minimal textual disassembly helpers used by the CLI tooling and golden tests.

use core::fmt::Write;

use crate::bytecode::{chunk::Chunk, instr::Instruction};

/// One line per instruction: `index: OPCODE operand operand ...`.
#[must_use]
pub fn disassemble(code: &[Instruction]) -> String {
    let mut out = String::new();
    for (pc, instr) in code.iter().enumerate() {
        let _ = writeln!(out, "{pc}: {instr}");
    }
    out
}

/// Multi-line disassembly with a header and jump annotations.
#[must_use]
pub fn disassemble_full(chunk: &Chunk, title: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "== {title} == (version={}, ops={})", chunk.version(), chunk.len());

    let width = chunk.len().saturating_sub(1).to_string().len().max(4);
    for (pc, instr) in chunk.code.iter().enumerate() {
        let landing = match *instr {
            Instruction::Skp(n) => Some(pc + 1 + n as usize),
            Instruction::Jmp(target) => Some(target as usize),
            _ => None,
        };
        match landing {
            Some(to) => {
                let _ = writeln!(out, "{pc:0width$} | {instr} ;; -> {to:0width$}");
            }
            None => {
                let _ = writeln!(out, "{pc:0width$} | {instr}");
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::instr::{Operand, Target};

    fn code() -> Vec<Instruction> {
        vec![
            Instruction::Asn { target: Target::Var("x".into()), value: Operand::Int(1) },
            Instruction::Skp(1),
            Instruction::Jmp(0),
            Instruction::Ret(Some(Operand::var("x"))),
        ]
    }

    #[test]
    fn compact_listing() {
        insta::assert_snapshot!(disassemble(&code()), @r"
        0: ASN x 1
        1: SKP 1
        2: JMP 0
        3: RET x
        ");
    }

    #[test]
    fn full_listing_annotates_landings() {
        let text = disassemble_full(&Chunk::new(code()), "demo");
        insta::assert_snapshot!(text, @r"
        == demo == (version=1, ops=4)
        0000 | ASN x 1
        0001 | SKP 1 ;; -> 0003
        0002 | JMP 0 ;; -> 0000
        0003 | RET x
        ");
    }
}
