//! Static input inference.
//!
//! A single forward scan over the instruction list. A variable read before
//! any instruction writes it becomes a required input, in first-read order.
//! The scan ignores control flow: a write inside a branch that never runs
//! still counts as a write from that point on.

use std::collections::HashSet;

use indexmap::IndexSet;
use pcode_core::{Instruction, Operand};

/// Names of the variables the program reads before writing them.
///
/// Reads are the operands before the destination of `AOP`/`COM`/`IDX` and
/// the value of `ASN`. Writes are `ASN` targets with any index stripped.
/// Temporaries are never inputs; `RET` is not scanned.
#[must_use]
pub fn infer_inputs(code: &[Instruction]) -> Vec<String> {
    let mut written: HashSet<&str> = HashSet::new();
    let mut inputs: IndexSet<&str> = IndexSet::new();

    for instr in code {
        let (reads, write): ([Option<&Operand>; 2], Option<&str>) = match instr {
            Instruction::Asn { target, value } => ([Some(value), None], target.base_slot()),
            Instruction::Aop { lhs, rhs, .. } => ([Some(lhs), rhs.as_ref()], None),
            Instruction::Com { lhs, rhs, .. } => ([Some(lhs), Some(rhs)], None),
            Instruction::Idx { array, index, .. } => ([Some(array), Some(index)], None),
            Instruction::Ret(_) | Instruction::Skp(_) | Instruction::Jmp(_) => continue,
        };

        for read in reads.into_iter().flatten() {
            if let Operand::Var(name) = read {
                if !written.contains(name.as_str()) {
                    inputs.insert(name.as_str());
                }
            }
        }
        if let Some(name) = write {
            written.insert(name);
        }
    }

    inputs.into_iter().map(str::to_owned).collect()
}
