use thiserror::Error;

/// Runtime faults. Any of them aborts the run in progress.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VmError {
    /// `/` with a zero divisor.
    #[error("division by zero at pc {pc}")]
    DivisionByZero {
        /// Faulting instruction.
        pc: usize,
    },

    /// Result does not fit in 64 bits.
    #[error("integer overflow in `{op}` at pc {pc}")]
    Overflow {
        /// Faulting instruction.
        pc: usize,
        /// Operator spelling.
        op: &'static str,
    },

    /// Operand of the wrong kind (array where a scalar is expected, etc.).
    #[error("type mismatch at pc {pc}: `{op}` expects {expected}, found {found}")]
    TypeMismatch {
        /// Faulting instruction.
        pc: usize,
        /// Operator or opcode spelling.
        op: &'static str,
        /// Expected kind.
        expected: &'static str,
        /// Kind actually found.
        found: &'static str,
    },

    /// Element write below index zero.
    #[error("negative array index {index} at pc {pc}")]
    NegativeIndex {
        /// Faulting instruction.
        pc: usize,
        /// Offending index.
        index: i64,
    },

    /// Element write that would grow an array past the supported size.
    #[error("array index {index} at pc {pc} exceeds the {max}-element limit")]
    ArrayTooLarge {
        /// Faulting instruction.
        pc: usize,
        /// Offending index.
        index: i64,
        /// Largest supported length.
        max: usize,
    },

    /// Operand shape the generator never emits (decoded or hand-built code).
    #[error("malformed instruction at pc {pc}: {reason}")]
    MalformedInstruction {
        /// Faulting instruction.
        pc: usize,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// The configured step ceiling was reached.
    #[error("step limit of {limit} exceeded")]
    StepLimitExceeded {
        /// Configured ceiling.
        limit: u64,
    },
}
