use thiserror::Error;

/// Fatal generation faults. The generator trusts the tree's shape and stops
/// at the first node it cannot lower.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// Node kind without a lowering (array literals).
    #[error("unsupported node: {0} cannot be lowered")]
    UnsupportedNode(&'static str),

    /// Operator spelling outside the language.
    #[error("unknown operator `{0}`")]
    UnknownOperator(String),

    /// Assignment to something other than an identifier or array element.
    #[error("invalid assignment target: {0}")]
    InvalidAssignTarget(&'static str),

    /// `for` initializer that does not assign a plain identifier.
    #[error("for-loop variable must be an identifier, found {0}")]
    InvalidLoopVariable(&'static str),

    /// A jump placeholder survived the generation pass.
    #[error("jump placeholder at {at} was never resolved")]
    UnresolvedJump {
        /// Index of the placeholder.
        at: usize,
    },

    /// A placeholder was resolved more than once, or was never recorded.
    #[error("no pending jump placeholder at {at}")]
    PatchMismatch {
        /// Index of the instruction being patched.
        at: usize,
    },

    /// Jump operands are 32-bit.
    #[error("program too large: operand {0} does not fit in 32 bits")]
    ProgramTooLarge(usize),
}
