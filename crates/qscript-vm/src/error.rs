use qscript_ir::{Label, SegmentKind};
use thiserror::Error;

/// Errors raised by the VM.
///
/// Everything except [`VmError::InvalidState`] is a runtime fault: it is
/// caught at the `execute()` boundary and halts the VM instead of being
/// returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VmError {
    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    #[error("no such label {0}")]
    UnresolvedLabel(Label),

    #[error("label {label} points to a {kind:?} segment, expecting instructions")]
    NotInstructionSegment { label: Label, kind: SegmentKind },

    #[error("label {0} reaches no instruction")]
    EmptyLabel(Label),

    #[error("reached end of program with a non-empty call stack")]
    EofWithCallStack,

    #[error("argument stack overflow")]
    ArgumentStackOverflow,

    #[error("variable stack overflow")]
    VariableStackOverflow,

    #[error("variable stack underflow")]
    VariableStackUnderflow,

    #[error("division by zero")]
    DivisionByZero,

    #[error("{mnemonic}: bad argument {index}")]
    BadArgument { mnemonic: &'static str, index: usize },

    #[error("{0} is not implemented")]
    NotImplemented(&'static str),

    #[error("invalid register {0}")]
    InvalidRegister(i64),
}

pub type Result<T> = std::result::Result<T, VmError>;
