use thiserror::Error;

/// Errors raised while constructing IR.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IrError {
    #[error("unknown opcode: {0}")]
    UnknownOpcode(String),
    #[error("{mnemonic} expects {expected} arguments, got {actual}")]
    ArgumentCount {
        mnemonic: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("{mnemonic} argument {index}: expected {expected}")]
    ArgumentType {
        mnemonic: &'static str,
        index: usize,
        expected: &'static str,
    },
    #[error("register r{0} out of range")]
    RegisterOutOfRange(i32),
    #[error("instruction added outside of an instruction segment")]
    NoOpenSegment,
}

pub type Result<T> = std::result::Result<T, IrError>;
