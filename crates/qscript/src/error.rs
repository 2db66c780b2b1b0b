use qscript_ir::InstructionRef;
use thiserror::Error;

use crate::listing::ListingError;

/// Toolchain errors.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IR error: {0}")]
    Ir(#[from] qscript_ir::IrError),
    #[error("VM error: {0}")]
    Vm(#[from] qscript_vm::VmError),
    #[error("listing error: {0}")]
    Listing(#[from] ListingError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("no instruction at {0}")]
    NoSuchInstruction(InstructionRef),
}

pub type Result<T> = std::result::Result<T, Error>;
