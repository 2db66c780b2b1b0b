//! Instructions and their arguments.

use std::fmt;

use crate::error::{IrError, Result};
use crate::opcode::{Opcode, ParamKind, StackInteraction};
use crate::{Label, REGISTER_COUNT};

/// A literal argument value.
#[derive(Clone, Debug, PartialEq)]
pub enum Arg {
    Int(i32),
    Float(f32),
    Str(String),
}

impl Arg {
    #[must_use]
    pub const fn as_int(&self) -> Option<i32> {
        match self {
            Self::Int(v) => Some(*v),
            Self::Float(_) | Self::Str(_) => None,
        }
    }

    #[must_use]
    pub const fn as_float(&self) -> Option<f32> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(_) | Self::Str(_) => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            Self::Int(_) | Self::Float(_) => None,
        }
    }
}

impl From<i32> for Arg {
    fn from(value: i32) -> Self {
        Self::Int(value)
    }
}

impl From<f32> for Arg {
    fn from(value: f32) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Arg {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for Arg {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v:?}"),
            Self::Str(s) => write!(f, "{s:?}"),
        }
    }
}

/// Position of an instruction in its source text.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SourceLoc {
    pub line: u32,
    pub col: u32,
    pub len: u32,
}

impl SourceLoc {
    #[must_use]
    pub const fn new(line: u32, col: u32, len: u32) -> Self {
        Self { line, col, len }
    }
}

/// A single instruction: opcode plus arguments.
#[derive(Clone, Debug, PartialEq)]
pub struct Instruction {
    pub opcode: &'static Opcode,
    pub args: Vec<Arg>,
    pub source_loc: Option<SourceLoc>,
}

impl Instruction {
    /// Create an instruction, checking the arguments against the opcode's
    /// parameter list.
    ///
    /// # Errors
    ///
    /// Returns [`IrError::ArgumentCount`] or [`IrError::ArgumentType`] when
    /// the arguments do not fit the parameters. Returns
    /// [`IrError::RegisterOutOfRange`] for a register argument outside the
    /// register file.
    pub fn new(opcode: &'static Opcode, args: Vec<Arg>) -> Result<Self> {
        check_args(opcode, &args)?;
        Ok(Self {
            opcode,
            args,
            source_loc: None,
        })
    }

    /// Attach a source location.
    #[must_use]
    pub const fn with_source_loc(mut self, loc: SourceLoc) -> Self {
        self.source_loc = Some(loc);
        self
    }

    /// Integer argument at `index`.
    #[must_use]
    pub fn int_arg(&self, index: usize) -> Option<i32> {
        self.args.get(index).and_then(Arg::as_int)
    }

    /// Float argument at `index`.
    #[must_use]
    pub fn float_arg(&self, index: usize) -> Option<f32> {
        self.args.get(index).and_then(Arg::as_float)
    }

    /// String argument at `index`.
    #[must_use]
    pub fn str_arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).and_then(Arg::as_str)
    }

    /// Integer arguments from `start` on, e.g. the targets of a switch.
    pub fn int_args_from(&self, start: usize) -> impl Iterator<Item = i32> + '_ {
        self.args.iter().skip(start).filter_map(Arg::as_int)
    }

    /// Labels referenced by instruction-label parameters.
    #[must_use]
    pub fn instruction_labels(&self) -> Vec<Label> {
        let mut labels = Vec::new();
        for (index, param) in self.opcode.params.iter().enumerate() {
            match param {
                ParamKind::ILabel => labels.extend(self.int_arg(index)),
                ParamKind::ILabelVar => labels.extend(self.int_args_from(index)),
                _ => {}
            }
        }
        labels
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.opcode.mnemonic)?;
        for (i, (arg, param)) in self.args.iter().zip(param_iter(self.opcode)).enumerate() {
            f.write_str(if i == 0 { " " } else { ", " })?;
            match (param.is_register(), arg) {
                (true, Arg::Int(reg)) => write!(f, "r{reg}")?,
                _ => write!(f, "{arg}")?,
            }
        }
        Ok(())
    }
}

/// Parameter kinds with the trailing variadic parameter repeated forever.
fn param_iter(opcode: &Opcode) -> impl Iterator<Item = ParamKind> + '_ {
    let tail = opcode
        .params
        .last()
        .copied()
        .filter(|p| p.is_variadic())
        .into_iter()
        .flat_map(std::iter::repeat);
    opcode.params.iter().copied().chain(tail)
}

fn check_args(opcode: &'static Opcode, args: &[Arg]) -> Result<()> {
    // Stack-popping opcodes take their arguments from the argument stack.
    if opcode.stack == StackInteraction::Pop {
        return if args.is_empty() {
            Ok(())
        } else {
            Err(IrError::ArgumentCount {
                mnemonic: opcode.mnemonic,
                expected: 0,
                actual: args.len(),
            })
        };
    }

    let params = opcode.params;
    let variadic = params.last().is_some_and(|p| p.is_variadic());
    let fixed = if variadic { params.len() - 1 } else { params.len() };
    if args.len() < fixed || (!variadic && args.len() > fixed) {
        return Err(IrError::ArgumentCount {
            mnemonic: opcode.mnemonic,
            expected: fixed,
            actual: args.len(),
        });
    }

    for (index, (arg, param)) in args.iter().zip(param_iter(opcode)).enumerate() {
        let ok = match (param, arg) {
            (ParamKind::Any, _)
            | (ParamKind::Float, Arg::Float(_))
            | (ParamKind::String, Arg::Str(_)) => true,
            (ParamKind::Float | ParamKind::String, _) => false,
            (_, Arg::Int(value)) => {
                if param.is_register() && !(0..REGISTER_COUNT as i32).contains(value) {
                    return Err(IrError::RegisterOutOfRange(*value));
                }
                true
            }
            (_, Arg::Float(_) | Arg::Str(_)) => false,
        };
        if !ok {
            return Err(IrError::ArgumentType {
                mnemonic: opcode.mnemonic,
                index,
                expected: param.name(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcode::*;

    #[test]
    fn test_argument_count_checked() {
        let err = Instruction::new(&OP_LETI, vec![Arg::Int(1)]).unwrap_err();
        assert!(matches!(err, IrError::ArgumentCount { expected: 2, actual: 1, .. }));
        assert!(Instruction::new(&OP_RET, vec![Arg::Int(1)]).is_err());
    }

    #[test]
    fn test_argument_types_checked() {
        let err = Instruction::new(&OP_FLETI, vec![Arg::Int(1), Arg::Int(2)]).unwrap_err();
        assert!(matches!(err, IrError::ArgumentType { index: 1, .. }));
        let err = Instruction::new(&OP_LETI, vec![Arg::Int(300), Arg::Int(2)]).unwrap_err();
        assert_eq!(err, IrError::RegisterOutOfRange(300));
    }

    #[test]
    fn test_popping_opcodes_take_no_inline_arguments() {
        assert!(Instruction::new(&OP_SET_FLOOR_HANDLER, vec![]).is_ok());
        let err = Instruction::new(&OP_EXIT, vec![Arg::Int(0)]).unwrap_err();
        assert!(matches!(err, IrError::ArgumentCount { expected: 0, actual: 1, .. }));
    }

    #[test]
    fn test_variadic_arguments() {
        let inst = Instruction::new(
            &OP_SWITCH_JMP,
            vec![Arg::Int(5), Arg::Int(10), Arg::Int(20), Arg::Int(30)],
        )
        .unwrap();
        assert_eq!(inst.instruction_labels(), vec![10, 20, 30]);

        let inst = Instruction::new(&OP_JMP_ON, vec![Arg::Int(7)]).unwrap();
        assert_eq!(inst.instruction_labels(), vec![7]);
    }

    #[test]
    fn test_labels_of_conditional_jump() {
        let inst =
            Instruction::new(&OP_JMPI_L, vec![Arg::Int(10), Arg::Int(500), Arg::Int(3)]).unwrap();
        assert_eq!(inst.instruction_labels(), vec![3]);
    }

    #[test]
    fn test_display() {
        let inst = Instruction::new(&OP_LETI, vec![Arg::Int(6), Arg::Int(1337)]).unwrap();
        assert_eq!(inst.to_string(), "leti r6, 1337");
        let inst = Instruction::new(&OP_ARG_PUSHS, vec![Arg::from("hi")]).unwrap();
        assert_eq!(inst.to_string(), "arg_pushs \"hi\"");
        let inst = Instruction::new(&OP_RET, vec![]).unwrap();
        assert_eq!(inst.to_string(), "ret");
    }
}
