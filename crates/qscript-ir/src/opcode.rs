//! Opcode descriptors and classification.
//!
//! Every opcode carries its numeric code, its mnemonic, the kinds of its
//! parameters and how it interacts with the implicit argument stack. The
//! [`OpClass`] groups opcodes by behavior so consumers can match
//! exhaustively instead of switching on raw codes.

use std::fmt;
use std::sync::OnceLock;

use rustc_hash::FxHashMap;

/// How an instruction accesses a register operand.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Access {
    Read,
    Write,
    ReadWrite,
}

impl Access {
    /// True if the register may be overwritten.
    #[must_use]
    pub const fn writes(self) -> bool {
        matches!(self, Self::Write | Self::ReadWrite)
    }
}

/// Kind of a single opcode parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamKind {
    Byte,
    Word,
    DWord,
    Float,
    /// Label of an instruction segment.
    ILabel,
    /// Any number of instruction labels; always the last parameter.
    ILabelVar,
    /// Label of a data or string segment.
    Label,
    String,
    /// Base register of a register range whose length is another argument.
    RegRef(Access),
    /// Any number of registers; always the last parameter.
    RegRefVar(Access),
    /// A base register followed implicitly by `len - 1` consecutive ones.
    RegTupRef(&'static [Access]),
    Any,
}

impl ParamKind {
    /// True for parameters that absorb all remaining arguments.
    #[must_use]
    pub const fn is_variadic(self) -> bool {
        matches!(self, Self::ILabelVar | Self::RegRefVar(_))
    }

    /// True for parameters naming an instruction segment.
    #[must_use]
    pub const fn is_instruction_label(self) -> bool {
        matches!(self, Self::ILabel | Self::ILabelVar)
    }

    /// True for parameters naming a register.
    #[must_use]
    pub const fn is_register(self) -> bool {
        matches!(
            self,
            Self::RegRef(_) | Self::RegRefVar(_) | Self::RegTupRef(_)
        )
    }

    /// Human readable kind name used in diagnostics.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Byte => "byte",
            Self::Word => "word",
            Self::DWord => "dword",
            Self::Float => "float",
            Self::ILabel | Self::ILabelVar => "instruction label",
            Self::Label => "label",
            Self::String => "string",
            Self::RegRef(_) | Self::RegRefVar(_) | Self::RegTupRef(_) => "register",
            Self::Any => "any",
        }
    }
}

/// Interaction of an opcode with the argument stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum StackInteraction {
    /// Arguments are encoded inline.
    #[default]
    None,
    /// The instruction pushes its argument onto the argument stack.
    Push,
    /// The instruction's arguments were pushed beforehand.
    Pop,
}

/// Integer width of a literal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Width {
    Byte,
    Word,
    DWord,
}

/// Second operand of a binary operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operand {
    Register,
    Immediate,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
}

impl Comparison {
    /// Evaluate the comparison on any ordered operands.
    #[must_use]
    pub fn holds<T: PartialOrd>(self, a: T, b: T) -> bool {
        match self {
            Self::Eq => a == b,
            Self::Ne => a != b,
            Self::Gt => a > b,
            Self::Lt => a < b,
            Self::Ge => a >= b,
            Self::Le => a <= b,
        }
    }
}

/// Condition tested by a conditional jump.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JumpCondition {
    /// Jump when every listed register is non-zero.
    AllSet,
    /// Jump when every listed register is zero.
    AllClear,
    Compare {
        cmp: Comparison,
        signed: bool,
        operand: Operand,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IntOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    And,
    Or,
    Xor,
    Shl,
    Shr,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FloatOp {
    Add,
    Sub,
    Mul,
    Div,
}

/// Value pushed by an `arg_push*` instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PushSource {
    Register,
    Literal(Width),
    RegisterAddress,
    LabelAddress,
    String,
}

/// Behavioral class of an opcode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpClass {
    Nop,
    Return,
    Sync,
    Exit,
    StartThread,
    VaStart,
    VaEnd,
    VaCall,
    Jump,
    Call,
    ConditionalJump(JumpCondition),
    SwitchJump,
    SwitchCall,
    Let,
    LetImmediate(Width),
    SyncLetImmediate,
    LetAddress,
    LetLabelAddress,
    Set,
    Clear,
    Rev,
    Int { op: IntOp, operand: Operand },
    FloatLetImmediate,
    Float { op: FloatOp, operand: Operand },
    StackPush,
    StackPop,
    StackPushMulti,
    StackPopMulti,
    ArgPush(PushSource),
    IfZoneClear,
    GetDifficultyLevel,
    GetSlotNumber,
    GetRandom,
    GetTime,
    MapDesignate,
    MapDesignateEx,
    BbMapDesignate,
    SetFloorHandler,
    SetEpisode,
    WindowMessage,
    AddMessage,
    MessageEnd,
    WindowEnd,
    PlayerDead,
}

/// Non-sequential control flow caused by an instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlTransfer {
    Return,
    Jump,
    ConditionalJump,
    Call,
}

impl OpClass {
    /// How instructions of this class leave the sequential flow, if at all.
    #[must_use]
    pub const fn control_transfer(self) -> Option<ControlTransfer> {
        match self {
            Self::Return => Some(ControlTransfer::Return),
            Self::Jump => Some(ControlTransfer::Jump),
            Self::ConditionalJump(_) | Self::SwitchJump => Some(ControlTransfer::ConditionalJump),
            Self::Call | Self::VaCall | Self::SwitchCall => Some(ControlTransfer::Call),
            Self::Nop
            | Self::Sync
            | Self::Exit
            | Self::StartThread
            | Self::VaStart
            | Self::VaEnd
            | Self::Let
            | Self::LetImmediate(_)
            | Self::SyncLetImmediate
            | Self::LetAddress
            | Self::LetLabelAddress
            | Self::Set
            | Self::Clear
            | Self::Rev
            | Self::Int { .. }
            | Self::FloatLetImmediate
            | Self::Float { .. }
            | Self::StackPush
            | Self::StackPop
            | Self::StackPushMulti
            | Self::StackPopMulti
            | Self::ArgPush(_)
            | Self::IfZoneClear
            | Self::GetDifficultyLevel
            | Self::GetSlotNumber
            | Self::GetRandom
            | Self::GetTime
            | Self::MapDesignate
            | Self::MapDesignateEx
            | Self::BbMapDesignate
            | Self::SetFloorHandler
            | Self::SetEpisode
            | Self::WindowMessage
            | Self::AddMessage
            | Self::MessageEnd
            | Self::WindowEnd
            | Self::PlayerDead => None,
        }
    }
}

/// Immutable opcode descriptor.
#[derive(Clone, Copy)]
pub struct Opcode {
    pub code: u16,
    pub mnemonic: &'static str,
    pub params: &'static [ParamKind],
    pub stack: StackInteraction,
    pub class: OpClass,
}

impl Opcode {
    /// Look up an opcode by numeric code.
    #[must_use]
    pub fn by_code(code: u16) -> Option<&'static Self> {
        tables().by_code.get(&code).copied()
    }

    /// Look up an opcode by mnemonic.
    #[must_use]
    pub fn by_mnemonic(mnemonic: &str) -> Option<&'static Self> {
        tables().by_mnemonic.get(mnemonic).copied()
    }

    /// Number of stack slots consumed by a pop-mode opcode.
    #[must_use]
    pub const fn popped_args(&self) -> usize {
        match self.stack {
            StackInteraction::Pop => self.params.len(),
            StackInteraction::None | StackInteraction::Push => 0,
        }
    }

    /// Opcode codes above 0xff are encoded with a two byte prefix.
    #[must_use]
    pub const fn size(&self) -> usize {
        if self.code > 0xff { 2 } else { 1 }
    }
}

impl PartialEq for Opcode {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code
    }
}

impl Eq for Opcode {}

impl fmt::Debug for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(0x{:02x})", self.mnemonic, self.code)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic)
    }
}

struct Tables {
    by_code: FxHashMap<u16, &'static Opcode>,
    by_mnemonic: FxHashMap<&'static str, &'static Opcode>,
}

static TABLES: OnceLock<Tables> = OnceLock::new();

fn tables() -> &'static Tables {
    TABLES.get_or_init(|| {
        let mut by_code = FxHashMap::default();
        let mut by_mnemonic = FxHashMap::default();
        for opcode in OPCODES {
            by_code.insert(opcode.code, opcode);
            by_mnemonic.insert(opcode.mnemonic, opcode);
        }
        Tables {
            by_code,
            by_mnemonic,
        }
    })
}

const R: ParamKind = ParamKind::RegTupRef(&[Access::Read]);
const W: ParamKind = ParamKind::RegTupRef(&[Access::Write]);
const RW: ParamKind = ParamKind::RegTupRef(&[Access::ReadWrite]);
const R2: ParamKind = ParamKind::RegTupRef(&[Access::Read, Access::Read]);
const DW: ParamKind = ParamKind::DWord;
const IL: ParamKind = ParamKind::ILabel;

macro_rules! opcodes {
    ($($name:ident = $code:literal, $mnemonic:literal, [$($param:expr),*], $stack:ident, $class:expr;)*) => {
        $(
            pub const $name: Opcode = Opcode {
                code: $code,
                mnemonic: $mnemonic,
                params: &[$($param),*],
                stack: StackInteraction::$stack,
                class: $class,
            };
        )*

        /// Every opcode known to the toolchain.
        pub static OPCODES: &[Opcode] = &[$($name),*];
    };
}

const fn cmp(cmp: Comparison, signed: bool, operand: Operand) -> OpClass {
    OpClass::ConditionalJump(JumpCondition::Compare {
        cmp,
        signed,
        operand,
    })
}

const fn int(op: IntOp, operand: Operand) -> OpClass {
    OpClass::Int { op, operand }
}

const fn float(op: FloatOp, operand: Operand) -> OpClass {
    OpClass::Float { op, operand }
}

use Comparison::{Eq as CEq, Ge, Gt, Le, Lt, Ne};
use Operand::{Immediate as Imm, Register as Reg};

opcodes! {
    OP_NOP = 0x00, "nop", [], None, OpClass::Nop;
    OP_RET = 0x01, "ret", [], None, OpClass::Return;
    OP_SYNC = 0x02, "sync", [], None, OpClass::Sync;
    OP_EXIT = 0x03, "exit", [DW], Pop, OpClass::Exit;
    OP_THREAD = 0x04, "thread", [IL], None, OpClass::StartThread;
    OP_VA_START = 0x05, "va_start", [], None, OpClass::VaStart;
    OP_VA_END = 0x06, "va_end", [], None, OpClass::VaEnd;
    OP_VA_CALL = 0x07, "va_call", [IL], None, OpClass::VaCall;
    OP_LET = 0x08, "let", [W, R], None, OpClass::Let;
    OP_LETI = 0x09, "leti", [W, DW], None, OpClass::LetImmediate(Width::DWord);
    OP_LETB = 0x0a, "letb", [W, ParamKind::Byte], None, OpClass::LetImmediate(Width::Byte);
    OP_LETW = 0x0b, "letw", [W, ParamKind::Word], None, OpClass::LetImmediate(Width::Word);
    OP_LETA = 0x0c, "leta", [W, R], None, OpClass::LetAddress;
    OP_LETO = 0x0d, "leto", [W, ParamKind::Label], None, OpClass::LetLabelAddress;
    OP_SET = 0x10, "set", [W], None, OpClass::Set;
    OP_CLEAR = 0x11, "clear", [W], None, OpClass::Clear;
    OP_REV = 0x12, "rev", [RW], None, OpClass::Rev;
    OP_ADD = 0x18, "add", [W, R], None, int(IntOp::Add, Reg);
    OP_ADDI = 0x19, "addi", [W, DW], None, int(IntOp::Add, Imm);
    OP_SUB = 0x1a, "sub", [W, R], None, int(IntOp::Sub, Reg);
    OP_SUBI = 0x1b, "subi", [W, DW], None, int(IntOp::Sub, Imm);
    OP_MUL = 0x1c, "mul", [W, R], None, int(IntOp::Mul, Reg);
    OP_MULI = 0x1d, "muli", [W, DW], None, int(IntOp::Mul, Imm);
    OP_DIV = 0x1e, "div", [W, R], None, int(IntOp::Div, Reg);
    OP_DIVI = 0x1f, "divi", [W, DW], None, int(IntOp::Div, Imm);
    OP_AND = 0x20, "and", [W, R], None, int(IntOp::And, Reg);
    OP_ANDI = 0x21, "andi", [W, DW], None, int(IntOp::And, Imm);
    OP_OR = 0x22, "or", [W, R], None, int(IntOp::Or, Reg);
    OP_ORI = 0x23, "ori", [W, DW], None, int(IntOp::Or, Imm);
    OP_XOR = 0x24, "xor", [W, R], None, int(IntOp::Xor, Reg);
    OP_XORI = 0x25, "xori", [W, DW], None, int(IntOp::Xor, Imm);
    OP_MOD = 0x26, "mod", [W, R], None, int(IntOp::Mod, Reg);
    OP_MODI = 0x27, "modi", [W, DW], None, int(IntOp::Mod, Imm);
    OP_JMP = 0x28, "jmp", [IL], None, OpClass::Jump;
    OP_CALL = 0x29, "call", [IL], None, OpClass::Call;
    OP_JMP_ON = 0x2a, "jmp_on", [IL, ParamKind::RegRefVar(Access::Read)], None,
        OpClass::ConditionalJump(JumpCondition::AllSet);
    OP_JMP_OFF = 0x2b, "jmp_off", [IL, ParamKind::RegRefVar(Access::Read)], None,
        OpClass::ConditionalJump(JumpCondition::AllClear);
    OP_JMP_E = 0x2c, "jmp_=", [R, R, IL], None, cmp(CEq, true, Reg);
    OP_JMPI_E = 0x2d, "jmpi_=", [R, DW, IL], None, cmp(CEq, true, Imm);
    OP_JMP_NE = 0x2e, "jmp_!=", [R, R, IL], None, cmp(Ne, true, Reg);
    OP_JMPI_NE = 0x2f, "jmpi_!=", [R, DW, IL], None, cmp(Ne, true, Imm);
    OP_UJMP_G = 0x30, "ujmp_>", [R, R, IL], None, cmp(Gt, false, Reg);
    OP_UJMPI_G = 0x31, "ujmpi_>", [R, DW, IL], None, cmp(Gt, false, Imm);
    OP_JMP_G = 0x32, "jmp_>", [R, R, IL], None, cmp(Gt, true, Reg);
    OP_JMPI_G = 0x33, "jmpi_>", [R, DW, IL], None, cmp(Gt, true, Imm);
    OP_UJMP_L = 0x34, "ujmp_<", [R, R, IL], None, cmp(Lt, false, Reg);
    OP_UJMPI_L = 0x35, "ujmpi_<", [R, DW, IL], None, cmp(Lt, false, Imm);
    OP_JMP_L = 0x36, "jmp_<", [R, R, IL], None, cmp(Lt, true, Reg);
    OP_JMPI_L = 0x37, "jmpi_<", [R, DW, IL], None, cmp(Lt, true, Imm);
    OP_UJMP_GE = 0x38, "ujmp_>=", [R, R, IL], None, cmp(Ge, false, Reg);
    OP_UJMPI_GE = 0x39, "ujmpi_>=", [R, DW, IL], None, cmp(Ge, false, Imm);
    OP_JMP_GE = 0x3a, "jmp_>=", [R, R, IL], None, cmp(Ge, true, Reg);
    OP_JMPI_GE = 0x3b, "jmpi_>=", [R, DW, IL], None, cmp(Ge, true, Imm);
    OP_UJMP_LE = 0x3c, "ujmp_<=", [R, R, IL], None, cmp(Le, false, Reg);
    OP_UJMPI_LE = 0x3d, "ujmpi_<=", [R, DW, IL], None, cmp(Le, false, Imm);
    OP_JMP_LE = 0x3e, "jmp_<=", [R, R, IL], None, cmp(Le, true, Reg);
    OP_JMPI_LE = 0x3f, "jmpi_<=", [R, DW, IL], None, cmp(Le, true, Imm);
    OP_SWITCH_JMP = 0x40, "switch_jmp", [R, ParamKind::ILabelVar], None, OpClass::SwitchJump;
    OP_SWITCH_CALL = 0x41, "switch_call", [R, ParamKind::ILabelVar], None, OpClass::SwitchCall;
    OP_STACK_PUSH = 0x42, "stack_push", [R], None, OpClass::StackPush;
    OP_STACK_POP = 0x43, "stack_pop", [W], None, OpClass::StackPop;
    OP_STACK_PUSHM = 0x44, "stack_pushm", [ParamKind::RegRef(Access::Read), DW], None,
        OpClass::StackPushMulti;
    OP_STACK_POPM = 0x45, "stack_popm", [ParamKind::RegRef(Access::Write), DW], None,
        OpClass::StackPopMulti;
    OP_ARG_PUSHR = 0x48, "arg_pushr", [R], Push, OpClass::ArgPush(PushSource::Register);
    OP_ARG_PUSHL = 0x49, "arg_pushl", [DW], Push,
        OpClass::ArgPush(PushSource::Literal(Width::DWord));
    OP_ARG_PUSHB = 0x4a, "arg_pushb", [ParamKind::Byte], Push,
        OpClass::ArgPush(PushSource::Literal(Width::Byte));
    OP_ARG_PUSHW = 0x4b, "arg_pushw", [ParamKind::Word], Push,
        OpClass::ArgPush(PushSource::Literal(Width::Word));
    OP_ARG_PUSHA = 0x4c, "arg_pusha", [R], Push, OpClass::ArgPush(PushSource::RegisterAddress);
    OP_ARG_PUSHO = 0x4d, "arg_pusho", [ParamKind::Label], Push,
        OpClass::ArgPush(PushSource::LabelAddress);
    OP_ARG_PUSHS = 0x4e, "arg_pushs", [ParamKind::String], Push,
        OpClass::ArgPush(PushSource::String);
    OP_WINDOW_MSG = 0x5a, "window_msg", [ParamKind::String], Pop, OpClass::WindowMessage;
    OP_ADD_MSG = 0x5b, "add_msg", [ParamKind::String], Pop, OpClass::AddMessage;
    OP_MESEND = 0x5c, "mesend", [], None, OpClass::MessageEnd;
    OP_GETTIME = 0x5d, "gettime", [W], None, OpClass::GetTime;
    OP_WINEND = 0x5e, "winend", [], None, OpClass::WindowEnd;
    OP_P_DEAD_V3 = 0x6a, "p_dead_v3", [W, DW], Pop, OpClass::PlayerDead;
    OP_IF_ZONE_CLEAR = 0x88, "if_zone_clear", [W, R2], None, OpClass::IfZoneClear;
    OP_SET_FLOOR_HANDLER = 0x95, "set_floor_handler", [DW, IL], Pop, OpClass::SetFloorHandler;
    OP_THREAD_STG = 0xb1, "thread_stg", [IL], None, OpClass::StartThread;
    OP_GET_DIFFLVL = 0xb9, "get_difflvl", [W], None, OpClass::GetDifficultyLevel;
    OP_MAP_DESIGNATE = 0xc4, "map_designate",
        [ParamKind::RegTupRef(&[Access::Read, Access::Read, Access::Read, Access::Read])], None,
        OpClass::MapDesignate;
    OP_SYNC_LETI = 0xd9, "sync_leti", [W, DW], None, OpClass::SyncLetImmediate;
    OP_GET_SLOTNUMBER = 0xe6, "get_slotnumber", [W], None, OpClass::GetSlotNumber;
    OP_MAP_DESIGNATE_EX = 0xf80d, "map_designate_ex",
        [ParamKind::RegTupRef(&[
            Access::Read, Access::Read, Access::Read, Access::Read, Access::Read,
        ])], None,
        OpClass::MapDesignateEx;
    OP_SHIFT_LEFT = 0xf898, "shift_left", [W, R], None, int(IntOp::Shl, Reg);
    OP_SHIFT_RIGHT = 0xf899, "shift_right", [W, R], None, int(IntOp::Shr, Reg);
    OP_GET_RANDOM = 0xf89a, "get_random", [R2, W], None, OpClass::GetRandom;
    OP_SET_EPISODE = 0xf8bc, "set_episode", [DW], None, OpClass::SetEpisode;
    OP_FLETI = 0xf904, "fleti", [W, ParamKind::Float], None, OpClass::FloatLetImmediate;
    OP_FADD = 0xf908, "fadd", [W, R], None, float(FloatOp::Add, Reg);
    OP_FADDI = 0xf909, "faddi", [W, ParamKind::Float], None, float(FloatOp::Add, Imm);
    OP_FSUB = 0xf90a, "fsub", [W, R], None, float(FloatOp::Sub, Reg);
    OP_FSUBI = 0xf90b, "fsubi", [W, ParamKind::Float], None, float(FloatOp::Sub, Imm);
    OP_FMUL = 0xf90c, "fmul", [W, R], None, float(FloatOp::Mul, Reg);
    OP_FMULI = 0xf90d, "fmuli", [W, ParamKind::Float], None, float(FloatOp::Mul, Imm);
    OP_FDIV = 0xf90e, "fdiv", [W, R], None, float(FloatOp::Div, Reg);
    OP_FDIVI = 0xf90f, "fdivi", [W, ParamKind::Float], None, float(FloatOp::Div, Imm);
    OP_BB_MAP_DESIGNATE = 0xf951, "bb_map_designate",
        [ParamKind::Byte, ParamKind::Word, ParamKind::Byte, ParamKind::Byte], None,
        OpClass::BbMapDesignate;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustc_hash::FxHashSet;

    #[test]
    fn test_codes_and_mnemonics_unique() {
        let codes: FxHashSet<u16> = OPCODES.iter().map(|op| op.code).collect();
        let mnemonics: FxHashSet<&str> = OPCODES.iter().map(|op| op.mnemonic).collect();
        assert_eq!(codes.len(), OPCODES.len());
        assert_eq!(mnemonics.len(), OPCODES.len());
    }

    #[test]
    fn test_lookup() {
        assert_eq!(Opcode::by_code(0x09), Some(&OP_LETI));
        assert_eq!(Opcode::by_mnemonic("jmpi_<"), Some(&OP_JMPI_L));
        assert_eq!(Opcode::by_mnemonic("bb_map_designate").map(|op| op.code), Some(0xf951));
        assert!(Opcode::by_code(0xffff).is_none());
    }

    #[test]
    fn test_variadic_params_are_last() {
        for op in OPCODES {
            if let Some(pos) = op.params.iter().position(|p| p.is_variadic()) {
                assert_eq!(pos, op.params.len() - 1, "{}", op.mnemonic);
            }
        }
    }

    #[test]
    fn test_popped_args() {
        assert_eq!(OP_SET_FLOOR_HANDLER.popped_args(), 2);
        assert_eq!(OP_EXIT.popped_args(), 1);
        assert_eq!(OP_ARG_PUSHL.popped_args(), 0);
        assert_eq!(OP_LETI.popped_args(), 0);
    }

    #[test]
    fn test_comparison() {
        assert!(Comparison::Le.holds(3, 3));
        assert!(!Comparison::Gt.holds(-1, 0));
        assert!(Comparison::Gt.holds(u32::MAX, 0));
        assert!(Comparison::Ne.holds(1, 2));
    }

    #[test]
    fn test_control_transfer() {
        assert_eq!(OP_RET.class.control_transfer(), Some(ControlTransfer::Return));
        assert_eq!(
            OP_JMP_ON.class.control_transfer(),
            Some(ControlTransfer::ConditionalJump)
        );
        assert_eq!(
            OP_SWITCH_CALL.class.control_transfer(),
            Some(ControlTransfer::Call)
        );
        assert_eq!(OP_VA_CALL.class.control_transfer(), Some(ControlTransfer::Call));
        assert_eq!(OP_SYNC.class.control_transfer(), None);
        assert_eq!(OP_EXIT.class.control_transfer(), None);
    }

    #[test]
    fn test_opcode_size() {
        assert_eq!(OP_RET.size(), 1);
        assert_eq!(OP_GET_RANDOM.size(), 2);
    }
}
