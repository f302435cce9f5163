//! CIL opcodes understood by the emitter, the verifier and the emulator (ECMA-335).
//!
//! Only the straight-line subset needed to build weak event plumbing is modelled.
//! Two-byte opcodes use the [`FE_PREFIX`] as their first byte.
#![allow(missing_docs)]

use strum::{EnumCount, EnumIter, IntoStaticStr};

/// Prefix byte shared by all two-byte opcodes
pub const FE_PREFIX: u8 = 0xFE;

/// Types of operands for CIL instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandType {
    /// No operand present
    None,
    /// Unsigned 8-bit argument or local index
    UInt8,
    /// Metadata token reference
    Token,
}

/// How an instruction affects control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowType {
    /// Falls through to the next instruction
    Sequential,
    /// Calls another method and falls through
    Call,
    /// Leaves the method
    Return,
}

/// A CIL opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumCount, IntoStaticStr)]
pub enum OpCode {
    #[strum(serialize = "nop")]
    Nop,
    #[strum(serialize = "ldarg.0")]
    Ldarg0,
    #[strum(serialize = "ldarg.1")]
    Ldarg1,
    #[strum(serialize = "ldarg.2")]
    Ldarg2,
    #[strum(serialize = "ldarg.3")]
    Ldarg3,
    #[strum(serialize = "ldloc.0")]
    Ldloc0,
    #[strum(serialize = "ldloc.1")]
    Ldloc1,
    #[strum(serialize = "ldloc.2")]
    Ldloc2,
    #[strum(serialize = "ldloc.3")]
    Ldloc3,
    #[strum(serialize = "stloc.0")]
    Stloc0,
    #[strum(serialize = "stloc.1")]
    Stloc1,
    #[strum(serialize = "stloc.2")]
    Stloc2,
    #[strum(serialize = "stloc.3")]
    Stloc3,
    #[strum(serialize = "ldarg.s")]
    LdargS,
    #[strum(serialize = "ldloc.s")]
    LdlocS,
    #[strum(serialize = "stloc.s")]
    StlocS,
    #[strum(serialize = "ldnull")]
    Ldnull,
    #[strum(serialize = "dup")]
    Dup,
    #[strum(serialize = "pop")]
    Pop,
    #[strum(serialize = "call")]
    Call,
    #[strum(serialize = "ret")]
    Ret,
    #[strum(serialize = "callvirt")]
    Callvirt,
    #[strum(serialize = "newobj")]
    Newobj,
    #[strum(serialize = "castclass")]
    Castclass,
    #[strum(serialize = "ldfld")]
    Ldfld,
    #[strum(serialize = "stfld")]
    Stfld,
    #[strum(serialize = "ldsfld")]
    Ldsfld,
    #[strum(serialize = "stsfld")]
    Stsfld,
    #[strum(serialize = "ldftn")]
    Ldftn,
}

impl OpCode {
    /// The instruction mnemonic, e.g. `ldarg.0`
    #[must_use]
    pub fn mnemonic(self) -> &'static str {
        self.into()
    }

    /// Encoded opcode bytes, `(prefix, opcode)` with a zero prefix for single-byte opcodes
    #[must_use]
    pub fn encoding(self) -> (u8, u8) {
        match self {
            OpCode::Nop => (0, 0x00),
            OpCode::Ldarg0 => (0, 0x02),
            OpCode::Ldarg1 => (0, 0x03),
            OpCode::Ldarg2 => (0, 0x04),
            OpCode::Ldarg3 => (0, 0x05),
            OpCode::Ldloc0 => (0, 0x06),
            OpCode::Ldloc1 => (0, 0x07),
            OpCode::Ldloc2 => (0, 0x08),
            OpCode::Ldloc3 => (0, 0x09),
            OpCode::Stloc0 => (0, 0x0A),
            OpCode::Stloc1 => (0, 0x0B),
            OpCode::Stloc2 => (0, 0x0C),
            OpCode::Stloc3 => (0, 0x0D),
            OpCode::LdargS => (0, 0x0E),
            OpCode::LdlocS => (0, 0x11),
            OpCode::StlocS => (0, 0x13),
            OpCode::Ldnull => (0, 0x14),
            OpCode::Dup => (0, 0x25),
            OpCode::Pop => (0, 0x26),
            OpCode::Call => (0, 0x28),
            OpCode::Ret => (0, 0x2A),
            OpCode::Callvirt => (0, 0x6F),
            OpCode::Newobj => (0, 0x73),
            OpCode::Castclass => (0, 0x74),
            OpCode::Ldfld => (0, 0x7B),
            OpCode::Stfld => (0, 0x7D),
            OpCode::Ldsfld => (0, 0x7E),
            OpCode::Stsfld => (0, 0x80),
            OpCode::Ldftn => (FE_PREFIX, 0x06),
        }
    }

    /// The operand this opcode expects
    #[must_use]
    pub fn operand_type(self) -> OperandType {
        match self {
            OpCode::LdargS | OpCode::LdlocS | OpCode::StlocS => OperandType::UInt8,
            OpCode::Call
            | OpCode::Callvirt
            | OpCode::Newobj
            | OpCode::Castclass
            | OpCode::Ldfld
            | OpCode::Stfld
            | OpCode::Ldsfld
            | OpCode::Stsfld
            | OpCode::Ldftn => OperandType::Token,
            _ => OperandType::None,
        }
    }

    /// Control flow behaviour of the opcode
    #[must_use]
    pub fn flow(self) -> FlowType {
        match self {
            OpCode::Ret => FlowType::Return,
            OpCode::Call | OpCode::Callvirt | OpCode::Newobj => FlowType::Call,
            _ => FlowType::Sequential,
        }
    }

    /// Fixed `(pops, pushes)` of the opcode.
    ///
    /// `None` for opcodes whose effect depends on the signature of their operand
    /// (`call`, `callvirt`, `newobj`) or on the enclosing method (`ret`).
    #[must_use]
    pub fn stack_effect(self) -> Option<(u8, u8)> {
        match self {
            OpCode::Nop => Some((0, 0)),
            OpCode::Ldarg0
            | OpCode::Ldarg1
            | OpCode::Ldarg2
            | OpCode::Ldarg3
            | OpCode::LdargS
            | OpCode::Ldloc0
            | OpCode::Ldloc1
            | OpCode::Ldloc2
            | OpCode::Ldloc3
            | OpCode::LdlocS
            | OpCode::Ldnull
            | OpCode::Ldsfld
            | OpCode::Ldftn => Some((0, 1)),
            OpCode::Stloc0
            | OpCode::Stloc1
            | OpCode::Stloc2
            | OpCode::Stloc3
            | OpCode::StlocS
            | OpCode::Pop
            | OpCode::Stsfld => Some((1, 0)),
            OpCode::Dup => Some((1, 2)),
            OpCode::Castclass | OpCode::Ldfld => Some((1, 1)),
            OpCode::Stfld => Some((2, 0)),
            OpCode::Call | OpCode::Callvirt | OpCode::Newobj | OpCode::Ret => None,
        }
    }
}
