//! CIL instruction representation.
//!
//! An [`Instruction`] is an opcode plus its operand. Constructors pick the short
//! encodings where ECMA-335 has them (`ldarg.1` instead of `ldarg.s 1`), so emitted
//! bodies look like compiler output.
//!
//! ```rust
//! use weakevents::assembly::{Instruction, OpCode};
//!
//! assert_eq!(Instruction::ldarg(1).opcode, OpCode::Ldarg1);
//! assert_eq!(Instruction::ldarg(7).to_string(), "ldarg.s 7");
//! ```

use std::fmt;

use crate::{
    assembly::opcodes::{OpCode, OperandType},
    metadata::token::Token,
    Result,
};

/// The operand of an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    /// No operand present
    None,
    /// Argument or local slot index
    Index(u8),
    /// Metadata token (field, method, type)
    Token(Token),
}

/// A single CIL instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    /// The opcode
    pub opcode: OpCode,
    /// The operand, matching [`OpCode::operand_type`]
    pub operand: Operand,
}

impl Instruction {
    /// An instruction without operand
    #[must_use]
    pub fn simple(opcode: OpCode) -> Self {
        Instruction {
            opcode,
            operand: Operand::None,
        }
    }

    /// An instruction with a metadata token operand
    #[must_use]
    pub fn with_token(opcode: OpCode, token: Token) -> Self {
        Instruction {
            opcode,
            operand: Operand::Token(token),
        }
    }

    /// Load argument `index`, including `this` at index 0 for instance methods
    #[must_use]
    pub fn ldarg(index: u8) -> Self {
        match index {
            0 => Self::simple(OpCode::Ldarg0),
            1 => Self::simple(OpCode::Ldarg1),
            2 => Self::simple(OpCode::Ldarg2),
            3 => Self::simple(OpCode::Ldarg3),
            _ => Instruction {
                opcode: OpCode::LdargS,
                operand: Operand::Index(index),
            },
        }
    }

    /// Load local `index`
    #[must_use]
    pub fn ldloc(index: u8) -> Self {
        match index {
            0 => Self::simple(OpCode::Ldloc0),
            1 => Self::simple(OpCode::Ldloc1),
            2 => Self::simple(OpCode::Ldloc2),
            3 => Self::simple(OpCode::Ldloc3),
            _ => Instruction {
                opcode: OpCode::LdlocS,
                operand: Operand::Index(index),
            },
        }
    }

    /// Store into local `index`
    #[must_use]
    pub fn stloc(index: u8) -> Self {
        match index {
            0 => Self::simple(OpCode::Stloc0),
            1 => Self::simple(OpCode::Stloc1),
            2 => Self::simple(OpCode::Stloc2),
            3 => Self::simple(OpCode::Stloc3),
            _ => Instruction {
                opcode: OpCode::StlocS,
                operand: Operand::Index(index),
            },
        }
    }

    /// The argument index addressed by an `ldarg` form
    #[must_use]
    pub fn argument_index(&self) -> Option<u8> {
        match (self.opcode, self.operand) {
            (OpCode::Ldarg0, _) => Some(0),
            (OpCode::Ldarg1, _) => Some(1),
            (OpCode::Ldarg2, _) => Some(2),
            (OpCode::Ldarg3, _) => Some(3),
            (OpCode::LdargS, Operand::Index(index)) => Some(index),
            _ => None,
        }
    }

    /// The local slot addressed by an `ldloc` or `stloc` form
    #[must_use]
    pub fn local_index(&self) -> Option<u8> {
        match (self.opcode, self.operand) {
            (OpCode::Ldloc0 | OpCode::Stloc0, _) => Some(0),
            (OpCode::Ldloc1 | OpCode::Stloc1, _) => Some(1),
            (OpCode::Ldloc2 | OpCode::Stloc2, _) => Some(2),
            (OpCode::Ldloc3 | OpCode::Stloc3, _) => Some(3),
            (OpCode::LdlocS | OpCode::StlocS, Operand::Index(index)) => Some(index),
            _ => None,
        }
    }

    /// The token operand, if any
    #[must_use]
    pub fn token(&self) -> Option<Token> {
        match self.operand {
            Operand::Token(token) => Some(token),
            _ => None,
        }
    }

    /// Append the ECMA-335 encoding of this instruction to `out`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the operand does not match the opcode.
    pub fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        let (prefix, opcode) = self.opcode.encoding();
        if prefix != 0 {
            out.push(prefix);
        }
        out.push(opcode);

        match (self.opcode.operand_type(), self.operand) {
            (OperandType::None, Operand::None) => {}
            (OperandType::UInt8, Operand::Index(index)) => out.push(index),
            (OperandType::Token, Operand::Token(token)) => {
                out.extend_from_slice(&token.value().to_le_bytes());
            }
            (expected, found) => {
                return Err(malformed_error!(
                    "Operand {:?} does not match '{}' (expects {:?})",
                    found,
                    self.opcode.mnemonic(),
                    expected
                ))
            }
        }

        Ok(())
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.operand {
            Operand::None => f.write_str(self.opcode.mnemonic()),
            Operand::Index(index) => write!(f, "{} {}", self.opcode.mnemonic(), index),
            Operand::Token(token) => write!(f, "{} {}", self.opcode.mnemonic(), token),
        }
    }
}
