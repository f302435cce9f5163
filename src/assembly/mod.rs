//! CIL instructions, instruction sequences and body verification.
//!
//! This module holds everything that deals with method bodies at the instruction level:
//!
//! - [`opcodes`] - The opcode table, with encodings, operand kinds and stack effects
//! - [`instruction`] - [`Instruction`] and [`Operand`], with short-form constructors
//! - [`sequence`] - [`InstructionSequence`], the unit the emitter hands back
//! - [`verifier`] - A type-flow verifier for generated bodies
//!
//! # Examples
//!
//! ```rust
//! use weakevents::assembly::{Instruction, InstructionSequence, OpCode};
//!
//! let seq = InstructionSequence::from_instructions(vec![
//!     Instruction::ldarg(0),
//!     Instruction::simple(OpCode::Pop),
//! ])
//! .ret();
//!
//! assert_eq!(seq.len(), 3);
//! assert_eq!(seq.to_bytes()?, vec![0x02, 0x26, 0x2A]);
//! # Ok::<(), weakevents::Error>(())
//! ```

pub mod instruction;
pub mod opcodes;
pub mod sequence;
pub mod verifier;

pub use instruction::{Instruction, Operand};
pub use opcodes::{FlowType, OpCode, OperandType};
pub use sequence::InstructionSequence;
pub use verifier::{verify_method, StackSummary};
