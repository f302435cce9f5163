//! Ordered instruction lists produced by the emitter.

use std::fmt;

use crate::{
    assembly::{instruction::Instruction, opcodes::OpCode},
    metadata::token::Token,
    Result,
};

/// An ordered list of instructions forming part or all of a method body.
///
/// Sequences are what the [`crate::weaving::IlEmitter`] hands back once a value has been
/// stored away. They leave the evaluation stack as they found it, so they can be spliced
/// into a body at any instruction boundary with
/// [`crate::metadata::method::MethodBody::insert_instructions`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstructionSequence {
    instructions: Vec<Instruction>,
}

impl InstructionSequence {
    /// Create an empty sequence
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap already built instructions
    #[must_use]
    pub fn from_instructions(instructions: Vec<Instruction>) -> Self {
        InstructionSequence { instructions }
    }

    /// Append a `ret`
    #[must_use]
    pub fn ret(mut self) -> Self {
        self.instructions.push(Instruction::simple(OpCode::Ret));
        self
    }

    /// Append all instructions of `other`
    #[must_use]
    pub fn append(mut self, other: InstructionSequence) -> Self {
        self.instructions.extend(other.instructions);
        self
    }

    /// Append a single instruction
    pub fn push(&mut self, instruction: Instruction) {
        self.instructions.push(instruction);
    }

    /// Number of instructions
    #[must_use]
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Returns true if there are no instructions
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Iterate over the instructions
    pub fn iter(&self) -> std::slice::Iter<'_, Instruction> {
        self.instructions.iter()
    }

    /// Borrow the instructions
    #[must_use]
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Take the instructions
    #[must_use]
    pub fn into_instructions(self) -> Vec<Instruction> {
        self.instructions
    }

    /// Number of instructions with the given opcode
    #[must_use]
    pub fn count_opcode(&self, opcode: OpCode) -> usize {
        self.instructions
            .iter()
            .filter(|instr| instr.opcode == opcode)
            .count()
    }

    /// Number of `call`s whose operand is one of `targets`
    #[must_use]
    pub fn count_calls_to(&self, targets: &[Token]) -> usize {
        self.instructions
            .iter()
            .filter(|instr| instr.opcode == OpCode::Call)
            .filter(|instr| instr.token().is_some_and(|token| targets.contains(&token)))
            .count()
    }

    /// Encode the sequence into CIL bytecode
    ///
    /// # Errors
    /// Returns an error if an instruction carries an operand that does not match its opcode.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.instructions.len() * 5);
        for instruction in &self.instructions {
            instruction.encode(&mut out)?;
        }
        Ok(out)
    }
}

impl<'a> IntoIterator for &'a InstructionSequence {
    type Item = &'a Instruction;
    type IntoIter = std::slice::Iter<'a, Instruction>;

    fn into_iter(self) -> Self::IntoIter {
        self.instructions.iter()
    }
}

impl fmt::Display for InstructionSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, instruction) in self.instructions.iter().enumerate() {
            writeln!(f, "IL_{index:04}: {instruction}")?;
        }
        Ok(())
    }
}
