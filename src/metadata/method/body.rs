//! In-memory method bodies.
//!
//! A [`MethodBody`] is an editable list of instructions plus the local variable
//! signature of the method. Bodies are mutated in place by the weaver: new locals are
//! appended and whole [`InstructionSequence`]s are spliced in at instruction boundaries.

use crate::{
    assembly::{Instruction, InstructionSequence},
    metadata::{method::VariableDefinition, typesystem::TypeSig},
    Error::OutOfBounds,
    Result,
};

/// Describes the implementation of one method.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MethodBody {
    /// The instruction stream
    pub instructions: Vec<Instruction>,
    /// Local variable slots, indexed by [`VariableDefinition::index`]
    pub locals: Vec<VariableDefinition>,
    /// Flag, indicating to zero-initialize all local variables
    pub init_locals: bool,
}

impl MethodBody {
    /// Create an empty body
    #[must_use]
    pub fn new() -> Self {
        MethodBody {
            instructions: Vec::new(),
            locals: Vec::new(),
            init_locals: true,
        }
    }

    /// Allocate a new local slot of type `sig`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] once the short local index range is exhausted.
    pub fn add_local(&mut self, sig: TypeSig) -> Result<VariableDefinition> {
        let index = u8::try_from(self.locals.len()).map_err(|_| OutOfBounds)?;
        let variable = VariableDefinition {
            index: u16::from(index),
            sig,
        };
        self.locals.push(variable.clone());
        Ok(variable)
    }

    /// Splice `sequence` into the body before the instruction at `index`.
    ///
    /// `index == len` appends.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `index` is past the end of the body.
    pub fn insert_instructions(&mut self, sequence: InstructionSequence, index: usize) -> Result<()> {
        if index > self.instructions.len() {
            return Err(OutOfBounds);
        }

        self.instructions
            .splice(index..index, sequence.into_instructions());
        Ok(())
    }

    /// The local slot with the given index
    #[must_use]
    pub fn local(&self, index: u16) -> Option<&VariableDefinition> {
        self.locals.get(usize::from(index))
    }

    /// Returns true if the body has no instructions
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly::OpCode;

    #[test]
    fn locals_are_numbered_in_order() -> Result<()> {
        let mut body = MethodBody::new();
        let first = body.add_local(TypeSig::Object)?;
        let second = body.add_local(TypeSig::class("Sample", "ChangedHandler"))?;

        assert_eq!(first.index, 0);
        assert_eq!(second.index, 1);
        assert_eq!(body.local(1), Some(&second));
        assert!(body.local(2).is_none());
        Ok(())
    }

    #[test]
    fn insert_at_start_middle_and_end() -> Result<()> {
        let mut body = MethodBody::new();
        body.insert_instructions(InstructionSequence::new().ret(), 0)?;
        body.insert_instructions(
            InstructionSequence::from_instructions(vec![Instruction::ldarg(0)]),
            0,
        )?;
        body.insert_instructions(
            InstructionSequence::from_instructions(vec![Instruction::simple(OpCode::Pop)]),
            1,
        )?;
        body.insert_instructions(
            InstructionSequence::from_instructions(vec![Instruction::simple(OpCode::Nop)]),
            3,
        )?;

        let opcodes: Vec<OpCode> = body.instructions.iter().map(|i| i.opcode).collect();
        assert_eq!(
            opcodes,
            vec![OpCode::Ldarg0, OpCode::Pop, OpCode::Ret, OpCode::Nop]
        );
        Ok(())
    }

    #[test]
    fn insert_past_end_fails() {
        let mut body = MethodBody::new();
        let result = body.insert_instructions(InstructionSequence::new().ret(), 1);
        assert!(matches!(result, Err(OutOfBounds)));
        assert!(body.is_empty());
    }
}
