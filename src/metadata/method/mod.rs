//! Method definitions of a [`crate::metadata::module::Module`].
//!
//! # Key Components
//!
//! - [`Method`] - A method definition with signature, attributes and body
//! - [`MethodBody`] - The editable instruction stream and locals
//! - [`MethodAccessFlags`], [`MethodModifiers`] - Attribute flags
//! - [`VariableDefinition`] - A local slot handle
//!
//! A method back-references its declaring type through [`Method::declaring_type`]. That
//! token is a lookup relation into the module arena, the type does not own the method.

mod body;
mod types;

pub use body::*;
pub use types::*;

use crate::{
    assembly::InstructionSequence,
    metadata::{token::Token, typesystem::TypeSig},
    Result,
};

/// A method definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Method {
    /// The `MethodDef` token of this method, assigned when it is added to a module
    pub token: Token,
    /// The method name
    pub name: String,
    /// `TypeDef` token of the declaring type
    pub declaring_type: Token,
    /// Access flags
    pub access: MethodAccessFlags,
    /// Modifiers (static, virtual, hidebysig, ...)
    pub modifiers: MethodModifiers,
    /// Return type
    pub return_type: TypeSig,
    /// Formal parameters, excluding `this`
    pub params: Vec<Param>,
    /// Attributes applied to the method
    pub custom_attributes: Vec<CustomAttribute>,
    /// The implementation
    pub body: MethodBody,
}

impl Method {
    /// Returns true if the method has no `this` argument
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.modifiers.contains(MethodModifiers::STATIC)
    }

    /// Returns true if the method is private
    #[must_use]
    pub fn is_private(&self) -> bool {
        self.access == MethodAccessFlags::PRIVATE
    }

    /// The argument index of the first formal parameter (`ldarg` numbering)
    #[must_use]
    pub fn first_param_index(&self) -> u8 {
        u8::from(!self.is_static())
    }

    /// Returns true if an attribute with the given constructor is applied
    #[must_use]
    pub fn has_attribute(&self, constructor: Token) -> bool {
        self.custom_attributes
            .iter()
            .any(|attribute| attribute.constructor == constructor)
    }

    /// Allocate a new local slot of type `sig` in the body
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if no more locals can be addressed.
    pub fn create_variable(&mut self, sig: TypeSig) -> Result<VariableDefinition> {
        self.body.add_local(sig)
    }

    /// Splice `sequence` into the body before instruction `index`
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `index` is past the end of the body.
    pub fn insert_instructions(&mut self, sequence: InstructionSequence, index: usize) -> Result<()> {
        self.body.insert_instructions(sequence, index)
    }
}
