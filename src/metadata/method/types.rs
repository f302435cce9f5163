//! Method attribute flags and supporting types for methods of a [`crate::metadata::module::Module`].
//!
//! # Key Types
//! - [`MethodAccessFlags`], [`MethodModifiers`]: Attribute flags
//! - [`Param`]: A formal parameter
//! - [`VariableDefinition`]: A local variable slot of a method body
//! - [`CustomAttribute`]: An attribute application

use bitflags::bitflags;

use crate::metadata::{token::Token, typesystem::TypeSig};

/// Bitmask for `ACCESS` state extraction
pub const METHOD_ACCESS_MASK: u16 = 0x0007;

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    /// Method access flags
    pub struct MethodAccessFlags: u16 {
        /// Member not referenceable
        const COMPILER_CONTROLLED = 0x0000;
        /// Accessible only by the parent type
        const PRIVATE = 0x0001;
        /// Accessible by sub-types only in this Assembly
        const FAM_AND_ASSEM = 0x0002;
        /// Accessibly by anyone in the Assembly
        const ASSEM = 0x0003;
        /// Accessible only by type and sub-types
        const FAMILY = 0x0004;
        /// Accessibly by sub-types anywhere, plus anyone in assembly
        const FAM_OR_ASSEM = 0x0005;
        /// Accessibly by anyone who has visibility to this scope
        const PUBLIC = 0x0006;
    }
}

impl MethodAccessFlags {
    /// Extract access flags from raw method attributes
    #[must_use]
    pub fn from_method_flags(flags: u16) -> Self {
        Self::from_bits_truncate(flags & METHOD_ACCESS_MASK)
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    /// Method modifiers and properties
    pub struct MethodModifiers: u16 {
        /// Defined on type, else per instance
        const STATIC = 0x0010;
        /// Method cannot be overridden
        const FINAL = 0x0020;
        /// Method is virtual
        const VIRTUAL = 0x0040;
        /// Method hides by name+sig, else just by name
        const HIDE_BY_SIG = 0x0080;
        /// Method is special
        const SPECIAL_NAME = 0x0800;
        /// CLI provides 'special' behavior, dpending upon the name of the method
        const RTSPECIAL_NAME = 0x1000;
    }
}

impl MethodModifiers {
    /// Extract method modifiers from raw method attributes
    #[must_use]
    pub fn from_method_flags(flags: u16) -> Self {
        Self::from_bits_truncate(flags & !METHOD_ACCESS_MASK)
    }
}

/// A formal parameter of a method.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Param {
    /// Parameter name, synthesized parameters may be unnamed
    pub name: Option<String>,
    /// Parameter type
    pub sig: TypeSig,
}

/// A local variable slot of a method body.
///
/// Handed out by [`crate::metadata::method::Method::create_variable`]; the index is
/// stable for the lifetime of the body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VariableDefinition {
    /// Zero-based slot index
    pub index: u16,
    /// Declared type of the slot
    pub sig: TypeSig,
}

/// An attribute applied to a method, identified by its constructor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CustomAttribute {
    /// `MemberRef` or `MethodDef` token of the attribute constructor
    pub constructor: Token,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_raw_flags() {
        // private static hidebysig
        let raw = 0x0001 | 0x0010 | 0x0080;
        assert_eq!(
            MethodAccessFlags::from_method_flags(raw),
            MethodAccessFlags::PRIVATE
        );
        assert_eq!(
            MethodModifiers::from_method_flags(raw),
            MethodModifiers::STATIC | MethodModifiers::HIDE_BY_SIG
        );
    }

    #[test]
    fn public_is_not_private() {
        let access = MethodAccessFlags::from_method_flags(0x0006);
        assert_eq!(access, MethodAccessFlags::PUBLIC);
        assert_ne!(access, MethodAccessFlags::PRIVATE);
    }
}
