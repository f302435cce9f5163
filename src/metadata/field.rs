//! Field definitions.
//!
//! The weaver only reads fields: an event's backing field provides the declared
//! delegate type, the static flag and the declaring type. Its declaration is never
//! changed, only the methods around it.

use bitflags::bitflags;

use crate::metadata::{token::Token, typesystem::TypeSig};

/// Bitmask for `ACCESS` state extraction
pub const FIELD_ACCESS_MASK: u16 = 0x0007;

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    /// Field attribute flags
    pub struct FieldAttributes: u16 {
        /// Accessible only by the parent type
        const PRIVATE = 0x0001;
        /// Accessible by sub-types only in this Assembly
        const FAM_AND_ASSEM = 0x0002;
        /// Accessibly by anyone in the Assembly
        const ASSEMBLY = 0x0003;
        /// Accessible only by type and sub-types
        const FAMILY = 0x0004;
        /// Accessibly by sub-types anywhere, plus anyone in assembly
        const FAM_OR_ASSEM = 0x0005;
        /// Accessibly by anyone who has visibility to this scope
        const PUBLIC = 0x0006;
        /// Defined on type, else per instance
        const STATIC = 0x0010;
        /// Field can only be initialized, not written to after init
        const INIT_ONLY = 0x0020;
        /// Value is compile time constant
        const LITERAL = 0x0040;
        /// Field is special
        const SPECIAL_NAME = 0x0200;
    }
}

/// A field definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// The `Field` token, assigned when the field is added to a module
    pub token: Token,
    /// The field name; for events the compiler names the backing field after the event
    pub name: String,
    /// `TypeDef` token of the declaring type
    pub declaring_type: Token,
    /// Attribute flags
    pub flags: FieldAttributes,
    /// The declared field type
    pub sig: TypeSig,
}

impl Field {
    /// Returns true if the field is per type instead of per instance
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.flags.contains(FieldAttributes::STATIC)
    }
}
