//! Type definitions and references to types of other assemblies.

use bitflags::bitflags;

use crate::metadata::{
    memberref::MethodSig,
    token::Token,
    typesystem::{TypeName, TypeSig},
};

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    /// Type attribute flags
    pub struct TypeAttributes: u32 {
        /// Class is public scope
        const PUBLIC = 0x0000_0001;
        /// Class is abstract
        const ABSTRACT = 0x0000_0080;
        /// Class is concrete and may not be extended
        const SEALED = 0x0000_0100;
        /// Class name is special
        const SPECIAL_NAME = 0x0000_0400;
    }
}

/// A type definition.
///
/// Fields and methods are listed by token; the rows themselves live in the module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDef {
    /// The `TypeDef` token
    pub token: Token,
    /// Namespace and name
    pub name: TypeName,
    /// Attribute flags
    pub flags: TypeAttributes,
    /// Base type, `None` for interfaces and `System.Object` itself
    pub extends: Option<TypeSig>,
    /// Fields declared by this type
    pub fields: Vec<Token>,
    /// Methods declared by this type
    pub methods: Vec<Token>,
}

impl TypeDef {
    /// Namespace qualified name
    #[must_use]
    pub fn full_name(&self) -> String {
        self.name.full_name()
    }

    /// The signature referring to this type
    #[must_use]
    pub fn sig(&self) -> TypeSig {
        TypeSig::Class(self.name.clone())
    }

    /// Returns true if the type derives from `System.MulticastDelegate`
    #[must_use]
    pub fn is_delegate(&self) -> bool {
        self.extends
            .as_ref()
            .is_some_and(|base| base.is_class("System", "MulticastDelegate"))
    }
}

/// A reference to a type defined in another assembly.
///
/// Only as much of the referenced type is recorded as weaving needs: for a delegate
/// type that is the signature of its `Invoke` method, which carries the event
/// argument type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRef {
    /// The `TypeRef` token
    pub token: Token,
    /// Namespace and name
    pub name: TypeName,
    /// Name of the assembly the type resolves to
    pub scope: String,
    /// Signature of `Invoke` if the referenced type is a delegate
    pub invoke: Option<MethodSig>,
}

impl TypeRef {
    /// Namespace qualified name
    #[must_use]
    pub fn full_name(&self) -> String {
        self.name.full_name()
    }

    /// The signature referring to this type
    #[must_use]
    pub fn sig(&self) -> TypeSig {
        TypeSig::Class(self.name.clone())
    }

    /// Returns true if the referenced type is known to be a delegate
    #[must_use]
    pub fn is_delegate(&self) -> bool {
        self.invoke.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delegate_detection() {
        let mut typedef = TypeDef {
            token: Token::new(0x02000002),
            name: TypeName::new("Sample", "ChangedHandler"),
            flags: TypeAttributes::PUBLIC | TypeAttributes::SEALED,
            extends: Some(TypeSig::class("System", "MulticastDelegate")),
            fields: Vec::new(),
            methods: Vec::new(),
        };
        assert!(typedef.is_delegate());
        assert_eq!(typedef.full_name(), "Sample.ChangedHandler");
        assert_eq!(typedef.sig(), TypeSig::class("Sample", "ChangedHandler"));

        typedef.extends = Some(TypeSig::Object);
        assert!(!typedef.is_delegate());
    }
}
