//! References to methods outside the module and their generic instantiations.
//!
//! Runtime helpers (the weak event runtime, `System.Delegate`, `System.Action<T>`) are
//! reached through [`MemberRef`] rows. Generic helper methods are closed with a
//! [`MethodSpec`]; generic helper types are closed by giving the `MemberRef` a generic
//! instance as parent.

use crate::metadata::{token::Token, typesystem::TypeSig};

/// Signature of a callable method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSig {
    /// The method takes a `this` argument
    pub has_this: bool,
    /// Number of generic parameters of the method itself
    pub generic_params: u16,
    /// Parameter types, excluding `this`
    pub params: Vec<TypeSig>,
    /// Return type
    pub return_type: TypeSig,
}

impl MethodSig {
    /// Signature of a static method
    #[must_use]
    pub fn static_method(params: Vec<TypeSig>, return_type: TypeSig) -> Self {
        MethodSig {
            has_this: false,
            generic_params: 0,
            params,
            return_type,
        }
    }

    /// Signature of an instance method
    #[must_use]
    pub fn instance_method(params: Vec<TypeSig>, return_type: TypeSig) -> Self {
        MethodSig {
            has_this: true,
            generic_params: 0,
            params,
            return_type,
        }
    }

    /// Make the method generic over `count` parameters
    #[must_use]
    pub fn with_generic_params(mut self, count: u16) -> Self {
        self.generic_params = count;
        self
    }

    /// Close the signature over type and method arguments
    #[must_use]
    pub fn substitute(&self, type_args: &[TypeSig], method_args: &[TypeSig]) -> Self {
        MethodSig {
            has_this: self.has_this,
            generic_params: self.generic_params,
            params: self
                .params
                .iter()
                .map(|param| param.substitute(type_args, method_args))
                .collect(),
            return_type: self.return_type.substitute(type_args, method_args),
        }
    }
}

/// A reference to a method declared in another module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRef {
    /// The `MemberRef` token
    pub token: Token,
    /// Declaring type, possibly a generic instance
    pub parent: TypeSig,
    /// Method name
    pub name: String,
    /// Method signature as declared, generic parameters still open
    pub signature: MethodSig,
}

impl MemberRef {
    /// Returns true if this references `namespace.type_name::name` (any instantiation)
    #[must_use]
    pub fn is(&self, namespace: &str, type_name: &str, name: &str) -> bool {
        self.name == name
            && self
                .parent
                .type_name()
                .is_some_and(|parent| parent.namespace == namespace && parent.name == type_name)
    }

    /// Returns true for constructors
    #[must_use]
    pub fn is_constructor(&self) -> bool {
        self.name == ".ctor"
    }

    /// Signature with the parent's type arguments substituted
    #[must_use]
    pub fn closed_signature(&self, method_args: &[TypeSig]) -> MethodSig {
        self.signature
            .substitute(self.parent.generic_args(), method_args)
    }
}

/// A generic method instantiation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSpec {
    /// The `MethodSpec` token
    pub token: Token,
    /// The generic method (`MemberRef` or `MethodDef`)
    pub method: Token,
    /// Method type arguments
    pub instantiation: Vec<TypeSig>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_signature_of_generic_parent() {
        let handler = TypeSig::generic(
            "System",
            "EventHandler`1",
            vec![TypeSig::class("Sample", "Args")],
        );
        let ctor = MemberRef {
            token: Token::new(0x0A000001),
            parent: TypeSig::generic("System", "Action`1", vec![handler.clone()]),
            name: ".ctor".to_string(),
            signature: MethodSig::instance_method(
                vec![TypeSig::Object, TypeSig::IntPtr],
                TypeSig::Void,
            ),
        };

        assert!(ctor.is_constructor());
        assert!(ctor.is("System", "Action`1", ".ctor"));
        assert!(!ctor.is("System", "Action`1", "Invoke"));

        let invoke = MemberRef {
            token: Token::new(0x0A000002),
            parent: ctor.parent.clone(),
            name: "Invoke".to_string(),
            signature: MethodSig::instance_method(vec![TypeSig::Var(0)], TypeSig::Void),
        };
        assert_eq!(invoke.closed_signature(&[]).params, vec![handler]);
    }

    #[test]
    fn closed_signature_of_generic_method() {
        let find_weak = MemberRef {
            token: Token::new(0x0A000003),
            parent: TypeSig::class("WeakEvents.Runtime", "WeakEventHandlerExtensions"),
            name: "FindWeak".to_string(),
            signature: MethodSig::static_method(
                vec![
                    TypeSig::class("System", "Delegate"),
                    TypeSig::generic("System", "EventHandler`1", vec![TypeSig::MVar(0)]),
                ],
                TypeSig::generic("System", "EventHandler`1", vec![TypeSig::MVar(0)]),
            )
            .with_generic_params(1),
        };

        let closed = find_weak.closed_signature(&[TypeSig::class("Sample", "Args")]);
        assert_eq!(
            closed.return_type.full_name(),
            "System.EventHandler`1<Sample.Args>"
        );
        assert_eq!(closed.params[0].full_name(), "System.Delegate");
        assert!(!closed.has_this);
    }
}
