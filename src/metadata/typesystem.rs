//! Type references used by signatures, stack slots and instruction operands.
//!
//! [`TypeSig`] is the single representation of "a type" across the crate. It is a
//! value type: two signatures describe the same type exactly when their
//! [`TypeSig::full_name`] strings are equal, which is the comparison the weaver uses to
//! decide whether an event already has the canonical generic handler shape.
//!
//! # Naming
//!
//! Generic type definitions carry their arity in the name (``EventHandler`1``), and a
//! generic instance renders its arguments in angle brackets:
//!
//! ```rust
//! use weakevents::metadata::typesystem::TypeSig;
//!
//! let args = TypeSig::class("Sample", "ChangedArgs");
//! let handler = TypeSig::generic("System", "EventHandler`1", vec![args]);
//! assert_eq!(handler.full_name(), "System.EventHandler`1<Sample.ChangedArgs>");
//! ```

use std::fmt;

/// Namespace qualified name of a class, delegate or generic type definition.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TypeName {
    /// Namespace, may be empty
    pub namespace: String,
    /// Simple name, including the generic arity suffix if any
    pub name: String,
}

impl TypeName {
    /// Create a new type name
    #[must_use]
    pub fn new(namespace: &str, name: &str) -> Self {
        TypeName {
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    /// Namespace qualified name (`Namespace.Name`, or `Name` without namespace)
    #[must_use]
    pub fn full_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name())
    }
}

/// A reference to a type, as it appears in field, method and local signatures.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeSig {
    /// `void`, only valid as a return type
    Void,
    /// `System.Object`
    Object,
    /// `System.IntPtr` (native int), the type `ldftn` pushes
    IntPtr,
    /// A non-generic class, delegate or generic type definition
    Class(TypeName),
    /// A generic type closed (or partially closed) over type arguments
    GenericInst {
        /// The generic type definition
        base: TypeName,
        /// Type arguments, in declaration order
        args: Vec<TypeSig>,
    },
    /// Generic parameter of the declaring type (`!n`)
    Var(u16),
    /// Generic parameter of the method (`!!n`)
    MVar(u16),
}

impl TypeSig {
    /// A non-generic class reference
    #[must_use]
    pub fn class(namespace: &str, name: &str) -> Self {
        TypeSig::Class(TypeName::new(namespace, name))
    }

    /// A generic instance of `namespace.name` over `args`
    #[must_use]
    pub fn generic(namespace: &str, name: &str, args: Vec<TypeSig>) -> Self {
        TypeSig::GenericInst {
            base: TypeName::new(namespace, name),
            args,
        }
    }

    /// Canonical fully qualified name of this type
    #[must_use]
    pub fn full_name(&self) -> String {
        match self {
            TypeSig::Void => "System.Void".to_string(),
            TypeSig::Object => "System.Object".to_string(),
            TypeSig::IntPtr => "System.IntPtr".to_string(),
            TypeSig::Class(name) => name.full_name(),
            TypeSig::GenericInst { base, args } => {
                let args: Vec<String> = args.iter().map(TypeSig::full_name).collect();
                format!("{}<{}>", base.full_name(), args.join(","))
            }
            TypeSig::Var(index) => format!("!{index}"),
            TypeSig::MVar(index) => format!("!!{index}"),
        }
    }

    /// Returns true for `void`
    #[must_use]
    pub fn is_void(&self) -> bool {
        matches!(self, TypeSig::Void)
    }

    /// Returns true for types that live on the stack as object references
    #[must_use]
    pub fn is_reference(&self) -> bool {
        matches!(
            self,
            TypeSig::Object | TypeSig::Class(_) | TypeSig::GenericInst { .. }
        )
    }

    /// The type name of a class or the definition of a generic instance
    #[must_use]
    pub fn type_name(&self) -> Option<&TypeName> {
        match self {
            TypeSig::Class(name) | TypeSig::GenericInst { base: name, .. } => Some(name),
            _ => None,
        }
    }

    /// Type arguments of a generic instance, empty for everything else
    #[must_use]
    pub fn generic_args(&self) -> &[TypeSig] {
        match self {
            TypeSig::GenericInst { args, .. } => args,
            _ => &[],
        }
    }

    /// Returns true if this is an instance of the generic definition `namespace.name`
    #[must_use]
    pub fn is_instance_of(&self, namespace: &str, name: &str) -> bool {
        matches!(self, TypeSig::GenericInst { base, .. } if base.namespace == namespace && base.name == name)
    }

    /// Returns true if this is the non-generic class `namespace.name`
    #[must_use]
    pub fn is_class(&self, namespace: &str, name: &str) -> bool {
        matches!(self, TypeSig::Class(class) if class.namespace == namespace && class.name == name)
    }

    /// Replace generic parameters with concrete arguments.
    ///
    /// `Var(n)` is taken from `type_args`, `MVar(n)` from `method_args`. Parameters
    /// without a matching argument are left open.
    #[must_use]
    pub fn substitute(&self, type_args: &[TypeSig], method_args: &[TypeSig]) -> TypeSig {
        match self {
            TypeSig::Var(index) => type_args
                .get(usize::from(*index))
                .cloned()
                .unwrap_or_else(|| self.clone()),
            TypeSig::MVar(index) => method_args
                .get(usize::from(*index))
                .cloned()
                .unwrap_or_else(|| self.clone()),
            TypeSig::GenericInst { base, args } => TypeSig::GenericInst {
                base: base.clone(),
                args: args
                    .iter()
                    .map(|arg| arg.substitute(type_args, method_args))
                    .collect(),
            },
            _ => self.clone(),
        }
    }

    /// Returns true if the signature still references a generic parameter
    #[must_use]
    pub fn is_open(&self) -> bool {
        match self {
            TypeSig::Var(_) | TypeSig::MVar(_) => true,
            TypeSig::GenericInst { args, .. } => args.iter().any(TypeSig::is_open),
            _ => false,
        }
    }
}

impl fmt::Display for TypeSig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handler_of(args: TypeSig) -> TypeSig {
        TypeSig::generic("System", "EventHandler`1", vec![args])
    }

    #[test]
    fn full_names() {
        assert_eq!(TypeSig::Void.full_name(), "System.Void");
        assert_eq!(TypeSig::Object.full_name(), "System.Object");
        assert_eq!(TypeSig::class("", "Global").full_name(), "Global");
        assert_eq!(
            handler_of(TypeSig::class("Sample", "Args")).full_name(),
            "System.EventHandler`1<Sample.Args>"
        );
        assert_eq!(
            TypeSig::generic("System", "Action`1", vec![handler_of(TypeSig::MVar(0))]).full_name(),
            "System.Action`1<System.EventHandler`1<!!0>>"
        );
    }

    #[test]
    fn custom_delegate_differs_from_generic_handler() {
        let args = TypeSig::class("Sample", "ChangedArgs");
        let custom = TypeSig::class("Sample", "ChangedHandler");
        assert_ne!(custom.full_name(), handler_of(args.clone()).full_name());
        assert_eq!(handler_of(args.clone()), handler_of(args));
    }

    #[test]
    fn substitute_closes_parameters() {
        let open = TypeSig::generic("System", "Action`1", vec![handler_of(TypeSig::MVar(0))]);
        let args = TypeSig::class("Sample", "Args");
        let closed = open.substitute(&[], std::slice::from_ref(&args));

        assert!(open.is_open());
        assert!(!closed.is_open());
        assert_eq!(
            closed.full_name(),
            "System.Action`1<System.EventHandler`1<Sample.Args>>"
        );

        let var = TypeSig::Var(0).substitute(std::slice::from_ref(&args), &[]);
        assert_eq!(var, args);

        let untouched = TypeSig::Var(3).substitute(&[], &[]);
        assert_eq!(untouched, TypeSig::Var(3));
    }

    #[test]
    fn queries() {
        let handler = handler_of(TypeSig::class("Sample", "Args"));
        assert!(handler.is_instance_of("System", "EventHandler`1"));
        assert!(!handler.is_class("System", "EventHandler`1"));
        assert_eq!(handler.generic_args().len(), 1);
        assert!(handler.is_reference());
        assert!(!TypeSig::IntPtr.is_reference());
        assert!(TypeSig::class("System", "EventHandler").is_class("System", "EventHandler"));
        assert_eq!(
            handler.type_name().map(TypeName::full_name).as_deref(),
            Some("System.EventHandler`1")
        );
    }
}
