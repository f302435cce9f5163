//! Fluent builders for adding types, fields and methods to a [`Module`].
//!
//! The builders compose the low-level [`Module`] operations into the shapes a compiler
//! would produce, e.g. a delegate type with its runtime-implemented `.ctor` and `Invoke`,
//! or a reference to such a delegate declared by another assembly.
//!
//! # Examples
//!
//! ```rust
//! use weakevents::metadata::{builders::{ClassBuilder, FieldBuilder, MethodBuilder}, module::Module, typesystem::TypeSig};
//!
//! let mut module = Module::new("Sample.dll");
//! let publisher = ClassBuilder::new("Publisher").namespace("Sample").build(&mut module)?;
//! let field = FieldBuilder::new("Changed", TypeSig::class("System", "EventHandler"))
//!     .build(&mut module, publisher)?;
//! let add = MethodBuilder::new("add_Changed")
//!     .public()
//!     .special_name()
//!     .parameter("value", TypeSig::class("System", "EventHandler"))
//!     .build(&mut module, publisher)?;
//!
//! assert!(module.method(add)?.body.is_empty());
//! # Ok::<(), weakevents::Error>(())
//! ```

use crate::{
    assembly::InstructionSequence,
    metadata::{
        field::FieldAttributes,
        memberref::MethodSig,
        method::{
            CustomAttribute, Method, MethodAccessFlags, MethodBody, MethodModifiers, Param,
        },
        module::Module,
        token::Token,
        typedef::TypeAttributes,
        typesystem::{TypeName, TypeSig},
    },
    Result,
};

/// Builder for class definitions.
pub struct ClassBuilder {
    name: String,
    namespace: String,
    flags: TypeAttributes,
    extends: Option<TypeSig>,
}

impl ClassBuilder {
    /// Create a new public class deriving from `System.Object`
    #[must_use]
    pub fn new(name: &str) -> Self {
        ClassBuilder {
            name: name.to_string(),
            namespace: String::new(),
            flags: TypeAttributes::PUBLIC,
            extends: Some(TypeSig::Object),
        }
    }

    /// Set the namespace
    #[must_use]
    pub fn namespace(mut self, namespace: &str) -> Self {
        self.namespace = namespace.to_string();
        self
    }

    /// Set the base type
    #[must_use]
    pub fn extends(mut self, base: TypeSig) -> Self {
        self.extends = Some(base);
        self
    }

    /// Mark the class sealed
    #[must_use]
    pub fn sealed(mut self) -> Self {
        self.flags |= TypeAttributes::SEALED;
        self
    }

    /// Add the class to `module`
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if no more types can be added.
    pub fn build(self, module: &mut Module) -> Result<Token> {
        module.add_type(
            TypeName::new(&self.namespace, &self.name),
            self.flags,
            self.extends,
        )
    }
}

/// Builder for delegate types with the usual `(object sender, TArgs e)` shape.
pub struct DelegateBuilder {
    name: String,
    namespace: String,
    event_args: TypeSig,
}

impl DelegateBuilder {
    /// Create a new delegate taking `System.EventArgs`
    #[must_use]
    pub fn new(name: &str) -> Self {
        DelegateBuilder {
            name: name.to_string(),
            namespace: String::new(),
            event_args: TypeSig::class("System", "EventArgs"),
        }
    }

    /// Set the namespace
    #[must_use]
    pub fn namespace(mut self, namespace: &str) -> Self {
        self.namespace = namespace.to_string();
        self
    }

    /// Set the type of the second `Invoke` parameter
    #[must_use]
    pub fn event_args(mut self, event_args: TypeSig) -> Self {
        self.event_args = event_args;
        self
    }

    /// Add the delegate type, its `.ctor` and its `Invoke` method to `module`
    ///
    /// # Errors
    /// Returns an error if the methods can not be added.
    pub fn build(self, module: &mut Module) -> Result<Token> {
        let delegate = ClassBuilder::new(&self.name)
            .namespace(&self.namespace)
            .extends(TypeSig::class("System", "MulticastDelegate"))
            .sealed()
            .build(module)?;

        MethodBuilder::new(".ctor")
            .public()
            .special_name()
            .parameter("object", TypeSig::Object)
            .parameter("method", TypeSig::IntPtr)
            .build(module, delegate)?;

        MethodBuilder::new("Invoke")
            .public()
            .virtual_method()
            .parameter("sender", TypeSig::Object)
            .parameter("e", self.event_args)
            .build(module, delegate)?;

        Ok(delegate)
    }

    /// Reference the delegate as a type of the assembly `scope` instead of defining it
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the name is defined in `module` or already
    /// referenced differently.
    pub fn reference(self, module: &mut Module, scope: &str) -> Result<Token> {
        let invoke = MethodSig::instance_method(vec![TypeSig::Object, self.event_args], TypeSig::Void);
        module.add_type_ref(TypeName::new(&self.namespace, &self.name), scope, Some(invoke))
    }
}

/// Builder for field definitions.
pub struct FieldBuilder {
    name: String,
    flags: FieldAttributes,
    sig: TypeSig,
}

impl FieldBuilder {
    /// Create a new private instance field of type `sig`
    #[must_use]
    pub fn new(name: &str, sig: TypeSig) -> Self {
        FieldBuilder {
            name: name.to_string(),
            flags: FieldAttributes::PRIVATE,
            sig,
        }
    }

    /// Make the field static
    #[must_use]
    pub fn static_field(mut self) -> Self {
        self.flags |= FieldAttributes::STATIC;
        self
    }

    /// Add the field to `declaring_type`
    ///
    /// # Errors
    /// Returns [`crate::Error::TypeNotFound`] if the declaring type does not exist.
    pub fn build(self, module: &mut Module, declaring_type: Token) -> Result<Token> {
        module.add_field(declaring_type, &self.name, self.flags, self.sig)
    }
}

/// Builder for method definitions.
///
/// Methods start out private, instance, `void`, without parameters and with an empty
/// body.
pub struct MethodBuilder {
    name: String,
    access: MethodAccessFlags,
    modifiers: MethodModifiers,
    return_type: TypeSig,
    params: Vec<Param>,
    attributes: Vec<CustomAttribute>,
    body: InstructionSequence,
}

impl MethodBuilder {
    /// Create a new method builder
    #[must_use]
    pub fn new(name: &str) -> Self {
        MethodBuilder {
            name: name.to_string(),
            access: MethodAccessFlags::PRIVATE,
            modifiers: MethodModifiers::empty(),
            return_type: TypeSig::Void,
            params: Vec::new(),
            attributes: Vec::new(),
            body: InstructionSequence::new(),
        }
    }

    /// Make the method public
    #[must_use]
    pub fn public(mut self) -> Self {
        self.access = MethodAccessFlags::PUBLIC;
        self
    }

    /// Make the method private
    #[must_use]
    pub fn private(mut self) -> Self {
        self.access = MethodAccessFlags::PRIVATE;
        self
    }

    /// Make the method static
    #[must_use]
    pub fn static_method(mut self) -> Self {
        self.modifiers |= MethodModifiers::STATIC;
        self
    }

    /// Make the method static if `is_static` is set
    #[must_use]
    pub fn static_if(self, is_static: bool) -> Self {
        if is_static {
            self.static_method()
        } else {
            self
        }
    }

    /// Make the method virtual
    #[must_use]
    pub fn virtual_method(mut self) -> Self {
        self.modifiers |= MethodModifiers::VIRTUAL | MethodModifiers::HIDE_BY_SIG;
        self
    }

    /// Hide by name and signature
    #[must_use]
    pub fn hide_by_sig(mut self) -> Self {
        self.modifiers |= MethodModifiers::HIDE_BY_SIG;
        self
    }

    /// Mark as special name (accessors, constructors)
    #[must_use]
    pub fn special_name(mut self) -> Self {
        self.modifiers |= MethodModifiers::SPECIAL_NAME | MethodModifiers::HIDE_BY_SIG;
        self
    }

    /// Set the return type
    #[must_use]
    pub fn returns(mut self, return_type: TypeSig) -> Self {
        self.return_type = return_type;
        self
    }

    /// Add a named parameter
    #[must_use]
    pub fn parameter(mut self, name: &str, sig: TypeSig) -> Self {
        self.params.push(Param {
            name: Some(name.to_string()),
            sig,
        });
        self
    }

    /// Add an unnamed parameter
    #[must_use]
    pub fn unnamed_parameter(mut self, sig: TypeSig) -> Self {
        self.params.push(Param { name: None, sig });
        self
    }

    /// Apply the attribute with constructor `constructor`
    #[must_use]
    pub fn attribute(mut self, constructor: Token) -> Self {
        self.attributes.push(CustomAttribute { constructor });
        self
    }

    /// Set the initial body
    #[must_use]
    pub fn body(mut self, body: InstructionSequence) -> Self {
        self.body = body;
        self
    }

    /// Add the method to `declaring_type`
    ///
    /// # Errors
    /// Returns [`crate::Error::TypeNotFound`] if the declaring type does not exist.
    pub fn build(self, module: &mut Module, declaring_type: Token) -> Result<Token> {
        let mut body = MethodBody::new();
        body.insert_instructions(self.body, 0)?;

        module.add_method(Method {
            token: Token::new(0),
            name: self.name,
            declaring_type,
            access: self.access,
            modifiers: self.modifiers,
            return_type: self.return_type,
            params: self.params,
            custom_attributes: self.attributes,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delegate_shape() -> Result<()> {
        let mut module = Module::new("Test.dll");
        let args = TypeSig::class("Sample", "ChangedArgs");
        let delegate = DelegateBuilder::new("ChangedHandler")
            .namespace("Sample")
            .event_args(args.clone())
            .build(&mut module)?;

        let typedef = module.type_def(delegate)?;
        assert!(typedef.is_delegate());
        assert_eq!(typedef.methods.len(), 2);

        let invoke = module.find_method(delegate, "Invoke").map(|m| m.params.clone());
        assert_eq!(invoke.map(|p| p[1].sig.clone()), Some(args));
        Ok(())
    }

    #[test]
    fn delegate_reference() -> Result<()> {
        let mut module = Module::new("Test.dll");
        let args = TypeSig::class("System.ComponentModel", "PropertyChangedEventArgs");
        let delegate = DelegateBuilder::new("PropertyChangedEventHandler")
            .namespace("System.ComponentModel")
            .event_args(args.clone())
            .reference(&mut module, "System.ObjectModel")?;

        let typeref = module.type_ref(delegate)?;
        assert_eq!(typeref.scope, "System.ObjectModel");
        assert_eq!(
            typeref.invoke.as_ref().map(|invoke| invoke.params.clone()),
            Some(vec![TypeSig::Object, args])
        );
        assert!(module.types().is_empty());
        Ok(())
    }

    #[test]
    fn method_defaults_and_flags() -> Result<()> {
        let mut module = Module::new("Test.dll");
        let owner = ClassBuilder::new("Publisher").namespace("Sample").build(&mut module)?;

        let helper = MethodBuilder::new("Helper")
            .hide_by_sig()
            .static_if(true)
            .unnamed_parameter(TypeSig::Object)
            .attribute(Token::new(0x0A000001))
            .body(InstructionSequence::new().ret())
            .build(&mut module, owner)?;

        let method = module.method(helper)?;
        assert!(method.is_private());
        assert!(method.is_static());
        assert!(method.modifiers.contains(MethodModifiers::HIDE_BY_SIG));
        assert_eq!(method.params[0].name, None);
        assert!(method.has_attribute(Token::new(0x0A000001)));
        assert_eq!(method.body.instructions.len(), 1);
        Ok(())
    }

    #[test]
    fn static_field() -> Result<()> {
        let mut module = Module::new("Test.dll");
        let owner = ClassBuilder::new("Publisher").build(&mut module)?;
        let field = FieldBuilder::new("Changed", TypeSig::Object)
            .static_field()
            .build(&mut module, owner)?;
        assert!(module.field(field)?.is_static());
        Ok(())
    }
}
