//! The module arena.
//!
//! A [`Module`] owns every row of the in-memory representation: type definitions and
//! references, fields, methods, member references, method specifications and type
//! specifications.
//! Rows are appended, so the [`Token`] handed out for a row stays valid for the lifetime
//! of the module. The one exception is [`Module::rollback_method`], which can only take
//! back the newest method. Ownership is flat: a type lists its members by token and
//! members point back at their declaring type by token, neither owns the other.
//!
//! # Examples
//!
//! ```rust
//! use weakevents::metadata::{
//!     field::FieldAttributes, module::Module, typedef::TypeAttributes,
//!     typesystem::{TypeName, TypeSig},
//! };
//!
//! let mut module = Module::new("Sample.dll");
//! let publisher = module.add_type(
//!     TypeName::new("Sample", "Publisher"),
//!     TypeAttributes::PUBLIC,
//!     Some(TypeSig::Object),
//! )?;
//! let field = module.add_field(
//!     publisher,
//!     "Changed",
//!     FieldAttributes::PRIVATE,
//!     TypeSig::class("System", "EventHandler"),
//! )?;
//!
//! assert_eq!(module.field(field)?.declaring_type, publisher);
//! assert_eq!(module.type_def(publisher)?.fields, vec![field]);
//! # Ok::<(), weakevents::Error>(())
//! ```

use crate::{
    metadata::{
        field::{Field, FieldAttributes},
        memberref::{MemberRef, MethodSig, MethodSpec},
        method::Method,
        token::Token,
        typedef::{TypeAttributes, TypeDef, TypeRef},
        typesystem::{TypeName, TypeSig},
    },
    Error, Result,
};

/// The effective signature of a call target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallTarget {
    /// Declaring type of the called method (the type `newobj` creates)
    pub declaring_type: TypeSig,
    /// Method name
    pub name: String,
    /// Signature with all generic parameters substituted
    pub signature: MethodSig,
}

/// An in-memory module being woven.
#[derive(Debug, Clone, Default)]
pub struct Module {
    name: String,
    types: Vec<TypeDef>,
    type_refs: Vec<TypeRef>,
    fields: Vec<Field>,
    methods: Vec<Method>,
    member_refs: Vec<MemberRef>,
    method_specs: Vec<MethodSpec>,
    type_specs: Vec<TypeSig>,
}

fn next_token(table: u8, len: usize) -> Result<Token> {
    let row = u32::try_from(len + 1)
        .ok()
        .filter(|row| *row <= 0x00FF_FFFF)
        .ok_or_else(|| malformed_error!("Table 0x{:02x} is full", table))?;
    Ok(Token::from_parts(table, row))
}

fn row<T>(rows: &[T], token: Token, table: u8) -> Option<&T> {
    if !token.is_table(table) {
        return None;
    }
    token.index().and_then(|index| rows.get(index))
}

impl Module {
    /// Create an empty module
    #[must_use]
    pub fn new(name: &str) -> Self {
        Module {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// The module name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All type definitions
    #[must_use]
    pub fn types(&self) -> &[TypeDef] {
        &self.types
    }

    /// All method definitions
    #[must_use]
    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    /// All member references
    #[must_use]
    pub fn member_refs(&self) -> &[MemberRef] {
        &self.member_refs
    }

    /// Define a new type
    ///
    /// # Errors
    /// Returns [`Error::Malformed`] if the table is full.
    pub fn add_type(
        &mut self,
        name: TypeName,
        flags: TypeAttributes,
        extends: Option<TypeSig>,
    ) -> Result<Token> {
        let token = next_token(Token::TYPE_DEF, self.types.len())?;
        self.types.push(TypeDef {
            token,
            name,
            flags,
            extends,
            fields: Vec::new(),
            methods: Vec::new(),
        });
        Ok(token)
    }

    /// Reference a type of the assembly `scope`; a second reference to the same name
    /// returns the existing row.
    ///
    /// `invoke` is the signature of the type's `Invoke` method if it is a delegate.
    ///
    /// # Errors
    /// Returns [`Error::Malformed`] if the name is already defined in this module, is
    /// referenced from another scope or with another `Invoke` signature, or if the table
    /// is full.
    pub fn add_type_ref(
        &mut self,
        name: TypeName,
        scope: &str,
        invoke: Option<MethodSig>,
    ) -> Result<Token> {
        if self.types.iter().any(|typedef| typedef.name == name) {
            return Err(malformed_error!(
                "{} is defined in {}, it can not be referenced",
                name.full_name(),
                self.name
            ));
        }

        if let Some(existing) = self.type_refs.iter().find(|typeref| typeref.name == name) {
            if existing.scope != scope || existing.invoke != invoke {
                return Err(malformed_error!(
                    "{} is already referenced from {}",
                    name.full_name(),
                    existing.scope
                ));
            }
            return Ok(existing.token);
        }

        let token = next_token(Token::TYPE_REF, self.type_refs.len())?;
        self.type_refs.push(TypeRef {
            token,
            name,
            scope: scope.to_string(),
            invoke,
        });
        Ok(token)
    }

    /// Look up a type reference
    ///
    /// # Errors
    /// Returns [`Error::TypeNotFound`] if the token is not a type reference of this module.
    pub fn type_ref(&self, token: Token) -> Result<&TypeRef> {
        row(&self.type_refs, token, Token::TYPE_REF).ok_or(Error::TypeNotFound(token))
    }

    /// Find a type reference by its namespace qualified name
    #[must_use]
    pub fn find_type_ref(&self, full_name: &str) -> Option<&TypeRef> {
        self.type_refs
            .iter()
            .find(|typeref| typeref.full_name() == full_name)
    }

    /// Look up a type definition
    ///
    /// # Errors
    /// Returns [`Error::TypeNotFound`] if the token is not a row of this module.
    pub fn type_def(&self, token: Token) -> Result<&TypeDef> {
        row(&self.types, token, Token::TYPE_DEF).ok_or(Error::TypeNotFound(token))
    }

    /// Find a type definition by its namespace qualified name
    #[must_use]
    pub fn find_type(&self, full_name: &str) -> Option<&TypeDef> {
        self.types.iter().find(|typedef| typedef.full_name() == full_name)
    }

    /// Define a new field on `declaring_type`
    ///
    /// # Errors
    /// Returns [`Error::TypeNotFound`] if the declaring type does not exist.
    pub fn add_field(
        &mut self,
        declaring_type: Token,
        name: &str,
        flags: FieldAttributes,
        sig: TypeSig,
    ) -> Result<Token> {
        let token = next_token(Token::FIELD, self.fields.len())?;
        let index = declaring_type
            .index()
            .filter(|_| declaring_type.is_table(Token::TYPE_DEF))
            .filter(|index| *index < self.types.len())
            .ok_or(Error::TypeNotFound(declaring_type))?;

        self.fields.push(Field {
            token,
            name: name.to_string(),
            declaring_type,
            flags,
            sig,
        });
        self.types[index].fields.push(token);
        Ok(token)
    }

    /// Look up a field
    ///
    /// # Errors
    /// Returns [`Error::MemberNotFound`] if the token is not a field of this module.
    pub fn field(&self, token: Token) -> Result<&Field> {
        row(&self.fields, token, Token::FIELD).ok_or(Error::MemberNotFound(token))
    }

    /// Add `method` to its declaring type.
    ///
    /// The method is assigned a fresh `MethodDef` token, which is written into the
    /// stored row and returned. The declaring type lists it immediately.
    ///
    /// # Errors
    /// Returns [`Error::TypeNotFound`] if `method.declaring_type` does not exist.
    pub fn add_method(&mut self, mut method: Method) -> Result<Token> {
        let token = next_token(Token::METHOD_DEF, self.methods.len())?;
        let owner = method.declaring_type;
        let index = owner
            .index()
            .filter(|_| owner.is_table(Token::TYPE_DEF))
            .filter(|index| *index < self.types.len())
            .ok_or(Error::TypeNotFound(owner))?;

        method.token = token;
        self.methods.push(method);
        self.types[index].methods.push(token);
        Ok(token)
    }

    /// Remove the most recently added method and unlist it from its declaring type.
    ///
    /// # Errors
    /// Returns [`Error::MemberNotFound`] if `token` is not a method of this module, or
    /// [`Error::Malformed`] if another method was added after it.
    pub fn rollback_method(&mut self, token: Token) -> Result<Method> {
        self.method(token)?;
        if token.index() != self.methods.len().checked_sub(1) {
            return Err(malformed_error!(
                "Method {} is not the newest method, it can not be rolled back",
                token
            ));
        }

        let method = self.methods.pop().ok_or(Error::MemberNotFound(token))?;
        if let Some(owner) = method
            .declaring_type
            .index()
            .and_then(|index| self.types.get_mut(index))
        {
            owner.methods.retain(|listed| *listed != token);
        }
        Ok(method)
    }

    /// Look up a method definition
    ///
    /// # Errors
    /// Returns [`Error::MemberNotFound`] if the token is not a method of this module.
    pub fn method(&self, token: Token) -> Result<&Method> {
        row(&self.methods, token, Token::METHOD_DEF).ok_or(Error::MemberNotFound(token))
    }

    /// Look up a method definition for modification
    ///
    /// # Errors
    /// Returns [`Error::MemberNotFound`] if the token is not a method of this module.
    pub fn method_mut(&mut self, token: Token) -> Result<&mut Method> {
        if !token.is_table(Token::METHOD_DEF) {
            return Err(Error::MemberNotFound(token));
        }
        token
            .index()
            .and_then(|index| self.methods.get_mut(index))
            .ok_or(Error::MemberNotFound(token))
    }

    /// Find a method of `declaring_type` by name
    #[must_use]
    pub fn find_method(&self, declaring_type: Token, name: &str) -> Option<&Method> {
        let typedef = self.type_def(declaring_type).ok()?;
        typedef
            .methods
            .iter()
            .filter_map(|token| self.method(*token).ok())
            .find(|method| method.name == name)
    }

    /// Reference a method declared elsewhere; identical references share one row
    ///
    /// # Errors
    /// Returns [`Error::Malformed`] if the table is full.
    pub fn add_member_ref(&mut self, parent: TypeSig, name: &str, signature: MethodSig) -> Result<Token> {
        if let Some(existing) = self
            .member_refs
            .iter()
            .find(|mr| mr.parent == parent && mr.name == name && mr.signature == signature)
        {
            return Ok(existing.token);
        }

        let token = next_token(Token::MEMBER_REF, self.member_refs.len())?;
        self.member_refs.push(MemberRef {
            token,
            parent,
            name: name.to_string(),
            signature,
        });
        Ok(token)
    }

    /// Look up a member reference
    ///
    /// # Errors
    /// Returns [`Error::MemberNotFound`] if the token is not a member reference of this module.
    pub fn member_ref(&self, token: Token) -> Result<&MemberRef> {
        row(&self.member_refs, token, Token::MEMBER_REF).ok_or(Error::MemberNotFound(token))
    }

    /// Instantiate the generic method `method` over `instantiation`; interned
    ///
    /// # Errors
    /// Returns [`Error::MemberNotFound`] if `method` does not resolve, or
    /// [`Error::Malformed`] if the argument count does not match its generic arity.
    pub fn method_spec(&mut self, method: Token, instantiation: Vec<TypeSig>) -> Result<Token> {
        let arity = self.member_ref(method)?.signature.generic_params;
        if usize::from(arity) != instantiation.len() {
            return Err(malformed_error!(
                "Method {} expects {} type arguments, got {}",
                method,
                arity,
                instantiation.len()
            ));
        }

        if let Some(existing) = self
            .method_specs
            .iter()
            .find(|spec| spec.method == method && spec.instantiation == instantiation)
        {
            return Ok(existing.token);
        }

        let token = next_token(Token::METHOD_SPEC, self.method_specs.len())?;
        self.method_specs.push(MethodSpec {
            token,
            method,
            instantiation,
        });
        Ok(token)
    }

    /// `method` itself followed by every instantiation of it in this module
    #[must_use]
    pub fn instantiations_of(&self, method: Token) -> Vec<Token> {
        std::iter::once(method)
            .chain(
                self.method_specs
                    .iter()
                    .filter(|spec| spec.method == method)
                    .map(|spec| spec.token),
            )
            .collect()
    }

    /// Look up a method specification
    ///
    /// # Errors
    /// Returns [`Error::MemberNotFound`] if the token is not a method spec of this module.
    pub fn get_method_spec(&self, token: Token) -> Result<&MethodSpec> {
        row(&self.method_specs, token, Token::METHOD_SPEC).ok_or(Error::MemberNotFound(token))
    }

    /// Token usable as a type operand (`castclass`) for `sig`.
    ///
    /// Types defined in this module resolve to their `TypeDef`, referenced types to their
    /// `TypeRef`; everything else is interned as a `TypeSpec`.
    ///
    /// # Errors
    /// Returns [`Error::Malformed`] if the table is full.
    pub fn import_type(&mut self, sig: &TypeSig) -> Result<Token> {
        if let TypeSig::Class(name) = sig {
            if let Some(typedef) = self.types.iter().find(|typedef| &typedef.name == name) {
                return Ok(typedef.token);
            }
            if let Some(typeref) = self.type_refs.iter().find(|typeref| &typeref.name == name) {
                return Ok(typeref.token);
            }
        }

        if let Some(index) = self.type_specs.iter().position(|spec| spec == sig) {
            return Ok(Token::from_parts(Token::TYPE_SPEC, index as u32 + 1));
        }

        let token = next_token(Token::TYPE_SPEC, self.type_specs.len())?;
        self.type_specs.push(sig.clone());
        Ok(token)
    }

    /// The type a type operand token stands for
    ///
    /// # Errors
    /// Returns [`Error::TypeNotFound`] if the token is not a type definition, type
    /// reference or type spec.
    pub fn resolve_type(&self, token: Token) -> Result<TypeSig> {
        match token.table() {
            Token::TYPE_DEF => self.type_def(token).map(TypeDef::sig),
            Token::TYPE_REF => self.type_ref(token).map(TypeRef::sig),
            Token::TYPE_SPEC => row(&self.type_specs, token, Token::TYPE_SPEC)
                .cloned()
                .ok_or(Error::TypeNotFound(token)),
            _ => Err(Error::TypeNotFound(token)),
        }
    }

    /// Resolve the effective signature of a `MethodDef`, `MemberRef` or `MethodSpec`.
    ///
    /// # Errors
    /// Returns [`Error::MemberNotFound`] if the token does not resolve to a method.
    pub fn call_target(&self, token: Token) -> Result<CallTarget> {
        match token.table() {
            Token::METHOD_DEF => {
                let method = self.method(token)?;
                let declaring_type = self.type_def(method.declaring_type)?.sig();
                let params = method.params.iter().map(|param| param.sig.clone()).collect();
                let signature = if method.is_static() {
                    MethodSig::static_method(params, method.return_type.clone())
                } else {
                    MethodSig::instance_method(params, method.return_type.clone())
                };
                Ok(CallTarget {
                    declaring_type,
                    name: method.name.clone(),
                    signature,
                })
            }
            Token::MEMBER_REF => {
                let member = self.member_ref(token)?;
                Ok(CallTarget {
                    declaring_type: member.parent.clone(),
                    name: member.name.clone(),
                    signature: member.closed_signature(&[]),
                })
            }
            Token::METHOD_SPEC => {
                let spec = self.get_method_spec(token)?;
                let member = self.member_ref(spec.method)?;
                Ok(CallTarget {
                    declaring_type: member.parent.clone(),
                    name: member.name.clone(),
                    signature: member.closed_signature(&spec.instantiation),
                })
            }
            _ => Err(Error::MemberNotFound(token)),
        }
    }

    /// Returns true if `token` names an existing row of this module
    #[must_use]
    pub fn contains(&self, token: Token) -> bool {
        match token.table() {
            Token::TYPE_DEF => self.type_def(token).is_ok(),
            Token::TYPE_REF => self.type_ref(token).is_ok(),
            Token::FIELD => self.field(token).is_ok(),
            Token::METHOD_DEF => self.method(token).is_ok(),
            Token::MEMBER_REF => self.member_ref(token).is_ok(),
            Token::METHOD_SPEC => self.get_method_spec(token).is_ok(),
            Token::TYPE_SPEC => self.resolve_type(token).is_ok(),
            _ => false,
        }
    }

    /// Human readable `Type::Method` name of a method token, for diagnostics
    #[must_use]
    pub fn display_name(&self, token: Token) -> String {
        match self.call_target(token) {
            Ok(target) => format!("{}::{}", target.declaring_type, target.name),
            Err(_) => token.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::method::{MethodAccessFlags, MethodBody, MethodModifiers, Param};

    fn module_with_type() -> (Module, Token) {
        let mut module = Module::new("Test.dll");
        let owner = module
            .add_type(
                TypeName::new("Sample", "Publisher"),
                TypeAttributes::PUBLIC,
                Some(TypeSig::Object),
            )
            .unwrap();
        (module, owner)
    }

    fn method(owner: Token, name: &str, modifiers: MethodModifiers) -> Method {
        Method {
            token: Token::new(0),
            name: name.to_string(),
            declaring_type: owner,
            access: MethodAccessFlags::PRIVATE,
            modifiers,
            return_type: TypeSig::Void,
            params: vec![Param {
                name: None,
                sig: TypeSig::Object,
            }],
            custom_attributes: Vec::new(),
            body: MethodBody::new(),
        }
    }

    #[test]
    fn add_method_registers_with_owner() -> Result<()> {
        let (mut module, owner) = module_with_type();
        let first = module.add_method(method(owner, "First", MethodModifiers::empty()))?;
        let second = module.add_method(method(owner, "Second", MethodModifiers::STATIC))?;

        assert_eq!(first, Token::new(0x06000001));
        assert_eq!(second, Token::new(0x06000002));
        assert_eq!(module.method(second)?.token, second);
        assert_eq!(module.type_def(owner)?.methods, vec![first, second]);
        assert_eq!(
            module.find_method(owner, "Second").map(|m| m.token),
            Some(second)
        );
        Ok(())
    }

    #[test]
    fn rollback_only_takes_the_newest_method() -> Result<()> {
        let (mut module, owner) = module_with_type();
        let first = module.add_method(method(owner, "First", MethodModifiers::empty()))?;
        let second = module.add_method(method(owner, "Second", MethodModifiers::empty()))?;

        assert!(matches!(
            module.rollback_method(first),
            Err(Error::Malformed { .. })
        ));
        assert_eq!(module.rollback_method(second)?.name, "Second");
        assert!(module.method(second).is_err());
        assert_eq!(module.type_def(owner)?.methods, vec![first]);
        assert!(module.find_method(owner, "Second").is_none());

        let again = module.add_method(method(owner, "Again", MethodModifiers::empty()))?;
        assert_eq!(again, second);
        Ok(())
    }

    #[test]
    fn add_to_missing_type_fails() {
        let (mut module, _) = module_with_type();
        let missing = Token::new(0x02000009);
        assert!(matches!(
            module.add_method(method(missing, "Orphan", MethodModifiers::empty())),
            Err(Error::TypeNotFound(_))
        ));
        assert!(matches!(
            module.add_field(missing, "f", FieldAttributes::PRIVATE, TypeSig::Object),
            Err(Error::TypeNotFound(_))
        ));
    }

    #[test]
    fn wrong_table_is_not_found() -> Result<()> {
        let (mut module, owner) = module_with_type();
        let field = module.add_field(owner, "Changed", FieldAttributes::PRIVATE, TypeSig::Object)?;

        assert!(module.field(field).is_ok());
        assert!(matches!(module.method(field), Err(Error::MemberNotFound(_))));
        assert!(matches!(module.type_def(field), Err(Error::TypeNotFound(_))));
        assert!(module.contains(field));
        assert!(!module.contains(Token::new(0x04000002)));
        Ok(())
    }

    #[test]
    fn member_refs_and_specs_are_interned() -> Result<()> {
        let (mut module, _) = module_with_type();
        let parent = TypeSig::class("WeakEvents.Runtime", "DelegateConvert");
        let sig = MethodSig::static_method(
            vec![TypeSig::class("System", "Delegate")],
            TypeSig::MVar(0),
        )
        .with_generic_params(1);

        let first = module.add_member_ref(parent.clone(), "ChangeType", sig.clone())?;
        let again = module.add_member_ref(parent, "ChangeType", sig)?;
        assert_eq!(first, again);

        let target = TypeSig::class("Sample", "ChangedHandler");
        let spec = module.method_spec(first, vec![target.clone()])?;
        assert_eq!(module.method_spec(first, vec![target.clone()])?, spec);
        assert!(module.method_spec(first, vec![]).is_err());

        let call = module.call_target(spec)?;
        assert_eq!(call.name, "ChangeType");
        assert_eq!(call.signature.return_type, target);
        Ok(())
    }

    #[test]
    fn import_type_prefers_typedef() -> Result<()> {
        let (mut module, owner) = module_with_type();
        let local = module.import_type(&TypeSig::class("Sample", "Publisher"))?;
        assert_eq!(local, owner);

        let handler = TypeSig::generic("System", "EventHandler`1", vec![TypeSig::Object]);
        let spec = module.import_type(&handler)?;
        assert!(spec.is_table(Token::TYPE_SPEC));
        assert_eq!(module.import_type(&handler)?, spec);
        assert_eq!(module.resolve_type(spec)?, handler);
        assert_eq!(module.resolve_type(owner)?, TypeSig::class("Sample", "Publisher"));
        Ok(())
    }

    #[test]
    fn type_tokens_are_sequential() -> Result<()> {
        let (mut module, owner) = module_with_type();
        let second = module.add_type(
            TypeName::new("Sample", "Subscriber"),
            TypeAttributes::PUBLIC,
            Some(TypeSig::Object),
        )?;
        assert_eq!(owner, Token::new(0x02000001));
        assert_eq!(second, Token::new(0x02000002));
        assert_eq!(module.types().len(), 2);
        Ok(())
    }

    #[test]
    fn type_refs_are_interned_and_resolve() -> Result<()> {
        let (mut module, _) = module_with_type();
        let name = TypeName::new("System.ComponentModel", "PropertyChangedEventHandler");
        let invoke = MethodSig::instance_method(
            vec![
                TypeSig::Object,
                TypeSig::class("System.ComponentModel", "PropertyChangedEventArgs"),
            ],
            TypeSig::Void,
        );

        let typeref = module.add_type_ref(name.clone(), "System.ObjectModel", Some(invoke.clone()))?;
        assert_eq!(typeref, Token::new(0x01000001));
        assert_eq!(
            module.add_type_ref(name.clone(), "System.ObjectModel", Some(invoke))?,
            typeref
        );
        assert!(module.add_type_ref(name.clone(), "mscorlib", None).is_err());
        assert!(module
            .add_type_ref(TypeName::new("Sample", "Publisher"), "Other", None)
            .is_err());

        let found = module.find_type_ref("System.ComponentModel.PropertyChangedEventHandler");
        assert_eq!(found.map(|r| r.token), Some(typeref));
        assert!(module.type_ref(typeref)?.is_delegate());

        let sig = TypeSig::Class(name);
        assert_eq!(module.import_type(&sig)?, typeref);
        assert_eq!(module.resolve_type(typeref)?, sig);
        assert!(module.contains(typeref));
        assert!(!module.contains(Token::new(0x01000002)));
        Ok(())
    }

    #[test]
    fn instantiations_of_generic_method() -> Result<()> {
        let (mut module, _) = module_with_type();
        let parent = TypeSig::class("WeakEvents.Runtime", "DelegateConvert");
        let sig = MethodSig::static_method(
            vec![TypeSig::class("System", "Delegate")],
            TypeSig::MVar(0),
        )
        .with_generic_params(1);
        let change_type = module.add_member_ref(parent, "ChangeType", sig)?;
        assert_eq!(module.instantiations_of(change_type), vec![change_type]);

        let first = module.method_spec(change_type, vec![TypeSig::Object])?;
        let second = module.method_spec(change_type, vec![TypeSig::IntPtr])?;
        assert_eq!(
            module.instantiations_of(change_type),
            vec![change_type, first, second]
        );
        Ok(())
    }

    #[test]
    fn call_target_of_method_def() -> Result<()> {
        let (mut module, owner) = module_with_type();
        let token = module.add_method(method(owner, "Handle", MethodModifiers::empty()))?;
        let target = module.call_target(token)?;

        assert!(target.signature.has_this);
        assert_eq!(target.declaring_type, TypeSig::class("Sample", "Publisher"));
        assert_eq!(module.display_name(token), "Sample.Publisher::Handle");
        Ok(())
    }
}
