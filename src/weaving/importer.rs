//! References to the runtime helpers a woven module calls.
//!
//! A [`ModuleImporter`] is created once per module, before any event is woven. It adds
//! a `MemberRef` row for every helper the generated code calls and hands the tokens to
//! every [`crate::weaving::EventWeaver`] working on that module. Weavers only read from
//! it; generic instantiations (`MethodSpec`s, closed `Action<T>` constructors) are
//! interned in the module on demand.

use crate::{
    metadata::{memberref::MethodSig, module::Module, token::Token, typesystem::TypeSig},
    weaving::{
        config::WeavingConfig,
        names::{
            ACTION, CHANGE_TYPE, COMBINE, COMPILER_GENERATED, COMPILER_SERVICES, CTOR,
            DELEGATE, DELEGATE_CONVERT_TYPE, FIND_WEAK, GENERIC_EVENT_HANDLER, MAKE_WEAK,
            REMOVE, SYSTEM, WEAK_EXTENSIONS_TYPE,
        },
    },
    Error, Result,
};

/// Tokens of the runtime helper references imported into one module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleImporter {
    runtime_namespace: String,
    make_weak: Token,
    find_weak: Token,
    delegate_convert: Token,
    delegate_remove: Token,
    delegate_combine: Token,
    compiler_generated: Token,
    action_ctor: Token,
}

fn generic_handler(arg: TypeSig) -> TypeSig {
    TypeSig::generic(SYSTEM, GENERIC_EVENT_HANDLER, vec![arg])
}

impl ModuleImporter {
    /// Import all helper references into `module` using the default runtime namespace
    ///
    /// # Errors
    /// Returns [`Error::Malformed`] if the module's `MemberRef` table is full.
    pub fn new(module: &mut Module) -> Result<Self> {
        Self::with_config(module, &WeavingConfig::default())
    }

    /// Import all helper references into `module`
    ///
    /// # Errors
    /// Returns [`Error::Malformed`] if the module's `MemberRef` table is full.
    pub fn with_config(module: &mut Module, config: &WeavingConfig) -> Result<Self> {
        let runtime = config.runtime_namespace.as_str();
        let delegate = TypeSig::class(SYSTEM, DELEGATE);
        let open_handler = generic_handler(TypeSig::MVar(0));
        let open_action = TypeSig::generic(SYSTEM, ACTION, vec![open_handler.clone()]);

        let make_weak = module.add_member_ref(
            TypeSig::class(runtime, WEAK_EXTENSIONS_TYPE),
            MAKE_WEAK,
            MethodSig::static_method(vec![open_handler.clone(), open_action], open_handler.clone())
                .with_generic_params(1),
        )?;
        let find_weak = module.add_member_ref(
            TypeSig::class(runtime, WEAK_EXTENSIONS_TYPE),
            FIND_WEAK,
            MethodSig::static_method(vec![delegate.clone(), open_handler.clone()], open_handler)
                .with_generic_params(1),
        )?;
        let delegate_convert = module.add_member_ref(
            TypeSig::class(runtime, DELEGATE_CONVERT_TYPE),
            CHANGE_TYPE,
            MethodSig::static_method(vec![delegate.clone()], TypeSig::MVar(0))
                .with_generic_params(1),
        )?;
        let delegate_remove = module.add_member_ref(
            delegate.clone(),
            REMOVE,
            MethodSig::static_method(vec![delegate.clone(), delegate.clone()], delegate.clone()),
        )?;
        let delegate_combine = module.add_member_ref(
            delegate.clone(),
            COMBINE,
            MethodSig::static_method(vec![delegate.clone(), delegate.clone()], delegate),
        )?;
        let compiler_generated = module.add_member_ref(
            TypeSig::class(COMPILER_SERVICES, COMPILER_GENERATED),
            CTOR,
            MethodSig::instance_method(Vec::new(), TypeSig::Void),
        )?;
        let action_ctor = module.add_member_ref(
            TypeSig::generic(SYSTEM, ACTION, vec![TypeSig::Var(0)]),
            CTOR,
            MethodSig::instance_method(vec![TypeSig::Object, TypeSig::IntPtr], TypeSig::Void),
        )?;

        log::debug!(
            "Imported weak event runtime references from '{}' into {}",
            runtime,
            module.name()
        );

        Ok(ModuleImporter {
            runtime_namespace: runtime.to_string(),
            make_weak,
            find_weak,
            delegate_convert,
            delegate_remove,
            delegate_combine,
            compiler_generated,
            action_ctor,
        })
    }

    /// ``System.EventHandler`1`` closed over `event_args`
    #[must_use]
    pub fn closed_event_handler(&self, event_args: &TypeSig) -> TypeSig {
        generic_handler(event_args.clone())
    }

    /// `MakeWeak<T>(EventHandler<T>, Action<EventHandler<T>>) : EventHandler<T>`
    #[must_use]
    pub fn make_weak(&self) -> Token {
        self.make_weak
    }

    /// `FindWeak<T>(Delegate, EventHandler<T>) : EventHandler<T>`
    #[must_use]
    pub fn find_weak(&self) -> Token {
        self.find_weak
    }

    /// `DelegateConvert.ChangeType<T>(Delegate) : T`
    #[must_use]
    pub fn delegate_convert(&self) -> Token {
        self.delegate_convert
    }

    /// `System.Delegate::Remove(Delegate, Delegate) : Delegate`
    #[must_use]
    pub fn delegate_remove(&self) -> Token {
        self.delegate_remove
    }

    /// `System.Delegate::Combine(Delegate, Delegate) : Delegate`
    #[must_use]
    pub fn delegate_combine(&self) -> Token {
        self.delegate_combine
    }

    /// Constructor of the compiler-generated marker attribute
    #[must_use]
    pub fn compiler_generated(&self) -> Token {
        self.compiler_generated
    }

    /// The open ``System.Action`1::.ctor(object, native int)``
    #[must_use]
    pub fn action_ctor(&self) -> Token {
        self.action_ctor
    }

    /// Namespace the runtime helpers were imported from
    #[must_use]
    pub fn runtime_namespace(&self) -> &str {
        &self.runtime_namespace
    }

    /// Reference ``System.Action`1<closed_handler>::.ctor`` in `module`.
    ///
    /// # Errors
    /// Returns [`Error::MemberNotFound`] if the open constructor is not part of `module`.
    pub fn close_action_ctor(&self, module: &mut Module, closed_handler: &TypeSig) -> Result<Token> {
        let open = module.member_ref(self.action_ctor)?;
        let base = open
            .parent
            .type_name()
            .cloned()
            .ok_or_else(|| malformed_error!("Action constructor has no declaring type"))?;
        let name = open.name.clone();
        let signature = open.signature.clone();

        module.add_member_ref(
            TypeSig::GenericInst {
                base,
                args: vec![closed_handler.clone()],
            },
            &name,
            signature,
        )
    }

    /// Check that every held reference is a row of `module` naming the expected helper.
    ///
    /// # Errors
    /// Returns [`Error::UnresolvedReference`] naming the first missing helper.
    pub fn ensure_resolved(&self, module: &Module) -> Result<()> {
        let runtime = self.runtime_namespace.as_str();
        let expected = [
            (self.make_weak, runtime, WEAK_EXTENSIONS_TYPE, MAKE_WEAK),
            (self.find_weak, runtime, WEAK_EXTENSIONS_TYPE, FIND_WEAK),
            (self.delegate_convert, runtime, DELEGATE_CONVERT_TYPE, CHANGE_TYPE),
            (self.delegate_remove, SYSTEM, DELEGATE, REMOVE),
            (self.delegate_combine, SYSTEM, DELEGATE, COMBINE),
            (self.compiler_generated, COMPILER_SERVICES, COMPILER_GENERATED, CTOR),
            (self.action_ctor, SYSTEM, ACTION, CTOR),
        ];

        for (token, namespace, type_name, name) in expected {
            let resolved = module
                .member_ref(token)
                .is_ok_and(|member| member.is(namespace, type_name, name));
            if !resolved {
                return Err(Error::UnresolvedReference(format!(
                    "{namespace}.{type_name}::{name} ({token}) in {}",
                    module.name()
                )));
            }
        }
        Ok(())
    }
}
