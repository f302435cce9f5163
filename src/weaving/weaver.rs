//! Per-event weaving.
//!
//! An [`EventWeaver`] is constructed for one event backing field. At construction it
//! derives the event argument type from the field's delegate type, closes
//! ``System.EventHandler`1`` over it and decides once whether the field already has that
//! canonical shape. That decision drives every body it generates: a custom delegate
//! type is converted into the canonical handler before each call into the weak event
//! runtime and converted back afterwards, a canonical one never is.
//!
//! The weaver produces the pieces an accessor rewriter needs:
//!
//! - [`EventWeaver::add_unsubscribe_method`] synthesizes the private callback that
//!   removes a collected weak handler from the field
//! - [`EventWeaver::generate_make_weak_il`] wraps the incoming handler into a weak handler
//! - [`EventWeaver::generate_find_weak_il`] locates the weak handler previously
//!   registered for the incoming handler
//! - [`EventWeaver::create_event_handler_variable`] allocates the local both store into

use crate::{
    assembly::{verify_method, InstructionSequence},
    metadata::{
        builders::MethodBuilder,
        method::VariableDefinition,
        module::Module,
        token::Token,
        typesystem::TypeSig,
    },
    weaving::{
        config::WeavingConfig,
        emitter::{IlEmitter, IlValue},
        importer::ModuleImporter,
        names::{
            unsubscribe_method_name, EVENT_ARGS, EVENT_HANDLER, GENERIC_EVENT_HANDLER, INVOKE,
            SYSTEM,
        },
    },
    Error, Result,
};

/// Derive the event argument type carried by the delegate type `handler`.
///
/// ``EventHandler`1<T>`` carries `T`, `System.EventHandler` carries `System.EventArgs`,
/// and a delegate defined or referenced by `module` carries the type of the second
/// parameter of its `Invoke` method.
///
/// # Errors
/// Returns [`Error::UnsupportedDelegate`] for any other type.
pub fn event_args_type(module: &Module, handler: &TypeSig) -> Result<TypeSig> {
    if handler.is_instance_of(SYSTEM, GENERIC_EVENT_HANDLER) {
        if let [event_args] = handler.generic_args() {
            return Ok(event_args.clone());
        }
    }
    if handler.is_class(SYSTEM, EVENT_HANDLER) {
        return Ok(TypeSig::class(SYSTEM, EVENT_ARGS));
    }

    if let TypeSig::Class(name) = handler {
        if let Some(delegate) = module
            .find_type(&name.full_name())
            .filter(|typedef| typedef.is_delegate())
        {
            let invoke = module
                .find_method(delegate.token, INVOKE)
                .ok_or_else(|| Error::UnsupportedDelegate(format!("{handler} has no Invoke method")))?;
            return match invoke.params.as_slice() {
                [_, event_args] => Ok(event_args.sig.clone()),
                _ => Err(Error::UnsupportedDelegate(format!(
                    "{handler}.Invoke takes {} parameters, expected (sender, args)",
                    invoke.params.len()
                ))),
            };
        }

        if let Some(invoke) = module
            .find_type_ref(&name.full_name())
            .and_then(|typeref| typeref.invoke.as_ref())
        {
            return match invoke.params.as_slice() {
                [_, event_args] => Ok(event_args.clone()),
                _ => Err(Error::UnsupportedDelegate(format!(
                    "{handler}.Invoke takes {} parameters, expected (sender, args)",
                    invoke.params.len()
                ))),
            };
        }
    }

    Err(Error::UnsupportedDelegate(handler.full_name()))
}

/// Weaves one event backing field.
///
/// # Examples
///
/// ```rust
/// use weakevents::{
///     metadata::{builders::{ClassBuilder, FieldBuilder}, module::Module, typesystem::TypeSig},
///     weaving::{EventWeaver, ModuleImporter},
/// };
///
/// let mut module = Module::new("Sample.dll");
/// let importer = ModuleImporter::new(&mut module)?;
/// let publisher = ClassBuilder::new("Publisher").namespace("Sample").build(&mut module)?;
/// let handler = TypeSig::generic("System", "EventHandler`1", vec![TypeSig::class("Sample", "ChangedArgs")]);
/// let field = FieldBuilder::new("Changed", handler).build(&mut module, publisher)?;
///
/// let weaver = EventWeaver::new(&module, field, &importer)?;
/// assert!(weaver.is_generic_handler());
///
/// let unsubscribe = weaver.add_unsubscribe_method(&mut module)?;
/// assert_eq!(module.method(unsubscribe)?.name, "<Changed>_Weak_Unsubscribe");
/// # Ok::<(), weakevents::Error>(())
/// ```
#[derive(Debug)]
pub struct EventWeaver<'a> {
    importer: &'a ModuleImporter,
    config: WeavingConfig,
    field: Token,
    event_name: String,
    declaring_type: Token,
    field_type: TypeSig,
    is_static: bool,
    closed_handler: TypeSig,
    is_generic_handler: bool,
}

impl<'a> EventWeaver<'a> {
    /// Create a weaver for the backing field `field` with the default configuration
    ///
    /// # Errors
    /// See [`EventWeaver::with_config`].
    pub fn new(module: &Module, field: Token, importer: &'a ModuleImporter) -> Result<Self> {
        Self::with_config(module, field, importer, WeavingConfig::default())
    }

    /// Create a weaver for the backing field `field`.
    ///
    /// # Errors
    /// Returns [`Error::MemberNotFound`] if `field` is not a field of `module`,
    /// [`Error::UnresolvedReference`] if `importer` was not created for `module`, or
    /// [`Error::UnsupportedDelegate`] if the event argument type of the field's delegate
    /// type can not be derived.
    pub fn with_config(
        module: &Module,
        field: Token,
        importer: &'a ModuleImporter,
        config: WeavingConfig,
    ) -> Result<Self> {
        let definition = module.field(field)?;
        importer.ensure_resolved(module)?;

        let field_type = definition.sig.clone();
        let event_args = event_args_type(module, &field_type)?;
        let closed_handler = importer.closed_event_handler(&event_args);
        let is_generic_handler = closed_handler.full_name() == field_type.full_name();

        log::debug!(
            "Weaving event {} of type {} ({})",
            definition.name,
            field_type,
            if is_generic_handler {
                "generic handler"
            } else {
                "custom delegate, converting"
            }
        );

        Ok(EventWeaver {
            importer,
            config,
            field,
            event_name: definition.name.clone(),
            declaring_type: definition.declaring_type,
            is_static: definition.is_static(),
            field_type,
            closed_handler,
            is_generic_handler,
        })
    }

    /// True if the field's delegate type is the closed generic handler itself
    #[must_use]
    pub fn is_generic_handler(&self) -> bool {
        self.is_generic_handler
    }

    /// ``System.EventHandler`1`` closed over the event argument type
    #[must_use]
    pub fn closed_handler(&self) -> &TypeSig {
        &self.closed_handler
    }

    /// The declared delegate type of the backing field
    #[must_use]
    pub fn field_type(&self) -> &TypeSig {
        &self.field_type
    }

    /// The backing field being woven
    #[must_use]
    pub fn field(&self) -> Token {
        self.field
    }

    /// Add the unsubscribe callback for this event to the declaring type.
    ///
    /// The method is private, static if the event is static, takes one parameter of the
    /// closed generic handler type and carries the compiler-generated attribute. Its body
    /// removes the parameter from the backing field:
    ///
    /// ```text
    /// field = (TField) Delegate.Remove(field, (TField) handler);
    /// ```
    ///
    /// # Errors
    /// Returns [`Error::Malformed`] if the declaring type already has a method of that
    /// name, or [`Error::Verification`] if the generated body fails verification. The
    /// method is removed from the module again in the latter case.
    pub fn add_unsubscribe_method(&self, module: &mut Module) -> Result<Token> {
        let name = unsubscribe_method_name(&self.event_name);
        if module.find_method(self.declaring_type, &name).is_some() {
            return Err(malformed_error!(
                "{} already declares {}",
                module.type_def(self.declaring_type)?.full_name(),
                name
            ));
        }

        let unsubscribe = MethodBuilder::new(&name)
            .private()
            .hide_by_sig()
            .static_if(self.is_static)
            .unnamed_parameter(self.closed_handler.clone())
            .attribute(self.importer.compiler_generated())
            .build(module, self.declaring_type)?;

        if let Err(error) = self.implement_unsubscribe(module, unsubscribe, &name) {
            module.rollback_method(unsubscribe)?;
            log::warn!("Discarded {}: {}", name, error);
            return Err(error);
        }
        Ok(unsubscribe)
    }

    fn implement_unsubscribe(&self, module: &mut Module, unsubscribe: Token, name: &str) -> Result<()> {
        let body = {
            let mut emitter = IlEmitter::new(module, self.importer, unsubscribe)?;
            let mut handler = emitter.load_method_1st_arg()?;
            if !self.is_generic_handler {
                handler = emitter.delegate_convert(handler, &self.field_type)?;
            }
            let source = emitter.load_field(self.field)?;
            let mut remaining = emitter.call_delegate_remove(source, handler)?;
            if !self.is_generic_handler {
                remaining = emitter.delegate_convert(remaining, &self.field_type)?;
            }
            emitter.store_field(remaining, self.field)?.ret()
        };
        log::trace!("Body of {}:\n{}", name, body);
        module.method_mut(unsubscribe)?.insert_instructions(body, 0)?;

        if self.config.verify_generated {
            let summary = verify_method(module, unsubscribe)?;
            log::debug!(
                "Added {} ({} instructions, max stack {})",
                name,
                summary.instructions,
                summary.max_stack
            );
        } else {
            log::warn!("Added {} without verifying its body", name);
        }
        Ok(())
    }

    /// Generate the lookup of the weak handler registered for `method`'s first argument.
    ///
    /// ```text
    /// variable = (TField) FindWeak<TArgs>(field, (EventHandler<TArgs>) value);
    /// ```
    ///
    /// The sequence is returned, not inserted; it leaves the stack balanced.
    ///
    /// # Errors
    /// Returns an error if `method` or `variable` do not belong to the module, or the
    /// backing field is not reachable from `method`.
    pub fn generate_find_weak_il(
        &self,
        module: &mut Module,
        method: Token,
        variable: &VariableDefinition,
    ) -> Result<InstructionSequence> {
        let mut emitter = IlEmitter::new(module, self.importer, method)?;
        let handler = self.load_handler(&mut emitter)?;
        let source = emitter.load_field(self.field)?;
        let found = emitter.find_weak(&self.closed_handler, source, handler)?;
        let found = self.convert_out(&mut emitter, found)?;
        let sequence = emitter.store(variable, found)?;

        log::trace!("FindWeak sequence for {}:\n{}", self.event_name, sequence);
        Ok(sequence)
    }

    /// Generate the wrapping of `method`'s first argument into a weak handler.
    ///
    /// ```text
    /// variable = (TField) MakeWeak<TArgs>((EventHandler<TArgs>) value,
    ///                                     new Action<EventHandler<TArgs>>(unsubscribe));
    /// ```
    ///
    /// The sequence is returned, not inserted; it leaves the stack balanced.
    ///
    /// # Errors
    /// Returns an error if `method`, `unsubscribe` or `variable` do not belong to the
    /// module.
    pub fn generate_make_weak_il(
        &self,
        module: &mut Module,
        method: Token,
        unsubscribe: Token,
        variable: &VariableDefinition,
    ) -> Result<InstructionSequence> {
        let action_ctor = self
            .importer
            .close_action_ctor(module, &self.closed_handler)?;

        let mut emitter = IlEmitter::new(module, self.importer, method)?;
        let callback = emitter.new_object(action_ctor, unsubscribe)?;
        let handler = self.load_handler(&mut emitter)?;
        let weak = emitter.make_weak(&self.closed_handler, handler, callback)?;
        let weak = self.convert_out(&mut emitter, weak)?;
        let sequence = emitter.store(variable, weak)?;

        log::trace!("MakeWeak sequence for {}:\n{}", self.event_name, sequence);
        Ok(sequence)
    }

    /// Allocate a local of the field's delegate type in `method`
    ///
    /// # Errors
    /// Returns [`Error::MemberNotFound`] if `method` is not a method of `module`.
    pub fn create_event_handler_variable(
        &self,
        module: &mut Module,
        method: Token,
    ) -> Result<VariableDefinition> {
        module
            .method_mut(method)?
            .create_variable(self.field_type.clone())
    }

    fn load_handler(&self, emitter: &mut IlEmitter<'_>) -> Result<IlValue> {
        let handler = emitter.load_method_1st_arg()?;
        if self.is_generic_handler {
            Ok(handler)
        } else {
            emitter.delegate_convert(handler, &self.closed_handler)
        }
    }

    fn convert_out(&self, emitter: &mut IlEmitter<'_>, value: IlValue) -> Result<IlValue> {
        if self.is_generic_handler {
            Ok(value)
        } else {
            emitter.delegate_convert(value, &self.field_type)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assembly::OpCode,
        metadata::method::MethodModifiers,
        test::{custom_delegate_event, generic_event, referenced_delegate_event, EventFixture},
    };

    fn conversions(fixture: &EventFixture, sequence: &InstructionSequence) -> usize {
        let change_type = fixture.importer.delegate_convert();
        sequence.count_calls_to(&fixture.module.instantiations_of(change_type))
    }

    #[test]
    fn generic_handler_needs_no_conversion() -> Result<()> {
        let mut f = generic_event(false);
        let weaver = EventWeaver::new(&f.module, f.field, &f.importer)?;
        assert!(weaver.is_generic_handler());

        let unsubscribe = weaver.add_unsubscribe_method(&mut f.module)?;
        let variable = weaver.create_event_handler_variable(&mut f.module, f.add)?;
        let find = weaver.generate_find_weak_il(&mut f.module, f.add, &variable)?;
        let make = weaver.generate_make_weak_il(&mut f.module, f.add, unsubscribe, &variable)?;
        let body = InstructionSequence::from_instructions(
            f.module.method(unsubscribe)?.body.instructions.clone(),
        );

        assert_eq!(conversions(&f, &find), 0);
        assert_eq!(conversions(&f, &make), 0);
        assert_eq!(conversions(&f, &body), 0);
        Ok(())
    }

    #[test]
    fn custom_delegate_converts_around_each_call() -> Result<()> {
        let mut f = custom_delegate_event(false);
        let weaver = EventWeaver::new(&f.module, f.field, &f.importer)?;
        assert!(!weaver.is_generic_handler());
        assert_eq!(
            weaver.closed_handler().full_name(),
            "System.EventHandler`1<Sample.ChangedEventArgs>"
        );

        let unsubscribe = weaver.add_unsubscribe_method(&mut f.module)?;
        let variable = weaver.create_event_handler_variable(&mut f.module, f.add)?;
        let find = weaver.generate_find_weak_il(&mut f.module, f.add, &variable)?;
        let make = weaver.generate_make_weak_il(&mut f.module, f.add, unsubscribe, &variable)?;

        assert_eq!(conversions(&f, &find), 2);
        assert_eq!(conversions(&f, &make), 2);
        Ok(())
    }

    #[test]
    fn referenced_delegate_is_converted() -> Result<()> {
        let mut f = referenced_delegate_event(false);
        let weaver = EventWeaver::new(&f.module, f.field, &f.importer)?;
        assert!(!weaver.is_generic_handler());
        assert_eq!(
            weaver.closed_handler().full_name(),
            "System.EventHandler`1<System.ComponentModel.PropertyChangedEventArgs>"
        );

        let unsubscribe = weaver.add_unsubscribe_method(&mut f.module)?;
        let variable = weaver.create_event_handler_variable(&mut f.module, f.remove)?;
        let find = weaver.generate_find_weak_il(&mut f.module, f.remove, &variable)?;
        let body = InstructionSequence::from_instructions(
            f.module.method(unsubscribe)?.body.instructions.clone(),
        );
        assert_eq!(conversions(&f, &find), 2);
        assert_eq!(conversions(&f, &body), 2);
        Ok(())
    }

    #[test]
    fn unsubscribe_method_shape() -> Result<()> {
        let mut f = generic_event(true);
        let weaver = EventWeaver::new(&f.module, f.field, &f.importer)?;
        let unsubscribe = weaver.add_unsubscribe_method(&mut f.module)?;
        let method = f.module.method(unsubscribe)?;

        assert!(method.is_private());
        assert!(method.is_static());
        assert!(method.modifiers.contains(MethodModifiers::HIDE_BY_SIG));
        assert!(method.has_attribute(f.importer.compiler_generated()));
        assert_eq!(method.params.len(), 1);
        assert_eq!(&method.params[0].sig, weaver.closed_handler());
        assert!(method.return_type.is_void());
        assert_eq!(
            method.body.instructions.last().map(|i| i.opcode),
            Some(OpCode::Ret)
        );
        Ok(())
    }

    #[test]
    fn second_unsubscribe_for_same_event_is_rejected() -> Result<()> {
        let mut f = generic_event(false);
        let weaver = EventWeaver::new(&f.module, f.field, &f.importer)?;
        weaver.add_unsubscribe_method(&mut f.module)?;
        assert!(matches!(
            weaver.add_unsubscribe_method(&mut f.module),
            Err(Error::Malformed { .. })
        ));
        Ok(())
    }

    #[test]
    fn unverifiable_unsubscribe_is_not_kept() -> Result<()> {
        let mut f = generic_event(false);
        let mut weaver = EventWeaver::new(&f.module, f.field, &f.importer)?;
        // Converting back to a type the field can not hold makes the final stfld unverifiable
        weaver.is_generic_handler = false;
        weaver.field_type = crate::test::changed_event_args();
        let methods = f.module.methods().len();

        assert!(matches!(
            weaver.add_unsubscribe_method(&mut f.module),
            Err(Error::Verification { .. })
        ));
        assert_eq!(f.module.methods().len(), methods);
        assert!(f
            .module
            .find_method(f.publisher, &unsubscribe_method_name("Changed"))
            .is_none());
        assert_eq!(f.module.type_def(f.publisher)?.methods, vec![f.add, f.remove]);

        let weaver = EventWeaver::new(&f.module, f.field, &f.importer)?;
        let unsubscribe = weaver.add_unsubscribe_method(&mut f.module)?;
        verify_method(&f.module, unsubscribe)?;
        Ok(())
    }

    #[test]
    fn event_args_derivation() -> Result<()> {
        let f = custom_delegate_event(false);
        assert_eq!(
            event_args_type(&f.module, &TypeSig::class("System", "EventHandler"))?,
            TypeSig::class("System", "EventArgs")
        );
        assert_eq!(
            event_args_type(&f.module, &TypeSig::class("Sample", "ChangedHandler"))?,
            TypeSig::class("Sample", "ChangedEventArgs")
        );

        let r = referenced_delegate_event(false);
        assert_eq!(
            event_args_type(&r.module, &r.handler)?,
            TypeSig::class("System.ComponentModel", "PropertyChangedEventArgs")
        );
        assert!(matches!(
            event_args_type(&f.module, &r.handler),
            Err(Error::UnsupportedDelegate(_))
        ));
        assert!(matches!(
            event_args_type(&f.module, &TypeSig::class("Sample", "Publisher")),
            Err(Error::UnsupportedDelegate(_))
        ));
        assert!(matches!(
            event_args_type(&f.module, &TypeSig::Object),
            Err(Error::UnsupportedDelegate(_))
        ));
        Ok(())
    }

    #[test]
    fn importer_of_another_module_fails_fast() -> Result<()> {
        let f = generic_event(false);
        let mut bare = Module::new("Bare.dll");
        let owner = crate::metadata::builders::ClassBuilder::new("Publisher").build(&mut bare)?;
        let field = crate::metadata::builders::FieldBuilder::new("Changed", f.handler.clone())
            .build(&mut bare, owner)?;

        assert!(matches!(
            EventWeaver::new(&bare, field, &f.importer),
            Err(Error::UnresolvedReference(_))
        ));
        assert!(matches!(
            EventWeaver::new(&f.module, Token::new(0x0400_0063), &f.importer),
            Err(Error::MemberNotFound(_))
        ));
        Ok(())
    }
}
