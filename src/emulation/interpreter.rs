//! The interpreter.

use std::{collections::HashMap, rc::Rc};

use crate::{
    assembly::OpCode,
    emulation::{
        runtime,
        value::{DelegateEntry, DelegateValue, EmValue, Invocation, ObjectRef},
        EmulationError,
    },
    metadata::{
        memberref::MemberRef,
        module::{CallTarget, Module},
        token::Token,
        typesystem::TypeSig,
    },
    weaving::{
        names::{
            CHANGE_TYPE, COMBINE, DELEGATE, DELEGATE_CONVERT_TYPE, FIND_WEAK, INVOKE, MAKE_WEAK,
            MULTICAST_DELEGATE, REMOVE, SYSTEM, WEAK_EXTENSIONS_TYPE,
        },
        WeavingConfig,
    },
    Result,
};

/// Maximum nesting of emulated calls
pub const MAX_CALL_DEPTH: usize = 64;

/// A method invocation recorded by the interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceEvent {
    /// The invoked method definition
    pub method: Token,
    /// The `this` object, absent for static methods
    pub this: Option<ObjectRef>,
}

#[derive(Debug)]
struct HeapObject {
    ty: TypeSig,
    alive: bool,
    fields: HashMap<Token, EmValue>,
}

/// Executes method bodies of a module against an emulated heap.
///
/// Methods with an empty body are treated as opaque event handlers: calling one only
/// records a [`TraceEvent`].
///
/// ```rust
/// use weakevents::{
///     emulation::{EmValue, Interpreter},
///     metadata::{builders::{ClassBuilder, FieldBuilder}, module::Module, typesystem::TypeSig},
/// };
///
/// let mut module = Module::new("Sample.dll");
/// let owner = ClassBuilder::new("Publisher").build(&mut module)?;
/// let field = FieldBuilder::new("Changed", TypeSig::class("System", "EventHandler"))
///     .build(&mut module, owner)?;
///
/// let mut interpreter = Interpreter::new(&module);
/// let publisher = interpreter.alloc(TypeSig::class("", "Publisher"))?;
/// assert_eq!(interpreter.field_value(field, Some(publisher))?, EmValue::Null);
/// # Ok::<(), weakevents::Error>(())
/// ```
pub struct Interpreter<'a> {
    module: &'a Module,
    runtime_namespace: String,
    objects: Vec<HeapObject>,
    statics: HashMap<Token, EmValue>,
    trace: Vec<TraceEvent>,
    next_weak_id: u32,
    depth: usize,
}

fn pop(stack: &mut Vec<EmValue>) -> std::result::Result<EmValue, EmulationError> {
    stack.pop().ok_or(EmulationError::StackUnderflow)
}

fn pop_args(stack: &mut Vec<EmValue>, count: usize) -> std::result::Result<Vec<EmValue>, EmulationError> {
    if stack.len() < count {
        return Err(EmulationError::StackUnderflow);
    }
    Ok(stack.split_off(stack.len() - count))
}

fn two(args: Vec<EmValue>) -> std::result::Result<(EmValue, EmValue), EmulationError> {
    let count = args.len();
    let mut args = args.into_iter();
    match (args.next(), args.next(), args.next()) {
        (Some(first), Some(second), None) => Ok((first, second)),
        _ => Err(EmulationError::ArgumentIndexOutOfBounds { index: 1, count }),
    }
}

fn operand(token: Option<Token>) -> Result<Token> {
    token.ok_or_else(|| malformed_error!("Instruction without token operand"))
}

fn instance(value: EmValue) -> Result<ObjectRef> {
    match value {
        EmValue::Object(object) => Ok(object),
        EmValue::Null => Err(EmulationError::NullReference.into()),
        other => Err(EmulationError::TypeMismatch {
            operation: "field access",
            found: other.describe(),
        }
        .into()),
    }
}

fn is_universal_base(sig: &TypeSig) -> bool {
    matches!(sig, TypeSig::Object)
        || sig.is_class(SYSTEM, DELEGATE)
        || sig.is_class(SYSTEM, MULTICAST_DELEGATE)
}

impl<'a> Interpreter<'a> {
    /// Create an interpreter for `module` expecting the default runtime namespace
    #[must_use]
    pub fn new(module: &'a Module) -> Self {
        Self::with_config(module, &WeavingConfig::default())
    }

    /// Create an interpreter for `module` expecting the runtime helpers of `config`
    #[must_use]
    pub fn with_config(module: &'a Module, config: &WeavingConfig) -> Self {
        Interpreter {
            module,
            runtime_namespace: config.runtime_namespace.clone(),
            objects: Vec::new(),
            statics: HashMap::new(),
            trace: Vec::new(),
            next_weak_id: 0,
            depth: 0,
        }
    }

    /// Allocate an object of type `ty` with all fields null
    ///
    /// # Errors
    /// Returns [`EmulationError::HeapObjectLimitExceeded`] once object ids are exhausted.
    pub fn alloc(&mut self, ty: TypeSig) -> Result<ObjectRef> {
        let id = u32::try_from(self.objects.len())
            .map_err(|_| EmulationError::HeapObjectLimitExceeded { limit: u32::MAX })?;
        self.objects.push(HeapObject {
            ty,
            alive: true,
            fields: HashMap::new(),
        });
        Ok(ObjectRef(id))
    }

    /// Collect `object`, as the garbage collector would once it is only weakly reachable
    ///
    /// # Errors
    /// Returns [`EmulationError::InvalidHeapReference`] for an unknown object.
    pub fn collect(&mut self, object: ObjectRef) -> Result<()> {
        let slot = self.object_mut(object)?;
        slot.alive = false;
        slot.fields.clear();
        log::trace!("Collected {}", object);
        Ok(())
    }

    /// Returns true if `object` exists and has not been collected
    #[must_use]
    pub fn is_alive(&self, object: ObjectRef) -> bool {
        self.objects
            .get(object.0 as usize)
            .is_some_and(|slot| slot.alive)
    }

    /// The methods invoked so far, in call order
    #[must_use]
    pub fn trace(&self) -> &[TraceEvent] {
        &self.trace
    }

    /// Forget the recorded invocations
    pub fn clear_trace(&mut self) {
        self.trace.clear();
    }

    /// Number of recorded invocations of `method`
    #[must_use]
    pub fn invocations_of(&self, method: Token) -> usize {
        self.trace.iter().filter(|event| event.method == method).count()
    }

    /// Read `field` of `instance`, or the static `field` if `instance` is `None`
    ///
    /// # Errors
    /// Returns [`crate::Error::MemberNotFound`] for an unknown field, or
    /// [`EmulationError::NullReference`] if an instance field is read without instance.
    pub fn field_value(&self, field: Token, instance: Option<ObjectRef>) -> Result<EmValue> {
        let definition = self.module.field(field)?;
        if definition.is_static() {
            return Ok(self.statics.get(&field).cloned().unwrap_or_default());
        }

        let object = instance.ok_or(EmulationError::NullReference)?;
        Ok(self
            .object(object)?
            .fields
            .get(&field)
            .cloned()
            .unwrap_or_default())
    }

    /// Write `field` of `instance`, or the static `field` if `instance` is `None`
    ///
    /// # Errors
    /// See [`Interpreter::field_value`].
    pub fn set_field_value(
        &mut self,
        field: Token,
        instance: Option<ObjectRef>,
        value: EmValue,
    ) -> Result<()> {
        let definition = self.module.field(field)?;
        if definition.is_static() {
            self.statics.insert(field, value);
            return Ok(());
        }

        let object = instance.ok_or(EmulationError::NullReference)?;
        self.object_mut(object)?.fields.insert(field, value);
        Ok(())
    }

    /// Invoke the method definition `method`.
    ///
    /// `this` is required for instance methods and ignored for static ones.
    ///
    /// # Errors
    /// Returns [`crate::Error::Emulation`] for runtime failures, or a lookup error if the
    /// body references tokens that do not resolve.
    pub fn invoke(
        &mut self,
        method: Token,
        this: Option<ObjectRef>,
        args: Vec<EmValue>,
    ) -> Result<Option<EmValue>> {
        let definition = self.module.method(method)?;
        let mut all = Vec::with_capacity(args.len() + 1);
        if !definition.is_static() {
            all.push(EmValue::Object(this.ok_or(EmulationError::NullReference)?));
        }
        all.extend(args);
        self.call_method(method, all)
    }

    /// Invoke every entry of `delegate` with `args`.
    ///
    /// Weak handlers whose target has been collected call their unsubscribe callback
    /// with themselves instead.
    ///
    /// # Errors
    /// Returns an error if any invoked body fails.
    pub fn invoke_delegate(&mut self, delegate: &DelegateValue, args: Vec<EmValue>) -> Result<()> {
        for entry in delegate.entries.clone() {
            match entry {
                DelegateEntry::Strong(invocation) => {
                    self.invoke_bound(invocation, args.clone())?;
                }
                DelegateEntry::Weak(weak) => {
                    let alive = weak
                        .invocation
                        .target
                        .is_none_or(|target| self.is_alive(target));
                    if alive {
                        self.invoke_bound(weak.invocation, args.clone())?;
                    } else {
                        log::trace!("Weak handler #{} lost its target, unsubscribing", weak.id);
                        let handler = EmValue::Delegate(DelegateValue {
                            ty: weak.handler_type.clone(),
                            entries: vec![DelegateEntry::Weak(Rc::clone(&weak))],
                        });
                        self.invoke_delegate(&weak.unsubscribe, vec![handler])?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Raise the event stored in `field` with `(sender, event_args)`; a null field is a no-op
    ///
    /// # Errors
    /// Returns an error if the field can not be read or a handler fails.
    pub fn raise(
        &mut self,
        field: Token,
        instance: Option<ObjectRef>,
        sender: EmValue,
        event_args: EmValue,
    ) -> Result<()> {
        match self.field_value(field, instance)? {
            EmValue::Null => Ok(()),
            EmValue::Delegate(delegate) => self.invoke_delegate(&delegate, vec![sender, event_args]),
            other => Err(EmulationError::TypeMismatch {
                operation: "raise",
                found: other.describe(),
            }
            .into()),
        }
    }

    fn object(&self, object: ObjectRef) -> Result<&HeapObject> {
        self.objects
            .get(object.0 as usize)
            .filter(|slot| slot.alive)
            .ok_or_else(|| {
                EmulationError::InvalidHeapReference {
                    reference_id: object.0,
                }
                .into()
            })
    }

    fn object_mut(&mut self, object: ObjectRef) -> Result<&mut HeapObject> {
        self.objects
            .get_mut(object.0 as usize)
            .filter(|slot| slot.alive)
            .ok_or_else(|| {
                EmulationError::InvalidHeapReference {
                    reference_id: object.0,
                }
                .into()
            })
    }

    fn invoke_bound(&mut self, invocation: Invocation, args: Vec<EmValue>) -> Result<Option<EmValue>> {
        let mut all = Vec::with_capacity(args.len() + 1);
        if let Some(target) = invocation.target {
            all.push(EmValue::Object(target));
        }
        all.extend(args);
        self.call_method(invocation.method, all)
    }

    fn call_method(&mut self, method: Token, args: Vec<EmValue>) -> Result<Option<EmValue>> {
        if self.depth >= MAX_CALL_DEPTH {
            return Err(EmulationError::CallDepthExceeded {
                depth: MAX_CALL_DEPTH,
            }
            .into());
        }

        let is_static = self.module.method(method)?.is_static();
        let this = match args.first() {
            Some(EmValue::Object(object)) if !is_static => Some(*object),
            _ => None,
        };
        self.trace.push(TraceEvent { method, this });
        log::trace!("Invoking {}", self.module.display_name(method));

        self.depth += 1;
        let result = self.execute(method, args);
        self.depth -= 1;
        result
    }

    fn execute(&mut self, method_token: Token, args: Vec<EmValue>) -> Result<Option<EmValue>> {
        let module = self.module;
        let method = module.method(method_token)?;
        if method.body.is_empty() {
            return Ok((!method.return_type.is_void()).then_some(EmValue::Null));
        }

        let mut locals = vec![EmValue::Null; method.body.locals.len()];
        let mut stack: Vec<EmValue> = Vec::new();

        for instruction in &method.body.instructions {
            match instruction.opcode {
                OpCode::Nop => {}
                OpCode::Ldarg0
                | OpCode::Ldarg1
                | OpCode::Ldarg2
                | OpCode::Ldarg3
                | OpCode::LdargS => {
                    let index = usize::from(instruction.argument_index().unwrap_or(u8::MAX));
                    let value = args.get(index).cloned().ok_or(
                        EmulationError::ArgumentIndexOutOfBounds {
                            index,
                            count: args.len(),
                        },
                    )?;
                    stack.push(value);
                }
                OpCode::Ldloc0
                | OpCode::Ldloc1
                | OpCode::Ldloc2
                | OpCode::Ldloc3
                | OpCode::LdlocS => {
                    let index = usize::from(instruction.local_index().unwrap_or(u8::MAX));
                    let value = locals.get(index).cloned().ok_or(
                        EmulationError::LocalIndexOutOfBounds {
                            index,
                            count: locals.len(),
                        },
                    )?;
                    stack.push(value);
                }
                OpCode::Stloc0
                | OpCode::Stloc1
                | OpCode::Stloc2
                | OpCode::Stloc3
                | OpCode::StlocS => {
                    let index = usize::from(instruction.local_index().unwrap_or(u8::MAX));
                    let count = locals.len();
                    let value = pop(&mut stack)?;
                    let slot = locals
                        .get_mut(index)
                        .ok_or(EmulationError::LocalIndexOutOfBounds { index, count })?;
                    *slot = value;
                }
                OpCode::Ldnull => stack.push(EmValue::Null),
                OpCode::Dup => {
                    let value = pop(&mut stack)?;
                    stack.push(value.clone());
                    stack.push(value);
                }
                OpCode::Pop => {
                    pop(&mut stack)?;
                }
                OpCode::Ldfld => {
                    let field = operand(instruction.token())?;
                    let object = instance(pop(&mut stack)?)?;
                    let value = self.field_value(field, Some(object))?;
                    stack.push(value);
                }
                OpCode::Stfld => {
                    let field = operand(instruction.token())?;
                    let value = pop(&mut stack)?;
                    let object = instance(pop(&mut stack)?)?;
                    self.set_field_value(field, Some(object), value)?;
                }
                OpCode::Ldsfld => {
                    let field = operand(instruction.token())?;
                    stack.push(self.field_value(field, None)?);
                }
                OpCode::Stsfld => {
                    let field = operand(instruction.token())?;
                    let value = pop(&mut stack)?;
                    self.set_field_value(field, None, value)?;
                }
                OpCode::Ldftn => {
                    let target = operand(instruction.token())?;
                    stack.push(EmValue::FnPtr(target));
                }
                OpCode::Castclass => {
                    let token = operand(instruction.token())?;
                    let target = module.resolve_type(token)?;
                    let value = pop(&mut stack)?;
                    stack.push(self.cast(value, &target)?);
                }
                OpCode::Call | OpCode::Callvirt => {
                    let token = operand(instruction.token())?;
                    let target = module.call_target(token)?;
                    let call_args = pop_args(&mut stack, target.signature.params.len())?;
                    let this = if target.signature.has_this {
                        Some(pop(&mut stack)?)
                    } else {
                        None
                    };

                    let result = if token.is_table(Token::METHOD_DEF) {
                        let mut all: Vec<EmValue> = this.into_iter().collect();
                        all.extend(call_args);
                        self.call_method(token, all)?
                    } else {
                        self.call_external(token, &target, this, call_args)?
                    };
                    if let Some(value) = result {
                        stack.push(value);
                    }
                }
                OpCode::Newobj => {
                    let token = operand(instruction.token())?;
                    let target = module.call_target(token)?;
                    let ctor_args = pop_args(&mut stack, target.signature.params.len())?;
                    stack.push(self.construct(token, target, ctor_args)?);
                }
                OpCode::Ret => {
                    if method.return_type.is_void() {
                        return Ok(None);
                    }
                    return Ok(Some(pop(&mut stack)?));
                }
            }
        }

        Err(EmulationError::MissingReturn(module.display_name(method_token)).into())
    }

    fn cast(&self, value: EmValue, target: &TypeSig) -> Result<EmValue> {
        let actual = match &value {
            EmValue::Null => return Ok(value),
            EmValue::Delegate(delegate) => delegate.ty.clone(),
            EmValue::Object(object) => self.object(*object)?.ty.clone(),
            EmValue::FnPtr(_) => {
                return Err(EmulationError::TypeMismatch {
                    operation: "castclass",
                    found: value.describe(),
                }
                .into())
            }
        };

        if actual.full_name() == target.full_name() || is_universal_base(target) {
            Ok(value)
        } else {
            Err(EmulationError::InvalidCast {
                from_type: actual.full_name(),
                to_type: target.full_name(),
            }
            .into())
        }
    }

    fn construct(&mut self, token: Token, target: CallTarget, args: Vec<EmValue>) -> Result<EmValue> {
        if target.signature.params == [TypeSig::Object, TypeSig::IntPtr] {
            let (bound, pointer) = two(args)?;
            let object = match bound {
                EmValue::Null => None,
                EmValue::Object(object) => Some(object),
                other => {
                    return Err(EmulationError::TypeMismatch {
                        operation: "delegate construction",
                        found: other.describe(),
                    }
                    .into())
                }
            };
            let EmValue::FnPtr(method) = pointer else {
                return Err(EmulationError::TypeMismatch {
                    operation: "delegate construction",
                    found: pointer.describe(),
                }
                .into());
            };
            return Ok(EmValue::Delegate(DelegateValue::bound(
                target.declaring_type,
                object,
                method,
            )));
        }

        if token.is_table(Token::METHOD_DEF) {
            let object = self.alloc(target.declaring_type)?;
            let mut all = vec![EmValue::Object(object)];
            all.extend(args);
            self.call_method(token, all)?;
            return Ok(EmValue::Object(object));
        }

        Err(EmulationError::UnsupportedCall(self.module.display_name(token)).into())
    }

    fn helper(&self, token: Token) -> Result<&'a MemberRef> {
        let module = self.module;
        let reference = if token.is_table(Token::METHOD_SPEC) {
            module.get_method_spec(token)?.method
        } else {
            token
        };
        module.member_ref(reference)
    }

    fn call_external(
        &mut self,
        token: Token,
        target: &CallTarget,
        this: Option<EmValue>,
        args: Vec<EmValue>,
    ) -> Result<Option<EmValue>> {
        if target.name == INVOKE {
            if let Some(EmValue::Delegate(delegate)) = &this {
                self.invoke_delegate(delegate, args)?;
                return Ok(None);
            }
        }

        let helper = self.helper(token)?;
        let runtime_ns = self.runtime_namespace.as_str();
        let returned = &target.signature.return_type;

        let value = if helper.is(SYSTEM, DELEGATE, COMBINE) {
            let (left, right) = two(args)?;
            runtime::combine(left, right)?
        } else if helper.is(SYSTEM, DELEGATE, REMOVE) {
            let (source, value) = two(args)?;
            runtime::remove(source, value)?
        } else if helper.is(runtime_ns, DELEGATE_CONVERT_TYPE, CHANGE_TYPE) {
            let value = args
                .into_iter()
                .next()
                .ok_or(EmulationError::ArgumentIndexOutOfBounds { index: 0, count: 0 })?;
            runtime::change_type(value, returned)?
        } else if helper.is(runtime_ns, WEAK_EXTENSIONS_TYPE, MAKE_WEAK) {
            let (handler, unsubscribe) = two(args)?;
            runtime::make_weak(handler, unsubscribe, returned, &mut self.next_weak_id)?
        } else if helper.is(runtime_ns, WEAK_EXTENSIONS_TYPE, FIND_WEAK) {
            let (source, handler) = two(args)?;
            runtime::find_weak(source, handler, returned)?
        } else {
            return Err(EmulationError::UnsupportedCall(self.module.display_name(token)).into());
        };

        Ok(Some(value))
    }
}
