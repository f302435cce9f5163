//! Value-threading instruction emitter.
//!
//! An [`IlEmitter`] builds instruction sequences for one method out of single logical
//! operations. Every operation that leaves a value on the evaluation stack returns it as
//! an [`IlValue`]: the instructions that compute the value, plus its static type.
//! Operations that consume values take them by move and concatenate their fragments in
//! evaluation order, so a chain of calls reads like the expression it compiles:
//!
//! ```text
//! store(local, convert(find_weak(load_field(f), convert(load_method_1st_arg()))))
//! ```
//!
//! Because an `IlValue` can only be moved once, a value is consumed exactly once; the
//! terminal operations [`IlEmitter::store`] and [`IlEmitter::store_field`] turn the last
//! value into an [`InstructionSequence`] with a balanced stack.
//!
//! # Examples
//!
//! ```rust
//! use weakevents::{
//!     metadata::{builders::{ClassBuilder, FieldBuilder, MethodBuilder}, module::Module, typesystem::TypeSig},
//!     weaving::{IlEmitter, ModuleImporter},
//! };
//!
//! let mut module = Module::new("Sample.dll");
//! let importer = ModuleImporter::new(&mut module)?;
//! let handler = TypeSig::class("System", "EventHandler");
//! let owner = ClassBuilder::new("Publisher").build(&mut module)?;
//! let field = FieldBuilder::new("Changed", handler.clone()).build(&mut module, owner)?;
//! let setter = MethodBuilder::new("set_Changed")
//!     .parameter("value", handler)
//!     .build(&mut module, owner)?;
//!
//! let mut emitter = IlEmitter::new(&mut module, &importer, setter)?;
//! let value = emitter.load_method_1st_arg()?;
//! let body = emitter.store_field(value, field)?.ret();
//!
//! assert_eq!(body.to_string(), "IL_0000: ldarg.0\nIL_0001: ldarg.1\nIL_0002: stfld 0x04000001\nIL_0003: ret\n");
//! # Ok::<(), weakevents::Error>(())
//! ```

use crate::{
    assembly::{Instruction, InstructionSequence, OpCode},
    metadata::{
        method::VariableDefinition, module::Module, token::Token, typesystem::TypeSig,
    },
    weaving::importer::ModuleImporter,
    Error, Result,
};

/// A value on the evaluation stack: the instructions producing it and its static type.
///
/// A value can not be copied, so its instructions, including any side-effecting calls,
/// end up in at most one sequence:
///
/// ```compile_fail
/// fn duplicate(value: &weakevents::weaving::IlValue) -> weakevents::weaving::IlValue {
///     value.clone()
/// }
/// ```
#[must_use = "a value left on the stack makes the method body unverifiable"]
#[derive(Debug)]
pub struct IlValue {
    instructions: InstructionSequence,
    sig: TypeSig,
}

impl IlValue {
    fn new(instructions: Vec<Instruction>, sig: TypeSig) -> Self {
        IlValue {
            instructions: InstructionSequence::from_instructions(instructions),
            sig,
        }
    }

    /// Static type of the value
    #[must_use]
    pub fn sig(&self) -> &TypeSig {
        &self.sig
    }

    /// Instructions computing the value
    #[must_use]
    pub fn instructions(&self) -> &InstructionSequence {
        &self.instructions
    }

    fn then(self, instruction: Instruction, sig: TypeSig) -> IlValue {
        let mut instructions = self.instructions;
        instructions.push(instruction);
        IlValue { instructions, sig }
    }
}

/// Emits instruction sequences for one method of a module.
pub struct IlEmitter<'a> {
    module: &'a mut Module,
    importer: &'a ModuleImporter,
    method: Token,
    is_static: bool,
    first_param_index: u8,
    first_param: Option<TypeSig>,
}

impl<'a> IlEmitter<'a> {
    /// Create an emitter for `method`
    ///
    /// # Errors
    /// Returns [`Error::MemberNotFound`] if `method` is not a method of `module`.
    pub fn new(module: &'a mut Module, importer: &'a ModuleImporter, method: Token) -> Result<Self> {
        let definition = module.method(method)?;
        let is_static = definition.is_static();
        let first_param_index = definition.first_param_index();
        let first_param = definition.params.first().map(|param| param.sig.clone());

        Ok(IlEmitter {
            module,
            importer,
            method,
            is_static,
            first_param_index,
            first_param,
        })
    }

    /// The method instructions are emitted for
    #[must_use]
    pub fn method(&self) -> Token {
        self.method
    }

    /// Push the first formal parameter (`ldarg.1`, or `ldarg.0` in a static method)
    ///
    /// # Errors
    /// Returns [`Error::Malformed`] if the method has no parameters.
    pub fn load_method_1st_arg(&self) -> Result<IlValue> {
        let sig = self
            .first_param
            .clone()
            .ok_or_else(|| malformed_error!("Method {} has no parameters", self.method))?;
        Ok(IlValue::new(
            vec![Instruction::ldarg(self.first_param_index)],
            sig,
        ))
    }

    /// Push the value of `field`, from `this` or from the type if the field is static
    ///
    /// # Errors
    /// Returns [`Error::MemberNotFound`] if `field` is not a field of the module, or
    /// [`Error::Malformed`] for an instance field accessed from a static method.
    pub fn load_field(&self, field: Token) -> Result<IlValue> {
        let definition = self.module.field(field)?;
        let sig = definition.sig.clone();
        if definition.is_static() {
            return Ok(IlValue::new(
                vec![Instruction::with_token(OpCode::Ldsfld, field)],
                sig,
            ));
        }

        self.require_this(field)?;
        Ok(IlValue::new(
            vec![
                Instruction::ldarg(0),
                Instruction::with_token(OpCode::Ldfld, field),
            ],
            sig,
        ))
    }

    /// Store `value` into `field`
    ///
    /// # Errors
    /// Returns [`Error::MemberNotFound`] if `field` is not a field of the module, or
    /// [`Error::Malformed`] for an instance field accessed from a static method.
    pub fn store_field(&self, value: IlValue, field: Token) -> Result<InstructionSequence> {
        let definition = self.module.field(field)?;
        if definition.is_static() {
            let mut sequence = value.instructions;
            sequence.push(Instruction::with_token(OpCode::Stsfld, field));
            return Ok(sequence);
        }

        self.require_this(field)?;
        let mut sequence = InstructionSequence::from_instructions(vec![Instruction::ldarg(0)])
            .append(value.instructions);
        sequence.push(Instruction::with_token(OpCode::Stfld, field));
        Ok(sequence)
    }

    /// Re-type the delegate `value` as `target` with `DelegateConvert.ChangeType<target>`
    ///
    /// # Errors
    /// Returns an error if the conversion helper can not be instantiated in the module.
    pub fn delegate_convert(&mut self, value: IlValue, target: &TypeSig) -> Result<IlValue> {
        let change_type = self
            .module
            .method_spec(self.importer.delegate_convert(), vec![target.clone()])?;
        Ok(value.then(
            Instruction::with_token(OpCode::Call, change_type),
            target.clone(),
        ))
    }

    /// `Delegate.Remove(source, handler)`, cast back to the type of `source`
    ///
    /// # Errors
    /// Returns an error if the type of `source` can not be referenced in the module.
    pub fn call_delegate_remove(&mut self, source: IlValue, handler: IlValue) -> Result<IlValue> {
        let remove = self.importer.delegate_remove();
        self.delegate_operation(remove, source, handler)
    }

    /// `Delegate.Combine(source, handler)`, cast back to the type of `source`
    ///
    /// # Errors
    /// Returns an error if the type of `source` can not be referenced in the module.
    pub fn call_delegate_combine(&mut self, source: IlValue, handler: IlValue) -> Result<IlValue> {
        let combine = self.importer.delegate_combine();
        self.delegate_operation(combine, source, handler)
    }

    /// `FindWeak<T>(source, handler)` where `closed_handler` is ``EventHandler`1<T>``
    ///
    /// # Errors
    /// Returns [`Error::UnsupportedDelegate`] if `closed_handler` is not a closed generic
    /// handler.
    pub fn find_weak(
        &mut self,
        closed_handler: &TypeSig,
        source: IlValue,
        handler: IlValue,
    ) -> Result<IlValue> {
        let find_weak = self.instantiate(self.importer.find_weak(), closed_handler)?;
        let mut instructions = source.instructions.append(handler.instructions);
        instructions.push(Instruction::with_token(OpCode::Call, find_weak));
        Ok(IlValue {
            instructions,
            sig: closed_handler.clone(),
        })
    }

    /// `MakeWeak<T>(handler, unsubscribe)` where `closed_handler` is ``EventHandler`1<T>``
    ///
    /// # Errors
    /// Returns [`Error::UnsupportedDelegate`] if `closed_handler` is not a closed generic
    /// handler.
    pub fn make_weak(
        &mut self,
        closed_handler: &TypeSig,
        handler: IlValue,
        unsubscribe: IlValue,
    ) -> Result<IlValue> {
        let make_weak = self.instantiate(self.importer.make_weak(), closed_handler)?;
        let mut instructions = handler.instructions.append(unsubscribe.instructions);
        instructions.push(Instruction::with_token(OpCode::Call, make_weak));
        Ok(IlValue {
            instructions,
            sig: closed_handler.clone(),
        })
    }

    /// Construct a delegate of the type declaring `constructor`, bound to `method`.
    ///
    /// The bound target is `this` for an instance `method` and `null` for a static one.
    ///
    /// # Errors
    /// Returns [`Error::MemberNotFound`] if either token does not resolve.
    pub fn new_object(&self, constructor: Token, method: Token) -> Result<IlValue> {
        let target = self.module.method(method)?;
        let load_target = if target.is_static() {
            Instruction::simple(OpCode::Ldnull)
        } else {
            self.require_this(method)?;
            Instruction::ldarg(0)
        };
        let created = self.module.call_target(constructor)?.declaring_type;

        Ok(IlValue::new(
            vec![
                load_target,
                Instruction::with_token(OpCode::Ldftn, method),
                Instruction::with_token(OpCode::Newobj, constructor),
            ],
            created,
        ))
    }

    /// Store `value` into the local `variable`
    ///
    /// # Errors
    /// Returns [`Error::OutOfBounds`] if `variable` is not a local of the method.
    pub fn store(&self, variable: &VariableDefinition, value: IlValue) -> Result<InstructionSequence> {
        let index = self.local_index(variable)?;
        let mut sequence = value.instructions;
        sequence.push(Instruction::stloc(index));
        Ok(sequence)
    }

    /// Push the local `variable`
    ///
    /// # Errors
    /// Returns [`Error::OutOfBounds`] if `variable` is not a local of the method.
    pub fn load_local(&self, variable: &VariableDefinition) -> Result<IlValue> {
        let index = self.local_index(variable)?;
        Ok(IlValue::new(
            vec![Instruction::ldloc(index)],
            variable.sig.clone(),
        ))
    }

    fn delegate_operation(&mut self, operation: Token, source: IlValue, handler: IlValue) -> Result<IlValue> {
        let sig = source.sig;
        let cast = self.module.import_type(&sig)?;
        let mut instructions = source.instructions.append(handler.instructions);
        instructions.push(Instruction::with_token(OpCode::Call, operation));
        instructions.push(Instruction::with_token(OpCode::Castclass, cast));
        Ok(IlValue { instructions, sig })
    }

    fn local_index(&self, variable: &VariableDefinition) -> Result<u8> {
        let method = self.module.method(self.method)?;
        if method.body.local(variable.index).is_none() {
            return Err(Error::OutOfBounds);
        }
        u8::try_from(variable.index).map_err(|_| Error::OutOfBounds)
    }

    fn instantiate(&mut self, generic: Token, closed_handler: &TypeSig) -> Result<Token> {
        let event_args = match closed_handler.generic_args() {
            [event_args] => event_args.clone(),
            _ => {
                return Err(Error::UnsupportedDelegate(format!(
                    "{closed_handler} is not a closed generic event handler"
                )))
            }
        };
        self.module.method_spec(generic, vec![event_args])
    }

    fn require_this(&self, member: Token) -> Result<()> {
        if self.is_static {
            return Err(malformed_error!(
                "Static method {} can not access instance member {}",
                self.method,
                member
            ));
        }
        Ok(())
    }
}
