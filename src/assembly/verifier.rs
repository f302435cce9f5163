//! Type-flow verification of method bodies.
//!
//! [`verify_method`] walks a body once, tracking the static type of every evaluation
//! stack slot, and rejects bodies that would fail the runtime's verifier:
//!
//! - stack underflow, and values left on the stack at `ret`
//! - arguments, locals, fields or call operands whose types are not assignable
//! - instance field access on static fields and vice versa
//! - unresolvable operand tokens
//! - control falling off the end of the body
//!
//! The instruction set produced by the weaver has no branches, so a single linear pass
//! is exact.
//!
//! # Assignability
//!
//! The verifier uses the weaver's type identity, full-name equality, plus the widening
//! conversions the generated bodies rely on: every reference type is assignable to
//! `System.Object`, `System.Delegate` and `System.MulticastDelegate`, and `null` is
//! assignable to every reference type. No other subtyping is modelled, which is why a
//! custom delegate stored into a field of type ``EventHandler`1<T>`` requires a
//! conversion call.

use crate::{
    assembly::{Instruction, OpCode},
    metadata::{module::Module, token::Token, typesystem::TypeSig},
    Result,
};

/// Result of a successful verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackSummary {
    /// Maximum evaluation stack depth reached
    pub max_stack: usize,
    /// Number of instructions verified
    pub instructions: usize,
}

/// Static type of one evaluation stack slot.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Slot {
    Null,
    Value(TypeSig),
}

impl Slot {
    fn describe(&self) -> String {
        match self {
            Slot::Null => "null".to_string(),
            Slot::Value(sig) => sig.full_name(),
        }
    }
}

fn is_universal_base(sig: &TypeSig) -> bool {
    matches!(sig, TypeSig::Object)
        || sig.is_class("System", "Delegate")
        || sig.is_class("System", "MulticastDelegate")
}

fn is_assignable(from: &Slot, to: &TypeSig) -> bool {
    match from {
        Slot::Null => to.is_reference(),
        Slot::Value(sig) => {
            sig.full_name() == to.full_name() || (sig.is_reference() && is_universal_base(to))
        }
    }
}

struct Frame<'a> {
    module: &'a Module,
    method: String,
    stack: Vec<Slot>,
    max_stack: usize,
    offset: usize,
}

impl Frame<'_> {
    fn push(&mut self, slot: Slot) {
        self.stack.push(slot);
        self.max_stack = self.max_stack.max(self.stack.len());
    }

    fn pop(&mut self) -> Result<Slot> {
        self.stack.pop().ok_or_else(|| {
            verification_error!(self.method, self.offset, "stack underflow")
        })
    }

    fn pop_assignable(&mut self, to: &TypeSig, what: &str) -> Result<()> {
        let slot = self.pop()?;
        if is_assignable(&slot, to) {
            Ok(())
        } else {
            Err(verification_error!(
                self.method,
                self.offset,
                "{} of type {} is not assignable to {}",
                what,
                slot.describe(),
                to
            ))
        }
    }

    fn pop_reference(&mut self, what: &str) -> Result<Slot> {
        let slot = self.pop()?;
        match &slot {
            Slot::Null => Ok(slot),
            Slot::Value(sig) if sig.is_reference() => Ok(slot),
            Slot::Value(sig) => Err(verification_error!(
                self.method,
                self.offset,
                "{} must be an object reference, found {}",
                what,
                sig
            )),
        }
    }

    fn call(&mut self, instruction: &Instruction, token: Token) -> Result<()> {
        let target = self.module.call_target(token)?;
        for (index, param) in target.signature.params.iter().enumerate().rev() {
            self.pop_assignable(param, &format!("argument {index}"))?;
        }

        if instruction.opcode == OpCode::Newobj {
            if target.name != ".ctor" {
                return Err(verification_error!(
                    self.method,
                    self.offset,
                    "newobj target {} is not a constructor",
                    target.name
                ));
            }
            self.push(Slot::Value(target.declaring_type));
            return Ok(());
        }

        if target.signature.has_this {
            self.pop_assignable(&target.declaring_type, "this")?;
        }
        if !target.signature.return_type.is_void() {
            self.push(Slot::Value(target.signature.return_type));
        }
        Ok(())
    }

    fn field(&mut self, opcode: OpCode, token: Token) -> Result<()> {
        let module = self.module;
        let field = module.field(token)?;
        let expects_static = matches!(opcode, OpCode::Ldsfld | OpCode::Stsfld);
        if field.is_static() != expects_static {
            return Err(verification_error!(
                self.method,
                self.offset,
                "{} used on {} field {}",
                opcode.mnemonic(),
                if field.is_static() { "static" } else { "instance" },
                field.name
            ));
        }

        let sig = field.sig.clone();
        let owner = module.type_def(field.declaring_type)?.sig();
        match opcode {
            OpCode::Ldfld => {
                self.pop_assignable(&owner, "field owner")?;
                self.push(Slot::Value(sig));
            }
            OpCode::Stfld => {
                self.pop_assignable(&sig, "stored value")?;
                self.pop_assignable(&owner, "field owner")?;
            }
            OpCode::Ldsfld => self.push(Slot::Value(sig)),
            _ => self.pop_assignable(&sig, "stored value")?,
        }
        Ok(())
    }
}

/// Verify the body of `method_token` and return its stack requirements.
///
/// # Errors
/// Returns [`crate::Error::Verification`] describing the first rejected instruction, or
/// [`crate::Error::MemberNotFound`] / [`crate::Error::TypeNotFound`] if an operand does
/// not resolve.
///
/// # Examples
///
/// ```rust
/// use weakevents::{
///     assembly::{verify_method, InstructionSequence},
///     metadata::{builders::{ClassBuilder, MethodBuilder}, module::Module},
/// };
///
/// let mut module = Module::new("Sample.dll");
/// let owner = ClassBuilder::new("Publisher").build(&mut module)?;
/// let method = MethodBuilder::new("Empty")
///     .body(InstructionSequence::new().ret())
///     .build(&mut module, owner)?;
///
/// assert_eq!(verify_method(&module, method)?.max_stack, 0);
/// # Ok::<(), weakevents::Error>(())
/// ```
pub fn verify_method(module: &Module, method_token: Token) -> Result<StackSummary> {
    let method = module.method(method_token)?;
    let this = if method.is_static() {
        None
    } else {
        Some(module.type_def(method.declaring_type)?.sig())
    };
    let args: Vec<TypeSig> = this
        .into_iter()
        .chain(method.params.iter().map(|param| param.sig.clone()))
        .collect();

    let mut frame = Frame {
        module,
        method: module.display_name(method_token),
        stack: Vec::new(),
        max_stack: 0,
        offset: 0,
    };

    let instructions = &method.body.instructions;
    for (offset, instruction) in instructions.iter().enumerate() {
        frame.offset = offset;
        match instruction.opcode {
            OpCode::Nop => {}
            OpCode::Ldarg0
            | OpCode::Ldarg1
            | OpCode::Ldarg2
            | OpCode::Ldarg3
            | OpCode::LdargS => {
                let index = instruction.argument_index().unwrap_or(u8::MAX);
                let sig = args.get(usize::from(index)).cloned().ok_or_else(|| {
                    verification_error!(frame.method, offset, "no argument {}", index)
                })?;
                frame.push(Slot::Value(sig));
            }
            OpCode::Ldloc0
            | OpCode::Ldloc1
            | OpCode::Ldloc2
            | OpCode::Ldloc3
            | OpCode::LdlocS => {
                let index = instruction.local_index().unwrap_or(u8::MAX);
                let local = method.body.local(u16::from(index)).ok_or_else(|| {
                    verification_error!(frame.method, offset, "no local {}", index)
                })?;
                frame.push(Slot::Value(local.sig.clone()));
            }
            OpCode::Stloc0
            | OpCode::Stloc1
            | OpCode::Stloc2
            | OpCode::Stloc3
            | OpCode::StlocS => {
                let index = instruction.local_index().unwrap_or(u8::MAX);
                let local = method.body.local(u16::from(index)).ok_or_else(|| {
                    verification_error!(frame.method, offset, "no local {}", index)
                })?;
                frame.pop_assignable(&local.sig, "stored value")?;
            }
            OpCode::Ldnull => frame.push(Slot::Null),
            OpCode::Dup => {
                let slot = frame.pop()?;
                frame.push(slot.clone());
                frame.push(slot);
            }
            OpCode::Pop => {
                frame.pop()?;
            }
            OpCode::Call | OpCode::Callvirt | OpCode::Newobj => {
                let token = operand_token(&frame, instruction)?;
                frame.call(instruction, token)?;
            }
            OpCode::Castclass => {
                let token = operand_token(&frame, instruction)?;
                let target = module.resolve_type(token)?;
                frame.pop_reference("castclass operand")?;
                frame.push(Slot::Value(target));
            }
            OpCode::Ldfld | OpCode::Stfld | OpCode::Ldsfld | OpCode::Stsfld => {
                let token = operand_token(&frame, instruction)?;
                frame.field(instruction.opcode, token)?;
            }
            OpCode::Ldftn => {
                let token = operand_token(&frame, instruction)?;
                module.call_target(token)?;
                frame.push(Slot::Value(TypeSig::IntPtr));
            }
            OpCode::Ret => {
                if !method.return_type.is_void() {
                    frame.pop_assignable(&method.return_type, "return value")?;
                }
                if !frame.stack.is_empty() {
                    return Err(verification_error!(
                        frame.method,
                        offset,
                        "{} value(s) left on the stack at ret",
                        frame.stack.len()
                    ));
                }
                if offset + 1 != instructions.len() {
                    return Err(verification_error!(
                        frame.method,
                        offset + 1,
                        "unreachable instructions after ret"
                    ));
                }
                return Ok(StackSummary {
                    max_stack: frame.max_stack,
                    instructions: instructions.len(),
                });
            }
        }
    }

    Err(verification_error!(
        frame.method,
        instructions.len(),
        "control falls off the end of the body"
    ))
}

fn operand_token(frame: &Frame<'_>, instruction: &Instruction) -> Result<Token> {
    instruction.token().ok_or_else(|| {
        verification_error!(
            frame.method,
            frame.offset,
            "{} requires a token operand",
            instruction.opcode.mnemonic()
        )
    })
}
