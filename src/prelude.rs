//! # weakevents Prelude
//!
//! This module provides a convenient prelude for the most commonly used types from the
//! weakevents library. Import this module to get quick access to everything needed to
//! build a module, weave its events and run the result.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all weakevents operations
pub use crate::Error;

/// The result type used throughout weakevents
pub use crate::Result;

// ================================================================================================
// Module Representation
// ================================================================================================

/// The in-memory module and the effective signature of a call target
pub use crate::metadata::module::{CallTarget, Module};

/// Metadata tokens
pub use crate::metadata::token::Token;

/// Type references and names
pub use crate::metadata::typesystem::{TypeName, TypeSig};

/// Member references, method signatures and generic instantiations
pub use crate::metadata::memberref::{MemberRef, MethodSig, MethodSpec};

/// Methods, their bodies and locals
pub use crate::metadata::method::{
    Method, MethodAccessFlags, MethodBody, MethodModifiers, VariableDefinition,
};

/// Fields and types
pub use crate::metadata::{
    field::{Field, FieldAttributes},
    typedef::{TypeAttributes, TypeDef, TypeRef},
};

/// Fluent builders for module content
pub use crate::metadata::builders::{ClassBuilder, DelegateBuilder, FieldBuilder, MethodBuilder};

// ================================================================================================
// Instructions
// ================================================================================================

/// Instructions, sequences and verification
pub use crate::assembly::{verify_method, Instruction, InstructionSequence, OpCode, StackSummary};

// ================================================================================================
// Weaving
// ================================================================================================

/// The weaver and its collaborators
pub use crate::weaving::{EventWeaver, IlEmitter, IlValue, ModuleImporter, WeavingConfig};

// ================================================================================================
// Emulation
// ================================================================================================

/// The interpreter and its values
pub use crate::emulation::{DelegateValue, EmValue, EmulationError, Interpreter, ObjectRef};
