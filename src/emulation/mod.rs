//! CIL emulation of woven method bodies.
//!
//! A small interpreter for the instruction subset the weaver emits, together with a
//! model of the runtime those bodies call into: multicast delegates, the weak event
//! helpers and a heap whose objects can be collected on demand. It exists to observe
//! what woven code does, e.g. that an event raised after its subscriber was collected
//! removes the subscriber's weak handler from the backing field.
//!
//! # Key Components
//!
//! - [`Interpreter`] - Executes method bodies of a [`crate::metadata::module::Module`]
//! - [`EmValue`] / [`DelegateValue`] - Runtime values and delegate invocation lists
//! - [`runtime`] - `Delegate.Combine/Remove` and the weak event helpers
//! - [`EmulationError`] - Runtime failures (invalid casts, null references, ...)
//!
//! # Execution Limits
//!
//! The emulator bounds the call depth; bodies are straight-line, so no instruction
//! limit is needed.
//!
//! # Thread Safety
//!
//! Weak handlers are shared with [`std::rc::Rc`]; an [`Interpreter`] and its values are
//! confined to one thread.

use thiserror::Error;

mod interpreter;
pub mod runtime;
mod value;

pub use interpreter::{Interpreter, TraceEvent, MAX_CALL_DEPTH};
pub use value::{DelegateEntry, DelegateValue, EmValue, Invocation, ObjectRef, WeakHandler};

/// Errors that can occur while emulating a method body.
///
/// Most variants correspond to the exception the CLR would throw in the same situation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EmulationError {
    /// Evaluation stack underflow (pop from empty stack).
    #[error("Evaluation stack underflow")]
    StackUnderflow,

    /// Argument index out of bounds.
    #[error("Argument {index} out of bounds ({count} arguments)")]
    ArgumentIndexOutOfBounds {
        /// The requested index.
        index: usize,
        /// Number of arguments available.
        count: usize,
    },

    /// Local variable index out of bounds.
    #[error("Local {index} out of bounds ({count} locals)")]
    LocalIndexOutOfBounds {
        /// The requested index.
        index: usize,
        /// Number of locals available.
        count: usize,
    },

    /// Null reference access.
    #[error("Null reference")]
    NullReference,

    /// Invalid cast operation.
    #[error("Invalid cast from {from_type} to {to_type}")]
    InvalidCast {
        /// Source type.
        from_type: String,
        /// Target type.
        to_type: String,
    },

    /// `Delegate.Combine` or `Delegate.Remove` on delegates of different types.
    #[error("Delegates must be of the same type ({left} and {right})")]
    DelegateTypeMismatch {
        /// Type of the first operand.
        left: String,
        /// Type of the second operand.
        right: String,
    },

    /// Operand of the wrong kind for an operation.
    #[error("{operation} can not operate on {found}")]
    TypeMismatch {
        /// Operation being performed.
        operation: &'static str,
        /// Description of the value found.
        found: String,
    },

    /// The heap can not address another object.
    #[error("Heap object limit of {limit} exceeded")]
    HeapObjectLimitExceeded {
        /// Number of objects the heap can hold.
        limit: u32,
    },

    /// Invalid heap reference.
    #[error("Invalid heap reference {reference_id}")]
    InvalidHeapReference {
        /// The invalid reference ID.
        reference_id: u32,
    },

    /// A call to a method the emulator has no implementation for.
    #[error("Unsupported call to {0}")]
    UnsupportedCall(String),

    /// Call depth limit exceeded.
    #[error("Call depth limit of {depth} exceeded")]
    CallDepthExceeded {
        /// The limit that was hit.
        depth: usize,
    },

    /// Execution reached the end of a body without `ret`.
    #[error("Control fell off the end of {0}")]
    MissingReturn(String),
}
