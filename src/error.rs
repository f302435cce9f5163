use thiserror::Error;

use crate::{emulation::EmulationError, metadata::token::Token};

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

macro_rules! verification_error {
    ($method:expr, $offset:expr, $fmt:expr $(, $arg:expr)* $(,)?) => {
        crate::Error::Verification {
            method: $method.to_string(),
            offset: $offset,
            message: format!($fmt $(, $arg)*),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// # Error Categories
///
/// ## Module Errors
/// - [`Error::Malformed`] - The in-memory module is structurally inconsistent
/// - [`Error::OutOfBounds`] - An instruction index or local slot is out of range
/// - [`Error::TypeNotFound`] - A type token does not resolve in the module
/// - [`Error::MemberNotFound`] - A field, method or member reference token does not resolve
///
/// ## Weaving Errors
/// - [`Error::UnresolvedReference`] - A runtime helper reference is missing from the module
/// - [`Error::UnsupportedDelegate`] - The event argument type of a delegate can not be derived
/// - [`Error::Verification`] - A generated method body does not satisfy the stack verifier
///
/// ## Emulation Errors
/// - [`Error::Emulation`] - Failure while simulating a woven body
///
/// # Examples
///
/// ```rust
/// use weakevents::{metadata::{module::Module, token::Token}, weaving::{EventWeaver, ModuleImporter}, Error};
///
/// let mut module = Module::new("Sample.dll");
/// let importer = ModuleImporter::new(&mut module)?;
///
/// match EventWeaver::new(&module, Token::new(0x0400_0001), &importer) {
///     Err(Error::MemberNotFound(token)) => println!("no such field: {token}"),
///     Err(e) => println!("other error: {e}"),
///     Ok(_) => unreachable!(),
/// }
/// # Ok::<(), Error>(())
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The module is inconsistent and the requested operation could not be performed.
    ///
    /// The error includes the source location where the inconsistency was detected
    /// for debugging purposes.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted, e.g. inserting past the end of a method body.
    #[error("Out of Bound access would have occurred!")]
    OutOfBounds,

    /// Failed to find a type definition in the module.
    #[error("Failed to find type in module - {0}")]
    TypeNotFound(Token),

    /// Failed to find a field, method, member reference or method specification.
    #[error("Failed to find member in module - {0}")]
    MemberNotFound(Token),

    /// A runtime helper reference required for weaving is not present in the module.
    ///
    /// Raised before any instruction is emitted, so a weaver is never constructed
    /// against a module it could only produce an incomplete body for.
    #[error("Unresolved runtime reference - {0}")]
    UnresolvedReference(String),

    /// The event argument type of a delegate could not be determined.
    #[error("Unsupported event delegate type - {0}")]
    UnsupportedDelegate(String),

    /// A method body failed type-flow verification.
    #[error("Unverifiable body in '{method}' at instruction {offset}: {message}")]
    Verification {
        /// Full name of the offending method
        method: String,
        /// Index of the offending instruction
        offset: usize,
        /// What the verifier rejected
        message: String,
    },

    /// Error raised while simulating a method body.
    #[error("{0}")]
    Emulation(#[from] EmulationError),

    /// Generic error for miscellaneous failures.
    #[error("{0}")]
    Error(String),
}
