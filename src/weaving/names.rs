//! Names of the runtime helpers and conventions shared by the importer and the weaver.
//!
//! Everything the weaver refers to by name lives here: the name mangling of synthesized
//! unsubscribe methods, the compiler-generated marker attribute, and the types and
//! methods of the weak event runtime and of the base class library.

/// Suffix appended to the bracketed event name of a synthesized unsubscribe method
pub const UNSUBSCRIBE_SUFFIX: &str = "_Weak_Unsubscribe";

/// Default namespace of the weak event runtime helpers
pub const RUNTIME_NAMESPACE: &str = "WeakEvents.Runtime";

/// Runtime type declaring `MakeWeak` and `FindWeak`
pub const WEAK_EXTENSIONS_TYPE: &str = "WeakEventHandlerExtensions";
/// Weak wrapper construction helper
pub const MAKE_WEAK: &str = "MakeWeak";
/// Weak wrapper lookup helper
pub const FIND_WEAK: &str = "FindWeak";

/// Runtime type declaring `ChangeType`
pub const DELEGATE_CONVERT_TYPE: &str = "DelegateConvert";
/// Delegate re-typing helper
pub const CHANGE_TYPE: &str = "ChangeType";

/// Namespace of the base class library types
pub const SYSTEM: &str = "System";
/// `System.Object`
pub const OBJECT: &str = "Object";
/// `System.Delegate`
pub const DELEGATE: &str = "Delegate";
/// `System.MulticastDelegate`
pub const MULTICAST_DELEGATE: &str = "MulticastDelegate";
/// `System.Delegate::Combine`
pub const COMBINE: &str = "Combine";
/// `System.Delegate::Remove`
pub const REMOVE: &str = "Remove";
/// Non-generic `System.EventHandler`
pub const EVENT_HANDLER: &str = "EventHandler";
/// Generic ``System.EventHandler`1``
pub const GENERIC_EVENT_HANDLER: &str = "EventHandler`1";
/// `System.EventArgs`
pub const EVENT_ARGS: &str = "EventArgs";
/// Generic ``System.Action`1``, the unsubscribe callback type
pub const ACTION: &str = "Action`1";
/// Name of delegate and object constructors
pub const CTOR: &str = ".ctor";
/// Name of a delegate's invocation method
pub const INVOKE: &str = "Invoke";

/// Namespace of the compiler-generated marker attribute
pub const COMPILER_SERVICES: &str = "System.Runtime.CompilerServices";
/// The compiler-generated marker attribute
pub const COMPILER_GENERATED: &str = "CompilerGeneratedAttribute";

/// Name of the unsubscribe method synthesized for `event`
///
/// ```rust
/// use weakevents::weaving::names::unsubscribe_method_name;
///
/// assert_eq!(unsubscribe_method_name("Changed"), "<Changed>_Weak_Unsubscribe");
/// ```
#[must_use]
pub fn unsubscribe_method_name(event: &str) -> String {
    format!("<{event}>{UNSUBSCRIBE_SUFFIX}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distinct_events_get_distinct_names() {
        assert_ne!(
            unsubscribe_method_name("Changed"),
            unsubscribe_method_name("Changing")
        );
        assert!(unsubscribe_method_name("Changed").ends_with(UNSUBSCRIBE_SUFFIX));
    }
}
