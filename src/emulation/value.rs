//! Runtime values of the emulator.

use std::{fmt, rc::Rc};

use crate::metadata::{token::Token, typesystem::TypeSig};

/// Reference to an object on the emulated heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectRef(pub(crate) u32);

impl ObjectRef {
    /// Heap slot of the object
    #[must_use]
    pub fn id(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obj#{}", self.0)
    }
}

/// A bound method: the target object (`None` for static methods) and the method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Invocation {
    /// The bound `this`, absent for static methods
    pub target: Option<ObjectRef>,
    /// The invoked method
    pub method: Token,
}

/// A weak handler created by `MakeWeak`.
///
/// The handler does not keep [`Invocation::target`] alive. Once the target has been
/// collected, raising the event calls `unsubscribe` with the weak handler itself.
#[derive(Debug, PartialEq, Eq)]
pub struct WeakHandler {
    /// Identity of this wrapper; two delegates referring to one wrapper are equal
    pub id: u32,
    /// The wrapped, weakly referenced invocation
    pub invocation: Invocation,
    /// The callback removing this wrapper from its event
    pub unsubscribe: DelegateValue,
    /// Static type of the wrapper delegate, ``EventHandler`1<TArgs>``
    pub handler_type: TypeSig,
}

/// One entry of a delegate invocation list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DelegateEntry {
    /// A strongly bound method
    Strong(Invocation),
    /// A weak handler wrapper
    Weak(Rc<WeakHandler>),
}

impl DelegateEntry {
    /// Delegate equality: same target and method, or the same weak wrapper
    #[must_use]
    pub fn same_as(&self, other: &DelegateEntry) -> bool {
        match (self, other) {
            (DelegateEntry::Strong(left), DelegateEntry::Strong(right)) => left == right,
            (DelegateEntry::Weak(left), DelegateEntry::Weak(right)) => left.id == right.id,
            _ => false,
        }
    }
}

/// A non-null delegate: its runtime type and invocation list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelegateValue {
    /// Runtime delegate type
    pub ty: TypeSig,
    /// Invocation list, in call order; never empty
    pub entries: Vec<DelegateEntry>,
}

impl DelegateValue {
    /// A single-cast delegate of type `ty` bound to `method` on `target`
    #[must_use]
    pub fn bound(ty: TypeSig, target: Option<ObjectRef>, method: Token) -> Self {
        DelegateValue {
            ty,
            entries: vec![DelegateEntry::Strong(Invocation { target, method })],
        }
    }

    /// Number of entries in the invocation list
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the invocation list is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The weak handlers in the invocation list
    pub fn weak_handlers(&self) -> impl DoubleEndedIterator<Item = &Rc<WeakHandler>> {
        self.entries.iter().filter_map(|entry| match entry {
            DelegateEntry::Weak(weak) => Some(weak),
            DelegateEntry::Strong(_) => None,
        })
    }
}

/// A value on the emulated evaluation stack, in a local or in a field.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EmValue {
    /// The null reference
    #[default]
    Null,
    /// An object on the heap
    Object(ObjectRef),
    /// A delegate
    Delegate(DelegateValue),
    /// A method pointer pushed by `ldftn`
    FnPtr(Token),
}

impl EmValue {
    /// Returns true for the null reference
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, EmValue::Null)
    }

    /// The delegate, if this is one
    #[must_use]
    pub fn as_delegate(&self) -> Option<&DelegateValue> {
        match self {
            EmValue::Delegate(delegate) => Some(delegate),
            _ => None,
        }
    }

    /// Short description for diagnostics
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            EmValue::Null => "null".to_string(),
            EmValue::Object(object) => object.to_string(),
            EmValue::Delegate(delegate) => delegate.ty.full_name(),
            EmValue::FnPtr(method) => format!("fnptr {method}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weak(id: u32) -> Rc<WeakHandler> {
        Rc::new(WeakHandler {
            id,
            invocation: Invocation {
                target: Some(ObjectRef(1)),
                method: Token::new(0x06000001),
            },
            unsubscribe: DelegateValue::bound(TypeSig::Object, None, Token::new(0x06000002)),
            handler_type: TypeSig::Object,
        })
    }

    #[test]
    fn entry_equality() {
        let strong = DelegateEntry::Strong(Invocation {
            target: Some(ObjectRef(1)),
            method: Token::new(0x06000001),
        });
        let other_target = DelegateEntry::Strong(Invocation {
            target: Some(ObjectRef(2)),
            method: Token::new(0x06000001),
        });
        assert!(strong.same_as(&strong.clone()));
        assert!(!strong.same_as(&other_target));

        let first = DelegateEntry::Weak(weak(1));
        assert!(first.same_as(&DelegateEntry::Weak(weak(1))));
        assert!(!first.same_as(&DelegateEntry::Weak(weak(2))));
        assert!(!first.same_as(&strong));
    }

    #[test]
    fn describe_values() {
        assert_eq!(EmValue::default().describe(), "null");
        assert_eq!(EmValue::Object(ObjectRef(3)).describe(), "obj#3");
        let delegate = DelegateValue::bound(TypeSig::class("System", "EventHandler"), None, Token::new(0x06000001));
        assert_eq!(EmValue::Delegate(delegate.clone()).describe(), "System.EventHandler");
        assert_eq!(delegate.weak_handlers().count(), 0);
    }
}
