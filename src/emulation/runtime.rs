//! The delegate runtime: multicast delegate arithmetic and the weak event helpers.
//!
//! These are the semantics woven code relies on from its environment:
//!
//! | Helper | Behaviour |
//! |--------|-----------|
//! | `Delegate.Combine(a, b)` | concatenates the invocation lists; `null` is the identity |
//! | `Delegate.Remove(a, b)` | removes the last occurrence of `b`'s list from `a`; absent is a no-op, an emptied list is `null` |
//! | `DelegateConvert.ChangeType<T>(d)` | the same invocation list, typed as `T` |
//! | `MakeWeak<T>(h, cb)` | wraps every entry of `h` into a weak handler calling `cb` once its target is gone |
//! | `FindWeak<T>(d, h)` | the weak handler in `d` wrapping `h`'s target and method, or `null` |
//!
//! `Combine` and `Remove` require both operands to have the same runtime type, as the
//! CLR does. A woven body that forgets a conversion fails here.

use std::rc::Rc;

use crate::{
    emulation::{
        value::{DelegateEntry, DelegateValue, EmValue, WeakHandler},
        EmulationError,
    },
    metadata::typesystem::TypeSig,
};

fn delegate_operand(operation: &'static str, value: EmValue) -> Result<Option<DelegateValue>, EmulationError> {
    match value {
        EmValue::Null => Ok(None),
        EmValue::Delegate(delegate) => Ok(Some(delegate)),
        other => Err(EmulationError::TypeMismatch {
            operation,
            found: other.describe(),
        }),
    }
}

fn ensure_same_type(left: &DelegateValue, right: &DelegateValue) -> Result<(), EmulationError> {
    if left.ty.full_name() == right.ty.full_name() {
        Ok(())
    } else {
        Err(EmulationError::DelegateTypeMismatch {
            left: left.ty.full_name(),
            right: right.ty.full_name(),
        })
    }
}

/// `Delegate.Combine(left, right)`
///
/// # Errors
/// Returns [`EmulationError::DelegateTypeMismatch`] if both operands are delegates of
/// different types.
pub fn combine(left: EmValue, right: EmValue) -> Result<EmValue, EmulationError> {
    let left = delegate_operand("Delegate.Combine", left)?;
    let right = delegate_operand("Delegate.Combine", right)?;
    match (left, right) {
        (None, None) => Ok(EmValue::Null),
        (Some(only), None) | (None, Some(only)) => Ok(EmValue::Delegate(only)),
        (Some(mut left), Some(right)) => {
            ensure_same_type(&left, &right)?;
            left.entries.extend(right.entries);
            Ok(EmValue::Delegate(left))
        }
    }
}

/// `Delegate.Remove(source, value)`
///
/// # Errors
/// Returns [`EmulationError::DelegateTypeMismatch`] if both operands are delegates of
/// different types.
pub fn remove(source: EmValue, value: EmValue) -> Result<EmValue, EmulationError> {
    let Some(mut source) = delegate_operand("Delegate.Remove", source)? else {
        return Ok(EmValue::Null);
    };
    let Some(value) = delegate_operand("Delegate.Remove", value)? else {
        return Ok(EmValue::Delegate(source));
    };
    ensure_same_type(&source, &value)?;

    let count = value.entries.len();
    if count > source.entries.len() {
        return Ok(EmValue::Delegate(source));
    }

    let found = (0..=source.entries.len() - count).rev().find(|start| {
        source.entries[*start..*start + count]
            .iter()
            .zip(&value.entries)
            .all(|(left, right)| left.same_as(right))
    });

    match found {
        Some(start) => {
            source.entries.drain(start..start + count);
            if source.entries.is_empty() {
                Ok(EmValue::Null)
            } else {
                Ok(EmValue::Delegate(source))
            }
        }
        None => Ok(EmValue::Delegate(source)),
    }
}

/// `DelegateConvert.ChangeType<target>(value)`
///
/// # Errors
/// Returns [`EmulationError::TypeMismatch`] if `value` is not a delegate.
pub fn change_type(value: EmValue, target: &TypeSig) -> Result<EmValue, EmulationError> {
    Ok(match delegate_operand("DelegateConvert.ChangeType", value)? {
        None => EmValue::Null,
        Some(delegate) => EmValue::Delegate(DelegateValue {
            ty: target.clone(),
            entries: delegate.entries,
        }),
    })
}

/// `MakeWeak<T>(handler, unsubscribe)`; wrapper identities are drawn from `next_id`
///
/// # Errors
/// Returns [`EmulationError::NullReference`] if either operand is `null`.
pub fn make_weak(
    handler: EmValue,
    unsubscribe: EmValue,
    handler_type: &TypeSig,
    next_id: &mut u32,
) -> Result<EmValue, EmulationError> {
    let handler = delegate_operand("MakeWeak", handler)?.ok_or(EmulationError::NullReference)?;
    let unsubscribe =
        delegate_operand("MakeWeak", unsubscribe)?.ok_or(EmulationError::NullReference)?;

    let entries = handler
        .entries
        .into_iter()
        .map(|entry| match entry {
            DelegateEntry::Strong(invocation) => {
                *next_id += 1;
                DelegateEntry::Weak(Rc::new(WeakHandler {
                    id: *next_id,
                    invocation,
                    unsubscribe: unsubscribe.clone(),
                    handler_type: handler_type.clone(),
                }))
            }
            weak @ DelegateEntry::Weak(_) => weak,
        })
        .collect();

    Ok(EmValue::Delegate(DelegateValue {
        ty: handler_type.clone(),
        entries,
    }))
}

/// `FindWeak<T>(source, handler)`
///
/// # Errors
/// Returns [`EmulationError::TypeMismatch`] if an operand is neither `null` nor a delegate.
pub fn find_weak(
    source: EmValue,
    handler: EmValue,
    handler_type: &TypeSig,
) -> Result<EmValue, EmulationError> {
    let (Some(source), Some(handler)) = (
        delegate_operand("FindWeak", source)?,
        delegate_operand("FindWeak", handler)?,
    ) else {
        return Ok(EmValue::Null);
    };

    let wanted = handler.entries.iter().find_map(|entry| match entry {
        DelegateEntry::Strong(invocation) => Some(*invocation),
        DelegateEntry::Weak(_) => None,
    });
    let Some(wanted) = wanted else {
        return Ok(EmValue::Null);
    };

    let result = source
        .weak_handlers()
        .rev()
        .find(|weak| weak.invocation == wanted)
        .map_or(EmValue::Null, |weak| {
            EmValue::Delegate(DelegateValue {
                ty: handler_type.clone(),
                entries: vec![DelegateEntry::Weak(Rc::clone(weak))],
            })
        });
    Ok(result)
}
