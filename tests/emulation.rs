//! Integration tests running woven events in the emulator.
//!
//! Each test weaves a publisher, subscribes through the woven `add` accessor and
//! observes what raising the event, unsubscribing and collecting subscribers do to
//! the backing field.

mod common;

use common::{publisher_type, subscriber_type, subscription, woven, Handler, Scenario};
use weakevents::{emulation::DelegateEntry, prelude::*};

struct Running<'a> {
    scenario: &'a Scenario,
    interpreter: Interpreter<'a>,
    publisher: Option<ObjectRef>,
}

impl<'a> Running<'a> {
    fn new(scenario: &'a Scenario) -> Result<Self> {
        let mut interpreter = Interpreter::new(&scenario.module);
        let publisher = if scenario.is_static {
            None
        } else {
            Some(interpreter.alloc(publisher_type())?)
        };
        Ok(Running {
            scenario,
            interpreter,
            publisher,
        })
    }

    fn subscriber(&mut self) -> Result<ObjectRef> {
        self.interpreter.alloc(subscriber_type())
    }

    fn subscribe(&mut self, subscriber: ObjectRef) -> Result<()> {
        let handler = subscription(self.scenario, subscriber);
        self.interpreter
            .invoke(self.scenario.add, self.publisher, vec![handler])?;
        Ok(())
    }

    fn unsubscribe(&mut self, subscriber: ObjectRef) -> Result<()> {
        let handler = subscription(self.scenario, subscriber);
        self.interpreter
            .invoke(self.scenario.remove, self.publisher, vec![handler])?;
        Ok(())
    }

    fn raise(&mut self) -> Result<()> {
        let sender = self.publisher.map_or(EmValue::Null, EmValue::Object);
        self.interpreter
            .raise(self.scenario.field, self.publisher, sender, EmValue::Null)
    }

    fn field(&self) -> Result<EmValue> {
        self.interpreter
            .field_value(self.scenario.field, self.publisher)
    }

    fn handlers(&self) -> Result<usize> {
        Ok(self.field()?.as_delegate().map_or(0, DelegateValue::len))
    }

    fn calls_to_subscriber(&self, subscriber: ObjectRef) -> usize {
        self.interpreter
            .trace()
            .iter()
            .filter(|e| e.method == self.scenario.on_changed && e.this == Some(subscriber))
            .count()
    }
}

/// The field only ever holds weak handlers of the field's own type.
#[test]
fn test_subscribe_stores_weak_handler() -> Result<()> {
    for kind in Handler::ALL {
        let scenario = woven(kind, false)?;
        let mut run = Running::new(&scenario)?;
        let subscriber = run.subscriber()?;
        run.subscribe(subscriber)?;

        let field = run.field()?;
        let delegate = field
            .as_delegate()
            .ok_or(Error::Error("field not set".to_string()))?;
        assert_eq!(delegate.ty, scenario.handler);
        assert_eq!(delegate.len(), 1);
        let weak = match &delegate.entries[0] {
            DelegateEntry::Weak(weak) => weak,
            DelegateEntry::Strong(_) => panic!("strong handler stored for {kind:?}"),
        };
        assert_eq!(weak.invocation.target, Some(subscriber));
        assert_eq!(weak.invocation.method, scenario.on_changed);
    }
    Ok(())
}

#[test]
fn test_raise_reaches_live_subscribers() -> Result<()> {
    let scenario = woven(Handler::Generic, false)?;
    let mut run = Running::new(&scenario)?;
    let first = run.subscriber()?;
    let second = run.subscriber()?;
    run.subscribe(first)?;
    run.subscribe(second)?;

    run.raise()?;
    run.raise()?;
    assert_eq!(run.calls_to_subscriber(first), 2);
    assert_eq!(run.calls_to_subscriber(second), 2);
    Ok(())
}

/// `remove` finds the weak handler wrapping the subscriber's delegate and drops it.
#[test]
fn test_unsubscribe_removes_the_weak_handler() -> Result<()> {
    for kind in Handler::ALL {
        let scenario = woven(kind, false)?;
        let mut run = Running::new(&scenario)?;
        let first = run.subscriber()?;
        let second = run.subscriber()?;
        run.subscribe(first)?;
        run.subscribe(second)?;

        run.unsubscribe(first)?;
        assert_eq!(run.handlers()?, 1);
        run.raise()?;
        assert_eq!(run.calls_to_subscriber(first), 0);
        assert_eq!(run.calls_to_subscriber(second), 1);

        run.unsubscribe(second)?;
        assert_eq!(run.field()?, EmValue::Null);
    }
    Ok(())
}

#[test]
fn test_unsubscribing_an_unknown_handler_is_a_no_op() -> Result<()> {
    let scenario = woven(Handler::Custom, false)?;
    let mut run = Running::new(&scenario)?;
    let subscribed = run.subscriber()?;
    let stranger = run.subscriber()?;

    run.unsubscribe(stranger)?;
    assert_eq!(run.field()?, EmValue::Null);

    run.subscribe(subscribed)?;
    let before = run.field()?;
    run.unsubscribe(stranger)?;
    assert_eq!(run.field()?, before);
    Ok(())
}

/// A collected subscriber is not called; its weak handler unsubscribes itself instead.
#[test]
fn test_collected_subscriber_unsubscribes_on_raise() -> Result<()> {
    for kind in Handler::ALL {
        for is_static in [false, true] {
            let scenario = woven(kind, is_static)?;
            let mut run = Running::new(&scenario)?;
            let gone = run.subscriber()?;
            let alive = run.subscriber()?;
            run.subscribe(gone)?;
            run.subscribe(alive)?;

            run.interpreter.collect(gone)?;
            run.raise()?;

            assert_eq!(run.calls_to_subscriber(alive), 1, "{kind:?} static={is_static}");
            assert_eq!(run.interpreter.invocations_of(scenario.on_changed), 1);
            assert_eq!(run.interpreter.invocations_of(scenario.unsubscribe), 1);
            assert_eq!(run.handlers()?, 1);

            run.interpreter.collect(alive)?;
            run.raise()?;
            assert_eq!(run.interpreter.invocations_of(scenario.unsubscribe), 2);
            assert_eq!(run.field()?, EmValue::Null);
        }
    }
    Ok(())
}

/// The unsubscribe callback is bound to the publisher that owns the field.
#[test]
fn test_unsubscribe_runs_on_the_owning_publisher() -> Result<()> {
    let scenario = woven(Handler::Generic, false)?;
    let mut run = Running::new(&scenario)?;
    let gone = run.subscriber()?;
    run.subscribe(gone)?;
    run.interpreter.collect(gone)?;
    run.interpreter.clear_trace();

    run.raise()?;
    let unsubscribe_calls: Vec<_> = run
        .interpreter
        .trace()
        .iter()
        .filter(|e| e.method == scenario.unsubscribe)
        .collect();
    assert_eq!(unsubscribe_calls.len(), 1);
    assert_eq!(unsubscribe_calls[0].this, run.publisher);
    Ok(())
}

/// Raising an event nobody subscribed to does nothing.
#[test]
fn test_raise_without_subscribers() -> Result<()> {
    let scenario = woven(Handler::Custom, true)?;
    let mut run = Running::new(&scenario)?;
    run.raise()?;
    assert!(run.interpreter.trace().is_empty());
    Ok(())
}

/// Subscribing twice registers two weak handlers; `remove` drops the most recent one.
#[test]
fn test_double_subscription() -> Result<()> {
    let scenario = woven(Handler::Generic, false)?;
    let mut run = Running::new(&scenario)?;
    let subscriber = run.subscriber()?;
    run.subscribe(subscriber)?;
    let once = run.field()?;
    run.subscribe(subscriber)?;
    assert_eq!(run.handlers()?, 2);

    run.unsubscribe(subscriber)?;
    assert_eq!(run.field()?, once);
    run.raise()?;
    assert_eq!(run.calls_to_subscriber(subscriber), 1);
    Ok(())
}
