//! A publisher/subscriber pair with a fully woven event, shared by the integration tests.

#![allow(dead_code)]

use weakevents::prelude::*;

/// Kind of delegate the event is declared with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handler {
    /// `EventHandler<ChangedEventArgs>`
    Generic,
    /// `delegate void ChangedHandler(object sender, ChangedEventArgs e)`
    Custom,
    /// `System.ComponentModel.PropertyChangedEventHandler`, declared by another assembly
    Referenced,
}

impl Handler {
    pub const ALL: [Handler; 3] = [Handler::Generic, Handler::Custom, Handler::Referenced];

    /// The second parameter of the delegate's `Invoke`
    pub fn event_args(self) -> TypeSig {
        match self {
            Handler::Generic | Handler::Custom => event_args(),
            Handler::Referenced => {
                TypeSig::class("System.ComponentModel", "PropertyChangedEventArgs")
            }
        }
    }
}

pub struct Scenario {
    pub module: Module,
    pub importer: ModuleImporter,
    pub field: Token,
    pub add: Token,
    pub remove: Token,
    pub unsubscribe: Token,
    /// `Subscriber.OnChanged(object, TArgs)`
    pub on_changed: Token,
    pub handler: TypeSig,
    pub is_static: bool,
}

pub fn event_args() -> TypeSig {
    TypeSig::class("Sample", "ChangedEventArgs")
}

pub fn publisher_type() -> TypeSig {
    TypeSig::class("Sample", "Publisher")
}

pub fn subscriber_type() -> TypeSig {
    TypeSig::class("Sample", "Subscriber")
}

/// The module before weaving: publisher with field and trivial accessors, and a subscriber.
pub fn unwoven(kind: Handler, is_static: bool, config: &WeavingConfig) -> Result<Scenario> {
    let mut module = Module::new("Sample.dll");
    let importer = ModuleImporter::with_config(&mut module, config)?;

    ClassBuilder::new("ChangedEventArgs")
        .namespace("Sample")
        .extends(TypeSig::class("System", "EventArgs"))
        .build(&mut module)?;

    let handler = match kind {
        Handler::Generic => TypeSig::generic("System", "EventHandler`1", vec![event_args()]),
        Handler::Custom => {
            DelegateBuilder::new("ChangedHandler")
                .namespace("Sample")
                .event_args(event_args())
                .build(&mut module)?;
            TypeSig::class("Sample", "ChangedHandler")
        }
        Handler::Referenced => {
            DelegateBuilder::new("PropertyChangedEventHandler")
                .namespace("System.ComponentModel")
                .event_args(kind.event_args())
                .reference(&mut module, "System.ObjectModel")?;
            TypeSig::class("System.ComponentModel", "PropertyChangedEventHandler")
        }
    };

    let publisher = ClassBuilder::new("Publisher")
        .namespace("Sample")
        .build(&mut module)?;
    let mut field = FieldBuilder::new("Changed", handler.clone());
    if is_static {
        field = field.static_field();
    }
    let field = field.build(&mut module, publisher)?;

    let mut accessors = Vec::new();
    for name in ["add_Changed", "remove_Changed"] {
        accessors.push(
            MethodBuilder::new(name)
                .public()
                .hide_by_sig()
                .special_name()
                .static_if(is_static)
                .parameter("value", handler.clone())
                .body(InstructionSequence::new().ret())
                .build(&mut module, publisher)?,
        );
    }

    let subscriber = ClassBuilder::new("Subscriber")
        .namespace("Sample")
        .build(&mut module)?;
    let on_changed = MethodBuilder::new("OnChanged")
        .public()
        .parameter("sender", TypeSig::Object)
        .parameter("e", kind.event_args())
        .build(&mut module, subscriber)?;

    Ok(Scenario {
        module,
        importer,
        field,
        add: accessors[0],
        remove: accessors[1],
        unsubscribe: Token::new(0),
        on_changed,
        handler,
        is_static,
    })
}

/// Weave the event the way an accessor rewriter does:
///
/// ```text
/// add:    weak = MakeWeak(value, Unsubscribe); field = Combine(field, weak);
/// remove: weak = FindWeak(field, value);       field = Remove(field, weak);
/// ```
pub fn woven_with(kind: Handler, is_static: bool, config: WeavingConfig) -> Result<Scenario> {
    let mut scenario = unwoven(kind, is_static, &config)?;
    let module = &mut scenario.module;
    let importer = &scenario.importer;
    let field = scenario.field;

    let weaver = EventWeaver::with_config(module, field, importer, config)?;
    let unsubscribe = weaver.add_unsubscribe_method(module)?;

    let weak = weaver.create_event_handler_variable(module, scenario.add)?;
    let make = weaver.generate_make_weak_il(module, scenario.add, unsubscribe, &weak)?;
    let combine = {
        let mut emitter = IlEmitter::new(module, importer, scenario.add)?;
        let source = emitter.load_field(field)?;
        let handler = emitter.load_local(&weak)?;
        let combined = emitter.call_delegate_combine(source, handler)?;
        emitter.store_field(combined, field)?
    };
    module
        .method_mut(scenario.add)?
        .insert_instructions(make.append(combine), 0)?;

    let found = weaver.create_event_handler_variable(module, scenario.remove)?;
    let find = weaver.generate_find_weak_il(module, scenario.remove, &found)?;
    let remove = {
        let mut emitter = IlEmitter::new(module, importer, scenario.remove)?;
        let source = emitter.load_field(field)?;
        let handler = emitter.load_local(&found)?;
        let remaining = emitter.call_delegate_remove(source, handler)?;
        emitter.store_field(remaining, field)?
    };
    module
        .method_mut(scenario.remove)?
        .insert_instructions(find.append(remove), 0)?;

    scenario.unsubscribe = unsubscribe;
    Ok(scenario)
}

pub fn woven(kind: Handler, is_static: bool) -> Result<Scenario> {
    woven_with(kind, is_static, WeavingConfig::default())
}

/// A delegate of the event's type bound to `Subscriber.OnChanged` on `subscriber`
pub fn subscription(scenario: &Scenario, subscriber: ObjectRef) -> EmValue {
    EmValue::Delegate(DelegateValue::bound(
        scenario.handler.clone(),
        Some(subscriber),
        scenario.on_changed,
    ))
}
