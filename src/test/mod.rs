//! Shared factories for unit tests.

use crate::{
    assembly::InstructionSequence,
    metadata::{
        builders::{ClassBuilder, DelegateBuilder, FieldBuilder, MethodBuilder},
        module::Module,
        token::Token,
        typesystem::TypeSig,
    },
    weaving::ModuleImporter,
};

/// A publisher type with one event, its backing field and both accessors.
pub struct EventFixture {
    pub module: Module,
    pub importer: ModuleImporter,
    pub publisher: Token,
    pub field: Token,
    pub add: Token,
    pub remove: Token,
    /// Type of the backing field
    pub handler: TypeSig,
}

pub fn changed_event_args() -> TypeSig {
    TypeSig::class("Sample", "ChangedEventArgs")
}

fn event_fixture(mut module: Module, handler: TypeSig, is_static: bool) -> EventFixture {
    let importer = ModuleImporter::new(&mut module).unwrap();
    let publisher = ClassBuilder::new("Publisher")
        .namespace("Sample")
        .build(&mut module)
        .unwrap();

    let mut field = FieldBuilder::new("Changed", handler.clone());
    if is_static {
        field = field.static_field();
    }
    let field = field.build(&mut module, publisher).unwrap();

    let accessor = |name: &str, module: &mut Module| {
        MethodBuilder::new(name)
            .public()
            .hide_by_sig()
            .special_name()
            .static_if(is_static)
            .parameter("value", handler.clone())
            .body(InstructionSequence::new().ret())
            .build(module, publisher)
            .unwrap()
    };
    let add = accessor("add_Changed", &mut module);
    let remove = accessor("remove_Changed", &mut module);

    EventFixture {
        module,
        importer,
        publisher,
        field,
        add,
        remove,
        handler,
    }
}

fn module_with_args() -> Module {
    let mut module = Module::new("Sample.dll");
    ClassBuilder::new("ChangedEventArgs")
        .namespace("Sample")
        .extends(TypeSig::class("System", "EventArgs"))
        .build(&mut module)
        .unwrap();
    module
}

/// `public event EventHandler<ChangedEventArgs> Changed`
pub fn generic_event(is_static: bool) -> EventFixture {
    let handler = TypeSig::generic("System", "EventHandler`1", vec![changed_event_args()]);
    event_fixture(module_with_args(), handler, is_static)
}

/// `public event ChangedHandler Changed` with
/// `delegate void ChangedHandler(object sender, ChangedEventArgs e)`
pub fn custom_delegate_event(is_static: bool) -> EventFixture {
    let mut module = module_with_args();
    DelegateBuilder::new("ChangedHandler")
        .namespace("Sample")
        .event_args(changed_event_args())
        .build(&mut module)
        .unwrap();
    event_fixture(module, TypeSig::class("Sample", "ChangedHandler"), is_static)
}

/// `public event PropertyChangedEventHandler Changed`, the delegate referenced from
/// `System.ObjectModel`
pub fn referenced_delegate_event(is_static: bool) -> EventFixture {
    let mut module = module_with_args();
    DelegateBuilder::new("PropertyChangedEventHandler")
        .namespace("System.ComponentModel")
        .event_args(TypeSig::class("System.ComponentModel", "PropertyChangedEventArgs"))
        .reference(&mut module, "System.ObjectModel")
        .unwrap();
    let handler = TypeSig::class("System.ComponentModel", "PropertyChangedEventHandler");
    event_fixture(module, handler, is_static)
}

#[test]
fn fixtures_are_consistent() {
    for fixture in [
        generic_event(false),
        custom_delegate_event(true),
        referenced_delegate_event(false),
    ] {
        let field = fixture.module.field(fixture.field).unwrap();
        assert_eq!(field.sig, fixture.handler);
        assert_eq!(field.declaring_type, fixture.publisher);

        let add = fixture.module.method(fixture.add).unwrap();
        let remove = fixture.module.method(fixture.remove).unwrap();
        assert_eq!(add.is_static(), field.is_static());
        assert_eq!(remove.params[0].sig, fixture.handler);
        fixture.importer.ensure_resolved(&fixture.module).unwrap();
    }
}
