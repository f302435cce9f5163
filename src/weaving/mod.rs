//! Weak event weaving.
//!
//! Turns an event whose backing field holds strong references to its subscribers into
//! one whose subscribers are held weakly. For each event:
//!
//! 1. a [`ModuleImporter`] (one per module) provides references to the weak event runtime
//! 2. an [`EventWeaver`] synthesizes the unsubscribe callback on the declaring type
//! 3. the accessor rewriter splices the weaver's `FindWeak` / `MakeWeak` sequences into
//!    the `remove` / `add` accessors
//!
//! # Key Components
//!
//! - [`EventWeaver`] - Per-event orchestration
//! - [`IlEmitter`] / [`IlValue`] - Composable instruction emission with value threading
//! - [`ModuleImporter`] - Runtime helper references
//! - [`WeavingConfig`] - Verification and runtime namespace settings
//! - [`names`] - Naming conventions and helper names
//!
//! # Examples
//!
//! ```rust
//! use weakevents::prelude::*;
//!
//! let mut module = Module::new("Sample.dll");
//! let importer = ModuleImporter::new(&mut module)?;
//! let publisher = ClassBuilder::new("Publisher").namespace("Sample").build(&mut module)?;
//! let field = FieldBuilder::new("Changed", TypeSig::class("System", "EventHandler"))
//!     .build(&mut module, publisher)?;
//! let add = MethodBuilder::new("add_Changed")
//!     .public()
//!     .special_name()
//!     .parameter("value", TypeSig::class("System", "EventHandler"))
//!     .build(&mut module, publisher)?;
//!
//! let weaver = EventWeaver::new(&module, field, &importer)?;
//! assert!(!weaver.is_generic_handler());
//!
//! let unsubscribe = weaver.add_unsubscribe_method(&mut module)?;
//! let weak = weaver.create_event_handler_variable(&mut module, add)?;
//! let wrap = weaver.generate_make_weak_il(&mut module, add, unsubscribe, &weak)?;
//! module.method_mut(add)?.insert_instructions(wrap, 0)?;
//! # Ok::<(), weakevents::Error>(())
//! ```

mod config;
mod emitter;
mod importer;
pub mod names;
mod weaver;

pub use config::WeavingConfig;
pub use emitter::{IlEmitter, IlValue};
pub use importer::ModuleImporter;
pub use weaver::{event_args_type, EventWeaver};
