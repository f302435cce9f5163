// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]

//! # weakevents
//!
//! Rewrites .NET events whose backing delegate field holds strong references to its
//! subscribers into events that hold their subscribers weakly, at the CIL level.
//!
//! A subscriber attached to a long lived publisher through a plain event is kept alive
//! by the publisher's delegate field. The weaver changes what the event accessors store:
//! `add` wraps the incoming handler into a weak handler, `remove` looks the wrapper up
//! again, and a synthesized unsubscribe method lets a wrapper whose target has been
//! collected remove itself from the field the next time the event is raised.
//!
//! ## Features
//!
//! - **In-memory IR** - Types, fields, methods, member references and generic
//!   instantiations addressed by metadata [`metadata::token::Token`]s
//! - **Instruction emission** - Composable emission of typed CIL fragments
//! - **Weaving** - Unsubscribe method synthesis and `MakeWeak`/`FindWeak` sequences,
//!   with delegate conversions for events of custom delegate types
//! - **Verification** - A type-flow check of every synthesized body
//! - **Emulation** - An interpreter with multicast and weak delegate semantics to
//!   observe woven code at work
//!
//! ## Quick Start
//!
//! ```rust
//! use weakevents::prelude::*;
//!
//! let handler = TypeSig::generic(
//!     "System",
//!     "EventHandler`1",
//!     vec![TypeSig::class("System", "EventArgs")],
//! );
//!
//! let mut module = Module::new("Sample.dll");
//! let importer = ModuleImporter::new(&mut module)?;
//! let publisher = ClassBuilder::new("Publisher").namespace("Sample").build(&mut module)?;
//! let field = FieldBuilder::new("Changed", handler).build(&mut module, publisher)?;
//!
//! let weaver = EventWeaver::new(&module, field, &importer)?;
//! assert!(weaver.is_generic_handler());
//!
//! let unsubscribe = weaver.add_unsubscribe_method(&mut module)?;
//! assert_eq!(module.method(unsubscribe)?.name, "<Changed>_Weak_Unsubscribe");
//! # Ok::<(), weakevents::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`prelude`] - Convenient re-exports of commonly used types
//! - [`metadata`] - The module IR and its builders
//! - [`assembly`] - Opcodes, instructions, instruction sequences and the verifier
//! - [`weaving`] - Runtime imports, instruction emission and the event weaver
//! - [`emulation`] - Execution of woven bodies against a delegate runtime model
//! - [`Error`] and [`Result`] - Error handling
//!
//! ## Logging
//!
//! The crate reports through the [`log`] facade: `debug` for each woven event and
//! synthesized method, `trace` for generated instruction sequences and emulated calls,
//! `warn` when verification of synthesized bodies is disabled. No logger is installed.
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result<T, Error>`](Result):
//!
//! ```rust
//! use weakevents::{prelude::*, Error};
//!
//! let mut module = Module::new("Sample.dll");
//! let importer = ModuleImporter::new(&mut module)?;
//! let publisher = ClassBuilder::new("Publisher").build(&mut module)?;
//! let field = FieldBuilder::new("Changed", TypeSig::Object).build(&mut module, publisher)?;
//!
//! match EventWeaver::new(&module, field, &importer) {
//!     Err(Error::UnsupportedDelegate(name)) => assert_eq!(name, "System.Object"),
//!     other => panic!("unexpected {:?}", other.map(|w| w.field())),
//! }
//! # Ok::<(), Error>(())
//! ```

#[macro_use]
pub(crate) mod error;

#[cfg(test)]
pub(crate) mod test;

pub mod prelude;

pub mod assembly;
pub mod emulation;
pub mod metadata;
pub mod weaving;

/// `weakevents` Result type
///
/// A type alias for `std::result::Result<T, Error>` where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `weakevents` Error type
///
/// The main error type for all operations in this crate. Provides detailed error information
/// for module lookups, weaving, verification and emulation.
pub use error::Error;
