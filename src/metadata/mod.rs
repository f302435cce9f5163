//! In-memory representation of a .NET module being woven.
//!
//! The representation is an arena: [`module::Module`] owns every table, rows are
//! addressed by [`token::Token`] and relations between rows (a method's declaring type,
//! a type's fields) are token lookups rather than ownership.
//!
//! # Key Components
//!
//! - [`module`] - The arena and its lookup/insert operations
//! - [`typesystem`] - [`typesystem::TypeSig`], the type reference used everywhere
//! - [`typedef`], [`field`], [`method`] - Definitions owned by the module
//! - [`memberref`] - References to external methods and generic instantiations
//! - [`builders`] - Fluent construction of classes, delegates, fields and methods

pub mod builders;
pub mod field;
pub mod memberref;
pub mod method;
pub mod module;
pub mod token;
pub mod typedef;
pub mod typesystem;
