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
#![allow(clippy::too_many_arguments)]

//! # dotscript
//!
//! A translator from decompiled CIL method bodies to a script syntax tree.
//!
//! `dotscript` consumes methods that a decompiler has already lifted into structured
//! instruction trees, and produces a strongly typed syntax tree that a script emitter can
//! print. It does not read assemblies and it does not print text; both ends are supplied
//! by the caller.
//!
//! ## Features
//!
//! - **Type oracle** - Equality, assignability and numeric classification of .NET types,
//!   with a concurrent memo for assignability queries
//! - **Syntax tree** - A closed set of node kinds with validated constructors, explicit
//!   result types and structural equality
//! - **Instruction translator** - One exhaustive rule per instruction, width promotion,
//!   automatic casts, references and pointers, nullable lifting and structured control flow
//! - **Rewrite passes** - Cast expansion, intrinsic substitution, property compound
//!   assignment lowering and variable declaration, run to a fixpoint
//! - **Parallel driver** - Methods are translated independently with `rayon`; a method that
//!   fails is replaced by a stub without affecting the rest of the run
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use dotscript::prelude::*;
//!
//! let types = Arc::new(TypeSystem::new());
//! let translator = MethodTranslator::with_types(types.clone());
//! let driver = TranslationDriver::new(translator);
//!
//! let bodies: Vec<MethodBody> = Vec::new();
//! for outcome in driver.translate_all(&bodies) {
//!     let method = outcome.method();
//!     println!("{}: {}", method.method.full_name(), method.body);
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`typesystem`] - Type descriptors, the registry of well-known types and the [`typesystem::TypeOracle`]
//! - [`metadata`] - Member descriptors and the caller's [`metadata::MetadataOracle`]
//! - [`il`] - The instruction tree consumed by the translator
//! - [`ast`] - The syntax tree produced by the translator
//! - [`translator`] - Translation of one method
//! - [`passes`] - Rewrite passes over translated methods
//! - [`driver`] - Translation and passes over a batch of methods
//! - [`Error`] and [`Result`] - Error handling
//!
//! ## Error Handling
//!
//! A problem confined to one instruction degrades to an untranslatable node and a warning in
//! [`Diagnostics`]. A violated invariant aborts the method with an [`Error`], which the
//! per-method boundary turns into a stub body that throws:
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use dotscript::{prelude::*, Error};
//!
//! # fn body() -> MethodBody { unimplemented!() }
//! let translator = MethodTranslator::with_types(Arc::new(TypeSystem::new()));
//! match translator.translate(&body()) {
//!     Ok(method) => println!("{}", method.body),
//!     Err(Error::ReferenceRequired(what)) => println!("needs a reference: {what}"),
//!     Err(e) => println!("aborted: {e}"),
//! }
//! ```

#[macro_use]
pub(crate) mod error;

#[cfg(test)]
pub(crate) mod test;

pub mod prelude;

pub mod ast;

pub mod config;

pub mod diagnostics;

pub mod driver;

pub mod il;

pub mod metadata;

pub mod passes;

pub mod translator;

pub mod typesystem;

/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
/// This is used consistently throughout the crate for all fallible operations.
pub type Result<T> = std::result::Result<T, Error>;

/// `dotscript` Error type
///
/// Every variant aborts the translation of one method. See [`Error`] for the categories.
pub use error::Error;

/// Translation settings, shared by the translator and the passes.
pub use config::TranslatorConfig;

/// Collector for warnings and stub errors.
pub use diagnostics::Diagnostics;
