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

//! # vmscope
//!
//! Static analysis of .NET methods that a code-virtualization obfuscator has
//! replaced with bytecode for an embedded interpreter.
//!
//! `vmscope` answers four questions about such a binary without executing any of it:
//!
//! - **Which methods are virtualized?** Every method body is scanned for the stub that
//!   hands control to the interpreter's dispatch entry point.
//! - **What is the interpreter key?** The key is assembled by a short arithmetic sequence
//!   in a static initializer; a restricted evaluator recovers it.
//! - **Where does a method's bytecode start?** The stub carries an encoded position string
//!   that decodes, under the key, to an offset into an embedded resource.
//! - **What does each interpreter handler do?** Every handler body is normalized and
//!   compared against a catalog of reference templates to identify the real CIL
//!   instruction and operand shape it implements.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use vmscope::prelude::*;
//!
//! let module = CilModule::from_file("protected.exe".as_ref())?;
//! let session = AnalysisSession::new(&module);
//!
//! for method in session.virtualized_methods() {
//!     let position = session.decode_position(method)?;
//!     println!("{} => {:08X} (key {})", method.method_name, position, method.key);
//! }
//!
//! if let Some(first) = session.first_virtualized_method() {
//!     let catalog = session.instruction_catalog(first.interpreter_type)?;
//!     println!("{}", CatalogSummary::of(&catalog));
//! }
//! # Ok::<(), vmscope::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`file`] - PE image access (memory-mapped or in-memory) and the byte cursor
//! - [`metadata`] - ECMA-335 metadata reading and the loaded [`CilModule`] model, exposed
//!   to the analysis through the [`CodeContainer`] trait
//! - [`disassembler`] - CIL opcode table and instruction decoding
//! - [`devirtualization`] - the analysis engine: locator, constant evaluator, position
//!   codec, signature catalog, pattern matcher, catalog builder and analysis session
//!
//! ## Error Handling
//!
//! Operations return [`Result<T, Error>`](Result). Expected outcomes are not errors: a
//! binary without virtualized methods yields an empty list and an unmatched handler is an
//! unidentified catalog entry. Malformed position strings surface as
//! [`devirtualization::FormatError`], unsupported key initializers as
//! [`devirtualization::EvalError`].

#[macro_use]
pub(crate) mod error;

#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types.
pub mod prelude;

/// PE file access and the low-level byte parser.
pub mod file;

/// CIL instruction decoding.
pub mod disassembler;

/// ECMA-335 metadata reading and the loaded module model.
pub mod metadata;

/// Virtualized-method discovery and interpreter analysis.
pub mod devirtualization;

/// `vmscope` Result type.
pub type Result<T> = std::result::Result<T, Error>;

pub use error::Error;

pub use devirtualization::{
    AnalysisConfig, AnalysisSession, CatalogSummary, OperandType, SignatureCatalog,
    VirtualInstruction, VirtualizedMethod,
};
pub use file::{parser::Parser, File};
pub use metadata::{cilmodule::CilModule, container::CodeContainer, token::Token};
