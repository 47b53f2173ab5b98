//! The devirtualization analysis engine.
//!
//! Given a loaded binary behind the [`CodeContainer`](crate::CodeContainer) trait, this
//! module answers which methods were virtualized, what the interpreter key is, where each
//! method's bytecode starts, and which real instruction each interpreter handler
//! implements.
//!
//! # Components
//!
//! - [`locator`] - finds the interpreter call stubs and produces [`VirtualizedMethod`]s
//! - [`evaluator`] - recovers the key from the arithmetic in a static initializer
//! - [`position`] - the keyed codec for position strings
//! - [`signatures`] - reference templates of handler bodies, with the built-in catalog
//! - [`matcher`] - normalizes handler bodies and matches them against templates
//! - [`catalog`] - builds the per-interpreter [`VirtualInstruction`] catalog
//! - [`session`] - [`AnalysisSession`], memoizing all of the above for one binary
//!
//! Every operation is a pure function of the binary and the signature catalog. Expected
//! outcomes such as "nothing virtualized" or "handler not recognized" are values, not
//! errors.

mod builtin;

pub mod catalog;
pub mod config;
pub mod evaluator;
pub mod locator;
pub mod matcher;
pub mod position;
pub mod session;
pub mod signatures;

pub use catalog::{
    build_catalog, collect_handlers, CatalogSummary, OperandTypeCounts, VirtualInstruction,
};
pub use config::AnalysisConfig;
pub use evaluator::{evaluate_constant, evaluate_field, EvalError};
pub use locator::{find_first_virtualized_method, find_virtualized_methods, VirtualizedMethod};
pub use matcher::{match_handler, match_steps, normalize, MatchResult};
pub use position::{decode_position, encode_position, FormatError};
pub use session::{AnalysisSession, BytecodeLocation};
pub use signatures::{
    OperandShape, OperandType, Signature, SignatureCatalog, SignatureDefinition, Step,
    SwitchArms,
};
