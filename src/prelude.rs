//! # vmscope Prelude
//!
//! The types needed for a typical analysis: load a binary, open a session, and read its
//! virtualized methods, key and instruction catalog.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all vmscope operations
pub use crate::Error;

/// The result type used throughout vmscope
pub use crate::Result;

// ================================================================================================
// Main Entry Points
// ================================================================================================

/// The loaded .NET module
pub use crate::CilModule;

/// The interface the analysis reads binaries through
pub use crate::CodeContainer;

/// Low-level file parsing utilities
pub use crate::{File, Parser};

/// Metadata token type for referencing table entries
pub use crate::metadata::token::Token;

// ================================================================================================
// Analysis
// ================================================================================================

/// Memoized analysis of one binary and its configuration
pub use crate::devirtualization::{AnalysisConfig, AnalysisSession, BytecodeLocation};

/// Located methods and the key evaluator
pub use crate::devirtualization::{evaluate_constant, EvalError, VirtualizedMethod};

/// The position codec
pub use crate::devirtualization::{decode_position, encode_position, FormatError};

/// Signature catalogs and handler identification
pub use crate::devirtualization::{
    CatalogSummary, OperandType, OperandTypeCounts, SignatureCatalog, VirtualInstruction,
};
