use thiserror::Error;

use crate::{
    devirtualization::{EvalError, FormatError},
    metadata::token::Token,
};

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// # Error Categories
///
/// ## File Parsing Errors
/// - [`Error::Malformed`] - Corrupted or invalid file structure
/// - [`Error::OutOfBounds`] - Attempted to read beyond data boundaries
/// - [`Error::NotSupported`] - Unsupported file format or feature
/// - [`Error::Empty`] - Empty input provided
///
/// ## I/O and External Errors
/// - [`Error::FileError`] - Filesystem I/O errors
/// - [`Error::GoblinErr`] - PE parsing errors from the goblin crate
/// - [`Error::Json`] - Signature catalogs that are not valid JSON
///
/// ## Analysis Errors
/// - [`Error::Format`] - An encoded position string could not be decoded
/// - [`Error::Eval`] - A constant initializer could not be evaluated
/// - [`Error::TypeNotFound`] - A type token does not name a type definition of the binary
/// - [`Error::CatalogUnavailable`] - The handlers of an interpreter type could not be listed
/// - [`Error::AmbiguousSignature`] - Two catalog templates are indistinguishable
/// - [`Error::SignatureSyntax`] - A catalog template step could not be parsed
///
/// # Examples
///
/// ```rust,no_run
/// use vmscope::{CilModule, Error};
/// use std::path::Path;
///
/// match CilModule::from_file(Path::new("protected.exe")) {
///     Ok(module) => println!("Loaded {} types", module.types().len()),
///     Err(Error::FileError(io_err)) => eprintln!("I/O error: {}", io_err),
///     Err(Error::Malformed { message, .. }) => eprintln!("Malformed file: {}", message),
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The file is damaged and could not be parsed.
    ///
    /// The error includes the source location where the malformation was detected.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while parsing the file.
    #[error("Out of Bound read would have occurred!")]
    OutOfBounds,

    /// This file type is not supported.
    #[error("This file type is not supported")]
    NotSupported,

    /// Provided input was empty.
    #[error("Provided input was empty")]
    Empty,

    /// File I/O error.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// Error from the goblin crate during PE parsing.
    #[error("{0}")]
    GoblinErr(#[from] goblin::error::Error),

    /// An encoded position string could not be decoded.
    #[error("Invalid position string - {0}")]
    Format(#[from] FormatError),

    /// A constant initializer could not be evaluated.
    #[error("Constant evaluation failed - {0}")]
    Eval(#[from] EvalError),

    /// The token does not name a type definition of the loaded binary.
    #[error("Failed to find type definition - {0}")]
    TypeNotFound(Token),

    /// The handlers of an interpreter type could not be listed.
    ///
    /// The failure is remembered by the analysis session, so the message is kept as text.
    #[error("Handlers of {interpreter_type} could not be listed - {message}")]
    CatalogUnavailable {
        /// The interpreter type
        interpreter_type: Token,
        /// Why listing failed
        message: String,
    },

    /// Two signature templates normalize to the same step sequence.
    ///
    /// Catalog templates must be pairwise distinguishable, otherwise a handler could match
    /// more than one real instruction.
    #[error("Signatures '{first}' and '{second}' share the same template")]
    AmbiguousSignature {
        /// Mnemonic of the signature registered first
        first: String,
        /// Mnemonic of the conflicting signature
        second: String,
    },

    /// A signature template contained a step that could not be parsed.
    #[error("Invalid signature template - {0}")]
    SignatureSyntax(String),

    /// A signature catalog document was not valid JSON.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}
