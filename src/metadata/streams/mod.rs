//! Metadata streams (II.24.2.2 - II.24.2.6).
//!
//! The metadata root lists its streams through [`StreamHeader`]s. Identifiers live in
//! [`Strings`], string literals in [`UserStrings`], signatures and constant values in
//! [`Blob`], and the tables themselves in the stream described by [`TablesHeader`].

mod blob;
mod streamheader;
mod strings;
mod tablesheader;
mod userstrings;

pub use blob::Blob;
pub use streamheader::{StreamHeader, STREAM_NAMES};
pub use strings::Strings;
pub use tablesheader::TablesHeader;
pub use userstrings::UserStrings;
