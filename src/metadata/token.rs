//! Metadata tokens.
//!
//! A token is a 32-bit reference into the metadata of a binary: the high byte names the
//! table (or `0x70` for the user-string heap) and the low 24 bits the 1-based row or heap
//! offset.
//!
//! # Examples
//!
//! ```rust
//! use vmscope::Token;
//!
//! let token = Token::new(0x0600_0012);
//! assert_eq!(token.table(), 0x06);
//! assert_eq!(token.row(), 0x12);
//! assert_eq!(token.to_string(), "0x06000012");
//! ```

use std::fmt;

use serde::{Serialize, Serializer};

/// A metadata token: table id in the high byte, row in the low 24 bits.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Token(pub u32);

impl Token {
    /// Create a token from its raw value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Token(value)
    }

    /// Create a token from a table id and a row.
    #[must_use]
    pub const fn from_parts(table: u8, row: u32) -> Self {
        Token(((table as u32) << 24) | (row & 0x00FF_FFFF))
    }

    /// The raw 32-bit value.
    #[must_use]
    pub const fn value(&self) -> u32 {
        self.0
    }

    /// The table id stored in the high byte.
    #[must_use]
    pub const fn table(&self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// The 1-based row (or heap offset) stored in the low 24 bits.
    #[must_use]
    pub const fn row(&self) -> u32 {
        self.0 & 0x00FF_FFFF
    }

    /// Returns `true` if the row part is zero, which never names an actual row.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        self.row() == 0
    }
}

impl From<u32> for Token {
    fn from(value: u32) -> Self {
        Token(value)
    }
}

impl From<Token> for u32 {
    fn from(token: Token) -> Self {
        token.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Token(0x{:08x}, table: 0x{:02x}, row: {})",
            self.0,
            self.table(),
            self.row()
        )
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

impl Serialize for Token {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parts() {
        let token = Token::from_parts(0x04, 0x0123);
        assert_eq!(token.value(), 0x0400_0123);
        assert_eq!(token.table(), 0x04);
        assert_eq!(token.row(), 0x0123);
        assert!(!token.is_null());
        assert!(Token::from_parts(0x02, 0).is_null());
    }

    #[test]
    fn formatting() {
        let token = Token::new(0x0600_0001);
        assert_eq!(format!("{token}"), "0x06000001");

        let debug = format!("{token:?}");
        assert!(debug.contains("table: 0x06"));
        assert!(debug.contains("row: 1"));

        assert_eq!(serde_json::to_string(&token).unwrap(), "\"0x06000001\"");
    }

    #[test]
    fn conversions() {
        let token: Token = 0x0A00_0002.into();
        let raw: u32 = token.into();
        assert_eq!(raw, 0x0A00_0002);
    }
}
