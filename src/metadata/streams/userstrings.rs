use widestring::U16Str;

use crate::{file::parser::Parser, Error::OutOfBounds, Result};

/// The `#US` heap: length-prefixed UTF-16 string literals referenced by `ldstr`.
///
/// Each entry is a compressed byte length, the UTF-16LE code units and one trailing flag
/// byte. The low 24 bits of an `ldstr` token are the entry's offset.
pub struct UserStrings<'a> {
    data: &'a [u8],
}

impl<'a> UserStrings<'a> {
    /// Wrap the raw bytes of a `#US` heap.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the heap does not start with a NUL byte.
    pub fn from(data: &'a [u8]) -> Result<UserStrings<'a>> {
        if data.first() != Some(&0) {
            return Err(malformed_error!("Invalid memory for #US heap"));
        }

        Ok(UserStrings { data })
    }

    /// Decode the literal at byte offset `index`.
    ///
    /// Unpaired surrogates are replaced rather than rejected, as obfuscated binaries
    /// routinely store arbitrary code units in their literals.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the entry extends past the heap.
    pub fn get(&self, index: usize) -> Result<String> {
        if index >= self.data.len() {
            return Err(OutOfBounds);
        }

        let mut parser = Parser::new(&self.data[index..]);
        let length = parser.read_compressed_uint()? as usize;
        let bytes = parser.read_bytes(length)?;

        // An odd length carries the trailing flag byte
        let units = bytes[..length & !1]
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect::<Vec<_>>();

        Ok(U16Str::from_slice(&units).to_string_lossy())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crafted() {
        #[rustfmt::skip]
        let data = [
            0x00,
            0x0B, b'H', 0x00, b'e', 0x00, b'l', 0x00, b'l', 0x00, b'o', 0x00, 0x00,
            0x01, 0x00,
        ];

        let heap = UserStrings::from(&data).unwrap();
        assert_eq!(heap.get(1).unwrap(), "Hello");
        assert_eq!(heap.get(13).unwrap(), "");
    }

    #[test]
    fn invalid() {
        assert!(UserStrings::from(&[]).is_err());
        assert!(UserStrings::from(&[0x22, 0x00]).is_err());

        let heap = UserStrings::from(&[0x00, 0x09, 0x41, 0x00]).unwrap();
        assert!(heap.get(1).is_err());
        assert!(heap.get(4).is_err());
    }
}
