use std::{ffi::CStr, str};

use crate::{Error::OutOfBounds, Result};

/// The `#Strings` heap: NUL-terminated UTF-8 identifiers addressed by byte offset.
///
/// Offset `0` always names the empty string.
///
/// # Examples
///
/// ```rust
/// use vmscope::metadata::streams::Strings;
///
/// let heap = [0x00, b'V', b'M', 0x00];
/// let strings = Strings::from(&heap)?;
/// assert_eq!(strings.get(1)?, "VM");
/// assert_eq!(strings.get(0)?, "");
/// # Ok::<(), vmscope::Error>(())
/// ```
pub struct Strings<'a> {
    data: &'a [u8],
}

impl<'a> Strings<'a> {
    /// Wrap the raw bytes of a `#Strings` heap.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the heap is empty or does not start with NUL.
    pub fn from(data: &'a [u8]) -> Result<Strings<'a>> {
        if data.first() != Some(&0) {
            return Err(malformed_error!("Provided #Strings heap is empty"));
        }

        Ok(Strings { data })
    }

    /// The string starting at byte offset `index`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] past the end of the heap and
    /// [`crate::Error::Malformed`] for unterminated or non-UTF-8 strings.
    pub fn get(&self, index: usize) -> Result<&'a str> {
        if index >= self.data.len() {
            return Err(OutOfBounds);
        }

        CStr::from_bytes_until_nul(&self.data[index..])
            .ok()
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| malformed_error!("Invalid string at index - {}", index))
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
            b'<', b'M', b'o', b'd', b'u', b'l', b'e', b'>', 0x00,
            b'S', b'y', b's', b't', b'e', b'm', 0x00,
        ];

        let strings = Strings::from(&data).unwrap();
        assert_eq!(strings.get(1).unwrap(), "<Module>");
        assert_eq!(strings.get(10).unwrap(), "System");
        assert_eq!(strings.get(13).unwrap(), "tem");
        assert!(strings.get(17).is_err());
    }

    #[test]
    fn invalid() {
        assert!(Strings::from(&[]).is_err());
        assert!(Strings::from(&[0x41, 0x00]).is_err());

        let strings = Strings::from(&[0x00, 0x41, 0x42]).unwrap();
        assert!(strings.get(1).is_err());
    }
}
