use crate::{
    file::io::read_le,
    metadata::method::{MethodBodyFlags, SectionFlags},
    Error::OutOfBounds,
    Result,
};

/// The header of a method body and the location of its code.
///
/// Extra data sections are walked to compute the full body size but their exception
/// clauses are not retained.
///
/// # Examples
///
/// ```rust
/// use vmscope::metadata::method::MethodBody;
///
/// // Tiny header with two bytes of code: ldc.i4.1, ret
/// let body = MethodBody::from(&[0x0A, 0x17, 0x2A])?;
/// assert!(!body.is_fat);
/// assert_eq!(body.code(&[0x0A, 0x17, 0x2A])?, &[0x17, 0x2A]);
/// # Ok::<(), vmscope::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodBody {
    /// Size of the code in bytes
    pub size_code: usize,
    /// Size of the header in bytes
    pub size_header: usize,
    /// StandAloneSig token of the local variable signature, `0` if none
    pub local_var_sig_token: u32,
    /// Maximum evaluation stack depth
    pub max_stack: usize,
    /// Whether the header uses the fat layout
    pub is_fat: bool,
    /// Whether locals are zero-initialized
    pub is_init_local: bool,
    /// Whether extra data sections follow the code
    pub has_sections: bool,
}

impl MethodBody {
    /// Parse the body header at the start of `data`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for an unknown header format and
    /// [`crate::Error::OutOfBounds`] if the code does not fit in `data`.
    pub fn from(data: &[u8]) -> Result<MethodBody> {
        let Some(&first_byte) = data.first() else {
            return Err(malformed_error!("Provided data for body parsing is empty"));
        };

        match MethodBodyFlags::from_bits_truncate(u16::from(first_byte & 0b11)) {
            MethodBodyFlags::TINY_FORMAT => {
                let size_code = (first_byte >> 2) as usize;
                if size_code + 1 > data.len() {
                    return Err(OutOfBounds);
                }

                Ok(MethodBody {
                    size_code,
                    size_header: 1,
                    local_var_sig_token: 0,
                    max_stack: 8,
                    is_fat: false,
                    is_init_local: false,
                    has_sections: false,
                })
            }
            MethodBodyFlags::FAT_FORMAT => {
                if data.len() < 12 {
                    return Err(OutOfBounds);
                }

                let first_duo = read_le::<u16>(data)?;
                let size_header = usize::from(first_duo >> 12) * 4;
                if size_header < 12 {
                    return Err(malformed_error!("Fat header of {} bytes", size_header));
                }

                let size_code = read_le::<u32>(&data[4..])? as usize;
                match size_header.checked_add(size_code) {
                    Some(end) if end <= data.len() => {}
                    _ => return Err(OutOfBounds),
                }

                let flags = MethodBodyFlags::from_bits_truncate(first_duo & 0x0FFF);

                Ok(MethodBody {
                    size_code,
                    size_header,
                    local_var_sig_token: read_le::<u32>(&data[8..])?,
                    max_stack: usize::from(read_le::<u16>(&data[2..])?),
                    is_fat: true,
                    is_init_local: flags.contains(MethodBodyFlags::INIT_LOCALS),
                    has_sections: flags.contains(MethodBodyFlags::MORE_SECTS),
                })
            }
            _ => Err(malformed_error!(
                "MethodHeader is neither FAT nor TINY - {}",
                first_byte
            )),
        }
    }

    /// The code bytes of this body, given the same data the header was parsed from.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `data` is shorter than header and code.
    pub fn code<'a>(&self, data: &'a [u8]) -> Result<&'a [u8]> {
        data.get(self.size_header..self.size_header + self.size_code)
            .ok_or(OutOfBounds)
    }

    /// Size of header, code and any extra data sections.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if a section extends past `data`.
    pub fn total_size(&self, data: &[u8]) -> Result<usize> {
        let mut cursor = self.size_header + self.size_code;
        if !self.has_sections {
            return Ok(cursor);
        }

        loop {
            cursor = (cursor + 3) & !3;
            let Some(&kind) = data.get(cursor) else {
                return Err(OutOfBounds);
            };
            let flags = SectionFlags::from_bits_truncate(kind);

            let size = if flags.contains(SectionFlags::FAT_FORMAT) {
                if cursor + 4 > data.len() {
                    return Err(OutOfBounds);
                }
                (read_le::<u32>(&data[cursor..])? >> 8) as usize
            } else {
                usize::from(*data.get(cursor + 1).ok_or(OutOfBounds)?)
            };

            if size < 4 {
                return Err(malformed_error!("Method data section of {} bytes", size));
            }

            cursor += size;
            if cursor > data.len() {
                return Err(OutOfBounds);
            }

            if !flags.contains(SectionFlags::MORE_SECTS) {
                return Ok(cursor);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiny() {
        let data = [0x0A, 0x17, 0x2A, 0xCC];
        let body = MethodBody::from(&data).unwrap();

        assert_eq!(body.size_code, 2);
        assert_eq!(body.size_header, 1);
        assert_eq!(body.total_size(&data).unwrap(), 3);
        assert_eq!(body.code(&data).unwrap(), &[0x17, 0x2A]);
    }

    #[test]
    fn fat() {
        #[rustfmt::skip]
        let data = [
            0x1B, 0x30, 0x02, 0x00,
            0x02, 0x00, 0x00, 0x00,
            0x01, 0x00, 0x00, 0x11,
            0x17, 0x2A,
            0x00, 0x00,
            // small EH section with one clause
            0x01, 0x10, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        ];
        let body = MethodBody::from(&data).unwrap();

        assert!(body.is_fat);
        assert!(body.is_init_local);
        assert!(body.has_sections);
        assert_eq!(body.max_stack, 2);
        assert_eq!(body.local_var_sig_token, 0x1100_0001);
        assert_eq!(body.code(&data).unwrap(), &[0x17, 0x2A]);
        assert_eq!(body.total_size(&data).unwrap(), 32);
    }

    #[test]
    fn invalid() {
        assert!(MethodBody::from(&[]).is_err());
        // Neither tiny nor fat
        assert!(MethodBody::from(&[0x01, 0x00]).is_err());
        // Tiny header claiming more code than present
        assert!(MethodBody::from(&[0x1E, 0x00]).is_err());
        // Fat header claiming more code than present
        assert!(MethodBody::from(&[0x03, 0x30, 0x08, 0x00, 0xFF, 0x00, 0x00, 0x00, 0, 0, 0, 0]).is_err());
    }
}
