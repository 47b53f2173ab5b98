//! The metadata root (II.24.2.1).

use crate::{
    file::io::{read_le, read_le_at},
    metadata::streams::StreamHeader,
    Error::OutOfBounds,
    Result,
};

/// Signature of the metadata root, `BSJB`.
pub const CIL_HEADER_MAGIC: u32 = 0x424A_5342;

/// The metadata root: version information and the stream directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Root {
    /// Always [`CIL_HEADER_MAGIC`]
    pub signature: u32,
    /// Major version, 1
    pub major_version: u16,
    /// Minor version, 1
    pub minor_version: u16,
    /// Runtime version string, e.g. `v4.0.30319`
    pub version: String,
    /// Reserved flags
    pub flags: u16,
    /// The stream directory in declaration order
    pub stream_headers: Vec<StreamHeader>,
}

impl Root {
    /// Parse the metadata root from the start of `data`, the complete metadata.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for a wrong signature, an invalid stream
    /// directory or duplicate streams, and [`crate::Error::OutOfBounds`] for streams
    /// extending past the metadata.
    pub fn read(data: &[u8]) -> Result<Root> {
        if data.len() < 20 {
            return Err(OutOfBounds);
        }

        let signature = read_le::<u32>(data)?;
        if signature != CIL_HEADER_MAGIC {
            return Err(malformed_error!(
                "CIL_HEADER_MAGIC does not match - {}",
                signature
            ));
        }

        let version_length = read_le_at::<u32>(data, &mut 12)? as usize;
        let Some(version_end) = version_length.checked_add(16) else {
            return Err(OutOfBounds);
        };
        // flags and stream count follow the version string
        if version_end + 4 > data.len() {
            return Err(OutOfBounds);
        }

        let version_bytes = &data[16..version_end];
        let version_len = version_bytes
            .iter()
            .position(|&byte| byte == 0)
            .unwrap_or(version_bytes.len());
        let version = String::from_utf8_lossy(&version_bytes[..version_len]).into_owned();

        let flags = read_le_at::<u16>(data, &mut { version_end })?;
        let stream_count = read_le_at::<u16>(data, &mut (version_end + 2))?;
        if stream_count == 0 || stream_count > 6 {
            return Err(malformed_error!("Invalid stream count - {}", stream_count));
        }

        let mut stream_headers: Vec<StreamHeader> = Vec::with_capacity(stream_count as usize);
        let mut stream_offset = version_end + 4;
        for _ in 0..stream_count {
            let Some(remaining) = data.get(stream_offset..) else {
                return Err(OutOfBounds);
            };

            let header = StreamHeader::from(remaining)?;
            match header.offset.checked_add(header.size) {
                Some(end) if end as usize <= data.len() => {}
                Some(_) => return Err(OutOfBounds),
                None => {
                    return Err(malformed_error!(
                        "Stream offset and size cause integer overflow - {} + {}",
                        header.offset,
                        header.size
                    ))
                }
            }

            if stream_headers
                .iter()
                .any(|existing| existing.name == header.name)
            {
                return Err(malformed_error!("Duplicate stream - {}", header.name));
            }

            stream_offset += header.encoded_size();
            stream_headers.push(header);
        }

        Ok(Root {
            signature,
            major_version: read_le::<u16>(&data[4..])?,
            minor_version: read_le::<u16>(&data[6..])?,
            version,
            flags,
            stream_headers,
        })
    }

    /// The header of the stream called `name`.
    #[must_use]
    pub fn stream(&self, name: &str) -> Option<&StreamHeader> {
        self.stream_headers.iter().find(|stream| stream.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[rustfmt::skip]
    const ROOT: [u8; 56] = [
        0x42, 0x53, 0x4A, 0x42,
        0x01, 0x00, 0x01, 0x00,
        0x00, 0x00, 0x00, 0x00,
        0x0C, 0x00, 0x00, 0x00,
        b'v', b'4', b'.', b'0', b'.', b'3', b'0', b'3', b'1', b'9', 0x00, 0x00,
        0x00, 0x00,
        0x02, 0x00,
        0x34, 0x00, 0x00, 0x00, 0x04, 0x00, 0x00, 0x00,
        b'#', b'~', 0x00, 0x00,
        0x38, 0x00, 0x00, 0x00, 0x04, 0x00, 0x00, 0x00,
        b'#', b'U', b'S', 0x00,
    ];

    #[test]
    fn crafted() {
        let mut data = ROOT.to_vec();
        data.extend_from_slice(&[0; 4]);

        let root = Root::read(&data).unwrap();
        assert_eq!(root.version, "v4.0.30319");
        assert_eq!(root.stream_headers.len(), 2);
        assert_eq!(root.stream("#~").unwrap().offset, 0x34);
        assert_eq!(root.stream("#US").unwrap().size, 4);
        assert!(root.stream("#Blob").is_none());
    }

    #[test]
    fn stream_out_of_bounds() {
        assert!(Root::read(&ROOT).is_err());
    }

    #[test]
    fn bad_magic() {
        let mut data = ROOT.to_vec();
        data[0] = 0x43;
        data.extend_from_slice(&[0; 4]);
        assert!(Root::read(&data).is_err());
    }
}
