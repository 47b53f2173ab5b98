//! PE file abstraction for .NET binaries.
//!
//! [`File`] loads a Portable Executable either from disk (memory-mapped) or from an owned
//! buffer, validates that it carries a CLR runtime header, and keeps the section table so
//! relative virtual addresses from metadata can be translated into file offsets.
//!
//! # Examples
//!
//! ```rust,no_run
//! use vmscope::File;
//! use std::path::Path;
//!
//! let file = File::from_file(Path::new("protected.exe"))?;
//! let (clr_rva, clr_size) = file.clr();
//! let offset = file.rva_to_offset(clr_rva as usize)?;
//! let header = file.data_slice(offset, clr_size as usize)?;
//! # Ok::<(), vmscope::Error>(())
//! ```

pub mod io;
pub mod parser;

mod memory;
mod physical;

use std::path::Path;

use goblin::pe::PE;

use crate::{
    Error::{Empty, GoblinErr, OutOfBounds},
    Result,
};
use memory::Memory;
use physical::Physical;

/// Storage that backs a loaded [`File`].
pub trait Backend: Send + Sync {
    /// The complete contents of the backing storage.
    fn data(&self) -> &[u8];

    /// Length of the backing storage in bytes.
    fn len(&self) -> usize {
        self.data().len()
    }
}

/// One entry of the PE section table, reduced to the fields needed for address translation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Section name as stored in the header, without trailing NULs
    pub name: String,
    /// RVA of the first byte of the section
    pub virtual_address: u32,
    /// Size of the section once mapped
    pub virtual_size: u32,
    /// File offset of the section's raw data
    pub pointer_to_raw_data: u32,
    /// Size of the section's raw data in the file
    pub size_of_raw_data: u32,
}

/// A loaded .NET PE image.
///
/// The PE headers are parsed once during loading; afterwards the file only keeps the
/// section table and the location of the CLR runtime header.
pub struct File {
    data: Box<dyn Backend>,
    sections: Vec<Section>,
    clr_rva: u32,
    clr_size: u32,
}

impl File {
    /// Memory-map and parse the file at `file`.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file cannot be opened, or a parsing error if
    /// it is not a PE image with a CLR runtime header.
    pub fn from_file(file: &Path) -> Result<File> {
        let input = Physical::new(file)?;

        Self::load(input)
    }

    /// Parse a PE image held in memory.
    ///
    /// # Errors
    /// Returns an error if `data` is empty or not a PE image with a CLR runtime header.
    pub fn from_mem(data: Vec<u8>) -> Result<File> {
        let input = Memory::new(data);

        Self::load(input)
    }

    fn load<T: Backend + 'static>(data: T) -> Result<File> {
        if data.len() == 0 {
            return Err(Empty);
        }

        let (sections, clr_rva, clr_size) = {
            let pe = PE::parse(data.data()).map_err(GoblinErr)?;
            let Some(optional_header) = pe.header.optional_header else {
                return Err(malformed_error!("File does not have an OptionalHeader"));
            };

            let Some((clr_rva, clr_size)) = optional_header
                .data_directories
                .get_clr_runtime_header()
                .as_ref()
                .map(|dir| (dir.virtual_address, dir.size))
            else {
                return Err(malformed_error!(
                    "File does not have a CLR runtime header directory"
                ));
            };

            let sections = pe
                .sections
                .iter()
                .map(|section| Section {
                    name: String::from_utf8_lossy(&section.name)
                        .trim_end_matches('\0')
                        .to_string(),
                    virtual_address: section.virtual_address,
                    virtual_size: section.virtual_size,
                    pointer_to_raw_data: section.pointer_to_raw_data,
                    size_of_raw_data: section.size_of_raw_data,
                })
                .collect::<Vec<_>>();

            (sections, clr_rva, clr_size)
        };

        if clr_rva == 0 || clr_size == 0 {
            return Err(malformed_error!("CLR runtime header directory is empty"));
        }

        Ok(File {
            data: Box::new(data),
            sections,
            clr_rva,
            clr_size,
        })
    }

    /// Length of the file in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the file holds no data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.len() == 0
    }

    /// RVA and size of the CLR runtime header.
    #[must_use]
    pub fn clr(&self) -> (u32, u32) {
        (self.clr_rva, self.clr_size)
    }

    /// The section table in header order.
    #[must_use]
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// The complete file contents.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.data.data()
    }

    /// A bounds-checked slice of the file contents.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the range exceeds the file.
    pub fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        let Some(end) = offset.checked_add(len) else {
            return Err(OutOfBounds);
        };

        self.data.data().get(offset..end).ok_or(OutOfBounds)
    }

    /// Translate a relative virtual address into a file offset.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if no section contains the address.
    pub fn rva_to_offset(&self, rva: usize) -> Result<usize> {
        let rva = u32::try_from(rva)
            .map_err(|_| malformed_error!("RVA too large to fit in u32: {}", rva))?;

        for section in &self.sections {
            let mapped_size = section.virtual_size.max(section.size_of_raw_data);
            let Some(section_max) = section.virtual_address.checked_add(mapped_size) else {
                return Err(malformed_error!(
                    "Section malformed, causing integer overflow - {} + {}",
                    section.virtual_address,
                    mapped_size
                ));
            };

            if section.virtual_address <= rva && rva < section_max {
                return Ok((rva - section.virtual_address) as usize
                    + section.pointer_to_raw_data as usize);
            }
        }

        Err(malformed_error!(
            "RVA could not be converted to offset - {}",
            rva
        ))
    }
}
