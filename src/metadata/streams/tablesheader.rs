use std::sync::Arc;

use strum::{EnumCount, IntoEnumIterator};

use crate::{
    file::io::read_le_at,
    metadata::tables::{MetadataTable, RowReadable, TableId, TableInfo, TableInfoRef},
    Error::OutOfBounds,
    Result,
};

/// `HeapSizes` bit announcing four extra bytes after the row counts.
const EXTRA_DATA: u8 = 0x40;

/// The header of the `#~` (or `#-`) stream and the location of every table in it.
///
/// # Examples
///
/// ```rust,no_run
/// use vmscope::metadata::{streams::TablesHeader, tables::{TableId, TypeDefRaw}};
///
/// # fn example(stream: &[u8]) -> vmscope::Result<()> {
/// let header = TablesHeader::from(stream)?;
/// println!("{} type definitions", header.info.rows(TableId::TypeDef));
///
/// for row in header.table::<TypeDefRaw>()?.iter() {
///     println!("TypeDef #{}", row?.rid);
/// }
/// # Ok(())
/// # }
/// ```
pub struct TablesHeader<'a> {
    /// Major schema version
    pub major_version: u8,
    /// Minor schema version
    pub minor_version: u8,
    /// Bit vector of present tables
    pub valid: u64,
    /// Bit vector of sorted tables
    pub sorted: u64,
    /// Row counts and column widths
    pub info: TableInfoRef,
    data: &'a [u8],
    offsets: [usize; TableId::COUNT],
}

impl<'a> TablesHeader<'a> {
    /// Parse the tables stream.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] for truncated streams and
    /// [`crate::Error::Malformed`] for tables outside the ECMA-335 set.
    pub fn from(data: &'a [u8]) -> Result<TablesHeader<'a>> {
        if data.len() < 24 {
            return Err(OutOfBounds);
        }

        let major_version = data[4];
        let minor_version = data[5];
        let heap_sizes = data[6];

        let mut offset = 8;
        let valid = read_le_at::<u64>(data, &mut offset)?;
        let sorted = read_le_at::<u64>(data, &mut offset)?;

        if valid >> TableId::COUNT != 0 {
            return Err(malformed_error!(
                "Unsupported tables present - valid mask 0x{:016X}",
                valid
            ));
        }

        let mut row_counts = Vec::with_capacity(valid.count_ones() as usize);
        for table in TableId::iter() {
            if valid & (1 << table as u64) != 0 {
                row_counts.push((table, read_le_at::<u32>(data, &mut offset)?));
            }
        }

        if heap_sizes & EXTRA_DATA != 0 {
            offset += 4;
        }

        let info = Arc::new(TableInfo::new(&row_counts, heap_sizes));

        let mut offsets = [0_usize; TableId::COUNT];
        for table in TableId::iter() {
            offsets[table as usize] = offset;

            let size = u64::from(info.rows(table)) * u64::from(info.row_size(table));
            offset = usize::try_from(size)
                .ok()
                .and_then(|size| offset.checked_add(size))
                .ok_or(OutOfBounds)?;
        }

        if offset > data.len() {
            return Err(OutOfBounds);
        }

        Ok(TablesHeader {
            major_version,
            minor_version,
            valid,
            sorted,
            info,
            data,
            offsets,
        })
    }

    /// Number of tables present in the stream.
    #[must_use]
    pub fn table_count(&self) -> u32 {
        self.valid.count_ones()
    }

    /// A typed view of the table holding rows of type `T`; empty if the table is absent.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the table does not fit in the stream.
    pub fn table<T: RowReadable>(&self) -> Result<MetadataTable<'a, T>> {
        let start = self.offsets[T::TABLE as usize];
        let data = self.data.get(start..).ok_or(OutOfBounds)?;

        MetadataTable::new(data, self.info.clone())
    }
}
