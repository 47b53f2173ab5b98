use std::sync::Arc;

use strum::{EnumCount, IntoEnumIterator};

use super::{CodedIndexType, Column, TableId};

/// Row count and index width of one table.
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub struct TableRowInfo {
    /// Number of rows
    pub rows: u32,
    /// Bits needed to address every row
    pub bits: u8,
    /// Whether simple indexes into this table take four bytes
    pub is_large: bool,
}

impl TableRowInfo {
    /// Width information for a table with `rows` rows.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn new(rows: u32) -> Self {
        TableRowInfo {
            rows,
            bits: (u32::BITS - rows.leading_zeros()) as u8,
            is_large: rows > u32::from(u16::MAX),
        }
    }
}

/// Row counts, heap index widths and derived column sizes of a tables stream.
#[derive(Clone, Debug, Default)]
pub struct TableInfo {
    rows: Vec<TableRowInfo>,
    coded_index_bytes: Vec<u8>,
    large_str: bool,
    large_guid: bool,
    large_blob: bool,
}

/// Shared handle to a [`TableInfo`].
pub type TableInfoRef = Arc<TableInfo>;

impl TableInfo {
    /// Build the size information from row counts and the `HeapSizes` flags.
    #[must_use]
    pub fn new(row_counts: &[(TableId, u32)], heap_sizes: u8) -> Self {
        let mut rows = vec![TableRowInfo::default(); TableId::COUNT];
        for &(table, count) in row_counts {
            rows[table as usize] = TableRowInfo::new(count);
        }

        let mut info = TableInfo {
            rows,
            coded_index_bytes: vec![2; CodedIndexType::COUNT],
            large_str: heap_sizes & 0x01 != 0,
            large_guid: heap_sizes & 0x02 != 0,
            large_blob: heap_sizes & 0x04 != 0,
        };

        for kind in CodedIndexType::iter() {
            let max_bits = kind
                .tags()
                .iter()
                .flatten()
                .map(|table| info.rows[*table as usize].bits)
                .max()
                .unwrap_or(0);

            info.coded_index_bytes[kind as usize] = if max_bits + kind.tag_bits() > 16 {
                4
            } else {
                2
            };
        }

        info
    }

    /// Row information of `table`.
    #[must_use]
    pub fn get(&self, table: TableId) -> &TableRowInfo {
        &self.rows[table as usize]
    }

    /// Number of rows in `table`.
    #[must_use]
    pub fn rows(&self, table: TableId) -> u32 {
        self.rows[table as usize].rows
    }

    /// Width of a `#Strings` index.
    #[must_use]
    pub fn str_bytes(&self) -> u8 {
        if self.large_str {
            4
        } else {
            2
        }
    }

    /// Width of a `#GUID` index.
    #[must_use]
    pub fn guid_bytes(&self) -> u8 {
        if self.large_guid {
            4
        } else {
            2
        }
    }

    /// Width of a `#Blob` index.
    #[must_use]
    pub fn blob_bytes(&self) -> u8 {
        if self.large_blob {
            4
        } else {
            2
        }
    }

    /// Width of a simple index into `table`.
    #[must_use]
    pub fn table_index_bytes(&self, table: TableId) -> u8 {
        if self.rows[table as usize].is_large {
            4
        } else {
            2
        }
    }

    /// Width of a coded index of the given kind.
    #[must_use]
    pub fn coded_index_bytes(&self, kind: CodedIndexType) -> u8 {
        self.coded_index_bytes[kind as usize]
    }

    /// Width of one column.
    #[must_use]
    pub fn column_bytes(&self, column: Column) -> u8 {
        match column {
            Column::U16 => 2,
            Column::U32 => 4,
            Column::Str => self.str_bytes(),
            Column::Guid => self.guid_bytes(),
            Column::Blob => self.blob_bytes(),
            Column::Table(table) => self.table_index_bytes(table),
            Column::Coded(kind) => self.coded_index_bytes(kind),
        }
    }

    /// Size of one row of `table` in bytes.
    #[must_use]
    pub fn row_size(&self, table: TableId) -> u32 {
        table
            .columns()
            .iter()
            .map(|column| u32::from(self.column_bytes(*column)))
            .sum()
    }
}
