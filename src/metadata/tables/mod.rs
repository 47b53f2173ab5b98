//! ECMA-335 metadata tables.
//!
//! [`TableId`] names the tables, [`TableId::columns`] describes their layout and
//! [`TableInfo`] turns row counts and heap flags into concrete column widths. Typed rows for
//! the tables the analysis needs implement [`RowReadable`] and are read through
//! [`MetadataTable`].

mod codedindex;
mod rows;
mod tableid;
mod tableinfo;

use std::marker::PhantomData;

pub use codedindex::{CodedIndex, CodedIndexType};
pub use rows::{
    ConstantRaw, FieldPtrRaw, FieldRaw, ManifestResourceRaw, MemberRefRaw, MethodDefRaw,
    MethodPtrRaw, MethodSpecRaw, ModuleRaw, NestedClassRaw, TypeDefRaw, TypeRefRaw,
};
pub use tableid::TableId;
pub use tableinfo::{TableInfo, TableInfoRef, TableRowInfo};

use crate::{
    file::io::{read_le_at, read_le_at_dyn},
    Error::OutOfBounds,
    Result,
};

/// Kinds of column a table row is made of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    /// Two-byte constant
    U16,
    /// Four-byte constant
    U32,
    /// Index into `#Strings`
    Str,
    /// Index into `#GUID`
    Guid,
    /// Index into `#Blob`
    Blob,
    /// Simple index into another table
    Table(TableId),
    /// Coded index
    Coded(CodedIndexType),
}

/// A typed row that can be built from the raw column values of its table.
pub trait RowReadable: Sized {
    /// The table this row belongs to.
    const TABLE: TableId;

    /// Build the row from its 1-based row id and its column values in schema order.
    ///
    /// # Errors
    /// Returns an error if a coded index column carries an invalid tag.
    fn from_columns(rid: u32, columns: &[u32]) -> Result<Self>;
}

/// A view over the rows of one table.
pub struct MetadataTable<'a, T> {
    data: &'a [u8],
    row_count: u32,
    row_size: u32,
    info: TableInfoRef,
    _row: PhantomData<T>,
}

impl<'a, T: RowReadable> MetadataTable<'a, T> {
    /// Create a view over `data`, which starts with the first row of `T::TABLE`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `data` is shorter than the table.
    pub fn new(data: &'a [u8], info: TableInfoRef) -> Result<Self> {
        let row_count = info.rows(T::TABLE);
        let row_size = info.row_size(T::TABLE);

        let size = u64::from(row_count) * u64::from(row_size);
        if size > data.len() as u64 {
            return Err(OutOfBounds);
        }

        Ok(MetadataTable {
            data,
            row_count,
            row_size,
            info,
            _row: PhantomData,
        })
    }

    /// Number of rows.
    #[must_use]
    pub fn row_count(&self) -> u32 {
        self.row_count
    }

    /// Size of one row in bytes.
    #[must_use]
    pub fn row_size(&self) -> u32 {
        self.row_size
    }

    /// Read the row with the 1-based id `rid`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] for ids outside the table.
    pub fn get(&self, rid: u32) -> Result<T> {
        if rid == 0 || rid > self.row_count {
            return Err(OutOfBounds);
        }

        let mut offset = (rid as usize - 1) * self.row_size as usize;
        let mut columns = [0_u32; 9];
        let schema = T::TABLE.columns();

        for (slot, column) in columns.iter_mut().zip(schema) {
            *slot = match column {
                Column::U16 => u32::from(read_le_at::<u16>(self.data, &mut offset)?),
                Column::U32 => read_le_at::<u32>(self.data, &mut offset)?,
                other => {
                    read_le_at_dyn(self.data, &mut offset, self.info.column_bytes(*other) == 4)?
                }
            };
        }

        T::from_columns(rid, &columns[..schema.len()])
    }

    /// Iterate all rows in order.
    pub fn iter(&self) -> impl Iterator<Item = Result<T>> + '_ {
        (1..=self.row_count).map(move |rid| self.get(rid))
    }
}
