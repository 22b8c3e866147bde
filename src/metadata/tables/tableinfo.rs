use strum::{EnumCount, IntoEnumIterator};

use crate::{
    file::io::{read_le_at, read_le_at_dyn, write_le_at, write_le_at_dyn},
    metadata::tables::{CodedIndexType, Column, TableId},
    Result,
};

/// Row count of a single table together with the derived index width.
#[derive(Clone, Copy, Default, PartialEq, Debug)]
pub struct TableRowInfo {
    /// Number of rows in the table
    pub rows: u32,
    /// Whether simple indices into this table need 4 bytes
    pub is_large: bool,
}

impl TableRowInfo {
    /// Creates the info for a table with `rows` rows.
    #[must_use]
    pub fn new(rows: u32) -> Self {
        Self {
            rows,
            is_large: rows > u32::from(u16::MAX),
        }
    }
}

/// Sizing context of a tables stream: row counts of all tables plus the heap-size flags.
///
/// Every column width of every table follows from this information, which is why both the table
/// reader and the table writer are driven by it.
#[derive(Clone, Debug, Default)]
pub struct TableInfo {
    rows: Vec<TableRowInfo>,
    is_large_index_str: bool,
    is_large_index_guid: bool,
    is_large_index_blob: bool,
}

impl TableInfo {
    /// Creates the sizing context from per-table row counts (indexed by [`TableId`]) and the
    /// `HeapSizes` byte of the tables header.
    #[must_use]
    pub fn new(row_counts: &[u32], heap_size_flags: u8) -> Self {
        let rows = TableId::iter()
            .map(|id| TableRowInfo::new(row_counts.get(id as usize).copied().unwrap_or(0)))
            .collect();

        TableInfo {
            rows,
            is_large_index_str: heap_size_flags & 1 == 1,
            is_large_index_guid: heap_size_flags & 2 == 2,
            is_large_index_blob: heap_size_flags & 4 == 4,
        }
    }

    /// The `HeapSizes` byte matching this context.
    #[must_use]
    pub fn heap_size_flags(&self) -> u8 {
        u8::from(self.is_large_index_str)
            | (u8::from(self.is_large_index_guid) << 1)
            | (u8::from(self.is_large_index_blob) << 2)
    }

    /// Row count of `table`.
    #[must_use]
    pub fn rows(&self, table: TableId) -> u32 {
        self.rows[table as usize].rows
    }

    /// Whether simple indices into `table` are 4 bytes wide.
    #[must_use]
    pub fn is_large(&self, table: TableId) -> bool {
        self.rows[table as usize].is_large
    }

    /// Whether `#Strings` indices are 4 bytes wide.
    #[must_use]
    pub fn is_large_str(&self) -> bool {
        self.is_large_index_str
    }

    /// Whether `#GUID` indices are 4 bytes wide.
    #[must_use]
    pub fn is_large_guid(&self) -> bool {
        self.is_large_index_guid
    }

    /// Whether `#Blob` indices are 4 bytes wide.
    #[must_use]
    pub fn is_large_blob(&self) -> bool {
        self.is_large_index_blob
    }

    /// Whether coded indices of `kind` are 4 bytes wide.
    #[must_use]
    pub fn is_large_coded(&self, kind: CodedIndexType) -> bool {
        let max_rows = kind
            .tables()
            .iter()
            .map(|table| self.rows(*table))
            .max()
            .unwrap_or(0);

        max_rows >= 1 << (16 - kind.tag_bits())
    }

    /// Width of `column` in bytes.
    #[must_use]
    pub fn column_size(&self, column: Column) -> usize {
        let is_large = match column {
            Column::Fixed(size) => return size as usize,
            Column::Str => self.is_large_index_str,
            Column::Guid => self.is_large_index_guid,
            Column::Blob => self.is_large_index_blob,
            Column::Table(table) => self.is_large(table),
            Column::Coded(kind) => self.is_large_coded(kind),
        };

        if is_large {
            4
        } else {
            2
        }
    }

    /// Size of one row of `table` in bytes.
    #[must_use]
    pub fn row_size(&self, table: TableId) -> usize {
        table
            .columns()
            .iter()
            .map(|column| self.column_size(*column))
            .sum()
    }

    /// Byte offset of column `index` within a row of `table`.
    #[must_use]
    pub fn column_offset(&self, table: TableId, index: usize) -> usize {
        table
            .columns()
            .iter()
            .take(index)
            .map(|column| self.column_size(*column))
            .sum()
    }

    /// Reads one row of `table` at `offset` into its column values.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the row runs past the end of `data`.
    pub fn read_row(&self, table: TableId, data: &[u8], offset: &mut usize) -> Result<Vec<u32>> {
        let columns = table.columns();
        let mut values = Vec::with_capacity(columns.len());

        for column in columns {
            let value = match column {
                Column::Fixed(1) => u32::from(read_le_at::<u8>(data, offset)?),
                Column::Fixed(2) => u32::from(read_le_at::<u16>(data, offset)?),
                Column::Fixed(_) => read_le_at::<u32>(data, offset)?,
                other => read_le_at_dyn(data, offset, self.column_size(*other) == 4)?,
            };
            values.push(value);
        }

        Ok(values)
    }

    /// Writes one row of `table` from its column values.
    ///
    /// # Errors
    /// Returns an error if the number of values does not match the table, a value does not fit
    /// its column, or the buffer is too small.
    pub fn write_row(
        &self,
        table: TableId,
        values: &[u32],
        data: &mut [u8],
        offset: &mut usize,
    ) -> Result<()> {
        let columns = table.columns();
        if columns.len() != values.len() {
            return Err(malformed_error!(
                "{:?} row expects {} columns, got {}",
                table,
                columns.len(),
                values.len()
            ));
        }

        for (column, value) in columns.iter().zip(values) {
            match column {
                Column::Fixed(1) => write_le_at::<u8>(data, offset, narrow(*value)?)?,
                Column::Fixed(2) => write_le_at::<u16>(data, offset, narrow(*value)?)?,
                Column::Fixed(_) => write_le_at::<u32>(data, offset, *value)?,
                other => write_le_at_dyn(data, offset, *value, self.column_size(*other) == 4)?,
            }
        }

        Ok(())
    }
}

fn narrow<T: TryFrom<u32>>(value: u32) -> Result<T> {
    T::try_from(value).map_err(|_| malformed_error!("Value {} does not fit its column", value))
}

/// Number of tables known to the schema.
pub const TABLE_COUNT: usize = TableId::COUNT;
