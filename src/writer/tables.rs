//! Serialization of the `#~` tables stream.

use strum::IntoEnumIterator;

use crate::{
    file::io::write_le_at,
    metadata::tables::{TableId, TableInfo, TableRow, TABLE_COUNT},
    writer::heaps::align4,
    Result,
};

/// Tables whose rows are emitted in key order and flagged in the `sorted` mask, the same set
/// compilers flag
pub const SORTED_TABLES: u64 = 0x0000_1600_3301_FA00;

/// Collects rows per table and encodes them with index widths derived from the final row counts.
#[derive(Debug)]
pub struct TablesStreamBuilder {
    rows: Vec<Vec<Vec<u32>>>,
}

impl Default for TablesStreamBuilder {
    fn default() -> Self {
        TablesStreamBuilder {
            rows: vec![Vec::new(); TABLE_COUNT],
        }
    }
}

impl TablesStreamBuilder {
    /// Appends `row` to its table. Rows must be pushed in row order.
    ///
    /// # Errors
    /// Returns an error if the row holds a coded index its column cannot address.
    pub fn push<T: TableRow>(&mut self, row: &T) -> Result<()> {
        let values = row.values()?;
        self.rows[T::TABLE as usize].push(values);
        Ok(())
    }

    /// Number of rows pushed to `table`.
    #[must_use]
    pub fn row_count(&self, table: TableId) -> u32 {
        u32::try_from(self.rows[table as usize].len()).unwrap_or(u32::MAX)
    }

    /// Encodes the stream, padded to a multiple of four.
    ///
    /// # Errors
    /// Returns an error if a value does not fit its column.
    pub fn encode(&self, heap_size_flags: u8) -> Result<Vec<u8>> {
        let row_counts: Vec<u32> = TableId::iter().map(|id| self.row_count(id)).collect();
        let info = TableInfo::new(&row_counts, heap_size_flags);

        let mut valid = 0_u64;
        for table in TableId::iter() {
            if row_counts[table as usize] > 0 {
                valid |= 1 << table as usize;
            }
        }

        let header_size = 24 + 4 * valid.count_ones() as usize;
        let body_size: usize = TableId::iter()
            .map(|table| row_counts[table as usize] as usize * info.row_size(table))
            .sum();

        let mut data = vec![0_u8; header_size + body_size];
        let mut offset = 0;
        write_le_at::<u32>(&mut data, &mut offset, 0)?;
        write_le_at::<u8>(&mut data, &mut offset, 2)?;
        write_le_at::<u8>(&mut data, &mut offset, 0)?;
        write_le_at::<u8>(&mut data, &mut offset, heap_size_flags)?;
        write_le_at::<u8>(&mut data, &mut offset, 1)?;
        write_le_at::<u64>(&mut data, &mut offset, valid)?;
        write_le_at::<u64>(&mut data, &mut offset, SORTED_TABLES & valid)?;
        for table in TableId::iter() {
            if valid & (1 << table as usize) != 0 {
                write_le_at::<u32>(&mut data, &mut offset, row_counts[table as usize])?;
            }
        }

        for table in TableId::iter() {
            for values in &self.rows[table as usize] {
                info.write_row(table, values, &mut data, &mut offset)?;
            }
        }

        align4(&mut data);
        Ok(data)
    }
}
