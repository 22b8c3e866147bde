use strum::IntoEnumIterator;

use crate::{
    file::io::{read_le, read_le_at},
    metadata::tables::{TableId, TableInfo, TableRow, TABLE_COUNT},
    Error::NotSupported,
    Result,
};

/// `HeapSizes` bit signalling 4 bytes of extra data after the row counts
const EXTRA_DATA: u8 = 0x40;

/// The `#~` stream: tables header, row counts and the table data that follows.
///
/// Row offsets are computed once from the complete column schema, so any row of any table can be
/// decoded, and its byte position is known for in-place patching.
///
/// # Examples
///
/// ```rust,no_run
/// use bephookgen::metadata::{streams::TablesHeader, tables::{TableId, TypeDefRaw}};
///
/// # fn example(stream: &[u8]) -> bephookgen::Result<()> {
/// let tables = TablesHeader::from(stream)?;
/// for row in tables.rows::<TypeDefRaw>() {
///     let typedef = row?;
///     println!("TypeDef {} flags 0x{:08X}", typedef.rid, typedef.flags);
/// }
/// println!("{} methods", tables.row_count(TableId::MethodDef));
/// # Ok(())
/// # }
/// ```
pub struct TablesHeader<'a> {
    /// Reserved, always 0
    pub reserved: u32,
    /// Major version of the table schema, 2
    pub major_version: u8,
    /// Minor version of the table schema, 0
    pub minor_version: u8,
    /// `HeapSizes` flags
    pub heap_sizes: u8,
    /// Bit vector of present tables
    pub valid: u64,
    /// Bit vector of sorted tables
    pub sorted: u64,
    /// Sizing context derived from the row counts and heap sizes
    pub info: TableInfo,
    data: &'a [u8],
    table_offsets: Vec<usize>,
}

impl<'a> TablesHeader<'a> {
    /// Parses the tables stream.
    ///
    /// # Errors
    /// Returns an error if the stream is truncated, or [`crate::Error::NotSupported`] if it
    /// declares tables outside of the ECMA-335 set (e.g. portable PDB tables).
    pub fn from(data: &'a [u8]) -> Result<TablesHeader<'a>> {
        if data.len() < 24 {
            return Err(out_of_bounds_error!());
        }

        let valid = read_le::<u64>(&data[8..])?;
        if valid == 0 {
            return Err(malformed_error!("No valid rows in any of the tables"));
        }
        if valid >> TABLE_COUNT != 0 {
            return Err(NotSupported(format!(
                "Unknown metadata tables present - valid mask 0x{:016X}",
                valid
            )));
        }

        let heap_sizes = read_le::<u8>(&data[6..])?;

        let mut row_counts = vec![0_u32; TABLE_COUNT];
        let mut offset = 24_usize;
        for table_id in TableId::iter() {
            if valid & (1 << table_id as usize) == 0 {
                continue;
            }

            row_counts[table_id as usize] = read_le_at::<u32>(data, &mut offset)?;
        }

        if heap_sizes & EXTRA_DATA != 0 {
            offset += 4;
        }

        let info = TableInfo::new(&row_counts, heap_sizes);

        let mut table_offsets = vec![0_usize; TABLE_COUNT];
        for table_id in TableId::iter() {
            table_offsets[table_id as usize] = offset;

            let table_size = (info.rows(table_id) as usize)
                .checked_mul(info.row_size(table_id))
                .ok_or_else(|| malformed_error!("Table {:?} size overflows", table_id))?;
            offset = offset
                .checked_add(table_size)
                .ok_or_else(|| malformed_error!("Table {:?} size overflows", table_id))?;
        }

        if offset > data.len() {
            return Err(out_of_bounds_error!());
        }

        Ok(TablesHeader {
            reserved: read_le::<u32>(data)?,
            major_version: read_le::<u8>(&data[4..])?,
            minor_version: read_le::<u8>(&data[5..])?,
            heap_sizes,
            valid,
            sorted: read_le::<u64>(&data[16..])?,
            info,
            data,
            table_offsets,
        })
    }

    /// Number of rows in `table`.
    #[must_use]
    pub fn row_count(&self, table: TableId) -> u32 {
        self.info.rows(table)
    }

    /// Whether `table` is present and non-empty.
    #[must_use]
    pub fn has_table(&self, table: TableId) -> bool {
        self.row_count(table) > 0
    }

    /// Offset of row `rid` of `table` relative to the start of the stream.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `rid` is 0 or past the last row.
    pub fn row_offset(&self, table: TableId, rid: u32) -> Result<usize> {
        if rid == 0 || rid > self.row_count(table) {
            return Err(out_of_bounds_error!());
        }

        Ok(self.table_offsets[table as usize] + (rid as usize - 1) * self.info.row_size(table))
    }

    /// Raw column values of row `rid` of `table`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the row does not exist.
    pub fn values(&self, table: TableId, rid: u32) -> Result<Vec<u32>> {
        let mut offset = self.row_offset(table, rid)?;
        self.info.read_row(table, self.data, &mut offset)
    }

    /// Decodes row `rid` as `T`.
    ///
    /// # Errors
    /// Returns an error if the row does not exist or cannot be decoded.
    pub fn row<T: TableRow>(&self, rid: u32) -> Result<T> {
        T::from_values(rid, &self.values(T::TABLE, rid)?)
    }

    /// Iterates all rows of the table of `T` in order.
    pub fn rows<T: TableRow>(&self) -> impl Iterator<Item = Result<T>> + '_ {
        (1..=self.row_count(T::TABLE)).map(|rid| self.row::<T>(rid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::tables::{FieldRaw, TypeDefRaw};

    fn stream() -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&0_u32.to_le_bytes());
        data.extend_from_slice(&[2, 0, 0, 1]);
        let valid: u64 = (1 << 0x02) | (1 << 0x04);
        data.extend_from_slice(&valid.to_le_bytes());
        data.extend_from_slice(&0_u64.to_le_bytes());
        data.extend_from_slice(&2_u32.to_le_bytes());
        data.extend_from_slice(&1_u32.to_le_bytes());

        // TypeDef: Flags, Name, Namespace, Extends, FieldList, MethodList
        for row in [[0u16, 0, 0, 0, 1, 1], [0, 0, 0, 0, 1, 1]] {
            data.extend_from_slice(&u32::from(row[0]).to_le_bytes());
            for value in &row[1..] {
                data.extend_from_slice(&value.to_le_bytes());
            }
        }
        // second row: NotPublic -> Public, name 0x10
        data[24 + 8 + 14] = 0x01;
        data[24 + 8 + 14 + 4] = 0x10;

        // Field: Flags, Name, Signature
        data.extend_from_slice(&0x0001_u16.to_le_bytes());
        data.extend_from_slice(&0x0020_u16.to_le_bytes());
        data.extend_from_slice(&0x0001_u16.to_le_bytes());
        data
    }

    #[test]
    fn crafted() {
        let data = stream();
        let tables = TablesHeader::from(&data).unwrap();

        assert_eq!(tables.major_version, 2);
        assert_eq!(tables.row_count(TableId::TypeDef), 2);
        assert_eq!(tables.row_count(TableId::Field), 1);
        assert!(!tables.has_table(TableId::MethodDef));

        let second = tables.row::<TypeDefRaw>(2).unwrap();
        assert_eq!(second.flags, 1);
        assert_eq!(second.type_name, 0x10);

        let field = tables.rows::<FieldRaw>().next().unwrap().unwrap();
        assert_eq!(field.flags, 1);
        assert_eq!(field.name, 0x20);

        assert_eq!(tables.row_offset(TableId::Field, 1).unwrap(), 32 + 28);
        assert!(tables.row_offset(TableId::Field, 2).is_err());
        assert!(tables.row_offset(TableId::Field, 0).is_err());
    }

    #[test]
    fn truncated() {
        let data = stream();
        assert!(TablesHeader::from(&data[..data.len() - 1]).is_err());
    }

    #[test]
    fn unknown_tables() {
        let mut data = stream();
        data[8 + 6] = 0x80;
        assert!(matches!(TablesHeader::from(&data), Err(NotSupported(_))));
    }
}
