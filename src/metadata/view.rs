use crate::{
    file::File,
    metadata::{
        cor20header::Cor20Header,
        identity::{AssemblyIdentity, AssemblyVersion, StrongName},
        root::Root,
        streams::{Blob, Guid, Strings, TablesHeader},
        tables::{AssemblyRaw, TableId},
    },
    Error::NotSupported,
    Result,
};

/// Borrowed view over the metadata of a loaded [`File`]: the CLI header, the metadata root, the
/// tables stream and the heaps.
///
/// Besides the parsed views, the view records the file offset of the tables stream so that rows
/// can be patched in a copy of the image.
pub struct MetadataView<'a> {
    /// The CLI header
    pub cor20: Cor20Header,
    /// The metadata root
    pub root: Root,
    /// The `#~` stream
    pub tables: TablesHeader<'a>,
    /// The `#Strings` heap
    pub strings: Strings<'a>,
    /// The `#Blob` heap, if present
    pub blobs: Option<Blob<'a>>,
    /// The `#GUID` heap, if present
    pub guids: Option<Guid<'a>>,
    /// File offset of the `#~` stream
    pub tables_offset: usize,
}

impl<'a> MetadataView<'a> {
    /// Locates and parses the metadata of `file`.
    ///
    /// # Errors
    /// Returns an error if the CLI header, the root or a stream is malformed, or
    /// [`crate::Error::NotSupported`] for uncompressed (`#-`) tables.
    pub fn new(file: &'a File) -> Result<MetadataView<'a>> {
        let (clr_rva, clr_size) = file.clr();
        let clr_offset = file.rva_to_offset(clr_rva)?;
        let cor20 = Cor20Header::read(file.data_slice(clr_offset, clr_size.max(72))?)?;

        let meta_offset = file.rva_to_offset(cor20.meta_data_rva as usize)?;
        let meta_data = file.data_slice(meta_offset, cor20.meta_data_size as usize)?;
        let root = Root::read(meta_data)?;

        if root.stream("#-").is_some() {
            return Err(NotSupported(
                "Uncompressed metadata tables (#-) are not supported".to_string(),
            ));
        }

        let stream = |name: &str| -> Option<&'a [u8]> {
            root.stream(name).map(|header| {
                &meta_data[header.offset as usize..(header.offset + header.size) as usize]
            })
        };

        let Some(tables_data) = stream("#~") else {
            return Err(malformed_error!("Metadata has no #~ stream"));
        };
        let Some(strings_data) = stream("#Strings") else {
            return Err(malformed_error!("Metadata has no #Strings stream"));
        };

        let tables = TablesHeader::from(tables_data)?;
        let strings = Strings::from(strings_data)?;
        let blobs = stream("#Blob").map(Blob::from).transpose()?;
        let guids = stream("#GUID").map(Guid::from).transpose()?;

        let tables_offset = meta_offset
            + root
                .stream("#~")
                .map(|header| header.offset as usize)
                .unwrap_or_default();

        Ok(MetadataView {
            cor20,
            root,
            tables,
            strings,
            blobs,
            guids,
            tables_offset,
        })
    }

    /// Returns the blob at `index`, treating a missing heap as an error.
    ///
    /// # Errors
    /// Returns an error if the heap is missing or the index is invalid.
    pub fn blob(&self, index: u32) -> Result<&'a [u8]> {
        match &self.blobs {
            Some(blobs) => blobs.get(index as usize),
            None if index == 0 => Ok(&[]),
            None => Err(malformed_error!("Metadata has no #Blob stream")),
        }
    }

    /// File offset of row `rid` of `table`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the row does not exist.
    pub fn row_file_offset(&self, table: TableId, rid: u32) -> Result<usize> {
        Ok(self.tables_offset + self.tables.row_offset(table, rid)?)
    }

    /// The identity from the `Assembly` table, `None` for a bare module.
    ///
    /// # Errors
    /// Returns an error if the row or one of its heap references is invalid.
    pub fn assembly_identity(&self) -> Result<Option<AssemblyIdentity>> {
        if !self.tables.has_table(TableId::Assembly) {
            return Ok(None);
        }

        let row = self.tables.row::<AssemblyRaw>(1)?;
        let culture = self.strings.get(row.culture as usize)?;

        Ok(Some(AssemblyIdentity {
            name: self.strings.get(row.name as usize)?.to_string(),
            version: AssemblyVersion::new(
                row.major_version,
                row.minor_version,
                row.build_number,
                row.revision_number,
            ),
            culture: (!culture.is_empty()).then(|| culture.to_string()),
            // The Assembly table always stores the full key
            strong_name: StrongName::from_blob(self.blob(row.public_key)?, true)?,
        }))
    }
}
