//! PE file abstraction for .NET assemblies.
//!
//! This module wraps the [`goblin`] PE parser behind a [`File`] type that owns its backing bytes,
//! either memory-mapped from disk or held in memory, and exposes the pieces the metadata layer
//! needs: the CLR runtime header directory, the section table and RVA ↔ file-offset translation.
//!
//! It also hosts the byte-level helpers used throughout the crate ([`io`], [`parser`]) and the
//! [`output::Output`] sink that writes finished images to disk atomically.

pub mod io;
pub mod output;
pub mod parser;

mod memory;
mod physical;

use std::path::Path;

use goblin::pe::{section_table::SectionTable, PE};
use memory::Memory;
use ouroboros::self_referencing;
use physical::Physical;

use crate::{
    Error::{Empty, GoblinErr},
    Result,
};

/// Backend trait for file data sources.
///
/// Abstracts over the source of PE data so a [`File`] can be backed by a memory map or an owned
/// buffer with the same interface.
pub trait Backend: Send + Sync {
    /// Returns a bounds-checked slice of the data.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the requested range is out of bounds.
    fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]>;

    /// Returns the entire data buffer.
    fn data(&self) -> &[u8];

    /// Returns the total length of the data buffer.
    fn len(&self) -> usize;
}

#[self_referencing]
/// A loaded PE file containing .NET metadata.
///
/// Loading validates that the image is a PE with an optional header and a CLR runtime header
/// directory; anything else is rejected before the metadata layer sees it.
///
/// # Examples
///
/// ```rust,no_run
/// use bephookgen::File;
/// use std::path::Path;
///
/// let file = File::from_file(Path::new("valheim_Data/Managed/assembly_valheim.dll"))?;
/// let (clr_rva, clr_size) = file.clr();
/// let clr_offset = file.rva_to_offset(clr_rva)?;
/// println!("CLR header at 0x{clr_offset:x} ({clr_size} bytes)");
/// # Ok::<(), bephookgen::Error>(())
/// ```
pub struct File {
    /// The underlying data source (memory or file).
    data: Box<dyn Backend>,
    /// The parsed PE structure, referencing the data.
    #[borrows(data)]
    #[not_covariant]
    pe: PE<'this>,
}

impl File {
    /// Loads and memory-maps a PE file from disk.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, is empty, is not a PE image or has no CLR
    /// runtime header.
    pub fn from_file(file: &Path) -> Result<File> {
        let input = Physical::new(file)?;

        Self::load(input)
    }

    /// Loads a PE file from an owned buffer.
    ///
    /// # Errors
    /// Returns an error if the buffer is empty, is not a PE image or has no CLR runtime header.
    pub fn from_mem(data: Vec<u8>) -> Result<File> {
        let input = Memory::new(data);

        Self::load(input)
    }

    fn load<T: Backend + 'static>(data: T) -> Result<File> {
        if data.len() == 0 {
            return Err(Empty);
        }

        let data = Box::new(data);

        File::try_new(data, |data| match PE::parse(data.data()) {
            Ok(pe) => match pe.header.optional_header.as_ref() {
                Some(optional_header) => {
                    let has_clr = optional_header
                        .data_directories
                        .get_clr_runtime_header()
                        .map(|dir| dir.virtual_address != 0)
                        .unwrap_or(false);
                    if has_clr {
                        Ok(pe)
                    } else {
                        Err(malformed_error!(
                            "File does not have a CLR runtime header directory"
                        ))
                    }
                }
                None => Err(malformed_error!("File does not have an OptionalHeader")),
            },
            Err(error) => Err(GoblinErr(error)),
        })
    }

    /// Total size of the image in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.with_data(|data| data.len())
    }

    /// Whether the image is empty (never true for a successfully loaded file).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The raw image bytes.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.with_data(|data| data.data())
    }

    /// A bounds-checked slice of the image.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the range exceeds the image.
    pub fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        self.with_data(|data| data.data_slice(offset, len))
    }

    /// RVA and size of the CLR runtime header directory.
    #[must_use]
    pub fn clr(&self) -> (usize, usize) {
        self.with_pe(|pe| {
            pe.header
                .optional_header
                .as_ref()
                .and_then(|optional_header| {
                    optional_header
                        .data_directories
                        .get_clr_runtime_header()
                        .map(|dir| (dir.virtual_address as usize, dir.size as usize))
                })
                // Presence was verified during load
                .unwrap_or((0, 0))
        })
    }

    /// Iterates the section headers.
    pub fn sections(&self) -> impl Iterator<Item = &SectionTable> {
        self.with_pe(|pe| pe.sections.iter())
    }

    /// Translates a relative virtual address into a file offset.
    ///
    /// # Errors
    /// Returns a malformed error if no section contains `rva`.
    pub fn rva_to_offset(&self, rva: usize) -> Result<usize> {
        let rva_u32 =
            u32::try_from(rva).map_err(|_| malformed_error!("RVA too large to fit in u32: {}", rva))?;

        self.with_pe(|pe| {
            for section in &pe.sections {
                let extent = section.virtual_size.max(section.size_of_raw_data);
                let Some(section_max) = section.virtual_address.checked_add(extent) else {
                    return Err(malformed_error!(
                        "Section malformed, causing integer overflow - {} + {}",
                        section.virtual_address,
                        extent
                    ));
                };

                if section.virtual_address <= rva_u32 && rva_u32 < section_max {
                    return Ok((rva - section.virtual_address as usize)
                        + section.pointer_to_raw_data as usize);
                }
            }

            Err(malformed_error!(
                "RVA could not be converted to offset - {}",
                rva
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_buffer() {
        assert!(matches!(File::from_mem(Vec::new()), Err(Empty)));
    }

    #[test]
    fn not_a_pe() {
        let data = vec![0xCC_u8; 512];
        assert!(File::from_mem(data).is_err());
    }

    #[test]
    fn generated_image() {
        let image = crate::test::minimal_module_bytes();
        let file = File::from_mem(image).unwrap();

        let (clr_rva, clr_size) = file.clr();
        assert_ne!(clr_rva, 0);
        assert_eq!(clr_size, 72);

        let offset = file.rva_to_offset(clr_rva).unwrap();
        let header = file.data_slice(offset, 4).unwrap();
        assert_eq!(header, &[72, 0, 0, 0]);

        assert!(file.rva_to_offset(0x7FFF_0000).is_err());
        assert_eq!(file.sections().count(), 1);
    }
}
