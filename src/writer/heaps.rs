//! Builders for the metadata heaps of a generated module.
//!
//! Every builder deduplicates its entries and hands out the heap index of the first occurrence.
//! Index 0 is reserved for the empty value in `#Strings`, `#Blob` and `#US`; `#GUID` indices are
//! 1-based and 0 means "no GUID".

use std::collections::HashMap;

use crate::{metadata::signatures::write_compressed_uint, Result};

/// Pads `data` with zero bytes to a multiple of four.
pub(crate) fn align4(data: &mut Vec<u8>) {
    while data.len() % 4 != 0 {
        data.push(0);
    }
}

/// `#Strings` heap builder.
#[derive(Debug)]
pub struct StringHeapBuilder {
    data: Vec<u8>,
    index: HashMap<String, u32>,
}

impl Default for StringHeapBuilder {
    fn default() -> Self {
        StringHeapBuilder {
            data: vec![0],
            index: HashMap::new(),
        }
    }
}

impl StringHeapBuilder {
    /// Adds `value` and returns its heap index; the empty string is index 0.
    ///
    /// # Errors
    /// Returns a malformed error if `value` contains a NUL character.
    pub fn add(&mut self, value: &str) -> Result<u32> {
        if value.is_empty() {
            return Ok(0);
        }
        if value.contains('\0') {
            return Err(malformed_error!("String '{}' contains NUL", value.escape_debug()));
        }
        if let Some(index) = self.index.get(value) {
            return Ok(*index);
        }

        let index = heap_index(self.data.len())?;
        self.data.extend_from_slice(value.as_bytes());
        self.data.push(0);
        self.index.insert(value.to_string(), index);
        Ok(index)
    }

    /// Unpadded heap size.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether only the mandatory empty entry exists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.len() == 1
    }

    /// The heap bytes padded to a multiple of four.
    #[must_use]
    pub fn finish(&self) -> Vec<u8> {
        let mut data = self.data.clone();
        align4(&mut data);
        data
    }
}

/// `#Blob` heap builder.
#[derive(Debug)]
pub struct BlobHeapBuilder {
    data: Vec<u8>,
    index: HashMap<Vec<u8>, u32>,
}

impl Default for BlobHeapBuilder {
    fn default() -> Self {
        BlobHeapBuilder {
            data: vec![0],
            index: HashMap::new(),
        }
    }
}

impl BlobHeapBuilder {
    /// Adds `value` with its compressed length prefix and returns its heap index; the empty blob
    /// is index 0.
    ///
    /// # Errors
    /// Returns an error if the blob is too large for a compressed length.
    pub fn add(&mut self, value: &[u8]) -> Result<u32> {
        if value.is_empty() {
            return Ok(0);
        }
        if let Some(index) = self.index.get(value) {
            return Ok(*index);
        }

        let index = heap_index(self.data.len())?;
        let length = u32::try_from(value.len())
            .map_err(|_| malformed_error!("Blob of {} bytes is too large", value.len()))?;
        write_compressed_uint(length, &mut self.data)?;
        self.data.extend_from_slice(value);
        self.index.insert(value.to_vec(), index);
        Ok(index)
    }

    /// Unpadded heap size.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether only the mandatory empty entry exists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.len() == 1
    }

    /// The heap bytes padded to a multiple of four.
    #[must_use]
    pub fn finish(&self) -> Vec<u8> {
        let mut data = self.data.clone();
        align4(&mut data);
        data
    }
}

/// `#GUID` heap builder.
#[derive(Debug, Default)]
pub struct GuidHeapBuilder {
    guids: Vec<[u8; 16]>,
}

impl GuidHeapBuilder {
    /// Adds `guid` and returns its 1-based index.
    ///
    /// # Errors
    /// Returns a malformed error if the heap index overflows.
    pub fn add(&mut self, guid: [u8; 16]) -> Result<u32> {
        if let Some(position) = self.guids.iter().position(|existing| *existing == guid) {
            return heap_index(position + 1);
        }

        self.guids.push(guid);
        heap_index(self.guids.len())
    }

    /// Number of GUIDs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.guids.len()
    }

    /// Whether the heap is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.guids.is_empty()
    }

    /// The heap bytes.
    #[must_use]
    pub fn finish(&self) -> Vec<u8> {
        self.guids.concat()
    }
}

/// `#US` heap builder for string literals used by `ldstr`.
#[derive(Debug)]
pub struct UserStringHeapBuilder {
    data: Vec<u8>,
    index: HashMap<String, u32>,
}

impl Default for UserStringHeapBuilder {
    fn default() -> Self {
        UserStringHeapBuilder {
            data: vec![0],
            index: HashMap::new(),
        }
    }
}

impl UserStringHeapBuilder {
    /// Adds `value` as UTF-16 with its trailing flag byte and returns the heap index.
    ///
    /// # Errors
    /// Returns an error if the encoded string is too large.
    pub fn add(&mut self, value: &str) -> Result<u32> {
        if let Some(index) = self.index.get(value) {
            return Ok(*index);
        }

        let units: Vec<u16> = value.encode_utf16().collect();
        // Set when any character needs more than an 8-bit, non-control representation
        let has_special = units.iter().any(|unit| {
            *unit >= 0x7F
                || matches!(*unit, 0x01..=0x08 | 0x0E..=0x1F | 0x27 | 0x2D)
        });

        let index = heap_index(self.data.len())?;
        let length = u32::try_from(units.len() * 2 + 1)
            .map_err(|_| malformed_error!("User string of {} units is too large", units.len()))?;
        write_compressed_uint(length, &mut self.data)?;
        for unit in units {
            self.data.extend_from_slice(&unit.to_le_bytes());
        }
        self.data.push(u8::from(has_special));
        self.index.insert(value.to_string(), index);
        Ok(index)
    }

    /// Whether no string was added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.len() == 1
    }

    /// The heap bytes padded to a multiple of four.
    #[must_use]
    pub fn finish(&self) -> Vec<u8> {
        let mut data = self.data.clone();
        align4(&mut data);
        data
    }
}

fn heap_index(position: usize) -> Result<u32> {
    u32::try_from(position).map_err(|_| malformed_error!("Heap index {} overflows", position))
}
