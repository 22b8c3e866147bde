use crate::{file::io::read_le, Result};

/// Stream names accepted in a metadata root. `#-` marks uncompressed tables, which are detected
/// and reported as unsupported by the image loader.
const VALID_STREAM_NAMES: [&str; 6] = ["#Strings", "#US", "#Blob", "#GUID", "#~", "#-"];

/// A stream header inside the metadata root: offset and size relative to the root, and the name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamHeader {
    /// Offset of the stream from the start of the metadata root
    pub offset: u32,
    /// Size of the stream in bytes
    pub size: u32,
    /// Name of the stream, e.g. `#Strings`
    pub name: String,
}

impl StreamHeader {
    /// Creates a header for a stream emitted by the image writer.
    #[must_use]
    pub fn new(name: &str, offset: u32, size: u32) -> StreamHeader {
        StreamHeader {
            offset,
            size,
            name: name.to_string(),
        }
    }

    /// Parses a stream header from the start of `data`.
    ///
    /// # Errors
    /// Returns an error if `data` is too short or the stream name is unknown.
    pub fn from(data: &[u8]) -> Result<StreamHeader> {
        if data.len() < 9 {
            return Err(out_of_bounds_error!());
        }

        let name = data[8..]
            .iter()
            .take(32)
            .take_while(|byte| **byte != 0)
            .map(|byte| char::from(*byte))
            .collect::<String>();

        if !VALID_STREAM_NAMES.contains(&name.as_str()) {
            return Err(malformed_error!("Invalid stream header name - {}", name));
        }

        Ok(StreamHeader {
            offset: read_le::<u32>(data)?,
            size: read_le::<u32>(&data[4..])?,
            name,
        })
    }

    /// Size of the serialized header: 8 bytes plus the name, NUL-terminated and padded to 4.
    #[must_use]
    pub fn header_size(&self) -> usize {
        8 + ((self.name.len() + 1 + 3) & !3)
    }

    /// Appends the serialized header to `out`.
    pub fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.offset.to_le_bytes());
        out.extend_from_slice(&self.size.to_le_bytes());

        let mut name = self.name.as_bytes().to_vec();
        name.resize(self.header_size() - 8, 0);
        out.extend_from_slice(&name);
    }
}
