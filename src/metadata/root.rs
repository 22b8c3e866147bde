//! Metadata root (`BSJB` header, ECMA-335 II.24.2.1).
//!
//! The root sits at the metadata RVA from the CLI header and lists the streams that follow it.
//! [`Root::read`] parses and bounds-checks it; [`Root::write`] produces the form emitted by the
//! image writer.

use crate::{
    file::io::{read_le, read_le_at},
    metadata::streams::StreamHeader,
    Result,
};

/// The magic signature of the metadata root, `BSJB`.
pub const CIL_HEADER_MAGIC: u32 = 0x424A_5342;

/// Runtime version string written into generated images.
pub const DEFAULT_RUNTIME_VERSION: &str = "v4.0.30319";

/// The metadata root header.
#[derive(Debug, Clone)]
pub struct Root {
    /// Magic signature, always `0x424A5342`
    pub signature: u32,
    /// Major version, always 1
    pub major_version: u16,
    /// Minor version, always 1
    pub minor_version: u16,
    /// Reserved, always 0
    pub reserved: u32,
    /// Length of the padded version string
    pub length: u32,
    /// Runtime version string, e.g. `v4.0.30319`
    pub version: String,
    /// Reserved, always 0
    pub flags: u16,
    /// Number of streams
    pub stream_number: u16,
    /// The stream headers, in file order
    pub stream_headers: Vec<StreamHeader>,
}

impl Root {
    /// Parses the metadata root from the start of the metadata blob.
    ///
    /// # Errors
    /// Returns an error if the magic does not match, the version string or a stream header runs
    /// past the end of `data`, or no streams are present.
    pub fn read(data: &[u8]) -> Result<Root> {
        if data.len() < 36 {
            return Err(out_of_bounds_error!());
        }

        let signature = read_le::<u32>(data)?;
        if signature != CIL_HEADER_MAGIC {
            return Err(malformed_error!(
                "CIL_HEADER_MAGIC does not match - {}",
                signature
            ));
        }

        let length = read_le_at::<u32>(data, &mut 12)?;
        let Some(version_end) = (length as usize).checked_add(16) else {
            return Err(malformed_error!(
                "Version string length causing integer overflow - {}",
                length
            ));
        };
        if version_end + 4 > data.len() {
            return Err(out_of_bounds_error!());
        }

        let version = data[16..version_end]
            .iter()
            .take_while(|byte| **byte != 0)
            .map(|byte| char::from(*byte))
            .collect::<String>();

        let flags = read_le::<u16>(&data[version_end..])?;
        let stream_number = read_le::<u16>(&data[version_end + 2..])?;
        if stream_number == 0 || stream_number > 5 {
            return Err(malformed_error!("Invalid stream count - {}", stream_number));
        }

        let mut stream_headers = Vec::with_capacity(stream_number as usize);
        let mut stream_offset = version_end + 4;
        for _ in 0..stream_number {
            if stream_offset > data.len() {
                return Err(out_of_bounds_error!());
            }

            let header = StreamHeader::from(&data[stream_offset..])?;
            match header.offset.checked_add(header.size) {
                Some(end) if end as usize <= data.len() => {}
                Some(_) => return Err(out_of_bounds_error!()),
                None => {
                    return Err(malformed_error!(
                        "Stream offset and size cause integer overflow - {} + {}",
                        header.offset,
                        header.size
                    ))
                }
            }

            stream_offset += header.header_size();
            if stream_headers
                .iter()
                .any(|existing: &StreamHeader| existing.name == header.name)
            {
                return Err(malformed_error!("Duplicate stream - {}", header.name));
            }
            stream_headers.push(header);
        }

        Ok(Root {
            signature,
            major_version: read_le::<u16>(&data[4..])?,
            minor_version: read_le::<u16>(&data[6..])?,
            reserved: read_le::<u32>(&data[8..])?,
            length,
            version,
            flags,
            stream_number,
            stream_headers,
        })
    }

    /// Creates a root for a freshly written image with the given streams.
    #[must_use]
    pub fn new(stream_headers: Vec<StreamHeader>) -> Root {
        let length = (DEFAULT_RUNTIME_VERSION.len() as u32 + 1 + 3) & !3;

        Root {
            signature: CIL_HEADER_MAGIC,
            major_version: 1,
            minor_version: 1,
            reserved: 0,
            length,
            version: DEFAULT_RUNTIME_VERSION.to_string(),
            flags: 0,
            stream_number: stream_headers.len() as u16,
            stream_headers,
        }
    }

    /// Size of the serialized root including all stream headers.
    #[must_use]
    pub fn size(&self) -> usize {
        20 + self.length as usize
            + self
                .stream_headers
                .iter()
                .map(StreamHeader::header_size)
                .sum::<usize>()
    }

    /// Appends the serialized root to `out`.
    pub fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.signature.to_le_bytes());
        out.extend_from_slice(&self.major_version.to_le_bytes());
        out.extend_from_slice(&self.minor_version.to_le_bytes());
        out.extend_from_slice(&self.reserved.to_le_bytes());
        out.extend_from_slice(&self.length.to_le_bytes());

        let mut version = self.version.as_bytes().to_vec();
        version.resize(self.length as usize, 0);
        out.extend_from_slice(&version);

        out.extend_from_slice(&self.flags.to_le_bytes());
        out.extend_from_slice(&self.stream_number.to_le_bytes());
        for header in &self.stream_headers {
            header.write(out);
        }
    }

    /// Looks up a stream header by name.
    #[must_use]
    pub fn stream(&self, name: &str) -> Option<&StreamHeader> {
        self.stream_headers.iter().find(|header| header.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crafted() {
        #[rustfmt::skip]
        let header_bytes = [
            0x42, 0x53, 0x4A, 0x42,
            0x01, 0x00,
            0x01, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0x08, 0x00, 0x00, 0x00,
            b'v', b'4', b'.', b'0', 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00,
            0x01, 0x00,

            0x24, 0x00, 0x00, 0x00, // StreamHeader
            0x04, 0x00, 0x00, 0x00,
            0x23, 0x7E, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
        ];

        let parsed_header = Root::read(&header_bytes).unwrap();

        assert_eq!(parsed_header.signature, CIL_HEADER_MAGIC);
        assert_eq!(parsed_header.length, 8);
        assert_eq!(parsed_header.version, "v4.0");
        assert_eq!(parsed_header.stream_number, 1);
        assert_eq!(parsed_header.stream_headers[0].offset, 0x24);
        assert_eq!(parsed_header.stream_headers[0].size, 0x4);
        assert_eq!(parsed_header.stream_headers[0].name, "#~");
        assert!(parsed_header.stream("#Strings").is_none());
    }

    #[test]
    fn write_read() {
        let root = Root::new(vec![
            StreamHeader::new("#~", 0x6C, 0x100),
            StreamHeader::new("#Strings", 0x16C, 0x20),
        ]);

        let mut data = Vec::new();
        root.write(&mut data);
        assert_eq!(data.len(), root.size());

        // Pad so the stream ranges are in bounds
        data.resize(0x200, 0);
        let parsed = Root::read(&data).unwrap();

        assert_eq!(parsed.version, DEFAULT_RUNTIME_VERSION);
        assert_eq!(parsed.length, 12);
        assert_eq!(parsed.stream("#Strings").unwrap().offset, 0x16C);
    }

    #[test]
    fn bad_magic() {
        let data = [0_u8; 64];
        assert!(Root::read(&data).is_err());
    }
}
