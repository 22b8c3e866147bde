//! MD5 content hashes of input assemblies.

use std::{fmt, fmt::Write as _, io::Read, path::Path, str::FromStr};

use md5::{Digest, Md5};

use crate::{Error, Result};

const READ_CHUNK: usize = 64 * 1024;

/// 128-bit MD5 digest over the exact bytes of a file.
///
/// Rendered as 32 uppercase hex digits without separators, which is also the form embedded in
/// the hash marker of a hook assembly.
///
/// # Examples
///
/// ```rust
/// use bephookgen::cache::ContentHash;
///
/// let hash = ContentHash::of_bytes(b"");
/// assert_eq!(hash.to_string(), "D41D8CD98F00B204E9800998ECF8427E");
/// assert_eq!(hash.to_string().parse::<ContentHash>()?, hash);
/// # Ok::<(), bephookgen::Error>(())
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ContentHash([u8; 16]);

impl ContentHash {
    /// Hashes an in-memory buffer.
    #[must_use]
    pub fn of_bytes(data: &[u8]) -> Self {
        ContentHash(Md5::digest(data).into())
    }

    /// Hashes the full contents of the file at `path`.
    ///
    /// # Errors
    /// Returns [`Error::FileError`] if the file cannot be opened or read.
    pub fn of_file(path: &Path) -> Result<Self> {
        let mut file = std::fs::File::open(path)?;
        let mut hasher = Md5::new();
        let mut buffer = vec![0_u8; READ_CHUNK];

        loop {
            let read = file.read(&mut buffer)?;
            if read == 0 {
                break;
            }
            hasher.update(&buffer[..read]);
        }

        Ok(ContentHash(hasher.finalize().into()))
    }

    /// The raw digest.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Parses 32 hex digits, in either case.
    ///
    /// # Errors
    /// Returns [`Error::InvalidHash`] for anything else.
    pub fn parse(hex: &str) -> Result<Self> {
        if hex.len() != 32 || !hex.is_ascii() {
            return Err(Error::InvalidHash(hex.to_string()));
        }

        let mut digest = [0_u8; 16];
        for (i, byte) in digest.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
                .map_err(|_| Error::InvalidHash(hex.to_string()))?;
        }

        Ok(ContentHash(digest))
    }
}

impl From<[u8; 16]> for ContentHash {
    fn from(digest: [u8; 16]) -> Self {
        ContentHash(digest)
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut hex = String::with_capacity(32);
        for byte in self.0 {
            let _ = write!(hex, "{byte:02X}");
        }
        f.write_str(&hex)
    }
}

impl FromStr for ContentHash {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn known_digest() {
        let hash = ContentHash::of_bytes(b"The quick brown fox jumps over the lazy dog");
        assert_eq!(hash.to_string(), "9E107D9D372BB6826BD81D3542A419D6");
    }

    #[test]
    fn file_matches_bytes() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let data: Vec<u8> = (0..200_000_u32).map(|i| (i % 251) as u8).collect();
        file.write_all(&data).unwrap();

        assert_eq!(
            ContentHash::of_file(file.path()).unwrap(),
            ContentHash::of_bytes(&data)
        );
    }

    #[test]
    fn missing_file() {
        assert!(matches!(
            ContentHash::of_file(Path::new("/nonexistent/assembly_missing.dll")),
            Err(Error::FileError(_))
        ));
    }

    #[test]
    fn parse() {
        let hash = ContentHash::of_bytes(b"abc");
        let lower = hash.to_string().to_ascii_lowercase();

        assert_eq!(ContentHash::parse(&lower).unwrap(), hash);
        assert!(matches!(
            ContentHash::parse("ABC"),
            Err(Error::InvalidHash(_))
        ));
        assert!(ContentHash::parse(&"G".repeat(32)).is_err());
    }
}
