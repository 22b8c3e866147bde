use std::{ffi::CStr, str};

use crate::Result;

/// The `#Strings` heap: NUL-terminated UTF-8 identifiers addressed by byte offset.
///
/// Offset 0 is always the empty string.
///
/// # Examples
///
/// ```rust
/// use bephookgen::metadata::streams::Strings;
///
/// let heap = Strings::from(b"\0Player\0Character\0")?;
/// assert_eq!(heap.get(1)?, "Player");
/// assert_eq!(heap.get(0)?, "");
/// # Ok::<(), bephookgen::Error>(())
/// ```
pub struct Strings<'a> {
    data: &'a [u8],
}

impl<'a> Strings<'a> {
    /// Wraps the bytes of a `#Strings` heap.
    ///
    /// # Errors
    /// Returns a malformed error if the heap is empty or does not start with the empty string.
    pub fn from(data: &'a [u8]) -> Result<Strings<'a>> {
        if data.is_empty() || data[0] != 0 {
            return Err(malformed_error!("Provided #Strings heap is empty"));
        }

        Ok(Strings { data })
    }

    /// Returns the string starting at byte offset `index`.
    ///
    /// # Errors
    /// Returns an error if `index` is out of bounds or the string is unterminated or not UTF-8.
    pub fn get(&self, index: usize) -> Result<&'a str> {
        if index >= self.data.len() {
            return Err(out_of_bounds_error!());
        }

        match CStr::from_bytes_until_nul(&self.data[index..]) {
            Ok(result) => result
                .to_str()
                .map_err(|_| malformed_error!("Invalid string at index - {}", index)),
            Err(_) => Err(malformed_error!("Invalid string at index - {}", index)),
        }
    }

    /// Size of the heap in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the heap is empty (never true for a successfully created heap).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crafted() {
        let data = b"\0<Module>\0assembly_valheim\0Player\0UpdateFood\0";

        let str_view = Strings::from(data).unwrap();

        assert_eq!(str_view.get(1).unwrap(), "<Module>");
        assert_eq!(str_view.get(10).unwrap(), "assembly_valheim");
        assert_eq!(str_view.get(27).unwrap(), "Player");
        // Offsets may point into the middle of another string
        assert_eq!(str_view.get(31).unwrap(), "er");
        assert!(str_view.get(data.len()).is_err());
    }

    #[test]
    fn invalid() {
        assert!(Strings::from(b"").is_err());
        assert!(Strings::from(b"abc\0").is_err());

        let heap = Strings::from(b"\0abc").unwrap();
        assert!(heap.get(1).is_err());
    }
}
