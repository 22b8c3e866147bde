//! Memory-mapped output files with atomic replacement.
//!
//! An [`Output`] is written to `<target>.partial` next to its destination and renamed over the
//! target by [`Output::finalize`]. Until then the destination is untouched, so an interrupted run
//! never leaves a truncated assembly behind where the next run would pick it up. A dropped,
//! unfinished output deletes its partial file.

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

use memmap2::{MmapMut, MmapOptions};

use crate::{Error, Result};

/// A memory-mapped file that replaces its target path only once complete.
///
/// # Examples
///
/// ```rust,no_run
/// use bephookgen::file::output::Output;
///
/// let mut output = Output::create("MMHOOK_assembly_valheim.dll", 4)?;
/// output.write_at(0, b"MZ\0\0")?;
/// output.finalize()?;
/// # Ok::<(), bephookgen::Error>(())
/// ```
pub struct Output {
    /// The memory mapping of the partial file
    mmap: MmapMut,

    /// Where the partial file lives while it is being written
    partial_path: PathBuf,

    /// The final destination
    target_path: PathBuf,

    /// Whether the file has been moved into place
    finalized: bool,
}

impl Output {
    /// Creates a zero-filled partial file of `size` bytes for `target_path` and maps it.
    ///
    /// # Errors
    /// Returns [`crate::Error::WriteFailed`] if `size` is zero or the partial file cannot be
    /// created, sized or mapped.
    pub fn create<P: AsRef<Path>>(target_path: P, size: usize) -> Result<Self> {
        let target_path = target_path.as_ref().to_path_buf();
        if size == 0 {
            return Err(Error::WriteFailed {
                message: format!("Refusing to write empty file '{}'", target_path.display()),
            });
        }

        let partial_path = partial_path(&target_path);

        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&partial_path)
            .map_err(|e| Error::WriteFailed {
                message: format!("Failed to create '{}': {e}", partial_path.display()),
            })?;

        file.set_len(size as u64).map_err(|e| Error::WriteFailed {
            message: format!("Failed to set file size: {e}"),
        })?;

        // The partial file is private to this output until it is renamed
        let mmap = unsafe {
            MmapOptions::new()
                .map_mut(&file)
                .map_err(|e| Error::WriteFailed {
                    message: format!("Failed to create memory mapping: {e}"),
                })?
        };

        Ok(Self {
            mmap,
            partial_path,
            target_path,
            finalized: false,
        })
    }

    /// Writes `data` at `offset`.
    ///
    /// # Errors
    /// Returns [`crate::Error::WriteFailed`] if the write would exceed the file size.
    pub fn write_at(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        let Some(target) = offset
            .checked_add(data.len())
            .and_then(|end| self.mmap.get_mut(offset..end))
        else {
            return Err(Error::WriteFailed {
                message: format!(
                    "Write would exceed file size: offset={}, len={}, file_size={}",
                    offset,
                    data.len(),
                    self.mmap.len()
                ),
            });
        };

        target.copy_from_slice(data);
        Ok(())
    }

    /// Size of the file in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.mmap.len()
    }

    /// The final destination.
    #[must_use]
    pub fn target_path(&self) -> &Path {
        &self.target_path
    }

    /// Flushes the mapping and renames the partial file over the target.
    ///
    /// # Errors
    /// Returns [`crate::Error::WriteFailed`] if flushing or renaming fails; the partial file is
    /// removed in that case.
    pub fn finalize(mut self) -> Result<()> {
        self.mmap.flush().map_err(|e| Error::WriteFailed {
            message: format!("Failed to flush memory mapping: {e}"),
        })?;

        std::fs::rename(&self.partial_path, &self.target_path).map_err(|e| {
            Error::WriteFailed {
                message: format!(
                    "Failed to move '{}' into place: {e}",
                    self.target_path.display()
                ),
            }
        })?;

        self.finalized = true;
        Ok(())
    }
}

impl Drop for Output {
    fn drop(&mut self) {
        if !self.finalized {
            let _ = std::fs::remove_file(&self.partial_path);
        }
    }
}

fn partial_path(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map_or_else(OsString::new, ToOwned::to_owned);
    name.push(".partial");
    target.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn finalize_moves_into_place() {
        let temp_dir = tempdir().unwrap();
        let target_path = temp_dir.path().join("out.dll");

        let mut output = Output::create(&target_path, 16).unwrap();
        assert!(temp_dir.path().join("out.dll.partial").exists());
        assert!(!target_path.exists());

        output.write_at(0, b"Test content").unwrap();
        output.write_at(12, &0x1234_5678_u32.to_le_bytes()).unwrap();
        output.finalize().unwrap();

        let contents = std::fs::read(&target_path).unwrap();
        assert_eq!(&contents[0..12], b"Test content");
        assert_eq!(&contents[12..16], &[0x78, 0x56, 0x34, 0x12]);
        assert!(!temp_dir.path().join("out.dll.partial").exists());
    }

    #[test]
    fn drop_keeps_previous_target() {
        let temp_dir = tempdir().unwrap();
        let target_path = temp_dir.path().join("out.dll");
        std::fs::write(&target_path, b"previous").unwrap();

        {
            let mut output = Output::create(&target_path, 32).unwrap();
            output.write_at(0, b"incomplete").unwrap();
        }

        assert_eq!(std::fs::read(&target_path).unwrap(), b"previous");
        assert!(!temp_dir.path().join("out.dll.partial").exists());
    }

    #[test]
    fn bounds_checking() {
        let temp_dir = tempdir().unwrap();
        let mut output = Output::create(temp_dir.path().join("test.bin"), 10).unwrap();

        assert_eq!(output.size(), 10);
        assert!(output.write_at(8, b"too long").is_err());
        assert!(output.write_at(usize::MAX, b"x").is_err());
        assert!(Output::create(temp_dir.path().join("empty.bin"), 0).is_err());
    }
}
