//! Memory-mapped movie loading.
//!
//! [`Physical`] maps a movie file read-only into the address space so the header and the
//! (often multi-megabyte) tag stream can be inspected without an upfront copy. Compressed
//! movies are inflated into an owned buffer by the container layer afterwards.

use super::Backend;
use crate::{
    Error::{Error, FileError},
    Result,
};

use memmap2::Mmap;
use std::{fs, path::Path};

/// A movie file on disk, mapped read-only.
///
/// # Examples
///
/// ```rust,no_run
/// use abcpatch::file::{Backend, Physical};
///
/// let physical = Physical::new("Habbo.swf")?;
/// assert!(matches!(&physical.data()[..3], b"FWS" | b"CWS" | b"ZWS"));
/// # Ok::<(), abcpatch::Error>(())
/// ```
#[derive(Debug)]
pub struct Physical {
    data: Mmap,
}

impl Physical {
    /// Map the movie at `path`.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file cannot be opened or
    /// [`crate::Error::Error`] if memory mapping fails.
    pub fn new(path: impl AsRef<Path>) -> Result<Physical> {
        let file = fs::File::open(path).map_err(FileError)?;
        // SAFETY: the mapping is read-only and the file is not truncated while mapped.
        let data = unsafe { Mmap::map(&file) }.map_err(|error| Error(error.to_string()))?;
        Ok(Physical { data })
    }
}

impl Backend for Physical {
    fn data(&self) -> &[u8] {
        &self.data
    }
}
