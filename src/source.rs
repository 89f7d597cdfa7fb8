//! Ready-made pagers a [`DecodeSink`](crate::DecodeSink) can delegate
//! `refill` to.

use std::io::{Read, Seek, SeekFrom};

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::parser::Window;

/// Bytes read per refill by [`ReaderSource`] unless configured otherwise.
pub const DEFAULT_CHUNK_LEN: usize = 1 << 20;

/// Supplies windows of file bytes on request.
pub trait PageSource {
    /// Returns a window that starts at or before `offset` and, unless the file
    /// ends first, covers `[offset, offset + len)`.
    ///
    /// # Errors
    ///
    /// Implementations return [`Error::Io`] when the backing store fails.
    fn fetch(&mut self, offset: usize, len: usize) -> Result<Window>;

    /// Total length of the underlying file, if known. Suitable as
    /// `filesize_override`.
    fn len_hint(&self) -> Option<usize>;
}

impl<P: PageSource + ?Sized> PageSource for &mut P {
    fn fetch(&mut self, offset: usize, len: usize) -> Result<Window> {
        (**self).fetch(offset, len)
    }

    fn len_hint(&self) -> Option<usize> {
        (**self).len_hint()
    }
}

/// The whole file already in memory. Every fetch hands back the full buffer.
#[derive(Debug, Clone)]
pub struct MemorySource {
    data: Bytes,
}

impl MemorySource {
    #[must_use]
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    #[must_use]
    pub const fn bytes(&self) -> &Bytes {
        &self.data
    }
}

impl PageSource for MemorySource {
    fn fetch(&mut self, _offset: usize, _len: usize) -> Result<Window> {
        Ok(Window::new(0, self.data.clone()))
    }

    fn len_hint(&self) -> Option<usize> {
        Some(self.data.len())
    }
}

/// Reads chunks from any `Read + Seek` implementor.
#[derive(Debug)]
pub struct ReaderSource<R: Read + Seek> {
    reader: R,
    len: usize,
    chunk_len: usize,
}

impl<R: Read + Seek> ReaderSource<R> {
    /// Wraps `reader`, seeking to its end once to learn the file length.
    ///
    /// # Errors
    ///
    /// Returns an error if seeking fails or the length does not fit `usize`.
    pub fn new(mut reader: R) -> Result<Self> {
        let end = reader.seek(SeekFrom::End(0))?;
        let len = usize::try_from(end).map_err(|_| Error::Unsupported {
            feature: format!("file of {end} bytes on this platform").into(),
        })?;
        Ok(Self {
            reader,
            len,
            chunk_len: DEFAULT_CHUNK_LEN,
        })
    }

    /// Reads at least `chunk_len` bytes per fetch (fewer at end of file).
    #[must_use]
    pub fn with_chunk_len(mut self, chunk_len: usize) -> Self {
        self.chunk_len = chunk_len.max(1);
        self
    }
}

impl<R: Read + Seek> PageSource for ReaderSource<R> {
    fn fetch(&mut self, offset: usize, len: usize) -> Result<Window> {
        let available = self.len.saturating_sub(offset);
        let want = len.max(self.chunk_len).min(available);
        let mut buf = Vec::new();
        buf.try_reserve_exact(want).map_err(|err| Error::Allocation {
            details: format!("read buffer of {want} bytes: {err}").into(),
        })?;
        self.reader.seek(SeekFrom::Start(offset as u64))?;
        (&mut self.reader).take(want as u64).read_to_end(&mut buf)?;
        Ok(Window::new(offset, buf))
    }

    fn len_hint(&self) -> Option<usize> {
        Some(self.len)
    }
}
