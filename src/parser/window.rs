use std::borrow::Cow;

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use bytes::Bytes;

use crate::error::{Error, Result, Section};
use crate::metadata::Endianness;

/// Bytes handed back by a pager: `data[0]` sits at absolute file offset
/// `start`.
///
/// A window may start before the offset that was requested (the pager
/// over-fetched) and may extend past it; the decoder only requires that the
/// requested range lies inside.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Window {
    start: usize,
    data: Bytes,
}

impl Window {
    #[must_use]
    pub fn new(start: usize, data: impl Into<Bytes>) -> Self {
        Self {
            start,
            data: data.into(),
        }
    }

    /// Smallest absolute offset covered by the window.
    #[must_use]
    pub const fn start(&self) -> usize {
        self.start
    }

    /// One past the largest absolute offset covered by the window.
    #[must_use]
    pub fn end(&self) -> usize {
        self.start.saturating_add(self.data.len())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[must_use]
    pub fn covers(&self, offset: usize, len: usize) -> bool {
        offset >= self.start && offset.checked_add(len).is_some_and(|end| end <= self.end())
    }

    /// Bytes at absolute `[offset, offset + len)`, if covered.
    #[must_use]
    pub fn get(&self, offset: usize, len: usize) -> Option<&[u8]> {
        let relative = offset.checked_sub(self.start)?;
        self.data.get(relative..relative.checked_add(len)?)
    }
}

/// Integer layout shared by all multi-byte fields of one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Layout {
    pub endianness: Endianness,
    pub uses_u64: bool,
}

impl Layout {
    pub const fn word_size(self) -> usize {
        if self.uses_u64 { 8 } else { 4 }
    }

    /// Offset of the page type field inside every page.
    pub const fn bit_offset(self) -> usize {
        if self.uses_u64 { 32 } else { 16 }
    }

    pub const fn pointer_size(self) -> usize {
        if self.uses_u64 { 24 } else { 12 }
    }

    /// First byte after the page header, where the subheader directory begins.
    pub const fn page_header_size(self) -> usize {
        self.bit_offset() + 8
    }
}

/// Checked, endian-aware reads against a [`Window`], attributing failures to
/// `section`.
pub(crate) struct ByteReader<'a> {
    window: &'a Window,
    layout: Layout,
    section: Section,
}

impl<'a> ByteReader<'a> {
    pub const fn new(window: &'a Window, layout: Layout, section: Section) -> Self {
        Self {
            window,
            layout,
            section,
        }
    }

    /// Same window and layout, failures attributed to `section`.
    pub const fn with_section(&self, section: Section) -> Self {
        Self {
            window: self.window,
            layout: self.layout,
            section,
        }
    }

    pub const fn layout(&self) -> Layout {
        self.layout
    }

    pub const fn section(&self) -> Section {
        self.section
    }

    pub fn corrupted(&self, details: impl Into<Cow<'static, str>>) -> Error {
        Error::corrupted(self.section(), details)
    }

    pub fn bytes(&self, offset: usize, len: usize) -> Result<&'a [u8]> {
        self.window.get(offset, len).ok_or_else(|| {
            self.corrupted(format!(
                "read of {len} bytes at offset {offset} outside loaded data [{}, {})",
                self.window.start(),
                self.window.end()
            ))
        })
    }

    pub fn u8(&self, offset: usize) -> Result<u8> {
        Ok(self.bytes(offset, 1)?[0])
    }

    pub fn u16(&self, offset: usize) -> Result<u16> {
        let bytes = self.bytes(offset, 2)?;
        Ok(match self.layout.endianness {
            Endianness::Little => LittleEndian::read_u16(bytes),
            Endianness::Big => BigEndian::read_u16(bytes),
        })
    }

    pub fn u32(&self, offset: usize) -> Result<u32> {
        let bytes = self.bytes(offset, 4)?;
        Ok(match self.layout.endianness {
            Endianness::Little => LittleEndian::read_u32(bytes),
            Endianness::Big => BigEndian::read_u32(bytes),
        })
    }

    pub fn u64(&self, offset: usize) -> Result<u64> {
        let bytes = self.bytes(offset, 8)?;
        Ok(match self.layout.endianness {
            Endianness::Little => LittleEndian::read_u64(bytes),
            Endianness::Big => BigEndian::read_u64(bytes),
        })
    }

    /// Reads a 4- or 8-byte word depending on the file's pointer width.
    pub fn word(&self, offset: usize) -> Result<usize> {
        let value = if self.layout.uses_u64 {
            self.u64(offset)?
        } else {
            u64::from(self.u32(offset)?)
        };
        usize::try_from(value).map_err(|_| Error::Unsupported {
            feature: Cow::from(format!("value {value} does not fit in usize")),
        })
    }
}
