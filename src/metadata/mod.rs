mod page;

use serde::Serialize;

pub use page::{Page, PageType, Subheader, SubheaderSignature};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Endianness {
    Little,
    Big,
}

impl Endianness {
    #[must_use]
    pub const fn host() -> Self {
        if cfg!(target_endian = "little") {
            Self::Little
        } else {
            Self::Big
        }
    }
}

/// Character set code stored in the file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct EncodingId(pub u8);

impl EncodingId {
    pub const DEFAULT: Self = Self(0);
    pub const UTF_8: Self = Self(20);
    pub const ASCII: Self = Self(28);
    pub const LATIN1: Self = Self(29);
    pub const WINDOWS_1252: Self = Self(62);

    /// Canonical SAS name of the character set, if the code is known.
    #[must_use]
    pub const fn label(self) -> Option<&'static str> {
        crate::encoding::label(self)
    }
}

/// Row compression scheme announced in the first column-text subheader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    None,
    Rle,
    Rdc,
}

/// Output format of a column.
///
/// `Raw` and `String` are derived from SAS character columns; every other
/// variant is backed by a SAS numeric (truncated double) column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnFormat {
    Raw,
    String,
    Double,
    Float,
    Bool,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Date,
    DateTime,
}

impl ColumnFormat {
    #[must_use]
    pub const fn is_numeric(self) -> bool {
        !matches!(self, Self::Raw | Self::String)
    }
}

/// Location, name and format of one column inside a logical row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
    pub offset: usize,
    pub len: usize,
    pub name: String,
    pub format: ColumnFormat,
}

impl ColumnInfo {
    #[must_use]
    pub const fn end(&self) -> usize {
        self.offset + self.len
    }

    #[must_use]
    pub const fn range(&self) -> std::ops::Range<usize> {
        self.offset..self.offset + self.len
    }
}

impl Default for ColumnInfo {
    fn default() -> Self {
        Self {
            offset: 0,
            len: 0,
            name: String::new(),
            format: ColumnFormat::String,
        }
    }
}

/// File-level metadata, fixed once initialization succeeds.
#[derive(Debug, Clone, Serialize)]
pub struct FileInfo {
    pub uses_u64: bool,
    pub endianness: Endianness,
    pub needs_byteswap: bool,
    pub encoding: EncodingId,
    pub compression: Compression,
    pub header_len: usize,
    pub page_len: usize,
    pub page_count: usize,
    pub row_len: usize,
    pub row_count: usize,
    pub columns: Vec<ColumnInfo>,
}

impl FileInfo {
    #[must_use]
    pub const fn column_count(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub const fn is_32_bit(&self) -> bool {
        !self.uses_u64
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|column| column.name == name)
    }
}
