use std::ops::ControlFlow;

use crate::encoding::trim_trailing;
use crate::error::{Error, Result};
use crate::metadata::{ColumnFormat, ColumnInfo, FileInfo};
use crate::parser::Bitmap;
use crate::parser::Window;
use crate::value::{Value, column_value};

/// Consumer side of a [`Parser`](crate::Parser).
///
/// The parser owns one sink for its whole lifetime and calls back into it for
/// bytes (`refill`), once for the finished metadata (`on_metadata`) and once
/// per row (`on_row`). Returning an error from any method aborts the current
/// `init` or `parse` call with that error.
pub trait DecodeSink {
    /// Returns a window covering at least `[offset, offset + len)`.
    ///
    /// The window may start before `offset` and may extend past the requested
    /// range.
    ///
    /// # Errors
    ///
    /// Any error is propagated unchanged to the caller of `init`/`parse`.
    fn refill(&mut self, offset: usize, len: usize) -> Result<Window>;

    /// Called exactly once, after all column metadata is known and before the
    /// first row.
    ///
    /// # Errors
    ///
    /// Any error is propagated unchanged to the caller of `init`.
    fn on_metadata(&mut self, info: &FileInfo) -> Result<()> {
        let _ = info;
        Ok(())
    }

    /// Called for every row. `ControlFlow::Break` stops the current `parse`
    /// call; the next call resumes with the following row.
    ///
    /// # Errors
    ///
    /// Any error is propagated unchanged to the caller of `parse`.
    fn on_row(&mut self, row: RowRef<'_>) -> Result<ControlFlow<()>>;
}

impl<T: DecodeSink + ?Sized> DecodeSink for &mut T {
    fn refill(&mut self, offset: usize, len: usize) -> Result<Window> {
        (**self).refill(offset, len)
    }

    fn on_metadata(&mut self, info: &FileInfo) -> Result<()> {
        (**self).on_metadata(info)
    }

    fn on_row(&mut self, row: RowRef<'_>) -> Result<ControlFlow<()>> {
        (**self).on_row(row)
    }
}

impl<T: DecodeSink + ?Sized> DecodeSink for Box<T> {
    fn refill(&mut self, offset: usize, len: usize) -> Result<Window> {
        (**self).refill(offset, len)
    }

    fn on_metadata(&mut self, info: &FileInfo) -> Result<()> {
        (**self).on_metadata(info)
    }

    fn on_row(&mut self, row: RowRef<'_>) -> Result<ControlFlow<()>> {
        (**self).on_row(row)
    }
}

/// One decoded row, borrowed from the parser for the duration of `on_row`.
#[derive(Debug, Clone, Copy)]
pub struct RowRef<'a> {
    bytes: &'a [u8],
    index: u64,
    trailing_spaces_known: bool,
    spaces: &'a Bitmap,
    info: &'a FileInfo,
}

impl<'a> RowRef<'a> {
    pub(crate) const fn new(
        bytes: &'a [u8],
        index: u64,
        trailing_spaces_known: bool,
        spaces: &'a Bitmap,
        info: &'a FileInfo,
    ) -> Self {
        Self {
            bytes,
            index,
            trailing_spaces_known,
            spaces,
            info,
        }
    }

    /// The full row, `info().row_len` bytes.
    #[must_use]
    pub const fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Zero-based position of the row in the file.
    #[must_use]
    pub const fn index(&self) -> u64 {
        self.index
    }

    /// Whether the row came out of the RLE decoder, in which case the
    /// space-fill bitmap tells where string columns end.
    #[must_use]
    pub const fn trailing_spaces_known(&self) -> bool {
        self.trailing_spaces_known
    }

    #[must_use]
    pub const fn info(&self) -> &'a FileInfo {
        self.info
    }

    fn column_info(&self, index: usize) -> Option<&'a ColumnInfo> {
        self.info.columns.get(index)
    }

    /// Raw bytes of column `index`.
    #[must_use]
    pub fn column(&self, index: usize) -> Option<&'a [u8]> {
        let column = self.column_info(index)?;
        self.bytes.get(column.range())
    }

    /// Length of column `index` that may hold something other than fill.
    ///
    /// When trailing spaces are known this stops after the last byte the RLE
    /// decoder did not produce as space/NUL fill (0 if all of it was fill);
    /// otherwise it is the full column length.
    #[must_use]
    pub fn known_content_len(&self, index: usize) -> Option<usize> {
        let column = self.column_info(index)?;
        if !self.trailing_spaces_known {
            return Some(column.len);
        }
        Some(
            self.spaces
                .find_last(column.offset, column.end(), false)
                .map_or(0, |last| last - column.offset + 1),
        )
    }

    /// Column bytes with trailing spaces and NULs removed.
    #[must_use]
    pub fn trimmed(&self, index: usize) -> Option<&'a [u8]> {
        let bytes = self.column(index)?;
        let len = self.known_content_len(index)?;
        Some(trim_trailing(&bytes[..len.min(bytes.len())]))
    }

    /// Decodes column `index` according to its format.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for an unknown column index, or the
    /// encoding/representation error of the conversion.
    pub fn value(&self, index: usize) -> Result<Value<'a>> {
        let column = self.column_info(index).ok_or_else(|| {
            Error::invalid_argument(format!(
                "column index {index} out of range for {} columns",
                self.info.columns.len()
            ))
        })?;
        let bytes = if column.format == ColumnFormat::String {
            self.trimmed(index)
        } else {
            self.column(index)
        }
        .ok_or_else(|| Error::invalid_argument("column range outside row"))?;
        column_value(bytes, column, self.info.endianness, self.info.encoding)
    }

    /// Decodes every column in order.
    pub fn values(self) -> impl Iterator<Item = Result<Value<'a>>> + 'a {
        (0..self.info.columns.len()).map(move |index| self.value(index))
    }
}
