use crate::config::ParserConfig;
use crate::encoding::to_utf8_lossy;
use crate::error::{Error, Result, Section};
use crate::metadata::{
    ColumnFormat, ColumnInfo, Compression, EncodingId, Page, Subheader, SubheaderSignature,
};
use crate::parser::alloc::{check_row_len, try_vec};
use crate::parser::bitmap::Bitmap;
use crate::parser::pages::read_subheader;
use crate::parser::window::{ByteReader, Layout};

use super::formats::{MIN_FORMAT_NAME_LEN, classify};
use super::text_store::{TextRef, TextStore, detect_compression, is_valid_range, until_nul};

const COLUMN_TYPE_DOUBLE: u8 = 1;
const NUMERIC_LEN: std::ops::RangeInclusive<usize> = 3..=8;

/// Per-row scratch state, allocated once the row length is known.
#[derive(Debug)]
pub(crate) struct RowBuffers {
    /// Bit per row byte: does the byte belong to a string column?
    pub string_columns: Bitmap,
    /// Bit per row byte: was the byte produced by an RLE space/NUL fill?
    pub spaces: Bitmap,
    pub scratch: Vec<u8>,
}

impl RowBuffers {
    fn try_new(row_len: usize) -> Result<Self> {
        let scratch = try_vec(row_len, 0u8, "decompression buffer")?;
        let bits = row_len.div_ceil(8) * 8;
        Ok(Self {
            string_columns: Bitmap::try_new(bits, false)?,
            spaces: Bitmap::try_new(bits, false)?,
            scratch,
        })
    }
}

/// Everything the metadata pages describe, validated for consistency.
#[derive(Debug)]
pub(crate) struct Metadata {
    pub row_len: usize,
    pub row_count: usize,
    pub compression: Compression,
    pub columns: Vec<ColumnInfo>,
    pub buffers: RowBuffers,
}

#[derive(Debug, Clone, Copy)]
struct RowSize {
    row_len: usize,
    row_count: usize,
}

/// Accumulates metadata subheaders across meta pages.
pub(crate) struct MetadataBuilder<'c> {
    layout: Layout,
    encoding: EncodingId,
    config: &'c ParserConfig,
    row_size: Option<RowSize>,
    buffers: Option<RowBuffers>,
    column_count: Option<usize>,
    columns: Vec<ColumnInfo>,
    texts: TextStore,
    compression: Compression,
    names_seen: usize,
    attrs_seen: usize,
    formats_seen: usize,
}

impl<'c> MetadataBuilder<'c> {
    pub const fn new(layout: Layout, encoding: EncodingId, config: &'c ParserConfig) -> Self {
        Self {
            layout,
            encoding,
            config,
            row_size: None,
            buffers: None,
            column_count: None,
            columns: Vec::new(),
            texts: TextStore::new(),
            compression: Compression::None,
            names_seen: 0,
            attrs_seen: 0,
            formats_seen: 0,
        }
    }

    /// Dispatches every metadata subheader on `page`.
    ///
    /// Returns the index of the first subheader that holds row data, which is
    /// where row enumeration has to resume.
    pub fn process_page(
        &mut self,
        reader: &ByteReader<'_>,
        page: &Page,
        page_len: usize,
    ) -> Result<Option<usize>> {
        for index in 0..usize::from(page.subheader_count) {
            let Some(subheader) = read_subheader(reader, page, index, page_len)? else {
                continue;
            };
            if subheader.signature == SubheaderSignature::None {
                if !page.page_type.has_data_subheaders() {
                    return Err(reader.corrupted("expected subheader with signature"));
                }
                return Ok(Some(index));
            }
            let reader =
                reader.with_section(Section::subheader(page.index, subheader.signature.raw()));
            self.dispatch(&reader, page, &subheader)?;
        }
        Ok(None)
    }

    fn dispatch(
        &mut self,
        reader: &ByteReader<'_>,
        page: &Page,
        subheader: &Subheader,
    ) -> Result<()> {
        // Signature-tagged subheaders start their contents one word in.
        let contents = page.offset + subheader.offset + self.layout.word_size();
        match subheader.signature {
            SubheaderSignature::RowSize => self.row_size(reader, contents),
            SubheaderSignature::ColumnSize => self.column_size(reader, contents),
            SubheaderSignature::ColumnText => self.column_text(reader, contents),
            SubheaderSignature::ColumnName => self.column_name(reader, contents, subheader.len),
            SubheaderSignature::ColumnAttributes => {
                self.column_attributes(reader, contents, subheader.len)
            }
            SubheaderSignature::ColumnFormatAndLabel => self.column_format(reader, contents),
            SubheaderSignature::Counts
            | SubheaderSignature::ColumnList
            | SubheaderSignature::None => Ok(()),
        }
    }

    fn row_size(&mut self, reader: &ByteReader<'_>, contents: usize) -> Result<()> {
        if self.row_size.is_some() {
            return Err(reader.corrupted("unexpected row size subheader"));
        }
        let word = self.layout.word_size();
        let row_len = reader.word(contents + 4 * word)?;
        let row_count = reader.word(contents + 5 * word)?;
        check_row_len(row_len)?;
        if row_len == 0 {
            return Err(reader.corrupted("row length is zero"));
        }
        self.buffers = Some(RowBuffers::try_new(row_len)?);
        self.row_size = Some(RowSize { row_len, row_count });
        Ok(())
    }

    fn column_size(&mut self, reader: &ByteReader<'_>, contents: usize) -> Result<()> {
        if self.column_count.is_some() {
            return Err(reader.corrupted("unexpected column size subheader"));
        }
        let column_count = reader.word(contents)?;
        if column_count == 0 {
            return Err(reader.corrupted("no columns in column size subheader"));
        }
        self.columns = try_vec(column_count, ColumnInfo::default(), "column list")?;
        self.column_count = Some(column_count);
        Ok(())
    }

    fn column_text(&mut self, reader: &ByteReader<'_>, contents: usize) -> Result<()> {
        let text_len = usize::from(reader.u16(contents)?);
        let blob = reader.bytes(contents, text_len)?;
        if self.texts.is_empty() {
            self.compression = detect_compression(blob);
        }
        self.texts.push_blob(blob)
    }

    fn column_name(&mut self, reader: &ByteReader<'_>, contents: usize, len: usize) -> Result<()> {
        let entries = len
            .checked_sub(2 * self.layout.word_size() + 12)
            .ok_or_else(|| reader.corrupted("column name subheader too short"))?
            / 8;
        if self.names_seen + entries > self.column_count.unwrap_or(0) {
            return Err(reader.corrupted("unexpected column name subheader"));
        }
        for i in 0..entries {
            let at = contents + 8 * (i + 1);
            let text_ref = TextRef {
                index: reader.u16(at)?,
                offset: reader.u16(at + 2)?,
                len: reader.u16(at + 4)?,
            };
            if usize::from(text_ref.index) >= self.texts.len() {
                return Err(reader.corrupted("unexpected column text index"));
            }
            let name = self
                .texts
                .get(text_ref)
                .ok_or_else(|| reader.corrupted("unexpected column name offset or length"))?;
            self.columns[self.names_seen].name =
                to_utf8_lossy(until_nul(name), self.encoding).into_owned();
            self.names_seen += 1;
        }
        Ok(())
    }

    fn column_attributes(
        &mut self,
        reader: &ByteReader<'_>,
        contents: usize,
        len: usize,
    ) -> Result<()> {
        let (header, entry_len) = if self.layout.uses_u64 {
            (28, 16)
        } else {
            (20, 12)
        };
        let entries = len
            .checked_sub(header)
            .ok_or_else(|| reader.corrupted("column attributes subheader too short"))?
            / entry_len;
        if self.attrs_seen + entries > self.column_count.unwrap_or(0) {
            return Err(reader.corrupted("unexpected column attributes subheader"));
        }
        let row_len = self.row_size.map_or(0, |size| size.row_len);
        let word = self.layout.word_size();
        for i in 0..entries {
            let at = contents + 8 + i * entry_len;
            let offset = reader.word(at)?;
            let column_len = reader.u32(at + word)? as usize;
            let section = Section::Column {
                index: self.attrs_seen,
            };
            if !is_valid_range(offset, column_len, row_len) {
                return Err(Error::corrupted(
                    section,
                    format!(
                        "offset {offset} with length {column_len} exceeds row length {row_len}"
                    ),
                ));
            }
            if column_len == 0 {
                return Err(Error::corrupted(section, "length 0"));
            }
            let format = if reader.u8(at + word + 6)? == COLUMN_TYPE_DOUBLE {
                ColumnFormat::Double
            } else {
                ColumnFormat::String
            };
            if format == ColumnFormat::Double && !NUMERIC_LEN.contains(&column_len) {
                return Err(Error::corrupted(
                    section,
                    format!("invalid numeric length {column_len}"),
                ));
            }
            let column = &mut self.columns[self.attrs_seen];
            column.offset = offset;
            column.len = column_len;
            column.format = format;
            self.attrs_seen += 1;
        }
        Ok(())
    }

    fn column_format(&mut self, reader: &ByteReader<'_>, contents: usize) -> Result<()> {
        let index = self.formats_seen;
        if index >= self.column_count.unwrap_or(0) {
            return Err(reader.corrupted("unexpected column format subheader"));
        }
        let row_len = self.row_size.map_or(0, |size| size.row_len);
        let column = &mut self.columns[index];

        if let Some(format_override) = self.config.find_override(&column.name) {
            apply_override(column, format_override, row_len)?;
        } else if column.format == ColumnFormat::Double {
            let at = contents + 22 + 2 * self.layout.word_size();
            let mut text_ref = TextRef {
                index: reader.u16(at)?,
                offset: reader.u16(at + 2)?,
                len: reader.u16(at + 4)?,
            };
            if usize::from(text_ref.index) >= self.texts.len() {
                // Seen in files with AMD pages; fall back to the newest blob.
                let last = self
                    .texts
                    .len()
                    .checked_sub(1)
                    .ok_or_else(|| reader.corrupted("column format before any column text"))?;
                text_ref.index = u16::try_from(last)
                    .map_err(|_| reader.corrupted("too many column text subheaders"))?;
            }
            if usize::from(text_ref.len) >= MIN_FORMAT_NAME_LEN {
                let name = self
                    .texts
                    .get(text_ref)
                    .ok_or_else(|| reader.corrupted("unexpected column format offset or length"))?;
                if let Some(format) = classify(until_nul(name)) {
                    column.format = format;
                }
            }
        }

        self.formats_seen += 1;
        Ok(())
    }

    /// Checks that every required subheader was seen the expected number of
    /// times and marks string column bytes.
    pub fn finish(self) -> Result<Metadata> {
        let incomplete = |details: &'static str| Error::corrupted(Section::Metadata, details);
        let column_count = self
            .column_count
            .ok_or_else(|| incomplete("missing column size subheader"))?;
        let row_size = self
            .row_size
            .ok_or_else(|| incomplete("missing row size subheader"))?;
        let mut buffers = self
            .buffers
            .ok_or_else(|| incomplete("missing row size subheader"))?;
        if self.names_seen != column_count
            || self.attrs_seen != column_count
            || self.formats_seen != column_count
        {
            return Err(Error::corrupted(
                Section::Metadata,
                format!(
                    "incomplete column metadata: {column_count} columns, {} names, {} attributes, {} formats",
                    self.names_seen, self.attrs_seen, self.formats_seen
                ),
            ));
        }

        for column in &self.columns {
            if column.format == ColumnFormat::String {
                buffers
                    .string_columns
                    .set(column.offset, column.end(), true);
            }
        }

        Ok(Metadata {
            row_len: row_size.row_len,
            row_count: row_size.row_count,
            compression: self.compression,
            columns: self.columns,
            buffers,
        })
    }
}

fn apply_override(
    column: &mut ColumnInfo,
    format_override: &crate::config::FormatOverride,
    row_len: usize,
) -> Result<()> {
    if format_override.format.is_numeric() && column.format != ColumnFormat::Double {
        return Err(Error::invalid_argument(format!(
            "invalid column format override: {:?} on character column {}",
            format_override.format, column.name
        )));
    }
    column.format = format_override.format;
    if let Some(len) = format_override.len.filter(|len| *len > 0) {
        column.len = len;
    }
    if !is_valid_range(column.offset, column.len, row_len) {
        return Err(Error::invalid_argument(format!(
            "override length {} for column {} exceeds row length {row_len}",
            column.len, column.name
        )));
    }
    if column.format.is_numeric() && !NUMERIC_LEN.contains(&column.len) {
        return Err(Error::invalid_argument(format!(
            "override length {} for numeric column {} outside 3..=8",
            column.len, column.name
        )));
    }
    Ok(())
}
