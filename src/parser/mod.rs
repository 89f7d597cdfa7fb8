//! Incremental SAS7BDAT decoding engine.
//!
//! [`Parser::init`] reads the header and every metadata page up to the first
//! row, then hands the finished [`FileInfo`] to the sink. Each
//! [`Parser::parse`] call resumes from where the previous one stopped and
//! feeds rows to the sink, bounded by `max_pages` and by the sink's
//! `ControlFlow::Break`.

pub(crate) mod alloc;
mod bitmap;
pub mod compression;
mod header;
mod metadata;
mod pages;
mod window;

use std::ops::ControlFlow;

use crate::config::ParserConfig;
use crate::error::{Error, Result, Section};
use crate::logger::log_warn;
use crate::metadata::{Compression, Endianness, FileInfo, Page, PageType, SubheaderSignature};
use crate::sink::{DecodeSink, RowRef};

pub use bitmap::Bitmap;
pub use window::Window;

use compression::{Decompressor, decompress_rdc, decompress_rle};
use header::{HEADER_READ_LEN, Header};
use metadata::{MetadataBuilder, RowBuffers};
use pages::{read_page, read_subheader};
use window::ByteReader;

/// Resume position. `subheader` applies to meta pages, `packed_row` to mix
/// and data pages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Cursor {
    page: usize,
    subheader: usize,
    packed_row: usize,
}

impl Cursor {
    const fn next_page(&mut self) {
        self.page += 1;
        self.subheader = 0;
        self.packed_row = 0;
    }
}

/// Decoder state for one file. Dropping it releases every buffer.
pub struct Parser<S: DecodeSink> {
    sink: S,
    config: ParserConfig,
    header: Header,
    info: FileInfo,
    window: Window,
    /// Pages that actually exist: the header's count, or what fits in the
    /// caller's file size.
    page_limit: usize,
    cursor: Cursor,
    buffers: RowBuffers,
    decompress: Decompressor,
    rows_processed: u64,
    warned_short: bool,
}

impl<S: DecodeSink> Parser<S> {
    /// Reads the header and all metadata pages, then calls
    /// [`DecodeSink::on_metadata`] once.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Corrupted`] for malformed or incomplete metadata,
    /// [`Error::InvalidArgument`] for a bad configuration or pager window,
    /// [`Error::Allocation`] when buffers cannot be allocated, and whatever
    /// the sink returns.
    pub fn init(mut sink: S, config: ParserConfig) -> Result<Self> {
        let mut window = refill(&mut sink, 0, HEADER_READ_LEN, Section::Header)?;
        let header = Header::parse(&window)?;

        let page_limit = match config.filesize_override() {
            Some(file_len) => {
                let pages = header.pages_in(file_len)?;
                if pages != header.page_count {
                    log_warn(&format!(
                        "header declares {} pages but file size allows {pages}",
                        header.page_count
                    ));
                }
                pages
            }
            None => header.page_count,
        };

        let mut cursor = Cursor::default();
        let mut builder = MetadataBuilder::new(header.layout, header.encoding, &config);
        while cursor.page < page_limit {
            let offset = ensure_page(&mut sink, &mut window, &header, cursor.page)?;
            let reader = ByteReader::new(
                &window,
                header.layout,
                Section::Page { index: cursor.page },
            );
            let page = read_page(&reader, cursor.page, offset)?;
            if page.page_type.has_data_subheaders() {
                if page.block_count != page.subheader_count {
                    return Err(reader.corrupted("invalid subheader count in meta page"));
                }
                if let Some(first_row) = builder.process_page(&reader, &page, header.page_len)? {
                    cursor.subheader = first_row;
                    break;
                }
            } else if page.page_type.has_packed_rows() {
                if page.packed_row_count() == 0 {
                    return Err(reader.corrupted("empty packed data page"));
                }
                builder.process_page(&reader, &page, header.page_len)?;
                cursor.packed_row = 0;
                break;
            } else {
                log_warn(&format!(
                    "skipping page {} with unsupported type 0x{:04X}",
                    cursor.page,
                    page.page_type.raw()
                ));
            }
            cursor.next_page();
        }

        let metadata = builder.finish()?;
        let info = FileInfo {
            uses_u64: header.layout.uses_u64,
            endianness: header.layout.endianness,
            needs_byteswap: header.layout.endianness != Endianness::host(),
            encoding: header.encoding,
            compression: metadata.compression,
            header_len: header.header_len,
            page_len: header.page_len,
            page_count: header.page_count,
            row_len: metadata.row_len,
            row_count: metadata.row_count,
            columns: metadata.columns,
        };
        let decompress: Decompressor = if info.compression == Compression::Rle {
            decompress_rle
        } else {
            decompress_rdc
        };

        sink.on_metadata(&info)?;

        Ok(Self {
            sink,
            config,
            header,
            info,
            window,
            page_limit,
            cursor,
            buffers: metadata.buffers,
            decompress,
            rows_processed: 0,
            warned_short: false,
        })
    }

    /// Emits rows until `max_pages` pages were finished, the sink asked to
    /// stop, or the file ran out.
    ///
    /// Returns `true` while unvisited pages remain.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Corrupted`] for malformed pages or rows that fail to
    /// decompress, and whatever the sink returns. The parser should not be
    /// used again after an error.
    pub fn parse(&mut self) -> Result<bool> {
        let Self {
            sink,
            config,
            header,
            info,
            window,
            page_limit,
            cursor,
            buffers,
            decompress,
            rows_processed,
            warned_short,
        } = self;
        let page_limit = *page_limit;
        let row_count = info.row_count as u64;

        let stop = match config.max_pages() {
            0 => page_limit,
            max_pages => cursor.page.saturating_add(max_pages).min(page_limit),
        };

        let mut emitter = RowEmitter {
            sink,
            info,
            buffers,
            decompress: *decompress,
            rows_processed,
            row_count,
        };

        while cursor.page < stop && !emitter.done() {
            let offset = ensure_page(&mut *emitter.sink, window, header, cursor.page)?;
            let reader = ByteReader::new(
                window,
                header.layout,
                Section::Page { index: cursor.page },
            );
            let page = read_page(&reader, cursor.page, offset)?;
            let flow = if page.page_type.has_data_subheaders() {
                meta_page_rows(&reader, &page, header.page_len, cursor, &mut emitter)?
            } else if page.page_type.has_packed_rows() {
                packed_page_rows(&reader, &page, header.page_len, cursor, &mut emitter)?
            } else {
                cursor.next_page();
                ControlFlow::Continue(())
            };
            if flow.is_break() {
                break;
            }
        }

        if emitter.done() {
            cursor.page = page_limit;
        } else if cursor.page >= page_limit && !*warned_short {
            *warned_short = true;
            log_warn(&format!(
                "reached end of pages after {} of {row_count} rows",
                emitter.rows_processed
            ));
        }

        Ok(cursor.page < page_limit)
    }

    #[must_use]
    pub const fn file_info(&self) -> &FileInfo {
        &self.info
    }

    /// Rows handed to the sink so far.
    #[must_use]
    pub const fn rows_processed(&self) -> u64 {
        self.rows_processed
    }

    #[must_use]
    pub const fn config(&self) -> &ParserConfig {
        &self.config
    }

    #[must_use]
    pub const fn sink(&self) -> &S {
        &self.sink
    }

    pub const fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    #[must_use]
    pub fn into_sink(self) -> S {
        self.sink
    }
}

/// Asks the sink for bytes and checks the answer.
fn refill<S: DecodeSink>(
    sink: &mut S,
    offset: usize,
    len: usize,
    section: Section,
) -> Result<Window> {
    let window = sink.refill(offset, len)?;
    if window.start() > offset {
        return Err(Error::invalid_argument(format!(
            "pager returned a window starting at {} for a request at {offset}",
            window.start()
        )));
    }
    if !window.covers(offset, len) && section != Section::Header {
        return Err(Error::corrupted(
            section,
            format!(
                "pager returned [{}, {}) for a request of {len} bytes at {offset}",
                window.start(),
                window.end()
            ),
        ));
    }
    Ok(window)
}

/// Makes sure the whole of page `index` is inside `window`, returning the
/// page's absolute offset.
fn ensure_page<S: DecodeSink>(
    sink: &mut S,
    window: &mut Window,
    header: &Header,
    index: usize,
) -> Result<usize> {
    let offset = header
        .page_offset(index)
        .ok_or_else(|| Error::corrupted(Section::Page { index }, "page offset overflows"))?;
    if !window.covers(offset, header.page_len) {
        *window = refill(sink, offset, header.page_len, Section::Page { index })?;
    }
    Ok(offset)
}

/// Hands rows to the sink and keeps the row counter.
struct RowEmitter<'p, S> {
    sink: &'p mut S,
    info: &'p FileInfo,
    buffers: &'p mut RowBuffers,
    decompress: Decompressor,
    rows_processed: &'p mut u64,
    row_count: u64,
}

impl<S: DecodeSink> RowEmitter<'_, S> {
    const fn done(&self) -> bool {
        *self.rows_processed >= self.row_count
    }

    fn emit(&mut self, bytes: &[u8], trailing_spaces_known: bool) -> Result<ControlFlow<()>> {
        let row = RowRef::new(
            bytes,
            *self.rows_processed,
            trailing_spaces_known,
            &self.buffers.spaces,
            self.info,
        );
        let flow = self.sink.on_row(row)?;
        *self.rows_processed += 1;
        Ok(flow)
    }

    fn emit_compressed(&mut self, input: &[u8], page_index: usize) -> Result<ControlFlow<()>> {
        let RowBuffers {
            string_columns,
            spaces,
            scratch,
        } = &mut *self.buffers;
        let written = (self.decompress)(input, scratch, string_columns, spaces).map_err(
            |details| Error::corrupted(Section::Decompression { page_index }, details),
        )?;
        if written != scratch.len() {
            return Err(Error::corrupted(
                Section::Row {
                    index: *self.rows_processed,
                },
                format!(
                    "decompressed to {written} of {} bytes on page {page_index}",
                    scratch.len()
                ),
            ));
        }
        let is_rle = self.info.compression == Compression::Rle;
        let row = RowRef::new(scratch, *self.rows_processed, is_rle, spaces, self.info);
        let flow = self.sink.on_row(row)?;
        *self.rows_processed += 1;
        Ok(flow)
    }
}

/// Rows stored in the data subheaders of a meta page, possibly compressed.
fn meta_page_rows<S: DecodeSink>(
    reader: &ByteReader<'_>,
    page: &Page,
    page_len: usize,
    cursor: &mut Cursor,
    emitter: &mut RowEmitter<'_, S>,
) -> Result<ControlFlow<()>> {
    let row_len = emitter.info.row_len;
    let count = usize::from(page.subheader_count);
    let mut index = cursor.subheader;
    let mut flow = ControlFlow::Continue(());

    while index < count && !emitter.done() {
        let subheader = read_subheader(reader, page, index, page_len)?;
        index += 1;
        let Some(subheader) = subheader else {
            continue;
        };
        if subheader.signature != SubheaderSignature::None {
            continue;
        }
        // Row subheaders carry no signature word.
        let source = reader.bytes(page.offset + subheader.offset, subheader.len)?;
        flow = if subheader.len < row_len {
            emitter.emit_compressed(source, page.index)?
        } else {
            emitter.emit(&source[..row_len], false)?
        };
        if flow.is_break() {
            break;
        }
    }

    if index >= count {
        cursor.next_page();
    } else {
        cursor.subheader = index;
    }
    Ok(flow)
}

/// Uncompressed rows packed after the page header (and, on mix pages, after
/// the subheader directory).
fn packed_page_rows<S: DecodeSink>(
    reader: &ByteReader<'_>,
    page: &Page,
    page_len: usize,
    cursor: &mut Cursor,
    emitter: &mut RowEmitter<'_, S>,
) -> Result<ControlFlow<()>> {
    let layout = reader.layout();
    let row_len = emitter.info.row_len;
    let directory = if page.page_type == PageType::Mix {
        usize::from(page.subheader_count) * layout.pointer_size()
    } else {
        0
    };
    let data_start = (layout.page_header_size() + directory).next_multiple_of(8);
    let count = page.packed_row_count();
    let mut index = cursor.packed_row;
    let mut flow = ControlFlow::Continue(());

    while index < count && !emitter.done() {
        let row_start = data_start + index * row_len;
        if row_start + row_len > page_len {
            return Err(reader.corrupted(format!(
                "packed row {index} of {count} does not fit in the page"
            )));
        }
        let bytes = reader.bytes(page.offset + row_start, row_len)?;
        index += 1;
        flow = emitter.emit(bytes, false)?;
        if flow.is_break() {
            break;
        }
    }

    if index >= count {
        cursor.next_page();
    } else {
        cursor.packed_row = index;
    }
    Ok(flow)
}
