#![allow(dead_code)]

use std::ops::ControlFlow;

use sas7bdat_stream::value::sas_days_to_datetime;
use sas7bdat_stream::{
    DecodeSink, Endianness, FileInfo, MemorySource, PageSource, Result, RowRef, Value, Window,
};
use serde_json::{Value as JsonValue, json};
use time::OffsetDateTime;

const MAGIC: [u8; 32] = [
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xC2, 0xEA, 0x81, 0x60,
    0xB3, 0x14, 0x11, 0xCF, 0xBD, 0x92, 0x08, 0x00, 0x09, 0xC7, 0x31, 0x8C, 0x18, 0x1F, 0x10, 0x11,
];

pub const HEADER_LEN: usize = 1024;
pub const DEFAULT_PAGE_LEN: usize = 4096;

pub const SIG_ROW_SIZE: u32 = 0xF7F7_F7F7;
pub const SIG_COLUMN_SIZE: u32 = 0xF6F6_F6F6;
pub const SIG_COLUMN_TEXT: u32 = 0xFFFF_FFFD;
pub const SIG_COLUMN_NAME: u32 = 0xFFFF_FFFF;
pub const SIG_COLUMN_ATTRS: u32 = 0xFFFF_FFFC;
pub const SIG_COLUMN_FORMAT: u32 = 0xFFFF_FBFE;

const PAGE_META: u16 = 0x0000;
const PAGE_DATA: u16 = 0x0100;
const PAGE_MIX: u16 = 0x0200;
const PAGE_AMD: u16 = 0x0400;

const POINTER_TRUNCATED: u8 = 1;
const POINTER_ROW: u8 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Number,
    Text,
}

#[derive(Debug, Clone)]
pub struct TestColumn {
    pub name: String,
    pub kind: Kind,
    pub len: usize,
    pub format: Option<String>,
}

impl TestColumn {
    pub fn number(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: Kind::Number,
            len: 8,
            format: None,
        }
    }

    pub fn text(name: &str, len: usize) -> Self {
        Self {
            name: name.to_string(),
            kind: Kind::Text,
            len,
            format: None,
        }
    }

    pub fn with_len(mut self, len: usize) -> Self {
        self.len = len;
        self
    }

    pub fn with_format(mut self, format: &str) -> Self {
        self.format = Some(format.to_string());
        self
    }
}

/// One cell of a synthetic row.
#[derive(Debug, Clone)]
pub enum Cell {
    Num(f64),
    /// Raw IEEE bits, for special missing values.
    Bits(u64),
    Text(String),
    /// Text bytes in the file's own encoding.
    Raw(Vec<u8>),
}

pub fn num(value: f64) -> Cell {
    Cell::Num(value)
}

pub fn text(value: &str) -> Cell {
    Cell::Text(value.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Rle,
    Rdc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Storage {
    /// Metadata page followed by data pages.
    DataPages,
    /// Rows packed on the metadata page itself, overflow on data pages.
    MixPage,
    /// Rows stored as compressed subheaders on meta pages.
    Compressed(Codec),
}

#[derive(Debug, Clone, Copy)]
struct Layout {
    big: bool,
    wide: bool,
}

impl Layout {
    const fn word(self) -> usize {
        if self.wide { 8 } else { 4 }
    }

    const fn bit_offset(self) -> usize {
        if self.wide { 32 } else { 16 }
    }

    const fn pointer(self) -> usize {
        if self.wide { 24 } else { 12 }
    }

    const fn page_header(self) -> usize {
        self.bit_offset() + 8
    }

    fn put_u16(self, buf: &mut [u8], at: usize, value: u16) {
        let raw = if self.big {
            value.to_be_bytes()
        } else {
            value.to_le_bytes()
        };
        buf[at..at + 2].copy_from_slice(&raw);
    }

    fn put_u32(self, buf: &mut [u8], at: usize, value: u32) {
        let raw = if self.big {
            value.to_be_bytes()
        } else {
            value.to_le_bytes()
        };
        buf[at..at + 4].copy_from_slice(&raw);
    }

    fn put_word(self, buf: &mut [u8], at: usize, value: u64) {
        if self.wide {
            let raw = if self.big {
                value.to_be_bytes()
            } else {
                value.to_le_bytes()
            };
            buf[at..at + 8].copy_from_slice(&raw);
        } else {
            self.put_u32(buf, at, u32::try_from(value).expect("word fits in 32 bits"));
        }
    }

    /// Signatures are sign-extended to the word width.
    fn put_signature(self, buf: &mut [u8], at: usize, signature: u32) {
        let extended = i64::from(signature as i32) as u64;
        if self.wide {
            self.put_word(buf, at, extended);
        } else {
            self.put_u32(buf, at, signature);
        }
    }

    fn number_bytes(self, bits: u64, len: usize) -> Vec<u8> {
        if self.big {
            bits.to_be_bytes()[..len].to_vec()
        } else {
            bits.to_le_bytes()[8 - len..].to_vec()
        }
    }
}

struct Pointer {
    offset: usize,
    len: usize,
    compression: u8,
}

/// A page being assembled: directory grows forward, contents grow backward
/// from the end.
struct PageBuf {
    bytes: Vec<u8>,
    pointers: Vec<Pointer>,
    tail: usize,
}

impl PageBuf {
    fn new(page_len: usize) -> Self {
        Self {
            bytes: vec![0u8; page_len],
            pointers: Vec::new(),
            tail: page_len,
        }
    }

    fn fits(&self, layout: Layout, len: usize) -> bool {
        let directory_end = layout.page_header() + (self.pointers.len() + 1) * layout.pointer();
        self.tail >= len && directory_end <= self.tail - len
    }

    fn push(&mut self, layout: Layout, contents: &[u8], compression: u8) {
        assert!(self.fits(layout, contents.len()), "subheader does not fit");
        self.tail -= contents.len();
        self.bytes[self.tail..self.tail + contents.len()].copy_from_slice(contents);
        self.pointers.push(Pointer {
            offset: self.tail,
            len: contents.len(),
            compression,
        });
    }

    fn push_truncated(&mut self) {
        self.pointers.push(Pointer {
            offset: 0,
            len: 0,
            compression: POINTER_TRUNCATED,
        });
    }

    fn packed_start(&self, layout: Layout) -> usize {
        (layout.page_header() + self.pointers.len() * layout.pointer()).next_multiple_of(8)
    }

    fn finish(mut self, layout: Layout, page_type: u16, packed_rows: usize) -> Vec<u8> {
        let count = u16::try_from(self.pointers.len()).expect("subheader count");
        let blocks = count + u16::try_from(packed_rows).expect("row count");
        let at = layout.bit_offset();
        layout.put_u16(&mut self.bytes, at, page_type);
        layout.put_u16(&mut self.bytes, at + 2, blocks);
        layout.put_u16(&mut self.bytes, at + 4, count);
        let word = layout.word();
        for (i, pointer) in self.pointers.iter().enumerate() {
            let at = layout.page_header() + i * layout.pointer();
            layout.put_word(&mut self.bytes, at, pointer.offset as u64);
            layout.put_word(&mut self.bytes, at + word, pointer.len as u64);
            self.bytes[at + 2 * word] = pointer.compression;
        }
        self.bytes
    }
}

/// Builds small but structurally faithful SAS7BDAT files.
#[derive(Debug, Clone)]
pub struct SasBuilder {
    big_endian: bool,
    uses_u64: bool,
    page_len: usize,
    encoding: u8,
    columns: Vec<TestColumn>,
    rows: Vec<Vec<Cell>>,
    storage: Storage,
    rows_per_page: Option<usize>,
    declared_rows: Option<usize>,
    declared_pages: Option<usize>,
    omit: Vec<u32>,
    truncated_pointer: bool,
    amd_page: bool,
    corrupt_rows: bool,
    short_rows: bool,
}

impl SasBuilder {
    pub fn new(columns: Vec<TestColumn>) -> Self {
        Self {
            big_endian: false,
            uses_u64: true,
            page_len: DEFAULT_PAGE_LEN,
            encoding: 20,
            columns,
            rows: Vec::new(),
            storage: Storage::DataPages,
            rows_per_page: None,
            declared_rows: None,
            declared_pages: None,
            omit: Vec::new(),
            truncated_pointer: false,
            amd_page: false,
            corrupt_rows: false,
            short_rows: false,
        }
    }

    /// 32-bit big-endian layout instead of 64-bit little-endian.
    pub fn narrow_big_endian(mut self) -> Self {
        self.big_endian = true;
        self.uses_u64 = false;
        self
    }

    pub fn big_endian(mut self) -> Self {
        self.big_endian = true;
        self
    }

    pub fn encoding(mut self, id: u8) -> Self {
        self.encoding = id;
        self
    }

    pub fn page_len(mut self, len: usize) -> Self {
        self.page_len = len;
        self
    }

    pub fn storage(mut self, storage: Storage) -> Self {
        self.storage = storage;
        self
    }

    pub fn rows_per_page(mut self, rows: usize) -> Self {
        self.rows_per_page = Some(rows);
        self
    }

    pub fn row(mut self, cells: Vec<Cell>) -> Self {
        assert_eq!(cells.len(), self.columns.len());
        self.rows.push(cells);
        self
    }

    pub fn declared_rows(mut self, rows: usize) -> Self {
        self.declared_rows = Some(rows);
        self
    }

    pub fn declared_pages(mut self, pages: usize) -> Self {
        self.declared_pages = Some(pages);
        self
    }

    pub fn omit(mut self, signature: u32) -> Self {
        self.omit.push(signature);
        self
    }

    /// Adds a truncated subheader pointer to the metadata page.
    pub fn truncated_pointer(mut self) -> Self {
        self.truncated_pointer = true;
        self
    }

    /// Appends a page of a type the decoder skips.
    pub fn amd_page(mut self) -> Self {
        self.amd_page = true;
        self
    }

    /// Writes compressed rows with a command the codec rejects.
    pub fn corrupt_rows(mut self) -> Self {
        self.corrupt_rows = true;
        self
    }

    /// Compresses each row without its last byte, so it decodes short.
    pub fn short_rows(mut self) -> Self {
        self.short_rows = true;
        self
    }

    fn layout(&self) -> Layout {
        Layout {
            big: self.big_endian,
            wide: self.uses_u64,
        }
    }

    pub fn row_len(&self) -> usize {
        self.columns.iter().map(|column| column.len).sum()
    }

    pub fn encode_row(&self, cells: &[Cell]) -> Vec<u8> {
        let layout = self.layout();
        let mut row = Vec::with_capacity(self.row_len());
        for (column, cell) in self.columns.iter().zip(cells) {
            match cell {
                Cell::Num(value) => row.extend(layout.number_bytes(value.to_bits(), column.len)),
                Cell::Bits(bits) => row.extend(layout.number_bytes(*bits, column.len)),
                Cell::Text(value) => row.extend(pad(value.as_bytes(), column.len)),
                Cell::Raw(bytes) => row.extend(pad(bytes, column.len)),
            }
        }
        row
    }

    /// Column-text blob plus references to each name and format.
    fn text_blob(&self) -> (Vec<u8>, Vec<(u16, u16)>, Vec<Option<(u16, u16)>>) {
        let layout = self.layout();
        let mut blob = vec![0u8; 8];
        let literal: &[u8] = match self.storage {
            Storage::Compressed(Codec::Rle) => b"SASYZCRL",
            Storage::Compressed(Codec::Rdc) => b"SASYZCR2",
            _ => b"        ",
        };
        blob.extend_from_slice(literal);
        let push = |blob: &mut Vec<u8>, text: &str| {
            let offset = u16::try_from(blob.len()).expect("blob offset");
            blob.extend_from_slice(text.as_bytes());
            while blob.len() % 4 != 0 {
                blob.push(0);
            }
            (offset, u16::try_from(text.len()).expect("text length"))
        };
        let names = self
            .columns
            .iter()
            .map(|column| push(&mut blob, &column.name))
            .collect();
        let formats = self
            .columns
            .iter()
            .map(|column| column.format.as_deref().map(|f| push(&mut blob, f)))
            .collect();
        let len = u16::try_from(blob.len()).expect("blob length");
        layout.put_u16(&mut blob, 0, len);
        (blob, names, formats)
    }

    fn metadata_subheaders(&self) -> Vec<(u32, Vec<u8>)> {
        let layout = self.layout();
        let word = layout.word();
        let n = self.columns.len();
        let row_count = self.declared_rows.unwrap_or(self.rows.len());
        let mut out = Vec::new();

        let mut row_size = vec![0u8; 8 * word];
        layout.put_signature(&mut row_size, 0, SIG_ROW_SIZE);
        layout.put_word(&mut row_size, word + 4 * word, self.row_len() as u64);
        layout.put_word(&mut row_size, word + 5 * word, row_count as u64);
        out.push((SIG_ROW_SIZE, row_size));

        let mut column_size = vec![0u8; 3 * word];
        layout.put_signature(&mut column_size, 0, SIG_COLUMN_SIZE);
        layout.put_word(&mut column_size, word, n as u64);
        out.push((SIG_COLUMN_SIZE, column_size));

        let (blob, names, formats) = self.text_blob();
        let mut column_text = vec![0u8; word];
        layout.put_signature(&mut column_text, 0, SIG_COLUMN_TEXT);
        column_text.extend_from_slice(&blob);
        out.push((SIG_COLUMN_TEXT, column_text));

        let mut column_name = vec![0u8; 2 * word + 12 + 8 * n];
        layout.put_signature(&mut column_name, 0, SIG_COLUMN_NAME);
        for (i, (offset, len)) in names.iter().enumerate() {
            let at = word + 8 * (i + 1);
            layout.put_u16(&mut column_name, at, 0);
            layout.put_u16(&mut column_name, at + 2, *offset);
            layout.put_u16(&mut column_name, at + 4, *len);
        }
        out.push((SIG_COLUMN_NAME, column_name));

        let (attrs_header, entry_len) = if layout.wide { (28, 16) } else { (20, 12) };
        let mut column_attrs = vec![0u8; attrs_header + entry_len * n];
        layout.put_signature(&mut column_attrs, 0, SIG_COLUMN_ATTRS);
        let mut offset = 0usize;
        for (i, column) in self.columns.iter().enumerate() {
            let at = word + 8 + i * entry_len;
            layout.put_word(&mut column_attrs, at, offset as u64);
            layout.put_u32(
                &mut column_attrs,
                at + word,
                u32::try_from(column.len).expect("column length"),
            );
            column_attrs[at + word + 6] = if column.kind == Kind::Number { 1 } else { 2 };
            offset += column.len;
        }
        out.push((SIG_COLUMN_ATTRS, column_attrs));

        let format_len = if layout.wide { 64 } else { 52 };
        for format in formats {
            let mut column_format = vec![0u8; format_len];
            layout.put_signature(&mut column_format, 0, SIG_COLUMN_FORMAT);
            if let Some((offset, len)) = format {
                let at = word + 22 + 2 * word;
                layout.put_u16(&mut column_format, at, 0);
                layout.put_u16(&mut column_format, at + 2, offset);
                layout.put_u16(&mut column_format, at + 4, len);
            }
            out.push((SIG_COLUMN_FORMAT, column_format));
        }

        out.retain(|(signature, _)| !self.omit.contains(signature));
        out
    }

    fn compress(&self, row: &[u8], codec: Codec) -> Vec<u8> {
        if self.corrupt_rows {
            // 0x3 is not an RLE command; RDC gets a back-reference into nothing.
            return match codec {
                Codec::Rle => vec![0x30, 0x00],
                Codec::Rdc => vec![0x80, 0x00, 0x30, 0x00],
            };
        }
        let row = if self.short_rows {
            &row[..row.len() - 1]
        } else {
            row
        };
        match codec {
            Codec::Rle => rle_encode(row),
            Codec::Rdc => rdc_encode(row),
        }
    }

    /// Number of pages `build` will emit.
    pub fn page_count(&self) -> usize {
        self.pages().len()
    }

    fn pages(&self) -> Vec<Vec<u8>> {
        let layout = self.layout();
        let row_len = self.row_len();
        let rows: Vec<Vec<u8>> = self.rows.iter().map(|r| self.encode_row(r)).collect();
        let mut pages = Vec::new();

        let mut meta = PageBuf::new(self.page_len);
        for (_, contents) in self.metadata_subheaders() {
            meta.push(layout, &contents, 0);
        }
        if self.truncated_pointer {
            meta.push_truncated();
        }

        let mut remaining = rows.as_slice();
        match self.storage {
            Storage::DataPages => {
                pages.push(meta.finish(layout, PAGE_META, 0));
            }
            Storage::MixPage => {
                let start = meta.packed_start(layout);
                let room = (meta.tail - start) / row_len;
                let take = room.min(self.rows_per_page.unwrap_or(room)).min(remaining.len());
                for (i, row) in remaining[..take].iter().enumerate() {
                    let at = start + i * row_len;
                    meta.bytes[at..at + row_len].copy_from_slice(row);
                }
                remaining = &remaining[take..];
                pages.push(meta.finish(layout, PAGE_MIX, take));
            }
            Storage::Compressed(codec) => {
                let mut page = meta;
                let mut on_page = 0usize;
                for row in remaining {
                    let compressed = self.compress(row, codec);
                    let contents = if compressed.len() < row_len {
                        compressed
                    } else {
                        row.clone()
                    };
                    let full = self.rows_per_page.is_some_and(|limit| on_page >= limit);
                    if full || !page.fits(layout, contents.len()) {
                        pages.push(page.finish(layout, PAGE_META, 0));
                        page = PageBuf::new(self.page_len);
                        on_page = 0;
                    }
                    page.push(layout, &contents, POINTER_ROW);
                    on_page += 1;
                }
                pages.push(page.finish(layout, PAGE_META, 0));
                remaining = &[];
            }
        }

        let data_start = layout.page_header().next_multiple_of(8);
        let room = (self.page_len - data_start) / row_len;
        let per_page = room.min(self.rows_per_page.unwrap_or(room)).max(1);
        for chunk in remaining.chunks(per_page) {
            let mut page = PageBuf::new(self.page_len);
            for (i, row) in chunk.iter().enumerate() {
                let at = data_start + i * row_len;
                page.bytes[at..at + row_len].copy_from_slice(row);
            }
            pages.push(page.finish(layout, PAGE_DATA, chunk.len()));
        }

        if self.amd_page {
            let page = PageBuf::new(self.page_len);
            pages.push(page.finish(layout, PAGE_AMD, 0));
        }
        pages
    }

    fn header(&self, page_count: usize) -> Vec<u8> {
        let layout = self.layout();
        let mut header = vec![0u8; HEADER_LEN];
        header[..32].copy_from_slice(&MAGIC);
        let align = if self.uses_u64 {
            header[32] = 0x33;
            header[35] = 0x33;
            4
        } else {
            0
        };
        header[37] = u8::from(!self.big_endian);
        header[70] = self.encoding;
        layout.put_u32(&mut header, 196 + align, HEADER_LEN as u32);
        layout.put_u32(
            &mut header,
            200 + align,
            u32::try_from(self.page_len).expect("page length"),
        );
        layout.put_word(&mut header, 204 + align, page_count as u64);
        header
    }

    pub fn build(&self) -> Vec<u8> {
        let pages = self.pages();
        let declared = self.declared_pages.unwrap_or(pages.len());
        let mut file = self.header(declared);
        for page in pages {
            file.extend(page);
        }
        file
    }
}

fn pad(bytes: &[u8], len: usize) -> Vec<u8> {
    assert!(bytes.len() <= len, "text longer than column");
    let mut field = bytes.to_vec();
    field.resize(len, b' ');
    field
}

/// Emits literal runs (0x8..0xB), byte fills (0xC, 0x4) and space or NUL
/// fills (0xE, 0x6, 0xF, 0x7).
pub fn rle_encode(row: &[u8]) -> Vec<u8> {
    fn flush(out: &mut Vec<u8>, literal: &mut Vec<u8>) {
        for chunk in literal.chunks(64) {
            out.push(0x80 + u8::try_from(chunk.len() - 1).expect("literal length"));
            out.extend_from_slice(chunk);
        }
        literal.clear();
    }

    let mut out = Vec::new();
    let mut literal = Vec::new();
    let mut i = 0;
    while i < row.len() {
        let byte = row[i];
        let run = row[i..].iter().take_while(|b| **b == byte).count();
        let blank = byte == b' ' || byte == 0;
        let mut remaining = run;
        while remaining > 0 {
            if blank && remaining >= 17 {
                flush(&mut out, &mut literal);
                let chunk = remaining.min(17 + 255);
                out.push(if byte == b' ' { 0x60 } else { 0x70 });
                out.push(u8::try_from(chunk - 17).expect("fill length"));
                remaining -= chunk;
            } else if blank && remaining >= 2 {
                flush(&mut out, &mut literal);
                let base = if byte == b' ' { 0xE0 } else { 0xF0 };
                out.push(base + u8::try_from(remaining - 2).expect("fill length"));
                remaining = 0;
            } else if remaining >= 18 {
                flush(&mut out, &mut literal);
                let chunk = remaining.min(18 + 255);
                out.extend_from_slice(&[0x40, u8::try_from(chunk - 18).expect("fill"), byte]);
                remaining -= chunk;
            } else if remaining >= 3 && !blank {
                flush(&mut out, &mut literal);
                out.extend_from_slice(&[0xC0 + u8::try_from(remaining - 3).expect("fill"), byte]);
                remaining = 0;
            } else {
                literal.push(byte);
                remaining -= 1;
            }
        }
        i += run;
    }
    flush(&mut out, &mut literal);
    out
}

/// Emits literals and short (0x0) or long (0x1) fill commands.
pub fn rdc_encode(row: &[u8]) -> Vec<u8> {
    enum Item {
        Literal(u8),
        Command(Vec<u8>),
    }

    let mut items = Vec::new();
    let mut i = 0;
    while i < row.len() {
        let byte = row[i];
        let run = row[i..].iter().take_while(|b| **b == byte).count();
        let mut remaining = run;
        while remaining > 0 {
            if remaining >= 19 {
                let chunk = remaining.min(19 + 15 + (255 << 4));
                let extra = chunk - 19;
                items.push(Item::Command(vec![
                    0x10 | u8::try_from(extra & 0x0F).expect("nibble"),
                    u8::try_from(extra >> 4).expect("count"),
                    byte,
                ]));
                remaining -= chunk;
            } else if remaining >= 3 {
                items.push(Item::Command(vec![
                    u8::try_from(remaining - 3).expect("nibble"),
                    byte,
                ]));
                remaining = 0;
            } else {
                items.push(Item::Literal(byte));
                remaining -= 1;
            }
        }
        i += run;
    }

    let mut out = Vec::new();
    for group in items.chunks(16) {
        let mut control = 0u16;
        for (bit, item) in group.iter().enumerate() {
            if matches!(item, Item::Command(_)) {
                control |= 1 << (15 - bit);
            }
        }
        out.extend_from_slice(&control.to_be_bytes());
        for item in group {
            match item {
                Item::Literal(byte) => out.push(*byte),
                Item::Command(bytes) => out.extend_from_slice(bytes),
            }
        }
    }
    out
}

/// Row captured by [`CollectSink`], with values rendered as JSON.
#[derive(Debug, Clone)]
pub struct CollectedRow {
    pub index: u64,
    pub bytes: Vec<u8>,
    pub trailing_spaces_known: bool,
    pub known_content_len: Vec<usize>,
    pub values: Vec<JsonValue>,
}

/// Serves an in-memory file and records everything the decoder reports.
pub struct CollectSink<P: PageSource = MemorySource> {
    pub source: P,
    pub info: Option<FileInfo>,
    pub metadata_calls: usize,
    pub rows: Vec<CollectedRow>,
    pub refills: Vec<(usize, usize)>,
    /// Ask the decoder to stop after this many rows per stretch.
    pub stop_every: Option<usize>,
    since_stop: usize,
}

impl CollectSink<MemorySource> {
    pub fn new(file: Vec<u8>) -> Self {
        Self::with_source(MemorySource::new(file))
    }
}

impl<P: PageSource> CollectSink<P> {
    pub fn with_source(source: P) -> Self {
        Self {
            source,
            info: None,
            metadata_calls: 0,
            rows: Vec::new(),
            refills: Vec::new(),
            stop_every: None,
            since_stop: 0,
        }
    }

    pub fn stop_every(mut self, rows: usize) -> Self {
        self.stop_every = Some(rows);
        self
    }

    pub fn values(&self) -> Vec<Vec<JsonValue>> {
        self.rows.iter().map(|row| row.values.clone()).collect()
    }
}

impl<P: PageSource> DecodeSink for CollectSink<P> {
    fn refill(&mut self, offset: usize, len: usize) -> Result<Window> {
        self.refills.push((offset, len));
        self.source.fetch(offset, len)
    }

    fn on_metadata(&mut self, info: &FileInfo) -> Result<()> {
        self.metadata_calls += 1;
        self.info = Some(info.clone());
        Ok(())
    }

    fn on_row(&mut self, row: RowRef<'_>) -> Result<ControlFlow<()>> {
        let columns = row.info().column_count();
        let values = row
            .values()
            .map(|value| value.map(|v| value_to_json(&v)))
            .collect::<Result<Vec<_>>>()?;
        self.rows.push(CollectedRow {
            index: row.index(),
            bytes: row.bytes().to_vec(),
            trailing_spaces_known: row.trailing_spaces_known(),
            known_content_len: (0..columns)
                .map(|i| row.known_content_len(i).unwrap_or(0))
                .collect(),
            values,
        });
        self.since_stop += 1;
        if self.stop_every.is_some_and(|every| self.since_stop >= every) {
            self.since_stop = 0;
            return Ok(ControlFlow::Break(()));
        }
        Ok(ControlFlow::Continue(()))
    }
}

pub fn value_to_json(value: &Value<'_>) -> JsonValue {
    match value {
        Value::Float(v) => json!({ "kind": "number", "value": *v }),
        Value::Int(v) => json!({ "kind": "number", "value": *v }),
        Value::UInt(v) => json!({ "kind": "number", "value": *v }),
        Value::Bool(v) => json!({ "kind": "bool", "value": *v }),
        Value::Str(s) => json!({ "kind": "string", "value": s }),
        Value::Bytes(b) => json!({ "kind": "bytes", "value": b.to_vec() }),
        Value::Date(dt) => json!({ "kind": "date", "value": dt.date().to_string() }),
        Value::DateTime(dt) => json!({ "kind": "datetime", "value": datetime_to_seconds(dt) }),
        Value::Missing(missing) => json!({ "kind": "missing", "value": format!("{missing:?}") }),
    }
}

fn datetime_to_seconds(dt: &OffsetDateTime) -> i64 {
    let epoch = sas_days_to_datetime(0.0).expect("SAS epoch");
    (*dt - epoch).whole_seconds()
}

pub fn number(value: f64) -> JsonValue {
    json!({ "kind": "number", "value": value })
}

pub fn string(value: &str) -> JsonValue {
    json!({ "kind": "string", "value": value })
}

pub fn missing(tag: &str) -> JsonValue {
    json!({ "kind": "missing", "value": tag })
}

/// Decodes every page of `file` in one `parse` call.
pub fn decode_all(file: Vec<u8>) -> CollectSink {
    decode_with(file, sas7bdat_stream::ParserConfig::new())
}

pub fn decode_with(file: Vec<u8>, config: sas7bdat_stream::ParserConfig) -> CollectSink {
    let mut parser = sas7bdat_stream::Parser::init(CollectSink::new(file), config).expect("init");
    while parser.parse().expect("parse") {}
    parser.into_sink()
}

/// Endianness the builder uses for `big_endian`.
pub fn endianness(big_endian: bool) -> Endianness {
    if big_endian {
        Endianness::Big
    } else {
        Endianness::Little
    }
}
