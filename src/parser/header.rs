use std::borrow::Cow;

use crate::error::{Error, Result, Section};
use crate::metadata::{EncodingId, Endianness};

use super::window::{ByteReader, Layout, Window};

const SAS_ALIGNMENT_OFFSET_4: u8 = 0x33;
const SAS_ENDIAN_BIG: u8 = 0x00;
const SAS_ENDIAN_LITTLE: u8 = 0x01;

const OFFSET_U64_FLAG: usize = 32;
const OFFSET_ALIGN_FLAG: usize = 35;
const OFFSET_ENDIAN: usize = 37;
const OFFSET_ENCODING: usize = 70;
const OFFSET_HEADER_LEN: usize = 196;
const OFFSET_PAGE_LEN: usize = 200;
const OFFSET_PAGE_COUNT: usize = 204;

const SAS_HEADER_MIN_SIZE: usize = 1024;
const SAS_PAGE_MIN_SIZE: usize = 1024;
const SAS_MAX_SIZE: usize = 1 << 24;
const SAS_MAX_PAGE_COUNT: usize = 1 << 24;

/// Number of bytes requested from the pager before anything else is known.
pub(crate) const HEADER_READ_LEN: usize = SAS_HEADER_MIN_SIZE;

pub(crate) const SAS7BDAT_MAGIC_NUMBER: [u8; 32] = [
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xC2, 0xEA, 0x81, 0x60,
    0xB3, 0x14, 0x11, 0xCF, 0xBD, 0x92, 0x08, 0x00, 0x09, 0xC7, 0x31, 0x8C, 0x18, 0x1F, 0x10, 0x11,
];

/// Fixed-offset fields of the file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Header {
    pub layout: Layout,
    pub encoding: EncodingId,
    pub header_len: usize,
    pub page_len: usize,
    pub page_count: usize,
}

impl Header {
    /// Decodes the header from a window starting at file offset 0.
    pub fn parse(window: &Window) -> Result<Self> {
        let corrupted = |details: &'static str| Error::corrupted(Section::Header, details);

        // Width and endianness are unknown until read; the flag bytes are
        // single bytes so any layout works for the first reads.
        let head = ByteReader::new(
            window,
            Layout {
                endianness: Endianness::Little,
                uses_u64: false,
            },
            Section::Header,
        );

        if head.bytes(0, SAS7BDAT_MAGIC_NUMBER.len())? != SAS7BDAT_MAGIC_NUMBER {
            return Err(corrupted("invalid SAS magic, not a SAS7BDAT file?"));
        }

        let uses_u64 = head.u8(OFFSET_U64_FLAG)? == SAS_ALIGNMENT_OFFSET_4;
        let align = if head.u8(OFFSET_ALIGN_FLAG)? == SAS_ALIGNMENT_OFFSET_4 {
            4
        } else {
            0
        };
        let endianness = match head.u8(OFFSET_ENDIAN)? {
            SAS_ENDIAN_BIG => Endianness::Big,
            SAS_ENDIAN_LITTLE => Endianness::Little,
            _ => return Err(corrupted("unsupported endian flag in header")),
        };
        let encoding = EncodingId(head.u8(OFFSET_ENCODING)?);

        let layout = Layout {
            endianness,
            uses_u64,
        };
        let reader = ByteReader::new(window, layout, Section::Header);
        let header_len = reader.u32(OFFSET_HEADER_LEN + align)? as usize;
        let page_len = reader.u32(OFFSET_PAGE_LEN + align)? as usize;
        let page_count = reader.word(OFFSET_PAGE_COUNT + align)?;

        if !(SAS_HEADER_MIN_SIZE..=SAS_MAX_SIZE).contains(&header_len) {
            return Err(corrupted("header size outside expected range"));
        }
        if !(SAS_PAGE_MIN_SIZE..=SAS_MAX_SIZE).contains(&page_len) {
            return Err(corrupted("page size outside expected range"));
        }
        if page_count == 0 || page_count > SAS_MAX_PAGE_COUNT {
            return Err(Error::Corrupted {
                section: Section::Header,
                details: Cow::from(format!("page count {page_count} outside expected range")),
            });
        }

        Ok(Self {
            layout,
            encoding,
            header_len,
            page_len,
            page_count,
        })
    }

    /// Absolute offset of page `index`.
    pub fn page_offset(&self, index: usize) -> Option<usize> {
        index
            .checked_mul(self.page_len)
            .and_then(|body| body.checked_add(self.header_len))
    }

    /// Number of whole pages present when the file is `file_len` bytes long.
    pub fn pages_in(&self, file_len: usize) -> Result<usize> {
        let body = file_len
            .checked_sub(self.header_len)
            .ok_or_else(|| Error::invalid_argument("filesize_override must be >= header length"))?;
        Ok(body / self.page_len)
    }
}
