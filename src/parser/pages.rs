use crate::error::Result;
use crate::metadata::{Endianness, Page, PageType, Subheader, SubheaderSignature};

use super::window::ByteReader;

const COMPRESSION_TRUNCATED: u8 = 1;
const COMPRESSION_ROW_DATA: u8 = 4;
const SIGNATURE_PADDING: u32 = 0xFFFF_FFFF;

/// Decodes the header of the page at absolute `offset`.
pub(crate) fn read_page(reader: &ByteReader<'_>, index: usize, offset: usize) -> Result<Page> {
    let at = offset + reader.layout().bit_offset();
    let page = Page {
        index,
        offset,
        page_type: PageType::from_raw(reader.u16(at)?),
        block_count: reader.u16(at + 2)?,
        subheader_count: reader.u16(at + 4)?,
    };
    if page.page_type.has_data_subheaders() && page.subheader_count == 0 {
        return Err(reader.corrupted("unexpected empty meta page"));
    }
    Ok(page)
}

/// Decodes pointer `index` of the page's subheader directory.
///
/// Returns `None` for truncated or empty subheaders, which are skipped.
pub(crate) fn read_subheader(
    reader: &ByteReader<'_>,
    page: &Page,
    index: usize,
    page_len: usize,
) -> Result<Option<Subheader>> {
    let layout = reader.layout();
    let word = layout.word_size();
    let start = page.offset + layout.page_header_size() + index * layout.pointer_size();

    let offset = reader.word(start)?;
    let len = reader.word(start + word)?;
    let compression = reader.u8(start + 2 * word)?;
    if compression == COMPRESSION_TRUNCATED || len == 0 {
        return Ok(None);
    }
    if offset.checked_add(len).is_none_or(|end| end > page_len) {
        return Err(reader.corrupted(format!(
            "subheader {index} at offset {offset} with length {len} exceeds page length {page_len}"
        )));
    }

    let signature = if compression == COMPRESSION_ROW_DATA {
        SubheaderSignature::None
    } else {
        let mut raw = reader.u32(page.offset + offset)?;
        if raw == SIGNATURE_PADDING && layout.uses_u64 && layout.endianness == Endianness::Big {
            raw = reader.u32(page.offset + offset + 4)?;
        }
        SubheaderSignature::from_raw(raw)
    };

    Ok(Some(Subheader {
        offset,
        len,
        signature,
    }))
}
