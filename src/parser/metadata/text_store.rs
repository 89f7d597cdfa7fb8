use crate::error::Result;
use crate::metadata::Compression;
use crate::parser::alloc::try_copy;

const SAS_COMPRESSION_SIGNATURE_RLE: &[u8] = b"SASYZCRL";
const SAS_COMPRESSION_SIGNATURE_RDC: &[u8] = b"SASYZCR2";

/// Reference into the text blob storage used by SAS column metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TextRef {
    pub index: u16,
    pub offset: u16,
    pub len: u16,
}

/// Column-text subheader blobs, in file order.
#[derive(Debug, Default)]
pub(crate) struct TextStore {
    blobs: Vec<Vec<u8>>,
}

impl TextStore {
    pub const fn new() -> Self {
        Self { blobs: Vec::new() }
    }

    /// Stores a copy of `blob`.
    pub fn push_blob(&mut self, blob: &[u8]) -> Result<()> {
        let copy = try_copy(blob, "column text")?;
        self.blobs.try_reserve(1).map_err(|err| crate::Error::Allocation {
            details: format!("column text list: {err}").into(),
        })?;
        self.blobs.push(copy);
        Ok(())
    }

    pub const fn len(&self) -> usize {
        self.blobs.len()
    }

    pub const fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    /// Bytes referenced by `text_ref`, or `None` when the blob does not exist
    /// or the range starts at or runs past its end.
    pub fn get(&self, text_ref: TextRef) -> Option<&[u8]> {
        let blob = self.blobs.get(usize::from(text_ref.index))?;
        let offset = usize::from(text_ref.offset);
        let len = usize::from(text_ref.len);
        if is_valid_range(offset, len, blob.len()) {
            Some(&blob[offset..offset + len])
        } else {
            None
        }
    }
}

/// `offset` must point inside a haystack of `haystack_len` bytes and the range
/// must end within it.
pub(crate) const fn is_valid_range(offset: usize, len: usize, haystack_len: usize) -> bool {
    offset < haystack_len && len <= haystack_len && offset <= haystack_len - len
}

/// Text up to the first NUL.
pub(crate) fn until_nul(bytes: &[u8]) -> &[u8] {
    bytes
        .iter()
        .position(|b| *b == 0)
        .map_or(bytes, |end| &bytes[..end])
}

/// Row compression announced by the first column-text blob.
pub(crate) fn detect_compression(blob: &[u8]) -> Compression {
    let contains = |needle: &[u8]| blob.windows(needle.len()).any(|window| window == needle);
    if contains(SAS_COMPRESSION_SIGNATURE_RLE) {
        Compression::Rle
    } else if contains(SAS_COMPRESSION_SIGNATURE_RDC) {
        Compression::Rdc
    } else {
        Compression::None
    }
}
