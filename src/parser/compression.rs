//! Row decompressors for the two SAS row compression schemes.
//!
//! Both take untrusted input and write into a caller-owned row buffer; every
//! read and write is bounds-checked and reported as an error message that the
//! engine wraps into [`crate::Error::Corrupted`].

use super::bitmap::Bitmap;

pub type CodecResult<T> = std::result::Result<T, &'static str>;

/// Signature shared by [`decompress_rle`] and [`decompress_rdc`].
pub type Decompressor = fn(&[u8], &mut [u8], &Bitmap, &mut Bitmap) -> CodecResult<usize>;

const SPACE: u8 = b' ';
const AT: u8 = b'@';

fn fill(output: &mut [u8], out_pos: usize, len: usize, byte: u8) -> CodecResult<()> {
    let target = output
        .get_mut(out_pos..out_pos.saturating_add(len))
        .ok_or("fill exceeds output length")?;
    target.fill(byte);
    Ok(())
}

fn copy_literal(
    input: &[u8],
    in_pos: usize,
    output: &mut [u8],
    out_pos: usize,
    len: usize,
) -> CodecResult<()> {
    let source = input
        .get(in_pos..in_pos.saturating_add(len))
        .ok_or("copy exceeds input length")?;
    let target = output
        .get_mut(out_pos..out_pos.saturating_add(len))
        .ok_or("copy exceeds output length")?;
    target.copy_from_slice(source);
    Ok(())
}

/// Fills with a space or NUL run and records the run in `spaces`, restricted
/// to bytes that belong to string columns.
fn fill_space(
    output: &mut [u8],
    out_pos: usize,
    len: usize,
    byte: u8,
    string_columns: &Bitmap,
    spaces: &mut Bitmap,
) -> CodecResult<()> {
    fill(output, out_pos, len, byte)?;
    let stop = (out_pos + len).min(spaces.len());
    if out_pos < stop {
        spaces.combine_or(string_columns, out_pos, stop);
    }
    Ok(())
}

fn byte_at(input: &[u8], pos: usize) -> CodecResult<usize> {
    input
        .get(pos)
        .map(|b| usize::from(*b))
        .ok_or("command exceeds input length")
}

/// Decodes an RLE ("SASYZCRL") compressed row into `output`.
///
/// `spaces` is cleared first; afterwards it marks string-column bytes that
/// were produced by a space or NUL fill command.
///
/// # Errors
///
/// Returns a description of the first out-of-bounds read or write, or of an
/// unknown command nibble.
pub fn decompress_rle(
    input: &[u8],
    output: &mut [u8],
    string_columns: &Bitmap,
    spaces: &mut Bitmap,
) -> CodecResult<usize> {
    spaces.set(0, spaces.len(), false);
    let mut in_pos = 0usize;
    let mut out_pos = 0usize;

    while in_pos < input.len() {
        let command = input[in_pos] >> 4;
        let nibble = usize::from(input[in_pos] & 0x0F);
        let written = match command {
            0x0 => {
                let len = byte_at(input, in_pos + 1)? + 64 + nibble * 256;
                copy_literal(input, in_pos + 2, output, out_pos, len)?;
                in_pos += 2 + len;
                len
            }
            0x1 => {
                let len = byte_at(input, in_pos + 1)? + 64 + nibble * 256 + 4096;
                copy_literal(input, in_pos + 2, output, out_pos, len)?;
                in_pos += 2 + len;
                len
            }
            0x2 => {
                let len = nibble + 96;
                copy_literal(input, in_pos + 1, output, out_pos, len)?;
                in_pos += 1 + len;
                len
            }
            0x4 => {
                let len = byte_at(input, in_pos + 1)? + 18 + nibble * 256;
                let byte = byte_at(input, in_pos + 2)?;
                fill(output, out_pos, len, byte as u8)?;
                in_pos += 3;
                len
            }
            0x5 => {
                let len = byte_at(input, in_pos + 1)? + 17 + nibble * 256;
                fill(output, out_pos, len, AT)?;
                in_pos += 2;
                len
            }
            0x6 | 0x7 => {
                let len = byte_at(input, in_pos + 1)? + 17 + nibble * 256;
                let byte = if command == 0x6 { SPACE } else { 0 };
                fill_space(output, out_pos, len, byte, string_columns, spaces)?;
                in_pos += 2;
                len
            }
            0x8..=0xB => {
                let len = nibble + 1 + 16 * usize::from(command - 0x8);
                copy_literal(input, in_pos + 1, output, out_pos, len)?;
                in_pos += 1 + len;
                len
            }
            0xC => {
                let len = nibble + 3;
                let byte = byte_at(input, in_pos + 1)?;
                fill(output, out_pos, len, byte as u8)?;
                in_pos += 2;
                len
            }
            0xD => {
                let len = nibble + 2;
                fill(output, out_pos, len, AT)?;
                in_pos += 1;
                len
            }
            0xE | 0xF => {
                let len = nibble + 2;
                let byte = if command == 0xE { SPACE } else { 0 };
                fill_space(output, out_pos, len, byte, string_columns, spaces)?;
                in_pos += 1;
                len
            }
            _ => return Err("unknown RLE control byte"),
        };
        out_pos += written;
    }
    Ok(out_pos)
}

/// Decodes an RDC ("SASYZCR2") compressed row into `output`.
///
/// The bitmaps are unused; the parameters exist so both codecs share the
/// [`Decompressor`] signature.
///
/// # Errors
///
/// Returns a description of the first out-of-bounds read or write, or of a
/// back-reference that reaches before the start of the output.
pub fn decompress_rdc(
    input: &[u8],
    output: &mut [u8],
    _string_columns: &Bitmap,
    _spaces: &mut Bitmap,
) -> CodecResult<usize> {
    let mut in_pos = 0usize;
    let mut out_pos = 0usize;

    while in_pos + 1 < input.len() {
        let control = u16::from_be_bytes([input[in_pos], input[in_pos + 1]]);
        in_pos += 2;

        for bit in 0..16 {
            if control & (1 << (15 - bit)) == 0 {
                let Some(&byte) = input.get(in_pos) else {
                    break;
                };
                *output
                    .get_mut(out_pos)
                    .ok_or("literal exceeds output length")? = byte;
                in_pos += 1;
                out_pos += 1;
                continue;
            }

            if in_pos + 1 >= input.len() {
                return Err("RDC command exceeds input length");
            }
            let first = usize::from(input[in_pos]);
            let second = usize::from(input[in_pos + 1]);
            in_pos += 2;
            let (high, low) = (first >> 4, first & 0x0F);

            let written = match high {
                0 => {
                    let len = low + 3;
                    fill(output, out_pos, len, second as u8)?;
                    len
                }
                1 => {
                    let len = low + 19 + (second << 4);
                    let byte = byte_at(input, in_pos)?;
                    in_pos += 1;
                    fill(output, out_pos, len, byte as u8)?;
                    len
                }
                2 => {
                    let distance = low + 3 + (second << 4);
                    let len = byte_at(input, in_pos)? + 16;
                    in_pos += 1;
                    copy_back(output, out_pos, distance, len)?;
                    len
                }
                _ => {
                    let distance = low + 3 + (second << 4);
                    copy_back(output, out_pos, distance, high)?;
                    high
                }
            };
            out_pos += written;
        }
    }
    Ok(out_pos)
}

/// Copies `len` already-produced bytes starting `distance` bytes back.
fn copy_back(output: &mut [u8], out_pos: usize, distance: usize, len: usize) -> CodecResult<()> {
    if distance > out_pos {
        return Err("RDC back-reference before start of output");
    }
    if len > distance {
        return Err("RDC back-reference overlaps its own output");
    }
    if out_pos + len > output.len() {
        return Err("RDC copy exceeds output length");
    }
    let start = out_pos - distance;
    output.copy_within(start..start + len, out_pos);
    Ok(())
}
