//! Character-set collaborator used when handing column bytes to callers.
//!
//! The decoder itself never transcodes; it only carries the header's
//! [`EncodingId`] through to [`FileInfo`](crate::FileInfo).

use std::borrow::Cow;

use encoding_rs::Encoding;
use simdutf8::basic;

use crate::error::{Error, Result};
use crate::metadata::EncodingId;

static ENCODING_MAP: &[(u8, &str)] = &[
    (0, "WINDOWS-1252"),
    (20, "UTF-8"),
    (28, "US-ASCII"),
    (29, "ISO-8859-1"),
    (30, "ISO-8859-2"),
    (31, "ISO-8859-3"),
    (32, "ISO-8859-4"),
    (33, "ISO-8859-5"),
    (34, "ISO-8859-6"),
    (35, "ISO-8859-7"),
    (36, "ISO-8859-8"),
    (37, "ISO-8859-9"),
    (39, "ISO-8859-11"),
    (40, "ISO-8859-15"),
    (41, "CP437"),
    (42, "CP850"),
    (43, "CP852"),
    (44, "CP857"),
    (45, "CP858"),
    (46, "CP862"),
    (47, "CP864"),
    (48, "CP865"),
    (49, "CP866"),
    (50, "CP869"),
    (51, "CP874"),
    (52, "CP921"),
    (53, "CP922"),
    (54, "CP1129"),
    (55, "CP720"),
    (56, "CP737"),
    (57, "CP775"),
    (58, "CP860"),
    (59, "CP863"),
    (60, "WINDOWS-1250"),
    (61, "WINDOWS-1251"),
    (62, "WINDOWS-1252"),
    (63, "WINDOWS-1253"),
    (64, "WINDOWS-1254"),
    (65, "WINDOWS-1255"),
    (66, "WINDOWS-1256"),
    (67, "WINDOWS-1257"),
    (68, "WINDOWS-1258"),
    (69, "MACROMAN"),
    (70, "MACARABIC"),
    (71, "MACHEBREW"),
    (72, "MACGREEK"),
    (73, "MACTHAI"),
    (75, "MACTURKISH"),
    (76, "MACUKRAINE"),
    (118, "CP950"),
    (119, "EUC-TW"),
    (123, "BIG-5"),
    (125, "GB18030"),
    (126, "WINDOWS-936"),
    (128, "CP1381"),
    (134, "EUC-JP"),
    (136, "CP949"),
    (137, "CP942"),
    (138, "CP932"),
    (140, "EUC-KR"),
    (141, "CP949"),
    (142, "CP949"),
    (163, "MACICELAND"),
    (167, "ISO-2022-JP"),
    (168, "ISO-2022-KR"),
    (169, "ISO-2022-CN"),
    (172, "ISO-2022-CN-EXT"),
    (204, "WINDOWS-1252"),
    (205, "GB18030"),
    (227, "ISO-8859-14"),
    (242, "ISO-8859-13"),
    (245, "MACCROATIAN"),
    (246, "MACCYRILLIC"),
    (247, "MACROMANIA"),
    (248, "SHIFT_JISX0213"),
];

/// SAS name of the character set identified by `id`.
#[must_use]
pub const fn label(id: EncodingId) -> Option<&'static str> {
    let mut i = 0usize;
    while i < ENCODING_MAP.len() {
        if ENCODING_MAP[i].0 == id.0 {
            return Some(ENCODING_MAP[i].1);
        }
        i += 1;
    }
    None
}

/// Maps a header encoding id onto an `encoding_rs` decoder.
#[must_use]
pub fn resolve(id: EncodingId) -> Option<&'static Encoding> {
    label(id).and_then(resolve_label)
}

fn resolve_label(name: &str) -> Option<&'static Encoding> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return None;
    }

    Encoding::for_label(trimmed.as_bytes()).or_else(|| {
        let lower = trimmed.to_ascii_lowercase();
        Encoding::for_label(lower.replace('_', "-").as_bytes())
            .or_else(|| mac_compat_encoding(&lower))
    })
}

fn mac_compat_encoding(lower_label: &str) -> Option<&'static Encoding> {
    let alias: &[u8] = match lower_label {
        "macroman" => b"macintosh",
        "macarabic" => b"x-mac-arabic",
        "machebrew" => b"x-mac-hebrew",
        "macgreek" => b"x-mac-greek",
        "macthai" => b"x-mac-thai",
        "macturkish" => b"x-mac-turkish",
        "macukraine" => b"x-mac-ukrainian",
        "maciceland" => b"x-mac-icelandic",
        "maccroatian" => b"x-mac-croatian",
        "maccyrillic" => b"x-mac-cyrillic",
        "macromania" => b"x-mac-romanian",
        _ => return None,
    };
    Encoding::for_label(alias)
}

fn encoding_error(id: EncodingId, details: impl Into<Cow<'static, str>>) -> Error {
    Error::Encoding {
        encoding: label(id).map_or_else(|| Cow::from(format!("code {}", id.0)), Cow::from),
        details: details.into(),
    }
}

/// Converts column bytes stored in character set `id` to UTF-8.
///
/// Input that is already UTF-8 (or ASCII) is borrowed after validation.
///
/// # Errors
///
/// Returns [`Error::Encoding`] when the character set is unknown or the bytes
/// cannot be represented.
pub fn to_utf8(bytes: &[u8], id: EncodingId) -> Result<Cow<'_, str>> {
    if matches!(id, EncodingId::UTF_8 | EncodingId::ASCII) {
        return basic::from_utf8(bytes)
            .map(Cow::Borrowed)
            .map_err(|_| encoding_error(id, "invalid UTF-8 sequence"));
    }
    let encoding = resolve(id).ok_or_else(|| encoding_error(id, "unsupported character set"))?;
    encoding
        .decode_without_bom_handling_and_without_replacement(bytes)
        .ok_or_else(|| encoding_error(id, "unmappable byte sequence"))
}

/// Like [`to_utf8`] but substitutes U+FFFD for anything unmappable. Used for
/// column names, where failing the whole file is not worth it.
#[must_use]
pub fn to_utf8_lossy(bytes: &[u8], id: EncodingId) -> Cow<'_, str> {
    if let Ok(text) = basic::from_utf8(bytes) {
        return Cow::Borrowed(text);
    }
    resolve(id)
        .unwrap_or(encoding_rs::WINDOWS_1252)
        .decode_without_bom_handling(bytes)
        .0
}

/// Drops trailing spaces and NULs.
#[must_use]
pub fn trim_trailing(bytes: &[u8]) -> &[u8] {
    match bytes.iter().rposition(|b| *b != 0 && *b != b' ') {
        Some(last) => &bytes[..=last],
        None => &[],
    }
}
