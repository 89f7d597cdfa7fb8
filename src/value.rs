use std::borrow::Cow;
use std::convert::TryFrom;

use serde::Serialize;
use time::{Duration, OffsetDateTime};

use crate::encoding;
use crate::error::{Error, Result};
use crate::metadata::{ColumnFormat, ColumnInfo, EncodingId, Endianness};

/// Days between the SAS epoch (1960-01-01) and the Unix epoch.
const SAS_EPOCH_DAYS_BEFORE_UNIX: i64 = 3653;
const SECONDS_PER_DAY: f64 = 86_400.0;

/// A single decoded cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value<'a> {
    /// Character column converted to UTF-8, trailing blanks removed.
    Str(Cow<'a, str>),
    /// Character column with the raw format: untouched bytes.
    Bytes(&'a [u8]),
    Float(f64),
    Bool(bool),
    Int(i64),
    UInt(u64),
    /// SAS date mapped to midnight UTC.
    Date(OffsetDateTime),
    DateTime(OffsetDateTime),
    Missing(MissingValue),
}

impl Value<'_> {
    #[must_use]
    pub const fn is_missing(&self) -> bool {
        matches!(self, Self::Missing(_))
    }
}

/// SAS missing value flavours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MissingValue {
    /// `.` for numerics, an all-blank value for strings.
    System,
    /// Special missing `._` or `.A` through `.Z`.
    Special(char),
}

/// Decodes a SAS numeric stored in 1 to 8 bytes.
///
/// SAS drops the least significant bytes of the IEEE double when a numeric
/// column is shorter than eight bytes; the missing bytes are zero.
#[must_use]
pub fn decode_number(bytes: &[u8], endianness: Endianness) -> f64 {
    f64::from_bits(numeric_bits(bytes, endianness))
}

fn numeric_bits(bytes: &[u8], endianness: Endianness) -> u64 {
    let mut buf = [0u8; 8];
    match endianness {
        Endianness::Big => {
            let len = bytes.len().min(8);
            buf[..len].copy_from_slice(&bytes[..len]);
        }
        Endianness::Little => {
            let kept = &bytes[bytes.len().saturating_sub(8)..];
            for (idx, &byte) in kept.iter().rev().enumerate() {
                buf[idx] = byte;
            }
        }
    }
    u64::from_be_bytes(buf)
}

const fn numeric_bits_is_missing(raw: u64) -> bool {
    const EXP_MASK: u64 = 0x7FF0_0000_0000_0000;
    const FRACTION_MASK: u64 = 0x000F_FFFF_FFFF_FFFF;
    (raw & EXP_MASK) == EXP_MASK && (raw & FRACTION_MASK) != 0
}

const fn missing_from_bits(raw: u64) -> MissingValue {
    let tag_byte = !(((raw >> 40) & 0xFF) as u8);
    match tag_byte {
        0 => MissingValue::Special('_'),
        2..=27 => MissingValue::Special((b'A' + (tag_byte - 2)) as char),
        _ => MissingValue::System,
    }
}

fn exact_integer_from_f64(value: f64) -> Option<i128> {
    if !value.is_finite() {
        return None;
    }
    if value == 0.0 {
        return Some(0);
    }

    let bits = value.to_bits();
    let sign = (bits >> 63) != 0;
    let exponent_bits = ((bits >> 52) & 0x7FF) as i32;
    if exponent_bits == 0 {
        return None;
    }

    let exponent = exponent_bits - 1023;
    if exponent < 0 {
        return None;
    }

    let mantissa = (bits & ((1_u64 << 52) - 1)) | (1_u64 << 52);
    let magnitude_bits = if exponent >= 52 {
        let shift = u32::try_from(exponent - 52).ok()?;
        u128::from(mantissa).checked_shl(shift)?
    } else {
        let shift = u32::try_from(52 - exponent).ok()?;
        if mantissa & ((1_u64 << shift) - 1) != 0 {
            return None;
        }
        u128::from(mantissa >> shift)
    };

    let magnitude = i128::try_from(magnitude_bits).ok()?;
    Some(if sign { -magnitude } else { magnitude })
}

fn try_int_from_f64<T>(value: f64) -> Option<T>
where
    T: TryFrom<i128>,
{
    exact_integer_from_f64(value).and_then(|int| T::try_from(int).ok())
}

fn sas_offset_datetime(seconds: f64) -> Option<OffsetDateTime> {
    if !seconds.is_finite() {
        return None;
    }
    let epoch = OffsetDateTime::UNIX_EPOCH.checked_sub(Duration::days(SAS_EPOCH_DAYS_BEFORE_UNIX))?;
    let duration = Duration::checked_seconds_f64(seconds.abs())?;
    if seconds >= 0.0 {
        epoch.checked_add(duration)
    } else {
        epoch.checked_sub(duration)
    }
}

/// Converts days since 1960-01-01 to a UTC timestamp.
#[must_use]
pub fn sas_days_to_datetime(days: f64) -> Option<OffsetDateTime> {
    sas_offset_datetime(days.trunc() * SECONDS_PER_DAY)
}

/// Converts seconds since 1960-01-01T00:00 to a UTC timestamp.
#[must_use]
pub fn sas_seconds_to_datetime(seconds: f64) -> Option<OffsetDateTime> {
    sas_offset_datetime(seconds)
}

fn unrepresentable(value: f64, format: ColumnFormat) -> Error {
    Error::Unsupported {
        feature: Cow::from(format!("value {value} cannot be represented as {format:?}")),
    }
}

macro_rules! integer_value {
    ($value:expr, $format:expr, $ty:ty, $variant:ident) => {
        try_int_from_f64::<$ty>($value)
            .map(|int| Value::$variant(int.into()))
            .ok_or_else(|| unrepresentable($value, $format))
    };
}

pub(crate) fn numeric_value<'a>(
    bytes: &[u8],
    format: ColumnFormat,
    endianness: Endianness,
) -> Result<Value<'a>> {
    let raw = numeric_bits(bytes, endianness);
    if numeric_bits_is_missing(raw) {
        return Ok(Value::Missing(missing_from_bits(raw)));
    }
    let number = f64::from_bits(raw);
    match format {
        ColumnFormat::Double => Ok(Value::Float(number)),
        #[allow(clippy::cast_possible_truncation)]
        ColumnFormat::Float => Ok(Value::Float(f64::from(number as f32))),
        ColumnFormat::Bool => Ok(Value::Bool(number != 0.0)),
        ColumnFormat::Int8 => integer_value!(number, format, i8, Int),
        ColumnFormat::UInt8 => integer_value!(number, format, u8, UInt),
        ColumnFormat::Int16 => integer_value!(number, format, i16, Int),
        ColumnFormat::UInt16 => integer_value!(number, format, u16, UInt),
        ColumnFormat::Int32 => integer_value!(number, format, i32, Int),
        ColumnFormat::UInt32 => integer_value!(number, format, u32, UInt),
        ColumnFormat::Int64 => integer_value!(number, format, i64, Int),
        ColumnFormat::UInt64 => integer_value!(number, format, u64, UInt),
        ColumnFormat::Date => sas_days_to_datetime(number)
            .map(Value::Date)
            .ok_or_else(|| unrepresentable(number, format)),
        ColumnFormat::DateTime => sas_seconds_to_datetime(number)
            .map(Value::DateTime)
            .ok_or_else(|| unrepresentable(number, format)),
        ColumnFormat::Raw | ColumnFormat::String => Err(Error::invalid_argument(
            "character column decoded as a number",
        )),
    }
}

/// Decodes `bytes` (the column's content, already trimmed for strings) into a
/// [`Value`] according to `column.format`.
pub(crate) fn column_value<'a>(
    bytes: &'a [u8],
    column: &ColumnInfo,
    endianness: Endianness,
    encoding_id: EncodingId,
) -> Result<Value<'a>> {
    match column.format {
        ColumnFormat::Raw => Ok(Value::Bytes(bytes)),
        ColumnFormat::String => {
            if bytes.is_empty() {
                Ok(Value::Missing(MissingValue::System))
            } else {
                encoding::to_utf8(bytes, encoding_id).map(Value::Str)
            }
        }
        format => numeric_value(bytes, format, endianness),
    }
}
